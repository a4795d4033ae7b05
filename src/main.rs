//! quarry command-line interface.
//!
//! Thin surface over the dispatcher: index repositories, look up symbols,
//! search code, inspect status, migrate legacy unified indexes. Exit code 0
//! on success (an empty result list is success), 1 on invocation or storage
//! errors.

use anyhow::Result;
use clap::{Parser, Subcommand};
use quarry::dispatch::{CancelToken, CoreContext, Deadline, Dispatcher, SearchOptions};
use quarry::migrate::{MigrationPlan, migrate_unified_index};
use quarry::registry::RepoRegistry;
use quarry::types::SymbolKind;
use quarry::{IndexError, Settings};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "quarry", version, about = "Multi-repository code indexing and retrieval")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a default configuration file under .quarry/
    Init {
        /// Overwrite an existing configuration
        #[arg(long)]
        force: bool,
    },
    /// Show registered repositories and index health
    Status,
    /// List registered language parsers
    ListPlugins,
    /// Index a directory tree as one repository
    Index {
        path: PathBuf,
        /// Only index the top level of the directory
        #[arg(long)]
        no_recursive: bool,
    },
    /// Query the index
    #[command(subcommand)]
    Search(SearchCommand),
    /// Manage registered repositories
    #[command(subcommand)]
    Repo(RepoCommand),
    /// Split a legacy unified index into per-repository indexes
    Migrate {
        /// Path of the legacy unified index
        legacy: PathBuf,
        /// Repository prefix (repeatable)
        #[arg(long = "prefix", required = true)]
        prefixes: Vec<PathBuf>,
        /// Re-migrate repositories whose index already exists
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum RepoCommand {
    /// Exclude a repository from searches without deleting its index
    Deactivate { repo_id: String },
    /// Set search priority; higher values are searched and ranked first
    Priority { repo_id: String, priority: i32 },
}

#[derive(Subcommand)]
enum SearchCommand {
    /// Exact symbol lookup by name
    SymbolLookup {
        name: String,
        /// Restrict to one symbol kind (class, function, method, ...)
        #[arg(long)]
        kind: Option<String>,
    },
    /// Full-text code search
    SearchCode {
        query: String,
        #[arg(long)]
        limit: Option<usize>,
        /// Use the semantic backend when configured
        #[arg(long)]
        semantic: bool,
        /// Restrict to a repository id (repeatable)
        #[arg(long = "repository")]
        repositories: Vec<String>,
        /// Overall deadline in milliseconds
        #[arg(long)]
        deadline_ms: Option<u64>,
    },
}

fn main() {
    let cli = Cli::parse();
    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("error: invalid configuration: {e}");
            std::process::exit(1);
        }
    };
    quarry::logging::init_with_config(&settings.logging);

    if let Err(e) = run(cli, settings) {
        eprintln!("error: {e}");
        if let Some(index_error) = e.downcast_ref::<IndexError>() {
            for suggestion in index_error.recovery_suggestions() {
                eprintln!("  hint: {suggestion}");
            }
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli, settings: Settings) -> Result<()> {
    let registry = RepoRegistry::at_default_path();
    let context = Arc::new(CoreContext::new(settings, registry));
    let dispatcher = Dispatcher::new(context);

    match cli.command {
        Command::Init { force } => {
            let path = Settings::init_config_file(force)?;
            println!("Wrote {}", path.display());
        }
        Command::Status => {
            let report = dispatcher.health_check();
            println!("status: {}", report.status);
            println!("indexed repositories: {}", report.indexed_repos);
            println!("total files: {}", report.total_files);
            for warning in &report.warnings {
                println!("warning: {warning}");
            }
            for repo in dispatcher.context().registry.list(false)? {
                println!(
                    "  {} {} {} files={} symbols={} priority={}{}",
                    repo.repository_id,
                    repo.name,
                    repo.path.display(),
                    repo.total_files,
                    repo.total_symbols,
                    repo.priority,
                    if repo.active { "" } else { " (inactive)" },
                );
            }
        }
        Command::ListPlugins => {
            for spec in dispatcher.context().plugins.specs() {
                let extensions = spec
                    .extensions
                    .iter()
                    .map(|e| format!(".{e}"))
                    .collect::<Vec<_>>()
                    .join(" ");
                let filenames = spec.filenames.join(" ");
                println!("{:<12} {} {}", spec.language, extensions, filenames);
            }
        }
        Command::Index { path, no_recursive } => {
            let stats = dispatcher.index_directory(&path, !no_recursive, &CancelToken::new())?;
            println!(
                "total={} indexed={} ignored={} failed={}{}",
                stats.total,
                stats.indexed,
                stats.ignored,
                stats.failed,
                if stats.cancelled { " cancelled" } else { "" },
            );
        }
        Command::Search(SearchCommand::SymbolLookup { name, kind }) => {
            let kind = match kind.as_deref() {
                Some(raw) => Some(SymbolKind::from_str(raw).ok_or_else(|| {
                    IndexError::InvalidInput {
                        reason: format!("unknown symbol kind '{raw}'"),
                    }
                })?),
                None => None,
            };
            match dispatcher.lookup(&name, kind)? {
                Some(def) => {
                    println!(
                        "{} [{}] {}:{} ({})",
                        def.symbol,
                        def.kind,
                        def.defined_in.display(),
                        def.line,
                        def.language,
                    );
                    if let Some(signature) = &def.signature {
                        println!("  {signature}");
                    }
                    if let Some(doc) = &def.doc {
                        println!("  {}", doc.lines().next().unwrap_or(""));
                    }
                }
                None => println!("no definition found for '{name}'"),
            }
        }
        Command::Search(SearchCommand::SearchCode {
            query,
            limit,
            semantic,
            repositories,
            deadline_ms,
        }) => {
            let options = SearchOptions {
                limit,
                semantic,
                repository_filter: (!repositories.is_empty()).then_some(repositories),
                deadline: deadline_ms
                    .map(Deadline::within_millis)
                    .unwrap_or_else(Deadline::none),
                cancel: CancelToken::new(),
            };
            let outcome = dispatcher.search(&query, &options)?;
            for result in &outcome.results {
                println!(
                    "{}:{} [{}] score={:.3}",
                    result.file.display(),
                    result.line,
                    result.repository,
                    result.score,
                );
                for line in result.snippet.lines() {
                    println!("    {line}");
                }
            }
            if outcome.truncated {
                println!("(truncated: deadline expired)");
            }
            if outcome.results.is_empty() {
                println!("no matches");
            }
        }
        Command::Repo(RepoCommand::Deactivate { repo_id }) => {
            dispatcher.context().registry.deactivate(&repo_id)?;
            println!("deactivated {repo_id}");
        }
        Command::Repo(RepoCommand::Priority { repo_id, priority }) => {
            dispatcher.context().registry.set_priority(&repo_id, priority)?;
            println!("priority of {repo_id} set to {priority}");
        }
        Command::Migrate {
            legacy,
            prefixes,
            force,
        } => {
            let plan = MigrationPlan { prefixes, force };
            let report = migrate_unified_index(
                &legacy,
                dispatcher.context().index_root(),
                &dispatcher.context().registry,
                &plan,
                &CancelToken::new(),
            )?;
            for migration in &report.migrated {
                println!(
                    "migrated {} ({}) files={} symbols={}",
                    migration.repo_id,
                    migration.path.display(),
                    migration.files,
                    migration.symbols,
                );
            }
            for repo_id in &report.skipped {
                println!("skipped {repo_id} (already migrated)");
            }
            for (repo_id, reason) in &report.failed {
                println!("failed {repo_id}: {reason}");
            }
            if report.unmatched > 0 {
                println!("{} rows matched no prefix", report.unmatched);
            }
            if !report.failed.is_empty() {
                std::process::exit(1);
            }
        }
    }
    Ok(())
}
