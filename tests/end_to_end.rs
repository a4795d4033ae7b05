//! End-to-end scenarios exercising the dispatcher against real on-disk
//! indexes.

use quarry::dispatch::{CancelToken, CoreContext, Deadline, Dispatcher, SearchOptions};
use quarry::registry::RepoRegistry;
use quarry::types::SymbolKind;
use quarry::{CodeIndex, Settings};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

struct Fixture {
    _temp: TempDir,
    repo_root: PathBuf,
    dispatcher: Dispatcher,
}

fn fixture() -> Fixture {
    let temp = TempDir::new().unwrap();
    let repo_root = temp.path().join("repo");
    std::fs::create_dir_all(&repo_root).unwrap();

    let registry = RepoRegistry::new(temp.path().join("repository_registry.json"));
    let context = Arc::new(
        CoreContext::new(Settings::default(), registry).with_index_root(temp.path().join("indexes")),
    );
    Fixture {
        _temp: temp,
        repo_root,
        dispatcher: Dispatcher::new(context),
    }
}

impl Fixture {
    fn index(&self, name: &str, content: &str) -> quarry::IndexShard {
        let path = self.repo_root.join(name);
        self.dispatcher.index_file(&path, content).unwrap()
    }

    fn search(&self, query: &str, limit: usize) -> quarry::SearchOutcome {
        self.dispatcher
            .search(
                query,
                &SearchOptions {
                    limit: Some(limit),
                    ..Default::default()
                },
            )
            .unwrap()
    }
}

#[test]
fn symbol_lookup_finds_python_class() {
    let fx = fixture();
    fx.index(
        "demo.py",
        "class Calculator:\n    def add(self, a, b): return a + b\n",
    );

    let def = fx
        .dispatcher
        .lookup("Calculator", None)
        .unwrap()
        .expect("Calculator should resolve");
    assert_eq!(def.kind, "class");
    assert_eq!(def.line, 1);
    assert_eq!(def.language, "python");
    assert!(def.defined_in.to_string_lossy().ends_with("demo.py"));
}

#[test]
fn bm25_returns_the_correct_file() {
    let fx = fixture();
    fx.index("a.py", "def authenticate_user(): pass\n");
    fx.index("b.py", "def log(): pass\n");

    let outcome = fx.search("authenticate_user", 5);
    assert!(!outcome.results.is_empty());
    let first = &outcome.results[0];
    assert!(first.file.to_string_lossy().ends_with("a.py"));
    assert_eq!(first.line, 1);
    assert!(first.snippet.contains("authenticate_user"));
}

#[test]
fn short_prefix_query_hits_the_prefix_index() {
    let fx = fixture();
    fx.index("a.py", "def authenticate_user(): pass\n");
    fx.index("b.py", "def log(): pass\n");

    let outcome = fx.search("au*", 5);
    assert_eq!(outcome.results.len(), 1);
    assert!(outcome.results[0].file.to_string_lossy().ends_with("a.py"));

    let outcome = fx.search("log*", 5);
    assert_eq!(outcome.results.len(), 1);
    assert!(outcome.results[0].file.to_string_lossy().ends_with("b.py"));
}

#[test]
fn kotlin_extension_function() {
    let fx = fixture();
    let shard = fx.index(
        "Strings.kt",
        "fun String.isPalindrome(): Boolean = this == this.reversed()\n",
    );

    let extension = shard
        .symbols
        .iter()
        .find(|s| s.kind == SymbolKind::Extension)
        .expect("extension symbol");
    assert_eq!(extension.name, "String.isPalindrome");
    assert_eq!(
        extension.metadata.get("receiver").and_then(|v| v.as_str()),
        Some("String")
    );

    let def = fx.dispatcher.lookup("String.isPalindrome", None).unwrap().unwrap();
    assert_eq!(def.kind, "extension");
}

#[test]
fn csv_schema_and_statistics() {
    let fx = fixture();
    let shard = fx.index(
        "people.csv",
        "name,age,city,active\nalice,30,paris,1\nbob,25,lyon,0\ncarol,40,nice,1\ndan,22,metz,0\neve,35,brest,1\n",
    );

    let schema = shard
        .symbols
        .iter()
        .find(|s| s.kind == SymbolKind::Schema)
        .expect("schema symbol");
    let meta = schema.metadata.get("schema").unwrap();
    assert_eq!(meta.get("column_count").unwrap(), 4);
    assert_eq!(meta.get("row_count").unwrap(), 5);
    assert_eq!(meta.get("has_header").unwrap(), true);

    let headers: Vec<_> = shard
        .symbols
        .iter()
        .filter(|s| s.kind == SymbolKind::Header)
        .collect();
    assert_eq!(headers.len(), 4);

    let age = headers.iter().find(|s| s.name == "age").unwrap();
    assert_eq!(
        age.metadata.get("data_type").and_then(|v| v.as_str()),
        Some("number")
    );
    let stats = age.metadata.get("statistics").unwrap();
    assert_eq!(stats.get("min").unwrap().as_f64().unwrap(), 22.0);
    assert_eq!(stats.get("max").unwrap().as_f64().unwrap(), 40.0);
    assert!((stats.get("mean").unwrap().as_f64().unwrap() - 30.4).abs() < 1e-9);

    let statistic = shard
        .symbols
        .iter()
        .find(|s| s.kind == SymbolKind::Statistic)
        .expect("statistic symbol");
    assert_eq!(statistic.metadata.get("numeric_columns").unwrap(), 1);
}

#[test]
fn indexing_twice_is_idempotent() {
    let fx = fixture();
    let first = fx.index("demo.py", "class Calculator:\n    pass\n");
    let second = fx.index("demo.py", "class Calculator:\n    pass\n");
    assert_eq!(first.file_id, second.file_id);

    let index_path = fx.dispatcher.context().index_path_for(&fx.repo_root);
    let store = CodeIndex::create_or_open(&index_path).unwrap();
    assert_eq!(store.all_files().unwrap().len(), 1);
    assert_eq!(store.all_content().unwrap().len(), 1);
    let symbols = store.list_symbols_in_file(first.file_id).unwrap();
    assert_eq!(
        symbols.iter().filter(|s| s.name == "Calculator").count(),
        1
    );
}

#[test]
fn empty_file_has_row_but_no_content() {
    let fx = fixture();
    let shard = fx.index("empty.py", "");

    let index_path = fx.dispatcher.context().index_path_for(&fx.repo_root);
    let store = CodeIndex::create_or_open(&index_path).unwrap();
    let record = store.file_record(shard.file_id).unwrap().unwrap();
    assert_eq!(record.size, 0);
    assert!(store.file_content(shard.file_id).unwrap().is_none());
}

#[test]
fn zero_match_query_is_empty_not_error() {
    let fx = fixture();
    fx.index("a.py", "def something(): pass\n");
    let outcome = fx.search("entirely_absent_token", 5);
    assert!(outcome.results.is_empty());
    assert!(!outcome.truncated);
}

#[test]
fn lookup_location_appears_in_references() {
    let fx = fixture();
    fx.index("calc.py", "class Calculator:\n    pass\n");
    fx.index("use.py", "from calc import Calculator\nc = Calculator()\n");

    let def = fx.dispatcher.lookup("Calculator", None).unwrap().unwrap();
    let references = fx
        .dispatcher
        .find_references("Calculator", &Deadline::none(), &CancelToken::new())
        .unwrap();
    assert!(
        references
            .iter()
            .any(|r| r.file == def.defined_in && r.line == def.line),
        "definition site {:?}:{} missing from {references:?}",
        def.defined_in,
        def.line
    );
    // use.py references both lines, deduplicated by (file, line).
    assert!(references.iter().filter(|r| r.file.ends_with("use.py")).count() >= 2);
}

#[test]
fn search_respects_repository_filter() {
    let temp = TempDir::new().unwrap();
    let registry = RepoRegistry::new(temp.path().join("registry.json"));
    let context = Arc::new(
        CoreContext::new(Settings::default(), registry).with_index_root(temp.path().join("indexes")),
    );
    let dispatcher = Dispatcher::new(context);

    let alpha = temp.path().join("alpha");
    let beta = temp.path().join("beta");
    std::fs::create_dir_all(&alpha).unwrap();
    std::fs::create_dir_all(&beta).unwrap();
    dispatcher
        .index_file(&alpha.join("a.py"), "def shared_token(): pass\n")
        .unwrap();
    dispatcher
        .index_file(&beta.join("b.py"), "def shared_token(): pass\n")
        .unwrap();

    let all = dispatcher
        .search("shared_token", &SearchOptions::default())
        .unwrap();
    assert_eq!(all.results.len(), 2);

    let alpha_id = quarry::paths::repo_id(&quarry::paths::normalize(&alpha));
    let filtered = dispatcher
        .search(
            "shared_token",
            &SearchOptions {
                repository_filter: Some(vec![alpha_id.clone()]),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(filtered.results.len(), 1);
    assert_eq!(filtered.results[0].repository, alpha_id);

    let unknown = dispatcher.search(
        "shared_token",
        &SearchOptions {
            repository_filter: Some(vec!["ffffffffffff".to_string()]),
            ..Default::default()
        },
    );
    assert!(matches!(
        unknown.unwrap_err(),
        quarry::IndexError::InvalidInput { .. }
    ));
}

#[test]
fn deactivated_repository_is_skipped_unless_addressed() {
    let temp = TempDir::new().unwrap();
    let registry = RepoRegistry::new(temp.path().join("registry.json"));
    let context = Arc::new(
        CoreContext::new(Settings::default(), registry).with_index_root(temp.path().join("indexes")),
    );
    let dispatcher = Dispatcher::new(context);

    let root = temp.path().join("alpha");
    std::fs::create_dir_all(&root).unwrap();
    dispatcher
        .index_file(&root.join("a.py"), "def dormant_token(): pass\n")
        .unwrap();
    let repo_id = quarry::paths::repo_id(&quarry::paths::normalize(&root));

    dispatcher.context().registry.deactivate(&repo_id).unwrap();
    let skipped = dispatcher
        .search("dormant_token", &SearchOptions::default())
        .unwrap();
    assert!(skipped.results.is_empty());

    // Addressing the repository explicitly still searches it.
    let addressed = dispatcher
        .search(
            "dormant_token",
            &SearchOptions {
                repository_filter: Some(vec![repo_id]),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(addressed.results.len(), 1);
}

#[test]
fn lookup_honors_repository_priority() {
    let temp = TempDir::new().unwrap();
    let registry = RepoRegistry::new(temp.path().join("registry.json"));
    let context = Arc::new(
        CoreContext::new(Settings::default(), registry).with_index_root(temp.path().join("indexes")),
    );
    let dispatcher = Dispatcher::new(context);

    for repo in ["first", "second"] {
        let root = temp.path().join(repo);
        std::fs::create_dir_all(&root).unwrap();
        dispatcher
            .index_file(&root.join("w.py"), "class Widget:\n    pass\n")
            .unwrap();
    }
    let second_id = quarry::paths::repo_id(&quarry::paths::normalize(&temp.path().join("second")));
    dispatcher
        .context()
        .registry
        .set_priority(&second_id, 10)
        .unwrap();

    let def = dispatcher.lookup("Widget", None).unwrap().unwrap();
    assert_eq!(def.repository, second_id);
}

#[test]
fn health_check_reports_ok() {
    let fx = fixture();
    fx.index("demo.py", "class Calculator:\n    pass\n");
    let report = fx.dispatcher.health_check();
    assert_eq!(report.status, "ok", "warnings: {:?}", report.warnings);
    assert_eq!(report.indexed_repos, 1);
    assert_eq!(report.total_files, 1);
}

#[test]
fn fuzzy_suggestions_track_indexed_symbols() {
    let fx = fixture();
    fx.index("calc.py", "class Calculator:\n    pass\n");

    let suggestions = fx.dispatcher.suggest("Calculator", 5);
    assert!(!suggestions.is_empty());
    assert!(suggestions[0].file.to_string_lossy().ends_with("calc.py"));
    assert_eq!(suggestions[0].line, 1);
}

#[test]
fn empty_query_is_invalid_input() {
    let fx = fixture();
    let err = fx
        .dispatcher
        .search("   ", &SearchOptions::default())
        .unwrap_err();
    assert!(matches!(err, quarry::IndexError::InvalidInput { .. }));
}

fn write_tree(root: &Path, files: usize) {
    std::fs::create_dir_all(root).unwrap();
    for i in 0..files {
        std::fs::write(
            root.join(format!("file_{i:04}.py")),
            format!("def function_{i}():\n    return {i}\n"),
        )
        .unwrap();
    }
}

#[test]
fn directory_indexing_is_deterministic() {
    let temp = TempDir::new().unwrap();
    let repo = temp.path().join("repo");
    write_tree(&repo, 20);

    let registry = RepoRegistry::new(temp.path().join("registry.json"));
    let context = Arc::new(
        CoreContext::new(Settings::default(), registry).with_index_root(temp.path().join("indexes")),
    );
    let dispatcher = Dispatcher::new(context);
    let stats = dispatcher
        .index_directory(&repo, true, &CancelToken::new())
        .unwrap();
    assert_eq!(stats.indexed, 20);
    assert_eq!(stats.failed, 0);
    assert!(!stats.cancelled);

    // Sorted walk order means file ids follow filename order.
    let index_path = dispatcher.context().index_path_for(&repo);
    let store = CodeIndex::create_or_open(&index_path).unwrap();
    let files = store.all_files().unwrap();
    assert_eq!(files.len(), 20);
    for (idx, record) in files.iter().enumerate() {
        assert_eq!(record.id.value() as usize, idx + 1);
        assert!(record.relative_path.ends_with(&format!("file_{idx:04}.py")));
    }
}

#[test]
fn cancellation_before_start_returns_empty_partial() {
    let temp = TempDir::new().unwrap();
    let repo = temp.path().join("repo");
    write_tree(&repo, 50);

    let registry = RepoRegistry::new(temp.path().join("registry.json"));
    let context = Arc::new(
        CoreContext::new(Settings::default(), registry).with_index_root(temp.path().join("indexes")),
    );
    let dispatcher = Dispatcher::new(context);

    let cancel = CancelToken::new();
    cancel.cancel();
    let stats = dispatcher.index_directory(&repo, true, &cancel).unwrap();
    assert!(stats.cancelled);
    assert_eq!(stats.indexed, 0);

    // The index is still openable and consistent afterwards.
    let index_path = dispatcher.context().index_path_for(&repo);
    let store = CodeIndex::create_or_open(&index_path).unwrap();
    assert!(store.all_files().unwrap().is_empty());
}

#[test]
fn cancellation_mid_run_leaves_consistent_index() {
    let temp = TempDir::new().unwrap();
    let repo = temp.path().join("repo");
    write_tree(&repo, 400);

    let registry = RepoRegistry::new(temp.path().join("registry.json"));
    let context = Arc::new(
        CoreContext::new(Settings::default(), registry).with_index_root(temp.path().join("indexes")),
    );
    let dispatcher = Dispatcher::new(context);

    let cancel = CancelToken::new();
    let canceller = cancel.clone();
    let handle = std::thread::spawn(move || {
        std::thread::sleep(std::time::Duration::from_millis(20));
        canceller.cancel();
    });
    let stats = dispatcher.index_directory(&repo, true, &cancel).unwrap();
    handle.join().unwrap();

    assert!(stats.indexed <= 400);
    // Whatever happened, no transaction is left open: the index reopens and
    // serves queries.
    let index_path = dispatcher.context().index_path_for(&repo);
    let store = CodeIndex::create_or_open(&index_path).unwrap();
    let files = store.all_files().unwrap();
    assert!(files.len() <= 400);
}

#[test]
fn multi_repo_results_interleave_round_robin() {
    let temp = TempDir::new().unwrap();
    let registry = RepoRegistry::new(temp.path().join("registry.json"));
    let context = Arc::new(
        CoreContext::new(Settings::default(), registry).with_index_root(temp.path().join("indexes")),
    );
    let dispatcher = Dispatcher::new(context);

    for repo in ["alpha", "beta"] {
        let root = temp.path().join(repo);
        std::fs::create_dir_all(&root).unwrap();
        for i in 0..3 {
            dispatcher
                .index_file(
                    &root.join(format!("f{i}.py")),
                    &format!("def common_needle_{i}(): pass\n# common_needle marker\n"),
                )
                .unwrap();
        }
    }

    let outcome = dispatcher
        .search(
            "common_needle",
            &SearchOptions {
                limit: Some(4),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(outcome.results.len(), 4);
    // Round-robin: adjacent results alternate repositories.
    assert_ne!(outcome.results[0].repository, outcome.results[1].repository);
    assert_ne!(outcome.results[2].repository, outcome.results[3].repository);
}
