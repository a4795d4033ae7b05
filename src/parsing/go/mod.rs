pub mod gomod;
pub mod parser;

pub use gomod::GoModParser;
pub use parser::GoParser;

use crate::parsing::registry::PluginSpec;

pub fn spec() -> PluginSpec {
    PluginSpec {
        language: "go",
        extensions: &["go"],
        filenames: &[],
        factory: || GoParser::new().map(|p| Box::new(p) as _),
    }
}

pub fn gomod_spec() -> PluginSpec {
    PluginSpec {
        language: "go-mod",
        extensions: &[],
        filenames: &["go.mod"],
        factory: || Ok(Box::new(GoModParser::new())),
    }
}
