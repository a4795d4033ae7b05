pub mod parser;

pub use parser::PhpParser;

use crate::parsing::registry::PluginSpec;

pub fn spec() -> PluginSpec {
    PluginSpec {
        language: "php",
        extensions: &["php"],
        filenames: &[],
        factory: || PhpParser::new().map(|p| Box::new(p) as _),
    }
}
