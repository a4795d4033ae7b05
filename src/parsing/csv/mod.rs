pub mod parser;

pub use parser::CsvParser;

use crate::parsing::registry::PluginSpec;

pub fn spec() -> PluginSpec {
    PluginSpec {
        language: "csv",
        extensions: &["csv", "tsv", "tab", "dat"],
        filenames: &[],
        factory: || Ok(Box::new(CsvParser::new())),
    }
}
