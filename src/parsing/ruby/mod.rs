pub mod parser;

pub use parser::RubyParser;

use crate::parsing::registry::PluginSpec;

pub fn spec() -> PluginSpec {
    PluginSpec {
        language: "ruby",
        extensions: &["rb", "rake", "gemspec"],
        filenames: &[],
        factory: || Ok(Box::new(RubyParser::new())),
    }
}
