pub mod parser;

pub use parser::JavaScriptParser;

use crate::parsing::registry::PluginSpec;

pub fn spec() -> PluginSpec {
    PluginSpec {
        language: "javascript",
        extensions: &["js", "jsx", "mjs", "cjs", "ts", "tsx", "mts", "cts"],
        filenames: &[],
        factory: || JavaScriptParser::new().map(|p| Box::new(p) as _),
    }
}
