pub mod parser;

pub use parser::PythonParser;

use crate::parsing::registry::PluginSpec;

pub fn spec() -> PluginSpec {
    PluginSpec {
        language: "python",
        extensions: &["py"],
        filenames: &[],
        factory: || PythonParser::new().map(|p| Box::new(p) as _),
    }
}
