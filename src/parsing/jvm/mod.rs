//! JVM language family: Java and Kotlin sources plus Maven and Gradle
//! build files.

pub mod gradle;
pub mod java;
pub mod kotlin;
pub mod maven;

pub use gradle::GradleParser;
pub use java::JavaParser;
pub use kotlin::KotlinParser;
pub use maven::MavenParser;

use crate::parsing::registry::PluginSpec;

pub fn java_spec() -> PluginSpec {
    PluginSpec {
        language: "java",
        extensions: &["java"],
        filenames: &[],
        factory: || JavaParser::new().map(|p| Box::new(p) as _),
    }
}

pub fn kotlin_spec() -> PluginSpec {
    PluginSpec {
        language: "kotlin",
        extensions: &["kt", "kts"],
        filenames: &[],
        factory: || KotlinParser::new().map(|p| Box::new(p) as _),
    }
}

pub fn maven_spec() -> PluginSpec {
    PluginSpec {
        language: "maven",
        extensions: &[],
        filenames: &["pom.xml"],
        factory: || Ok(Box::new(MavenParser::new())),
    }
}

pub fn gradle_spec() -> PluginSpec {
    PluginSpec {
        language: "gradle",
        extensions: &[],
        filenames: &["build.gradle", "build.gradle.kts"],
        factory: || Ok(Box::new(GradleParser::new())),
    }
}
