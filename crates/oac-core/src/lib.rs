pub mod config;
pub mod error;
pub mod naming;
pub mod parse;

pub use error::{CompileError, ConfigError, ParseError, ResolveError};
pub use parse::Document;

/// A generated file with path and content.
#[derive(Debug, Clone)]
pub struct GeneratedFile {
    pub path: String,
    pub content: String,
}

/// Trait for code generators that produce files from a loaded document.
pub trait CodeGenerator {
    type Config;
    fn generate(
        &self,
        doc: &Document,
        config: &Self::Config,
    ) -> Result<Vec<GeneratedFile>, CompileError>;
}
