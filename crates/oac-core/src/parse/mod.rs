pub mod content;
pub mod document;
pub mod operation;
pub mod parameter;
pub mod pointer;
pub mod schema;
pub mod security;
pub mod spec;

use crate::error::ParseError;
pub use document::Document;

/// Parse an OpenAPI document from YAML.
pub fn from_yaml(input: &str) -> Result<Document, ParseError> {
    let raw: serde_json::Value = serde_yaml_ng::from_str(input)?;
    Document::from_value(raw)
}

/// Parse an OpenAPI document from JSON.
pub fn from_json(input: &str) -> Result<Document, ParseError> {
    let raw: serde_json::Value = serde_json::from_str(input)?;
    Document::from_value(raw)
}
