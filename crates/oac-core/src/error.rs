use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    #[error("failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported OpenAPI version: {0}")]
    UnsupportedVersion(String),
}

/// Failures while following a JSON pointer through the document.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("reference is not an absolute in-document pointer: {0}")]
    NotAbsolute(String),

    #[error("reference target not found: segment '{segment}' of {reference}")]
    NotFound { reference: String, segment: String },

    #[error("cannot index {found} with '{segment}' in {reference}")]
    TypeMismatch {
        reference: String,
        segment: String,
        found: &'static str,
    },

    #[error("reference {reference} does not point at a valid {expected}: {source}")]
    Decode {
        reference: String,
        expected: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml_ng::Error,
    },

    #[error("invalid format declaration '{format}': {reason}")]
    InvalidFormat { format: String, reason: String },
}

/// Generation-time failures. Every variant aborts the whole run.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("not implemented: {0}")]
    NotImplemented(String),

    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("not implemented: string format '{format}' is not registered (schema: {schema})")]
    UnknownFormat { format: String, schema: String },

    #[error("unhandled schema: {0}")]
    UnhandledSchema(String),

    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

impl CompileError {
    pub fn not_implemented(message: impl Into<String>) -> Self {
        CompileError::NotImplemented(message.into())
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        CompileError::MalformedInput(message.into())
    }
}
