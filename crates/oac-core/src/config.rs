use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::error::ConfigError;

/// Top-level project configuration loaded from `.oac.yaml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OacConfig {
    pub input: String,
    pub output: String,
    /// Module generated code imports its runtime helpers from.
    pub runtime_module: String,
    pub targets: Targets,
    /// Extra or overriding string formats, keyed by format name.
    pub formats: IndexMap<String, FormatConfig>,
}

impl Default for OacConfig {
    fn default() -> Self {
        Self {
            input: "openapi.yaml".to_string(),
            output: "src/generated".to_string(),
            runtime_module: DEFAULT_RUNTIME_MODULE.to_string(),
            targets: Targets::default(),
            formats: IndexMap::new(),
        }
    }
}

pub const DEFAULT_RUNTIME_MODULE: &str = "oac-runtime";

/// Which output files to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Targets {
    pub types: bool,
    pub validators: bool,
    pub client: bool,
    pub server: bool,
}

impl Default for Targets {
    fn default() -> Self {
        Self {
            types: true,
            validators: true,
            client: true,
            server: true,
        }
    }
}

/// A user-declared string format.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FormatConfig {
    /// Type expression of the parsed value.
    #[serde(rename = "type")]
    pub type_name: String,
    pub parse: FunctionSpec,
    pub serialize: FunctionSpec,
    #[serde(default)]
    pub instanceof: Option<FunctionSpec>,
    /// Module name → imported symbols.
    #[serde(default)]
    pub imports: IndexMap<String, Vec<String>>,
}

/// A one-parameter expression: `body` with `param` standing for the input.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FunctionSpec {
    pub param: String,
    pub body: String,
}

/// Default config file name.
pub const CONFIG_FILE_NAME: &str = ".oac.yaml";

/// Load config from a YAML file. Returns `None` if the file doesn't exist.
pub fn load_config(path: &Path) -> Result<Option<OacConfig>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let config = parse_config(&content).map_err(|source| ConfigError::Yaml {
        path: path.display().to_string(),
        source,
    })?;
    log::debug!("loaded config from {}", path.display());
    Ok(Some(config))
}

pub fn parse_config(content: &str) -> Result<OacConfig, serde_yaml_ng::Error> {
    serde_yaml_ng::from_str(content)
}

/// Generate the default config file content.
pub fn default_config_content() -> &'static str {
    r#"# oac configuration
input: openapi.yaml
output: src/generated
runtime_module: oac-runtime

targets:
  types: true
  validators: true
  client: true
  server: true

# Extra string formats. `param` names the input inside `body`.
formats: {}
  # decimal:
  #   type: Decimal
  #   parse: { param: s, body: "new Decimal(s)" }
  #   serialize: { param: d, body: "d.toString()" }
  #   instanceof: { param: v, body: "v instanceof Decimal" }
  #   imports:
  #     decimal.js: [Decimal]
"#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OacConfig::default();
        assert_eq!(config.input, "openapi.yaml");
        assert_eq!(config.output, "src/generated");
        assert_eq!(config.runtime_module, "oac-runtime");
        assert!(config.targets.client && config.targets.server);
        assert!(config.formats.is_empty());
    }

    #[test]
    fn test_parse_config_yaml() {
        let yaml = r#"
input: spec.yaml
output: out
targets:
  server: false
formats:
  decimal:
    type: Decimal
    parse: { param: s, body: "new Decimal(s)" }
    serialize: { param: d, body: "d.toString()" }
    imports:
      decimal.js: [Decimal]
"#;
        let config = parse_config(yaml).unwrap();
        assert_eq!(config.input, "spec.yaml");
        assert!(!config.targets.server);
        assert!(config.targets.types);
        let decimal = &config.formats["decimal"];
        assert_eq!(decimal.type_name, "Decimal");
        assert_eq!(decimal.parse.param, "s");
        assert!(decimal.instanceof.is_none());
        assert_eq!(decimal.imports["decimal.js"], vec!["Decimal".to_string()]);
    }

    #[test]
    fn test_default_content_parses() {
        let config = parse_config(default_config_content()).unwrap();
        assert_eq!(config.runtime_module, DEFAULT_RUNTIME_MODULE);
    }

    #[test]
    fn test_missing_file_is_none() {
        let result = load_config(Path::new("/nonexistent/.oac.yaml")).unwrap();
        assert!(result.is_none());
    }
}
