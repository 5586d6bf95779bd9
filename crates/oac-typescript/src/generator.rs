use oac_core::config::{OacConfig, Targets};
use oac_core::{CodeGenerator, CompileError, ConfigError, Document, GeneratedFile};

use crate::compile::operations::warn_raw_bodies;
use crate::emitters::{self, EmitOptions};
use crate::formats::FormatRegistry;

/// Settings for one TypeScript generation run.
#[derive(Debug, Clone)]
pub struct TypeScriptConfig {
    pub runtime_module: String,
    pub targets: Targets,
    pub formats: FormatRegistry,
    /// Prefix fragments with origin comments, for debugging the compiler.
    pub annotate: bool,
}

impl TypeScriptConfig {
    /// Build from the project config, validating declared formats.
    pub fn from_oac(config: &OacConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            runtime_module: config.runtime_module.clone(),
            targets: config.targets,
            formats: FormatRegistry::from_config(&config.runtime_module, &config.formats)?,
            annotate: false,
        })
    }
}

/// TypeScript client/server generator.
pub struct TypeScriptGenerator;

impl CodeGenerator for TypeScriptGenerator {
    type Config = TypeScriptConfig;

    fn generate(&self, doc: &Document, config: &TypeScriptConfig) -> Result<Vec<GeneratedFile>, CompileError> {
        let options = EmitOptions {
            runtime_module: config.runtime_module.clone(),
            annotate: config.annotate,
        };
        let formats = &config.formats;
        let targets = config.targets;

        if targets.client || targets.server {
            warn_raw_bodies(doc)?;
        }

        let mut files = Vec::new();
        if targets.types {
            files.push(GeneratedFile {
                path: "types.ts".to_string(),
                content: emitters::types::emit_types(doc, formats, &options)?,
            });
        }
        if targets.validators {
            files.push(GeneratedFile {
                path: "validators.ts".to_string(),
                content: emitters::validators::emit_validators(doc, formats, &options)?,
            });
        }
        if targets.client {
            files.push(GeneratedFile {
                path: "client.ts".to_string(),
                content: emitters::client::emit_client(doc, formats, &options)?,
            });
        }
        if targets.server {
            files.push(GeneratedFile {
                path: "server-types.ts".to_string(),
                content: emitters::server_types::emit_server_types(doc, formats, &options)?,
            });
            files.push(GeneratedFile {
                path: "server.ts".to_string(),
                content: emitters::server::emit_server(doc, formats, &options)?,
            });
        }
        log::debug!("generated {} files", files.len());
        Ok(files)
    }
}
