use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use clap_complete::Shell;

use oac_core::config::{self, CONFIG_FILE_NAME, OacConfig};
use oac_core::parse;
use oac_core::{CodeGenerator, Document, GeneratedFile};
use oac_typescript::compile::operations::operation_sites;
use oac_typescript::{TypeScriptConfig, TypeScriptGenerator};

#[derive(Parser)]
#[command(name = "oac", about = "OpenAPI 3.0 to TypeScript compiler", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate TypeScript from an OpenAPI document
    Generate {
        /// Path to the OpenAPI document (YAML or JSON)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Output directory, overriding the config
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Prefix generated fragments with comments naming their origin
        #[arg(long)]
        annotate: bool,
    },

    /// Check that a document compiles without writing anything
    Validate {
        /// Path to the OpenAPI document
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Initialize a new oac configuration
    Init {
        /// Overwrite existing files
        #[arg(long)]
        force: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate {
            input,
            output,
            annotate,
        } => cmd_generate(input, output, annotate),

        Commands::Validate { input } => cmd_validate(input),

        Commands::Init { force } => cmd_init(force),

        Commands::Completions { shell } => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            clap_complete::generate(shell, &mut cmd, "oac", &mut std::io::stdout());
            Ok(())
        }
    }
}

/// Try to load the project config file from the current directory.
fn try_load_config() -> Result<Option<OacConfig>> {
    let config_path = PathBuf::from(CONFIG_FILE_NAME);
    config::load_config(&config_path).map_err(|e| anyhow::anyhow!(e))
}

fn load_document(path: &Path) -> Result<Document> {
    let content =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;

    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("yaml");

    let doc = match ext {
        "json" => parse::from_json(&content),
        _ => parse::from_yaml(&content),
    }
    .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(doc)
}

/// Write generated files to disk under the given base directory.
fn write_files(base: &Path, files: &[GeneratedFile]) -> Result<()> {
    for file in files {
        let path = base.join(&file.path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
        fs::write(&path, &file.content)
            .with_context(|| format!("failed to write {}", path.display()))?;
        eprintln!("  wrote {}", path.display());
    }
    Ok(())
}

/// Run prettier over the output when the project carries a prettier config.
fn try_run_formatter(output_dir: &Path) {
    let configured = [".prettierrc", ".prettierrc.json", "prettier.config.js"]
        .iter()
        .any(|name| Path::new(name).exists());
    if !configured {
        return;
    }
    match Command::new("npx")
        .args(["prettier", "--write"])
        .arg(output_dir)
        .output()
    {
        Ok(result) if result.status.success() => {
            eprintln!("  formatted with prettier");
        }
        Ok(_) => {
            eprintln!("  warning: prettier exited with an error, output is unformatted");
        }
        Err(_) => {
            eprintln!(
                "  note: prettier not found, run `npx prettier --write {}` to format",
                output_dir.display()
            );
        }
    }
}

const README: &str = r#"# Generated Code: Do Not Edit

This directory is generated by `oac` from an OpenAPI document.
Any manual changes will be overwritten the next time `oac generate` is run.

To regenerate, run:
```
oac generate
```

To change what is generated, edit your `.oac.yaml` configuration file.
"#;

fn generate_files(doc: &Document, cfg: &OacConfig, annotate: bool) -> Result<Vec<GeneratedFile>> {
    let mut ts_config = TypeScriptConfig::from_oac(cfg).context("invalid format configuration")?;
    ts_config.annotate = annotate;
    let files = TypeScriptGenerator
        .generate(doc, &ts_config)
        .context("failed to compile document")?;
    Ok(files)
}

fn cmd_generate(input: Option<PathBuf>, output: Option<PathBuf>, annotate: bool) -> Result<()> {
    let cfg = try_load_config()?.unwrap_or_default();
    let input = input.unwrap_or_else(|| PathBuf::from(&cfg.input));
    let output_dir = output.unwrap_or_else(|| PathBuf::from(&cfg.output));

    let doc = load_document(&input)?;
    log::debug!("loaded {} with {} paths", input.display(), doc.spec().paths.len());

    eprintln!("Generating {} → {}", input.display(), output_dir.display());
    let mut files = generate_files(&doc, &cfg, annotate)?;
    files.push(GeneratedFile {
        path: "README.md".to_string(),
        content: README.to_string(),
    });
    write_files(&output_dir, &files)?;
    try_run_formatter(&output_dir);

    eprintln!("Generated {} files in {}", files.len(), output_dir.display());
    Ok(())
}

fn cmd_validate(input: PathBuf) -> Result<()> {
    let doc = load_document(&input)?;
    let spec = doc.spec();

    eprintln!("Valid OpenAPI {} document: {}", spec.openapi, spec.info.title);
    eprintln!("  Version: {}", spec.info.version);
    eprintln!("  Paths: {}", spec.paths.len());
    eprintln!("  Schemas: {}", spec.schemas().count());
    eprintln!("  Operations: {}", operation_sites(&doc)?.len());

    let cfg = try_load_config()?.unwrap_or_default();
    let files = generate_files(&doc, &cfg, false)?;
    eprintln!("  Compiled files: {}", files.len());

    eprintln!("Validation successful.");
    Ok(())
}

fn cmd_init(force: bool) -> Result<()> {
    let config_path = PathBuf::from(CONFIG_FILE_NAME);

    if config_path.exists() && !force {
        anyhow::bail!(
            "{} already exists. Use --force to overwrite.",
            config_path.display()
        );
    }

    fs::write(&config_path, config::default_config_content())?;
    eprintln!("Created {}", config_path.display());
    Ok(())
}
