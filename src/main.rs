use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use pii_masker::api::config::AppConfig;
use pii_masker::api::start_server;
use pii_masker::document::{extract_text, mask_content, DocumentFormat, SourceDocument};
use pii_masker::utils::logger::init_logger;
use pii_masker::{detect, ExemptionSet, MaskOptions};

#[derive(Parser, Debug)]
#[command(name = "pii_masker", version, about = "Find and redact personal data in text, DOCX and XLSX files")]
struct Cli {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API (default)
    Serve,

    /// List the sensitive values found in a file
    Analyze {
        path: PathBuf,

        #[command(flatten)]
        filters: Filters,
    },

    /// Redact a file and write the result next to it
    Mask {
        path: PathBuf,

        /// Value to leave unredacted; may be repeated
        #[arg(long = "exempt", value_name = "VALUE")]
        exempt: Vec<String>,

        /// Where to write the redacted file
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,

        #[command(flatten)]
        filters: Filters,
    },
}

#[derive(Args, Debug, Clone, Copy)]
struct Filters {
    #[arg(long, default_value_t = false)]
    no_email: bool,

    #[arg(long, default_value_t = false)]
    no_phone: bool,

    #[arg(long, default_value_t = false)]
    no_credit_card: bool,

    #[arg(long, default_value_t = false)]
    no_national_id: bool,
}

impl Filters {
    fn apply(self, defaults: MaskOptions) -> MaskOptions {
        MaskOptions {
            mask_email: defaults.mask_email && !self.no_email,
            mask_phone: defaults.mask_phone && !self.no_phone,
            mask_credit_card: defaults.mask_credit_card && !self.no_credit_card,
            mask_national_id: defaults.mask_national_id && !self.no_national_id,
        }
    }
}

fn read_input(path: &Path, config: &AppConfig) -> Result<(String, Vec<u8>, String)> {
    let bytes = fs::read(path).with_context(|| format!("Cannot read {}", path.display()))?;
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let format = DocumentFormat::from_filename(&filename);
    let text = match extract_text(format, &bytes, config.masking.fallback_encoding) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("warning: {}", e);
            String::new()
        }
    };
    Ok((filename, bytes, text))
}

fn analyze(path: &Path, filters: Filters, config: &AppConfig) -> Result<()> {
    let (_, _, text) = read_input(path, config)?;
    let options = filters.apply(config.masking.defaults);
    let findings = detect(&text, &options.active_categories());
    println!("{}", serde_json::to_string_pretty(&findings)?);
    Ok(())
}

fn mask(path: &Path, exempt: Vec<String>, output: Option<PathBuf>, filters: Filters, config: &AppConfig) -> Result<()> {
    let (filename, bytes, text) = read_input(path, config)?;
    let options = filters.apply(config.masking.defaults);
    let exemptions: ExemptionSet = exempt.into_iter().collect();

    let source = SourceDocument {
        bytes: &bytes,
        filename: &filename,
    };
    let masked = mask_content(&text, Some(source), &options.active_categories(), &exemptions);
    for warning in &masked.warnings {
        eprintln!("warning: {}", warning);
    }

    if let Some(artifact) = &masked.artifact {
        let target = output.unwrap_or_else(|| path.with_file_name(&artifact.filename));
        fs::write(&target, &artifact.bytes).with_context(|| format!("Cannot write {}", target.display()))?;
        eprintln!("wrote {}", target.display());
    }

    println!("{}", serde_json::to_string_pretty(&masked.stats)?);
    Ok(())
}

#[actix_web::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;

    if let Err(e) = init_logger(&config.logging.dir) {
        eprintln!("Logging disabled: {:#}", e);
    }
    match cli.config.as_deref() {
        Some(path) => info!("Configuration loaded from {}: {}", path.display(), config.summary()),
        None => info!("Configuration loaded from defaults and environment: {}", config.summary()),
    }

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => start_server(config).await,
        Command::Analyze { path, filters } => analyze(&path, filters, &config),
        Command::Mask {
            path,
            exempt,
            output,
            filters,
        } => mask(&path, exempt, output, filters, &config),
    }
}
