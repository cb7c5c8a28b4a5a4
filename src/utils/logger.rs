use anyhow::{Context, Result};
use chrono::Local;
use std::fs;
use std::path::Path;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Installs the global tracing subscriber, writing to a timestamped file in
/// `log_dir`. The level comes from `RUST_LOG`.
///
/// # Returns
/// * `Result<String>` - Path of the log file
pub fn init_logger(log_dir: &str) -> Result<String> {
    if !Path::new(log_dir).exists() {
        fs::create_dir_all(log_dir).with_context(|| format!("Cannot create log directory {}", log_dir))?;
    }

    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let log_file = format!("{}/pii_masker_{}.log", log_dir, timestamp);
    let writer = fs::File::create(&log_file).with_context(|| format!("Cannot create log file {}", log_file))?;

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_target(false)
        .with_ansi(false)
        .with_writer(writer)
        .finish();

    tracing::subscriber::set_global_default(subscriber).context("A global subscriber is already installed")?;
    info!("Logger initialized, writing to {}", log_file);

    Ok(log_file)
}
