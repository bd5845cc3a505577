//! Logging setup: tracing to stderr plus an append-only file whose name is
//! derived from startup time. One file per run — no rotation, restarts get
//! a fresh file.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

pub fn init_logging(log_dir: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(log_dir).with_context(|| format!("creating {}", log_dir))?;
    let path = PathBuf::from(log_dir)
        .join(format!("trading_bot_{}.log", chrono::Utc::now().timestamp()));
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("opening {}", path.display()))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(std::io::stderr.and(Arc::new(file)))
        .init();

    Ok(path)
}
