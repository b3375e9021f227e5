/// Tracing setup. The TUI owns stdout/stderr, so interactive sessions log to
/// `<data dir>/scrivener.log`; headless runs log to stderr.
use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "scrivener=info";

fn filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("scrivener=debug")
        } else {
            EnvFilter::new(DEFAULT_FILTER)
        }
    })
}

pub fn init_file(verbose: bool) -> Result<std::path::PathBuf> {
    let dir = crate::config::data_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
    let appender = tracing_appender::rolling::never(&dir, "scrivener.log");
    tracing_subscriber::fmt()
        .with_env_filter(filter(verbose))
        .with_writer(appender)
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install logger: {e}"))?;
    Ok(dir.join("scrivener.log"))
}

pub fn init_stderr(verbose: bool) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(filter(verbose))
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install logger: {e}"))
}
