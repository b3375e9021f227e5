mod bridge;
mod client;
mod config;
mod continuation;
mod error;
mod logging;
mod machine;
mod orchestrator;
mod surface;
mod tui;

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{CommandFactory, Parser};
use config::{ConfigFile, Overrides, ResolvedConfig};
use continuation::{ChatContinuation, ContinuationProvider};
use machine::ModeKind;
use orchestrator::Orchestrator;
use surface::{PlainDocument, shared};

#[derive(Parser, Debug)]
#[command(
    name = "scrivener",
    about = "A terminal writing pad that continues your draft with an LLM",
    long_about = None,
)]
struct Args {
    /// Text to continue once, printing the result (omit to open the editor)
    text: Option<String>,

    /// Read the text to continue from stdin (headless, like TEXT)
    #[arg(long, conflicts_with = "text")]
    stdin: bool,

    /// Open the editor with the contents of this file (read only; nothing is saved)
    #[arg(short, long, value_name = "PATH", conflicts_with_all = ["text", "stdin"])]
    file: Option<PathBuf>,

    /// Profile to use from config file
    #[arg(short, long, env = "SCRIVENER_PROFILE")]
    profile: Option<String>,

    /// Override endpoint URL
    #[arg(long, env = "SCRIVENER_ENDPOINT")]
    endpoint: Option<String>,

    /// Override model name
    #[arg(short, long, env = "SCRIVENER_MODEL")]
    model: Option<String>,

    /// Override API key
    #[arg(long, env = "SCRIVENER_API_KEY")]
    api_key: Option<String>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,

    /// Write a default config file to ~/.config/scrivener/config.toml and exit
    #[arg(long)]
    init: bool,

    /// List available profiles and exit
    #[arg(long)]
    profiles: bool,

    /// Generate shell completions and print to stdout (bash, zsh, fish, elvish)
    #[arg(long, value_name = "SHELL")]
    completions: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // ── --init ────────────────────────────────────────────────────────────────
    if args.init {
        let path = ConfigFile::write_default_if_missing()?;
        println!("Config written to: {}", path.display());
        println!("Edit it, then run: scrivener");
        return Ok(());
    }

    // ── --completions ─────────────────────────────────────────────────────────
    if let Some(shell_name) = &args.completions {
        return generate_completions(shell_name);
    }

    let file = ConfigFile::load()?;

    // ── --profiles ────────────────────────────────────────────────────────────
    if args.profiles {
        print_profiles(&file);
        return Ok(());
    }

    let resolved = ResolvedConfig::resolve(
        &file,
        &Overrides {
            profile: args.profile.as_deref(),
            endpoint: args.endpoint.as_deref(),
            model: args.model.as_deref(),
            api_key: args.api_key.as_deref(),
            timeout_secs: args.timeout,
        },
    );

    // ── Headless mode (plain stdout, no TUI) ──────────────────────────────────
    let headless_text = if args.stdin {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read text from stdin")?;
        Some(buf)
    } else {
        args.text.clone()
    };
    if let Some(text) = headless_text {
        logging::init_stderr(args.verbose)?;
        return run_headless(text, resolved).await;
    }

    // ── Interactive TUI mode ──────────────────────────────────────────────────
    let seed = match &args.file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => String::new(),
    };
    let log_path = logging::init_file(args.verbose)?;
    tracing::debug!(log = %log_path.display(), "logging to file");

    tui::run(resolved, seed).await
}

// ── Headless mode ─────────────────────────────────────────────────────────────

async fn run_headless(text: String, resolved: ResolvedConfig) -> Result<()> {
    eprintln!("  ▲ scrivener  {}  ·  {}", resolved.profile_name, resolved.model);

    let provider: Arc<dyn ContinuationProvider> =
        Arc::new(ChatContinuation::new(resolved.client()?));
    let document = continue_once(text, provider).await?;
    println!("{document}");
    Ok(())
}

/// One generation against a plain document. Returns the whole document on
/// success, or the normalized failure reason as the error.
async fn continue_once(text: String, provider: Arc<dyn ContinuationProvider>) -> Result<String> {
    let mut orchestrator = Orchestrator::new(shared(PlainDocument::new(text)), provider);

    match orchestrator.generate().await {
        Ok(ModeKind::Idle) => Ok(orchestrator.document().borrow().raw().to_string()),
        Ok(_) => bail!(
            "{}",
            orchestrator
                .error_message()
                .unwrap_or(error::FALLBACK_ERROR_MESSAGE)
        ),
        Err(e) => bail!("{e}"),
    }
}

// ── Profiles listing (non-TUI) ────────────────────────────────────────────────

fn print_profiles(file: &ConfigFile) {
    let mut entries: Vec<(String, String, String, u64)> = file
        .profiles
        .iter()
        .map(|(name, p)| (name.clone(), p.endpoint.clone(), p.model.clone(), p.timeout_secs))
        .collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    println!();
    println!("  Profiles");
    for (name, endpoint, model, timeout) in &entries {
        let marker = if *name == file.default_profile { " ←" } else { "" };
        println!("  {name}{marker}");
        println!("    endpoint  {endpoint}");
        println!("    model     {model}");
        println!("    timeout   {timeout}s");
        println!();
    }
}

// ── Shell completions ─────────────────────────────────────────────────────────

fn generate_completions(shell_name: &str) -> Result<()> {
    use clap_complete::{Shell, generate};

    let shell: Shell = match shell_name.to_lowercase().as_str() {
        "bash"    => Shell::Bash,
        "zsh"     => Shell::Zsh,
        "fish"    => Shell::Fish,
        "elvish"  => Shell::Elvish,
        _ => bail!("Unknown shell: {shell_name} (supported: bash, zsh, fish, elvish)"),
    };

    let mut cmd = Args::command();
    generate(shell, &mut cmd, "scrivener", &mut std::io::stdout());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use async_trait::async_trait;

    struct Canned(Result<String, ProviderError>);

    #[async_trait]
    impl ContinuationProvider for Canned {
        async fn generate(&self, _current_text: &str) -> Result<String, ProviderError> {
            self.0.clone()
        }
    }

    #[test]
    fn test_args_are_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_positional_text_and_stdin_conflict() {
        assert!(Args::try_parse_from(["scrivener", "--stdin", "Once"]).is_err());
        let args = Args::try_parse_from(["scrivener", "Once upon"]).unwrap();
        assert_eq!(args.text.as_deref(), Some("Once upon"));
    }

    #[test]
    fn test_unknown_completion_shell_is_an_error() {
        assert!(generate_completions("powershell-ish").is_err());
    }

    #[tokio::test]
    async fn test_headless_success_returns_whole_document() {
        let provider = Arc::new(Canned(Ok(" turning orange.".to_string())));
        let out = continue_once("The sky was".to_string(), provider).await.unwrap();
        assert_eq!(out, "The sky was turning orange.");
    }

    #[tokio::test]
    async fn test_headless_failure_reports_reason() {
        let provider = Arc::new(Canned(Err(ProviderError::Provider("rate limited".to_string()))));
        let err = continue_once("The sky was".to_string(), provider).await.unwrap_err();
        assert_eq!(err.to_string(), "rate limited");
    }

    #[tokio::test]
    async fn test_headless_blank_input_is_rejected() {
        let provider = Arc::new(Canned(Ok("unused".to_string())));
        let err = continue_once("   \n".to_string(), provider).await.unwrap_err();
        assert_eq!(err.to_string(), "nothing to continue: the document is empty");
    }
}
