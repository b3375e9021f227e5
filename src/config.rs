use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

// ── Profile ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    /// OpenAI-compatible endpoint URL
    pub endpoint: String,
    /// Model identifier
    pub model: String,
    /// Optional API key (sent as Bearer token)
    pub api_key: Option<String>,
    /// Seconds before a continuation request is abandoned.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Upper bound on continuation length, in tokens. Provider default when unset.
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// Sampling temperature. Provider default when unset.
    #[serde(default)]
    pub temperature: Option<f32>,
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434".to_string(),
            model: "qwen3:14b".to_string(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
            max_tokens: None,
            temperature: None,
        }
    }
}

// ── Config file ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Which profile to use when none is specified
    #[serde(default = "default_profile_name")]
    pub default_profile: String,

    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

fn default_profile_name() -> String {
    "default".to_string()
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            default_profile: default_profile_name(),
            profiles: HashMap::new(),
        }
    }
}

impl ConfigFile {
    /// Load from the standard location, or defaults if the file doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file at {}", path.display()))
    }

    /// Write a starter config file to disk (only if it doesn't exist).
    pub fn write_default_if_missing() -> Result<PathBuf> {
        let path = config_path();
        Self::write_default_to(&path)?;
        Ok(path)
    }

    pub fn write_default_to(path: &Path) -> Result<()> {
        if path.exists() {
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(path, DEFAULT_CONFIG_TOML)
            .with_context(|| format!("Failed to write config file at {}", path.display()))
    }

    /// Resolve the active profile given an optional override name.
    pub fn resolve_profile(&self, name: Option<&str>) -> Option<&Profile> {
        let key = name.unwrap_or(&self.default_profile);
        self.profiles.get(key)
    }
}

// ── CLI overrides ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct Overrides<'a> {
    pub profile: Option<&'a str>,
    pub endpoint: Option<&'a str>,
    pub model: Option<&'a str>,
    pub api_key: Option<&'a str>,
    pub timeout_secs: Option<u64>,
}

// ── Resolved runtime config (after merging file + CLI overrides) ──────────────

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    /// Profile name that was resolved (for display)
    pub profile_name: String,
    pub timeout_secs: u64,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl ResolvedConfig {
    /// Merge config file profile with CLI overrides.
    /// Priority: CLI args > env vars (handled by clap) > config file profile > built-in defaults
    pub fn resolve(file: &ConfigFile, overrides: &Overrides<'_>) -> Self {
        let profile_name = overrides
            .profile
            .unwrap_or(&file.default_profile)
            .to_string();

        let base = file
            .resolve_profile(overrides.profile)
            .cloned()
            .unwrap_or_default();

        Self {
            endpoint: overrides
                .endpoint
                .map(str::to_string)
                .unwrap_or(base.endpoint),
            model: overrides.model.map(str::to_string).unwrap_or(base.model),
            api_key: overrides.api_key.map(str::to_string).or(base.api_key),
            profile_name,
            timeout_secs: overrides.timeout_secs.unwrap_or(base.timeout_secs),
            max_tokens: base.max_tokens,
            temperature: base.temperature,
        }
    }

    /// Build the HTTP client this configuration describes.
    pub fn client(&self) -> Result<crate::client::Client> {
        let mut client = crate::client::Client::new(
            self.endpoint.clone(),
            self.model.clone(),
            self.timeout_secs,
        )?;
        if let Some(key) = &self.api_key {
            client.set_api_key(key.clone());
        }
        if let Some(max_tokens) = self.max_tokens {
            client.set_max_tokens(max_tokens);
        }
        if let Some(temperature) = self.temperature {
            client.set_temperature(temperature);
        }
        Ok(client)
    }
}

// ── Paths ─────────────────────────────────────────────────────────────────────

pub fn config_path() -> PathBuf {
    dirs_config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("scrivener")
        .join("config.toml")
}

fn dirs_config_dir() -> Option<PathBuf> {
    // XDG_CONFIG_HOME or ~/.config on Linux/macOS, %APPDATA% on Windows
    std::env::var("XDG_CONFIG_HOME")
        .ok()
        .map(PathBuf::from)
        .or_else(|| std::env::var("APPDATA").ok().map(PathBuf::from))
        .or_else(|| {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join(".config"))
        })
}

/// Where logs go while the TUI owns the terminal.
pub fn data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            std::env::var("HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("."))
                .join(".local/share")
        })
        .join("scrivener")
}

// ── Default config template written on first run ──────────────────────────────

const DEFAULT_CONFIG_TOML: &str = r#"# scrivener configuration
# Run `scrivener --init` to regenerate this file.

default_profile = "local"

# ── Local Ollama (default) ────────────────────────────────────────────────────
[profiles.local]
endpoint     = "http://localhost:11434"
model        = "qwen3:14b"
timeout_secs = 60
# api_key is not needed for Ollama

# ── OpenAI ───────────────────────────────────────────────────────────────────
# [profiles.openai]
# endpoint     = "https://api.openai.com"
# model        = "gpt-4o-mini"
# api_key      = "sk-..."
# max_tokens   = 200
# temperature  = 0.8

# ── OpenRouter ────────────────────────────────────────────────────────────────
# [profiles.openrouter]
# endpoint     = "https://openrouter.ai/api"
# model        = "meta-llama/llama-3.1-70b-instruct"
# api_key      = "sk-or-..."
# timeout_secs = 90
"#;

#[cfg(test)]
mod tests {
    use super::*;

    fn file_with(toml_src: &str) -> ConfigFile {
        toml::from_str(toml_src).expect("valid config")
    }

    #[test]
    fn test_default_template_parses() {
        let file = file_with(DEFAULT_CONFIG_TOML);
        assert_eq!(file.default_profile, "local");
        let local = file.resolve_profile(None).expect("local profile");
        assert_eq!(local.model, "qwen3:14b");
        assert_eq!(local.timeout_secs, 60);
        assert_eq!(local.max_tokens, None);
    }

    #[test]
    fn test_profile_defaults_fill_missing_fields() {
        let file = file_with(
            r#"
            [profiles.default]
            endpoint = "http://example.test"
            model = "m"
            "#,
        );
        let p = file.resolve_profile(None).unwrap();
        assert_eq!(p.timeout_secs, 60);
        assert_eq!(p.api_key, None);
        assert_eq!(p.temperature, None);
    }

    #[test]
    fn test_resolve_prefers_overrides() {
        let file = file_with(
            r#"
            default_profile = "cloud"
            [profiles.cloud]
            endpoint = "https://api.example.test"
            model = "big"
            api_key = "from-file"
            timeout_secs = 30
            max_tokens = 120
            "#,
        );
        let resolved = ResolvedConfig::resolve(
            &file,
            &Overrides {
                model: Some("small"),
                timeout_secs: Some(5),
                ..Default::default()
            },
        );
        assert_eq!(resolved.profile_name, "cloud");
        assert_eq!(resolved.endpoint, "https://api.example.test");
        assert_eq!(resolved.model, "small");
        assert_eq!(resolved.api_key.as_deref(), Some("from-file"));
        assert_eq!(resolved.timeout_secs, 5);
        assert_eq!(resolved.max_tokens, Some(120));
    }

    #[test]
    fn test_resolve_unknown_profile_uses_builtin_defaults() {
        let resolved = ResolvedConfig::resolve(
            &ConfigFile::default(),
            &Overrides { profile: Some("missing"), ..Default::default() },
        );
        assert_eq!(resolved.profile_name, "missing");
        assert_eq!(resolved.endpoint, "http://localhost:11434");
        assert_eq!(resolved.timeout_secs, 60);
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let file = ConfigFile::load_from(&dir.path().join("nope.toml")).unwrap();
        assert!(file.profiles.is_empty());
        assert_eq!(file.default_profile, "default");
    }

    #[test]
    fn test_first_run_resolves_default_profile_name() {
        let dir = tempfile::tempdir().unwrap();
        let file = ConfigFile::load_from(&dir.path().join("config.toml")).unwrap();
        let resolved = ResolvedConfig::resolve(&file, &Overrides::default());
        assert_eq!(resolved.profile_name, "default");
        assert_eq!(resolved.model, "qwen3:14b");
    }

    #[test]
    fn test_write_default_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        ConfigFile::write_default_to(&path).unwrap();
        let file = ConfigFile::load_from(&path).unwrap();
        assert!(file.profiles.contains_key("local"));

        // An existing file is never overwritten.
        fs::write(&path, "default_profile = \"mine\"\n").unwrap();
        ConfigFile::write_default_to(&path).unwrap();
        assert_eq!(ConfigFile::load_from(&path).unwrap().default_profile, "mine");
    }

    #[test]
    fn test_load_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "profiles = 3").unwrap();
        let err = ConfigFile::load_from(&path).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to parse config file"));
    }
}
