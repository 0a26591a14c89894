use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

const ENV_FILE: &str = ".env";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub extractor: ExtractorConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Narrative correction window, in characters around a team mention.
#[derive(Debug, Deserialize, Clone)]
pub struct ExtractorConfig {
    #[serde(default = "default_window_after")]
    pub role_window_after: usize,
    #[serde(default = "default_window_before")]
    pub role_window_before: usize,
}

fn default_window_after() -> usize { 160 }
fn default_window_before() -> usize { 40 }

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            role_window_after: default_window_after(),
            role_window_before: default_window_before(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct FeedConfig {
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    #[serde(default = "default_cache_path")]
    pub cache_path: PathBuf,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_s: u64,
}

fn default_capacity() -> usize { 10 }
fn default_cache_path() -> PathBuf { PathBuf::from("webhook_cache.json") }
fn default_poll_interval() -> u64 { 5 }

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            cache_path: default_cache_path(),
            poll_interval_s: default_poll_interval(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct WebhookConfig {
    #[serde(default = "default_persona")]
    pub persona: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
    /// Mark outgoing requests as test runs.
    #[serde(default)]
    pub test: bool,
    /// Workflow URL per sport key; `default` is used for unlisted sports.
    #[serde(default)]
    pub urls: BTreeMap<String, String>,
}

fn default_persona() -> String { "bobby_vegas".to_string() }
fn default_request_timeout() -> u64 { 60_000 }

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            persona: default_persona(),
            request_timeout_ms: default_request_timeout(),
            test: false,
            urls: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String { "webhook_picks=info".to_string() }

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level() }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| "Failed to parse config TOML")?;
        Ok(config)
    }

    /// Load .env file into process environment. Real env vars take precedence.
    pub fn load_env_file() {
        match dotenvy::from_path(ENV_FILE) {
            Ok(()) => {}
            Err(e) if e.not_found() => {}
            Err(e) => tracing::warn!(error = %e, "ignoring malformed .env file"),
        }
    }

    /// Resolve the workflow URL for a sport: `WEBHOOK_URL_<SPORT>` env var,
    /// then config, then an interactive prompt saved to .env.
    pub fn webhook_url(&self, sport: &str) -> Result<String> {
        let var = sport_env_var(sport);
        if let Ok(url) = std::env::var(&var) {
            if !url.trim().is_empty() {
                return Ok(sanitize_key(&url));
            }
        }
        if let Some(url) = self.webhook.configured_url(sport) {
            return Ok(url.to_string());
        }
        let url = prompt(&format!("Webhook URL for {}", sport))?;
        save_env_var(&var, &url);
        Ok(url)
    }
}

impl WebhookConfig {
    /// Configured URL for a sport (case-insensitive), falling back to `default`.
    pub fn configured_url(&self, sport: &str) -> Option<&str> {
        self.urls
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(sport.trim()))
            .or_else(|| self.urls.get_key_value("default"))
            .map(|(_, v)| v.as_str())
            .filter(|v| !v.trim().is_empty())
    }
}

/// "College Football" -> "WEBHOOK_URL_COLLEGE_FOOTBALL"
pub fn sport_env_var(sport: &str) -> String {
    let key: String = sport
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect();
    format!("WEBHOOK_URL_{}", key)
}

fn prompt(label: &str) -> Result<String> {
    print!("  {} > ", label);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let value = sanitize_key(&input);
    if value.is_empty() {
        anyhow::bail!("{} cannot be empty", label);
    }
    Ok(value)
}


/// Strip carriage returns, BOM, and other invisible chars from a key/path value.
fn sanitize_key(raw: &str) -> String {
    raw.replace(['\r', '\u{feff}', '\u{200b}'], "")
        .trim()
        .to_string()
}

/// Append a KEY=VALUE line to .env and set it in the current process.
fn save_env_var(key: &str, value: &str) {
    std::env::set_var(key, value);
    let path = Path::new(ENV_FILE);
    let mut contents = std::fs::read_to_string(path).unwrap_or_default();
    if !contents.is_empty() && !contents.ends_with('\n') {
        contents.push('\n');
    }
    contents.push_str(&format!("{}={}\n", key, value));
    if let Err(e) = std::fs::write(path, contents) {
        tracing::warn!(key, error = %e, "could not save to .env");
    }
}
