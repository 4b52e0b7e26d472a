//! Runtime configuration.
//!
//! Values come from an optional TOML secrets file and are then overridden by
//! environment variables. Keys may be written in snake case or in the upper
//! case form used by the environment (`APP_PASSWORD`, `GEMINI_API_KEY`,
//! `GCP_JSON`), so an existing secrets file can be reused as is.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{JournalError, Result};

/// Sessions never outlive a year, whatever the configuration says.
pub const MAX_SESSION_HOURS: u64 = 24 * 365;

/// Secrets file read when no explicit path is given. Missing is fine.
pub const DEFAULT_CONFIG_FILE: &str = "secrets.toml";

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(alias = "APP_PASSWORD")]
    pub app_password: Option<String>,
    /// Argon2 PHC string; takes precedence over `app_password`.
    #[serde(alias = "APP_PASSWORD_HASH")]
    pub app_password_hash: Option<String>,
    #[serde(alias = "GEMINI_API_KEY")]
    pub gemini_api_key: Option<String>,
    /// Google credentials JSON, inline.
    #[serde(alias = "GCP_JSON")]
    pub gcp_json: Option<String>,
    /// Google credentials JSON file, used when `gcp_json` is not set.
    pub credentials_file: PathBuf,
    pub spreadsheet_name: String,
    /// When set the spreadsheet is opened directly and the Drive lookup by
    /// name is skipped.
    pub spreadsheet_id: Option<String>,
    pub worksheet_index: usize,
    pub gemini_base_url: String,
    pub web_model: String,
    pub processor_model: String,
    pub bind: String,
    pub static_dir: PathBuf,
    pub poll_interval_minutes: u64,
    pub cell_write_delay_ms: u64,
    pub row_delay_ms: u64,
    pub max_entry_chars: usize,
    pub session_hours: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            app_password: None,
            app_password_hash: None,
            gemini_api_key: None,
            gcp_json: None,
            credentials_file: PathBuf::from("credentials.json"),
            spreadsheet_name: "Crear Diario Terapéutico con Glide".to_string(),
            spreadsheet_id: None,
            worksheet_index: 0,
            gemini_base_url: "https://generativelanguage.googleapis.com".to_string(),
            web_model: "gemini-2.5-flash".to_string(),
            processor_model: "gemini-2.5-flash".to_string(),
            bind: "127.0.0.1:3000".to_string(),
            static_dir: PathBuf::from("static"),
            poll_interval_minutes: 10,
            cell_write_delay_ms: 1000,
            row_delay_ms: 2000,
            max_entry_chars: 3000,
            session_hours: 24,
        }
    }
}

// Secrets never reach the logs.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn redact(v: &Option<String>) -> &'static str {
            if v.is_some() { "<set>" } else { "<unset>" }
        }
        f.debug_struct("Config")
            .field("app_password", &redact(&self.app_password))
            .field("app_password_hash", &redact(&self.app_password_hash))
            .field("gemini_api_key", &redact(&self.gemini_api_key))
            .field("gcp_json", &redact(&self.gcp_json))
            .field("credentials_file", &self.credentials_file)
            .field("spreadsheet_name", &self.spreadsheet_name)
            .field("spreadsheet_id", &self.spreadsheet_id)
            .field("worksheet_index", &self.worksheet_index)
            .field("web_model", &self.web_model)
            .field("processor_model", &self.processor_model)
            .field("bind", &self.bind)
            .field("poll_interval_minutes", &self.poll_interval_minutes)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Load configuration from `path` (or `secrets.toml` if present) and the
    /// process environment.
    ///
    /// # Errors
    /// * An explicit `path` that cannot be read or parsed
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Config::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| JournalError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
            .map_err(|e| JournalError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| JournalError::Config(e.to_string()))
    }

    /// Override fields from environment-style variables returned by `lookup`.
    /// Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("APP_PASSWORD") {
            self.app_password = Some(v);
        }
        if let Some(v) = get("APP_PASSWORD_HASH") {
            self.app_password_hash = Some(v);
        }
        if let Some(v) = get("GEMINI_API_KEY") {
            self.gemini_api_key = Some(v);
        }
        if let Some(v) = get("GCP_JSON") {
            self.gcp_json = Some(v);
        }
        if let Some(v) = get("GOOGLE_APPLICATION_CREDENTIALS") {
            self.credentials_file = PathBuf::from(v);
        }
        if let Some(v) = get("JOURNAL_SPREADSHEET") {
            self.spreadsheet_name = v;
        }
        if let Some(v) = get("JOURNAL_SPREADSHEET_ID") {
            self.spreadsheet_id = Some(v);
        }
        if let Some(v) = get("JOURNAL_BIND") {
            self.bind = v;
        }
    }

    /// Raw Google credentials JSON: inline `gcp_json`, else the credentials file.
    pub fn credentials_json(&self) -> Result<String> {
        if let Some(json) = &self.gcp_json {
            return Ok(json.clone());
        }
        std::fs::read_to_string(&self.credentials_file).map_err(|e| {
            JournalError::Config(format!(
                "Google credentials not found ({}): {}",
                self.credentials_file.display(),
                e
            ))
        })
    }

    pub fn gemini_key(&self) -> Result<&str> {
        self.gemini_api_key
            .as_deref()
            .ok_or_else(|| JournalError::Config("GEMINI_API_KEY not set".to_string()))
    }

    fn has_google_credentials(&self) -> bool {
        self.gcp_json.is_some() || self.credentials_file.exists()
    }

    /// Settings the web form cannot start without.
    pub fn validate_web(&self) -> Result<()> {
        if self.app_password.is_none() && self.app_password_hash.is_none() {
            return Err(JournalError::Config(
                "APP_PASSWORD or APP_PASSWORD_HASH must be set".to_string(),
            ));
        }
        self.validate_processor()
    }

    /// Settings the backfill processor cannot start without.
    pub fn validate_processor(&self) -> Result<()> {
        self.gemini_key()?;
        if !self.has_google_credentials() {
            return Err(JournalError::Config(format!(
                "GCP_JSON not set and {} does not exist",
                self.credentials_file.display()
            )));
        }
        if self.max_entry_chars == 0 {
            return Err(JournalError::Config(
                "max_entry_chars must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_minutes.max(1).saturating_mul(60))
    }

    pub fn cell_write_delay(&self) -> Duration {
        Duration::from_millis(self.cell_write_delay_ms)
    }

    pub fn row_delay(&self) -> Duration {
        Duration::from_millis(self.row_delay_ms)
    }

    pub fn session_duration(&self) -> Duration {
        Duration::from_secs(self.session_hours.min(MAX_SESSION_HOURS) * 60 * 60)
    }
}
