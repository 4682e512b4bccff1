//! Configuration loading and credential resolution
//!
//! Bootstrap configuration lives in a single TOML file. Path resolution
//! priority:
//! 1. Command-line argument (highest priority)
//! 2. `QA_SYNC_CONFIG` environment variable
//! 3. Platform config directory (`~/.config/qa-sync/config.toml` on Linux)
//!
//! Tracker and mail credentials may be overridden from the environment so
//! that secrets never have to be written into the TOML file.

use crate::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the config file
pub const CONFIG_PATH_ENV: &str = "QA_SYNC_CONFIG";
/// Environment override for the tracker base URL
pub const TRACKER_SERVER_ENV: &str = "QA_SYNC_TRACKER_SERVER";
/// Environment override for the tracker account email
pub const TRACKER_EMAIL_ENV: &str = "QA_SYNC_TRACKER_EMAIL";
/// Environment override for the tracker API token
pub const TRACKER_TOKEN_ENV: &str = "QA_SYNC_TRACKER_TOKEN";

pub const MAIL_HOST_ENV: &str = "QA_SYNC_MAIL_HOST";
pub const MAIL_PORT_ENV: &str = "QA_SYNC_MAIL_PORT";
pub const MAIL_USERNAME_ENV: &str = "QA_SYNC_MAIL_USERNAME";
pub const MAIL_PASSWORD_ENV: &str = "QA_SYNC_MAIL_PASSWORD";
pub const MAIL_SENDER_ENV: &str = "QA_SYNC_MAIL_SENDER";
pub const MAIL_RECEIVER_ENV: &str = "QA_SYNC_MAIL_RECEIVER";

/// Implicit-TLS submission port
pub const DEFAULT_MAIL_PORT: u16 = 465;

/// Default cap on issues fetched per project
pub const DEFAULT_SEARCH_LIMIT: usize = 500;

/// Complete bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Tracker connection settings
    #[serde(default)]
    pub tracker: TrackerConfig,

    /// Database settings
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Error report mail settings (optional)
    #[serde(default)]
    pub mail: MailConfig,

    /// Project key -> project metadata
    #[serde(default)]
    pub projects: BTreeMap<String, ProjectEntry>,

    /// Developer name -> project keys the developer delivers
    #[serde(default)]
    pub developers: BTreeMap<String, Vec<String>>,

    /// Tester username -> tester details
    #[serde(default)]
    pub testers: BTreeMap<String, TesterEntry>,
}

/// Tracker connection settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrackerConfig {
    /// Base URL, e.g. `https://example.atlassian.net`
    #[serde(default)]
    pub server: Option<String>,

    /// Account email used for basic auth
    #[serde(default)]
    pub email: Option<String>,

    /// API token used for basic auth
    #[serde(default)]
    pub api_token: Option<String>,

    /// Maximum issues fetched per project search
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Client-side rate limit
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
}

/// SMTP settings for the error report mail
#[derive(Clone, Default, Deserialize)]
pub struct MailConfig {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// From address, e.g. `QA Bot <bot@example.com>`
    #[serde(default)]
    pub sender: Option<String>,
    /// To address
    #[serde(default)]
    pub receiver: Option<String>,
}

impl std::fmt::Debug for MailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("sender", &self.sender)
            .field("receiver", &self.receiver)
            .finish()
    }
}

/// Resolved SMTP settings
#[derive(Clone)]
pub struct MailSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub sender: String,
    pub receiver: String,
}

impl std::fmt::Debug for MailSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("sender", &self.sender)
            .field("receiver", &self.receiver)
            .finish()
    }
}

/// Database settings
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file
    #[serde(default = "default_database_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for numbered log files (stderr only if not specified)
    #[serde(default)]
    pub directory: Option<PathBuf>,

    /// Lines written to one log file before rolling to the next
    #[serde(default = "default_max_lines")]
    pub max_lines: usize,

    /// Days of log files kept by `clear_logs`
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: None,
            max_lines: default_max_lines(),
            retention_days: default_retention_days(),
        }
    }
}

/// Project metadata
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ProjectEntry {
    /// Human-readable project name
    pub name: String,
    /// Device type the project targets
    #[serde(default)]
    pub device_type: Option<String>,
    /// External product identifier
    #[serde(default)]
    pub product_id: Option<String>,
}

/// Tester details
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TesterEntry {
    pub name: String,
    pub surname: String,
    #[serde(default)]
    pub company: Option<String>,
}

impl TesterEntry {
    /// "Name Surname" as shown by the tracker
    pub fn display_name(&self) -> String {
        format!("{} {}", self.name, self.surname)
    }
}

/// Resolved tracker credentials
#[derive(Clone)]
pub struct TrackerCredentials {
    pub server: String,
    pub email: String,
    pub api_token: String,
}

impl std::fmt::Debug for TrackerCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackerCredentials")
            .field("server", &self.server)
            .field("email", &self.email)
            .field("api_token", &"<redacted>")
            .finish()
    }
}

fn default_search_limit() -> usize {
    DEFAULT_SEARCH_LIMIT
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_requests_per_second() -> u32 {
    5
}

fn default_database_path() -> PathBuf {
    PathBuf::from("qa-sync.db")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_lines() -> usize {
    3000
}

fn default_retention_days() -> u32 {
    30
}

impl AppConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse the configuration file
    ///
    /// Runs before tracing is initialized; failures surface through the
    /// returned error only.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Check cross-references between the project and developer maps
    fn validate(&self) -> Result<()> {
        if self.tracker.search_limit == 0 {
            return Err(Error::Config(
                "tracker.search_limit must be greater than zero".to_string(),
            ));
        }
        if self.tracker.requests_per_second == 0 {
            return Err(Error::Config(
                "tracker.requests_per_second must be greater than zero".to_string(),
            ));
        }

        for (developer, keys) in &self.developers {
            for key in keys {
                if !self.projects.contains_key(key) {
                    warn!(
                        "Developer {} lists project {} which is not configured under [projects]",
                        developer, key
                    );
                }
            }
        }

        Ok(())
    }

    /// Developer assigned to a project; the last matching developer wins
    pub fn developer_for(&self, project_key: &str) -> Option<&str> {
        self.developers
            .iter()
            .filter(|(_, keys)| keys.iter().any(|k| k == project_key))
            .map(|(developer, _)| developer.as_str())
            .last()
    }

    /// Display name of a project
    pub fn project_name(&self, project_key: &str) -> Option<&str> {
        self.projects.get(project_key).map(|p| p.name.as_str())
    }

    /// All configured project keys, in key order
    pub fn project_keys(&self) -> Vec<String> {
        self.projects.keys().cloned().collect()
    }
}

impl TrackerConfig {
    /// Resolve credentials with ENV > TOML priority
    pub fn credentials(&self) -> Result<TrackerCredentials> {
        let server = pick_setting("Tracker server", TRACKER_SERVER_ENV, self.server.as_deref());
        let email = pick_setting("Tracker email", TRACKER_EMAIL_ENV, self.email.as_deref());
        let api_token =
            pick_setting("Tracker api_token", TRACKER_TOKEN_ENV, self.api_token.as_deref());

        match (server, email, api_token) {
            (Some(server), Some(email), Some(api_token)) => Ok(TrackerCredentials {
                server: server.trim_end_matches('/').to_string(),
                email,
                api_token,
            }),
            (server, email, token) => {
                let mut missing = Vec::new();
                if server.is_none() {
                    missing.push(format!("server ({})", TRACKER_SERVER_ENV));
                }
                if email.is_none() {
                    missing.push(format!("email ({})", TRACKER_EMAIL_ENV));
                }
                if token.is_none() {
                    missing.push(format!("api_token ({})", TRACKER_TOKEN_ENV));
                }
                Err(Error::Config(format!(
                    "Tracker credentials not configured: {}. Set them under [tracker] \
                     in the config file or through the environment.",
                    missing.join(", ")
                )))
            }
        }
    }
}

impl MailConfig {
    /// True when a mail host is set in the file or the environment
    pub fn is_configured(&self) -> bool {
        std::env::var(MAIL_HOST_ENV)
            .map(|v| is_valid_setting(&v))
            .unwrap_or(false)
            || self.host.as_deref().is_some_and(is_valid_setting)
    }

    /// Resolve SMTP settings with ENV > TOML priority
    pub fn settings(&self) -> Result<MailSettings> {
        let port = match std::env::var(MAIL_PORT_ENV) {
            Ok(value) if is_valid_setting(&value) => value.trim().parse::<u16>().map_err(|_| {
                Error::Config(format!("{} is not a valid port: {}", MAIL_PORT_ENV, value))
            })?,
            _ => self.port.unwrap_or(DEFAULT_MAIL_PORT),
        };

        let fields = [
            ("host", MAIL_HOST_ENV, self.host.as_deref()),
            ("username", MAIL_USERNAME_ENV, self.username.as_deref()),
            ("password", MAIL_PASSWORD_ENV, self.password.as_deref()),
            ("sender", MAIL_SENDER_ENV, self.sender.as_deref()),
            ("receiver", MAIL_RECEIVER_ENV, self.receiver.as_deref()),
        ];

        let mut values = Vec::with_capacity(fields.len());
        let mut missing = Vec::new();
        for (name, env_var, toml_value) in fields {
            match pick_setting(&format!("Mail {}", name), env_var, toml_value) {
                Some(value) => values.push(value),
                None => missing.push(format!("{} ({})", name, env_var)),
            }
        }

        if !missing.is_empty() {
            return Err(Error::Config(format!(
                "Mail settings not configured: {}. Set them under [mail] \
                 in the config file or through the environment.",
                missing.join(", ")
            )));
        }

        let mut values = values.into_iter();
        let mut next = || values.next().unwrap_or_default();
        Ok(MailSettings {
            host: next(),
            port,
            username: next(),
            password: next(),
            sender: next(),
            receiver: next(),
        })
    }
}

/// Validate a setting value (non-empty, non-whitespace)
pub fn is_valid_setting(value: &str) -> bool {
    !value.trim().is_empty()
}

fn pick_setting(name: &str, env_var: &str, toml_value: Option<&str>) -> Option<String> {
    if let Ok(value) = std::env::var(env_var) {
        if is_valid_setting(&value) {
            info!("{} loaded from environment variable", name);
            return Some(value);
        }
    }

    toml_value
        .filter(|v| is_valid_setting(v))
        .map(|v| v.to_string())
}

/// Resolve the config file path
///
/// **Priority:** CLI argument → `QA_SYNC_CONFIG` → platform config directory
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = cli_arg {
        return Ok(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        if is_valid_setting(&path) {
            return Ok(PathBuf::from(path));
        }
    }

    dirs::config_dir()
        .map(|d| d.join("qa-sync").join("config.toml"))
        .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))
}
