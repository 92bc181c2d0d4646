//! Configuration module for Shotwatch.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for Shotwatch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub watch: WatchConfig,
    pub drive: DriveConfig,
    pub auth: AuthConfig,
    pub index: IndexConfig,
    pub sync: SyncConfig,
    pub logging: LoggingConfig,
}

/// What to watch and who to share it with.
///
/// Both values may be left out; the agent then prompts for them on startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Absolute path of the directory to observe.
    pub directory: Option<PathBuf>,
    /// Email granted writer access on the root folder.
    pub operator_email: Option<String>,
}

/// Google Drive layout and endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    /// Name of the root folder every upload lives under.
    pub root_folder_name: String,
    /// Prefix of the per-day sub-folders, followed by `YYYY-MM-DD`.
    pub daily_folder_prefix: String,
    /// Content type sent with every upload.
    pub upload_mime_type: String,
    /// Base URL of the Drive REST API.
    pub api_base_url: String,
    /// Retries for throttled (429/503) requests before giving up.
    pub max_retries: u32,
}

/// OAuth client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// OAuth client ID. `None` until configured by the user.
    pub client_id: Option<String>,
    /// OAuth client secret issued for installed applications.
    pub client_secret: Option<String>,
    pub auth_url: String,
    pub token_url: String,
    /// Loopback address the login flow listens on.
    pub redirect_uri: String,
}

/// Record index storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Path of the SQLite database file.
    pub database_path: PathBuf,
}

/// Event handling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Deadline for reconciling a single filesystem event.
    pub handler_timeout_secs: u64,
    /// Capacity of the watcher-to-dispatcher channel.
    pub event_buffer: usize,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Output format: `human` or `json`.
    pub format: String,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise return [`Config::default`].
    ///
    /// Unlike a missing file, a file that exists but cannot be read or parsed
    /// is an error.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/shotwatch/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("shotwatch")
            .join("config.yaml")
    }
}

// ---------------------------------------------------------------------------
// Config::default()
// ---------------------------------------------------------------------------

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            root_folder_name: "SS-Watcher-Backup-GDrive-Folder".to_string(),
            daily_folder_prefix: "SS_".to_string(),
            upload_mime_type: "image/png".to_string(),
            api_base_url: "https://www.googleapis.com".to_string(),
            max_retries: 3,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            redirect_uri: "http://127.0.0.1:8400/callback".to_string(),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            database_path: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("~/.local/share"))
                .join("shotwatch")
                .join("index.db"),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            handler_timeout_secs: 300,
            event_buffer: 256,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "human".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"sync.handler_timeout_secs"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Valid values for `logging.format`.
const VALID_LOG_FORMATS: &[&str] = &["human", "json"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid. The watched
    /// directory and operator email are checked later, once prompting has
    /// filled them in.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- drive ---
        if self.drive.root_folder_name.trim().is_empty() {
            errors.push(ValidationError {
                field: "drive.root_folder_name".into(),
                message: "must not be empty".into(),
            });
        }
        if self.drive.root_folder_name.contains('\'') {
            errors.push(ValidationError {
                field: "drive.root_folder_name".into(),
                message: "must not contain single quotes".into(),
            });
        }
        if self.drive.daily_folder_prefix.contains('\'') {
            errors.push(ValidationError {
                field: "drive.daily_folder_prefix".into(),
                message: "must not contain single quotes".into(),
            });
        }
        if !self.drive.upload_mime_type.contains('/') {
            errors.push(ValidationError {
                field: "drive.upload_mime_type".into(),
                message: format!(
                    "'{}' is not a type/subtype pair",
                    self.drive.upload_mime_type
                ),
            });
        }
        if !self.drive.api_base_url.starts_with("http://")
            && !self.drive.api_base_url.starts_with("https://")
        {
            errors.push(ValidationError {
                field: "drive.api_base_url".into(),
                message: "must be an http(s) URL".into(),
            });
        }

        // --- auth ---
        if self.auth.client_id.as_deref().is_some_and(|s| s.trim().is_empty()) {
            errors.push(ValidationError {
                field: "auth.client_id".into(),
                message: "must not be empty when set".into(),
            });
        }

        // --- index ---
        if self.index.database_path.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "index.database_path".into(),
                message: "must not be empty".into(),
            });
        }

        // --- sync ---
        if self.sync.handler_timeout_secs == 0 {
            errors.push(ValidationError {
                field: "sync.handler_timeout_secs".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.sync.event_buffer == 0 {
            errors.push(ValidationError {
                field: "sync.event_buffer".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }
        if !VALID_LOG_FORMATS.contains(&self.logging.format.as_str()) {
            errors.push(ValidationError {
                field: "logging.format".into(),
                message: format!(
                    "invalid format '{}'; valid options: {}",
                    self.logging.format,
                    VALID_LOG_FORMATS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use shotwatch_core::config::ConfigBuilder;
/// use std::path::PathBuf;
///
/// let config = ConfigBuilder::new()
///     .watch_directory(PathBuf::from("/home/user/Pictures/Screenshots"))
///     .operator_email("ops@example.com")
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- watch ---

    pub fn watch_directory(mut self, directory: PathBuf) -> Self {
        self.config.watch.directory = Some(directory);
        self
    }

    pub fn operator_email(mut self, email: impl Into<String>) -> Self {
        self.config.watch.operator_email = Some(email.into());
        self
    }

    // --- drive ---

    pub fn drive_root_folder_name(mut self, name: impl Into<String>) -> Self {
        self.config.drive.root_folder_name = name.into();
        self
    }

    pub fn drive_daily_folder_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.drive.daily_folder_prefix = prefix.into();
        self
    }

    pub fn drive_upload_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.config.drive.upload_mime_type = mime_type.into();
        self
    }

    pub fn drive_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.drive.api_base_url = url.into();
        self
    }

    // --- auth ---

    pub fn auth_client(mut self, id: impl Into<String>, secret: impl Into<String>) -> Self {
        self.config.auth.client_id = Some(id.into());
        self.config.auth.client_secret = Some(secret.into());
        self
    }

    // --- index ---

    pub fn index_database_path(mut self, path: PathBuf) -> Self {
        self.config.index.database_path = path;
        self
    }

    // --- sync ---

    pub fn sync_handler_timeout_secs(mut self, seconds: u64) -> Self {
        self.config.sync.handler_timeout_secs = seconds;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_format(mut self, format: impl Into<String>) -> Self {
        self.config.logging.format = format.into();
        self
    }

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
