//! Configuration management for nis2-shield.
//!
//! This module handles loading and validating configuration settings from environment
//! variables, with sensible defaults.
//!
//! # Environment Variables
//!
//! - `SHIELD_IDLE_TIMEOUT_MINUTES`: Minutes of inactivity before a session goes idle (defaults to 15)
//! - `SHIELD_DEBOUNCE_MS`: Activity debounce window in milliseconds (defaults to 1000)
//! - `SHIELD_DEBUG`: Log swallowed telemetry and decryption failures (`1`, `true`, `yes`)
//! - `SHIELD_TELEMETRY_URL`: Endpoint receiving audit events; telemetry is disabled when unset
//! - `SHIELD_PAGE_URL`: URL reported with every telemetry event (defaults to `app://local`)
//! - `SHIELD_STORAGE_PATH`: Persistent storage file (defaults to ~/.local/share/nis2-shield/storage.json)
//! - `HOME`: Used for expanding the default storage path

use crate::constants::{
    DEFAULT_DEBOUNCE_MS, DEFAULT_IDLE_TIMEOUT_MINUTES, DEFAULT_PAGE_URL, DEFAULT_STORAGE_SUBPATH,
    ENV_VAR_DEBOUNCE_MS, ENV_VAR_DEBUG, ENV_VAR_HOME, ENV_VAR_IDLE_TIMEOUT_MINUTES,
    ENV_VAR_PAGE_URL, ENV_VAR_STORAGE_PATH, ENV_VAR_TELEMETRY_URL, MAX_IDLE_TIMEOUT_MINUTES,
    REDACTED_PLACEHOLDER,
};
use crate::errors::{AppError, AppResult};
use crate::session::GuardianSettings;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for nis2-shield.
///
/// # Examples
///
/// Starting from the defaults and overriding a field:
/// ```
/// use nis2_shield::Config;
///
/// let config = Config {
///     idle_timeout_minutes: 5,
///     ..Config::default()
/// };
/// assert!(config.validate().is_ok());
/// assert_eq!(config.idle_timeout().as_secs(), 300);
/// ```
#[derive(Clone)]
pub struct Config {
    /// Minutes without qualifying activity before the session is considered idle.
    pub idle_timeout_minutes: u64,

    /// Window in milliseconds during which repeated activity signals are coalesced.
    pub debounce_ms: u64,

    /// When set, swallowed failures (telemetry transport, decryption) are logged.
    pub debug: bool,

    /// Endpoint receiving telemetry events. `None` disables delivery.
    pub telemetry_endpoint: Option<String>,

    /// URL reported as the origin of every telemetry event.
    pub page_url: String,

    /// Backing file of the persistent-scoped storage.
    pub storage_path: PathBuf,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("idle_timeout_minutes", &self.idle_timeout_minutes)
            .field("debounce_ms", &self.debounce_ms)
            .field("debug", &self.debug)
            .field(
                "telemetry_endpoint",
                &self.telemetry_endpoint.as_ref().map(|_| REDACTED_PLACEHOLDER),
            )
            .field("page_url", &self.page_url)
            .field("storage_path", &REDACTED_PLACEHOLDER)
            .finish()
    }
}

impl Default for Config {
    /// Creates a new Config with default values.
    fn default() -> Self {
        Config {
            idle_timeout_minutes: DEFAULT_IDLE_TIMEOUT_MINUTES,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            debug: false,
            telemetry_endpoint: None,
            page_url: DEFAULT_PAGE_URL.to_string(),
            storage_path: PathBuf::from(""),
        }
    }
}

impl Config {
    /// Parses a boolean flag the way shells usually spell them.
    fn parse_flag(raw: &str) -> bool {
        matches!(
            raw.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    }

    /// Reads an unsigned integer variable, falling back to `default` when unset.
    fn read_u64(var: &str, default: u64) -> AppResult<u64> {
        match env::var(var) {
            Ok(raw) => raw.trim().parse::<u64>().map_err(|e| {
                AppError::Config(format!("{} must be a non-negative integer: {}", var, e))
            }),
            Err(_) => Ok(default),
        }
    }

    /// Loads configuration from environment variables with sensible defaults.
    ///
    /// The storage path is expanded using `shellexpand` to handle `~` and
    /// environment variable references. The result is validated before it is returned.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if:
    /// - A numeric variable is not a non-negative integer
    /// - The storage path expansion fails or yields an empty path
    /// - The resulting configuration fails [`Config::validate`]
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use nis2_shield::Config;
    ///
    /// match Config::load() {
    ///     Ok(config) => println!("Idle timeout: {} minutes", config.idle_timeout_minutes),
    ///     Err(err) => eprintln!("Failed to load config: {}", err),
    /// }
    /// ```
    pub fn load() -> AppResult<Self> {
        let idle_timeout_minutes =
            Self::read_u64(ENV_VAR_IDLE_TIMEOUT_MINUTES, DEFAULT_IDLE_TIMEOUT_MINUTES)?;
        let debounce_ms = Self::read_u64(ENV_VAR_DEBOUNCE_MS, DEFAULT_DEBOUNCE_MS)?;
        let debug = env::var(ENV_VAR_DEBUG)
            .map(|raw| Self::parse_flag(&raw))
            .unwrap_or(false);

        let telemetry_endpoint = env::var(ENV_VAR_TELEMETRY_URL)
            .ok()
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty());

        let page_url = env::var(ENV_VAR_PAGE_URL).unwrap_or_else(|_| DEFAULT_PAGE_URL.to_string());

        let storage_path_str = env::var(ENV_VAR_STORAGE_PATH).unwrap_or_else(|_| {
            let home = env::var(ENV_VAR_HOME).unwrap_or_else(|_| "".to_string());
            format!("{}/{}", home, DEFAULT_STORAGE_SUBPATH)
        });

        let expanded_path = shellexpand::full(&storage_path_str)
            .map_err(|e| AppError::Config(format!("Failed to expand path: {}", e)))?;

        let storage_path = PathBuf::from(expanded_path.into_owned());
        if storage_path.as_os_str().is_empty() {
            return Err(AppError::Config("Storage path is empty".to_string()));
        }

        let config = Config {
            idle_timeout_minutes,
            debounce_ms,
            debug,
            telemetry_endpoint,
            page_url,
            storage_path,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` when:
    /// - The idle timeout is zero or longer than 24 hours
    /// - The debounce window is not shorter than the idle timeout
    /// - The telemetry endpoint is not an `http` or `https` URL
    ///
    /// # Examples
    ///
    /// ```
    /// use nis2_shield::Config;
    ///
    /// let invalid = Config {
    ///     idle_timeout_minutes: 0,
    ///     ..Config::default()
    /// };
    /// assert!(invalid.validate().is_err());
    /// ```
    pub fn validate(&self) -> AppResult<()> {
        if self.idle_timeout_minutes == 0 {
            return Err(AppError::Config(
                "Idle timeout must be at least one minute".to_string(),
            ));
        }

        if self.idle_timeout_minutes > MAX_IDLE_TIMEOUT_MINUTES {
            return Err(AppError::Config(format!(
                "Idle timeout cannot exceed {} minutes",
                MAX_IDLE_TIMEOUT_MINUTES
            )));
        }

        if self.debounce() >= self.idle_timeout() {
            return Err(AppError::Config(
                "Debounce window must be shorter than the idle timeout".to_string(),
            ));
        }

        if let Some(endpoint) = &self.telemetry_endpoint {
            if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
                return Err(AppError::Config(
                    "Telemetry endpoint must be an http:// or https:// URL".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Returns a copy with the idle timeout replaced, validated like [`Config::load`].
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the result fails [`Config::validate`].
    pub fn with_idle_timeout_minutes(&self, minutes: u64) -> AppResult<Self> {
        let config = Config {
            idle_timeout_minutes: minutes,
            ..self.clone()
        };
        config.validate()?;
        Ok(config)
    }

    /// The idle timeout as a `Duration`.
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_minutes.saturating_mul(60))
    }

    /// The debounce window as a `Duration`.
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Settings for a [`crate::session::SessionGuardian`] built from this configuration.
    pub fn guardian_settings(&self) -> GuardianSettings {
        GuardianSettings {
            timeout: self.idle_timeout(),
            debounce: self.debounce(),
        }
    }
}
