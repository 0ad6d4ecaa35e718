//! Constants used throughout the toolkit.
//!
//! This module contains all constants used in nis2-shield, organized into
//! logical groups. Having constants centralized makes them easier to find,
//! modify, and reference consistently.

// Application Metadata
/// The name of the application.
pub const APP_NAME: &str = "shield";
/// The description of the application used in CLI help text.
pub const APP_DESCRIPTION: &str =
    "Session-idle detection and encrypted local persistence for NIS2 audit logging";

// CLI Arguments & Defaults
/// Log format identifier for plain text.
pub const LOG_FORMAT_TEXT: &str = "text";
/// Log format identifier for JSON.
pub const LOG_FORMAT_JSON: &str = "json";
/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

// Configuration Keys & Environment Variables
/// Environment variable for the idle timeout in minutes.
pub const ENV_VAR_IDLE_TIMEOUT_MINUTES: &str = "SHIELD_IDLE_TIMEOUT_MINUTES";
/// Environment variable for the activity debounce window in milliseconds.
pub const ENV_VAR_DEBOUNCE_MS: &str = "SHIELD_DEBOUNCE_MS";
/// Environment variable enabling debug logging of swallowed failures.
pub const ENV_VAR_DEBUG: &str = "SHIELD_DEBUG";
/// Environment variable for the telemetry endpoint URL.
pub const ENV_VAR_TELEMETRY_URL: &str = "SHIELD_TELEMETRY_URL";
/// Environment variable for the URL reported with every telemetry event.
pub const ENV_VAR_PAGE_URL: &str = "SHIELD_PAGE_URL";
/// Environment variable for the persistent storage file.
pub const ENV_VAR_STORAGE_PATH: &str = "SHIELD_STORAGE_PATH";
/// Standard environment variable for the user's home directory.
pub const ENV_VAR_HOME: &str = "HOME";
/// Default persistent storage file, relative to the home directory.
pub const DEFAULT_STORAGE_SUBPATH: &str = ".local/share/nis2-shield/storage.json";
/// Default URL reported with telemetry events when none is configured.
pub const DEFAULT_PAGE_URL: &str = "app://local";
/// Placeholder string for redacted information in debug output.
pub const REDACTED_PLACEHOLDER: &str = "[REDACTED]";

// Session Guardian
/// Default idle timeout in minutes.
pub const DEFAULT_IDLE_TIMEOUT_MINUTES: u64 = 15;
/// Upper bound accepted for the idle timeout (24 hours).
pub const MAX_IDLE_TIMEOUT_MINUTES: u64 = 24 * 60;
/// Default activity debounce window in milliseconds.
pub const DEFAULT_DEBOUNCE_MS: u64 = 1_000;

// Cryptography
/// AES-GCM initialization vector length in bytes (96 bits).
pub const IV_LEN: usize = 12;
/// AES-256 key length in bytes.
pub const KEY_LEN: usize = 32;
/// AES-GCM authentication tag length in bytes.
pub const TAG_LEN: usize = 16;

// Telemetry Event Types
/// Incident type used for crash reports.
pub const EVENT_UI_CRASH: &str = "CRITICAL_UI_CRASH";
/// Event type emitted when a session becomes idle.
pub const EVENT_SESSION_IDLE: &str = "SESSION_IDLE";
/// Event type emitted when an idle session becomes active again.
pub const EVENT_SESSION_ACTIVE: &str = "SESSION_ACTIVE";
/// Event type emitted when a stored value could not be decrypted.
pub const EVENT_STORAGE_RESET: &str = "SECURE_STORAGE_RESET";

// Filesystem
/// Default POSIX permissions for the persistent storage file (owner read/write).
#[cfg(unix)]
pub const DEFAULT_FILE_PERMISSIONS: u32 = 0o600;
/// Default POSIX permissions for its parent directory (owner read/write/execute).
#[cfg(unix)]
pub const DEFAULT_DIR_PERMISSIONS: u32 = 0o700;

// Logging Configuration
/// Service name used in tracing spans and structured logs.
pub const TRACING_SERVICE_NAME: &str = "nis2-shield";
/// Name for the root tracing span covering an application invocation.
pub const TRACING_ROOT_SPAN_NAME: &str = "app_invocation";
