//! Error handling utilities for nis2-shield.
//!
//! This module provides the central error type `AppError` which represents all
//! possible error conditions that might occur in the toolkit, as well as the
//! convenience type alias `AppResult` for functions that can return these errors.
//!
//! A failed decryption is not an error. It is reported as "no value", which is
//! also what a value sealed under a previous key reads as.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Represents specific error cases that can occur during cryptographic operations.
///
/// # Examples
///
/// ```
/// use nis2_shield::errors::CryptoError;
///
/// let error = CryptoError::KeyUnavailable("no entropy source".to_string());
/// let message = format!("{}", error);
/// assert!(message.contains("key"));
/// assert!(message.contains("no entropy source"));
/// ```
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The platform could not produce a key (randomness source unavailable).
    #[error("Encryption key could not be created: {0}. Encrypted storage is unavailable; fall back to in-memory defaults.")]
    KeyUnavailable(String),

    /// Error during encryption operation.
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// A payload that could not be decoded from its textual form.
    #[error("Invalid encrypted payload: {0}")]
    InvalidPayload(String),
}

/// Represents specific error cases that can occur when talking to a key-value store.
///
/// # Examples
///
/// ```
/// use nis2_shield::errors::StorageError;
/// use std::path::PathBuf;
///
/// let error = StorageError::Corrupted {
///     path: PathBuf::from("/tmp/storage.json"),
///     message: "expected an object".to_string(),
/// };
/// assert!(format!("{}", error).contains("storage.json"));
/// ```
#[derive(Debug, Error)]
pub enum StorageError {
    /// Failed to read or write the backing file.
    #[error("Storage I/O failed for {path}: {source}")]
    Io {
        /// The path of the backing file
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Failed to acquire the exclusive lock on the backing file.
    #[error("Failed to lock storage file {path}: {source}. Another process may be writing to it.")]
    Lock {
        /// The path of the backing file
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The backing file does not contain a JSON object of strings.
    #[error("Storage file {path} is corrupted: {message}")]
    Corrupted {
        /// The path of the backing file
        path: PathBuf,
        /// What was wrong with the content
        message: String,
    },

    /// A value could not be serialized for storage.
    #[error("Failed to serialize value for storage: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The blocking task running a backend call panicked or was cancelled.
    #[error("Storage task failed: {0}")]
    Background(String),
}

/// Represents failures while delivering telemetry.
///
/// These never escape the telemetry sink; they exist so the sink can log a
/// precise reason in debug mode.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The endpoint could not be reached.
    #[error("Telemetry endpoint unreachable: {0}")]
    Transport(#[source] reqwest::Error),

    /// The endpoint answered with a non-success status.
    #[error("Telemetry endpoint returned HTTP {0}")]
    Status(u16),
}

/// Errors raised by the session guardian lifecycle.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GuardianError {
    /// `start` was called on a guardian that is already running.
    #[error("Session guardian is already running")]
    AlreadyRunning,

    /// The guardian must be started from inside a tokio runtime.
    #[error("Session guardian requires a tokio runtime: {0}")]
    NoRuntime(String),
}

/// Represents all possible errors that can occur in nis2-shield.
///
/// This enum is the central error type used across the crate, with variants
/// for different error categories. It uses `thiserror` for deriving the `Error` trait
/// implementation and formatted error messages.
///
/// # Examples
///
/// Creating a configuration error:
/// ```
/// use nis2_shield::errors::AppError;
///
/// let error = AppError::Config("Idle timeout must be positive".to_string());
/// assert_eq!(format!("{}", error), "Configuration error: Idle timeout must be positive");
/// ```
#[derive(Debug, Error)]
pub enum AppError {
    /// Errors related to configuration loading or validation.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Input/output errors outside of the storage backends.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors related to cryptographic operations.
    #[error("Cryptographic error: {0}")]
    Crypto(#[from] CryptoError),

    /// Errors related to storage backends.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Errors related to telemetry delivery.
    #[error("Telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),

    /// Errors related to the session guardian lifecycle.
    #[error("Session guardian error: {0}")]
    Guardian(#[from] GuardianError),
}

/// A type alias for `Result<T, AppError>` to simplify function signatures.
///
/// # Examples
///
/// ```
/// use nis2_shield::errors::{AppError, AppResult};
///
/// fn might_fail() -> AppResult<String> {
///     if false {
///         return Err(AppError::Config("Something went wrong".to_string()));
///     }
///     Ok("Operation succeeded".to_string())
/// }
/// ```
pub type AppResult<T> = Result<T, AppError>;
