//! Command-line interface for the `shield` binary.

pub mod commands;

use crate::constants::{APP_DESCRIPTION, APP_NAME, LOG_FORMAT_JSON, LOG_FORMAT_TEXT};
use clap::{Parser, Subcommand};

/// Session-idle detection and encrypted local persistence for NIS2 audit logging
#[derive(Parser, Debug)]
#[command(name = APP_NAME, about = APP_DESCRIPTION, author, version, long_about = None)]
pub struct CliArgs {
    /// Print verbose output
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Log output format
    #[arg(long, global = true, default_value = LOG_FORMAT_TEXT, value_parser = [LOG_FORMAT_TEXT, LOG_FORMAT_JSON])]
    pub log_format: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Encrypt text under a fresh key and print the payload JSON
    Seal {
        /// Text to encrypt
        text: String,
    },

    /// Store an encrypted value and read it back
    Store {
        /// Storage key
        #[arg(long)]
        key: String,
        /// Value to store
        #[arg(long)]
        value: String,
        /// Use session-scoped (in-memory) storage instead of the persistent file
        #[arg(long)]
        session: bool,
    },

    /// Read a value from persistent storage
    Recall {
        /// Storage key
        #[arg(long)]
        key: String,
    },

    /// Track idle/active state from signals read on stdin, one per line
    Guard {
        /// Override the configured idle timeout
        #[arg(long)]
        timeout_minutes: Option<u64>,
    },
}

impl CliArgs {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        CliArgs::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_command() {
        let args = CliArgs::parse_from(["shield", "seal", "hello"]);
        assert_eq!(
            args.command,
            Command::Seal {
                text: "hello".to_string()
            }
        );
        assert!(!args.verbose);
        assert_eq!(args.log_format, LOG_FORMAT_TEXT);
    }

    #[test]
    fn test_store_command_with_session_flag() {
        let args = CliArgs::parse_from([
            "shield", "store", "--key", "draft", "--value", "hi", "--session",
        ]);
        assert_eq!(
            args.command,
            Command::Store {
                key: "draft".to_string(),
                value: "hi".to_string(),
                session: true,
            }
        );
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = CliArgs::parse_from(["shield", "guard", "-v", "--log-format", "json"]);
        assert!(args.verbose);
        assert_eq!(args.log_format, LOG_FORMAT_JSON);
        assert_eq!(
            args.command,
            Command::Guard {
                timeout_minutes: None
            }
        );
    }

    #[test]
    fn test_guard_timeout_override() {
        let args = CliArgs::parse_from(["shield", "guard", "--timeout-minutes", "2"]);
        assert_eq!(
            args.command,
            Command::Guard {
                timeout_minutes: Some(2)
            }
        );
    }

    #[test]
    fn test_invalid_log_format_is_rejected() {
        let result = CliArgs::try_parse_from(["shield", "--log-format", "xml", "seal", "x"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_subcommand_is_required() {
        assert!(CliArgs::try_parse_from(["shield"]).is_err());
    }
}
