/*!
# shield

Command-line front end for nis2-shield. It exercises the encrypted storage and
the session guardian outside of a host application.

## Usage

```text
shield [OPTIONS] <COMMAND>

Commands:
  seal    Encrypt text under a fresh key and print the payload JSON
  store   Store an encrypted value and read it back
  recall  Read a value from persistent storage
  guard   Track idle/active state from signals read on stdin, one per line

Options:
  -v, --verbose                  Print verbose output
      --log-format <LOG_FORMAT>  Log output format [default: text] [possible values: text, json]
  -h, --help                     Print help
  -V, --version                  Print version
```

## Configuration

See [`nis2_shield::config`] for the `SHIELD_*` environment variables.
*/

use nis2_shield::cli::{commands, CliArgs, Command};
use nis2_shield::config::Config;
use nis2_shield::constants::{TRACING_ROOT_SPAN_NAME, TRACING_SERVICE_NAME};
use nis2_shield::errors::AppResult;
use nis2_shield::logging;
use tokio::io::BufReader;
use tracing::{debug, error, info, info_span, Instrument};
use uuid::Uuid;

/// The main entry point for the shield binary.
///
/// 1. Parses command-line arguments
/// 2. Initializes logging
/// 3. Loads and validates configuration
/// 4. Runs the requested command inside a root span carrying a correlation id
#[tokio::main]
async fn main() {
    let args = CliArgs::parse_args();

    if let Err(e) = logging::init(&args.log_format, args.verbose) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    let correlation_id = Uuid::new_v4();
    let span = info_span!(
        TRACING_ROOT_SPAN_NAME,
        service = TRACING_SERVICE_NAME,
        correlation_id = %correlation_id
    );

    if let Err(e) = run(args).instrument(span).await {
        error!("{}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(args: CliArgs) -> AppResult<()> {
    // Command arguments may carry the plaintext being stored; keep them out of the logs.
    debug!(verbose = args.verbose, log_format = %args.log_format, "CLI arguments parsed");

    info!("Loading configuration");
    let config = Config::load()?;
    debug!("Configuration: {:?}", config);

    match args.command {
        Command::Seal { text } => commands::seal(&text).await,
        Command::Store {
            key,
            value,
            session,
        } => commands::store(&config, &key, &value, session).await,
        Command::Recall { key } => commands::recall(&config, &key).await,
        Command::Guard { timeout_minutes } => {
            let stdin = BufReader::new(tokio::io::stdin());
            commands::guard(&config, timeout_minutes, stdin).await
        }
    }
}
