use crate::server::ServerConfig;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Default address the TCP transport listens on
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:7878";

/// Default ledger file, relative to the working directory
pub const DEFAULT_LEDGER_FILE: &str = "accounts";

/// Run the desk bank server
#[derive(Parser, Debug)]
#[command(name = "desk-bank")]
#[command(about = "Concurrent banking server with a fixed pool of desks", long_about = None)]
pub struct CliArgs {
    /// Address the server accepts clients on
    #[arg(
        long = "listen",
        value_name = "ADDR",
        default_value = DEFAULT_LISTEN_ADDR,
        help = "Address to accept client connections on"
    )]
    pub listen: String,

    /// Ledger file loaded at startup and rewritten at shutdown
    #[arg(
        long = "ledger-file",
        value_name = "PATH",
        default_value = DEFAULT_LEDGER_FILE,
        help = "Binary ledger file (missing file starts every account at zero)"
    )]
    pub ledger_file: PathBuf,

    /// Sessions each desk queue holds
    #[arg(
        long = "queue-capacity",
        value_name = "COUNT",
        help = "Sessions queued per desk before clients are turned away (default: 100)"
    )]
    pub queue_capacity: Option<usize>,

    /// Dispatcher wait per loop iteration, in milliseconds
    #[arg(
        long = "dispatch-backoff-ms",
        value_name = "MS",
        help = "Dispatcher wait for new connections per iteration (default: 1)"
    )]
    pub dispatch_backoff_ms: Option<u64>,

    /// Idle desk wait between safe-point checks, in milliseconds
    #[arg(
        long = "idle-wait-ms",
        value_name = "MS",
        help = "How long an idle desk waits before re-checking for queries and shutdown (default: 50)"
    )]
    pub idle_wait_ms: Option<u64>,

    /// Upper bound on a balance query, in milliseconds
    #[arg(
        long = "monitor-timeout-ms",
        value_name = "MS",
        help = "Give up on desks that do not answer a balance query in time (default: wait)"
    )]
    pub monitor_timeout_ms: Option<u64>,

    /// CSV export written at shutdown
    #[arg(
        long = "export-csv",
        value_name = "PATH",
        help = "Also write non-zero balances as CSV at shutdown"
    )]
    pub export_csv: Option<PathBuf>,
}

impl CliArgs {
    /// Create a ServerConfig from CLI arguments
    ///
    /// Values not given on the command line use the defaults; zero values are
    /// replaced by the defaults with a warning.
    ///
    /// # Returns
    ///
    /// A `ServerConfig` persisting to `--ledger-file`.
    pub fn to_server_config(&self) -> ServerConfig {
        let default = ServerConfig::default();
        let config = if self.queue_capacity.is_some()
            || self.dispatch_backoff_ms.is_some()
            || self.idle_wait_ms.is_some()
        {
            ServerConfig::new(
                self.queue_capacity.unwrap_or(default.queue_capacity),
                self.dispatch_backoff_ms
                    .map(Duration::from_millis)
                    .unwrap_or(default.dispatch_backoff),
                self.idle_wait_ms
                    .map(Duration::from_millis)
                    .unwrap_or(default.idle_wait),
            )
        } else {
            default
        };

        config
            .with_monitor_timeout(self.monitor_timeout_ms.map(Duration::from_millis))
            .with_persistence(Some(self.ledger_file.clone()), self.export_csv.clone())
    }
}
