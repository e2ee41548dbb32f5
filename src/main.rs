//! Desk Bank server
//!
//! Serves banking sessions over TCP with a fixed pool of desks.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin desk-bank
//! cargo run --bin desk-bank -- --listen 0.0.0.0:7878 --ledger-file /var/lib/bank/accounts
//! cargo run --bin desk-bank -- --queue-capacity 20 --monitor-timeout-ms 500 --export-csv accounts.csv
//! ```
//!
//! The ledger file is loaded at startup (missing file: every account starts at
//! zero) and rewritten at shutdown. Log verbosity follows `RUST_LOG`.
//!
//! # Operator Console
//!
//! Standard input is the operator console: `l` prints each desk's running
//! delta and their sum, `q` shuts the server down. Ctrl-C does the same as `q`.
//!
//! # Exit Codes
//!
//! - 0: Clean shutdown, ledger persisted
//! - 1: Startup failure (unreadable or corrupt ledger, address in use, ...) or
//!   the ledger could not be persisted

use desk_bank::cli;
use desk_bank::core::run_console;
use desk_bank::io::transport::TcpTransport;
use desk_bank::types::LEDGER_CAPACITY;
use desk_bank::{load_ledger, BankError, RunningServer, Server};
use std::io;
use std::process;
use std::sync::Arc;
use std::thread;
use tokio::sync::Notify;
use tracing::{error, info, warn};

fn main() {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = cli::parse_args();

    let server = match start(&args) {
        Ok(server) => server,
        Err(e) => {
            error!(error = %e, "startup failed");
            process::exit(1);
        }
    };

    let shutdown = Arc::new(Notify::new());
    spawn_console(&server, Arc::clone(&shutdown));
    if let Err(e) = wait_for_shutdown(&shutdown) {
        error!(error = %e, "cannot wait for shutdown, stopping now");
    }

    match server.shutdown() {
        Ok(report) => info!(
            discarded_sessions = report.discarded_sessions,
            ledger_total = report.ledger_total,
            "server stopped"
        ),
        Err(e) => {
            error!(error = %e, "server stopped without persisting the ledger");
            process::exit(1);
        }
    }
}

fn start(args: &cli::CliArgs) -> Result<RunningServer, BankError> {
    let ledger = load_ledger(&args.ledger_file, LEDGER_CAPACITY)?;
    let transport = TcpTransport::bind(args.listen.as_str())?;
    info!(addr = %transport.local_addr()?, "listening");
    let connector = transport.connector();

    Server::start(
        args.to_server_config(),
        Arc::new(ledger),
        Box::new(transport),
        Arc::new(connector),
    )
}

/// Run the operator console on stdin in its own thread
fn spawn_console(server: &RunningServer, shutdown: Arc<Notify>) {
    let monitor = server.monitor();
    let spawned = thread::Builder::new()
        .name("operator".to_string())
        .spawn(move || {
            let stdin = io::stdin();
            if let Err(e) = run_console(&monitor, stdin.lock(), io::stdout(), || shutdown.notify_one()) {
                warn!(error = %e, "operator console closed");
            }
        });
    if let Err(e) = spawned {
        warn!(error = %e, "operator console unavailable");
    }
}

/// Block until Ctrl-C or an operator `q`
fn wait_for_shutdown(shutdown: &Notify) -> io::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => match signal {
                Ok(()) => info!("interrupt received"),
                Err(e) => {
                    warn!(error = %e, "cannot listen for interrupts, waiting for operator 'q'");
                    shutdown.notified().await;
                    info!("operator requested shutdown");
                }
            },
            _ = shutdown.notified() => info!("operator requested shutdown"),
        }
    });
    Ok(())
}
