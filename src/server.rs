//! Server assembly
//!
//! Builds the queues, desks, dispatcher, monitor and shutdown barrier around
//! one shared [`Ledger`] and starts every thread. The transport is supplied by
//! the caller, so the same wiring runs over TCP in the binary and over the
//! in-memory transport in tests.

use crate::core::desk::DeskLinks;
use crate::core::dispatcher::DEFAULT_DISPATCH_BACKOFF;
use crate::core::{
    Control, Desk, Dispatcher, Ledger, Monitor, PersistTargets, ShutdownCoordinator,
    ShutdownReport, WorkerQueue, DEFAULT_QUEUE_CAPACITY, DESK_COUNT,
};
use crate::io::{AnnouncementSource, Connector};
use crate::types::BankError;
use crossbeam::channel;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Default bound on how long an idle desk waits before re-checking its safe point
pub const DEFAULT_IDLE_WAIT: Duration = Duration::from_millis(50);

/// Runtime settings for one server
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    /// Sessions each desk queue holds before the dispatcher turns clients away
    pub queue_capacity: usize,
    /// Dispatcher wait on the announcement source per iteration
    pub dispatch_backoff: Duration,
    /// Idle desk wait between safe-point checks
    pub idle_wait: Duration,
    /// How long a balance query waits for each desk; `None` waits forever
    pub monitor_timeout: Option<Duration>,
    /// Ledger file written at shutdown
    pub ledger_file: Option<PathBuf>,
    /// CSV export written at shutdown
    pub csv_export: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            dispatch_backoff: DEFAULT_DISPATCH_BACKOFF,
            idle_wait: DEFAULT_IDLE_WAIT,
            monitor_timeout: None,
            ledger_file: None,
            csv_export: None,
        }
    }
}

impl ServerConfig {
    /// Create a ServerConfig with custom tuning values
    ///
    /// Zero values fall back to the defaults with a warning.
    pub fn new(queue_capacity: usize, dispatch_backoff: Duration, idle_wait: Duration) -> Self {
        let default = Self::default();

        let queue_capacity = if queue_capacity == 0 {
            warn!(
                "Invalid queue_capacity ({}), using default ({})",
                queue_capacity, default.queue_capacity
            );
            default.queue_capacity
        } else {
            queue_capacity
        };

        let dispatch_backoff = if dispatch_backoff.is_zero() {
            warn!(
                "Invalid dispatch_backoff (0ms), using default ({}ms)",
                default.dispatch_backoff.as_millis()
            );
            default.dispatch_backoff
        } else {
            dispatch_backoff
        };

        let idle_wait = if idle_wait.is_zero() {
            warn!(
                "Invalid idle_wait (0ms), using default ({}ms)",
                default.idle_wait.as_millis()
            );
            default.idle_wait
        } else {
            idle_wait
        };

        Self {
            queue_capacity,
            dispatch_backoff,
            idle_wait,
            ..default
        }
    }

    /// Bound every balance query; a zero timeout is ignored
    pub fn with_monitor_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.monitor_timeout = match timeout {
            Some(timeout) if timeout.is_zero() => {
                warn!("Invalid monitor_timeout (0ms), balance queries will wait for every desk");
                None
            }
            other => other,
        };
        self
    }

    /// Where the ledger goes at shutdown
    pub fn with_persistence(mut self, ledger_file: Option<PathBuf>, csv_export: Option<PathBuf>) -> Self {
        self.ledger_file = ledger_file;
        self.csv_export = csv_export;
        self
    }
}

/// Entry point for starting a server
#[derive(Debug)]
pub struct Server;

impl Server {
    /// Start `DESK_COUNT` desks and the dispatcher
    ///
    /// # Arguments
    ///
    /// * `config` - Tuning and persistence settings
    /// * `ledger` - The ledger every desk works on
    /// * `source` - Announcements of new clients, consumed by the dispatcher
    /// * `connector` - Opens the channel behind each announcement
    ///
    /// # Errors
    ///
    /// Returns `Io` if a thread cannot be spawned. Threads already started are
    /// told to stop before the error is returned.
    pub fn start(
        config: ServerConfig,
        ledger: Arc<Ledger>,
        source: Box<dyn AnnouncementSource>,
        connector: Arc<dyn Connector>,
    ) -> Result<RunningServer, BankError> {
        let control = Arc::new(Control::new());
        let queues: Vec<_> = (0..DESK_COUNT)
            .map(|index| Arc::new(WorkerQueue::new(index, config.queue_capacity)))
            .collect();

        let abort = |e: std::io::Error| {
            for queue in &queues {
                queue.close();
            }
            control.request_shutdown();
            BankError::from(e)
        };

        let mut reports = Vec::with_capacity(DESK_COUNT);
        let mut acks = Vec::with_capacity(DESK_COUNT);
        let mut desks = Vec::with_capacity(DESK_COUNT);
        for queue in &queues {
            let (report_tx, report_rx) = channel::unbounded();
            let (ack_tx, ack_rx) = channel::bounded(1);
            reports.push(report_rx);
            acks.push(ack_rx);

            let desk = Desk::new(
                Arc::clone(queue),
                Arc::clone(&ledger),
                Arc::clone(&control),
                Arc::clone(&connector),
                DeskLinks {
                    reports: report_tx,
                    acks: ack_tx,
                },
                config.idle_wait,
            );
            desks.push(desk.spawn().map_err(abort)?);
        }

        let dispatcher = Dispatcher::new(
            source,
            queues.clone(),
            Arc::clone(&connector),
            Arc::clone(&control),
            config.dispatch_backoff,
        )
        .spawn()
        .map_err(abort)?;

        let monitor = Arc::new(Monitor::new(
            Arc::clone(&control),
            queues.clone(),
            reports,
            config.monitor_timeout,
        ));

        info!(
            desks = DESK_COUNT,
            queue_capacity = config.queue_capacity,
            accounts = ledger.capacity(),
            "server started"
        );

        Ok(RunningServer {
            monitor,
            ledger: Arc::clone(&ledger),
            shutdown: ShutdownCoordinator {
                control,
                queues,
                acks,
                desks,
                dispatcher,
                connector,
                ledger,
                targets: PersistTargets {
                    ledger_file: config.ledger_file,
                    csv_export: config.csv_export,
                },
            },
        })
    }
}

/// Handle to a started server
#[derive(Debug)]
pub struct RunningServer {
    monitor: Arc<Monitor>,
    ledger: Arc<Ledger>,
    shutdown: ShutdownCoordinator,
}

impl RunningServer {
    /// The balance monitor, shareable with an operator console thread
    pub fn monitor(&self) -> Arc<Monitor> {
        Arc::clone(&self.monitor)
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    /// Drain every desk and persist the ledger
    pub fn shutdown(self) -> Result<ShutdownReport, BankError> {
        self.shutdown.run()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.queue_capacity, 100);
        assert_eq!(config.dispatch_backoff, Duration::from_millis(1));
        assert_eq!(config.idle_wait, Duration::from_millis(50));
        assert_eq!(config.monitor_timeout, None);
        assert_eq!(config.ledger_file, None);
    }

    #[rstest]
    #[case::zero_capacity(0, 1, 50, 100, 1, 50)]
    #[case::zero_backoff(10, 0, 50, 10, 1, 50)]
    #[case::zero_idle_wait(10, 5, 0, 10, 5, 50)]
    #[case::all_custom(10, 5, 20, 10, 5, 20)]
    fn test_config_zero_values_fall_back(
        #[case] capacity: usize,
        #[case] backoff_ms: u64,
        #[case] idle_ms: u64,
        #[case] expected_capacity: usize,
        #[case] expected_backoff_ms: u64,
        #[case] expected_idle_ms: u64,
    ) {
        let config = ServerConfig::new(
            capacity,
            Duration::from_millis(backoff_ms),
            Duration::from_millis(idle_ms),
        );

        assert_eq!(config.queue_capacity, expected_capacity);
        assert_eq!(config.dispatch_backoff, Duration::from_millis(expected_backoff_ms));
        assert_eq!(config.idle_wait, Duration::from_millis(expected_idle_ms));
    }

    #[rstest]
    #[case::unset(None, None)]
    #[case::zero(Some(Duration::ZERO), None)]
    #[case::bounded(Some(Duration::from_millis(200)), Some(Duration::from_millis(200)))]
    fn test_monitor_timeout(#[case] timeout: Option<Duration>, #[case] expected: Option<Duration>) {
        let config = ServerConfig::default().with_monitor_timeout(timeout);
        assert_eq!(config.monitor_timeout, expected);
    }
}
