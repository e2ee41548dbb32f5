//! Shutdown barrier
//!
//! Runs once, after an interrupt or an operator `q`:
//!
//! 1. Close every queue. From here on no session is dequeued; sessions still
//!    waiting are told the server is shutting down and dropped.
//! 2. Raise the shutdown flag and wake every desk.
//! 3. Read each desk's acknowledgement in desk order. A desk that is serving
//!    finishes its session first, so this blocks for as long as that takes.
//! 4. Join the desk threads and the dispatcher.
//! 5. Persist the ledger, then write the optional CSV export.
//!
//! Every desk has stopped before step 5, so the persisted file holds the final
//! in-memory balances exactly.

use super::control::Control;
use super::desk::DeskAck;
use super::dispatcher::{self, DispatchStats};
use super::ledger::Ledger;
use super::queue::WorkerQueue;
use crate::io::persistence::save_accounts;
use crate::io::{export_accounts_csv, Connector};
use crate::types::BankError;
use crossbeam::channel::Receiver;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{error, info, warn};

/// What the barrier observed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Acknowledgements, in desk order
    pub acks: Vec<DeskAck>,
    /// Sessions that were still queued when the queues closed
    pub discarded_sessions: usize,
    pub dispatch: DispatchStats,
    /// Ledger total at the moment it was persisted
    pub ledger_total: i64,
}

/// Where the ledger goes at shutdown
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistTargets {
    pub ledger_file: Option<PathBuf>,
    pub csv_export: Option<PathBuf>,
}

/// Owns everything needed to stop the server
pub struct ShutdownCoordinator {
    pub(crate) control: Arc<Control>,
    pub(crate) queues: Vec<Arc<WorkerQueue>>,
    pub(crate) acks: Vec<Receiver<DeskAck>>,
    pub(crate) desks: Vec<JoinHandle<()>>,
    pub(crate) dispatcher: JoinHandle<DispatchStats>,
    pub(crate) connector: Arc<dyn Connector>,
    pub(crate) ledger: Arc<Ledger>,
    pub(crate) targets: PersistTargets,
}

impl ShutdownCoordinator {
    /// Drain every desk and persist the ledger
    ///
    /// # Errors
    ///
    /// Returns the first persistence failure. Draining always completes
    /// before anything is written, and a failed ledger write does not stop the
    /// CSV export from being attempted.
    pub fn run(self) -> Result<ShutdownReport, BankError> {
        info!(desks = self.queues.len(), "shutdown requested");

        let mut discarded_sessions = 0;
        for queue in &self.queues {
            let discarded = queue.close();
            discarded_sessions += discarded.len();
            for descriptor in discarded {
                dispatcher::turn_away(self.connector.as_ref(), &descriptor, &BankError::QueueClosed);
            }
        }
        if discarded_sessions > 0 {
            warn!(discarded_sessions, "queued sessions dropped at shutdown");
        }

        self.control.request_shutdown();
        for queue in &self.queues {
            queue.wake();
        }

        let mut acks = Vec::with_capacity(self.acks.len());
        for (index, receiver) in self.acks.iter().enumerate() {
            match receiver.recv() {
                Ok(ack) => {
                    info!(
                        sessions = ack.sessions_served,
                        delta = ack.delta,
                        "Desk {} shutdown",
                        ack.desk + 1
                    );
                    acks.push(ack);
                }
                Err(_) => error!(desk = index + 1, "desk stopped without acknowledging"),
            }
        }

        for (index, handle) in self.desks.into_iter().enumerate() {
            if handle.join().is_err() {
                error!(desk = index + 1, "desk thread panicked");
            }
        }
        let dispatch = match self.dispatcher.join() {
            Ok(stats) => stats,
            Err(_) => {
                error!("dispatcher thread panicked");
                DispatchStats::default()
            }
        };

        let accounts = self.ledger.snapshot();
        let ledger_total = accounts.iter().map(|account| i64::from(account.balance)).sum();
        let mut result = Ok(());

        if let Some(path) = &self.targets.ledger_file {
            match save_accounts(path, &accounts) {
                Ok(()) => info!(path = %path.display(), ledger_total, "ledger persisted"),
                Err(e) => {
                    error!(path = %path.display(), error = %e, "could not persist ledger");
                    result = Err(e);
                }
            }
        }
        if let Some(path) = &self.targets.csv_export {
            match export_accounts_csv(path, &accounts) {
                Ok(()) => info!(path = %path.display(), "ledger exported"),
                Err(e) => {
                    error!(path = %path.display(), error = %e, "could not export ledger");
                    result = result.and(Err(e));
                }
            }
        }

        result.map(|()| ShutdownReport {
            acks,
            discarded_sessions,
            dispatch,
            ledger_total,
        })
    }
}

impl std::fmt::Debug for ShutdownCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownCoordinator")
            .field("desks", &self.queues.len())
            .field("targets", &self.targets)
            .finish_non_exhaustive()
    }
}
