//! Dispatcher loop
//!
//! Waits on the announcement source, turns each announcement into a queued
//! session on the least-loaded desk, and answers the client directly when no
//! desk can take it. Stops as soon as shutdown is requested; announcements
//! arriving after that are left to the transport.

use super::balancer;
use super::control::Control;
use super::queue::{Rejected, WorkerQueue};
use crate::io::transport::{AnnouncementSource, Connector};
use crate::types::{BankError, SessionDescriptor};
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default wait on the announcement source per loop iteration
pub const DEFAULT_DISPATCH_BACKOFF: Duration = Duration::from_millis(1);

/// Counters returned when the dispatcher stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Sessions placed on a desk queue
    pub assigned: u64,
    /// Sessions turned away (queues full or closed)
    pub rejected: u64,
}

/// Single-threaded connection dispatcher
pub struct Dispatcher {
    source: Box<dyn AnnouncementSource>,
    queues: Vec<Arc<WorkerQueue>>,
    connector: Arc<dyn Connector>,
    control: Arc<Control>,
    backoff: Duration,
    stats: DispatchStats,
}

impl Dispatcher {
    pub fn new(
        source: Box<dyn AnnouncementSource>,
        queues: Vec<Arc<WorkerQueue>>,
        connector: Arc<dyn Connector>,
        control: Arc<Control>,
        backoff: Duration,
    ) -> Self {
        Dispatcher {
            source,
            queues,
            connector,
            control,
            backoff,
            stats: DispatchStats::default(),
        }
    }

    pub fn spawn(self) -> io::Result<JoinHandle<DispatchStats>> {
        thread::Builder::new()
            .name("dispatcher".to_string())
            .spawn(move || self.run())
    }

    /// Dispatch announcements until shutdown is requested
    pub fn run(mut self) -> DispatchStats {
        info!(desks = self.queues.len(), "dispatcher running");
        while !self.control.is_shutdown() {
            match self.source.next_announcement(self.backoff) {
                Ok(Some(descriptor)) => self.dispatch(descriptor),
                Ok(None) => {}
                Err(e) => {
                    warn!(error = %e, "announcement source failed");
                    thread::sleep(self.backoff);
                }
            }
        }
        info!(
            assigned = self.stats.assigned,
            rejected = self.stats.rejected,
            "dispatcher stopped"
        );
        self.stats
    }

    /// Place one session on a queue, or turn it away
    pub fn dispatch(&mut self, descriptor: SessionDescriptor) {
        match balancer::enqueue(&self.queues, descriptor) {
            Ok(index) => {
                self.stats.assigned += 1;
                debug!(desk = index + 1, "session queued");
            }
            Err(Rejected { descriptor, reason }) => {
                self.stats.rejected += 1;
                warn!(%descriptor, reason = %reason, "session rejected");
                turn_away(self.connector.as_ref(), &descriptor, &reason);
            }
        }
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }
}

/// Tell a client why it will not be served, then drop its channel
pub(crate) fn turn_away(connector: &dyn Connector, descriptor: &SessionDescriptor, reason: &BankError) {
    match connector.open(descriptor) {
        Ok(mut channel) => {
            if let Err(e) = channel.send_line(&reason.to_string()) {
                debug!(%descriptor, error = %e, "rejected client already gone");
            }
        }
        Err(e) => debug!(%descriptor, error = %e, "rejected client unreachable"),
    }
}
