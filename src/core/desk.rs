//! Desk workers
//!
//! One OS thread per desk. A desk pulls sessions from its own queue, serves
//! one client at a time against the shared ledger, and between sessions
//! answers balance queries and notices shutdown.
//!
//! # States
//!
//! ```text
//! Idle ──dequeue──▶ Serving ──session ends──▶ Idle ─ … ─▶ Draining ──ack──▶ Stopped
//! ```
//!
//! Balance queries and shutdown are only observed in `Idle`, at the top of the
//! loop. A session that is being served always runs to its end (quit or
//! channel close), so no ledger operation is ever cut short.

use super::control::Control;
use super::ledger::Ledger;
use super::queue::{Dequeued, WorkerQueue};
use crate::io::protocol::{Command, LineRead, Outcome, MAX_LINE_LEN};
use crate::io::transport::Connector;
use crate::types::{BankError, Delta, SessionDescriptor};
use crossbeam::channel::Sender;
use std::fmt;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Number of desks the server runs
pub const DESK_COUNT: usize = 4;

/// Lifecycle state of a desk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeskState {
    Idle,
    Serving,
    Draining,
    Stopped,
}

impl fmt::Display for DeskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeskState::Idle => "idle",
            DeskState::Serving => "serving",
            DeskState::Draining => "draining",
            DeskState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// A desk's running delta, sent to the monitor in answer to one query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeltaReport {
    pub desk: usize,
    pub generation: u64,
    pub delta: Delta,
}

/// Sent once by a desk on its shutdown channel just before it stops
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeskAck {
    pub desk: usize,
    pub sessions_served: u64,
    pub delta: Delta,
}

/// Channels a desk writes to, one pair per desk
#[derive(Debug, Clone)]
pub struct DeskLinks {
    pub reports: Sender<DeltaReport>,
    pub acks: Sender<DeskAck>,
}

/// One desk worker
pub struct Desk {
    index: usize,
    queue: Arc<WorkerQueue>,
    ledger: Arc<Ledger>,
    control: Arc<Control>,
    connector: Arc<dyn Connector>,
    links: DeskLinks,
    idle_wait: Duration,
    state: DeskState,
    /// Net effect of this desk's withdrawals and deposits since start
    delta: Delta,
    last_query: u64,
    sessions_served: u64,
}

impl Desk {
    pub fn new(
        queue: Arc<WorkerQueue>,
        ledger: Arc<Ledger>,
        control: Arc<Control>,
        connector: Arc<dyn Connector>,
        links: DeskLinks,
        idle_wait: Duration,
    ) -> Self {
        Desk {
            index: queue.index(),
            queue,
            ledger,
            control,
            connector,
            links,
            idle_wait,
            state: DeskState::Idle,
            delta: 0,
            last_query: 0,
            sessions_served: 0,
        }
    }

    pub fn state(&self) -> DeskState {
        self.state
    }

    pub fn delta(&self) -> Delta {
        self.delta
    }

    /// Start the desk on its own named thread
    pub fn spawn(self) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name(format!("desk-{}", self.index + 1))
            .spawn(move || self.run())
    }

    /// Serve sessions until shutdown, then acknowledge and stop
    pub fn run(mut self) {
        info!(desk = self.index + 1, "desk open");
        loop {
            self.answer_balance_query();
            if self.control.is_shutdown() {
                break;
            }
            match self.queue.dequeue_timeout(self.idle_wait) {
                Dequeued::Session(descriptor) => self.serve(descriptor),
                Dequeued::Empty => {}
                Dequeued::Closed => break,
            }
        }
        self.drain();
    }

    fn transition(&mut self, next: DeskState) {
        debug!(desk = self.index + 1, from = %self.state, to = %next, "desk state");
        self.state = next;
    }

    /// Answer an open balance query, then hold until the monitor releases it
    fn answer_balance_query(&mut self) {
        let Some(generation) = self.control.pending_query(self.last_query) else {
            return;
        };
        self.last_query = generation;

        let report = DeltaReport {
            desk: self.index,
            generation,
            delta: self.delta,
        };
        if self.links.reports.send(report).is_err() {
            warn!(desk = self.index + 1, "monitor gone, balance query dropped");
            return;
        }
        debug!(desk = self.index + 1, generation, delta = self.delta, "delta reported");
        self.control.wait_released(generation);
    }

    fn serve(&mut self, descriptor: SessionDescriptor) {
        self.transition(DeskState::Serving);

        let mut channel = match self.connector.open(&descriptor) {
            Ok(channel) => channel,
            Err(e) => {
                warn!(desk = self.index + 1, %descriptor, error = %e, "cannot open session");
                self.transition(DeskState::Idle);
                return;
            }
        };
        if let Err(e) = channel.send_ready() {
            warn!(desk = self.index + 1, %descriptor, error = %e, "client gone before ready");
            self.transition(DeskState::Idle);
            return;
        }
        info!(desk = self.index + 1, %descriptor, "serving customer");

        let mut commands = 0u64;
        loop {
            let line = match channel.read_command() {
                Ok(LineRead::Line(line)) => line,
                Ok(LineRead::TooLong) => {
                    let error = BankError::malformed(
                        "<oversized>",
                        format!("command longer than {} bytes", MAX_LINE_LEN),
                    );
                    if channel.send_line(&error.to_string()).is_err() {
                        break;
                    }
                    continue;
                }
                // A closed or broken channel counts as quitting.
                Ok(LineRead::Closed) | Err(_) => break,
            };

            let response = match Command::parse(&line) {
                Ok(command) => match self.execute(command) {
                    Some(Ok(outcome)) => outcome.to_string(),
                    Some(Err(e)) => e.to_string(),
                    None => break,
                },
                Err(e) => e.to_string(),
            };
            commands += 1;
            debug!(desk = self.index + 1, command = %line, %response, "processed");

            if let Err(e) = channel.send_line(&response) {
                warn!(desk = self.index + 1, %descriptor, error = %e, "response lost");
                break;
            }
        }

        self.sessions_served += 1;
        info!(desk = self.index + 1, %descriptor, commands, "done with customer");
        self.transition(DeskState::Idle);
    }

    /// Apply one command to the ledger
    ///
    /// Returns `None` for `q`, which ends the session instead of producing a
    /// response. Withdrawals and deposits move this desk's delta; transfers
    /// stay inside the ledger and leave it alone.
    pub fn execute(&mut self, command: Command) -> Option<Result<Outcome, BankError>> {
        let ledger = &self.ledger;
        let result = match command {
            Command::Balance { account } => ledger
                .read_balance(account)
                .map(|balance| Outcome::Balance { account, balance }),
            Command::Withdraw { account, amount } => {
                ledger.withdraw(account, amount).map(|balance| {
                    self.delta -= Delta::from(amount);
                    Outcome::Withdrew {
                        account,
                        amount,
                        balance,
                    }
                })
            }
            Command::Deposit { account, amount } => {
                ledger.deposit(account, amount).map(|balance| {
                    self.delta += Delta::from(amount);
                    Outcome::Deposited {
                        account,
                        amount,
                        balance,
                    }
                })
            }
            Command::Transfer { from, to, amount } => ledger
                .transfer(from, to, amount)
                .map(|()| Outcome::Transferred { from, to, amount }),
            Command::Quit => return None,
        };
        Some(result)
    }

    fn drain(&mut self) {
        self.transition(DeskState::Draining);
        // A query opened just before shutdown still gets this desk's answer.
        self.answer_balance_query();

        let ack = DeskAck {
            desk: self.index,
            sessions_served: self.sessions_served,
            delta: self.delta,
        };
        if self.links.acks.send(ack).is_err() {
            warn!(desk = self.index + 1, "shutdown coordinator gone");
        }
        self.transition(DeskState::Stopped);
        info!(desk = self.index + 1, sessions = self.sessions_served, "desk closed");
    }
}

impl fmt::Debug for Desk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Desk")
            .field("index", &self.index)
            .field("state", &self.state)
            .field("delta", &self.delta)
            .field("sessions_served", &self.sessions_served)
            .finish_non_exhaustive()
    }
}
