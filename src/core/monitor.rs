//! Balance monitor
//!
//! On operator demand the monitor collects every desk's running delta and
//! reports the sum. No account lock is taken: the figure is a best-effort,
//! eventually consistent view of desk throughput, not the ledger total. The
//! ledger remains the only authoritative source of balances.
//!
//! # Protocol
//!
//! 1. Open a query generation on [`Control`] and wake every desk.
//! 2. Read one report per desk from its report channel, in desk order. Reports
//!    tagged with an older generation are stale and skipped.
//! 3. Close the generation, releasing every desk that answered.
//!
//! A desk that is serving a customer answers when its session ends, so a long
//! session delays the report. With a timeout configured, a desk that has not
//! answered by the deadline is reported as unresponsive instead.

use super::control::Control;
use super::desk::DeltaReport;
use super::queue::WorkerQueue;
use crate::types::Delta;
use crossbeam::channel::{Receiver, RecvTimeoutError};
use parking_lot::Mutex;
use std::fmt;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// One desk's line in a balance report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeskBalance {
    /// The desk answered with its running delta
    Reported(Delta),
    /// No answer before the monitor's timeout
    Unresponsive,
    /// The desk had already stopped
    Stopped,
}

/// Result of one balance query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceReport {
    pub generation: u64,
    pub desks: Vec<DeskBalance>,
}

impl BalanceReport {
    /// Sum of the deltas that were reported
    pub fn aggregate(&self) -> Delta {
        self.desks
            .iter()
            .map(|desk| match desk {
                DeskBalance::Reported(delta) => *delta,
                DeskBalance::Unresponsive | DeskBalance::Stopped => 0,
            })
            .sum()
    }

    /// True when every desk answered
    pub fn is_complete(&self) -> bool {
        self.desks
            .iter()
            .all(|desk| matches!(desk, DeskBalance::Reported(_)))
    }
}

impl fmt::Display for BalanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Balances")?;
        for (index, desk) in self.desks.iter().enumerate() {
            match desk {
                DeskBalance::Reported(delta) => writeln!(f, "Desk {}: {}", index + 1, delta)?,
                DeskBalance::Unresponsive => writeln!(f, "Desk {}: no answer", index + 1)?,
                DeskBalance::Stopped => writeln!(f, "Desk {}: stopped", index + 1)?,
            }
        }
        writeln!(f, "Total: {}", self.aggregate())
    }
}

/// Collects desk deltas on demand
#[derive(Debug)]
pub struct Monitor {
    control: Arc<Control>,
    queues: Vec<Arc<WorkerQueue>>,
    reports: Vec<Receiver<DeltaReport>>,
    timeout: Option<Duration>,
    /// Serializes concurrent queries
    running: Mutex<()>,
}

impl Monitor {
    /// Create a monitor
    ///
    /// `queues` and `reports` are indexed by desk and must have the same length.
    pub fn new(
        control: Arc<Control>,
        queues: Vec<Arc<WorkerQueue>>,
        reports: Vec<Receiver<DeltaReport>>,
        timeout: Option<Duration>,
    ) -> Self {
        debug_assert_eq!(queues.len(), reports.len());
        Monitor {
            control,
            queues,
            reports,
            timeout,
            running: Mutex::new(()),
        }
    }

    /// Gather every desk's delta
    pub fn query(&self) -> BalanceReport {
        let _running = self.running.lock();

        let generation = self.control.begin_query();
        for queue in &self.queues {
            queue.wake();
        }

        let deadline = self.timeout.map(|timeout| Instant::now() + timeout);
        let desks = self
            .reports
            .iter()
            .enumerate()
            .map(|(index, receiver)| Self::collect(index, receiver, generation, deadline))
            .collect();

        self.control.end_query(generation);

        let report = BalanceReport { generation, desks };
        info!(
            generation,
            aggregate = report.aggregate(),
            complete = report.is_complete(),
            "balance query answered"
        );
        report
    }

    fn collect(
        index: usize,
        receiver: &Receiver<DeltaReport>,
        generation: u64,
        deadline: Option<Instant>,
    ) -> DeskBalance {
        loop {
            let received = match deadline {
                Some(deadline) => receiver.recv_deadline(deadline),
                None => receiver
                    .recv()
                    .map_err(|_| RecvTimeoutError::Disconnected),
            };
            match received {
                Ok(report) if report.generation == generation => {
                    return DeskBalance::Reported(report.delta)
                }
                Ok(report) => {
                    debug!(
                        desk = index + 1,
                        stale = report.generation,
                        generation,
                        "discarding stale report"
                    );
                }
                Err(RecvTimeoutError::Timeout) => {
                    warn!(desk = index + 1, generation, "desk did not answer balance query");
                    return DeskBalance::Unresponsive;
                }
                Err(RecvTimeoutError::Disconnected) => return DeskBalance::Stopped,
            }
        }
    }
}

/// Operator console loop
///
/// Reads one command per line from `input`:
///
/// - `l` prints the balance report to `output`
/// - `q` calls `request_shutdown` and returns
///
/// Returns when `input` is exhausted or after `q`.
pub fn run_console<R, W, F>(
    monitor: &Monitor,
    input: R,
    mut output: W,
    request_shutdown: F,
) -> io::Result<()>
where
    R: BufRead,
    W: Write,
    F: FnOnce(),
{
    for line in input.lines() {
        let line = line?;
        match line.trim() {
            "" => {}
            "l" => {
                let report = monitor.query();
                write!(output, "{}", report)?;
            }
            "q" => {
                writeln!(output, "Shutting down")?;
                output.flush()?;
                request_shutdown();
                return Ok(());
            }
            other => writeln!(
                output,
                "Unknown operator command '{}': use 'l' for balances, 'q' to shut down",
                other
            )?,
        }
        output.flush()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::channel::{self, Sender};
    use std::io::Cursor;
    use std::thread;

    struct Fixture {
        control: Arc<Control>,
        queues: Vec<Arc<WorkerQueue>>,
        senders: Vec<Sender<DeltaReport>>,
        monitor: Arc<Monitor>,
    }

    fn fixture(desks: usize, timeout: Option<Duration>) -> Fixture {
        let control = Arc::new(Control::new());
        let queues: Vec<_> = (0..desks).map(|i| Arc::new(WorkerQueue::new(i, 4))).collect();
        let (senders, receivers): (Vec<_>, Vec<_>) =
            (0..desks).map(|_| channel::unbounded()).unzip();
        let monitor = Arc::new(Monitor::new(
            Arc::clone(&control),
            queues.clone(),
            receivers,
            timeout,
        ));
        Fixture {
            control,
            queues,
            senders,
            monitor,
        }
    }

    /// Plays a desk: answers the next query with `delta` and waits for release
    fn fake_desk(control: Arc<Control>, sender: Sender<DeltaReport>, desk: usize, delta: Delta) {
        thread::spawn(move || loop {
            if let Some(generation) = control.pending_query(0) {
                sender
                    .send(DeltaReport {
                        desk,
                        generation,
                        delta,
                    })
                    .unwrap();
                control.wait_released(generation);
                return;
            }
            thread::sleep(Duration::from_millis(1));
        });
    }

    #[test]
    fn test_report_aggregate_and_display() {
        let report = BalanceReport {
            generation: 1,
            desks: vec![
                DeskBalance::Reported(100),
                DeskBalance::Reported(-30),
                DeskBalance::Unresponsive,
                DeskBalance::Stopped,
            ],
        };

        assert_eq!(report.aggregate(), 70);
        assert!(!report.is_complete());
        assert_eq!(
            report.to_string(),
            "Balances\nDesk 1: 100\nDesk 2: -30\nDesk 3: no answer\nDesk 4: stopped\nTotal: 70\n"
        );
    }

    #[test]
    fn test_query_collects_every_desk() {
        let f = fixture(3, None);
        for (desk, sender) in f.senders.iter().enumerate() {
            fake_desk(Arc::clone(&f.control), sender.clone(), desk, (desk as Delta + 1) * 10);
        }

        let report = f.monitor.query();

        assert_eq!(
            report.desks,
            vec![
                DeskBalance::Reported(10),
                DeskBalance::Reported(20),
                DeskBalance::Reported(30)
            ]
        );
        assert_eq!(report.aggregate(), 60);
        assert_eq!(f.control.pending_query(0), None);
    }

    #[test]
    fn test_stale_reports_are_skipped() {
        let f = fixture(1, Some(Duration::from_secs(5)));
        f.senders[0]
            .send(DeltaReport {
                desk: 0,
                generation: 0,
                delta: 999,
            })
            .unwrap();
        fake_desk(Arc::clone(&f.control), f.senders[0].clone(), 0, 5);

        let report = f.monitor.query();

        assert_eq!(report.desks, vec![DeskBalance::Reported(5)]);
    }

    #[test]
    fn test_silent_desk_times_out() {
        let f = fixture(2, Some(Duration::from_millis(50)));
        fake_desk(Arc::clone(&f.control), f.senders[0].clone(), 0, 12);

        let report = f.monitor.query();

        assert_eq!(
            report.desks,
            vec![DeskBalance::Reported(12), DeskBalance::Unresponsive]
        );
        assert!(f.queues.iter().all(|queue| !queue.is_closed()));
    }

    #[test]
    fn test_stopped_desk_reported() {
        let mut f = fixture(1, None);
        f.senders.clear();

        let report = f.monitor.query();

        assert_eq!(report.desks, vec![DeskBalance::Stopped]);
    }

    #[test]
    fn test_console_commands() {
        let mut f = fixture(1, None);
        f.senders.clear();
        let input = Cursor::new("l\nwhat\n\nq\nl\n");
        let mut output = Vec::new();
        let mut shutdown_requested = false;

        run_console(&f.monitor, input, &mut output, || shutdown_requested = true).unwrap();

        assert!(shutdown_requested);
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "Balances\nDesk 1: stopped\nTotal: 0\n\
             Unknown operator command 'what': use 'l' for balances, 'q' to shut down\n\
             Shutting down\n"
        );
    }
}
