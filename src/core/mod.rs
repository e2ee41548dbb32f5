//! Core engine module
//!
//! The concurrent part of the server:
//! - `ledger` - Fixed-size account table with per-account reader/writer locks
//! - `queue` - Bounded per-desk session queues
//! - `balancer` - Least-loaded queue selection
//! - `control` - Shutdown flag and balance-query gate
//! - `desk` - Desk worker threads
//! - `dispatcher` - Announcement loop feeding the queues
//! - `monitor` - On-demand aggregation of desk deltas, operator console
//! - `shutdown` - Drain barrier and ledger persistence

pub mod balancer;
pub mod control;
pub mod desk;
pub mod dispatcher;
pub mod ledger;
pub mod monitor;
pub mod queue;
pub mod shutdown;

pub use control::Control;
pub use desk::{Desk, DeskAck, DeskState, DeltaReport, DESK_COUNT};
pub use dispatcher::{DispatchStats, Dispatcher};
pub use ledger::Ledger;
pub use monitor::{run_console, BalanceReport, DeskBalance, Monitor};
pub use queue::{Dequeued, WorkerQueue, DEFAULT_QUEUE_CAPACITY};
pub use shutdown::{PersistTargets, ShutdownCoordinator, ShutdownReport};
