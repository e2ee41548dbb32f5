//! I/O module
//!
//! Everything that moves bytes in or out of the engine.
//!
//! # Components
//!
//! - `protocol` - Command parsing, response formatting and line framing
//! - `persistence` - Binary ledger file load/save
//! - `csv_format` - CSV export of ledger snapshots
//! - `transport` - Announcement source and session channel seams, with
//!   in-memory and TCP implementations

pub mod csv_format;
pub mod persistence;
pub mod protocol;
pub mod transport;

pub use csv_format::{export_accounts_csv, write_accounts_csv};
pub use persistence::{load_ledger, save_ledger};
pub use protocol::{Command, LineRead, Outcome, MAX_LINE_LEN, READY_TOKEN};
pub use transport::{AnnouncementSource, Connector, SessionChannel};
