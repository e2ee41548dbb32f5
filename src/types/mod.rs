//! Types module
//!
//! Contains core data structures used throughout the application.
//! This module organizes types into logical submodules:
//! - `account`: Account numbers, balances and the persisted account value
//! - `session`: Session descriptors moved from dispatcher to desk
//! - `error`: Error types for the desk bank

pub mod account;
pub mod error;
pub mod session;

pub use account::{Account, AccountNumber, Amount, Balance, Delta, LEDGER_CAPACITY};
pub use error::BankError;
pub use session::{SessionDescriptor, SessionId};
