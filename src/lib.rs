//! Desk Bank Library
//! # Overview
//!
//! This library provides a concurrent in-process banking server: a fixed pool
//! of desk workers serves client sessions against a shared, fixed-size ledger
//! of accounts.
//!
//! # Architecture
//!
//! The system is organized into several key components:
//!
//! - [`types`] - Core data types (Account, SessionDescriptor, BankError)
//! - [`cli`] - CLI arguments parsing
//! - [`core`] - Concurrent engine:
//!   - [`core::ledger`] - Accounts behind per-account reader/writer locks
//!   - [`core::queue`] / [`core::balancer`] - Per-desk session queues and load balancing
//!   - [`core::desk`] - Desk workers serving one client at a time
//!   - [`core::dispatcher`] - Turns connection announcements into queued sessions
//!   - [`core::monitor`] - Best-effort aggregate of desk deltas
//!   - [`core::shutdown`] - Drain barrier and persistence
//! - [`io`] - Command protocol, ledger file, CSV export and transports
//! - [`server`] - Wiring: [`Server::start`] and [`RunningServer::shutdown`]
//!
//! # Commands
//!
//! A client session accepts one command per line:
//!
//! - **`l <account>`**: Print the account balance
//! - **`w <account> <amount>`**: Withdraw (requires sufficient balance)
//! - **`d <account> <amount>`**: Deposit
//! - **`t <from> <to> <amount>`**: Transfer between two distinct accounts
//! - **`q`**: End the session
//!
//! # Locking
//!
//! Reads take one account's read lock, withdrawals and deposits take one
//! write lock, transfers take both write locks in ascending account order.
//! No operation ever holds a lock across client I/O.

// Module declarations
pub mod cli;
pub mod core;
pub mod io;
pub mod server;
pub mod types;

pub use core::{BalanceReport, Ledger, Monitor, ShutdownReport};
pub use io::{load_ledger, save_ledger, write_accounts_csv};
pub use server::{RunningServer, Server, ServerConfig};
pub use types::{Account, AccountNumber, Amount, Balance, BankError, Delta, SessionDescriptor};
