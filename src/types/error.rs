//! Error types for the desk bank
//!
//! Every error a client or operator can trigger is recoverable: it is turned
//! into a one-line textual response at the desk or dispatcher boundary and the
//! thread carries on. The `Display` text of each variant is exactly what goes
//! back over the wire.
//!
//! # Error Categories
//!
//! - **Account Errors**: unknown account, same-account transfer, insufficient funds
//! - **Command Errors**: malformed command line, non-positive amount
//! - **Arithmetic Errors**: a balance would overflow `i32`
//! - **Dispatch Errors**: every desk queue full, queues closed for shutdown
//! - **I/O Errors**: session channel unavailable, ledger file problems

use super::account::{AccountNumber, Amount, Balance};
use super::session::SessionId;
use thiserror::Error;

/// Main error type for the desk bank
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BankError {
    /// Account number outside `0..capacity`
    ///
    /// Rejected before any account lock is taken.
    #[error("No account with number {number} in record")]
    InvalidAccount {
        /// The rejected account number
        number: AccountNumber,
    },

    /// Transfer whose source and destination are the same account
    ///
    /// Belongs to the invalid-account category, see [`BankError::is_invalid_account`].
    #[error("Account {number} cannot transfer to itself")]
    SameAccount {
        /// The account named twice
        number: AccountNumber,
    },

    /// Balance too low for a withdrawal or transfer
    ///
    /// The account is left untouched.
    #[error("Current balance {balance} of account {number} is not sufficient for {operation} of {requested}")]
    InsufficientFunds {
        /// Account that would have been debited
        number: AccountNumber,
        /// Balance observed under the account lock
        balance: Balance,
        /// Amount requested
        requested: Amount,
        /// Operation that failed
        operation: String,
    },

    /// Zero or negative amount
    #[error("fail: Invalid amount {amount}, amounts must be positive")]
    InvalidAmount {
        /// The rejected amount
        amount: Amount,
    },

    /// Balance arithmetic would overflow
    #[error("Arithmetic overflow in {operation} for account {number}")]
    ArithmeticOverflow {
        /// Operation that would overflow
        operation: String,
        /// Account whose balance would overflow
        number: AccountNumber,
    },

    /// Command line could not be parsed
    ///
    /// The session stays open.
    #[error("fail: Error in command '{input}': {reason}")]
    MalformedCommand {
        /// The offending line, trimmed
        input: String,
        /// What was wrong with it
        reason: String,
    },

    /// Every desk queue is at capacity
    #[error("fail: server busy, try again later")]
    QueueFull {
        /// Capacity of each queue
        capacity: usize,
    },

    /// The queues were closed because the server is shutting down
    #[error("fail: server is shutting down")]
    QueueClosed,

    /// A session's byte stream could not be opened
    #[error("Channel for session {session} unavailable: {message}")]
    ChannelUnavailable {
        /// Session that could not be opened
        session: SessionId,
        /// Why it could not be opened
        message: String,
    },

    /// I/O error while reading or writing files or streams
    #[error("I/O error: {message}")]
    Io {
        /// Description of the I/O error
        message: String,
    },

    /// The persisted ledger does not match the expected layout
    ///
    /// Fatal at startup.
    #[error("Corrupt ledger file: {message}")]
    CorruptLedger {
        /// What did not match
        message: String,
    },
}

impl From<std::io::Error> for BankError {
    fn from(error: std::io::Error) -> Self {
        BankError::Io {
            message: error.to_string(),
        }
    }
}

impl From<csv::Error> for BankError {
    fn from(error: csv::Error) -> Self {
        BankError::Io {
            message: error.to_string(),
        }
    }
}

// Helper functions for creating common errors

impl BankError {
    pub fn invalid_account(number: AccountNumber) -> Self {
        BankError::InvalidAccount { number }
    }

    pub fn same_account(number: AccountNumber) -> Self {
        BankError::SameAccount { number }
    }

    pub fn insufficient_funds(
        number: AccountNumber,
        balance: Balance,
        requested: Amount,
        operation: &str,
    ) -> Self {
        BankError::InsufficientFunds {
            number,
            balance,
            requested,
            operation: operation.to_string(),
        }
    }

    pub fn invalid_amount(amount: Amount) -> Self {
        BankError::InvalidAmount { amount }
    }

    pub fn arithmetic_overflow(operation: &str, number: AccountNumber) -> Self {
        BankError::ArithmeticOverflow {
            operation: operation.to_string(),
            number,
        }
    }

    pub fn malformed(input: &str, reason: impl Into<String>) -> Self {
        BankError::MalformedCommand {
            input: input.trim().to_string(),
            reason: reason.into(),
        }
    }

    pub fn channel_unavailable(session: SessionId, message: impl Into<String>) -> Self {
        BankError::ChannelUnavailable {
            session,
            message: message.into(),
        }
    }

    pub fn corrupt_ledger(message: impl Into<String>) -> Self {
        BankError::CorruptLedger {
            message: message.into(),
        }
    }

    /// True for both an out-of-range number and a same-account transfer
    pub fn is_invalid_account(&self) -> bool {
        matches!(
            self,
            BankError::InvalidAccount { .. } | BankError::SameAccount { .. }
        )
    }
}
