//! Account-related types for the desk bank
//!
//! Accounts are pre-allocated for the full ledger capacity at startup and only
//! their balance ever changes afterwards.

/// Account number, valid in `0..LEDGER_CAPACITY`
pub type AccountNumber = i32;

/// Account balance in whole currency units
pub type Balance = i32;

/// Amount moved by a single withdrawal, deposit or transfer
pub type Amount = i32;

/// Net balance change produced by one desk, used only for throughput reporting
pub type Delta = i64;

/// Number of accounts held by the ledger
pub const LEDGER_CAPACITY: usize = 1000;

/// Account state as persisted and exported
///
/// This is a plain value copy. The live balance sits behind the ledger's
/// per-account lock and is never handed out by reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Account {
    /// The account number (also its index in the ledger)
    pub number: AccountNumber,

    /// Current balance
    pub balance: Balance,
}

impl Account {
    /// Create an account with a zero balance
    pub fn new(number: AccountNumber) -> Self {
        Account { number, balance: 0 }
    }
}
