//! Ledger of fixed-capacity accounts with per-account reader/writer locks
//!
//! The ledger owns every account balance for the lifetime of the server. No
//! account is ever created or removed after construction; only balances change,
//! and only through the operations below.
//!
//! # Locking discipline
//!
//! - Each account has its own `RwLock`, so unrelated accounts never contend.
//! - Reads take the lock shared; withdrawals and deposits take it exclusively.
//! - A transfer takes both account locks exclusively before touching either
//!   balance, always in ascending account-number order. Two transfers over the
//!   same pair in opposite directions therefore queue up on the same first lock
//!   instead of deadlocking.
//! - Account numbers are validated before any lock is taken.
//! - No I/O is performed while a lock is held.

use crate::types::{Account, AccountNumber, Amount, Balance, BankError, LEDGER_CAPACITY};
use parking_lot::RwLock;

/// Fixed-size collection of account balances indexed by account number
#[derive(Debug)]
pub struct Ledger {
    /// Balance slots; the account number is the slot index
    accounts: Box<[RwLock<Balance>]>,
}

impl Ledger {
    /// Create a ledger of [`LEDGER_CAPACITY`] zero-balance accounts
    pub fn new() -> Self {
        Self::with_capacity(LEDGER_CAPACITY)
    }

    /// Create a ledger of `capacity` zero-balance accounts
    pub fn with_capacity(capacity: usize) -> Self {
        let accounts = (0..capacity).map(|_| RwLock::new(0)).collect();
        Ledger { accounts }
    }

    /// Build a ledger from persisted accounts
    ///
    /// `accounts` must hold exactly one entry per number in `0..accounts.len()`,
    /// in ascending order.
    pub fn from_accounts(accounts: &[Account]) -> Result<Self, BankError> {
        for (index, account) in accounts.iter().enumerate() {
            if usize::try_from(account.number).ok() != Some(index) {
                return Err(BankError::corrupt_ledger(format!(
                    "record {} holds account number {}",
                    index, account.number
                )));
            }
        }

        let accounts = accounts
            .iter()
            .map(|account| RwLock::new(account.balance))
            .collect();
        Ok(Ledger { accounts })
    }

    /// Number of accounts held
    pub fn capacity(&self) -> usize {
        self.accounts.len()
    }

    fn slot(&self, number: AccountNumber) -> Result<&RwLock<Balance>, BankError> {
        usize::try_from(number)
            .ok()
            .and_then(|index| self.accounts.get(index))
            .ok_or_else(|| BankError::invalid_account(number))
    }

    fn check_amount(amount: Amount) -> Result<(), BankError> {
        if amount <= 0 {
            return Err(BankError::invalid_amount(amount));
        }
        Ok(())
    }

    /// Read an account's balance under a shared lock
    pub fn read_balance(&self, number: AccountNumber) -> Result<Balance, BankError> {
        let slot = self.slot(number)?;
        let balance = *slot.read();
        Ok(balance)
    }

    /// Debit an account if it holds at least `amount`
    ///
    /// # Returns
    ///
    /// The new balance. On `InsufficientFunds` the balance is unchanged and the
    /// error carries the balance observed under the lock.
    pub fn withdraw(&self, number: AccountNumber, amount: Amount) -> Result<Balance, BankError> {
        let slot = self.slot(number)?;
        Self::check_amount(amount)?;

        let mut balance = slot.write();
        if *balance < amount {
            return Err(BankError::insufficient_funds(
                number,
                *balance,
                amount,
                "withdrawal",
            ));
        }
        *balance -= amount;
        Ok(*balance)
    }

    /// Credit an account unconditionally
    ///
    /// # Returns
    ///
    /// The new balance, or `ArithmeticOverflow` if it would not fit.
    pub fn deposit(&self, number: AccountNumber, amount: Amount) -> Result<Balance, BankError> {
        let slot = self.slot(number)?;
        Self::check_amount(amount)?;

        let mut balance = slot.write();
        *balance = balance
            .checked_add(amount)
            .ok_or_else(|| BankError::arithmetic_overflow("deposit", number))?;
        Ok(*balance)
    }

    /// Move `amount` from one account to another atomically
    ///
    /// Both locks are held for the whole check-debit-credit sequence, so no
    /// reader ever observes the debit without the credit. Either both balances
    /// change or neither does.
    pub fn transfer(
        &self,
        from: AccountNumber,
        to: AccountNumber,
        amount: Amount,
    ) -> Result<(), BankError> {
        let from_slot = self.slot(from)?;
        let to_slot = self.slot(to)?;
        if from == to {
            return Err(BankError::same_account(from));
        }
        Self::check_amount(amount)?;

        // Canonical order: lower account number first.
        let (mut from_balance, mut to_balance) = if from < to {
            let first = from_slot.write();
            let second = to_slot.write();
            (first, second)
        } else {
            let first = to_slot.write();
            let second = from_slot.write();
            (second, first)
        };

        if *from_balance < amount {
            return Err(BankError::insufficient_funds(
                from,
                *from_balance,
                amount,
                "transfer",
            ));
        }
        let credited = to_balance
            .checked_add(amount)
            .ok_or_else(|| BankError::arithmetic_overflow("transfer", to))?;

        *from_balance -= amount;
        *to_balance = credited;
        Ok(())
    }

    /// Copy every account as a single consistent snapshot
    ///
    /// All read locks are taken in ascending order and held until the copy is
    /// complete, so an in-flight transfer is either fully in or fully out.
    pub fn snapshot(&self) -> Vec<Account> {
        let guards: Vec<_> = self.accounts.iter().map(|slot| slot.read()).collect();
        guards
            .iter()
            .enumerate()
            .map(|(index, balance)| Account {
                number: index as AccountNumber,
                balance: **balance,
            })
            .collect()
    }

    /// Sum of all balances, from a consistent snapshot
    pub fn total(&self) -> i64 {
        self.snapshot()
            .iter()
            .map(|account| i64::from(account.balance))
            .sum()
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}
