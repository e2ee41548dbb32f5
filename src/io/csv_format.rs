//! CSV export of ledger snapshots
//!
//! Operator-facing dump of the ledger with columns `account,balance`. Only
//! accounts with a non-zero balance are listed, in ascending account order.
//! This is a reporting format; the authoritative on-disk ledger is the binary
//! file handled by [`crate::io::persistence`].

use crate::types::{Account, AccountNumber, Balance, BankError};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// One exported CSV row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRow {
    pub account: AccountNumber,
    pub balance: Balance,
}

impl From<&Account> for AccountRow {
    fn from(account: &Account) -> Self {
        AccountRow {
            account: account.number,
            balance: account.balance,
        }
    }
}

/// Write accounts with a non-zero balance as CSV
///
/// # Arguments
///
/// * `accounts` - Snapshot of account states
/// * `output` - Writer receiving the CSV text
pub fn write_accounts_csv(accounts: &[Account], output: &mut dyn Write) -> Result<(), BankError> {
    // Header written by hand so it appears even when no row follows.
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(output);
    writer.write_record(["account", "balance"])?;

    let mut rows: Vec<AccountRow> = accounts
        .iter()
        .filter(|account| account.balance != 0)
        .map(AccountRow::from)
        .collect();
    rows.sort_by_key(|row| row.account);

    for row in rows {
        writer.serialize(row)?;
    }

    writer.flush()?;
    Ok(())
}

/// Write the CSV export to a file, replacing any previous export
pub fn export_accounts_csv(path: &Path, accounts: &[Account]) -> Result<(), BankError> {
    let mut file = File::create(path)?;
    write_accounts_csv(accounts, &mut file)
}
