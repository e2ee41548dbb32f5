//! Ledger file persistence
//!
//! The ledger file is a flat sequence of fixed-size records, one per account
//! in ascending account-number order:
//!
//! ```text
//! +----------------------+----------------------+
//! | account number: i32  | balance: i32         |   (little-endian, 8 bytes)
//! +----------------------+----------------------+
//! ```
//!
//! Only numbers and balances are stored; locks are rebuilt on load. The file
//! is read in full at startup and rewritten in full at shutdown. A missing
//! file means a fresh, all-zero ledger.

use crate::core::Ledger;
use crate::types::{Account, BankError};
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::info;

/// Size of one persisted account record in bytes
pub const RECORD_LEN: usize = 8;

/// Encode accounts as consecutive fixed-size records
pub fn encode_accounts(accounts: &[Account]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(accounts.len() * RECORD_LEN);
    for account in accounts {
        bytes.extend_from_slice(&account.number.to_le_bytes());
        bytes.extend_from_slice(&account.balance.to_le_bytes());
    }
    bytes
}

/// Decode consecutive fixed-size records
///
/// # Errors
///
/// `CorruptLedger` if the byte count is not a whole number of records.
pub fn decode_accounts(bytes: &[u8]) -> Result<Vec<Account>, BankError> {
    if bytes.len() % RECORD_LEN != 0 {
        return Err(BankError::corrupt_ledger(format!(
            "{} bytes is not a whole number of {}-byte records",
            bytes.len(),
            RECORD_LEN
        )));
    }

    Ok(bytes
        .chunks_exact(RECORD_LEN)
        .map(|record| {
            let (number, balance) = record.split_at(4);
            Account {
                number: i32::from_le_bytes([number[0], number[1], number[2], number[3]]),
                balance: i32::from_le_bytes([balance[0], balance[1], balance[2], balance[3]]),
            }
        })
        .collect())
}

/// Load a ledger of `capacity` accounts from `path`
///
/// A missing file yields an all-zero ledger. A present file must hold exactly
/// `capacity` records numbered `0..capacity` in order.
pub fn load_ledger(path: &Path, capacity: usize) -> Result<Ledger, BankError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!(path = %path.display(), "no ledger file, starting with empty accounts");
            return Ok(Ledger::with_capacity(capacity));
        }
        Err(e) => return Err(e.into()),
    };

    let accounts = decode_accounts(&bytes)?;
    if accounts.len() != capacity {
        return Err(BankError::corrupt_ledger(format!(
            "expected {} records, found {}",
            capacity,
            accounts.len()
        )));
    }

    let ledger = Ledger::from_accounts(&accounts)?;
    info!(path = %path.display(), accounts = capacity, "ledger loaded");
    Ok(ledger)
}

/// Rewrite `path` with `accounts`
///
/// The records go to a temporary file in the same directory which then
/// replaces `path`, so a failed write never leaves a truncated ledger behind.
pub fn save_accounts(path: &Path, accounts: &[Account]) -> Result<(), BankError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let temp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(temp.as_file());
        writer.write_all(&encode_accounts(accounts))?;
        writer.flush()?;
    }
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| BankError::from(e.error))?;
    Ok(())
}

/// Snapshot `ledger` and write it to `path`
pub fn save_ledger(path: &Path, ledger: &Ledger) -> Result<(), BankError> {
    save_accounts(path, &ledger.snapshot())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_encode_layout() {
        let bytes = encode_accounts(&[Account {
            number: 1,
            balance: -2,
        }]);
        assert_eq!(bytes, vec![1, 0, 0, 0, 0xfe, 0xff, 0xff, 0xff]);
    }

    #[test]
    fn test_decode_rejects_partial_record() {
        let result = decode_accounts(&[0u8; RECORD_LEN + 3]);
        assert!(matches!(result, Err(BankError::CorruptLedger { .. })));
    }

    #[test]
    fn test_missing_file_gives_zero_ledger() {
        let dir = tempdir().unwrap();
        let ledger = load_ledger(&dir.path().join("accounts"), 10).unwrap();
        assert_eq!(ledger.capacity(), 10);
        assert_eq!(ledger.total(), 0);
    }

    #[test]
    fn test_save_then_load_reproduces_accounts() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("accounts");
        let ledger = Ledger::with_capacity(50);
        for number in 0..50 {
            ledger.deposit(number, number * 10 + 1).unwrap();
        }
        ledger.withdraw(7, 71).unwrap();

        save_ledger(&path, &ledger).unwrap();
        let reloaded = load_ledger(&path, 50).unwrap();

        assert_eq!(reloaded.snapshot(), ledger.snapshot());
        assert_eq!(fs::metadata(&path).unwrap().len(), 50 * RECORD_LEN as u64);
    }

    #[test]
    fn test_save_overwrites_previous_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("accounts");
        let ledger = Ledger::with_capacity(3);
        save_ledger(&path, &ledger).unwrap();

        ledger.deposit(2, 5).unwrap();
        save_ledger(&path, &ledger).unwrap();

        let reloaded = load_ledger(&path, 3).unwrap();
        assert_eq!(reloaded.read_balance(2).unwrap(), 5);
    }

    #[test]
    fn test_wrong_record_count_is_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("accounts");
        save_ledger(&path, &Ledger::with_capacity(3)).unwrap();

        let result = load_ledger(&path, 4);

        assert!(matches!(result, Err(BankError::CorruptLedger { .. })));
    }

    #[test]
    fn test_out_of_order_records_are_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("accounts");
        let accounts = vec![Account::new(1), Account::new(0)];
        save_accounts(&path, &accounts).unwrap();

        let result = load_ledger(&path, 2);

        assert!(matches!(result, Err(BankError::CorruptLedger { .. })));
    }
}
