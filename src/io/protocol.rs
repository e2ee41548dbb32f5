//! Session line protocol
//!
//! One newline-terminated command in, one newline-terminated response out.
//! Commands:
//!
//! | Command             | Meaning                                  |
//! |---------------------|------------------------------------------|
//! | `l <acct>`          | balance query                            |
//! | `w <acct> <amt>`    | withdrawal                               |
//! | `d <acct> <amt>`    | deposit                                  |
//! | `t <from> <to> <amt>` | transfer                               |
//! | `q`                 | end the session (no response is sent)    |
//!
//! Parsing and formatting are pure; reading and writing lines is done on any
//! `BufRead` / `Write` pair so every transport shares the same framing.

use crate::types::{AccountNumber, Amount, Balance, BankError};
use std::fmt;
use std::io::{self, BufRead, Write};

/// Maximum length of one command line, excluding the newline
pub const MAX_LINE_LEN: usize = 255;

/// Token written to a client once its session is open
pub const READY_TOKEN: &str = "ready";

/// A parsed client command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Balance {
        account: AccountNumber,
    },
    Withdraw {
        account: AccountNumber,
        amount: Amount,
    },
    Deposit {
        account: AccountNumber,
        amount: Amount,
    },
    Transfer {
        from: AccountNumber,
        to: AccountNumber,
        amount: Amount,
    },
    Quit,
}

impl Command {
    /// Parse one command line
    ///
    /// Surrounding whitespace and the line terminator are ignored. Any other
    /// deviation (unknown verb, wrong argument count, non-numeric argument)
    /// is a `MalformedCommand`.
    pub fn parse(line: &str) -> Result<Command, BankError> {
        let mut tokens = line.split_whitespace();
        let verb = tokens
            .next()
            .ok_or_else(|| BankError::malformed(line, "empty command"))?;
        let args: Vec<&str> = tokens.collect();

        let expect_args = |count: usize| {
            if args.len() == count {
                Ok(())
            } else {
                Err(BankError::malformed(
                    line,
                    format!("'{}' takes {} argument(s), got {}", verb, count, args.len()),
                ))
            }
        };
        let number = |index: usize, what: &str| -> Result<i32, BankError> {
            args[index].parse::<i32>().map_err(|_| {
                BankError::malformed(line, format!("invalid {} '{}'", what, args[index]))
            })
        };

        match verb {
            "l" => {
                expect_args(1)?;
                Ok(Command::Balance {
                    account: number(0, "account number")?,
                })
            }
            "w" | "d" => {
                expect_args(2)?;
                let account = number(0, "account number")?;
                let amount = number(1, "amount")?;
                Ok(if verb == "w" {
                    Command::Withdraw { account, amount }
                } else {
                    Command::Deposit { account, amount }
                })
            }
            "t" => {
                expect_args(3)?;
                Ok(Command::Transfer {
                    from: number(0, "account number")?,
                    to: number(1, "account number")?,
                    amount: number(2, "amount")?,
                })
            }
            "q" => {
                expect_args(0)?;
                Ok(Command::Quit)
            }
            other => Err(BankError::malformed(
                line,
                format!("unknown command '{}'", other),
            )),
        }
    }
}

/// Successful result of a command, formatted as the response line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Balance {
        account: AccountNumber,
        balance: Balance,
    },
    Withdrew {
        account: AccountNumber,
        amount: Amount,
        balance: Balance,
    },
    Deposited {
        account: AccountNumber,
        amount: Amount,
        balance: Balance,
    },
    Transferred {
        from: AccountNumber,
        to: AccountNumber,
        amount: Amount,
    },
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Bare number, as existing clients expect.
            Outcome::Balance { balance, .. } => write!(f, "{}", balance),
            Outcome::Withdrew {
                account,
                amount,
                balance,
            } => write!(
                f,
                "Withdrew {} from account {}, remaining balance {}",
                amount, account, balance
            ),
            Outcome::Deposited {
                account,
                amount,
                balance,
            } => write!(
                f,
                "Deposited {} to account {}, new balance {}",
                amount, account, balance
            ),
            Outcome::Transferred { from, to, amount } => write!(
                f,
                "Transferred {} from account {} to account {}",
                amount, from, to
            ),
        }
    }
}

/// One framed read from a session
#[derive(Debug, PartialEq, Eq)]
pub enum LineRead {
    /// A complete line, terminator stripped
    Line(String),
    /// The line exceeded [`MAX_LINE_LEN`]; it has been consumed and discarded
    TooLong,
    /// End of stream
    Closed,
}

/// Read one command line of at most [`MAX_LINE_LEN`] bytes
///
/// The newline and one trailing `\r` do not count against the limit. Bytes
/// past the limit are dropped as they are read, so an oversized line never
/// holds more than `MAX_LINE_LEN + 1` bytes in memory.
pub fn read_line(reader: &mut dyn BufRead) -> io::Result<LineRead> {
    let mut buf = Vec::with_capacity(64);
    let mut seen = false;
    let mut overflow = false;

    loop {
        let available = reader.fill_buf()?;
        if available.is_empty() {
            break;
        }
        let (chunk, newline) = match available.iter().position(|&b| b == b'\n') {
            Some(end) => (&available[..end], true),
            None => (available, false),
        };
        // Room for a `\r` right after a full-length command.
        let room = (MAX_LINE_LEN + 1).saturating_sub(buf.len());
        if chunk.len() > room {
            overflow = true;
        }
        buf.extend_from_slice(&chunk[..chunk.len().min(room)]);

        let used = chunk.len() + usize::from(newline);
        reader.consume(used);
        seen = true;
        if newline {
            break;
        }
    }

    if !seen {
        return Ok(LineRead::Closed);
    }
    if !overflow && buf.last() == Some(&b'\r') {
        buf.pop();
    }
    if overflow || buf.len() > MAX_LINE_LEN {
        return Ok(LineRead::TooLong);
    }
    Ok(LineRead::Line(String::from_utf8_lossy(&buf).into_owned()))
}

/// Write one response line and flush it
pub fn write_line(writer: &mut dyn Write, line: &str) -> io::Result<()> {
    writer.write_all(line.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.flush()
}
