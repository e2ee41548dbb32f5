//! Transport seams between the engine and the outside world
//!
//! The engine never touches sockets or pipes directly. It consumes:
//!
//! - an [`AnnouncementSource`] that yields one [`SessionDescriptor`] per new
//!   client (the dispatcher polls it), and
//! - a [`Connector`] that turns a descriptor into a [`SessionChannel`] (the
//!   desk opens it when the session reaches the head of its queue).
//!
//! Two implementations ship with the crate: [`memory`] for tests and embedding,
//! and [`tcp`] for the server binary.

pub mod memory;
pub mod tcp;

pub use memory::{MemoryClient, MemoryTransport};
pub use tcp::{TcpConnector, TcpTransport};

use crate::io::protocol::{self, LineRead, READY_TOKEN};
use crate::types::{BankError, SessionDescriptor};
use std::io::{self, BufRead, Write};
use std::time::Duration;

/// Source of new-connection announcements
pub trait AnnouncementSource: Send {
    /// Return the next announcement, waiting at most `wait` for one
    ///
    /// `Ok(None)` means nothing arrived in time. Errors are logged by the
    /// dispatcher and never stop it.
    fn next_announcement(
        &mut self,
        wait: Duration,
    ) -> Result<Option<SessionDescriptor>, BankError>;
}

/// Opens the byte-stream pair behind a descriptor
pub trait Connector: Send + Sync {
    /// Open the session's channel
    ///
    /// # Errors
    ///
    /// `ChannelUnavailable` when the descriptor names nothing this connector
    /// can open (already consumed, client gone, ...).
    fn open(&self, descriptor: &SessionDescriptor) -> Result<SessionChannel, BankError>;
}

/// One client's open bidirectional channel
///
/// Both halves are `Send + Sync` so channels can wait in a shared registry
/// until a desk claims them.
pub struct SessionChannel {
    reader: Box<dyn BufRead + Send + Sync>,
    writer: Box<dyn Write + Send + Sync>,
}

impl SessionChannel {
    pub fn new(
        reader: Box<dyn BufRead + Send + Sync>,
        writer: Box<dyn Write + Send + Sync>,
    ) -> Self {
        SessionChannel { reader, writer }
    }

    /// Tell the client the desk is ready for its first command
    pub fn send_ready(&mut self) -> io::Result<()> {
        protocol::write_line(&mut *self.writer, READY_TOKEN)
    }

    /// Read the next command line
    pub fn read_command(&mut self) -> io::Result<LineRead> {
        protocol::read_line(&mut *self.reader)
    }

    /// Write one response line
    pub fn send_line(&mut self, line: &str) -> io::Result<()> {
        protocol::write_line(&mut *self.writer, line)
    }
}

impl std::fmt::Debug for SessionChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionChannel").finish_non_exhaustive()
    }
}
