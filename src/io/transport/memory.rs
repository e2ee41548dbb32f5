//! In-process transport
//!
//! Clients and the server exchange bytes over crossbeam channels instead of
//! sockets. A client "connects" by registering the server half of its pipe
//! pair under a fresh session id and announcing that id. The desk that
//! dequeues the descriptor takes the server half out of the registry.
//!
//! Used by the integration tests and for embedding the engine in-process.

use super::{AnnouncementSource, Connector, SessionChannel};
use crate::io::protocol::{self, LineRead, READY_TOKEN};
use crate::types::{BankError, SessionDescriptor, SessionId};
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use dashmap::DashMap;
use std::io::{self, BufReader, Read, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// How long a client-side read waits before giving up
const CLIENT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Write half of an in-memory pipe; dropping it closes the pipe
#[derive(Debug)]
pub struct PipeWriter {
    tx: Sender<Vec<u8>>,
}

impl Write for PipeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.tx
            .send(buf.to_vec())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "pipe reader dropped"))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Read half of an in-memory pipe
#[derive(Debug)]
pub struct PipeReader {
    rx: Receiver<Vec<u8>>,
    chunk: Vec<u8>,
    pos: usize,
    timeout: Option<Duration>,
}

impl Read for PipeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos == self.chunk.len() {
            let next = match self.timeout {
                Some(timeout) => match self.rx.recv_timeout(timeout) {
                    Ok(chunk) => Some(chunk),
                    Err(RecvTimeoutError::Disconnected) => None,
                    Err(RecvTimeoutError::Timeout) => {
                        return Err(io::Error::new(
                            io::ErrorKind::TimedOut,
                            "no data on pipe",
                        ))
                    }
                },
                None => self.rx.recv().ok(),
            };
            match next {
                Some(chunk) => {
                    self.chunk = chunk;
                    self.pos = 0;
                }
                // Writer dropped: end of stream.
                None => return Ok(0),
            }
        }

        let available = &self.chunk[self.pos..];
        let count = available.len().min(buf.len());
        buf[..count].copy_from_slice(&available[..count]);
        self.pos += count;
        Ok(count)
    }
}

fn pipe(timeout: Option<Duration>) -> (PipeWriter, PipeReader) {
    let (tx, rx) = channel::unbounded();
    (
        PipeWriter { tx },
        PipeReader {
            rx,
            chunk: Vec::new(),
            pos: 0,
            timeout,
        },
    )
}

#[derive(Debug)]
struct Shared {
    next_id: AtomicU64,
    pending: DashMap<SessionId, SessionChannel>,
    announce_tx: Sender<SessionDescriptor>,
    announce_rx: Receiver<SessionDescriptor>,
}

/// Handle to an in-process transport; cheap to clone
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    shared: Arc<Shared>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        let (announce_tx, announce_rx) = channel::unbounded();
        MemoryTransport {
            shared: Arc::new(Shared {
                next_id: AtomicU64::new(1),
                pending: DashMap::new(),
                announce_tx,
                announce_rx,
            }),
        }
    }

    /// Announcement source for the dispatcher
    pub fn source(&self) -> MemorySource {
        MemorySource {
            rx: self.shared.announce_rx.clone(),
        }
    }

    /// Connector for the desks
    pub fn connector(&self) -> MemoryConnector {
        MemoryConnector {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Register a new client and announce it to the server
    pub fn connect(&self) -> MemoryClient {
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let (to_server, server_reader) = pipe(None);
        let (server_writer, from_server) = pipe(Some(CLIENT_READ_TIMEOUT));

        let channel = SessionChannel::new(
            Box::new(BufReader::new(server_reader)),
            Box::new(server_writer),
        );
        self.shared.pending.insert(id, channel);
        self.announce(SessionDescriptor::new(id, format!("memory-{}", id)));

        MemoryClient {
            id,
            reader: BufReader::new(from_server),
            writer: to_server,
        }
    }

    /// Announce a descriptor as-is, whether or not a channel backs it
    pub fn announce(&self, descriptor: SessionDescriptor) {
        let _ = self.shared.announce_tx.send(descriptor);
    }

    /// Number of announced sessions no desk has opened yet
    pub fn pending_sessions(&self) -> usize {
        self.shared.pending.len()
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

/// Dispatcher side of [`MemoryTransport`]
#[derive(Debug)]
pub struct MemorySource {
    rx: Receiver<SessionDescriptor>,
}

impl AnnouncementSource for MemorySource {
    fn next_announcement(
        &mut self,
        wait: Duration,
    ) -> Result<Option<SessionDescriptor>, BankError> {
        match self.rx.recv_timeout(wait) {
            Ok(descriptor) => Ok(Some(descriptor)),
            Err(_) => Ok(None),
        }
    }
}

/// Desk side of [`MemoryTransport`]
#[derive(Debug)]
pub struct MemoryConnector {
    shared: Arc<Shared>,
}

impl Connector for MemoryConnector {
    fn open(&self, descriptor: &SessionDescriptor) -> Result<SessionChannel, BankError> {
        self.shared
            .pending
            .remove(&descriptor.id)
            .map(|(_, channel)| channel)
            .ok_or_else(|| {
                BankError::channel_unavailable(descriptor.id, "no client registered")
            })
    }
}

/// Client end of an in-memory session
#[derive(Debug)]
pub struct MemoryClient {
    id: SessionId,
    reader: BufReader<PipeReader>,
    writer: PipeWriter,
}

impl MemoryClient {
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Read one response line
    pub fn read_line(&mut self) -> io::Result<Option<String>> {
        match protocol::read_line(&mut self.reader)? {
            LineRead::Line(line) => Ok(Some(line)),
            LineRead::Closed => Ok(None),
            LineRead::TooLong => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "response line too long",
            )),
        }
    }

    /// Block until the desk sends its readiness token
    pub fn wait_ready(&mut self) -> io::Result<()> {
        match self.read_line()? {
            Some(line) if line == READY_TOKEN => Ok(()),
            Some(line) => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("expected '{}', got '{}'", READY_TOKEN, line),
            )),
            None => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "session closed before ready",
            )),
        }
    }

    /// Send one command and wait for its response
    pub fn request(&mut self, command: &str) -> io::Result<String> {
        protocol::write_line(&mut self.writer, command)?;
        self.read_line()?.ok_or_else(|| {
            io::Error::new(io::ErrorKind::UnexpectedEof, "session closed mid-request")
        })
    }

    /// End the session cleanly
    pub fn quit(mut self) -> io::Result<()> {
        protocol::write_line(&mut self.writer, "q")
    }
}
