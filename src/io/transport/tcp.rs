//! TCP transport used by the server binary
//!
//! Every accepted connection is one session. The accepted stream is parked in
//! a shared registry under a fresh session id until a desk opens it, so the
//! dispatcher never blocks on a client and the engine only ever sees the
//! opaque [`SessionDescriptor`].

use super::{AnnouncementSource, Connector, SessionChannel};
use crate::types::{BankError, SessionDescriptor, SessionId};
use dashmap::DashMap;
use std::io::{self, BufReader};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::debug;

/// Listening socket plus the registry of accepted, not yet served streams
#[derive(Debug)]
pub struct TcpTransport {
    listener: TcpListener,
    next_id: SessionId,
    pending: Arc<DashMap<SessionId, TcpStream>>,
}

impl TcpTransport {
    /// Bind the listening socket
    pub fn bind(addr: impl ToSocketAddrs) -> Result<Self, BankError> {
        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        Ok(TcpTransport {
            listener,
            next_id: 1,
            pending: Arc::new(DashMap::new()),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, BankError> {
        Ok(self.listener.local_addr()?)
    }

    /// Connector sharing this transport's registry
    pub fn connector(&self) -> TcpConnector {
        TcpConnector {
            pending: Arc::clone(&self.pending),
        }
    }
}

impl AnnouncementSource for TcpTransport {
    fn next_announcement(
        &mut self,
        wait: Duration,
    ) -> Result<Option<SessionDescriptor>, BankError> {
        match self.listener.accept() {
            Ok((stream, peer)) => {
                // Accepted sockets inherit non-blocking mode on some platforms.
                stream.set_nonblocking(false)?;
                let id = self.next_id;
                self.next_id += 1;
                self.pending.insert(id, stream);
                debug!(session = id, %peer, "accepted connection");
                Ok(Some(SessionDescriptor::new(id, peer.to_string())))
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(wait);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Desk side of [`TcpTransport`]
#[derive(Debug, Clone)]
pub struct TcpConnector {
    pending: Arc<DashMap<SessionId, TcpStream>>,
}

impl Connector for TcpConnector {
    fn open(&self, descriptor: &SessionDescriptor) -> Result<SessionChannel, BankError> {
        let (_, stream) = self.pending.remove(&descriptor.id).ok_or_else(|| {
            BankError::channel_unavailable(descriptor.id, "connection not registered")
        })?;
        let writer = stream
            .try_clone()
            .map_err(|e| BankError::channel_unavailable(descriptor.id, e.to_string()))?;
        Ok(SessionChannel::new(
            Box::new(BufReader::new(stream)),
            Box::new(writer),
        ))
    }
}
