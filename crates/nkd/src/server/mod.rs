//! TCP server for the nodekeeper daemon.
//!
//! The server:
//! - Listens on a TCP address for client connections
//! - Assigns every connection a fresh `SessionId` (never reused)
//! - Spawns a ConnectionHandler for each client
//! - Supports graceful shutdown via CancellationToken
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   DaemonServer  │
//! │                 │
//! │   TcpListener   │
//! └───────┬─────────┘
//!         │ accept()
//!         ▼
//! ┌─────────────────┐     ┌─────────────────┐
//! │ConnectionHandler│────▶│ NamespaceHandle │
//! │  (per session)  │     │                 │
//! └─────────────────┘     └─────────────────┘
//!         ▲                        │
//!         │ outbound queue         │ watch notices
//!         └────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Accept errors are logged and the server keeps running

mod connection;

pub use connection::{ConnectionError, ConnectionHandler};

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use nk_core::SessionId;

use crate::config::{DaemonConfig, DEFAULT_MAX_LINE_BYTES};
use crate::namespace::NamespaceHandle;

/// Line-protocol TCP server.
pub struct DaemonServer {
    listener: TcpListener,

    /// Handle to the namespace actor
    namespace: NamespaceHandle,

    /// Cancellation token for graceful shutdown
    cancel_token: CancellationToken,

    /// Source of session ids; starts at 1
    connection_counter: AtomicU64,

    max_line_bytes: usize,
}

impl DaemonServer {
    /// Binds `config.listen` and builds a server with the configured limits.
    pub async fn bind(
        config: &DaemonConfig,
        namespace: NamespaceHandle,
        cancel_token: CancellationToken,
    ) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(config.listen)
            .await
            .map_err(|e| ServerError::Bind {
                addr: config.listen,
                error: e.to_string(),
            })?;

        Ok(Self::new(listener, namespace, cancel_token).with_max_line_bytes(config.max_line_bytes))
    }

    /// Wraps an already-bound listener.
    pub fn new(
        listener: TcpListener,
        namespace: NamespaceHandle,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            listener,
            namespace,
            cancel_token,
            connection_counter: AtomicU64::new(1),
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
        }
    }

    #[must_use]
    pub fn with_max_line_bytes(mut self, max_line_bytes: usize) -> Self {
        self.max_line_bytes = max_line_bytes;
        self
    }

    /// Returns the bound address (useful when listening on port 0).
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.listener
            .local_addr()
            .map_err(|e| ServerError::LocalAddr(e.to_string()))
    }

    /// Runs the server.
    ///
    /// Accepts connections until the cancellation token is triggered.
    /// Open connections observe the same token and close their sessions.
    pub async fn run(&self) -> Result<(), ServerError> {
        info!(addr = %self.local_addr()?, "Daemon server listening");

        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!("Server shutdown requested");
                    break;
                }

                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer)) => self.handle_connection(stream, peer),
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Spawns a handler task for a new client connection.
    fn handle_connection(&self, stream: TcpStream, peer: SocketAddr) {
        let session = SessionId::new(self.connection_counter.fetch_add(1, Ordering::Relaxed));

        if let Err(e) = stream.set_nodelay(true) {
            warn!(session = %session, error = %e, "Failed to set TCP_NODELAY");
        }

        debug!(session = %session, peer = %peer, "Client connected");

        let (reader, writer) = stream.into_split();
        let handler = ConnectionHandler::new(
            reader,
            writer,
            self.namespace.clone(),
            session,
            self.cancel_token.clone(),
            self.max_line_bytes,
        );

        tokio::spawn(handler.run());
    }
}

/// Errors that can occur in server operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {error}")]
    Bind { addr: SocketAddr, error: String },

    #[error("Failed to read local address: {0}")]
    LocalAddr(String),
}
