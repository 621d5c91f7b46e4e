//! Shared helpers for the TCP integration tests.
//!
//! Tests CAN use `.unwrap()` and `.expect()`; the panic-free policy applies
//! to production code only.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use nkd::namespace::{spawn_namespace, NamespaceHandle, NamespaceStats};
use nkd::server::DaemonServer;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{sleep, timeout, Instant};
use tokio_util::sync::CancellationToken;

// ============================================================================
// Constants
// ============================================================================

/// Upper bound for any single expected line
pub const RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// How long to listen when asserting that nothing arrives
pub const QUIET_PERIOD: Duration = Duration::from_millis(200);

/// Interval between namespace state polls
const POLL_INTERVAL: Duration = Duration::from_millis(10);

// ============================================================================
// Test Server
// ============================================================================

/// A daemon on an ephemeral loopback port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub namespace: NamespaceHandle,
    cancel_token: CancellationToken,
}

impl TestServer {
    pub async fn spawn() -> Self {
        Self::spawn_with_max_line(None).await
    }

    pub async fn spawn_with_max_line(max_line_bytes: Option<usize>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let namespace = spawn_namespace();
        let cancel_token = CancellationToken::new();

        let mut server = DaemonServer::new(listener, namespace.clone(), cancel_token.clone());
        if let Some(max) = max_line_bytes {
            server = server.with_max_line_bytes(max);
        }
        let addr = server.local_addr().expect("local addr");

        tokio::spawn(async move {
            let _ = server.run().await;
        });

        Self {
            addr,
            namespace,
            cancel_token,
        }
    }

    /// Connects and consumes the greeting.
    pub async fn connect(&self) -> TestClient {
        let mut client = self.connect_raw().await;
        assert_eq!(client.recv().await, "true:Connected");
        client
    }

    /// Connects without reading anything.
    pub async fn connect_raw(&self) -> TestClient {
        let stream = TcpStream::connect(self.addr).await.expect("connect");
        TestClient::from_stream(stream)
    }

    pub async fn stats(&self) -> NamespaceStats {
        self.namespace.stats().await.expect("namespace alive")
    }

    /// Waits until the namespace reports `sessions` open sessions.
    pub async fn wait_for_sessions(&self, sessions: usize) {
        let deadline = Instant::now() + RECV_TIMEOUT;
        loop {
            let stats = self.stats().await;
            if stats.sessions == sessions {
                return;
            }
            assert!(
                Instant::now() < deadline,
                "expected {sessions} sessions, still at {}",
                stats.sessions
            );
            sleep(POLL_INTERVAL).await;
        }
    }

    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }
}

// ============================================================================
// Test Client
// ============================================================================

/// A raw line-protocol client.
pub struct TestClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    pub fn from_stream(stream: TcpStream) -> Self {
        let (reader, writer) = stream.into_split();
        Self {
            reader: BufReader::new(reader),
            writer,
        }
    }

    /// Sends one request line.
    pub async fn send(&mut self, line: &str) {
        self.send_raw(format!("{line}\n").as_bytes()).await;
    }

    pub async fn send_raw(&mut self, data: &[u8]) {
        self.writer.write_all(data).await.unwrap();
        self.writer.flush().await.unwrap();
    }

    /// Receives one line, asserting the `\r\n` terminator.
    pub async fn recv(&mut self) -> String {
        self.recv_timeout(RECV_TIMEOUT)
            .await
            .expect("expected a line from the server")
    }

    /// Receives one line, or `None` on timeout or end of stream.
    pub async fn recv_timeout(&mut self, duration: Duration) -> Option<String> {
        let mut line = String::new();
        match timeout(duration, self.reader.read_line(&mut line)).await {
            Ok(Ok(0)) | Ok(Err(_)) | Err(_) => None,
            Ok(Ok(_)) => {
                let stripped = line
                    .strip_suffix("\r\n")
                    .unwrap_or_else(|| panic!("line without CRLF terminator: {line:?}"));
                Some(stripped.to_string())
            }
        }
    }

    /// Sends a request and returns the next line.
    pub async fn request(&mut self, line: &str) -> String {
        self.send(line).await;
        self.recv().await
    }

    /// Asserts no line arrives during the quiet period.
    pub async fn assert_quiet(&mut self) {
        if let Some(line) = self.recv_timeout(QUIET_PERIOD).await {
            panic!("unexpected line: {line:?}");
        }
    }

    /// Asserts the server closed the connection (EOF or reset), not a timeout.
    pub async fn assert_closed(&mut self) {
        let mut buf = Vec::new();
        match timeout(RECV_TIMEOUT, self.reader.read_until(b'\n', &mut buf)).await {
            Ok(Ok(0)) | Ok(Err(_)) => {}
            Ok(Ok(_)) => panic!("expected close, got {:?}", String::from_utf8_lossy(&buf)),
            Err(_) => panic!("connection still open after {RECV_TIMEOUT:?}"),
        }
    }

    /// Closes the write side so the server sees EOF.
    pub async fn close(mut self) {
        let _ = self.writer.shutdown().await;
    }
}
