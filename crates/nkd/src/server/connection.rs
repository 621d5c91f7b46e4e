//! Connection handler for individual client connections.
//!
//! Each accepted socket gets its own `ConnectionHandler`, which owns exactly
//! one session:
//! - Sends the `true:Connected` greeting
//! - Registers the session's outbound queue with the namespace
//! - Reads request lines and dispatches them one at a time
//! - Tears the session down (ephemeral cleanup) when the socket closes
//!
//! Replies and watch notices share one outbound queue, drained by a writer
//! task that owns the write half of the socket.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Connection errors are logged and result in graceful disconnect

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use nk_core::SessionId;
use nk_protocol::Reply;

use crate::dispatch::{CommandDispatcher, BAD_MESSAGE};
use crate::namespace::{CommandError, NamespaceHandle};

/// Write timeout (10 seconds)
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Line terminator appended to every outgoing line
const LINE_END: &[u8] = b"\r\n";

/// One read from the socket.
#[derive(Debug, PartialEq, Eq)]
enum Incoming {
    Line(String),
    NotUtf8,
    Eof,
}

/// Connection handler for a single client.
pub struct ConnectionHandler {
    /// Buffered reader for incoming lines
    reader: BufReader<OwnedReadHalf>,

    /// Write half, moved into the writer task on `run`
    writer: OwnedWriteHalf,

    namespace: NamespaceHandle,

    session: SessionId,

    /// Cancellation token for graceful shutdown
    cancel_token: CancellationToken,

    /// Longest accepted line, terminator excluded
    max_line_bytes: usize,
}

impl ConnectionHandler {
    /// Creates a new connection handler.
    ///
    /// # Arguments
    ///
    /// * `reader` - Read half of the TCP stream
    /// * `writer` - Write half of the TCP stream
    /// * `namespace` - Handle to the namespace actor
    /// * `session` - Session id owned by this connection
    /// * `cancel_token` - Server shutdown token
    /// * `max_line_bytes` - Longest accepted request line
    pub fn new(
        reader: OwnedReadHalf,
        writer: OwnedWriteHalf,
        namespace: NamespaceHandle,
        session: SessionId,
        cancel_token: CancellationToken,
        max_line_bytes: usize,
    ) -> Self {
        Self {
            reader: BufReader::new(reader),
            writer,
            namespace,
            session,
            cancel_token,
            max_line_bytes,
        }
    }

    /// Runs the connection until the peer disconnects, a transport error
    /// occurs, or the server shuts down. The session is always closed on
    /// the way out.
    pub async fn run(self) {
        let Self {
            mut reader,
            writer,
            namespace,
            session,
            cancel_token,
            max_line_bytes,
        } = self;

        let (outbound, replies) = mpsc::unbounded_channel();
        let writer_task = spawn_writer(writer, replies, session);

        // Queued before the session is registered, so no notice can overtake it
        let _ = outbound.send(Reply::Connected);

        if let Err(e) = namespace.open_session(session, outbound.clone()).await {
            warn!(session = %session, error = %e, "Failed to open session");
            drop(outbound);
            let _ = writer_task.await;
            return;
        }

        let dispatcher = CommandDispatcher::new(namespace.clone(), session);
        let mut lines = LineReader {
            reader: &mut reader,
            max_line_bytes,
        };

        match process_lines(&mut lines, &dispatcher, &outbound, &cancel_token).await {
            Ok(()) => debug!(session = %session, "Connection finished"),
            Err(ConnectionError::MessageTooLarge { size, max }) => warn!(
                session = %session,
                size,
                max,
                "Request line too large, closing connection"
            ),
            Err(e) => debug!(session = %session, error = %e, "Connection closed"),
        }

        match namespace.close_session(session).await {
            Ok(removed) => info!(session = %session, removed, "Client disconnected"),
            Err(e) => warn!(session = %session, error = %e, "Failed to close session"),
        }

        // The namespace dropped its clone in close_session; ours ends the writer
        drop(outbound);
        let _ = writer_task.await;
    }
}

/// Reads, dispatches, and queues replies until EOF or cancellation.
async fn process_lines(
    lines: &mut LineReader<'_>,
    dispatcher: &CommandDispatcher,
    outbound: &mpsc::UnboundedSender<Reply>,
    cancel_token: &CancellationToken,
) -> Result<(), ConnectionError> {
    loop {
        let incoming = tokio::select! {
            _ = cancel_token.cancelled() => {
                debug!(session = %dispatcher.session(), "Server shutting down, dropping connection");
                return Ok(());
            }
            result = lines.read_line() => result?,
        };

        let reply = match incoming {
            Incoming::Eof => {
                debug!(session = %dispatcher.session(), "Client sent EOF");
                return Ok(());
            }
            Incoming::NotUtf8 => Reply::failure_with(BAD_MESSAGE),
            Incoming::Line(line) => dispatcher.dispatch(&line).await?,
        };

        if outbound.send(reply).is_err() {
            // Writer task gone: the socket is no longer writable
            return Err(ConnectionError::WriterClosed);
        }
    }
}

/// Reads `\n`-terminated lines with a length cap.
struct LineReader<'a> {
    reader: &'a mut BufReader<OwnedReadHalf>,
    max_line_bytes: usize,
}

impl LineReader<'_> {
    async fn read_line(&mut self) -> Result<Incoming, ConnectionError> {
        let mut buf = Vec::new();

        // Room for the longest legal line plus "\r\n"
        let limit = self.max_line_bytes.saturating_add(2);
        let bytes_read = (&mut *self.reader)
            .take(limit as u64)
            .read_until(b'\n', &mut buf)
            .await
            .map_err(|e| ConnectionError::Io(e.to_string()))?;

        if bytes_read == 0 {
            return Ok(Incoming::Eof);
        }

        let terminated = buf.last() == Some(&b'\n');
        if terminated {
            buf.pop();
            if buf.last() == Some(&b'\r') {
                buf.pop();
            }
        }

        if buf.len() > self.max_line_bytes || (!terminated && bytes_read >= limit) {
            return Err(ConnectionError::MessageTooLarge {
                size: bytes_read,
                max: self.max_line_bytes,
            });
        }

        Ok(String::from_utf8(buf).map_or(Incoming::NotUtf8, Incoming::Line))
    }
}

/// Spawns the task that owns the socket's write half.
fn spawn_writer(
    writer: OwnedWriteHalf,
    mut replies: mpsc::UnboundedReceiver<Reply>,
    session: SessionId,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut writer = BufWriter::new(writer);

        while let Some(reply) = replies.recv().await {
            if let Err(e) = write_line(&mut writer, &reply.to_string()).await {
                debug!(session = %session, error = %e, "Failed to write reply");
                break;
            }
        }
    })
}

/// Writes one line plus terminator and flushes, bounded by `WRITE_TIMEOUT`.
async fn write_line(
    writer: &mut BufWriter<OwnedWriteHalf>,
    line: &str,
) -> Result<(), ConnectionError> {
    match timeout(WRITE_TIMEOUT, async {
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(LINE_END).await?;
        writer.flush().await?;
        Ok::<(), std::io::Error>(())
    })
    .await
    {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(ConnectionError::Io(e.to_string())),
        Err(_) => Err(ConnectionError::WriteTimeout),
    }
}

/// Errors that end a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Write timeout")]
    WriteTimeout,

    #[error("Writer task closed")]
    WriterClosed,

    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("Namespace unavailable: {0}")]
    Namespace(#[from] CommandError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::{TcpListener, TcpStream};

    async fn socket_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (server, _) = listener.accept().await.unwrap();
        (client, server)
    }

    async fn read_with(max_line_bytes: usize, input: &[u8]) -> Vec<Incoming> {
        let (mut client, server) = socket_pair().await;
        client.write_all(input).await.unwrap();
        client.shutdown().await.unwrap();

        let (read_half, _write_half) = server.into_split();
        let mut reader = BufReader::new(read_half);
        let mut lines = LineReader {
            reader: &mut reader,
            max_line_bytes,
        };

        let mut out = Vec::new();
        loop {
            match lines.read_line().await {
                Ok(Incoming::Eof) => {
                    out.push(Incoming::Eof);
                    return out;
                }
                Ok(incoming) => out.push(incoming),
                Err(_) => return out,
            }
        }
    }

    #[tokio::test]
    async fn test_strips_terminators() {
        let out = read_with(64, b"EXISTS:/\r\nGET:/a\n").await;
        assert_eq!(
            out,
            vec![
                Incoming::Line("EXISTS:/".to_string()),
                Incoming::Line("GET:/a".to_string()),
                Incoming::Eof,
            ]
        );
    }

    #[tokio::test]
    async fn test_unterminated_final_line() {
        let out = read_with(64, b"EXISTS:/").await;
        assert_eq!(
            out,
            vec![Incoming::Line("EXISTS:/".to_string()), Incoming::Eof]
        );
    }

    #[tokio::test]
    async fn test_invalid_utf8() {
        let out = read_with(64, b"GET:/\xff\xfe\nEXISTS:/\n").await;
        assert_eq!(
            out,
            vec![
                Incoming::NotUtf8,
                Incoming::Line("EXISTS:/".to_string()),
                Incoming::Eof,
            ]
        );
    }

    #[tokio::test]
    async fn test_line_at_limit_is_accepted() {
        let out = read_with(8, b"12345678\r\n").await;
        assert_eq!(out[0], Incoming::Line("12345678".to_string()));
    }

    #[tokio::test]
    async fn test_oversized_line_is_error() {
        let (mut client, server) = socket_pair().await;
        client.write_all(b"123456789\n").await.unwrap();

        let (read_half, _write_half) = server.into_split();
        let mut reader = BufReader::new(read_half);
        let mut lines = LineReader {
            reader: &mut reader,
            max_line_bytes: 8,
        };

        assert!(matches!(
            lines.read_line().await,
            Err(ConnectionError::MessageTooLarge { max: 8, .. })
        ));
    }

    #[tokio::test]
    async fn test_oversized_unterminated_line_is_error() {
        let (mut client, server) = socket_pair().await;
        client.write_all(&[b'x'; 64]).await.unwrap();

        let (read_half, _write_half) = server.into_split();
        let mut reader = BufReader::new(read_half);
        let mut lines = LineReader {
            reader: &mut reader,
            max_line_bytes: 8,
        };

        assert!(matches!(
            lines.read_line().await,
            Err(ConnectionError::MessageTooLarge { .. })
        ));
    }

    #[test]
    fn test_connection_error_display() {
        let err = ConnectionError::MessageTooLarge { size: 10, max: 8 };
        assert_eq!(err.to_string(), "Message too large: 10 bytes (max: 8)");

        let err = ConnectionError::from(CommandError::ChannelClosed);
        assert_eq!(
            err.to_string(),
            "Namespace unavailable: namespace channel closed"
        );
    }
}
