//! Namespace service using the Actor pattern.
//!
//! The namespace actor is the only owner of the znode tree. Connections talk
//! to it through a `NamespaceHandle`; it answers over oneshot channels and
//! pushes watch notices onto each watcher's own outbound queue.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐     ┌──────────────────┐     ┌──────────────────┐
//! │ CommandDispatcher│────▶│  NamespaceActor  │────▶│ Outbound queues  │
//! └──────────────────┘     └──────────────────┘     └──────────────────┘
//!         │                        │                        │
//!         │  NamespaceCommand      │  NamespaceStore +      │  Reply::Notice
//!         │  (mpsc channel)        │  SessionTable          │  (per session)
//!         ▼                        ▼                        ▼
//!    one request at a time    single writer            connection writer tasks
//! ```

use tokio::sync::mpsc;

mod actor;
mod commands;
mod handle;
mod sessions;

pub use actor::NamespaceActor;
pub use commands::{CommandError, NamespaceCommand, NamespaceStats};
pub use handle::NamespaceHandle;
pub use sessions::{Outbound, SessionTable};

/// Command channel buffer size
const COMMAND_BUFFER: usize = 256;

/// Spawn the namespace actor and return a handle for interaction.
///
/// The actor stops once every handle has been dropped.
///
/// # Example
///
/// ```no_run
/// use nkd::namespace::spawn_namespace;
///
/// #[tokio::main]
/// async fn main() {
///     let handle = spawn_namespace();
///     let stats = handle.stats().await;
/// }
/// ```
pub fn spawn_namespace() -> NamespaceHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);

    let actor = NamespaceActor::new(cmd_rx);
    tokio::spawn(actor.run());

    NamespaceHandle::new(cmd_tx)
}
