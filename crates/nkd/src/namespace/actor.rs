//! Namespace actor - owns the znode tree and the session table.
//!
//! The NamespaceActor is the single writer of namespace state. It receives
//! commands via an mpsc channel, applies them one at a time, and queues watch
//! notices on the watching sessions' outbound channels.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Response send failures are ignored (the caller went away)
//! - Notice delivery failures are logged and dropped

use tokio::sync::mpsc;
use tracing::{debug, info};

use nk_core::{NamespaceError, NamespaceStore, SessionId, WatchNotice, ZnodePath};

use super::commands::{NamespaceCommand, NamespaceStats};
use super::sessions::{Outbound, SessionTable};

/// The namespace actor.
///
/// # Ownership
///
/// The actor owns:
/// - `store`: the znode tree with its watch queues and ephemeral index
/// - `sessions`: `SessionId` → outbound channel
///
/// # Thread Safety
///
/// The actor runs in a single task and never awaits while handling a
/// command, so each command is applied atomically. Notice delivery is an
/// unbounded channel send and does not block on socket I/O.
pub struct NamespaceActor {
    /// Command receiver
    receiver: mpsc::Receiver<NamespaceCommand>,

    store: NamespaceStore,

    sessions: SessionTable,
}

impl NamespaceActor {
    /// Creates an actor with an empty namespace (root only).
    pub fn new(receiver: mpsc::Receiver<NamespaceCommand>) -> Self {
        Self {
            receiver,
            store: NamespaceStore::new(),
            sessions: SessionTable::new(),
        }
    }

    /// Runs the actor event loop.
    ///
    /// Processes commands until the channel closes (all senders dropped).
    pub async fn run(mut self) {
        info!("Namespace actor starting");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!(
            nodes = self.store.node_count(),
            sessions = self.sessions.len(),
            "Namespace actor stopped"
        );
    }

    /// Dispatches a command to the appropriate handler.
    fn handle_command(&mut self, cmd: NamespaceCommand) {
        match cmd {
            NamespaceCommand::OpenSession {
                session,
                outbound,
                respond_to,
            } => {
                self.handle_open_session(session, outbound);
                let _ = respond_to.send(());
            }
            NamespaceCommand::CloseSession {
                session,
                respond_to,
            } => {
                let removed = self.handle_close_session(session);
                let _ = respond_to.send(removed);
            }
            NamespaceCommand::Create {
                path,
                data,
                mode,
                respond_to,
            } => {
                let result = self.store.create(&path, data, mode);
                let _ = respond_to.send(result);
            }
            NamespaceCommand::Delete { path, respond_to } => {
                let result = self.handle_delete(&path);
                let _ = respond_to.send(result);
            }
            NamespaceCommand::Exists { path, respond_to } => {
                let _ = respond_to.send(self.store.exists(&path));
            }
            NamespaceCommand::Get { path, respond_to } => {
                let result = self.store.get(&path).map(str::to_string);
                let _ = respond_to.send(result);
            }
            NamespaceCommand::Set {
                path,
                data,
                respond_to,
            } => {
                let result = self.handle_set(&path, data);
                let _ = respond_to.send(result);
            }
            NamespaceCommand::Children { path, respond_to } => {
                let _ = respond_to.send(self.store.children(&path));
            }
            NamespaceCommand::Watch {
                path,
                session,
                respond_to,
            } => {
                let result = self.store.watch(&path, session);
                if result.is_ok() {
                    debug!(session = %session, path = %path, "Watch registered");
                }
                let _ = respond_to.send(result);
            }
            NamespaceCommand::GetStats { respond_to } => {
                let _ = respond_to.send(self.stats());
            }
        }
    }

    // ========================================================================
    // Command Handlers
    // ========================================================================

    fn handle_open_session(&mut self, session: SessionId, outbound: Outbound) {
        self.sessions.insert(session, outbound);
        self.store.open_session(session);

        info!(
            session = %session,
            total_sessions = self.sessions.len(),
            "Session opened"
        );
    }

    /// Removes the session's channel first so its own teardown never
    /// notifies it, then deletes its ephemeral nodes in one step.
    fn handle_close_session(&mut self, session: SessionId) -> usize {
        self.sessions.remove(session);
        let teardown = self.store.close_session(session);

        info!(
            session = %session,
            removed = teardown.removed,
            notices = teardown.notices.len(),
            total_sessions = self.sessions.len(),
            "Session closed"
        );

        self.deliver(teardown.notices);
        teardown.removed
    }

    fn handle_delete(&mut self, path: &ZnodePath) -> Result<(), NamespaceError> {
        let notices = self.store.delete(path)?;
        self.deliver(notices);
        Ok(())
    }

    fn handle_set(&mut self, path: &ZnodePath, data: String) -> Result<(), NamespaceError> {
        let notices = self.store.set(path, data)?;
        self.deliver(notices);
        Ok(())
    }

    /// Queues each notice on its watcher's outbound channel.
    fn deliver(&self, notices: Vec<WatchNotice>) {
        for notice in &notices {
            self.sessions.notify(notice);
        }
    }

    fn stats(&self) -> NamespaceStats {
        NamespaceStats {
            nodes: self.store.node_count(),
            sessions: self.sessions.len(),
        }
    }

    /// Creates a node directly, bypassing the channel (tests only).
    #[cfg(test)]
    fn create_for_test(&mut self, raw: &str, mode: nk_core::CreateMode) {
        if let Ok(path) = ZnodePath::parse(raw) {
            let _ = self.store.create(&path, "", mode);
        }
    }
}
