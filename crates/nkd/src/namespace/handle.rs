//! Client interface for interacting with the NamespaceActor.
//!
//! `NamespaceHandle` is a cheap-to-clone sender wrapper. Every method is one
//! request/response round trip to the actor; channel failures map to
//! `CommandError::ChannelClosed`.

use tokio::sync::{mpsc, oneshot};

use nk_core::{CreateMode, SessionId, ZnodePath};

use super::commands::{CommandError, NamespaceCommand, NamespaceStats};
use super::sessions::Outbound;

/// Handle for interacting with the namespace actor.
///
/// # Usage
///
/// ```ignore
/// let handle = spawn_namespace();
/// let path = ZnodePath::parse("/config")?;
/// handle.create(path.clone(), "v1", CreateMode::Persistent).await?;
/// assert_eq!(handle.get(path).await?, "v1");
/// ```
#[derive(Clone)]
pub struct NamespaceHandle {
    /// Command sender to the actor
    sender: mpsc::Sender<NamespaceCommand>,
}

impl NamespaceHandle {
    pub fn new(sender: mpsc::Sender<NamespaceCommand>) -> Self {
        Self { sender }
    }

    /// Sends a command built around a fresh oneshot and awaits the answer.
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> NamespaceCommand,
    ) -> Result<T, CommandError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(build(tx))
            .await
            .map_err(|_| CommandError::ChannelClosed)?;

        rx.await.map_err(|_| CommandError::ChannelClosed)
    }

    /// Registers a connection's outbound channel and ephemeral set.
    pub async fn open_session(
        &self,
        session: SessionId,
        outbound: Outbound,
    ) -> Result<(), CommandError> {
        self.request(|respond_to| NamespaceCommand::OpenSession {
            session,
            outbound,
            respond_to,
        })
        .await
    }

    /// Tears down a connection. Returns the number of nodes removed.
    pub async fn close_session(&self, session: SessionId) -> Result<usize, CommandError> {
        self.request(|respond_to| NamespaceCommand::CloseSession {
            session,
            respond_to,
        })
        .await
    }

    /// Creates a node.
    ///
    /// # Errors
    ///
    /// - `NamespaceError::AlreadyExists` if the path is taken
    /// - `NamespaceError::ParentMissing` if the parent does not exist
    /// - `CommandError::ChannelClosed` if the actor has shut down
    pub async fn create(
        &self,
        path: ZnodePath,
        data: impl Into<String>,
        mode: CreateMode,
    ) -> Result<(), CommandError> {
        let data = data.into();
        Ok(self
            .request(|respond_to| NamespaceCommand::Create {
                path,
                data,
                mode,
                respond_to,
            })
            .await??)
    }

    /// Deletes a node and its subtree.
    ///
    /// # Errors
    ///
    /// - `NamespaceError::NotFound` if the node does not exist
    /// - `NamespaceError::RootProtected` for `/`
    /// - `CommandError::ChannelClosed` if the actor has shut down
    pub async fn delete(&self, path: ZnodePath) -> Result<(), CommandError> {
        Ok(self
            .request(|respond_to| NamespaceCommand::Delete { path, respond_to })
            .await??)
    }

    pub async fn exists(&self, path: ZnodePath) -> Result<bool, CommandError> {
        self.request(|respond_to| NamespaceCommand::Exists { path, respond_to })
            .await
    }

    pub async fn get(&self, path: ZnodePath) -> Result<String, CommandError> {
        Ok(self
            .request(|respond_to| NamespaceCommand::Get { path, respond_to })
            .await??)
    }

    /// Replaces a node's payload, firing its change watches.
    pub async fn set(&self, path: ZnodePath, data: impl Into<String>) -> Result<(), CommandError> {
        let data = data.into();
        Ok(self
            .request(|respond_to| NamespaceCommand::Set {
                path,
                data,
                respond_to,
            })
            .await??)
    }

    /// Child names in creation order; empty if the node has no children.
    pub async fn children(&self, path: ZnodePath) -> Result<Vec<String>, CommandError> {
        Ok(self
            .request(|respond_to| NamespaceCommand::Children { path, respond_to })
            .await??)
    }

    /// Registers a one-shot watch for `session`.
    pub async fn watch(&self, path: ZnodePath, session: SessionId) -> Result<(), CommandError> {
        Ok(self
            .request(|respond_to| NamespaceCommand::Watch {
                path,
                session,
                respond_to,
            })
            .await??)
    }

    pub async fn stats(&self) -> Result<NamespaceStats, CommandError> {
        self.request(|respond_to| NamespaceCommand::GetStats { respond_to })
            .await
    }

    /// Check if the actor is still running.
    ///
    /// Returns `true` if the command channel is still open.
    pub fn is_connected(&self) -> bool {
        !self.sender.is_closed()
    }
}
