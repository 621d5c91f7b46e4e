//! Namespace actor commands and errors.
//!
//! This module defines the message types for communicating with the `NamespaceActor`:
//! - `NamespaceCommand`: Commands sent to the actor
//! - `CommandError`: Errors returned to callers of the handle
//! - `NamespaceStats`: Snapshot counters for logging and tests

use nk_core::{CreateMode, NamespaceError, SessionId, ZnodePath};
use thiserror::Error;
use tokio::sync::oneshot;

use super::sessions::Outbound;

// ============================================================================
// Namespace Commands
// ============================================================================

/// Commands sent to the namespace actor.
///
/// Each command carries a oneshot channel for the response. The actor applies
/// one command at a time, so every command is atomic with respect to all
/// others.
#[derive(Debug)]
pub enum NamespaceCommand {
    /// Register a new connection's outbound channel and ephemeral set.
    OpenSession {
        session: SessionId,
        outbound: Outbound,
        respond_to: oneshot::Sender<()>,
    },

    /// Tear down a connection: forget its channel, then delete its
    /// ephemeral nodes. Responds with the number of nodes removed.
    CloseSession {
        session: SessionId,
        respond_to: oneshot::Sender<usize>,
    },

    /// Create a persistent or ephemeral node.
    ///
    /// # Errors
    /// - `NamespaceError::AlreadyExists` if the path is taken
    /// - `NamespaceError::ParentMissing` if the parent does not exist
    Create {
        path: ZnodePath,
        data: String,
        mode: CreateMode,
        respond_to: oneshot::Sender<Result<(), NamespaceError>>,
    },

    /// Delete a node and its subtree, firing watches.
    ///
    /// # Errors
    /// - `NamespaceError::NotFound` if the node does not exist
    /// - `NamespaceError::RootProtected` for `/`
    Delete {
        path: ZnodePath,
        respond_to: oneshot::Sender<Result<(), NamespaceError>>,
    },

    Exists {
        path: ZnodePath,
        respond_to: oneshot::Sender<bool>,
    },

    Get {
        path: ZnodePath,
        respond_to: oneshot::Sender<Result<String, NamespaceError>>,
    },

    /// Replace a node's payload, firing its change watches.
    Set {
        path: ZnodePath,
        data: String,
        respond_to: oneshot::Sender<Result<(), NamespaceError>>,
    },

    Children {
        path: ZnodePath,
        respond_to: oneshot::Sender<Result<Vec<String>, NamespaceError>>,
    },

    /// Queue a one-shot watch for `session` on an existing node.
    Watch {
        path: ZnodePath,
        session: SessionId,
        respond_to: oneshot::Sender<Result<(), NamespaceError>>,
    },

    GetStats {
        respond_to: oneshot::Sender<NamespaceStats>,
    },
}

// ============================================================================
// Errors
// ============================================================================

/// Errors returned by `NamespaceHandle` methods.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// The operation was rejected by the namespace.
    #[error(transparent)]
    Namespace(#[from] NamespaceError),

    /// The response channel was closed before receiving a response.
    ///
    /// This typically indicates the actor was shut down.
    #[error("namespace channel closed")]
    ChannelClosed,
}

impl CommandError {
    /// Splits a handle result into "namespace said no" and "actor is gone".
    ///
    /// Callers that turn namespace failures into replies use this to keep
    /// `ChannelClosed` propagating with `?`.
    pub fn split<T>(result: Result<T, CommandError>) -> Result<Result<T, NamespaceError>, CommandError> {
        match result {
            Ok(value) => Ok(Ok(value)),
            Err(CommandError::Namespace(err)) => Ok(Err(err)),
            Err(err) => Err(err),
        }
    }
}

// ============================================================================
// Stats
// ============================================================================

/// Counters describing the namespace at one point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NamespaceStats {
    /// Nodes in the tree, root included
    pub nodes: usize,

    /// Connections with a registered outbound channel
    pub sessions: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_error_display() {
        let path = ZnodePath::parse("/a").unwrap();
        let err = CommandError::from(NamespaceError::NotFound(path));
        assert_eq!(err.to_string(), "node not found: /a");

        assert_eq!(
            CommandError::ChannelClosed.to_string(),
            "namespace channel closed"
        );
    }

    #[test]
    fn test_split() {
        let path = ZnodePath::parse("/a").unwrap();

        assert_eq!(CommandError::split(Ok::<_, CommandError>(3)), Ok(Ok(3)));
        assert_eq!(
            CommandError::split::<()>(Err(NamespaceError::NotFound(path.clone()).into())),
            Ok(Err(NamespaceError::NotFound(path)))
        );
        assert_eq!(
            CommandError::split::<()>(Err(CommandError::ChannelClosed)),
            Err(CommandError::ChannelClosed)
        );
    }
}
