//! In-memory znode tree.
//!
//! `NamespaceStore` is a plain, synchronous data structure. It has no notion
//! of connections or channels: operations that fire watches return the
//! resulting [`WatchNotice`]s and the caller delivers them once the operation
//! has been applied. Callers are expected to serialize access (the daemon does
//! this by giving the store to a single actor task).
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()` or direct indexing
//! - A child entry without a backing node is logged and skipped

use std::collections::HashMap;

use indexmap::IndexSet;
use tracing::{debug, error, warn};

use crate::error::{NamespaceError, NamespaceResult};
use crate::node::{CreateMode, Znode};
use crate::watch::{WatchEventKind, WatchNotice};
use crate::{SessionId, ZnodePath};

/// Outcome of closing a session.
#[derive(Debug, Clone, Default)]
pub struct SessionTeardown {
    /// Number of nodes removed (ephemeral roots plus their subtrees)
    pub removed: usize,

    /// Watches fired by the removals
    pub notices: Vec<WatchNotice>,
}

/// The znode tree plus the ephemeral ownership index.
#[derive(Debug)]
pub struct NamespaceStore {
    /// Every live node keyed by its path. Always contains `/`.
    nodes: HashMap<ZnodePath, Znode>,

    /// Ephemeral paths still present, per owning session, in creation order.
    ephemerals: HashMap<SessionId, IndexSet<ZnodePath>>,
}

impl Default for NamespaceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl NamespaceStore {
    /// Creates a store holding only the root node.
    pub fn new() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(ZnodePath::root(), Znode::root());
        Self {
            nodes,
            ephemerals: HashMap::new(),
        }
    }

    // ========================================================================
    // Node Operations
    // ========================================================================

    /// Creates a node under an existing parent.
    ///
    /// # Errors
    /// - `NamespaceError::AlreadyExists` if the path is taken (including `/`)
    /// - `NamespaceError::ParentMissing` if the parent does not exist
    pub fn create(
        &mut self,
        path: &ZnodePath,
        data: impl Into<String>,
        mode: CreateMode,
    ) -> NamespaceResult<()> {
        if self.nodes.contains_key(path) {
            return Err(NamespaceError::AlreadyExists(path.clone()));
        }

        let parent_path = path
            .parent()
            .ok_or_else(|| NamespaceError::AlreadyExists(path.clone()))?;

        let parent = self
            .nodes
            .get_mut(&parent_path)
            .ok_or_else(|| NamespaceError::ParentMissing(path.clone()))?;

        parent.children.insert(path.name().to_string(), ());

        let node = Znode::new(path.clone(), data.into(), mode);
        if let Some(owner) = node.owner {
            self.ephemerals
                .entry(owner)
                .or_default()
                .insert(path.clone());
        }
        self.nodes.insert(path.clone(), node);

        debug!(path = %path, mode = ?mode, "Node created");
        Ok(())
    }

    /// Deletes a node and its entire subtree.
    ///
    /// Returns one `Deleted` notice per watcher queued on any removed node.
    ///
    /// # Errors
    /// - `NamespaceError::RootProtected` for `/`
    /// - `NamespaceError::NotFound` if the node does not exist
    pub fn delete(&mut self, path: &ZnodePath) -> NamespaceResult<Vec<WatchNotice>> {
        let (notices, _) = self.delete_counted(path)?;
        Ok(notices)
    }

    fn delete_counted(&mut self, path: &ZnodePath) -> NamespaceResult<(Vec<WatchNotice>, usize)> {
        if path.is_root() {
            return Err(NamespaceError::RootProtected);
        }

        if !self.nodes.contains_key(path) {
            return Err(NamespaceError::NotFound(path.clone()));
        }

        if let Some(parent_path) = path.parent() {
            if let Some(parent) = self.nodes.get_mut(&parent_path) {
                parent.children.shift_remove(path.name());
            }
        }

        let (notices, removed) = self.remove_subtree(path);
        debug!(
            path = %path,
            removed = removed,
            notices = notices.len(),
            "Subtree deleted"
        );
        Ok((notices, removed))
    }

    /// Removes `top` and every descendant, draining each node's watchers.
    ///
    /// The caller has already unlinked `top` from its parent.
    fn remove_subtree(&mut self, top: &ZnodePath) -> (Vec<WatchNotice>, usize) {
        let mut notices = Vec::new();
        let mut removed = 0;
        let mut stack = vec![top.clone()];

        while let Some(current) = stack.pop() {
            let Some(mut node) = self.nodes.remove(&current) else {
                error!(
                    path = %current,
                    "Child entry has no backing node, skipping"
                );
                continue;
            };

            stack.extend(node.children.keys().map(|name| current.child(name)));
            notices.extend(node.watchers.drain(WatchEventKind::Deleted, &current));

            if let Some(owner) = node.owner {
                self.forget_ephemeral(owner, &current);
            }
            removed += 1;
        }

        (notices, removed)
    }

    /// Returns true if a node exists at `path`.
    pub fn exists(&self, path: &ZnodePath) -> bool {
        self.nodes.contains_key(path)
    }

    /// Returns a node's payload.
    ///
    /// # Errors
    /// - `NamespaceError::NotFound` if the node does not exist
    pub fn get(&self, path: &ZnodePath) -> NamespaceResult<&str> {
        self.node(path)
            .map(|node| node.data.as_str())
            .ok_or_else(|| NamespaceError::NotFound(path.clone()))
    }

    /// Replaces a node's payload and fires its pending watches.
    ///
    /// # Errors
    /// - `NamespaceError::NotFound` if the node does not exist
    pub fn set(
        &mut self,
        path: &ZnodePath,
        data: impl Into<String>,
    ) -> NamespaceResult<Vec<WatchNotice>> {
        let node = self
            .nodes
            .get_mut(path)
            .ok_or_else(|| NamespaceError::NotFound(path.clone()))?;

        node.data = data.into();
        Ok(node.watchers.drain(WatchEventKind::Changed, path))
    }

    /// Returns immediate child names in creation order.
    ///
    /// An empty vector means the node exists and has no children.
    ///
    /// # Errors
    /// - `NamespaceError::NotFound` if the node does not exist
    pub fn children(&self, path: &ZnodePath) -> NamespaceResult<Vec<String>> {
        self.node(path)
            .map(Znode::child_names)
            .ok_or_else(|| NamespaceError::NotFound(path.clone()))
    }

    /// Registers a one-shot watch on an existing node.
    ///
    /// # Errors
    /// - `NamespaceError::NotFound` if the node does not exist (nothing is registered)
    pub fn watch(&mut self, path: &ZnodePath, session: SessionId) -> NamespaceResult<()> {
        let node = self
            .nodes
            .get_mut(path)
            .ok_or_else(|| NamespaceError::NotFound(path.clone()))?;

        node.watchers.push(session);
        Ok(())
    }

    // ========================================================================
    // Session Lifecycle
    // ========================================================================

    /// Allocates an empty ephemeral set for a new session.
    pub fn open_session(&mut self, session: SessionId) {
        self.ephemerals.entry(session).or_default();
    }

    /// Deletes every ephemeral node the session still owns.
    ///
    /// Paths that vanished in an earlier cascade of this same teardown are
    /// skipped without aborting the rest.
    pub fn close_session(&mut self, session: SessionId) -> SessionTeardown {
        let mut teardown = SessionTeardown::default();

        let Some(owned) = self.ephemerals.remove(&session) else {
            return teardown;
        };

        for path in owned {
            match self.delete_counted(&path) {
                Ok((notices, removed)) => {
                    teardown.removed += removed;
                    teardown.notices.extend(notices);
                }
                Err(NamespaceError::NotFound(_)) => {
                    debug!(
                        session = %session,
                        path = %path,
                        "Ephemeral node already gone"
                    );
                }
                Err(e) => {
                    warn!(
                        session = %session,
                        path = %path,
                        error = %e,
                        "Failed to remove ephemeral node"
                    );
                }
            }
        }

        teardown
    }

    fn forget_ephemeral(&mut self, owner: SessionId, path: &ZnodePath) {
        if let Some(owned) = self.ephemerals.get_mut(&owner) {
            owned.shift_remove(path);
        }
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    pub fn node(&self, path: &ZnodePath) -> Option<&Znode> {
        self.nodes.get(path)
    }

    /// Number of nodes, root included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Ephemeral paths the session currently owns, in creation order.
    pub fn ephemerals(&self, session: SessionId) -> Vec<ZnodePath> {
        self.ephemerals
            .get(&session)
            .map(|owned| owned.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of pending watchers on a node, `None` if it does not exist.
    pub fn watcher_count(&self, path: &ZnodePath) -> Option<usize> {
        self.node(path).map(|node| node.watchers.len())
    }

    /// Number of sessions with an ephemeral set.
    pub fn session_count(&self) -> usize {
        self.ephemerals.len()
    }
}
