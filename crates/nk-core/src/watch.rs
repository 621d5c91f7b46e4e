//! One-shot watch notifications.
//!
//! Watches are node-scoped: each [`Znode`](crate::Znode) carries its own queue
//! of watching sessions. Draining the queue produces one [`WatchNotice`] per
//! queued entry; delivering them is the caller's job and happens after the
//! mutation that caused them has been applied.

use std::fmt;

use crate::{SessionId, ZnodePath};

/// What happened to a watched node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchEventKind {
    /// The node was removed (directly, by ancestor cascade, or by session teardown).
    Deleted,
    /// The node's payload was replaced.
    Changed,
}

impl fmt::Display for WatchEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deleted => write!(f, "DELETED"),
            Self::Changed => write!(f, "CHANGED"),
        }
    }
}

/// A single fired watch, addressed to one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchNotice {
    pub kind: WatchEventKind,
    pub path: ZnodePath,
    pub watcher: SessionId,
}

/// Per-node queue of pending one-shot watchers.
#[derive(Debug, Clone, Default)]
pub struct WatcherQueue {
    pending: Vec<SessionId>,
}

impl WatcherQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a watcher. Duplicates are kept and each fires once.
    pub fn push(&mut self, session: SessionId) {
        self.pending.push(session);
    }

    /// Removes every queued watcher and returns one notice per entry.
    pub fn drain(&mut self, kind: WatchEventKind, path: &ZnodePath) -> Vec<WatchNotice> {
        std::mem::take(&mut self.pending)
            .into_iter()
            .map(|watcher| WatchNotice {
                kind,
                path: path.clone(),
                watcher,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
