//! Znode record.

use indexmap::IndexMap;

use crate::watch::WatcherQueue;
use crate::{SessionId, ZnodePath};

/// Whether a created node outlives its creator's connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateMode {
    Persistent,
    /// Owned by the session; removed when that session closes.
    Ephemeral(SessionId),
}

impl CreateMode {
    pub fn owner(&self) -> Option<SessionId> {
        match self {
            Self::Persistent => None,
            Self::Ephemeral(session) => Some(*session),
        }
    }
}

/// One entry in the namespace.
#[derive(Debug, Clone)]
pub struct Znode {
    pub path: ZnodePath,

    /// `None` only for root
    pub parent: Option<ZnodePath>,

    /// Child name presence, in creation order
    pub children: IndexMap<String, ()>,

    pub data: String,

    pub watchers: WatcherQueue,

    /// Owning session for ephemeral nodes
    pub owner: Option<SessionId>,
}

impl Znode {
    pub fn new(path: ZnodePath, data: String, mode: CreateMode) -> Self {
        let parent = path.parent();
        Self {
            path,
            parent,
            children: IndexMap::new(),
            data,
            watchers: WatcherQueue::new(),
            owner: mode.owner(),
        }
    }

    pub fn root() -> Self {
        Self::new(ZnodePath::root(), String::new(), CreateMode::Persistent)
    }

    #[must_use]
    pub fn is_ephemeral(&self) -> bool {
        self.owner.is_some()
    }

    /// Child names in creation order.
    pub fn child_names(&self) -> Vec<String> {
        self.children.keys().cloned().collect()
    }
}
