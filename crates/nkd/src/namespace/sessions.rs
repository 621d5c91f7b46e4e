//! Session table: which outbound channel belongs to which session.
//!
//! The table lives inside the namespace actor next to the store, so tree
//! nodes only ever hold `SessionId`s and never a live connection.

use std::collections::HashMap;

use tokio::sync::mpsc;
use tracing::debug;

use nk_core::{SessionId, WatchNotice};
use nk_protocol::Reply;

/// Sending half of a connection's outbound reply queue.
///
/// Unbounded so that queueing a notice never blocks the actor.
pub type Outbound = mpsc::UnboundedSender<Reply>;

#[derive(Debug, Default)]
pub struct SessionTable {
    outbound: HashMap<SessionId, Outbound>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) a session's outbound channel.
    pub fn insert(&mut self, session: SessionId, outbound: Outbound) {
        self.outbound.insert(session, outbound);
    }

    /// Forgets a session. Returns true if it was registered.
    pub fn remove(&mut self, session: SessionId) -> bool {
        self.outbound.remove(&session).is_some()
    }

    pub fn contains(&self, session: SessionId) -> bool {
        self.outbound.contains_key(&session)
    }

    pub fn len(&self) -> usize {
        self.outbound.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outbound.is_empty()
    }

    /// Queues a watch notice on the watcher's outbound channel.
    ///
    /// Returns false if the watcher is gone (closed session or dead writer);
    /// the notice is dropped in that case.
    pub fn notify(&self, notice: &WatchNotice) -> bool {
        let Some(outbound) = self.outbound.get(&notice.watcher) else {
            debug!(
                session = %notice.watcher,
                path = %notice.path,
                "Dropping notice for closed session"
            );
            return false;
        };

        if outbound.send(Reply::notice(notice)).is_err() {
            debug!(
                session = %notice.watcher,
                path = %notice.path,
                "Outbound channel closed, notice dropped"
            );
            return false;
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nk_core::{WatchEventKind, ZnodePath};

    fn notice(watcher: u64) -> WatchNotice {
        WatchNotice {
            kind: WatchEventKind::Deleted,
            path: ZnodePath::parse("/n").unwrap(),
            watcher: SessionId::new(watcher),
        }
    }

    #[test]
    fn test_notify_registered_session() {
        let mut table = SessionTable::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        table.insert(SessionId::new(1), tx);

        assert!(table.notify(&notice(1)));
        assert_eq!(
            rx.try_recv().unwrap().to_string(),
            "true:WATCHER_NOTICE:DELETED:/n"
        );
    }

    #[test]
    fn test_notify_unknown_session_is_dropped() {
        let table = SessionTable::new();
        assert!(!table.notify(&notice(5)));
    }

    #[test]
    fn test_notify_closed_receiver() {
        let mut table = SessionTable::new();
        let (tx, rx) = mpsc::unbounded_channel();
        table.insert(SessionId::new(1), tx);
        drop(rx);

        assert!(!table.notify(&notice(1)));
    }

    #[test]
    fn test_remove() {
        let mut table = SessionTable::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        table.insert(SessionId::new(1), tx);

        assert!(table.contains(SessionId::new(1)));
        assert!(table.remove(SessionId::new(1)));
        assert!(!table.remove(SessionId::new(1)));
        assert!(table.is_empty());
    }
}
