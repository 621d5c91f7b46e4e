//! Request dispatch: one decoded line in, one reply out.
//!
//! `CommandDispatcher` binds a connection's `SessionId` to the shared
//! `NamespaceHandle`. Every namespace failure becomes a `false[:reason]`
//! reply; only a dead namespace actor surfaces as an error.

use tracing::debug;

use nk_core::{CreateMode, NamespaceError, SessionId, ZnodePath};
use nk_protocol::{failure_reason, watch_failure_reason, ParseError, Reply, Request};

use crate::namespace::{CommandError, NamespaceHandle};

/// Reason sent for a line without a `:` between verb and argument.
pub const BAD_MESSAGE: &str = "bad message";

/// Reason sent for an unrecognised verb.
pub const UNKNOWN_COMMAND: &str = "unknown command";

/// Turns request lines from one session into namespace operations.
#[derive(Clone)]
pub struct CommandDispatcher {
    namespace: NamespaceHandle,
    session: SessionId,
}

impl CommandDispatcher {
    pub fn new(namespace: NamespaceHandle, session: SessionId) -> Self {
        Self { namespace, session }
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Handles one request line (terminator already stripped).
    ///
    /// # Errors
    ///
    /// Returns `CommandError::ChannelClosed` if the namespace actor is gone.
    /// Namespace rejections are encoded in the returned `Reply`.
    pub async fn dispatch(&self, line: &str) -> Result<Reply, CommandError> {
        let request = match Request::parse(line) {
            Ok(request) => request,
            Err(e) => {
                debug!(session = %self.session, error = %e, "Rejected request line");
                return Ok(parse_failure(&e));
            }
        };

        debug!(session = %self.session, verb = %request.verb(), path = request.path(), "Request");

        match request {
            Request::Create { path } => self.create(&path, CreateMode::Persistent).await,
            Request::ECreate { path } => {
                self.create(&path, CreateMode::Ephemeral(self.session)).await
            }
            Request::Delete { path } => self.delete(path).await,
            Request::Exists { path } => self.exists(&path).await,
            Request::Get { path } => self.get(&path).await,
            Request::Set { path, data } => self.set(&path, data).await,
            Request::Children { path } => self.children(&path).await,
            Request::Watch { path } => self.watch(path).await,
        }
    }

    // ========================================================================
    // Verb Handlers
    // ========================================================================

    async fn create(&self, raw: &str, mode: CreateMode) -> Result<Reply, CommandError> {
        let path = match ZnodePath::parse(raw) {
            Ok(path) => path,
            Err(e) => return Ok(Reply::failure_with(failure_reason(&e))),
        };

        let result = self.namespace.create(path.clone(), "", mode).await;
        Ok(match CommandError::split(result)? {
            Ok(()) if mode.owner().is_some() => Reply::EphemeralCreated(path),
            Ok(()) => Reply::Created(path),
            Err(e) => Reply::failure_with(failure_reason(&e)),
        })
    }

    async fn delete(&self, raw: String) -> Result<Reply, CommandError> {
        let Ok(path) = ZnodePath::parse(&raw) else {
            return Ok(Reply::NotDeleted(raw));
        };

        let result = self.namespace.delete(path.clone()).await;
        Ok(match CommandError::split(result)? {
            Ok(()) => Reply::Deleted(path),
            Err(_) => Reply::NotDeleted(raw),
        })
    }

    async fn exists(&self, raw: &str) -> Result<Reply, CommandError> {
        let Ok(path) = ZnodePath::parse(raw) else {
            return Ok(Reply::Exists(false));
        };

        Ok(Reply::Exists(self.namespace.exists(path).await?))
    }

    async fn get(&self, raw: &str) -> Result<Reply, CommandError> {
        let Ok(path) = ZnodePath::parse(raw) else {
            return Ok(Reply::failure());
        };

        let result = self.namespace.get(path).await;
        Ok(CommandError::split(result)?.map_or_else(|_| Reply::failure(), Reply::Data))
    }

    async fn set(&self, raw: &str, data: String) -> Result<Reply, CommandError> {
        let Ok(path) = ZnodePath::parse(raw) else {
            return Ok(Reply::failure());
        };

        let result = self.namespace.set(path.clone(), data).await;
        Ok(match CommandError::split(result)? {
            Ok(()) => Reply::SetOk(path),
            Err(_) => Reply::failure(),
        })
    }

    async fn children(&self, raw: &str) -> Result<Reply, CommandError> {
        let Ok(path) = ZnodePath::parse(raw) else {
            return Ok(Reply::failure());
        };

        let result = self.namespace.children(path).await;
        Ok(CommandError::split(result)?.map_or_else(|_| Reply::failure(), Reply::Children))
    }

    async fn watch(&self, raw: String) -> Result<Reply, CommandError> {
        let path = match ZnodePath::parse(&raw) {
            Ok(path) => path,
            Err(e) => return Ok(watch_rejected(&e, raw)),
        };

        let result = self.namespace.watch(path.clone(), self.session).await;
        Ok(match CommandError::split(result)? {
            Ok(()) => Reply::Watching(path),
            Err(e) => watch_rejected(&e, raw),
        })
    }
}

fn parse_failure(err: &ParseError) -> Reply {
    match err {
        ParseError::MissingDelimiter => Reply::failure_with(BAD_MESSAGE),
        ParseError::UnknownVerb(_) => Reply::failure_with(UNKNOWN_COMMAND),
        ParseError::MissingData => Reply::failure(),
    }
}

fn watch_rejected(err: &NamespaceError, path: String) -> Reply {
    Reply::WatchRejected {
        reason: watch_failure_reason(err).to_string(),
        path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespace::spawn_namespace;
    use tokio::sync::mpsc;

    async fn dispatcher(id: u64) -> (CommandDispatcher, mpsc::UnboundedReceiver<Reply>) {
        let namespace = spawn_namespace();
        attach(&namespace, id).await
    }

    async fn attach(
        namespace: &NamespaceHandle,
        id: u64,
    ) -> (CommandDispatcher, mpsc::UnboundedReceiver<Reply>) {
        let session = SessionId::new(id);
        let (tx, rx) = mpsc::unbounded_channel();
        namespace.open_session(session, tx).await.unwrap();
        (CommandDispatcher::new(namespace.clone(), session), rx)
    }

    async fn send(d: &CommandDispatcher, line: &str) -> String {
        d.dispatch(line).await.unwrap().to_string()
    }

    #[tokio::test]
    async fn test_basic_scenario() {
        let (d, _rx) = dispatcher(1).await;

        assert_eq!(send(&d, "CREATE:/nhat").await, "true:CREATED:/nhat");
        assert_eq!(send(&d, "EXISTS:/nhat").await, "true");
        assert_eq!(send(&d, "GET:/nhat").await, "");
        assert_eq!(send(&d, "SET:/nhat:hello").await, "true:SET:/nhat");
        assert_eq!(send(&d, "GET:/nhat").await, "hello");
        assert_eq!(send(&d, "CHILDREN:/").await, "nhat");
        assert_eq!(send(&d, "DELETE:/nhat").await, "true:DELETED:/nhat");
        assert_eq!(send(&d, "EXISTS:/nhat").await, "false");
    }

    #[tokio::test]
    async fn test_create_failures() {
        let (d, _rx) = dispatcher(1).await;

        assert_eq!(send(&d, "CREATE:nhat").await, "false:bad node name");
        assert_eq!(send(&d, "CREATE:/a//b").await, "false:bad node name");
        assert_eq!(
            send(&d, "CREATE:/a/b").await,
            "false:path up to node does not exist"
        );
        assert_eq!(send(&d, "CREATE:/a").await, "true:CREATED:/a");
        assert_eq!(send(&d, "ECREATE:/a").await, "false:node already exists");
        assert_eq!(send(&d, "CREATE:/").await, "false:node already exists");
    }

    #[tokio::test]
    async fn test_ecreate_reply() {
        let (d, _rx) = dispatcher(4).await;

        assert_eq!(send(&d, "CREATE:/leader").await, "true:CREATED:/leader");
        assert_eq!(
            send(&d, "ECREATE:/leader/a").await,
            "true:CREATED_ENODE:/leader/a"
        );
    }

    #[tokio::test]
    async fn test_delete_failures_echo_raw_path() {
        let (d, _rx) = dispatcher(1).await;

        assert_eq!(send(&d, "DELETE:/missing").await, "false:NOT DELETED:/missing");
        assert_eq!(send(&d, "DELETE:/").await, "false:NOT DELETED:/");
        assert_eq!(send(&d, "DELETE:oops").await, "false:NOT DELETED:oops");
    }

    #[tokio::test]
    async fn test_plain_false_failures() {
        let (d, _rx) = dispatcher(1).await;

        assert_eq!(send(&d, "EXISTS:bad").await, "false");
        assert_eq!(send(&d, "GET:/missing").await, "false");
        assert_eq!(send(&d, "SET:/missing:x").await, "false");
        assert_eq!(send(&d, "SET:/nodata").await, "false");
        assert_eq!(send(&d, "CHILDREN:/missing").await, "false");
    }

    #[tokio::test]
    async fn test_line_level_failures() {
        let (d, _rx) = dispatcher(1).await;

        assert_eq!(send(&d, "garbage").await, "false:bad message");
        assert_eq!(send(&d, "").await, "false:bad message");
        assert_eq!(send(&d, "FROB:/x").await, "false:unknown command");
        assert_eq!(send(&d, "create:/x").await, "false:unknown command");
    }

    #[tokio::test]
    async fn test_set_payload_keeps_delimiters() {
        let (d, _rx) = dispatcher(1).await;

        send(&d, "CREATE:/cfg").await;
        assert_eq!(send(&d, "SET:/cfg:a:b,c").await, "true:SET:/cfg");
        assert_eq!(send(&d, "GET:/cfg").await, "a:b,c");
    }

    #[tokio::test]
    async fn test_empty_children_is_empty_line() {
        let (d, _rx) = dispatcher(1).await;

        send(&d, "CREATE:/leaf").await;
        assert_eq!(send(&d, "CHILDREN:/leaf").await, "");
    }

    #[tokio::test]
    async fn test_watch_replies() {
        let (d, _rx) = dispatcher(1).await;

        send(&d, "CREATE:/w").await;
        assert_eq!(send(&d, "WATCH:/w").await, "true:WATCHING:/w");
        assert_eq!(
            send(&d, "WATCH:/missing").await,
            "false:WATCHING:node does not exist:/missing"
        );
        assert_eq!(
            send(&d, "WATCH:w").await,
            "false:WATCHING:improper naming:w"
        );
    }

    #[tokio::test]
    async fn test_watch_notice_goes_to_watcher_only() {
        let namespace = spawn_namespace();
        let (watcher, mut watcher_rx) = attach(&namespace, 1).await;
        let (writer, mut writer_rx) = attach(&namespace, 2).await;

        send(&writer, "CREATE:/cfg").await;
        send(&watcher, "WATCH:/cfg").await;
        send(&writer, "SET:/cfg:v1").await;

        assert_eq!(
            watcher_rx.recv().await.unwrap().to_string(),
            "true:WATCHER_NOTICE:CHANGED:/cfg"
        );
        assert!(writer_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_dead_namespace_is_an_error() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let d = CommandDispatcher::new(NamespaceHandle::new(tx), SessionId::new(1));

        assert_eq!(d.dispatch("EXISTS:/").await, Err(CommandError::ChannelClosed));
        // Parse failures never reach the namespace
        assert_eq!(
            d.dispatch("nope").await.unwrap().to_string(),
            "false:bad message"
        );
    }
}
