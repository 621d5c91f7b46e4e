//! Request and reply types.
//!
//! Replies render to their exact wire text through `Display`; the transport
//! adds the line terminator.

use std::fmt;

use nk_core::{NamespaceError, WatchEventKind, WatchNotice, ZnodePath};

use crate::parse::Verb;

/// Prefix shared by every unsolicited watch notification.
pub const NOTICE_PREFIX: &str = "true:WATCHER_NOTICE:";

/// A decoded request line. Paths are kept raw; the dispatcher validates them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Create { path: String },
    ECreate { path: String },
    Delete { path: String },
    Exists { path: String },
    Get { path: String },
    Set { path: String, data: String },
    Children { path: String },
    Watch { path: String },
}

impl Request {
    pub fn verb(&self) -> Verb {
        match self {
            Self::Create { .. } => Verb::Create,
            Self::ECreate { .. } => Verb::ECreate,
            Self::Delete { .. } => Verb::Delete,
            Self::Exists { .. } => Verb::Exists,
            Self::Get { .. } => Verb::Get,
            Self::Set { .. } => Verb::Set,
            Self::Children { .. } => Verb::Children,
            Self::Watch { .. } => Verb::Watch,
        }
    }

    /// The raw path argument.
    pub fn path(&self) -> &str {
        match self {
            Self::Create { path }
            | Self::ECreate { path }
            | Self::Delete { path }
            | Self::Exists { path }
            | Self::Get { path }
            | Self::Set { path, .. }
            | Self::Children { path }
            | Self::Watch { path } => path,
        }
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Set { path, data } => write!(f, "{}:{path}:{data}", self.verb()),
            other => write!(f, "{}:{}", other.verb(), other.path()),
        }
    }
}

/// A line sent from the daemon to a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Greeting sent as soon as a connection is accepted
    Connected,

    Created(ZnodePath),

    EphemeralCreated(ZnodePath),

    Deleted(ZnodePath),

    /// DELETE failure, echoing the raw path
    NotDeleted(String),

    /// EXISTS answer
    Exists(bool),

    /// GET answer: the payload verbatim
    Data(String),

    SetOk(ZnodePath),

    /// CHILDREN answer, comma-joined; empty list renders as an empty line
    Children(Vec<String>),

    Watching(ZnodePath),

    WatchRejected { reason: String, path: String },

    /// `false` or `false:<reason>`
    Failure(Option<String>),

    /// Unsolicited watch notification
    Notice { kind: WatchEventKind, path: ZnodePath },
}

impl Reply {
    /// Plain `false`.
    pub fn failure() -> Self {
        Self::Failure(None)
    }

    /// `false:<reason>`.
    pub fn failure_with(reason: impl Into<String>) -> Self {
        Self::Failure(Some(reason.into()))
    }

    /// Builds the notification line for a fired watch.
    pub fn notice(notice: &WatchNotice) -> Self {
        Self::Notice {
            kind: notice.kind,
            path: notice.path.clone(),
        }
    }

    #[must_use]
    pub fn is_notice(&self) -> bool {
        matches!(self, Self::Notice { .. })
    }
}

/// Returns true if a received line is a watch notification rather than a reply.
pub fn is_notice_line(line: &str) -> bool {
    line.starts_with(NOTICE_PREFIX)
}

/// Wire reason for a failed CREATE/ECREATE.
pub fn failure_reason(err: &NamespaceError) -> &'static str {
    match err {
        NamespaceError::PathMalformed(_) => "bad node name",
        NamespaceError::ParentMissing(_) => "path up to node does not exist",
        NamespaceError::AlreadyExists(_) => "node already exists",
        NamespaceError::NotFound(_) => "node does not exist",
        NamespaceError::RootProtected => "root node is protected",
    }
}

/// Wire reason for a failed WATCH.
pub fn watch_failure_reason(err: &NamespaceError) -> &'static str {
    match err {
        NamespaceError::PathMalformed(_) => "improper naming",
        other => failure_reason(other),
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected => write!(f, "true:Connected"),
            Self::Created(path) => write!(f, "true:CREATED:{path}"),
            Self::EphemeralCreated(path) => write!(f, "true:CREATED_ENODE:{path}"),
            Self::Deleted(path) => write!(f, "true:DELETED:{path}"),
            Self::NotDeleted(path) => write!(f, "false:NOT DELETED:{path}"),
            Self::Exists(exists) => write!(f, "{exists}"),
            Self::Data(data) => f.write_str(data),
            Self::SetOk(path) => write!(f, "true:SET:{path}"),
            Self::Children(names) => f.write_str(&names.join(",")),
            Self::Watching(path) => write!(f, "true:WATCHING:{path}"),
            Self::WatchRejected { reason, path } => {
                write!(f, "false:WATCHING:{reason}:{path}")
            }
            Self::Failure(None) => write!(f, "false"),
            Self::Failure(Some(reason)) => write!(f, "false:{reason}"),
            Self::Notice { kind, path } => write!(f, "{NOTICE_PREFIX}{kind}:{path}"),
        }
    }
}
