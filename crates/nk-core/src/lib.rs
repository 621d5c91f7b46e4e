//! nodekeeper core - the in-memory znode namespace
//!
//! This crate holds the domain types shared between the daemon (`nkd`) and
//! the wire protocol (`nk-protocol`): validated paths, session ids, the node
//! record, one-shot watch queues and the namespace store itself.
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod error;
pub mod node;
pub mod path;
pub mod session;
pub mod store;
pub mod watch;

// Re-exports for convenience
pub use error::{NamespaceError, NamespaceResult};
pub use node::{CreateMode, Znode};
pub use path::{ZnodePath, SEPARATOR};
pub use session::SessionId;
pub use store::{NamespaceStore, SessionTeardown};
pub use watch::{WatchEventKind, WatchNotice, WatcherQueue};
