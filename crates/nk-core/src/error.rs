//! Namespace error types following panic-free policy.

use crate::ZnodePath;
use thiserror::Error;

/// Errors returned by namespace operations.
///
/// None of these are fatal: each surfaces as a `false[:reason]` reply to the
/// issuing session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NamespaceError {
    /// Path does not start with `/` or has empty segments
    #[error("malformed path: {0:?}")]
    PathMalformed(String),

    /// Parent of the path being created does not exist
    #[error("parent of {0} does not exist")]
    ParentMissing(ZnodePath),

    /// Node already exists at this path
    #[error("node already exists: {0}")]
    AlreadyExists(ZnodePath),

    /// No node at this path
    #[error("node not found: {0}")]
    NotFound(ZnodePath),

    /// The root node cannot be deleted
    #[error("the root node cannot be deleted")]
    RootProtected,
}

/// Result type for namespace operations.
pub type NamespaceResult<T> = Result<T, NamespaceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_error_display() {
        let path = ZnodePath::parse("/a/b").unwrap();

        assert_eq!(
            NamespaceError::PathMalformed("a".to_string()).to_string(),
            "malformed path: \"a\""
        );
        assert_eq!(
            NamespaceError::ParentMissing(path.clone()).to_string(),
            "parent of /a/b does not exist"
        );
        assert_eq!(
            NamespaceError::AlreadyExists(path.clone()).to_string(),
            "node already exists: /a/b"
        );
        assert_eq!(
            NamespaceError::NotFound(path).to_string(),
            "node not found: /a/b"
        );
        assert_eq!(
            NamespaceError::RootProtected.to_string(),
            "the root node cannot be deleted"
        );
    }
}
