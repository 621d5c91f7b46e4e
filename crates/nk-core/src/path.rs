//! Validated absolute znode paths.

use std::fmt;

use crate::error::NamespaceError;

/// Separator between path segments.
pub const SEPARATOR: char = '/';

/// Absolute, slash-delimited path of a znode (e.g. `/leader/conn-3`).
///
/// Construction goes through [`ZnodePath::parse`], so every value held by the
/// store satisfies:
/// - begins with `/`
/// - is either exactly `/` or has no trailing `/` and no empty segments
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ZnodePath(String);

impl ZnodePath {
    /// Parses and validates a raw path string.
    ///
    /// # Errors
    ///
    /// Returns `NamespaceError::PathMalformed` if the path does not start with
    /// the separator, ends with one (other than root) or contains `//`.
    pub fn parse(raw: &str) -> Result<Self, NamespaceError> {
        if !raw.starts_with(SEPARATOR) {
            return Err(NamespaceError::PathMalformed(raw.to_string()));
        }

        if raw.len() == 1 {
            return Ok(Self::root());
        }

        if raw.ends_with(SEPARATOR) || raw.contains("//") {
            return Err(NamespaceError::PathMalformed(raw.to_string()));
        }

        Ok(Self(raw.to_string()))
    }

    /// The root path `/`.
    pub fn root() -> Self {
        Self(SEPARATOR.to_string())
    }

    /// Returns true for `/`.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.len() == 1
    }

    /// Returns the parent path, or `None` for root.
    ///
    /// `/a` has parent `/`; `/a/b` has parent `/a`.
    pub fn parent(&self) -> Option<ZnodePath> {
        if self.is_root() {
            return None;
        }

        match self.0.rfind(SEPARATOR) {
            Some(0) => Some(Self::root()),
            Some(idx) => self.0.get(..idx).map(|p| Self(p.to_string())),
            None => None,
        }
    }

    /// Local name of the node (last segment). Empty for root.
    pub fn name(&self) -> &str {
        match self.0.rfind(SEPARATOR) {
            Some(idx) => self.0.get(idx + 1..).unwrap_or(""),
            None => "",
        }
    }

    /// Joins a local child name onto this path.
    pub fn child(&self, name: &str) -> ZnodePath {
        if self.is_root() {
            Self(format!("{SEPARATOR}{name}"))
        } else {
            Self(format!("{}{SEPARATOR}{name}", self.0))
        }
    }

    /// Returns the underlying string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ZnodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ZnodePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
