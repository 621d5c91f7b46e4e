//! Parsing request lines.
//!
//! A request is `VERB:argument`. The line is split on the first `:` only, so
//! the argument may itself contain `:`. `SET` splits its argument once more
//! into `path:data`.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::message::Request;

/// Field delimiter on the wire.
pub const DELIMITER: char = ':';

/// Request verbs understood by the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Create,
    ECreate,
    Delete,
    Exists,
    Get,
    Set,
    Children,
    Watch,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::ECreate => "ECREATE",
            Self::Delete => "DELETE",
            Self::Exists => "EXISTS",
            Self::Get => "GET",
            Self::Set => "SET",
            Self::Children => "CHILDREN",
            Self::Watch => "WATCH",
        }
    }
}

impl FromStr for Verb {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATE" => Ok(Self::Create),
            "ECREATE" => Ok(Self::ECreate),
            "DELETE" => Ok(Self::Delete),
            "EXISTS" => Ok(Self::Exists),
            "GET" => Ok(Self::Get),
            "SET" => Ok(Self::Set),
            "CHILDREN" => Ok(Self::Children),
            "WATCH" => Ok(Self::Watch),
            other => Err(ParseError::UnknownVerb(other.to_string())),
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors for lines that cannot be turned into a [`Request`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// No `:` between verb and argument
    #[error("missing delimiter")]
    MissingDelimiter,

    #[error("unknown verb: {0}")]
    UnknownVerb(String),

    /// `SET` argument without a `path:data` split
    #[error("missing data for SET")]
    MissingData,
}

impl Request {
    /// Parses one request line (terminator already stripped).
    ///
    /// # Errors
    /// - `ParseError::MissingDelimiter` if the line has no `:`
    /// - `ParseError::UnknownVerb` if the verb is not recognised
    /// - `ParseError::MissingData` if a `SET` argument has no second `:`
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let (verb, argument) = line
            .split_once(DELIMITER)
            .ok_or(ParseError::MissingDelimiter)?;

        let path = argument.to_string();
        let request = match verb.parse::<Verb>()? {
            Verb::Create => Request::Create { path },
            Verb::ECreate => Request::ECreate { path },
            Verb::Delete => Request::Delete { path },
            Verb::Exists => Request::Exists { path },
            Verb::Get => Request::Get { path },
            Verb::Children => Request::Children { path },
            Verb::Watch => Request::Watch { path },
            Verb::Set => {
                let (path, data) = argument
                    .split_once(DELIMITER)
                    .ok_or(ParseError::MissingData)?;
                Request::Set {
                    path: path.to_string(),
                    data: data.to_string(),
                }
            }
        };

        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_path_verbs() {
        assert_eq!(
            Request::parse("CREATE:/nhat").unwrap(),
            Request::Create {
                path: "/nhat".to_string()
            }
        );
        assert_eq!(
            Request::parse("ECREATE:/leader/a").unwrap(),
            Request::ECreate {
                path: "/leader/a".to_string()
            }
        );
        assert_eq!(
            Request::parse("CHILDREN:/").unwrap(),
            Request::Children {
                path: "/".to_string()
            }
        );
        assert!(matches!(
            Request::parse("WATCH:/w").unwrap(),
            Request::Watch { path } if path == "/w"
        ));
    }

    #[test]
    fn test_parse_keeps_raw_path() {
        // Path validation belongs to the namespace, not the parser
        assert_eq!(
            Request::parse("DELETE:relative").unwrap(),
            Request::Delete {
                path: "relative".to_string()
            }
        );
        assert_eq!(
            Request::parse("GET:").unwrap(),
            Request::Get {
                path: String::new()
            }
        );
    }

    #[test]
    fn test_parse_set_splits_once_more() {
        assert_eq!(
            Request::parse("SET:/nhat:yolo baggins").unwrap(),
            Request::Set {
                path: "/nhat".to_string(),
                data: "yolo baggins".to_string()
            }
        );
        assert_eq!(
            Request::parse("SET:/cfg:a:b,c").unwrap(),
            Request::Set {
                path: "/cfg".to_string(),
                data: "a:b,c".to_string()
            }
        );
        assert_eq!(
            Request::parse("SET:/empty:").unwrap(),
            Request::Set {
                path: "/empty".to_string(),
                data: String::new()
            }
        );
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            Request::parse("CREATE /nhat"),
            Err(ParseError::MissingDelimiter)
        );
        assert_eq!(Request::parse(""), Err(ParseError::MissingDelimiter));
        assert_eq!(
            Request::parse("create:/nhat"),
            Err(ParseError::UnknownVerb("create".to_string()))
        );
        assert_eq!(Request::parse("SET:/nhat"), Err(ParseError::MissingData));
    }

    #[test]
    fn test_verb_round_trip() {
        for verb in [
            Verb::Create,
            Verb::ECreate,
            Verb::Delete,
            Verb::Exists,
            Verb::Get,
            Verb::Set,
            Verb::Children,
            Verb::Watch,
        ] {
            assert_eq!(verb.as_str().parse::<Verb>().unwrap(), verb);
        }
    }
}
