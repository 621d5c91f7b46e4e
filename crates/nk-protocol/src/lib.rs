//! nodekeeper protocol - line-oriented wire protocol
//!
//! Requests are `VERB:argument` lines; replies are `true[:EVENT[:detail]]`
//! or `false[:reason]` lines. Framing (splitting the byte stream on line
//! terminators) is left to the transport.

pub mod message;
pub mod parse;

pub use message::{
    failure_reason, is_notice_line, watch_failure_reason, Reply, Request, NOTICE_PREFIX,
};
pub use parse::{ParseError, Verb, DELIMITER};
