//! nodekeeper daemon library.
//!
//! This crate provides the daemon side of nodekeeper, a small coordination
//! service holding a hierarchical namespace of znodes in memory.
//!
//! # Architecture
//!
//! The daemon uses the actor pattern: a single `NamespaceActor` task owns the
//! znode tree and the table of connected sessions. Each TCP connection runs a
//! `ConnectionHandler` that turns request lines into `NamespaceCommand`s via a
//! `CommandDispatcher`, and a writer task that delivers replies and watch
//! notices back to the client.
//!
//! # Modules
//!
//! - `config`: Layered daemon configuration (defaults, TOML, environment)
//! - `dispatch`: Request line to reply mapping for one session
//! - `namespace`: Namespace actor, handle, and session table
//! - `server`: TCP listener and per-connection handlers

pub mod config;
pub mod dispatch;
pub mod namespace;
pub mod server;
