//! linechat server internals
//!
//! The server is three cooperating pieces: the [`registry`] (the single
//! source of truth for who is online), the [`relay`] (fan-out of one line
//! to every other registered connection), and the per-connection
//! [`session`] state machine. [`server`] ties them to a TCP listener.

pub mod config;
pub mod registry;
pub mod relay;
pub mod server;
pub mod session;
