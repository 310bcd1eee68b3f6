//! linechat-protocol: Shared wire definitions for client-server communication
//!
//! This crate defines the line-oriented text protocol spoken between the
//! linechat client and server over a raw TCP stream: newline-terminated
//! UTF-8 lines, no length prefix, no binary header.

pub mod codec;
pub mod messages;

// Re-export main types at crate root
pub use codec::{ClientCodec, CodecError, ServerCodec};
pub use messages::ServerLine;

/// Prompt sent to a client immediately on connect. Deliberately not
/// newline-terminated; the client reads it as raw bytes.
pub const USERNAME_PROMPT: &str = "Enter your username: ";

/// Literal line a client sends to leave the chat.
pub const EXIT_COMMAND: &str = "exit";

/// Default TCP port the server listens on.
pub const DEFAULT_PORT: u16 = 8080;

/// Maximum length of a single wire line in bytes, terminator excluded.
pub const MAX_LINE_LENGTH: usize = 4096;
