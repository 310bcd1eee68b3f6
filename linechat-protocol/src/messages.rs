//! Server-to-client line types

use std::fmt;

/// Fixed substring marking a join notice on the wire.
const JOINED_MARKER: &str = " joined the chat (online: ";

/// Fixed substring marking a departure notice on the wire.
const LEFT_MARKER: &str = " left the chat (online: ";

/// Lines sent from server to client
///
/// The wire encoding is the [`fmt::Display`] impl plus a trailing `\n`
/// added by the codec. [`ServerLine::parse`] is the inverse used by
/// clients to classify incoming lines; it is best-effort, since a chat
/// body is arbitrary text, and falls back to [`ServerLine::Raw`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerLine {
    /// Handshake rejection; the server closes the connection after sending
    Error { reason: String },
    /// Handshake acceptance; the session proceeds to the chat phase
    Success { info: String },
    /// A chat line relayed from another user
    Chat { username: String, body: String },
    /// Another user joined; `online` is the count after the join
    Joined { username: String, online: usize },
    /// Another user left; `online` is the count after the removal
    Left { username: String, online: usize },
    /// Anything the client could not classify
    Raw(String),
}

impl ServerLine {
    /// Convenience constructor for a handshake rejection
    pub fn error(reason: impl Into<String>) -> Self {
        Self::Error {
            reason: reason.into(),
        }
    }

    /// Convenience constructor for a handshake acceptance
    pub fn success(info: impl Into<String>) -> Self {
        Self::Success { info: info.into() }
    }

    /// Classify a wire line received from the server
    pub fn parse(line: &str) -> Self {
        if let Some(reason) = line.strip_prefix("ERROR:") {
            return Self::Error {
                reason: reason.to_string(),
            };
        }
        if let Some(info) = line.strip_prefix("SUCCESS:") {
            return Self::Success {
                info: info.to_string(),
            };
        }
        if let Some(parsed) = parse_notice(line, "✅ ", JOINED_MARKER) {
            let (username, online) = parsed;
            return Self::Joined { username, online };
        }
        if let Some(parsed) = parse_notice(line, "❌ ", LEFT_MARKER) {
            let (username, online) = parsed;
            return Self::Left { username, online };
        }
        if let Some((username, body)) = line.split_once(": ") {
            if !username.is_empty() {
                return Self::Chat {
                    username: username.to_string(),
                    body: body.to_string(),
                };
            }
        }
        Self::Raw(line.to_string())
    }
}

impl fmt::Display for ServerLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error { reason } => write!(f, "ERROR:{}", reason),
            Self::Success { info } => write!(f, "SUCCESS:{}", info),
            Self::Chat { username, body } => write!(f, "{}: {}", username, body),
            Self::Joined { username, online } => {
                write!(f, "✅ {}{}{})", username, JOINED_MARKER, online)
            }
            Self::Left { username, online } => {
                write!(f, "❌ {}{}{})", username, LEFT_MARKER, online)
            }
            Self::Raw(line) => f.write_str(line),
        }
    }
}

/// Parse a `"<emoji> <name><marker><count>)"` notice line
fn parse_notice(line: &str, prefix: &str, marker: &str) -> Option<(String, usize)> {
    let rest = line.strip_prefix(prefix)?;
    let (username, tail) = rest.split_once(marker)?;
    let online = tail.strip_suffix(')')?.parse().ok()?;
    Some((username.to_string(), online))
}
