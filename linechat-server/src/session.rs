//! Per-connection session handler
//!
//! One task per accepted connection drives the state machine
//! `Connected -> Authenticating -> Active -> Closing -> Closed`. The
//! session exclusively owns its socket; all shared mutation goes through
//! the registry's synchronized API, and lines from other sessions arrive
//! over the bounded outbound channel the registry holds for this
//! connection.

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::codec::Framed;
use tracing::{debug, info};

use linechat_protocol::{ServerCodec, ServerLine, EXIT_COMMAND, USERNAME_PROMPT};

use crate::registry::ConnId;
use crate::server::ServerState;

/// Session lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    /// Accepted; the username prompt has not been written yet
    Connected,
    /// Prompt written; waiting for the candidate username
    Authenticating,
    /// Handshake complete; relaying chat lines
    Active,
    /// Tearing down: deregister, departure notice, close
    Closing,
    /// Terminal
    Closed,
}

/// Handle one client connection from accept to close
pub async fn run<S>(stream: S, state: ServerState)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let id = state.registry.issue_id();
    debug!("{} accepted", id);

    let mut session = Session {
        id,
        state,
        framed: Framed::new(stream, ServerCodec::new()),
        username: None,
        outbound: None,
    };

    let mut phase = SessionState::Connected;
    while phase != SessionState::Closed {
        debug!("{} entering {:?}", id, phase);
        phase = match phase {
            SessionState::Connected => session.prompt().await,
            SessionState::Authenticating => session.authenticate().await,
            SessionState::Active => session.chat_loop().await,
            SessionState::Closing => session.teardown().await,
            SessionState::Closed => SessionState::Closed,
        };
    }
    debug!("{} closed", id);
}

struct Session<S> {
    id: ConnId,
    state: ServerState,
    framed: Framed<S, ServerCodec>,
    /// Set once the handshake succeeds
    username: Option<String>,
    /// Receiving end of the channel registered for this connection
    outbound: Option<mpsc::Receiver<ServerLine>>,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Connected: write the username prompt (no trailing newline, so it
    /// bypasses the line codec)
    async fn prompt(&mut self) -> SessionState {
        let stream = self.framed.get_mut();
        if let Err(e) = stream.write_all(USERNAME_PROMPT.as_bytes()).await {
            debug!("{} prompt write failed: {}", self.id, e);
            return SessionState::Closing;
        }
        if let Err(e) = stream.flush().await {
            debug!("{} prompt flush failed: {}", self.id, e);
            return SessionState::Closing;
        }
        SessionState::Authenticating
    }

    /// Authenticating: read one line as the candidate username, bounded by
    /// the handshake timeout
    async fn authenticate(&mut self) -> SessionState {
        let line = match timeout(self.state.config.handshake_timeout, self.framed.next()).await {
            Err(_) => {
                info!("{} handshake timed out", self.id);
                return SessionState::Closing;
            }
            Ok(None) => {
                debug!("{} closed before sending a username", self.id);
                return SessionState::Closing;
            }
            Ok(Some(Err(e))) => {
                debug!("{} handshake read error: {}", self.id, e);
                return SessionState::Closing;
            }
            Ok(Some(Ok(line))) => line,
        };

        let name = line.trim();
        if name.is_empty() {
            let _ = self
                .framed
                .send(ServerLine::error("Username cannot be empty"))
                .await;
            return SessionState::Closing;
        }

        let (tx, rx) = mpsc::channel(self.state.config.outbound_buffer);
        if !self.state.registry.claim(self.id, name, tx) {
            info!("{} rejected: username '{}' already exists", self.id, name);
            let _ = self
                .framed
                .send(ServerLine::error("Username already exists"))
                .await;
            return SessionState::Closing;
        }

        if let Err(e) = self
            .framed
            .send(ServerLine::success("Connected successfully"))
            .await
        {
            debug!("{} success write failed: {}", self.id, e);
            // Pull the fresh entry back out so teardown stays silent.
            self.state.registry.remove(self.id);
            return SessionState::Closing;
        }

        let online = self.state.registry.online_count();
        self.state.relay.broadcast(
            self.id,
            ServerLine::Joined {
                username: name.to_string(),
                online,
            },
        );
        info!("{} '{}' joined (online: {})", self.id, name, online);

        self.username = Some(name.to_string());
        self.outbound = Some(rx);
        SessionState::Active
    }

    /// Active: relay inbound chat lines, deliver outbound lines
    async fn chat_loop(&mut self) -> SessionState {
        let Some(username) = self.username.clone() else {
            return SessionState::Closing;
        };
        let Some(mut outbound) = self.outbound.take() else {
            return SessionState::Closing;
        };

        loop {
            tokio::select! {
                inbound = self.framed.next() => match inbound {
                    None => {
                        debug!("{} '{}' disconnected", self.id, username);
                        return SessionState::Closing;
                    }
                    Some(Err(e)) => {
                        debug!("{} '{}' read error: {}", self.id, username, e);
                        return SessionState::Closing;
                    }
                    Some(Ok(line)) => {
                        let body = line.trim();
                        if body == EXIT_COMMAND {
                            info!("{} '{}' exited", self.id, username);
                            return SessionState::Closing;
                        }
                        if body.is_empty() {
                            continue;
                        }
                        self.state.relay.broadcast(
                            self.id,
                            ServerLine::Chat {
                                username: username.clone(),
                                body: body.to_string(),
                            },
                        );
                    }
                },
                line = outbound.recv() => match line {
                    Some(line) => {
                        if let Err(e) = self.framed.send(line).await {
                            debug!("{} '{}' write failed: {}", self.id, username, e);
                            return SessionState::Closing;
                        }
                    }
                    // Sender side dropped: the relay evicted us.
                    None => {
                        debug!("{} '{}' evicted", self.id, username);
                        return SessionState::Closing;
                    }
                },
            }
        }
    }

    /// Closing: deregister (no-op if never registered or already evicted),
    /// announce the departure, close the socket
    async fn teardown(&mut self) -> SessionState {
        if let Some(username) = self.state.registry.remove(self.id) {
            let online = self.state.registry.online_count();
            self.state.relay.broadcast(
                self.id,
                ServerLine::Left {
                    username: username.clone(),
                    online,
                },
            );
            info!("{} '{}' left (online: {})", self.id, username, online);
        }

        let _ = self.framed.close().await;
        SessionState::Closed
    }
}
