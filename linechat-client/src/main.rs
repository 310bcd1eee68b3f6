//! linechat terminal client
//!
//! Usage: `linechat [address] [username]`
//!
//! Connects to the chat server, completes the username handshake, then
//! pumps stdin lines to the server and server lines to stdout until the
//! user types `exit` or the server goes away. Handshake reads are
//! time-bounded; the chat phase is not.

use std::io::Write as _;
use std::process::ExitCode;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::codec::Framed;
use tracing::debug;

use linechat_protocol::{ClientCodec, ServerLine, DEFAULT_PORT, EXIT_COMMAND};
use linechat_utils::{ChatError, LogConfig, Result};

/// How long to wait for the server's username prompt
const PROMPT_TIMEOUT: Duration = Duration::from_secs(10);

/// How long to wait for the handshake reply after sending a username
const REPLY_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = linechat_utils::init_logging_with_config(LogConfig::client()) {
        eprintln!("error: {}", e);
        return ExitCode::FAILURE;
    }

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let addr = args
        .next()
        .unwrap_or_else(|| format!("localhost:{}", DEFAULT_PORT));
    let username_arg = args.next();

    debug!("connecting to {}", addr);
    let mut stream = TcpStream::connect(&addr)
        .await
        .map_err(|e| ChatError::connection(format!("failed to connect to {}: {}", addr, e)))?;

    // The prompt is raw bytes with no line terminator, so read it as-is.
    let mut buf = [0u8; 256];
    let n = timeout(PROMPT_TIMEOUT, stream.read(&mut buf))
        .await
        .map_err(|_| ChatError::ConnectionTimeout {
            seconds: PROMPT_TIMEOUT.as_secs(),
        })??;
    if n == 0 {
        return Err(ChatError::ConnectionClosed);
    }
    print!("{}", String::from_utf8_lossy(&buf[..n]));
    std::io::stdout().flush()?;

    let username = match username_arg {
        Some(name) => {
            println!("{}", name);
            name
        }
        None => read_stdin_line().await?,
    };

    stream
        .write_all(format!("{}\n", username.trim()).as_bytes())
        .await?;

    let mut framed = Framed::new(stream, ClientCodec::new());

    let reply = timeout(REPLY_TIMEOUT, framed.next())
        .await
        .map_err(|_| ChatError::ConnectionTimeout {
            seconds: REPLY_TIMEOUT.as_secs(),
        })?;
    match reply {
        None => return Err(ChatError::ConnectionClosed),
        Some(Err(e)) => return Err(ChatError::protocol(e.to_string())),
        Some(Ok(ServerLine::Error { reason })) => {
            return Err(ChatError::HandshakeRejected(reason))
        }
        Some(Ok(ServerLine::Success { info })) => println!("{}", info),
        Some(Ok(other)) => {
            return Err(ChatError::protocol(format!(
                "unexpected handshake reply: {}",
                other
            )))
        }
    }

    println!("Type a message and press enter; '{}' leaves the chat.", EXIT_COMMAND);

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            incoming = framed.next() => match incoming {
                None => {
                    println!("Server closed the connection");
                    break;
                }
                Some(Err(e)) => return Err(ChatError::protocol(e.to_string())),
                Some(Ok(line)) => println!("{}", line),
            },
            typed = stdin.next_line() => match typed {
                Ok(Some(line)) => {
                    let line = line.trim().to_string();
                    if line.is_empty() {
                        continue;
                    }
                    framed
                        .send(line.clone())
                        .await
                        .map_err(|e| ChatError::protocol(e.to_string()))?;
                    if line == EXIT_COMMAND {
                        break;
                    }
                }
                // stdin closed: leave politely.
                Ok(None) => {
                    let _ = framed.send(EXIT_COMMAND.to_string()).await;
                    break;
                }
                Err(e) => return Err(e.into()),
            },
        }
    }

    Ok(())
}

async fn read_stdin_line() -> Result<String> {
    let mut line = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
    Ok(line.trim().to_string())
}
