//! linechat server - chat relay daemon

use tracing::info;

use linechat_server::config::ServerConfig;
use linechat_server::server::{self, ServerState};
use linechat_utils::{LogConfig, Result};

#[tokio::main]
async fn main() -> Result<()> {
    linechat_utils::init_logging_with_config(LogConfig::server())?;

    let config = ServerConfig::from_args(std::env::args().skip(1))?;
    let state = ServerState::new(config);

    // Bind failure is fatal; everything after this is drop-and-continue.
    let listener = server::bind(&state.config).await?;
    info!("Chat server listening on {}", listener.local_addr()?);

    {
        let state = state.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Ctrl-C received, shutting down");
                state.shutdown();
            }
        });
    }

    server::run_accept_loop(listener, state).await;

    info!("Chat server stopped");
    Ok(())
}
