use clap::Parser;
use log::{error, info};
use server::auth::AllowAnonymous;
use server::network::{GameServer, ServerConfig};
use shared::{CORRECTION_INTERVAL_MS, MAX_SESSIONS};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// Authoritative session server for the movement protocol.
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    host: String,
    /// Server port to listen on
    #[clap(short, long, default_value = "9160")]
    port: u16,
    /// Maximum number of concurrent sessions
    #[clap(long, default_value_t = MAX_SESSIONS)]
    max_sessions: usize,
    /// Position correction interval in milliseconds
    #[clap(long, default_value_t = CORRECTION_INTERVAL_MS)]
    correction_interval_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let config = ServerConfig {
        max_sessions: args.max_sessions,
        admission_timeout: Duration::from_secs(5),
        correction_interval: Duration::from_millis(args.correction_interval_ms),
    };

    let address = format!("{}:{}", args.host, args.port);
    let listener = TcpListener::bind(&address).await?;
    info!("listening on {} (capacity {})", address, config.max_sessions);

    let server = Arc::new(GameServer::new(config));
    let verifier = Arc::new(AllowAnonymous);

    tokio::select! {
        result = Arc::clone(&server).run(listener, verifier) => {
            if let Err(e) = result {
                error!("accept loop failed: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("received Ctrl+C, shutting down gracefully...");
            server.stop_all().await;
        }
    }

    Ok(())
}
