use anyhow::Context;
use log_relay::{Relay, RelayConfig};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

fn print_help() {
    eprintln!(
        r#"Log Relay - fans out an HTTP-polled append-only log to WebSocket clients

USAGE:
    log-relay [OPTIONS]

OPTIONS:
    -c, --config <PATH>   Load configuration from JSON file
    -h, --help            Print this help message

ENVIRONMENT VARIABLES:
    HOST                  Server host (default: 0.0.0.0)
    PORT                  Server port (default: 3000)
    REMOTE_ENDPOINT       Remote log URL template containing {{key}}
    REMOTE_TOKEN          Bearer token sent to the remote
    REMOTE_FIELD          Response field holding the entries (default: messages)
    POLL_INTERVAL_MS      Polling interval per key (default: 5000)
    RATE_LIMIT_WINDOW_MS  Rate limit window (default: 900000)
    RATE_LIMIT_MAX        Requests per origin per window (default: 100)
    RUST_LOG              Log level filter
    LOG_FORMAT            Set to "json" for JSON log lines

EXAMPLES:
    # Run with defaults
    log-relay

    # Run with config file
    log-relay --config relay.json

    # Point at a remote and poll every second
    REMOTE_ENDPOINT=http://logs:8080/api/{{key}} POLL_INTERVAL_MS=1000 log-relay
"#
    );
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "log_relay=info,tower_http=info".into());

    let json = std::env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();
    let mut config_path: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            "--config" | "-c" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("Error: --config requires a path argument");
                    std::process::exit(1);
                }
                config_path = Some(args[i].clone());
            }
            arg => {
                eprintln!("Unknown argument: {}", arg);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let mut config = match config_path {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path);
            RelayConfig::from_file(&path)?
        }
        None => {
            tracing::info!("Using default configuration");
            RelayConfig::default()
        }
    };
    config
        .apply_env()
        .context("invalid environment override")?;

    tracing::info!("Remote endpoint: {}", config.remote.endpoint);
    tracing::info!(
        "Polling every {}ms, stopping after {} failed ticks",
        config.polling.interval_ms,
        config.polling.failure_threshold
    );
    tracing::info!(
        "Rate limit: {} requests per {}ms per origin",
        config.rate_limit.max_requests,
        config.rate_limit.window_ms
    );
    tracing::info!("Available endpoints:");
    tracing::info!("  GET  /health");
    tracing::info!("  GET  /status");
    tracing::info!("  GET  /ws");

    let relay = Relay::new(config).context("failed to start relay")?;
    relay.run().await?;
    Ok(())
}
