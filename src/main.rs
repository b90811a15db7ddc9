use std::path::{Path, PathBuf};

use axum::Router;
use clap::Parser;
use exthub::{AppState, build_app, config::RegistryConfig, observability};

#[derive(Parser, Debug)]
#[command(version, about = "Open extension registry gateway", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to config file (defaults to exthub.toml in the working directory
    /// if it exists, otherwise built-in defaults are used)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Start the gateway server (default)
    Serve,
    /// Write a starter configuration file
    Init {
        /// Path to create the config file
        #[arg(short, long, default_value = "exthub.toml")]
        output: PathBuf,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Starter configuration written by `exthub init`.
fn default_config_toml() -> &'static str {
    r#"# Extension registry gateway configuration

[server]
host = "0.0.0.0"
port = 8080

# Absolute URL switches to the permissive access policy and becomes the
# post-login/post-logout redirect target. Leave empty for same-origin UIs.
[webui]
url = ""

# Uncomment to enable interactive browser logins.
# [auth.oidc]
# issuer = "https://id.example"
# client_id = "registry"
# client_secret = "${OIDC_CLIENT_SECRET}"
# redirect_uri = "https://registry.example/login/callback"

[observability.logging]
level = "info"
format = "compact"
"#
}

fn run_init(output: &Path, force: bool) {
    if output.exists() && !force {
        eprintln!(
            "Config file already exists: {}\nUse --force to overwrite.",
            output.display()
        );
        std::process::exit(1);
    }
    if let Err(e) = std::fs::write(output, default_config_toml()) {
        eprintln!("Failed to write config file: {}", e);
        std::process::exit(1);
    }
    println!("Created configuration at: {}", output.display());
}

/// Interval between sweeps of expired sessions and stale login attempts.
const SESSION_CLEANUP_INTERVAL_SECS: u64 = 300;

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Some(Command::Init { output, force }) = &args.command {
        run_init(output, *force);
        return;
    }

    let config_path = args.config.or_else(|| {
        let default = PathBuf::from("exthub.toml");
        default.exists().then_some(default)
    });

    let config = match &config_path {
        Some(path) => match RegistryConfig::from_file(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to load config from {}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => RegistryConfig::default(),
    };

    observability::init_tracing(&config.observability).expect("Failed to initialize tracing");

    match &config_path {
        Some(path) => tracing::info!(config_file = %path.display(), "Starting registry gateway"),
        None => tracing::info!("Starting registry gateway with built-in defaults"),
    }

    let state = AppState::new(config.clone()).expect("Failed to initialize application state");

    // Sweep expired sessions in the background so the in-memory store does not
    // grow without bound
    if let Some(oidc) = state.oidc.clone() {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(
                SESSION_CLEANUP_INTERVAL_SECS,
            ));
            loop {
                interval.tick().await;
                if let Err(e) = oidc.session_store().cleanup().await {
                    tracing::warn!(error = %e, "Session cleanup sweep failed");
                }
            }
        });
    }

    let app = build_app(&config, state, Router::new());

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
