//! Tokenrelay CLI
//!
//! Issue API calls through the authenticated request coordinator.
//!
//! # Usage
//!
//! ```bash
//! # Fetch a resource, refreshing the session if the token has expired
//! TOKENRELAY_ACCESS_TOKEN=... tokenrelay request GET feed
//!
//! # Create a resource with a JSON body
//! tokenrelay request POST posts/7/comments --body '{"text":"hi"}'
//!
//! # Check whether a session can be restored from the refresh cookie
//! tokenrelay restore
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokenrelay_core::{ApiRequest, Method, RequestContext, SessionStatus};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

mod client;
mod config;

#[derive(Parser)]
#[command(name = "tokenrelay")]
#[command(about = "Authenticated API calls with transparent token refresh")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to a config file (defaults to the platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the API base URL
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one request through the coordinator
    Request {
        /// HTTP method (GET, POST, PUT, PATCH, DELETE)
        method: String,

        /// Path relative to the base URL (e.g., posts/7/comments)
        path: String,

        /// JSON request body
        #[arg(short, long)]
        body: Option<String>,

        /// Send without the access token
        #[arg(long)]
        anonymous: bool,

        /// Access token to start with
        #[arg(long, env = "TOKENRELAY_ACCESS_TOKEN", hide_env_values = true)]
        token: Option<String>,
    },

    /// Try to restore a session without sending any other request
    Restore {
        /// Access token to start with
        #[arg(long, env = "TOKENRELAY_ACCESS_TOKEN", hide_env_values = true)]
        token: Option<String>,
    },

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = config::load_config(cli.config.as_deref())?;
    if let Some(base_url) = cli.base_url {
        config.base_url = base_url;
    }

    init_logging(cli.verbose, &config.log_level);
    info!("Loaded configuration from {:?}", config.config_path);
    config.validate()?;

    match cli.command {
        Commands::Request {
            method,
            path,
            body,
            anonymous,
            token,
        } => send_request(&config, &method, &path, body.as_deref(), anonymous, token).await,
        Commands::Restore { token } => restore(&config, token).await,
        Commands::Config => print_config(&config),
    }
}

fn init_logging(verbose: bool, level: &str) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn send_request(
    config: &config::RelayConfig,
    method: &str,
    path: &str,
    body: Option<&str>,
    anonymous: bool,
    token: Option<String>,
) -> Result<()> {
    let method: Method = method.parse().map_err(anyhow::Error::msg)?;
    let mut request = ApiRequest::new(method, path);
    if let Some(body) = body {
        let body: serde_json::Value =
            serde_json::from_str(body).context("Request body is not valid JSON")?;
        request = request.with_body(body);
    }

    let (coordinator, redirects) = client::build_coordinator(config, token)?;

    let ctx = if anonymous {
        RequestContext::anonymous()
    } else {
        if !coordinator.restore_session().await.is_authenticated() {
            info!("No session available, sending anonymously");
        }
        RequestContext::default()
    };

    let response = match coordinator.request_with(request, ctx).await {
        Ok(response) => response,
        Err(e) => {
            let err = anyhow::Error::new(e).context(format!("{} {} failed", method, path));
            return Err(match redirects.last() {
                Some(target) => err.context(format!("redirected to {}", target)),
                None => err,
            });
        }
    };
    println!("{}", serde_json::to_string_pretty(&response.body)?);
    Ok(())
}

async fn restore(config: &config::RelayConfig, token: Option<String>) -> Result<()> {
    let (coordinator, _) = client::build_coordinator(config, token)?;

    match coordinator.restore_session().await {
        SessionStatus::Authenticated => println!("restored"),
        SessionStatus::Anonymous => println!("anonymous"),
    }
    Ok(())
}

fn print_config(config: &config::RelayConfig) -> Result<()> {
    let rendered = toml::to_string_pretty(config).context("Failed to render configuration")?;
    println!("# {}", config.config_path.display());
    print!("{}", rendered);
    Ok(())
}
