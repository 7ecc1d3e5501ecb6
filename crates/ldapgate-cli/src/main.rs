//! Ldapgate - LDAP authentication for Kubernetes
//!
//! `ldapgate serve` runs the credential exchange and token review webhook.
//! `ldapgate authenticate` is the client-side exec credential plugin.

mod client;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use ldapgate_auth::{LdapClient, LdapConfig, SigningKeyPair, TokenService};
use ldapgate_core::config::GatewayConfig;
use ldapgate_server::{AppState, AuthServer, MetricsRecorder};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, fmt::writer::BoxMakeWriter, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "ldapgate")]
#[command(version = ldapgate_core::VERSION)]
#[command(about = "LDAP-backed webhook token authentication for Kubernetes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path
    #[arg(short, long, global = true, env = "LDAPGATE_CONFIG")]
    config: Option<String>,

    /// Bind address
    #[arg(long, global = true)]
    bind: Option<String>,

    /// Port number
    #[arg(short, long, global = true)]
    port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log format (pretty, json)
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the webhook server (default)
    Serve,

    /// Exchange a username and password for an ExecCredential
    Authenticate(AuthenticateArgs),

    /// Show version information
    Version,
}

#[derive(Args)]
struct AuthenticateArgs {
    /// Base URL of the ldapgate server
    #[arg(long, env = "LDAPGATE_ENDPOINT")]
    endpoint: String,

    #[arg(short, long, env = "LDAPGATE_USERNAME")]
    username: String,

    #[arg(long, env = "LDAPGATE_PASSWORD", hide_env_values = true)]
    password: String,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    match &cli.command {
        Some(Commands::Version) => {
            println!("ldapgate {}", ldapgate_core::VERSION);
            Ok(())
        }
        Some(Commands::Authenticate(args)) => {
            // stdout carries the credential only
            init_logging(
                cli.log_level.as_deref().unwrap_or("warn"),
                cli.log_format.as_deref().unwrap_or("pretty"),
                BoxMakeWriter::new(std::io::stderr),
            );
            client::authenticate(args).await
        }
        Some(Commands::Serve) | None => {
            let config = load_config(&cli)?;
            init_logging(
                &config.logging.level,
                &config.logging.format,
                BoxMakeWriter::new(std::io::stdout),
            );
            run_server(config).await
        }
    }
}

/// Config file if given, otherwise environment, then CLI overrides
fn load_config(cli: &Cli) -> anyhow::Result<GatewayConfig> {
    let mut config = match &cli.config {
        Some(path) => GatewayConfig::from_file(path)?,
        None => GatewayConfig::from_env(),
    };
    apply_overrides(cli, &mut config);
    Ok(config)
}

fn apply_overrides(cli: &Cli, config: &mut GatewayConfig) {
    if let Some(bind) = &cli.bind {
        config.server.bind_address = bind.clone();
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.logging.format = format.clone();
    }
}

/// `RUST_LOG` takes precedence over `level`
fn init_logging(level: &str, format: &str, writer: BoxMakeWriter) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let (pretty, json) = if format == "json" {
        (None, Some(fmt::layer().json().with_writer(writer)))
    } else {
        (Some(fmt::layer().with_target(true).with_writer(writer)), None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(pretty)
        .with(json)
        .init();
}

async fn run_server(config: GatewayConfig) -> anyhow::Result<()> {
    config.validate()?;

    info!("Starting Ldapgate {}", ldapgate_core::VERSION);
    info!("Directory: {}", config.ldap.server_url);
    info!("Search base: {}", config.ldap.search_base);

    let directory = LdapClient::new(LdapConfig::from(&config.ldap));

    let keys = match (&config.token.private_key_file, &config.token.public_key_file) {
        (Some(private_key), Some(public_key)) => {
            SigningKeyPair::from_files(&config.token.algorithm, private_key, public_key)?
        }
        _ => {
            warn!("No signing key configured, generated an ephemeral ES256 key. Tokens will not survive a restart");
            SigningKeyPair::generate_ephemeral()?
        }
    };
    let tokens = TokenService::with_key_pair(config.token.issuer.clone(), Arc::new(keys));

    let ttl_seconds =
        i64::try_from(config.token.ttl_seconds).context("token.ttl_seconds is too large")?;
    info!("Token lifetime: {}s", ttl_seconds);

    let state = AppState {
        directory: Arc::new(directory),
        tokens: Arc::new(tokens),
        token_ttl: chrono::Duration::seconds(ttl_seconds),
    };

    let metrics = Arc::new(MetricsRecorder::install()?);
    info!("Prometheus metrics initialized");

    AuthServer::new(config.server.clone(), state)
        .with_metrics(metrics)
        .run()
        .await?;

    Ok(())
}
