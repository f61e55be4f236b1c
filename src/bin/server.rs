//! kintone MCP Server
//!
//! Run with: kintone-mcp-server [config.json]

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use kintone_mcp::config::split_list;
use kintone_mcp::mcp::McpServer;
use kintone_mcp::{ConfigOverrides, Configuration, Gateway};

#[derive(Parser, Debug)]
#[command(name = "kintone-mcp-server")]
#[command(about = "MCP server exposing kintone apps, records and attachments as tools")]
#[command(version)]
struct Args {
    /// JSON configuration file
    config: Option<String>,

    /// kintone base URL (e.g. https://example.cybozu.com)
    #[arg(long, env = "KINTONE_BASE_URL")]
    url: Option<String>,

    /// Login name for password authentication
    #[arg(long, env = "KINTONE_USERNAME")]
    username: Option<String>,

    /// Password for password authentication
    #[arg(long, env = "KINTONE_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// API token(s), comma-separated
    #[arg(long, env = "KINTONE_API_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// App IDs to allow, comma-separated (empty = all)
    #[arg(long, env = "KINTONE_ALLOW_APPS")]
    allow: Option<String>,

    /// App IDs to deny, comma-separated; wins over --allow
    #[arg(long, env = "KINTONE_DENY_APPS")]
    deny: Option<String>,

    /// Where downloaded attachments are saved
    #[arg(long, env = "KINTONE_DOWNLOAD_DIR")]
    download_dir: Option<String>,

    /// Write logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            url: self.url.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            token: self.token.clone(),
            allow: self.allow.as_deref().map(split_list),
            deny: self.deny.as_deref().map(split_list),
            download_dir: self.download_dir.clone(),
        }
    }
}

/// Logs go to stderr; stdout carries the protocol
fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr).with_ansi(false))
            .init();
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.log_json);

    let file = match &args.config {
        Some(path) => Configuration::from_file(path)?,
        None => Configuration::default(),
    };
    let config = file
        .merge(args.overrides())
        .validate()
        .context("cannot start the kintone MCP server")?;
    tracing::info!(
        download_dir = %config.download_dir.display(),
        "Configuration loaded"
    );

    let server = McpServer::new(Gateway::new(config)?);
    tracing::info!("kintone MCP server v{} listening on stdio", kintone_mcp::VERSION);

    server.run().map_err(|e| {
        tracing::error!("Transport failure: {}", e);
        e
    })?;
    Ok(())
}
