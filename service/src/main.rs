use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use dbfs_core::config::FsConfig;
use dbfs_core::format::ExportFormat;
use dbfs_service::config_io::{CliOverrides, load_config};

#[derive(Debug, Parser)]
#[command(name = "dbfs-service")]
struct Args {
    /// Bind address, e.g. 127.0.0.1:8080
    #[arg(long, default_value = "127.0.0.1:8080")]
    listen: SocketAddr,

    /// Config file path (.toml or .json), parsed as dbfs_core::config::FsConfig.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// SQLite database files to serve, appended to the ones from the config file.
    #[arg(long = "db-path", num_args = 1..)]
    db_paths: Vec<PathBuf>,

    /// Comma-separated export formats (csv, tsv, json, jsonl); replaces the configured list.
    #[arg(long, value_delimiter = ',')]
    formats: Option<Vec<ExportFormat>>,

    /// Allow reaching any database on the host by its absolute path below the root,
    /// e.g. /absolute/path/on/host/to/db.sqlite
    #[arg(long)]
    allow_abspath: bool,

    /// Allow access without authentication.
    #[arg(long)]
    anonymous: bool,

    #[arg(long, requires = "password")]
    username: Option<String>,

    #[arg(long, requires = "username")]
    password: Option<String>,

    /// Per-request I/O budget in milliseconds; overrides limits.max_io_ms.
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Log filter used when RUST_LOG is not set.
    #[arg(long, default_value = "error")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => FsConfig::default(),
    };
    CliOverrides {
        db_paths: args.db_paths,
        formats: args.formats,
        allow_abspath: args.allow_abspath,
        anonymous: args.anonymous,
        user: args.username.zip(args.password),
        timeout_ms: args.timeout_ms,
    }
    .apply(&mut config);

    let app = dbfs_service::server::build_app(config)?;
    let listener = tokio::net::TcpListener::bind(args.listen).await?;
    tracing::info!(listen = %args.listen, "dbfs-service listening");
    axum::serve(listener, app).await?;
    Ok(())
}
