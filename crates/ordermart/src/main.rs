use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use ordermart::server::{router, AppState};
use ordermart_bucket::S3Connector;
use ordermart_core::sink::WarehouseSink;
use ordermart_core::{db, EtlConfig, EtlRunner, SinkKind, StorageEvent, XlsxDecoder};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Order mart star-schema loader", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Receive storage events over HTTP
    Serve(ServeArgs),
    /// Run one invocation for a bucket and print the run report
    Trigger(TriggerArgs),
}

#[derive(Args, Debug)]
struct ServeArgs {
    #[arg(long, default_value = "0.0.0.0:8080")]
    addr: SocketAddr,
    /// Overrides ORDERMART_SINK
    #[arg(long)]
    sink: Option<SinkKind>,
}

#[derive(Args, Debug)]
struct TriggerArgs {
    #[arg(long)]
    bucket: String,
    /// Object name recorded in the report
    #[arg(long, default_value = "")]
    name: String,
    /// Overrides ORDERMART_SINK
    #[arg(long)]
    sink: Option<SinkKind>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let cli = Cli::parse();
    let mut config = EtlConfig::from_env().context("invalid configuration")?;

    match cli.command {
        Command::Serve(args) => {
            if let Some(sink) = args.sink {
                config.sink = sink;
            }
            let runner = build_runner(config).await?;
            let listener = TcpListener::bind(args.addr)
                .await
                .with_context(|| format!("failed to bind {}", args.addr))?;
            info!("listening on {}", listener.local_addr()?);
            axum::serve(listener, router(AppState::new(runner)).into_make_service()).await?;
            Ok(())
        }
        Command::Trigger(args) => {
            if let Some(sink) = args.sink {
                config.sink = sink;
            }
            let runner = build_runner(config).await?;
            let report = runner
                .run_event(&StorageEvent::new(args.bucket, args.name))
                .await;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    }
}

async fn build_runner(config: EtlConfig) -> Result<EtlRunner> {
    let connector = S3Connector::new(config.storage.clone())
        .await
        .context("failed to configure object storage")?;

    let warehouse = match config.sink {
        SinkKind::Warehouse => {
            let database_url = config.require_database_url()?;
            let pool = db::connect(database_url).await?;
            Some(WarehouseSink::from_config(pool, &config))
        }
        SinkKind::Archive => None,
    };

    let mut runner = EtlRunner::new(Arc::new(connector), Arc::new(XlsxDecoder), config);
    if let Some(warehouse) = warehouse {
        runner = runner.with_warehouse(warehouse);
    }
    Ok(runner)
}
