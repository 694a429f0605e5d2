//! ecsync node
//!
//! Replays a JSON-lines log of client messages through the sync core:
//! 1. Loads the config and opens the configured persistence
//! 2. Attaches one region holding the given entities (hydrating them)
//! 3. Feeds every logged message through the service inbox
//! 4. Prints the resulting entity state as JSON (or, with `--frames`, the
//!    outbound frames a client would receive)
//!
//! Usage:
//!   ecsync-node --messages session.jsonl --entity <uuid> --config ecsync.toml

use anyhow::Result;
use clap::Parser;
use ecsync_node::{load_log, outbound_frames, replay, snapshot};
use ecsync_sync::{EcSyncConfig, StaticRegion, SyncService};
use ecsync_types::{EntityId, RegionId};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "ecsync-node")]
#[command(about = "Replays ecsync client messages and prints the resulting entities")]
struct Args {
    /// JSON-lines message log to replay
    #[arg(short, long)]
    messages: PathBuf,

    /// Path to the TOML config file
    #[arg(short, long, default_value = "ecsync.toml")]
    config: PathBuf,

    /// Override the persistence connection (path, ":memory:" or "null")
    #[arg(long)]
    connection: Option<String>,

    /// Entity present in the region at attach time (repeatable)
    #[arg(short, long = "entity")]
    entities: Vec<EntityId>,

    /// Only print these entities instead of every known one
    #[arg(long = "show")]
    show: Vec<EntityId>,

    /// Print the outbound frames for the entities instead of a snapshot
    #[arg(long)]
    frames: bool,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let mut config = EcSyncConfig::load_from(&args.config);
    if let Some(connection) = args.connection {
        config.persistence.connection = connection;
    }

    let service = Arc::new(SyncService::from_config(&config)?);
    let region = StaticRegion::new(RegionId::new(), args.entities);
    let hydrated = service.attach(&region)?;

    let log = load_log(&args.messages)?;
    let handled = replay(Arc::clone(&service), log.envelopes, config.service.inbound_queue).await?;
    service.detach(&region.id);

    info!(
        "Replayed {} messages ({} unparseable lines, {} components hydrated)",
        handled, log.skipped, hydrated
    );

    if args.frames {
        for frame in outbound_frames(&service, &args.show) {
            println!("{}", serde_json::to_string(&frame)?);
        }
    } else {
        let entities = snapshot(service.store(), &args.show);
        println!("{}", serde_json::to_string_pretty(&entities)?);
    }
    Ok(())
}
