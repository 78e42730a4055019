//! Maze Sync
//!
//! Runs the relay, joins a relay as a player, or simulates two players over
//! an in-process hub.

use std::path::PathBuf;
use std::time::Duration;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use maze_sync::{
    RelayConfig, SimConfig, Stage, Transport, TICK_RATE, VERSION,
    game::input::{InputFrame, ScriptedInput},
    game::stage::LOCAL_CONTROLLER,
    network::{LoopbackHub, RelayClient, RelayServer},
};

#[derive(Parser, Debug)]
#[command(name = "maze-sync")]
#[command(about = "Tile maze with networked player sync", version)]
struct Cli {
    /// JSON config file (simulation settings, or relay settings for `relay`)
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the WebSocket relay
    Relay {
        /// Override the bind address
        #[arg(long)]
        bind: Option<std::net::SocketAddr>,
    },
    /// Join a relay and walk a scripted path
    Join {
        /// Relay URL, e.g. ws://127.0.0.1:8080
        url: String,
        /// Stop after this many ticks (runs until Ctrl-C when absent)
        #[arg(long)]
        ticks: Option<u64>,
        /// Frames queued per direction before sends fail
        #[arg(long, default_value_t = RelayConfig::default().channel_capacity)]
        channel_capacity: usize,
    },
    /// Simulate two players over an in-process hub
    Demo {
        #[arg(long, default_value_t = 600)]
        ticks: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    info!("Maze Sync v{}", VERSION);

    match cli.command {
        Commands::Relay { bind } => {
            let mut config = match &cli.config {
                Some(path) => RelayConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
                None => RelayConfig::default(),
            };
            if let Some(addr) = bind {
                config.bind_addr = addr;
            }
            run_relay(config).await
        }
        Commands::Join { url, ticks, channel_capacity } => {
            join(load_sim_config(&cli.config)?, &url, ticks, channel_capacity).await
        }
        Commands::Demo { ticks } => demo(load_sim_config(&cli.config)?, ticks),
    }
}

fn load_sim_config(path: &Option<PathBuf>) -> Result<SimConfig> {
    match path {
        Some(path) => SimConfig::load(path).with_context(|| format!("loading {}", path.display())),
        None => Ok(SimConfig::default()),
    }
}

async fn run_relay(config: RelayConfig) -> Result<()> {
    let server = RelayServer::bind(config).await?;
    let shutdown = server.shutdown_handle();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown.send(());
        }
    });

    server.run().await?;
    Ok(())
}

/// Sweeping walk: each player gets a different pattern from its seed.
fn walk_script(seed: u32, ticks: u32) -> ScriptedInput {
    ScriptedInput::from_frames((0..ticks).map(|t| {
        let angle = (u64::from(t / 30) * (u64::from(seed) + 1) * 37 % 360) as f32;
        let (sin, cos) = angle.to_radians().sin_cos();
        InputFrame::with_movement(cos, sin)
    }))
}

async fn join(config: SimConfig, url: &str, ticks: Option<u64>, channel_capacity: usize) -> Result<()> {
    let mut client = RelayClient::connect(url, channel_capacity).await?;
    let mut stage = Stage::new(config, client.local_id())?;
    stage.attach_input(LOCAL_CONTROLLER, Box::new(walk_script(client.local_id().0, 3600)))?;

    let mut interval = tokio::time::interval(Duration::from_secs(1) / TICK_RATE);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let report = stage.tick(&mut client);
                if report.tick % u64::from(TICK_RATE) == 0 {
                    if let Some(local) = stage.local_player() {
                        info!(
                            "Tick {}: at {} facing {}, {} players, {} dropped",
                            report.tick,
                            local.position(),
                            local.facing(),
                            stage.players().count(),
                            report.dropped
                        );
                    }
                }
                if ticks.is_some_and(|limit| report.tick >= limit) || !client.is_connected() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Leaving");
                break;
            }
        }
    }
    Ok(())
}

fn demo(config: SimConfig, ticks: u64) -> Result<()> {
    let hub = LoopbackHub::new();
    let mut transports = [hub.connect(), hub.connect()];
    let script_len = u32::try_from(ticks).unwrap_or(u32::MAX);
    let mut stages = Vec::new();
    for transport in &transports {
        let id = transport.local_id();
        let mut stage = Stage::new(config.clone(), id)?;
        stage.attach_input(LOCAL_CONTROLLER, Box::new(walk_script(id.0, script_len)))?;
        stages.push(stage);
    }

    for _ in 0..ticks {
        for (stage, transport) in stages.iter_mut().zip(&mut transports) {
            stage.tick(transport);
        }
    }

    for stage in &stages {
        for (id, player) in stage.players() {
            info!(
                "{} sees {} at {} facing {}",
                stage.local_id(),
                id,
                player.position(),
                player.facing()
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_channel_capacity() {
        let cli = Cli::try_parse_from(["maze-sync", "join", "ws://127.0.0.1:8080"]).unwrap();
        match cli.command {
            Commands::Join { channel_capacity, .. } => {
                assert_eq!(channel_capacity, RelayConfig::default().channel_capacity)
            }
            other => panic!("unexpected command {:?}", other),
        }

        let cli = Cli::try_parse_from(["maze-sync", "join", "ws://127.0.0.1:8080", "--channel-capacity", "32"])
            .unwrap();
        assert!(matches!(cli.command, Commands::Join { channel_capacity: 32, .. }));
    }
}
