use anyhow::{bail, Result};
use clap::Parser;
use log::info;
use mesh_video::testing::{FakeMediaPlatform, Journal};
use mesh_video::{CoordinatorConfig, MemoryMesh, VideoCoordinator};
use std::sync::Arc;
use std::time::Duration;

/// Runs a camera session across an in-process mesh of simulated peers.
#[derive(Parser, Debug)]
#[clap(name = "mesh-video-sim", version)]
struct Args {
    /// Number of participants present at the start
    #[clap(long, default_value = "3")]
    peers: usize,

    /// Comma separated camera ids offered by every participant
    #[clap(long, default_value = "cam-front,cam-back")]
    devices: String,

    /// Room name used as the peer id prefix
    #[clap(long, default_value = "lobby")]
    room: String,
}

struct Participant {
    coordinator: VideoCoordinator,
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(25)).await;
}

fn report(step: &str, participants: &[Participant]) {
    info!("--- {} ---", step);
    for p in participants {
        let c = &p.coordinator;
        let roster: Vec<String> = c
            .peers()
            .iter()
            .map(|peer| format!("{}={:?}", peer.peer_id, peer.video_state))
            .collect();
        let mut streams: Vec<String> = c
            .peer_video_streams()
            .iter()
            .map(|(peer, stream)| format!("{}:{}", peer, stream.id()))
            .collect();
        streams.sort();
        info!(
            "{} camera={:?} announced={:?} roster=[{}] streams=[{}]",
            c.self_id(),
            c.camera_state(),
            c.announced_state(),
            roster.join(", "),
            streams.join(", ")
        );
    }
}

fn join(mesh: &MemoryMesh, journal: &Journal, id: &str, devices: &[&str], config: &CoordinatorConfig) -> Result<Participant> {
    let transport = mesh.join(id);
    let platform = Arc::new(FakeMediaPlatform::with_devices(devices).with_journal(journal.clone()));
    let coordinator = VideoCoordinator::start(config.clone(), transport, platform)?;
    Ok(Participant { coordinator })
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("mesh_video=info")).init();

    let args = Args::parse();
    let devices: Vec<&str> = args
        .devices
        .split(',')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .collect();
    if args.peers < 2 {
        bail!("need at least two peers, got {}", args.peers);
    }
    if devices.is_empty() {
        bail!("no camera devices given");
    }

    let config = CoordinatorConfig::from_env();
    let journal = Journal::new();
    let mesh = MemoryMesh::with_journal(journal.clone());

    let mut participants = Vec::with_capacity(args.peers + 1);
    for i in 0..args.peers {
        let id = format!("{}-{}", args.room, i);
        participants.push(join(&mesh, &journal, &id, &devices, &config)?);
    }
    settle().await;
    report("joined", &participants);

    let host = participants[0].coordinator.clone();
    host.set_camera_enabled(true).await?;
    settle().await;
    report("camera on", &participants);

    let next = devices.get(1).copied().unwrap_or(devices[0]);
    host.select_device(next).await?;
    settle().await;
    report(&format!("switched to {}", next), &participants);

    let late = format!("{}-late", args.room);
    participants.push(join(&mesh, &journal, &late, &devices, &config)?);
    settle().await;
    report("late peer joined", &participants);

    host.set_camera_enabled(false).await?;
    settle().await;
    report("camera off", &participants);

    let leaving = participants.remove(1);
    let leaving_id = leaving.coordinator.self_id().clone();
    leaving.coordinator.shutdown().await;
    mesh.leave(&leaving_id);
    settle().await;
    report(&format!("{} left", leaving_id), &participants);

    for p in &participants {
        p.coordinator.shutdown().await;
        mesh.leave(p.coordinator.self_id());
    }

    info!(
        "Host metrics: {}",
        serde_json::to_string(&host.metrics())?
    );
    info!("Journal recorded {} operations", journal.len());
    Ok(())
}
