#![allow(dead_code)]

use mesh_video::testing::{FakeMediaPlatform, Journal, JournalEntry};
use mesh_video::transport::MemoryTransport;
use mesh_video::{CoordinatorConfig, MemoryMesh, VideoCoordinator};
use std::sync::Arc;
use std::time::Duration;

pub struct Member {
    pub coordinator: VideoCoordinator,
    pub platform: Arc<FakeMediaPlatform>,
    pub transport: Arc<MemoryTransport>,
}

pub fn room() -> (MemoryMesh, Journal) {
    let journal = Journal::new();
    (MemoryMesh::with_journal(journal.clone()), journal)
}

pub fn member(mesh: &MemoryMesh, id: &str, devices: &[&str]) -> Member {
    member_with(mesh, id, devices, CoordinatorConfig::default())
}

pub fn member_with(mesh: &MemoryMesh, id: &str, devices: &[&str], config: CoordinatorConfig) -> Member {
    let transport = mesh.join(id);
    let platform = Arc::new(FakeMediaPlatform::with_devices(devices).with_journal(mesh.journal().clone()));
    let coordinator = VideoCoordinator::start(config, transport.clone(), platform.clone())
        .expect("coordinator should start on a connected transport");
    Member {
        coordinator,
        platform,
        transport,
    }
}

/// Gives every spawned event task a chance to drain its queue.
pub async fn settle() {
    for _ in 0..200 {
        tokio::task::yield_now().await;
    }
}

pub async fn eventually<F: Fn() -> bool>(what: &str, check: F) {
    for _ in 0..500 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("timed out waiting for {}", what);
}

pub fn position<F: Fn(&JournalEntry) -> bool>(entries: &[JournalEntry], check: F) -> Option<usize> {
    entries.iter().position(check)
}

pub fn positions<F: Fn(&JournalEntry) -> bool>(entries: &[JournalEntry], check: F) -> Vec<usize> {
    entries
        .iter()
        .enumerate()
        .filter(|(_, e)| check(e))
        .map(|(i, _)| i)
        .collect()
}

pub fn is_action(entry: &JournalEntry, sender: &str, payload: &str) -> bool {
    matches!(entry, JournalEntry::Action { from, payload: p, .. } if from == sender && p == payload)
}

pub fn is_added(entry: &JournalEntry, sender: &str) -> bool {
    matches!(entry, JournalEntry::StreamAdded { from, .. } if from == sender)
}

pub fn is_removed(entry: &JournalEntry, sender: &str) -> bool {
    matches!(entry, JournalEntry::StreamRemoved { from, .. } if from == sender)
}

pub const PLAYING: &str = "\"PLAYING\"";
pub const STOPPED: &str = "\"STOPPED\"";
