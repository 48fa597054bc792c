mod common;

use bytes::Bytes;
use common::*;
use mesh_video::media::{LocalCameraState, MediaDeviceInfo, MediaDeviceKind, MediaKind, MediaStream, MediaTrack};
use mesh_video::testing::JournalEntry;
use mesh_video::transport::MeshTransport;
use mesh_video::types::StreamMetadata;
use mesh_video::{CameraState, CoordinatorConfig, CoordinatorEvent, Error, VideoDeviceDescriptor};
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};

fn max_routes_from(mesh: &mesh_video::MemoryMesh, from: &str) -> usize {
    mesh.peers()
        .iter()
        .filter(|p| p.as_str() != from)
        .map(|p| mesh.routes(from, p).len())
        .max()
        .unwrap_or(0)
}

#[tokio::test]
async fn churn_never_duplicates_a_route() {
    let (mesh, _journal) = room();
    let a = member(&mesh, "a", &["D1", "D2"]);
    let _b = member(&mesh, "b", &[]);
    settle().await;

    assert_ok!(a.coordinator.set_camera_enabled(true).await);
    let _c = member(&mesh, "c", &[]);
    settle().await;
    assert!(max_routes_from(&mesh, "a") <= 1);

    assert_ok!(a.coordinator.select_device("D2").await);
    let _d = member(&mesh, "d", &[]);
    mesh.leave("b");
    settle().await;
    assert!(max_routes_from(&mesh, "a") <= 1);

    assert_ok!(a.coordinator.set_camera_enabled(false).await);
    let _b_again = member(&mesh, "b", &[]);
    assert_ok!(a.coordinator.set_camera_enabled(true).await);
    settle().await;
    assert!(max_routes_from(&mesh, "a") <= 1);

    assert_eq!(mesh.duplicate_routes(), 0);
    assert_eq!(a.platform.overlapping_captures(), 0);
    for peer in ["b", "c", "d"] {
        assert_eq!(mesh.routes("a", peer).len(), 1, "route to {}", peer);
    }
}

#[tokio::test]
async fn announcements_match_capture_state() {
    let (mesh, journal) = room();
    let a = member(&mesh, "a", &["D1", "D2"]);
    let _b = member(&mesh, "b", &[]);
    settle().await;

    assert_ok!(a.coordinator.set_camera_enabled(true).await);
    assert_ok!(a.coordinator.select_device("D2").await);
    assert_ok!(a.coordinator.set_camera_enabled(false).await);
    assert_ok!(a.coordinator.set_camera_enabled(true).await);
    a.coordinator.shutdown().await;

    let mut live: i64 = 0;
    let mut announcements = 0;
    for entry in journal.entries() {
        match entry {
            JournalEntry::Acquired { .. } => live += 1,
            JournalEntry::Released { .. } => live -= 1,
            JournalEntry::Action { ref from, ref payload, .. } if from == "a" => {
                announcements += 1;
                if payload == PLAYING {
                    assert_eq!(live, 1, "PLAYING without a live capture");
                } else {
                    assert_eq!(live, 0, "STOPPED before the capture was released");
                }
            }
            _ => {}
        }
    }
    assert_eq!(live, 0);
    assert_eq!(announcements, 4);
}

#[tokio::test]
async fn repeated_release_is_a_no_op() {
    let (mesh, journal) = room();
    let a = member(&mesh, "a", &["D1"]);
    let _b = member(&mesh, "b", &[]);
    settle().await;

    assert_ok!(a.coordinator.set_camera_enabled(true).await);
    assert_ok!(a.coordinator.set_camera_enabled(false).await);
    let after_first = journal.len();
    let history = a.coordinator.camera_history().len();

    assert_ok!(a.coordinator.set_camera_enabled(false).await);
    assert_eq!(journal.len(), after_first);
    assert_eq!(a.coordinator.camera_history().len(), history);
    assert_eq!(a.platform.stopped_tracks(), 1);
}

#[tokio::test]
async fn device_list_is_deduplicated_in_first_seen_order() {
    let (mesh, _journal) = room();
    let a = member(&mesh, "a", &[]);
    a.platform.set_raw_devices(vec![
        MediaDeviceInfo::video("D2", "Rear"),
        MediaDeviceInfo {
            device_id: "M1".to_string(),
            label: "Mic".to_string(),
            kind: MediaDeviceKind::AudioInput,
        },
        MediaDeviceInfo::video("D1", "Front"),
        MediaDeviceInfo::video("D2", "Rear camera"),
    ]);

    let devices = assert_ok!(a.coordinator.refresh_devices().await);
    assert_eq!(
        devices,
        vec![
            VideoDeviceDescriptor {
                device_id: "D2".to_string(),
                label: "Rear camera".to_string(),
            },
            VideoDeviceDescriptor {
                device_id: "D1".to_string(),
                label: "Front".to_string(),
            },
        ]
    );
    assert_eq!(a.coordinator.video_devices(), devices);
}

#[tokio::test]
async fn known_device_list_drives_the_default_choice() {
    let (mesh, _journal) = room();
    let a = member(&mesh, "a", &["D1", "D2"]);
    a.platform.set_raw_devices(vec![
        MediaDeviceInfo::video("D2", "Rear"),
        MediaDeviceInfo::video("D1", "Front"),
    ]);
    assert_ok!(a.coordinator.refresh_devices().await);

    assert_ok!(a.coordinator.set_camera_enabled(true).await);
    assert_eq!(a.platform.live_captures("D2"), 1);
}

#[tokio::test]
async fn departed_peer_is_forgotten() {
    let (mesh, journal) = room();
    let a = member(&mesh, "a", &["D1"]);
    let b = member(&mesh, "b", &["B1"]);
    let _c = member(&mesh, "c", &[]);
    settle().await;

    assert_ok!(b.coordinator.set_camera_enabled(true).await);
    let coordinator = a.coordinator.clone();
    eventually("b's stream at a", move || coordinator.peer_video_streams().contains_key("b")).await;

    mesh.leave("b");
    let coordinator = a.coordinator.clone();
    eventually("b evicted", move || {
        !coordinator.peer_video_streams().contains_key("b")
            && coordinator.peers().iter().all(|p| p.peer_id != "b")
    })
    .await;

    let mark = journal.len();
    assert_ok!(a.coordinator.set_camera_enabled(true).await);
    let entries = journal.since(mark);
    assert!(entries
        .iter()
        .all(|e| !matches!(e, JournalEntry::StreamAdded { to, .. } if to == "b")));
    assert_eq!(mesh.routes("a", "c").len(), 1);
}

#[tokio::test]
async fn leave_while_publishing_keeps_camera_on() {
    let (mesh, journal) = room();
    let a = member(&mesh, "a", &["D1"]);
    let _b = member(&mesh, "b", &[]);
    let _c = member(&mesh, "c", &[]);
    settle().await;
    assert_ok!(a.coordinator.set_camera_enabled(true).await);

    mesh.leave("c");
    settle().await;
    assert_eq!(a.coordinator.camera_state(), LocalCameraState::On);

    let mark = journal.len();
    assert_ok!(a.coordinator.set_camera_enabled(false).await);
    let removed: Vec<_> = journal
        .since(mark)
        .into_iter()
        .filter(|e| is_removed(e, "a"))
        .collect();
    assert_eq!(removed.len(), 1);
    assert!(matches!(&removed[0], JournalEntry::StreamRemoved { to, .. } if to == "b"));
}

#[tokio::test]
async fn acquisition_resolving_after_camera_off_is_discarded() {
    let (mesh, journal) = room();
    let a = member(&mesh, "a", &["D1"]);
    let _b = member(&mesh, "b", &[]);
    settle().await;
    a.platform.hold_acquisitions();

    let on = {
        let coordinator = a.coordinator.clone();
        tokio::spawn(async move { coordinator.set_camera_enabled(true).await })
    };
    let platform = a.platform.clone();
    eventually("parked acquisition", move || platform.pending_acquisitions() == 1).await;
    assert_eq!(a.coordinator.camera_state(), LocalCameraState::Acquiring);

    let off = {
        let coordinator = a.coordinator.clone();
        tokio::spawn(async move { coordinator.set_camera_enabled(false).await })
    };
    let coordinator = a.coordinator.clone();
    eventually("intent off", move || !coordinator.camera_enabled()).await;
    a.platform.open_gate();

    assert_ok!(on.await.unwrap());
    assert_ok!(off.await.unwrap());

    let entries = journal.entries();
    assert!(position(&entries, |e| matches!(e, JournalEntry::Acquired { .. })).is_some());
    assert!(position(&entries, |e| matches!(e, JournalEntry::Released { .. })).is_some());
    assert!(entries.iter().all(|e| !is_added(e, "a")));
    assert!(entries
        .iter()
        .all(|e| !matches!(e, JournalEntry::Action { from, .. } if from == "a")));

    assert_eq!(a.platform.total_live_captures(), 0);
    assert_eq!(a.coordinator.camera_state(), LocalCameraState::Off);
    assert_eq!(a.coordinator.announced_state(), CameraState::Stopped);
    assert!(a.coordinator.self_video_stream().is_none());
    assert_eq!(a.coordinator.metrics().discarded_acquisitions, 1);
}

#[tokio::test]
async fn queued_requests_run_one_transition_at_a_time() {
    let (mesh, _journal) = room();
    let a = member(&mesh, "a", &["D1", "D2"]);
    let _b = member(&mesh, "b", &[]);
    settle().await;

    let mut tasks = Vec::new();
    for step in 0..6 {
        let coordinator = a.coordinator.clone();
        tasks.push(tokio::spawn(async move {
            match step % 3 {
                0 => coordinator.set_camera_enabled(true).await,
                1 => coordinator.select_device(if step < 3 { "D2" } else { "D1" }).await,
                _ => coordinator.set_camera_enabled(step > 3).await,
            }
        }));
    }
    for task in tasks {
        assert_ok!(task.await.unwrap());
    }

    assert_eq!(a.platform.overlapping_captures(), 0);
    assert!(a.platform.total_live_captures() <= 1);
    assert_eq!(mesh.duplicate_routes(), 0);
    let on = a.coordinator.camera_state() == LocalCameraState::On;
    assert_eq!(on, a.coordinator.camera_enabled());
    assert_eq!(on, a.platform.total_live_captures() == 1);
}

#[tokio::test]
async fn denied_permission_turns_camera_back_off() {
    let (mesh, journal) = room();
    let a = member(&mesh, "a", &["D1"]);
    let _b = member(&mesh, "b", &[]);
    settle().await;
    a.platform.deny_permission(true);
    let mut events = a.coordinator.subscribe();

    let err = assert_err!(a.coordinator.set_camera_enabled(true).await);
    assert!(matches!(err, Error::DeviceUnavailable(_)));
    assert_eq!(a.coordinator.camera_state(), LocalCameraState::Off);
    assert!(!a.coordinator.camera_enabled());
    assert!(a.coordinator.last_error().is_some());
    assert!(journal.actions_from("a").is_empty());

    let mut failed = false;
    while let Ok(event) = events.try_recv() {
        failed |= matches!(event, CoordinatorEvent::CaptureFailed(_));
    }
    assert!(failed);

    a.platform.deny_permission(false);
    assert_ok!(a.coordinator.set_camera_enabled(true).await);
    assert!(a.coordinator.last_error().is_none());
    assert_eq!(journal.actions_from("a"), vec![PLAYING.to_string()]);
}

#[tokio::test]
async fn failed_switch_announces_stopped() {
    let (mesh, _journal) = room();
    let a = member(&mesh, "a", &["D1"]);
    let b = member(&mesh, "b", &[]);
    settle().await;
    assert_ok!(a.coordinator.set_camera_enabled(true).await);

    let err = assert_err!(a.coordinator.select_device("unplugged").await);
    assert!(matches!(err, Error::DeviceUnavailable(_)));
    assert_eq!(a.coordinator.camera_state(), LocalCameraState::Off);
    assert_eq!(a.coordinator.announced_state(), CameraState::Stopped);
    assert_eq!(a.platform.total_live_captures(), 0);
    assert!(mesh.routes("a", "b").is_empty());

    let coordinator = b.coordinator.clone();
    eventually("b sees a stopped", move || {
        !coordinator.peer_video_streams().contains_key("a")
            && coordinator
                .peers()
                .iter()
                .any(|p| p.peer_id == "a" && p.video_state == CameraState::Stopped)
    })
    .await;
}

#[tokio::test]
async fn malformed_and_foreign_actions_are_ignored() {
    let (mesh, _journal) = room();
    let a = member(&mesh, "a", &[]);
    let p = mesh.join("p");
    settle().await;

    assert_ok!(p.send_action("group", "VIDEO_CHANGE", Bytes::from_static(b"not json")).await);
    assert_ok!(p.send_action("group", "AUDIO_CHANGE", Bytes::from_static(b"\"PLAYING\"")).await);
    settle().await;
    assert_eq!(a.coordinator.peers()[0].video_state, CameraState::Stopped);

    assert_ok!(p.send_action("group", "VIDEO_CHANGE", Bytes::from_static(b"\"PLAYING\"")).await);
    let coordinator = a.coordinator.clone();
    eventually("p playing", move || coordinator.peers()[0].video_state == CameraState::Playing).await;
}

#[tokio::test]
async fn custom_action_channel_is_honoured() {
    let (mesh, journal) = room();
    let config = CoordinatorConfig {
        action_namespace: "room".to_string(),
        action_id: "CAM".to_string(),
        enumerate_on_first_stream: false,
        ..CoordinatorConfig::default()
    };
    let a = member_with(&mesh, "a", &["D1"], config);
    let _b = member(&mesh, "b", &[]);
    settle().await;

    assert_ok!(a.coordinator.set_camera_enabled(true).await);
    assert_eq!(a.platform.enumerations(), 0);
    assert!(journal.entries().iter().any(|e| matches!(
        e,
        JournalEntry::Action { from, namespace, action_id, .. }
            if from == "a" && namespace == "room" && action_id == "CAM"
    )));
}

#[tokio::test]
async fn camera_history_follows_the_lifecycle() {
    let (mesh, _journal) = room();
    let a = member(&mesh, "a", &["D1"]);
    assert_ok!(a.coordinator.set_camera_enabled(true).await);
    assert_ok!(a.coordinator.set_camera_enabled(false).await);

    let states: Vec<_> = a
        .coordinator
        .camera_history()
        .into_iter()
        .map(|t| t.to_state)
        .collect();
    assert_eq!(
        states,
        vec![
            LocalCameraState::Acquiring,
            LocalCameraState::On,
            LocalCameraState::Releasing,
            LocalCameraState::Off,
        ]
    );
}

#[tokio::test]
async fn room_events_are_applied_while_the_camera_is_acquiring() {
    let (mesh, _journal) = room();
    let a = member(&mesh, "a", &["D1"]);
    let p = mesh.join("p");
    settle().await;

    let stream = Arc::new(MediaStream::new(vec![MediaTrack::new(MediaKind::Video, None)]));
    let target = "a".to_string();
    assert_ok!(p.add_stream(&stream, Some(&target), &StreamMetadata::webcam()).await);
    assert_ok!(p.send_action("group", "VIDEO_CHANGE", Bytes::from_static(b"\"PLAYING\"")).await);
    let coordinator = a.coordinator.clone();
    eventually("p's stream at a", move || coordinator.peer_video_streams().contains_key("p")).await;

    a.platform.hold_acquisitions();
    let on = {
        let coordinator = a.coordinator.clone();
        tokio::spawn(async move { coordinator.set_camera_enabled(true).await })
    };
    let platform = a.platform.clone();
    eventually("parked acquisition", move || platform.pending_acquisitions() == 1).await;

    let _q = member(&mesh, "q", &[]);
    assert_ok!(p.send_action("group", "VIDEO_CHANGE", Bytes::from_static(b"\"STOPPED\"")).await);

    let coordinator = a.coordinator.clone();
    eventually("p evicted while acquiring", move || {
        !coordinator.peer_video_streams().contains_key("p")
            && coordinator.peers().iter().any(|peer| peer.peer_id == "q")
    })
    .await;
    assert_eq!(a.platform.pending_acquisitions(), 1);
    assert_eq!(a.coordinator.camera_state(), LocalCameraState::Acquiring);

    a.platform.open_gate();
    assert_ok!(on.await.unwrap());
    assert_eq!(a.coordinator.camera_state(), LocalCameraState::On);
}

#[tokio::test]
async fn peer_joining_mid_acquisition_gets_one_route() {
    let (mesh, _journal) = room();
    let a = member(&mesh, "a", &["D1"]);
    let _b = member(&mesh, "b", &[]);
    settle().await;
    a.platform.hold_acquisitions();

    let on = {
        let coordinator = a.coordinator.clone();
        tokio::spawn(async move { coordinator.set_camera_enabled(true).await })
    };
    let platform = a.platform.clone();
    eventually("parked acquisition", move || platform.pending_acquisitions() == 1).await;

    // q is in the peer snapshot taken after acquisition and also queues its
    // own join routing behind the transition.
    let _q = member(&mesh, "q", &[]);
    let coordinator = a.coordinator.clone();
    eventually("q in roster", move || coordinator.peers().iter().any(|p| p.peer_id == "q")).await;

    a.platform.open_gate();
    assert_ok!(on.await.unwrap());
    settle().await;

    assert_eq!(mesh.routes("a", "q").len(), 1);
    assert_eq!(mesh.routes("a", "b").len(), 1);
    assert_eq!(mesh.duplicate_routes(), 0);
}

#[tokio::test]
async fn switch_resolving_after_camera_off_is_discarded() {
    let (mesh, journal) = room();
    let a = member(&mesh, "a", &["D1", "D2"]);
    let _b = member(&mesh, "b", &[]);
    settle().await;
    assert_ok!(a.coordinator.set_camera_enabled(true).await);

    let mark = journal.len();
    a.platform.hold_acquisitions();
    let switch = {
        let coordinator = a.coordinator.clone();
        tokio::spawn(async move { coordinator.select_device("D2").await })
    };
    let platform = a.platform.clone();
    eventually("parked switch", move || platform.pending_acquisitions() == 1).await;
    assert_eq!(a.coordinator.camera_state(), LocalCameraState::Switching);

    let off = {
        let coordinator = a.coordinator.clone();
        tokio::spawn(async move { coordinator.set_camera_enabled(false).await })
    };
    let coordinator = a.coordinator.clone();
    eventually("intent off", move || !coordinator.camera_enabled()).await;
    a.platform.open_gate();

    assert_ok!(switch.await.unwrap());
    assert_ok!(off.await.unwrap());

    let entries = journal.since(mark);
    let acquired = position(&entries, |e| {
        matches!(e, JournalEntry::Acquired { device_id, .. } if device_id == "D2")
    })
    .unwrap();
    let released = position(&entries, |e| {
        matches!(e, JournalEntry::Released { device_id: Some(d), .. } if d == "D2")
    })
    .unwrap();
    assert!(acquired < released);
    assert!(entries.iter().all(|e| !is_added(e, "a")));
    let announced: Vec<_> = entries
        .iter()
        .filter_map(|e| match e {
            JournalEntry::Action { from, payload, .. } if from == "a" => Some(payload.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(announced, vec![STOPPED.to_string()]);

    assert_eq!(a.coordinator.camera_state(), LocalCameraState::Off);
    assert_eq!(a.coordinator.announced_state(), CameraState::Stopped);
    assert_eq!(a.platform.total_live_captures(), 0);
    assert!(mesh.routes("a", "b").is_empty());
}
