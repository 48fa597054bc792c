//! Camera transitions and room membership handling.
//!
//! Every transition runs while holding the camera lock, so at most one of
//! ACQUIRING, RELEASING or SWITCHING is in flight and later requests queue up
//! behind it. Intent is read again after each suspending step; an acquisition
//! that resolves after the user turned the camera off is released without
//! ever being published.
//!
//! Room events are applied on the event loop without touching the camera
//! lock. Only the routing owed to a joining or leaving peer waits for the
//! camera, on its own ordered queue.

use super::broadcaster::PeerStateBroadcaster;
use super::coordinator::{CoordinatorEvent, Shared};
use crate::media::{CaptureManager, LocalCameraState, MediaStream};
use crate::transport::{Subscription, TransportEvent};
use crate::types::{CameraState, DeviceId, PeerId, VideoDeviceDescriptor};
use crate::utils::{Error, Result};
use bytes::Bytes;
use log::{debug, info, warn};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::{Arc, Weak};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

pub(super) struct LocalCamera {
    pub capture: CaptureManager,
    // Peers currently holding a route to the active stream.
    pub published: HashSet<PeerId>,
    pub enumerated: bool,
}

impl Shared {
    fn transition(&self, to: LocalCameraState) -> Result<()> {
        let transition = self.states.transition(to)?;
        self.emit(CoordinatorEvent::CameraStateChanged(transition));
        Ok(())
    }

    fn camera_wanted(&self) -> bool {
        self.intent.lock().camera_enabled
    }

    async fn announce(&self, state: CameraState) {
        *self.announced.lock() = state;
        match self.broadcaster.announce(state).await {
            Ok(()) => self.emit(CoordinatorEvent::Announced(state)),
            Err(e) => warn!("Failed to announce camera {:?}: {}", state, e),
        }
    }

    fn capture_failed(&self, error: &Error) {
        warn!("Camera unavailable for {}: {}", self.self_id, error);
        self.intent.lock().camera_enabled = false;
        *self.last_error.lock() = Some(error.to_string());
        self.emit(CoordinatorEvent::CaptureFailed(error.to_string()));
    }

    /// Drives the camera until it matches the latest intent.
    pub(super) async fn reconcile(&self) -> Result<()> {
        let mut camera = self.camera.lock().await;
        loop {
            if self.is_closed() {
                return Err(Error::Closed);
            }
            let intent = self.intent.lock().clone();
            let current = camera.capture.active().map(|h| h.device_id().cloned());

            match (intent.camera_enabled, current) {
                (true, None) => self.start_camera(&mut camera, intent.selected_device).await?,
                (false, Some(_)) => self.stop_camera(&mut camera).await?,
                (true, Some(current)) => match intent.selected_device {
                    Some(selected) if current.as_ref() != Some(&selected) => {
                        self.switch_camera(&mut camera, selected).await?
                    }
                    _ => return Ok(()),
                },
                (false, None) => return Ok(()),
            }
        }
    }

    async fn start_camera(&self, camera: &mut LocalCamera, selected: Option<DeviceId>) -> Result<()> {
        self.transition(LocalCameraState::Acquiring)?;

        let device = selected.or_else(|| {
            if self.config.default_to_first_device {
                self.devices.read().first().map(|d| d.device_id.clone())
            } else {
                None
            }
        });

        let handle = match camera.capture.acquire(device).await {
            Ok(handle) => handle,
            Err(e) => {
                self.transition(LocalCameraState::Off)?;
                self.capture_failed(&e);
                return Err(e);
            }
        };

        if !self.camera_wanted() {
            debug!("{}; releasing stream {}", Error::AcquisitionRace, handle.stream().id());
            self.metrics.record_discarded_acquisition();
            camera.capture.release(handle.stream()).await;
            return self.transition(LocalCameraState::Off);
        }

        let stream = handle.stream().clone();
        camera.published = self.router.publish(&stream, None).await.into_iter().collect();
        camera.capture.set_active(handle);
        *self.self_stream.write() = Some(stream);
        *self.last_error.lock() = None;

        self.announce(CameraState::Playing).await;
        self.transition(LocalCameraState::On)?;

        if self.config.enumerate_on_first_stream && !camera.enumerated {
            if let Err(e) = self.enumerate(camera).await {
                warn!("Device enumeration failed: {}", e);
            }
        }
        Ok(())
    }

    /// RELEASING: unpublish from every peer, release, then announce STOPPED.
    pub(super) async fn stop_camera(&self, camera: &mut LocalCamera) -> Result<()> {
        self.transition(LocalCameraState::Releasing)?;

        if let Some(handle) = camera.capture.take_active() {
            let peers = self.transport.get_peers();
            self.router.unpublish(handle.stream(), &peers).await;
            camera.published.clear();
            camera.capture.release(handle.stream()).await;
        }
        *self.self_stream.write() = None;

        self.announce(CameraState::Stopped).await;
        self.transition(LocalCameraState::Off)
    }

    /// SWITCHING: the old stream is withdrawn and released before the new
    /// device is opened. The announced state does not change on success.
    async fn switch_camera(&self, camera: &mut LocalCamera, device: DeviceId) -> Result<()> {
        self.transition(LocalCameraState::Switching)?;

        if let Some(old) = camera.capture.take_active() {
            let peers = self.transport.get_peers();
            self.router.unpublish(old.stream(), &peers).await;
            camera.published.clear();
            camera.capture.release(old.stream()).await;
        }
        *self.self_stream.write() = None;

        let acquired = camera.capture.acquire(Some(device.clone())).await;
        let wanted = self.camera_wanted();
        match acquired {
            Ok(handle) if wanted => {
                let stream = handle.stream().clone();
                camera.published = self.router.publish(&stream, None).await.into_iter().collect();
                camera.capture.set_active(handle);
                *self.self_stream.write() = Some(stream);
                info!("Switched camera to {}", device);
                self.transition(LocalCameraState::On)
            }
            Ok(handle) => {
                debug!("{}; dropping switch to {}", Error::AcquisitionRace, device);
                self.metrics.record_discarded_acquisition();
                camera.capture.release(handle.stream()).await;
                self.announce(CameraState::Stopped).await;
                self.transition(LocalCameraState::Off)
            }
            Err(e) => {
                self.announce(CameraState::Stopped).await;
                self.transition(LocalCameraState::Off)?;
                self.capture_failed(&e);
                Err(e)
            }
        }
    }

    pub(super) async fn enumerate(&self, camera: &mut LocalCamera) -> Result<Vec<VideoDeviceDescriptor>> {
        let devices = camera.capture.enumerate_devices().await?;
        camera.enumerated = true;
        *self.devices.write() = devices.clone();
        self.emit(CoordinatorEvent::DevicesChanged(devices.clone()));
        Ok(devices)
    }

    fn on_peer_joined(&self, peer_id: PeerId) -> Routing {
        if self.roster.upsert(&peer_id) {
            self.emit(CoordinatorEvent::PeerJoined(peer_id.clone()));
        }
        Routing::Joined(peer_id)
    }

    fn on_peer_left(&self, peer_id: PeerId) -> Routing {
        if self.registry.evict(&peer_id).is_some() {
            self.emit(CoordinatorEvent::RemoteStreamRemoved(peer_id.clone()));
        }
        if self.roster.remove(&peer_id).is_some() {
            self.emit(CoordinatorEvent::PeerLeft(peer_id.clone()));
        }
        Routing::Left(peer_id)
    }

    /// Applies the camera side of a membership change. Waits for any
    /// transition in flight, so it runs off the event loop.
    async fn route(&self, routing: Routing) {
        let mut camera = self.camera.lock().await;
        match routing {
            Routing::Joined(peer_id) => {
                if self.is_closed() || camera.published.contains(&peer_id) {
                    return;
                }
                let stream = match camera.capture.active() {
                    Some(handle) => handle.stream().clone(),
                    None => return,
                };
                let delivered = self.router.publish(&stream, Some(&peer_id)).await;
                camera.published.extend(delivered);
            }
            Routing::Left(peer_id) => {
                if !camera.published.remove(&peer_id) {
                    return;
                }
                if let Some(handle) = camera.capture.active() {
                    self.router.unpublish(handle.stream(), &[peer_id]).await;
                }
            }
        }
    }

    fn on_action(&self, namespace: &str, action_id: &str, payload: &Bytes, sender: PeerId) {
        if !self.broadcaster.matches(namespace, action_id) {
            return;
        }
        let state = match PeerStateBroadcaster::decode(payload) {
            Ok(state) => state,
            Err(e) => {
                warn!("Malformed camera announcement from {}: {}", sender, e);
                return;
            }
        };

        match self.broadcaster.on_receive(state, &sender) {
            Ok(reception) => {
                if reception.evicted {
                    self.emit(CoordinatorEvent::RemoteStreamRemoved(sender.clone()));
                }
                self.emit(CoordinatorEvent::PeerVideoStateChanged {
                    peer_id: sender,
                    state,
                });
            }
            Err(e) if e.is_benign() => debug!("Ignored announcement: {}", e),
            Err(e) => warn!("Failed to apply announcement from {}: {}", sender, e),
        }
    }

    fn on_inbound_stream(&self, stream: Arc<MediaStream>, peer_id: PeerId, metadata: &Value) {
        if self.is_closed() {
            return;
        }
        if self.registry.on_inbound_stream(stream, &peer_id, metadata) {
            self.emit(CoordinatorEvent::RemoteStreamAdded(peer_id));
        }
    }

    /// Applies roster, registry and announcement changes right away. Returns
    /// the routing work a membership change still needs.
    fn handle_event(&self, event: TransportEvent) -> Option<Routing> {
        debug!("{} received {:?}", self.self_id, event);
        match event {
            TransportEvent::PeerJoined(peer_id) => Some(self.on_peer_joined(peer_id)),
            TransportEvent::PeerLeft(peer_id) => Some(self.on_peer_left(peer_id)),
            TransportEvent::PeerStream {
                stream,
                peer_id,
                metadata,
            } => {
                self.on_inbound_stream(stream, peer_id, &metadata);
                None
            }
            TransportEvent::Action {
                namespace,
                action_id,
                payload,
                sender,
            } => {
                self.on_action(&namespace, &action_id, &payload, sender);
                None
            }
        }
    }
}

/// Stream routing owed to a peer after it joined or left.
#[derive(Debug)]
enum Routing {
    Joined(PeerId),
    Left(PeerId),
}

/// Feeds transport events to the coordinator until stopped. Events are never
/// held up by a camera transition; joins and leaves queue their routing, in
/// arrival order, on a separate task. The subscription is released when the
/// task ends.
pub(super) fn spawn_pump(
    shared: Weak<Shared>,
    mut subscription: Subscription,
    mut stop: oneshot::Receiver<()>,
) -> JoinHandle<()> {
    let (routes, queue) = mpsc::unbounded_channel();
    let routing = spawn_routing(shared.clone(), queue);

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = &mut stop => break,
                event = subscription.recv() => {
                    let event = match event {
                        Some(event) => event,
                        None => {
                            info!("Transport closed the video subscription");
                            break;
                        }
                    };
                    let shared = match shared.upgrade() {
                        Some(shared) => shared,
                        None => break,
                    };
                    if let Some(work) = shared.handle_event(event) {
                        if routes.send(work).is_err() {
                            break;
                        }
                    }
                }
            }
        }
        subscription.unsubscribe();

        drop(routes);
        if let Err(e) = routing.await {
            warn!("Video routing task ended abnormally: {}", e);
        }
    })
}

fn spawn_routing(shared: Weak<Shared>, mut queue: mpsc::UnboundedReceiver<Routing>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(work) = queue.recv().await {
            match shared.upgrade() {
                Some(shared) => shared.route(work).await,
                None => break,
            }
        }
    })
}
