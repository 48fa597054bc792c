use super::{PeerHookType, TransportEvent};
use futures_util::Stream;
use log::debug;
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use uuid::Uuid;

type Unsubscribe = Box<dyn FnOnce() + Send + Sync>;

/// A registered event handler slot on the transport.
///
/// The registration is released exactly once: by `unsubscribe()` or, failing
/// that, on drop.
pub struct Subscription {
    id: Uuid,
    hook: PeerHookType,
    receiver: mpsc::UnboundedReceiver<TransportEvent>,
    unsubscribe: Option<Unsubscribe>,
}

impl Subscription {
    pub fn new(
        hook: PeerHookType,
        receiver: mpsc::UnboundedReceiver<TransportEvent>,
        unsubscribe: impl FnOnce() + Send + Sync + 'static,
    ) -> Self {
        Self::with_id(Uuid::new_v4(), hook, receiver, unsubscribe)
    }

    pub fn with_id(
        id: Uuid,
        hook: PeerHookType,
        receiver: mpsc::UnboundedReceiver<TransportEvent>,
        unsubscribe: impl FnOnce() + Send + Sync + 'static,
    ) -> Self {
        Self {
            id,
            hook,
            receiver,
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn hook(&self) -> PeerHookType {
        self.hook
    }

    /// `None` once the transport dropped this registration.
    pub async fn recv(&mut self) -> Option<TransportEvent> {
        self.receiver.recv().await
    }

    pub fn is_active(&self) -> bool {
        self.unsubscribe.is_some()
    }

    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            debug!("Releasing {:?} subscription {}", self.hook, self.id);
            self.receiver.close();
            unsubscribe();
        }
    }
}

impl Stream for Subscription {
    type Item = TransportEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("hook", &self.hook)
            .field("active", &self.is_active())
            .finish()
    }
}
