pub mod broadcaster;
pub mod coordinator;
mod lifecycle;
pub mod registry;
pub mod roster;
pub mod router;

pub use broadcaster::{PeerStateBroadcaster, Reception};
pub use coordinator::{CoordinatorEvent, VideoCoordinator};
pub use registry::RemoteStreamRegistry;
pub use roster::PeerRoster;
pub use router::StreamRouter;
