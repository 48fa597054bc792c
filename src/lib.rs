pub mod config;
pub mod media;
pub mod metrics;
pub mod room;
pub mod testing;
pub mod transport;
pub mod types;
pub mod utils;

// Re-export main types for convenience
pub use crate::config::CoordinatorConfig;
pub use crate::media::{LocalCameraState, MediaPlatform, MediaStream};
pub use crate::metrics::{VideoMetrics, VideoMetricsSnapshot};
pub use crate::room::{CoordinatorEvent, VideoCoordinator};
pub use crate::transport::{MemoryMesh, MeshTransport, TransportEvent};
pub use crate::types::{CameraState, PeerId, VideoDeviceDescriptor};
pub use crate::utils::{Error, Result};
