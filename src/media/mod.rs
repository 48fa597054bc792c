pub mod camera_state;
pub mod capture;
pub mod platform;
pub mod stream;

pub use camera_state::{CameraStateMachine, LocalCameraState, StateTransition};
pub use capture::{CaptureManager, LocalCaptureHandle};
pub use platform::{CaptureConstraints, MediaDeviceInfo, MediaDeviceKind, MediaPlatform};
pub use stream::{MediaKind, MediaStream, MediaTrack};
