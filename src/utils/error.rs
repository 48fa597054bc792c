use crate::media::camera_state::LocalCameraState;
use crate::types::PeerId;
use std::error::Error as StdError;
use std::fmt;

#[derive(Debug)]
pub enum Error {
    DeviceUnavailable(String),
    AcquisitionRace,
    PublishTargetGone(PeerId),
    StaleAnnouncement(PeerId),
    Transport(String),
    Json(serde_json::Error),
    InvalidTransition {
        from: LocalCameraState,
        to: LocalCameraState,
    },
    Closed,
}

impl Error {
    /// Errors that are handled where they occur and never reach the UI.
    pub fn is_benign(&self) -> bool {
        matches!(
            self,
            Error::AcquisitionRace | Error::PublishTargetGone(_) | Error::StaleAnnouncement(_)
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::DeviceUnavailable(e) => write!(f, "Camera unavailable: {}", e),
            Error::AcquisitionRace => write!(f, "Acquisition superseded by a newer intent"),
            Error::PublishTargetGone(peer) => write!(f, "Peer {} is no longer connected", peer),
            Error::StaleAnnouncement(peer) => write!(f, "Announcement from unknown peer {}", peer),
            Error::Transport(e) => write!(f, "Transport error: {}", e),
            Error::Json(e) => write!(f, "JSON error: {}", e),
            Error::InvalidTransition { from, to } => {
                write!(f, "Invalid camera transition: {:?} -> {:?}", from, to)
            }
            Error::Closed => write!(f, "Video coordinator is shut down"),
        }
    }
}

impl StdError for Error {}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::Json(error)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
