use crate::utils::{Error, Result};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LocalCameraState {
    Off,
    Acquiring,
    On,
    Releasing,
    Switching,
}

impl Default for LocalCameraState {
    fn default() -> Self {
        LocalCameraState::Off
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StateTransition {
    pub timestamp: DateTime<Utc>,
    pub from_state: LocalCameraState,
    pub to_state: LocalCameraState,
}

// Oldest entries are dropped past this.
pub const TRANSITION_LOG_LIMIT: usize = 64;

/// Tracks the local camera through OFF -> ACQUIRING -> ON -> RELEASING -> OFF
/// and ON -> SWITCHING -> ON, rejecting anything else.
///
/// Keeps the most recent transitions for diagnostics. Listeners are notified
/// by the coordinator, not here.
#[derive(Debug)]
pub struct CameraStateMachine {
    state: Mutex<LocalCameraState>,
    transition_log: Mutex<VecDeque<StateTransition>>,
}

impl CameraStateMachine {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LocalCameraState::Off),
            transition_log: Mutex::new(VecDeque::with_capacity(TRANSITION_LOG_LIMIT)),
        }
    }

    pub fn is_valid(from: LocalCameraState, to: LocalCameraState) -> bool {
        use LocalCameraState::*;
        matches!(
            (from, to),
            (Off, Acquiring)
                | (Acquiring, On)
                | (Acquiring, Off)
                | (On, Releasing)
                | (Releasing, Off)
                | (On, Switching)
                | (Switching, On)
                | (Switching, Off)
        )
    }

    pub fn transition(&self, new_state: LocalCameraState) -> Result<StateTransition> {
        let mut state = self.state.lock();
        let current = *state;

        if !Self::is_valid(current, new_state) {
            warn!("Rejected camera transition {:?} -> {:?}", current, new_state);
            return Err(Error::InvalidTransition {
                from: current,
                to: new_state,
            });
        }

        let transition = StateTransition {
            timestamp: Utc::now(),
            from_state: current,
            to_state: new_state,
        };
        *state = new_state;
        drop(state);

        debug!("Camera state {:?} -> {:?}", current, new_state);
        let mut log = self.transition_log.lock();
        if log.len() == TRANSITION_LOG_LIMIT {
            log.pop_front();
        }
        log.push_back(transition.clone());
        Ok(transition)
    }

    pub fn current(&self) -> LocalCameraState {
        *self.state.lock()
    }

    /// Recent transitions, oldest first.
    pub fn history(&self) -> Vec<StateTransition> {
        self.transition_log.lock().iter().cloned().collect()
    }
}

impl Default for CameraStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
