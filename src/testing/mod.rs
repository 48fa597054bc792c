//! Offline stand-ins for the platform media stack.
//!
//! `FakeMediaPlatform` plays the role of the browser/OS camera APIs and
//! `Journal` collects what every fake did, in order, so scenarios can assert on
//! cross-component sequencing without real hardware.

pub mod journal;
pub mod platform;

pub use journal::{Journal, JournalEntry};
pub use platform::FakeMediaPlatform;
