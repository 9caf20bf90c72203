//! State management module
//!
//! This module contains all state-related structures and their management logic.

pub mod activity;
pub mod countdown;
pub mod session;
pub mod version;

// Re-export main types
pub use activity::ActivityTracker;
pub use countdown::{countdown_seconds, CountdownState};
pub use session::SessionState;
pub use version::{UpdateDecision, VersionRecord};
