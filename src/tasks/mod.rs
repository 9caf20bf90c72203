//! Background tasks module
//!
//! This module contains the coordination tasks that run alongside the host
//! application.

pub mod coordinator;
pub mod force_update;
pub mod sw_messages;

// Re-export main types and functions
pub use coordinator::{CoordinatorPhase, UpdateCoordinator};
pub use force_update::force_update_after;
pub use sw_messages::spawn_sw_message_task;
