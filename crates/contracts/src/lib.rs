//! # Contracts
//!
//! Frozen interface contracts shared by every crate in the workspace.
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Collaborator model
//! - [`Recipient`]: a connected client that can receive an encoded frame
//! - [`RecipientRegistry`]: point-in-time enumeration of connected recipients
//! - [`Scheduler`]: one-shot and periodic callbacks with cancellable handles
//! - [`ServiceConfig`]: brand rotation and host settings loaded from disk

mod config;
mod error;
mod recipient;
mod scheduler;

pub use config::*;
pub use error::*;
pub use recipient::*;
pub use scheduler::*;
