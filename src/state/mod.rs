//! State management module.
//!
//! Contains the Hub (shared relay state) and the entities it coordinates:
//! sessions, the lanes that own them, and the name directory.

mod directory;
mod hub;
mod lane;
mod lanes;
mod session;

pub use directory::DirectoryError;
pub use hub::{Hub, HubParams};
pub use lane::{CloseReason, LaneEvent};
pub use session::{Session, SessionId};
