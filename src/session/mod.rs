//! Peer session module
//!
//! This module owns the single peer link: the Idle/Connected state machine,
//! the link with its read loop, and the actor that serializes every
//! transition.

pub mod actor;
pub mod link;
pub mod state;

pub use actor::{spawn_session, LinkStatus, SessionHandle, SessionStatus};
pub use link::{LinkId, LinkOrigin, LinkStats};
pub use state::{SessionState, SessionStateMachine};
