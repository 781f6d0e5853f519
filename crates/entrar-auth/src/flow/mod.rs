//! The flow state machine shared by all authentication use cases.
//!
//! Each flow owns exactly one [`FlowState`] and transitions are its sole
//! mutator: every user action resolves to a new state, and errors are
//! retained for rendering instead of being thrown past the flow boundary.

pub(crate) mod common;
pub(crate) mod engine;
mod error;
mod policy;
mod state;

pub use error::FlowError;
pub use policy::FlowPolicy;
pub use state::{FlowKind, FlowState, TerminalArtifact};
