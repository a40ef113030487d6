//! Session state, the transition handlers that drive it, and the live-session registry

mod pipeline;
mod state;
mod store;

pub use pipeline::{Pipeline, UploadOutcome};
pub use state::{QaEntry, SessionState};
pub use store::{SessionHandle, SessionStore};
