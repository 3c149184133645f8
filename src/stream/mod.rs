//! Live metric streams and their reconnection.
//!
//! - [`Session`] - one subscription, never retried
//! - [`Supervisor`] - keeps a resource's session alive with a fixed-interval retry
//! - [`StreamRegistry`] - one supervisor per watched resource

mod registry;
mod session;
mod status;
mod supervisor;

pub use registry::{ResourceView, StreamOptions, StreamRegistry};
pub use session::{Session, SessionEvent};
pub use status::{ConnectionStatus, Indicator, SessionState, SupervisorState};
pub use supervisor::{Supervisor, SupervisorBuilder, CONNECTION_LOST, DEFAULT_RETRY_DELAY};
