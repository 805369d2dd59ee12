mod state;
mod types;

pub use state::{StateStore, StoreLimits, DEFAULT_MAX_EVENTS};
pub use types::{ChangeEvent, Impact, Observation, Snapshot, StateError};
