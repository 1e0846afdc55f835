//! Background Workers

mod poller_registry;
mod status_poller;

pub use poller_registry::StatusPollerRegistry;
pub use status_poller::{StatusPoller, StatusPollerConfig, StatusPollerHandle};
