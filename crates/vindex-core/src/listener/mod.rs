//! Listeners bind embedding sources to document fields.

pub mod binding;
pub mod registry;

pub use binding::{Listener, PendingWrites};
pub use registry::ListenerRegistry;
