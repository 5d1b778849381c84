//! Incremental updates: a broadcast bus of document events and the
//! dispatcher that feeds them to an index.

pub mod bus;
pub mod dispatcher;

pub use bus::DocumentEventBus;
pub use dispatcher::{DispatchStats, ListenerDispatcher};
