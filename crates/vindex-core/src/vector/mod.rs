//! Vector storage and nearest-neighbor search.

pub mod distance;
pub mod memory;
pub mod ranking;
pub mod store;

pub use memory::InMemoryVectorStore;
pub use store::VectorStore;
