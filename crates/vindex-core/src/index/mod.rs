//! Vector indexes and the catalog that names them.

pub mod catalog;
pub mod vector_index;

pub use catalog::IndexCatalog;
pub use vector_index::{IndexSettings, VectorIndex};
