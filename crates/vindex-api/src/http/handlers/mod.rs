//! Request handlers, one module per resource.

pub mod index;
pub mod search;
