//! Infrastructure implementations for vindex.
//!
//! Adapters for the ports defined in `vindex-core`: fastembed CLIP encoders,
//! a directory-backed document store with a filesystem watcher, JSON
//! snapshots of vector stores, and the config/data-directory loaders.

pub mod config;
pub mod documents;
pub mod embedding;
pub mod filesystem;
pub mod vector;
