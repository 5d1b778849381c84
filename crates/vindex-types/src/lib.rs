//! Shared domain types for vindex.
//!
//! This crate contains the types passed between the index core, the
//! infrastructure adapters and the CLI/HTTP surface: documents, embedding
//! spaces, listener descriptors, build reports, configuration and errors.
//!
//! Zero infrastructure dependencies -- only serde and thiserror.

pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod index;
pub mod listener;
