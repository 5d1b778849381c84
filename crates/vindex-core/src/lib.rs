//! Vector index logic and port traits for vindex.
//!
//! This crate defines the "ports" the infrastructure layer implements
//! (`Embedder`, `DocumentSource`) together with the pieces that make up an
//! index: the in-memory vector store, listeners binding embedders to document
//! fields, the named `VectorIndex`, and the event dispatcher that keeps an
//! index current. It depends only on `vindex-types` -- never on
//! `vindex-infra` or any model/IO crate.

pub mod document;
pub mod embedding;
pub mod event;
pub mod index;
pub mod listener;
pub mod vector;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;
