//! Concrete embedding sources.

pub mod clip;

pub use clip::{ClipImageEmbedder, ClipOptions, ClipTextEmbedder, clip_space};
