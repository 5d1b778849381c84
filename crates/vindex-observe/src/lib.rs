//! Observability for vindex: tracing subscriber setup with optional
//! OpenTelemetry export, plus the span attribute names used across crates.

pub mod attrs;
pub mod tracing_setup;
