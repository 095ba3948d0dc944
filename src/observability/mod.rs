//! Observability subsystem.
//!
//! Structured logging via `tracing`; every hot-path event carries key-value
//! fields so log aggregation can filter by backend, upstream and status.

pub mod logging;
