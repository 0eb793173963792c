//! Container right-sizing library
//!
//! This crate provides the core functionality for:
//! - Rule loading and evaluation against per-service runtime facts
//! - Concurrent, deadline-bounded stats collection from the container runtime
//! - Compose file parsing, static checks and container to service mapping
//! - Prometheus metrics and structured logging helpers

pub mod collector;
pub mod compose;
pub mod models;
pub mod observability;
pub mod rules;

pub use models::*;
pub use observability::{ScanLogger, ScanMetrics};
