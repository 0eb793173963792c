//! Compose file support
//!
//! Reads a compose file into [`Service`](crate::models::Service) records,
//! runs static limit checks, maps observed containers back to services and
//! assembles the per-service report.

mod checks;
mod file;
mod mapping;
mod report;
mod services;

pub use checks::{parse_memory_bytes, static_warnings};
pub use file::{ComposeFile, ComposeService, Deploy, Labels, ResourceLimits, Resources};
pub use mapping::{map_stats_to_services, DuplicateContainer, StatsMapping};
pub use report::{build_reports, ServiceReport};
pub use services::{extract_services, simulated_stats, LABEL_PREFIX};
