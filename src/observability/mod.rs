//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Orchestrator stages, restarts, reloads, probes:
//!     → logging.rs (structured log events, version_id on every stage)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging via `tracing`; level from RUST_LOG or config
//! - Metrics are cheap and always recorded; the exporter is optional

pub mod logging;
pub mod metrics;
