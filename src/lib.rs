//! faultline-control library
//!
//! Turns a proposed multi-file configuration change for the observability
//! stack into a validated, snapshotted, health-checked transaction that rolls
//! itself back on failure.

// Core transaction
pub mod orchestrator;
pub mod snapshot;
pub mod store;
pub mod validation;

// Collaborators
pub mod effects;
pub mod health;

// Surfaces
pub mod alerts;
pub mod control_plane;
pub mod http;

// Cross-cutting concerns
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod yaml;

pub use config::ControlPlaneConfig;
pub use control_plane::ControlPlane;
pub use error::{ControlError, ControlResult};
pub use http::ApiServer;
pub use lifecycle::Shutdown;
pub use orchestrator::{ApplyOutcome, ApplyRequest, ApplyStage};
