//! Control plane settings.
//!
//! # Data Flow
//! ```text
//! faultline.toml (optional)
//!     → loader.rs (parse & deserialize)
//!     → environment overrides (FAULTLINE_*, *_URL, PORT)
//!     → validation.rs (semantic checks)
//!     → ControlPlaneConfig (validated, immutable)
//!     → passed explicitly into ControlPlane at construction
//! ```
//!
//! # Design Decisions
//! - No process-wide state: paths, URLs and container names travel in this struct
//! - All fields have defaults matching the bundled compose stack
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::ApplyConfig;
pub use schema::ControlPlaneConfig;
pub use schema::EndpointsConfig;
pub use schema::ObservabilityConfig;
pub use schema::PathsConfig;
pub use schema::ProbeConfig;
pub use schema::ReloadConfig;
pub use schema::ServerConfig;
pub use schema::ServicesConfig;
pub use schema::TimeoutConfig;
pub use schema::TopologyConfig;
