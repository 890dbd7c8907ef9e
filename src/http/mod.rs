//! HTTP API subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum router, request id, tracing, limits)
//!     → handlers.rs (decode request, call ControlPlane)
//!     → response.rs (status mapping, JSON error bodies)
//!     → Send to client
//! ```

pub mod handlers;
pub mod response;
pub mod server;

pub use server::{ApiServer, AppState};
