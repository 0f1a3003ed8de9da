//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (request ID generation and propagation)
//!     → web handlers (pages and blob API)
//!     → error.rs (status mapping, environment-aware error bodies)
//!     → Send to client
//! ```

pub mod error;
pub mod request;
pub mod server;

pub use error::{ApiError, GENERIC_ERROR};
pub use request::{PortalRequestId, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
