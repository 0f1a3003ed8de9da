//! Web front-end subsystem.
//!
//! # Data Flow
//! ```text
//! browser loads / (page.rs, embedded HTML)
//!     → page JS calls /api/blobs endpoints
//!     → handlers.rs resolves the shared blob client
//!     → storage subsystem does the actual transfer
//! ```

pub mod handlers;
pub mod page;
