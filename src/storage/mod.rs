//! Blob storage subsystem.
//!
//! # Data Flow
//! ```text
//! handler calls an operation
//!     → client.rs builds the container/blob URL
//!     → bearer token fetched from the identity chain (cached)
//!     → REST request against the configured endpoint
//!     → xml.rs decodes listing pages, types.rs carries errors
//! ```
//!
//! # Design Decisions
//! - One client per process, one container per client
//! - The endpoint is resolved when the client is first built, so a
//!   portal without storage configuration still boots
//! - No retry layer: the service is either there or the caller hears
//!   exactly why it is not

pub mod client;
pub mod types;
pub mod xml;

pub use client::{BlobDownload, BlobServiceClient};
pub use types::{BlobItem, StorageError, StorageResult};
