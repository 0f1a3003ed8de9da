//! Blob portal library.
//!
//! A small web front-end over one container of an Azure-style blob
//! service, authenticating through a fixed chain of developer and
//! platform credentials.

pub mod config;
pub mod http;
pub mod identity;
pub mod lifecycle;
pub mod observability;
pub mod storage;
pub mod web;

pub use config::schema::AppConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
