//! HTTP API Layer
//!
//! Multipart upload in, archive or validation report out.

pub mod error;
pub mod handler;
pub mod server;
pub mod types;

pub use handler::AppState;
pub use server::{ApiServer, ServerConfig};
