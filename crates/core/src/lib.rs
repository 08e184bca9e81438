// SDK Forge Core - Domain Logic, Ports & Job Orchestration
// NO infrastructure dependencies (Hexagonal Architecture)

pub mod application;
pub mod domain;
pub mod error;
pub mod port;

pub use error::{JobError, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
