pub mod config;
pub mod core;

// Re-export main components for easy access
pub use config::ClientConfig;
pub use crate::core::*;
