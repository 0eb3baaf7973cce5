//! Cumulus Core Library
//!
//! This crate provides the domain models, error taxonomy, and configuration
//! shared across all Cumulus components.

pub mod config;
pub mod error;
pub mod models;
pub mod tree;

// Re-export commonly used types
pub use config::Config;
pub use error::{AppError, ErrorMetadata, LogLevel};
