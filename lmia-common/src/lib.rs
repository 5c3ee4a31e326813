//! # LMIA Common Library
//!
//! Shared code for the LMIA geocoding tools including:
//! - Error types
//! - TOML configuration loading and writing
//! - Free-text field sanitization

pub mod config;
pub mod error;
pub mod text;

pub use error::{Error, Result};
