//! Shared types for Portico

pub mod error;

pub use error::{PorticoError, Result};
