//! Authentication for Portico
//!
//! Symmetric (shared-secret HS256) session token handling. Kept deliberately
//! independent of the asymmetric payload cipher in [`crate::crypto`].

pub mod jwt;

pub use jwt::{extract_token_from_header, Claims, TokenService, TokenVerification};
