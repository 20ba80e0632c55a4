//! Portico - SSO handshake gateway
//!
//! Portico brokers the handshake between an identity provider and a relying
//! backend: it builds integrity-hashed payloads, encrypts them under the
//! relying party's RSA public key, and mints HS256 session tokens for the
//! same identity. A session lifecycle controller tracks the interactive
//! session on the client side of the exchange.

pub mod auth;
pub mod config;
pub mod crypto;
pub mod handshake;
pub mod routes;
pub mod server;
pub mod session;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{PorticoError, Result};
