//! Cross-domain SSO handshake
//!
//! The identity provider side builds a hash-verifiable payload, encrypts it
//! for the relying party, and mints a session token; the relying party side
//! decrypts and checks integrity. The encrypted payload travels as one
//! opaque string and has no lifecycle of its own.

pub mod payload;
pub mod service;

pub use payload::{compute_hash, HandshakePayload};
pub use service::{DecryptedHandshake, HandshakeResponse, HandshakeService};
