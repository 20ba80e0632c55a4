//! Cryptographic primitives for the handshake
//!
//! Two independent subsystems: the SHA-256 integrity digest and the RSA-OAEP
//! payload cipher. Token signing lives in [`crate::auth`] and shares no key
//! material with either.

pub mod cipher;
pub mod digest;

pub use cipher::{
    decrypt_with_private_key, encrypt_with_public_key, generate_keypair, validate_public_key_pem,
};
pub use digest::sha256_hex;
