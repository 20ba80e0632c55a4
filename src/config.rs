//! Configuration for Portico
//!
//! CLI arguments and environment variable handling using clap.
//! Every flag can also be supplied through the environment, so container
//! deployments configure the gateway without touching the command line.

use clap::Parser;
use std::net::SocketAddr;
use uuid::Uuid;

/// Shipped placeholder secret. Fine for local development, refused by
/// `validate()` outside dev mode.
pub const DEFAULT_JWT_SECRET: &str = "your-super-secret-jwt-key-here";

/// Shipped placeholder API key guarding the server-side refresh endpoint.
pub const DEFAULT_BACKEND_API_KEY: &str = "your-backend-api-key";

/// Portico - SSO handshake gateway
///
/// Issues session tokens and relays RSA-encrypted handshake payloads
/// between an identity provider and a backend service.
#[derive(Parser, Debug, Clone)]
#[command(name = "portico")]
#[command(about = "SSO handshake gateway: payload encryption, hash integrity, session tokens")]
pub struct Args {
    /// Unique node identifier for this gateway instance
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:3001")]
    pub listen: SocketAddr,

    /// Enable development mode (relaxes secret policy)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// HMAC secret for session token signing
    #[arg(long, env = "JWT_SECRET", default_value = DEFAULT_JWT_SECRET)]
    pub jwt_secret: String,

    /// Handshake token lifetime in seconds (24 hours)
    #[arg(long, env = "TOKEN_TTL_SECONDS", default_value = "86400")]
    pub token_ttl_seconds: u64,

    /// Interactive session lifetime in seconds (5 minutes)
    #[arg(
        long,
        env = "SESSION_TTL_SECONDS",
        default_value_t = crate::session::DEFAULT_SESSION_TTL_SECONDS
    )]
    pub session_ttl_seconds: u64,

    /// API key required by the server-side refresh endpoint
    #[arg(long, env = "BACKEND_API_KEY", default_value = DEFAULT_BACKEND_API_KEY)]
    pub backend_api_key: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Validate configuration before startup.
    ///
    /// Dev mode accepts the shipped placeholders; production refuses them
    /// and requires a secret of useful length.
    pub fn validate(&self) -> Result<(), String> {
        if self.jwt_secret.is_empty() {
            return Err("JWT_SECRET must not be empty".to_string());
        }

        if !self.dev_mode {
            if self.jwt_secret == DEFAULT_JWT_SECRET {
                return Err(
                    "JWT_SECRET is still the shipped placeholder; set a real secret or enable DEV_MODE"
                        .to_string(),
                );
            }
            if self.jwt_secret.len() < 32 {
                return Err("JWT_SECRET must be at least 32 characters in production".to_string());
            }
            if self.backend_api_key == DEFAULT_BACKEND_API_KEY {
                return Err(
                    "BACKEND_API_KEY is still the shipped placeholder; set a real key or enable DEV_MODE"
                        .to_string(),
                );
            }
        }

        if self.session_ttl_seconds == 0 {
            return Err("SESSION_TTL_SECONDS must be greater than zero".to_string());
        }

        if self.token_ttl_seconds == 0 {
            return Err("TOKEN_TTL_SECONDS must be greater than zero".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Args {
        Args::parse_from(["portico"])
    }

    #[test]
    fn test_defaults_valid_in_dev_mode() {
        let mut args = base_args();
        args.dev_mode = true;
        assert!(args.validate().is_ok());
        assert_eq!(
            args.session_ttl_seconds,
            crate::session::DEFAULT_SESSION_TTL_SECONDS
        );
    }

    #[test]
    fn test_placeholder_secret_refused_in_production() {
        let args = base_args();
        assert!(!args.dev_mode);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_production_requires_long_secret_and_real_api_key() {
        let mut args = base_args();
        args.jwt_secret = "short-but-not-the-placeholder".into();
        args.backend_api_key = "real-key".into();
        assert!(args.validate().is_err());

        args.jwt_secret = "a-genuinely-long-production-secret-value".into();
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_zero_ttls_rejected() {
        let mut args = base_args();
        args.dev_mode = true;
        args.session_ttl_seconds = 0;
        assert!(args.validate().is_err());

        args.session_ttl_seconds = 300;
        args.token_ttl_seconds = 0;
        assert!(args.validate().is_err());
    }
}
