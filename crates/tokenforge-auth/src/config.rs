//! Grant engine configuration.
//!
//! Sizes are character counts of generated secrets. Lifetimes are written
//! in humantime form (`"10m"`, `"1h"`, `"14d"`).
//!
//! # Example (TOML)
//!
//! ```toml
//! issuer = "https://auth.example.com"
//!
//! [oauth]
//! authorization_code_size = 32
//! access_token_lifetime = "1h"
//!
//! [nonce]
//! lifetime = "1d"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Upper bound for any configured lifetime (100 years).
pub const MAX_LIFETIME: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Root configuration for the grant engine.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Issuer used in the `iss` claim of identity tokens and nonce containers.
    pub issuer: String,

    /// Authorization code, access token and refresh token settings.
    pub oauth: OAuthConfig,

    /// Welcome and password reset nonce settings.
    pub nonce: NonceConfig,

    /// Identity token and nonce container signing.
    pub signing: SigningConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            issuer: "http://localhost:8080".to_string(),
            oauth: OAuthConfig::default(),
            nonce: NonceConfig::default(),
            signing: SigningConfig::default(),
        }
    }
}

/// OAuth 2.0 credential settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OAuthConfig {
    /// Initial authorization code size.
    ///
    /// Only seeds the persisted configuration row. After that the row is
    /// authoritative and grows on code collisions.
    pub authorization_code_size: usize,

    #[serde(with = "humantime_serde")]
    pub authorization_code_lifetime: Duration,

    pub access_token_size: usize,

    #[serde(with = "humantime_serde")]
    pub access_token_lifetime: Duration,

    pub refresh_token_size: usize,

    /// Refresh token lifetime, independent of the paired access token's.
    #[serde(with = "humantime_serde")]
    pub refresh_token_lifetime: Duration,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            authorization_code_size: 32,
            authorization_code_lifetime: Duration::from_secs(600), // 10 minutes
            access_token_size: 32,
            access_token_lifetime: Duration::from_secs(3600), // 1 hour
            refresh_token_size: 32,
            refresh_token_lifetime: Duration::from_secs(14 * 24 * 3600), // 14 days
        }
    }
}

/// Nonce settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NonceConfig {
    pub size: usize,

    #[serde(with = "humantime_serde")]
    pub lifetime: Duration,
}

impl Default for NonceConfig {
    fn default() -> Self {
        Self {
            size: 32,
            lifetime: Duration::from_secs(24 * 3600),
        }
    }
}

/// Signing key settings.
///
/// Without PEM paths an ephemeral key pair is generated at startup.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SigningConfig {
    /// Supported: "RS256", "RS384", "RS512"
    pub algorithm: String,

    /// PKCS#8 PEM private key.
    pub private_key_path: Option<PathBuf>,

    /// SPKI PEM public key.
    pub public_key_path: Option<PathBuf>,

    /// `kid` placed in token headers and the JWKS.
    pub key_id: Option<String>,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            algorithm: "RS256".to_string(),
            private_key_path: None,
            public_key_path: None,
            key_id: None,
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),

    /// The configuration sources could not be read or merged.
    #[error("Failed to load configuration: {0}")]
    Load(String),
}

impl AuthConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - The issuer is empty
    /// - Any secret size or lifetime is zero
    /// - Any lifetime exceeds [`MAX_LIFETIME`]
    /// - The signing algorithm is not supported
    ///
    /// Returns `ConfigError::Missing` if only one of the two PEM paths is set.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.issuer.is_empty() {
            return Err(ConfigError::InvalidValue(
                "issuer cannot be empty".to_string(),
            ));
        }

        let sizes = [
            ("oauth.authorization_code_size", self.oauth.authorization_code_size),
            ("oauth.access_token_size", self.oauth.access_token_size),
            ("oauth.refresh_token_size", self.oauth.refresh_token_size),
            ("nonce.size", self.nonce.size),
        ];
        for (name, size) in sizes {
            if size == 0 {
                return Err(ConfigError::InvalidValue(format!("{name} must be > 0")));
            }
        }

        let lifetimes = [
            (
                "oauth.authorization_code_lifetime",
                self.oauth.authorization_code_lifetime,
            ),
            ("oauth.access_token_lifetime", self.oauth.access_token_lifetime),
            ("oauth.refresh_token_lifetime", self.oauth.refresh_token_lifetime),
            ("nonce.lifetime", self.nonce.lifetime),
        ];
        for (name, lifetime) in lifetimes {
            if lifetime.is_zero() {
                return Err(ConfigError::InvalidValue(format!("{name} must be > 0")));
            }
            if lifetime > MAX_LIFETIME {
                return Err(ConfigError::InvalidValue(format!(
                    "{name} must not exceed {}s",
                    MAX_LIFETIME.as_secs()
                )));
            }
        }

        match self.signing.algorithm.as_str() {
            "RS256" | "RS384" | "RS512" => {}
            other => {
                return Err(ConfigError::InvalidValue(format!(
                    "Invalid signing algorithm: '{}'. Must be RS256, RS384, or RS512",
                    other
                )));
            }
        }

        match (
            &self.signing.private_key_path,
            &self.signing.public_key_path,
        ) {
            (Some(_), None) => Err(ConfigError::Missing(
                "signing.public_key_path".to_string(),
            )),
            (None, Some(_)) => Err(ConfigError::Missing(
                "signing.private_key_path".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

pub mod loader {
    use super::{AuthConfig, ConfigError};
    use config::{Config, Environment, File};
    use std::path::Path;

    /// Loads configuration from an optional TOML file and the environment.
    ///
    /// Environment variables override the file, e.g.
    /// `TOKENFORGE__OAUTH__ACCESS_TOKEN_SIZE=48`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Load` if the sources cannot be merged or
    /// deserialized, or the validation error if the result is invalid.
    pub fn load_config(path: Option<&Path>) -> Result<AuthConfig, ConfigError> {
        let mut builder = Config::builder();
        if let Some(p) = path
            && p.exists()
        {
            builder = builder.add_source(File::from(p.to_path_buf()));
        }
        builder = builder.add_source(
            Environment::with_prefix("TOKENFORGE")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| ConfigError::Load(format!("config build error: {e}")))?;
        let merged: AuthConfig = cfg
            .try_deserialize()
            .map_err(|e| ConfigError::Load(format!("config deserialize error: {e}")))?;
        merged.validate()?;
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_validates() {
        let config = AuthConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.oauth.authorization_code_size, 32);
        assert_eq!(config.signing.algorithm, "RS256");
    }

    #[test]
    fn test_empty_issuer_fails_validation() {
        let mut config = AuthConfig::default();
        config.issuer = String::new();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(_)));
        assert!(err.to_string().contains("issuer"));
    }

    #[test]
    fn test_zero_code_size_fails_validation() {
        let mut config = AuthConfig::default();
        config.oauth.authorization_code_size = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("authorization_code_size"));
    }

    #[test]
    fn test_zero_lifetime_fails_validation() {
        let mut config = AuthConfig::default();
        config.nonce.lifetime = Duration::ZERO;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("nonce.lifetime"));
    }

    #[test]
    fn test_huge_lifetime_fails_validation() {
        let mut config = AuthConfig::default();
        config.oauth.refresh_token_lifetime = Duration::from_secs(u64::MAX);
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(_)));
        assert!(err.to_string().contains("oauth.refresh_token_lifetime"));

        config.oauth.refresh_token_lifetime = MAX_LIFETIME;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_algorithm_fails_validation() {
        let mut config = AuthConfig::default();
        config.signing.algorithm = "HS256".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("signing algorithm"));
    }

    #[test]
    fn test_half_configured_key_pair_fails_validation() {
        let mut config = AuthConfig::default();
        config.signing.private_key_path = Some(PathBuf::from("/keys/private.pem"));
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Missing(_)));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
issuer = "https://auth.example.com"

[oauth]
authorization_code_size = 8
access_token_lifetime = "15m"

[nonce]
lifetime = "2h"
"#
        )
        .unwrap();

        let config = loader::load_config(Some(file.path())).unwrap();
        assert_eq!(config.issuer, "https://auth.example.com");
        assert_eq!(config.oauth.authorization_code_size, 8);
        assert_eq!(config.oauth.access_token_lifetime, Duration::from_secs(900));
        assert_eq!(config.nonce.lifetime, Duration::from_secs(7200));
        assert_eq!(config.oauth.refresh_token_size, 32);
    }

    #[test]
    fn test_load_config_rejects_invalid_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "issuer = \"\"").unwrap();

        let err = loader::load_config(Some(file.path())).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(_)));
    }
}
