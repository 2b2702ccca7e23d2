//! Issuance configuration
//!
//! Loaded from an optional TOML file; every field has a default, so an empty
//! file (or none at all) is a valid configuration.
//!
//! ```toml
//! storage_root = "/var/lib/letssmime"
//! key_bits = 4096
//! country = "1224"
//! openssl = "/usr/bin/openssl"
//! http_timeout_secs = 60
//!
//! [authority]
//! signup_page = "https://secure.comodo.com/products/frontpage?area=SecureEmailCertificate"
//! signup_submit = "https://secure.comodo.com/products/!SecureEmailCertificate_Signup"
//! collect = "https://secure.comodo.com/products/download/CollectCCC"
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;
use validator::Validate;

use crate::authority::{AuthorityEndpoints, DEFAULT_COUNTRY};
use crate::error::ConfigError;
use crate::keys::DEFAULT_KEY_BITS;

/// Root configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct IssuanceConfig {
    /// Directory holding one artifact directory per email address
    pub storage_root: PathBuf,

    /// RSA modulus size for new keys
    #[validate(range(min = 1024, max = 16384))]
    pub key_bits: usize,

    /// Default authority country code when none is given
    #[validate(length(min = 1))]
    pub country: String,

    /// `openssl` executable used for bundling
    pub openssl: PathBuf,

    /// Per-request timeout for authority calls
    #[validate(range(min = 1, max = 3600))]
    pub http_timeout_secs: u64,

    /// Authority form endpoints
    #[validate(nested)]
    pub authority: AuthorityEndpoints,
}

impl Default for IssuanceConfig {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from("."),
            key_bits: DEFAULT_KEY_BITS,
            country: DEFAULT_COUNTRY.to_string(),
            openssl: PathBuf::from("openssl"),
            http_timeout_secs: default_http_timeout_secs(),
            authority: AuthorityEndpoints::default(),
        }
    }
}

fn default_http_timeout_secs() -> u64 {
    60
}

impl IssuanceConfig {
    /// Load and validate a TOML configuration file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        debug!(path = %path.display(), "Loaded configuration file");
        Self::from_toml_str(&content)
    }

    /// Parse and validate TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_is_default() {
        let config = IssuanceConfig::from_toml_str("").unwrap();
        assert_eq!(config, IssuanceConfig::default());
        assert_eq!(config.key_bits, 4096);
        assert_eq!(config.country, "1224");
        assert_eq!(config.http_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_overrides() {
        let config = IssuanceConfig::from_toml_str(
            r#"
            storage_root = "/tmp/certs"
            key_bits = 2048
            country = "1250"

            [authority]
            signup_page = "http://localhost:9000/signup"
            "#,
        )
        .unwrap();

        assert_eq!(config.storage_root, PathBuf::from("/tmp/certs"));
        assert_eq!(config.key_bits, 2048);
        assert_eq!(config.country, "1250");
        assert_eq!(config.authority.signup_page, "http://localhost:9000/signup");
        // Unset endpoint fields keep their defaults
        assert_eq!(config.authority.collect, AuthorityEndpoints::default().collect);
    }

    #[test]
    fn test_rejects_tiny_keys() {
        let err = IssuanceConfig::from_toml_str("key_bits = 512").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_bad_endpoint() {
        let err = IssuanceConfig::from_toml_str(
            r#"
            [authority]
            collect = "not a url"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_unknown_fields() {
        let err = IssuanceConfig::from_toml_str("colour = \"blue\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = IssuanceConfig::from_file(Path::new("/nonexistent/letssmime.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
