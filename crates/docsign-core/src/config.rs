//! Configuration for the signing workflow
//!
//! Loaded from JSON and validated once; the resulting value is passed
//! explicitly into [`crate::DocSign`].

use std::path::Path;

use serde::{Deserialize, Serialize};
use shared_crypto::keys::{DEFAULT_KEY_SIZE, MAX_KEY_SIZE, MIN_KEY_SIZE};
use shared_pdf::types::{DEFAULT_SIGNATURE_RESERVE, MIN_SIGNATURE_RESERVE};
use shared_types::{DocSignError, Result, SecurityLevel};
use tracing::debug;

/// Default lifetime of a newly issued certificate
pub const DEFAULT_VALIDITY_DAYS: u32 = 365;

/// Longest certificate lifetime accepted, roughly 30 years
pub const MAX_VALIDITY_DAYS: u32 = 30 * 366;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DocSignConfig {
    /// Digest and KDF cost for new identities and signatures
    pub level: SecurityLevel,
    /// RSA modulus size for new identities
    pub key_size: usize,
    /// Bytes reserved for the CMS blob in signed PDFs
    pub signature_reserve: usize,
    pub certificate_validity_days: u32,
    pub embed_certificate: bool,
    /// Add the CMS signing-time attribute in full signatures
    pub include_timestamp: bool,
}

impl Default for DocSignConfig {
    fn default() -> Self {
        Self {
            level: SecurityLevel::Standard,
            key_size: DEFAULT_KEY_SIZE,
            signature_reserve: DEFAULT_SIGNATURE_RESERVE,
            certificate_validity_days: DEFAULT_VALIDITY_DAYS,
            embed_certificate: true,
            include_timestamp: true,
        }
    }
}

impl DocSignConfig {
    /// Parse and validate a JSON document
    ///
    /// Missing fields take their defaults; unknown fields are rejected.
    /// A bad `level` value surfaces as `UnsupportedLevel`.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| DocSignError::InvalidParameters(format!("config is not JSON: {}", e)))?;

        // Levels may be given as 1-3 or as a name
        let mut value = value;
        if let Some(level) = value.get_mut("level") {
            let parsed: SecurityLevel = match level {
                serde_json::Value::Number(n) => n.to_string().parse()?,
                serde_json::Value::String(s) => s.parse()?,
                other => {
                    return Err(DocSignError::UnsupportedLevel(format!(
                        "level must be a number or a name, got {}",
                        other
                    )))
                }
            };
            *level = serde_json::Value::String(parsed.as_str().to_string());
        }

        let config: Self = serde_json::from_value(value)
            .map_err(|e| DocSignError::InvalidParameters(format!("invalid config: {}", e)))?;
        config.validate()?;
        debug!(level = %config.level, key_size = config.key_size, "loaded configuration");
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| DocSignError::StorageRead(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| DocSignError::InvalidParameters(format!("config serialization: {}", e)))
    }

    pub fn with_level(mut self, level: SecurityLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_key_size(mut self, key_size: usize) -> Self {
        self.key_size = key_size;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.key_size < MIN_KEY_SIZE || self.key_size > MAX_KEY_SIZE || self.key_size % 8 != 0 {
            return Err(DocSignError::UnsupportedKeySize(format!(
                "key_size {} must be a multiple of 8 between {} and {}",
                self.key_size, MIN_KEY_SIZE, MAX_KEY_SIZE
            )));
        }
        if self.signature_reserve < MIN_SIGNATURE_RESERVE {
            return Err(DocSignError::InvalidParameters(format!(
                "signature_reserve {} is below {}",
                self.signature_reserve, MIN_SIGNATURE_RESERVE
            )));
        }
        if self.certificate_validity_days == 0 || self.certificate_validity_days > MAX_VALIDITY_DAYS
        {
            return Err(DocSignError::InvalidParameters(format!(
                "certificate_validity_days must be between 1 and {}",
                MAX_VALIDITY_DAYS
            )));
        }
        Ok(())
    }
}
