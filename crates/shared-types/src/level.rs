//! Security levels select the message digest and the key-derivation cost.
//!
//! A level is always passed explicitly; there is no process-wide default
//! that could be changed at runtime.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DocSignError;

/// Digest algorithm used for the document hash and the CMS signed attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DigestAlgorithm {
    #[default]
    Sha256,
    Sha384,
    Sha512,
}

impl DigestAlgorithm {
    /// Dotted OID of the digest algorithm
    pub fn oid(&self) -> &'static str {
        match self {
            DigestAlgorithm::Sha256 => "2.16.840.1.101.3.4.2.1",
            DigestAlgorithm::Sha384 => "2.16.840.1.101.3.4.2.2",
            DigestAlgorithm::Sha512 => "2.16.840.1.101.3.4.2.3",
        }
    }

    pub fn from_oid(oid: &str) -> Option<Self> {
        match oid {
            "2.16.840.1.101.3.4.2.1" => Some(DigestAlgorithm::Sha256),
            "2.16.840.1.101.3.4.2.2" => Some(DigestAlgorithm::Sha384),
            "2.16.840.1.101.3.4.2.3" => Some(DigestAlgorithm::Sha512),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DigestAlgorithm::Sha256 => "SHA-256",
            DigestAlgorithm::Sha384 => "SHA-384",
            DigestAlgorithm::Sha512 => "SHA-512",
        }
    }

    /// Output size in bytes
    pub fn output_len(&self) -> usize {
        match self {
            DigestAlgorithm::Sha256 => 32,
            DigestAlgorithm::Sha384 => 48,
            DigestAlgorithm::Sha512 => 64,
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Argon2id cost parameters attached to a level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfCost {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityLevel {
    #[default]
    Standard,
    High,
    Maximum,
}

impl SecurityLevel {
    pub const ALL: [SecurityLevel; 3] = [
        SecurityLevel::Standard,
        SecurityLevel::High,
        SecurityLevel::Maximum,
    ];

    pub fn digest(&self) -> DigestAlgorithm {
        match self {
            SecurityLevel::Standard => DigestAlgorithm::Sha256,
            SecurityLevel::High => DigestAlgorithm::Sha384,
            SecurityLevel::Maximum => DigestAlgorithm::Sha512,
        }
    }

    pub fn kdf_cost(&self) -> KdfCost {
        match self {
            SecurityLevel::Standard => KdfCost {
                memory_kib: 19 * 1024,
                iterations: 2,
                parallelism: 1,
            },
            SecurityLevel::High => KdfCost {
                memory_kib: 64 * 1024,
                iterations: 3,
                parallelism: 1,
            },
            SecurityLevel::Maximum => KdfCost {
                memory_kib: 128 * 1024,
                iterations: 4,
                parallelism: 1,
            },
        }
    }

    /// Numeric form used by shells that pass the level as a bare value
    pub fn as_u8(&self) -> u8 {
        match self {
            SecurityLevel::Standard => 1,
            SecurityLevel::High => 2,
            SecurityLevel::Maximum => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityLevel::Standard => "standard",
            SecurityLevel::High => "high",
            SecurityLevel::Maximum => "maximum",
        }
    }
}

impl TryFrom<u8> for SecurityLevel {
    type Error = DocSignError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(SecurityLevel::Standard),
            2 => Ok(SecurityLevel::High),
            3 => Ok(SecurityLevel::Maximum),
            other => Err(DocSignError::UnsupportedLevel(format!(
                "level {} is not one of 1, 2, 3",
                other
            ))),
        }
    }
}

impl FromStr for SecurityLevel {
    type Err = DocSignError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(n) = trimmed.parse::<u8>() {
            return SecurityLevel::try_from(n);
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "standard" => Ok(SecurityLevel::Standard),
            "high" => Ok(SecurityLevel::High),
            "maximum" | "max" => Ok(SecurityLevel::Maximum),
            _ => Err(DocSignError::UnsupportedLevel(format!(
                "unknown level '{}'",
                trimmed
            ))),
        }
    }
}

impl fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::error::ErrorKind;
    use proptest::prelude::*;

    fn any_level() -> impl Strategy<Value = SecurityLevel> {
        prop::sample::select(SecurityLevel::ALL.to_vec())
    }

    proptest! {
        /// Numeric and named forms parse back to the same level, in any case and padding
        #[test]
        fn level_text_forms_parse_back(
            level in any_level(),
            upper in any::<bool>(),
            pad in 0usize..3,
        ) {
            let name = if upper {
                level.as_str().to_ascii_uppercase()
            } else {
                level.as_str().to_string()
            };
            let padded = format!("{}{}{}", " ".repeat(pad), name, " ".repeat(pad));
            prop_assert_eq!(padded.parse::<SecurityLevel>().unwrap(), level);
            prop_assert_eq!(level.to_string().parse::<SecurityLevel>().unwrap(), level);
            prop_assert_eq!(SecurityLevel::try_from(level.as_u8()).unwrap(), level);
            prop_assert_eq!(level.as_u8().to_string().parse::<SecurityLevel>().unwrap(), level);
        }

        /// Every byte outside 1..=3 is an unsupported level
        #[test]
        fn out_of_range_numbers_rejected(
            n in any::<u8>().prop_filter("not a level", |n| !(1..=3).contains(n)),
        ) {
            let err = SecurityLevel::try_from(n).unwrap_err();
            prop_assert_eq!(err.kind(), ErrorKind::UnsupportedLevel);
            let err = n.to_string().parse::<SecurityLevel>().unwrap_err();
            prop_assert_eq!(err.kind(), ErrorKind::UnsupportedLevel);
        }
    }
}
