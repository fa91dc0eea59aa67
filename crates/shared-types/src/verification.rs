use std::fmt;

use serde::{Deserialize, Serialize};

/// Why a present signature failed to verify
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationFailure {
    /// Recomputed document digest differs from the signed message digest
    DigestMismatch,
    /// Signing certificate is outside its validity window
    CertificateExpired,
    /// Signature container could not be decoded
    MalformedSignature,
    UnsupportedAlgorithm,
    /// Signed byte range does not cover the document as required
    ByteRangeTamperDetected,
    /// RSA signature over the signed attributes does not verify
    InvalidSignature,
    SignerCertificateMissing,
    /// Certificate key differs from the key the caller expected
    PublicKeyMismatch,
}

impl VerificationFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationFailure::DigestMismatch => "digest mismatch",
            VerificationFailure::CertificateExpired => "certificate expired",
            VerificationFailure::MalformedSignature => "malformed signature structure",
            VerificationFailure::UnsupportedAlgorithm => "unsupported algorithm",
            VerificationFailure::ByteRangeTamperDetected => "byte range tampering detected",
            VerificationFailure::InvalidSignature => "invalid signature",
            VerificationFailure::SignerCertificateMissing => "signer certificate missing",
            VerificationFailure::PublicKeyMismatch => "public key mismatch",
        }
    }
}

impl fmt::Display for VerificationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
