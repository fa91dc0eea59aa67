//! Signature verification for signed PDFs
//!
//! Every signature dictionary in the file is checked in order of position.
//! The newest one must cover the whole file except its own `/Contents`
//! token; anything appended after it is treated as tampering.

use chrono::{DateTime, Utc};
use shared_crypto::cms::{parse_detached_signature, ParsedSignature, SignatureCheckError};
use shared_crypto::keys::digest;
use shared_crypto::{Certificate, PublicKey};
use shared_types::VerificationFailure;
use tracing::{debug, info, warn};

use crate::byterange::ByteRange;
use crate::parser::{find_last, PdfDocument, SignatureEntry};
use crate::types::{SignatureInfo, VerificationResult};

/// Cheap structural check; never fails
pub fn verify_is_pdf_signed(pdf_bytes: &[u8]) -> bool {
    if !pdf_bytes.starts_with(b"%PDF-") {
        return false;
    }
    match PdfDocument::from_bytes(pdf_bytes) {
        Ok(doc) => !doc.signatures().is_empty(),
        // Structure unreadable; fall back to the raw markers
        Err(_) => has_raw_signature(pdf_bytes),
    }
}

/// A `/ByteRange [` array next to a `/Contents <` hex string
fn has_raw_signature(pdf_bytes: &[u8]) -> bool {
    find_last(pdf_bytes, b"/ByteRange [").is_some() && find_last(pdf_bytes, b"/Contents <").is_some()
}

/// Verify with the embedded certificates at the current time
pub fn verify_pdf(pdf_bytes: &[u8]) -> VerificationResult {
    PdfVerifier::new().verify(pdf_bytes)
}

/// Configurable verification
#[derive(Debug, Clone, Default)]
pub struct PdfVerifier {
    certificate: Option<Certificate>,
    expected_key: Option<PublicKey>,
    at: Option<DateTime<Utc>>,
}

/// What checking one signature produced
struct Checked {
    certificate: Option<Certificate>,
    signing_time: Option<DateTime<Utc>>,
    failure: Option<SignatureCheckError>,
}

impl Checked {
    fn failed(failure: VerificationFailure, detail: impl Into<String>) -> Self {
        Self {
            certificate: None,
            signing_time: None,
            failure: Some(SignatureCheckError {
                failure,
                detail: detail.into(),
            }),
        }
    }
}

impl PdfVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Certificate to use when the signature does not embed the signer's
    pub fn with_certificate(mut self, certificate: Certificate) -> Self {
        self.certificate = Some(certificate);
        self
    }

    /// Require the signer certificate to carry this key
    pub fn with_expected_public_key(mut self, key: PublicKey) -> Self {
        self.expected_key = Some(key);
        self
    }

    /// Validation time for certificate validity; defaults to now
    pub fn at(mut self, at: DateTime<Utc>) -> Self {
        self.at = Some(at);
        self
    }

    pub fn verify(&self, pdf_bytes: &[u8]) -> VerificationResult {
        let doc = match PdfDocument::from_bytes(pdf_bytes) {
            Ok(doc) => doc,
            Err(e) => {
                if pdf_bytes.starts_with(b"%PDF-") && has_raw_signature(pdf_bytes) {
                    warn!(error = %e, "signed document structure is unreadable");
                    return VerificationResult {
                        is_signed: true,
                        failure_reason: Some(VerificationFailure::MalformedSignature),
                        failure_detail: Some(e.detail().to_string()),
                        ..VerificationResult::default()
                    };
                }
                debug!(error = %e, "not a loadable PDF");
                return VerificationResult::unsigned();
            }
        };

        let signatures = doc.signatures();
        if signatures.is_empty() {
            debug!("no signature dictionaries found");
            return VerificationResult::unsigned();
        }

        let at = self.at.unwrap_or_else(Utc::now);
        let last = signatures.len() - 1;
        let mut result = VerificationResult {
            is_signed: true,
            is_valid: true,
            signature_count: signatures.len(),
            ..VerificationResult::default()
        };

        for (i, entry) in signatures.iter().enumerate() {
            let checked = self.check(pdf_bytes, entry, i == last, at);
            let failed = checked.failure.is_some();

            if i == last || (failed && result.is_valid) {
                result.signer_certificate = checked.certificate.as_ref().map(Certificate::info);
                let mut info = signature_info(entry);
                info.signing_time = checked.signing_time;
                result.signature = Some(info);
            }
            if let Some(failure) = checked.failure {
                warn!(
                    field = entry.field_name.as_deref().unwrap_or("-"),
                    reason = %failure.failure,
                    detail = %failure.detail,
                    "signature failed verification"
                );
                if result.is_valid {
                    result.is_valid = false;
                    result.failure_reason = Some(failure.failure);
                    result.failure_detail = Some(failure.detail);
                }
            }
            if !result.is_valid {
                break;
            }
        }

        info!(
            signatures = result.signature_count,
            valid = result.is_valid,
            reason = ?result.failure_reason,
            "verified document"
        );
        result
    }

    fn check(
        &self,
        data: &[u8],
        entry: &SignatureEntry,
        is_last: bool,
        at: DateTime<Utc>,
    ) -> Checked {
        let Some(range) = entry.byte_range().as_deref().and_then(ByteRange::from_slice) else {
            return Checked::failed(
                VerificationFailure::ByteRangeTamperDetected,
                "/ByteRange is not an array of four integers",
            );
        };
        if let Err(e) = range.check(data.len()) {
            return Checked::failed(VerificationFailure::ByteRangeTamperDetected, e.detail());
        }
        if is_last && !range.covers_whole_file(data.len()) {
            return Checked::failed(
                VerificationFailure::ByteRangeTamperDetected,
                format!(
                    "{} ends at {} but the file has {} bytes",
                    range,
                    range.end(),
                    data.len()
                ),
            );
        }
        let hex = match range.contents_hex(data) {
            Ok(hex) => hex,
            Err(e) => {
                return Checked::failed(VerificationFailure::ByteRangeTamperDetected, e.detail())
            }
        };
        let Ok(blob) = hex::decode(hex) else {
            return Checked::failed(
                VerificationFailure::ByteRangeTamperDetected,
                "excluded span has an odd number of hex digits",
            );
        };
        match entry.contents() {
            Some(parsed) if parsed == blob.as_slice() => {}
            Some(_) => {
                return Checked::failed(
                    VerificationFailure::ByteRangeTamperDetected,
                    format!("{} does not exclude this signature's /Contents", range),
                )
            }
            None => {
                return Checked::failed(
                    VerificationFailure::MalformedSignature,
                    "/Contents is missing or not a string",
                )
            }
        }

        let parsed = match parse_detached_signature(&blob) {
            Ok(parsed) => parsed,
            Err(failure) => {
                return Checked {
                    certificate: None,
                    signing_time: None,
                    failure: Some(failure),
                }
            }
        };
        let mut checked = Checked {
            certificate: None,
            signing_time: parsed.signing_time,
            failure: None,
        };
        checked.failure = self.check_parsed(data, &range, &parsed, at, &mut checked.certificate);
        checked
    }

    fn check_parsed(
        &self,
        data: &[u8],
        range: &ByteRange,
        parsed: &ParsedSignature,
        at: DateTime<Utc>,
        chosen: &mut Option<Certificate>,
    ) -> Option<SignatureCheckError> {
        let failed = |failure, detail: String| Some(SignatureCheckError { failure, detail });

        let [head, tail] = match range.covered(data) {
            Ok(spans) => spans,
            Err(e) => {
                return failed(
                    VerificationFailure::ByteRangeTamperDetected,
                    e.detail().to_string(),
                )
            }
        };
        let actual = digest(parsed.digest_algorithm, &[head, tail]);
        if actual != parsed.message_digest {
            return failed(
                VerificationFailure::DigestMismatch,
                format!(
                    "{} of the signed ranges is {}, signature covers {}",
                    parsed.digest_algorithm,
                    hex::encode(&actual),
                    hex::encode(&parsed.message_digest)
                ),
            );
        }

        let certificate = parsed.signer_certificate().cloned().or_else(|| {
            self.certificate
                .as_ref()
                .filter(|c| parsed.identifies(c))
                .cloned()
        });
        let Some(certificate) = certificate else {
            return failed(
                VerificationFailure::SignerCertificateMissing,
                "no embedded or supplied certificate matches the signer identifier".to_string(),
            );
        };
        *chosen = Some(certificate.clone());

        let key = match certificate.public_key() {
            Ok(key) => key,
            Err(e) => {
                return failed(
                    VerificationFailure::UnsupportedAlgorithm,
                    e.detail().to_string(),
                )
            }
        };
        if !parsed.verify_signature(&key) {
            return failed(
                VerificationFailure::InvalidSignature,
                format!(
                    "RSA signature does not verify under {}",
                    certificate.subject_dn()
                ),
            );
        }

        if !parsed.binds_certificate(&certificate) {
            return failed(
                VerificationFailure::InvalidSignature,
                format!(
                    "signed certificate hash does not match {}",
                    certificate.subject_dn()
                ),
            );
        }

        if let Some(expected) = &self.expected_key {
            if !certificate.matches_key(expected) {
                return failed(
                    VerificationFailure::PublicKeyMismatch,
                    format!(
                        "signer key {} differs from expected {}",
                        key.fingerprint(),
                        expected.fingerprint()
                    ),
                );
            }
        }

        if !certificate.is_valid_at(at) {
            return failed(
                VerificationFailure::CertificateExpired,
                format!(
                    "certificate valid {} to {}, checked at {}",
                    certificate.not_before(),
                    certificate.not_after(),
                    at
                ),
            );
        }
        None
    }
}

fn signature_info(entry: &SignatureEntry) -> SignatureInfo {
    SignatureInfo {
        field_name: entry.field_name.clone(),
        sub_filter: entry.name(b"SubFilter"),
        byte_range: entry.byte_range().unwrap_or_default(),
        pdf_signing_time: entry.text(b"M"),
        name: entry.text(b"Name"),
        reason: entry.text(b"Reason"),
        location: entry.text(b"Location"),
        contact_info: entry.text(b"ContactInfo"),
        signing_time: None,
    }
}
