//! Signing options, signed output and verification outcomes

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use shared_crypto::{Certificate, CertificateInfo};
use shared_types::{SecurityLevel, VerificationFailure};

/// Default size of the reserved `/Contents` placeholder, in raw bytes
pub const DEFAULT_SIGNATURE_RESERVE: usize = 8192;

/// Lower bound for a caller-supplied reserve
pub const MIN_SIGNATURE_RESERVE: usize = 1024;

pub const FILTER: &str = "Adobe.PPKLite";
pub const SUB_FILTER: &str = "adbe.pkcs7.detached";

/// Stages of one signing call, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SigningStage {
    Loaded,
    PlaceholderReserved,
    DigestComputed,
    Signed,
    Written,
}

impl SigningStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            SigningStage::Loaded => "loaded",
            SigningStage::PlaceholderReserved => "placeholder_reserved",
            SigningStage::DigestComputed => "digest_computed",
            SigningStage::Signed => "signed",
            SigningStage::Written => "written",
        }
    }
}

impl fmt::Display for SigningStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Visible signature stamp placement
#[derive(Debug, Clone, PartialEq)]
pub struct SignatureAppearance {
    /// 1-based page number
    pub page: u32,
    /// [x, y, width, height] in PDF user space
    pub rect: [f64; 4],
}

impl SignatureAppearance {
    /// Default position: bottom-left corner of `page`
    pub fn new(page: u32) -> Self {
        Self {
            page,
            rect: [36.0, 36.0, 220.0, 54.0],
        }
    }

    pub fn with_rect(mut self, rect: [f64; 4]) -> Self {
        self.rect = rect;
        self
    }
}

/// Options for `sign_pdf_full`
#[derive(Debug, Clone)]
pub struct SignOptions {
    /// Selects the message digest
    pub level: SecurityLevel,
    /// Raw bytes reserved for the CMS blob; grown automatically if too small
    pub signature_reserve: usize,
    /// Embed the signer certificate in the CMS blob
    pub embed_certificate: bool,
    /// Additional chain certificates to embed
    pub extra_certificates: Vec<Certificate>,
    /// Add the CMS signing-time attribute
    pub include_timestamp: bool,
    /// Fixed signing time; `None` means now
    pub signing_time: Option<DateTime<Utc>>,
    pub reason: Option<String>,
    pub location: Option<String>,
    pub contact_info: Option<String>,
    /// `/Name`; defaults to the certificate common name
    pub name: Option<String>,
    /// Visible stamp; `None` gives an invisible signature on page 1
    pub appearance: Option<SignatureAppearance>,
    /// Field name; defaults to the next free `SignatureN`
    pub field_name: Option<String>,
}

impl Default for SignOptions {
    fn default() -> Self {
        Self {
            level: SecurityLevel::default(),
            signature_reserve: DEFAULT_SIGNATURE_RESERVE,
            embed_certificate: true,
            extra_certificates: Vec::new(),
            include_timestamp: true,
            signing_time: None,
            reason: None,
            location: None,
            contact_info: None,
            name: None,
            appearance: None,
            field_name: None,
        }
    }
}

impl SignOptions {
    pub fn with_level(mut self, level: SecurityLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_contact_info(mut self, contact_info: impl Into<String>) -> Self {
        self.contact_info = Some(contact_info.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_signing_time(mut self, at: DateTime<Utc>) -> Self {
        self.signing_time = Some(at);
        self
    }

    pub fn with_appearance(mut self, appearance: SignatureAppearance) -> Self {
        self.appearance = Some(appearance);
        self
    }

    pub fn with_extra_certificates(mut self, certificates: Vec<Certificate>) -> Self {
        self.extra_certificates = certificates;
        self
    }

    pub fn with_signature_reserve(mut self, reserve: usize) -> Self {
        self.signature_reserve = reserve;
        self
    }

    pub fn with_embedded_certificate(mut self, embed: bool) -> Self {
        self.embed_certificate = embed;
        self
    }

    pub fn with_timestamp(mut self, include: bool) -> Self {
        self.include_timestamp = include;
        self
    }

    pub fn with_field_name(mut self, name: impl Into<String>) -> Self {
        self.field_name = Some(name.into());
        self
    }
}

/// A signed document and where its signature lives
#[derive(Clone, PartialEq, Eq)]
pub struct SignedPdf {
    pub bytes: Vec<u8>,
    pub byte_range: [i64; 4],
    pub signing_time: DateTime<Utc>,
    /// DER length of the embedded CMS blob
    pub signature_len: usize,
    pub field_name: String,
}

impl SignedPdf {
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl fmt::Debug for SignedPdf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignedPdf")
            .field("len", &self.bytes.len())
            .field("byte_range", &self.byte_range)
            .field("signing_time", &self.signing_time)
            .field("signature_len", &self.signature_len)
            .field("field_name", &self.field_name)
            .finish()
    }
}

/// Signature dictionary metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SignatureInfo {
    pub field_name: Option<String>,
    pub sub_filter: Option<String>,
    pub byte_range: Vec<i64>,
    /// Raw `/M` value
    pub pdf_signing_time: Option<String>,
    pub name: Option<String>,
    pub reason: Option<String>,
    pub location: Option<String>,
    pub contact_info: Option<String>,
    /// CMS signing-time attribute, when present
    pub signing_time: Option<DateTime<Utc>>,
}

/// Outcome of verifying a document's signatures
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerificationResult {
    pub is_signed: bool,
    pub is_valid: bool,
    pub signer_certificate: Option<CertificateInfo>,
    pub failure_reason: Option<VerificationFailure>,
    pub failure_detail: Option<String>,
    pub signature_count: usize,
    /// Metadata of the most recent signature
    pub signature: Option<SignatureInfo>,
}

impl VerificationResult {
    pub fn unsigned() -> Self {
        Self::default()
    }

    pub fn signer_subject(&self) -> Option<&str> {
        self.signer_certificate.as_ref().map(|c| c.subject.as_str())
    }
}
