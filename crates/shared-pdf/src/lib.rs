//! PDF signing and signature verification
//!
//! Signatures are added as incremental updates: the original bytes are kept
//! untouched and a new revision carrying the signature dictionary, the
//! signature field and the rewritten catalog is appended after them.

pub mod byterange;
pub mod parser;
pub mod signer;
pub mod types;
pub mod verifier;
pub mod writer;

#[cfg(test)]
mod test_identity;

pub use byterange::ByteRange;
pub use parser::PdfDocument;
pub use signer::{sign_pdf, sign_pdf_full};
pub use types::{
    SignOptions, SignatureAppearance, SignatureInfo, SignedPdf, SigningStage, VerificationResult,
};
pub use verifier::{verify_is_pdf_signed, verify_pdf, PdfVerifier};
