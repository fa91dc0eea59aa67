//! Document signing core
//!
//! Ties the shared crates together: RSA identities protected at rest
//! (`shared-crypto`), PDF signing and verification (`shared-pdf`), and a
//! storage-backed workflow with explicit configuration.
//!
//! ```no_run
//! use docsign_core::{DocSign, DocSignConfig, MemoryStorage, SubjectInfo};
//!
//! # fn main() -> docsign_core::Result<()> {
//! let app = DocSign::new(MemoryStorage::new(), DocSignConfig::default())?;
//! app.create_identity("alice", "correct-horse", &SubjectInfo::new("Alice"))?;
//! # let pdf_bytes: Vec<u8> = Vec::new();
//! let signed = app.sign("alice", "correct-horse", &pdf_bytes)?;
//! assert!(app.verify(&signed.bytes).is_valid);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod workflow;

pub use config::DocSignConfig;
pub use workflow::{DocSign, Identity};

pub use shared_crypto::{
    cert, cms, create_cert, create_keys, create_keys_with_level, decrypt_private_key,
    encrypt_private_key, generate_rsa_key, keys, load_and_decrypt_private_key,
    prepare_public_key, save_encrypted_private_key, save_public_key, CertValidity, Certificate,
    CertificateInfo, EncryptedPrivateKey, KeyPair, PrivateKey, PublicKey, SubjectInfo,
};
pub use shared_pdf::{
    parser, sign_pdf, sign_pdf_full, signer, verifier, verify_is_pdf_signed, verify_pdf,
    PdfDocument, PdfVerifier, SignOptions, SignatureAppearance, SignatureInfo, SignedPdf,
    SigningStage, VerificationResult,
};
pub use shared_types::{
    DigestAlgorithm, DocSignError, ErrorKind, FileStorage, MemoryStorage, Result, SecurityLevel,
    Storage, VerificationFailure,
};
