//! Storage-backed identity, signing and verification calls
//!
//! An identity stored under `key_id` occupies three entries:
//!
//! - `key_id`: the password-encrypted private key (JSON)
//! - `{key_id}_pub.pem`: the SPKI public key
//! - `{key_id}_cert.pem`: the self-signed certificate

use shared_crypto::{
    create_cert, encrypt_private_key_with, generate_rsa_key, load_and_decrypt_private_key,
    load_certificate, load_public_key, save_certificate, save_encrypted_private_key,
    save_public_key, CertValidity, Certificate, KdfParams, KeyPair, PublicKey, SubjectInfo,
};
use shared_pdf::{
    sign_pdf, sign_pdf_full, verify_is_pdf_signed, PdfVerifier, SignOptions, SignedPdf,
    VerificationResult,
};
use shared_types::{DocSignError, Result, Storage};
use tracing::{info, warn};

use crate::config::DocSignConfig;

/// Shortest password accepted for a new identity
pub const MIN_PASSWORD_LEN: usize = 4;

pub fn public_key_id(key_id: &str) -> String {
    format!("{}_pub.pem", key_id)
}

pub fn certificate_id(key_id: &str) -> String {
    format!("{}_cert.pem", key_id)
}

/// Public parts of a stored identity
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub key_id: String,
    pub public_key: PublicKey,
    pub certificate: Certificate,
}

/// Signing workflow over a storage backend
pub struct DocSign<S: Storage> {
    storage: S,
    config: DocSignConfig,
}

impl<S: Storage> DocSign<S> {
    pub fn new(storage: S, config: DocSignConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { storage, config })
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn config(&self) -> &DocSignConfig {
        &self.config
    }

    /// Generate a key pair, protect it under `password` and issue a
    /// certificate, persisting all three entries
    pub fn create_identity(
        &self,
        key_id: &str,
        password: &str,
        subject: &SubjectInfo,
    ) -> Result<Identity> {
        check_key_id(key_id)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(DocSignError::InvalidParameters(format!(
                "password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
        subject.validate()?;
        let validity = CertValidity::days_from_now(self.config.certificate_validity_days)?;

        let key_pair: KeyPair = generate_rsa_key(self.config.key_size)?;
        let certificate = create_cert(&key_pair, subject, &validity)?;
        let encrypted = encrypt_private_key_with(
            &key_pair.private_key,
            password,
            &KdfParams::for_level(self.config.level),
        )?;
        let KeyPair { public_key, .. } = key_pair;

        save_encrypted_private_key(&encrypted, &self.storage, key_id)?;
        save_public_key(&public_key, &self.storage, &public_key_id(key_id))?;
        save_certificate(&certificate, &self.storage, &certificate_id(key_id))?;

        info!(
            key_id,
            subject = %certificate.subject_dn(),
            level = %self.config.level,
            "created signing identity"
        );
        Ok(Identity {
            key_id: key_id.to_string(),
            public_key,
            certificate,
        })
    }

    /// Public key and certificate of a stored identity
    pub fn load_identity(&self, key_id: &str) -> Result<Identity> {
        check_key_id(key_id)?;
        let public_key = load_public_key(&self.storage, &public_key_id(key_id))?;
        let certificate = load_certificate(&self.storage, &certificate_id(key_id))?;
        Ok(Identity {
            key_id: key_id.to_string(),
            public_key,
            certificate,
        })
    }

    /// Basic signature with the stored identity
    pub fn sign(&self, key_id: &str, password: &str, pdf_bytes: &[u8]) -> Result<SignedPdf> {
        check_key_id(key_id)?;
        let private_key = load_and_decrypt_private_key(&self.storage, key_id, password)
            .inspect_err(|e| warn!(key_id, kind = ?e.kind(), "could not unlock signing key"))?;
        let certificate = load_certificate(&self.storage, &certificate_id(key_id))?;
        sign_pdf(pdf_bytes, &private_key, &certificate)
    }

    /// Options seeded from the configured level, reserve, and
    /// certificate/timestamp switches; adjust them before `sign_full`
    pub fn sign_options(&self) -> SignOptions {
        SignOptions::default()
            .with_level(self.config.level)
            .with_signature_reserve(self.config.signature_reserve)
            .with_embedded_certificate(self.config.embed_certificate)
            .with_timestamp(self.config.include_timestamp)
    }

    /// Full signature; `options` are used exactly as given
    pub fn sign_full(
        &self,
        key_id: &str,
        password: &str,
        pdf_bytes: &[u8],
        options: &SignOptions,
    ) -> Result<SignedPdf> {
        check_key_id(key_id)?;
        let private_key = load_and_decrypt_private_key(&self.storage, key_id, password)
            .inspect_err(|e| warn!(key_id, kind = ?e.kind(), "could not unlock signing key"))?;
        let certificate = load_certificate(&self.storage, &certificate_id(key_id))?;
        sign_pdf_full(pdf_bytes, &private_key, &certificate, options)
    }

    /// Verify against the embedded certificates
    pub fn verify(&self, pdf_bytes: &[u8]) -> VerificationResult {
        PdfVerifier::new().verify(pdf_bytes)
    }

    /// Verify and require the signer to hold the stored identity's key
    pub fn verify_with_stored_key(
        &self,
        key_id: &str,
        pdf_bytes: &[u8],
    ) -> Result<VerificationResult> {
        let identity = self.load_identity(key_id)?;
        Ok(PdfVerifier::new()
            .with_certificate(identity.certificate)
            .with_expected_public_key(identity.public_key)
            .verify(pdf_bytes))
    }

    pub fn is_signed(&self, pdf_bytes: &[u8]) -> bool {
        verify_is_pdf_signed(pdf_bytes)
    }
}

fn check_key_id(key_id: &str) -> Result<()> {
    if key_id.trim().is_empty() {
        return Err(DocSignError::InvalidParameters(
            "key id must not be empty".to_string(),
        ));
    }
    Ok(())
}
