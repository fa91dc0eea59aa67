//! Shared cryptography for signing identities
//!
//! This crate generates RSA key pairs, protects private keys at rest under a
//! password, issues self-signed certificates and builds the detached CMS
//! signatures embedded in PDFs.

pub mod asn1;
pub mod cert;
pub mod cms;
pub mod kdf;
pub mod keys;

pub use cert::{
    create_cert, load_certificate, save_certificate, CertValidity, Certificate, CertificateInfo,
    SubjectInfo,
};
pub use kdf::{
    decrypt_private_key, derive_aes_key, encrypt_private_key, encrypt_private_key_with,
    DerivedAesKey, EncryptedPrivateKey, KdfParams,
};
pub use keys::{
    create_keys, create_keys_with_level, generate_rsa_key, load_and_decrypt_private_key,
    load_encrypted_private_key, load_public_key, prepare_public_key, save_encrypted_private_key,
    save_public_key, KeyPair, PrivateKey, PublicKey,
};
