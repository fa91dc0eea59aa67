//! Signing identities shared by the unit tests

use std::sync::OnceLock;

use shared_crypto::{
    create_cert, generate_rsa_key, CertValidity, Certificate, KeyPair, PrivateKey, SubjectInfo,
};

struct Identity {
    key_pair: KeyPair,
    certificate: Certificate,
}

fn issue(common_name: &str) -> Identity {
    let key_pair = generate_rsa_key(2048).unwrap();
    let subject = SubjectInfo::new(common_name).with_organization("Example Corp");
    let certificate =
        create_cert(&key_pair, &subject, &CertValidity::days_from_now(365).unwrap()).unwrap();
    Identity {
        key_pair,
        certificate,
    }
}

/// "Test Signer", valid for a year from first use
pub fn identity() -> (&'static PrivateKey, &'static Certificate) {
    static ID: OnceLock<Identity> = OnceLock::new();
    let id = ID.get_or_init(|| issue("Test Signer"));
    (&id.key_pair.private_key, &id.certificate)
}

/// A second, unrelated identity
pub fn other_identity() -> (&'static PrivateKey, &'static Certificate) {
    static ID: OnceLock<Identity> = OnceLock::new();
    let id = ID.get_or_init(|| issue("Other Signer"));
    (&id.key_pair.private_key, &id.certificate)
}

/// A distinct certificate for chain padding, issued over the other identity's key
pub fn chain_certificate(n: usize) -> Certificate {
    let (key, _) = other_identity();
    let key_pair = KeyPair {
        public_key: shared_crypto::prepare_public_key(key).unwrap(),
        private_key: key.clone(),
    };
    let subject = SubjectInfo::new(format!("Intermediate {}", n));
    create_cert(&key_pair, &subject, &CertValidity::days_from_now(30).unwrap()).unwrap()
}
