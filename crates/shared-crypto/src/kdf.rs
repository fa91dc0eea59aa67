//! Password-based protection of private keys at rest
//!
//! The password is stretched with Argon2id into an AES-256 key; the PKCS#8
//! encoding of the private key is sealed with AES-256-GCM. Salt and nonce are
//! fresh per encryption, and the header (format version, cipher, KDF
//! parameters) is authenticated as associated data so a blob whose
//! parameters were edited fails to open.

use std::fmt;

use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce, Tag};
use argon2::{Algorithm, Argon2, Params, Version};
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use shared_types::{DocSignError, Result, SecurityLevel};
use tracing::debug;
use zeroize::Zeroizing;

use crate::keys::PrivateKey;

pub const FORMAT_VERSION: u32 = 1;
pub const KDF_ARGON2ID: &str = "argon2id";
pub const CIPHER_AES_256_GCM: &str = "aes-256-gcm";

pub const SALT_LEN: usize = 16;
pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;
const AES_256_KEY_LEN: u32 = 32;
const MIN_SALT_LEN: usize = 8;

/// Upper bounds accepted for stored parameters. Memory is capped at the
/// `Maximum` level's cost so a key file cannot demand an unbounded allocation.
pub const MAX_ITERATIONS: u32 = 16;
pub const MAX_PARALLELISM: u32 = 16;
const MAX_OUTPUT_LEN: u32 = 64;

/// Key-derivation parameters stored alongside every encrypted key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    pub algorithm: String,
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
    pub output_len: u32,
}

impl KdfParams {
    pub fn argon2id(memory_kib: u32, iterations: u32, parallelism: u32) -> Self {
        Self {
            algorithm: KDF_ARGON2ID.to_string(),
            memory_kib,
            iterations,
            parallelism,
            output_len: AES_256_KEY_LEN,
        }
    }

    pub fn for_level(level: SecurityLevel) -> Self {
        let cost = level.kdf_cost();
        Self::argon2id(cost.memory_kib, cost.iterations, cost.parallelism)
    }

    /// Reject parameters outside the supported cost range
    pub fn check_bounds(&self) -> Result<()> {
        if self.algorithm != KDF_ARGON2ID {
            return Err(DocSignError::InvalidParameters(format!(
                "unsupported KDF '{}'",
                self.algorithm
            )));
        }
        if self.iterations == 0 || self.parallelism == 0 || self.output_len == 0 {
            return Err(DocSignError::InvalidParameters(
                "KDF iterations, parallelism and output length must be positive".to_string(),
            ));
        }
        let max_memory_kib = SecurityLevel::Maximum.kdf_cost().memory_kib;
        if self.memory_kib > max_memory_kib
            || self.iterations > MAX_ITERATIONS
            || self.parallelism > MAX_PARALLELISM
            || self.output_len > MAX_OUTPUT_LEN
        {
            return Err(DocSignError::InvalidParameters(format!(
                "KDF cost out of range (m={}, t={}, p={}, len={}); limits are m<={}, t<={}, p<={}, len<={}",
                self.memory_kib,
                self.iterations,
                self.parallelism,
                self.output_len,
                max_memory_kib,
                MAX_ITERATIONS,
                MAX_PARALLELISM,
                MAX_OUTPUT_LEN
            )));
        }
        Ok(())
    }

    fn hasher(&self) -> Result<Argon2<'static>> {
        self.check_bounds()?;

        let params = Params::new(
            self.memory_kib,
            self.iterations,
            self.parallelism,
            Some(self.output_len as usize),
        )
        .map_err(|e| DocSignError::InvalidParameters(format!("KDF parameters: {}", e)))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }

    fn associated_data(&self, version: u32, cipher: &str) -> Vec<u8> {
        format!(
            "docsign-key/v{}/{}/{}/m={},t={},p={},len={}",
            version,
            cipher,
            self.algorithm,
            self.memory_kib,
            self.iterations,
            self.parallelism,
            self.output_len
        )
        .into_bytes()
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self::for_level(SecurityLevel::default())
    }
}

/// Symmetric key derived from a password. Zeroized on drop.
pub struct DerivedAesKey(Zeroizing<Vec<u8>>);

impl DerivedAesKey {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for DerivedAesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DerivedAesKey({} bytes, [REDACTED])", self.0.len())
    }
}

/// Self-contained encrypted private key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedPrivateKey {
    pub version: u32,
    pub kdf: KdfParams,
    pub cipher: String,
    #[serde(with = "b64")]
    pub salt: Vec<u8>,
    #[serde(with = "b64")]
    pub nonce: Vec<u8>,
    #[serde(with = "b64")]
    pub ciphertext: Vec<u8>,
    #[serde(with = "b64")]
    pub tag: Vec<u8>,
}

impl EncryptedPrivateKey {
    /// Versioned JSON representation
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
            .map_err(|e| DocSignError::InvalidParameters(format!("key serialization: {}", e)))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let parsed: Self = serde_json::from_slice(bytes)
            .map_err(|e| DocSignError::InvalidParameters(format!("unreadable key file: {}", e)))?;
        if parsed.version != FORMAT_VERSION {
            return Err(DocSignError::InvalidParameters(format!(
                "unsupported key file version {}",
                parsed.version
            )));
        }
        parsed.kdf.check_bounds()?;
        Ok(parsed)
    }
}

/// Stretch `password` into key material. Deterministic for equal inputs.
pub fn derive_aes_key(password: &[u8], salt: &[u8], params: &KdfParams) -> Result<DerivedAesKey> {
    if salt.len() < MIN_SALT_LEN {
        return Err(DocSignError::InvalidParameters(format!(
            "salt must be at least {} bytes",
            MIN_SALT_LEN
        )));
    }
    let hasher = params.hasher()?;

    let mut output = Zeroizing::new(vec![0u8; params.output_len as usize]);
    hasher
        .hash_password_into(password, salt, &mut output)
        .map_err(|e| DocSignError::InvalidParameters(format!("key derivation: {}", e)))?;
    Ok(DerivedAesKey(output))
}

pub fn encrypt_private_key(private_key: &PrivateKey, password: &str) -> Result<EncryptedPrivateKey> {
    encrypt_private_key_with(private_key, password, &KdfParams::default())
}

pub fn encrypt_private_key_with(
    private_key: &PrivateKey,
    password: &str,
    params: &KdfParams,
) -> Result<EncryptedPrivateKey> {
    if password.is_empty() {
        return Err(DocSignError::InvalidParameters(
            "password must not be empty".to_string(),
        ));
    }
    if params.output_len != AES_256_KEY_LEN {
        return Err(DocSignError::InvalidParameters(format!(
            "{} requires a {}-byte key",
            CIPHER_AES_256_GCM, AES_256_KEY_LEN
        )));
    }

    let mut salt = vec![0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    let mut nonce = vec![0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let key = derive_aes_key(password.as_bytes(), &salt, params)?;
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| DocSignError::InvalidParameters(format!("cipher key: {}", e)))?;

    // Buffer starts as plaintext and is encrypted in place
    let mut buffer = private_key.to_pkcs8_der()?;
    let aad = params.associated_data(FORMAT_VERSION, CIPHER_AES_256_GCM);
    let tag = cipher
        .encrypt_in_place_detached(Nonce::from_slice(&nonce), &aad, &mut buffer)
        .map_err(|_| DocSignError::InvalidParameters("encryption failed".to_string()))?;

    debug!(
        kdf = %params.algorithm,
        memory_kib = params.memory_kib,
        iterations = params.iterations,
        "encrypted private key"
    );

    Ok(EncryptedPrivateKey {
        version: FORMAT_VERSION,
        kdf: params.clone(),
        cipher: CIPHER_AES_256_GCM.to_string(),
        salt,
        nonce,
        ciphertext: buffer.to_vec(),
        tag: tag.to_vec(),
    })
}

pub fn decrypt_private_key(encrypted: &EncryptedPrivateKey, password: &str) -> Result<PrivateKey> {
    if encrypted.version != FORMAT_VERSION {
        return Err(DocSignError::InvalidParameters(format!(
            "unsupported key file version {}",
            encrypted.version
        )));
    }
    if encrypted.cipher != CIPHER_AES_256_GCM {
        return Err(DocSignError::InvalidParameters(format!(
            "unsupported cipher '{}'",
            encrypted.cipher
        )));
    }
    if encrypted.kdf.output_len != AES_256_KEY_LEN {
        return Err(DocSignError::InvalidParameters(format!(
            "{} requires a {}-byte key",
            CIPHER_AES_256_GCM, AES_256_KEY_LEN
        )));
    }
    if encrypted.nonce.len() != NONCE_LEN || encrypted.tag.len() != TAG_LEN {
        debug!("encrypted key has malformed nonce or tag");
        return Err(DocSignError::WrongPasswordOrCorrupted);
    }
    encrypted.kdf.check_bounds()?;

    let key = derive_aes_key(password.as_bytes(), &encrypted.salt, &encrypted.kdf)?;
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| DocSignError::InvalidParameters(format!("cipher key: {}", e)))?;

    let mut buffer = Zeroizing::new(encrypted.ciphertext.clone());
    let aad = encrypted
        .kdf
        .associated_data(encrypted.version, &encrypted.cipher);
    cipher
        .decrypt_in_place_detached(
            Nonce::from_slice(&encrypted.nonce),
            &aad,
            &mut buffer,
            Tag::from_slice(&encrypted.tag),
        )
        .map_err(|_| {
            debug!("authentication tag rejected");
            DocSignError::WrongPasswordOrCorrupted
        })?;

    PrivateKey::from_pkcs8_der(&buffer).map_err(|_| {
        debug!("decrypted payload is not a PKCS#8 RSA key");
        DocSignError::WrongPasswordOrCorrupted
    })
}

mod b64 {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::fixtures::key_pair;
    use pretty_assertions::assert_eq;
    use shared_types::ErrorKind;

    fn encrypt(password: &str) -> EncryptedPrivateKey {
        encrypt_private_key_with(&key_pair().private_key, password, &fixtures::test_params())
            .unwrap()
    }

    fn same_key(a: &PrivateKey, b: &PrivateKey) -> bool {
        *a.to_pkcs8_der().unwrap() == *b.to_pkcs8_der().unwrap()
    }

    #[test]
    fn test_derive_is_deterministic() {
        let params = fixtures::test_params();
        let salt = [7u8; SALT_LEN];
        let a = derive_aes_key(b"correct-horse", &salt, &params).unwrap();
        let b = derive_aes_key(b"correct-horse", &salt, &params).unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
        assert_eq!(a.len(), 32);

        let c = derive_aes_key(b"correct-horsf", &salt, &params).unwrap();
        assert_ne!(a.as_bytes(), c.as_bytes());

        let d = derive_aes_key(b"correct-horse", &[8u8; SALT_LEN], &params).unwrap();
        assert_ne!(a.as_bytes(), d.as_bytes());
    }

    #[test]
    fn test_derive_rejects_bad_parameters() {
        let salt = [1u8; SALT_LEN];

        let mut params = fixtures::test_params();
        params.algorithm = "scrypt".into();
        let err = derive_aes_key(b"pw", &salt, &params).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameters);

        let mut params = fixtures::test_params();
        params.iterations = 0;
        assert_eq!(
            derive_aes_key(b"pw", &salt, &params).unwrap_err().kind(),
            ErrorKind::InvalidParameters
        );

        let mut params = fixtures::test_params();
        params.output_len = 0;
        assert_eq!(
            derive_aes_key(b"pw", &salt, &params).unwrap_err().kind(),
            ErrorKind::InvalidParameters
        );

        let params = fixtures::test_params();
        assert_eq!(
            derive_aes_key(b"pw", &[0u8; 4], &params).unwrap_err().kind(),
            ErrorKind::InvalidParameters
        );
    }

    #[test]
    fn test_round_trip() {
        let encrypted = encrypt("correct-horse");
        let decrypted = decrypt_private_key(&encrypted, "correct-horse").unwrap();
        assert!(same_key(&decrypted, &key_pair().private_key));
    }

    #[test]
    fn test_wrong_password() {
        let encrypted = encrypt("correct-horse");
        let err = decrypt_private_key(&encrypted, "wrong-password").unwrap_err();
        assert_eq!(err, DocSignError::WrongPasswordOrCorrupted);
    }

    #[test]
    fn test_fresh_salt_and_nonce_per_encryption() {
        let a = encrypt("pw-1234");
        let b = encrypt("pw-1234");
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.ciphertext, b.ciphertext);
        assert_eq!(a.salt.len(), SALT_LEN);
        assert_eq!(a.tag.len(), TAG_LEN);
    }

    #[test]
    fn test_tampered_ciphertext_rejected() {
        let mut encrypted = encrypt("pw-1234");
        encrypted.ciphertext[10] ^= 0x01;
        assert_eq!(
            decrypt_private_key(&encrypted, "pw-1234").unwrap_err(),
            DocSignError::WrongPasswordOrCorrupted
        );
    }

    #[test]
    fn test_tampered_parameters_rejected() {
        let mut encrypted = encrypt("pw-1234");
        encrypted.kdf.iterations += 1;
        assert_eq!(
            decrypt_private_key(&encrypted, "pw-1234").unwrap_err(),
            DocSignError::WrongPasswordOrCorrupted
        );
    }

    #[test]
    fn test_truncated_tag_rejected() {
        let mut encrypted = encrypt("pw-1234");
        encrypted.tag.truncate(8);
        assert_eq!(
            decrypt_private_key(&encrypted, "pw-1234").unwrap_err(),
            DocSignError::WrongPasswordOrCorrupted
        );
    }

    #[test]
    fn test_unknown_cipher_rejected() {
        let mut encrypted = encrypt("pw-1234");
        encrypted.cipher = "aes-128-cbc".into();
        assert_eq!(
            decrypt_private_key(&encrypted, "pw-1234").unwrap_err().kind(),
            ErrorKind::InvalidParameters
        );
    }

    #[test]
    fn test_oversized_kdf_cost_rejected_before_derivation() {
        let mut encrypted = encrypt("pw-1234");
        encrypted.kdf.memory_kib = u32::MAX;
        assert_eq!(
            decrypt_private_key(&encrypted, "pw-1234").unwrap_err().kind(),
            ErrorKind::InvalidParameters
        );

        let mut encrypted = encrypt("pw-1234");
        encrypted.kdf.iterations = u32::MAX;
        assert_eq!(
            decrypt_private_key(&encrypted, "pw-1234").unwrap_err().kind(),
            ErrorKind::InvalidParameters
        );

        let mut encrypted = encrypt("pw-1234");
        encrypted.kdf.parallelism = MAX_PARALLELISM + 1;
        assert_eq!(
            decrypt_private_key(&encrypted, "pw-1234").unwrap_err().kind(),
            ErrorKind::InvalidParameters
        );

        let mut params = fixtures::test_params();
        params.output_len = u32::MAX;
        assert_eq!(
            derive_aes_key(b"pw", &[1u8; SALT_LEN], &params)
                .unwrap_err()
                .kind(),
            ErrorKind::InvalidParameters
        );
    }

    #[test]
    fn test_key_file_with_oversized_cost_is_unreadable() {
        let mut encrypted = encrypt("pw-1234");
        encrypted.kdf.memory_kib = SecurityLevel::Maximum.kdf_cost().memory_kib + 1;
        let bytes = encrypted.to_bytes().unwrap();
        let err = EncryptedPrivateKey::from_bytes(&bytes).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameters);
    }

    #[test]
    fn test_every_level_is_within_bounds() {
        for level in SecurityLevel::ALL {
            assert!(KdfParams::for_level(level).check_bounds().is_ok());
        }
        assert!(fixtures::test_params().check_bounds().is_ok());
    }

    #[test]
    fn test_empty_password_rejected() {
        let err = encrypt_private_key_with(&key_pair().private_key, "", &fixtures::test_params())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameters);
    }

    #[test]
    fn test_json_round_trip() {
        let encrypted = encrypt("pw-1234");
        let bytes = encrypted.to_bytes().unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.contains("\"version\": 1"));
        assert!(text.contains("\"algorithm\": \"argon2id\""));
        assert!(text.contains("\"cipher\": \"aes-256-gcm\""));

        let parsed = EncryptedPrivateKey::from_bytes(&bytes).unwrap();
        assert_eq!(parsed, encrypted);
        assert!(decrypt_private_key(&parsed, "pw-1234").is_ok());
    }

    #[test]
    fn test_unreadable_blob() {
        let err = EncryptedPrivateKey::from_bytes(b"not json").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameters);

        let mut value = serde_json::to_value(encrypt("pw-1234")).unwrap();
        value["version"] = serde_json::json!(9);
        let bytes = serde_json::to_vec(&value).unwrap();
        assert_eq!(
            EncryptedPrivateKey::from_bytes(&bytes).unwrap_err().kind(),
            ErrorKind::InvalidParameters
        );
    }

    #[test]
    fn test_level_params() {
        let params = KdfParams::for_level(SecurityLevel::High);
        assert_eq!(params.algorithm, KDF_ARGON2ID);
        assert_eq!(params.memory_kib, 64 * 1024);
        assert_eq!(params.output_len, 32);
    }

    #[test]
    fn test_derived_key_debug_is_redacted() {
        let key = derive_aes_key(b"pw", &[3u8; SALT_LEN], &fixtures::test_params()).unwrap();
        let rendered = format!("{:?}", key);
        assert!(rendered.contains("REDACTED"));
        assert!(!rendered.contains(&hex::encode(key.as_bytes())));
    }
}
