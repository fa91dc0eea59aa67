//! RSA key generation, public key encoding and key persistence

use std::fmt;

use rand_core::OsRng;
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256, Sha384, Sha512};
use shared_types::{DigestAlgorithm, DocSignError, Result, SecurityLevel, Storage};
use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::kdf::{self, EncryptedPrivateKey, KdfParams};

pub const MIN_KEY_SIZE: usize = 2048;
pub const MAX_KEY_SIZE: usize = 16384;
pub const DEFAULT_KEY_SIZE: usize = 4096;

/// RSA private key. Never printed, zeroized when dropped.
#[derive(Clone)]
pub struct PrivateKey {
    inner: RsaPrivateKey,
}

impl PrivateKey {
    pub fn from_pkcs8_der(der: &[u8]) -> Result<Self> {
        let inner = RsaPrivateKey::from_pkcs8_der(der)
            .map_err(|e| DocSignError::InvalidParameters(format!("invalid PKCS#8 key: {}", e)))?;
        Ok(Self { inner })
    }

    pub fn to_pkcs8_der(&self) -> Result<Zeroizing<Vec<u8>>> {
        let document = self
            .inner
            .to_pkcs8_der()
            .map_err(|e| DocSignError::InvalidParameters(format!("PKCS#8 encoding: {}", e)))?;
        Ok(Zeroizing::new(document.as_bytes().to_vec()))
    }

    pub fn bits(&self) -> usize {
        self.inner.size() * 8
    }

    /// Size of a raw signature produced by this key
    pub fn signature_len(&self) -> usize {
        self.inner.size()
    }

    /// Sign an already computed digest with PKCS#1 v1.5 padding
    pub fn sign_digest(&self, algorithm: DigestAlgorithm, digest: &[u8]) -> Result<Vec<u8>> {
        self.inner
            .sign(pkcs1v15_scheme(algorithm), digest)
            .map_err(|e| DocSignError::SigningFailure(format!("RSA signing: {}", e)))
    }

    /// Hash `message` with `algorithm`, then sign
    pub fn sign(&self, algorithm: DigestAlgorithm, message: &[u8]) -> Result<Vec<u8>> {
        self.sign_digest(algorithm, &digest(algorithm, &[message]))
    }

    pub(crate) fn rsa(&self) -> &RsaPrivateKey {
        &self.inner
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("bits", &self.bits())
            .field("material", &"[REDACTED]")
            .finish()
    }
}

/// RSA public key with its canonical DER SubjectPublicKeyInfo encoding
#[derive(Clone)]
pub struct PublicKey {
    inner: RsaPublicKey,
    der: Vec<u8>,
}

impl PublicKey {
    pub fn from_rsa(inner: RsaPublicKey) -> Result<Self> {
        let der = inner
            .to_public_key_der()
            .map_err(|e| DocSignError::InvalidParameters(format!("SPKI encoding: {}", e)))?
            .as_bytes()
            .to_vec();
        Ok(Self { inner, der })
    }

    pub fn from_der(der: &[u8]) -> Result<Self> {
        let inner = RsaPublicKey::from_public_key_der(der)
            .map_err(|e| DocSignError::InvalidParameters(format!("invalid public key: {}", e)))?;
        Self::from_rsa(inner)
    }

    /// Accepts both `PUBLIC KEY` (SPKI) and `RSA PUBLIC KEY` (PKCS#1) PEM
    pub fn from_pem(pem: &str) -> Result<Self> {
        let inner = RsaPublicKey::from_public_key_pem(pem)
            .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
            .map_err(|e| {
                DocSignError::InvalidParameters(format!("invalid public key PEM: {}", e))
            })?;
        Self::from_rsa(inner)
    }

    pub fn to_der(&self) -> &[u8] {
        &self.der
    }

    pub fn to_pem(&self) -> Result<String> {
        self.inner
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| DocSignError::InvalidParameters(format!("PEM encoding: {}", e)))
    }

    /// SHA-256 of the DER encoding, hex
    pub fn fingerprint(&self) -> String {
        hex::encode(Sha256::digest(&self.der))
    }

    pub fn bits(&self) -> usize {
        self.inner.size() * 8
    }

    /// Verify a PKCS#1 v1.5 signature over `message`
    pub fn verify(&self, algorithm: DigestAlgorithm, message: &[u8], signature: &[u8]) -> bool {
        let hashed = digest(algorithm, &[message]);
        self.inner
            .verify(pkcs1v15_scheme(algorithm), &hashed, signature)
            .is_ok()
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.der == other.der
    }
}

impl Eq for PublicKey {}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicKey")
            .field("bits", &self.bits())
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct KeyPair {
    pub public_key: PublicKey,
    pub private_key: PrivateKey,
}

/// Compute a digest over the concatenation of `parts`
pub fn digest(algorithm: DigestAlgorithm, parts: &[&[u8]]) -> Vec<u8> {
    fn run<D: Digest>(parts: &[&[u8]]) -> Vec<u8> {
        let mut hasher = D::new();
        for part in parts {
            hasher.update(part);
        }
        hasher.finalize().to_vec()
    }

    match algorithm {
        DigestAlgorithm::Sha256 => run::<Sha256>(parts),
        DigestAlgorithm::Sha384 => run::<Sha384>(parts),
        DigestAlgorithm::Sha512 => run::<Sha512>(parts),
    }
}

fn pkcs1v15_scheme(algorithm: DigestAlgorithm) -> Pkcs1v15Sign {
    match algorithm {
        DigestAlgorithm::Sha256 => Pkcs1v15Sign::new::<Sha256>(),
        DigestAlgorithm::Sha384 => Pkcs1v15Sign::new::<Sha384>(),
        DigestAlgorithm::Sha512 => Pkcs1v15Sign::new::<Sha512>(),
    }
}

fn check_key_size(key_size: usize) -> Result<()> {
    if key_size < MIN_KEY_SIZE {
        return Err(DocSignError::UnsupportedKeySize(format!(
            "{} bits is below the {}-bit minimum",
            key_size, MIN_KEY_SIZE
        )));
    }
    if key_size > MAX_KEY_SIZE || key_size % 8 != 0 {
        return Err(DocSignError::UnsupportedKeySize(format!(
            "{} bits is not supported",
            key_size
        )));
    }
    Ok(())
}

/// Generate a fresh RSA key pair (public exponent 65537) from the OS RNG
pub fn generate_rsa_key(key_size: usize) -> Result<KeyPair> {
    check_key_size(key_size)?;

    debug!(key_size, "generating RSA key pair");
    let inner = RsaPrivateKey::new(&mut OsRng, key_size)
        .map_err(|e| DocSignError::InvalidParameters(format!("RSA key generation: {}", e)))?;
    let private_key = PrivateKey { inner };
    let public_key = prepare_public_key(&private_key)?;

    info!(key_size, fingerprint = %public_key.fingerprint(), "generated RSA key pair");
    Ok(KeyPair {
        public_key,
        private_key,
    })
}

/// Generate a key pair and encrypt the private half under `password`
pub fn create_keys(password: &str, key_size: usize) -> Result<(EncryptedPrivateKey, PublicKey)> {
    create_keys_with_level(password, key_size, SecurityLevel::default())
}

pub fn create_keys_with_level(
    password: &str,
    key_size: usize,
    level: SecurityLevel,
) -> Result<(EncryptedPrivateKey, PublicKey)> {
    let KeyPair {
        public_key,
        private_key,
    } = generate_rsa_key(key_size)?;
    let encrypted =
        kdf::encrypt_private_key_with(&private_key, password, &KdfParams::for_level(level))?;
    Ok((encrypted, public_key))
}

pub fn prepare_public_key(private_key: &PrivateKey) -> Result<PublicKey> {
    PublicKey::from_rsa(private_key.rsa().to_public_key())
}

pub fn save_encrypted_private_key(
    encrypted: &EncryptedPrivateKey,
    storage: &dyn Storage,
    id: &str,
) -> Result<()> {
    let bytes = encrypted
        .to_bytes()
        .map_err(|e| DocSignError::StorageWrite(format!("{}: {}", id, e.detail())))?;
    storage.write(id, &bytes)?;
    debug!(id, "saved encrypted private key");
    Ok(())
}

pub fn load_encrypted_private_key(storage: &dyn Storage, id: &str) -> Result<EncryptedPrivateKey> {
    let bytes = storage.read(id)?;
    EncryptedPrivateKey::from_bytes(&bytes)
}

pub fn load_and_decrypt_private_key(
    storage: &dyn Storage,
    id: &str,
    password: &str,
) -> Result<PrivateKey> {
    let encrypted = load_encrypted_private_key(storage, id)?;
    kdf::decrypt_private_key(&encrypted, password)
}

/// Persist the public key as SPKI PEM
pub fn save_public_key(public_key: &PublicKey, storage: &dyn Storage, id: &str) -> Result<()> {
    let pem = public_key.to_pem()?;
    storage.write(id, pem.as_bytes())?;
    debug!(id, fingerprint = %public_key.fingerprint(), "saved public key");
    Ok(())
}

pub fn load_public_key(storage: &dyn Storage, id: &str) -> Result<PublicKey> {
    let bytes = storage.read(id)?;
    let pem = String::from_utf8(bytes)
        .map_err(|_| DocSignError::StorageRead(format!("{}: public key is not UTF-8 PEM", id)))?;
    PublicKey::from_pem(&pem)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use std::sync::OnceLock;

    /// One 2048-bit key per test binary; generation dominates test time
    pub fn key_pair() -> &'static KeyPair {
        static KEY: OnceLock<KeyPair> = OnceLock::new();
        KEY.get_or_init(|| generate_rsa_key(2048).unwrap())
    }
}
