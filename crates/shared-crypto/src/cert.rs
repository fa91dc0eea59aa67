//! Self-signed X.509 certificates binding a public key to a signer identity

use std::time::Duration;

use chrono::{DateTime, Utc};
use rand_core::{OsRng, RngCore};
use serde::Serialize;
use shared_types::{DigestAlgorithm, DocSignError, Result, Storage};
use tracing::{debug, info};
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::certificate::{TbsCertificate, Version};
use x509_cert::der::asn1::{BitString, GeneralizedTime, OctetString, SetOfVec, UtcTime};
use x509_cert::der::oid::ObjectIdentifier;
use x509_cert::der::pem::LineEnding;
use x509_cert::der::{Any, Decode, DecodePem, Encode, EncodePem, Tag};
use x509_cert::ext::pkix::{BasicConstraints, KeyUsage, KeyUsages};
use x509_cert::ext::Extension;
use x509_cert::name::{Name, RdnSequence, RelativeDistinguishedName};
use x509_cert::serial_number::SerialNumber;
use x509_cert::spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use x509_cert::time::{Time, Validity};

use crate::keys::{prepare_public_key, KeyPair, PublicKey};

const OID_CN: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.3");
const OID_C: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.6");
const OID_L: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.7");
const OID_ST: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.8");
const OID_O: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.10");
const OID_OU: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.11");

const OID_KEY_USAGE: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.15");
const OID_BASIC_CONSTRAINTS: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.19");

pub(crate) const OID_SHA256_WITH_RSA: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.11");
pub(crate) const OID_SHA384_WITH_RSA: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.12");
pub(crate) const OID_SHA512_WITH_RSA: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.13");
pub(crate) const OID_RSA_ENCRYPTION: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");

/// X.520 upper bound for commonName
const MAX_COMMON_NAME_LEN: usize = 64;
const MAX_ATTRIBUTE_LEN: usize = 128;
const SERIAL_LEN: usize = 16;

/// Distinguished-name fields of the certificate subject
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SubjectInfo {
    pub common_name: String,
    pub organization: Option<String>,
    pub organizational_unit: Option<String>,
    pub locality: Option<String>,
    pub state_or_province: Option<String>,
    /// Two-letter country code
    pub country: Option<String>,
}

impl SubjectInfo {
    pub fn new(common_name: impl Into<String>) -> Self {
        Self {
            common_name: common_name.into(),
            ..Default::default()
        }
    }

    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }

    pub fn with_organizational_unit(mut self, unit: impl Into<String>) -> Self {
        self.organizational_unit = Some(unit.into());
        self
    }

    pub fn with_locality(mut self, locality: impl Into<String>) -> Self {
        self.locality = Some(locality.into());
        self
    }

    pub fn with_state_or_province(mut self, state: impl Into<String>) -> Self {
        self.state_or_province = Some(state.into());
        self
    }

    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        let cn = self.common_name.trim();
        if cn.is_empty() {
            return Err(DocSignError::InvalidSubjectInfo(
                "common name must not be empty".to_string(),
            ));
        }
        check_attribute("common name", cn, MAX_COMMON_NAME_LEN)?;

        let optional = [
            ("organization", &self.organization),
            ("organizational unit", &self.organizational_unit),
            ("locality", &self.locality),
            ("state or province", &self.state_or_province),
        ];
        for (label, value) in optional {
            if let Some(value) = value {
                check_attribute(label, value, MAX_ATTRIBUTE_LEN)?;
            }
        }

        if let Some(country) = &self.country {
            if country.len() != 2 || !country.chars().all(|c| c.is_ascii_alphabetic()) {
                return Err(DocSignError::InvalidSubjectInfo(format!(
                    "country '{}' is not a two-letter code",
                    country
                )));
            }
        }
        Ok(())
    }

    /// Attributes in issuance order: C, ST, L, O, OU, CN
    fn attributes(&self) -> Vec<(ObjectIdentifier, Tag, String)> {
        let mut attrs = Vec::new();
        if let Some(c) = &self.country {
            attrs.push((OID_C, Tag::PrintableString, c.to_ascii_uppercase()));
        }
        let optional = [
            (OID_ST, &self.state_or_province),
            (OID_L, &self.locality),
            (OID_O, &self.organization),
            (OID_OU, &self.organizational_unit),
        ];
        for (oid, value) in optional {
            if let Some(value) = value {
                if !value.trim().is_empty() {
                    attrs.push((oid, Tag::Utf8String, value.trim().to_string()));
                }
            }
        }
        attrs.push((OID_CN, Tag::Utf8String, self.common_name.trim().to_string()));
        attrs
    }

    fn to_name(&self) -> Result<Name> {
        let mut rdns = Vec::new();
        for (oid, tag, value) in self.attributes() {
            let atv = AttributeTypeAndValue {
                oid,
                value: Any::new(tag, value.into_bytes()).map_err(der_error)?,
            };
            let set = SetOfVec::try_from(vec![atv]).map_err(der_error)?;
            rdns.push(RelativeDistinguishedName(set));
        }
        Ok(RdnSequence(rdns))
    }
}

fn check_attribute(label: &str, value: &str, max_len: usize) -> Result<()> {
    if value.chars().any(|c| c.is_control()) {
        return Err(DocSignError::InvalidSubjectInfo(format!(
            "{} contains control characters",
            label
        )));
    }
    if value.chars().count() > max_len {
        return Err(DocSignError::InvalidSubjectInfo(format!(
            "{} is longer than {} characters",
            label, max_len
        )));
    }
    Ok(())
}

/// Certificate validity window, second precision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CertValidity {
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
}

impl CertValidity {
    pub fn new(not_before: DateTime<Utc>, not_after: DateTime<Utc>) -> Result<Self> {
        let not_before = truncate_to_seconds(not_before);
        let not_after = truncate_to_seconds(not_after);
        if not_before >= not_after {
            return Err(DocSignError::InvalidParameters(
                "certificate validity must end after it begins".to_string(),
            ));
        }
        if not_before.timestamp() < 0 {
            return Err(DocSignError::InvalidParameters(
                "certificate validity cannot start before 1970".to_string(),
            ));
        }
        Ok(Self {
            not_before,
            not_after,
        })
    }

    pub fn days_from(not_before: DateTime<Utc>, days: u32) -> Result<Self> {
        if days == 0 {
            return Err(DocSignError::InvalidParameters(
                "certificate validity must be at least one day".to_string(),
            ));
        }
        Self::new(not_before, not_before + chrono::Duration::days(i64::from(days)))
    }

    pub fn days_from_now(days: u32) -> Result<Self> {
        Self::days_from(Utc::now(), days)
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.not_before <= at && at <= self.not_after
    }
}

fn truncate_to_seconds(at: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(at.timestamp(), 0).unwrap_or(at)
}

pub(crate) fn to_x509_time(at: DateTime<Utc>) -> Result<Time> {
    let secs = u64::try_from(at.timestamp()).map_err(|_| {
        DocSignError::InvalidParameters(format!("time {} precedes the Unix epoch", at))
    })?;
    let since_epoch = Duration::from_secs(secs);
    // RFC 5280: UTCTime through 2049, GeneralizedTime afterwards
    match UtcTime::from_unix_duration(since_epoch) {
        Ok(utc) => Ok(Time::UtcTime(utc)),
        Err(_) => GeneralizedTime::from_unix_duration(since_epoch)
            .map(Time::GeneralTime)
            .map_err(der_error),
    }
}

pub(crate) fn from_x509_time(time: &Time) -> DateTime<Utc> {
    let secs = time.to_unix_duration().as_secs();
    i64::try_from(secs)
        .ok()
        .and_then(|s| DateTime::from_timestamp(s, 0))
        .unwrap_or_default()
}

pub(crate) fn der_error(e: x509_cert::der::Error) -> DocSignError {
    DocSignError::InvalidParameters(format!("DER encoding: {}", e))
}

pub(crate) fn digest_for_signature_oid(oid: &ObjectIdentifier) -> Option<DigestAlgorithm> {
    if *oid == OID_SHA256_WITH_RSA {
        Some(DigestAlgorithm::Sha256)
    } else if *oid == OID_SHA384_WITH_RSA {
        Some(DigestAlgorithm::Sha384)
    } else if *oid == OID_SHA512_WITH_RSA {
        Some(DigestAlgorithm::Sha512)
    } else {
        None
    }
}

pub(crate) fn signature_oid_for_digest(digest: DigestAlgorithm) -> ObjectIdentifier {
    match digest {
        DigestAlgorithm::Sha256 => OID_SHA256_WITH_RSA,
        DigestAlgorithm::Sha384 => OID_SHA384_WITH_RSA,
        DigestAlgorithm::Sha512 => OID_SHA512_WITH_RSA,
    }
}

/// `AlgorithmIdentifier` with explicit NULL parameters, as RSA expects
pub(crate) fn rsa_algorithm(oid: ObjectIdentifier) -> Result<AlgorithmIdentifierOwned> {
    Ok(AlgorithmIdentifierOwned {
        oid,
        parameters: Some(Any::new(Tag::Null, Vec::<u8>::new()).map_err(der_error)?),
    })
}

/// Printable summary of a certificate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CertificateInfo {
    /// Subject common name
    pub subject: String,
    pub subject_dn: String,
    pub issuer_dn: String,
    pub serial_hex: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub public_key_fingerprint: String,
}

/// X.509 certificate with its DER encoding
#[derive(Clone)]
pub struct Certificate {
    inner: x509_cert::Certificate,
    der: Vec<u8>,
}

impl Certificate {
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let inner = x509_cert::Certificate::from_der(der)
            .map_err(|e| DocSignError::InvalidParameters(format!("invalid certificate: {}", e)))?;
        Ok(Self {
            inner,
            der: der.to_vec(),
        })
    }

    pub fn from_pem(pem: &str) -> Result<Self> {
        let inner = x509_cert::Certificate::from_pem(pem.as_bytes()).map_err(|e| {
            DocSignError::InvalidParameters(format!("invalid certificate PEM: {}", e))
        })?;
        let der = inner.to_der().map_err(der_error)?;
        Ok(Self { inner, der })
    }

    pub(crate) fn from_x509(inner: x509_cert::Certificate) -> Result<Self> {
        let der = inner.to_der().map_err(der_error)?;
        Ok(Self { inner, der })
    }

    pub fn to_der(&self) -> &[u8] {
        &self.der
    }

    pub fn to_pem(&self) -> Result<String> {
        self.inner.to_pem(LineEnding::LF).map_err(der_error)
    }

    pub(crate) fn x509(&self) -> &x509_cert::Certificate {
        &self.inner
    }

    /// Subject common name, empty when absent
    pub fn subject_common_name(&self) -> String {
        find_attribute(&self.inner.tbs_certificate.subject, OID_CN).unwrap_or_default()
    }

    pub fn subject_dn(&self) -> String {
        format_name(&self.inner.tbs_certificate.subject)
    }

    pub fn issuer_dn(&self) -> String {
        format_name(&self.inner.tbs_certificate.issuer)
    }

    pub fn serial_hex(&self) -> String {
        hex::encode(self.inner.tbs_certificate.serial_number.as_bytes())
    }

    pub fn not_before(&self) -> DateTime<Utc> {
        from_x509_time(&self.inner.tbs_certificate.validity.not_before)
    }

    pub fn not_after(&self) -> DateTime<Utc> {
        from_x509_time(&self.inner.tbs_certificate.validity.not_after)
    }

    pub fn is_valid_at(&self, at: DateTime<Utc>) -> bool {
        self.not_before() <= at && at <= self.not_after()
    }

    pub fn is_self_issued(&self) -> bool {
        self.inner.tbs_certificate.issuer == self.inner.tbs_certificate.subject
    }

    /// Certified public key; non-RSA keys are reported as unsupported
    pub fn public_key(&self) -> Result<PublicKey> {
        let spki = self.spki_der()?;
        PublicKey::from_der(&spki).map_err(|_| {
            DocSignError::UnsupportedAlgorithm(format!(
                "certificate key algorithm {} is not RSA",
                self.inner
                    .tbs_certificate
                    .subject_public_key_info
                    .algorithm
                    .oid
            ))
        })
    }

    /// Value equality between the certified key and `key`
    pub fn matches_key(&self, key: &PublicKey) -> bool {
        self.spki_der()
            .map(|spki| spki == key.to_der())
            .unwrap_or(false)
    }

    /// Check the certificate's own signature with its own key
    pub fn verify_self_signature(&self) -> Result<()> {
        let digest = digest_for_signature_oid(&self.inner.signature_algorithm.oid).ok_or_else(
            || {
                DocSignError::UnsupportedAlgorithm(format!(
                    "certificate signature algorithm {}",
                    self.inner.signature_algorithm.oid
                ))
            },
        )?;
        let tbs = self.inner.tbs_certificate.to_der().map_err(der_error)?;
        let key = self.public_key()?;
        if key.verify(digest, &tbs, self.inner.signature.raw_bytes()) {
            Ok(())
        } else {
            Err(DocSignError::SigningFailure(
                "certificate self-signature does not verify".to_string(),
            ))
        }
    }

    pub fn info(&self) -> CertificateInfo {
        CertificateInfo {
            subject: self.subject_common_name(),
            subject_dn: self.subject_dn(),
            issuer_dn: self.issuer_dn(),
            serial_hex: self.serial_hex(),
            not_before: self.not_before(),
            not_after: self.not_after(),
            public_key_fingerprint: self
                .public_key()
                .map(|k| k.fingerprint())
                .unwrap_or_default(),
        }
    }

    fn spki_der(&self) -> Result<Vec<u8>> {
        self.inner
            .tbs_certificate
            .subject_public_key_info
            .to_der()
            .map_err(der_error)
    }
}

impl PartialEq for Certificate {
    fn eq(&self, other: &Self) -> bool {
        self.der == other.der
    }
}

impl Eq for Certificate {}

impl std::fmt::Debug for Certificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Certificate")
            .field("subject", &self.subject_dn())
            .field("serial", &self.serial_hex())
            .finish()
    }
}

fn short_name(oid: &ObjectIdentifier) -> Option<&'static str> {
    [
        (OID_CN, "CN"),
        (OID_C, "C"),
        (OID_L, "L"),
        (OID_ST, "ST"),
        (OID_O, "O"),
        (OID_OU, "OU"),
    ]
    .iter()
    .find(|(known, _)| known == oid)
    .map(|(_, name)| *name)
}

fn find_attribute(name: &Name, wanted: ObjectIdentifier) -> Option<String> {
    name.0
        .iter()
        .flat_map(|rdn| rdn.0.iter())
        .find(|atv| atv.oid == wanted)
        .map(|atv| String::from_utf8_lossy(atv.value.value()).into_owned())
}

/// Readable "CN=..., O=..." form, most specific attribute first
fn format_name(name: &Name) -> String {
    let parts: Vec<String> = name
        .0
        .iter()
        .rev()
        .flat_map(|rdn| rdn.0.iter())
        .filter_map(|atv| {
            short_name(&atv.oid)
                .map(|n| format!("{}={}", n, String::from_utf8_lossy(atv.value.value())))
        })
        .collect();

    if parts.is_empty() {
        "Unknown".to_string()
    } else {
        parts.join(", ")
    }
}

/// Issue a self-signed certificate for `key_pair`
pub fn create_cert(
    key_pair: &KeyPair,
    subject: &SubjectInfo,
    validity: &CertValidity,
) -> Result<Certificate> {
    subject.validate()?;
    if validity.not_before >= validity.not_after {
        return Err(DocSignError::InvalidParameters(
            "certificate validity must end after it begins".to_string(),
        ));
    }
    if prepare_public_key(&key_pair.private_key)? != key_pair.public_key {
        return Err(DocSignError::InvalidParameters(
            "public key does not belong to the private key".to_string(),
        ));
    }

    let name = subject.to_name()?;

    let mut serial = [0u8; SERIAL_LEN];
    OsRng.fill_bytes(&mut serial);
    // Positive and without a leading zero octet
    serial[0] = (serial[0] & 0x7F) | 0x40;

    let spki = SubjectPublicKeyInfoOwned::from_der(key_pair.public_key.to_der())
        .map_err(der_error)?;

    let key_usage = KeyUsage(
        KeyUsages::DigitalSignature | KeyUsages::NonRepudiation | KeyUsages::KeyCertSign,
    );
    let basic_constraints = BasicConstraints {
        ca: true,
        path_len_constraint: None,
    };
    let extensions = vec![
        Extension {
            extn_id: OID_BASIC_CONSTRAINTS,
            critical: true,
            extn_value: OctetString::new(basic_constraints.to_der().map_err(der_error)?)
                .map_err(der_error)?,
        },
        Extension {
            extn_id: OID_KEY_USAGE,
            critical: true,
            extn_value: OctetString::new(key_usage.to_der().map_err(der_error)?)
                .map_err(der_error)?,
        },
    ];

    let signature_algorithm = rsa_algorithm(OID_SHA256_WITH_RSA)?;
    let tbs_certificate = TbsCertificate {
        version: Version::V3,
        serial_number: SerialNumber::new(&serial).map_err(der_error)?,
        signature: signature_algorithm.clone(),
        issuer: name.clone(),
        validity: Validity {
            not_before: to_x509_time(validity.not_before)?,
            not_after: to_x509_time(validity.not_after)?,
        },
        subject: name,
        subject_public_key_info: spki,
        issuer_unique_id: None,
        subject_unique_id: None,
        extensions: Some(extensions),
    };

    let tbs_der = tbs_certificate.to_der().map_err(der_error)?;
    debug!(tbs_len = tbs_der.len(), "signing certificate body");
    let signature = key_pair
        .private_key
        .sign(DigestAlgorithm::Sha256, &tbs_der)?;

    let certificate = Certificate::from_x509(x509_cert::Certificate {
        tbs_certificate,
        signature_algorithm,
        signature: BitString::from_bytes(&signature).map_err(der_error)?,
    })?;

    info!(
        subject = %certificate.subject_dn(),
        serial = %certificate.serial_hex(),
        not_after = %certificate.not_after(),
        "issued self-signed certificate"
    );
    Ok(certificate)
}

/// Persist the certificate as PEM
pub fn save_certificate(certificate: &Certificate, storage: &dyn Storage, id: &str) -> Result<()> {
    let pem = certificate
        .to_pem()
        .map_err(|e| DocSignError::StorageWrite(format!("{}: {}", id, e.detail())))?;
    storage.write(id, pem.as_bytes())?;
    debug!(id, serial = %certificate.serial_hex(), "saved certificate");
    Ok(())
}

pub fn load_certificate(storage: &dyn Storage, id: &str) -> Result<Certificate> {
    let bytes = storage.read(id)?;
    let pem = String::from_utf8(bytes)
        .map_err(|_| DocSignError::StorageRead(format!("{}: certificate is not UTF-8 PEM", id)))?;
    Certificate::from_pem(&pem)
        .map_err(|e| DocSignError::StorageRead(format!("{}: {}", id, e.detail())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::fixtures::key_pair;
    use crate::keys::generate_rsa_key;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use shared_types::{ErrorKind, MemoryStorage};

    fn validity() -> CertValidity {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        CertValidity::days_from(start, 365).unwrap()
    }

    fn full_subject() -> SubjectInfo {
        SubjectInfo::new("Test Signer")
            .with_organization("Gdansk University of Technology")
            .with_organizational_unit("WETI")
            .with_locality("Gdansk")
            .with_state_or_province("Pomorskie")
            .with_country("PL")
    }

    #[test]
    fn test_create_cert_fields() {
        let cert = create_cert(key_pair(), &full_subject(), &validity()).unwrap();

        assert_eq!(cert.subject_common_name(), "Test Signer");
        assert_eq!(
            cert.subject_dn(),
            "CN=Test Signer, OU=WETI, O=Gdansk University of Technology, L=Gdansk, ST=Pomorskie, C=PL"
        );
        assert_eq!(cert.issuer_dn(), cert.subject_dn());
        assert!(cert.is_self_issued());
        assert_eq!(cert.not_before(), validity().not_before);
        assert_eq!(cert.not_after(), validity().not_after);
        assert_eq!(cert.serial_hex().len(), SERIAL_LEN * 2);
    }

    #[test]
    fn test_cert_binds_public_key() {
        let pair = key_pair();
        let cert = create_cert(pair, &SubjectInfo::new("Test Signer"), &validity()).unwrap();
        assert!(cert.matches_key(&pair.public_key));
        assert_eq!(cert.public_key().unwrap(), pair.public_key);
        assert_eq!(
            cert.info().public_key_fingerprint,
            pair.public_key.fingerprint()
        );
    }

    #[test]
    fn test_self_signature_verifies() {
        let cert = create_cert(key_pair(), &full_subject(), &validity()).unwrap();
        cert.verify_self_signature().unwrap();
    }

    #[test]
    fn test_extensions_are_critical() {
        let cert = create_cert(key_pair(), &full_subject(), &validity()).unwrap();
        let extensions = cert.x509().tbs_certificate.extensions.clone().unwrap();
        let ids: Vec<_> = extensions.iter().map(|e| e.extn_id).collect();
        assert_eq!(ids, vec![OID_BASIC_CONSTRAINTS, OID_KEY_USAGE]);
        assert!(extensions.iter().all(|e| e.critical));

        let bc = BasicConstraints::from_der(extensions[0].extn_value.as_bytes()).unwrap();
        assert!(bc.ca);
        let ku = KeyUsage::from_der(extensions[1].extn_value.as_bytes()).unwrap();
        assert!(ku.digital_signature());
        assert!(ku.non_repudiation());
        assert!(ku.key_cert_sign());
    }

    #[test]
    fn test_der_and_pem_round_trip() {
        let cert = create_cert(key_pair(), &full_subject(), &validity()).unwrap();
        assert_eq!(Certificate::from_der(cert.to_der()).unwrap(), cert);

        let pem = cert.to_pem().unwrap();
        assert!(pem.starts_with("-----BEGIN CERTIFICATE-----"));
        assert_eq!(Certificate::from_pem(&pem).unwrap(), cert);
    }

    #[test]
    fn test_storage_round_trip() {
        let storage = MemoryStorage::new();
        let cert = create_cert(key_pair(), &full_subject(), &validity()).unwrap();
        save_certificate(&cert, &storage, "signer_cert.pem").unwrap();
        assert_eq!(load_certificate(&storage, "signer_cert.pem").unwrap(), cert);

        storage.write("garbage", b"not a certificate").unwrap();
        assert_eq!(
            load_certificate(&storage, "garbage").unwrap_err().kind(),
            ErrorKind::StorageReadError
        );
    }

    #[test]
    fn test_fresh_serial_per_certificate() {
        let a = create_cert(key_pair(), &full_subject(), &validity()).unwrap();
        let b = create_cert(key_pair(), &full_subject(), &validity()).unwrap();
        assert_ne!(a.serial_hex(), b.serial_hex());
    }

    #[test]
    fn test_rejects_bad_subjects() {
        let cases = [
            SubjectInfo::new(""),
            SubjectInfo::new("   "),
            SubjectInfo::new("Bad\nName"),
            SubjectInfo::new("x".repeat(65)),
            SubjectInfo::new("Signer").with_country("POL"),
            SubjectInfo::new("Signer").with_country("P1"),
            SubjectInfo::new("Signer").with_organization("Org\u{0007}"),
        ];
        for subject in cases {
            let err = create_cert(key_pair(), &subject, &validity()).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidSubjectInfo, "{:?}", subject);
        }
    }

    #[test]
    fn test_rejects_inverted_validity() {
        let now = Utc::now();
        let err = CertValidity::new(now, now - chrono::Duration::days(1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameters);
        assert!(CertValidity::days_from(now, 0).is_err());
    }

    #[test]
    fn test_rejects_mismatched_key_pair() {
        let other = generate_rsa_key(2048).unwrap();
        let mixed = KeyPair {
            public_key: other.public_key,
            private_key: key_pair().private_key.clone(),
        };
        let err = create_cert(&mixed, &SubjectInfo::new("Signer"), &validity()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameters);
    }

    #[test]
    fn test_validity_window() {
        let cert = create_cert(key_pair(), &full_subject(), &validity()).unwrap();
        let inside = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let before = Utc.with_ymd_and_hms(2023, 12, 31, 0, 0, 0).unwrap();
        let after = Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap();
        assert!(cert.is_valid_at(inside));
        assert!(!cert.is_valid_at(before));
        assert!(!cert.is_valid_at(after));
        assert!(validity().contains(inside));
    }

    #[test]
    fn test_far_future_uses_generalized_time() {
        let start = Utc.with_ymd_and_hms(2049, 6, 1, 0, 0, 0).unwrap();
        let window = CertValidity::days_from(start, 3650).unwrap();
        let cert = create_cert(key_pair(), &SubjectInfo::new("Signer"), &window).unwrap();
        assert!(matches!(
            cert.x509().tbs_certificate.validity.not_after,
            Time::GeneralTime(_)
        ));
        assert_eq!(cert.not_after(), window.not_after);
    }
}
