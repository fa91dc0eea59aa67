//! Detached CMS SignedData for PDF signatures
//!
//! The signed content is never embedded. The signer computes the digest of
//! the PDF byte ranges, places it in the `message-digest` signed attribute and
//! signs the DER encoding of the attribute set. Attributes produced:
//! - content-type (id-data)
//! - message-digest
//! - signing-time (optional)
//! - signing-certificate-v2 (optional, ESS)

use std::fmt;

use chrono::{DateTime, Utc};
use cms::cert::{CertificateChoices, IssuerAndSerialNumber};
use cms::content_info::{CmsVersion, ContentInfo};
use cms::signed_data::{
    CertificateSet, EncapsulatedContentInfo, SignedAttributes, SignedData, SignerIdentifier,
    SignerInfo, SignerInfos,
};
use shared_types::{DigestAlgorithm, DocSignError, Result, VerificationFailure};
use tracing::debug;
use x509_cert::attr::Attribute;
use x509_cert::der::asn1::{OctetString, SetOfVec};
use x509_cert::der::oid::ObjectIdentifier;
use x509_cert::der::{Any, Decode, DecodeOwned, Encode};
use x509_cert::spki::AlgorithmIdentifierOwned;
use x509_cert::time::Time;

use crate::asn1;
use crate::cert::{
    der_error, digest_for_signature_oid, from_x509_time, rsa_algorithm, signature_oid_for_digest,
    to_x509_time, Certificate, OID_RSA_ENCRYPTION,
};
use crate::keys::{digest, PrivateKey, PublicKey};

const OID_DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.1");
const OID_SIGNED_DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.2");
const OID_CONTENT_TYPE: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.3");
const OID_MESSAGE_DIGEST: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.4");
const OID_SIGNING_TIME: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.5");
/// id-aa-signingCertificateV2
const OID_SIGNING_CERTIFICATE_V2: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.16.2.47");

/// Fixed overhead of SignedData around certificates and the signature value
const STRUCTURE_OVERHEAD: usize = 1024;

/// Which optional signed attributes to include
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignedAttributeOptions {
    pub signing_time: Option<DateTime<Utc>>,
    /// Bind the signer certificate hash (ESS signing-certificate-v2)
    pub signing_certificate: bool,
}

/// Build a detached SignedData over an already computed content digest
///
/// `signer` names the signing certificate; only `embedded` certificates are
/// carried in the blob, duplicates dropped.
pub fn build_detached_signature(
    content_digest: &[u8],
    algorithm: DigestAlgorithm,
    private_key: &PrivateKey,
    signer: &Certificate,
    embedded: &[Certificate],
    options: &SignedAttributeOptions,
) -> Result<Vec<u8>> {
    if content_digest.len() != algorithm.output_len() {
        return Err(DocSignError::InvalidParameters(format!(
            "{} digest must be {} bytes, got {}",
            algorithm,
            algorithm.output_len(),
            content_digest.len()
        )));
    }

    let signed_attrs = build_signed_attributes(content_digest, signer, options)?;
    let signed_attrs_der = signed_attrs.to_der().map_err(der_error)?;
    let signature = private_key.sign(algorithm, &signed_attrs_der)?;

    let tbs = &signer.x509().tbs_certificate;
    let signer_info = SignerInfo {
        version: CmsVersion::V1,
        sid: SignerIdentifier::IssuerAndSerialNumber(IssuerAndSerialNumber {
            issuer: tbs.issuer.clone(),
            serial_number: tbs.serial_number.clone(),
        }),
        digest_alg: digest_algorithm_identifier(algorithm)?,
        signed_attrs: Some(signed_attrs),
        signature_algorithm: rsa_algorithm(signature_oid_for_digest(algorithm))?,
        signature: OctetString::new(signature).map_err(der_error)?,
        unsigned_attrs: None,
    };

    let mut certificates: Vec<&Certificate> = Vec::new();
    for cert in embedded {
        if !certificates.contains(&cert) {
            certificates.push(cert);
        }
    }
    let certificate_set = if certificates.is_empty() {
        None
    } else {
        Some(CertificateSet(set_of(
            certificates
                .iter()
                .map(|c| CertificateChoices::Certificate(c.x509().clone()))
                .collect(),
        )?))
    };

    let signed_data = SignedData {
        version: CmsVersion::V1,
        digest_algorithms: set_of(vec![digest_algorithm_identifier(algorithm)?])?,
        encap_content_info: EncapsulatedContentInfo {
            econtent_type: OID_DATA,
            econtent: None,
        },
        certificates: certificate_set,
        crls: None,
        signer_infos: SignerInfos(set_of(vec![signer_info])?),
    };

    let content_info = ContentInfo {
        content_type: OID_SIGNED_DATA,
        content: Any::encode_from(&signed_data).map_err(der_error)?,
    };
    let der = content_info.to_der().map_err(der_error)?;

    debug!(
        len = der.len(),
        certificates = certificates.len(),
        digest = %algorithm,
        "built detached CMS signature"
    );
    Ok(der)
}

/// Upper estimate of the DER size `build_detached_signature` will produce
pub fn estimate_signature_len(private_key: &PrivateKey, certificates: &[&Certificate]) -> usize {
    let certs: usize = certificates.iter().map(|c| c.to_der().len()).sum();
    // Issuer name appears again in the signer identifier
    let sid = certificates.first().map(|c| c.to_der().len() / 4).unwrap_or(0);
    STRUCTURE_OVERHEAD + certs + sid + private_key.signature_len()
}

fn build_signed_attributes(
    content_digest: &[u8],
    signer: &Certificate,
    options: &SignedAttributeOptions,
) -> Result<SignedAttributes> {
    let mut attrs = vec![
        attribute(OID_CONTENT_TYPE, Any::encode_from(&OID_DATA).map_err(der_error)?)?,
        attribute(
            OID_MESSAGE_DIGEST,
            Any::encode_from(&OctetString::new(content_digest).map_err(der_error)?)
                .map_err(der_error)?,
        )?,
    ];

    if let Some(at) = options.signing_time {
        let time = to_x509_time(at)?;
        attrs.push(attribute(
            OID_SIGNING_TIME,
            Any::encode_from(&time).map_err(der_error)?,
        )?);
    }

    if options.signing_certificate {
        // SigningCertificateV2 { certs SEQUENCE OF ESSCertIDv2 { certHash } },
        // hashAlgorithm left at its SHA-256 default
        let cert_hash = digest(DigestAlgorithm::Sha256, &[signer.to_der()]);
        let ess_cert_id = asn1::build_sequence(&[&asn1::build_octet_string(&cert_hash)]);
        let certs = asn1::build_sequence(&[&ess_cert_id]);
        let value = asn1::build_sequence(&[&certs]);
        attrs.push(attribute(
            OID_SIGNING_CERTIFICATE_V2,
            Any::from_der(&value).map_err(der_error)?,
        )?);
    }

    set_of(attrs)
}

fn attribute(oid: ObjectIdentifier, value: Any) -> Result<Attribute> {
    Ok(Attribute {
        oid,
        values: SetOfVec::try_from(vec![value]).map_err(der_error)?,
    })
}

fn digest_algorithm_identifier(algorithm: DigestAlgorithm) -> Result<AlgorithmIdentifierOwned> {
    Ok(AlgorithmIdentifierOwned {
        oid: ObjectIdentifier::new(algorithm.oid())
            .map_err(|e| DocSignError::InvalidParameters(format!("digest OID: {}", e)))?,
        parameters: None,
    })
}

/// SET OF in DER order
fn set_of<T: Encode + x509_cert::der::DerOrd>(mut items: Vec<T>) -> Result<SetOfVec<T>> {
    let mut keyed = Vec::with_capacity(items.len());
    for item in items.drain(..) {
        keyed.push((item.to_der().map_err(der_error)?, item));
    }
    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    keyed.dedup_by(|a, b| a.0 == b.0);
    SetOfVec::try_from(keyed.into_iter().map(|(_, item)| item).collect::<Vec<_>>())
        .map_err(der_error)
}

/// Why a CMS blob failed to parse or check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureCheckError {
    pub failure: VerificationFailure,
    pub detail: String,
}

impl SignatureCheckError {
    fn new(failure: VerificationFailure, detail: impl Into<String>) -> Self {
        Self {
            failure,
            detail: detail.into(),
        }
    }

    fn malformed(detail: impl fmt::Display) -> Self {
        Self::new(VerificationFailure::MalformedSignature, detail.to_string())
    }
}

impl fmt::Display for SignatureCheckError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.failure, self.detail)
    }
}

impl std::error::Error for SignatureCheckError {}

/// Certificate hash bound into the signed attributes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EssCertId {
    pub algorithm: DigestAlgorithm,
    pub cert_hash: Vec<u8>,
}

impl EssCertId {
    pub fn matches(&self, cert: &Certificate) -> bool {
        digest(self.algorithm, &[cert.to_der()]) == self.cert_hash
    }
}

/// The parts of a detached SignedData a verifier needs
#[derive(Debug, Clone)]
pub struct ParsedSignature {
    pub digest_algorithm: DigestAlgorithm,
    pub message_digest: Vec<u8>,
    pub signature: Vec<u8>,
    pub certificates: Vec<Certificate>,
    pub signing_time: Option<DateTime<Utc>>,
    /// First ESSCertIDv2 of a signing-certificate-v2 attribute
    pub signing_certificate: Option<EssCertId>,
    signed_attrs_der: Vec<u8>,
    sid: IssuerAndSerialNumber,
}

impl ParsedSignature {
    /// Embedded certificate named by the signer identifier
    pub fn signer_certificate(&self) -> Option<&Certificate> {
        self.certificates.iter().find(|c| self.identifies(c))
    }

    /// Whether `cert` is the one the signer identifier names
    pub fn identifies(&self, cert: &Certificate) -> bool {
        let tbs = &cert.x509().tbs_certificate;
        tbs.issuer == self.sid.issuer && tbs.serial_number == self.sid.serial_number
    }

    /// Whether `cert` agrees with the signed ESS certificate hash; true when
    /// no such attribute was signed
    pub fn binds_certificate(&self, cert: &Certificate) -> bool {
        match &self.signing_certificate {
            Some(ess) => ess.matches(cert),
            None => true,
        }
    }

    /// Check the signature value over the signed attributes with `key`
    pub fn verify_signature(&self, key: &PublicKey) -> bool {
        key.verify(self.digest_algorithm, &self.signed_attrs_der, &self.signature)
    }
}

/// Parse a DER SignedData, ignoring any zero padding after it
pub fn parse_detached_signature(
    blob: &[u8],
) -> std::result::Result<ParsedSignature, SignatureCheckError> {
    let len = asn1::encoded_len(blob)
        .ok_or_else(|| SignatureCheckError::malformed("truncated or empty CMS blob"))?;
    let content_info =
        ContentInfo::from_der(&blob[..len]).map_err(SignatureCheckError::malformed)?;
    if content_info.content_type != OID_SIGNED_DATA {
        return Err(SignatureCheckError::malformed(format!(
            "content type {} is not signedData",
            content_info.content_type
        )));
    }

    let signed_data = content_info
        .content
        .to_der()
        .and_then(|der| SignedData::from_der(&der))
        .map_err(SignatureCheckError::malformed)?;

    let mut signer_infos = signed_data.signer_infos.0.iter();
    let signer_info = match (signer_infos.next(), signer_infos.next()) {
        (Some(info), None) => info,
        (None, _) => return Err(SignatureCheckError::malformed("no signer info")),
        (Some(_), Some(_)) => {
            return Err(SignatureCheckError::malformed(
                "more than one signer info",
            ))
        }
    };

    let sid = match &signer_info.sid {
        SignerIdentifier::IssuerAndSerialNumber(sid) => sid.clone(),
        SignerIdentifier::SubjectKeyIdentifier(_) => {
            return Err(SignatureCheckError::malformed(
                "subject key identifier signers are not supported",
            ))
        }
    };

    let digest_oid = signer_info.digest_alg.oid.to_string();
    let digest_algorithm = DigestAlgorithm::from_oid(&digest_oid).ok_or_else(|| {
        SignatureCheckError::new(
            VerificationFailure::UnsupportedAlgorithm,
            format!("digest algorithm {}", digest_oid),
        )
    })?;

    let sig_oid = signer_info.signature_algorithm.oid;
    let sig_ok = sig_oid == OID_RSA_ENCRYPTION
        || digest_for_signature_oid(&sig_oid) == Some(digest_algorithm);
    if !sig_ok {
        return Err(SignatureCheckError::new(
            VerificationFailure::UnsupportedAlgorithm,
            format!("signature algorithm {}", sig_oid),
        ));
    }

    let signed_attrs = signer_info
        .signed_attrs
        .as_ref()
        .ok_or_else(|| SignatureCheckError::malformed("signed attributes are missing"))?;
    let signed_attrs_der = signed_attrs
        .to_der()
        .map_err(SignatureCheckError::malformed)?;

    let mut message_digest = None;
    let mut signing_time = None;
    let mut signing_certificate = None;
    for attr in signed_attrs.iter() {
        let Some(value) = attr.values.iter().next() else {
            continue;
        };
        if attr.oid == OID_MESSAGE_DIGEST {
            let octets = decode_any::<OctetString>(value)?;
            message_digest = Some(octets.as_bytes().to_vec());
        } else if attr.oid == OID_SIGNING_TIME {
            let time = decode_any::<Time>(value)?;
            signing_time = Some(from_x509_time(&time));
        } else if attr.oid == OID_SIGNING_CERTIFICATE_V2 {
            let der = value.to_der().map_err(SignatureCheckError::malformed)?;
            signing_certificate = Some(parse_ess_cert_id(&der)?);
        }
    }
    let message_digest = message_digest
        .ok_or_else(|| SignatureCheckError::malformed("message-digest attribute is missing"))?;

    let mut certificates = Vec::new();
    if let Some(set) = &signed_data.certificates {
        for choice in set.0.iter() {
            if let CertificateChoices::Certificate(cert) = choice {
                let cert = Certificate::from_x509(cert.clone())
                    .map_err(|e| SignatureCheckError::malformed(e.detail()))?;
                certificates.push(cert);
            }
        }
    }

    Ok(ParsedSignature {
        digest_algorithm,
        message_digest,
        signature: signer_info.signature.as_bytes().to_vec(),
        certificates,
        signing_time,
        signing_certificate,
        signed_attrs_der,
        sid,
    })
}

/// SigningCertificateV2 ::= SEQUENCE { certs SEQUENCE OF ESSCertIDv2, .. }
/// ESSCertIDv2 ::= SEQUENCE { hashAlgorithm DEFAULT sha256, certHash OCTET STRING, .. }
fn parse_ess_cert_id(der: &[u8]) -> std::result::Result<EssCertId, SignatureCheckError> {
    let signing_certificate = sequence(der)?;
    let certs = sequence(signing_certificate)?;
    let cert_id = sequence(certs)?;

    let (tag, _, rest) = asn1::parse_tlv(cert_id).ok_or_else(ess_malformed)?;
    let (algorithm, hash_field) = if tag == asn1::TAG_SEQUENCE {
        let alg_der = &cert_id[..cert_id.len() - rest.len()];
        let alg =
            AlgorithmIdentifierOwned::from_der(alg_der).map_err(SignatureCheckError::malformed)?;
        let oid = alg.oid.to_string();
        let algorithm = DigestAlgorithm::from_oid(&oid).ok_or_else(|| {
            SignatureCheckError::new(
                VerificationFailure::UnsupportedAlgorithm,
                format!("ESS certificate hash algorithm {}", oid),
            )
        })?;
        (algorithm, rest)
    } else {
        (DigestAlgorithm::Sha256, cert_id)
    };

    match asn1::parse_tlv(hash_field) {
        Some((asn1::TAG_OCTET_STRING, cert_hash, _)) if cert_hash.len() == algorithm.output_len() => {
            Ok(EssCertId {
                algorithm,
                cert_hash: cert_hash.to_vec(),
            })
        }
        _ => Err(ess_malformed()),
    }
}

fn sequence(data: &[u8]) -> std::result::Result<&[u8], SignatureCheckError> {
    match asn1::parse_tlv(data) {
        Some((asn1::TAG_SEQUENCE, content, _)) => Ok(content),
        _ => Err(ess_malformed()),
    }
}

fn ess_malformed() -> SignatureCheckError {
    SignatureCheckError::malformed("signing-certificate-v2 attribute")
}

fn decode_any<T: DecodeOwned>(value: &Any) -> std::result::Result<T, SignatureCheckError> {
    let der = value.to_der().map_err(SignatureCheckError::malformed)?;
    T::from_der(&der).map_err(SignatureCheckError::malformed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::{create_cert, CertValidity, SubjectInfo};
    use crate::keys::fixtures::key_pair;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn signer_cert() -> Certificate {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        create_cert(
            key_pair(),
            &SubjectInfo::new("Test Signer"),
            &CertValidity::days_from(start, 365).unwrap(),
        )
        .unwrap()
    }

    fn sign(
        content: &[u8],
        algorithm: DigestAlgorithm,
        options: &SignedAttributeOptions,
    ) -> (Vec<u8>, Certificate) {
        let cert = signer_cert();
        let md = digest(algorithm, &[content]);
        let der = build_detached_signature(
            &md,
            algorithm,
            &key_pair().private_key,
            &cert,
            std::slice::from_ref(&cert),
            options,
        )
        .unwrap();
        (der, cert)
    }

    #[test]
    fn test_minimal_signature_parses_and_verifies() {
        let (der, cert) = sign(b"%PDF-1.7 body", DigestAlgorithm::Sha256, &Default::default());
        let parsed = parse_detached_signature(&der).unwrap();

        assert_eq!(parsed.digest_algorithm, DigestAlgorithm::Sha256);
        assert_eq!(
            parsed.message_digest,
            digest(DigestAlgorithm::Sha256, &[b"%PDF-1.7 body".as_slice()])
        );
        assert_eq!(parsed.signing_time, None);
        assert_eq!(parsed.signing_certificate, None);
        assert!(parsed.binds_certificate(&cert));
        assert_eq!(parsed.signer_certificate(), Some(&cert));
        assert!(parsed.verify_signature(&key_pair().public_key));
    }

    #[test]
    fn test_full_attributes() {
        let at = Utc.with_ymd_and_hms(2024, 5, 17, 9, 30, 0).unwrap();
        let options = SignedAttributeOptions {
            signing_time: Some(at),
            signing_certificate: true,
        };
        for algorithm in [
            DigestAlgorithm::Sha256,
            DigestAlgorithm::Sha384,
            DigestAlgorithm::Sha512,
        ] {
            let (der, cert) = sign(b"content", algorithm, &options);
            let parsed = parse_detached_signature(&der).unwrap();
            assert_eq!(parsed.digest_algorithm, algorithm);
            assert_eq!(parsed.message_digest.len(), algorithm.output_len());
            assert_eq!(parsed.signing_time, Some(at));
            let ess = parsed.signing_certificate.as_ref().unwrap();
            assert_eq!(ess.algorithm, DigestAlgorithm::Sha256);
            assert!(parsed.binds_certificate(&cert));
            assert!(parsed.verify_signature(&key_pair().public_key));
        }
    }

    #[test]
    fn test_look_alike_certificate_is_not_bound() {
        let options = SignedAttributeOptions {
            signing_time: None,
            signing_certificate: true,
        };
        let (der, cert) = sign(b"content", DigestAlgorithm::Sha256, &options);
        let parsed = parse_detached_signature(&der).unwrap();

        // Same issuer, serial and key, different validity
        let mut x509 = cert.x509().clone();
        x509.tbs_certificate.validity.not_after = x509.tbs_certificate.validity.not_before;
        let look_alike = Certificate::from_x509(x509).unwrap();

        assert!(parsed.identifies(&look_alike));
        assert!(parsed.binds_certificate(&cert));
        assert!(!parsed.binds_certificate(&look_alike));
    }

    #[test]
    fn test_ess_cert_id_with_explicit_algorithm() {
        let cert = signer_cert();
        let hash = digest(DigestAlgorithm::Sha384, &[cert.to_der()]);
        let alg = AlgorithmIdentifierOwned {
            oid: ObjectIdentifier::new_unwrap(DigestAlgorithm::Sha384.oid()),
            parameters: None,
        }
        .to_der()
        .unwrap();
        let cert_id = asn1::build_sequence(&[&alg, &asn1::build_octet_string(&hash)]);
        let value = asn1::build_sequence(&[&asn1::build_sequence(&[&cert_id])]);

        let ess = parse_ess_cert_id(&value).unwrap();
        assert_eq!(ess.algorithm, DigestAlgorithm::Sha384);
        assert!(ess.matches(&cert));

        let short = asn1::build_sequence(&[&asn1::build_sequence(&[&asn1::build_sequence(&[
            &asn1::build_octet_string(&[0u8; 4]),
        ])])]);
        assert_eq!(
            parse_ess_cert_id(&short).unwrap_err().failure,
            VerificationFailure::MalformedSignature
        );
    }

    #[test]
    fn test_zero_padding_is_ignored() {
        let (mut der, _) = sign(b"content", DigestAlgorithm::Sha256, &Default::default());
        der.extend(vec![0u8; 4096]);
        assert!(parse_detached_signature(&der).is_ok());
    }

    #[test]
    fn test_chain_is_embedded_once() {
        let cert = signer_cert();
        let other = signer_cert();
        let md = digest(DigestAlgorithm::Sha256, &[b"x".as_slice()]);
        let der = build_detached_signature(
            &md,
            DigestAlgorithm::Sha256,
            &key_pair().private_key,
            &cert,
            &[cert.clone(), other.clone(), cert.clone()],
            &Default::default(),
        )
        .unwrap();
        let parsed = parse_detached_signature(&der).unwrap();
        assert_eq!(parsed.certificates.len(), 2);
        assert!(parsed.certificates.contains(&other));
        assert_eq!(parsed.signer_certificate(), Some(&cert));
    }

    #[test]
    fn test_certificate_can_be_left_out() {
        let cert = signer_cert();
        let md = digest(DigestAlgorithm::Sha256, &[b"x".as_slice()]);
        let der = build_detached_signature(
            &md,
            DigestAlgorithm::Sha256,
            &key_pair().private_key,
            &cert,
            &[],
            &Default::default(),
        )
        .unwrap();
        let parsed = parse_detached_signature(&der).unwrap();
        assert!(parsed.certificates.is_empty());
        assert!(parsed.signer_certificate().is_none());
        assert!(parsed.identifies(&cert));
        assert!(parsed.verify_signature(&cert.public_key().unwrap()));
    }

    #[test]
    fn test_wrong_digest_length_rejected() {
        let err = build_detached_signature(
            &[0u8; 20],
            DigestAlgorithm::Sha256,
            &key_pair().private_key,
            &signer_cert(),
            &[],
            &Default::default(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), shared_types::ErrorKind::InvalidParameters);
    }

    #[test]
    fn test_tampered_signature_fails() {
        let (der, _) = sign(b"content", DigestAlgorithm::Sha256, &Default::default());
        let mut parsed = parse_detached_signature(&der).unwrap();
        parsed.signature[10] ^= 0x01;
        assert!(!parsed.verify_signature(&key_pair().public_key));
    }

    #[test]
    fn test_garbage_is_malformed() {
        for blob in [&b""[..], &[0u8; 64][..], &b"\x30\x82\x10\x00abc"[..]] {
            let err = parse_detached_signature(blob).unwrap_err();
            assert_eq!(err.failure, VerificationFailure::MalformedSignature);
        }
    }

    #[test]
    fn test_estimate_covers_actual_size() {
        let (der, cert) = sign(
            b"content",
            DigestAlgorithm::Sha512,
            &SignedAttributeOptions {
                signing_time: Some(Utc::now()),
                signing_certificate: true,
            },
        );
        assert!(estimate_signature_len(&key_pair().private_key, &[&cert]) >= der.len());
    }
}
