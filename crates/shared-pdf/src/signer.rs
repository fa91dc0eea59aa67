//! Embedded PDF signatures
//!
//! Each call moves through `Loaded → PlaceholderReserved → DigestComputed →
//! Signed → Written`. The `/Contents` placeholder and the final byte range
//! are laid out before anything is hashed, so the digest covers the exact
//! bytes that end up in the file.

use chrono::{DateTime, Utc};
use lopdf::{Dictionary, Object, ObjectId, Stream};
use shared_crypto::cms::{build_detached_signature, estimate_signature_len, SignedAttributeOptions};
use shared_crypto::keys::digest;
use shared_crypto::{prepare_public_key, Certificate, PrivateKey};
use shared_types::{DigestAlgorithm, DocSignError, Result, SecurityLevel};
use tracing::{debug, info, warn};

use crate::byterange::{self, ByteRange, PLACEHOLDER};
use crate::parser::PdfDocument;
use crate::types::{
    SignOptions, SignatureAppearance, SignedPdf, SigningStage, FILTER, MIN_SIGNATURE_RESERVE,
    SUB_FILTER,
};
use crate::writer::{self, IncrementalUpdate, TrailerInfo};

/// Widget flags: Print
const FLAG_PRINT: i64 = 4;
/// Widget flags: Print | Locked, for the invisible widget
const FLAG_PRINT_LOCKED: i64 = 132;
/// AcroForm SigFlags: SignaturesExist | AppendOnly
const SIG_FLAGS: i64 = 3;

/// Sign with the basic profile: SHA-256, signer certificate embedded,
/// signing time in `/M` only, invisible widget on page 1
pub fn sign_pdf(
    pdf_bytes: &[u8],
    private_key: &PrivateKey,
    certificate: &Certificate,
) -> Result<SignedPdf> {
    let options = SignOptions {
        level: SecurityLevel::Standard,
        include_timestamp: false,
        ..SignOptions::default()
    };
    sign_with(
        pdf_bytes,
        private_key,
        certificate,
        &options,
        Profile::Basic,
        &mut |_| {},
    )
}

/// Sign with every option applied; refuses documents that already carry a
/// signature
pub fn sign_pdf_full(
    pdf_bytes: &[u8],
    private_key: &PrivateKey,
    certificate: &Certificate,
    options: &SignOptions,
) -> Result<SignedPdf> {
    sign_with(
        pdf_bytes,
        private_key,
        certificate,
        options,
        Profile::Full,
        &mut |_| {},
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Profile {
    Basic,
    Full,
}

/// Where the placeholders landed in the prepared file
struct Prepared {
    bytes: Vec<u8>,
    byte_range_at: usize,
    contents_at: usize,
    token_len: usize,
    field_name: String,
}

fn sign_with(
    pdf_bytes: &[u8],
    private_key: &PrivateKey,
    certificate: &Certificate,
    options: &SignOptions,
    profile: Profile,
    on_stage: &mut dyn FnMut(SigningStage),
) -> Result<SignedPdf> {
    let doc = load(pdf_bytes)?;
    if !certificate.matches_key(&prepare_public_key(private_key)?) {
        return Err(DocSignError::SigningFailure(
            "certificate does not certify the signing key".to_string(),
        ));
    }
    if profile == Profile::Full && !doc.signatures().is_empty() {
        return Err(DocSignError::InvalidParameters(
            "document is already signed".to_string(),
        ));
    }
    if options.signature_reserve < MIN_SIGNATURE_RESERVE {
        return Err(DocSignError::InvalidParameters(format!(
            "signature reserve must be at least {} bytes",
            MIN_SIGNATURE_RESERVE
        )));
    }
    on_stage(SigningStage::Loaded);
    info!(
        stage = %SigningStage::Loaded,
        pages = doc.page_count(),
        len = pdf_bytes.len(),
        "loaded document for signing"
    );

    let algorithm = match profile {
        Profile::Basic => DigestAlgorithm::Sha256,
        Profile::Full => options.level.digest(),
    };
    let signing_time = truncate_to_seconds(options.signing_time.unwrap_or_else(Utc::now));

    let mut embedded: Vec<Certificate> = Vec::new();
    if options.embed_certificate {
        embedded.push(certificate.clone());
    }
    if profile == Profile::Full {
        embedded.extend(options.extra_certificates.iter().cloned());
    }

    let estimate = {
        let refs: Vec<&Certificate> = embedded.iter().collect();
        estimate_signature_len(private_key, &refs)
    };
    let reserve = if estimate > options.signature_reserve {
        debug!(
            requested = options.signature_reserve,
            estimate, "growing signature reservation"
        );
        estimate
    } else {
        options.signature_reserve
    };

    let mut prepared = prepare(&doc, certificate, options, profile, signing_time, reserve)?;
    let range = ByteRange::around_contents(
        prepared.bytes.len(),
        prepared.contents_at,
        prepared.token_len,
    );
    byterange::write_byte_range(&mut prepared.bytes, prepared.byte_range_at, &range)?;
    on_stage(SigningStage::PlaceholderReserved);
    info!(
        stage = %SigningStage::PlaceholderReserved,
        reserve,
        byte_range = %range,
        "reserved signature placeholder"
    );

    let [head, tail] = range.covered(&prepared.bytes)?;
    let content_digest = digest(algorithm, &[head, tail]);
    on_stage(SigningStage::DigestComputed);
    info!(
        stage = %SigningStage::DigestComputed,
        digest = %algorithm,
        "computed document digest"
    );

    let attributes = SignedAttributeOptions {
        signing_time: (profile == Profile::Full && options.include_timestamp)
            .then_some(signing_time),
        signing_certificate: profile == Profile::Full,
    };
    let der = build_detached_signature(
        &content_digest,
        algorithm,
        private_key,
        certificate,
        &embedded,
        &attributes,
    )
    .map_err(|e| match e {
        DocSignError::SigningFailure(_) => e,
        other => DocSignError::SigningFailure(other.detail().to_string()),
    })?;
    on_stage(SigningStage::Signed);
    info!(
        stage = %SigningStage::Signed,
        signature_len = der.len(),
        "built CMS signature"
    );

    byterange::write_contents(
        &mut prepared.bytes,
        prepared.contents_at,
        prepared.token_len,
        &der,
    )?;
    on_stage(SigningStage::Written);
    info!(
        stage = %SigningStage::Written,
        len = prepared.bytes.len(),
        field = %prepared.field_name,
        "wrote signed document"
    );

    Ok(SignedPdf {
        bytes: prepared.bytes,
        byte_range: range.values(),
        signing_time,
        signature_len: der.len(),
        field_name: prepared.field_name,
    })
}

fn load(pdf_bytes: &[u8]) -> Result<PdfDocument> {
    let doc = PdfDocument::from_bytes(pdf_bytes).inspect_err(|e| {
        warn!(error = %e, "rejected document for signing");
    })?;
    if doc.is_encrypted() {
        return Err(DocSignError::MalformedPdf(
            "encrypted documents cannot be signed".to_string(),
        ));
    }
    if doc.page_count() == 0 {
        return Err(DocSignError::MalformedPdf("document has no pages".to_string()));
    }
    doc.catalog()?;
    doc.startxref()?;
    Ok(doc)
}

fn truncate_to_seconds(at: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(at.timestamp(), 0).unwrap_or(at)
}

/// Lay out the incremental update with placeholders in place
fn prepare(
    doc: &PdfDocument,
    certificate: &Certificate,
    options: &SignOptions,
    profile: Profile,
    signing_time: DateTime<Utc>,
    reserve: usize,
) -> Result<Prepared> {
    let field_name = choose_field_name(doc, options.field_name.as_deref())?;

    let appearance = match profile {
        Profile::Full => options.appearance.clone(),
        Profile::Basic => None,
    };
    let page_num = appearance.as_ref().map(|a| a.page).unwrap_or(1);
    let page_id = doc.page_id(page_num).ok_or_else(|| {
        DocSignError::MalformedPdf(format!(
            "page {} out of range (document has {})",
            page_num,
            doc.page_count()
        ))
    })?;
    if let Some(appearance) = &appearance {
        check_appearance(doc, appearance)?;
    }

    let mut next_number = doc.next_object_number();
    let mut allocate = || {
        let id = (next_number, 0u16);
        next_number += 1;
        id
    };
    let sig_id = allocate();
    let field_id = allocate();
    let appearance_id = appearance.as_ref().map(|_| allocate());

    let mut update = IncrementalUpdate::new(doc.bytes());

    // Signature dictionary, written by hand so placeholder offsets are known
    let token_len = reserve * 2 + 2;
    let mut body = Vec::with_capacity(token_len + 512);
    body.extend_from_slice(b"<< /Type /Sig /Filter ");
    writer::write_name(&mut body, FILTER.as_bytes());
    body.extend_from_slice(b" /SubFilter ");
    writer::write_name(&mut body, SUB_FILTER.as_bytes());
    body.extend_from_slice(b" /ByteRange ");
    let byte_range_rel = body.len();
    body.extend_from_slice(PLACEHOLDER.as_bytes());
    body.extend_from_slice(b" /Contents ");
    let contents_rel = body.len();
    body.push(b'<');
    body.resize(body.len() + reserve * 2, b'0');
    body.push(b'>');
    body.extend_from_slice(b" /M ");
    writer::write_object(&mut body, &writer::text_string(&pdf_date(signing_time)));
    if profile == Profile::Full {
        let name = options
            .name
            .clone()
            .unwrap_or_else(|| certificate.subject_common_name());
        let entries = [
            ("Name", Some(name)),
            ("Reason", options.reason.clone()),
            ("Location", options.location.clone()),
            ("ContactInfo", options.contact_info.clone()),
        ];
        for (key, value) in entries {
            if let Some(value) = value.filter(|v| !v.is_empty()) {
                body.push(b' ');
                writer::write_name(&mut body, key.as_bytes());
                body.push(b' ');
                writer::write_object(&mut body, &writer::text_string(&value));
            }
        }
    }
    body.extend_from_slice(b" >>");
    let body_at = update.add_raw(sig_id, &body);

    // Field merged with its widget annotation
    let mut field = Dictionary::new();
    field.set("Type", Object::Name(b"Annot".to_vec()));
    field.set("Subtype", Object::Name(b"Widget".to_vec()));
    field.set("FT", Object::Name(b"Sig".to_vec()));
    field.set("T", writer::text_string(&field_name));
    field.set("V", Object::Reference(sig_id));
    field.set("P", Object::Reference(page_id));
    match (&appearance, appearance_id) {
        (Some(appearance), Some(ap_id)) => {
            let [x, y, w, h] = appearance.rect;
            field.set("Rect", rect_array(x, y, x + w, y + h));
            field.set("F", Object::Integer(FLAG_PRINT));
            let mut ap = Dictionary::new();
            ap.set("N", Object::Reference(ap_id));
            field.set("AP", Object::Dictionary(ap));
        }
        _ => {
            field.set("Rect", rect_array(0.0, 0.0, 0.0, 0.0));
            field.set("F", Object::Integer(FLAG_PRINT_LOCKED));
        }
    }
    update.add_object(field_id, &Object::Dictionary(field));

    if let (Some(appearance), Some(ap_id)) = (&appearance, appearance_id) {
        let stream = appearance_stream(appearance, &certificate.subject_common_name(), signing_time);
        update.add_object(ap_id, &stream);
    }

    add_to_acroform(doc, &mut update, field_id, &mut allocate)?;
    add_to_page_annots(doc, &mut update, page_id, field_id)?;

    let size = allocate().0;
    let original_digest = digest(DigestAlgorithm::Sha256, &[doc.bytes()]);
    let first_id = doc
        .file_id()
        .unwrap_or_else(|| original_digest[..16].to_vec());
    let revision_id = digest(
        DigestAlgorithm::Sha256,
        &[
            &original_digest,
            pdf_date(signing_time).as_bytes(),
            field_name.as_bytes(),
        ],
    )[..16]
        .to_vec();

    let bytes = update.finish(&TrailerInfo {
        size,
        root: doc.catalog_id()?,
        info: doc.info_id(),
        id: [first_id, revision_id],
        prev: doc.startxref()?,
    })?;

    Ok(Prepared {
        bytes,
        byte_range_at: body_at + byte_range_rel,
        contents_at: body_at + contents_rel,
        token_len,
        field_name,
    })
}

/// Explicit name if free, otherwise the first unused `SignatureN`
fn choose_field_name(doc: &PdfDocument, requested: Option<&str>) -> Result<String> {
    let existing = doc.field_names();
    if let Some(name) = requested {
        if name.is_empty() || name.contains('.') {
            return Err(DocSignError::InvalidParameters(format!(
                "invalid signature field name '{}'",
                name
            )));
        }
        if existing.iter().any(|n| n == name) {
            return Err(DocSignError::InvalidParameters(format!(
                "field '{}' already exists",
                name
            )));
        }
        return Ok(name.to_string());
    }
    let name = (1..)
        .map(|n| format!("Signature{}", n))
        .find(|candidate| !existing.contains(candidate))
        .unwrap_or_else(|| "Signature".to_string());
    Ok(name)
}

fn check_appearance(doc: &PdfDocument, appearance: &SignatureAppearance) -> Result<()> {
    let [x, y, w, h] = appearance.rect;
    if !(w > 0.0 && h > 0.0) || !x.is_finite() || !y.is_finite() {
        return Err(DocSignError::InvalidParameters(format!(
            "invalid signature rectangle {:?}",
            appearance.rect
        )));
    }
    let [px, py, pw, ph] = doc.page_dimensions(appearance.page)?;
    if x < px || y < py || x + w > px + pw || y + h > py + ph {
        warn!(
            page = appearance.page,
            rect = ?appearance.rect,
            "signature stamp extends beyond the page"
        );
    }
    Ok(())
}

fn rect_array(x1: f64, y1: f64, x2: f64, y2: f64) -> Object {
    Object::Array(vec![
        Object::Real(x1 as f32),
        Object::Real(y1 as f32),
        Object::Real(x2 as f32),
        Object::Real(y2 as f32),
    ])
}

/// PDF date string in UTC
fn pdf_date(at: DateTime<Utc>) -> String {
    at.format("D:%Y%m%d%H%M%S+00'00'").to_string()
}

/// Escape special characters for PDF string literals
fn escape_pdf_string(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '(' => "\\(".to_string(),
            ')' => "\\)".to_string(),
            '\\' => "\\\\".to_string(),
            _ if c.is_ascii() && !c.is_ascii_control() => c.to_string(),
            _ => "?".to_string(),
        })
        .collect()
}

/// Visible stamp: a framed box with the signer and the signing time
fn appearance_stream(
    appearance: &SignatureAppearance,
    signer_name: &str,
    signing_time: DateTime<Utc>,
) -> Object {
    let width = appearance.rect[2].abs();
    let height = appearance.rect[3].abs();

    let signer = escape_pdf_string(&format!("Signed by: {}", signer_name));
    let time = escape_pdf_string(&format!(
        "Time: {}",
        signing_time.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    let font_size = (height * 0.25).clamp(6.0, 10.0);
    let line1_y = height - font_size - 4.0;

    let content = format!(
        "q\n\
0.9 0.95 1 rg\n\
0 0 {w} {h} re f\n\
0.2 0.4 0.8 RG\n\
1 w\n\
0.5 0.5 {w2} {h2} re S\n\
0 0 0 rg\n\
BT\n\
/F1 {fs} Tf\n\
4 {y1} Td\n\
({signer}) Tj\n\
0 -{fs2} Td\n\
({time}) Tj\n\
ET\n\
Q",
        w = writer::format_real(width),
        h = writer::format_real(height),
        w2 = writer::format_real(width - 1.0),
        h2 = writer::format_real(height - 1.0),
        fs = writer::format_real(font_size),
        y1 = writer::format_real(line1_y),
        fs2 = writer::format_real(font_size + 2.0),
        signer = signer,
        time = time,
    );

    let mut f1 = Dictionary::new();
    f1.set("Type", Object::Name(b"Font".to_vec()));
    f1.set("Subtype", Object::Name(b"Type1".to_vec()));
    f1.set("BaseFont", Object::Name(b"Helvetica".to_vec()));
    let mut fonts = Dictionary::new();
    fonts.set("F1", Object::Dictionary(f1));
    let mut resources = Dictionary::new();
    resources.set("Font", Object::Dictionary(fonts));

    let mut dict = Dictionary::new();
    dict.set("Type", Object::Name(b"XObject".to_vec()));
    dict.set("Subtype", Object::Name(b"Form".to_vec()));
    dict.set("FormType", Object::Integer(1));
    dict.set("BBox", rect_array(0.0, 0.0, width, height));
    dict.set("Resources", Object::Dictionary(resources));

    Object::Stream(Stream::new(dict, content.into_bytes()))
}

/// Register the field in the AcroForm, creating the form when absent
fn add_to_acroform(
    doc: &PdfDocument,
    update: &mut IncrementalUpdate,
    field_id: ObjectId,
    allocate: &mut dyn FnMut() -> ObjectId,
) -> Result<()> {
    let catalog_id = doc.catalog_id()?;
    let mut catalog = doc.catalog()?;

    let Some((form_id, mut form)) = doc.acroform()? else {
        let form_id = allocate();
        let mut form = Dictionary::new();
        form.set("Fields", Object::Array(vec![Object::Reference(field_id)]));
        form.set("SigFlags", Object::Integer(SIG_FLAGS));
        update.add_object(form_id, &Object::Dictionary(form));
        catalog.set("AcroForm", Object::Reference(form_id));
        update.add_object(catalog_id, &Object::Dictionary(catalog));
        return Ok(());
    };

    match form.get(b"Fields") {
        Ok(Object::Reference(fields_id)) => {
            // Indirect Fields array is rewritten in place
            let fields_id = *fields_id;
            let mut fields = doc
                .object(fields_id)
                .and_then(|o| o.as_array().ok())
                .cloned()
                .ok_or_else(|| DocSignError::MalformedPdf("Fields is not an array".into()))?;
            fields.push(Object::Reference(field_id));
            update.add_object(fields_id, &Object::Array(fields));
        }
        Ok(Object::Array(existing)) => {
            let mut fields = existing.clone();
            fields.push(Object::Reference(field_id));
            form.set("Fields", Object::Array(fields));
        }
        _ => form.set("Fields", Object::Array(vec![Object::Reference(field_id)])),
    }
    form.set("SigFlags", Object::Integer(SIG_FLAGS));

    match form_id {
        Some(id) => update.add_object(id, &Object::Dictionary(form)),
        None => {
            catalog.set("AcroForm", Object::Dictionary(form));
            update.add_object(catalog_id, &Object::Dictionary(catalog));
        }
    }
    Ok(())
}

/// Add the widget to the page's `/Annots`
fn add_to_page_annots(
    doc: &PdfDocument,
    update: &mut IncrementalUpdate,
    page_id: ObjectId,
    field_id: ObjectId,
) -> Result<()> {
    let mut page = doc
        .dictionary(page_id)
        .ok_or_else(|| DocSignError::MalformedPdf("page is not a dictionary".to_string()))?;

    match page.get(b"Annots") {
        Ok(Object::Reference(annots_id)) => {
            let annots_id = *annots_id;
            let mut annots = doc
                .object(annots_id)
                .and_then(|o| o.as_array().ok())
                .cloned()
                .ok_or_else(|| DocSignError::MalformedPdf("Annots is not an array".into()))?;
            annots.push(Object::Reference(field_id));
            update.add_object(annots_id, &Object::Array(annots));
            return Ok(());
        }
        Ok(Object::Array(existing)) => {
            let mut annots = existing.clone();
            annots.push(Object::Reference(field_id));
            page.set("Annots", Object::Array(annots));
        }
        _ => page.set("Annots", Object::Array(vec![Object::Reference(field_id)])),
    }
    update.add_object(page_id, &Object::Dictionary(page));
    Ok(())
}
