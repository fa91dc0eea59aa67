//! PDF structure access using lopdf

use lopdf::{Dictionary, Document, Object, ObjectId};
use shared_types::{DocSignError, Result};
use tracing::debug;

const MAX_REFERENCE_DEPTH: usize = 16;
const MAX_FIELD_DEPTH: usize = 32;

/// A signature dictionary found in the document
#[derive(Debug, Clone)]
pub struct SignatureEntry {
    /// Fully qualified field name, when reached through a form field
    pub field_name: Option<String>,
    pub dict_id: Option<ObjectId>,
    pub dict: Dictionary,
}

impl SignatureEntry {
    pub fn byte_range(&self) -> Option<Vec<i64>> {
        let array = match self.dict.get(b"ByteRange").ok()? {
            Object::Array(a) => a,
            _ => return None,
        };
        array.iter().map(|o| o.as_i64().ok()).collect()
    }

    pub fn text(&self, key: &[u8]) -> Option<String> {
        match self.dict.get(key).ok()? {
            Object::String(bytes, _) => Some(decode_text(bytes)),
            _ => None,
        }
    }

    pub fn name(&self, key: &[u8]) -> Option<String> {
        match self.dict.get(key).ok()? {
            Object::Name(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
            _ => None,
        }
    }

    /// Raw `/Contents` bytes as parsed
    pub fn contents(&self) -> Option<&[u8]> {
        match self.dict.get(b"Contents").ok()? {
            Object::String(bytes, _) => Some(bytes),
            _ => None,
        }
    }
}

/// Loaded document plus the bytes it came from
pub struct PdfDocument {
    pub(crate) doc: Document,
    pub(crate) bytes: Vec<u8>,
}

impl PdfDocument {
    /// Load a PDF from raw bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if !bytes.starts_with(b"%PDF-") {
            return Err(DocSignError::MalformedPdf("missing %PDF header".to_string()));
        }
        let doc = Document::load_mem(bytes)
            .map_err(|e| DocSignError::MalformedPdf(format!("PDF parse error: {}", e)))?;
        Ok(Self {
            doc,
            bytes: bytes.to_vec(),
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn page_count(&self) -> usize {
        self.doc.get_pages().len()
    }

    /// Page object ID for a 1-based page number
    pub fn page_id(&self, page_num: u32) -> Option<ObjectId> {
        self.doc.get_pages().get(&page_num).copied()
    }

    pub fn is_encrypted(&self) -> bool {
        self.doc.trailer.get(b"Encrypt").is_ok()
    }

    pub fn catalog_id(&self) -> Result<ObjectId> {
        self.doc
            .trailer
            .get(b"Root")
            .and_then(Object::as_reference)
            .map_err(|_| DocSignError::MalformedPdf("trailer has no /Root reference".to_string()))
    }

    pub fn catalog(&self) -> Result<Dictionary> {
        let id = self.catalog_id()?;
        self.dictionary(id)
            .ok_or_else(|| DocSignError::MalformedPdf("document catalog is missing".to_string()))
    }

    pub fn info_id(&self) -> Option<ObjectId> {
        self.doc
            .trailer
            .get(b"Info")
            .and_then(Object::as_reference)
            .ok()
    }

    /// First element of the trailer `/ID` array
    pub fn file_id(&self) -> Option<Vec<u8>> {
        match self.doc.trailer.get(b"ID").ok()? {
            Object::Array(items) => match items.first()? {
                Object::String(bytes, _) => Some(bytes.clone()),
                _ => None,
            },
            _ => None,
        }
    }

    /// Smallest object number not used by any revision
    pub fn next_object_number(&self) -> u32 {
        let size = self
            .doc
            .trailer
            .get(b"Size")
            .and_then(Object::as_i64)
            .ok()
            .and_then(|s| u32::try_from(s).ok())
            .unwrap_or(0);
        size.max(self.doc.max_id + 1)
    }

    /// Offset of the newest cross-reference section
    pub fn startxref(&self) -> Result<usize> {
        last_startxref(&self.bytes)
    }

    pub fn object(&self, id: ObjectId) -> Option<&Object> {
        self.doc.get_object(id).ok()
    }

    pub fn dictionary(&self, id: ObjectId) -> Option<Dictionary> {
        self.object(id)
            .and_then(|o| o.as_dict().ok())
            .cloned()
    }

    /// Follow references until a direct object
    pub fn resolve<'a>(&'a self, mut obj: &'a Object) -> Option<&'a Object> {
        for _ in 0..MAX_REFERENCE_DEPTH {
            match obj {
                Object::Reference(id) => obj = self.doc.get_object(*id).ok()?,
                other => return Some(other),
            }
        }
        None
    }

    /// Get page dimensions (MediaBox) as [x, y, width, height]
    pub fn page_dimensions(&self, page_num: u32) -> Result<[f64; 4]> {
        let page_id = self
            .page_id(page_num)
            .ok_or_else(|| DocSignError::MalformedPdf(format!("page {} not found", page_num)))?;
        let page = self
            .dictionary(page_id)
            .ok_or_else(|| DocSignError::MalformedPdf("page is not a dictionary".to_string()))?;
        self.media_box(&page)
    }

    /// MediaBox from the page or the nearest ancestor carrying one
    fn media_box(&self, page: &Dictionary) -> Result<[f64; 4]> {
        let mut current = page.clone();
        for _ in 0..MAX_FIELD_DEPTH {
            if let Ok(media_box) = current.get(b"MediaBox") {
                return self.parse_rect(media_box);
            }
            let parent = current
                .get(b"Parent")
                .ok()
                .and_then(|p| self.resolve(p))
                .and_then(|p| p.as_dict().ok());
            match parent {
                Some(parent) => current = parent.clone(),
                None => break,
            }
        }

        // US Letter
        Ok([0.0, 0.0, 612.0, 792.0])
    }

    /// Parse a PDF rectangle array into [x, y, width, height]
    fn parse_rect(&self, obj: &Object) -> Result<[f64; 4]> {
        let arr = self
            .resolve(obj)
            .and_then(|o| o.as_array().ok())
            .ok_or_else(|| DocSignError::MalformedPdf("MediaBox is not an array".to_string()))?;

        if arr.len() != 4 {
            return Err(DocSignError::MalformedPdf(format!(
                "MediaBox has {} elements, expected 4",
                arr.len()
            )));
        }

        let mut values = [0.0f64; 4];
        for (i, obj) in arr.iter().enumerate() {
            values[i] = self.extract_number(obj)?;
        }

        Ok([
            values[0],
            values[1],
            values[2] - values[0],
            values[3] - values[1],
        ])
    }

    fn extract_number(&self, obj: &Object) -> Result<f64> {
        match self.resolve(obj) {
            Some(Object::Integer(i)) => Ok(*i as f64),
            Some(Object::Real(r)) => Ok(f64::from(*r)),
            _ => Err(DocSignError::MalformedPdf(
                "expected number in rectangle".to_string(),
            )),
        }
    }

    /// Interactive form dictionary, with its object ID when indirect
    pub fn acroform(&self) -> Result<Option<(Option<ObjectId>, Dictionary)>> {
        let catalog = self.catalog()?;
        let Ok(entry) = catalog.get(b"AcroForm") else {
            return Ok(None);
        };
        let id = entry.as_reference().ok();
        let dict = self
            .resolve(entry)
            .and_then(|o| o.as_dict().ok())
            .cloned()
            .ok_or_else(|| DocSignError::MalformedPdf("AcroForm is not a dictionary".into()))?;
        Ok(Some((id, dict)))
    }

    /// Fully qualified names of every form field
    pub fn field_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.walk_fields(|name, _, _| names.push(name.to_string()));
        names
    }

    /// Signature dictionaries with a `/ByteRange`, ordered by position in
    /// the file so the newest signature comes last
    pub fn signatures(&self) -> Vec<SignatureEntry> {
        let mut found: Vec<SignatureEntry> = Vec::new();

        self.walk_fields(|name, field, field_type| {
            if field_type != Some(b"Sig".as_slice()) {
                return;
            }
            let Ok(value) = field.get(b"V") else {
                return;
            };
            let dict_id = value.as_reference().ok();
            if let Some(dict) = self.resolve(value).and_then(|o| o.as_dict().ok()) {
                if dict.get(b"ByteRange").is_ok() {
                    found.push(SignatureEntry {
                        field_name: Some(name.to_string()),
                        dict_id,
                        dict: dict.clone(),
                    });
                }
            }
        });

        // Signature dictionaries not reachable from the form
        for (id, obj) in &self.doc.objects {
            if found.iter().any(|e| e.dict_id == Some(*id)) {
                continue;
            }
            let Ok(dict) = obj.as_dict() else {
                continue;
            };
            let is_sig = matches!(dict.get(b"Type"), Ok(Object::Name(n)) if n == b"Sig");
            if is_sig && dict.get(b"ByteRange").is_ok() {
                found.push(SignatureEntry {
                    field_name: None,
                    dict_id: Some(*id),
                    dict: dict.clone(),
                });
            }
        }

        found.sort_by_key(|e| e.byte_range().and_then(|r| r.get(1).copied()).unwrap_or(-1));
        debug!(count = found.len(), "discovered signature dictionaries");
        found
    }

    /// AcroForm dictionary borrowed from the document
    fn acroform_dict(&self) -> Option<&Dictionary> {
        let root = self.doc.trailer.get(b"Root").ok()?;
        let catalog = self.resolve(root)?.as_dict().ok()?;
        self.resolve(catalog.get(b"AcroForm").ok()?)?.as_dict().ok()
    }

    /// Visit every terminal field with its qualified name, dictionary and
    /// inherited `/FT`
    fn walk_fields<'a>(&'a self, mut visit: impl FnMut(&str, &'a Dictionary, Option<&'a [u8]>)) {
        let Some(fields) = self
            .acroform_dict()
            .and_then(|form| form.get(b"Fields").ok())
            .and_then(|f| self.resolve(f))
            .and_then(|f| f.as_array().ok())
        else {
            return;
        };

        let mut stack: Vec<(&'a Object, String, Option<&'a [u8]>, usize)> = fields
            .iter()
            .rev()
            .filter_map(|field| self.resolve(field))
            .map(|field| (field, String::new(), None, 0))
            .collect();

        while let Some((obj, prefix, inherited_ft, depth)) = stack.pop() {
            if depth > MAX_FIELD_DEPTH {
                continue;
            }
            let Ok(dict) = obj.as_dict() else {
                continue;
            };
            let partial = match dict.get(b"T") {
                Ok(Object::String(bytes, _)) => Some(decode_text(bytes)),
                _ => None,
            };
            let name = match (&partial, prefix.is_empty()) {
                (Some(p), true) => p.clone(),
                (Some(p), false) => format!("{}.{}", prefix, p),
                (None, _) => prefix.clone(),
            };
            let field_type = match dict.get(b"FT") {
                Ok(Object::Name(n)) => Some(n.as_slice()),
                _ => inherited_ft,
            };

            let kids = dict
                .get(b"Kids")
                .ok()
                .and_then(|k| self.resolve(k))
                .and_then(|k| k.as_array().ok());
            // Kids without their own /T are widgets of this field
            let has_child_fields = kids.is_some_and(|kids| {
                kids.iter().any(|k| {
                    self.resolve(k)
                        .and_then(|k| k.as_dict().ok())
                        .is_some_and(|d| d.get(b"T").is_ok())
                })
            });

            match kids {
                Some(kids) if has_child_fields => {
                    for kid in kids.iter().rev().filter_map(|k| self.resolve(k)) {
                        stack.push((kid, name.clone(), field_type, depth + 1));
                    }
                }
                _ => {
                    if !name.is_empty() {
                        visit(&name, dict, field_type);
                    }
                }
            }
        }
    }
}

/// Text strings are PDFDocEncoding or UTF-16BE with a BOM
pub fn decode_text(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        bytes.iter().map(|b| *b as char).collect()
    }
}

/// Find the last occurrence of a pattern in bytes
pub fn find_last(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    let len = needle.len();
    if len == 0 || len > haystack.len() {
        return None;
    }
    (0..=(haystack.len() - len))
        .rev()
        .find(|&i| &haystack[i..i + len] == needle)
}

/// Offset recorded after the last `startxref` keyword
pub fn last_startxref(bytes: &[u8]) -> Result<usize> {
    let keyword = find_last(bytes, b"startxref")
        .ok_or_else(|| DocSignError::MalformedPdf("no startxref keyword".to_string()))?;
    let digits: String = bytes[keyword + b"startxref".len()..]
        .iter()
        .skip_while(|b| b.is_ascii_whitespace())
        .take_while(|b| b.is_ascii_digit())
        .map(|b| *b as char)
        .collect();
    let offset: usize = digits
        .parse()
        .map_err(|_| DocSignError::MalformedPdf("startxref offset is unreadable".to_string()))?;
    if offset >= bytes.len() {
        return Err(DocSignError::MalformedPdf(format!(
            "startxref offset {} is past the end of the file",
            offset
        )));
    }
    Ok(offset)
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use pretty_assertions::assert_eq;
    use shared_types::ErrorKind;

    #[test]
    fn test_from_bytes_valid_pdf() {
        let pdf = PdfDocument::from_bytes(&pdf_with_pages(3)).unwrap();
        assert_eq!(pdf.page_count(), 3);
        assert!(pdf.page_id(3).is_some());
        assert!(pdf.page_id(4).is_none());
        assert!(!pdf.is_encrypted());
    }

    #[test]
    fn test_html_is_not_a_pdf() {
        let html = b"<!DOCTYPE html><html><body>Not a PDF</body></html>";
        let err = PdfDocument::from_bytes(html).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::MalformedPdf);
    }

    #[test]
    fn test_empty_and_garbage_fail() {
        assert!(PdfDocument::from_bytes(&[]).is_err());
        assert!(PdfDocument::from_bytes(&[0u8; 100]).is_err());
    }

    #[test]
    fn test_page_dimensions_inherited() {
        let pdf = PdfDocument::from_bytes(&one_page_pdf()).unwrap();
        assert_eq!(pdf.page_dimensions(1).unwrap(), [0.0, 0.0, 612.0, 792.0]);
        assert!(pdf.page_dimensions(2).is_err());
    }

    #[test]
    fn test_catalog_and_trailer() {
        let bytes = one_page_pdf();
        let pdf = PdfDocument::from_bytes(&bytes).unwrap();
        let catalog = pdf.catalog().unwrap();
        assert!(catalog.get(b"Pages").is_ok());
        assert!(pdf.acroform().unwrap().is_none());
        assert!(pdf.next_object_number() > pdf.catalog_id().unwrap().0);
        assert_eq!(pdf.startxref().unwrap(), last_startxref(&bytes).unwrap());
        assert!(pdf.signatures().is_empty());
        assert!(pdf.field_names().is_empty());
    }

    #[test]
    fn test_last_startxref() {
        let bytes = b"%PDF-1.4\nxref\nstartxref\n9\n%%EOF\nstartxref\n  4\n%%EOF";
        assert_eq!(last_startxref(bytes).unwrap(), 4);
        assert!(last_startxref(b"%PDF-1.4 no trailer").is_err());
        assert!(last_startxref(b"%PDF\nstartxref\n99999\n%%EOF").is_err());
    }

    #[test]
    fn test_decode_text() {
        assert_eq!(decode_text(b"Signature1"), "Signature1");
        assert_eq!(decode_text(&[0xFE, 0xFF, 0x00, 0x41, 0x01, 0x42]), "A\u{142}");
    }

    #[test]
    fn test_find_last() {
        let data = b"Hello /Contents world /Contents end";
        assert_eq!(find_last(data, b"/Contents"), Some(22));
        assert_eq!(find_last(data, b""), None);
        assert_eq!(find_last(b"ab", b"abc"), None);
    }
}
