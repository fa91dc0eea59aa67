//! Incremental-update serializer
//!
//! Objects are appended after the original bytes, followed by a classic
//! cross-reference section whose trailer links back to the previous one
//! through `/Prev`. Nothing before the original `%%EOF` is rewritten.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use lopdf::{Dictionary, Object, ObjectId, StringFormat};
use shared_types::{DocSignError, Result};

/// Bytes of an incremental update under construction
pub struct IncrementalUpdate {
    buf: Vec<u8>,
    offsets: BTreeMap<u32, (u16, usize)>,
}

/// Trailer entries carried into the new revision
#[derive(Debug, Clone)]
pub struct TrailerInfo {
    pub size: u32,
    pub root: ObjectId,
    pub info: Option<ObjectId>,
    pub id: [Vec<u8>; 2],
    pub prev: usize,
}

impl IncrementalUpdate {
    pub fn new(original: &[u8]) -> Self {
        let mut buf = Vec::with_capacity(original.len() + 32 * 1024);
        buf.extend_from_slice(original);
        if !matches!(buf.last(), Some(b'\n') | Some(b'\r')) {
            buf.push(b'\n');
        }
        Self {
            buf,
            offsets: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Append `id` with a pre-serialized body; returns the body's offset
    pub fn add_raw(&mut self, id: ObjectId, body: &[u8]) -> usize {
        self.offsets.insert(id.0, (id.1, self.buf.len()));
        self.buf
            .extend_from_slice(format!("{} {} obj\n", id.0, id.1).as_bytes());
        let body_offset = self.buf.len();
        self.buf.extend_from_slice(body);
        self.buf.extend_from_slice(b"\nendobj\n");
        body_offset
    }

    pub fn add_object(&mut self, id: ObjectId, object: &Object) {
        let mut body = Vec::new();
        write_object(&mut body, object);
        self.add_raw(id, &body);
    }

    /// Write the xref section and trailer and return the finished file
    pub fn finish(mut self, trailer: &TrailerInfo) -> Result<Vec<u8>> {
        if self.offsets.is_empty() {
            return Err(DocSignError::SigningFailure(
                "incremental update has no objects".to_string(),
            ));
        }
        let xref_offset = self.buf.len();
        let mut xref = String::from("xref\n");

        let entries: Vec<(u32, (u16, usize))> = self.offsets.iter().map(|(k, v)| (*k, *v)).collect();
        for run in consecutive_runs(&entries) {
            let _ = writeln!(xref, "{} {}", run[0].0, run.len());
            for (_, (generation, offset)) in run {
                // Each entry is exactly 20 bytes
                let _ = write!(xref, "{:010} {:05} n \n", offset, generation);
            }
        }
        self.buf.extend_from_slice(xref.as_bytes());

        let mut dict = Dictionary::new();
        dict.set("Size", Object::Integer(i64::from(trailer.size)));
        dict.set("Root", Object::Reference(trailer.root));
        if let Some(info) = trailer.info {
            dict.set("Info", Object::Reference(info));
        }
        dict.set(
            "ID",
            Object::Array(vec![
                Object::String(trailer.id[0].clone(), StringFormat::Hexadecimal),
                Object::String(trailer.id[1].clone(), StringFormat::Hexadecimal),
            ]),
        );
        dict.set("Prev", Object::Integer(trailer.prev as i64));

        self.buf.extend_from_slice(b"trailer\n");
        write_object(&mut self.buf, &Object::Dictionary(dict));
        self.buf
            .extend_from_slice(format!("\nstartxref\n{}\n%%EOF\n", xref_offset).as_bytes());
        Ok(self.buf)
    }
}

fn consecutive_runs<T: Copy>(entries: &[(u32, T)]) -> Vec<&[(u32, T)]> {
    let mut runs = Vec::new();
    let mut start = 0;
    for i in 1..=entries.len() {
        if i == entries.len() || entries[i].0 != entries[i - 1].0 + 1 {
            runs.push(&entries[start..i]);
            start = i;
        }
    }
    runs
}

/// Serialize one object in PDF syntax
pub fn write_object(out: &mut Vec<u8>, object: &Object) {
    match object {
        Object::Null => out.extend_from_slice(b"null"),
        Object::Boolean(b) => out.extend_from_slice(if *b { b"true" } else { b"false" }),
        Object::Integer(i) => out.extend_from_slice(i.to_string().as_bytes()),
        Object::Real(r) => out.extend_from_slice(format_real(f64::from(*r)).as_bytes()),
        Object::Name(name) => write_name(out, name),
        Object::String(bytes, format) => write_string(out, bytes, format),
        Object::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b' ');
                }
                write_object(out, item);
            }
            out.push(b']');
        }
        Object::Dictionary(dict) => write_dictionary(out, dict),
        Object::Stream(stream) => {
            let mut dict = stream.dict.clone();
            dict.set("Length", Object::Integer(stream.content.len() as i64));
            write_dictionary(out, &dict);
            out.extend_from_slice(b"\nstream\n");
            out.extend_from_slice(&stream.content);
            out.extend_from_slice(b"\nendstream");
        }
        Object::Reference((num, generation)) => {
            out.extend_from_slice(format!("{} {} R", num, generation).as_bytes())
        }
    }
}

pub fn write_dictionary(out: &mut Vec<u8>, dict: &Dictionary) {
    out.extend_from_slice(b"<<");
    for (key, value) in dict.iter() {
        out.push(b' ');
        write_name(out, key);
        out.push(b' ');
        write_object(out, value);
    }
    out.extend_from_slice(b" >>");
}

pub fn write_name(out: &mut Vec<u8>, name: &[u8]) {
    out.push(b'/');
    for &b in name {
        let regular = b.is_ascii_graphic() && !b"()<>[]{}/%#".contains(&b);
        if regular {
            out.push(b);
        } else {
            out.extend_from_slice(format!("#{:02X}", b).as_bytes());
        }
    }
}

pub fn write_string(out: &mut Vec<u8>, bytes: &[u8], format: &StringFormat) {
    match format {
        StringFormat::Hexadecimal => {
            out.push(b'<');
            out.extend_from_slice(hex::encode_upper(bytes).as_bytes());
            out.push(b'>');
        }
        StringFormat::Literal => {
            out.push(b'(');
            for &b in bytes {
                match b {
                    b'(' | b')' | b'\\' => {
                        out.push(b'\\');
                        out.push(b);
                    }
                    b'\r' => out.extend_from_slice(b"\\r"),
                    b'\n' => out.extend_from_slice(b"\\n"),
                    _ => out.push(b),
                }
            }
            out.push(b')');
        }
    }
}

/// Text string: PDFDocEncoding when ASCII, otherwise UTF-16BE with BOM
pub fn text_string(text: &str) -> Object {
    if text.is_ascii() {
        Object::String(text.as_bytes().to_vec(), StringFormat::Literal)
    } else {
        let mut bytes = vec![0xFE, 0xFF];
        for unit in text.encode_utf16() {
            bytes.extend_from_slice(&unit.to_be_bytes());
        }
        Object::String(bytes, StringFormat::Hexadecimal)
    }
}

/// Reals without exponents, trailing zeros trimmed
pub fn format_real(value: f64) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    let text = format!("{:.4}", value);
    let trimmed = text.trim_end_matches('0').trim_end_matches('.');
    match trimmed {
        "" | "-" | "-0" => "0".to_string(),
        other => other.to_string(),
    }
}
