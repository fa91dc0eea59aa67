//! Signature byte ranges
//!
//! `/ByteRange [0 a b c]` names the two spans of the file a signature
//! covers. The gap between them, `a..b`, is exactly the `<...>` hex token of
//! `/Contents`, brackets included.

use shared_types::{DocSignError, Result};

/// Fixed-width placeholder written before offsets are known; the real value
/// is space-padded to the same width so no offsets move
pub const PLACEHOLDER: &str = "[0 0000000000 0000000000 0000000000]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange([i64; 4]);

impl ByteRange {
    pub fn new(values: [i64; 4]) -> Self {
        Self(values)
    }

    pub fn from_slice(values: &[i64]) -> Option<Self> {
        <[i64; 4]>::try_from(values).ok().map(Self)
    }

    /// Range covering all of a `file_len` file except `contents_len` bytes
    /// starting at `contents_start`
    pub fn around_contents(file_len: usize, contents_start: usize, contents_len: usize) -> Self {
        let after = contents_start + contents_len;
        Self([
            0,
            contents_start as i64,
            after as i64,
            file_len as i64 - after as i64,
        ])
    }

    pub fn values(&self) -> [i64; 4] {
        self.0
    }

    /// Offset just past the second span
    pub fn end(&self) -> i64 {
        self.0[2].saturating_add(self.0[3])
    }

    /// Excluded span `[start, end)`
    pub fn gap(&self) -> (usize, usize) {
        (self.0[1].max(0) as usize, self.0[2].max(0) as usize)
    }

    /// Structural sanity against a file of `file_len` bytes
    pub fn check(&self, file_len: usize) -> Result<()> {
        let [offset1, length1, offset2, length2] = self.0;
        if self.0.iter().any(|v| *v < 0) {
            return Err(tamper(format!("negative value in {}", self)));
        }
        if offset1 != 0 {
            return Err(tamper(format!("{} does not start at 0", self)));
        }
        if length1 >= offset2 {
            return Err(tamper(format!("{} has no gap for the signature", self)));
        }
        if offset2.saturating_add(length2) > file_len as i64 {
            return Err(tamper(format!(
                "{} runs past the end of a {}-byte file",
                self, file_len
            )));
        }
        Ok(())
    }

    pub fn covers_whole_file(&self, file_len: usize) -> bool {
        self.check(file_len).is_ok() && self.end() == file_len as i64
    }

    /// The two covered spans of `data`
    pub fn covered<'a>(&self, data: &'a [u8]) -> Result<[&'a [u8]; 2]> {
        self.check(data.len())?;
        let [_, length1, offset2, length2] = self.0.map(|v| v as usize);
        Ok([&data[..length1], &data[offset2..offset2 + length2]])
    }

    /// The hex digits between `<` and `>` in the excluded span
    pub fn contents_hex<'a>(&self, data: &'a [u8]) -> Result<&'a [u8]> {
        self.check(data.len())?;
        let (start, end) = self.gap();
        let token = &data[start..end];
        match token {
            [b'<', inner @ .., b'>'] if inner.iter().all(u8::is_ascii_hexdigit) => Ok(inner),
            _ => Err(tamper(format!(
                "{} does not exclude exactly the /Contents string",
                self
            ))),
        }
    }

    /// PDF array text, space-padded to `width`
    pub fn format_padded(&self, width: usize) -> Result<String> {
        let text = self.to_string();
        if text.len() > width {
            return Err(DocSignError::SigningFailure(format!(
                "byte range {} does not fit {} reserved characters",
                text, width
            )));
        }
        Ok(format!("{:<width$}", text, width = width))
    }
}

impl std::fmt::Display for ByteRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let [a, b, c, d] = self.0;
        write!(f, "[{} {} {} {}]", a, b, c, d)
    }
}

fn tamper(detail: String) -> DocSignError {
    DocSignError::ByteRangeTamperDetected(detail)
}

/// Overwrite the placeholder at `offset` with the real range
pub fn write_byte_range(buf: &mut [u8], offset: usize, range: &ByteRange) -> Result<()> {
    let text = range.format_padded(PLACEHOLDER.len())?;
    let slot = buf
        .get_mut(offset..offset + PLACEHOLDER.len())
        .ok_or_else(|| DocSignError::SigningFailure("byte range slot out of bounds".into()))?;
    if slot != PLACEHOLDER.as_bytes() {
        return Err(DocSignError::SigningFailure(
            "byte range placeholder not found at the reserved offset".into(),
        ));
    }
    slot.copy_from_slice(text.as_bytes());
    Ok(())
}

/// Hex-encode `der` into the `<...>` token at `offset`, zero-padded to
/// `token_len` characters
pub fn write_contents(buf: &mut [u8], offset: usize, token_len: usize, der: &[u8]) -> Result<()> {
    if token_len < 2 {
        return Err(DocSignError::SigningFailure("contents slot too small".into()));
    }
    let capacity = token_len - 2;
    let encoded = hex::encode(der);
    if encoded.len() > capacity {
        return Err(DocSignError::SigningFailure(format!(
            "signature of {} bytes exceeds the {}-byte reservation",
            der.len(),
            capacity / 2
        )));
    }
    let slot = buf
        .get_mut(offset..offset + token_len)
        .ok_or_else(|| DocSignError::SigningFailure("contents slot out of bounds".into()))?;
    slot[0] = b'<';
    slot[1..1 + encoded.len()].copy_from_slice(encoded.as_bytes());
    slot[1 + encoded.len()..token_len - 1].fill(b'0');
    slot[token_len - 1] = b'>';
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use shared_types::ErrorKind;

    #[test]
    fn test_placeholder_width() {
        assert_eq!(PLACEHOLDER.len(), 36);
        let widest = ByteRange::new([0, 9_999_999_999, 9_999_999_999, 9_999_999_999]);
        assert_eq!(widest.format_padded(PLACEHOLDER.len()).unwrap().len(), 36);
    }

    #[test]
    fn test_around_contents() {
        let range = ByteRange::around_contents(1000, 400, 100);
        assert_eq!(range.values(), [0, 400, 500, 500]);
        assert!(range.covers_whole_file(1000));
        assert!(!range.covers_whole_file(1001));
    }

    #[test]
    fn test_covered_spans() {
        let data = b"AAA<00>CCC";
        let range = ByteRange::around_contents(data.len(), 3, 4);
        let [first, second] = range.covered(data).unwrap();
        assert_eq!(first, b"AAA");
        assert_eq!(second, b"CCC");
        assert_eq!(range.contents_hex(data).unwrap(), b"00");
    }

    #[test]
    fn test_bad_ranges_rejected() {
        let cases = [
            [10, 100, 150, 50],
            [0, 150, 100, 50],
            [0, 100, 150, 100],
            [0, -1, 150, 50],
        ];
        for values in cases {
            let err = ByteRange::new(values).check(200).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ByteRangeTamperDetected, "{:?}", values);
        }
    }

    #[test]
    fn test_gap_must_be_hex_token() {
        let data = b"AAA<0g>CCC";
        let range = ByteRange::around_contents(data.len(), 3, 4);
        assert!(range.contents_hex(data).is_err());

        let shifted = ByteRange::around_contents(data.len(), 2, 4);
        assert!(shifted.contents_hex(data).is_err());
    }

    #[test]
    fn test_write_byte_range_and_contents() {
        let mut buf = format!("/ByteRange {} /Contents <00000000>", PLACEHOLDER).into_bytes();
        let range = ByteRange::new([0, 10, 20, 30]);
        write_byte_range(&mut buf, 11, &range).unwrap();
        let contents_at = buf.len() - 10;
        write_contents(&mut buf, contents_at, 10, &[0xAB, 0xCD]).unwrap();

        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("/ByteRange [0 10 20 30]   "));
        assert!(text.ends_with("/Contents <abcd0000>"));
    }

    #[test]
    fn test_contents_overflow() {
        let mut buf = b"<0000>".to_vec();
        let err = write_contents(&mut buf, 0, 6, &[1, 2, 3]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SigningFailure);
    }

    #[test]
    fn test_write_byte_range_requires_placeholder() {
        let mut buf = vec![b' '; 64];
        assert!(write_byte_range(&mut buf, 0, &ByteRange::new([0, 1, 2, 3])).is_err());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// A range built around a token always validates and excludes exactly it
        #[test]
        fn around_contents_excludes_token(
            before in 0usize..500,
            hex_len in 1usize..64,
            after in 0usize..500,
        ) {
            let mut data = vec![b'x'; before];
            data.push(b'<');
            data.extend(std::iter::repeat(b'0').take(hex_len * 2));
            data.push(b'>');
            data.extend(std::iter::repeat(b'y').take(after));

            let range = ByteRange::around_contents(data.len(), before, hex_len * 2 + 2);
            prop_assert!(range.covers_whole_file(data.len()));
            prop_assert_eq!(range.contents_hex(&data).unwrap().len(), hex_len * 2);
            let [a, b] = range.covered(&data).unwrap();
            prop_assert_eq!(a.len() + b.len(), before + after);
        }
    }
}
