//! Minimal DER helpers for structures the `der` types don't cover directly
//!
//! Used to build and read the ESS signing-certificate attribute and to measure a
//! zero-padded CMS blob pulled out of a PDF `/Contents` string.

pub const TAG_SEQUENCE: u8 = 0x30;
pub const TAG_OCTET_STRING: u8 = 0x04;

pub fn build_sequence(items: &[&[u8]]) -> Vec<u8> {
    let content: Vec<u8> = items.iter().flat_map(|i| i.iter().copied()).collect();
    build_tlv(TAG_SEQUENCE, &content)
}

pub fn build_octet_string(content: &[u8]) -> Vec<u8> {
    build_tlv(TAG_OCTET_STRING, content)
}

pub fn build_tlv(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut result = vec![tag];
    let len = content.len();

    if len < 0x80 {
        result.push(len as u8);
    } else {
        let len_bytes = len.to_be_bytes();
        let skip = len_bytes.iter().take_while(|b| **b == 0).count();
        let significant = &len_bytes[skip..];
        result.push(0x80 | significant.len() as u8);
        result.extend_from_slice(significant);
    }

    result.extend(content);
    result
}

/// Decode a DER length field. Returns `(length, bytes consumed)`.
pub fn parse_length(data: &[u8]) -> Option<(usize, usize)> {
    let first = *data.first()?;
    if first < 0x80 {
        return Some((first as usize, 1));
    }

    let count = (first & 0x7F) as usize;
    // Indefinite lengths are not DER; more than 4 bytes is not a PDF signature
    if count == 0 || count > 4 || data.len() < 1 + count {
        return None;
    }

    let len = data[1..1 + count]
        .iter()
        .fold(0usize, |acc, b| (acc << 8) | *b as usize);
    Some((len, 1 + count))
}

/// Total size of the first TLV in `data`, header included
pub fn encoded_len(data: &[u8]) -> Option<usize> {
    if data.is_empty() {
        return None;
    }
    let (len, header) = parse_length(&data[1..])?;
    let total = 1 + header + len;
    (total <= data.len()).then_some(total)
}

/// Split the first TLV into its content and whatever follows it
pub fn parse_tlv(data: &[u8]) -> Option<(u8, &[u8], &[u8])> {
    let total = encoded_len(data)?;
    let (_, header) = parse_length(&data[1..])?;
    Some((data[0], &data[1 + header..total], &data[total..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_and_long_lengths() {
        assert_eq!(build_octet_string(&[1, 2, 3]), vec![0x04, 0x03, 1, 2, 3]);

        let long = build_octet_string(&[0u8; 300]);
        assert_eq!(&long[..4], &[0x04, 0x82, 0x01, 0x2C]);
        assert_eq!(long.len(), 304);
    }

    #[test]
    fn test_encoded_len_ignores_trailing_padding() {
        let mut blob = build_sequence(&[&build_octet_string(b"abc")]);
        let exact = blob.len();
        blob.extend(vec![0u8; 64]);
        assert_eq!(encoded_len(&blob), Some(exact));
    }

    #[test]
    fn test_truncated_input_rejected() {
        let blob = build_octet_string(&[7u8; 200]);
        assert_eq!(encoded_len(&blob[..50]), None);
        assert_eq!(parse_length(&[0x80]), None);
        assert_eq!(encoded_len(&[]), None);
    }

    #[test]
    fn test_parse_tlv_nested() {
        let inner = build_octet_string(b"digest");
        let outer = build_sequence(&[&inner]);
        let (tag, content, rest) = parse_tlv(&outer).unwrap();
        assert_eq!(tag, TAG_SEQUENCE);
        assert_eq!(content, inner.as_slice());
        assert!(rest.is_empty());
    }
}
