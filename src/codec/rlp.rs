//! RLP encoding and decoding (Yellow Paper appendix B)
//!
//! Encoding follows the canonical rules exactly: single bytes below 0x80
//! encode as themselves, short strings carry `0x80 + len`, long strings
//! `0xb7 + len_of_len`, lists the same shifted to `0xc0`/`0xf7`. The decoder
//! enforces canonical form: a value that re-encodes differently from its
//! input is rejected rather than silently accepted.

use primitive_types::U256;

use super::CodecError;
use crate::types::Address;

/// A decoded RLP item: either a byte string or a list of items
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RlpItem {
    Bytes(Vec<u8>),
    List(Vec<RlpItem>),
}

impl RlpItem {
    /// Byte-string item from a slice
    pub fn bytes(data: &[u8]) -> Self {
        RlpItem::Bytes(data.to_vec())
    }

    /// Minimal big-endian encoding of an unsigned integer (zero → empty)
    pub fn uint(value: U256) -> Self {
        let mut buf = [0u8; 32];
        value.to_big_endian(&mut buf);
        let first = buf.iter().position(|&b| b != 0).unwrap_or(32);
        RlpItem::Bytes(buf[first..].to_vec())
    }

    /// Minimal big-endian encoding of a u64
    pub fn u64(value: u64) -> Self {
        Self::uint(U256::from(value))
    }

    /// Address as 20 raw bytes; `None` (contract creation) as the empty string
    pub fn address(addr: Option<Address>) -> Self {
        match addr {
            Some(a) => RlpItem::Bytes(a.0.to_vec()),
            None => RlpItem::Bytes(Vec::new()),
        }
    }

    /// Interpret a byte-string item as a big-endian unsigned integer
    pub fn as_uint(&self) -> Result<U256, CodecError> {
        match self {
            RlpItem::Bytes(bytes) if bytes.len() <= 32 => {
                if bytes.first() == Some(&0) {
                    return Err(CodecError::NonCanonical("integer with leading zero"));
                }
                Ok(U256::from_big_endian(bytes))
            }
            RlpItem::Bytes(_) => Err(CodecError::ValueOutOfRange),
            RlpItem::List(_) => Err(CodecError::TypeMismatch {
                expected: "byte string".to_string(),
                got: "list".to_string(),
            }),
        }
    }
}

/// Encode an item to its RLP byte representation
pub fn encode(item: &RlpItem) -> Vec<u8> {
    match item {
        RlpItem::Bytes(bytes) => {
            if bytes.len() == 1 && bytes[0] < 0x80 {
                bytes.clone()
            } else {
                let mut out = length_prefix(bytes.len(), 0x80);
                out.extend_from_slice(bytes);
                out
            }
        }
        RlpItem::List(items) => {
            let mut payload = Vec::new();
            for inner in items {
                payload.extend_from_slice(&encode(inner));
            }
            let mut out = length_prefix(payload.len(), 0xc0);
            out.extend_from_slice(&payload);
            out
        }
    }
}

/// Convenience: encode a list of items
pub fn encode_list(items: &[RlpItem]) -> Vec<u8> {
    encode(&RlpItem::List(items.to_vec()))
}

fn length_prefix(len: usize, offset: u8) -> Vec<u8> {
    if len <= 55 {
        vec![offset + len as u8]
    } else {
        let len_bytes = len.to_be_bytes();
        let first = len_bytes.iter().position(|&b| b != 0).unwrap_or(7);
        let minimal = &len_bytes[first..];
        let mut out = vec![offset + 55 + minimal.len() as u8];
        out.extend_from_slice(minimal);
        out
    }
}

/// Decode a complete RLP payload; trailing bytes are an error
pub fn decode(data: &[u8]) -> Result<RlpItem, CodecError> {
    let (item, consumed) = decode_at(data)?;
    if consumed != data.len() {
        return Err(CodecError::RlpTrailingBytes);
    }
    Ok(item)
}

/// Decode the item at the start of `data`, returning it and the bytes consumed
fn decode_at(data: &[u8]) -> Result<(RlpItem, usize), CodecError> {
    let first = *data.first().ok_or(CodecError::RlpTruncated)?;

    match first {
        // Single byte, self-encoding
        0x00..=0x7f => Ok((RlpItem::Bytes(vec![first]), 1)),

        // Short string
        0x80..=0xb7 => {
            let len = (first - 0x80) as usize;
            let payload = data.get(1..1 + len).ok_or(CodecError::RlpTruncated)?;
            if len == 1 && payload[0] < 0x80 {
                return Err(CodecError::NonCanonical(
                    "single byte below 0x80 must encode as itself",
                ));
            }
            Ok((RlpItem::Bytes(payload.to_vec()), 1 + len))
        }

        // Long string
        0xb8..=0xbf => {
            let (len, header) = decode_long_length(data, first - 0xb7)?;
            let payload = data
                .get(header..header + len)
                .ok_or(CodecError::RlpTruncated)?;
            Ok((RlpItem::Bytes(payload.to_vec()), header + len))
        }

        // Short list
        0xc0..=0xf7 => {
            let len = (first - 0xc0) as usize;
            let payload = data.get(1..1 + len).ok_or(CodecError::RlpTruncated)?;
            Ok((RlpItem::List(decode_list_payload(payload)?), 1 + len))
        }

        // Long list
        0xf8..=0xff => {
            let (len, header) = decode_long_length(data, first - 0xf7)?;
            let payload = data
                .get(header..header + len)
                .ok_or(CodecError::RlpTruncated)?;
            Ok((RlpItem::List(decode_list_payload(payload)?), header + len))
        }
    }
}

/// Parse a long-form length: returns (payload_len, total_header_len)
fn decode_long_length(data: &[u8], len_of_len: u8) -> Result<(usize, usize), CodecError> {
    let len_of_len = len_of_len as usize;
    let len_bytes = data.get(1..1 + len_of_len).ok_or(CodecError::RlpTruncated)?;
    if len_bytes[0] == 0 {
        return Err(CodecError::NonCanonical("length has leading zero"));
    }
    if len_of_len > 8 {
        return Err(CodecError::NonCanonical("length wider than 8 bytes"));
    }
    let mut len = 0usize;
    for &b in len_bytes {
        len = len
            .checked_mul(256)
            .and_then(|l| l.checked_add(b as usize))
            .ok_or(CodecError::NonCanonical("length overflows"))?;
    }
    if len <= 55 {
        return Err(CodecError::NonCanonical(
            "long form used for a short payload",
        ));
    }
    Ok((len, 1 + len_of_len))
}

fn decode_list_payload(mut payload: &[u8]) -> Result<Vec<RlpItem>, CodecError> {
    let mut items = Vec::new();
    while !payload.is_empty() {
        let (item, consumed) = decode_at(payload)?;
        items.push(item);
        payload = &payload[consumed..];
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(item: RlpItem) {
        let encoded = encode(&item);
        assert_eq!(decode(&encoded).unwrap(), item);
    }

    #[test]
    fn test_dog() {
        let encoded = encode(&RlpItem::bytes(b"dog"));
        assert_eq!(encoded, vec![0x83, b'd', b'o', b'g']);
    }

    #[test]
    fn test_cat_dog_list() {
        let encoded = encode_list(&[RlpItem::bytes(b"cat"), RlpItem::bytes(b"dog")]);
        assert_eq!(
            encoded,
            vec![0xc8, 0x83, b'c', b'a', b't', 0x83, b'd', b'o', b'g']
        );
    }

    #[test]
    fn test_empty_string_and_list() {
        assert_eq!(encode(&RlpItem::bytes(b"")), vec![0x80]);
        assert_eq!(encode(&RlpItem::List(vec![])), vec![0xc0]);
    }

    #[test]
    fn test_single_low_byte_is_itself() {
        assert_eq!(encode(&RlpItem::Bytes(vec![0x0f])), vec![0x0f]);
        assert_eq!(encode(&RlpItem::Bytes(vec![0x80])), vec![0x81, 0x80]);
    }

    #[test]
    fn test_integer_encoding() {
        assert_eq!(encode(&RlpItem::u64(0)), vec![0x80]);
        assert_eq!(encode(&RlpItem::u64(15)), vec![0x0f]);
        assert_eq!(encode(&RlpItem::u64(1024)), vec![0x82, 0x04, 0x00]);
    }

    #[test]
    fn test_long_string() {
        let payload = vec![0x61u8; 56];
        let encoded = encode(&RlpItem::Bytes(payload.clone()));
        assert_eq!(encoded[0], 0xb8);
        assert_eq!(encoded[1], 56);
        assert_eq!(&encoded[2..], payload.as_slice());
        roundtrip(RlpItem::Bytes(payload));
    }

    #[test]
    fn test_set_theoretic_nesting() {
        // [ [], [[]], [ [], [[]] ] ]
        let item = RlpItem::List(vec![
            RlpItem::List(vec![]),
            RlpItem::List(vec![RlpItem::List(vec![])]),
            RlpItem::List(vec![
                RlpItem::List(vec![]),
                RlpItem::List(vec![RlpItem::List(vec![])]),
            ]),
        ]);
        let encoded = encode(&item);
        assert_eq!(encoded, vec![0xc7, 0xc0, 0xc1, 0xc0, 0xc3, 0xc0, 0xc1, 0xc0]);
        roundtrip(item);
    }

    #[test]
    fn test_roundtrip_nested_byte_strings() {
        roundtrip(RlpItem::List(vec![
            RlpItem::bytes(b"hello"),
            RlpItem::List(vec![RlpItem::bytes(&[0u8; 40]), RlpItem::u64(u64::MAX)]),
            RlpItem::Bytes(vec![0x7f]),
        ]));
    }

    #[test]
    fn test_reject_non_minimal_single_byte() {
        // 0x05 wrapped in a string header
        assert_eq!(
            decode(&[0x81, 0x05]),
            Err(CodecError::NonCanonical(
                "single byte below 0x80 must encode as itself"
            ))
        );
    }

    #[test]
    fn test_reject_long_form_for_short_payload() {
        let mut data = vec![0xb8, 0x37];
        data.extend_from_slice(&[0u8; 0x37]);
        assert!(matches!(
            decode(&data),
            Err(CodecError::NonCanonical(_))
        ));
    }

    #[test]
    fn test_reject_length_with_leading_zero() {
        let mut data = vec![0xb9, 0x00, 0x38];
        data.extend_from_slice(&[0u8; 0x38]);
        assert_eq!(
            decode(&data),
            Err(CodecError::NonCanonical("length has leading zero"))
        );
    }

    #[test]
    fn test_reject_truncation() {
        assert_eq!(decode(&[0x83, b'd', b'o']), Err(CodecError::RlpTruncated));
        assert_eq!(decode(&[]), Err(CodecError::RlpTruncated));
        assert_eq!(decode(&[0xb8]), Err(CodecError::RlpTruncated));
    }

    #[test]
    fn test_reject_trailing_bytes() {
        assert_eq!(
            decode(&[0x83, b'd', b'o', b'g', 0x00]),
            Err(CodecError::RlpTrailingBytes)
        );
    }

    #[test]
    fn test_uint_readback() {
        let item = RlpItem::u64(1024);
        assert_eq!(item.as_uint().unwrap(), U256::from(1024u64));

        // Leading zero inside an integer field is non-canonical
        let padded = RlpItem::Bytes(vec![0x00, 0x04, 0x00]);
        assert!(padded.as_uint().is_err());
    }
}
