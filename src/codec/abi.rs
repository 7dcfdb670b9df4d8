//! Solidity ABI encoding and decoding
//!
//! Runtime counterpart of `abi.encode`/`abi.decode`: types arrive as strings
//! (`"(address,uint256[])"`), values as [`AbiValue`] trees, and the encoder
//! produces the exact head/tail layout the Solidity ABI specification
//! defines. Also derives function selectors and event topics from signature
//! strings, so no 4-byte constant in the crate is ever hand-copied.
//!
//! Layout rules enforced here:
//! - static types occupy one or more whole 32-byte words, value left- or
//!   right-padded as the type dictates
//! - dynamic types contribute a 32-byte offset to the head, measured from the
//!   start of the enclosing tuple's data region, and their payload to the tail
//! - a tuple is dynamic iff any component is dynamic; static tuples and
//!   fixed arrays of static elements encode inline

use std::fmt;

use primitive_types::U256;

use super::CodecError;
use crate::hash::keccak256;
use crate::types::{Address, Hash};

// ============================================================================
// Types
// ============================================================================

/// Parsed Solidity type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiType {
    Address,
    Bool,
    /// `uintN`, N in 8..=256 and divisible by 8
    Uint(usize),
    /// `intN`, same constraint
    Int(usize),
    /// `bytesN`, N in 1..=32
    FixedBytes(usize),
    Bytes,
    String,
    /// `T[]`
    Array(Box<AbiType>),
    /// `T[N]`
    FixedArray(Box<AbiType>, usize),
    /// `(T1,...,Tn)`
    Tuple(Vec<AbiType>),
}

impl AbiType {
    /// Parse a Solidity type string (`"uint256"`, `"(address,bytes)[]"`, …)
    pub fn parse(input: &str) -> Result<Self, CodecError> {
        let input = input.trim();
        let unknown = || CodecError::UnknownType(input.to_string());

        // Array suffixes bind from the right: uint256[2][] is an unbounded
        // array of uint256[2].
        if let Some(body) = input.strip_suffix(']') {
            let open = body.rfind('[').ok_or_else(unknown)?;
            let elem = AbiType::parse(&body[..open])?;
            let size = body[open + 1..].trim();
            return if size.is_empty() {
                Ok(AbiType::Array(Box::new(elem)))
            } else {
                let n: usize = size.parse().map_err(|_| unknown())?;
                if n == 0 {
                    return Err(unknown());
                }
                Ok(AbiType::FixedArray(Box::new(elem), n))
            };
        }

        if let Some(body) = input.strip_prefix('(') {
            let body = body.strip_suffix(')').ok_or_else(unknown)?;
            let mut components = Vec::new();
            for part in split_top_level(body) {
                if part.trim().is_empty() {
                    continue;
                }
                components.push(AbiType::parse(part)?);
            }
            return Ok(AbiType::Tuple(components));
        }

        match input {
            "address" => Ok(AbiType::Address),
            "bool" => Ok(AbiType::Bool),
            "bytes" => Ok(AbiType::Bytes),
            "string" => Ok(AbiType::String),
            "uint" => Ok(AbiType::Uint(256)),
            "int" => Ok(AbiType::Int(256)),
            _ => {
                if let Some(bits) = input.strip_prefix("uint") {
                    let n: usize = bits.parse().map_err(|_| unknown())?;
                    if n == 0 || n > 256 || n % 8 != 0 {
                        return Err(unknown());
                    }
                    Ok(AbiType::Uint(n))
                } else if let Some(bits) = input.strip_prefix("int") {
                    let n: usize = bits.parse().map_err(|_| unknown())?;
                    if n == 0 || n > 256 || n % 8 != 0 {
                        return Err(unknown());
                    }
                    Ok(AbiType::Int(n))
                } else if let Some(len) = input.strip_prefix("bytes") {
                    let n: usize = len.parse().map_err(|_| unknown())?;
                    if n == 0 || n > 32 {
                        return Err(unknown());
                    }
                    Ok(AbiType::FixedBytes(n))
                } else {
                    Err(unknown())
                }
            }
        }
    }

    /// A type is dynamic iff its encoding length depends on the value
    pub fn is_dynamic(&self) -> bool {
        match self {
            AbiType::Bytes | AbiType::String | AbiType::Array(_) => true,
            AbiType::FixedArray(elem, _) => elem.is_dynamic(),
            AbiType::Tuple(components) => components.iter().any(AbiType::is_dynamic),
            _ => false,
        }
    }

    /// Encoded size of a static type; dynamic types contribute one offset word
    fn head_size(&self) -> usize {
        if self.is_dynamic() {
            return 32;
        }
        match self {
            AbiType::FixedArray(elem, n) => n * elem.head_size(),
            AbiType::Tuple(components) => components.iter().map(AbiType::head_size).sum(),
            _ => 32,
        }
    }
}

impl fmt::Display for AbiType {
    /// Canonical form used in signatures (`uint256`, `(address,bytes32)[]`)
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbiType::Address => write!(f, "address"),
            AbiType::Bool => write!(f, "bool"),
            AbiType::Uint(n) => write!(f, "uint{}", n),
            AbiType::Int(n) => write!(f, "int{}", n),
            AbiType::FixedBytes(n) => write!(f, "bytes{}", n),
            AbiType::Bytes => write!(f, "bytes"),
            AbiType::String => write!(f, "string"),
            AbiType::Array(elem) => write!(f, "{}[]", elem),
            AbiType::FixedArray(elem, n) => write!(f, "{}[{}]", elem, n),
            AbiType::Tuple(components) => {
                write!(f, "(")?;
                for (i, c) in components.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", c)?;
                }
                write!(f, ")")
            }
        }
    }
}

// ============================================================================
// Values
// ============================================================================

/// A value tree matching an [`AbiType`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiValue {
    Address(Address),
    Bool(bool),
    Uint(U256),
    /// Two's-complement 256-bit representation
    Int(U256),
    FixedBytes(Vec<u8>),
    Bytes(Vec<u8>),
    String(String),
    /// Used for both `T[]` and `T[N]`
    Array(Vec<AbiValue>),
    Tuple(Vec<AbiValue>),
}

impl AbiValue {
    /// Signed integer as its two's-complement word
    pub fn int_from_i128(value: i128) -> Self {
        if value >= 0 {
            AbiValue::Int(U256::from(value as u128))
        } else {
            // Sign-extend the 128-bit two's complement to 256 bits
            let low = U256::from(value as u128);
            let high = (U256::MAX >> 128usize) << 128usize;
            AbiValue::Int(low | high)
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            AbiValue::Address(_) => "address",
            AbiValue::Bool(_) => "bool",
            AbiValue::Uint(_) => "uint",
            AbiValue::Int(_) => "int",
            AbiValue::FixedBytes(_) => "fixed bytes",
            AbiValue::Bytes(_) => "bytes",
            AbiValue::String(_) => "string",
            AbiValue::Array(_) => "array",
            AbiValue::Tuple(_) => "tuple",
        }
    }

    pub fn as_uint(&self) -> Option<U256> {
        match self {
            AbiValue::Uint(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_address(&self) -> Option<Address> {
        match self {
            AbiValue::Address(a) => Some(*a),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            AbiValue::Bytes(b) | AbiValue::FixedBytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AbiValue::String(s) => Some(s),
            _ => None,
        }
    }
}

// ============================================================================
// Encoding
// ============================================================================

/// ABI-encode a value tuple; the inverse of [`decode`]
pub fn encode(types: &[AbiType], values: &[AbiValue]) -> Result<Vec<u8>, CodecError> {
    if types.len() != values.len() {
        return Err(CodecError::TupleArityMismatch {
            expected: types.len(),
            got: values.len(),
        });
    }
    encode_tuple(types, values)
}

fn encode_tuple(types: &[AbiType], values: &[AbiValue]) -> Result<Vec<u8>, CodecError> {
    let head_len: usize = types.iter().map(AbiType::head_size).sum();
    let mut head = Vec::with_capacity(head_len);
    let mut tail: Vec<u8> = Vec::new();

    for (ty, value) in types.iter().zip(values) {
        if ty.is_dynamic() {
            head.extend_from_slice(&uint_word(U256::from(head_len + tail.len())));
            tail.extend_from_slice(&encode_value(ty, value)?);
        } else {
            head.extend_from_slice(&encode_value(ty, value)?);
        }
    }

    head.extend_from_slice(&tail);
    Ok(head)
}

/// Encode a single value as its type dictates (no enclosing tuple head)
pub fn encode_value(ty: &AbiType, value: &AbiValue) -> Result<Vec<u8>, CodecError> {
    let mismatch = || CodecError::TypeMismatch {
        expected: ty.to_string(),
        got: value.kind().to_string(),
    };

    match (ty, value) {
        (AbiType::Address, AbiValue::Address(addr)) => Ok(addr.as_word().to_vec()),

        (AbiType::Bool, AbiValue::Bool(b)) => {
            let mut word = [0u8; 32];
            word[31] = u8::from(*b);
            Ok(word.to_vec())
        }

        (AbiType::Uint(bits), AbiValue::Uint(v)) => {
            if *bits < 256 && !(*v >> *bits).is_zero() {
                return Err(CodecError::IntegerOutOfRange { ty: ty.to_string() });
            }
            Ok(uint_word(*v).to_vec())
        }

        (AbiType::Int(bits), AbiValue::Int(v)) => {
            if *bits < 256 {
                let fits = if v.bit(255) {
                    ((!*v) >> (*bits - 1)).is_zero()
                } else {
                    (*v >> (*bits - 1)).is_zero()
                };
                if !fits {
                    return Err(CodecError::IntegerOutOfRange { ty: ty.to_string() });
                }
            }
            Ok(uint_word(*v).to_vec())
        }

        (AbiType::FixedBytes(n), AbiValue::FixedBytes(bytes)) => {
            if bytes.len() != *n {
                return Err(CodecError::FixedBytesLength {
                    expected: *n,
                    got: bytes.len(),
                });
            }
            let mut word = [0u8; 32];
            word[..bytes.len()].copy_from_slice(bytes);
            Ok(word.to_vec())
        }

        (AbiType::Bytes, AbiValue::Bytes(bytes)) => Ok(length_prefixed(bytes)),
        (AbiType::String, AbiValue::String(s)) => Ok(length_prefixed(s.as_bytes())),

        (AbiType::Array(elem), AbiValue::Array(values)) => {
            let elem_types = vec![(**elem).clone(); values.len()];
            let mut out = uint_word(U256::from(values.len())).to_vec();
            out.extend_from_slice(&encode_tuple(&elem_types, values)?);
            Ok(out)
        }

        (AbiType::FixedArray(elem, n), AbiValue::Array(values)) => {
            if values.len() != *n {
                return Err(CodecError::ArrayLengthMismatch {
                    expected: *n,
                    got: values.len(),
                });
            }
            let elem_types = vec![(**elem).clone(); *n];
            encode_tuple(&elem_types, values)
        }

        (AbiType::Tuple(components), AbiValue::Tuple(values)) => {
            if components.len() != values.len() {
                return Err(CodecError::TupleArityMismatch {
                    expected: components.len(),
                    got: values.len(),
                });
            }
            encode_tuple(components, values)
        }

        _ => Err(mismatch()),
    }
}

fn uint_word(value: U256) -> [u8; 32] {
    let mut word = [0u8; 32];
    value.to_big_endian(&mut word);
    word
}

fn length_prefixed(payload: &[u8]) -> Vec<u8> {
    let mut out = uint_word(U256::from(payload.len())).to_vec();
    out.extend_from_slice(payload);
    let pad = (32 - payload.len() % 32) % 32;
    out.extend(std::iter::repeat(0u8).take(pad));
    out
}

// ============================================================================
// Decoding
// ============================================================================

/// Decode an ABI-encoded tuple back into values
pub fn decode(types: &[AbiType], data: &[u8]) -> Result<Vec<AbiValue>, CodecError> {
    decode_tuple(types, data)
}

fn decode_tuple(types: &[AbiType], region: &[u8]) -> Result<Vec<AbiValue>, CodecError> {
    let mut values = Vec::with_capacity(types.len());
    let mut pos = 0usize;

    for ty in types {
        if ty.is_dynamic() {
            let offset = read_usize(region, pos)?;
            if offset > region.len() {
                return Err(CodecError::OffsetOutOfBounds {
                    offset,
                    len: region.len(),
                });
            }
            values.push(decode_dynamic(ty, region, offset)?);
            pos += 32;
        } else {
            let size = ty.head_size();
            let slice = region
                .get(pos..pos + size)
                .ok_or(CodecError::Truncated {
                    needed: size,
                    offset: pos,
                    len: region.len(),
                })?;
            values.push(decode_static(ty, slice)?);
            pos += size;
        }
    }

    Ok(values)
}

fn decode_static(ty: &AbiType, data: &[u8]) -> Result<AbiValue, CodecError> {
    match ty {
        AbiType::Address => {
            let mut word = [0u8; 32];
            word.copy_from_slice(&data[..32]);
            Ok(AbiValue::Address(Address::from_word(&word)))
        }
        AbiType::Bool => Ok(AbiValue::Bool(data[..32].iter().any(|&b| b != 0))),
        AbiType::Uint(_) => Ok(AbiValue::Uint(U256::from_big_endian(&data[..32]))),
        AbiType::Int(_) => Ok(AbiValue::Int(U256::from_big_endian(&data[..32]))),
        AbiType::FixedBytes(n) => Ok(AbiValue::FixedBytes(data[..*n].to_vec())),
        AbiType::FixedArray(elem, n) => {
            let elem_types = vec![(**elem).clone(); *n];
            Ok(AbiValue::Array(decode_tuple(&elem_types, data)?))
        }
        AbiType::Tuple(components) => Ok(AbiValue::Tuple(decode_tuple(components, data)?)),
        _ => unreachable!("dynamic type routed to decode_dynamic"),
    }
}

fn decode_dynamic(ty: &AbiType, region: &[u8], offset: usize) -> Result<AbiValue, CodecError> {
    match ty {
        AbiType::Bytes | AbiType::String => {
            let len = read_usize(region, offset)?;
            let start = offset.checked_add(32).ok_or(CodecError::OffsetOutOfBounds {
                offset,
                len: region.len(),
            })?;
            let end = start.checked_add(len).ok_or(CodecError::OffsetOutOfBounds {
                offset,
                len: region.len(),
            })?;
            let payload = region.get(start..end).ok_or(CodecError::Truncated {
                needed: len,
                offset: start,
                len: region.len(),
            })?;
            if matches!(ty, AbiType::String) {
                let s = String::from_utf8(payload.to_vec()).map_err(|_| {
                    CodecError::TypeMismatch {
                        expected: "utf-8 string".to_string(),
                        got: "bytes".to_string(),
                    }
                })?;
                Ok(AbiValue::String(s))
            } else {
                Ok(AbiValue::Bytes(payload.to_vec()))
            }
        }

        AbiType::Array(elem) => {
            let len = read_usize(region, offset)?;
            let inner = region.get(offset + 32..).ok_or(CodecError::Truncated {
                needed: 32,
                offset,
                len: region.len(),
            })?;
            // Every element contributes at least one word to the head, which
            // bounds the claimed length before any allocation happens.
            if len > inner.len() / 32 {
                return Err(CodecError::Truncated {
                    needed: len * 32,
                    offset: offset + 32,
                    len: region.len(),
                });
            }
            let elem_types = vec![(**elem).clone(); len];
            Ok(AbiValue::Array(decode_tuple(&elem_types, inner)?))
        }

        AbiType::FixedArray(elem, n) => {
            let inner = region.get(offset..).ok_or(CodecError::OffsetOutOfBounds {
                offset,
                len: region.len(),
            })?;
            let elem_types = vec![(**elem).clone(); *n];
            Ok(AbiValue::Array(decode_tuple(&elem_types, inner)?))
        }

        AbiType::Tuple(components) => {
            let inner = region.get(offset..).ok_or(CodecError::OffsetOutOfBounds {
                offset,
                len: region.len(),
            })?;
            Ok(AbiValue::Tuple(decode_tuple(components, inner)?))
        }

        _ => unreachable!("static type routed to decode_static"),
    }
}

fn read_usize(region: &[u8], pos: usize) -> Result<usize, CodecError> {
    let word = region.get(pos..pos + 32).ok_or(CodecError::Truncated {
        needed: 32,
        offset: pos,
        len: region.len(),
    })?;
    let value = U256::from_big_endian(word);
    if value > U256::from(usize::MAX) {
        return Err(CodecError::OffsetOutOfBounds {
            offset: usize::MAX,
            len: region.len(),
        });
    }
    Ok(value.as_usize())
}

// ============================================================================
// Signatures, selectors, topics
// ============================================================================

/// Canonicalize a function or event signature
///
/// Strips parameter names, whitespace, and data-location keywords; expands
/// `uint`/`int` shorthands; recurses through tuple components; preserves
/// array suffixes.
pub fn normalize_signature(signature: &str) -> Result<String, CodecError> {
    let invalid = || CodecError::InvalidSignature(signature.to_string());

    let open = signature.find('(').ok_or_else(invalid)?;
    let close = signature.rfind(')').ok_or_else(invalid)?;
    if close < open || !signature[close + 1..].trim().is_empty() {
        return Err(invalid());
    }

    let name = signature[..open].trim();
    if name.is_empty()
        || !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
    {
        return Err(invalid());
    }

    let body = &signature[open + 1..close];
    let mut canonical = Vec::new();
    for part in split_top_level(body) {
        if part.trim().is_empty() {
            continue;
        }
        canonical.push(normalize_param(part)?);
    }

    Ok(format!("{}({})", name, canonical.join(",")))
}

fn normalize_param(param: &str) -> Result<String, CodecError> {
    let param = param.trim();
    let invalid = || CodecError::InvalidSignature(param.to_string());

    if let Some(rest) = param.strip_prefix('(') {
        // Find the matching close paren
        let mut depth = 1usize;
        let mut close = None;
        for (i, c) in rest.char_indices() {
            match c {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        close = Some(i);
                        break;
                    }
                }
                _ => {}
            }
        }
        let close = close.ok_or_else(invalid)?;

        let mut components = Vec::new();
        for part in split_top_level(&rest[..close]) {
            if part.trim().is_empty() {
                continue;
            }
            components.push(normalize_param(part)?);
        }

        // Array suffixes directly after the tuple; the remainder (component
        // name, data location) is dropped.
        let mut suffix = String::new();
        let mut chars = rest[close + 1..].chars().peekable();
        loop {
            while chars.peek().is_some_and(|c| c.is_whitespace()) {
                chars.next();
            }
            if chars.peek() != Some(&'[') {
                break;
            }
            for c in chars.by_ref() {
                if c.is_whitespace() {
                    continue;
                }
                suffix.push(c);
                if c == ']' {
                    break;
                }
            }
        }

        let ty = format!("({}){}", components.join(","), suffix);
        AbiType::parse(&ty)?;
        Ok(ty)
    } else {
        // "uint256 amount" / "bytes memory data": the type is the first
        // token; bracket-only tokens after it belong to the type.
        let mut tokens = param.split_whitespace();
        let mut ty = tokens.next().ok_or_else(invalid)?.to_string();
        for token in tokens {
            if token.starts_with('[') {
                ty.push_str(token);
            } else {
                break;
            }
        }
        Ok(AbiType::parse(&ty)?.to_string())
    }
}

fn split_top_level(input: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (i, c) in input.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&input[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&input[start..]);
    parts
}

/// First four bytes of the keccak of the canonical signature
pub fn selector(signature: &str) -> Result<[u8; 4], CodecError> {
    let canonical = normalize_signature(signature)?;
    let digest = keccak256(canonical.as_bytes());
    Ok([digest[0], digest[1], digest[2], digest[3]])
}

/// Full keccak of the canonical signature (topic 0 of an event)
pub fn event_topic(signature: &str) -> Result<Hash, CodecError> {
    let canonical = normalize_signature(signature)?;
    Ok(Hash(keccak256(canonical.as_bytes())))
}

/// Parameter types of a signature, in declaration order
pub fn signature_types(signature: &str) -> Result<Vec<AbiType>, CodecError> {
    let canonical = normalize_signature(signature)?;
    let open = canonical.find('(').expect("canonical form");
    let body = &canonical[open + 1..canonical.len() - 1];
    let mut types = Vec::new();
    for part in split_top_level(body) {
        if part.is_empty() {
            continue;
        }
        types.push(AbiType::parse(part)?);
    }
    Ok(types)
}

/// Selector-prefixed calldata for a function invocation
pub fn encode_call(signature: &str, values: &[AbiValue]) -> Result<Vec<u8>, CodecError> {
    let mut out = selector(signature)?.to_vec();
    let types = signature_types(signature)?;
    out.extend_from_slice(&encode(&types, values)?);
    Ok(out)
}

/// Decode a log's indexed parameters from its topic slots
///
/// `topics` excludes topic 0 (the event signature hash). Dynamic indexed
/// values only exist as hashes of their payload on the wire, so they decode
/// as 32-byte `FixedBytes` stand-ins.
pub fn decode_topics(types: &[AbiType], topics: &[Hash]) -> Result<Vec<AbiValue>, CodecError> {
    if types.len() != topics.len() {
        return Err(CodecError::TopicCountMismatch {
            expected: types.len(),
            got: topics.len(),
        });
    }
    types
        .iter()
        .zip(topics)
        .map(|(ty, topic)| {
            if ty.is_dynamic() || ty.head_size() != 32 {
                Ok(AbiValue::FixedBytes(topic.0.to_vec()))
            } else {
                decode_static(ty, &topic.0)
            }
        })
        .collect()
}

/// Encode an indexed event parameter into its topic slot
///
/// Values of dynamic type occupy the slot as the keccak of their encoding;
/// everything else as its padded word (multi-word statics are hashed too,
/// matching how the EVM indexes structs).
pub fn encode_topic(ty: &AbiType, value: &AbiValue) -> Result<Hash, CodecError> {
    let encoded = encode_value(ty, value)?;
    if ty.is_dynamic() {
        // Strip the length prefix/padding question entirely: topics hash the
        // tight encoding of the value itself.
        let tight = match value {
            AbiValue::Bytes(b) => b.clone(),
            AbiValue::String(s) => s.as_bytes().to_vec(),
            _ => encoded,
        };
        Ok(Hash(keccak256(&tight)))
    } else if encoded.len() == 32 {
        let mut word = [0u8; 32];
        word.copy_from_slice(&encoded);
        Ok(Hash(word))
    } else {
        Ok(Hash(keccak256(&encoded)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> Address {
        Address::from_hex(s).unwrap()
    }

    fn types(names: &[&str]) -> Vec<AbiType> {
        names.iter().map(|s| AbiType::parse(s).unwrap()).collect()
    }

    #[test]
    fn test_parse_display_roundtrip() {
        for ty_str in [
            "address",
            "uint256",
            "int8",
            "bytes32",
            "bytes",
            "string",
            "uint256[]",
            "uint256[2][]",
            "(address,uint256)",
            "(address,(bytes,string)[])[3]",
        ] {
            let ty = AbiType::parse(ty_str).unwrap();
            assert_eq!(ty.to_string(), *ty_str);
        }
        // Shorthands canonicalize
        assert_eq!(AbiType::parse("uint").unwrap().to_string(), "uint256");
        assert_eq!(AbiType::parse("int").unwrap().to_string(), "int256");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in ["uint7", "uint264", "bytes0", "bytes33", "floof", "uint256[0]", "address[-1]"] {
            assert!(AbiType::parse(bad).is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn test_dynamic_classification() {
        assert!(!AbiType::parse("(address,uint256)").unwrap().is_dynamic());
        assert!(AbiType::parse("(address,bytes)").unwrap().is_dynamic());
        assert!(!AbiType::parse("uint256[4]").unwrap().is_dynamic());
        assert!(AbiType::parse("string[4]").unwrap().is_dynamic());
        assert!(AbiType::parse("uint256[]").unwrap().is_dynamic());
    }

    #[test]
    fn test_encode_uint() {
        let out = encode(&types(&["uint256"]), &[AbiValue::Uint(U256::from(42u64))]).unwrap();
        let mut expected = [0u8; 32];
        expected[31] = 42;
        assert_eq!(out, expected);
    }

    #[test]
    fn test_encode_uint_range_check() {
        let out = encode(&types(&["uint8"]), &[AbiValue::Uint(U256::from(256u64))]);
        assert!(matches!(out, Err(CodecError::IntegerOutOfRange { .. })));
    }

    #[test]
    fn test_encode_int_range_check() {
        // -1 fits any int width
        let minus_one = AbiValue::int_from_i128(-1);
        assert!(encode(&types(&["int8"]), &[minus_one.clone()]).is_ok());
        // -129 does not fit int8
        let too_small = AbiValue::int_from_i128(-129);
        assert!(matches!(
            encode(&types(&["int8"]), &[too_small]),
            Err(CodecError::IntegerOutOfRange { .. })
        ));
        // 127 fits, 128 does not
        assert!(encode(&types(&["int8"]), &[AbiValue::int_from_i128(127)]).is_ok());
        assert!(encode(&types(&["int8"]), &[AbiValue::int_from_i128(128)]).is_err());
    }

    #[test]
    fn test_encode_string() {
        let out = encode(
            &types(&["string"]),
            &[AbiValue::String("hello world".to_string())],
        )
        .unwrap();
        // offset word, length word, padded payload
        assert_eq!(out.len(), 96);
        assert_eq!(U256::from_big_endian(&out[..32]), U256::from(0x20u64));
        assert_eq!(U256::from_big_endian(&out[32..64]), U256::from(11u64));
        assert_eq!(&out[64..75], b"hello world");
        assert!(out[75..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_solidity_docs_vector() {
        // f(uint256,uint32[],bytes10,bytes) with (0x123, [0x456, 0x789],
        // "1234567890", "Hello, world!"), the worked example from the ABI
        // specification.
        let sig = "f(uint256,uint32[],bytes10,bytes)";
        assert_eq!(selector(sig).unwrap(), [0x8b, 0xe6, 0x52, 0x46]);

        let encoded = encode(
            &signature_types(sig).unwrap(),
            &[
                AbiValue::Uint(U256::from(0x123u64)),
                AbiValue::Array(vec![
                    AbiValue::Uint(U256::from(0x456u64)),
                    AbiValue::Uint(U256::from(0x789u64)),
                ]),
                AbiValue::FixedBytes(b"1234567890".to_vec()),
                AbiValue::Bytes(b"Hello, world!".to_vec()),
            ],
        )
        .unwrap();

        let expected = hex::decode(concat!(
            "0000000000000000000000000000000000000000000000000000000000000123",
            "0000000000000000000000000000000000000000000000000000000000000080",
            "3132333435363738393000000000000000000000000000000000000000000000",
            "00000000000000000000000000000000000000000000000000000000000000e0",
            "0000000000000000000000000000000000000000000000000000000000000002",
            "0000000000000000000000000000000000000000000000000000000000000456",
            "0000000000000000000000000000000000000000000000000000000000000789",
            "000000000000000000000000000000000000000000000000000000000000000d",
            "48656c6c6f2c20776f726c642100000000000000000000000000000000000000",
        ))
        .unwrap();
        assert_eq!(encoded, expected);
    }

    #[test]
    fn test_tuple_roundtrip() {
        let ty = types(&["(address,string,uint256)"]);
        let value = AbiValue::Tuple(vec![
            AbiValue::Address(addr("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266")),
            AbiValue::String("hello world".to_string()),
            AbiValue::Uint(U256::from(42u64)),
        ]);
        let encoded = encode(&ty, &[value.clone()]).unwrap();
        let decoded = decode(&ty, &encoded).unwrap();
        assert_eq!(decoded, vec![value]);
    }

    #[test]
    fn test_static_tuple_encodes_inline() {
        let ty = types(&["(uint256,address)", "uint256"]);
        let encoded = encode(
            &ty,
            &[
                AbiValue::Tuple(vec![
                    AbiValue::Uint(U256::from(1u64)),
                    AbiValue::Address(Address::ZERO),
                ]),
                AbiValue::Uint(U256::from(2u64)),
            ],
        )
        .unwrap();
        // No offsets anywhere: 3 words inline
        assert_eq!(encoded.len(), 96);
        assert_eq!(U256::from_big_endian(&encoded[..32]), U256::from(1u64));
        assert_eq!(U256::from_big_endian(&encoded[64..96]), U256::from(2u64));
    }

    #[test]
    fn test_nested_dynamic_tuple_array_roundtrip() {
        let ty = types(&["(uint256,(string,bytes)[])[]"]);
        let value = AbiValue::Array(vec![
            AbiValue::Tuple(vec![
                AbiValue::Uint(U256::from(7u64)),
                AbiValue::Array(vec![
                    AbiValue::Tuple(vec![
                        AbiValue::String("ab".to_string()),
                        AbiValue::Bytes(vec![1, 2, 3]),
                    ]),
                    AbiValue::Tuple(vec![
                        AbiValue::String(String::new()),
                        AbiValue::Bytes(Vec::new()),
                    ]),
                ]),
            ]),
            AbiValue::Tuple(vec![AbiValue::Uint(U256::zero()), AbiValue::Array(vec![])]),
        ]);
        let encoded = encode(&ty, &[value.clone()]).unwrap();
        let decoded = decode(&ty, &encoded).unwrap();
        assert_eq!(decoded, vec![value]);
    }

    #[test]
    fn test_fixed_array_roundtrip() {
        let ty = types(&["uint256[3]", "bool"]);
        let values = vec![
            AbiValue::Array(vec![
                AbiValue::Uint(U256::from(1u64)),
                AbiValue::Uint(U256::from(2u64)),
                AbiValue::Uint(U256::from(3u64)),
            ]),
            AbiValue::Bool(true),
        ];
        let encoded = encode(&ty, &values).unwrap();
        assert_eq!(encoded.len(), 128); // inline, no offsets
        assert_eq!(decode(&ty, &encoded).unwrap(), values);
    }

    #[test]
    fn test_decode_rejects_out_of_range_offset() {
        let ty = types(&["bytes"]);
        let mut data = [0u8; 32];
        data[31] = 0xff; // offset 255 in a 32-byte region
        assert!(matches!(
            decode(&ty, &data),
            Err(CodecError::OffsetOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_decode_rejects_truncated_payload() {
        let ty = types(&["uint256", "uint256"]);
        let data = [0u8; 32];
        assert!(matches!(
            decode(&ty, &data),
            Err(CodecError::Truncated { .. })
        ));
    }

    #[test]
    fn test_decode_rejects_oversized_array_claim() {
        let ty = types(&["uint256[]"]);
        let mut data = Vec::new();
        data.extend_from_slice(&uint_word(U256::from(0x20u64)));
        data.extend_from_slice(&uint_word(U256::from(1_000_000u64))); // claimed len
        assert!(decode(&ty, &data).is_err());
    }

    #[test]
    fn test_encode_mismatched_value() {
        let out = encode(&types(&["address"]), &[AbiValue::Bool(true)]);
        assert!(matches!(out, Err(CodecError::TypeMismatch { .. })));

        let out = encode(
            &types(&["uint256[2]"]),
            &[AbiValue::Array(vec![AbiValue::Uint(U256::one())])],
        );
        assert!(matches!(out, Err(CodecError::ArrayLengthMismatch { .. })));
    }

    #[test]
    fn test_selector_known_values() {
        assert_eq!(
            selector("transfer(address,uint256)").unwrap(),
            [0xa9, 0x05, 0x9c, 0xbb]
        );
        assert_eq!(
            selector("balanceOf(address)").unwrap(),
            [0x70, 0xa0, 0x82, 0x31]
        );
        assert_eq!(
            selector("approve(address,uint256)").unwrap(),
            [0x09, 0x5e, 0xa7, 0xb3]
        );
        assert_eq!(
            selector("allowance(address,address)").unwrap(),
            [0xdd, 0x62, 0xed, 0x3e]
        );
    }

    #[test]
    fn test_selector_ignores_names_and_whitespace() {
        let canonical = selector("transfer(address,uint256)").unwrap();
        assert_eq!(
            selector("  transfer( address to , uint256 amount )").unwrap(),
            canonical
        );
        assert_eq!(
            selector("transfer(address recipient, uint256 rawAmount)").unwrap(),
            canonical
        );
    }

    #[test]
    fn test_selector_expands_shorthands_and_locations() {
        assert_eq!(
            selector("f(uint x, bytes memory data)").unwrap(),
            selector("f(uint256,bytes)").unwrap()
        );
    }

    #[test]
    fn test_normalize_nested_tuple_with_names() {
        assert_eq!(
            normalize_signature("swap((address tokenIn, uint256 amount)[] legs, bool exact)")
                .unwrap(),
            "swap((address,uint256)[],bool)"
        );
    }

    #[test]
    fn test_transfer_event_topic() {
        assert_eq!(
            event_topic("Transfer(address,address,uint256)").unwrap().to_hex(),
            "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"
        );
    }

    #[test]
    fn test_encode_topic_static_and_dynamic() {
        let a = addr("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
        let topic = encode_topic(&AbiType::Address, &AbiValue::Address(a)).unwrap();
        assert_eq!(&topic.0[12..], a.as_bytes());
        assert_eq!(&topic.0[..12], &[0u8; 12]);

        let dynamic = encode_topic(
            &AbiType::String,
            &AbiValue::String("hello".to_string()),
        )
        .unwrap();
        assert_eq!(dynamic.0, keccak256(b"hello"));
    }

    #[test]
    fn test_decode_topics() {
        let a = addr("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
        let mut amount_word = [0u8; 32];
        amount_word[31] = 9;
        let decoded = decode_topics(
            &[AbiType::Address, AbiType::Uint(256)],
            &[Hash(a.as_word()), Hash(amount_word)],
        )
        .unwrap();
        assert_eq!(decoded[0].as_address(), Some(a));
        assert_eq!(decoded[1].as_uint(), Some(U256::from(9u64)));

        // Count mismatch is rejected
        let err = decode_topics(&[AbiType::Address], &[]).unwrap_err();
        assert!(matches!(err, CodecError::TopicCountMismatch { .. }));

        // Indexed strings surface as their payload hash
        let hashed = decode_topics(&[AbiType::String], &[Hash([0x11; 32])]).unwrap();
        assert_eq!(hashed[0], AbiValue::FixedBytes(vec![0x11; 32]));
    }

    #[test]
    fn test_encode_call_transfer() {
        let data = encode_call(
            "transfer(address,uint256)",
            &[
                AbiValue::Address(addr("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266")),
                AbiValue::Uint(U256::from(1_000_000u64)),
            ],
        )
        .unwrap();
        assert_eq!(&data[..4], &[0xa9, 0x05, 0x9c, 0xbb]);
        assert_eq!(data.len(), 4 + 64);
    }
}
