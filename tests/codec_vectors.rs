//! End-to-end codec vectors: selectors, checksums, ABI and RLP roundtrips

use std::str::FromStr;

use agent_wallet::codec::abi::{self, AbiType, AbiValue};
use agent_wallet::codec::rlp::{self, RlpItem};
use agent_wallet::types::Address;
use primitive_types::U256;

#[test]
fn selector_matches_known_erc20_constant() {
    assert_eq!(
        abi::selector("transfer(address,uint256)").unwrap(),
        [0xa9, 0x05, 0x9c, 0xbb]
    );
}

#[test]
fn selector_is_whitespace_and_name_insensitive() {
    let canonical = abi::selector("transfer(address,uint256)").unwrap();
    assert_eq!(
        abi::selector("  transfer( address to , uint256 amount )").unwrap(),
        canonical
    );
}

#[test]
fn tuple_roundtrip_preserves_values() {
    let types = vec![AbiType::parse("(address,string,uint256)").unwrap()];
    let address = Address::from_str("0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045").unwrap();
    let values = vec![AbiValue::Tuple(vec![
        AbiValue::Address(address),
        AbiValue::String("hello world".to_string()),
        AbiValue::Uint(U256::from(42u64)),
    ])];

    let encoded = abi::encode(&types, &values).unwrap();
    let decoded = abi::decode(&types, &encoded).unwrap();
    assert_eq!(decoded, values);

    // The decoded address compares equal regardless of textual casing
    match &decoded[0] {
        AbiValue::Tuple(fields) => {
            assert_eq!(fields[0].as_address().unwrap(), address);
        }
        other => panic!("expected tuple, got {other:?}"),
    }
}

#[test]
fn eip55_checksum_vector() {
    let address = Address::from_str("0xd8da6bf26964af9d7eed9e03e53415d37aa96045").unwrap();
    assert_eq!(
        address.to_checksum(),
        "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045"
    );
    // Idempotent: checksumming the checksum changes nothing
    assert_eq!(
        Address::from_str(&address.to_checksum()).unwrap().to_checksum(),
        address.to_checksum()
    );
}

#[test]
fn rlp_roundtrips_nested_lists() {
    let item = RlpItem::List(vec![
        RlpItem::bytes(b"cat"),
        RlpItem::List(vec![RlpItem::bytes(b"dog"), RlpItem::u64(1024)]),
        RlpItem::Bytes(vec![]),
        RlpItem::List(vec![]),
    ]);
    let encoded = rlp::encode(&item);
    assert_eq!(rlp::decode(&encoded).unwrap(), item);
}

#[test]
fn rlp_rejects_non_canonical_input() {
    // 0x05 must encode as itself, not as a one-byte string
    assert!(rlp::decode(&[0x81, 0x05]).is_err());
    // Truncated payload
    assert!(rlp::decode(&[0x83, b'd', b'o']).is_err());
    // Trailing garbage
    assert!(rlp::decode(&[0x80, 0x00]).is_err());
}

#[test]
fn nested_tuple_arrays_roundtrip() {
    let types = vec![AbiType::parse("((uint256,bytes)[],string)").unwrap()];
    let values = vec![AbiValue::Tuple(vec![
        AbiValue::Array(vec![
            AbiValue::Tuple(vec![
                AbiValue::Uint(U256::from(1u64)),
                AbiValue::Bytes(vec![0xde, 0xad]),
            ]),
            AbiValue::Tuple(vec![
                AbiValue::Uint(U256::MAX),
                AbiValue::Bytes(Vec::new()),
            ]),
        ]),
        AbiValue::String("outer".to_string()),
    ])];

    let encoded = abi::encode(&types, &values).unwrap();
    assert_eq!(abi::decode(&types, &encoded).unwrap(), values);
}
