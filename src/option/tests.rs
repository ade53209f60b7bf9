use super::{
    MpOption, OPTION_KIND,
    address::{AddAddress, Priority, RemoveAddress},
    dss::Dss,
    handshake::{Capable, Join},
};
use crate::mapping::Mapping;
use std::net::Ipv4Addr;

fn encode_to_vec(option: &MpOption) -> Vec<u8> {
    let mut buf = Vec::new();
    option.encode(&mut buf);
    assert_eq!(buf.len(), option.encoded_size());
    buf
}

fn roundtrip(option: MpOption) {
    let buf = encode_to_vec(&option);
    let mut cursor = &buf[..];
    let decoded = MpOption::decode(&mut cursor).unwrap();
    assert!(cursor.is_empty());
    assert_eq!(decoded, option);
}

#[test]
fn test_capable_wire_format() {
    let option = MpOption::Capable(Capable {
        key: 0x0102030405060708,
    });
    assert_eq!(
        encode_to_vec(&option),
        vec![OPTION_KIND, 11, 0x00, 1, 2, 3, 4, 5, 6, 7, 8]
    );
    roundtrip(option);
}

#[test]
fn test_join_wire_format() {
    let option = MpOption::Join(Join {
        token: 0xAABBCCDD,
        nonce: 0x11223344,
    });
    assert_eq!(
        encode_to_vec(&option),
        vec![OPTION_KIND, 11, 0x10, 0xAA, 0xBB, 0xCC, 0xDD, 0x11, 0x22, 0x33, 0x44]
    );
    roundtrip(option);
}

#[test]
fn test_dss_short_form() {
    let option = MpOption::Dss(Dss {
        data_sequence: 0x01020304,
        wide_dsn: false,
        subflow_sequence: 0x0A0B0C0D,
        data_level_length: 0x0102,
        checksum: None,
    });
    assert_eq!(
        encode_to_vec(&option),
        vec![
            OPTION_KIND, 13, 0x20, // subtype DSS, no flags
            0x01, 0x02, 0x03, 0x04, // 4-byte DSN
            0x0A, 0x0B, 0x0C, 0x0D, // subflow sequence
            0x01, 0x02, // data-level length
        ]
    );
    roundtrip(option);
}

#[test]
fn test_dss_wide_form_with_checksum() {
    let option = MpOption::Dss(Dss {
        data_sequence: 0x0102030405060708,
        wide_dsn: true,
        subflow_sequence: 1,
        data_level_length: 3000,
        checksum: Some(0xBEEF),
    });
    assert_eq!(
        encode_to_vec(&option),
        vec![
            OPTION_KIND, 19, 0x23, // subtype DSS, wide + checksum flags
            0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, // 8-byte DSN
            0x00, 0x00, 0x00, 0x01, // subflow sequence
            0x0B, 0xB8, // data-level length = 3000
            0xBE, 0xEF, // checksum
        ]
    );
    roundtrip(option);
}

#[test]
fn test_dss_mapping_conversion_picks_width() {
    let short = Dss::from_mapping(&Mapping::new(100, 500, 7));
    assert!(!short.wide_dsn);
    assert_eq!(short.to_mapping(), Mapping::new(100, 500, 7));

    let wide = Dss::from_mapping(&Mapping::new(u32::MAX as u64 + 1, 500, 7));
    assert!(wide.wide_dsn);
    assert_eq!(wide.to_mapping(), Mapping::new(u32::MAX as u64 + 1, 500, 7));
}

#[test]
fn test_add_address_wire_format() {
    let option = MpOption::AddAddress(AddAddress {
        address_id: 7,
        address: Ipv4Addr::new(192, 168, 1, 2),
        port: 8080,
    });
    assert_eq!(
        encode_to_vec(&option),
        vec![OPTION_KIND, 10, 0x30, 7, 192, 168, 1, 2, 0x1F, 0x90]
    );
    roundtrip(option);
}

#[test]
fn test_remove_address_wire_format() {
    let option = MpOption::RemoveAddress(RemoveAddress { address_id: 7 });
    assert_eq!(encode_to_vec(&option), vec![OPTION_KIND, 4, 0x40, 7]);
    roundtrip(option);
}

#[test]
fn test_priority_wire_format() {
    let backup = MpOption::Priority(Priority { backup: true });
    assert_eq!(encode_to_vec(&backup), vec![OPTION_KIND, 3, 0x51]);
    roundtrip(backup);

    let regular = MpOption::Priority(Priority { backup: false });
    assert_eq!(encode_to_vec(&regular), vec![OPTION_KIND, 3, 0x50]);
    roundtrip(regular);
}

#[test]
fn test_decode_all_multiple_options() {
    let options = vec![
        MpOption::Join(Join {
            token: 1,
            nonce: 2,
        }),
        MpOption::Priority(Priority { backup: true }),
    ];
    let mut buf = Vec::new();
    MpOption::encode_all(&options, &mut buf);
    assert_eq!(MpOption::decode_all(&buf).unwrap(), options);
}

#[test]
fn test_decode_rejects_malformed_input() {
    // Wrong kind byte.
    assert!(MpOption::decode_all(&[0x01, 3, 0x50]).is_none());
    // Declared length larger than the buffer.
    assert!(MpOption::decode_all(&[OPTION_KIND, 11, 0x00, 1, 2]).is_none());
    // Declared length shorter than the option's actual body.
    assert!(MpOption::decode_all(&[OPTION_KIND, 5, 0x00, 1, 2]).is_none());
    // Unknown subtype.
    assert!(MpOption::decode_all(&[OPTION_KIND, 3, 0xF0]).is_none());
    // Truncated final option after a valid one.
    let mut buf = Vec::new();
    MpOption::Priority(Priority { backup: false }).encode(&mut buf);
    buf.extend_from_slice(&[OPTION_KIND, 11]);
    assert!(MpOption::decode_all(&buf).is_none());
    // Trailing garbage beyond the declared length of a valid option.
    assert!(MpOption::decode_all(&[OPTION_KIND, 4, 0x50, 0xFF]).is_none());
}
