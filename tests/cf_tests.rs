//! Tests for the column family key codec
//!
//! These tests verify:
//! - Name parsing and display
//! - Physical key layout
//! - Prefix isolation and ordering between column families
//! - Decoding physical keys back to (cf, key)

use cfkv::cf::{key_with_cf, split_cf, strip_cf};
use cfkv::{ColumnFamily, KvError};

// =============================================================================
// Names
// =============================================================================

#[test]
fn test_parse_known_names() {
    assert_eq!("default".parse::<ColumnFamily>().unwrap(), ColumnFamily::Default);
    assert_eq!("lock".parse::<ColumnFamily>().unwrap(), ColumnFamily::Lock);
    assert_eq!(ColumnFamily::try_from("write").unwrap(), ColumnFamily::Write);
}

#[test]
fn test_parse_unknown_name() {
    let err = "raft".parse::<ColumnFamily>().unwrap_err();
    assert!(matches!(err, KvError::UnknownColumnFamily(ref name) if name == "raft"));

    // names are case sensitive
    assert!("Default".parse::<ColumnFamily>().is_err());
    assert!("".parse::<ColumnFamily>().is_err());
}

#[test]
fn test_display_round_trips_through_parse() {
    for cf in ColumnFamily::ALL {
        assert_eq!(cf.to_string().parse::<ColumnFamily>().unwrap(), cf);
    }
}

// =============================================================================
// Encoding
// =============================================================================

#[test]
fn test_physical_key_layout() {
    assert_eq!(key_with_cf(ColumnFamily::Default, b"k1"), b"default_k1".to_vec());
    assert_eq!(key_with_cf(ColumnFamily::Lock, b""), b"lock_".to_vec());
    assert_eq!(ColumnFamily::Write.prefix(), b"write_".to_vec());
}

#[test]
fn test_same_logical_key_differs_across_families() {
    let keys: Vec<Vec<u8>> = ColumnFamily::ALL
        .iter()
        .map(|cf| key_with_cf(*cf, b"k"))
        .collect();

    assert_ne!(keys[0], keys[1]);
    assert_ne!(keys[1], keys[2]);
    assert_ne!(keys[0], keys[2]);
}

#[test]
fn test_no_prefix_is_prefix_of_another() {
    for a in ColumnFamily::ALL {
        for b in ColumnFamily::ALL {
            if a != b {
                assert!(!b.prefix().starts_with(&a.prefix()), "{} vs {}", a, b);
            }
        }
    }
}

#[test]
fn test_order_preserved_within_family() {
    let a = key_with_cf(ColumnFamily::Default, b"a");
    let ab = key_with_cf(ColumnFamily::Default, b"ab");
    let b = key_with_cf(ColumnFamily::Default, b"b");

    assert!(a < ab);
    assert!(ab < b);
}

#[test]
fn test_binary_keys_are_preserved() {
    let key = [0u8, 255, b'_', 1];
    let physical = key_with_cf(ColumnFamily::Lock, &key);
    assert_eq!(strip_cf(ColumnFamily::Lock, &physical).unwrap(), &key);
}

// =============================================================================
// Decoding
// =============================================================================

#[test]
fn test_strip_wrong_family_fails() {
    let physical = key_with_cf(ColumnFamily::Write, b"k");
    assert!(strip_cf(ColumnFamily::Default, &physical).is_err());
    assert!(strip_cf(ColumnFamily::Write, b"write").is_err());
}

#[test]
fn test_split_recovers_family_and_key() {
    for cf in ColumnFamily::ALL {
        let physical = key_with_cf(cf, b"user:1");
        let (decoded_cf, key) = split_cf(&physical).unwrap();
        assert_eq!(decoded_cf, cf);
        assert_eq!(key, b"user:1");
    }

    assert!(split_cf(b"unknown_k").is_err());
}
