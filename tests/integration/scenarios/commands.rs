//! Command surface integration tests
//!
//! Every test runs against its own mock server, in both protocol modes unless
//! the behavior is specific to one of them.

use crate::integration::{pool_for, unique_key, MockMemcached};
use mcpool::{CounterOptions, ErrorKind, Value, BYTES_FLAG, TEXT_FLAG};
use rstest::rstest;
use std::time::{Duration, Instant};

// ============================================================================
// Fetch and store
// ============================================================================

#[rstest]
#[case::binary(true)]
#[case::text(false)]
fn test_get_after_flush_is_absent(#[case] binary: bool) {
    let mock = MockMemcached::start().unwrap();
    let pool = pool_for(&mock, binary, 2);
    let mut conn = pool.connection().unwrap();

    conn.set("present", "value", 0).unwrap();
    conn.flush(0).unwrap();

    assert_eq!(conn.get("present").unwrap(), None);
    for i in 0..5 {
        assert_eq!(conn.get(&unique_key(&format!("never-{}", i))).unwrap(), None);
    }
}

#[rstest]
#[case::binary(true)]
#[case::text(false)]
fn test_set_get_round_trip(#[case] binary: bool) {
    let mock = MockMemcached::start().unwrap();
    let pool = pool_for(&mock, binary, 2);
    let mut conn = pool.connection().unwrap();

    let text_key = unique_key("text");
    conn.set(&text_key, "grüße, memcached", 0).unwrap();
    assert_eq!(
        conn.get(&text_key).unwrap(),
        Some(Value::Text("grüße, memcached".to_string()))
    );

    let bytes_key = unique_key("bytes");
    let payload: Vec<u8> = (0..=255u8).collect();
    conn.set(&bytes_key, payload.clone(), 0).unwrap();
    assert_eq!(conn.get_bytes(&bytes_key).unwrap(), Some(payload));

    // Flags land on the server as stored
    assert_eq!(mock.stored(&text_key).unwrap().1, TEXT_FLAG);
    assert_eq!(mock.stored(&bytes_key).unwrap().1, BYTES_FLAG);
}

#[rstest]
#[case::binary(true)]
#[case::text(false)]
fn test_empty_values_round_trip(#[case] binary: bool) {
    let mock = MockMemcached::start().unwrap();
    let pool = pool_for(&mock, binary, 1);
    let mut conn = pool.connection().unwrap();

    conn.set("empty-text", "", 0).unwrap();
    conn.set("empty-bytes", Vec::new(), 0).unwrap();
    assert_eq!(conn.get_string("empty-text").unwrap(), Some(String::new()));
    assert_eq!(conn.get_bytes("empty-bytes").unwrap(), Some(Vec::new()));
}

#[rstest]
#[case::binary(true)]
#[case::text(false)]
fn test_undecodable_values_read_as_absent(#[case] binary: bool) {
    let mock = MockMemcached::start().unwrap();
    mock.put_raw("unknown-flags", b"data", 42);
    mock.put_raw("bad-utf8", &[0xff, 0xfe, 0xfd], TEXT_FLAG);

    let pool = pool_for(&mock, binary, 1);
    let mut conn = pool.connection().unwrap();
    assert_eq!(conn.get("unknown-flags").unwrap(), None);
    assert_eq!(conn.get("bad-utf8").unwrap(), None);
}

#[rstest]
#[case::binary(true)]
#[case::text(false)]
fn test_typed_accessors_filter_variant(#[case] binary: bool) {
    let mock = MockMemcached::start().unwrap();
    let pool = pool_for(&mock, binary, 1);
    let mut conn = pool.connection().unwrap();

    conn.set("as-text", "hello", 0).unwrap();
    assert_eq!(conn.get_bytes("as-text").unwrap(), None);
    assert_eq!(conn.get_string("as-text").unwrap(), Some("hello".to_string()));
}

#[rstest]
#[case::binary(true)]
#[case::text(false)]
fn test_set_with_expiry(#[case] binary: bool) {
    let mock = MockMemcached::start().unwrap();
    let pool = pool_for(&mock, binary, 1);
    let mut conn = pool.connection().unwrap();

    let key = unique_key("expiring");
    let start = Instant::now();
    conn.set(&key, "short-lived", 1).unwrap();
    assert_eq!(conn.get_string(&key).unwrap(), Some("short-lived".to_string()));

    std::thread::sleep(Duration::from_millis(1100));
    let mut gone = false;
    while start.elapsed() < Duration::from_secs(5) {
        if conn.get(&key).unwrap().is_none() {
            gone = true;
            break;
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    assert!(gone, "key should expire after one second");
}

// ============================================================================
// Conditional stores
// ============================================================================

#[rstest]
#[case::binary(true, "CONNECTION DATA EXISTS", ErrorKind::AlreadyExists)]
#[case::text(false, "NOT STORED", ErrorKind::NotStored)]
fn test_add_semantics(#[case] binary: bool, #[case] message: &str, #[case] kind: ErrorKind) {
    let mock = MockMemcached::start().unwrap();
    let pool = pool_for(&mock, binary, 1);
    let mut conn = pool.connection().unwrap();

    let key = unique_key("add");
    conn.add(&key, "first", 0).unwrap();
    assert_eq!(conn.get_string(&key).unwrap(), Some("first".to_string()));

    let err = conn.add(&key, "second", 0).unwrap_err();
    assert_eq!(err.message(), message);
    assert_eq!(err.kind(), kind);
    assert_eq!(conn.get_string(&key).unwrap(), Some("first".to_string()));
}

#[rstest]
#[case::binary(true, "NOT FOUND", ErrorKind::NotFound)]
#[case::text(false, "NOT STORED", ErrorKind::NotStored)]
fn test_replace_semantics(#[case] binary: bool, #[case] message: &str, #[case] kind: ErrorKind) {
    let mock = MockMemcached::start().unwrap();
    let pool = pool_for(&mock, binary, 1);
    let mut conn = pool.connection().unwrap();

    let key = unique_key("replace");
    let err = conn.replace(&key, "nothing there", 0).unwrap_err();
    assert_eq!(err.message(), message);
    assert_eq!(err.kind(), kind);
    assert_eq!(conn.get(&key).unwrap(), None);

    conn.set(&key, "old", 0).unwrap();
    conn.replace(&key, b"new".as_slice(), 0).unwrap();
    assert_eq!(conn.get_bytes(&key).unwrap(), Some(b"new".to_vec()));
}

// ============================================================================
// Removal
// ============================================================================

#[rstest]
#[case::binary(true)]
#[case::text(false)]
fn test_remove(#[case] binary: bool) {
    let mock = MockMemcached::start().unwrap();
    let pool = pool_for(&mock, binary, 1);
    let mut conn = pool.connection().unwrap();

    let key = unique_key("remove");
    conn.set(&key, "doomed", 0).unwrap();
    conn.remove(&key, 0).unwrap();
    assert_eq!(conn.get(&key).unwrap(), None);

    let err = conn.remove(&key, 0).unwrap_err();
    assert_eq!(err.message(), "NOT FOUND");
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[rstest]
#[case::binary(true)]
#[case::text(false)]
fn test_remove_many_deduplicates(#[case] binary: bool) {
    let mock = MockMemcached::start().unwrap();
    let pool = pool_for(&mock, binary, 1);
    let mut conn = pool.connection().unwrap();

    for key in ["a", "b", "c"] {
        conn.set(key, key, 0).unwrap();
    }
    let deletes_before = mock.stats().deletes;

    // Duplicates would fail with NOT FOUND on the second delete
    conn.remove_many(["a", "b", "a", "c", "b"], 0).unwrap();

    assert_eq!(mock.stats().deletes - deletes_before, 3);
    for key in ["a", "b", "c"] {
        assert_eq!(conn.get(key).unwrap(), None);
    }
}

#[test]
fn test_remove_many_stops_at_first_failure() {
    let mock = MockMemcached::start().unwrap();
    let pool = pool_for(&mock, true, 1);
    let mut conn = pool.connection().unwrap();

    conn.set("kept", "v", 0).unwrap();
    let err = conn
        .remove_many(vec!["missing".to_string(), "kept".to_string()], 0)
        .unwrap_err();
    assert_eq!(err.message(), "NOT FOUND");

    // Keys after the failing one are left alone
    assert_eq!(conn.get_string("kept").unwrap(), Some("v".to_string()));
}

#[rstest]
#[case::binary(true)]
#[case::text(false)]
fn test_delayed_flush(#[case] binary: bool) {
    let mock = MockMemcached::start().unwrap();
    let pool = pool_for(&mock, binary, 1);
    let mut conn = pool.connection().unwrap();

    conn.set("k", "v", 0).unwrap();
    conn.flush(1).unwrap();
    assert_eq!(conn.get_string("k").unwrap(), Some("v".to_string()));

    std::thread::sleep(Duration::from_millis(1200));
    assert_eq!(conn.get("k").unwrap(), None);
}

// ============================================================================
// Counters
// ============================================================================

#[rstest]
#[case::binary(true)]
#[case::text(false)]
fn test_increment_initializes_then_counts(#[case] binary: bool) {
    let mock = MockMemcached::start().unwrap();
    let pool = pool_for(&mock, binary, 1);
    let mut conn = pool.connection().unwrap();

    let key = unique_key("hits");
    assert_eq!(conn.increment(&key).unwrap(), 1);
    assert_eq!(conn.increment(&key).unwrap(), 2);
}

#[rstest]
#[case::binary(true)]
#[case::text(false)]
fn test_increments_then_decrements_saturate(#[case] binary: bool) {
    let mock = MockMemcached::start().unwrap();
    let pool = pool_for(&mock, binary, 1);
    let mut conn = pool.connection().unwrap();

    let key = unique_key("updown");
    let ups: Vec<u64> = (0..3).map(|_| conn.increment(&key).unwrap()).collect();
    assert_eq!(ups, vec![1, 2, 3]);

    let downs: Vec<u64> = (0..3).map(|_| conn.decrement(&key).unwrap()).collect();
    assert_eq!(downs, vec![2, 1, 0]);
    assert_eq!(conn.decrement(&key).unwrap(), 0);
}

#[rstest]
#[case::binary(true)]
#[case::text(false)]
fn test_decrement_on_absent_key(#[case] binary: bool) {
    let mock = MockMemcached::start().unwrap();
    let pool = pool_for(&mock, binary, 1);
    let mut conn = pool.connection().unwrap();

    let key = unique_key("down");
    assert_eq!(conn.decrement(&key).unwrap(), 0);
    assert_eq!(conn.decrement(&key).unwrap(), 0);
}

#[rstest]
#[case::binary(true)]
#[case::text(false)]
fn test_counter_options(#[case] binary: bool) {
    let mock = MockMemcached::start().unwrap();
    let pool = pool_for(&mock, binary, 1);
    let mut conn = pool.connection().unwrap();

    let key = unique_key("custom");
    let options = CounterOptions::increment().delta(10).initial(100);
    // Delta is not applied on the seeding call
    assert_eq!(conn.increment_with(&key, options).unwrap(), 100);
    assert_eq!(conn.increment_with(&key, options).unwrap(), 110);
    assert_eq!(
        conn.decrement_with(&key, CounterOptions::decrement().delta(500))
            .unwrap(),
        0
    );
}

#[rstest]
#[case::binary(true)]
#[case::text(false)]
fn test_counter_on_text_value_fails(#[case] binary: bool) {
    let mock = MockMemcached::start().unwrap();
    let pool = pool_for(&mock, binary, 1);
    let mut conn = pool.connection().unwrap();

    conn.set("word", "not a number", 0).unwrap();
    let err = conn.increment("word").unwrap_err();
    assert_eq!(
        err.message(),
        "CANNOT INCREMENT OR DECREMENT NON-NUMERIC VALUE"
    );
}

// ============================================================================
// Liveness
// ============================================================================

#[rstest]
#[case::binary(true)]
#[case::text(false)]
fn test_ping(#[case] binary: bool) {
    let mock = MockMemcached::start().unwrap();
    let pool = pool_for(&mock, binary, 1);
    let mut conn = pool.connection().unwrap();
    assert!(conn.ping());
}
