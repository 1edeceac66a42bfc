//! Protocol-specific integration tests
//!
//! Behavior that differs between the binary and text protocols, and key
//! validation that happens before anything is sent.

use crate::integration::{pool_for, MockMemcached};
use mcpool::{ConnectionPool, ReturnCode};
use rstest::rstest;

#[rstest]
#[case::binary(true)]
#[case::text(false)]
fn test_key_length_limits(#[case] binary: bool) {
    let mock = MockMemcached::start().unwrap();
    let pool = pool_for(&mock, binary, 1);
    let mut conn = pool.connection().unwrap();

    let longest = "k".repeat(250);
    conn.set(&longest, "fits", 0).unwrap();
    assert_eq!(conn.get_string(&longest).unwrap(), Some("fits".to_string()));

    let requests = mock.stats().requests;
    let too_long = "k".repeat(251);
    let err = conn.set(&too_long, "nope", 0).unwrap_err();
    assert_eq!(err.message(), ReturnCode::BadKeyProvided.as_str());
    let err = conn.get("").unwrap_err();
    assert_eq!(err.message(), ReturnCode::BadKeyProvided.as_str());

    // Rejected before reaching the server
    assert_eq!(mock.stats().requests, requests);
}

#[test]
fn test_text_protocol_rejects_whitespace_keys() {
    let mock = MockMemcached::start().unwrap();
    let pool = pool_for(&mock, false, 1);
    let mut conn = pool.connection().unwrap();

    for key in ["two words", "tab\there", "line\nbreak"] {
        let err = conn.set(key, "v", 0).unwrap_err();
        assert_eq!(err.message(), ReturnCode::BadKeyProvided.as_str());
    }
    assert_eq!(mock.stats().requests, 0);
}

#[test]
fn test_binary_protocol_allows_whitespace_keys() {
    let mock = MockMemcached::start().unwrap();
    let pool = pool_for(&mock, true, 1);
    let mut conn = pool.connection().unwrap();

    conn.set("two words", "v", 0).unwrap();
    assert_eq!(conn.get_string("two words").unwrap(), Some("v".to_string()));
}

#[test]
fn test_binary_delete_with_expiry_is_rejected_locally() {
    let mock = MockMemcached::start().unwrap();
    let pool = pool_for(&mock, true, 1);
    let mut conn = pool.connection().unwrap();

    conn.set("k", "v", 0).unwrap();
    let err = conn.remove("k", 10).unwrap_err();
    assert_eq!(err.message(), "INVALID ARGUMENTS");
    assert_eq!(conn.get_string("k").unwrap(), Some("v".to_string()));
}

#[test]
fn test_text_delete_with_expiry_reports_client_error() {
    let mock = MockMemcached::start().unwrap();
    let pool = pool_for(&mock, false, 1);
    let mut conn = pool.connection().unwrap();

    conn.set("k", "v", 0).unwrap();
    let err = conn.remove("k", 10).unwrap_err();
    assert_eq!(err.message(), "CLIENT ERROR");

    // The stream stays in sync after the error line
    assert_eq!(conn.get_string("k").unwrap(), Some("v".to_string()));
}

#[rstest]
#[case::binary(true)]
#[case::text(false)]
fn test_counters_are_stored_as_text(#[case] binary: bool) {
    let mock = MockMemcached::start().unwrap();
    let pool = pool_for(&mock, binary, 1);
    let mut conn = pool.connection().unwrap();

    assert_eq!(conn.increment("seeded").unwrap(), 1);
    // Counters are stored as decimal text with zero flags
    assert_eq!(mock.stored("seeded"), Some((b"1".to_vec(), 0)));
    assert_eq!(conn.get("seeded").unwrap(), None);
}

#[rstest]
#[case::binary("--BINARY-PROTOCOL")]
#[case::text("")]
fn test_unreachable_server_is_a_connection_error(#[case] flag: &str) {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let pool = ConnectionPool::new(format!(
        "--SERVER=127.0.0.1:{} --CONNECT-TIMEOUT=200 {}",
        port, flag
    ));
    let mut conn = pool.connection().unwrap();

    let err = conn.set("k", "v", 0).unwrap_err();
    assert_eq!(err.message(), "CONNECTION FAILURE");
    assert!(!conn.ping());
}
