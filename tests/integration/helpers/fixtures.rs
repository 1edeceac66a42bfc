//! Shared fixtures for integration scenarios

use super::mock_memcached::MockMemcached;
use mcpool::{ConnectionOption, ConnectionPool};

/// Pool against a mock server, in binary or text mode
pub fn pool_for(mock: &MockMemcached, binary: bool, max: usize) -> ConnectionPool {
    let mut options = vec![
        ConnectionOption::literal(mock.server_option()),
        ConnectionOption::literal(format!("--POOL-MAX={}", max)),
        ConnectionOption::literal("--RCV-TIMEOUT=2000"),
    ];
    if binary {
        options.push(ConnectionOption::binary_protocol());
    }
    ConnectionPool::try_new(ConnectionOption::composite(options)).expect("valid pool options")
}

/// Key that no other test touches
pub fn unique_key(prefix: &str) -> String {
    format!("{}:{}", prefix, uuid::Uuid::new_v4().simple())
}
