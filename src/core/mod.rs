pub mod connection;
pub mod connection_pool;
pub mod distribution;
pub mod error;
pub mod link;
pub mod metrics;
pub mod option;
pub mod protocols;
pub mod settings;
pub mod value;

// Re-export the client surface
pub use connection::{Connection, CounterOptions};
pub use connection_pool::{CheckoutPolicy, ConnectionPool, PoolStatus};
pub use distribution::{Distribution, DistributionKind};
pub use error::{check, Diagnostics, Error, ErrorKind, Result, ReturnCode};
pub use metrics::{MetricsSnapshot, PoolMetrics};
pub use option::{ConnectionOption, ServerOption, DEFAULT_PORT};
pub use protocols::Protocol;
pub use settings::{OptionError, PoolSettings, ServerAddress, MAX_WEIGHT};
pub use value::{Value, BYTES_FLAG, TEXT_FLAG};
