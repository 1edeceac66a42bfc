use crate::core::connection::Connection;
use crate::core::error::{error_for, Error, Result, ReturnCode, StaticDiagnostics};
use crate::core::link::{Link, LinkContext};
use crate::core::metrics::{MetricsSnapshot, PoolMetrics};
use crate::core::option::ConnectionOption;
use crate::core::settings::{OptionError, PoolSettings};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// What `checkout` does when every link is in use and the pool is at its cap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CheckoutPolicy {
    /// Fail immediately
    #[default]
    NonBlocking,
    /// Wait for a link to come back, optionally bounded
    Block { timeout: Option<Duration> },
}

/// Point in time view of pool occupancy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    pub idle: usize,
    pub total: usize,
    pub max: usize,
    pub shut_down: bool,
}

struct PoolState {
    idle: Vec<Link>,
    total: usize,
    next_id: usize,
    shut_down: bool,
}

pub(crate) struct PoolInner {
    configuration: String,
    context: std::result::Result<Arc<LinkContext>, OptionError>,
    state: Mutex<PoolState>,
    available: Condvar,
    metrics: PoolMetrics,
}

impl PoolInner {
    fn lock_state(&self) -> MutexGuard<'_, PoolState> {
        // State is never left half-updated, so a poisoned lock is still usable
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take a link back from a released connection
    pub(crate) fn push(&self, link: Link) {
        let mut state = self.lock_state();
        if state.shut_down {
            state.total = state.total.saturating_sub(1);
            drop(state);
            self.metrics.record_discard();
            tracing::debug!(link = link.id(), "pool shut down, discarding returned link");
            return;
        }

        tracing::debug!(link = link.id(), "link returned to pool");
        state.idle.push(link);
        drop(state);
        self.metrics.record_return();
        self.available.notify_one();
    }

    fn shutdown(&self) {
        let mut state = self.lock_state();
        if state.shut_down {
            return;
        }
        state.shut_down = true;
        let idle = std::mem::take(&mut state.idle);
        state.total = state.total.saturating_sub(idle.len());
        let outstanding = state.total;
        drop(state);

        tracing::debug!(
            released = idle.len(),
            outstanding,
            "connection pool shut down"
        );
        drop(idle);
        self.available.notify_all();
    }
}

/// A bounded set of links to the servers named by one configuration string
///
/// Links are created on demand up to `--POOL-MAX` and reused after each
/// [`Connection`] is released. Server sockets inside a link open on first
/// use. Dropping the pool shuts it down: idle links close and connections
/// still checked out are discarded when released.
pub struct ConnectionPool {
    options: ConnectionOption,
    inner: Arc<PoolInner>,
}

impl ConnectionPool {
    /// Create a pool from connection options.
    ///
    /// A configuration that cannot be parsed leaves the pool unusable: every
    /// checkout fails with the parse diagnostic.
    pub fn new(options: impl Into<ConnectionOption>) -> Self {
        let options = options.into();
        let configuration = options.configuration();

        let context = PoolSettings::parse(&configuration).map(|settings| Arc::new(LinkContext::new(settings)));
        if let Err(e) = &context {
            tracing::error!(configuration = %configuration, "invalid pool configuration: {}", e);
        }

        let mut state = PoolState {
            idle: Vec::new(),
            total: 0,
            next_id: 0,
            shut_down: false,
        };
        let metrics = PoolMetrics::new();
        if let Ok(context) = &context {
            // Warm links hold no sockets yet
            for _ in 0..context.settings.pool_min {
                state.idle.push(Link::new(state.next_id, Arc::clone(context)));
                state.next_id += 1;
                state.total += 1;
                metrics.record_link_created();
            }
        }

        Self {
            options,
            inner: Arc::new(PoolInner {
                configuration,
                context,
                state: Mutex::new(state),
                available: Condvar::new(),
                metrics,
            }),
        }
    }

    /// Create a pool, failing up front on an invalid configuration
    pub fn try_new(options: impl Into<ConnectionOption>) -> std::result::Result<Self, OptionError> {
        let pool = Self::new(options);
        match &pool.inner.context {
            Ok(_) => Ok(pool),
            Err(e) => Err(e.clone()),
        }
    }

    pub fn options(&self) -> &ConnectionOption {
        &self.options
    }

    /// The rendered configuration string
    pub fn configuration(&self) -> &str {
        &self.inner.configuration
    }

    /// Parsed settings, or `None` when the configuration was invalid
    pub fn settings(&self) -> Option<&PoolSettings> {
        self.inner.context.as_ref().ok().map(|context| &context.settings)
    }

    pub fn is_valid(&self) -> bool {
        self.inner.context.is_ok()
    }

    /// Check out a connection without waiting
    pub fn connection(&self) -> Result<Connection> {
        self.checkout(CheckoutPolicy::NonBlocking)
    }

    /// Check out a connection under the given policy
    pub fn checkout(&self, policy: CheckoutPolicy) -> Result<Connection> {
        let context = match &self.inner.context {
            Ok(context) => context,
            Err(e) => {
                return Err(Error::Connection(format!("invalid configuration: {}", e)));
            }
        };

        let deadline = match policy {
            CheckoutPolicy::Block {
                timeout: Some(timeout),
            } => Some(Instant::now() + timeout),
            _ => None,
        };

        let mut state = self.inner.lock_state();
        loop {
            if state.shut_down {
                return Err(pool_error(ReturnCode::PoolShutDown));
            }

            if let Some(link) = state.idle.pop() {
                drop(state);
                return Ok(self.hand_out(link));
            }

            if state.total < context.settings.pool_max {
                let link = Link::new(state.next_id, Arc::clone(context));
                state.next_id += 1;
                state.total += 1;
                drop(state);
                self.inner.metrics.record_link_created();
                tracing::debug!(link = link.id(), "created link");
                return Ok(self.hand_out(link));
            }

            match (policy, deadline) {
                (CheckoutPolicy::NonBlocking, _) => {
                    drop(state);
                    self.inner.metrics.record_exhausted();
                    tracing::debug!(max = context.settings.pool_max, "connection pool exhausted");
                    return Err(pool_error(ReturnCode::PoolExhausted));
                }
                (CheckoutPolicy::Block { .. }, None) => {
                    state = self
                        .inner
                        .available
                        .wait(state)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                (CheckoutPolicy::Block { .. }, Some(deadline)) => {
                    let now = Instant::now();
                    if now >= deadline {
                        drop(state);
                        self.inner.metrics.record_exhausted();
                        return Err(pool_error(ReturnCode::Timeout));
                    }
                    let (guard, _) = self
                        .inner
                        .available
                        .wait_timeout(state, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner);
                    state = guard;
                }
            }
        }
    }

    /// Release idle links and refuse further checkouts
    pub fn shutdown(&self) {
        self.inner.shutdown();
    }

    pub fn status(&self) -> PoolStatus {
        let state = self.inner.lock_state();
        PoolStatus {
            idle: state.idle.len(),
            total: state.total,
            max: self
                .inner
                .context
                .as_ref()
                .map(|context| context.settings.pool_max)
                .unwrap_or(0),
            shut_down: state.shut_down,
        }
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    fn hand_out(&self, link: Link) -> Connection {
        self.inner.metrics.record_checkout();
        tracing::debug!(link = link.id(), "link checked out");
        Connection::new(link, Arc::clone(&self.inner))
    }
}

impl Drop for ConnectionPool {
    fn drop(&mut self) {
        self.inner.shutdown();
    }
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("configuration", &self.inner.configuration)
            .field("status", &self.status())
            .finish()
    }
}

fn pool_error(code: ReturnCode) -> Error {
    error_for(code, &StaticDiagnostics::default())
}
