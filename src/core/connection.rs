use crate::core::connection_pool::PoolInner;
use crate::core::error::{check, error_for, Result, ReturnCode, StaticDiagnostics};
use crate::core::link::Link;
use crate::core::protocols::{ArithMode, Payload, Reply, Request, StoreMode};
use crate::core::value::{self, Value};
use std::collections::HashSet;
use std::sync::Arc;

/// Parameters for `increment_with` / `decrement_with`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterOptions {
    /// Amount added or subtracted when the key exists
    pub delta: u64,
    /// Value stored when the key is absent; the delta is not applied
    pub initial: u64,
    /// Seconds until expiry, 0 for never
    pub expire: u32,
}

impl CounterOptions {
    /// Delta 1, initial 1, no expiry
    pub fn increment() -> Self {
        Self {
            delta: 1,
            initial: 1,
            expire: 0,
        }
    }

    /// Delta 1, initial 0, no expiry
    pub fn decrement() -> Self {
        Self {
            delta: 1,
            initial: 0,
            expire: 0,
        }
    }

    pub fn delta(mut self, delta: u64) -> Self {
        self.delta = delta;
        self
    }

    pub fn initial(mut self, initial: u64) -> Self {
        self.initial = initial;
        self
    }

    pub fn expire(mut self, expire: u32) -> Self {
        self.expire = expire;
        self
    }
}

/// Exclusive use of one pooled link
///
/// The link goes back to its pool exactly once, on [`Connection::release`]
/// or on drop, whatever the outcome of the commands issued through it.
pub struct Connection {
    link: Option<Link>,
    pool: Arc<PoolInner>,
}

impl Connection {
    pub(crate) fn new(link: Link, pool: Arc<PoolInner>) -> Self {
        Self {
            link: Some(link),
            pool,
        }
    }

    /// Identifier of the underlying link, stable across checkouts
    pub fn link_id(&self) -> usize {
        self.link.as_ref().map(Link::id).unwrap_or_default()
    }

    /// Fetch a value. Missing keys and undecodable payloads are `Ok(None)`.
    pub fn get(&mut self, key: &str) -> Result<Option<Value>> {
        let (link, reply) = self.execute(&Request::Get {
            key: key.as_bytes(),
        })?;
        if reply.code == ReturnCode::NotFound {
            return Ok(None);
        }
        check(reply.code, link)?;

        match reply.payload {
            Some(Payload::Item { data, flags }) => Ok(value::decode(data, flags)),
            _ => Ok(None),
        }
    }

    /// Fetch a value stored as text
    pub fn get_string(&mut self, key: &str) -> Result<Option<String>> {
        Ok(self.get(key)?.and_then(Value::into_string))
    }

    /// Fetch a value stored as raw bytes
    pub fn get_bytes(&mut self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.get(key)?.and_then(Value::into_bytes))
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>, expire: u32) -> Result<()> {
        self.store(StoreMode::Set, key, &value.into(), expire)
    }

    /// Store only if the key does not exist yet
    pub fn add(&mut self, key: &str, value: impl Into<Value>, expire: u32) -> Result<()> {
        self.store(StoreMode::Add, key, &value.into(), expire)
    }

    /// Store only if the key already exists
    pub fn replace(&mut self, key: &str, value: impl Into<Value>, expire: u32) -> Result<()> {
        self.store(StoreMode::Replace, key, &value.into(), expire)
    }

    pub fn remove(&mut self, key: &str, expire: u32) -> Result<()> {
        let (link, reply) = self.execute(&Request::Delete {
            key: key.as_bytes(),
            expire,
        })?;
        check(reply.code, link)
    }

    /// Remove each distinct key once.
    ///
    /// Stops at the first key that fails and returns its error; keys after
    /// it are left untouched.
    pub fn remove_many<I, K>(&mut self, keys: I, expire: u32) -> Result<()>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let keys: Vec<K> = keys.into_iter().collect();
        let mut seen = HashSet::new();
        for key in &keys {
            let key = key.as_ref();
            if seen.insert(key) {
                self.remove(key, expire)?;
            }
        }
        Ok(())
    }

    /// Invalidate every item on every server, now or after `expire` seconds
    pub fn flush(&mut self, expire: u32) -> Result<()> {
        let link = self.link_mut()?;
        let reply = link.broadcast(&Request::Flush { expire });
        check(reply.code, &*link)
    }

    pub fn increment(&mut self, key: &str) -> Result<u64> {
        self.increment_with(key, CounterOptions::increment())
    }

    pub fn increment_with(&mut self, key: &str, options: CounterOptions) -> Result<u64> {
        self.arith(ArithMode::Increment, key, options)
    }

    pub fn decrement(&mut self, key: &str) -> Result<u64> {
        self.decrement_with(key, CounterOptions::decrement())
    }

    /// Counters never go below zero
    pub fn decrement_with(&mut self, key: &str, options: CounterOptions) -> Result<u64> {
        self.arith(ArithMode::Decrement, key, options)
    }

    /// Version request to every server. Never fails.
    pub fn ping(&mut self) -> bool {
        match self.link.as_mut() {
            Some(link) => link.ping(),
            None => false,
        }
    }

    /// Return the link to the pool now
    pub fn release(mut self) {
        self.give_back();
    }

    fn store(&mut self, mode: StoreMode, key: &str, value: &Value, expire: u32) -> Result<()> {
        let (data, flags) = value::encode(value);
        let (link, reply) = self.execute(&Request::Store {
            mode,
            key: key.as_bytes(),
            data,
            flags,
            expire,
        })?;
        check(reply.code, link)
    }

    fn arith(&mut self, mode: ArithMode, key: &str, options: CounterOptions) -> Result<u64> {
        let (link, reply) = self.execute(&Request::Arith {
            mode,
            key: key.as_bytes(),
            delta: options.delta,
            initial: options.initial,
            expire: options.expire,
        })?;
        check(reply.code, link)?;

        match reply.payload {
            Some(Payload::Counter(value)) => Ok(value),
            _ => Err(error_for(ReturnCode::ProtocolError, link)),
        }
    }

    fn execute(&mut self, request: &Request<'_>) -> Result<(&Link, Reply)> {
        let link = self.link_mut()?;
        let reply = link.execute(request);
        Ok((&*link, reply))
    }

    fn link_mut(&mut self) -> Result<&mut Link> {
        self.link
            .as_mut()
            .ok_or_else(|| error_for(ReturnCode::ConnectionFailure, &StaticDiagnostics::default()))
    }

    fn give_back(&mut self) {
        if let Some(link) = self.link.take() {
            self.pool.push(link);
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.give_back();
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection").field("link", &self.link).finish()
    }
}
