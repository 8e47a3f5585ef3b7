use std::{env, fmt, thread};
use std::time::Duration;

use dotenv::dotenv;
use log::warn;
use r2d2;

pub use self::memory::MemoryStore;

pub type Result<T> = std::result::Result<T, Error>;
pub type RedisPool = r2d2::Pool<redis::Client>;

/// Value a key holds between reservation and confirmation.
const RESERVED: &str = "reserved";

/// Key registration for payment deduplication.
///
/// `acquire` is an atomic set-if-absent reservation taken before the ledger
/// commit; `confirm` overwrites the reservation with the payment id once the
/// commit succeeds; `release` drops a reservation whose payment never
/// committed. A key that is present, reserved or confirmed, marks the request
/// as already processed.
pub trait Store {
	/// Reserve the key if it is absent. Returns false when the key is already
	/// registered.
	fn acquire(&self, key: &str, ttl: Duration) -> Result<bool>;
	fn confirm(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;
	fn release(&self, key: &str) -> Result<()>;
	fn get(&self, key: &str) -> Result<Option<String>>;
}

/// Get a pooled connection to redis, retrying with linear backoff
///
/// `REDIS_URL` must be set in the environment
/// Loads `.env` file in the environment's directory
pub fn redis_connection() -> RedisPool {
	dotenv().ok();
	let redis_url = env::var("REDIS_URL").expect("REDIS_URL must be set");

	let mut attempt = 0;
	loop {
		let client = redis::Client::open(redis_url.as_str()).expect("invalid REDIS_URL");
		match r2d2::Pool::builder().build(client) {
			Ok(pool) => return pool,
			Err(e) => {
				attempt += 1;
				if attempt >= 5 {
					panic!("failed to connect to redis: {}", e);
				}
				warn!("redis connection attempt {} failed: {}", attempt, e);
				thread::sleep(Duration::from_secs(attempt));
			}
		}
	}
}

pub struct RedisStore {
	pool: RedisPool,
}

impl RedisStore {
	pub fn new(pool: RedisPool) -> Self {
		RedisStore { pool }
	}
}

impl Store for RedisStore {
	fn acquire(&self, key: &str, ttl: Duration) -> Result<bool> {
		let mut conn = self.pool.get()?;
		// SET key reserved NX EX ttl; a nil reply means the key already exists
		let reply: Option<String> = redis::cmd("SET")
			.arg(key)
			.arg(RESERVED)
			.arg("NX")
			.arg("EX")
			.arg(ttl.as_secs())
			.query(&mut *conn)?;
		Ok(reply.is_some())
	}

	fn confirm(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
		let mut conn = self.pool.get()?;
		redis::cmd("SET")
			.arg(key)
			.arg(value)
			.arg("EX")
			.arg(ttl.as_secs())
			.query::<()>(&mut *conn)?;
		Ok(())
	}

	fn release(&self, key: &str) -> Result<()> {
		let mut conn = self.pool.get()?;
		redis::cmd("DEL").arg(key).query::<()>(&mut *conn)?;
		Ok(())
	}

	fn get(&self, key: &str) -> Result<Option<String>> {
		let mut conn = self.pool.get()?;
		redis::cmd("GET").arg(key).query(&mut *conn).map_err(Into::into)
	}
}

/// Error that can occur when talking to the idempotency store
#[derive(Debug)]
pub enum Error {
	Connection(String),
	Command(redis::RedisError),
}

impl fmt::Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Error::Connection(e) => write!(f, "opening redis connection: {}", e),
			Error::Command(e) => write!(f, "redis command: {}", e),
		}
	}
}

impl From<r2d2::Error> for Error {
	fn from(e: r2d2::Error) -> Self {
		Error::Connection(e.to_string())
	}
}

impl From<redis::RedisError> for Error {
	fn from(e: redis::RedisError) -> Self {
		Error::Command(e)
	}
}

pub mod memory {
	use std::collections::HashMap;
	use std::sync::Mutex;
	use std::time::{Duration, Instant};

	use super::{Result, Store, RESERVED};

	/// In-memory stand-in for the redis store; used by tests and local runs
	/// that have no redis at hand.
	#[derive(Default)]
	pub struct MemoryStore {
		entries: Mutex<HashMap<String, (String, Instant)>>,
	}

	impl MemoryStore {
		pub fn new() -> Self {
			Default::default()
		}
	}

	impl Store for MemoryStore {
		fn acquire(&self, key: &str, ttl: Duration) -> Result<bool> {
			let mut entries = self.entries.lock().unwrap();
			let now = Instant::now();
			entries.retain(|_, (_, deadline)| *deadline > now);
			if entries.contains_key(key) {
				return Ok(false);
			}
			entries.insert(key.to_string(), (RESERVED.to_string(), now + ttl));
			Ok(true)
		}

		fn confirm(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
			let mut entries = self.entries.lock().unwrap();
			entries.insert(key.to_string(), (value.to_string(), Instant::now() + ttl));
			Ok(())
		}

		fn release(&self, key: &str) -> Result<()> {
			let mut entries = self.entries.lock().unwrap();
			entries.remove(key);
			Ok(())
		}

		fn get(&self, key: &str) -> Result<Option<String>> {
			let entries = self.entries.lock().unwrap();
			let now = Instant::now();
			Ok(entries.get(key)
				.filter(|(_, deadline)| *deadline > now)
				.map(|(value, _)| value.clone()))
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const TTL: Duration = Duration::from_secs(60);

	#[test]
	fn acquire_reserves_a_fresh_key() {
		let store = MemoryStore::new();
		assert!(store.acquire("key-1", TTL).unwrap());
		assert_eq!(store.get("key-1").unwrap().as_deref(), Some(RESERVED));
	}

	#[test]
	fn acquire_rejects_a_registered_key() {
		let store = MemoryStore::new();
		assert!(store.acquire("key-1", TTL).unwrap());
		assert!(!store.acquire("key-1", TTL).unwrap());
	}

	#[test]
	fn released_key_can_be_acquired_again() {
		let store = MemoryStore::new();
		assert!(store.acquire("key-1", TTL).unwrap());
		store.release("key-1").unwrap();
		assert!(store.acquire("key-1", TTL).unwrap());
	}

	#[test]
	fn confirm_overwrites_the_reservation() {
		let store = MemoryStore::new();
		assert!(store.acquire("key-1", TTL).unwrap());
		store.confirm("key-1", "payment-id", TTL).unwrap();
		assert_eq!(store.get("key-1").unwrap().as_deref(), Some("payment-id"));
		// still registered: a replay must not re-acquire
		assert!(!store.acquire("key-1", TTL).unwrap());
	}

	#[test]
	fn expired_key_can_be_acquired_again() {
		let store = MemoryStore::new();
		assert!(store.acquire("key-1", Duration::from_secs(0)).unwrap());
		assert!(store.acquire("key-1", TTL).unwrap());
	}
}
