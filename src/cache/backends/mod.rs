//! Cache backend implementations.

pub mod memory;

#[cfg(feature = "cache-redis")]
pub mod redis;

pub use memory::MemoryBackend;

#[cfg(feature = "cache-redis")]
pub use redis::RedisBackend;
