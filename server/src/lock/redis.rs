//! Redis-backed lock store.
//!
//! Acquisition is `SET key token NX EX ttl`; release and extend are Lua
//! scripts so the ownership check and the mutation are a single atomic step
//! on the Redis side.

use async_trait::async_trait;
use redis::{AsyncCommands, Script};
use std::time::Duration;

use super::store::{LockStore, LockStoreError};

const RELEASE_SCRIPT: &str = r#"
if redis.call('get', KEYS[1]) == ARGV[1] then
    return redis.call('del', KEYS[1])
else
    return 0
end"#;

const EXTEND_SCRIPT: &str = r#"
if redis.call('get', KEYS[1]) == ARGV[1] then
    local ttl = redis.call('ttl', KEYS[1])
    if ttl < 0 then
        ttl = 0
    end
    return redis.call('expire', KEYS[1], ttl + tonumber(ARGV[2]))
else
    return 0
end"#;

/// Lock store backed by a shared Redis instance.
pub struct RedisLockStore {
    client: redis::Client,
}

impl RedisLockStore {
    pub fn new(url: &str) -> Result<Self, redis::RedisError> {
        Ok(Self {
            client: redis::Client::open(url)?,
        })
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, LockStoreError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| LockStoreError(e.to_string()))
    }
}

#[async_trait]
impl LockStore for RedisLockStore {
    async fn try_acquire(
        &self,
        key: &str,
        token: &str,
        ttl: Duration,
    ) -> Result<bool, LockStoreError> {
        let mut conn = self.connection().await?;
        let set: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(token)
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await
            .map_err(|e| LockStoreError(e.to_string()))?;

        Ok(set.is_some())
    }

    async fn release_if_owner(&self, key: &str, token: &str) -> Result<bool, LockStoreError> {
        let mut conn = self.connection().await?;
        let deleted: i64 = Script::new(RELEASE_SCRIPT)
            .key(key)
            .arg(token)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| LockStoreError(e.to_string()))?;

        Ok(deleted == 1)
    }

    async fn extend_if_owner(
        &self,
        key: &str,
        token: &str,
        additional: Duration,
    ) -> Result<bool, LockStoreError> {
        let mut conn = self.connection().await?;
        let extended: i64 = Script::new(EXTEND_SCRIPT)
            .key(key)
            .arg(token)
            .arg(additional.as_secs().max(1))
            .invoke_async(&mut conn)
            .await
            .map_err(|e| LockStoreError(e.to_string()))?;

        Ok(extended == 1)
    }

    async fn holder(&self, key: &str) -> Result<Option<String>, LockStoreError> {
        let mut conn = self.connection().await?;
        conn.get(key)
            .await
            .map_err(|e| LockStoreError(e.to_string()))
    }
}
