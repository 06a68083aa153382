use crate::adapters::redis::RedisClient;
use crate::storage::{KeyValueStore, StoreError};
use async_trait::async_trait;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

// KEYS[1] hash; ARGV: guard field, "1" if a value is expected, expected value, fields to delete.
static REMOVE_IF: LazyLock<redis::Script> = LazyLock::new(|| {
    redis::Script::new(
        r"
local current = redis.call('HGET', KEYS[1], ARGV[1])
local matches
if ARGV[2] == '1' then matches = current == ARGV[3] else matches = current == false end
if not matches then return 0 end
if #ARGV > 3 then redis.call('HDEL', KEYS[1], unpack(ARGV, 4)) end
return 1
",
    )
});

/// Session keys kept as fields of one Redis hash, so several clients on
/// different hosts can share a sign-in.
#[derive(Debug, Clone)]
pub struct RedisStore {
    redis: Arc<RedisClient>,
    key: String,
}

impl RedisStore {
    #[must_use]
    pub const fn new(redis: Arc<RedisClient>, key: String) -> Self {
        Self { redis, key }
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get_many(&self, keys: &[&str]) -> Result<HashMap<String, String>, StoreError> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }
        let mut conn = self.redis.connection();
        let values: Vec<Option<String>> = redis::cmd("HMGET").arg(&self.key).arg(keys).query_async(&mut conn).await?;

        Ok(keys
            .iter()
            .zip(values)
            .filter_map(|(key, value)| value.map(|value| ((*key).to_string(), value)))
            .collect())
    }

    async fn set_many(&self, entries: &[(&str, String)]) -> Result<(), StoreError> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut conn = self.redis.connection();
        let _: () = redis::cmd("HSET").arg(&self.key).arg(entries).query_async(&mut conn).await?;
        Ok(())
    }

    async fn remove_many(&self, keys: &[&str]) -> Result<(), StoreError> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.redis.connection();
        let _: () = conn.hdel(&self.key, keys).await?;
        Ok(())
    }

    async fn remove_if(&self, guard_key: &str, expected: Option<&str>, keys: &[&str]) -> Result<bool, StoreError> {
        let mut conn = self.redis.connection();
        let removed: i64 = REMOVE_IF
            .key(&self.key)
            .arg(guard_key)
            .arg(if expected.is_some() { "1" } else { "0" })
            .arg(expected.unwrap_or_default())
            .arg(keys)
            .invoke_async(&mut conn)
            .await?;
        Ok(removed == 1)
    }
}
