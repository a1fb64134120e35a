//! Networked store adapter backed by a single Redis node.

use crate::adapter::{ScanPage, SortedSetOps, StoreAdapter, StoreOp};
use crate::error::StoreResult;
use ::redis::{Client, Connection};
use parking_lot::Mutex;
use std::collections::BTreeMap;

/// A store adapter over one Redis connection.
///
/// Each operation holds the shared connection for exactly one round-trip;
/// callers on other threads queue behind it. Timeouts and reconnect policy
/// belong to the client transport configuration, not to this adapter, and
/// transport failures propagate unwrapped.
pub struct RedisStore {
    conn: Mutex<Connection>,
}

impl RedisStore {
    /// Connects to a Redis node, e.g. `redis://127.0.0.1:6379/0`.
    pub fn connect(url: &str) -> StoreResult<Self> {
        let client = Client::open(url)?;
        let conn = client.get_connection()?;
        Ok(Self::from_connection(conn))
    }

    /// Wraps an already-established connection.
    #[must_use]
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }
}

impl StoreAdapter for RedisStore {
    fn exists(&self, key: &str) -> StoreResult<bool> {
        let mut conn = self.conn.lock();
        Ok(::redis::cmd("EXISTS").arg(key).query(&mut *conn)?)
    }

    fn scan(&self, pattern: &str, cursor: u64, count: usize) -> StoreResult<ScanPage> {
        let mut conn = self.conn.lock();
        let (cursor, keys): (u64, Vec<String>) = ::redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(count.max(1))
            .query(&mut *conn)?;
        Ok(ScanPage { cursor, keys })
    }

    fn set_field(&self, key: &str, field: &str, value: &str) -> StoreResult<()> {
        let mut conn = self.conn.lock();
        ::redis::cmd("HSET")
            .arg(key)
            .arg(field)
            .arg(value)
            .query::<()>(&mut *conn)?;
        Ok(())
    }

    fn set_fields(&self, key: &str, fields: &BTreeMap<String, String>) -> StoreResult<()> {
        if fields.is_empty() {
            return Ok(());
        }
        let mut cmd = ::redis::cmd("HSET");
        cmd.arg(key);
        for (field, value) in fields {
            cmd.arg(field).arg(value);
        }
        let mut conn = self.conn.lock();
        cmd.query::<()>(&mut *conn)?;
        Ok(())
    }

    fn get_field(&self, key: &str, field: &str) -> StoreResult<Option<String>> {
        let mut conn = self.conn.lock();
        Ok(::redis::cmd("HGET").arg(key).arg(field).query(&mut *conn)?)
    }

    fn get_fields(&self, key: &str) -> StoreResult<BTreeMap<String, String>> {
        let mut conn = self.conn.lock();
        Ok(::redis::cmd("HGETALL").arg(key).query(&mut *conn)?)
    }

    fn delete_fields(&self, key: &str, fields: &[String]) -> StoreResult<()> {
        if fields.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.lock();
        ::redis::cmd("HDEL")
            .arg(key)
            .arg(fields)
            .query::<()>(&mut *conn)?;
        Ok(())
    }

    fn delete_key(&self, key: &str) -> StoreResult<()> {
        let mut conn = self.conn.lock();
        ::redis::cmd("DEL").arg(key).query::<()>(&mut *conn)?;
        Ok(())
    }

    fn set_expiry(&self, key: &str, seconds: u64) -> StoreResult<()> {
        let mut conn = self.conn.lock();
        ::redis::cmd("EXPIRE")
            .arg(key)
            .arg(seconds)
            .query::<()>(&mut *conn)?;
        Ok(())
    }

    fn get_expiry(&self, key: &str) -> StoreResult<Option<u64>> {
        let mut conn = self.conn.lock();
        let ttl: i64 = ::redis::cmd("TTL").arg(key).query(&mut *conn)?;
        // -2 = no key, -1 = no expiry.
        if ttl < 0 {
            Ok(None)
        } else {
            Ok(Some(ttl as u64))
        }
    }

    fn pipeline(&self, ops: &[StoreOp]) -> StoreResult<()> {
        let mut pipe = ::redis::pipe();
        pipe.atomic();
        for op in ops {
            match op {
                StoreOp::SetFields { key, fields } => {
                    if fields.is_empty() {
                        continue;
                    }
                    let cmd = pipe.cmd("HSET").arg(key);
                    for (field, value) in fields {
                        cmd.arg(field).arg(value);
                    }
                    cmd.ignore();
                }
                StoreOp::DeleteFields { key, fields } => {
                    if fields.is_empty() {
                        continue;
                    }
                    pipe.cmd("HDEL").arg(key).arg(fields).ignore();
                }
                StoreOp::DeleteKey { key } => {
                    pipe.cmd("DEL").arg(key).ignore();
                }
                StoreOp::SetExpiry { key, seconds } => {
                    pipe.cmd("EXPIRE").arg(key).arg(*seconds).ignore();
                }
            }
        }
        let mut conn = self.conn.lock();
        pipe.query::<()>(&mut *conn)?;
        Ok(())
    }
}

impl SortedSetOps for RedisStore {
    fn sorted_set_add(&self, set: &str, member: &str, score: f64) -> StoreResult<()> {
        let mut conn = self.conn.lock();
        ::redis::cmd("ZADD")
            .arg(set)
            .arg(score)
            .arg(member)
            .query::<()>(&mut *conn)?;
        Ok(())
    }

    fn sorted_set_remove(&self, set: &str, member: &str) -> StoreResult<()> {
        let mut conn = self.conn.lock();
        ::redis::cmd("ZREM")
            .arg(set)
            .arg(member)
            .query::<()>(&mut *conn)?;
        Ok(())
    }

    fn sorted_set_members(&self, set: &str) -> StoreResult<Vec<String>> {
        let mut conn = self.conn.lock();
        Ok(::redis::cmd("ZRANGE")
            .arg(set)
            .arg(0)
            .arg(-1)
            .query(&mut *conn)?)
    }
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore").finish_non_exhaustive()
    }
}
