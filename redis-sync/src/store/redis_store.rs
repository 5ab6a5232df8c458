//! Store backed by a live Redis instance.

use std::time::Duration;

use log::debug;
use redis::Value;
use redis::aio::MultiplexedConnection;

use super::{SourceStore, TargetStore};
use crate::{
    config::DEFAULT_WRITE_CHUNK,
    endpoint::Endpoint,
    errors::{StoreRole, SyncError},
    record::{KeyKind, KeyRecord, KeyValue, StreamEntry, display_key, ttl_from_pttl},
};

/// `PTTL` reply for a key that does not exist.
const PTTL_MISSING: i64 = -2;

/// One multiplexed connection to a Redis instance.
pub struct RedisStore {
    conn: MultiplexedConnection,
    endpoint: Endpoint,
    write_chunk: usize,
}

impl RedisStore {
    /// Connect and verify the connection with `PING`.
    ///
    /// Every failure, including timeouts and rejected credentials, is reported
    /// as `SyncError::Connection` tagged with `role`.
    pub async fn connect(role: StoreRole, endpoint: &Endpoint, timeout: Duration) -> Result<Self, SyncError> {
        let url = endpoint.redis_url()?;
        let client = redis::Client::open(url.as_str()).map_err(|err| SyncError::connection(role, endpoint, err))?;

        let mut conn = tokio::time::timeout(timeout, client.get_multiplexed_async_connection())
            .await
            .map_err(|_| SyncError::connection(role, endpoint, format!("timed out after {}s", timeout.as_secs())))?
            .map_err(|err| SyncError::connection(role, endpoint, err))?;

        let _: String = tokio::time::timeout(timeout, redis::cmd("PING").query_async(&mut conn))
            .await
            .map_err(|_| SyncError::connection(role, endpoint, "PING timed out"))?
            .map_err(|err| SyncError::connection(role, endpoint, err))?;

        debug!("connected to {role} redis at {endpoint}");

        Ok(Self {
            conn,
            endpoint: endpoint.clone(),
            write_chunk: DEFAULT_WRITE_CHUNK,
        })
    }

    /// Limit the number of elements sent per write command.
    pub fn with_write_chunk(mut self, write_chunk: usize) -> Self {
        self.write_chunk = write_chunk.max(1);
        self
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Get the underlying connection.
    pub fn conn(&mut self) -> &mut MultiplexedConnection {
        &mut self.conn
    }

    /// Read the value of a key of known kind together with its `PTTL`, in one transaction.
    async fn read_value(&mut self, kind: KeyKind, key: &[u8]) -> Result<(Option<KeyValue>, i64), SyncError> {
        let mut pipe = redis::pipe();
        pipe.atomic();

        let result = match kind {
            KeyKind::String => {
                pipe.cmd("GET").arg(key).cmd("PTTL").arg(key);
                let (value, pttl): (Option<Vec<u8>>, i64) = pipe.query_async(&mut self.conn).await?;
                (value.map(KeyValue::String), pttl)
            }
            KeyKind::List => {
                pipe.cmd("LRANGE").arg(key).arg(0).arg(-1).cmd("PTTL").arg(key);
                let (items, pttl): (Vec<Vec<u8>>, i64) = pipe.query_async(&mut self.conn).await?;
                (Some(KeyValue::List(items)), pttl)
            }
            KeyKind::Set => {
                pipe.cmd("SMEMBERS").arg(key).cmd("PTTL").arg(key);
                let (members, pttl): (Vec<Vec<u8>>, i64) = pipe.query_async(&mut self.conn).await?;
                (Some(KeyValue::Set(members)), pttl)
            }
            KeyKind::Hash => {
                pipe.cmd("HGETALL").arg(key).cmd("PTTL").arg(key);
                let (fields, pttl): (Vec<(Vec<u8>, Vec<u8>)>, i64) = pipe.query_async(&mut self.conn).await?;
                (Some(KeyValue::Hash(fields)), pttl)
            }
            KeyKind::SortedSet => {
                pipe.cmd("ZRANGE")
                    .arg(key)
                    .arg(0)
                    .arg(-1)
                    .arg("WITHSCORES")
                    .cmd("PTTL")
                    .arg(key);
                let (members, pttl): (Vec<(Vec<u8>, f64)>, i64) = pipe.query_async(&mut self.conn).await?;
                (Some(KeyValue::SortedSet(members)), pttl)
            }
            KeyKind::Stream => {
                pipe.cmd("XRANGE").arg(key).arg("-").arg("+").cmd("PTTL").arg(key);
                let (reply, pttl): (Value, i64) = pipe.query_async(&mut self.conn).await?;
                (Some(KeyValue::Stream(parse_stream_entries(reply)?)), pttl)
            }
        };

        Ok(result)
    }
}

impl SourceStore for RedisStore {
    async fn scan(&mut self, cursor: u64, pattern: &str, count: usize) -> Result<(u64, Vec<Vec<u8>>), SyncError> {
        let (next_cursor, keys): (u64, Vec<Vec<u8>>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(count)
            .query_async(&mut self.conn)
            .await?;
        Ok((next_cursor, keys))
    }

    async fn exists(&mut self, key: &[u8]) -> Result<bool, SyncError> {
        let exists: bool = redis::cmd("EXISTS").arg(key).query_async(&mut self.conn).await?;
        Ok(exists)
    }

    async fn read(&mut self, key: &[u8]) -> Result<Option<KeyRecord>, SyncError> {
        let type_name: String = redis::cmd("TYPE").arg(key).query_async(&mut self.conn).await?;
        if type_name == "none" {
            return Ok(None);
        }

        let kind = KeyKind::from_type_name(&type_name).ok_or_else(|| SyncError::UnsupportedType {
            key: display_key(key),
            type_name: type_name.clone(),
        })?;

        let (value, pttl) = self.read_value(kind, key).await?;
        // Expired or deleted between TYPE and the read.
        if pttl == PTTL_MISSING {
            return Ok(None);
        }

        Ok(value.map(|value| KeyRecord::new(key, value).with_ttl(ttl_from_pttl(pttl))))
    }
}

impl TargetStore for RedisStore {
    async fn exists(&mut self, key: &[u8]) -> Result<bool, SyncError> {
        let exists: bool = redis::cmd("EXISTS").arg(key).query_async(&mut self.conn).await?;
        Ok(exists)
    }

    async fn write(&mut self, record: &KeyRecord) -> Result<(), SyncError> {
        let pipe = build_write_pipeline(record, self.write_chunk);
        let _: () = pipe.query_async(&mut self.conn).await?;
        Ok(())
    }
}

/// Build the `MULTI`/`EXEC` block that replaces a key with `record`.
pub(crate) fn build_write_pipeline(record: &KeyRecord, write_chunk: usize) -> redis::Pipeline {
    let key = record.key.as_slice();
    let chunk = write_chunk.max(1);

    let mut pipe = redis::pipe();
    pipe.atomic();
    pipe.cmd("DEL").arg(key).ignore();

    match &record.value {
        KeyValue::String(bytes) => {
            pipe.cmd("SET").arg(key).arg(bytes.as_slice()).ignore();
        }
        KeyValue::List(items) => {
            for batch in items.chunks(chunk) {
                pipe.cmd("RPUSH").arg(key).arg(batch).ignore();
            }
        }
        KeyValue::Set(members) => {
            for batch in members.chunks(chunk) {
                pipe.cmd("SADD").arg(key).arg(batch).ignore();
            }
        }
        KeyValue::Hash(fields) => {
            for batch in fields.chunks(chunk) {
                let cmd = pipe.cmd("HSET").arg(key);
                for (field, value) in batch {
                    cmd.arg(field.as_slice()).arg(value.as_slice());
                }
                cmd.ignore();
            }
        }
        KeyValue::SortedSet(members) => {
            for batch in members.chunks(chunk) {
                let cmd = pipe.cmd("ZADD").arg(key);
                for (member, score) in batch {
                    cmd.arg(*score).arg(member.as_slice());
                }
                cmd.ignore();
            }
        }
        KeyValue::Stream(entries) if entries.is_empty() => {
            // XADD with MAXLEN 0 leaves an existing but empty stream behind.
            pipe.cmd("XADD")
                .arg(key)
                .arg("MAXLEN")
                .arg(0)
                .arg("0-1")
                .arg("_")
                .arg("_")
                .ignore();
        }
        KeyValue::Stream(entries) => {
            for entry in entries {
                let cmd = pipe.cmd("XADD").arg(key).arg(entry.id.as_str());
                for (field, value) in &entry.fields {
                    cmd.arg(field.as_slice()).arg(value.as_slice());
                }
                cmd.ignore();
            }
        }
    }

    if let Some(ttl) = record.ttl {
        pipe.cmd("PEXPIRE").arg(key).arg(ttl.as_millis() as u64).ignore();
    }

    pipe
}

/// Decode an `XRANGE` reply: an array of `[id, [field, value, ...]]` pairs.
fn parse_stream_entries(reply: Value) -> Result<Vec<StreamEntry>, SyncError> {
    let items = match reply {
        Value::Array(items) => items,
        Value::Nil => return Ok(Vec::new()),
        other => {
            return Err(SyncError::unexpected_reply(format!(
                "XRANGE returned {other:?} instead of an array"
            )));
        }
    };

    items
        .into_iter()
        .map(|item| {
            let Value::Array(mut parts) = item else {
                return Err(SyncError::unexpected_reply("stream entry is not an array"));
            };
            if parts.len() != 2 {
                return Err(SyncError::unexpected_reply(format!(
                    "stream entry has {} parts instead of 2",
                    parts.len()
                )));
            }
            let raw_fields = parts.pop().unwrap_or(Value::Nil);
            let raw_id = parts.pop().unwrap_or(Value::Nil);

            let id: String = redis::from_redis_value(&raw_id)?;
            let flat: Vec<Vec<u8>> = redis::from_redis_value(&raw_fields)?;
            if flat.len() % 2 != 0 {
                return Err(SyncError::unexpected_reply(format!(
                    "stream entry {id} has an odd number of field values"
                )));
            }

            let fields = flat
                .chunks_exact(2)
                .map(|pair| (pair[0].clone(), pair[1].clone()))
                .collect();
            Ok(StreamEntry { id, fields })
        })
        .collect()
}
