//! In-memory store for exercising the runner without a Redis server.

use std::collections::BTreeMap;
use std::time::Duration;

use regex::bytes::Regex;

use super::{SourceStore, TargetStore};
use crate::{
    errors::SyncError,
    record::{KeyRecord, KeyValue, display_key},
};

#[derive(Debug, Clone, PartialEq)]
enum Stored {
    Value(KeyValue),
    /// A type the copier does not support, e.g. a module type.
    Foreign(String),
    /// Listed by scans but gone by the time it is read.
    Vanishing,
}

#[derive(Debug, Clone, PartialEq)]
struct Entry {
    stored: Stored,
    ttl: Option<Duration>,
}

/// Ordered map of keys; scans walk it in key order.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<Vec<u8>, Entry>,
    writes: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<Vec<u8>>, value: KeyValue) -> &mut Self {
        self.insert_with_ttl(key, value, None)
    }

    pub fn insert_with_ttl(&mut self, key: impl Into<Vec<u8>>, value: KeyValue, ttl: Option<Duration>) -> &mut Self {
        self.entries.insert(
            key.into(),
            Entry {
                stored: Stored::Value(value),
                ttl,
            },
        );
        self
    }

    /// Store a key whose type name is not one the copier understands.
    pub fn insert_foreign(&mut self, key: impl Into<Vec<u8>>, type_name: impl Into<String>) -> &mut Self {
        self.entries.insert(
            key.into(),
            Entry {
                stored: Stored::Foreign(type_name.into()),
                ttl: None,
            },
        );
        self
    }

    /// Store a key that scans report but reads no longer find.
    pub fn insert_vanishing(&mut self, key: impl Into<Vec<u8>>) -> &mut Self {
        self.entries.insert(
            key.into(),
            Entry {
                stored: Stored::Vanishing,
                ttl: None,
            },
        );
        self
    }

    pub fn get(&self, key: &[u8]) -> Option<&KeyValue> {
        match self.entries.get(key).map(|entry| &entry.stored) {
            Some(Stored::Value(value)) => Some(value),
            _ => None,
        }
    }

    pub fn ttl(&self, key: &[u8]) -> Option<Duration> {
        self.entries.get(key).and_then(|entry| entry.ttl)
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of successful `write` calls.
    pub fn write_count(&self) -> usize {
        self.writes
    }

    /// All readable keys as records, in key order.
    pub fn records(&self) -> Vec<KeyRecord> {
        self.entries
            .iter()
            .filter_map(|(key, entry)| match &entry.stored {
                Stored::Value(value) => Some(KeyRecord::new(key.clone(), value.clone()).with_ttl(entry.ttl)),
                _ => None,
            })
            .collect()
    }
}

impl SourceStore for MemoryStore {
    async fn scan(&mut self, cursor: u64, pattern: &str, count: usize) -> Result<(u64, Vec<Vec<u8>>), SyncError> {
        let matcher = glob_to_regex(pattern)?;
        let start = cursor as usize;
        let count = count.max(1);

        let keys = self
            .entries
            .keys()
            .skip(start)
            .take(count)
            .filter(|key| matcher.is_match(key))
            .cloned()
            .collect();

        let next = start + count;
        let next_cursor = if next >= self.entries.len() { 0 } else { next as u64 };
        Ok((next_cursor, keys))
    }

    async fn exists(&mut self, key: &[u8]) -> Result<bool, SyncError> {
        Ok(matches!(
            self.entries.get(key),
            Some(Entry {
                stored: Stored::Value(_) | Stored::Foreign(_),
                ..
            })
        ))
    }

    async fn read(&mut self, key: &[u8]) -> Result<Option<KeyRecord>, SyncError> {
        let Some(entry) = self.entries.get(key) else {
            return Ok(None);
        };

        match &entry.stored {
            Stored::Value(value) => Ok(Some(KeyRecord::new(key, value.clone()).with_ttl(entry.ttl))),
            Stored::Foreign(type_name) => Err(SyncError::UnsupportedType {
                key: display_key(key),
                type_name: type_name.clone(),
            }),
            Stored::Vanishing => Ok(None),
        }
    }
}

impl TargetStore for MemoryStore {
    async fn exists(&mut self, key: &[u8]) -> Result<bool, SyncError> {
        SourceStore::exists(self, key).await
    }

    async fn write(&mut self, record: &KeyRecord) -> Result<(), SyncError> {
        self.insert_with_ttl(record.key.clone(), record.value.clone(), record.ttl);
        self.writes += 1;
        Ok(())
    }
}

/// Translate a Redis glob (`*`, `?`, `[...]`, `\` escapes) into an anchored byte regex.
fn glob_to_regex(pattern: &str) -> Result<Regex, SyncError> {
    let mut expr = String::from("(?s-u)^");
    let mut chars = pattern.chars();

    while let Some(c) = chars.next() {
        match c {
            '*' => expr.push_str(".*"),
            '?' => expr.push('.'),
            '\\' => {
                if let Some(escaped) = chars.next() {
                    expr.push_str(&regex::escape(&escaped.to_string()));
                }
            }
            '[' => {
                expr.push('[');
                let mut first = true;
                for inner in chars.by_ref() {
                    match inner {
                        ']' if !first => break,
                        '^' if first => expr.push('^'),
                        '\\' | '[' | ']' | '&' | '~' => {
                            expr.push('\\');
                            expr.push(inner);
                        }
                        other => expr.push(other),
                    }
                    first = false;
                }
                expr.push(']');
            }
            other => expr.push_str(&regex::escape(&other.to_string())),
        }
    }
    expr.push('$');

    Regex::new(&expr).map_err(|err| SyncError::configuration(format!("invalid match pattern '{pattern}': {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(pattern: &str, key: &str) -> bool {
        glob_to_regex(pattern).unwrap().is_match(key.as_bytes())
    }

    #[test]
    fn test_glob_star_and_question_mark() {
        assert!(matches("*", "anything"));
        assert!(matches("*", ""));
        assert!(matches("user:*", "user:1"));
        assert!(!matches("user:*", "session:1"));
        assert!(matches("h?llo", "hello"));
        assert!(!matches("h?llo", "heello"));
    }

    #[test]
    fn test_glob_classes_and_escapes() {
        assert!(matches("h[ae]llo", "hallo"));
        assert!(!matches("h[ae]llo", "hillo"));
        assert!(matches("h[^e]llo", "hallo"));
        assert!(!matches("h[^e]llo", "hello"));
        assert!(matches("h[a-c]llo", "hbllo"));
        assert!(matches("a\\*b", "a*b"));
        assert!(!matches("a\\*b", "axb"));
        assert!(matches("price.usd", "price.usd"));
        assert!(!matches("price.usd", "priceXusd"));
    }

    #[tokio::test]
    async fn test_scan_walks_all_keys_in_pages() {
        let mut store = MemoryStore::new();
        for i in 0..7 {
            store.insert(format!("k{i}"), KeyValue::String(b"v".to_vec()));
        }

        let mut cursor = 0;
        let mut seen = Vec::new();
        loop {
            let (next, keys) = store.scan(cursor, "*", 3).await.unwrap();
            seen.extend(keys);
            cursor = next;
            if cursor == 0 {
                break;
            }
        }
        assert_eq!(seen.len(), 7);
    }

    #[tokio::test]
    async fn test_read_reports_foreign_type() {
        let mut store = MemoryStore::new();
        store.insert_foreign("doc:1", "ReJSON-RL");
        let err = store.read(b"doc:1").await.unwrap_err();
        assert!(matches!(err, SyncError::UnsupportedType { ref type_name, .. } if type_name == "ReJSON-RL"));
    }

    #[tokio::test]
    async fn test_vanishing_key_reads_as_missing() {
        let mut store = MemoryStore::new();
        store.insert_vanishing("gone");
        assert!(store.read(b"gone").await.unwrap().is_none());
        assert!(!SourceStore::exists(&mut store, b"gone").await.unwrap());
    }

    #[tokio::test]
    async fn test_write_replaces_value() {
        let mut store = MemoryStore::new();
        store.insert("k", KeyValue::List(vec![b"old".to_vec()]));
        let record = KeyRecord::new("k", KeyValue::List(vec![b"new".to_vec()]));
        store.write(&record).await.unwrap();

        assert_eq!(store.get(b"k"), Some(&KeyValue::List(vec![b"new".to_vec()])));
        assert_eq!(store.write_count(), 1);
    }
}
