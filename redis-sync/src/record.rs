//! Typed snapshot of a single key, as read from the source and written to the destination.

use std::time::Duration;

/// Redis data types the copier can read and recreate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyKind {
    String,
    List,
    Set,
    Hash,
    SortedSet,
    Stream,
}

impl KeyKind {
    /// Map the reply of `TYPE` to a supported kind.
    ///
    /// Returns `None` for module types and anything else not listed here,
    /// including `none` (which callers should check for first).
    pub fn from_type_name(name: &str) -> Option<Self> {
        match name {
            "string" => Some(KeyKind::String),
            "list" => Some(KeyKind::List),
            "set" => Some(KeyKind::Set),
            "hash" => Some(KeyKind::Hash),
            "zset" => Some(KeyKind::SortedSet),
            "stream" => Some(KeyKind::Stream),
            _ => None,
        }
    }

    /// Name as reported by `TYPE`.
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyKind::String => "string",
            KeyKind::List => "list",
            KeyKind::Set => "set",
            KeyKind::Hash => "hash",
            KeyKind::SortedSet => "zset",
            KeyKind::Stream => "stream",
        }
    }
}

/// One entry of a stream.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEntry {
    pub id: String,
    pub fields: Vec<(Vec<u8>, Vec<u8>)>,
}

/// Full value of a key. Collections keep the order the source returned them in.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyValue {
    String(Vec<u8>),
    List(Vec<Vec<u8>>),
    Set(Vec<Vec<u8>>),
    Hash(Vec<(Vec<u8>, Vec<u8>)>),
    SortedSet(Vec<(Vec<u8>, f64)>),
    Stream(Vec<StreamEntry>),
}

impl KeyValue {
    pub fn kind(&self) -> KeyKind {
        match self {
            KeyValue::String(_) => KeyKind::String,
            KeyValue::List(_) => KeyKind::List,
            KeyValue::Set(_) => KeyKind::Set,
            KeyValue::Hash(_) => KeyKind::Hash,
            KeyValue::SortedSet(_) => KeyKind::SortedSet,
            KeyValue::Stream(_) => KeyKind::Stream,
        }
    }

    /// Number of elements (bytes for strings); used for debug logging.
    pub fn len(&self) -> usize {
        match self {
            KeyValue::String(bytes) => bytes.len(),
            KeyValue::List(items) | KeyValue::Set(items) => items.len(),
            KeyValue::Hash(fields) => fields.len(),
            KeyValue::SortedSet(members) => members.len(),
            KeyValue::Stream(entries) => entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A key together with its value and remaining time to live.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyRecord {
    pub key: Vec<u8>,
    pub value: KeyValue,
    /// `None` when the key is persistent.
    pub ttl: Option<Duration>,
}

impl KeyRecord {
    pub fn new(key: impl Into<Vec<u8>>, value: KeyValue) -> Self {
        Self {
            key: key.into(),
            value,
            ttl: None,
        }
    }

    pub fn with_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn display_key(&self) -> String {
        display_key(&self.key)
    }

    /// Shorten the TTL by `elapsed`, the time since it was sampled.
    ///
    /// Returns `false` when less than a millisecond is left: the key has
    /// expired in the source, and `PEXPIRE 0` would delete it on write.
    pub fn age_ttl(&mut self, elapsed: Duration) -> bool {
        let Some(ttl) = self.ttl else {
            return true;
        };
        // Whole milliseconds, as `PEXPIRE` will apply it.
        let left = ttl
            .checked_sub(elapsed)
            .map(|left| Duration::from_millis(left.as_millis() as u64));
        match left {
            Some(left) if left >= MIN_TTL => {
                self.ttl = Some(left);
                true
            }
            _ => false,
        }
    }
}

/// Smallest TTL `PEXPIRE` can express without deleting the key.
const MIN_TTL: Duration = Duration::from_millis(1);

/// Render a binary key for logs and reports.
pub fn display_key(key: &[u8]) -> String {
    String::from_utf8_lossy(key).into_owned()
}

/// Interpret a `PTTL` reply: `-1` means persistent, `-2` means the key is gone.
pub fn ttl_from_pttl(pttl: i64) -> Option<Duration> {
    if pttl >= 0 {
        Some(Duration::from_millis(pttl as u64))
    } else {
        None
    }
}
