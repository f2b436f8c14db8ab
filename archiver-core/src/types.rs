use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Keys owned by [`Post`] itself; they never appear in `fields`.
pub const RESERVED_KEYS: [&str; 3] = ["id", "username", "datestamp"];

/// One timeline entry.
///
/// Only `id`, `username` and `datestamp` are interpreted. Everything else the
/// source returned is carried in `fields` and serialized next to them, so the
/// stored JSON is the complete record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub username: String,
    pub datestamp: NaiveDate,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Post {
    pub fn new(id: impl Into<String>, username: impl Into<String>, datestamp: NaiveDate) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            datestamp,
            fields: Map::new(),
        }
    }

    /// Builds a post around a raw source record, dropping any reserved keys it carries.
    pub fn from_record(
        id: impl Into<String>,
        username: impl Into<String>,
        datestamp: NaiveDate,
        mut record: Map<String, Value>,
    ) -> Self {
        for key in RESERVED_KEYS {
            record.remove(key);
        }
        Self {
            fields: record,
            ..Self::new(id, username, datestamp)
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        if !RESERVED_KEYS.contains(&key.as_str()) {
            self.fields.insert(key, value.into());
        }
        self
    }

    /// `"{datestamp} {id}.json"`
    pub fn file_name(&self) -> String {
        format!("{} {}.json", self.datestamp_string(), self.id)
    }

    pub fn datestamp_string(&self) -> String {
        self.datestamp.format("%Y-%m-%d").to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    Written,
    Skipped,
}
