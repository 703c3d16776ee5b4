use std::fmt;

use chrono::NaiveDateTime;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A column value carried by a change event or produced by a hook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    /// Unsigned values that do not fit in an `i64` (BIGINT UNSIGNED).
    UInt(u64),
    Float(f64),
    String(String),
    Array(Vec<Value>),
    Object(IndexMap<String, Value>),
    /// Temporal values are only produced by hooks; the binlog feed carries
    /// timestamps as strings.
    DateTime(NaiveDateTime),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Whether this value counts as present for key lookups.
    ///
    /// Null and the empty string are treated as absent.
    pub fn is_present(&self) -> bool {
        match self {
            Value::Null => false,
            Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Value::UInt(u)
                } else if let Some(f) = n.as_f64() {
                    Value::Float(f)
                } else {
                    Value::Null
                }
            }
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(arr) => {
                Value::Array(arr.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(obj) => {
                Value::Object(obj.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Int(i) => serde_json::Value::Number(i.into()),
            Value::UInt(u) => serde_json::Value::Number(u.into()),
            Value::Float(f) => serde_json::Number::from_f64(f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s),
            Value::DateTime(dt) => {
                serde_json::Value::String(dt.format(crate::sql::DATETIME_FORMAT).to_string())
            }
            Value::Array(arr) => {
                serde_json::Value::Array(arr.into_iter().map(serde_json::Value::from).collect())
            }
            Value::Object(obj) => serde_json::Value::Object(
                obj.into_iter()
                    .map(|(k, v)| (k, serde_json::Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(dt: NaiveDateTime) -> Self {
        Value::DateTime(dt)
    }
}

/// The kind of row change carried by an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Insert,
    Update,
    Delete,
    /// Any other event type the binlog tailer emits (DDL, bootstrap markers).
    #[serde(other)]
    Other,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Insert => "insert",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Other => "other",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Column name to value, in the order the binlog tailer (or a hook) emitted them.
pub type RowMap = IndexMap<String, Value>;

/// One change event as emitted by the binlog tailer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Source database name.
    pub database: String,
    /// Source table name.
    pub table: String,
    #[serde(rename = "type")]
    pub op: Operation,
    /// Post-image (insert/update).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<RowMap>,
    /// Pre-image (delete), or the changed columns' previous values (update).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old: Option<RowMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xid: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<bool>,
}

impl ChangeEvent {
    /// Parse a single JSON line.
    pub fn from_json(line: &str) -> serde_json::Result<Self> {
        serde_json::from_str(line)
    }

    /// The payload this event's operation requires, if present and non-empty.
    ///
    /// Inserts and updates require `data`; deletes require `old`.
    pub fn required_payload(&self) -> Option<&RowMap> {
        let payload = match self.op {
            Operation::Insert | Operation::Update => self.data.as_ref(),
            Operation::Delete => self.old.as_ref(),
            Operation::Other => None,
        };
        payload.filter(|row| !row.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_presence() {
        assert!(!Value::Null.is_present());
        assert!(!Value::String(String::new()).is_present());
        assert!(Value::String("0".into()).is_present());
        assert!(Value::Int(0).is_present());
    }

    #[test]
    fn test_value_from_json_numbers() {
        assert_eq!(Value::from(serde_json::json!(42)), Value::Int(42));
        assert_eq!(
            Value::from(serde_json::json!(u64::MAX)),
            Value::UInt(u64::MAX)
        );
        assert_eq!(Value::from(serde_json::json!(1.5)), Value::Float(1.5));
    }

    #[test]
    fn test_parse_insert_event() {
        let line = r#"{"database":"app","table":"users","type":"insert","ts":1449786310,"xid":940752,"commit":true,"data":{"id":1,"name":"Alice","meta":{"tags":["a"]}}}"#;
        let event = ChangeEvent::from_json(line).unwrap();

        assert_eq!(event.database, "app");
        assert_eq!(event.table, "users");
        assert_eq!(event.op, Operation::Insert);
        assert_eq!(event.xid, Some(940752));

        let data = event.data.as_ref().unwrap();
        assert_eq!(data.get("id"), Some(&Value::Int(1)));
        assert!(matches!(data.get("meta"), Some(Value::Object(_))));
        assert!(event.required_payload().is_some());
    }

    #[test]
    fn test_columns_keep_emitted_order() {
        let line = r#"{"database":"app","table":"users","type":"insert","data":{"name":"a","id":1,"email":"x","meta":{"z":1,"a":2}}}"#;
        let event = ChangeEvent::from_json(line).unwrap();

        let data = event.data.unwrap();
        let columns: Vec<&str> = data.keys().map(String::as_str).collect();
        assert_eq!(columns, vec!["name", "id", "email", "meta"]);

        match data.get("meta") {
            Some(Value::Object(meta)) => {
                let keys: Vec<&str> = meta.keys().map(String::as_str).collect();
                assert_eq!(keys, vec!["z", "a"]);
            }
            other => panic!("expected object, got {:?}", other),
        }

        let json = serde_json::Value::from(Value::Object(
            [("b".to_string(), Value::Int(1)), ("a".to_string(), Value::Int(2))]
                .into_iter()
                .collect(),
        ));
        assert_eq!(json.to_string(), r#"{"b":1,"a":2}"#);
    }

    #[test]
    fn test_parse_unknown_type_is_other() {
        let line = r#"{"database":"app","table":"users","type":"table-create"}"#;
        let event = ChangeEvent::from_json(line).unwrap();
        assert_eq!(event.op, Operation::Other);
        assert!(event.required_payload().is_none());
    }

    #[test]
    fn test_required_payload_per_operation() {
        let delete = ChangeEvent::from_json(
            r#"{"database":"app","table":"users","type":"delete","data":{"id":1}}"#,
        )
        .unwrap();
        assert!(delete.required_payload().is_none());

        let update = ChangeEvent::from_json(
            r#"{"database":"app","table":"users","type":"update","data":{},"old":{"id":1}}"#,
        )
        .unwrap();
        assert!(update.required_payload().is_none());
    }
}
