//! SQL text synthesis for the destination database.
//!
//! Statements are built as plain text with every literal encoded inline.
//! Escaping and identifier quoting are always delegated to the destination
//! connection through [`Escape`].

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};
use crate::table::TableConfig;
use crate::types::{Operation, RowMap, Value};

/// Format used for temporal literals.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Quoting primitives of the destination connection.
pub trait Escape {
    /// Escape `text` for use inside a single-quoted string literal.
    fn escape(&self, text: &str) -> String;

    /// Quote a table or column name.
    fn quote_identifier(&self, name: &str) -> String;
}

static BARE_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([{,]\s*)(\w+)(\s*:)").expect("bare key pattern is valid"));

static BARE_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#":\s*([^",\s\d\[\]{}-].*?)(,|\}|$)"#).expect("bare value pattern is valid")
});

/// Build the statement for one event.
///
/// `new` is the hook-transformed post-image and supplies the written values.
/// `old` is the pre-image and `data` the post-image as received; an update's
/// key is looked up in `old`, then in `data`.
pub fn synthesize<E: Escape + ?Sized>(
    op: Operation,
    table: &TableConfig,
    new: Option<&RowMap>,
    old: Option<&RowMap>,
    data: Option<&RowMap>,
    esc: &E,
) -> Result<String> {
    match op {
        Operation::Insert => {
            let record = new.ok_or(Error::MissingPayload(op))?;
            Ok(insert(table, record, esc))
        }
        Operation::Update => {
            let record = new.ok_or(Error::MissingPayload(op))?;
            update(table, record, old, data, esc)
        }
        Operation::Delete => delete(table, old, esc),
        Operation::Other => Err(Error::UnsupportedOperation(op)),
    }
}

/// `INSERT INTO t (cols) VALUES (vals)`.
pub fn insert<E: Escape + ?Sized>(table: &TableConfig, record: &RowMap, esc: &E) -> String {
    let columns: Vec<String> = record.keys().map(|k| esc.quote_identifier(k)).collect();
    let values: Vec<String> = record.values().map(|v| encode_value(v, esc)).collect();

    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        esc.quote_identifier(&table.table_name),
        columns.join(","),
        values.join(",")
    )
}

/// `UPDATE t SET col = val,... WHERE pk = val`.
///
/// The key comes from `old`, falling back to the untransformed `data`, so a
/// hook that rewrites the key column still targets the original row.
pub fn update<E: Escape + ?Sized>(
    table: &TableConfig,
    record: &RowMap,
    old: Option<&RowMap>,
    data: Option<&RowMap>,
    esc: &E,
) -> Result<String> {
    let set_clause: Vec<String> = record
        .iter()
        .map(|(k, v)| format!("{} = {}", esc.quote_identifier(k), encode_value(v, esc)))
        .collect();
    let where_clause = where_clause(&table.primary_key, old, data, esc)?;

    Ok(format!(
        "UPDATE {} SET {} WHERE {}",
        esc.quote_identifier(&table.table_name),
        set_clause.join(","),
        where_clause
    ))
}

/// `DELETE FROM t WHERE pk = val`, keyed on the pre-image only.
pub fn delete<E: Escape + ?Sized>(
    table: &TableConfig,
    old: Option<&RowMap>,
    esc: &E,
) -> Result<String> {
    let where_clause = where_clause(&table.primary_key, old, None, esc)?;

    Ok(format!(
        "DELETE FROM {} WHERE {}",
        esc.quote_identifier(&table.table_name),
        where_clause
    ))
}

/// Primary key predicate; the pre-image wins over the post-image.
fn where_clause<E: Escape + ?Sized>(
    primary_key: &str,
    old: Option<&RowMap>,
    data: Option<&RowMap>,
    esc: &E,
) -> Result<String> {
    let lookup = |row: Option<&RowMap>| {
        row.and_then(|r| r.get(primary_key))
            .filter(|v| v.is_present())
            .cloned()
    };

    let value = lookup(old)
        .or_else(|| lookup(data))
        .ok_or_else(|| Error::PrimaryKeyMissing(primary_key.to_string()))?;

    Ok(format!(
        "{} = {}",
        esc.quote_identifier(primary_key),
        encode_value(&value, esc)
    ))
}

/// Encode a value as an inline SQL literal.
pub fn encode_value<E: Escape + ?Sized>(value: &Value, esc: &E) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => (if *b { "1" } else { "0" }).to_string(),
        Value::Int(i) => i.to_string(),
        Value::UInt(u) => u.to_string(),
        Value::Float(f) if f.is_finite() => f.to_string(),
        Value::Float(_) => "NULL".to_string(),
        Value::DateTime(dt) => format!("'{}'", dt.format(DATETIME_FORMAT)),
        Value::String(s) if looks_like_json(s) => quote(&repair_json(s), esc),
        Value::String(s) => quote(s, esc),
        Value::Array(_) | Value::Object(_) => {
            let json = serde_json::Value::from(value.clone());
            quote(&json.to_string(), esc)
        }
    }
}

fn quote<E: Escape + ?Sized>(text: &str, esc: &E) -> String {
    format!("'{}'", esc.escape(text))
}

fn looks_like_json(text: &str) -> bool {
    text.starts_with('{') || text.starts_with('[')
}

/// Best-effort repair of JSON-looking text.
///
/// Valid JSON is returned unchanged. Otherwise bare object keys and bare
/// scalar values are quoted and the result is parsed once more; if it still
/// fails, the raw text is returned JSON-encoded as a string.
pub fn repair_json(text: &str) -> String {
    if is_valid_json(text) {
        return text.to_string();
    }

    let repaired = BARE_KEY.replace_all(text, "${1}\"${2}\"${3}");
    let repaired = BARE_VALUE.replace_all(&repaired, ": \"${1}\"${2}");

    if is_valid_json(&repaired) {
        repaired.into_owned()
    } else {
        serde_json::Value::String(text.to_string()).to_string()
    }
}

fn is_valid_json(text: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(text).is_ok()
}
