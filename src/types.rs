//! Core types shared by field specifications and the cleaning pipelines.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Query parameters as handed over by the transport layer: each key maps to a
/// non-empty list of raw values (already split on commas).
pub type ParamDict = BTreeMap<String, Vec<Value>>;

/// One result record: each key maps to a single (raw or typed) value.
pub type ResultDict = BTreeMap<String, Value>;

/// Whether a field may (or must) appear on one side of the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    /// The key must be present.
    Required,
    /// The key may be present.
    Optional,
    /// The key is not legal on this side.
    #[default]
    Absent,
}

impl Presence {
    /// Parse a presence value from a string.
    ///
    /// Returns `None` for unknown values (caller should error).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "required" => Some(Presence::Required),
            "optional" => Some(Presence::Optional),
            "absent" => Some(Presence::Absent),
            _ => None,
        }
    }

    /// True for `Required` and `Optional`.
    pub fn is_present(&self) -> bool {
        !matches!(self, Presence::Absent)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Presence::Required => "required",
            Presence::Optional => "optional",
            Presence::Absent => "absent",
        }
    }
}

/// Selects a subset of field specifications for introspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Which {
    #[default]
    All,
    Required,
    Optional,
}

impl Which {
    /// Parse a selector from a string.
    ///
    /// Returns `None` for unknown values (caller should error).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "all" => Some(Which::All),
            "required" => Some(Which::Required),
            "optional" => Some(Which::Optional),
            _ => None,
        }
    }
}

/// A raw or cleaned data value.
///
/// Parameter values arrive as `Str` (or `Bytes` when the transport could not
/// decode them); result values may be anything the data backend produced.
/// Cleaning converts them into their canonical typed form.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    /// Canonical timestamp (UTC).
    DateTime(DateTime<Utc>),
    /// Timezone-aware timestamp with an arbitrary offset.
    ZonedDateTime(DateTime<FixedOffset>),
    /// Naive timestamp, interpreted as UTC.
    NaiveDateTime(NaiveDateTime),
    /// Network address with prefix length, e.g. `("10.0.0.0", 24)`.
    Net(String, u8),
    List(Vec<Value>),
    Dict(BTreeMap<String, Value>),
}

impl Value {
    /// Returns the value type name for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::DateTime(_) | Value::ZonedDateTime(_) | Value::NaiveDateTime(_) => "datetime",
            Value::Net(..) => "network",
            Value::List(_) => "list",
            Value::Dict(_) => "dict",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// True for `Str` and `Bytes`.
    pub fn is_text(&self) -> bool {
        matches!(self, Value::Str(_) | Value::Bytes(_))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(dt: DateTime<Utc>) -> Self {
        Value::DateTime(dt)
    }
}

impl From<DateTime<FixedOffset>> for Value {
    fn from(dt: DateTime<FixedOffset>) -> Self {
        Value::ZonedDateTime(dt)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Value::Dict(map)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Dict(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

/// Caller-side adjustments of the key checks performed by the cleaning
/// pipelines.
#[derive(Debug, Clone, Default)]
pub struct CleanOptions {
    /// Keys removed from the input before any check.
    pub ignored_keys: BTreeSet<String>,
    /// Keys treated as illegal even if the spec declares them.
    pub forbidden_keys: BTreeSet<String>,
    /// Keys treated as required in addition to the declared ones.
    pub extra_required_keys: BTreeSet<String>,
    /// Keys that pass the key checks but are dropped from the output.
    pub discarded_keys: BTreeSet<String>,
}

impl CleanOptions {
    /// Create options that leave the declared key sets untouched.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ignored<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignored_keys.extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn forbidden<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.forbidden_keys.extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn extra_required<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_required_keys
            .extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn discarded<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.discarded_keys.extend(keys.into_iter().map(Into::into));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn presence_parse_valid() {
        assert_eq!(Presence::parse("required"), Some(Presence::Required));
        assert_eq!(Presence::parse("optional"), Some(Presence::Optional));
        assert_eq!(Presence::parse("absent"), Some(Presence::Absent));
    }

    #[test]
    fn presence_parse_invalid() {
        assert_eq!(Presence::parse("Required"), None);
        assert_eq!(Presence::parse("maybe"), None);
        assert_eq!(Presence::parse(""), None);
    }

    #[test]
    fn which_parse() {
        assert_eq!(Which::parse("all"), Some(Which::All));
        assert_eq!(Which::parse("optional"), Some(Which::Optional));
        assert_eq!(Which::parse("some"), None);
    }

    #[test]
    fn value_from_json() {
        let value = Value::from(json!({
            "ip": "10.0.0.1",
            "asn": 80000,
            "tags": [true, null, 1.5]
        }));
        let Value::Dict(map) = value else {
            panic!("expected dict");
        };
        assert_eq!(map["ip"], Value::from("10.0.0.1"));
        assert_eq!(map["asn"], Value::Int(80000));
        assert_eq!(
            map["tags"],
            Value::List(vec![Value::Bool(true), Value::Null, Value::Float(1.5)])
        );
    }

    #[test]
    fn value_serializes_untagged() {
        let value = Value::List(vec![Value::Net("10.0.0.0".into(), 24), Value::Int(5)]);
        assert_eq!(
            serde_json::to_value(&value).unwrap(),
            json!([["10.0.0.0", 24], 5])
        );
    }

    #[test]
    fn clean_options_builder() {
        let opts = CleanOptions::new()
            .ignored(["ip"])
            .forbidden(vec!["cc".to_string()])
            .extra_required(["id"])
            .discarded(["asn"]);
        assert!(opts.ignored_keys.contains("ip"));
        assert!(opts.forbidden_keys.contains("cc"));
        assert!(opts.extra_required_keys.contains("id"));
        assert!(opts.discarded_keys.contains("asn"));
    }
}
