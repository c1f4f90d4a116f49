//! Field specifications.
//!
//! A [`Field`] describes one key of the API: whether it is legal (or
//! required) among query parameters and in result records, whether a query
//! may give it several values, which sub-keys (`extra_params`) it spawns, and
//! how its values are cleaned. Fields are built from a [`FieldType`] plus
//! constructor arguments ([`Args`]), either through [`FieldBuilder`] or from
//! an [`Ext`](crate::ext::Ext) applied to an existing field.

mod composite;
mod datetime;
mod kind;
mod number;
mod text;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::json;

pub use datetime::parse_iso_datetime_to_utc;
pub use kind::{FieldType, COMMON_ARGS};

use crate::encoding::{ascii_repr, ByteDecoding};
use crate::error::{BuildError, FieldError};
use crate::types::{Presence, Value};
use composite::{check_plain_dict, DictRules, ListRules};
use kind::ArgReader;
use number::IntegerRules;
use text::{split_network, Owner, TextRules};

/// Constructor arguments of a field, by name.
pub type Args = BTreeMap<String, ArgValue>;

/// Sub-fields of a field, by name. `None` marks a sub-field masked out by an
/// Ext: it spawns no key.
pub type ExtraParams = BTreeMap<String, Option<Field>>;

/// A single constructor argument.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Presence(Presence),
    Bool(bool),
    Int(i64),
    Text(String),
    TextList(Vec<String>),
    Json(serde_json::Value),
    Fields(ExtraParams),
}

impl ArgValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            ArgValue::Presence(_) => "presence",
            ArgValue::Bool(_) => "boolean",
            ArgValue::Int(_) => "integer",
            ArgValue::Text(_) => "string",
            ArgValue::TextList(_) => "list of strings",
            ArgValue::Json(_) => "JSON value",
            ArgValue::Fields(_) => "mapping of fields",
        }
    }

    /// JSON form of the argument, as used inside `custom_info`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ArgValue::Presence(p) => json!(p.as_str()),
            ArgValue::Bool(b) => json!(b),
            ArgValue::Int(n) => json!(n),
            ArgValue::Text(s) => json!(s),
            ArgValue::TextList(items) => json!(items),
            ArgValue::Json(v) => v.clone(),
            ArgValue::Fields(fields) => serde_json::Value::Object(
                fields
                    .iter()
                    .map(|(k, f)| (k.clone(), f.as_ref().map_or(json!(null), Field::describe)))
                    .collect(),
            ),
        }
    }
}

impl From<Presence> for ArgValue {
    fn from(p: Presence) -> Self {
        ArgValue::Presence(p)
    }
}

impl From<bool> for ArgValue {
    fn from(b: bool) -> Self {
        ArgValue::Bool(b)
    }
}

impl From<i64> for ArgValue {
    fn from(n: i64) -> Self {
        ArgValue::Int(n)
    }
}

impl From<usize> for ArgValue {
    fn from(n: usize) -> Self {
        ArgValue::Int(i64::try_from(n).unwrap_or(i64::MAX))
    }
}

impl From<&str> for ArgValue {
    fn from(s: &str) -> Self {
        ArgValue::Text(s.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(s: String) -> Self {
        ArgValue::Text(s)
    }
}

impl From<Vec<String>> for ArgValue {
    fn from(items: Vec<String>) -> Self {
        ArgValue::TextList(items)
    }
}

impl From<ByteDecoding> for ArgValue {
    fn from(d: ByteDecoding) -> Self {
        ArgValue::Text(d.as_str().to_string())
    }
}

impl From<serde_json::Value> for ArgValue {
    fn from(v: serde_json::Value) -> Self {
        ArgValue::Json(v)
    }
}

impl From<ExtraParams> for ArgValue {
    fn from(fields: ExtraParams) -> Self {
        ArgValue::Fields(fields)
    }
}

static NEXT_FIELD_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a field instance. Clones share it; every construction gets a
/// fresh one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId(u64);

impl FieldId {
    fn next() -> Self {
        FieldId(NEXT_FIELD_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Cleaning behaviour resolved at construction.
#[derive(Debug, Clone)]
pub(crate) enum Rules {
    Passthrough,
    Text(TextRules),
    Network(TextRules),
    DateTime,
    Integer(IntegerRules),
    TextList(ListRules, TextRules),
    Dicts(ListRules, Option<DictRules>),
}

/// An immutable field specification.
#[derive(Debug, Clone)]
pub struct Field {
    id: FieldId,
    field_type: FieldType,
    in_result: Presence,
    in_params: Presence,
    single_param: bool,
    extra_params: ExtraParams,
    custom_info: serde_json::Map<String, serde_json::Value>,
    rules: Rules,
    init_args: Args,
}

impl PartialEq for Field {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Field {
    /// Start building a field of the given type.
    pub fn builder(field_type: FieldType) -> FieldBuilder {
        FieldBuilder {
            field_type,
            args: Args::new(),
        }
    }

    /// Construct a field from raw constructor arguments.
    ///
    /// Fails on arguments the type does not accept, on ill-typed arguments
    /// and on obligatory arguments missing from both the type defaults and
    /// `args`.
    pub fn from_args(field_type: FieldType, args: Args) -> Result<Field, BuildError> {
        if let Some(name) = args.keys().find(|name| !field_type.accepts(name)) {
            return Err(BuildError::UnexpectedArgument {
                field_type,
                arg: name.clone(),
            });
        }
        let reader = ArgReader {
            field_type,
            args: &args,
        };

        let extra_params = match args.get("extra_params") {
            None => ExtraParams::new(),
            Some(ArgValue::Fields(fields)) => fields.clone(),
            Some(other) => {
                return Err(BuildError::InvalidArgumentType {
                    field_type,
                    arg: "extra_params".to_string(),
                    expected: "mapping of fields",
                    actual: other.type_name().to_string(),
                })
            }
        };
        for name in extra_params.keys() {
            kind::check_subname(name)?;
        }

        let custom_info = match args.get("custom_info") {
            None => serde_json::Map::new(),
            Some(ArgValue::Json(serde_json::Value::Object(map))) => map.clone(),
            Some(other) => {
                return Err(BuildError::InvalidArgumentType {
                    field_type,
                    arg: "custom_info".to_string(),
                    expected: "JSON object",
                    actual: other.type_name().to_string(),
                })
            }
        };

        let in_result = reader.presence("in_result")?;
        let in_params = reader.presence("in_params")?;
        let single_param = reader.bool("single_param")?.unwrap_or(false);
        let rules = kind::build_rules(&reader)?;

        Ok(Field {
            id: FieldId::next(),
            field_type,
            in_result,
            in_params,
            single_param,
            extra_params,
            custom_info,
            rules,
            init_args: args,
        })
    }

    pub fn id(&self) -> FieldId {
        self.id
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    pub fn in_result(&self) -> Presence {
        self.in_result
    }

    pub fn in_params(&self) -> Presence {
        self.in_params
    }

    pub fn single_param(&self) -> bool {
        self.single_param
    }

    pub fn extra_params(&self) -> &ExtraParams {
        &self.extra_params
    }

    pub fn custom_info(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.custom_info
    }

    /// The arguments this field was constructed with.
    pub fn init_args(&self) -> &Args {
        &self.init_args
    }

    /// Length limit of a single text value, if any.
    pub fn max_length(&self) -> Option<usize> {
        match &self.rules {
            Rules::Text(t) | Rules::Network(t) | Rules::TextList(_, t) => t.max_length,
            _ => None,
        }
    }

    pub fn enum_values(&self) -> Option<&[String]> {
        match &self.rules {
            Rules::Text(t) => t.enum_values.as_deref(),
            _ => None,
        }
    }

    /// Keys allowed inside each dictionary of an address-like field.
    pub fn dict_keys(&self) -> Option<Vec<&str>> {
        kind::dict_keys(&self.rules).map(|keys| keys.into_iter().collect())
    }

    fn owner(&self) -> Owner {
        Owner {
            id: self.id,
            field_type: self.field_type,
        }
    }

    /// Clean one raw query parameter value.
    pub fn clean_param_value(&self, value: &Value) -> Result<Value, FieldError> {
        let owner = self.owner();
        match &self.rules {
            Rules::Passthrough => {
                if value.is_text() {
                    Ok(value.clone())
                } else {
                    Err(FieldError::type_error(format!(
                        "{} is not a str/unicode instance",
                        ascii_repr(value)
                    )))
                }
            }
            Rules::Text(t) | Rules::TextList(_, t) => t.clean_param(owner, value).map(Value::Str),
            Rules::Network(t) => {
                let cleaned = t.clean_param(owner, value)?;
                split_network(&cleaned)
                    .map(|(ip, prefix)| Value::Net(ip, prefix))
                    .ok_or_else(|| t.template_error(&cleaned))
            }
            Rules::DateTime => datetime::clean_param(value).map(Value::DateTime),
            Rules::Integer(rules) => rules.clean_param(value).map(Value::Int),
            Rules::Dicts(..) => Err(FieldError::NotImplemented {
                message: "it's a result-only field".to_string(),
            }),
        }
    }

    /// Clean one raw result value.
    pub fn clean_result_value(&self, value: &Value) -> Result<Value, FieldError> {
        let owner = self.owner();
        match &self.rules {
            Rules::Passthrough => Ok(value.clone()),
            Rules::Text(t) => t.clean_result(owner, value).map(Value::Str),
            Rules::Network(t) => {
                let text = match value {
                    Value::Net(ip, prefix) => Value::Str(format!("{}/{}", ip, prefix)),
                    Value::List(items) => match items.as_slice() {
                        [Value::Str(ip), Value::Int(prefix)] => {
                            Value::Str(format!("{}/{}", ip, prefix))
                        }
                        _ => return Err(t.template_error(&ascii_repr(value))),
                    },
                    Value::Str(_) | Value::Bytes(_) => value.clone(),
                    other => return Err(t.template_error(&ascii_repr(other))),
                };
                t.clean_result(owner, &text).map(Value::Str)
            }
            Rules::DateTime => datetime::clean_result(value).map(Value::DateTime),
            Rules::Integer(rules) => rules.clean_result(value).map(Value::Int),
            Rules::TextList(list, t) => list.clean(owner, t.max_length, value, |item| {
                t.clean_result(owner, item).map(Value::Str)
            }),
            Rules::Dicts(list, Some(dict)) => {
                list.clean(owner, None, value, |item| dict.clean(item))
            }
            Rules::Dicts(list, None) => list.clean(owner, None, value, check_plain_dict),
        }
    }

    /// JSON summary of the field, for introspection output.
    pub fn describe(&self) -> serde_json::Value {
        let mut out = json!({
            "type": self.field_type,
            "in_params": self.in_params,
            "in_result": self.in_result,
            "single_param": self.single_param,
        });
        if let Some(max_length) = self.max_length() {
            out["max_length"] = json!(max_length);
        }
        if let Some(values) = self.enum_values() {
            out["enum_values"] = json!(values);
        }
        if let Some(keys) = self.dict_keys() {
            out["dict_keys"] = json!(keys);
        }
        if !self.custom_info.is_empty() {
            out["custom_info"] = serde_json::Value::Object(self.custom_info.clone());
        }
        out
    }
}

/// Builder for [`Field`].
#[derive(Debug, Clone)]
pub struct FieldBuilder {
    field_type: FieldType,
    args: Args,
}

impl FieldBuilder {
    /// Set any constructor argument by name.
    pub fn arg(mut self, name: &str, value: impl Into<ArgValue>) -> Self {
        self.args.insert(name.to_string(), value.into());
        self
    }

    pub fn in_params(self, presence: Presence) -> Self {
        self.arg("in_params", presence)
    }

    pub fn in_result(self, presence: Presence) -> Self {
        self.arg("in_result", presence)
    }

    pub fn single_param(self, single: bool) -> Self {
        self.arg("single_param", single)
    }

    /// Add a sub-field spawning the key `<key>.<name>`.
    pub fn extra_param(mut self, name: &str, field: Field) -> Self {
        let mut fields = match self.args.remove("extra_params") {
            Some(ArgValue::Fields(fields)) => fields,
            _ => ExtraParams::new(),
        };
        fields.insert(name.to_string(), Some(field));
        self.arg("extra_params", fields)
    }

    pub fn custom_info(self, info: serde_json::Value) -> Self {
        self.arg("custom_info", info)
    }

    pub fn max_length(self, n: usize) -> Self {
        self.arg("max_length", n)
    }

    pub fn checking_bytes_length(self, yes: bool) -> Self {
        self.arg("checking_bytes_length", yes)
    }

    pub fn encoding_errors(self, decoding: ByteDecoding) -> Self {
        self.arg("encoding_errors", decoding)
    }

    pub fn enum_values<I, S>(self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        self.arg("enum_values", values)
    }

    pub fn regex(self, pattern: &str) -> Self {
        self.arg("regex", pattern)
    }

    pub fn error_msg_template(self, template: &str) -> Self {
        self.arg("error_msg_template", template)
    }

    pub fn min_value(self, n: i64) -> Self {
        self.arg("min_value", n)
    }

    pub fn max_value(self, n: i64) -> Self {
        self.arg("max_value", n)
    }

    pub fn num_of_characters(self, n: usize) -> Self {
        self.arg("num_of_characters", n)
    }

    pub fn hash_algo_descr(self, descr: &str) -> Self {
        self.arg("hash_algo_descr", descr)
    }

    pub fn allow_empty(self, yes: bool) -> Self {
        self.arg("allow_empty", yes)
    }

    pub fn build(self) -> Result<Field, BuildError> {
        Field::from_args(self.field_type, self.args)
    }
}
