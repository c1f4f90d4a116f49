//! Loading of layer declarations, result records and parameter batches.
//!
//! A layer file is a JSON object:
//!
//! ```json
//! { "name": "custom",
//!   "fields": {
//!     "mac": { "type": "regex_text", "in_params": "optional", "regex": "^[0-9A-F:]{17}$" },
//!     "category": { "ext": { "enum_values": ["bots", "my-category"] } },
//!     "replaces": null } }
//! ```
//!
//! Under `fields`, an object with `type` declares a field, an object with
//! `ext` extends the key and `null` removes it. Inside an `ext`, `null`
//! masks, `{"ext": ...}` nests, `{"type": ...}` is a replacement field and
//! anything else is a literal argument value.

use std::path::Path;

use serde_json::Value as Json;

use crate::error::{BuildError, LoadError};
use crate::ext::{Ext, Patch};
use crate::field::{ArgValue, Args, ExtraParams, Field, FieldType};
use crate::spec::{Binding, Layer};
use crate::types::{ParamDict, Presence, ResultDict, Value};

/// Load a JSON document from a file path.
///
/// # Errors
///
/// Returns `LoadError::FileNotFound` if the file doesn't exist,
/// or `LoadError::InvalidJson` if the file isn't valid JSON.
pub fn load_json(path: &Path) -> Result<Json, LoadError> {
    if !path.exists() {
        return Err(LoadError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|source| LoadError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;

    load_json_str(&content)
}

/// Load a JSON document from a string.
pub fn load_json_str(content: &str) -> Result<Json, LoadError> {
    serde_json::from_str(content).map_err(|source| LoadError::InvalidJson { source })
}

/// Load a layer declaration file.
pub fn load_layer(path: &Path) -> Result<Layer, LoadError> {
    layer_from_json(&load_json(path)?)
}

/// Parse a layer declaration from a JSON string.
pub fn load_layer_str(content: &str) -> Result<Layer, LoadError> {
    layer_from_json(&load_json_str(content)?)
}

fn invalid(path: &str, message: impl Into<String>) -> LoadError {
    LoadError::InvalidDeclaration {
        path: path.to_string(),
        message: message.into(),
    }
}

/// Build a layer from its JSON declaration.
pub fn layer_from_json(json: &Json) -> Result<Layer, LoadError> {
    let Json::Object(root) = json else {
        return Err(invalid("/", "expected an object"));
    };
    if let Some(key) = root.keys().find(|k| *k != "name" && *k != "fields") {
        return Err(invalid("/", format!("unknown property \"{}\"", key)));
    }

    let mut layer = match root.get("name") {
        None | Some(Json::Null) => Layer::new(),
        Some(Json::String(name)) => Layer::named(name.as_str()),
        Some(_) => return Err(invalid("/name", "expected a string")),
    };

    let fields = match root.get("fields") {
        None => return Ok(layer),
        Some(Json::Object(fields)) => fields,
        Some(_) => return Err(invalid("/fields", "expected an object")),
    };
    for (key, decl) in fields {
        let path = format!("/fields/{}", key);
        let binding = match decl {
            Json::Null => Binding::Remove,
            Json::Object(obj) if obj.contains_key("type") => {
                Binding::Field(field_from_json(decl, &path)?)
            }
            Json::Object(obj) if obj.contains_key("ext") && obj.len() == 1 => {
                Binding::Ext(ext_from_json(&obj["ext"], &format!("{}/ext", path), Context::Args)?)
            }
            _ => {
                return Err(invalid(
                    &path,
                    "expected a field declaration ({\"type\": ...}), an ext ({\"ext\": {...}}) or null",
                ))
            }
        };
        layer.bind(key, binding);
    }
    Ok(layer)
}

/// Build a field from its JSON declaration (`{"type": ..., <args>}`).
pub fn field_from_json(json: &Json, path: &str) -> Result<Field, LoadError> {
    let Json::Object(obj) = json else {
        return Err(invalid(path, "expected an object"));
    };
    let field_type = match obj.get("type") {
        Some(Json::String(name)) => FieldType::parse(name).ok_or_else(|| {
            LoadError::Build(BuildError::UnknownFieldType { name: name.clone() })
        })?,
        _ => return Err(invalid(&format!("{}/type", path), "expected a field type name")),
    };

    let mut args = Args::new();
    for (name, value) in obj {
        if name == "type" || value.is_null() {
            continue;
        }
        let arg_path = format!("{}/{}", path, name);
        args.insert(name.clone(), arg_from_json(name, value, &arg_path)?);
    }
    Ok(Field::from_args(field_type, args)?)
}

/// Convert a literal argument value, using the argument name where JSON
/// alone is ambiguous.
fn arg_from_json(name: &str, value: &Json, path: &str) -> Result<ArgValue, LoadError> {
    match name {
        "in_params" | "in_result" => {
            let presence = value
                .as_str()
                .and_then(Presence::parse)
                .ok_or_else(|| invalid(path, "expected one of: required, optional, absent"))?;
            return Ok(ArgValue::Presence(presence));
        }
        "extra_params" => {
            let Json::Object(subs) = value else {
                return Err(invalid(path, "expected an object"));
            };
            let mut fields = ExtraParams::new();
            for (sub, decl) in subs {
                let sub_path = format!("{}/{}", path, sub);
                let field = match decl {
                    Json::Null => None,
                    _ => Some(field_from_json(decl, &sub_path)?),
                };
                fields.insert(sub.clone(), field);
            }
            return Ok(ArgValue::Fields(fields));
        }
        "custom_info" => return Ok(ArgValue::Json(value.clone())),
        _ => {}
    }

    match value {
        Json::Bool(b) => Ok(ArgValue::Bool(*b)),
        Json::Number(n) => n
            .as_i64()
            .map(ArgValue::Int)
            .ok_or_else(|| invalid(path, "expected an integer")),
        Json::String(s) => Ok(ArgValue::Text(s.clone())),
        Json::Array(items) => items
            .iter()
            .map(|item| item.as_str().map(String::from))
            .collect::<Option<Vec<_>>>()
            .map(ArgValue::TextList)
            .ok_or_else(|| invalid(path, "expected a list of strings")),
        _ => Ok(ArgValue::Json(value.clone())),
    }
}

/// What an Ext's entries stand for.
#[derive(Clone, Copy)]
enum Context {
    /// Field constructor arguments.
    Args,
    /// Sub-fields of `extra_params`.
    ExtraParams,
    /// Plain JSON data (`custom_info`).
    Json,
}

fn ext_from_json(json: &Json, path: &str, context: Context) -> Result<Ext, LoadError> {
    let Json::Object(obj) = json else {
        return Err(invalid(path, "expected an object"));
    };
    let mut ext = Ext::new();
    for (name, value) in obj {
        let entry_path = format!("{}/{}", path, name);
        let nested = match value {
            Json::Object(inner) if inner.contains_key("ext") && inner.len() == 1 => {
                Some(&inner["ext"])
            }
            _ => None,
        };
        let patch = match (context, value, nested) {
            (_, Json::Null, _) => Patch::Mask,
            (_, _, Some(inner)) => {
                let inner_context = match context {
                    Context::Args if name == "extra_params" => Context::ExtraParams,
                    Context::Args | Context::Json => Context::Json,
                    Context::ExtraParams => Context::Args,
                };
                Patch::Ext(ext_from_json(inner, &format!("{}/ext", entry_path), inner_context)?)
            }
            (Context::ExtraParams, Json::Object(_), None) => {
                Patch::Field(field_from_json(value, &entry_path)?)
            }
            (Context::ExtraParams, _, None) => {
                return Err(invalid(&entry_path, "expected a field declaration, an ext or null"))
            }
            (Context::Json, _, None) => Patch::Set(ArgValue::Json(value.clone())),
            (Context::Args, _, None) => Patch::Set(arg_from_json(name, value, &entry_path)?),
        };
        ext.insert(name, patch);
    }
    Ok(ext)
}

/// Load result records from a file holding one object or an array of
/// objects.
pub fn load_records(path: &Path) -> Result<Vec<ResultDict>, LoadError> {
    records_from_json(&load_json(path)?)
}

/// Convert a JSON object, or an array of objects, into result records.
pub fn records_from_json(json: &Json) -> Result<Vec<ResultDict>, LoadError> {
    let to_record = |value: &Json, path: String| match value {
        Json::Object(map) => Ok(map
            .iter()
            .map(|(k, v)| (k.clone(), Value::from(v.clone())))
            .collect::<ResultDict>()),
        _ => Err(LoadError::InvalidInput {
            path,
            message: "expected an object".to_string(),
        }),
    };
    match json {
        Json::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| to_record(item, format!("/{}", i)))
            .collect(),
        other => Ok(vec![to_record(other, "/".to_string())?]),
    }
}

/// Build a parameter batch from `key=value` pairs.
///
/// Values are split on commas and appended per key, so `ip=1.2.3.4,5.6.7.8`
/// and `ip=1.2.3.4 ip=5.6.7.8` give the same batch.
pub fn param_dict_from_pairs<I, S>(pairs: I) -> Result<ParamDict, LoadError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut params = ParamDict::new();
    for pair in pairs {
        let pair = pair.as_ref();
        let (key, values) = pair.split_once('=').ok_or_else(|| LoadError::InvalidInput {
            path: pair.to_string(),
            message: "expected KEY=VALUE".to_string(),
        })?;
        params
            .entry(key.to_string())
            .or_default()
            .extend(values.split(',').map(Value::from));
    }
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn load_json_valid_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"name": "x"}}"#).unwrap();

        let json = load_json(file.path()).unwrap();
        assert_eq!(json["name"], "x");
    }

    #[test]
    fn load_json_file_not_found() {
        let result = load_json(Path::new("/nonexistent/path.json"));
        assert!(matches!(result, Err(LoadError::FileNotFound { .. })));
    }

    #[test]
    fn load_json_invalid() {
        let result = load_json_str("not json");
        assert!(matches!(result, Err(LoadError::InvalidJson { .. })));
    }

    #[test]
    fn layer_bindings() {
        let layer = load_layer_str(
            r#"{
                "name": "custom",
                "fields": {
                    "mac": {"type": "regex_text", "in_params": "optional",
                            "regex": "^[0-9A-F:]{17}$"},
                    "category": {"ext": {"enum_values": ["bots", "other"]}},
                    "replaces": null
                }
            }"#,
        )
        .unwrap();
        assert_eq!(layer.name(), Some("custom"));
        let Some(Binding::Field(mac)) = layer.get("mac") else {
            panic!("expected field");
        };
        assert_eq!(mac.field_type(), FieldType::RegexText);
        assert_eq!(mac.in_params(), Presence::Optional);
        assert_eq!(
            layer.get("category"),
            Some(&Binding::Ext(Ext::new().set(
                "enum_values",
                vec!["bots".to_string(), "other".to_string()]
            )))
        );
        assert_eq!(layer.get("replaces"), Some(&Binding::Remove));
    }

    #[test]
    fn nested_ext_contexts() {
        let ext = ext_from_json(
            &json!({
                "custom_info": {"ext": {"extra": {"a": 1}, "gone": null}},
                "extra_params": {"ext": {
                    "max": null,
                    "min": {"ext": {"single_param": false}},
                    "until": {"type": "date_time", "in_params": "optional"}
                }}
            }),
            "/",
            Context::Args,
        )
        .unwrap();

        let Some(Patch::Ext(info)) = ext.get("custom_info") else {
            panic!("expected nested ext");
        };
        assert_eq!(info.get("extra"), Some(&Patch::Set(ArgValue::Json(json!({"a": 1})))));
        assert_eq!(info.get("gone"), Some(&Patch::Mask));

        let Some(Patch::Ext(extra)) = ext.get("extra_params") else {
            panic!("expected nested ext");
        };
        assert_eq!(extra.get("max"), Some(&Patch::Mask));
        assert_eq!(
            extra.get("min"),
            Some(&Patch::Ext(Ext::new().set("single_param", false)))
        );
        assert!(matches!(extra.get("until"), Some(Patch::Field(_))));
    }

    #[test]
    fn field_declaration_errors() {
        let err = load_layer_str(r#"{"fields": {"x": {"type": "nope"}}}"#).unwrap_err();
        assert!(matches!(
            err,
            LoadError::Build(BuildError::UnknownFieldType { .. })
        ));

        let err = load_layer_str(r#"{"fields": {"x": {"type": "text", "in_params": "maybe"}}}"#)
            .unwrap_err();
        match err {
            LoadError::InvalidDeclaration { path, .. } => assert_eq!(path, "/fields/x/in_params"),
            other => panic!("unexpected {other:?}"),
        }

        let err = load_layer_str(r#"{"fields": {"x": 5}}"#).unwrap_err();
        assert!(matches!(err, LoadError::InvalidDeclaration { .. }));

        let err = load_layer_str(r#"{"fields": {}, "extra": 1}"#).unwrap_err();
        assert!(matches!(err, LoadError::InvalidDeclaration { .. }));

        let err = load_layer_str(r#"{"fields": {"x": {"type": "date_time", "max_length": 3}}}"#)
            .unwrap_err();
        assert!(matches!(
            err,
            LoadError::Build(BuildError::UnexpectedArgument { .. })
        ));
    }

    #[test]
    fn extra_params_declaration() {
        let field = field_from_json(
            &json!({
                "type": "date_time",
                "in_result": "required",
                "extra_params": {
                    "min": {"type": "date_time", "in_params": "optional", "single_param": true},
                    "max": null
                }
            }),
            "/",
        )
        .unwrap();
        assert_eq!(field.extra_params().get("max"), Some(&None));
        assert!(field.extra_params()["min"].as_ref().unwrap().single_param());
    }

    #[test]
    fn records() {
        let records = records_from_json(&json!([{"id": "a"}, {"id": "b", "count": 3}])).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1]["count"], Value::Int(3));

        let single = records_from_json(&json!({"id": "a"})).unwrap();
        assert_eq!(single.len(), 1);

        assert!(matches!(
            records_from_json(&json!([1])),
            Err(LoadError::InvalidInput { .. })
        ));
    }

    #[test]
    fn params_from_pairs() {
        let params = param_dict_from_pairs(["ip=1.2.3.4,5.6.7.8", "ip=9.9.9.9", "cc=PL"]).unwrap();
        assert_eq!(params["ip"].len(), 3);
        assert_eq!(params["cc"], vec![Value::from("PL")]);
        assert!(param_dict_from_pairs(["nope"]).is_err());
    }
}
