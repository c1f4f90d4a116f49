//! Key and value cleaning of query parameters and result records.
//!
//! Key checks come first and short-circuit: an illegal or missing key fails
//! the call before any value is looked at. Value checks never stop at the
//! first failure; every rejected value is reported.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::error::{CleaningError, FieldValueError, ValueErrorInfo};
use crate::spec::DataSpec;
use crate::types::{CleanOptions, ParamDict, ResultDict, Value};

enum Side {
    Params,
    Results,
}

fn clean_keys<'a, I>(
    present: I,
    legal: BTreeSet<&str>,
    required: BTreeSet<&str>,
    options: &CleanOptions,
    side: Side,
) -> Result<BTreeSet<String>, CleaningError>
where
    I: IntoIterator<Item = &'a String>,
{
    let keys: BTreeSet<&str> = present
        .into_iter()
        .map(String::as_str)
        .filter(|k| !options.ignored_keys.contains(*k))
        .collect();
    let illegal_keys: BTreeSet<String> = keys
        .iter()
        .filter(|k| !legal.contains(*k) || options.forbidden_keys.contains(**k))
        .map(|k| k.to_string())
        .collect();
    let missing_keys: BTreeSet<String> = required
        .iter()
        .copied()
        .chain(options.extra_required_keys.iter().map(String::as_str))
        .filter(|k| !keys.contains(k))
        .map(str::to_string)
        .collect();

    if !illegal_keys.is_empty() || !missing_keys.is_empty() {
        let err = match side {
            Side::Params => CleaningError::ParamKeys {
                illegal_keys,
                missing_keys,
            },
            Side::Results => CleaningError::ResultKeys {
                illegal_keys,
                missing_keys,
            },
        };
        debug!(error = %err, "key cleaning failed");
        return Err(err);
    }

    Ok(keys
        .into_iter()
        .filter(|k| !options.discarded_keys.contains(*k))
        .map(str::to_string)
        .collect())
}

impl DataSpec {
    /// Check the keys of a parameter batch; returns the keys to keep.
    pub fn clean_param_keys(
        &self,
        params: &ParamDict,
        options: &CleanOptions,
    ) -> Result<BTreeSet<String>, CleaningError> {
        clean_keys(
            params.keys(),
            self.all_param_keys(),
            self.required_param_keys(),
            options,
            Side::Params,
        )
    }

    /// Check the keys of a result record; returns the keys to keep.
    pub fn clean_result_keys(
        &self,
        result: &ResultDict,
        options: &CleanOptions,
    ) -> Result<BTreeSet<String>, CleaningError> {
        clean_keys(
            result.keys(),
            self.all_result_keys(),
            self.required_result_keys(),
            options,
            Side::Results,
        )
    }

    /// Clean a batch of query parameters.
    ///
    /// A key is kept if at least one of its values was cleaned successfully;
    /// all failures are collected into one [`CleaningError::ParamValues`].
    pub fn clean_param_dict(
        &self,
        params: &ParamDict,
        options: &CleanOptions,
    ) -> Result<ParamDict, CleaningError> {
        let keys = self.clean_param_keys(params, options)?;
        let mut cleaned = ParamDict::new();
        let mut errors = Vec::new();

        for key in keys {
            let (Some(field), Some(values)) = (self.param_field(&key), params.get(&key)) else {
                continue;
            };
            if field.single_param() && values.len() > 1 {
                errors.push(ValueErrorInfo {
                    key,
                    value: Value::List(values.clone()),
                    error: FieldValueError::new("Multiple values for a single-value-only field.")
                        .into(),
                });
                continue;
            }
            let mut cleaned_values = Vec::with_capacity(values.len());
            for value in values {
                match field.clean_param_value(value) {
                    Ok(v) => cleaned_values.push(v),
                    Err(error) => errors.push(ValueErrorInfo {
                        key: key.clone(),
                        value: value.clone(),
                        error,
                    }),
                }
            }
            if !cleaned_values.is_empty() {
                cleaned.insert(key, cleaned_values);
            }
        }

        if errors.is_empty() {
            Ok(cleaned)
        } else {
            debug!(errors = errors.len(), "param value cleaning failed");
            Err(CleaningError::ParamValues { errors })
        }
    }

    /// Clean one result record.
    pub fn clean_result_dict(
        &self,
        result: &ResultDict,
        options: &CleanOptions,
    ) -> Result<ResultDict, CleaningError> {
        let keys = self.clean_result_keys(result, options)?;
        let mut cleaned = BTreeMap::new();
        let mut errors = Vec::new();

        for key in keys {
            let (Some(field), Some(value)) = (self.result_field(&key), result.get(&key)) else {
                continue;
            };
            match field.clean_result_value(value) {
                Ok(v) => {
                    cleaned.insert(key, v);
                }
                Err(error) => errors.push(ValueErrorInfo {
                    key,
                    value: value.clone(),
                    error,
                }),
            }
        }

        if errors.is_empty() {
            Ok(cleaned)
        } else {
            debug!(errors = errors.len(), "result value cleaning failed");
            Err(CleaningError::ResultValues { errors })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FieldError;
    use crate::field::{Field, FieldType};
    use crate::spec::Layer;
    use crate::types::Presence;

    fn spec() -> DataSpec {
        let cc = Field::builder(FieldType::CountryCode)
            .in_params(Presence::Optional)
            .in_result(Presence::Optional)
            .build()
            .unwrap();
        let id = Field::builder(FieldType::LimitedText)
            .max_length(8)
            .in_params(Presence::Optional)
            .in_result(Presence::Required)
            .build()
            .unwrap();
        let limit = Field::builder(FieldType::Integer)
            .min_value(1)
            .in_params(Presence::Optional)
            .single_param(true)
            .build()
            .unwrap();
        DataSpec::from_layers(vec![Layer::new()
            .field("cc", cc)
            .field("id", id)
            .field("limit", limit)])
        .unwrap()
    }

    fn params(items: &[(&str, &[&str])]) -> ParamDict {
        items
            .iter()
            .map(|(k, vs)| (k.to_string(), vs.iter().map(|v| Value::from(*v)).collect()))
            .collect()
    }

    #[test]
    fn clean_keys_sets() {
        let err = clean_keys(
            ["a".to_string(), "x".to_string()].iter(),
            BTreeSet::from(["a", "b"]),
            BTreeSet::from(["b"]),
            &CleanOptions::new(),
            Side::Params,
        )
        .unwrap_err();
        assert_eq!(
            err,
            CleaningError::ParamKeys {
                illegal_keys: BTreeSet::from(["x".to_string()]),
                missing_keys: BTreeSet::from(["b".to_string()]),
            }
        );
    }

    #[test]
    fn clean_keys_options() {
        let options = CleanOptions::new()
            .ignored(["x"])
            .forbidden(["b"])
            .extra_required(["a"])
            .discarded(["c"]);
        let present = ["a".to_string(), "c".to_string(), "x".to_string()];
        let keys = clean_keys(
            present.iter(),
            BTreeSet::from(["a", "b", "c"]),
            BTreeSet::new(),
            &options,
            Side::Results,
        )
        .unwrap();
        assert_eq!(keys, BTreeSet::from(["a".to_string()]));

        let present = ["b".to_string()];
        let err = clean_keys(
            present.iter(),
            BTreeSet::from(["a", "b"]),
            BTreeSet::new(),
            &options,
            Side::Results,
        )
        .unwrap_err();
        assert_eq!(
            err,
            CleaningError::ResultKeys {
                illegal_keys: BTreeSet::from(["b".to_string()]),
                missing_keys: BTreeSet::from(["a".to_string()]),
            }
        );
    }

    #[test]
    fn key_errors_short_circuit() {
        let spec = DataSpec::from_layers(vec![Layer::new().field(
            "cc",
            Field::builder(FieldType::CountryCode)
                .in_params(Presence::Required)
                .build()
                .unwrap(),
        )])
        .unwrap();
        let err = spec
            .clean_param_dict(&params(&[("foo", &["!"])]), &CleanOptions::new())
            .unwrap_err();
        assert!(matches!(err, CleaningError::ParamKeys { .. }));
    }

    #[test]
    fn param_errors_are_aggregated() {
        let spec = DataSpec::from_layers(vec![Layer::new()
            .field(
                "cc",
                Field::builder(FieldType::CountryCode)
                    .in_params(Presence::Optional)
                    .build()
                    .unwrap(),
            )
            .field(
                "limit",
                Field::builder(FieldType::Integer)
                    .in_params(Presence::Optional)
                    .single_param(true)
                    .build()
                    .unwrap(),
            )])
        .unwrap();
        let err = spec
            .clean_param_dict(
                &params(&[("cc", &["pl", "!!", "x"]), ("limit", &["1", "2"])]),
                &CleanOptions::new(),
            )
            .unwrap_err();
        let errors = err.value_errors();
        assert_eq!(errors.len(), 3);
        assert_eq!(errors[0].key, "cc");
        assert_eq!(errors[0].value, Value::from("!!"));
        assert_eq!(errors[2].key, "limit");
        assert_eq!(
            errors[2].value,
            Value::List(vec![Value::from("1"), Value::from("2")])
        );
        assert_eq!(
            errors[2].error.public_message(),
            Some("Multiple values for a single-value-only field.")
        );
    }

    #[test]
    fn params_are_cleaned_and_discarded() {
        let spec = spec();
        let cleaned = spec
            .clean_param_dict(
                &params(&[("cc", &["pl", "de"]), ("id", &["abc"]), ("limit", &["5"])]),
                &CleanOptions::new().discarded(["id"]),
            )
            .unwrap();
        assert_eq!(cleaned["cc"], vec![Value::from("PL"), Value::from("DE")]);
        assert_eq!(cleaned["limit"], vec![Value::Int(5)]);
        assert!(!cleaned.contains_key("id"));
    }

    #[test]
    fn result_errors_are_aggregated() {
        let spec = spec();
        let mut record = ResultDict::new();
        record.insert("id".into(), Value::from("far-too-long-id"));
        record.insert("cc".into(), Value::Int(5));
        let err = spec
            .clean_result_dict(&record, &CleanOptions::new())
            .unwrap_err();
        let errors = err.value_errors();
        assert_eq!(errors.len(), 2);
        assert!(matches!(errors[0].error, FieldError::Type { .. }));
        assert!(errors[1].error.is_too_long());
        assert_eq!(err.public_message(), "Internal error.");
    }

    #[test]
    fn result_missing_required_key() {
        let spec = spec();
        let mut record = ResultDict::new();
        record.insert("cc".into(), Value::from("PL"));
        let err = spec
            .clean_result_dict(&record, &CleanOptions::new())
            .unwrap_err();
        assert_eq!(
            err,
            CleaningError::ResultKeys {
                illegal_keys: BTreeSet::new(),
                missing_keys: BTreeSet::from(["id".to_string()]),
            }
        );
    }

    #[test]
    fn cleaned_result_cleans_again_to_itself() {
        let spec = spec();
        let mut record = ResultDict::new();
        record.insert("id".into(), Value::from("abc"));
        record.insert("cc".into(), Value::from("pl"));
        let once = spec.clean_result_dict(&record, &CleanOptions::new()).unwrap();
        let twice = spec.clean_result_dict(&once, &CleanOptions::new()).unwrap();
        assert_eq!(once, twice);
        assert_eq!(once["cc"], Value::from("PL"));
    }
}
