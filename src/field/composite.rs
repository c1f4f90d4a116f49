//! List-valued result fields and the address dictionaries they carry.

use std::collections::{BTreeMap, BTreeSet};

use crate::encoding::ascii_repr;
use crate::error::{FieldError, FieldValueError};
use crate::types::Value;

use super::text::Owner;
use super::Field;

#[derive(Debug, Clone)]
pub(crate) struct ListRules {
    pub allow_empty: bool,
}

impl ListRules {
    /// Clean every item of a list value.
    ///
    /// Too-long errors raised by the owning field itself are collected and
    /// reported once for the whole list; any other error aborts.
    pub fn clean<F>(
        &self,
        owner: Owner,
        max_length: Option<usize>,
        value: &Value,
        mut clean_item: F,
    ) -> Result<Value, FieldError>
    where
        F: FnMut(&Value) -> Result<Value, FieldError>,
    {
        let Value::List(items) = value else {
            return Err(FieldError::type_error(format!(
                "{} is not a non-string sequence",
                ascii_repr(value)
            )));
        };
        if items.is_empty() && !self.allow_empty {
            return Err(FieldError::invalid("empty sequence given"));
        }

        let mut checked = Vec::with_capacity(items.len());
        let mut too_long = None;
        for item in items {
            match clean_item(item) {
                Ok(cleaned) => checked.push(cleaned),
                Err(FieldError::Value(FieldValueError::TooLong {
                    field,
                    checked_value,
                    max_length: item_max,
                    ..
                })) if field == owner.id => {
                    too_long = Some(item_max);
                    checked.push(checked_value);
                }
                Err(e) => return Err(e),
            }
        }

        match too_long {
            None => Ok(Value::List(checked)),
            Some(item_max) => {
                let max_length = max_length.unwrap_or(item_max);
                let public_message = format!(
                    "Length of at least one item of list {} is greater than {}",
                    ascii_repr(&Value::List(checked.clone())),
                    max_length
                );
                Err(FieldValueError::TooLong {
                    field: owner.id,
                    field_type: owner.field_type,
                    checked_value: Value::List(checked),
                    max_length,
                    public_message,
                }
                .into())
            }
        }
    }
}

/// Shape of the dictionaries inside an address-like list.
#[derive(Debug, Clone)]
pub(crate) struct DictRules {
    subfields: BTreeMap<String, Field>,
    required_keys: BTreeSet<String>,
    exactly_one_of: Option<(&'static str, &'static str)>,
}

impl DictRules {
    pub fn new(
        subfields: Vec<(&str, Field)>,
        required_keys: &[&str],
        exactly_one_of: Option<(&'static str, &'static str)>,
    ) -> Self {
        DictRules {
            subfields: subfields
                .into_iter()
                .map(|(k, f)| (k.to_string(), f))
                .collect(),
            required_keys: required_keys.iter().map(|k| k.to_string()).collect(),
            exactly_one_of,
        }
    }

    pub fn keys(&self) -> BTreeSet<&str> {
        self.subfields.keys().map(String::as_str).collect()
    }

    pub fn clean(&self, value: &Value) -> Result<Value, FieldError> {
        let Value::Dict(map) = value else {
            return Err(FieldError::type_error(format!(
                "{} is not a mapping",
                ascii_repr(value)
            )));
        };

        let illegal: Vec<&str> = map
            .keys()
            .filter(|k| !self.subfields.contains_key(*k))
            .map(String::as_str)
            .collect();
        if !illegal.is_empty() {
            return Err(FieldError::invalid(format!(
                "{} contains illegal keys ({})",
                ascii_repr(value),
                illegal.join(", ")
            )));
        }

        let missing: Vec<&str> = self
            .required_keys
            .iter()
            .filter(|k| !map.contains_key(*k))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(FieldError::invalid(format!(
                "{} does not contain required keys ({})",
                ascii_repr(value),
                missing.join(", ")
            )));
        }

        if let Some((a, b)) = self.exactly_one_of {
            if map.contains_key(a) == map.contains_key(b) {
                return Err(FieldError::invalid(format!(
                    "{} should contain exactly one of the keys: {}, {}",
                    ascii_repr(value),
                    a,
                    b
                )));
            }
        }

        let mut cleaned = BTreeMap::new();
        for (key, item) in map {
            let subfield = &self.subfields[key];
            cleaned.insert(key.clone(), subfield.clean_result_value(item)?);
        }
        Ok(Value::Dict(cleaned))
    }
}

/// Any list of dictionaries, passed through unchanged.
pub(crate) fn check_plain_dict(value: &Value) -> Result<Value, FieldError> {
    match value {
        Value::Dict(_) => Ok(value.clone()),
        other => Err(FieldError::type_error(format!(
            "{} is not a mapping",
            ascii_repr(other)
        ))),
    }
}
