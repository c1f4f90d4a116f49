//! Error types for field specification, cleaning and declaration loading.

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::field::{FieldId, FieldType};
use crate::types::Value;

/// A single field rejected a single value.
///
/// The `public_message` is safe to expose to API clients.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FieldValueError {
    #[error("{public_message}")]
    Invalid { public_message: String },

    /// The value (or at least one item of a list value) exceeded the
    /// field's `max_length`.
    #[error("{public_message}")]
    TooLong {
        /// The field whose own length limit was exceeded.
        field: FieldId,
        field_type: FieldType,
        /// The value as it was checked (decoded, possibly byte-encoded).
        checked_value: Value,
        max_length: usize,
        public_message: String,
    },
}

impl FieldValueError {
    pub fn new(public_message: impl Into<String>) -> Self {
        FieldValueError::Invalid {
            public_message: public_message.into(),
        }
    }

    pub fn public_message(&self) -> &str {
        match self {
            FieldValueError::Invalid { public_message }
            | FieldValueError::TooLong { public_message, .. } => public_message,
        }
    }
}

/// Errors raised by a field's cleaning methods.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FieldError {
    #[error(transparent)]
    Value(#[from] FieldValueError),

    /// Structurally wrong input (e.g. a number where a string is expected).
    #[error("{message}")]
    Type { message: String },

    /// Validation failure whose details are not meant for API clients.
    #[error("{message}")]
    Invalid { message: String },

    #[error("{message}")]
    NotImplemented { message: String },
}

impl FieldError {
    pub(crate) fn type_error(message: impl Into<String>) -> Self {
        FieldError::Type {
            message: message.into(),
        }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        FieldError::Invalid {
            message: message.into(),
        }
    }

    /// Client-safe message, if this error carries one.
    pub fn public_message(&self) -> Option<&str> {
        match self {
            FieldError::Value(e) => Some(e.public_message()),
            _ => None,
        }
    }

    /// True if the error reports a too-long value.
    pub fn is_too_long(&self) -> bool {
        matches!(self, FieldError::Value(FieldValueError::TooLong { .. }))
    }
}

/// One failed value within a batch: the key, the value as given, and why it
/// was rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueErrorInfo {
    pub key: String,
    pub value: Value,
    pub error: FieldError,
}

impl fmt::Display for ValueErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key, self.error)
    }
}

/// Errors raised by the parameter and result cleaning pipelines.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CleaningError {
    #[error("illegal query parameters: {}; missing query parameters: {}",
        join_keys(illegal_keys), join_keys(missing_keys))]
    ParamKeys {
        illegal_keys: BTreeSet<String>,
        missing_keys: BTreeSet<String>,
    },

    #[error("{} invalid query parameter value(s): {}", errors.len(), join_infos(errors))]
    ParamValues { errors: Vec<ValueErrorInfo> },

    #[error("illegal result keys: {}; missing result keys: {}",
        join_keys(illegal_keys), join_keys(missing_keys))]
    ResultKeys {
        illegal_keys: BTreeSet<String>,
        missing_keys: BTreeSet<String>,
    },

    #[error("{} invalid result value(s): {}", errors.len(), join_infos(errors))]
    ResultValues { errors: Vec<ValueErrorInfo> },
}

impl CleaningError {
    /// True for errors raised while cleaning query parameters.
    pub fn is_param_error(&self) -> bool {
        matches!(
            self,
            CleaningError::ParamKeys { .. } | CleaningError::ParamValues { .. }
        )
    }

    /// Value-level failures, empty for key-cleaning errors.
    pub fn value_errors(&self) -> &[ValueErrorInfo] {
        match self {
            CleaningError::ParamValues { errors } | CleaningError::ResultValues { errors } => {
                errors
            }
            _ => &[],
        }
    }

    /// Message that may be shown to API clients.
    ///
    /// Result-side failures are internal problems of the data backend, so
    /// their message stays generic.
    pub fn public_message(&self) -> String {
        match self {
            CleaningError::ParamKeys {
                illegal_keys,
                missing_keys,
            } => {
                let mut parts = Vec::new();
                if !illegal_keys.is_empty() {
                    parts.push(format!(
                        "Illegal query parameters: {}.",
                        quote_keys(illegal_keys)
                    ));
                }
                if !missing_keys.is_empty() {
                    parts.push(format!(
                        "Required query parameters missing: {}.",
                        quote_keys(missing_keys)
                    ));
                }
                parts.join(" ")
            }
            CleaningError::ParamValues { errors } => errors
                .iter()
                .map(|info| match info.error.public_message() {
                    Some(msg) => format!(
                        "Problem with value(s) of query parameter \"{}\": {}.",
                        info.key, msg
                    ),
                    None => format!("Problem with value(s) of query parameter \"{}\".", info.key),
                })
                .collect::<Vec<_>>()
                .join(" "),
            CleaningError::ResultKeys { .. } | CleaningError::ResultValues { .. } => {
                "Internal error.".to_string()
            }
        }
    }

    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        1
    }
}

/// Construction-time contract violations in field or layer declarations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BuildError {
    #[error("'{arg}' not specified for {field_type} (neither as a type default nor as a constructor argument)")]
    MissingArgument {
        field_type: FieldType,
        arg: &'static str,
    },

    #[error("'{arg}' is required by {field_type} and cannot be masked")]
    MaskedRequiredArgument {
        field_type: FieldType,
        arg: &'static str,
    },

    #[error("{field_type} got an unexpected argument '{arg}'")]
    UnexpectedArgument { field_type: FieldType, arg: String },

    #[error("argument '{arg}' of {field_type}: expected {expected}, got {actual}")]
    InvalidArgumentType {
        field_type: FieldType,
        arg: String,
        expected: &'static str,
        actual: String,
    },

    #[error("argument '{arg}' of {field_type}: {message}")]
    InvalidArgumentValue {
        field_type: FieldType,
        arg: String,
        message: String,
    },

    #[error("invalid regex for {field_type}: {message}")]
    InvalidRegex {
        field_type: FieldType,
        message: String,
    },

    #[error("extension for '{name}' does not match any declared sub-field")]
    UnresolvedExt { name: String },

    #[error("a field cannot stand in for the plain argument '{arg}'")]
    UnexpectedField { arg: String },

    #[error("invalid key '{key}': {message}")]
    InvalidKey { key: String, message: String },

    #[error("unknown field type \"{name}\"")]
    UnknownFieldType { name: String },
}

impl BuildError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        2
    }
}

/// Errors while loading declarations, records or parameters.
#[derive(Debug, Error)]
pub enum LoadError {
    // IO errors (exit code 3)
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Parse errors (exit code 2)
    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid declaration at {path}: {message}")]
    InvalidDeclaration { path: String, message: String },

    #[error("invalid input at {path}: {message}")]
    InvalidInput { path: String, message: String },

    #[error(transparent)]
    Build(#[from] BuildError),
}

impl LoadError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LoadError::FileNotFound { .. } | LoadError::ReadError { .. } => 3,
            LoadError::Build(e) => e.exit_code(),
            _ => 2,
        }
    }
}

fn join_keys(keys: &BTreeSet<String>) -> String {
    if keys.is_empty() {
        "none".to_string()
    } else {
        keys.iter().cloned().collect::<Vec<_>>().join(", ")
    }
}

fn quote_keys(keys: &BTreeSet<String>) -> String {
    keys.iter()
        .map(|k| format!("\"{}\"", k))
        .collect::<Vec<_>>()
        .join(", ")
}

fn join_infos(errors: &[ValueErrorInfo]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn load_error_exit_codes() {
        let err = LoadError::FileNotFound {
            path: PathBuf::from("layer.json"),
        };
        assert_eq!(err.exit_code(), 3);

        let err = LoadError::InvalidDeclaration {
            path: "/fields/id".into(),
            message: "expected object".into(),
        };
        assert_eq!(err.exit_code(), 2);

        let err = LoadError::Build(BuildError::UnknownFieldType {
            name: "nope".into(),
        });
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn param_key_error_public_message() {
        let err = CleaningError::ParamKeys {
            illegal_keys: keys(&["foo"]),
            missing_keys: keys(&["id", "time.min"]),
        };
        assert_eq!(
            err.public_message(),
            "Illegal query parameters: \"foo\". Required query parameters missing: \"id\", \"time.min\"."
        );
        assert!(err.is_param_error());
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn param_value_error_hides_non_public_details() {
        let err = CleaningError::ParamValues {
            errors: vec![
                ValueErrorInfo {
                    key: "cc".into(),
                    value: Value::from("!!"),
                    error: FieldValueError::new("\"!!\" is not a valid 2-character country code")
                        .into(),
                },
                ValueErrorInfo {
                    key: "address".into(),
                    value: Value::from("x"),
                    error: FieldError::NotImplemented {
                        message: "it's a result-only field".into(),
                    },
                },
            ],
        };
        let msg = err.public_message();
        assert!(msg.contains("\"cc\": \"!!\" is not a valid 2-character country code."));
        assert!(msg.contains("query parameter \"address\"."));
        assert!(!msg.contains("result-only"));
        assert_eq!(err.value_errors().len(), 2);
    }

    #[test]
    fn result_errors_stay_generic() {
        let err = CleaningError::ResultKeys {
            illegal_keys: keys(&["ip"]),
            missing_keys: BTreeSet::new(),
        };
        assert_eq!(err.public_message(), "Internal error.");
        assert!(!err.is_param_error());
        assert_eq!(
            err.to_string(),
            "illegal result keys: ip; missing result keys: none"
        );
    }
}
