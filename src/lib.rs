//! Incident Spec
//!
//! Declarative field specifications for network-incident REST resources,
//! and cleaning of query parameters and result records against them.
//!
//! A [`DataSpec`] is resolved from a stack of [`Layer`]s, most-derived
//! first. Each layer binds keys to a [`Field`], to an [`Ext`] (a partial
//! patch merged into a less-derived field) or to a removal.
//!
//! # Example
//!
//! ```
//! use incident_spec::{CleanOptions, DataSpec, Ext, Layer, ParamDict, Value};
//!
//! let spec = DataSpec::standard()?;
//!
//! let mut params = ParamDict::new();
//! params.insert("cc".into(), vec![Value::from("pl")]);
//! params.insert("category".into(), vec![Value::from("bots")]);
//!
//! let cleaned = spec.clean_param_dict(&params, &CleanOptions::new())?;
//! assert_eq!(cleaned["cc"], vec![Value::from("PL")]);
//!
//! // narrow the categories a derived resource accepts
//! let narrowed = spec.extend(
//!     Layer::named("bots-only")
//!         .ext("category", Ext::new().set("enum_values", vec!["bots".to_string()])),
//! )?;
//! params.insert("category".into(), vec![Value::from("phish")]);
//! assert!(narrowed.clean_param_dict(&params, &CleanOptions::new()).is_err());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Presence
//!
//! | Presence | Parameters | Result records |
//! |----------|------------|----------------|
//! | `required` | Key must be given | Key must be present |
//! | `optional` | Key may be given | Key may be present |
//! | `absent` | Key is illegal | Key is illegal |
//!
//! # Dotted keys
//!
//! A field's `extra_params` spawn parameter keys `<key>.<sub>`, e.g. the
//! `min` sub-field of `time` becomes `time.min`. Dotted keys can be
//! extended by a layer but never bound to a field directly.

mod catalog;
mod clean;
mod encoding;
mod error;
mod ext;
mod field;
mod linter;
mod loader;
pub mod regexes;
mod spec;
mod types;

pub use catalog::{
    standard_layer, CATEGORY, CONFIDENCE, ORIGIN, PROTO, RESTRICTION, STANDARD_LAYER_NAME, STATUS,
};
pub use encoding::{ascii_repr, ascii_str, decode_escaped, encode_escaped, ByteDecoding};
pub use error::{
    BuildError, CleaningError, FieldError, FieldValueError, LoadError, ValueErrorInfo,
};
pub use ext::{Ext, Patch};
pub use field::{
    parse_iso_datetime_to_utc, ArgValue, Args, ExtraParams, Field, FieldBuilder, FieldId,
    FieldType, COMMON_ARGS,
};
pub use linter::{lint, lint_file, Diagnostic, FileResult, FileStatus, LintResult, Severity};
pub use loader::{
    field_from_json, layer_from_json, load_json, load_json_str, load_layer, load_layer_str,
    load_records, param_dict_from_pairs, records_from_json,
};
pub use spec::{Binding, DataSpec, Layer, ShadowedExt};
pub use types::{CleanOptions, ParamDict, Presence, ResultDict, Value, Which};
