//! Ext: sparse, mergeable patches over a field's constructor arguments.
//!
//! An [`Ext`] maps argument names to a [`Patch`]: a literal value, a mask
//! (remove the argument, or the sub-field of `extra_params`), a nested Ext
//! (deep-merged), or a whole replacement [`Field`].
//!
//! # Merging
//!
//! [`Ext::merge`] is non-destructive: entries already stored win, new keys
//! are added. Two cases recurse:
//!
//! - a stored nested Ext meeting a field is applied to that field;
//! - a stored nested Ext meeting any mapping (nested Ext, sub-field mapping,
//!   JSON object) is deep-merged with it, the stored side still winning.
//!
//! This is how a field's own arguments are combined with the patches that
//! target it: the patch is the stored side, so it takes precedence, and any
//! argument it does not mention keeps the field's value.

use std::collections::BTreeMap;

use crate::error::BuildError;
use crate::field::{ArgValue, Args, ExtraParams, Field};

/// One entry of an [`Ext`].
#[derive(Debug, Clone, PartialEq)]
pub enum Patch {
    /// Literal argument value.
    Set(ArgValue),
    /// Remove the argument (or the sub-field).
    Mask,
    /// Deep-mergeable nested patch.
    Ext(Ext),
    /// Replacement field (only meaningful inside `extra_params`).
    Field(Field),
}

impl Patch {
    /// Entries of a mapping-like patch, or `None` for scalars.
    fn as_mapping(&self) -> Option<Ext> {
        match self {
            Patch::Ext(ext) => Some(ext.clone()),
            Patch::Set(ArgValue::Fields(fields)) => Some(Ext::from_fields(fields)),
            Patch::Set(ArgValue::Json(serde_json::Value::Object(map))) => Some(Ext {
                entries: map
                    .iter()
                    .map(|(k, v)| (k.clone(), Patch::Set(ArgValue::Json(v.clone()))))
                    .collect(),
            }),
            _ => None,
        }
    }
}

impl From<Ext> for Patch {
    fn from(ext: Ext) -> Self {
        Patch::Ext(ext)
    }
}

impl From<Field> for Patch {
    fn from(field: Field) -> Self {
        Patch::Field(field)
    }
}

/// A sparse patch of field constructor arguments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ext {
    entries: BTreeMap<String, Patch>,
}

impl Ext {
    pub fn new() -> Self {
        Self::default()
    }

    fn from_fields(fields: &ExtraParams) -> Self {
        Ext {
            entries: fields
                .iter()
                .map(|(name, field)| {
                    let patch = match field {
                        Some(f) => Patch::Field(f.clone()),
                        None => Patch::Mask,
                    };
                    (name.clone(), patch)
                })
                .collect(),
        }
    }

    /// Override an argument with a literal value.
    pub fn set(mut self, name: &str, value: impl Into<ArgValue>) -> Self {
        self.insert(name, Patch::Set(value.into()));
        self
    }

    /// Remove an argument or sub-field.
    ///
    /// A masked optional argument falls back to the type default. Masking
    /// one of [`FieldType::required_args`](crate::FieldType::required_args)
    /// makes [`apply_to`](Self::apply_to) fail, even when the type has a
    /// default for it.
    pub fn mask(mut self, name: &str) -> Self {
        self.insert(name, Patch::Mask);
        self
    }

    /// Deep-merge a nested patch into an argument.
    pub fn ext(mut self, name: &str, ext: Ext) -> Self {
        self.insert(name, Patch::Ext(ext));
        self
    }

    /// Replace a sub-field with a whole new field.
    pub fn field(mut self, name: &str, field: Field) -> Self {
        self.insert(name, Patch::Field(field));
        self
    }

    pub fn insert(&mut self, name: &str, patch: Patch) {
        self.entries.insert(name.to_string(), patch);
    }

    pub fn get(&self, name: &str) -> Option<&Patch> {
        self.entries.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Patch)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Merge `other` into `self` without overriding stored entries.
    pub fn merge(&mut self, other: &Ext) -> Result<(), BuildError> {
        for (name, patch) in &other.entries {
            self.merge_entry(name, patch.clone())?;
        }
        Ok(())
    }

    /// Like [`merge`](Self::merge), on a copy.
    pub fn merged(&self, other: &Ext) -> Result<Ext, BuildError> {
        let mut out = self.clone();
        out.merge(other)?;
        Ok(out)
    }

    fn merge_entry(&mut self, name: &str, incoming: Patch) -> Result<(), BuildError> {
        let Some(stored) = self.entries.get(name) else {
            self.entries.insert(name.to_string(), incoming);
            return Ok(());
        };
        let Patch::Ext(stored_ext) = stored else {
            return Ok(());
        };
        let replacement = match &incoming {
            Patch::Field(field) => Patch::Field(stored_ext.apply_to(field)?),
            other => match other.as_mapping() {
                Some(mapping) => Patch::Ext(stored_ext.merged(&mapping)?),
                None => return Ok(()),
            },
        };
        self.entries.insert(name.to_string(), replacement);
        Ok(())
    }

    /// Build a new field of the same type, with this patch over the field's
    /// own constructor arguments.
    pub fn apply_to(&self, field: &Field) -> Result<Field, BuildError> {
        let field_type = field.field_type();
        if let Some(arg) = field_type
            .required_args()
            .into_iter()
            .find(|arg| matches!(self.get(arg), Some(Patch::Mask)))
        {
            return Err(BuildError::MaskedRequiredArgument { field_type, arg });
        }
        let mut merged = self.clone();
        for (name, value) in field.init_args() {
            merged.merge_entry(name, Patch::Set(value.clone()))?;
        }
        Field::from_args(field.field_type(), merged.into_args()?)
    }

    /// Turn a fully resolved patch into constructor arguments.
    ///
    /// Masked arguments are left out (so the type default applies). A nested
    /// Ext becomes the sub-field mapping under `extra_params` and a JSON
    /// object anywhere else.
    pub fn into_args(self) -> Result<Args, BuildError> {
        let mut args = Args::new();
        for (name, patch) in self.entries {
            let value = match patch {
                Patch::Set(value) => value,
                Patch::Mask => continue,
                Patch::Ext(ext) if name == "extra_params" => ArgValue::Fields(ext.into_fields()?),
                Patch::Ext(ext) => ArgValue::Json(ext.into_json()?),
                Patch::Field(_) => return Err(BuildError::UnexpectedField { arg: name }),
            };
            args.insert(name, value);
        }
        Ok(args)
    }

    fn into_fields(self) -> Result<ExtraParams, BuildError> {
        let mut fields = ExtraParams::new();
        for (name, patch) in self.entries {
            let field = match patch {
                Patch::Field(field) => Some(field),
                Patch::Mask => None,
                Patch::Ext(_) => return Err(BuildError::UnresolvedExt { name }),
                Patch::Set(value) => {
                    return Err(BuildError::InvalidKey {
                        key: name,
                        message: format!(
                            "extra-param entries must be fields, got {}",
                            value.type_name()
                        ),
                    })
                }
            };
            fields.insert(name, field);
        }
        Ok(fields)
    }

    fn into_json(self) -> Result<serde_json::Value, BuildError> {
        let mut map = serde_json::Map::new();
        for (name, patch) in self.entries {
            let value = match patch {
                Patch::Set(value) => value.to_json(),
                Patch::Mask => serde_json::Value::Null,
                Patch::Ext(ext) => ext.into_json()?,
                Patch::Field(_) => return Err(BuildError::UnexpectedField { arg: name }),
            };
            map.insert(name, value);
        }
        Ok(serde_json::Value::Object(map))
    }
}
