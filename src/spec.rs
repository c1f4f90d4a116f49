//! Data specifications: an ordered stack of layers resolved into flat,
//! read-only key → field indices.
//!
//! # Resolution
//!
//! Layers are walked most-derived first. Within a layer, Ext bindings are
//! accumulated before Field and Remove bindings are applied:
//!
//! | Binding | Key not finalized yet | Key already finalized |
//! |---------|-----------------------|-----------------------|
//! | `Ext` | merged into the key's accumulator (stored entries win) | ignored, reported by [`DataSpec::shadowed_exts`] |
//! | `Field` | accumulated Ext applied, key finalized, extra-params expanded | ignored |
//! | `Remove` | key finalized with no field | ignored |
//!
//! Expanding a field's `extra_params` finalizes `key.name` for every
//! sub-field that is not masked, applying the Ext accumulated for the dotted
//! key, and recurses into the sub-field's own extra-params.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::catalog;
use crate::error::BuildError;
use crate::ext::Ext;
use crate::field::Field;
use crate::types::{Presence, Which};

/// What a layer declares for one key.
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    Field(Field),
    Ext(Ext),
    /// Drop the key (and its dotted descendants) from the spec.
    Remove,
}

/// One level of declarations, like a class body in a subclassing chain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Layer {
    name: Option<String>,
    bindings: BTreeMap<String, Binding>,
}

impl Layer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn named(name: impl Into<String>) -> Self {
        Layer {
            name: Some(name.into()),
            bindings: BTreeMap::new(),
        }
    }

    pub fn field(mut self, key: &str, field: Field) -> Self {
        self.bind(key, Binding::Field(field));
        self
    }

    pub fn ext(mut self, key: &str, ext: Ext) -> Self {
        self.bind(key, Binding::Ext(ext));
        self
    }

    pub fn remove(mut self, key: &str) -> Self {
        self.bind(key, Binding::Remove);
        self
    }

    pub fn bind(&mut self, key: &str, binding: Binding) {
        self.bindings.insert(key.to_string(), binding);
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn get(&self, key: &str) -> Option<&Binding> {
        self.bindings.get(key)
    }

    pub fn bindings(&self) -> impl Iterator<Item = (&String, &Binding)> {
        self.bindings.iter()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// An Ext that arrived after its key had been finalized by a more-derived
/// layer, and therefore had no effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShadowedExt {
    /// Index of the layer holding the Ext (0 = most derived).
    pub layer: usize,
    pub key: String,
}

fn check_key(key: &str, binding: &Binding) -> Result<(), BuildError> {
    let invalid = |message: &str| BuildError::InvalidKey {
        key: key.to_string(),
        message: message.to_string(),
    };
    if key.is_empty() || !key.is_ascii() {
        return Err(invalid("keys must be non-empty ASCII strings"));
    }
    if key.split('.').any(str::is_empty) {
        return Err(invalid("empty key segment"));
    }
    if key.contains('.') && !matches!(binding, Binding::Ext(_)) {
        return Err(invalid(
            "dotted keys can only be extended; declare them in the parent's extra_params",
        ));
    }
    Ok(())
}

#[derive(Default)]
struct Resolver {
    accumulated: BTreeMap<String, Ext>,
    finalized: BTreeSet<String>,
    resolved: Vec<(String, Field)>,
    shadowed: Vec<ShadowedExt>,
}

impl Resolver {
    fn run(mut self, layers: &[Layer]) -> Result<Self, BuildError> {
        for (index, layer) in layers.iter().enumerate() {
            for (key, binding) in &layer.bindings {
                check_key(key, binding)?;
                let Binding::Ext(ext) = binding else {
                    continue;
                };
                if self.finalized.contains(key) {
                    debug!(key = %key, layer = index, "ext ignored: key already finalized");
                    self.shadowed.push(ShadowedExt {
                        layer: index,
                        key: key.clone(),
                    });
                    continue;
                }
                self.accumulated.entry(key.clone()).or_default().merge(ext)?;
            }
            for (key, binding) in &layer.bindings {
                if self.finalized.contains(key) {
                    continue;
                }
                match binding {
                    Binding::Ext(_) => {}
                    Binding::Remove => {
                        trace!(key = %key, layer = index, "key removed");
                        self.finalized.insert(key.clone());
                        // exts met so far die with the key
                        self.accumulated.remove(key);
                    }
                    Binding::Field(field) => self.finalize(key, field)?,
                }
            }
        }
        Ok(self)
    }

    fn finalize(&mut self, key: &str, field: &Field) -> Result<(), BuildError> {
        self.finalized.insert(key.to_string());
        let resolved = match self.accumulated.get(key) {
            Some(ext) => ext.apply_to(field)?,
            None => field.clone(),
        };
        trace!(key = %key, field_type = %resolved.field_type(), "key finalized");
        for (name, sub) in resolved.extra_params() {
            // masked sub-fields spawn no key
            let Some(sub) = sub else {
                continue;
            };
            self.finalize(&format!("{}.{}", key, name), sub)?;
        }
        self.resolved.push((key.to_string(), resolved));
        Ok(())
    }

    fn unresolved_ext_keys(&self) -> BTreeSet<String> {
        let resolved: BTreeSet<&str> = self.resolved.iter().map(|(k, _)| k.as_str()).collect();
        self.accumulated
            .keys()
            .filter(|k| !resolved.contains(k.as_str()))
            .cloned()
            .collect()
    }
}

type Index = BTreeMap<String, Arc<Field>>;

/// A resolved data specification.
///
/// Built once from its layers; every index is read-only afterwards, so a
/// spec can be shared between threads and used for any number of cleaning
/// calls.
#[derive(Debug, Clone)]
pub struct DataSpec {
    layers: Vec<Layer>,
    key_to_field: Index,
    all_param: Index,
    required_param: Index,
    single_param: Index,
    all_result: Index,
    required_result: Index,
    shadowed_exts: Vec<ShadowedExt>,
    unresolved_ext_keys: BTreeSet<String>,
}

impl DataSpec {
    /// Resolve a stack of layers, most-derived first.
    pub fn from_layers(layers: Vec<Layer>) -> Result<Self, BuildError> {
        let resolver = Resolver::default().run(&layers)?;
        let unresolved_ext_keys = resolver.unresolved_ext_keys();
        for key in &unresolved_ext_keys {
            warn!(key = %key, "ext declared for a key that never gets a field");
        }

        let mut spec = DataSpec {
            layers,
            key_to_field: Index::new(),
            all_param: Index::new(),
            required_param: Index::new(),
            single_param: Index::new(),
            all_result: Index::new(),
            required_result: Index::new(),
            shadowed_exts: resolver.shadowed,
            unresolved_ext_keys,
        };
        for (key, field) in resolver.resolved {
            spec.index(key, Arc::new(field));
        }

        debug!(
            layers = spec.layers.len(),
            keys = spec.key_to_field.len(),
            params = spec.all_param.len(),
            results = spec.all_result.len(),
            "data spec resolved"
        );
        Ok(spec)
    }

    /// The standard incident spec.
    pub fn standard() -> Result<Self, BuildError> {
        Self::from_layers(vec![catalog::standard_layer()?])
    }

    /// A derived spec with `layer` stacked on top of this one's layers.
    pub fn extend(&self, layer: Layer) -> Result<Self, BuildError> {
        let mut layers = Vec::with_capacity(self.layers.len() + 1);
        layers.push(layer);
        layers.extend(self.layers.iter().cloned());
        Self::from_layers(layers)
    }

    fn index(&mut self, key: String, field: Arc<Field>) {
        if field.in_params().is_present() {
            self.all_param.insert(key.clone(), field.clone());
            if field.in_params() == Presence::Required {
                self.required_param.insert(key.clone(), field.clone());
            }
            if field.single_param() {
                self.single_param.insert(key.clone(), field.clone());
            }
        }
        if field.in_result().is_present() {
            self.all_result.insert(key.clone(), field.clone());
            if field.in_result() == Presence::Required {
                self.required_result.insert(key.clone(), field.clone());
            }
        }
        self.key_to_field.insert(key, field);
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Every resolved field, including those legal on neither side.
    pub fn field(&self, key: &str) -> Option<&Field> {
        self.key_to_field.get(key).map(Arc::as_ref)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.key_to_field
            .iter()
            .map(|(k, f)| (k.as_str(), f.as_ref()))
    }

    /// All legal parameter names and result keys.
    pub fn all_keys(&self) -> BTreeSet<&str> {
        self.all_param_keys()
            .union(&self.all_result_keys())
            .copied()
            .collect()
    }

    pub fn all_param_keys(&self) -> BTreeSet<&str> {
        self.all_param.keys().map(String::as_str).collect()
    }

    pub fn all_result_keys(&self) -> BTreeSet<&str> {
        self.all_result.keys().map(String::as_str).collect()
    }

    pub fn required_param_keys(&self) -> BTreeSet<&str> {
        self.required_param.keys().map(String::as_str).collect()
    }

    pub fn required_result_keys(&self) -> BTreeSet<&str> {
        self.required_result.keys().map(String::as_str).collect()
    }

    pub(crate) fn param_field(&self, key: &str) -> Option<&Field> {
        self.all_param.get(key).map(Arc::as_ref)
    }

    pub(crate) fn result_field(&self, key: &str) -> Option<&Field> {
        self.all_result.get(key).map(Arc::as_ref)
    }

    /// Parameter fields selected by requiredness and arity.
    ///
    /// `multi: false` keeps only single-value fields; `single: false` drops
    /// them.
    pub fn param_field_specs(
        &self,
        which: Which,
        multi: bool,
        single: bool,
    ) -> BTreeMap<&str, &Field> {
        filter_by_which(which, &self.all_param, &self.required_param)
            .into_iter()
            .filter(|(key, _)| {
                let is_single = self.single_param.contains_key(*key);
                (multi || is_single) && (single || !is_single)
            })
            .collect()
    }

    pub fn result_field_specs(&self, which: Which) -> BTreeMap<&str, &Field> {
        filter_by_which(which, &self.all_result, &self.required_result)
    }

    /// Ext bindings that had no effect because a more-derived layer had
    /// already finalized their key.
    pub fn shadowed_exts(&self) -> &[ShadowedExt] {
        &self.shadowed_exts
    }

    /// Keys with Ext bindings that never met a field.
    pub fn unresolved_ext_keys(&self) -> &BTreeSet<String> {
        &self.unresolved_ext_keys
    }
}

fn filter_by_which<'a>(
    which: Which,
    all: &'a Index,
    required: &'a Index,
) -> BTreeMap<&'a str, &'a Field> {
    all.iter()
        .filter(|(key, _)| match which {
            Which::All => true,
            Which::Required => required.contains_key(*key),
            Which::Optional => !required.contains_key(*key),
        })
        .map(|(k, f)| (k.as_str(), f.as_ref()))
        .collect()
}
