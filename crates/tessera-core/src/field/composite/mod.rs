//! Composite fields: one logical value backed by N atomic columns.
//!
//! Declaration is two-phase. `declare_on` does the local bookkeeping and
//! schedules `bind`, which runs once the owner entity is finalized and
//! builds the value type and storage descriptor from the (by then stable)
//! component fields. Reads and writes are only possible after binding.

#[cfg(test)]
mod tests;

use crate::{
    codec::CompositeCodec,
    error::InternalError,
    field::{FieldError, VirtualField, VirtualFieldState, declare_virtual},
    lookup::{ColumnPredicate, LookupKind, PreparedLookup},
    model::{
        entity::{Accessor, EntityBuilder, EntityModel},
        field::{FieldRef, FieldValueError, StorageDescriptor},
    },
    obs::sink::{self, MetricsEvent},
    record::Record,
    value::{BackendValue, Value},
};
use candid::CandidType;
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    sync::{Arc, OnceLock},
};

///
/// ValueType
///
/// Generated per (owner, field): the slot names of the composite value,
/// in component declaration order.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ValueType {
    name: String,
    slots: Vec<String>,
}

impl ValueType {
    #[must_use]
    pub const fn new(name: String, slots: Vec<String>) -> Self {
        Self { name, slots }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn slots(&self) -> &[String] {
        &self.slots
    }

    #[must_use]
    pub const fn arity(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn position(&self, slot: &str) -> Option<usize> {
        self.slots.iter().position(|s| s == slot)
    }

    /// Build a value of this type; `components` must match the arity.
    pub fn instantiate(&self, components: Vec<Value>) -> Result<CompositeValue, FieldError> {
        if components.len() != self.arity() {
            return Err(FieldError::ArityMismatch {
                field: self.name.clone(),
                expected: self.arity(),
                found: components.len(),
            });
        }

        Ok(CompositeValue {
            type_name: self.name.clone(),
            names: self.slots.clone(),
            components,
        })
    }
}

///
/// CompositeValue
///
/// Throwaway snapshot of a composite field's components. Equality and the
/// string form depend on the components only.
///

#[derive(CandidType, Clone, Debug, Deserialize, Serialize)]
pub struct CompositeValue {
    type_name: String,
    names: Vec<String>,
    components: Vec<Value>,
}

impl CompositeValue {
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[must_use]
    pub fn components(&self) -> &[Value] {
        &self.components
    }

    #[must_use]
    pub fn into_components(self) -> Vec<Value> {
        self.components
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.components.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Component by slot name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.names
            .iter()
            .position(|n| n == name)
            .and_then(|i| self.components.get(i))
    }

    #[must_use]
    pub fn get_index(&self, index: usize) -> Option<&Value> {
        self.components.get(index)
    }

    /// Copy with one slot replaced.
    pub fn replace(&self, name: &str, value: impl Into<Value>) -> Result<Self, FieldError> {
        let index = self
            .names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| FieldError::UnknownField {
                entity: self.type_name.clone(),
                field: name.to_string(),
            })?;

        let mut replaced = self.clone();
        replaced.components[index] = value.into();

        Ok(replaced)
    }

    /// String form under the default codec.
    #[must_use]
    pub fn encode(&self) -> String {
        self.encode_with(CompositeCodec::DEFAULT)
    }

    #[must_use]
    pub fn encode_with(&self, codec: CompositeCodec) -> String {
        codec.encode(self.components.iter().map(Value::to_text))
    }
}

impl PartialEq for CompositeValue {
    fn eq(&self, other: &Self) -> bool {
        self.components == other.components
    }
}

impl fmt::Display for CompositeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

///
/// Binding
/// State produced exactly once by `CompositeField::bind`.
///

#[derive(Debug)]
struct Binding {
    value_type: ValueType,
    storage: StorageDescriptor,
    codec: CompositeCodec,
}

///
/// CompositeField
///
/// Virtual field aggregating an ordered, non-empty list of atomic fields.
/// The components are borrowed from the owner entity by identity.
///

#[derive(Debug)]
pub struct CompositeField {
    state: VirtualFieldState,
    components: Vec<FieldRef>,
    unique: bool,
    primary_key: bool,
    codec: Option<CompositeCodec>,
    binding: OnceLock<Binding>,
}

impl CompositeField {
    #[must_use]
    pub fn new<I>(components: I) -> Self
    where
        I: IntoIterator<Item = FieldRef>,
    {
        Self {
            state: VirtualFieldState::new(),
            components: components.into_iter().collect(),
            unique: false,
            primary_key: false,
            codec: None,
            binding: OnceLock::new(),
        }
    }

    /// Require the components to be jointly unique.
    #[must_use]
    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Use the composite as the owner's primary key.
    #[must_use]
    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Override the codec inherited from the owner.
    #[must_use]
    pub const fn with_codec(mut self, codec: CompositeCodec) -> Self {
        self.codec = Some(codec);
        self
    }

    ///
    /// INTROSPECTION
    ///

    #[must_use]
    pub fn components(&self) -> &[FieldRef] {
        &self.components
    }

    #[must_use]
    pub const fn arity(&self) -> usize {
        self.components.len()
    }

    #[must_use]
    pub const fn is_unique(&self) -> bool {
        self.unique
    }

    #[must_use]
    pub const fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.binding.get().is_some()
    }

    #[must_use]
    pub fn value_type(&self) -> Option<&ValueType> {
        self.binding.get().map(|b| &b.value_type)
    }

    /// Codec in effect: bound codec, explicit override, or the default.
    #[must_use]
    pub fn codec(&self) -> CompositeCodec {
        self.binding
            .get()
            .map(|b| b.codec)
            .or(self.codec)
            .unwrap_or_default()
    }

    /// Each component's storage descriptor, in order. Available before binding.
    #[must_use]
    pub fn storage_type(&self) -> StorageDescriptor {
        StorageDescriptor::Tuple(
            self.components
                .iter()
                .map(|f| f.storage_descriptor())
                .collect(),
        )
    }

    fn label(&self) -> &str {
        self.state.name().unwrap_or("composite")
    }

    fn entity_path(&self) -> &str {
        self.state.owner_path().unwrap_or_default()
    }

    fn binding(&self) -> Result<&Binding, FieldError> {
        self.binding.get().ok_or_else(|| FieldError::NotBound {
            field: self.label().to_string(),
        })
    }

    ///
    /// BINDING
    ///

    // Runs once the owner is finalized; components must all be declared there.
    fn bind(self: Arc<Self>, model: &mut EntityModel) -> Result<(), InternalError> {
        let name = self.label().to_string();
        if let Some(missing) = self.components.iter().find(|f| !model.contains_field(f)) {
            return Err(FieldError::ComponentNotDeclared {
                field: name,
                component: missing.name().to_string(),
            }
            .into());
        }

        let owner = model.path().rsplit("::").next().unwrap_or_default();
        let binding = Binding {
            value_type: ValueType::new(
                format!("{owner}_{name}"),
                self.components.iter().map(|f| f.name().to_string()).collect(),
            ),
            storage: self.storage_type(),
            codec: self.codec.unwrap_or_else(|| model.codec()),
        };
        self.binding
            .set(binding)
            .map_err(|_| FieldError::AlreadyBound { field: name.clone() })?;

        let accessor: Arc<dyn VirtualField> = Arc::clone(&self) as Arc<dyn VirtualField>;
        model.install_accessor(&name, Accessor::Virtual(accessor))?;

        sink::record(MetricsEvent::FieldBound {
            entity_path: model.path(),
        });

        Ok(())
    }

    ///
    /// NORMALIZATION
    ///

    /// Normalize a sequence, a composite snapshot, or an encoded string into
    /// one converted value per component.
    ///
    /// An empty component in the string form is `Null`, matching what
    /// `Value::to_text` writes for it. Any other scalar is treated as a
    /// one-element sequence.
    pub fn to_value(&self, raw: &Value) -> Result<Vec<Value>, FieldError> {
        let decoded: Vec<Value>;
        let parts: &[Value] = match raw {
            Value::List(items) => items,
            Value::Composite(c) => c.components(),
            Value::Text(s) => {
                decoded = self
                    .decode(s)?
                    .into_iter()
                    .map(Value::from_component_text)
                    .collect();
                &decoded
            }
            scalar => std::slice::from_ref(scalar),
        };
        self.check_arity(parts.len())?;

        self.components
            .iter()
            .zip(parts)
            .map(|(field, part)| {
                field
                    .to_value(part)
                    .map_err(|source| self.invalid_component(field, source))
            })
            .collect()
    }

    fn check_arity(&self, found: usize) -> Result<(), FieldError> {
        if found == self.arity() {
            return Ok(());
        }

        sink::record(MetricsEvent::ArityRejected {
            entity_path: self.entity_path(),
        });

        Err(FieldError::ArityMismatch {
            field: self.label().to_string(),
            expected: self.arity(),
            found,
        })
    }

    fn invalid_component(&self, component: &FieldRef, source: FieldValueError) -> FieldError {
        FieldError::InvalidComponentValue {
            field: self.label().to_string(),
            component: component.name().to_string(),
            source,
        }
    }

    ///
    /// CODEC
    ///

    /// Canonical string form of `value` under this field's codec.
    #[must_use]
    pub fn encode(&self, value: &CompositeValue) -> String {
        value.encode_with(self.codec())
    }

    /// Split an encoded string into raw component strings.
    pub fn decode(&self, encoded: &str) -> Result<Vec<String>, FieldError> {
        self.codec().decode(encoded).map_err(|source| {
            sink::record(MetricsEvent::DecodeFailed {
                entity_path: self.entity_path(),
            });

            FieldError::Decode {
                field: self.label().to_string(),
                source,
            }
        })
    }

    ///
    /// LOOKUPS
    ///

    /// Resolve a query-layer lookup name.
    pub fn resolve_lookup(&self, name: &str) -> Result<LookupKind, FieldError> {
        name.parse().map_err(|_| self.unsupported(name))
    }

    /// Field-level prepared values; `in` keeps one group per candidate.
    pub fn translate_lookup(
        &self,
        lookup: LookupKind,
        value: &Value,
    ) -> Result<PreparedLookup, FieldError> {
        let prepared = match lookup {
            LookupKind::Exact => PreparedLookup::Exact(self.prepare_exact(value)?),
            LookupKind::In => PreparedLookup::In(
                self.candidates(lookup, value)?
                    .iter()
                    .map(|candidate| self.prepare_exact(candidate))
                    .collect::<Result<_, _>>()?,
            ),
            other => return Err(self.unsupported(other.as_str())),
        };
        self.record_translated(lookup);

        Ok(prepared)
    }

    /// Backend-ready scalars as one flat list, aligned with the flat
    /// column list of `storage_type`, candidates concatenated for `in`.
    pub fn translate_for_storage(
        &self,
        lookup: LookupKind,
        value: &Value,
    ) -> Result<Vec<BackendValue>, FieldError> {
        let groups = self.storage_groups(lookup, value)?;

        Ok(groups.into_iter().flatten().collect())
    }

    /// Lower a lookup into a per-column predicate tree.
    pub fn column_predicates(
        &self,
        lookup: LookupKind,
        value: &Value,
    ) -> Result<ColumnPredicate, FieldError> {
        let storage = self.storage_type();
        let columns: Vec<&str> = storage
            .columns()
            .into_iter()
            .map(|c| c.name.as_str())
            .collect();

        let conjunctions = self
            .storage_groups(lookup, value)?
            .into_iter()
            .map(|group| {
                if group.len() != columns.len() {
                    return Err(FieldError::StorageShapeMismatch {
                        field: self.label().to_string(),
                        columns: columns.len(),
                        values: group.len(),
                    });
                }

                Ok(ColumnPredicate::And(
                    columns
                        .iter()
                        .zip(group)
                        .map(|(column, value)| ColumnPredicate::Eq {
                            column: (*column).to_string(),
                            value,
                        })
                        .collect(),
                ))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let predicate = match lookup {
            LookupKind::In if conjunctions.is_empty() => ColumnPredicate::Never,
            LookupKind::In => ColumnPredicate::Or(conjunctions),
            _ => conjunctions
                .into_iter()
                .next()
                .unwrap_or(ColumnPredicate::Never),
        };

        Ok(predicate)
    }

    fn prepare_exact(&self, value: &Value) -> Result<Vec<Value>, FieldError> {
        let values = self.to_value(value)?;

        self.components
            .iter()
            .zip(&values)
            .map(|(field, v)| {
                field
                    .prepare_for_comparison(LookupKind::Exact, v)
                    .map_err(|source| self.invalid_component(field, source))
            })
            .collect()
    }

    fn storage_exact(&self, value: &Value) -> Result<Vec<BackendValue>, FieldError> {
        let values = self.to_value(value)?;
        let mut out = Vec::with_capacity(values.len());
        for (field, v) in self.components.iter().zip(&values) {
            let scalars = field
                .storage_values(LookupKind::Exact, v)
                .map_err(|source| self.invalid_component(field, source))?;
            out.extend(scalars);
        }

        Ok(out)
    }

    fn storage_groups(
        &self,
        lookup: LookupKind,
        value: &Value,
    ) -> Result<Vec<Vec<BackendValue>>, FieldError> {
        let groups = match lookup {
            LookupKind::Exact => vec![self.storage_exact(value)?],
            LookupKind::In => self
                .candidates(lookup, value)?
                .iter()
                .map(|candidate| self.storage_exact(candidate))
                .collect::<Result<_, _>>()?,
            other => return Err(self.unsupported(other.as_str())),
        };
        self.record_translated(lookup);

        Ok(groups)
    }

    fn candidates<'a>(
        &self,
        lookup: LookupKind,
        value: &'a Value,
    ) -> Result<&'a [Value], FieldError> {
        value.as_list().ok_or_else(|| FieldError::ExpectedSequence {
            field: self.label().to_string(),
            lookup: lookup.to_string(),
        })
    }

    fn unsupported(&self, lookup: &str) -> FieldError {
        sink::record(MetricsEvent::LookupRejected {
            entity_path: self.entity_path(),
        });

        FieldError::UnsupportedLookup {
            field: self.label().to_string(),
            lookup: lookup.to_string(),
        }
    }

    fn record_translated(&self, lookup: LookupKind) {
        sink::record(MetricsEvent::LookupTranslated {
            entity_path: self.entity_path(),
            lookup,
        });
    }
}

impl VirtualField for CompositeField {
    fn state(&self) -> &VirtualFieldState {
        &self.state
    }

    fn declare_on(
        self: Arc<Self>,
        builder: &mut EntityBuilder,
        name: &str,
    ) -> Result<(), InternalError> {
        if self.components.is_empty() {
            return Err(FieldError::EmptyComposite {
                field: name.to_string(),
            }
            .into());
        }

        declare_virtual(Arc::clone(&self), builder, name)?;

        if self.primary_key {
            builder.set_primary_key(name)?;
        } else if self.unique {
            builder.register_unique_together(
                self.components
                    .iter()
                    .map(|f| f.attribute_name().to_string()),
            );
        }

        builder.schedule_after_finalization(move |model| self.bind(model));

        Ok(())
    }

    fn storage_descriptor(&self) -> Option<StorageDescriptor> {
        self.binding.get().map(|b| b.storage.clone())
    }

    fn enclosed_fields(&self) -> Option<&[FieldRef]> {
        Some(&self.components)
    }

    fn read(&self, record: Option<&Record>) -> Result<Value, FieldError> {
        let Some(record) = record else {
            return Err(FieldError::UnboundAccess {
                field: self.label().to_string(),
            });
        };
        let binding = self.binding()?;

        // an unset component reads as Null
        let components = self
            .components
            .iter()
            .map(|f| record.raw(f.attribute_name()).cloned().unwrap_or(Value::Null))
            .collect();
        let value = binding.value_type.instantiate(components)?;

        sink::record(MetricsEvent::CompositeRead {
            entity_path: self.entity_path(),
        });

        Ok(Value::Composite(value))
    }

    fn write(&self, record: &mut Record, value: &Value) -> Result<(), FieldError> {
        if value.is_null() {
            sink::record(MetricsEvent::CompositeWrite {
                entity_path: self.entity_path(),
                noop: true,
            });
            return Ok(());
        }
        self.binding()?;

        // fully normalized before any slot is touched
        let values = self.to_value(value)?;
        for (field, v) in self.components.iter().zip(values) {
            record.set_raw(field.attribute_name(), v);
        }

        sink::record(MetricsEvent::CompositeWrite {
            entity_path: self.entity_path(),
            noop: false,
        });

        Ok(())
    }
}
