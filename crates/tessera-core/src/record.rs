use crate::{
    field::FieldError,
    model::entity::{Accessor, EntityModel},
    value::Value,
};
use std::{collections::BTreeMap, sync::Arc};

///
/// Record
///
/// One instance of an entity. Slots are keyed by attribute name and are
/// the only source of truth; virtual fields are views over them.
///

#[derive(Clone, Debug)]
pub struct Record {
    model: Arc<EntityModel>,
    slots: BTreeMap<String, Value>,
}

impl Record {
    #[must_use]
    pub const fn new(model: Arc<EntityModel>) -> Self {
        Self {
            model,
            slots: BTreeMap::new(),
        }
    }

    /// Initialize through the accessor table, in the given order.
    pub fn from_values<I, S>(model: Arc<EntityModel>, values: I) -> Result<Self, FieldError>
    where
        I: IntoIterator<Item = (S, Value)>,
        S: AsRef<str>,
    {
        let mut record = Self::new(model);
        for (name, value) in values {
            record.set(name.as_ref(), value)?;
        }

        Ok(record)
    }

    #[must_use]
    pub fn model(&self) -> &EntityModel {
        &self.model
    }

    fn accessor(&self, name: &str) -> Result<Accessor, FieldError> {
        self.model
            .accessor(name)
            .cloned()
            .ok_or_else(|| FieldError::UnknownField {
                entity: self.model.path().to_string(),
                field: name.to_string(),
            })
    }

    ///
    /// ACCESS
    ///

    /// Read `name` through its accessor.
    pub fn get(&self, name: &str) -> Result<Value, FieldError> {
        match self.accessor(name)? {
            Accessor::Atomic(field) => Ok(self
                .raw(field.attribute_name())
                .cloned()
                .unwrap_or(Value::Null)),
            Accessor::Virtual(field) => field.read(Some(self)),
        }
    }

    /// Write `name` through its accessor.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<(), FieldError> {
        let value = value.into();

        match self.accessor(name)? {
            Accessor::Atomic(field) => {
                let converted = field.to_value(&value).map_err(|source| FieldError::InvalidValue {
                    field: name.to_string(),
                    source,
                })?;
                self.set_raw(field.attribute_name(), converted);

                Ok(())
            }
            Accessor::Virtual(field) => field.write(self, &value),
        }
    }

    /// Slot value, bypassing accessors.
    #[must_use]
    pub fn raw(&self, attribute: &str) -> Option<&Value> {
        self.slots.get(attribute)
    }

    /// Overwrite a slot, bypassing accessors and conversion.
    pub fn set_raw(&mut self, attribute: &str, value: Value) {
        self.slots.insert(attribute.to_string(), value);
    }

    /// Write `Null` to every field, virtual ones included.
    pub fn clear(&mut self) -> Result<(), FieldError> {
        let names: Vec<String> = self.model.accessor_names().map(str::to_string).collect();
        for name in names {
            self.set(&name, Value::Null)?;
        }

        Ok(())
    }

    /// Primary key value, if the entity declares one.
    pub fn primary_key_value(&self) -> Result<Option<Value>, FieldError> {
        self.model
            .primary_key()
            .map(|name| self.get(name))
            .transpose()
    }

    /// Persisted fields only, by field name, in declaration order.
    #[must_use]
    pub fn serialize_fields(&self) -> Vec<(String, Value)> {
        self.model
            .serializable_fields()
            .map(|field| {
                let value = self
                    .raw(field.attribute_name())
                    .cloned()
                    .unwrap_or(Value::Null);

                (field.name().to_string(), value)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model::{
            field::{FieldKind, ScalarField},
            registry::EntityRegistry,
        },
        test_fixtures,
    };

    #[test]
    fn atomic_set_converts_through_field() {
        let fixture = test_fixtures::person();
        let mut record = fixture.record();

        record.set("birthday", "1940-10-09").unwrap();
        assert!(matches!(record.get("birthday"), Ok(Value::Date(_))));

        let err = record.set("birthday", "not a date").unwrap_err();
        assert!(matches!(err, FieldError::InvalidValue { field, .. } if field == "birthday"));
    }

    #[test]
    fn unknown_field_is_reported_with_entity() {
        let fixture = test_fixtures::person();
        let record = fixture.record();

        assert_eq!(
            record.get("nickname"),
            Err(FieldError::UnknownField {
                entity: "tests::Person".to_string(),
                field: "nickname".to_string(),
            })
        );
    }

    #[test]
    fn clear_resets_atomic_slots_and_skips_composites() {
        let fixture = test_fixtures::person();
        let mut record = fixture.john();

        record.clear().unwrap();

        assert_eq!(record.get("first_name"), Ok(Value::Null));
        assert_eq!(record.get("last_name"), Ok(Value::Null));
        let full = record.get("full_name").unwrap();
        assert_eq!(
            full.as_composite().unwrap().components(),
            &[Value::Null, Value::Null]
        );
    }

    #[test]
    fn serialize_fields_excludes_virtual_fields() {
        let fixture = test_fixtures::person();
        let record = fixture.john();

        let names: Vec<_> = record
            .serialize_fields()
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, vec!["id", "first_name", "last_name", "birthday"]);
    }

    #[test]
    fn reference_field_is_stored_under_id_slot() {
        let mut registry = EntityRegistry::new();
        let id = registry
            .define("tests::Note", |b| {
                b.add_field(ScalarField::new("author", FieldKind::Uint).references("Person"))?;
                Ok(())
            })
            .unwrap();
        let mut record = registry.record(id).unwrap();

        record.set("author", 3u64).unwrap();
        assert_eq!(record.raw("author_id"), Some(&Value::Uint(3)));
        assert_eq!(record.raw("author"), None);
        assert_eq!(record.get("author"), Ok(Value::Uint(3)));
    }

    #[test]
    fn primary_key_value_reads_declared_key() {
        let fixture = test_fixtures::person();
        let record = fixture.john();

        assert_eq!(record.primary_key_value(), Ok(Some(Value::Uint(1))));
    }
}
