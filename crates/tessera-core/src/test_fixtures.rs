//! Entity models shared by unit tests.

use crate::{
    field::composite::CompositeField,
    model::{
        field::{FieldKind, FieldRef, ScalarField},
        registry::{EntityId, EntityRegistry},
    },
    record::Record,
    value::Value,
};
use std::sync::Arc;

///
/// PersonFixture
/// `tests::Person` with a unique `full_name` over first/last name.
///

pub(crate) struct PersonFixture {
    pub(crate) registry: EntityRegistry,
    pub(crate) id: EntityId,
    pub(crate) first_name: FieldRef,
    pub(crate) last_name: FieldRef,
    pub(crate) full_name: Arc<CompositeField>,
}

impl PersonFixture {
    pub(crate) fn record(&self) -> Record {
        self.registry.record(self.id).expect("person is registered")
    }

    /// Record for John Lennon, written through the atomic accessors.
    pub(crate) fn john(&self) -> Record {
        let mut record = self.record();
        record.set("id", 1u64).expect("id");
        record.set("first_name", "John").expect("first_name");
        record.set("last_name", "Lennon").expect("last_name");

        record
    }
}

pub(crate) fn person() -> PersonFixture {
    let mut registry = EntityRegistry::new();
    let mut handles = None;

    let id = registry
        .define("tests::Person", |b| {
            b.add_field(ScalarField::new("id", FieldKind::Uint).primary_key())?;
            let first_name = b.add_field(ScalarField::text("first_name", 64))?;
            let last_name = b.add_field(ScalarField::text("last_name", 64))?;
            b.add_field(ScalarField::new("birthday", FieldKind::Date).nullable())?;

            let full_name = b.add_virtual_field(
                "full_name",
                CompositeField::new([Arc::clone(&first_name), Arc::clone(&last_name)]).unique(),
            )?;
            handles = Some((first_name, last_name, full_name));

            Ok(())
        })
        .expect("person model");
    let (first_name, last_name, full_name) = handles.expect("person handles");

    PersonFixture {
        registry,
        id,
        first_name,
        last_name,
        full_name,
    }
}

///
/// MostFieldTypesFixture
/// One composite over a component of every `FieldKind`.
///

pub(crate) struct MostFieldTypesFixture {
    pub(crate) registry: EntityRegistry,
    pub(crate) id: EntityId,
    pub(crate) all_fields: Arc<CompositeField>,
}

impl MostFieldTypesFixture {
    pub(crate) fn record(&self) -> Record {
        self.registry.record(self.id).expect("model is registered")
    }
}

pub(crate) const MOST_FIELD_KINDS: [(&str, FieldKind); 8] = [
    ("bool_field", FieldKind::Bool),
    ("blob_field", FieldKind::Blob),
    ("date_field", FieldKind::Date),
    ("float_field", FieldKind::Float64),
    ("int_field", FieldKind::Int),
    ("text_field", FieldKind::Text),
    ("timestamp_field", FieldKind::Timestamp),
    ("uint_field", FieldKind::Uint),
];

pub(crate) fn most_field_types() -> MostFieldTypesFixture {
    let mut registry = EntityRegistry::new();
    let mut all_fields = None;

    let id = registry
        .define("tests::MostFieldTypes", |b| {
            let mut components = Vec::new();
            for (name, kind) in MOST_FIELD_KINDS {
                components.push(b.add_field(ScalarField::new(name, kind).nullable())?);
            }
            all_fields = Some(b.add_virtual_field("all_fields", CompositeField::new(components))?);

            Ok(())
        })
        .expect("most field types model");

    MostFieldTypesFixture {
        registry,
        id,
        all_fields: all_fields.expect("all_fields handle"),
    }
}

///
/// SentenceFreqFixture
/// Frequency table keyed by (weekday, sentence) references; the weekday
/// column is renamed to `wd`.
///

pub(crate) struct SentenceFreqFixture {
    pub(crate) registry: EntityRegistry,
    pub(crate) id: EntityId,
    pub(crate) key: Arc<CompositeField>,
}

impl SentenceFreqFixture {
    pub(crate) fn record(&self) -> Record {
        self.registry.record(self.id).expect("model is registered")
    }
}

pub(crate) fn sentence_freq() -> SentenceFreqFixture {
    let mut registry = EntityRegistry::new();
    for path in ["tests::WeekDay", "tests::Sentence"] {
        registry
            .define(path, |b| {
                b.add_field(ScalarField::new("id", FieldKind::Uint).primary_key())?;
                b.add_field(ScalarField::text("name", 32))?;
                Ok(())
            })
            .expect("referenced model");
    }

    let mut key = None;
    let id = registry
        .define("tests::SentenceFreq", |b| {
            // composite declared before its components
            let weekday = ScalarField::new("weekday", FieldKind::Uint)
                .references("tests::WeekDay")
                .column("wd");
            let sentence =
                ScalarField::new("sentence", FieldKind::Uint).references("tests::Sentence");
            let weekday: FieldRef = Arc::new(weekday);
            let sentence: FieldRef = Arc::new(sentence);

            key = Some(b.add_virtual_field(
                "weekday_sentence",
                CompositeField::new([Arc::clone(&weekday), Arc::clone(&sentence)]).primary_key(),
            )?);
            b.register_field(weekday)?;
            b.register_field(sentence)?;
            b.add_field(ScalarField::new("score", FieldKind::Float64))?;

            Ok(())
        })
        .expect("sentence freq model");

    SentenceFreqFixture {
        registry,
        id,
        key: key.expect("key handle"),
    }
}

/// Shorthand for a text value.
pub(crate) fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}
