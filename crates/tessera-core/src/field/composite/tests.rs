use super::*;
use crate::{
    codec::CodecError,
    model::{
        field::{FieldKind, ScalarField},
        registry::{EntityId, EntityRegistry},
    },
    obs::{MetricsSink, sink::with_metrics_sink},
    test_fixtures::{self, text},
    types::{Date, Timestamp},
    value::BackendType,
};
use proptest::prelude::*;
use std::cell::RefCell;

fn components(value: &Value) -> Vec<Value> {
    value
        .as_composite()
        .expect("composite read")
        .components()
        .to_vec()
}

///
/// BINDING
///

#[test]
fn binding_builds_value_type_and_storage() {
    let fixture = test_fixtures::person();
    let field = &fixture.full_name;

    assert!(field.is_bound());
    let value_type = field.value_type().unwrap();
    assert_eq!(value_type.name(), "Person_full_name");
    assert_eq!(value_type.slots(), &["first_name", "last_name"]);

    let storage = field.storage_descriptor().unwrap();
    assert_eq!(storage, field.storage_type());
    assert_eq!(storage.column_count(), 2);
    assert!(
        storage
            .columns()
            .iter()
            .all(|c| c.backend == BackendType::Text && c.max_length == Some(64))
    );
}

#[test]
fn composite_is_excluded_from_persisted_columns() {
    let fixture = test_fixtures::person();
    let model = fixture.registry.get(fixture.id).unwrap();

    let columns: Vec<_> = model
        .concrete_columns()
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(columns, vec!["id", "first_name", "last_name", "birthday"]);
    assert_eq!(model.virtual_fields().len(), 1);
    assert!(model.field("full_name").is_none());
}

#[test]
fn unique_composite_registers_component_attributes() {
    let fixture = test_fixtures::person();
    let model = fixture.registry.get(fixture.id).unwrap();

    assert_eq!(
        model.unique_together(),
        &[vec!["first_name".to_string(), "last_name".to_string()]]
    );
    assert!(fixture.full_name.is_unique());
}

#[test]
fn composite_primary_key_uses_enclosed_columns() {
    let fixture = test_fixtures::sentence_freq();
    let model = fixture.registry.get(fixture.id).unwrap();

    assert_eq!(model.primary_key(), Some("weekday_sentence"));
    assert!(model.unique_together().is_empty());
    assert_eq!(
        model.unique_column_sets(),
        vec![vec!["wd".to_string(), "sentence_id".to_string()]]
    );

    let columns: Vec<_> = fixture
        .key
        .storage_type()
        .columns()
        .into_iter()
        .map(|c| c.name.clone())
        .collect();
    assert_eq!(columns, vec!["wd", "sentence_id"]);
}

#[test]
fn components_declared_after_composite_are_bound() {
    let fixture = test_fixtures::sentence_freq();
    let mut record = fixture.record();

    record.set("weekday_sentence", (2u64, 9u64)).unwrap();
    assert_eq!(record.raw("weekday_id"), Some(&Value::Uint(2)));
    assert_eq!(record.raw("sentence_id"), Some(&Value::Uint(9)));
    assert_eq!(
        record
            .primary_key_value()
            .unwrap()
            .map(|v| components(&v)),
        Some(vec![Value::Uint(2), Value::Uint(9)])
    );
}

#[test]
fn component_missing_from_owner_fails_finalization() {
    let stray: FieldRef = Arc::new(ScalarField::new("stray", FieldKind::Int));
    let mut registry = EntityRegistry::new();

    let err = registry
        .define("tests::Stray", |b| {
            let a = b.add_field(ScalarField::new("a", FieldKind::Int))?;
            b.add_virtual_field("pair", CompositeField::new([a, Arc::clone(&stray)]))?;
            Ok(())
        })
        .unwrap_err();

    assert!(matches!(
        err.field_error(),
        Some(FieldError::ComponentNotDeclared { component, .. }) if component == "stray"
    ));
    assert!(registry.is_empty());
}

#[test]
fn empty_composite_is_rejected_at_declaration() {
    let mut registry = EntityRegistry::new();
    let err = registry
        .define("tests::Empty", |b| {
            b.add_virtual_field("nothing", CompositeField::new([]))?;
            Ok(())
        })
        .unwrap_err();

    assert!(matches!(
        err.field_error(),
        Some(FieldError::EmptyComposite { field }) if field == "nothing"
    ));
}

#[test]
fn undeclared_field_is_not_bound() {
    let a: FieldRef = Arc::new(ScalarField::new("a", FieldKind::Int));
    let field = CompositeField::new([a]);
    let fixture = test_fixtures::person();
    let mut record = fixture.record();

    assert!(!field.is_bound());
    assert_eq!(field.storage_descriptor(), None);
    assert_eq!(
        field.write(&mut record, &Value::from_slice(&[1i64])),
        Err(FieldError::NotBound {
            field: "composite".to_string()
        })
    );
}

///
/// READ / WRITE
///

#[test]
fn scenario_a_read_and_encode() {
    let fixture = test_fixtures::person();
    let record = fixture.john();

    let full = record.get("full_name").unwrap();
    assert_eq!(components(&full), vec![text("John"), text("Lennon")]);

    let value = full.as_composite().unwrap();
    assert_eq!(value.get("first_name"), Some(&text("John")));
    assert_eq!(value.get_index(1), Some(&text("Lennon")));
    assert_eq!(fixture.full_name.encode(value), "John,Lennon");
    assert_eq!(value.to_string(), "John,Lennon");
    assert_eq!(
        fixture.full_name.decode("John,Lennon").unwrap(),
        vec!["John", "Lennon"]
    );
}

#[test]
fn scenario_b_separator_inside_component() {
    let fixture = test_fixtures::person();
    let mut record = fixture.record();
    record.set("first_name", "a,b").unwrap();
    record.set("last_name", "c").unwrap();

    let full = record.get("full_name").unwrap();
    assert_eq!(fixture.full_name.encode(full.as_composite().unwrap()), "a~,b,c");
    assert_eq!(fixture.full_name.decode("a~,b").unwrap(), vec!["a,b"]);
}

#[test]
fn scenario_d_write_then_read() {
    let fixture = test_fixtures::person();
    let mut record = fixture.john();

    record.set("full_name", ("Keith", "Sanderson")).unwrap();
    assert_eq!(
        components(&record.get("full_name").unwrap()),
        vec![text("Keith"), text("Sanderson")]
    );

    let err = record
        .set("full_name", Value::from_slice(&["Keith"]))
        .unwrap_err();
    assert_eq!(
        err,
        FieldError::ArityMismatch {
            field: "full_name".to_string(),
            expected: 2,
            found: 1,
        }
    );
    // rejected write left the slots alone
    assert_eq!(record.get("first_name"), Ok(text("Keith")));
}

#[test]
fn read_reflects_direct_component_writes() {
    let fixture = test_fixtures::person();
    let mut record = fixture.john();

    record.set_raw(fixture.last_name.attribute_name(), text("McCartney"));
    record.set_raw(fixture.first_name.attribute_name(), text("Paul"));

    assert_eq!(
        components(&record.get("full_name").unwrap()),
        vec![text("Paul"), text("McCartney")]
    );
}

#[test]
fn unset_components_read_as_null() {
    let fixture = test_fixtures::person();
    let mut record = fixture.record();
    record.set("last_name", "Starr").unwrap();

    assert_eq!(
        components(&record.get("full_name").unwrap()),
        vec![Value::Null, text("Starr")]
    );
}

#[test]
fn unset_components_survive_encode_and_decode() {
    let fixture = test_fixtures::person();
    let mut record = fixture.record();
    record.set("last_name", "Starr").unwrap();

    let read = record.get("full_name").unwrap();
    let encoded = fixture.full_name.encode(read.as_composite().unwrap());
    assert_eq!(encoded, ",Starr");

    let mut copy = fixture.record();
    copy.set("full_name", encoded.as_str()).unwrap();
    assert_eq!(copy.get("full_name").unwrap(), read);
    assert_eq!(copy.raw("first_name"), Some(&Value::Null));
    assert_eq!(copy.get("last_name").unwrap().as_text(), Some("Starr"));
}

#[test]
fn empty_text_component_shares_the_null_encoding() {
    let fixture = test_fixtures::person();
    let mut record = fixture.record();
    record.set("full_name", ("", "Starr")).unwrap();
    assert_eq!(record.get("first_name").unwrap().as_text(), Some(""));

    // only the string form folds "" into Null
    let encoded = record.get("full_name").unwrap().as_composite().unwrap().encode();
    let mut copy = fixture.record();
    copy.set("full_name", encoded.as_str()).unwrap();
    assert_eq!(copy.get("first_name"), Ok(Value::Null));
}

#[test]
fn null_write_is_a_noop() {
    let fixture = test_fixtures::person();
    let mut record = fixture.john();

    record.set("full_name", Value::Null).unwrap();

    assert_eq!(record.get("first_name"), Ok(text("John")));
    assert_eq!(record.get("last_name"), Ok(text("Lennon")));
}

#[test]
fn write_accepts_encoded_string_and_snapshot() {
    let fixture = test_fixtures::person();
    let mut record = fixture.record();

    record.set("full_name", "Ringo,Starr").unwrap();
    assert_eq!(record.get("first_name"), Ok(text("Ringo")));

    let snapshot = record.get("full_name").unwrap();
    let mut other = fixture.record();
    other.set("full_name", snapshot.clone()).unwrap();
    assert_eq!(other.get("full_name").unwrap(), snapshot);
}

#[test]
fn invalid_component_value_prevents_write() {
    let fixture = test_fixtures::person();
    let mut record = fixture.john();
    let long = "x".repeat(65);

    let err = record
        .set("full_name", ("George", long.as_str()))
        .unwrap_err();

    assert!(matches!(
        err,
        FieldError::InvalidComponentValue { ref component, .. } if component == "last_name"
    ));
    assert_eq!(record.get("first_name"), Ok(text("John")));
}

#[test]
fn malformed_encoding_is_a_decode_error() {
    let fixture = test_fixtures::person();
    let mut record = fixture.john();

    let err = record.set("full_name", "John,Lennon~").unwrap_err();
    assert_eq!(
        err,
        FieldError::Decode {
            field: "full_name".to_string(),
            source: CodecError::TrailingEscape { offset: 11 },
        }
    );
}

#[test]
fn reading_off_the_type_is_unbound_access() {
    let fixture = test_fixtures::person();
    let model = fixture.registry.get(fixture.id).unwrap();

    assert_eq!(
        model.class_attribute("full_name"),
        Err(FieldError::UnboundAccess {
            field: "full_name".to_string()
        })
    );
}

#[test]
fn typed_components_round_trip_through_string_form() {
    let fixture = test_fixtures::most_field_types();
    let mut record = fixture.record();
    let original = Value::List(vec![
        Value::Bool(true),
        Value::Blob(vec![0x01, 0xab]),
        Value::Date(Date::new_checked(2024, 2, 29).unwrap()),
        Value::Float64(0.25),
        Value::Int(-12),
        text("comma, and ~tilde"),
        Value::Timestamp(Timestamp::from_seconds(1_700_000_000)),
        Value::Uint(99),
    ]);

    record.set("all_fields", original.clone()).unwrap();
    let read = record.get("all_fields").unwrap();
    let encoded = fixture.all_fields.encode(read.as_composite().unwrap());

    let mut copy = fixture.record();
    copy.set("all_fields", Value::Text(encoded)).unwrap();
    assert_eq!(copy.get("all_fields").unwrap(), read);
    assert_eq!(
        read.as_composite().unwrap().components(),
        original.as_list().unwrap()
    );
}

#[test]
fn replace_returns_modified_copy() {
    let fixture = test_fixtures::person();
    let full = fixture.john().get("full_name").unwrap();
    let value = full.as_composite().unwrap();

    let replaced = value.replace("last_name", "Ono").unwrap();
    assert_eq!(replaced.components(), &[text("John"), text("Ono")]);
    assert_eq!(value.get("last_name"), Some(&text("Lennon")));
    assert!(matches!(
        value.replace("middle_name", "Winston"),
        Err(FieldError::UnknownField { .. })
    ));
}

#[test]
fn field_codec_override_applies() {
    let mut registry = EntityRegistry::new();
    let mut handle = None;
    let codec = CompositeCodec::new('|', '\\').unwrap();

    let id = registry
        .define("tests::Piped", |b| {
            let a = b.add_field(ScalarField::new("a", FieldKind::Text))?;
            let c = b.add_field(ScalarField::new("c", FieldKind::Text))?;
            let ac = CompositeField::new([a, c]).with_codec(codec);
            handle = Some(b.add_virtual_field("ac", ac)?);
            Ok(())
        })
        .unwrap();
    let field = handle.unwrap();
    let mut record = registry.record(id).unwrap();

    record.set("ac", "x,y|z").unwrap();
    assert_eq!(record.get("a"), Ok(text("x,y")));
    let full = record.get("ac").unwrap();
    assert_eq!(field.encode(full.as_composite().unwrap()), "x,y|z");
    assert_eq!(full.as_composite().unwrap().encode(), "x~,y,z");
}

///
/// LOOKUPS
///

#[test]
fn exact_lookup_prepares_each_component() {
    let fixture = test_fixtures::person();

    let prepared = fixture
        .full_name
        .translate_lookup(LookupKind::Exact, &Value::from(("John", "Lennon")))
        .unwrap();
    assert_eq!(
        prepared,
        PreparedLookup::Exact(vec![text("John"), text("Lennon")])
    );
}

#[test]
fn in_lookup_keeps_one_group_per_candidate() {
    let fixture = test_fixtures::person();
    let candidates = Value::List(vec![
        Value::from(("John", "Lennon")),
        Value::from("George,Harrison"),
    ]);

    let prepared = fixture
        .full_name
        .translate_lookup(LookupKind::In, &candidates)
        .unwrap();
    assert_eq!(prepared.group_count(), 2);
    assert_eq!(
        prepared,
        PreparedLookup::In(vec![
            vec![text("John"), text("Lennon")],
            vec![text("George"), text("Harrison")],
        ])
    );
}

#[test]
fn scenario_c_in_for_storage_is_flat() {
    let fixture = test_fixtures::person();
    let candidates = Value::List(vec![
        Value::from(("John", "Lennon")),
        Value::from(("George", "Harrison")),
    ]);

    let scalars = fixture
        .full_name
        .translate_for_storage(LookupKind::In, &candidates)
        .unwrap();
    assert_eq!(
        scalars,
        vec![
            BackendValue::from("John"),
            BackendValue::from("Lennon"),
            BackendValue::from("George"),
            BackendValue::from("Harrison"),
        ]
    );
}

#[test]
fn storage_translation_uses_backend_scalars() {
    let fixture = test_fixtures::sentence_freq();

    let scalars = fixture
        .key
        .translate_for_storage(LookupKind::Exact, &Value::from("2,9"))
        .unwrap();
    assert_eq!(scalars, vec![BackendValue::Integer(2), BackendValue::Integer(9)]);
}

#[test]
fn ordering_lookups_are_unsupported() {
    let fixture = test_fixtures::person();
    let value = Value::from(("John", "Lennon"));

    for lookup in LookupKind::ALL {
        if matches!(lookup, LookupKind::Exact | LookupKind::In) {
            continue;
        }
        assert_eq!(
            fixture.full_name.translate_lookup(lookup, &value),
            Err(FieldError::UnsupportedLookup {
                field: "full_name".to_string(),
                lookup: lookup.to_string(),
            })
        );
        assert!(fixture.full_name.translate_for_storage(lookup, &value).is_err());
    }
}

#[test]
fn unknown_lookup_names_are_unsupported() {
    let fixture = test_fixtures::person();

    assert_eq!(fixture.full_name.resolve_lookup("in"), Ok(LookupKind::In));
    assert!(matches!(
        fixture.full_name.resolve_lookup("regex"),
        Err(FieldError::UnsupportedLookup { lookup, .. }) if lookup == "regex"
    ));
}

#[test]
fn in_lookup_requires_a_sequence() {
    let fixture = test_fixtures::person();

    assert!(matches!(
        fixture
            .full_name
            .translate_lookup(LookupKind::In, &Value::from("John,Lennon")),
        Err(FieldError::ExpectedSequence { .. })
    ));
}

#[test]
fn column_predicates_follow_storage_columns() {
    let fixture = test_fixtures::sentence_freq();
    let candidates = Value::List(vec![Value::from((1u64, 2u64)), Value::from((3u64, 4u64))]);

    let predicate = fixture
        .key
        .column_predicates(LookupKind::In, &candidates)
        .unwrap();
    assert_eq!(predicate.columns(), vec!["wd", "sentence_id", "wd", "sentence_id"]);
    assert!(matches!(&predicate, ColumnPredicate::Or(groups) if groups.len() == 2));

    let exact = fixture
        .key
        .column_predicates(LookupKind::Exact, &Value::from((1u64, 2u64)))
        .unwrap();
    assert_eq!(
        exact,
        ColumnPredicate::And(vec![
            ColumnPredicate::Eq {
                column: "wd".to_string(),
                value: BackendValue::Integer(1),
            },
            ColumnPredicate::Eq {
                column: "sentence_id".to_string(),
                value: BackendValue::Integer(2),
            },
        ])
    );

    assert_eq!(
        fixture
            .key
            .column_predicates(LookupKind::In, &Value::List(Vec::new())),
        Ok(ColumnPredicate::Never)
    );
}

///
/// METRICS
///

#[derive(Default)]
struct RecordingSink {
    events: RefCell<Vec<String>>,
}

impl MetricsSink for RecordingSink {
    fn record(&self, event: MetricsEvent<'_>) {
        let label = match event {
            MetricsEvent::FieldDeclared { .. } => "declared".to_string(),
            MetricsEvent::FieldBound { .. } => "bound".to_string(),
            MetricsEvent::CompositeRead { .. } => "read".to_string(),
            MetricsEvent::CompositeWrite { noop, .. } => format!("write:{noop}"),
            MetricsEvent::LookupTranslated { lookup, .. } => format!("lookup:{lookup}"),
            MetricsEvent::LookupRejected { .. } => "rejected".to_string(),
            MetricsEvent::DecodeFailed { .. } => "decode_failed".to_string(),
            MetricsEvent::ArityRejected { .. } => "arity".to_string(),
        };
        self.events.borrow_mut().push(label);
    }
}

#[test]
fn operations_emit_metrics_events() {
    let sink = RecordingSink::default();

    with_metrics_sink(&sink, || {
        let fixture = test_fixtures::person();
        let mut record = fixture.john();
        record.set("full_name", Value::Null).unwrap();
        record.set("full_name", ("Yoko", "Ono")).unwrap();
        record.get("full_name").unwrap();
        let _ = record.set("full_name", Value::from_slice(&["Yoko"]));
        let _ = record.set("full_name", "bad~");
        let _ = fixture
            .full_name
            .translate_lookup(LookupKind::Lt, &Value::Null);
        let _ = fixture
            .full_name
            .translate_lookup(LookupKind::Exact, &Value::from(("a", "b")));
    });

    assert_eq!(
        *sink.events.borrow(),
        vec![
            "declared",
            "bound",
            "write:true",
            "write:false",
            "read",
            "arity",
            "decode_failed",
            "rejected",
            "lookup:exact",
        ]
    );
}

///
/// PROPERTIES
///

fn text_field_registry(arity: usize) -> (EntityRegistry, EntityId, Arc<CompositeField>) {
    let mut registry = EntityRegistry::new();
    let mut handle = None;

    let id = registry
        .define("tests::Wide", |b| {
            let mut parts = Vec::new();
            for i in 0..arity {
                parts.push(b.add_field(ScalarField::new(format!("c{i}"), FieldKind::Text))?);
            }
            handle = Some(b.add_virtual_field("wide", CompositeField::new(parts))?);
            Ok(())
        })
        .expect("wide model");

    (registry, id, handle.expect("wide handle"))
}

proptest! {
    #[test]
    fn arity_mismatch_is_always_rejected(arity in 1usize..5, len in 0usize..8) {
        prop_assume!(arity != len);
        let (registry, id, field) = text_field_registry(arity);
        let mut record = registry.record(id).unwrap();
        let input = Value::List((0..len).map(|i| Value::Text(format!("v{i}"))).collect());

        let write = record.set("wide", input.clone());
        let is_write_arity = matches!(write, Err(FieldError::ArityMismatch { .. }));
        let lookup = field.translate_lookup(LookupKind::Exact, &input);
        let is_lookup_arity = matches!(lookup, Err(FieldError::ArityMismatch { .. }));
        prop_assert!(is_write_arity);
        prop_assert!(is_lookup_arity);
        let untouched = (0..arity).all(|i| record.raw(&format!("c{i}")).is_none());
        prop_assert!(untouched);
    }

    #[test]
    fn write_propagates_positionally(parts in proptest::collection::vec("[a-z,~]{1,6}", 1..5)) {
        let (registry, id, _field) = text_field_registry(parts.len());
        let mut record = registry.record(id).unwrap();

        record.set("wide", Value::from_slice(&parts)).unwrap();
        for (i, part) in parts.iter().enumerate() {
            prop_assert_eq!(record.raw(&format!("c{i}")), Some(&Value::Text(part.clone())));
        }

        let read = record.get("wide").unwrap();
        let encoded = read.as_composite().unwrap().encode();
        let mut copy = registry.record(id).unwrap();
        copy.set("wide", Value::Text(encoded)).unwrap();
        prop_assert_eq!(copy.get("wide").unwrap(), read);
    }
}
