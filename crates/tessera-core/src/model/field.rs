use crate::{
    lookup::LookupKind,
    types::{Date, Timestamp},
    value::{BackendType, BackendValue, Value, decode_hex},
};
use derive_more::Display;
use std::{fmt::Debug, sync::Arc};
use thiserror::Error as ThisError;

///
/// FieldRef
/// Shared handle to an atomic field owned by its entity.
///

pub type FieldRef = Arc<dyn AtomicField>;

///
/// FieldValueError
///
/// Rejection raised by an atomic field while converting or preparing a value.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum FieldValueError {
    #[error("field '{field}' expects {expected}, got {found}")]
    Invalid {
        field: String,
        expected: FieldKind,
        found: &'static str,
    },

    #[error("field '{field}' cannot parse '{text}' as {expected}")]
    Unparseable {
        field: String,
        expected: FieldKind,
        text: String,
    },

    #[error("field '{field}' value is out of range for its backend column")]
    OutOfRange { field: String },

    #[error("field '{field}' allows at most {max} characters, got {len}")]
    TooLong {
        field: String,
        max: usize,
        len: usize,
    },

    #[error("field '{field}' lookup '{lookup}' expects {expected}")]
    LookupShape {
        field: String,
        lookup: LookupKind,
        expected: &'static str,
    },

    #[error("field '{field}' does not support lookup '{lookup}'")]
    UnsupportedLookup { field: String, lookup: LookupKind },
}

///
/// FieldKind
///
/// Runtime type shape of an atomic field.
///

#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
pub enum FieldKind {
    Blob,
    Bool,
    Date,
    Float64,
    Int,
    Text,
    Timestamp,
    Uint,
}

impl FieldKind {
    /// Physical column type used for this kind.
    #[must_use]
    pub const fn backend_type(self) -> BackendType {
        match self {
            Self::Blob => BackendType::Blob,
            Self::Bool | Self::Int | Self::Timestamp | Self::Uint => BackendType::Integer,
            Self::Float64 => BackendType::Real,
            Self::Date | Self::Text => BackendType::Text,
        }
    }
}

///
/// ColumnDescriptor
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ColumnDescriptor {
    pub name: String,
    pub backend: BackendType,
    pub nullable: bool,
    pub max_length: Option<usize>,
}

///
/// StorageDescriptor
///
/// Storage shape of a field: one column, or a tuple of nested descriptors
/// (one per component of a composite field, in declaration order).
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum StorageDescriptor {
    Column(ColumnDescriptor),
    Tuple(Vec<Self>),
}

impl StorageDescriptor {
    /// Flattened physical columns in positional order.
    #[must_use]
    pub fn columns(&self) -> Vec<&ColumnDescriptor> {
        match self {
            Self::Column(column) => vec![column],
            Self::Tuple(parts) => parts.iter().flat_map(Self::columns).collect(),
        }
    }

    #[must_use]
    pub fn column_count(&self) -> usize {
        match self {
            Self::Column(_) => 1,
            Self::Tuple(parts) => parts.iter().map(Self::column_count).sum(),
        }
    }
}

///
/// AtomicField
///
/// Contract of a single-column attribute. Composite fields call into this
/// per component and never redefine conversion or storage rules.
///

pub trait AtomicField: Debug + Send + Sync {
    /// Declared field name.
    fn name(&self) -> &str;

    /// Record slot the value lives in.
    fn attribute_name(&self) -> &str;

    /// Physical column name.
    fn column_name(&self) -> &str;

    fn is_primary_key(&self) -> bool {
        false
    }

    fn storage_descriptor(&self) -> StorageDescriptor;

    /// Convert a raw value into this field's canonical value.
    fn to_value(&self, raw: &Value) -> Result<Value, FieldValueError>;

    /// Prepare a value for comparison under `lookup`.
    fn prepare_for_comparison(
        &self,
        lookup: LookupKind,
        value: &Value,
    ) -> Result<Value, FieldValueError>;

    /// Backend-ready scalars for `lookup`; may yield more than one.
    fn storage_values(
        &self,
        lookup: LookupKind,
        value: &Value,
    ) -> Result<Vec<BackendValue>, FieldValueError>;
}

///
/// ScalarField
///
/// Standard atomic field over one `FieldKind` column.
///

#[derive(Clone, Debug)]
pub struct ScalarField {
    name: String,
    attribute: String,
    db_column: Option<String>,
    kind: FieldKind,
    nullable: bool,
    max_length: Option<usize>,
    primary_key: bool,
    references: Option<String>,
}

impl ScalarField {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        let name = name.into();

        Self {
            attribute: name.clone(),
            name,
            db_column: None,
            kind,
            nullable: false,
            max_length: None,
            primary_key: false,
            references: None,
        }
    }

    #[must_use]
    pub fn text(name: impl Into<String>, max_length: usize) -> Self {
        Self::new(name, FieldKind::Text).max_length(max_length)
    }

    #[must_use]
    pub const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    #[must_use]
    pub const fn max_length(mut self, max: usize) -> Self {
        self.max_length = Some(max);
        self
    }

    /// Override the physical column name.
    #[must_use]
    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.db_column = Some(column.into());
        self
    }

    #[must_use]
    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Mark this field as a reference to `target`'s key; the value lives
    /// in the `<name>_id` slot.
    #[must_use]
    pub fn references(mut self, target: impl Into<String>) -> Self {
        self.attribute = format!("{}_id", self.name);
        self.references = Some(target.into());
        self
    }

    #[must_use]
    pub const fn kind(&self) -> FieldKind {
        self.kind
    }

    #[must_use]
    pub const fn is_nullable(&self) -> bool {
        self.nullable
    }

    #[must_use]
    pub fn target(&self) -> Option<&str> {
        self.references.as_deref()
    }

    fn invalid(&self, found: &Value) -> FieldValueError {
        FieldValueError::Invalid {
            field: self.name.clone(),
            expected: self.kind,
            found: found.label(),
        }
    }

    fn unparseable(&self, text: &str) -> FieldValueError {
        FieldValueError::Unparseable {
            field: self.name.clone(),
            expected: self.kind,
            text: text.to_string(),
        }
    }

    fn check_length(&self, text: String) -> Result<Value, FieldValueError> {
        if let Some(max) = self.max_length {
            let len = text.chars().count();
            if len > max {
                return Err(FieldValueError::TooLong {
                    field: self.name.clone(),
                    max,
                    len,
                });
            }
        }

        Ok(Value::Text(text))
    }

    // Parse the text form produced by `Value::to_text` back into this kind.
    // Empty text means "no value" for every kind except text itself.
    fn parse_text(&self, text: &str) -> Result<Value, FieldValueError> {
        if text.is_empty() && self.kind != FieldKind::Text {
            return Ok(Value::Null);
        }

        let parsed = match self.kind {
            FieldKind::Blob => decode_hex(text).map(Value::Blob),
            FieldKind::Bool => match text.trim().to_ascii_lowercase().as_str() {
                "true" | "t" | "1" => Some(Value::Bool(true)),
                "false" | "f" | "0" => Some(Value::Bool(false)),
                _ => None,
            },
            FieldKind::Date => Date::parse(text).map(Value::Date),
            FieldKind::Float64 => text
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(Value::Float64),
            FieldKind::Int => text.trim().parse().ok().map(Value::Int),
            FieldKind::Text => return self.check_length(text.to_string()),
            FieldKind::Timestamp => Timestamp::parse(text).map(Value::Timestamp),
            FieldKind::Uint => text.trim().parse().ok().map(Value::Uint),
        };

        parsed.ok_or_else(|| self.unparseable(text))
    }

    fn to_backend(&self, value: &Value) -> Result<BackendValue, FieldValueError> {
        let backend = match value {
            Value::Null => BackendValue::Null,
            Value::Blob(bytes) => BackendValue::Blob(bytes.clone()),
            Value::Bool(b) => BackendValue::Integer(i64::from(*b)),
            Value::Date(d) => BackendValue::Text(d.to_string()),
            Value::Float64(f) => BackendValue::Real(*f),
            Value::Int(i) => BackendValue::Integer(*i),
            Value::Text(s) => BackendValue::Text(s.clone()),
            Value::Timestamp(t) => BackendValue::Integer(t.seconds()),
            Value::Uint(u) => {
                BackendValue::Integer(i64::try_from(*u).map_err(|_| FieldValueError::OutOfRange {
                    field: self.name.clone(),
                })?)
            }
            Value::Composite(_) | Value::List(_) => return Err(self.invalid(value)),
        };

        Ok(backend)
    }

    fn expect_sequence<'a>(
        &self,
        lookup: LookupKind,
        value: &'a Value,
    ) -> Result<&'a [Value], FieldValueError> {
        let items = value.as_list().ok_or_else(|| FieldValueError::LookupShape {
            field: self.name.clone(),
            lookup,
            expected: "a list",
        })?;
        if lookup == LookupKind::Range && items.len() != 2 {
            return Err(FieldValueError::LookupShape {
                field: self.name.clone(),
                lookup,
                expected: "a [low, high] pair",
            });
        }

        Ok(items)
    }
}

impl AtomicField for ScalarField {
    fn name(&self) -> &str {
        &self.name
    }

    fn attribute_name(&self) -> &str {
        &self.attribute
    }

    fn column_name(&self) -> &str {
        self.db_column.as_deref().unwrap_or(&self.attribute)
    }

    fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    fn storage_descriptor(&self) -> StorageDescriptor {
        StorageDescriptor::Column(ColumnDescriptor {
            name: self.column_name().to_string(),
            backend: self.kind.backend_type(),
            nullable: self.nullable,
            max_length: self.max_length,
        })
    }

    #[expect(clippy::cast_precision_loss)]
    fn to_value(&self, raw: &Value) -> Result<Value, FieldValueError> {
        let value = match (self.kind, raw) {
            (_, Value::Null) => Value::Null,
            (_, Value::Text(text)) => return self.parse_text(text),

            (FieldKind::Blob, Value::Blob(_))
            | (FieldKind::Bool, Value::Bool(_))
            | (FieldKind::Date, Value::Date(_))
            | (FieldKind::Int, Value::Int(_))
            | (FieldKind::Timestamp, Value::Timestamp(_))
            | (FieldKind::Uint, Value::Uint(_)) => raw.clone(),

            (FieldKind::Bool, Value::Int(0) | Value::Uint(0)) => Value::Bool(false),
            (FieldKind::Bool, Value::Int(1) | Value::Uint(1)) => Value::Bool(true),
            (FieldKind::Float64, Value::Float64(f)) if f.is_finite() => Value::Float64(*f),
            (FieldKind::Float64, Value::Int(i)) => Value::Float64(*i as f64),
            (FieldKind::Float64, Value::Uint(u)) => Value::Float64(*u as f64),
            (FieldKind::Int, Value::Uint(u)) => {
                Value::Int(i64::try_from(*u).map_err(|_| self.invalid(raw))?)
            }
            (FieldKind::Uint, Value::Int(i)) => {
                Value::Uint(u64::try_from(*i).map_err(|_| self.invalid(raw))?)
            }
            (FieldKind::Timestamp, Value::Int(secs)) => {
                Value::Timestamp(Timestamp::from_seconds(*secs))
            }
            (FieldKind::Text, scalar) if scalar.is_scalar() => {
                return self.check_length(scalar.to_text());
            }

            _ => return Err(self.invalid(raw)),
        };

        Ok(value)
    }

    fn prepare_for_comparison(
        &self,
        lookup: LookupKind,
        value: &Value,
    ) -> Result<Value, FieldValueError> {
        match lookup {
            LookupKind::Exact
            | LookupKind::IExact
            | LookupKind::Gt
            | LookupKind::Gte
            | LookupKind::Lt
            | LookupKind::Lte => self.to_value(value),
            LookupKind::In | LookupKind::Range => {
                let items = self.expect_sequence(lookup, value)?;
                let prepared = items
                    .iter()
                    .map(|item| self.to_value(item))
                    .collect::<Result<Vec<_>, _>>()?;

                Ok(Value::List(prepared))
            }
            LookupKind::Contains | LookupKind::StartsWith | LookupKind::EndsWith => {
                if self.kind != FieldKind::Text {
                    return Err(FieldValueError::UnsupportedLookup {
                        field: self.name.clone(),
                        lookup,
                    });
                }

                self.to_value(value)
            }
            LookupKind::IsNull => match value {
                Value::Bool(_) => Ok(value.clone()),
                _ => Err(FieldValueError::LookupShape {
                    field: self.name.clone(),
                    lookup,
                    expected: "a boolean",
                }),
            },
        }
    }

    fn storage_values(
        &self,
        lookup: LookupKind,
        value: &Value,
    ) -> Result<Vec<BackendValue>, FieldValueError> {
        // `isnull` binds no parameter
        if lookup == LookupKind::IsNull {
            self.prepare_for_comparison(lookup, value)?;
            return Ok(Vec::new());
        }

        match self.prepare_for_comparison(lookup, value)? {
            Value::List(items) if lookup.takes_sequence() => {
                items.iter().map(|item| self.to_backend(item)).collect()
            }
            prepared => Ok(vec![self.to_backend(&prepared)?]),
        }
    }
}
