mod backend;


use crate::{
    codec,
    field::composite::CompositeValue,
    types::{Date, Timestamp},
};
use candid::CandidType;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

// re-exports
pub use backend::{BackendType, BackendValue};

///
/// Value
///
/// Field-level value held in record slots and passed through lookups.
///
/// Null        → the neutral "no value"; writing it to a composite is a no-op.
/// Composite   → snapshot produced by reading a composite field.
///

#[derive(CandidType, Clone, Debug, Deserialize, PartialEq, Serialize)]
pub enum Value {
    Blob(Vec<u8>),
    Bool(bool),
    Composite(CompositeValue),
    Date(Date),
    Float64(f64),
    Int(i64),
    /// Ordered list of values.
    /// Sequence input for composite writes and `in` lookups.
    List(Vec<Self>),
    Null,
    Text(String),
    Timestamp(Timestamp),
    Uint(u64),
}

impl Value {
    ///
    /// CONSTRUCTION
    ///

    /// Build a `Value::List` from a list literal.
    pub fn from_slice<T>(items: &[T]) -> Self
    where
        T: Into<Self> + Clone,
    {
        Self::List(items.iter().cloned().map(Into::into).collect())
    }

    ///
    /// TYPES
    ///

    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub const fn is_scalar(&self) -> bool {
        !matches!(self, Self::List(_) | Self::Composite(_))
    }

    /// Stable human-readable value kind label for diagnostics.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Blob(_) => "Blob",
            Self::Bool(_) => "Bool",
            Self::Composite(_) => "Composite",
            Self::Date(_) => "Date",
            Self::Float64(_) => "Float64",
            Self::Int(_) => "Int",
            Self::List(_) => "List",
            Self::Null => "Null",
            Self::Text(_) => "Text",
            Self::Timestamp(_) => "Timestamp",
            Self::Uint(_) => "Uint",
        }
    }

    #[must_use]
    pub const fn as_text(&self) -> Option<&str> {
        if let Self::Text(s) = self {
            Some(s.as_str())
        } else {
            None
        }
    }

    #[must_use]
    pub const fn as_list(&self) -> Option<&[Self]> {
        if let Self::List(xs) = self {
            Some(xs.as_slice())
        } else {
            None
        }
    }

    #[must_use]
    pub const fn as_composite(&self) -> Option<&CompositeValue> {
        if let Self::Composite(c) = self {
            Some(c)
        } else {
            None
        }
    }

    ///
    /// TEXT FORM
    ///

    /// Inverse of `to_text` for one decoded component: empty is `Null`.
    #[must_use]
    pub fn from_component_text(part: String) -> Self {
        if part.is_empty() {
            Self::Null
        } else {
            Self::Text(part)
        }
    }

    /// Canonical string form of this value as a composite component.
    ///
    /// Nested lists are flattened with the default codec; `Null` is empty.
    #[must_use]
    pub fn to_text(&self) -> String {
        match self {
            Self::Blob(bytes) => encode_hex(bytes),
            Self::Bool(b) => b.to_string(),
            Self::Composite(c) => c.encode(),
            Self::Date(d) => d.to_string(),
            Self::Float64(f) => f.to_string(),
            Self::Int(i) => i.to_string(),
            Self::List(items) => codec::encode(items.iter().map(Self::to_text)),
            Self::Null => String::new(),
            Self::Text(s) => s.clone(),
            Self::Timestamp(t) => t.to_string(),
            Self::Uint(u) => u.to_string(),
        }
    }
}

macro_rules! impl_from_for {
    ( $( $type:ty => $variant:ident ),* $(,)? ) => {
        $(
            impl From<$type> for Value {
                fn from(v: $type) -> Self {
                    Self::$variant(v.into())
                }
            }
        )*
    };
}

impl_from_for! {
    bool => Bool,
    CompositeValue => Composite,
    Date => Date,
    f64 => Float64,
    i32 => Int,
    i64 => Int,
    String => Text,
    &str => Text,
    Timestamp => Timestamp,
    u32 => Uint,
    u64 => Uint,
    Vec<u8> => Blob,
}

impl From<Vec<Self>> for Value {
    fn from(vec: Vec<Self>) -> Self {
        Self::List(vec)
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

// Tuples are the natural literal for a composite write or `exact` lookup.
macro_rules! impl_from_tuple {
    ( $( ( $( $name:ident : $var:ident ),+ ) ),* $(,)? ) => {
        $(
            impl<$( $name: Into<Value> ),+> From<( $( $name, )+ )> for Value {
                fn from(( $( $var, )+ ): ( $( $name, )+ )) -> Self {
                    Self::List(vec![ $( $var.into() ),+ ])
                }
            }
        )*
    };
}

impl_from_tuple! {
    (A: a, B: b),
    (A: a, B: b, C: c),
    (A: a, B: b, C: c, D: d),
}

/// Lowercase hex form used for blob components.
pub(crate) fn encode_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }

    out
}

/// Inverse of [`encode_hex`]; `None` on odd length or non-hex digits.
pub(crate) fn decode_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }

    (0..s.len())
        .step_by(2)
        .map(|i| s.get(i..i + 2).and_then(|pair| u8::from_str_radix(pair, 16).ok()))
        .collect()
}
