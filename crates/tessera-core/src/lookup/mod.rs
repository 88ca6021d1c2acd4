//! Lookup vocabulary shared by atomic and composite fields.
//!
//! The query layer names comparisons (`"exact"`, `"in"`, `"lt"`, ...);
//! fields turn a lookup plus a value into prepared values, backend
//! scalars, or a per-column predicate tree. No SQL is produced here.

use crate::value::{BackendValue, Value};
use std::{fmt, str::FromStr};
use thiserror::Error as ThisError;

///
/// UnknownLookup
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
#[error("unknown lookup '{0}'")]
pub struct UnknownLookup(pub String);

///
/// LookupKind
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum LookupKind {
    Contains,
    EndsWith,
    Exact,
    Gt,
    Gte,
    IExact,
    In,
    IsNull,
    Lt,
    Lte,
    Range,
    StartsWith,
}

impl LookupKind {
    pub const ALL: [Self; 12] = [
        Self::Contains,
        Self::EndsWith,
        Self::Exact,
        Self::Gt,
        Self::Gte,
        Self::IExact,
        Self::In,
        Self::IsNull,
        Self::Lt,
        Self::Lte,
        Self::Range,
        Self::StartsWith,
    ];

    /// Query-layer name of this lookup.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Contains => "contains",
            Self::EndsWith => "endswith",
            Self::Exact => "exact",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::IExact => "iexact",
            Self::In => "in",
            Self::IsNull => "isnull",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Range => "range",
            Self::StartsWith => "startswith",
        }
    }

    /// Lookups whose value is a sequence of candidates rather than one value.
    #[must_use]
    pub const fn takes_sequence(self) -> bool {
        matches!(self, Self::In | Self::Range)
    }
}

impl fmt::Display for LookupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LookupKind {
    type Err = UnknownLookup;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownLookup(s.to_string()))
    }
}

///
/// PreparedLookup
///
/// Field-level prepared values for a composite comparison.
/// `In` keeps one prepared group per candidate; nothing is flattened yet.
///

#[derive(Clone, Debug, PartialEq)]
pub enum PreparedLookup {
    Exact(Vec<Value>),
    In(Vec<Vec<Value>>),
}

impl PreparedLookup {
    /// Number of candidate groups (`1` for `Exact`).
    #[must_use]
    pub const fn group_count(&self) -> usize {
        match self {
            Self::Exact(_) => 1,
            Self::In(groups) => groups.len(),
        }
    }
}

///
/// ColumnPredicate
///
/// Per-column predicate tree over the flat physical column list.
///

#[derive(Clone, Debug, PartialEq)]
pub enum ColumnPredicate {
    And(Vec<Self>),
    Eq { column: String, value: BackendValue },
    /// Matches nothing (empty membership list).
    Never,
    Or(Vec<Self>),
}

impl ColumnPredicate {
    /// Bound parameters in positional order.
    #[must_use]
    pub fn parameters(&self) -> Vec<&BackendValue> {
        let mut out = Vec::new();
        self.collect_parameters(&mut out);

        out
    }

    fn collect_parameters<'a>(&'a self, out: &mut Vec<&'a BackendValue>) {
        match self {
            Self::And(children) | Self::Or(children) => {
                for child in children {
                    child.collect_parameters(out);
                }
            }
            Self::Eq { value, .. } => out.push(value),
            Self::Never => {}
        }
    }

    /// Referenced column names in positional order (repeats kept).
    #[must_use]
    pub fn columns(&self) -> Vec<&str> {
        match self {
            Self::And(children) | Self::Or(children) => {
                children.iter().flat_map(Self::columns).collect()
            }
            Self::Eq { column, .. } => vec![column.as_str()],
            Self::Never => Vec::new(),
        }
    }
}
