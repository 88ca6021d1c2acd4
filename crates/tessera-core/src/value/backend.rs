use candid::CandidType;
use derive_more::Display;
use serde::{Deserialize, Serialize};

///
/// BackendType
///
/// Primitive column type a flat relational backend allocates.
///

#[derive(CandidType, Clone, Copy, Debug, Deserialize, Display, Eq, Hash, PartialEq, Serialize)]
pub enum BackendType {
    Blob,
    Integer,
    Real,
    Text,
}

///
/// BackendValue
///
/// Backend-ready scalar bound positionally as a query parameter.
///

#[derive(CandidType, Clone, Debug, Deserialize, PartialEq, Serialize)]
pub enum BackendValue {
    Blob(Vec<u8>),
    Integer(i64),
    Null,
    Real(f64),
    Text(String),
}

impl BackendValue {
    /// Column type this scalar binds to; `None` for `Null`.
    #[must_use]
    pub const fn backend_type(&self) -> Option<BackendType> {
        match self {
            Self::Blob(_) => Some(BackendType::Blob),
            Self::Integer(_) => Some(BackendType::Integer),
            Self::Null => None,
            Self::Real(_) => Some(BackendType::Real),
            Self::Text(_) => Some(BackendType::Text),
        }
    }

    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<&str> for BackendValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<i64> for BackendValue {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}
