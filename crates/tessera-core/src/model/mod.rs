//! Runtime entity model.
//!
//! Entities are declared through an `EntityBuilder`, which collects atomic
//! fields, virtual fields, constraints and pending finalizers. `finish`
//! seals the declaration, runs finalizers in declaration order, and yields
//! an immutable `EntityModel` owned by the `EntityRegistry`.
//!
//! In general:
//! - `field` defines what a single column is
//! - `entity` defines what an owner type holds
//! - `registry` owns models and hands out non-owning `EntityId`s

pub mod entity;
pub mod field;
pub mod registry;

use crate::error::ErrorClass;
use thiserror::Error as ThisError;

///
/// ModelError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum ModelError {
    #[error("entity '{entity}' already declares a field named '{field}'")]
    DuplicateField { entity: String, field: String },

    #[error("entity '{entity}' already has primary key '{existing}', cannot use '{field}'")]
    DuplicatePrimaryKey {
        entity: String,
        existing: String,
        field: String,
    },

    #[error("entity '{entity}' is already defined")]
    EntityAlreadyDefined { entity: String },

    #[error("entity '{entity}' not found")]
    EntityNotFound { entity: String },

    #[error("entity '{entity}' is sealed; declarations are closed")]
    Sealed { entity: String },
}

impl ModelError {
    pub(crate) const fn class(&self) -> ErrorClass {
        match self {
            Self::DuplicateField { .. }
            | Self::DuplicatePrimaryKey { .. }
            | Self::EntityAlreadyDefined { .. } => ErrorClass::Conflict,
            Self::EntityNotFound { .. } => ErrorClass::NotFound,
            Self::Sealed { .. } => ErrorClass::InvariantViolation,
        }
    }
}
