//! Virtual fields: attributes with no storage column of their own.
//!
//! A virtual field is declared on an entity builder, is never part of the
//! persisted column list or generic serialization, and is reached through
//! the entity's accessor table. Composite fields are the one virtual field
//! that actually encloses real columns.

pub mod composite;

use crate::{
    codec::CodecError,
    error::{ErrorClass, ErrorOrigin, InternalError},
    model::{
        entity::{Accessor, EntityBuilder},
        field::{FieldRef, FieldValueError, StorageDescriptor},
        registry::EntityId,
    },
    obs::sink::{self, MetricsEvent},
    record::Record,
    value::Value,
};
use std::{fmt::Debug, sync::Arc, sync::OnceLock};
use thiserror::Error as ThisError;

///
/// FieldError
///
/// Failure of a single field operation. Every failure is scoped to the
/// operation that raised it; nothing is retried or partially applied.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum FieldError {
    #[error("{field} can only be retrieved via an instance")]
    UnboundAccess { field: String },

    #[error("field '{field}' expects {expected} components, got {found}")]
    ArityMismatch {
        field: String,
        expected: usize,
        found: usize,
    },

    #[error("field '{field}' does not support lookup '{lookup}'")]
    UnsupportedLookup { field: String, lookup: String },

    #[error("field '{field}' cannot decode its string form: {source}")]
    Decode {
        field: String,
        #[source]
        source: CodecError,
    },

    #[error("field '{field}' component '{component}' rejected its value: {source}")]
    InvalidComponentValue {
        field: String,
        component: String,
        #[source]
        source: FieldValueError,
    },

    #[error("field '{field}' rejected its value: {source}")]
    InvalidValue {
        field: String,
        #[source]
        source: FieldValueError,
    },

    #[error("field '{field}' lookup '{lookup}' expects a sequence of candidates")]
    ExpectedSequence { field: String, lookup: String },

    #[error("field '{field}' is not bound to its owner yet")]
    NotBound { field: String },

    #[error("field '{field}' is already bound")]
    AlreadyBound { field: String },

    #[error("field is already declared as '{field}'")]
    AlreadyDeclared { field: String },

    #[error("composite field '{field}' has no components")]
    EmptyComposite { field: String },

    #[error("composite field '{field}' component '{component}' is not declared on the owner")]
    ComponentNotDeclared { field: String, component: String },

    #[error("'{entity}' has no field '{field}'")]
    UnknownField { entity: String, field: String },

    #[error("field '{field}' produced {values} storage values for {columns} columns")]
    StorageShapeMismatch {
        field: String,
        columns: usize,
        values: usize,
    },
}

impl FieldError {
    pub(crate) const fn class(&self) -> ErrorClass {
        match self {
            Self::UnboundAccess { .. }
            | Self::ArityMismatch { .. }
            | Self::Decode { .. }
            | Self::InvalidComponentValue { .. }
            | Self::InvalidValue { .. }
            | Self::ExpectedSequence { .. }
            | Self::EmptyComposite { .. } => ErrorClass::Invalid,
            Self::UnsupportedLookup { .. } => ErrorClass::Unsupported,
            Self::NotBound { .. }
            | Self::AlreadyBound { .. }
            | Self::StorageShapeMismatch { .. } => ErrorClass::InvariantViolation,
            Self::AlreadyDeclared { .. } => ErrorClass::Conflict,
            Self::ComponentNotDeclared { .. } | Self::UnknownField { .. } => ErrorClass::NotFound,
        }
    }

    pub(crate) const fn origin(&self) -> ErrorOrigin {
        match self {
            Self::UnboundAccess { .. } | Self::UnknownField { .. } => ErrorOrigin::Record,
            Self::UnsupportedLookup { .. }
            | Self::ExpectedSequence { .. }
            | Self::StorageShapeMismatch { .. } => ErrorOrigin::Lookup,
            Self::Decode { .. } => ErrorOrigin::Codec,
            Self::ComponentNotDeclared { .. } => ErrorOrigin::Model,
            Self::ArityMismatch { .. }
            | Self::InvalidComponentValue { .. }
            | Self::InvalidValue { .. }
            | Self::NotBound { .. }
            | Self::AlreadyBound { .. }
            | Self::AlreadyDeclared { .. }
            | Self::EmptyComposite { .. } => ErrorOrigin::Field,
        }
    }
}

///
/// VirtualFieldState
///
/// Declaration-time attachment of a virtual field to its owner.
/// Set once by `declare_virtual`; the owner is held as an `EntityId`, so
/// the field never keeps its entity alive.
///

#[derive(Debug, Default)]
pub struct VirtualFieldState {
    attachment: OnceLock<Attachment>,
}

#[derive(Debug)]
struct Attachment {
    name: String,
    owner: EntityId,
    owner_path: String,
}

impl VirtualFieldState {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            attachment: OnceLock::new(),
        }
    }

    fn attach(&self, name: &str, owner: EntityId, owner_path: &str) -> Result<(), FieldError> {
        self.attachment
            .set(Attachment {
                name: name.to_string(),
                owner,
                owner_path: owner_path.to_string(),
            })
            .map_err(|_| FieldError::AlreadyDeclared {
                field: self.name().unwrap_or(name).to_string(),
            })
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.attachment.get().map(|a| a.name.as_str())
    }

    #[must_use]
    pub fn owner(&self) -> Option<EntityId> {
        self.attachment.get().map(|a| a.owner)
    }

    #[must_use]
    pub fn owner_path(&self) -> Option<&str> {
        self.attachment.get().map(|a| a.owner_path.as_str())
    }

    #[must_use]
    pub fn is_declared(&self) -> bool {
        self.attachment.get().is_some()
    }
}

///
/// VirtualField
///
/// Field-like attribute without a storage column. Defaults make every
/// virtual field safe to read and write from generic record code.
///

pub trait VirtualField: Debug + Send + Sync + 'static {
    fn state(&self) -> &VirtualFieldState;

    fn name(&self) -> Option<&str> {
        self.state().name()
    }

    fn owner(&self) -> Option<EntityId> {
        self.state().owner()
    }

    /// Attach to `builder` under `name`.
    fn declare_on(
        self: Arc<Self>,
        builder: &mut EntityBuilder,
        name: &str,
    ) -> Result<(), InternalError>
    where
        Self: Sized,
    {
        declare_virtual(self, builder, name).map(|_| ())
    }

    fn storage_descriptor(&self) -> Option<StorageDescriptor> {
        None
    }

    /// Real columns enclosed by this field, if any.
    fn enclosed_fields(&self) -> Option<&[FieldRef]> {
        None
    }

    /// Read through an instance, or off the type when `record` is `None`.
    fn read(&self, record: Option<&Record>) -> Result<Value, FieldError> {
        let _ = record;

        Ok(Value::Null)
    }

    fn write(&self, record: &mut Record, value: &Value) -> Result<(), FieldError> {
        let _ = (record, value);

        Ok(())
    }
}

/// Base declaration shared by every virtual field: register with the
/// builder as non-persisted, attach name and owner, and install the accessor.
///
/// The field is only attached once the builder has accepted it.
pub fn declare_virtual<F: VirtualField>(
    field: Arc<F>,
    builder: &mut EntityBuilder,
    name: &str,
) -> Result<Arc<dyn VirtualField>, InternalError> {
    let state = field.state();
    if state.is_declared() {
        return Err(FieldError::AlreadyDeclared {
            field: state.name().unwrap_or(name).to_string(),
        }
        .into());
    }

    let field: Arc<dyn VirtualField> = field;
    builder.register_virtual_field(name, Arc::clone(&field))?;
    field.state().attach(name, builder.id(), builder.path())?;
    builder.install_accessor(name, Accessor::Virtual(Arc::clone(&field)));

    sink::record(MetricsEvent::FieldDeclared {
        entity_path: builder.path(),
    });

    Ok(field)
}
