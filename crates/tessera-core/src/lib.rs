//! Core runtime for Tessera: composite fields over atomic columns, the
//! entity model they are declared on, values, the string codec, lookup
//! translation, and observability.
#![warn(unreachable_pub)]

// public exports are one module level down
pub mod codec;
pub mod error;
pub mod field;
pub mod lookup;
pub mod model;
pub mod obs;
pub mod record;
pub mod types;
pub mod value;

// test
#[cfg(test)]
pub(crate) mod test_fixtures;

///
/// CONSTANTS
///

pub use tessera_config::{DEFAULT_ESCAPE, DEFAULT_SEPARATOR};

///
/// Prelude
///
/// Prelude contains only domain vocabulary.
/// No errors, sinks, or codec internals are re-exported here.
///

pub mod prelude {
    pub use crate::{
        field::{
            VirtualField as _,
            composite::{CompositeField, CompositeValue},
        },
        lookup::LookupKind,
        model::{
            entity::{EntityBuilder, EntityModel},
            field::{AtomicField as _, FieldKind, FieldRef, ScalarField},
            registry::{EntityId, EntityRegistry},
        },
        record::Record,
        value::Value,
    };
}
