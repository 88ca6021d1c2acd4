//! ## Crate layout
//! - `config`: TOML configuration for the composite codec.
//! - `core`: entity model, atomic and composite fields, values, codec,
//!   lookup translation, and observability.
//! - `error`: public error type with a stable kind + origin taxonomy.
//!
//! The `prelude` module carries the vocabulary needed to declare entities
//! and work with records.

pub use tessera_config as config;
pub use tessera_core as core;

pub mod error;

use crate::core::model::registry::EntityRegistry;
use std::path::Path;

//
// Consts
//

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use error::Error;

/// Registry configured from `tessera.toml` in `dir` (defaults if absent).
pub fn load_registry(dir: impl AsRef<Path>) -> Result<EntityRegistry, Error> {
    let config = config::TesseraConfig::load_dir(dir)?;

    EntityRegistry::with_config(&config).map_err(Error::from)
}

///
/// Prelude
/// using _ brings traits into scope and avoids name conflicts
///

pub mod prelude {
    pub use crate::{
        Error,
        core::{
            codec::CompositeCodec,
            lookup::{ColumnPredicate, PreparedLookup},
            prelude::*,
            value::BackendValue,
        },
    };
    pub use candid::CandidType;
    pub use serde::{Deserialize, Serialize};
}
