use crate::{
    codec::CompositeCodec,
    error::InternalError,
    model::{
        ModelError,
        entity::{EntityBuilder, EntityModel},
    },
    record::Record,
};
use derive_more::Display;
use std::{collections::BTreeMap, sync::Arc};
use tessera_config::TesseraConfig;

///
/// EntityId
///
/// Non-owning handle into an `EntityRegistry`. Fields hold this instead of
/// a reference to their owner.
///

#[derive(Clone, Copy, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[display("entity#{_0}")]
pub struct EntityId(u32);

impl EntityId {
    #[must_use]
    pub const fn from_index(index: u32) -> Self {
        Self(index)
    }

    #[must_use]
    pub const fn index(self) -> u32 {
        self.0
    }
}

///
/// EntityRegistry
///
/// Owns every finalized entity model. Entities are defined once and never
/// change afterwards.
///

#[derive(Debug, Default)]
pub struct EntityRegistry {
    codec: CompositeCodec,
    entities: Vec<Arc<EntityModel>>,
    by_path: BTreeMap<String, EntityId>,
}

impl EntityRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry whose entities inherit the configured codec.
    pub fn with_config(config: &TesseraConfig) -> Result<Self, InternalError> {
        let codec = CompositeCodec::from_config(&config.codec)?;

        Ok(Self {
            codec,
            ..Self::default()
        })
    }

    #[must_use]
    pub const fn codec(&self) -> CompositeCodec {
        self.codec
    }

    /// Declare an entity through `declare` and finalize it.
    ///
    /// Nothing is registered if declaration or any finalizer fails.
    pub fn define<F>(&mut self, path: &str, declare: F) -> Result<EntityId, InternalError>
    where
        F: FnOnce(&mut EntityBuilder) -> Result<(), InternalError>,
    {
        if self.by_path.contains_key(path) {
            return Err(ModelError::EntityAlreadyDefined {
                entity: path.to_string(),
            }
            .into());
        }

        let index = u32::try_from(self.entities.len())
            .map_err(|_| InternalError::model_invariant("entity registry is full"))?;
        let id = EntityId(index);

        let mut builder = EntityBuilder::new(id, path, self.codec);
        declare(&mut builder)?;
        let model = builder.finish()?;

        self.entities.push(Arc::new(model));
        self.by_path.insert(path.to_string(), id);

        Ok(id)
    }

    pub fn get(&self, id: EntityId) -> Result<&Arc<EntityModel>, InternalError> {
        self.entities.get(id.0 as usize).ok_or_else(|| {
            ModelError::EntityNotFound {
                entity: id.to_string(),
            }
            .into()
        })
    }

    #[must_use]
    pub fn by_path(&self, path: &str) -> Option<&Arc<EntityModel>> {
        self.by_path
            .get(path)
            .and_then(|id| self.entities.get(id.0 as usize))
    }

    /// Fresh, empty instance of the entity.
    pub fn record(&self, id: EntityId) -> Result<Record, InternalError> {
        self.get(id).map(|model| Record::new(Arc::clone(model)))
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.entities.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<EntityModel>> {
        self.entities.iter()
    }
}
