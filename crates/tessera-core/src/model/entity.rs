use crate::{
    codec::CompositeCodec,
    error::InternalError,
    field::{FieldError, VirtualField},
    model::{
        ModelError,
        field::{AtomicField, ColumnDescriptor, FieldRef},
        registry::EntityId,
    },
    value::Value,
};
use std::{collections::BTreeMap, fmt, sync::Arc};

///
/// Accessor
///
/// Entry in an entity's accessor table. Record reads and writes by name
/// are dispatched through this, never through the slot map directly.
///

#[derive(Clone, Debug)]
pub enum Accessor {
    Atomic(FieldRef),
    Virtual(Arc<dyn VirtualField>),
}

/// Callback run once the owner's declaration is complete.
pub type Finalizer = Box<dyn FnOnce(&mut EntityModel) -> Result<(), InternalError>>;

///
/// EntityBuilder
///
/// Declaration phase of one entity. Fields can be declared in any order;
/// anything that depends on sibling fields is scheduled as a finalizer and
/// runs in `finish`, after every declaration is known.
///

pub struct EntityBuilder {
    id: EntityId,
    path: String,
    codec: CompositeCodec,
    fields: Vec<FieldRef>,
    virtual_fields: Vec<Arc<dyn VirtualField>>,
    accessors: BTreeMap<String, Accessor>,
    unique_together: Vec<Vec<String>>,
    primary_key: Option<String>,
    finalizers: Vec<Finalizer>,
}

impl EntityBuilder {
    #[must_use]
    pub fn new(id: EntityId, path: impl Into<String>, codec: CompositeCodec) -> Self {
        Self {
            id,
            path: path.into(),
            codec,
            fields: Vec::new(),
            virtual_fields: Vec::new(),
            accessors: BTreeMap::new(),
            unique_together: Vec::new(),
            primary_key: None,
            finalizers: Vec::new(),
        }
    }

    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.id
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Codec inherited by composite fields that do not set their own.
    #[must_use]
    pub const fn codec(&self) -> CompositeCodec {
        self.codec
    }

    #[must_use]
    pub fn fields(&self) -> &[FieldRef] {
        &self.fields
    }

    fn ensure_unique_name(&self, name: &str) -> Result<(), ModelError> {
        if self.accessors.contains_key(name) {
            return Err(ModelError::DuplicateField {
                entity: self.path.clone(),
                field: name.to_string(),
            });
        }

        Ok(())
    }

    ///
    /// DECLARATION
    ///

    /// Declare an atomic field and return the shared handle composites use
    /// to reference it.
    pub fn add_field<F>(&mut self, field: F) -> Result<FieldRef, InternalError>
    where
        F: AtomicField + 'static,
    {
        let field: FieldRef = Arc::new(field);
        self.register_field(Arc::clone(&field))?;

        Ok(field)
    }

    pub fn register_field(&mut self, field: FieldRef) -> Result<(), InternalError> {
        self.ensure_unique_name(field.name())?;

        if field.is_primary_key() {
            self.set_primary_key(field.name())?;
        }

        self.accessors
            .insert(field.name().to_string(), Accessor::Atomic(Arc::clone(&field)));
        self.fields.push(field);

        Ok(())
    }

    /// Declare a virtual field under `name` and hand it back typed.
    pub fn add_virtual_field<F>(&mut self, name: &str, field: F) -> Result<Arc<F>, InternalError>
    where
        F: VirtualField,
    {
        let field = Arc::new(field);
        Arc::clone(&field).declare_on(self, name)?;

        Ok(field)
    }

    /// Record a virtual field under `name` as non-persisted and non-serialized.
    pub fn register_virtual_field(
        &mut self,
        name: &str,
        field: Arc<dyn VirtualField>,
    ) -> Result<(), InternalError> {
        self.ensure_unique_name(name)?;
        self.virtual_fields.push(field);

        Ok(())
    }

    /// Install (or replace) the accessor for `name`.
    pub fn install_accessor(&mut self, name: &str, accessor: Accessor) {
        self.accessors.insert(name.to_string(), accessor);
    }

    /// Require the given attribute names to be jointly unique.
    pub fn register_unique_together<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.unique_together
            .push(names.into_iter().map(Into::into).collect());
    }

    pub fn set_primary_key(&mut self, name: &str) -> Result<(), InternalError> {
        match &self.primary_key {
            Some(existing) if existing != name => Err(ModelError::DuplicatePrimaryKey {
                entity: self.path.clone(),
                existing: existing.clone(),
                field: name.to_string(),
            }
            .into()),
            _ => {
                self.primary_key = Some(name.to_string());
                Ok(())
            }
        }
    }

    /// Queue `finalizer` to run once every field is declared.
    pub fn schedule_after_finalization<F>(&mut self, finalizer: F)
    where
        F: FnOnce(&mut EntityModel) -> Result<(), InternalError> + 'static,
    {
        self.finalizers.push(Box::new(finalizer));
    }

    ///
    /// FINALIZATION
    ///

    /// Seal the declaration and drain pending finalizers in declaration order.
    pub fn finish(self) -> Result<EntityModel, InternalError> {
        let finalizers = self.finalizers;
        let mut model = EntityModel {
            id: self.id,
            path: self.path,
            codec: self.codec,
            fields: self.fields,
            virtual_fields: self.virtual_fields,
            accessors: self.accessors,
            unique_together: self.unique_together,
            primary_key: self.primary_key,
            finalized: false,
        };

        for finalizer in finalizers {
            finalizer(&mut model)?;
        }
        model.finalized = true;

        Ok(model)
    }
}

impl fmt::Debug for EntityBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityBuilder")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("fields", &self.fields.len())
            .field("virtual_fields", &self.virtual_fields.len())
            .field("pending_finalizers", &self.finalizers.len())
            .finish()
    }
}

///
/// EntityModel
/// Finalized runtime model for one entity.
///

#[derive(Debug)]
pub struct EntityModel {
    id: EntityId,
    path: String,
    codec: CompositeCodec,
    /// Persisted atomic fields, in declaration order.
    fields: Vec<FieldRef>,
    virtual_fields: Vec<Arc<dyn VirtualField>>,
    accessors: BTreeMap<String, Accessor>,
    unique_together: Vec<Vec<String>>,
    primary_key: Option<String>,
    finalized: bool,
}

impl EntityModel {
    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.id
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub const fn codec(&self) -> CompositeCodec {
        self.codec
    }

    #[must_use]
    pub fn fields(&self) -> &[FieldRef] {
        &self.fields
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldRef> {
        self.fields.iter().find(|f| f.name() == name)
    }

    /// Whether `field` (by identity) is one of this entity's atomic fields.
    #[must_use]
    pub fn contains_field(&self, field: &FieldRef) -> bool {
        self.fields.iter().any(|f| Arc::ptr_eq(f, field))
    }

    #[must_use]
    pub fn virtual_fields(&self) -> &[Arc<dyn VirtualField>] {
        &self.virtual_fields
    }

    #[must_use]
    pub fn accessor(&self, name: &str) -> Option<&Accessor> {
        self.accessors.get(name)
    }

    /// Names of every accessor, atomic and virtual.
    pub fn accessor_names(&self) -> impl Iterator<Item = &str> {
        self.accessors.keys().map(String::as_str)
    }

    /// Persisted columns; virtual fields never contribute.
    #[must_use]
    pub fn concrete_columns(&self) -> Vec<ColumnDescriptor> {
        self.fields
            .iter()
            .flat_map(|f| {
                f.storage_descriptor()
                    .columns()
                    .into_iter()
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Fields included in generic serialization.
    pub fn serializable_fields(&self) -> impl Iterator<Item = &FieldRef> {
        self.fields.iter()
    }

    /// Jointly-unique attribute name sets, in registration order.
    #[must_use]
    pub fn unique_together(&self) -> &[Vec<String>] {
        &self.unique_together
    }

    /// Unique constraints expressed as physical column sets.
    ///
    /// Includes a composite primary key through the virtual field's
    /// enclosed columns.
    #[must_use]
    pub fn unique_column_sets(&self) -> Vec<Vec<String>> {
        let mut sets: Vec<Vec<String>> = self
            .unique_together
            .iter()
            .map(|names| {
                names
                    .iter()
                    .map(|attr| {
                        self.fields
                            .iter()
                            .find(|f| f.attribute_name() == attr)
                            .map_or_else(|| attr.clone(), |f| f.column_name().to_string())
                    })
                    .collect()
            })
            .collect();

        let enclosed_pk = self
            .primary_key
            .as_deref()
            .and_then(|pk| self.virtual_fields.iter().find(|v| v.name() == Some(pk)))
            .and_then(|v| v.enclosed_fields());
        if let Some(fields) = enclosed_pk {
            sets.push(fields.iter().map(|f| f.column_name().to_string()).collect());
        }

        sets
    }

    #[must_use]
    pub fn primary_key(&self) -> Option<&str> {
        self.primary_key.as_deref()
    }

    /// Read an attribute off the type itself rather than an instance.
    pub fn class_attribute(&self, name: &str) -> Result<Value, FieldError> {
        match self.accessors.get(name) {
            Some(Accessor::Virtual(field)) => field.read(None),
            Some(Accessor::Atomic(_)) => Err(FieldError::UnboundAccess {
                field: name.to_string(),
            }),
            None => Err(FieldError::UnknownField {
                entity: self.path.clone(),
                field: name.to_string(),
            }),
        }
    }

    /// Replace the accessor for `name`; only finalizers may do this.
    pub fn install_accessor(
        &mut self,
        name: &str,
        accessor: Accessor,
    ) -> Result<(), InternalError> {
        if self.finalized {
            return Err(ModelError::Sealed {
                entity: self.path.clone(),
            }
            .into());
        }
        self.accessors.insert(name.to_string(), accessor);

        Ok(())
    }

    #[must_use]
    pub const fn is_finalized(&self) -> bool {
        self.finalized
    }
}
