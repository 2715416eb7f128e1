use crate::class::{Class, Handle};
use crate::fields::{FieldContext, FieldInfo, Fields};
use crate::resolver::ClassResolver;
use crate::{Error, Result, Serializable};
use std::sync::Arc;

/// A field present on only one side of a read.
#[derive(Clone, Copy, Debug)]
pub enum MissingField<'a> {
    /// The stream carried a field the live type does not declare.
    Unknown(&'a FieldContext),
    /// The live type declares a field the stream did not carry.
    Absent(&'a FieldInfo),
}

impl MissingField<'_> {
    pub fn name(&self) -> &str {
        match self {
            MissingField::Unknown(entry) => &entry.name,
            MissingField::Absent(info) => info.name,
        }
    }
}

/// Global repair strategy for evolved fields. Returning `Ok(false)` declines.
pub trait FieldHandler: Send + Sync {
    fn missing_field(&self, object: &mut dyn Serializable, field: &MissingField) -> Result<bool>;

    fn incompatible_field_type(
        &self,
        object: &mut dyn Serializable,
        field: &FieldInfo,
        entry: &FieldContext,
    ) -> Result<bool>;
}

/// Takes over the wire shape of the classes it identifies.
pub trait Serializer: ClassResolver {
    fn serialize(&self, object: &dyn Serializable) -> Result<Fields>;

    /// `false` if instances can only be built from their fields via [`Serializer::deserialize_new`].
    /// Such objects cannot be referenced from inside their own fields.
    fn can_be_instantiated(&self, _class: &Class) -> bool {
        true
    }

    fn new_instance(&self, class: &Class) -> Option<Handle> {
        class.instantiate()
    }

    fn deserialize(&self, object: &mut dyn Serializable, _fields: Fields) -> Result<()> {
        Err(Error::NotSerializable(format!(
            "serializer cannot fill {}",
            object.class().name()
        )))
    }

    fn deserialize_new(&self, class: &Class, _fields: Fields) -> Result<Handle> {
        Err(Error::NotSerializable(format!(
            "serializer cannot build {}",
            class.name()
        )))
    }
}

/// Repair chain for one read: the object's own hooks, then the handlers in order.
#[derive(Clone, Copy)]
pub struct Repair<'a> {
    handlers: &'a [Arc<dyn FieldHandler>],
}

impl<'a> Repair<'a> {
    pub fn new(handlers: &'a [Arc<dyn FieldHandler>]) -> Self {
        Repair { handlers }
    }

    /// Only the object's own hooks.
    pub fn none() -> Repair<'static> {
        Repair { handlers: &[] }
    }

    pub fn missing_field(&self, object: &mut dyn Serializable, field: &MissingField) -> Result<()> {
        if object.missing_field(field)? {
            return Ok(());
        }
        for handler in self.handlers {
            if handler.missing_field(object, field)? {
                log::warn!(
                    "field '{}' of {} repaired by handler",
                    field.name(),
                    object.class().name()
                );
                return Ok(());
            }
        }
        Err(Error::StreamCorrupted(match field {
            MissingField::Unknown(entry) => format!(
                "{} has no field '{}'",
                object.class().name(),
                entry.name
            ),
            MissingField::Absent(info) => format!(
                "stream carries no value for field '{}' of {}",
                info.name,
                object.class().name()
            ),
        }))
    }

    pub fn incompatible_field_type(
        &self,
        object: &mut dyn Serializable,
        field: &FieldInfo,
        entry: &FieldContext,
    ) -> Result<()> {
        if object.incompatible_field_type(field, entry)? {
            return Ok(());
        }
        for handler in self.handlers {
            if handler.incompatible_field_type(object, field, entry)? {
                log::warn!(
                    "field '{}' of {} converted by handler",
                    field.name,
                    object.class().name()
                );
                return Ok(());
            }
        }
        Err(Error::StreamCorrupted(format!(
            "{:?} cannot be stored in field '{}: {:?}' of {}",
            entry.value,
            field.name,
            field.ty,
            object.class().name()
        )))
    }
}
