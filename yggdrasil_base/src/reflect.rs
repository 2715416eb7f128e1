use crate::class::Class;
use crate::fields::{FieldContext, FieldInfo, FieldValue, Fields};
use crate::handler::{MissingField, Repair};
use crate::Result;
use std::any::Any;

/// Outcome of assigning a wire value to a live field.
#[derive(Debug)]
pub enum Assign {
    Done,
    /// The field exists but cannot hold the value. The value is handed back for repair.
    Incompatible(FieldValue),
    /// No live field has that name.
    Unknown(FieldValue),
}

/// Field layout of a type, normally generated by `#[derive(Yggdrasil)]`.
///
/// Fields of an embedded base (`#[yggdrasil(base)]`) come first, matching the
/// superclass-to-subclass order of the wire format.
pub trait Reflect: Any {
    fn type_class() -> Class
    where
        Self: Sized;

    fn declared_fields(out: &mut Vec<FieldInfo>)
    where
        Self: Sized;

    fn class(&self) -> Class;

    /// Current values of all non-transient fields, in declaration order.
    fn snapshot(&self, out: &mut Vec<FieldContext>);

    fn assign(&mut self, name: &str, value: FieldValue) -> Assign;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn as_serializable_mut(&mut self) -> &mut dyn Serializable;
}

/// A type the engine can write as an object node.
///
/// Every hook has a reflective default. Types marked `#[yggdrasil(extended)]` implement this
/// trait themselves to take over their wire shape or to repair evolved data.
pub trait Serializable: Reflect {
    fn serialize(&self) -> Result<Fields> {
        Fields::from_object(self)
    }

    fn deserialize(&mut self, fields: Fields, repair: &Repair) -> Result<()> {
        fields.apply_to(self, repair)
    }

    /// Returns `true` if the field was handled.
    fn missing_field(&mut self, _field: &MissingField) -> Result<bool> {
        Ok(false)
    }

    /// Returns `true` if the value was stored in some form.
    fn incompatible_field_type(&mut self, _field: &FieldInfo, _entry: &FieldContext) -> Result<bool> {
        Ok(false)
    }
}

/// Closed set of named constants, written as `T_ENUM` nodes.
pub trait Enumeration: Sized + 'static {
    fn name(&self) -> &'static str;

    /// Accepts current names and aliases.
    fn from_name(name: &str) -> Option<Self>;

    fn values() -> &'static [Self];
}
