pub mod class;
mod error;
pub mod field;
pub mod fields;
pub mod handler;
pub mod pseudo_enum;
mod reflect;
pub mod resolver;
pub mod tag;
pub mod value;

pub use class::{Class, ClassKind, Gc, Handle};
pub use error::{Error, Result};
pub use field::Field;
pub use fields::{FieldContext, FieldInfo, FieldValue, Fields};
pub use handler::{FieldHandler, MissingField, Repair, Serializer};
pub use pseudo_enum::{Constant, PseudoEnum, PseudoEnumBuilder, PseudoEnumFamily};
pub use reflect::{Assign, Enumeration, Reflect, Serializable};
pub use resolver::{ClassResolver, SimpleClassResolver};
pub use tag::Tag;
pub use value::{Array, ArrayRef, EnumValue, Primitive, Type, Value};
