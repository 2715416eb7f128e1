use crate::class::{Gc, Handle};
use crate::fields::FieldValue;
use crate::pseudo_enum::{Constant, PseudoEnumFamily};
use crate::tag::Tag;
use crate::value::{ArrayRef, EnumValue, Primitive, Type, Value};
use crate::{Class, Enumeration, Serializable};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::hash::Hash;
use std::rc::Rc;

/// Conversion between a Rust field type and its wire value.
///
/// Sequences, sets and maps all travel as arrays. Maps become an `Object[]` of alternating
/// keys and values.
pub trait Field: Sized {
    /// Declared type of a field holding `Self`.
    fn field_type() -> Type;

    fn to_value(&self) -> Value;

    /// Hands the value back when it does not fit.
    fn from_value(value: Value) -> Result<Self, Value>;

    fn to_field_value(&self) -> FieldValue {
        FieldValue::Object(self.to_value())
    }

    fn from_field_value(value: FieldValue) -> Result<Self, FieldValue> {
        match value {
            FieldValue::Object(v) => Self::from_value(v).map_err(FieldValue::Object),
            other => Err(other),
        }
    }
}

macro_rules! primitive_field {
    ($ty:ty, $variant:ident, $tag:ident) => {
        impl Field for $ty {
            fn field_type() -> Type {
                Type::Primitive(Tag::$tag)
            }

            fn to_value(&self) -> Value {
                Value::Boxed(Primitive::$variant(*self))
            }

            fn from_value(value: Value) -> Result<Self, Value> {
                match value {
                    Value::Boxed(Primitive::$variant(v)) => Ok(v),
                    other => Err(other),
                }
            }

            fn to_field_value(&self) -> FieldValue {
                FieldValue::Primitive(Primitive::$variant(*self))
            }

            fn from_field_value(value: FieldValue) -> Result<Self, FieldValue> {
                match value {
                    FieldValue::Primitive(Primitive::$variant(v)) => Ok(v),
                    other => Err(other),
                }
            }
        }

        impl From<$ty> for Primitive {
            fn from(value: $ty) -> Self {
                Primitive::$variant(value)
            }
        }
    };
}

primitive_field!(i8, Byte, Byte);
primitive_field!(i16, Short, Short);
primitive_field!(i32, Int, Int);
primitive_field!(i64, Long, Long);
primitive_field!(f32, Float, Float);
primitive_field!(f64, Double, Double);
primitive_field!(char, Char, Char);
primitive_field!(bool, Boolean, Boolean);

impl<T: Field> Field for Option<T> {
    fn field_type() -> Type {
        match T::field_type() {
            Type::Primitive(tag) => Type::Wrapper(tag.wrapper()),
            other => other,
        }
    }

    fn to_value(&self) -> Value {
        match self {
            Some(v) => v.to_value(),
            None => Value::Null,
        }
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl Field for String {
    fn field_type() -> Type {
        Type::String
    }

    fn to_value(&self) -> Value {
        Value::String(Rc::from(self.as_str()))
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::String(s) => Ok(s.to_string()),
            other => Err(other),
        }
    }
}

/// Shared string. Every holder of the same `Rc` refers to one node on the wire.
impl Field for Rc<str> {
    fn field_type() -> Type {
        Type::String
    }

    fn to_value(&self) -> Value {
        Value::String(self.clone())
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::String(s) => Ok(s),
            other => Err(other),
        }
    }
}

impl Field for Value {
    fn field_type() -> Type {
        Type::Object
    }

    fn to_value(&self) -> Value {
        self.clone()
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        Ok(value)
    }
}

/// Class literal.
impl Field for Type {
    fn field_type() -> Type {
        Type::Class
    }

    fn to_value(&self) -> Value {
        Value::Class(self.clone())
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::Class(ty) => Ok(ty),
            other => Err(other),
        }
    }
}

impl Field for Handle {
    fn field_type() -> Type {
        Type::Object
    }

    fn to_value(&self) -> Value {
        Value::Object(self.clone())
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::Object(handle) => Ok(handle),
            other => Err(other),
        }
    }
}

/// Array of any component type.
impl Field for ArrayRef {
    fn field_type() -> Type {
        Type::Object
    }

    fn to_value(&self) -> Value {
        Value::Array(self.clone())
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::Array(array) => Ok(array),
            other => Err(other),
        }
    }
}

impl<T: Serializable> Field for Gc<T> {
    fn field_type() -> Type {
        Type::Named(T::type_class())
    }

    fn to_value(&self) -> Value {
        Value::Object(Handle::from_gc(self.clone()))
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::Object(handle) => match handle.downcast::<T>() {
                Some(gc) => Ok(gc),
                None => Err(Value::Object(handle)),
            },
            other => Err(other),
        }
    }
}

impl<T: PseudoEnumFamily> Field for Constant<T> {
    fn field_type() -> Type {
        Type::Named(Class::pseudo_enum::<T>())
    }

    fn to_value(&self) -> Value {
        Value::Enum(EnumValue::new(
            Class::pseudo_enum::<T>(),
            self.name().to_string(),
        ))
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::Enum(e) if e.class == Class::pseudo_enum::<T>() => {
                match T::registry().value_of(&e.name) {
                    Some(constant) => Ok(constant.clone()),
                    None => Err(Value::Enum(e)),
                }
            }
            other => Err(other),
        }
    }
}

/// `from_value` for a derived enumeration.
pub fn enum_from_value<T: Enumeration>(value: Value) -> Result<T, Value> {
    match value {
        Value::Enum(e) => match e.to::<T>() {
            Some(constant) => Ok(constant),
            None => Err(Value::Enum(e)),
        },
        other => Err(other),
    }
}

/// `from_value` for a type stored by value inside its owner.
pub fn object_from_value<T: Serializable + Clone>(value: Value) -> Result<T, Value> {
    let Value::Object(handle) = value else {
        return Err(value);
    };
    let Some(gc) = handle.downcast::<T>() else {
        return Err(Value::Object(handle));
    };
    let cloned = gc.try_borrow().map(|v| T::clone(&v));
    cloned.map_err(|_| Value::Object(handle))
}

fn to_array<'a, T: Field + 'a>(items: impl Iterator<Item = &'a T>) -> Value {
    let elements = items.map(T::to_value).collect();
    Value::Array(ArrayRef::new_unchecked(T::field_type(), elements))
}

/// Elements of an array whose component is exactly `component`.
fn elements_of(value: &Value, component: &Type) -> Option<Vec<Value>> {
    match value {
        Value::Array(array) => {
            let array = array.read().ok()?;
            if array.component() == component {
                Some(array.elements().to_vec())
            } else {
                None
            }
        }
        _ => None,
    }
}

fn collect_array<T: Field, C: FromIterator<T>>(value: Value) -> Result<C, Value> {
    let Some(elements) = elements_of(&value, &T::field_type()) else {
        return Err(value);
    };
    elements
        .into_iter()
        .map(T::from_value)
        .collect::<Result<C, Value>>()
        .map_err(|_| value)
}

fn to_key_values<'a, K: Field + 'a, V: Field + 'a>(
    entries: impl Iterator<Item = (&'a K, &'a V)>,
) -> Value {
    let mut elements = Vec::new();
    for (k, v) in entries {
        elements.push(k.to_value());
        elements.push(v.to_value());
    }
    Value::Array(ArrayRef::new_unchecked(Type::Object, elements))
}

fn collect_key_values<K: Field, V: Field, C: FromIterator<(K, V)>>(
    value: Value,
) -> Result<C, Value> {
    let Some(elements) = elements_of(&value, &Type::Object) else {
        return Err(value);
    };
    if elements.len() % 2 != 0 {
        return Err(value);
    }
    let mut pairs = Vec::with_capacity(elements.len() / 2);
    let mut iter = elements.into_iter();
    while let (Some(k), Some(v)) = (iter.next(), iter.next()) {
        match (K::from_value(k), V::from_value(v)) {
            (Ok(k), Ok(v)) => pairs.push((k, v)),
            _ => return Err(value),
        }
    }
    Ok(pairs.into_iter().collect())
}

impl<T: Field> Field for Vec<T> {
    fn field_type() -> Type {
        Type::array_of(T::field_type())
    }

    fn to_value(&self) -> Value {
        to_array(self.iter())
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        collect_array(value)
    }
}

/// Hashed collections are written in key order so that equal sets give equal streams.
impl<T: Field + Ord + Hash> Field for HashSet<T> {
    fn field_type() -> Type {
        Type::array_of(T::field_type())
    }

    fn to_value(&self) -> Value {
        let mut items: Vec<&T> = self.iter().collect();
        items.sort_unstable();
        to_array(items.into_iter())
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        collect_array(value)
    }
}

impl<T: Field + Ord> Field for BTreeSet<T> {
    fn field_type() -> Type {
        Type::array_of(T::field_type())
    }

    fn to_value(&self) -> Value {
        to_array(self.iter())
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        collect_array(value)
    }
}

impl<K: Field + Ord + Hash, V: Field> Field for HashMap<K, V> {
    fn field_type() -> Type {
        Type::array_of(Type::Object)
    }

    fn to_value(&self) -> Value {
        let mut entries: Vec<(&K, &V)> = self.iter().collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
        to_key_values(entries.into_iter())
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        collect_key_values(value)
    }
}

impl<K: Field + Ord, V: Field> Field for BTreeMap<K, V> {
    fn field_type() -> Type {
        Type::array_of(Type::Object)
    }

    fn to_value(&self) -> Value {
        to_key_values(self.iter())
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        collect_key_values(value)
    }
}
