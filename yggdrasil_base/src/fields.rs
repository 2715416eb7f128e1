use crate::class::Class;
use crate::field::Field;
use crate::handler::{MissingField, Repair};
use crate::value::{Primitive, Type, Value};
use crate::{Assign, Error, Reflect, Result, Serializable};
use indexmap::map::Entry;
use indexmap::IndexMap;

/// A field slot. The kind is fixed when the slot is written.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Primitive(Primitive),
    Object(Value),
}

impl FieldValue {
    pub fn is_primitive(&self) -> bool {
        matches!(self, FieldValue::Primitive(_))
    }
}

/// Named value as it appears in a stream.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldContext {
    pub name: String,
    pub value: FieldValue,
}

impl FieldContext {
    pub fn new(name: impl Into<String>, value: FieldValue) -> FieldContext {
        FieldContext {
            name: name.into(),
            value,
        }
    }
}

/// Live field as declared on a type.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldInfo {
    pub name: &'static str,
    pub ty: Type,
    /// Absence from the stream keeps the blank value instead of asking for repair.
    pub optional: bool,
}

impl FieldInfo {
    pub fn new(name: &'static str, ty: Type) -> FieldInfo {
        FieldInfo {
            name,
            ty,
            optional: false,
        }
    }

    pub fn optional(mut self) -> FieldInfo {
        self.optional = true;
        self
    }
}

/// Serializable state of one object, independent of its in-memory layout.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Fields {
    entries: IndexMap<String, FieldValue>,
}

impl Fields {
    pub fn new() -> Fields {
        Fields::default()
    }

    /// Blank slots for every field `class` declares.
    pub fn for_class(class: &Class) -> Result<Fields> {
        let mut fields = Fields::new();
        for info in class.fields() {
            let value = match info.ty {
                Type::Primitive(tag) => FieldValue::Primitive(Primitive::zero(tag)),
                _ => FieldValue::Object(Value::Null),
            };
            fields.insert_new(class, info.name.to_string(), value)?;
        }
        Ok(fields)
    }

    /// Snapshot of an object's current field values.
    pub fn from_object<O: Reflect + ?Sized>(object: &O) -> Result<Fields> {
        let class = object.class();
        let mut snapshot = Vec::new();
        object.snapshot(&mut snapshot);
        let mut fields = Fields::new();
        for FieldContext { name, value } in snapshot {
            fields.insert_new(&class, name, value)?;
        }
        Ok(fields)
    }

    fn insert_new(&mut self, class: &Class, name: String, value: FieldValue) -> Result<()> {
        match self.entries.entry(name) {
            Entry::Occupied(o) => Err(Error::DuplicateField {
                class: class.name().to_string(),
                field: o.key().clone(),
            }),
            Entry::Vacant(v) => {
                v.insert(value);
                Ok(())
            }
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: FieldValue) {
        self.entries.insert(name.into(), value);
    }

    pub fn put_primitive(&mut self, name: impl Into<String>, value: Primitive) {
        self.insert(name, FieldValue::Primitive(value));
    }

    pub fn put_object(&mut self, name: impl Into<String>, value: Value) {
        self.insert(name, FieldValue::Object(value));
    }

    pub fn put<T: Field>(&mut self, name: impl Into<String>, value: &T) {
        self.insert(name, value.to_field_value());
    }

    fn slot(&self, name: &str) -> Result<&FieldValue> {
        self.entries
            .get(name)
            .ok_or_else(|| Error::StreamCorrupted(format!("missing field '{name}'")))
    }

    pub fn get_primitive(&self, name: &str) -> Result<Primitive> {
        match self.slot(name)? {
            FieldValue::Primitive(p) => Ok(*p),
            FieldValue::Object(_) => Err(Error::StreamCorrupted(format!(
                "field '{name}' is an object, not a primitive"
            ))),
        }
    }

    pub fn get_object(&self, name: &str) -> Result<Value> {
        match self.slot(name)? {
            FieldValue::Object(v) => Ok(v.clone()),
            FieldValue::Primitive(_) => Err(Error::StreamCorrupted(format!(
                "field '{name}' is a primitive, not an object"
            ))),
        }
    }

    pub fn get_object_of(&self, name: &str, ty: &Type) -> Result<Value> {
        let value = self.get_object(name)?;
        if ty.accepts(&value) {
            Ok(value)
        } else {
            Err(Error::StreamCorrupted(format!(
                "field '{name}' holds {value:?}, expected {ty:?}"
            )))
        }
    }

    pub fn get<T: Field>(&self, name: &str) -> Result<T> {
        T::from_field_value(self.slot(name)?.clone()).map_err(|value| {
            Error::StreamCorrupted(format!(
                "field '{name}' holds {value:?}, expected {:?}",
                T::field_type()
            ))
        })
    }

    /// `get` followed by `remove` on success.
    pub fn take<T: Field>(&mut self, name: &str) -> Result<T> {
        let value = self.get(name)?;
        self.entries.shift_remove(name);
        Ok(value)
    }

    pub fn remove(&mut self, name: &str) -> Option<FieldValue> {
        self.entries.shift_remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Stores every entry into the matching live field of `object`.
    ///
    /// Entries present on both sides are assigned first, entries the type no longer declares
    /// go to missing-field repair next, live fields the stream did not carry go last.
    pub fn apply_to<O: Serializable + ?Sized>(self, object: &mut O, repair: &Repair) -> Result<()> {
        let class = object.class();
        let mut entries = self.entries;
        let mut absent = Vec::new();
        for info in class.fields() {
            let Some(value) = entries.shift_remove(info.name) else {
                if !info.optional {
                    absent.push(info);
                }
                continue;
            };
            match object.assign(info.name, value) {
                Assign::Done => {}
                Assign::Incompatible(value) => {
                    let entry = FieldContext::new(info.name, value);
                    repair.incompatible_field_type(object.as_serializable_mut(), &info, &entry)?;
                }
                Assign::Unknown(_) => {
                    return Err(Error::StreamCorrupted(format!(
                        "{} declares '{}' but does not accept it",
                        class.name(),
                        info.name
                    )));
                }
            }
        }
        for (name, value) in entries {
            let entry = FieldContext::new(name, value);
            repair.missing_field(object.as_serializable_mut(), &MissingField::Unknown(&entry))?;
        }
        for info in &absent {
            repair.missing_field(object.as_serializable_mut(), &MissingField::Absent(info))?;
        }
        Ok(())
    }
}
