use crate::class::{Class, Handle};
use crate::tag::Tag;
use crate::{Enumeration, Error, Result};
use std::borrow::Cow;
use std::cell::{Ref, RefCell};
use std::fmt;
use std::rc::Rc;

/// Unboxed scalar. Floats compare by bit pattern so that NaN payloads survive equality checks.
#[derive(Clone, Copy, Debug)]
pub enum Primitive {
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Char(char),
    Boolean(bool),
}

impl Primitive {
    pub fn tag(&self) -> Tag {
        match self {
            Primitive::Byte(_) => Tag::Byte,
            Primitive::Short(_) => Tag::Short,
            Primitive::Int(_) => Tag::Int,
            Primitive::Long(_) => Tag::Long,
            Primitive::Float(_) => Tag::Float,
            Primitive::Double(_) => Tag::Double,
            Primitive::Char(_) => Tag::Char,
            Primitive::Boolean(_) => Tag::Boolean,
        }
    }

    /// Zero value of a primitive tag.
    ///
    /// # Panics
    /// If `tag` is not a primitive tag.
    pub fn zero(tag: Tag) -> Primitive {
        match tag {
            Tag::Byte => Primitive::Byte(0),
            Tag::Short => Primitive::Short(0),
            Tag::Int => Primitive::Int(0),
            Tag::Long => Primitive::Long(0),
            Tag::Float => Primitive::Float(0.0),
            Tag::Double => Primitive::Double(0.0),
            Tag::Char => Primitive::Char('\0'),
            Tag::Boolean => Primitive::Boolean(false),
            other => panic!("{other:?} is not a primitive tag"),
        }
    }
}

impl PartialEq for Primitive {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Primitive::Byte(a), Primitive::Byte(b)) => a == b,
            (Primitive::Short(a), Primitive::Short(b)) => a == b,
            (Primitive::Int(a), Primitive::Int(b)) => a == b,
            (Primitive::Long(a), Primitive::Long(b)) => a == b,
            (Primitive::Float(a), Primitive::Float(b)) => a.to_bits() == b.to_bits(),
            (Primitive::Double(a), Primitive::Double(b)) => a.to_bits() == b.to_bits(),
            (Primitive::Char(a), Primitive::Char(b)) => a == b,
            (Primitive::Boolean(a), Primitive::Boolean(b)) => a == b,
            _ => false,
        }
    }
}

/// Runtime type of a field, array component or class literal.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    /// Holds a primitive tag.
    Primitive(Tag),
    /// Holds a wrapper tag.
    Wrapper(Tag),
    String,
    Class,
    /// Universal object type, accepts every non-primitive value.
    Object,
    Named(Class),
    Array(Box<Type>),
}

impl Type {
    pub fn array_of(component: Type) -> Type {
        Type::Array(Box::new(component))
    }

    pub fn component(&self) -> Option<&Type> {
        match self {
            Type::Array(component) => Some(component),
            _ => None,
        }
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self, Type::Primitive(_))
    }

    /// Type of a non-null value.
    pub fn of(value: &Value) -> Option<Type> {
        Some(match value {
            Value::Null => return None,
            Value::Boxed(p) => Type::Wrapper(p.tag().wrapper()),
            Value::String(_) => Type::String,
            Value::Array(array) => Type::array_of(array.component()),
            Value::Enum(e) => Type::Named(e.class),
            Value::Class(_) => Type::Class,
            Value::Object(handle) => Type::Named(handle.class()),
        })
    }

    /// Whether `value` may be stored in a slot of this type.
    ///
    /// Primitive types accept the boxed form of their own kind, this is how primitive array
    /// elements are held.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (Type::Primitive(t), Value::Boxed(p)) => p.tag() == *t,
            (Type::Primitive(_), _) => false,
            (_, Value::Null) => true,
            (Type::Object, _) => true,
            (Type::Wrapper(t), Value::Boxed(p)) => p.tag().wrapper() == *t,
            (Type::String, Value::String(_)) => true,
            (Type::Class, Value::Class(_)) => true,
            (Type::Named(class), Value::Object(handle)) => handle.class() == *class,
            (Type::Named(class), Value::Enum(e)) => e.class == *class,
            (Type::Array(component), Value::Array(array)) => {
                component.is_assignable_from(&array.component())
            }
            _ => false,
        }
    }

    pub fn is_assignable_from(&self, other: &Type) -> bool {
        if self == other {
            return true;
        }
        match (self, other) {
            (Type::Object, other) => !other.is_primitive(),
            (Type::Array(a), Type::Array(b)) => {
                !a.is_primitive() && !b.is_primitive() && a.is_assignable_from(b)
            }
            _ => false,
        }
    }

    /// Value a freshly allocated slot of this type holds.
    pub fn blank(&self) -> Value {
        match self {
            Type::Primitive(t) => Value::Boxed(Primitive::zero(*t)),
            _ => Value::Null,
        }
    }
}

/// Enum constant: declaring class plus constant name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnumValue {
    pub class: Class,
    pub name: Cow<'static, str>,
}

impl EnumValue {
    pub fn new(class: Class, name: impl Into<Cow<'static, str>>) -> EnumValue {
        EnumValue {
            class,
            name: name.into(),
        }
    }

    pub fn of<T: Enumeration>(constant: &T) -> EnumValue {
        EnumValue::new(Class::enumeration::<T>(), constant.name())
    }

    /// Typed constant, if this value belongs to `T`.
    pub fn to<T: Enumeration>(&self) -> Option<T> {
        if self.class == Class::enumeration::<T>() {
            T::from_name(&self.name)
        } else {
            None
        }
    }
}

/// Array node contents. Elements always agree with the component type.
#[derive(Clone, PartialEq)]
pub struct Array {
    component: Type,
    elements: Vec<Value>,
}

impl Array {
    pub fn component(&self) -> &Type {
        &self.component
    }

    pub fn elements(&self) -> &[Value] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

/// Shared, identity-bearing array.
#[derive(Clone)]
pub struct ArrayRef(Rc<RefCell<Array>>);

impl ArrayRef {
    pub fn new(component: Type, elements: Vec<Value>) -> Result<ArrayRef> {
        if let Some(bad) = elements.iter().find(|e| !component.accepts(e)) {
            return Err(Error::StreamCorrupted(format!(
                "{:?} is not a valid element of {component:?}[]",
                Tag::of(bad)
            )));
        }
        Ok(Self::new_unchecked(component, elements))
    }

    pub(crate) fn new_unchecked(component: Type, elements: Vec<Value>) -> ArrayRef {
        ArrayRef(Rc::new(RefCell::new(Array {
            component,
            elements,
        })))
    }

    /// Array of `len` blank elements.
    pub fn with_len(component: Type, len: usize) -> ArrayRef {
        let blank = component.blank();
        Self::new_unchecked(component, vec![blank; len])
    }

    pub fn component(&self) -> Type {
        self.0.borrow().component.clone()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.0.borrow().elements.get(index).cloned()
    }

    pub fn set(&self, index: usize, value: Value) -> Result<()> {
        let mut array = self
            .0
            .try_borrow_mut()
            .map_err(|_| Error::Borrowed("array".into()))?;
        if !array.component.accepts(&value) {
            return Err(Error::StreamCorrupted(format!(
                "{:?} is not a valid element of {:?}[]",
                Tag::of(&value),
                array.component
            )));
        }
        match array.elements.get_mut(index) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(Error::StreamCorrupted(format!(
                "array index {index} out of bounds"
            ))),
        }
    }

    pub fn read(&self) -> Result<Ref<'_, Array>> {
        self.0
            .try_borrow()
            .map_err(|_| Error::Borrowed("array".into()))
    }

    pub fn ptr_eq(&self, other: &ArrayRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }
}

impl ArrayRef {
    /// Pairs already on the comparison path are taken as equal, so cyclic arrays terminate.
    fn eq_within(&self, other: &ArrayRef, path: &mut Vec<(usize, usize)>) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        let pair = (self.addr(), other.addr());
        if path.contains(&pair) {
            return true;
        }
        let (Ok(a), Ok(b)) = (self.0.try_borrow(), other.0.try_borrow()) else {
            return false;
        };
        if a.component != b.component || a.elements.len() != b.elements.len() {
            return false;
        }
        path.push(pair);
        let equal = a.elements.iter().zip(&b.elements).all(|elements| match elements {
            (Value::Array(x), Value::Array(y)) => x.eq_within(y, path),
            (x, y) => x == y,
        });
        path.pop();
        equal
    }
}

impl PartialEq for ArrayRef {
    fn eq(&self, other: &Self) -> bool {
        self.eq_within(other, &mut Vec::new())
    }
}

impl fmt::Debug for ArrayRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(array) => write!(f, "{:?}[{}]", array.component, array.elements.len()),
            Err(_) => write!(f, "array@{:x}", self.addr()),
        }
    }
}

/// Anything that can stand in object position of a stream.
#[derive(Clone)]
pub enum Value {
    Null,
    Boxed(Primitive),
    String(Rc<str>),
    Array(ArrayRef),
    Enum(EnumValue),
    Class(Type),
    Object(Handle),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Address of identity-bearing values. Boxed primitives, enums and class literals have none.
    pub fn identity(&self) -> Option<usize> {
        match self {
            Value::String(s) => Some(Rc::as_ptr(s) as *const u8 as usize),
            Value::Array(array) => Some(array.addr()),
            Value::Object(handle) => Some(handle.addr()),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boxed(a), Value::Boxed(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Enum(a), Value::Enum(b)) => a == b,
            (Value::Class(a), Value::Class(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Boxed(p) => write!(f, "{p:?}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Array(array) => write!(f, "{array:?}"),
            Value::Enum(e) => write!(f, "{}.{}", e.class.name(), e.name),
            Value::Class(ty) => write!(f, "class {ty:?}"),
            Value::Object(handle) => write!(f, "{}@{:x}", handle.class().name(), handle.addr()),
        }
    }
}

impl From<Primitive> for Value {
    fn from(value: Primitive) -> Self {
        Value::Boxed(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(Rc::from(value))
    }
}

impl From<ArrayRef> for Value {
    fn from(value: ArrayRef) -> Self {
        Value::Array(value)
    }
}

impl From<Handle> for Value {
    fn from(value: Handle) -> Self {
        Value::Object(value)
    }
}
