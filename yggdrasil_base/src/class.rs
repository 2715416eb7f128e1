use crate::fields::FieldInfo;
use crate::pseudo_enum::PseudoEnumFamily;
use crate::value::EnumValue;
use crate::{Enumeration, Error, Result, Serializable};
use std::any::{Any, TypeId};
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

/// Shared mutable object, the pointer user types hold to each other.
pub type Gc<T> = Rc<RefCell<T>>;

#[derive(Clone, Copy)]
pub enum ClassKind {
    Object {
        instantiate: Option<fn() -> Handle>,
        fields: fn() -> Vec<FieldInfo>,
    },
    Enum {
        constant: fn(&str) -> Option<EnumValue>,
        values: fn() -> Vec<EnumValue>,
    },
}

/// Runtime descriptor of a user type. Compares by `TypeId`.
#[derive(Clone, Copy)]
pub struct Class {
    type_id: TypeId,
    name: &'static str,
    kind: ClassKind,
}

fn blank<T: Serializable + Default>() -> Handle {
    Handle::new(T::default())
}

fn declared<T: Serializable>() -> Vec<FieldInfo> {
    let mut fields = Vec::new();
    T::declared_fields(&mut fields);
    fields
}

fn enum_constant<T: Enumeration>(name: &str) -> Option<EnumValue> {
    T::from_name(name).map(|c| EnumValue::of(&c))
}

fn enum_values<T: Enumeration>() -> Vec<EnumValue> {
    T::values().iter().map(EnumValue::of).collect()
}

fn pseudo_constant<T: PseudoEnumFamily>(name: &str) -> Option<EnumValue> {
    T::registry()
        .value_of(name)
        .map(|c| EnumValue::new(Class::pseudo_enum::<T>(), c.name().to_string()))
}

fn pseudo_values<T: PseudoEnumFamily>() -> Vec<EnumValue> {
    T::registry()
        .values()
        .iter()
        .map(|c| EnumValue::new(Class::pseudo_enum::<T>(), c.name().to_string()))
        .collect()
}

impl Class {
    pub fn of<T: Serializable + Default>() -> Class {
        Class {
            type_id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
            kind: ClassKind::Object {
                instantiate: Some(blank::<T>),
                fields: declared::<T>,
            },
        }
    }

    /// Class that can only be created by a serializer from its fields.
    pub fn without_constructor<T: Serializable>() -> Class {
        Class {
            type_id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
            kind: ClassKind::Object {
                instantiate: None,
                fields: declared::<T>,
            },
        }
    }

    pub fn enumeration<T: Enumeration>() -> Class {
        Class {
            type_id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
            kind: ClassKind::Enum {
                constant: enum_constant::<T>,
                values: enum_values::<T>,
            },
        }
    }

    pub fn pseudo_enum<T: PseudoEnumFamily>() -> Class {
        Class {
            type_id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
            kind: ClassKind::Enum {
                constant: pseudo_constant::<T>,
                values: pseudo_values::<T>,
            },
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kind(&self) -> ClassKind {
        self.kind
    }

    pub fn is<T: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    pub fn is_enum(&self) -> bool {
        matches!(self.kind, ClassKind::Enum { .. })
    }

    pub fn can_instantiate(&self) -> bool {
        matches!(
            self.kind,
            ClassKind::Object {
                instantiate: Some(_),
                ..
            }
        )
    }

    /// Blank instance ready to receive fields.
    pub fn instantiate(&self) -> Option<Handle> {
        match self.kind {
            ClassKind::Object {
                instantiate: Some(f),
                ..
            } => Some(f()),
            _ => None,
        }
    }

    /// Fields declared by the type, base fields first.
    pub fn fields(&self) -> Vec<FieldInfo> {
        match self.kind {
            ClassKind::Object { fields, .. } => fields(),
            ClassKind::Enum { .. } => Vec::new(),
        }
    }

    /// Enum constant by name or alias, canonicalized.
    pub fn constant(&self, name: &str) -> Option<EnumValue> {
        match self.kind {
            ClassKind::Enum { constant, .. } => constant(name),
            ClassKind::Object { .. } => None,
        }
    }

    pub fn constants(&self) -> Vec<EnumValue> {
        match self.kind {
            ClassKind::Enum { values, .. } => values(),
            ClassKind::Object { .. } => Vec::new(),
        }
    }
}

impl PartialEq for Class {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for Class {}

impl Hash for Class {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Type-erased view of a `Gc<T>`.
pub trait ObjectCell {
    fn class(&self) -> Class;
    fn try_read(&self) -> Result<Ref<'_, dyn Serializable>>;
    fn try_write(&self) -> Result<RefMut<'_, dyn Serializable>>;
    fn into_any(self: Rc<Self>) -> Rc<dyn Any>;
}

impl<T: Serializable> ObjectCell for RefCell<T> {
    fn class(&self) -> Class {
        T::type_class()
    }

    fn try_read(&self) -> Result<Ref<'_, dyn Serializable>> {
        match self.try_borrow() {
            Ok(r) => Ok(Ref::map(r, |t| t as &dyn Serializable)),
            Err(_) => Err(Error::Borrowed(T::type_class().name().into())),
        }
    }

    fn try_write(&self) -> Result<RefMut<'_, dyn Serializable>> {
        match self.try_borrow_mut() {
            Ok(r) => Ok(RefMut::map(r, |t| t as &mut dyn Serializable)),
            Err(_) => Err(Error::Borrowed(T::type_class().name().into())),
        }
    }

    fn into_any(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}

/// Identity-bearing reference to an object of any serializable type.
#[derive(Clone)]
pub struct Handle(Rc<dyn ObjectCell>);

impl Handle {
    pub fn new<T: Serializable>(value: T) -> Handle {
        Handle(Rc::new(RefCell::new(value)))
    }

    pub fn from_gc<T: Serializable>(gc: Gc<T>) -> Handle {
        Handle(gc)
    }

    /// Typed pointer to the same allocation.
    pub fn downcast<T: Serializable>(&self) -> Option<Gc<T>> {
        self.0.clone().into_any().downcast::<RefCell<T>>().ok()
    }

    pub fn class(&self) -> Class {
        self.0.class()
    }

    pub fn read(&self) -> Result<Ref<'_, dyn Serializable>> {
        self.0.try_read()
    }

    pub fn write(&self) -> Result<RefMut<'_, dyn Serializable>> {
        self.0.try_write()
    }

    pub fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    pub fn ptr_eq(&self, other: &Handle) -> bool {
        self.addr() == other.addr()
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{:x}", self.class().name(), self.addr())
    }
}
