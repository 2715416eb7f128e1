use crate::descriptor::TypeName;
use crate::registry::Registry;
use std::rc::Rc;
use std::sync::Arc;
use yggdrasil_base::{
    ArrayRef, Error, Field, FieldValue, Fields, Handle, Primitive, Result, Tag, Value,
};

/// Wire format on the reading side, mirror of [`crate::output::Sink`].
pub trait Source {
    type Inner;

    fn read_tag(&mut self) -> Result<Tag>;

    /// Payload of a primitive or boxed node. `tag` is always the primitive tag.
    fn read_primitive(&mut self, tag: Tag) -> Result<Primitive>;

    fn read_array_element(&mut self, tag: Tag) -> Result<Primitive>;

    fn read_string(&mut self) -> Result<String>;

    /// Component type and length of an array node.
    fn read_array_start(&mut self) -> Result<(TypeName, usize)>;

    fn read_array_end(&mut self) -> Result<()>;

    /// Type id and constant name of an enum node.
    fn read_enum(&mut self) -> Result<(String, String)>;

    fn read_class(&mut self) -> Result<TypeName>;

    fn read_reference(&mut self) -> Result<u32>;

    /// Type id and field count of an object node.
    fn read_object_start(&mut self) -> Result<(String, u16)>;

    fn read_field_name(&mut self) -> Result<String>;

    fn read_object_end(&mut self) -> Result<()>;

    fn finish(self) -> Result<Self::Inner>;
}

/// Reads object graphs from one stream.
///
/// Values are registered under their ordinal as soon as they are allocated, before their
/// contents are read, which is what lets cycles resolve.
pub struct InputStream<S: Source> {
    source: S,
    registry: Arc<Registry>,
    /// `None` while an object built from its fields is still being read.
    objects: Vec<Option<Value>>,
}

impl<S: Source> InputStream<S> {
    pub(crate) fn new(source: S, registry: Arc<Registry>) -> Self {
        log::debug!("input stream opened");
        InputStream {
            source,
            registry,
            objects: Vec::new(),
        }
    }

    /// Next value, converted to `T`.
    pub fn read<T: Field>(&mut self) -> Result<T> {
        let value = self.read_object()?;
        T::from_value(value).map_err(|value| {
            Error::StreamCorrupted(format!(
                "expected {:?}, found {value:?}",
                T::field_type()
            ))
        })
    }

    pub fn read_object(&mut self) -> Result<Value> {
        let tag = self.source.read_tag()?;
        if tag.is_primitive() {
            return Err(Error::StreamCorrupted(format!(
                "primitive {tag:?} in object position"
            )));
        }
        self.read_value(tag)
    }

    fn register(&mut self, value: &Value) {
        self.objects.push(Some(value.clone()));
    }

    fn read_value(&mut self, tag: Tag) -> Result<Value> {
        let ordinal = self.objects.len();
        let value = match tag {
            Tag::Null => return Ok(Value::Null),
            Tag::Reference => {
                let ordinal = self.source.read_reference()?;
                return match self.objects.get(ordinal as usize) {
                    Some(Some(value)) => Ok(value.clone()),
                    Some(None) => Err(Error::StreamCorrupted(format!(
                        "reference to #{ordinal} before it was constructed"
                    ))),
                    None => Err(Error::StreamCorrupted(format!(
                        "reference to unknown #{ordinal}"
                    ))),
                };
            }
            tag if tag.is_wrapper() => {
                let value = Value::Boxed(self.source.read_primitive(tag.primitive())?);
                self.register(&value);
                value
            }
            Tag::String => {
                let value = Value::String(Rc::from(self.source.read_string()?));
                self.register(&value);
                value
            }
            Tag::Enum => {
                let (id, name) = self.source.read_enum()?;
                let class = self.registry.resolve(&id)?;
                let Some(constant) = class.constant(&name) else {
                    return Err(Error::StreamCorrupted(format!(
                        "'{id}' has no constant '{name}'"
                    )));
                };
                let value = Value::Enum(constant);
                self.register(&value);
                value
            }
            Tag::Class => {
                let name = self.source.read_class()?;
                let value = Value::Class(self.registry.resolve_type(&name)?);
                self.register(&value);
                value
            }
            Tag::Array => self.read_array()?,
            Tag::Object => self.read_object_node()?,
            other => {
                return Err(Error::StreamCorrupted(format!(
                    "unexpected {other:?} in object position"
                )))
            }
        };
        log::trace!("#{ordinal} {tag:?}");
        Ok(value)
    }

    fn read_array(&mut self) -> Result<Value> {
        let (name, len) = self.source.read_array_start()?;
        let component = self.registry.resolve_type(&name)?;
        let array = ArrayRef::with_len(component, len);
        let value = Value::Array(array.clone());
        self.register(&value);
        match name.primitive_tag() {
            Some(tag) => {
                for i in 0..len {
                    let element = self.source.read_array_element(tag)?;
                    array.set(i, Value::Boxed(element))?;
                }
            }
            None => {
                for i in 0..len {
                    let element = self.read_object()?;
                    array.set(i, element)?;
                }
            }
        }
        self.source.read_array_end()?;
        Ok(value)
    }

    fn read_fields(&mut self, num_fields: u16) -> Result<Fields> {
        let mut fields = Fields::new();
        for _ in 0..num_fields {
            let name = self.source.read_field_name()?;
            let tag = self.source.read_tag()?;
            let value = if tag.is_primitive() {
                FieldValue::Primitive(self.source.read_primitive(tag)?)
            } else {
                FieldValue::Object(self.read_value(tag)?)
            };
            if fields.contains(&name) {
                return Err(Error::StreamCorrupted(format!("field '{name}' repeated")));
            }
            fields.insert(name, value);
        }
        Ok(fields)
    }

    fn read_object_node(&mut self) -> Result<Value> {
        let (id, num_fields) = self.source.read_object_start()?;
        let class = self.registry.resolve(&id)?;
        if class.is_enum() {
            return Err(Error::StreamCorrupted(format!(
                "'{id}' is an enum, not an object"
            )));
        }
        let registry = self.registry.clone();
        let serializer = registry.serializer_for(&class);

        let handle = match serializer {
            Some(serializer) if !serializer.can_be_instantiated(&class) => {
                let slot = self.objects.len();
                self.objects.push(None);
                let fields = self.read_fields(num_fields)?;
                self.source.read_object_end()?;
                let handle = serializer.deserialize_new(&class, fields)?;
                self.objects[slot] = Some(Value::Object(handle.clone()));
                handle
            }
            Some(serializer) => {
                let handle = self.instantiate(serializer.new_instance(&class), &id)?;
                let fields = self.read_fields(num_fields)?;
                self.source.read_object_end()?;
                serializer.deserialize(&mut *handle.write()?, fields)?;
                handle
            }
            None => {
                let handle = self.instantiate(class.instantiate(), &id)?;
                let fields = self.read_fields(num_fields)?;
                self.source.read_object_end()?;
                let mut object = handle.write()?;
                object.deserialize(fields, &registry.repair())?;
                drop(object);
                handle
            }
        };
        Ok(Value::Object(handle))
    }

    fn instantiate(&mut self, handle: Option<Handle>, id: &str) -> Result<Handle> {
        let Some(handle) = handle else {
            return Err(Error::NotSerializable(format!(
                "'{id}' has no blank constructor"
            )));
        };
        self.register(&Value::Object(handle.clone()));
        Ok(handle)
    }

    /// Finishes the stream and returns the underlying reader.
    pub fn close(self) -> Result<S::Inner> {
        log::debug!("input stream closed after {} values", self.objects.len());
        self.source.finish()
    }
}
