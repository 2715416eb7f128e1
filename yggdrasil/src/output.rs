use crate::consts::MAX_FIELDS;
use crate::descriptor::TypeName;
use crate::registry::Registry;
use std::collections::HashMap;
use std::sync::Arc;
use yggdrasil_base::{
    ArrayRef, Class, Error, Field, FieldValue, Handle, Primitive, Result, Tag, Value,
};

/// Wire format on the writing side. Only sees resolved ids, never classes.
pub trait Sink {
    type Inner;

    fn write_null(&mut self) -> Result<()>;

    /// Tagged primitive field value.
    fn write_primitive(&mut self, value: Primitive) -> Result<()>;

    /// Boxed primitive in object position.
    fn write_wrapped_primitive(&mut self, value: Primitive) -> Result<()>;

    /// Untagged element of a primitive array.
    fn write_array_element(&mut self, value: Primitive) -> Result<()>;

    fn write_string(&mut self, value: &str) -> Result<()>;

    fn write_array_start(&mut self, component: &TypeName, len: usize) -> Result<()>;

    fn write_array_end(&mut self) -> Result<()>;

    fn write_enum(&mut self, type_id: &str, name: &str) -> Result<()>;

    fn write_class(&mut self, ty: &TypeName) -> Result<()>;

    fn write_reference(&mut self, ordinal: u32) -> Result<()>;

    fn write_object_start(&mut self, type_id: &str, num_fields: u16) -> Result<()>;

    /// Name of the field whose value is written next.
    fn write_field_name(&mut self, name: &str) -> Result<()>;

    fn write_object_end(&mut self) -> Result<()>;

    fn flush(&mut self) -> Result<()>;

    fn finish(self) -> Result<Self::Inner>;
}

#[derive(Clone, Copy, Debug)]
enum Ordinal {
    Committed(u32),
    /// Built from its fields on read, so it cannot be referenced before it is complete.
    Pending,
}

/// Writes object graphs to one stream.
///
/// Every value written through the same stream shares one reference scope: an object that
/// was already written is emitted as a back-reference to its ordinal.
pub struct OutputStream<S: Sink> {
    sink: S,
    registry: Arc<Registry>,
    written: HashMap<usize, Ordinal>,
    /// Keeps written values alive so their addresses are not reused within the stream.
    retained: Vec<Value>,
    next_ordinal: u32,
}

impl<S: Sink> OutputStream<S> {
    pub(crate) fn new(sink: S, registry: Arc<Registry>) -> Self {
        log::debug!("output stream opened");
        OutputStream {
            sink,
            registry,
            written: HashMap::new(),
            retained: Vec::new(),
            next_ordinal: 0,
        }
    }

    pub fn write<T: Field>(&mut self, value: &T) -> Result<()> {
        self.write_object(&value.to_value())
    }

    pub fn write_object(&mut self, value: &Value) -> Result<()> {
        if value.is_null() {
            return self.sink.write_null();
        }
        if let Some(addr) = value.identity() {
            match self.written.get(&addr) {
                Some(Ordinal::Committed(ordinal)) => {
                    log::trace!("reference to #{ordinal}");
                    return self.sink.write_reference(*ordinal);
                }
                Some(Ordinal::Pending) => {
                    return Err(Error::NotSerializable(format!(
                        "{value:?} refers to itself before it can be instantiated"
                    )));
                }
                None => {}
            }
        }
        if let Value::Object(handle) = value {
            self.check_readable(&handle.class())?;
        }
        let ordinal = self.next_ordinal;
        self.next_ordinal += 1;
        log::trace!("#{ordinal} {:?}", Tag::of(value));

        match value {
            Value::Null => Ok(()),
            Value::Boxed(p) => self.sink.write_wrapped_primitive(*p),
            Value::String(s) => {
                self.commit(value, ordinal);
                self.sink.write_string(s)
            }
            Value::Enum(e) => {
                let id = self.registry.identify(&e.class)?;
                self.sink.write_enum(&id, &e.name)
            }
            Value::Class(ty) => {
                let name = self.registry.type_name(ty)?;
                self.sink.write_class(&name)
            }
            Value::Array(array) => {
                self.commit(value, ordinal);
                self.write_array(array)
            }
            Value::Object(handle) => self.write_object_node(value, handle, ordinal),
        }
    }

    fn commit(&mut self, value: &Value, ordinal: u32) {
        if let Some(addr) = value.identity() {
            self.written.insert(addr, Ordinal::Committed(ordinal));
            self.retained.push(value.clone());
        }
    }

    /// Refuses classes a reader could not rebuild, before anything is written.
    fn check_readable(&self, class: &Class) -> Result<()> {
        let id = self.registry.identify(class)?;
        if class.can_instantiate() || self.registry.serializer_for(class).is_some() {
            Ok(())
        } else {
            Err(Error::NotSerializable(format!(
                "'{id}' has no blank constructor and no serializer"
            )))
        }
    }

    fn write_array(&mut self, array: &ArrayRef) -> Result<()> {
        let (component, elements) = {
            let array = array.read()?;
            (array.component().clone(), array.elements().to_vec())
        };
        let name = self.registry.type_name(&component)?;
        self.sink.write_array_start(&name, elements.len())?;
        if component.is_primitive() {
            for element in &elements {
                let Value::Boxed(p) = element else {
                    return Err(Error::NotSerializable(format!(
                        "{element:?} in a {component:?} array"
                    )));
                };
                self.sink.write_array_element(*p)?;
            }
        } else {
            for element in &elements {
                self.write_object(element)?;
            }
        }
        self.sink.write_array_end()
    }

    fn write_object_node(&mut self, value: &Value, handle: &Handle, ordinal: u32) -> Result<()> {
        let class = handle.class();
        let id = self.registry.identify(&class)?;
        let serializer = self.registry.serializer_for(&class).cloned();
        let deferred = serializer
            .as_ref()
            .map_or(false, |s| !s.can_be_instantiated(&class));
        let fields = {
            let object = handle.read()?;
            match &serializer {
                Some(serializer) => serializer.serialize(&*object)?,
                None => object.serialize()?,
            }
        };
        if fields.len() > MAX_FIELDS {
            return Err(Error::Configuration(format!(
                "{} has {} fields, at most {MAX_FIELDS} can be written",
                class.name(),
                fields.len()
            )));
        }

        if deferred {
            if let Some(addr) = value.identity() {
                self.written.insert(addr, Ordinal::Pending);
            }
        } else {
            self.commit(value, ordinal);
        }

        log::trace!("#{ordinal} object '{id}' with {} fields", fields.len());
        self.sink.write_object_start(&id, fields.len() as u16)?;
        for (name, field) in fields.iter() {
            self.sink.write_field_name(name)?;
            match field {
                FieldValue::Primitive(p) => self.sink.write_primitive(*p)?,
                FieldValue::Object(v) => self.write_object(v)?,
            }
        }
        self.sink.write_object_end()?;

        if deferred {
            self.commit(value, ordinal);
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.sink.flush()
    }

    /// Finishes the stream and returns the underlying writer.
    pub fn close(mut self) -> Result<S::Inner> {
        self.sink.flush()?;
        log::debug!("output stream closed after {} values", self.next_ordinal);
        self.sink.finish()
    }
}
