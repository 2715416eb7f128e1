use crate::binary::{BinarySink, BinarySource};
use crate::config::Config;
use crate::consts::OBJECT_ID;
use crate::descriptor::{BaseName, TypeName};
use crate::input::InputStream;
use crate::output::OutputStream;
use crate::shape::ShapeConverter;
use crate::xml::{XmlSink, XmlSource};
use std::collections::HashMap;
use std::io::{BufRead, Read, Write};
use std::sync::{Arc, RwLock};
use yggdrasil_base::{
    Class, ClassResolver, Error, FieldHandler, Repair, Result, Serializer, SimpleClassResolver,
    Tag, Type,
};

/// Ids that would read back as something other than a registered class.
fn check_id(id: &str) -> Result<()> {
    let reason = if id.trim().is_empty() {
        "is empty"
    } else if id == OBJECT_ID {
        "is reserved for the universal object type"
    } else if Tag::by_name(id).is_ok() {
        "is a builtin tag name"
    } else if id.ends_with("[]") {
        "looks like an array type"
    } else {
        return Ok(());
    };
    Err(Error::Configuration(format!("type id '{id}' {reason}")))
}

#[derive(Clone)]
enum Resolver {
    Plain(Arc<dyn ClassResolver>),
    Serializer(Arc<dyn Serializer>),
    /// The registry's own `SimpleClassResolver`.
    Simple,
}

/// Immutable snapshot of everything registered on a [`Yggdrasil`], shared by the streams
/// opened from it.
#[derive(Clone)]
pub struct Registry {
    resolvers: Vec<Resolver>,
    simple: SimpleClassResolver,
    /// Most recently registered first, [`ShapeConverter`] last.
    handlers: Vec<Arc<dyn FieldHandler>>,
    aliases: HashMap<String, String>,
}

impl Registry {
    fn new(config: &Config) -> Registry {
        Registry {
            resolvers: vec![Resolver::Simple],
            simple: SimpleClassResolver::new(),
            handlers: vec![Arc::new(ShapeConverter)],
            aliases: config.type_aliases.clone(),
        }
    }

    fn resolve_with(&self, id: &str) -> Option<Class> {
        self.resolvers.iter().find_map(|r| match r {
            Resolver::Plain(r) => r.resolve(id),
            Resolver::Serializer(s) => s.resolve(id),
            Resolver::Simple => self.simple.resolve(id),
        })
    }

    fn identify_with(&self, class: &Class) -> Option<String> {
        self.resolvers.iter().find_map(|r| match r {
            Resolver::Plain(r) => r.identify(class),
            Resolver::Serializer(s) => s.identify(class),
            Resolver::Simple => self.simple.identify(class),
        })
    }

    /// Class registered under a wire id, after applying configured aliases.
    pub fn resolve(&self, id: &str) -> Result<Class> {
        let id = self.aliases.get(id).map(String::as_str).unwrap_or(id);
        self.resolve_with(id)
            .ok_or_else(|| Error::StreamCorrupted(format!("unknown type id '{id}'")))
    }

    /// Wire id of a class. Fails unless the answering resolver maps the id back to the class.
    pub fn identify(&self, class: &Class) -> Result<String> {
        let Some(id) = self.identify_with(class) else {
            return Err(Error::NotSerializable(format!(
                "{} has no registered id",
                class.name()
            )));
        };
        check_id(&id).map_err(|e| Error::NotSerializable(format!("{}: {e}", class.name())))?;
        match self.resolve_with(&id) {
            Some(c) if c == *class => Ok(id),
            other => Err(Error::NotSerializable(format!(
                "{} is identified as '{id}' but '{id}' resolves to {other:?}",
                class.name()
            ))),
        }
    }

    pub fn serializer_for(&self, class: &Class) -> Option<&Arc<dyn Serializer>> {
        self.resolvers.iter().find_map(|r| match r {
            Resolver::Serializer(s) if s.identify(class).is_some() => Some(s),
            _ => None,
        })
    }

    pub fn repair(&self) -> Repair<'_> {
        Repair::new(&self.handlers)
    }

    pub fn type_name(&self, ty: &Type) -> Result<TypeName> {
        Ok(match ty {
            Type::Primitive(tag) | Type::Wrapper(tag) => TypeName::builtin(*tag),
            Type::String => TypeName::builtin(Tag::String),
            Type::Class => TypeName::builtin(Tag::Class),
            Type::Object => TypeName::named(Tag::Object, OBJECT_ID),
            Type::Named(class) => TypeName::named(Tag::of_type(ty), self.identify(class)?),
            Type::Array(component) => self.type_name(component)?.array_of(),
        })
    }

    pub fn resolve_type(&self, name: &TypeName) -> Result<Type> {
        let mut ty = match &name.base {
            BaseName::Builtin(tag) if tag.is_primitive() => Type::Primitive(*tag),
            BaseName::Builtin(tag) if tag.is_wrapper() => Type::Wrapper(*tag),
            BaseName::Builtin(Tag::String) => Type::String,
            BaseName::Builtin(Tag::Class) => Type::Class,
            BaseName::Builtin(tag) => {
                return Err(Error::StreamCorrupted(format!(
                    "{tag:?} does not name a type"
                )))
            }
            BaseName::Named(_, id) if id == OBJECT_ID => Type::Object,
            BaseName::Named(_, id) => Type::Named(self.resolve(id)?),
        };
        for _ in 0..name.dimensions {
            ty = Type::array_of(ty);
        }
        Ok(ty)
    }
}

/// Engine configuration: resolvers, serializers and field handlers shared by every stream
/// opened from it.
///
/// Registration replaces the shared snapshot, streams already open keep the one they started
/// with.
pub struct Yggdrasil {
    config: Config,
    registry: RwLock<Arc<Registry>>,
}

impl Default for Yggdrasil {
    fn default() -> Self {
        Self::new()
    }
}

impl Yggdrasil {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let registry = Registry::new(&config);
        Yggdrasil {
            config,
            registry: RwLock::new(Arc::new(registry)),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> Result<Arc<Registry>> {
        let registry = self.registry.read().map_err(|_| Error::RwLock)?;
        Ok(registry.clone())
    }

    fn update(&self, f: impl FnOnce(&mut Registry) -> Result<()>) -> Result<()> {
        let mut registry = self.registry.write().map_err(|_| Error::RwLock)?;
        let mut next = Registry::clone(&registry);
        f(&mut next)?;
        *registry = Arc::new(next);
        Ok(())
    }

    /// Appended to the resolver chain. Registering the same resolver twice has no effect.
    pub fn register_class_resolver(&self, resolver: Arc<dyn ClassResolver>) -> Result<()> {
        self.update(|registry| {
            let known = registry
                .resolvers
                .iter()
                .any(|r| matches!(r, Resolver::Plain(p) if Arc::ptr_eq(p, &resolver)));
            if !known {
                log::debug!("class resolver registered");
                registry.resolvers.push(Resolver::Plain(resolver));
            }
            Ok(())
        })
    }

    /// Serializers double as resolvers for the classes they handle.
    pub fn register_serializer(&self, serializer: Arc<dyn Serializer>) -> Result<()> {
        self.update(|registry| {
            let known = registry
                .resolvers
                .iter()
                .any(|r| matches!(r, Resolver::Serializer(s) if Arc::ptr_eq(s, &serializer)));
            if !known {
                log::debug!("serializer registered");
                registry.resolvers.push(Resolver::Serializer(serializer));
            }
            Ok(())
        })
    }

    /// Consulted before every handler registered earlier.
    pub fn register_field_handler(&self, handler: Arc<dyn FieldHandler>) -> Result<()> {
        self.update(|registry| {
            if !registry.handlers.iter().any(|h| Arc::ptr_eq(h, &handler)) {
                log::debug!("field handler registered");
                registry.handlers.insert(0, handler);
            }
            Ok(())
        })
    }

    pub fn register_single_class(&self, class: Class, id: &str) -> Result<()> {
        check_id(id)?;
        self.update(|registry| registry.simple.register(class, id))
    }

    /// Whether values of `class` can be written: it needs an id and a way to be rebuilt.
    pub fn is_serializable(&self, class: &Class) -> Result<bool> {
        let registry = self.registry()?;
        if registry.identify(class).is_err() {
            return Ok(false);
        }
        Ok(class.is_enum() || class.can_instantiate() || registry.serializer_for(class).is_some())
    }

    pub fn new_output_stream<W: Write>(&self, out: W) -> Result<OutputStream<BinarySink<W>>> {
        Ok(OutputStream::new(BinarySink::new(out)?, self.registry()?))
    }

    pub fn new_input_stream<R: Read>(&self, input: R) -> Result<InputStream<BinarySource<R>>> {
        Ok(InputStream::new(BinarySource::new(input)?, self.registry()?))
    }

    pub fn new_xml_output_stream<W: Write>(&self, out: W) -> Result<OutputStream<XmlSink<W>>> {
        let sink = XmlSink::new(out, self.config.xml_primitives, self.config.xml_indent)?;
        Ok(OutputStream::new(sink, self.registry()?))
    }

    pub fn new_xml_input_stream<R: BufRead>(&self, input: R) -> Result<InputStream<XmlSource<R>>> {
        Ok(InputStream::new(XmlSource::new(input)?, self.registry()?))
    }
}
