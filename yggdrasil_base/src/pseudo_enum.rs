use crate::{Error, Result};
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::Arc;

struct Inner<T> {
    name: String,
    ordinal: u32,
    value: T,
}

/// Singleton constant of a pseudo-enum family.
///
/// Each constant owns its payload, which is how constants carry their own behaviour
/// (a boxed trait object for instance). Equality and hashing are by identity.
pub struct Constant<T>(Arc<Inner<T>>);

impl<T> Constant<T> {
    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn ordinal(&self) -> u32 {
        self.0.ordinal
    }
}

impl<T> Clone for Constant<T> {
    fn clone(&self) -> Self {
        Constant(self.0.clone())
    }
}

impl<T> Deref for Constant<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0.value
    }
}

impl<T> PartialEq for Constant<T> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<T> Eq for Constant<T> {}

impl<T> Hash for Constant<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.0).hash(state);
    }
}

impl<T> fmt::Debug for Constant<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.0.name, self.0.ordinal)
    }
}

impl<T> fmt::Display for Constant<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.name)
    }
}

/// Immutable set of constants with enum-like lookup.
pub struct PseudoEnum<T> {
    family: &'static str,
    constants: Vec<Constant<T>>,
    by_name: HashMap<String, usize>,
}

impl<T> PseudoEnum<T> {
    pub fn family(&self) -> &'static str {
        self.family
    }

    pub fn values(&self) -> &[Constant<T>] {
        &self.constants
    }

    /// Constant by current name or alias.
    pub fn value_of(&self, name: &str) -> Option<&Constant<T>> {
        self.by_name.get(name).map(|&i| &self.constants[i])
    }

    pub fn get(&self, ordinal: u32) -> Option<&Constant<T>> {
        self.constants.get(ordinal as usize)
    }

    pub fn len(&self) -> usize {
        self.constants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constants.is_empty()
    }
}

/// Assigns ordinals in declaration order.
pub struct PseudoEnumBuilder<T> {
    family: &'static str,
    constants: Vec<Constant<T>>,
    by_name: HashMap<String, usize>,
}

impl<T> PseudoEnumBuilder<T> {
    pub fn new(family: &'static str) -> Self {
        PseudoEnumBuilder {
            family,
            constants: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    pub fn constant(mut self, name: impl Into<String>, value: T) -> Result<Self> {
        let name = name.into();
        if self.by_name.contains_key(&name) {
            return Err(Error::Configuration(format!(
                "{} already has a constant named '{name}'",
                self.family
            )));
        }
        let ordinal = self.constants.len();
        self.by_name.insert(name.clone(), ordinal);
        self.constants.push(Constant(Arc::new(Inner {
            name,
            ordinal: ordinal as u32,
            value,
        })));
        Ok(self)
    }

    /// Accept `old` on the wire for the constant currently named `current`.
    pub fn alias(mut self, old: impl Into<String>, current: &str) -> Result<Self> {
        let old = old.into();
        let Some(&index) = self.by_name.get(current) else {
            return Err(Error::Configuration(format!(
                "{} has no constant named '{current}'",
                self.family
            )));
        };
        if self.by_name.contains_key(&old) {
            return Err(Error::Configuration(format!(
                "{} already has a constant named '{old}'",
                self.family
            )));
        }
        self.by_name.insert(old, index);
        Ok(self)
    }

    pub fn build(self) -> PseudoEnum<T> {
        PseudoEnum {
            family: self.family,
            constants: self.constants,
            by_name: self.by_name,
        }
    }
}

/// A type whose values are the constants of one process-wide [`PseudoEnum`].
///
/// ```ignore
/// impl PseudoEnumFamily for Operation {
///     fn registry() -> &'static PseudoEnum<Self> {
///         static REGISTRY: OnceLock<PseudoEnum<Operation>> = OnceLock::new();
///         REGISTRY.get_or_init(|| { /* PseudoEnumBuilder ... */ })
///     }
/// }
/// ```
pub trait PseudoEnumFamily: Sized + Send + Sync + 'static {
    fn registry() -> &'static PseudoEnum<Self>;
}
