use crate::class::Class;
use crate::{Error, Result};
use std::collections::HashMap;

/// Maps stable wire ids to classes and back.
///
/// `resolve(identify(c)) == c` and `identify(resolve(id)) == id` must hold for every pair a
/// resolver answers. Remapping an old id to a renamed class is how class renames are migrated.
pub trait ClassResolver: Send + Sync {
    fn resolve(&self, id: &str) -> Option<Class>;

    fn identify(&self, class: &Class) -> Option<String>;
}

/// Resolver for classes registered one by one.
#[derive(Clone, Debug, Default)]
pub struct SimpleClassResolver {
    by_id: HashMap<String, Class>,
    by_class: HashMap<Class, String>,
}

impl SimpleClassResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registering the same pair twice is a no-op, changing either side of a pair is an error.
    pub fn register(&mut self, class: Class, id: impl Into<String>) -> Result<()> {
        let id = id.into();
        if let Some(existing) = self.by_class.get(&class) {
            if *existing == id {
                return Ok(());
            }
            return Err(Error::Configuration(format!(
                "{} is already registered as '{existing}', cannot change it to '{id}'",
                class.name()
            )));
        }
        if let Some(existing) = self.by_id.get(&id) {
            return Err(Error::Configuration(format!(
                "id '{id}' is already used by {}",
                existing.name()
            )));
        }
        log::debug!("registered {} as '{id}'", class.name());
        self.by_id.insert(id.clone(), class);
        self.by_class.insert(class, id);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

impl ClassResolver for SimpleClassResolver {
    fn resolve(&self, id: &str) -> Option<Class> {
        self.by_id.get(id).copied()
    }

    fn identify(&self, class: &Class) -> Option<String> {
        self.by_class.get(class).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pseudo_enum::{PseudoEnum, PseudoEnumBuilder, PseudoEnumFamily};
    use std::sync::OnceLock;

    struct Planet;

    impl PseudoEnumFamily for Planet {
        fn registry() -> &'static PseudoEnum<Self> {
            static REGISTRY: OnceLock<PseudoEnum<Planet>> = OnceLock::new();
            REGISTRY.get_or_init(|| PseudoEnumBuilder::new("Planet").build())
        }
    }

    struct Moon;

    impl PseudoEnumFamily for Moon {
        fn registry() -> &'static PseudoEnum<Self> {
            static REGISTRY: OnceLock<PseudoEnum<Moon>> = OnceLock::new();
            REGISTRY.get_or_init(|| PseudoEnumBuilder::new("Moon").build())
        }
    }

    #[test]
    fn bidirectional() {
        let planet = Class::pseudo_enum::<Planet>();
        let mut resolver = SimpleClassResolver::new();
        resolver.register(planet, "Planet").unwrap();
        resolver.register(planet, "Planet").unwrap();
        assert_eq!(resolver.len(), 1);
        assert_eq!(resolver.resolve("Planet"), Some(planet));
        assert_eq!(resolver.identify(&planet).as_deref(), Some("Planet"));
        assert_eq!(resolver.resolve("Moon"), None);
        assert_eq!(resolver.identify(&Class::pseudo_enum::<Moon>()), None);
    }

    #[test]
    fn conflicts() {
        let planet = Class::pseudo_enum::<Planet>();
        let moon = Class::pseudo_enum::<Moon>();
        let mut resolver = SimpleClassResolver::new();
        resolver.register(planet, "Planet").unwrap();
        assert!(matches!(
            resolver.register(planet, "Body"),
            Err(Error::Configuration(_))
        ));
        assert!(matches!(
            resolver.register(moon, "Planet"),
            Err(Error::Configuration(_))
        ));
        resolver.register(moon, "Moon").unwrap();
        assert_eq!(resolver.len(), 2);
    }
}
