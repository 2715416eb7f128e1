use crate::consts::OBJECT_ID;
use std::fmt;
use yggdrasil_base::{Error, Result, Tag};

/// Element type of an array, or the target of a class literal, before resolution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BaseName {
    /// Primitive, wrapper, string or class tag.
    Builtin(Tag),
    /// Object or enum tag with the wire id. Only the id takes part in resolution.
    Named(Tag, String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeName {
    pub dimensions: usize,
    pub base: BaseName,
}

impl TypeName {
    pub fn builtin(tag: Tag) -> TypeName {
        TypeName {
            dimensions: 0,
            base: BaseName::Builtin(tag),
        }
    }

    pub fn named(tag: Tag, id: impl Into<String>) -> TypeName {
        TypeName {
            dimensions: 0,
            base: BaseName::Named(tag, id.into()),
        }
    }

    pub fn array_of(mut self) -> TypeName {
        self.dimensions += 1;
        self
    }

    /// Primitive elements are written inline without tags.
    pub fn primitive_tag(&self) -> Option<Tag> {
        match self.base {
            BaseName::Builtin(tag) if self.dimensions == 0 && tag.is_primitive() => Some(tag),
            _ => None,
        }
    }

    pub fn base_tag(&self) -> Tag {
        match self.base {
            BaseName::Builtin(tag) | BaseName::Named(tag, _) => tag,
        }
    }

    /// Parses the textual form used by XML attributes, `int[][]` or `Point[]`.
    pub fn parse(s: &str) -> Result<TypeName> {
        let mut base = s.trim();
        let mut dimensions = 0;
        while let Some(stripped) = base.strip_suffix("[]") {
            base = stripped;
            dimensions += 1;
        }
        if base.is_empty() {
            return Err(Error::StreamCorrupted(format!("invalid type name '{s}'")));
        }
        let base = match Tag::by_name(base) {
            Ok(tag) if tag.is_primitive() || tag.is_wrapper() => BaseName::Builtin(tag),
            Ok(tag @ (Tag::String | Tag::Class)) => BaseName::Builtin(tag),
            _ => BaseName::Named(Tag::Object, base.to_string()),
        };
        Ok(TypeName { dimensions, base })
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.base {
            BaseName::Builtin(tag) => f.write_str(tag.name())?,
            BaseName::Named(_, id) => f.write_str(id)?,
        }
        for _ in 0..self.dimensions {
            f.write_str("[]")?;
        }
        Ok(())
    }
}

impl Default for TypeName {
    fn default() -> Self {
        TypeName::named(Tag::Object, OBJECT_ID)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_form() {
        let name = TypeName::builtin(Tag::Int).array_of().array_of();
        assert_eq!(name.to_string(), "int[][]");
        assert_eq!(TypeName::parse("int[][]").unwrap(), name);

        let wrapped = TypeName::parse("Integer[]").unwrap();
        assert_eq!(wrapped, TypeName::builtin(Tag::IntObject).array_of());
        assert_eq!(wrapped.primitive_tag(), None);

        assert_eq!(
            TypeName::parse("Point").unwrap(),
            TypeName::named(Tag::Object, "Point")
        );
        assert_eq!(TypeName::parse("Object").unwrap(), TypeName::default());
        assert!(TypeName::parse("[]").is_err());
    }

    #[test]
    fn primitive_components() {
        assert_eq!(TypeName::builtin(Tag::Char).primitive_tag(), Some(Tag::Char));
        assert_eq!(TypeName::builtin(Tag::Char).array_of().primitive_tag(), None);
        assert_eq!(TypeName::builtin(Tag::String).primitive_tag(), None);
    }
}
