use crate::value::{Type, Value};
use crate::{Error, Result};

/// Discriminator written in front of every node of a stream.
///
/// Wrapper tags (the boxed forms) are always the matching primitive code plus `0x10`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Tag {
    Null,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    Char,
    Boolean,
    ByteObject,
    ShortObject,
    IntObject,
    LongObject,
    FloatObject,
    DoubleObject,
    CharObject,
    BooleanObject,
    String,
    Array,
    Enum,
    Class,
    Object,
    Reference,
}

const ALL: [Tag; 23] = [
    Tag::Null,
    Tag::Byte,
    Tag::Short,
    Tag::Int,
    Tag::Long,
    Tag::Float,
    Tag::Double,
    Tag::Char,
    Tag::Boolean,
    Tag::ByteObject,
    Tag::ShortObject,
    Tag::IntObject,
    Tag::LongObject,
    Tag::FloatObject,
    Tag::DoubleObject,
    Tag::CharObject,
    Tag::BooleanObject,
    Tag::String,
    Tag::Array,
    Tag::Enum,
    Tag::Class,
    Tag::Object,
    Tag::Reference,
];

impl Tag {
    pub const fn code(self) -> u8 {
        match self {
            Tag::Null => 0x00,
            Tag::Byte => 0x01,
            Tag::Short => 0x02,
            Tag::Int => 0x03,
            Tag::Long => 0x04,
            Tag::Float => 0x08,
            Tag::Double => 0x09,
            Tag::Char => 0x0e,
            Tag::Boolean => 0x0f,
            Tag::ByteObject => 0x11,
            Tag::ShortObject => 0x12,
            Tag::IntObject => 0x13,
            Tag::LongObject => 0x14,
            Tag::FloatObject => 0x18,
            Tag::DoubleObject => 0x19,
            Tag::CharObject => 0x1e,
            Tag::BooleanObject => 0x1f,
            Tag::String => 0x20,
            Tag::Array => 0x30,
            Tag::Enum => 0x40,
            Tag::Class => 0x41,
            Tag::Object => 0x80,
            Tag::Reference => 0xff,
        }
    }

    /// Name used for XML elements and builtin type names.
    pub const fn name(self) -> &'static str {
        match self {
            Tag::Null => "null",
            Tag::Byte => "byte",
            Tag::Short => "short",
            Tag::Int => "int",
            Tag::Long => "long",
            Tag::Float => "float",
            Tag::Double => "double",
            Tag::Char => "char",
            Tag::Boolean => "boolean",
            Tag::ByteObject => "Byte",
            Tag::ShortObject => "Short",
            Tag::IntObject => "Integer",
            Tag::LongObject => "Long",
            Tag::FloatObject => "Float",
            Tag::DoubleObject => "Double",
            Tag::CharObject => "Character",
            Tag::BooleanObject => "Boolean",
            Tag::String => "string",
            Tag::Array => "array",
            Tag::Enum => "enum",
            Tag::Class => "class",
            Tag::Object => "object",
            Tag::Reference => "reference",
        }
    }

    pub fn by_code(code: u8) -> Result<Tag> {
        ALL.iter()
            .copied()
            .find(|t| t.code() == code)
            .ok_or_else(|| Error::StreamCorrupted(format!("invalid tag 0x{code:02x}")))
    }

    pub fn by_name(name: &str) -> Result<Tag> {
        ALL.iter()
            .copied()
            .find(|t| t.name() == name)
            .ok_or_else(|| Error::StreamCorrupted(format!("invalid tag '{name}'")))
    }

    pub const fn is_primitive(self) -> bool {
        matches!(
            self,
            Tag::Byte
                | Tag::Short
                | Tag::Int
                | Tag::Long
                | Tag::Float
                | Tag::Double
                | Tag::Char
                | Tag::Boolean
        )
    }

    pub const fn is_wrapper(self) -> bool {
        matches!(
            self,
            Tag::ByteObject
                | Tag::ShortObject
                | Tag::IntObject
                | Tag::LongObject
                | Tag::FloatObject
                | Tag::DoubleObject
                | Tag::CharObject
                | Tag::BooleanObject
        )
    }

    /// Primitive tag boxed by this wrapper tag.
    ///
    /// # Panics
    /// If `self` is not a wrapper tag.
    pub fn primitive(self) -> Tag {
        assert!(self.is_wrapper(), "{self:?} is not a wrapper tag");
        let code = self.code() - 0x10;
        ALL.iter()
            .copied()
            .find(|t| t.code() == code)
            .unwrap_or(Tag::Null)
    }

    /// Wrapper tag boxing this primitive tag.
    ///
    /// # Panics
    /// If `self` is not a primitive tag.
    pub fn wrapper(self) -> Tag {
        assert!(self.is_primitive(), "{self:?} is not a primitive tag");
        let code = self.code() + 0x10;
        ALL.iter()
            .copied()
            .find(|t| t.code() == code)
            .unwrap_or(Tag::Null)
    }

    /// Tag of the node a value is written as. Primitive values only ever appear boxed here.
    pub fn of(value: &Value) -> Tag {
        match value {
            Value::Null => Tag::Null,
            Value::Boxed(p) => p.tag().wrapper(),
            Value::String(_) => Tag::String,
            Value::Array(_) => Tag::Array,
            Value::Enum(_) => Tag::Enum,
            Value::Class(_) => Tag::Class,
            Value::Object(_) => Tag::Object,
        }
    }

    pub fn of_type(ty: &Type) -> Tag {
        match ty {
            Type::Primitive(t) | Type::Wrapper(t) => *t,
            Type::String => Tag::String,
            Type::Class => Tag::Class,
            Type::Object => Tag::Object,
            Type::Named(class) if class.is_enum() => Tag::Enum,
            Type::Named(_) => Tag::Object,
            Type::Array(_) => Tag::Array,
        }
    }
}
