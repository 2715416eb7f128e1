use crate::consts::{MAGIC, MAX_SHORT_STRING, SHORT_STRING_CACHE_MIN, VERSION};
use crate::descriptor::{BaseName, TypeName};
use crate::input::Source;
use crate::output::Sink;
use std::collections::HashMap;
use std::io::{self, Read, Write};
use yggdrasil_base::{Error, Primitive, Result, Tag};

/// Marks a repeated short string, followed by its index in the cache.
const SHORT_STRING_REFERENCE: u8 = 0xFF;

/// Default big-endian wire format.
pub struct BinarySink<W: Write> {
    out: W,
    short_strings: HashMap<String, u32>,
}

impl<W: Write> BinarySink<W> {
    pub fn new(mut out: W) -> Result<Self> {
        out.write_all(&MAGIC.to_be_bytes())?;
        out.write_all(&VERSION.to_be_bytes())?;
        Ok(BinarySink {
            out,
            short_strings: HashMap::new(),
        })
    }

    fn write_u8(&mut self, v: u8) -> Result<()> {
        self.out.write_all(&[v])?;
        Ok(())
    }

    fn write_u32(&mut self, v: u32) -> Result<()> {
        self.out.write_all(&v.to_be_bytes())?;
        Ok(())
    }

    fn write_tag(&mut self, tag: Tag) -> Result<()> {
        self.write_u8(tag.code())
    }

    fn write_value(&mut self, value: Primitive) -> Result<()> {
        match value {
            Primitive::Byte(v) => self.out.write_all(&v.to_be_bytes())?,
            Primitive::Short(v) => self.out.write_all(&v.to_be_bytes())?,
            Primitive::Int(v) => self.out.write_all(&v.to_be_bytes())?,
            Primitive::Long(v) => self.out.write_all(&v.to_be_bytes())?,
            Primitive::Float(v) => self.out.write_all(&v.to_bits().to_be_bytes())?,
            Primitive::Double(v) => self.out.write_all(&v.to_bits().to_be_bytes())?,
            Primitive::Char(c) => {
                let unit = u16::try_from(c as u32).map_err(|_| {
                    Error::NotSerializable(format!(
                        "char U+{:X} does not fit in one UTF-16 unit",
                        c as u32
                    ))
                })?;
                self.out.write_all(&unit.to_be_bytes())?
            }
            Primitive::Boolean(v) => self.out.write_all(&[v as u8])?,
        }
        Ok(())
    }

    fn write_short_string(&mut self, s: &str) -> Result<()> {
        if let Some(&index) = self.short_strings.get(s) {
            self.write_u8(SHORT_STRING_REFERENCE)?;
            return self.write_u32(index);
        }
        let bytes = s.as_bytes();
        if bytes.len() > MAX_SHORT_STRING {
            return Err(Error::Configuration(format!(
                "'{s}' is longer than {MAX_SHORT_STRING} bytes"
            )));
        }
        self.write_u8(bytes.len() as u8)?;
        self.out.write_all(bytes)?;
        if bytes.len() > SHORT_STRING_CACHE_MIN {
            let index = self.short_strings.len() as u32;
            self.short_strings.insert(s.to_string(), index);
        }
        Ok(())
    }

    fn write_descriptor(&mut self, ty: &TypeName) -> Result<()> {
        for _ in 0..ty.dimensions {
            self.write_tag(Tag::Array)?;
        }
        match &ty.base {
            BaseName::Builtin(tag) => self.write_tag(*tag),
            BaseName::Named(tag, id) => {
                self.write_tag(*tag)?;
                self.write_short_string(id)
            }
        }
    }
}

impl<W: Write> Sink for BinarySink<W> {
    type Inner = W;

    fn write_null(&mut self) -> Result<()> {
        self.write_tag(Tag::Null)
    }

    fn write_primitive(&mut self, value: Primitive) -> Result<()> {
        self.write_tag(value.tag())?;
        self.write_value(value)
    }

    fn write_wrapped_primitive(&mut self, value: Primitive) -> Result<()> {
        self.write_tag(value.tag().wrapper())?;
        self.write_value(value)
    }

    fn write_array_element(&mut self, value: Primitive) -> Result<()> {
        self.write_value(value)
    }

    fn write_string(&mut self, value: &str) -> Result<()> {
        let len = u32::try_from(value.len())
            .map_err(|_| Error::NotSerializable("string longer than 4 GiB".into()))?;
        self.write_tag(Tag::String)?;
        self.write_u32(len)?;
        self.out.write_all(value.as_bytes())?;
        Ok(())
    }

    fn write_array_start(&mut self, component: &TypeName, len: usize) -> Result<()> {
        let len = u32::try_from(len)
            .map_err(|_| Error::NotSerializable(format!("array of {len} elements")))?;
        self.write_tag(Tag::Array)?;
        self.write_descriptor(component)?;
        self.write_u32(len)
    }

    fn write_array_end(&mut self) -> Result<()> {
        Ok(())
    }

    fn write_enum(&mut self, type_id: &str, name: &str) -> Result<()> {
        self.write_tag(Tag::Enum)?;
        self.write_short_string(type_id)?;
        self.write_short_string(name)
    }

    fn write_class(&mut self, ty: &TypeName) -> Result<()> {
        self.write_tag(Tag::Class)?;
        self.write_descriptor(ty)
    }

    fn write_reference(&mut self, ordinal: u32) -> Result<()> {
        self.write_tag(Tag::Reference)?;
        self.write_u32(ordinal)
    }

    fn write_object_start(&mut self, type_id: &str, num_fields: u16) -> Result<()> {
        self.write_tag(Tag::Object)?;
        self.write_short_string(type_id)?;
        self.out.write_all(&num_fields.to_be_bytes())?;
        Ok(())
    }

    fn write_field_name(&mut self, name: &str) -> Result<()> {
        self.write_short_string(name)
    }

    fn write_object_end(&mut self) -> Result<()> {
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }

    fn finish(self) -> Result<W> {
        Ok(self.out)
    }
}

pub struct BinarySource<R: Read> {
    input: R,
    short_strings: Vec<String>,
}

impl<R: Read> BinarySource<R> {
    pub fn new(mut input: R) -> Result<Self> {
        let mut magic = [0u8; 4];
        input.read_exact(&mut magic)?;
        if u32::from_be_bytes(magic) != MAGIC {
            return Err(Error::StreamCorrupted(format!(
                "not a yggdrasil stream (magic {:08x})",
                u32::from_be_bytes(magic)
            )));
        }
        let mut version = [0u8; 2];
        input.read_exact(&mut version)?;
        let version = u16::from_be_bytes(version);
        if version != VERSION {
            return Err(Error::StreamCorrupted(format!(
                "unsupported version {version}"
            )));
        }
        Ok(BinarySource {
            input,
            short_strings: Vec::new(),
        })
    }

    fn read_bytes<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.input.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bytes::<1>()?[0])
    }

    fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.read_bytes()?))
    }

    fn read_value(&mut self, tag: Tag) -> Result<Primitive> {
        Ok(match tag {
            Tag::Byte => Primitive::Byte(i8::from_be_bytes(self.read_bytes()?)),
            Tag::Short => Primitive::Short(i16::from_be_bytes(self.read_bytes()?)),
            Tag::Int => Primitive::Int(i32::from_be_bytes(self.read_bytes()?)),
            Tag::Long => Primitive::Long(i64::from_be_bytes(self.read_bytes()?)),
            Tag::Float => Primitive::Float(f32::from_bits(u32::from_be_bytes(self.read_bytes()?))),
            Tag::Double => {
                Primitive::Double(f64::from_bits(u64::from_be_bytes(self.read_bytes()?)))
            }
            Tag::Char => {
                let unit = u16::from_be_bytes(self.read_bytes()?);
                let c = char::from_u32(unit as u32).ok_or_else(|| {
                    Error::StreamCorrupted(format!("unpaired surrogate 0x{unit:04x}"))
                })?;
                Primitive::Char(c)
            }
            Tag::Boolean => match self.read_u8()? {
                0 => Primitive::Boolean(false),
                1 => Primitive::Boolean(true),
                other => {
                    return Err(Error::StreamCorrupted(format!(
                        "invalid boolean {other}"
                    )))
                }
            },
            other => {
                return Err(Error::StreamCorrupted(format!(
                    "{other:?} is not a primitive"
                )))
            }
        })
    }

    fn read_utf8(&mut self, len: usize) -> Result<String> {
        let mut buf = Vec::new();
        (&mut self.input).take(len as u64).read_to_end(&mut buf)?;
        if buf.len() != len {
            return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
        }
        String::from_utf8(buf).map_err(|e| Error::StreamCorrupted(format!("{e}")))
    }

    fn read_short_string(&mut self) -> Result<String> {
        let len = self.read_u8()?;
        if len == SHORT_STRING_REFERENCE {
            let index = self.read_u32()?;
            return self
                .short_strings
                .get(index as usize)
                .cloned()
                .ok_or_else(|| {
                    Error::StreamCorrupted(format!("unknown short string #{index}"))
                });
        }
        let s = self.read_utf8(len as usize)?;
        if s.len() > SHORT_STRING_CACHE_MIN {
            self.short_strings.push(s.clone());
        }
        Ok(s)
    }

    fn read_descriptor(&mut self) -> Result<TypeName> {
        let mut dimensions = 0;
        loop {
            let tag = Tag::by_code(self.read_u8()?)?;
            let base = match tag {
                Tag::Array => {
                    dimensions += 1;
                    continue;
                }
                Tag::Object | Tag::Enum => BaseName::Named(tag, self.read_short_string()?),
                Tag::String | Tag::Class => BaseName::Builtin(tag),
                tag if tag.is_primitive() || tag.is_wrapper() => BaseName::Builtin(tag),
                other => {
                    return Err(Error::StreamCorrupted(format!(
                        "{other:?} in a type descriptor"
                    )))
                }
            };
            return Ok(TypeName { dimensions, base });
        }
    }
}

impl<R: Read> Source for BinarySource<R> {
    type Inner = R;

    fn read_tag(&mut self) -> Result<Tag> {
        Tag::by_code(self.read_u8()?)
    }

    fn read_primitive(&mut self, tag: Tag) -> Result<Primitive> {
        self.read_value(tag)
    }

    fn read_array_element(&mut self, tag: Tag) -> Result<Primitive> {
        self.read_value(tag)
    }

    fn read_string(&mut self) -> Result<String> {
        let len = self.read_u32()?;
        self.read_utf8(len as usize)
    }

    fn read_array_start(&mut self) -> Result<(TypeName, usize)> {
        let component = self.read_descriptor()?;
        let len = self.read_u32()?;
        Ok((component, len as usize))
    }

    fn read_array_end(&mut self) -> Result<()> {
        Ok(())
    }

    fn read_enum(&mut self) -> Result<(String, String)> {
        let id = self.read_short_string()?;
        let name = self.read_short_string()?;
        Ok((id, name))
    }

    fn read_class(&mut self) -> Result<TypeName> {
        self.read_descriptor()
    }

    fn read_reference(&mut self) -> Result<u32> {
        self.read_u32()
    }

    fn read_object_start(&mut self) -> Result<(String, u16)> {
        let id = self.read_short_string()?;
        let num_fields = u16::from_be_bytes(self.read_bytes()?);
        if num_fields > i16::MAX as u16 {
            return Err(Error::StreamCorrupted(format!(
                "negative field count for '{id}'"
            )));
        }
        Ok((id, num_fields))
    }

    fn read_field_name(&mut self) -> Result<String> {
        self.read_short_string()
    }

    fn read_object_end(&mut self) -> Result<()> {
        Ok(())
    }

    fn finish(self) -> Result<R> {
        Ok(self.input)
    }
}
