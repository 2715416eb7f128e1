use crate::config::PrimitiveStyle;
use crate::consts::{VERSION, XML_ROOT};
use crate::descriptor::TypeName;
use crate::input::Source;
use crate::output::Sink;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::collections::HashMap;
use std::fmt;
use std::io::{self, BufRead, Write};
use yggdrasil_base::{Error, Primitive, Result, Tag};

fn write_err(e: impl fmt::Display) -> Error {
    Error::Io(io::Error::new(io::ErrorKind::Other, e.to_string()))
}

fn read_err(e: impl fmt::Display) -> Error {
    Error::StreamCorrupted(format!("xml: {e}"))
}

fn bmp(c: char) -> Result<u16> {
    u16::try_from(c as u32).map_err(|_| {
        Error::NotSerializable(format!(
            "char U+{:X} does not fit in one UTF-16 unit",
            c as u32
        ))
    })
}

fn hex_width(tag: Tag) -> usize {
    match tag {
        Tag::Byte => 2,
        Tag::Short | Tag::Char => 4,
        Tag::Int | Tag::Float => 8,
        Tag::Long | Tag::Double => 16,
        _ => 1,
    }
}

/// Fixed-width upper-case hex of the bit pattern.
fn to_hex(value: Primitive) -> Result<String> {
    Ok(match value {
        Primitive::Byte(v) => format!("{:02X}", v as u8),
        Primitive::Short(v) => format!("{:04X}", v as u16),
        Primitive::Int(v) => format!("{:08X}", v as u32),
        Primitive::Long(v) => format!("{:016X}", v as u64),
        Primitive::Float(v) => format!("{:08X}", v.to_bits()),
        Primitive::Double(v) => format!("{:016X}", v.to_bits()),
        Primitive::Char(c) => format!("{:04X}", bmp(c)?),
        Primitive::Boolean(v) => (if v { "1" } else { "0" }).to_string(),
    })
}

fn to_decimal(value: Primitive) -> Result<String> {
    Ok(match value {
        Primitive::Byte(v) => v.to_string(),
        Primitive::Short(v) => v.to_string(),
        Primitive::Int(v) => v.to_string(),
        Primitive::Long(v) => v.to_string(),
        Primitive::Float(v) => v.to_string(),
        Primitive::Double(v) => v.to_string(),
        Primitive::Char(c) => bmp(c)?.to_string(),
        Primitive::Boolean(v) => v.to_string(),
    })
}

fn from_hex(tag: Tag, digits: &str) -> Result<Primitive> {
    let corrupt = || Error::StreamCorrupted(format!("invalid {} '{digits}'", tag.name()));
    if digits.len() != hex_width(tag) {
        return Err(corrupt());
    }
    let bits = u64::from_str_radix(digits, 16).map_err(|_| corrupt())?;
    Ok(match tag {
        Tag::Byte => Primitive::Byte(bits as u8 as i8),
        Tag::Short => Primitive::Short(bits as u16 as i16),
        Tag::Int => Primitive::Int(bits as u32 as i32),
        Tag::Long => Primitive::Long(bits as i64),
        Tag::Float => Primitive::Float(f32::from_bits(bits as u32)),
        Tag::Double => Primitive::Double(f64::from_bits(bits)),
        Tag::Char => Primitive::Char(char::from_u32(bits as u32).ok_or_else(corrupt)?),
        Tag::Boolean => match bits {
            0 => Primitive::Boolean(false),
            1 => Primitive::Boolean(true),
            _ => return Err(corrupt()),
        },
        _ => return Err(corrupt()),
    })
}

/// Decimal, or `0x` followed by fixed-width hex.
fn parse_primitive(tag: Tag, text: &str) -> Result<Primitive> {
    if let Some(digits) = text.strip_prefix("0x") {
        return from_hex(tag, digits);
    }
    let corrupt = |()| Error::StreamCorrupted(format!("invalid {} '{text}'", tag.name()));
    Ok(match tag {
        Tag::Byte => Primitive::Byte(text.parse().map_err(|_| corrupt(()))?),
        Tag::Short => Primitive::Short(text.parse().map_err(|_| corrupt(()))?),
        Tag::Int => Primitive::Int(text.parse().map_err(|_| corrupt(()))?),
        Tag::Long => Primitive::Long(text.parse().map_err(|_| corrupt(()))?),
        Tag::Float => Primitive::Float(text.parse().map_err(|_| corrupt(()))?),
        Tag::Double => Primitive::Double(text.parse().map_err(|_| corrupt(()))?),
        Tag::Char => {
            let unit: u16 = text.parse().map_err(|_| corrupt(()))?;
            Primitive::Char(char::from_u32(unit as u32).ok_or_else(|| corrupt(()))?)
        }
        Tag::Boolean => match text {
            "true" | "1" => Primitive::Boolean(true),
            "false" | "0" => Primitive::Boolean(false),
            _ => return Err(corrupt(())),
        },
        _ => return Err(corrupt(())),
    })
}

/// XML rendition of the stream: one element per node, named by its tag.
pub struct XmlSink<W: Write> {
    writer: Writer<W>,
    style: PrimitiveStyle,
    field_name: Option<String>,
    /// Hex payload of every open array, `None` for arrays of objects.
    arrays: Vec<Option<String>>,
}

impl<W: Write> XmlSink<W> {
    pub fn new(out: W, style: PrimitiveStyle, indent: Option<usize>) -> Result<Self> {
        let writer = match indent {
            Some(n) => Writer::new_with_indent(out, b' ', n),
            None => Writer::new(out),
        };
        let mut sink = XmlSink {
            writer,
            style,
            field_name: None,
            arrays: Vec::new(),
        };
        sink.event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        let mut root = BytesStart::new(XML_ROOT);
        root.push_attribute(("version", VERSION.to_string().as_str()));
        sink.event(Event::Start(root))?;
        Ok(sink)
    }

    fn event(&mut self, event: Event<'_>) -> Result<()> {
        self.writer.write_event(event).map_err(write_err)
    }

    /// Start of the next value element, carrying the pending field name.
    fn start(&mut self, tag: Tag) -> BytesStart<'static> {
        let mut start = BytesStart::new(tag.name());
        if let Some(name) = self.field_name.take() {
            start.push_attribute(("name", name.as_str()));
        }
        start
    }

    fn text_element(&mut self, start: BytesStart<'_>, text: &str) -> Result<()> {
        let end = BytesEnd::new(String::from_utf8_lossy(start.name().as_ref()).into_owned());
        self.event(Event::Start(start))?;
        self.event(Event::Text(BytesText::new(text)))?;
        self.event(Event::End(end))
    }

    fn format(&self, value: Primitive) -> Result<String> {
        match self.style {
            PrimitiveStyle::Decimal => to_decimal(value),
            PrimitiveStyle::Hex => Ok(format!("0x{}", to_hex(value)?)),
        }
    }
}

impl<W: Write> Sink for XmlSink<W> {
    type Inner = W;

    fn write_null(&mut self) -> Result<()> {
        let start = self.start(Tag::Null);
        self.event(Event::Empty(start))
    }

    fn write_primitive(&mut self, value: Primitive) -> Result<()> {
        let text = self.format(value)?;
        let start = self.start(value.tag());
        self.text_element(start, &text)
    }

    fn write_wrapped_primitive(&mut self, value: Primitive) -> Result<()> {
        let text = self.format(value)?;
        let start = self.start(value.tag().wrapper());
        self.text_element(start, &text)
    }

    fn write_array_element(&mut self, value: Primitive) -> Result<()> {
        let hex = to_hex(value)?;
        match self.arrays.last_mut() {
            Some(Some(payload)) => {
                payload.push_str(&hex);
                Ok(())
            }
            _ => Err(Error::NotSerializable(
                "primitive element outside a primitive array".into(),
            )),
        }
    }

    fn write_string(&mut self, value: &str) -> Result<()> {
        let start = self.start(Tag::String);
        self.text_element(start, value)
    }

    fn write_array_start(&mut self, component: &TypeName, len: usize) -> Result<()> {
        let mut start = self.start(Tag::Array);
        start.push_attribute(("componentType", component.to_string().as_str()));
        start.push_attribute(("length", len.to_string().as_str()));
        self.event(Event::Start(start))?;
        let payload = component
            .primitive_tag()
            .map(|tag| String::with_capacity(len * hex_width(tag)));
        self.arrays.push(payload);
        Ok(())
    }

    fn write_array_end(&mut self) -> Result<()> {
        if let Some(Some(payload)) = self.arrays.pop() {
            self.event(Event::Text(BytesText::new(&payload)))?;
        }
        self.event(Event::End(BytesEnd::new(Tag::Array.name())))
    }

    fn write_enum(&mut self, type_id: &str, name: &str) -> Result<()> {
        let mut start = self.start(Tag::Enum);
        start.push_attribute(("type", type_id));
        self.text_element(start, name)
    }

    fn write_class(&mut self, ty: &TypeName) -> Result<()> {
        let start = self.start(Tag::Class);
        self.text_element(start, &ty.to_string())
    }

    fn write_reference(&mut self, ordinal: u32) -> Result<()> {
        let start = self.start(Tag::Reference);
        self.text_element(start, &ordinal.to_string())
    }

    fn write_object_start(&mut self, type_id: &str, num_fields: u16) -> Result<()> {
        let mut start = self.start(Tag::Object);
        start.push_attribute(("type", type_id));
        start.push_attribute(("numFields", num_fields.to_string().as_str()));
        self.event(Event::Start(start))
    }

    fn write_field_name(&mut self, name: &str) -> Result<()> {
        self.field_name = Some(name.to_string());
        Ok(())
    }

    fn write_object_end(&mut self) -> Result<()> {
        self.event(Event::End(BytesEnd::new(Tag::Object.name())))
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.get_mut().flush()?;
        Ok(())
    }

    fn finish(mut self) -> Result<W> {
        self.event(Event::End(BytesEnd::new(XML_ROOT)))?;
        self.flush()?;
        Ok(self.writer.into_inner())
    }
}

struct HexPayload {
    tag: Tag,
    digits: String,
    pos: usize,
}

pub struct XmlSource<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    /// Element whose `name` attribute was read ahead of its tag.
    pending: Option<BytesStart<'static>>,
    /// Attributes of the element being read.
    attrs: HashMap<String, String>,
    arrays: Vec<Option<HexPayload>>,
}

impl<R: BufRead> XmlSource<R> {
    pub fn new(input: R) -> Result<Self> {
        let mut reader = Reader::from_reader(input);
        reader.config_mut().expand_empty_elements = true;
        let mut source = XmlSource {
            reader,
            buf: Vec::new(),
            pending: None,
            attrs: HashMap::new(),
            arrays: Vec::new(),
        };
        let root = source.next_start()?;
        if root.name().as_ref() != XML_ROOT.as_bytes() {
            return Err(Error::StreamCorrupted("missing <yggdrasil> root".into()));
        }
        source.load_attrs(&root)?;
        let version = source.attr("version")?;
        if version != VERSION.to_string() {
            return Err(Error::StreamCorrupted(format!(
                "unsupported version {version}"
            )));
        }
        Ok(source)
    }

    fn next_event(&mut self) -> Result<Event<'static>> {
        self.buf.clear();
        let event = self.reader.read_event_into(&mut self.buf).map_err(read_err)?;
        Ok(event.into_owned())
    }

    fn next_start(&mut self) -> Result<BytesStart<'static>> {
        loop {
            match self.next_event()? {
                Event::Start(start) => return Ok(start),
                Event::Text(text) if text.iter().all(u8::is_ascii_whitespace) => {}
                Event::Comment(_) | Event::Decl(_) | Event::PI(_) | Event::DocType(_) => {}
                Event::Eof => return Err(Error::StreamCorrupted("unexpected end of xml".into())),
                other => {
                    return Err(Error::StreamCorrupted(format!(
                        "expected an element, found {other:?}"
                    )))
                }
            }
        }
    }

    fn expect_end(&mut self) -> Result<()> {
        loop {
            match self.next_event()? {
                Event::End(_) => return Ok(()),
                Event::Text(text) if text.iter().all(u8::is_ascii_whitespace) => {}
                Event::Comment(_) => {}
                other => {
                    return Err(Error::StreamCorrupted(format!(
                        "expected an end tag, found {other:?}"
                    )))
                }
            }
        }
    }

    /// Text content up to and including the end tag.
    fn read_text(&mut self) -> Result<String> {
        let mut text = String::new();
        loop {
            match self.next_event()? {
                Event::Text(t) => text.push_str(&t.unescape().map_err(read_err)?),
                Event::CData(c) => text.push_str(std::str::from_utf8(&c).map_err(read_err)?),
                Event::Comment(_) => {}
                Event::End(_) => return Ok(text),
                other => {
                    return Err(Error::StreamCorrupted(format!(
                        "expected text, found {other:?}"
                    )))
                }
            }
        }
    }

    /// Makes `start` the current element and returns its tag.
    fn enter(&mut self, start: &BytesStart<'_>) -> Result<Tag> {
        self.load_attrs(start)?;
        let qname = start.name();
        let name = std::str::from_utf8(qname.as_ref()).map_err(read_err)?;
        Tag::by_name(name)
    }

    fn load_attrs(&mut self, start: &BytesStart<'_>) -> Result<()> {
        self.attrs.clear();
        for attr in start.attributes() {
            let attr = attr.map_err(read_err)?;
            let key = std::str::from_utf8(attr.key.as_ref()).map_err(read_err)?;
            let value = attr.unescape_value().map_err(read_err)?;
            self.attrs.insert(key.to_string(), value.into_owned());
        }
        Ok(())
    }

    fn attr(&self, key: &str) -> Result<String> {
        self.attrs
            .get(key)
            .cloned()
            .ok_or_else(|| Error::StreamCorrupted(format!("missing attribute '{key}'")))
    }

    fn parsed_attr<T: std::str::FromStr>(&self, key: &str) -> Result<T> {
        let value = self.attr(key)?;
        value
            .trim()
            .parse()
            .map_err(|_| Error::StreamCorrupted(format!("invalid {key} '{value}'")))
    }
}

impl<R: BufRead> Source for XmlSource<R> {
    type Inner = R;

    fn read_tag(&mut self) -> Result<Tag> {
        let start = match self.pending.take() {
            Some(start) => start,
            None => self.next_start()?,
        };
        let tag = self.enter(&start)?;
        if tag == Tag::Null {
            self.expect_end()?;
        }
        Ok(tag)
    }

    fn read_primitive(&mut self, tag: Tag) -> Result<Primitive> {
        let text = self.read_text()?;
        parse_primitive(tag, text.trim())
    }

    fn read_array_element(&mut self, tag: Tag) -> Result<Primitive> {
        let Some(Some(payload)) = self.arrays.last_mut() else {
            return Err(Error::StreamCorrupted(
                "primitive element outside a primitive array".into(),
            ));
        };
        let width = hex_width(tag);
        let end = payload.pos + width;
        let digits = payload.digits.get(payload.pos..end).ok_or_else(|| {
            Error::StreamCorrupted(format!("{} array payload too short", payload.tag.name()))
        })?;
        let value = from_hex(tag, digits)?;
        payload.pos = end;
        Ok(value)
    }

    fn read_string(&mut self) -> Result<String> {
        self.read_text()
    }

    fn read_array_start(&mut self) -> Result<(TypeName, usize)> {
        let component = TypeName::parse(&self.attr("componentType")?)?;
        let len: usize = self.parsed_attr("length")?;
        let payload = match component.primitive_tag() {
            Some(tag) => {
                let digits: String = self
                    .read_text()?
                    .chars()
                    .filter(|c| !c.is_ascii_whitespace())
                    .collect();
                if digits.len() != len * hex_width(tag) {
                    return Err(Error::StreamCorrupted(format!(
                        "{} array of length {len} has {} hex digits",
                        tag.name(),
                        digits.len()
                    )));
                }
                Some(HexPayload {
                    tag,
                    digits,
                    pos: 0,
                })
            }
            None => None,
        };
        self.arrays.push(payload);
        Ok((component, len))
    }

    fn read_array_end(&mut self) -> Result<()> {
        match self.arrays.pop() {
            // The end tag was consumed together with the payload.
            Some(Some(_)) => Ok(()),
            Some(None) => self.expect_end(),
            None => Err(Error::StreamCorrupted("unbalanced array".into())),
        }
    }

    fn read_enum(&mut self) -> Result<(String, String)> {
        let id = self.attr("type")?;
        let name = self.read_text()?.trim().to_string();
        Ok((id, name))
    }

    fn read_class(&mut self) -> Result<TypeName> {
        TypeName::parse(&self.read_text()?)
    }

    fn read_reference(&mut self) -> Result<u32> {
        let text = self.read_text()?;
        text.trim()
            .parse()
            .map_err(|_| Error::StreamCorrupted(format!("invalid reference '{text}'")))
    }

    fn read_object_start(&mut self) -> Result<(String, u16)> {
        let id = self.attr("type")?;
        let num_fields: u16 = self.parsed_attr("numFields")?;
        Ok((id, num_fields))
    }

    fn read_field_name(&mut self) -> Result<String> {
        let start = self.next_start()?;
        let mut name = None;
        for attr in start.attributes() {
            let attr = attr.map_err(read_err)?;
            if attr.key.as_ref() == b"name" {
                name = Some(attr.unescape_value().map_err(read_err)?.into_owned());
            }
        }
        self.pending = Some(start);
        name.ok_or_else(|| Error::StreamCorrupted("field value without a name".into()))
    }

    fn read_object_end(&mut self) -> Result<()> {
        self.expect_end()
    }

    fn finish(mut self) -> Result<R> {
        self.expect_end()?;
        Ok(self.reader.into_inner())
    }
}
