mod binary;
pub mod config;
pub mod consts;
pub mod descriptor;
mod input;
mod output;
pub mod registry;
mod shape;
mod xml;

pub use binary::{BinarySink, BinarySource};
pub use config::{Config, PrimitiveStyle};
pub use descriptor::{BaseName, TypeName};
pub use input::{InputStream, Source};
pub use output::{OutputStream, Sink};
pub use registry::{Registry, Yggdrasil};
pub use shape::ShapeConverter;
pub use xml::{XmlSink, XmlSource};

pub use yggdrasil_base::*;
pub use yggdrasil_derive::Yggdrasil;
