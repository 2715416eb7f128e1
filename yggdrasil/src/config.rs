use ron::ser::PrettyConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use yggdrasil_base::{Error, Result};

/// How the XML writer spells tagged primitives. The reader accepts both.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrimitiveStyle {
    #[default]
    Decimal,
    /// `0x` followed by the fixed-width hex bit pattern.
    Hex,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub xml_primitives: PrimitiveStyle,
    /// Pretty-print XML with this many spaces per level.
    pub xml_indent: Option<usize>,
    /// Old wire id to current wire id, applied before resolving on read.
    pub type_aliases: HashMap<String, String>,
}

impl Config {
    pub fn from_ron_str(s: &str) -> Result<Config> {
        ron::de::from_str(s).map_err(|e| Error::Config(format!("{e:?}")))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Config> {
        let s = std::fs::read_to_string(path)?;
        Self::from_ron_str(&s)
    }

    pub fn to_ron_string_pretty(&self) -> Result<String> {
        ron::ser::to_string_pretty(self, PrettyConfig::default())
            .map_err(|e| Error::Config(format!("{e:?}")))
    }
}
