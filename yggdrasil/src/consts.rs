/// "Ygg\0"
pub const MAGIC: u32 = 0x5967_6700;
pub const VERSION: u16 = 1;

/// The binary field count is a signed 16-bit value on the wire.
pub const MAX_FIELDS: usize = i16::MAX as usize;

/// Short strings of at most this many bytes are written out every time.
pub const SHORT_STRING_CACHE_MIN: usize = 4;
/// `0xFF` marks a cached short string.
pub const MAX_SHORT_STRING: usize = 0xFE;

/// Wire id of the universal object type.
pub const OBJECT_ID: &str = "Object";

pub const XML_ROOT: &str = "yggdrasil";
