//! FBOM wire format constants and structures.

/// Magic bytes at the start of a stream.
pub const FBOM_MAGIC: &[u8; 4] = b"FBOM";

/// Size of the stream header in bytes.
pub const HEADER_SIZE: usize = 16;

/// Offset of the endianness marker in the header.
pub const ENDIAN_OFFSET: usize = 4;

/// Offset of the format version in the header.
pub const VERSION_OFFSET: usize = 6;

/// Current format version.
pub const CURRENT_VERSION: u16 = 1;

/// Endianness marker: stream primitives are little-endian.
pub const ENDIAN_LITTLE: u8 = 0x01;

/// Endianness marker: stream primitives are big-endian.
pub const ENDIAN_BIG: u8 = 0x02;

// === Command bytes (token stream) ===

pub const CMD_NONE: u8 = 0x00;
pub const CMD_STATIC_DATA_START: u8 = 0x01;
pub const CMD_STATIC_DATA_END: u8 = 0x02;
pub const CMD_OBJECT_START: u8 = 0x03;
pub const CMD_OBJECT_END: u8 = 0x04;
pub const CMD_OBJECT_LIBRARY_START: u8 = 0x05;
pub const CMD_OBJECT_LIBRARY_END: u8 = 0x06;

// === Attribute bits (one byte per element) ===

/// Element body is replaced by a u32 static-data index.
pub const ATTR_STATIC_REF: u8 = 1 << 0;

/// Object body is replaced by a resolved {library id, index} link.
pub const ATTR_EXT_REF: u8 = 1 << 1;

/// Object is flagged external but its library location is not yet
/// assigned; the body is inline pending a later patching pass.
pub const ATTR_EXT_REF_PLACEHOLDER: u8 = 1 << 2;

pub const ATTR_ALL: u8 = ATTR_STATIC_REF | ATTR_EXT_REF | ATTR_EXT_REF_PLACEHOLDER;

// === Data payload kinds ===

pub const PAYLOAD_BYTES: u8 = 0;
pub const PAYLOAD_OBJECT: u8 = 1;
pub const PAYLOAD_ARRAY: u8 = 2;

// === Static data entry kinds ===

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[repr(u8)]
pub enum StaticDataKind {
    None = 0,
    Object = 1,
    Type = 2,
    Data = 3,
    Array = 4,
}

impl StaticDataKind {
    pub const fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::None),
            1 => Some(Self::Object),
            2 => Some(Self::Type),
            3 => Some(Self::Data),
            4 => Some(Self::Array),
            _ => None,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Object => "object",
            Self::Type => "type",
            Self::Data => "data",
            Self::Array => "array",
        }
    }
}

/// One slot in the static-data directory: enough to random-access the
/// entry's blob bytes without a linear scan.
#[derive(Clone, Copy, Debug)]
pub struct StaticDirEntry {
    pub kind: StaticDataKind,
    /// Byte offset of the entry within the blob.
    pub offset: u32,
    /// Byte length of the entry within the blob.
    pub size: u32,
}
