//! Error types for read and write operations.
use thiserror::Error;

/// A read requested more bytes than the source had left.
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
#[error("unexpected end of data, needed {expected} bytes but only {actual} were available")]
pub struct Truncated {
    pub expected: usize,
    pub actual: usize,
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error(transparent)]
    Truncated(#[from] Truncated),

    #[error("error reading data")]
    Io(#[from] std::io::Error),

    #[error("error reading data")]
    Binrw(#[from] binrw::Error),

    #[error("unsupported color resolution {0}, expected 4 or 8 bits per pixel")]
    UnsupportedBitDepth(u8),

    #[error("palette index {index} out of range for a palette of {palette_size} entries")]
    PaletteIndex { index: u8, palette_size: usize },
}

#[derive(Debug, Error)]
pub enum CreateGbmError {
    #[error("error writing image data")]
    Io(#[from] std::io::Error),

    #[error("error writing image data")]
    Binrw(#[from] binrw::Error),

    #[error("image quantises to {colors} colors but at most {max} fit in the palette, reduce the color count")]
    PaletteOverflow { colors: usize, max: usize },

    #[error("color resolution must be 4 or 8 bits per pixel, got {0}")]
    UnsupportedBitDepth(u8),

    #[error("image of {width}x{height} pixels does not fit in 16-bit dimensions")]
    ImageTooLarge { width: u32, height: u32 },
}

/// Errors from reading records against a schema or writing their documents
/// back out.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error(transparent)]
    Truncated(#[from] Truncated),

    #[error("error reading or writing record data")]
    Io(#[from] std::io::Error),

    #[error("field {0:?} missing from document")]
    MissingField(String),

    #[error("expected a JSON {expected}")]
    UnexpectedType { expected: &'static str },

    #[error("integer {value} does not fit in a {bits}-bit field")]
    IntRange { value: i64, bits: u8 },

    #[error("expected {expected} bytes, document has {actual}")]
    ByteCount { expected: usize, actual: usize },

    #[error("string of {0} encoded bytes does not fit behind a one-byte length prefix")]
    StringTooLong(usize),

    #[error("{count} elements do not fit in a {bits}-bit element count")]
    CountOverflow { count: usize, bits: u8 },

    #[error("element of {len} bytes does not fit in a {bits}-bit length prefix")]
    LengthOverflow { len: usize, bits: u8 },
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error(transparent)]
    Truncated(#[from] Truncated),

    #[error("error reading or writing archive data")]
    Io(#[from] std::io::Error),

    #[error("error reading archive data")]
    Binrw(#[from] binrw::Error),

    #[error("archive has no manifest entry")]
    MissingManifest,

    #[error("manifest path {path:?} (hash {hash:#010x}) has no matching archive entry")]
    ManifestMismatch { path: String, hash: u32 },

    #[error("{count} archive entries are not listed in the manifest")]
    NotInManifest { count: usize },

    #[error("paths {path:?} and {other:?} collide on hash {hash:#010x}")]
    HashCollision { path: String, other: String, hash: u32 },

    #[error("path {0:?} contains non-ASCII characters")]
    NonAsciiPath(String),

    #[error("file {path:?} of {size} bytes does not fit in a 32-bit entry size")]
    FileTooLarge { path: String, size: u64 },
}

/// Failure while converting one target file, with the path for context.
#[derive(Debug, Error)]
#[error("error processing {path}")]
pub struct ProcessFileError {
    pub path: String,
    #[source]
    pub source: ProcessError,
}

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("error reading or writing converted files")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    CreateGbm(#[from] CreateGbmError),

    #[error("error reading or writing a JSON document")]
    Json(#[from] serde_json::Error),

    #[error("error reading or writing a PNG image")]
    Image(#[from] image::ImageError),

    #[error("target {0:?} does not name an item group")]
    UnknownItemGroup(String),
}

impl From<Truncated> for ProcessError {
    fn from(t: Truncated) -> Self {
        ProcessError::Decode(t.into())
    }
}
