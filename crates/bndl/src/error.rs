//! Error types for bundle parsing and writing.

use thiserror::Error;

use crate::types::Platform;

/// Result type alias for bundle operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`].
///
/// Every error falls into one of four buckets: the file is structurally
/// broken, a payload failed to decompress, the OS or compressor failed,
/// or the API was used incorrectly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Magic, revision, platform word, or a structural sanity check failed.
    InvalidFormat,
    /// A stored payload failed to decompress or decompressed to the wrong size.
    CorruptPayload,
    /// File or compression I/O failed.
    Io,
    /// Invalid use of the API.
    Logic,
}

/// Error types for bundle operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error during reading, writing, or compression.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file starts with neither `bndl` nor `bnd2`.
    #[error("unknown archive magic: {0:02x?}")]
    InvalidMagic([u8; 4]),

    /// The revision word is outside the range the format version supports.
    #[error("unsupported bundle revision {0}")]
    UnsupportedRevision(u32),

    /// The platform word matches no known platform.
    #[error("unknown platform word 0x{0:08x}")]
    UnknownPlatform(u32),

    /// No platform word was found at any of the candidate header offsets.
    #[error("no platform word found in legacy bundle header")]
    PlatformNotDetected,

    /// The literal platform word disagrees with the detected platform.
    #[error("platform word mismatch: header has 0x{header:08x}, layout implies 0x{detected:08x}")]
    PlatformMismatch { header: u32, detected: u32 },

    /// Data ended before a read completed.
    #[error("unexpected end of data at offset {0}")]
    UnexpectedEof(usize),

    /// A structural sanity check failed while parsing a section.
    #[error("malformed {section} at offset {offset}")]
    Malformed { section: &'static str, offset: usize },

    /// A compressed block payload failed to inflate.
    #[error("resource 0x{id:08x} block {block} failed to decompress: {source}")]
    Decompress {
        id: u32,
        block: usize,
        source: std::io::Error,
    },

    /// A compressed block inflated to a different size than recorded.
    #[error("resource 0x{id:08x} block {block} decompressed to {actual} bytes, expected {expected}")]
    DecompressedSizeMismatch {
        id: u32,
        block: usize,
        expected: u32,
        actual: usize,
    },

    /// Attempt to add a resource under an ID that is already taken.
    #[error("resource 0x{0:08x} already exists")]
    DuplicateResource(u32),

    /// Attempt to replace a resource that does not exist.
    #[error("resource 0x{0:08x} not found")]
    MissingResource(u32),

    /// Attempt to add a debug-name entry for an ID that already has one.
    #[error("debug info for resource 0x{0:08x} already exists")]
    DuplicateDebugInfo(u32),

    /// Resource ID 0 is reserved as the empty-slot marker in ID tables.
    #[error("resource id 0 is reserved")]
    ZeroResourceId,

    /// Dependency lists are stored with a 16-bit count.
    #[error("{0} dependencies exceed the 16-bit record limit")]
    TooManyDependencies(usize),

    /// Block alignments are stored as a 4-bit log2.
    #[error("block alignment {0} is not a representable power of two")]
    BadAlignment(u32),

    /// A block payload larger than the 28-bit size field allows.
    #[error("block payload of {0} bytes exceeds the size field")]
    BlockTooLarge(usize),

    /// Legacy bundles gained compression support in revision 4.
    #[error("compressed legacy bundles require revision 4 or later")]
    CompressionUnsupported,

    /// Modern bundles are only written for the PC platform.
    #[error("writing bnd2 bundles is not supported for {0:?}")]
    UnsupportedWritePlatform(Platform),
}

impl Error {
    /// Classify this error into the four-way taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(_) => ErrorKind::Io,
            Error::InvalidMagic(_)
            | Error::UnsupportedRevision(_)
            | Error::UnknownPlatform(_)
            | Error::PlatformNotDetected
            | Error::PlatformMismatch { .. }
            | Error::UnexpectedEof(_)
            | Error::Malformed { .. } => ErrorKind::InvalidFormat,
            Error::Decompress { .. } | Error::DecompressedSizeMismatch { .. } => {
                ErrorKind::CorruptPayload
            }
            Error::DuplicateResource(_)
            | Error::MissingResource(_)
            | Error::DuplicateDebugInfo(_)
            | Error::ZeroResourceId
            | Error::TooManyDependencies(_)
            | Error::BadAlignment(_)
            | Error::BlockTooLarge(_)
            | Error::CompressionUnsupported
            | Error::UnsupportedWritePlatform(_) => ErrorKind::Logic,
        }
    }
}
