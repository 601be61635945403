//! Error types for this crate.

/// Error kinds that can terminate a parse outright.
///
/// Most malformed-input conditions are *not* represented here: per the
/// propagation policy, a single bad element is recovered locally (default
/// value, list coercion, `skipped` marker) and reported through [`log`]
/// instead of aborting the whole document. Only conditions from which there
/// is no sane local recovery reach this enum.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error from the underlying byte source.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Neither an `EBML` nor a `Segment` magic sequence could be found.
    #[error("not a Matroska/EBML file: no EBML or Segment element found")]
    NotAMatroskaFile,

    /// A declared element size extends past the end of its parent (or the
    /// stream), and no resynchronization point could be found.
    #[error("truncated element at offset {offset}: declared size {size} exceeds bounds")]
    TruncatedElement {
        /// Byte offset of the element header.
        offset: u64,
        /// The declared payload size.
        size: u64,
    },

    /// A VINT's leading byte did not encode a valid length (no marker bit
    /// found in the first 8 bits, or a first byte of `0x00`). Distinct from
    /// [`Error::Io`]: callers scanning for the next element boundary treat
    /// this as a local, recoverable framing fault, not a dead stream.
    #[error("invalid VINT: leading byte 0x{byte:02X}")]
    InvalidVInt {
        /// The offending leading byte.
        byte: u8,
    },
}

/// Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
