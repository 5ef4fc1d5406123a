//! Centralized error handling for kcache.
//!
//! Every failure condition in the framing engine is represented as a
//! `Result` value; the library contains no panic paths (enforced through
//! `#![deny(clippy::panic)]` and `#![deny(clippy::unwrap_used)]`).
//!
//! ## Failure Taxonomy
//!
//! The engine never reports a partial or ambiguous success. A decode either
//! produces verified artifacts or one of these tagged outcomes:
//!
//! - **Bounds** ([`KcacheError::Bounds`]): an offset or length read from an
//!   untrusted header field would exceed the owning buffer. Always fatal —
//!   it means a corrupted container or a mismatched format assumption.
//! - **Header** ([`KcacheError::Header`]): the container signature or the
//!   compression marker did not match, or the header was truncated.
//! - **WrapperUnsupported** ([`KcacheError::WrapperUnsupported`]): a fat
//!   wrapper was present but none of its slices carried the expected
//!   compression marker. Reported explicitly, never a silent fallback.
//! - **Checksum** ([`KcacheError::Checksum`]): the decompressed bytes do not
//!   match the stamped Adler-32. No artifact is materialized in this case,
//!   even though demultiplexing the unverified bytes might have "worked".
//! - **Codec** ([`KcacheError::Codec`]): the external compression codec
//!   signalled failure (a zero return) or a buffer could not be sized.
//! - **Structure** ([`KcacheError::Structure`]): the demultiplexer could not
//!   locate an expected sub-region of a structured bundle.
//! - **Io** ([`KcacheError::Io`]): file-layer failures from the ambient
//!   reader/writer code, never from the core framing logic.
//!
//! Nothing in this crate is retried automatically; retry policy belongs to
//! the embedder.

use std::fmt;
use std::io;
use std::sync::Arc;

/// A specialized `Result` type for kcache operations.
pub type Result<T> = std::result::Result<T, KcacheError>;

/// The master error enum covering all failure domains in kcache.
///
/// The type is `Clone` so outcomes can be stored or shared; I/O errors are
/// wrapped in `Arc` to make cloning cheap.
#[derive(Debug, Clone)]
pub enum KcacheError {
    /// Low-level I/O failure from the ambient file layer.
    Io(Arc<io::Error>),

    /// An offset/length read from the container would exceed buffer bounds.
    ///
    /// This is always fatal: it indicates either a corrupted container or a
    /// format assumption that does not hold for this input.
    Bounds(String),

    /// The fixed container header is invalid: wrong signature, wrong or
    /// unsupported compression marker, zero-length fields, or a buffer too
    /// small to hold the header at all.
    Header(String),

    /// A fat wrapper was recognized but no architecture slice matched the
    /// expected compression marker.
    WrapperUnsupported(String),

    /// The Adler-32 stamped in the header does not match the decompressed
    /// payload.
    Checksum {
        /// Checksum stored in the container header.
        stored: u32,
        /// Checksum computed over the decompressed payload.
        computed: u32,
    },

    /// The external compression codec reported failure, or a codec buffer
    /// could not be allocated/sized.
    Codec(String),

    /// The demultiplexer could not locate an expected sub-region (e.g. the
    /// dictionary boundary) inside a structured bundle.
    Structure(String),
}

impl fmt::Display for KcacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O Error: {e}"),
            Self::Bounds(s) => write!(f, "Bounds Error: {s}"),
            Self::Header(s) => write!(f, "Header Error: {s}"),
            Self::WrapperUnsupported(s) => write!(f, "Wrapper Error: {s}"),
            Self::Checksum { stored, computed } => write!(
                f,
                "Checksum Mismatch: header says 0x{stored:08x}, payload is 0x{computed:08x}"
            ),
            Self::Codec(s) => write!(f, "Codec Error: {s}"),
            Self::Structure(s) => write!(f, "Structure Error: {s}"),
        }
    }
}

impl std::error::Error for KcacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for KcacheError {
    fn from(err: io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}
