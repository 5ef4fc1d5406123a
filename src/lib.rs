//! # kcache
//!
//! A framing engine for the compressed prelinked-kernel container format:
//! the byte structure that bundles a compressed kernel image together with a
//! property-list dictionary describing the kernel modules (kexts) linked into
//! it, optionally sitting behind a fat multi-architecture wrapper.
//!
//! The compression transform itself is *not* implemented here. It is an
//! external collaborator behind the [`Codec`] trait; this crate owns the
//! framing, integrity, and extraction logic around it.
//!
//! ## File Layout
//!
//! ```text
//! [ Fat Wrapper (optional) ] [ Container Header ] [ Compressed Payload ]
//! ```
//!
//! The container header is 20 bytes, all fields big-endian:
//!
//! ```text
//! Signature(4) = "comp" | CompressionType(4) | Adler32(4) | UncompSize(4) | CompSize(4)
//! ```
//!
//! The Adler-32 is computed over the *decompressed* payload, so integrity is
//! checked after the codec runs, not before. When a fat wrapper is present,
//! the wrapper's architecture table is walked to find the slice whose header
//! declares the expected compression marker.
//!
//! ## Decompressed Payload
//!
//! A decompressed payload is either a raw blob (the plain encode/decode case)
//! or a *structured bundle*: it opens with the container marker again,
//! followed by the XML property-list dictionary, followed by the raw kernel
//! image. The [`demux`] module splits a structured bundle into those regions
//! and locates each module binary named by the dictionary.
//!
//! ## Pipeline
//!
//! Decode: locate wrapper slice → validate header → decompress → verify
//! checksum → demultiplex → materialize the requested artifacts.
//!
//! Encode: size check → checksum the plaintext → compress → stamp a fresh
//! header (patched for the wrapper when one was present) → assemble.
//!
//! Every invocation is single-threaded and synchronous; it either completes
//! or fails atomically with a tagged [`KcacheError`]. Nothing is retried and
//! there is no global mutable state.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kcache::{DecodeOptions, Kcache, Lz4Codec};
//!
//! let codec = Lz4Codec;
//! let out = Kcache::decode_file("prelinkedkernel", &codec, &DecodeOptions::everything())?;
//! for name in out.module_list.unwrap_or_default() {
//!     println!("{name}");
//! }
//! ```
//!
//! ### Safety and Error Handling
//!
//! * **Bounds-checked framing:** every offset and length read from untrusted
//!   header fields is validated against the owning buffer before a sub-slice
//!   is taken.
//! * **No Panics:** no `unwrap()` or `panic!()` in the library (enforced by
//!   clippy lints).
//! * **Encapsulated Unsafe:** `unsafe` appears only in the [`reader`] module
//!   to memory-map input files.

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![warn(missing_docs)]

// --- PUBLIC API MODULES ---
pub mod api;
pub mod checksum;
pub mod codec;
pub mod demux;
pub mod engine;
pub mod error;
pub mod format;
pub mod inspector;
pub mod reader;
pub mod wrapper;

// --- RE-EXPORTS ---

#[cfg(feature = "lz4_flex")]
pub use codec::Lz4Codec;
pub use codec::{Codec, StoreCodec, MIN_COMPRESSIBLE_SIZE};

pub use api::Kcache;
pub use checksum::adler32;
pub use demux::{DecodedPayload, ModuleEntry};
pub use engine::{DecodeOptions, DecodeOutput, EncodeOutcome, EncodeRequest, ModuleArtifact};
pub use error::{KcacheError, Result};
pub use format::ContainerHeader;
pub use inspector::KcacheInspector;
pub use reader::KcacheReader;
