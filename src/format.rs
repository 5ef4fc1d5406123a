//! Physical layout of the compressed container format.
//!
//! # Layout
//! A container file is the fixed header followed immediately by the
//! compressed payload, optionally preceded by a fat multi-architecture
//! wrapper (see [`crate::wrapper`]):
//!
//! File: `[ Fat Wrapper (optional) ] [ Container Header ] [ Compressed Payload ]`
//!
//! ## Header Anatomy
//! All multi-byte fields are stored big-endian regardless of host order;
//! every read and write through this module byte-swaps on little-endian
//! hosts:
//!
//! `Signature(4) | CompressionType(4) | Adler32(4) | UncompressedSize(4) | CompressedSize(4)`

use crate::error::{KcacheError, Result};
use crate::wrapper::{WrapperArchEntry, CPU_SUBTYPE_X86_64_ALL, CPU_TYPE_X86_64, WRAPPER_HEADER_SIZE, WRAPPER_MAGIC};

/// Magic bytes identifying a compressed container: "comp".
pub const CONTAINER_SIGNATURE: [u8; 4] = *b"comp";

/// The fixed size of the container header.
/// Signature(4) + CompressionType(4) + Adler32(4) + UncompressedSize(4) + CompressedSize(4) = 20
pub const CONTAINER_HEADER_SIZE: usize = 20;

/// Width of the wrapped file header emitted on the encode path:
/// wrapper header (8) + one architecture entry (20) + container header (20).
pub const FILE_HEADER_SIZE: usize = 48;

/// Format-mandated adjustment subtracted when patching the wrapper's
/// slice-size field: the wrapped file header width minus the container
/// header width. The format reserves this fixed skip region; the value is a
/// documented constant, never derived from the buffers at hand.
pub const WRAPPER_SIZE_ADJUSTMENT: u32 = 28;

/// The fixed-size record framing a compressed payload.
///
/// The signature is implied (it must be [`CONTAINER_SIGNATURE`] for the
/// record to exist at all), so it is not stored as a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerHeader {
    /// Marker identifying which codec produced the payload.
    pub compression_type: [u8; 4],
    /// Adler-32 of the *decompressed* payload.
    pub adler32: u32,
    /// Size of the payload once decompressed.
    pub uncompressed_size: u32,
    /// Size of the payload as stored.
    pub compressed_size: u32,
}

impl ContainerHeader {
    /// Returns true when `bytes` opens with the container signature.
    ///
    /// Used both on raw input and, separately, on a decompressed payload to
    /// detect the structured-bundle case.
    pub fn matches_signature(bytes: &[u8]) -> bool {
        bytes.len() >= 4 && bytes[0..4] == CONTAINER_SIGNATURE
    }

    /// Parses and validates the fixed header at the start of `bytes`.
    ///
    /// Fails with [`KcacheError::Header`] if the buffer is smaller than the
    /// header's fixed width or the signature does not match. Every
    /// multi-byte field is byte-swapped on read.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < CONTAINER_HEADER_SIZE {
            return Err(KcacheError::Header(format!(
                "buffer of {} bytes is smaller than the {} byte container header",
                bytes.len(),
                CONTAINER_HEADER_SIZE
            )));
        }
        if bytes[0..4] != CONTAINER_SIGNATURE {
            return Err(KcacheError::Header("invalid container signature".into()));
        }

        let mut compression_type = [0u8; 4];
        compression_type.copy_from_slice(&bytes[4..8]);

        Ok(Self {
            compression_type,
            adler32: be_u32(bytes, 8),
            uncompressed_size: be_u32(bytes, 12),
            compressed_size: be_u32(bytes, 16),
        })
    }

    /// Checks the marker and size fields against the expected codec marker
    /// and the bytes actually present after the header.
    pub fn validate(&self, marker: [u8; 4], remaining: usize) -> Result<()> {
        if self.compression_type != marker {
            return Err(KcacheError::Header(format!(
                "unsupported compression marker '{}', expected '{}'",
                crate::codec::marker_label(self.compression_type),
                crate::codec::marker_label(marker)
            )));
        }
        if self.compressed_size == 0 || self.uncompressed_size == 0 {
            return Err(KcacheError::Header(
                "container header declares a zero-length payload".into(),
            ));
        }
        if self.compressed_size as usize > remaining {
            return Err(KcacheError::Bounds(format!(
                "header declares {} compressed bytes but only {} remain in the buffer",
                self.compressed_size, remaining
            )));
        }
        Ok(())
    }

    /// Serializes the header to its big-endian byte layout.
    pub fn to_bytes(&self) -> [u8; CONTAINER_HEADER_SIZE] {
        let mut buf = [0u8; CONTAINER_HEADER_SIZE];
        buf[0..4].copy_from_slice(&CONTAINER_SIGNATURE);
        buf[4..8].copy_from_slice(&self.compression_type);
        buf[8..12].copy_from_slice(&self.adler32.to_be_bytes());
        buf[12..16].copy_from_slice(&self.uncompressed_size.to_be_bytes());
        buf[16..20].copy_from_slice(&self.compressed_size.to_be_bytes());
        buf
    }
}

/// Assembles the 48-byte wrapped file header emitted when the encoded input
/// itself sat behind a fat wrapper.
///
/// The single architecture entry's `size` field is patched to
/// `FILE_HEADER_SIZE + compressed_size - WRAPPER_SIZE_ADJUSTMENT`, the one
/// irregular computation the format mandates. Its `file_offset` points at
/// the inner container header (byte 28).
pub fn assemble_wrapped_header(inner: &ContainerHeader) -> [u8; FILE_HEADER_SIZE] {
    let arch = WrapperArchEntry {
        cpu_type: CPU_TYPE_X86_64,
        cpu_subtype: CPU_SUBTYPE_X86_64_ALL,
        file_offset: (WRAPPER_HEADER_SIZE + WrapperArchEntry::SIZE) as u32,
        size: FILE_HEADER_SIZE as u32 + inner.compressed_size - WRAPPER_SIZE_ADJUSTMENT,
        align: 0,
    };

    let mut buf = [0u8; FILE_HEADER_SIZE];
    buf[0..4].copy_from_slice(&WRAPPER_MAGIC);
    buf[4..8].copy_from_slice(&1u32.to_be_bytes());
    buf[8..28].copy_from_slice(&arch.to_bytes());
    buf[28..48].copy_from_slice(&inner.to_bytes());
    buf
}

/// Reads a big-endian u32 at `at`. Callers must have bounds-checked.
fn be_u32(bytes: &[u8], at: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[at..at + 4]);
    u32::from_be_bytes(raw)
}
