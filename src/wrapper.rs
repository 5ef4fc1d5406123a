//! Fat multi-architecture wrapper handling.
//!
//! A container may sit behind a fat wrapper holding one slice per
//! architecture:
//!
//! `Magic(4) | NArchEntries(4) | { CpuType(4) CpuSubtype(4) FileOffset(4) Size(4) Align(4) } * N`
//!
//! Decode walks the architecture table looking for the slice whose container
//! header declares the expected compression marker. Every offset and length
//! read from the table is untrusted and checked against the owning buffer
//! before any sub-slice is taken.

use log::debug;

use crate::error::{KcacheError, Result};
use crate::format::ContainerHeader;

/// Fat wrapper magic as stored on disk (big-endian 0xCAFEBABE).
pub const WRAPPER_MAGIC: [u8; 4] = [0xca, 0xfe, 0xba, 0xbe];

/// Wrapper header width: magic(4) + entry count(4).
pub const WRAPPER_HEADER_SIZE: usize = 8;

/// CPU type stamped into synthesized wrapper headers on the encode path.
pub const CPU_TYPE_X86_64: u32 = 0x0100_0007;

/// CPU subtype stamped into synthesized wrapper headers on the encode path.
pub const CPU_SUBTYPE_X86_64_ALL: u32 = 0x8000_0003;

/// One architecture slice in a fat wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WrapperArchEntry {
    /// Architecture identifier.
    pub cpu_type: u32,
    /// Architecture sub-identifier.
    pub cpu_subtype: u32,
    /// Absolute offset of the slice within the outer buffer.
    pub file_offset: u32,
    /// Length of the slice.
    pub size: u32,
    /// Alignment exponent, kept only for round-tripping.
    pub align: u32,
}

impl WrapperArchEntry {
    /// The size in bytes of a serialized architecture entry.
    pub const SIZE: usize = 20;

    /// Deserializes one table entry (all fields big-endian).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::SIZE {
            return Err(KcacheError::Bounds(
                "buffer too small for a wrapper architecture entry".into(),
            ));
        }
        Ok(Self {
            cpu_type: be_u32(bytes, 0),
            cpu_subtype: be_u32(bytes, 4),
            file_offset: be_u32(bytes, 8),
            size: be_u32(bytes, 12),
            align: be_u32(bytes, 16),
        })
    }

    /// Serializes to the fixed big-endian table layout.
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(&self.cpu_type.to_be_bytes());
        buf[4..8].copy_from_slice(&self.cpu_subtype.to_be_bytes());
        buf[8..12].copy_from_slice(&self.file_offset.to_be_bytes());
        buf[12..16].copy_from_slice(&self.size.to_be_bytes());
        buf[16..20].copy_from_slice(&self.align.to_be_bytes());
        buf
    }
}

/// Returns true when `buffer` opens with the fat wrapper magic.
pub fn has_wrapper(buffer: &[u8]) -> bool {
    buffer.len() >= 4 && buffer[0..4] == WRAPPER_MAGIC
}

/// Finds the wrapper slice whose container header declares `marker`.
///
/// Returns `Ok(None)` immediately when the buffer carries no wrapper at all.
/// When a wrapper is present, walks exactly the declared entry count; the
/// first matching slice wins (entries are not otherwise ranked). A wrapper
/// with zero matching slices is a [`KcacheError::WrapperUnsupported`]
/// outcome, never a silent fallback to offset 0.
pub fn locate_slice(buffer: &[u8], marker: [u8; 4]) -> Result<Option<usize>> {
    if !has_wrapper(buffer) {
        return Ok(None);
    }
    if buffer.len() < WRAPPER_HEADER_SIZE {
        return Err(KcacheError::Bounds(
            "wrapper magic present but the entry count is truncated".into(),
        ));
    }

    let entry_count = be_u32(buffer, 4);
    debug!("fat wrapper detected, {entry_count} architecture slice(s)");

    for index in 0..entry_count {
        let entry_start = WRAPPER_HEADER_SIZE + index as usize * WrapperArchEntry::SIZE;
        let entry_bytes = buffer
            .get(entry_start..entry_start + WrapperArchEntry::SIZE)
            .ok_or_else(|| {
                KcacheError::Bounds(format!(
                    "architecture table entry {index} exceeds the {} byte buffer",
                    buffer.len()
                ))
            })?;
        let entry = WrapperArchEntry::from_bytes(entry_bytes)?;

        let offset = entry.file_offset as usize;
        let slice_end = u64::from(entry.file_offset) + u64::from(entry.size);
        if slice_end > buffer.len() as u64 {
            return Err(KcacheError::Bounds(format!(
                "slice {index} spans {}..{slice_end} past the {} byte buffer",
                entry.file_offset,
                buffer.len()
            )));
        }

        // A slice that is not a container (or too short to hold a header)
        // is skipped, not fatal; some other slice may still match.
        if let Ok(header) = ContainerHeader::parse(&buffer[offset..]) {
            if header.compression_type == marker {
                debug!("slice {index} at offset {offset} matches the compression marker");
                return Ok(Some(offset));
            }
        }
    }

    Err(KcacheError::WrapperUnsupported(format!(
        "wrapper holds {entry_count} slice(s), none with compression marker '{}'",
        crate::codec::marker_label(marker)
    )))
}

/// Reads a big-endian u32 at `at`. Callers must have bounds-checked.
fn be_u32(bytes: &[u8], at: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[at..at + 4]);
    u32::from_be_bytes(raw)
}
