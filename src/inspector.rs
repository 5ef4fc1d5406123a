//! Tools for inspecting the physical structure of container files.
//! Useful for debugging framing issues and verifying encode output.

use std::path::Path;

use serde::Serialize;

use crate::codec::marker_label;
use crate::error::Result;
use crate::format::ContainerHeader;
use crate::reader::KcacheReader;
use crate::wrapper::{self, WrapperArchEntry, WRAPPER_HEADER_SIZE};

/// A structural report of a container file.
#[derive(Debug, Serialize)]
pub struct ContainerReport {
    /// Total size of the file on disk.
    pub file_size: u64,
    /// Whether the file opens with a fat wrapper.
    pub wrapped: bool,
    /// The wrapper's architecture table, when present.
    pub arch_entries: Vec<ArchInfo>,
    /// The first parseable container header, when one exists.
    pub container: Option<ContainerInfo>,
}

/// One architecture slice as declared by the wrapper.
#[derive(Debug, Serialize)]
pub struct ArchInfo {
    /// Architecture identifier.
    pub cpu_type: u32,
    /// Architecture sub-identifier.
    pub cpu_subtype: u32,
    /// Slice offset within the file.
    pub file_offset: u32,
    /// Slice length.
    pub size: u32,
    /// Alignment exponent.
    pub align: u32,
}

/// Parsed container header fields.
#[derive(Debug, Serialize)]
pub struct ContainerInfo {
    /// Offset of the header within the file.
    pub header_offset: usize,
    /// Compression marker, rendered printable.
    pub compression_marker: String,
    /// Stamped Adler-32 of the decompressed payload.
    pub adler32: u32,
    /// Declared decompressed size.
    pub uncompressed_size: u32,
    /// Declared compressed size.
    pub compressed_size: u32,
}

/// The container inspector tool.
#[derive(Debug)]
pub struct KcacheInspector;

impl KcacheInspector {
    /// Analyzes a file and returns a structural report.
    pub fn inspect<P: AsRef<Path>>(path: P) -> Result<ContainerReport> {
        let reader = KcacheReader::open(path)?;
        Self::inspect_bytes(reader.bytes(), reader.file_size())
    }

    /// Analyzes an in-memory buffer.
    ///
    /// Unlike decode, inspection is lenient: truncated tables or missing
    /// headers shrink the report instead of failing it.
    pub fn inspect_bytes(buffer: &[u8], file_size: u64) -> Result<ContainerReport> {
        let wrapped = wrapper::has_wrapper(buffer);
        let mut arch_entries = Vec::new();
        let mut container = None;

        if wrapped && buffer.len() >= WRAPPER_HEADER_SIZE {
            let mut raw = [0u8; 4];
            raw.copy_from_slice(&buffer[4..8]);
            let entry_count = u32::from_be_bytes(raw);

            for index in 0..entry_count as usize {
                let start = WRAPPER_HEADER_SIZE + index * WrapperArchEntry::SIZE;
                let Some(entry_bytes) = buffer.get(start..start + WrapperArchEntry::SIZE) else {
                    break;
                };
                let Ok(entry) = WrapperArchEntry::from_bytes(entry_bytes) else {
                    break;
                };
                arch_entries.push(ArchInfo {
                    cpu_type: entry.cpu_type,
                    cpu_subtype: entry.cpu_subtype,
                    file_offset: entry.file_offset,
                    size: entry.size,
                    align: entry.align,
                });
            }

            // First slice with a parseable header, regardless of marker.
            for info in &arch_entries {
                let offset = info.file_offset as usize;
                if let Some(slice) = buffer.get(offset..) {
                    if let Ok(header) = ContainerHeader::parse(slice) {
                        container = Some(Self::describe(offset, &header));
                        break;
                    }
                }
            }
        } else if let Ok(header) = ContainerHeader::parse(buffer) {
            container = Some(Self::describe(0, &header));
        }

        Ok(ContainerReport {
            file_size,
            wrapped,
            arch_entries,
            container,
        })
    }

    fn describe(header_offset: usize, header: &ContainerHeader) -> ContainerInfo {
        ContainerInfo {
            header_offset,
            compression_marker: marker_label(header.compression_type),
            adler32: header.adler32,
            uncompressed_size: header.uncompressed_size,
            compressed_size: header.compressed_size,
        }
    }
}

impl std::fmt::Display for ContainerReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== KCACHE INSPECTOR REPORT ===")?;
        writeln!(f, "File Size:  {} bytes", self.file_size)?;
        writeln!(f, "Wrapped:    {}", self.wrapped)?;
        for (i, arch) in self.arch_entries.iter().enumerate() {
            writeln!(
                f,
                "Slice {i}: cpu 0x{:08x}/0x{:08x} | offset {} | size {} | align {}",
                arch.cpu_type, arch.cpu_subtype, arch.file_offset, arch.size, arch.align
            )?;
        }
        match &self.container {
            Some(c) => writeln!(
                f,
                "Container @{}: marker '{}' | adler32 0x{:08x} | {} -> {} bytes",
                c.header_offset,
                c.compression_marker,
                c.adler32,
                c.compressed_size,
                c.uncompressed_size
            ),
            None => writeln!(f, "Container:  none found"),
        }
    }
}
