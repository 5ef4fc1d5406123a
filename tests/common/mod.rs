//! Shared builders for synthetic containers and bundles.
#![allow(dead_code)] // not every test binary uses every builder

use kcache::format::CONTAINER_HEADER_SIZE;
use kcache::wrapper::{WrapperArchEntry, WRAPPER_HEADER_SIZE, WRAPPER_MAGIC};
use kcache::ContainerHeader;

/// Builds a structured kernel bundle: container marker, dictionary text
/// naming `modules` (identifier, offset, size), then `kernel` bytes.
pub fn build_bundle(modules: &[(&str, usize, usize)], kernel: &[u8]) -> Vec<u8> {
    let mut dict = String::new();
    dict.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    dict.push_str("<plist version=\"1.0\">\n<array>\n");
    for (identifier, offset, size) in modules {
        dict.push_str("<dict>\n");
        dict.push_str(&format!(
            "<key>CFBundleIdentifier</key>\n<string>{identifier}</string>\n"
        ));
        dict.push_str(&format!(
            "<key>_PrelinkExecutableSourceAddr</key>\n<integer>{offset}</integer>\n"
        ));
        dict.push_str(&format!(
            "<key>_PrelinkExecutableSize</key>\n<integer>{size}</integer>\n"
        ));
        dict.push_str("</dict>\n");
    }
    dict.push_str("</array>\n</plist>\n");

    // The demultiplexer only inspects the signature of this inner marker
    // header; its size fields are not part of the bundle contract.
    let marker = ContainerHeader {
        compression_type: *b"none",
        adler32: 0,
        uncompressed_size: 0,
        compressed_size: 0,
    };

    let mut bundle = Vec::with_capacity(CONTAINER_HEADER_SIZE + dict.len() + kernel.len());
    bundle.extend_from_slice(&marker.to_bytes());
    bundle.extend_from_slice(dict.as_bytes());
    bundle.extend_from_slice(kernel);
    bundle
}

/// Wraps `slice` behind a single-entry fat wrapper so that the slice starts
/// right after the wrapper header and one architecture entry.
pub fn wrap_single(slice: &[u8]) -> Vec<u8> {
    let offset = (WRAPPER_HEADER_SIZE + WrapperArchEntry::SIZE) as u32;
    let entry = WrapperArchEntry {
        cpu_type: 0x0100_0007,
        cpu_subtype: 0x8000_0003,
        file_offset: offset,
        size: slice.len() as u32,
        align: 0,
    };

    let mut out = Vec::with_capacity(offset as usize + slice.len());
    out.extend_from_slice(&WRAPPER_MAGIC);
    out.extend_from_slice(&1u32.to_be_bytes());
    out.extend_from_slice(&entry.to_bytes());
    out.extend_from_slice(slice);
    out
}

/// A repetitive, compressible plaintext of `len` bytes.
pub fn sample_plaintext(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
