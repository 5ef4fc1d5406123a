//! Artifact demultiplexer for decompressed payloads.
//!
//! A decompressed payload is either a raw blob (the plain encode/decode
//! case) or a *structured kernel bundle*: it opens with the container marker
//! again, followed by the embedded property-list dictionary, followed by the
//! raw kernel image. This module splits a bundle into those regions and
//! locates the per-module binaries the dictionary names.
//!
//! The bundle check deliberately re-uses the container signature on a
//! *different* buffer than the outer validation (decompressed vs. raw input)
//! and is kept as its own step so the two outcomes are never conflated.
//!
//! Sub-regions are borrowed views into the single decompressed buffer; bytes
//! are copied only when a caller explicitly materializes one artifact.

use std::ops::Range;

use log::debug;

use crate::error::{KcacheError, Result};
use crate::format::{ContainerHeader, CONTAINER_HEADER_SIZE};

/// Fixed offset of the dictionary from the start of a structured bundle.
const DICTIONARY_OFFSET: usize = CONTAINER_HEADER_SIZE;

/// Closing root tag terminating the dictionary text.
const DICTIONARY_CLOSE_TAG: &[u8] = b"</plist>";

const IDENTIFIER_KEY: &[u8] = b"<key>CFBundleIdentifier</key>";
const SOURCE_ADDR_KEY: &[u8] = b"<key>_PrelinkExecutableSourceAddr</key>";
const SIZE_KEY: &[u8] = b"<key>_PrelinkExecutableSize</key>";

/// Returns true when a decompressed payload is a structured kernel bundle
/// rather than a raw blob.
pub fn is_bundle(payload: &[u8]) -> bool {
    ContainerHeader::matches_signature(payload)
}

/// One module (kext) named by the dictionary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleEntry {
    /// Bundle identifier, verbatim from the dictionary (duplicates and order
    /// are preserved).
    pub identifier: String,
    /// Byte offset of the module binary from the start of the kernel region.
    pub offset: usize,
    /// Length of the module binary.
    pub size: usize,
}

/// Borrowed view of a structured bundle, split into its logical regions.
///
/// The view must not outlive the decompressed buffer it points into; nothing
/// is copied until an artifact is materialized.
#[derive(Debug)]
pub struct DecodedPayload<'a> {
    bytes: &'a [u8],
    dictionary: Range<usize>,
    kernel: Range<usize>,
}

impl<'a> DecodedPayload<'a> {
    /// Splits a structured bundle into its dictionary and kernel regions.
    ///
    /// The dictionary starts at a fixed, format-known offset from the bundle
    /// start. Its end is discovered by a text scan for the closing root tag:
    /// the format stores no length field. This is a known fragility of the
    /// format (a dictionary embedding the literal closing-tag bytes would
    /// mis-locate the boundary) and is preserved as documented behavior.
    ///
    /// A failed boundary scan is fatal for the decode, since every
    /// downstream offset depends on it.
    pub fn split(bytes: &'a [u8]) -> Result<Self> {
        if !is_bundle(bytes) {
            return Err(KcacheError::Structure(
                "payload is not a structured kernel bundle".into(),
            ));
        }
        if bytes.len() <= DICTIONARY_OFFSET {
            return Err(KcacheError::Structure(
                "bundle ends before the dictionary region".into(),
            ));
        }

        let close = find(&bytes[DICTIONARY_OFFSET..], DICTIONARY_CLOSE_TAG).ok_or_else(|| {
            KcacheError::Structure("dictionary closing tag not found in bundle".into())
        })?;
        let mut dictionary_end = DICTIONARY_OFFSET + close + DICTIONARY_CLOSE_TAG.len();
        // A newline after the closing tag still belongs to the dictionary text.
        if bytes.get(dictionary_end) == Some(&b'\n') {
            dictionary_end += 1;
        }

        debug!(
            "bundle split: dictionary {}..{dictionary_end}, kernel {dictionary_end}..{}",
            DICTIONARY_OFFSET,
            bytes.len()
        );

        Ok(Self {
            bytes,
            dictionary: DICTIONARY_OFFSET..dictionary_end,
            kernel: dictionary_end..bytes.len(),
        })
    }

    /// The embedded property-list dictionary text.
    pub fn dictionary(&self) -> &'a [u8] {
        &self.bytes[self.dictionary.clone()]
    }

    /// The raw kernel image: everything after the dictionary boundary.
    pub fn kernel(&self) -> &'a [u8] {
        &self.bytes[self.kernel.clone()]
    }

    /// Enumerates the modules named by the dictionary.
    ///
    /// This is a lightweight textual scan for the known tag patterns, not a
    /// structured plist parse. Order and duplicates are preserved verbatim.
    pub fn modules(&self) -> Result<Vec<ModuleEntry>> {
        list_modules(self.dictionary())
    }

    /// Materializes one module binary as an owned copy of its byte range
    /// within the kernel region.
    pub fn extract_module(&self, entry: &ModuleEntry) -> Result<Vec<u8>> {
        let kernel = self.kernel();
        let end = entry.offset.checked_add(entry.size).ok_or_else(|| {
            KcacheError::Bounds(format!(
                "module '{}' offset/size overflow",
                entry.identifier
            ))
        })?;
        let bytes = kernel.get(entry.offset..end).ok_or_else(|| {
            KcacheError::Bounds(format!(
                "module '{}' spans {}..{} past the {} byte kernel region",
                entry.identifier,
                entry.offset,
                end,
                kernel.len()
            ))
        })?;
        Ok(bytes.to_vec())
    }
}

/// Scans dictionary text for module entries.
///
/// Each entry is delimited by its `CFBundleIdentifier` key; the entry region
/// runs up to the next identifier key (or the end of the dictionary) and
/// must contain the executable offset and size fields.
fn list_modules(dictionary: &[u8]) -> Result<Vec<ModuleEntry>> {
    let mut modules = Vec::new();
    let mut cursor = 0;

    while let Some(hit) = find(&dictionary[cursor..], IDENTIFIER_KEY) {
        let entry_start = cursor + hit + IDENTIFIER_KEY.len();
        let entry_end = find(&dictionary[entry_start..], IDENTIFIER_KEY)
            .map(|next| entry_start + next)
            .unwrap_or(dictionary.len());
        let entry = &dictionary[entry_start..entry_end];

        let identifier = tag_text(entry, b"<string", b"</string>").ok_or_else(|| {
            KcacheError::Structure("module entry has no identifier string".into())
        })?;
        let offset = keyed_integer(entry, SOURCE_ADDR_KEY)?;
        let size = keyed_integer(entry, SIZE_KEY)?;

        modules.push(ModuleEntry {
            identifier: String::from_utf8_lossy(identifier).into_owned(),
            offset,
            size,
        });
        cursor = entry_end;
    }

    debug!("dictionary names {} module(s)", modules.len());
    Ok(modules)
}

/// Reads the `<integer>` value following `key` inside one entry region.
fn keyed_integer(entry: &[u8], key: &[u8]) -> Result<usize> {
    let at = find(entry, key).ok_or_else(|| {
        KcacheError::Structure(format!(
            "module entry is missing '{}'",
            String::from_utf8_lossy(key)
        ))
    })?;
    let rest = &entry[at + key.len()..];
    let text = tag_text(rest, b"<integer", b"</integer>").ok_or_else(|| {
        KcacheError::Structure(format!(
            "no integer value after '{}'",
            String::from_utf8_lossy(key)
        ))
    })?;
    parse_plist_integer(text)
}

/// Parses a plist integer body, accepting decimal or `0x` hexadecimal.
fn parse_plist_integer(text: &[u8]) -> Result<usize> {
    let s = std::str::from_utf8(text)
        .map_err(|_| KcacheError::Structure("module integer field is not UTF-8".into()))?
        .trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|_| {
        KcacheError::Structure(format!("malformed integer '{s}' in module entry"))
    })
}

/// Returns the text between an opening tag (attributes tolerated) and the
/// matching close tag, searching forward from the start of `haystack`.
fn tag_text<'b>(haystack: &'b [u8], open: &[u8], close: &[u8]) -> Option<&'b [u8]> {
    let start = find(haystack, open)?;
    let after_open = &haystack[start + open.len()..];
    let gt = find(after_open, b">")?;
    let body = &after_open[gt + 1..];
    let end = find(body, close)?;
    Some(&body[..end])
}

/// First occurrence of `needle` in `haystack`.
fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}
