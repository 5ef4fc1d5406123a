//! Pluggable compression backend.
//!
//! The framing engine never transforms bytes itself; compression and
//! decompression are delegated to a [`Codec`]. A codec is a pure,
//! allocation-free transform with no framing knowledge: it writes into
//! caller-supplied buffers and signals failure by producing zero bytes.
//!
//! This module also owns the Codec Adapter: the buffer-sizing glue
//! ([`compress_buffer`] / [`decompress_buffer`]) that turns the zero-return
//! convention into proper [`KcacheError::Codec`] outcomes.

use crate::error::{KcacheError, Result};

/// Inputs shorter than this are not worth framing.
///
/// Encode reports the `Skipped` outcome (not a failure) below this
/// threshold; whether the embedder copies the input through unmodified or
/// rejects it is embedder policy.
pub const MIN_COMPRESSIBLE_SIZE: usize = 8;

/// Interface to an external compression collaborator.
///
/// Implementations must never write past the destination slice they are
/// given and must not allocate beyond what the caller supplies.
pub trait Codec: Send + Sync + std::fmt::Debug {
    /// The four-byte marker stamped into the container header for payloads
    /// produced by this codec. Decode only accepts containers (and wrapper
    /// slices) carrying this marker.
    fn marker(&self) -> [u8; 4];

    /// Scratch buffer size the encoder needs, queried once per invocation.
    ///
    /// This also floors the destination capacity on both paths, matching the
    /// format's historical workspace sizing.
    fn work_size(&self) -> usize;

    /// Compresses `src` into `dst` using `work` as scratch space.
    ///
    /// Returns the number of bytes produced, or 0 if the result does not fit
    /// in `dst` or the input cannot be encoded.
    fn encode(&self, dst: &mut [u8], src: &[u8], work: &mut [u8]) -> usize;

    /// Decompresses `src` into `dst`.
    ///
    /// Returns the number of bytes produced, or 0 on a malformed stream or
    /// insufficient destination capacity.
    fn decode(&self, dst: &mut [u8], src: &[u8]) -> usize;
}

// --- Store (Pass-through) ---

/// A codec that stores bytes verbatim.
///
/// Always available; useful for containers whose payload is already
/// incompressible and as a reference implementation of the contract.
#[derive(Debug, Clone, Copy)]
pub struct StoreCodec;

impl Codec for StoreCodec {
    fn marker(&self) -> [u8; 4] {
        *b"none"
    }

    fn work_size(&self) -> usize {
        0
    }

    fn encode(&self, dst: &mut [u8], src: &[u8], _work: &mut [u8]) -> usize {
        if dst.len() < src.len() {
            return 0;
        }
        dst[..src.len()].copy_from_slice(src);
        src.len()
    }

    fn decode(&self, dst: &mut [u8], src: &[u8]) -> usize {
        if dst.len() < src.len() {
            return 0;
        }
        dst[..src.len()].copy_from_slice(src);
        src.len()
    }
}

// --- LZ4 Implementation ---

#[cfg(feature = "lz4_flex")]
/// A codec backed by the LZ4 block format.
///
/// Available when the `lz4_flex` feature is enabled (the default). LZ4 keeps
/// no side tables, so `work_size` only floors the destination capacity.
#[derive(Debug, Clone, Copy)]
pub struct Lz4Codec;

#[cfg(feature = "lz4_flex")]
impl Codec for Lz4Codec {
    fn marker(&self) -> [u8; 4] {
        *b"lz4 "
    }

    fn work_size(&self) -> usize {
        0x80000
    }

    fn encode(&self, dst: &mut [u8], src: &[u8], _work: &mut [u8]) -> usize {
        lz4_flex::block::compress_into(src, dst).unwrap_or(0)
    }

    fn decode(&self, dst: &mut [u8], src: &[u8]) -> usize {
        lz4_flex::block::decompress_into(src, dst).unwrap_or(0)
    }
}

// --- ADAPTER ---

/// Compresses `src` through `codec`, sizing the destination and workspace.
///
/// The destination capacity is `max(work_size, src.len())`: incompressible
/// input can expand, and the codec is expected to fail cleanly (produce 0)
/// rather than overrun when even that is not enough.
pub fn compress_buffer(codec: &dyn Codec, src: &[u8]) -> Result<Vec<u8>> {
    let capacity = codec.work_size().max(src.len());
    let mut dst = vec![0u8; capacity];
    let mut work = vec![0u8; codec.work_size()];

    let produced = codec.encode(&mut dst, src, &mut work);
    if produced == 0 {
        return Err(KcacheError::Codec(format!(
            "codec '{}' failed to encode {} bytes into a {} byte destination",
            marker_label(codec.marker()),
            src.len(),
            capacity
        )));
    }

    dst.truncate(produced);
    Ok(dst)
}

/// Decompresses `src` through `codec` into a buffer of `dst_capacity` bytes.
pub fn decompress_buffer(codec: &dyn Codec, src: &[u8], dst_capacity: usize) -> Result<Vec<u8>> {
    let mut dst = vec![0u8; dst_capacity];

    let produced = codec.decode(&mut dst, src);
    if produced == 0 {
        return Err(KcacheError::Codec(format!(
            "codec '{}' failed to decode {} bytes (destination capacity {})",
            marker_label(codec.marker()),
            src.len(),
            dst_capacity
        )));
    }

    dst.truncate(produced);
    Ok(dst)
}

/// Printable form of a four-byte marker for error messages.
pub(crate) fn marker_label(marker: [u8; 4]) -> String {
    marker
        .iter()
        .map(|&b| {
            if b.is_ascii_graphic() || b == b' ' {
                char::from(b)
            } else {
                '.'
            }
        })
        .collect()
}
