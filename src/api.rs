//! Whole-file convenience entry points.

use std::path::Path;

use crate::codec::Codec;
use crate::engine::{self, DecodeOptions, DecodeOutput, EncodeOutcome, EncodeRequest};
use crate::error::Result;
use crate::reader::KcacheReader;

/// The main entry point for whole-file operations.
#[derive(Debug)]
pub struct Kcache;

impl Kcache {
    /// Decodes a container file, materializing the artifacts selected in
    /// `options`.
    ///
    /// # Arguments
    /// * `path`: the container file (wrapped, bare, or a raw stream).
    /// * `codec`: the compression collaborator matching the container.
    /// * `options`: which artifacts to copy out.
    pub fn decode_file<P>(path: P, codec: &dyn Codec, options: &DecodeOptions) -> Result<DecodeOutput>
    where
        P: AsRef<Path>,
    {
        let reader = KcacheReader::open(path)?;
        reader.decode(codec, options)
    }

    /// Encodes a file into a container at `dst`.
    ///
    /// Returns [`EncodeOutcome::Skipped`] without writing anything when the
    /// input is below the minimum compressible size.
    pub fn encode_file<P, Q>(src: P, dst: Q, codec: &dyn Codec) -> Result<EncodeOutcome>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        let input = std::fs::read(src)?;
        let request = EncodeRequest::new(&input)?;
        let outcome = engine::encode(&request, codec)?;
        if let EncodeOutcome::Encoded(ref bytes) = outcome {
            std::fs::write(dst, bytes)?;
        }
        Ok(outcome)
    }
}
