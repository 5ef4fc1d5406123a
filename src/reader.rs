//! The read-side file layer.
//!
//! Memory-maps a container file and hands the bytes to the framing engine.
//! The core engine itself only ever sees in-memory byte buffers; this module
//! is the ambient layer that produces them.

use std::fs::File;
use std::path::Path;

use memmap2::Mmap;

use crate::codec::Codec;
use crate::engine::{self, DecodeOptions, DecodeOutput};
use crate::error::Result;

/// Handle on a memory-mapped container file.
#[derive(Debug)]
pub struct KcacheReader {
    mmap: Mmap,
    file_size: u64,
}

impl KcacheReader {
    /// Opens and memory-maps a container file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let file_size = file.metadata()?.len();

        // Safety: Mmap is fundamentally unsafe as external processes could
        // modify the file. We assume exclusive access or accept the risk for
        // performance (standard practice).
        #[allow(unsafe_code)]
        let mmap = unsafe { Mmap::map(&file)? };

        Ok(Self { mmap, file_size })
    }

    /// The mapped file contents.
    pub fn bytes(&self) -> &[u8] {
        &self.mmap
    }

    /// Size of the mapped file in bytes.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Runs a full decode over the mapped bytes.
    pub fn decode(&self, codec: &dyn Codec, options: &DecodeOptions) -> Result<DecodeOutput> {
        engine::decode(self.bytes(), codec, options)
    }
}
