//! The decode/encode orchestrator.
//!
//! Sequences wrapper location, header validation, codec calls, checksum
//! verification and artifact demultiplexing. Every invocation is
//! single-threaded and synchronous: it runs to completion or fails with one
//! tagged [`KcacheError`]; no step is retried. Buffers are owned here for
//! the duration of one invocation, and the demultiplexer only ever borrows
//! them.

use log::{debug, info, warn};

use crate::checksum::adler32;
use crate::codec::{self, Codec, MIN_COMPRESSIBLE_SIZE};
use crate::demux::{self, DecodedPayload};
use crate::error::{KcacheError, Result};
use crate::format::{self, ContainerHeader, CONTAINER_HEADER_SIZE, FILE_HEADER_SIZE};
use crate::wrapper::{self, WrapperArchEntry, WRAPPER_HEADER_SIZE};

/// Which artifacts a decode should materialize.
///
/// Explicit request fields, passed per invocation; there is no process-wide
/// "emit everything" switch.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecodeOptions {
    /// Hand back the whole decompressed payload.
    pub emit_payload: bool,
    /// Copy out the raw kernel image of a structured bundle.
    pub extract_kernel: bool,
    /// Copy out the dictionary text of a structured bundle.
    pub extract_dictionary: bool,
    /// Copy out every module binary named by the dictionary.
    pub extract_modules: bool,
    /// Collect the ordered list of module identifiers.
    pub list_modules: bool,
}

impl DecodeOptions {
    /// Materialize every artifact the payload offers.
    pub fn everything() -> Self {
        Self {
            emit_payload: true,
            extract_kernel: true,
            extract_dictionary: true,
            extract_modules: true,
            list_modules: true,
        }
    }

    /// Only the decompressed payload, no demultiplexed artifacts.
    pub fn payload_only() -> Self {
        Self {
            emit_payload: true,
            ..Self::default()
        }
    }

    fn wants_demux(&self) -> bool {
        self.extract_kernel || self.extract_dictionary || self.extract_modules || self.list_modules
    }
}

/// One extracted module binary, named after its identifier.
#[derive(Debug, Clone)]
pub struct ModuleArtifact {
    /// Bundle identifier from the dictionary.
    pub identifier: String,
    /// The module's bytes, copied out of the kernel region.
    pub bytes: Vec<u8>,
}

/// Everything one decode invocation produced.
///
/// Fields are `None` when the corresponding option was off or the payload
/// was a raw blob with no sub-artifacts.
#[derive(Debug, Default)]
pub struct DecodeOutput {
    /// The decompressed payload, when requested.
    pub payload: Option<Vec<u8>>,
    /// The raw kernel image.
    pub kernel: Option<Vec<u8>>,
    /// The dictionary text.
    pub dictionary: Option<Vec<u8>>,
    /// Ordered module identifiers, duplicates preserved.
    pub module_list: Option<Vec<String>>,
    /// Extracted module binaries.
    pub modules: Option<Vec<ModuleArtifact>>,
    /// True when the payload was a structured kernel bundle.
    pub structured: bool,
    /// Decompressed payload length, always reported.
    pub uncompressed_size: usize,
}

/// Outcome of an encode invocation.
#[derive(Debug)]
pub enum EncodeOutcome {
    /// The assembled output buffer: header(s) followed by the compressed
    /// payload.
    Encoded(Vec<u8>),
    /// Input was below [`MIN_COMPRESSIBLE_SIZE`]. Not a failure; the
    /// embedder decides whether to copy the input through or reject it.
    Skipped,
}

impl EncodeOutcome {
    /// Returns the assembled bytes, or `None` for a skipped encode.
    pub fn bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Encoded(bytes) => Some(bytes),
            Self::Skipped => None,
        }
    }
}

/// One encode invocation: the input buffer plus the wrapper bookkeeping
/// discovered around it. Constructed once, consumed by [`encode`].
#[derive(Debug, Clone, Copy)]
pub struct EncodeRequest<'a> {
    input: &'a [u8],
    wrapper_offset: usize,
    prelinked: bool,
}

impl<'a> EncodeRequest<'a> {
    /// Builds a request, detecting a leading fat wrapper (the plaintext then
    /// starts at the first slice's offset) and whether that plaintext is
    /// itself a prelinked bundle whose output header needs the wrapper
    /// fixup.
    pub fn new(input: &'a [u8]) -> Result<Self> {
        let mut wrapper_offset = 0;
        if wrapper::has_wrapper(input) {
            let entry_bytes = input
                .get(WRAPPER_HEADER_SIZE..WRAPPER_HEADER_SIZE + WrapperArchEntry::SIZE)
                .ok_or_else(|| {
                    KcacheError::Bounds("wrapper present but its first entry is truncated".into())
                })?;
            let entry = WrapperArchEntry::from_bytes(entry_bytes)?;
            if entry.file_offset as usize > input.len() {
                return Err(KcacheError::Bounds(format!(
                    "wrapper slice offset {} exceeds the {} byte input",
                    entry.file_offset,
                    input.len()
                )));
            }
            wrapper_offset = entry.file_offset as usize;
            debug!("input carries a fat wrapper, plaintext starts at {wrapper_offset}");
        }

        let prelinked = demux::is_bundle(&input[wrapper_offset..]);
        Ok(Self {
            input,
            wrapper_offset,
            prelinked,
        })
    }

    /// The bytes that will be checksummed and compressed.
    pub fn plaintext(&self) -> &'a [u8] {
        &self.input[self.wrapper_offset..]
    }

    /// Offset of the plaintext within the original input (0 = no wrapper).
    pub fn wrapper_offset(&self) -> usize {
        self.wrapper_offset
    }

    /// True when the plaintext is itself a prelinked bundle.
    pub fn is_prelinked(&self) -> bool {
        self.prelinked
    }
}

/// Decodes a container buffer end to end.
///
/// State machine: `LocateWrapper → ValidateHeader → Decompress →
/// VerifyChecksum → Demultiplex`, with any step failing terminally. A buffer
/// with neither wrapper nor container signature is treated as a bare
/// compressed stream and handed to the codec whole.
pub fn decode(input: &[u8], codec: &dyn Codec, options: &DecodeOptions) -> Result<DecodeOutput> {
    // LocateWrapper
    let slice_offset = wrapper::locate_slice(input, codec.marker())?;
    let body = match slice_offset {
        Some(offset) => &input[offset..],
        None => input,
    };

    // ValidateHeader
    let (compressed, dst_capacity, stored_checksum) = if ContainerHeader::matches_signature(body) {
        let header = ContainerHeader::parse(body)?;
        header.validate(codec.marker(), body.len() - CONTAINER_HEADER_SIZE)?;
        debug!(
            "container accepted: {} compressed -> {} decompressed bytes, adler32 0x{:08x}",
            header.compressed_size, header.uncompressed_size, header.adler32
        );
        let payload = &body[CONTAINER_HEADER_SIZE..CONTAINER_HEADER_SIZE + header.compressed_size as usize];
        (payload, header.uncompressed_size as usize, Some(header.adler32))
    } else {
        // Bare compressed stream: no header, no stamped checksum. The
        // codec's workspace size floors the destination capacity.
        debug!("no container header, decoding {} bytes as a bare stream", body.len());
        (body, codec.work_size().max(body.len()), None)
    };

    // Decompress
    let plaintext = codec::decompress_buffer(codec, compressed, dst_capacity)?;
    debug!("decompressed {} -> {} bytes", compressed.len(), plaintext.len());

    // VerifyChecksum. Runs before any artifact is materialized; on mismatch
    // nothing is handed out.
    if let Some(stored) = stored_checksum {
        let computed = adler32(&plaintext);
        if stored != computed {
            warn!("adler32 mismatch: header 0x{stored:08x}, payload 0x{computed:08x}");
            return Err(KcacheError::Checksum { stored, computed });
        }
        debug!("adler32 verified (0x{computed:08x})");
    }

    // Demultiplex
    let mut output = DecodeOutput {
        structured: demux::is_bundle(&plaintext),
        uncompressed_size: plaintext.len(),
        ..DecodeOutput::default()
    };

    if output.structured && options.wants_demux() {
        let view = DecodedPayload::split(&plaintext)?;
        if options.extract_dictionary {
            output.dictionary = Some(view.dictionary().to_vec());
        }
        if options.extract_kernel {
            output.kernel = Some(view.kernel().to_vec());
        }
        if options.list_modules || options.extract_modules {
            let entries = view.modules()?;
            if options.extract_modules {
                let mut artifacts = Vec::with_capacity(entries.len());
                for entry in &entries {
                    artifacts.push(ModuleArtifact {
                        identifier: entry.identifier.clone(),
                        bytes: view.extract_module(entry)?,
                    });
                }
                output.modules = Some(artifacts);
            }
            if options.list_modules {
                output.module_list = Some(entries.into_iter().map(|e| e.identifier).collect());
            }
        }
    }

    if options.emit_payload {
        output.payload = Some(plaintext);
    }
    Ok(output)
}

/// Encodes a plaintext buffer into a container.
///
/// State machine: `SizeCheck → Compress → (PatchHeader) → Assemble`. The
/// checksum is computed over the plaintext before compression; the header is
/// synthesized afterwards since its size fields are only known then. When
/// the request detected a wrapper around a prelinked bundle, the wrapped
/// file header with the patched slice-size field is emitted instead of the
/// bare container header.
pub fn encode(request: &EncodeRequest<'_>, codec: &dyn Codec) -> Result<EncodeOutcome> {
    let plaintext = request.plaintext();

    // SizeCheck
    if plaintext.len() < MIN_COMPRESSIBLE_SIZE {
        info!(
            "input of {} bytes is below the {MIN_COMPRESSIBLE_SIZE} byte minimum, skipping",
            plaintext.len()
        );
        return Ok(EncodeOutcome::Skipped);
    }
    if plaintext.len() > u32::MAX as usize {
        return Err(KcacheError::Bounds(
            "input exceeds the container's 32-bit size fields".into(),
        ));
    }

    // Checksum on the plaintext, before compression touches it.
    let checksum = adler32(plaintext);

    // Compress
    let compressed = codec::compress_buffer(codec, plaintext)?;
    debug!(
        "compressed {} -> {} bytes, adler32 0x{checksum:08x}",
        plaintext.len(),
        compressed.len()
    );

    let header = ContainerHeader {
        compression_type: codec.marker(),
        adler32: checksum,
        uncompressed_size: plaintext.len() as u32,
        compressed_size: compressed.len() as u32,
    };

    // PatchHeader + Assemble
    let mut out;
    if request.wrapper_offset() != 0 && request.is_prelinked() {
        debug!("emitting wrapped file header with patched slice size");
        out = Vec::with_capacity(FILE_HEADER_SIZE + compressed.len());
        out.extend_from_slice(&format::assemble_wrapped_header(&header));
    } else {
        out = Vec::with_capacity(CONTAINER_HEADER_SIZE + compressed.len());
        out.extend_from_slice(&header.to_bytes());
    }
    out.extend_from_slice(&compressed);

    Ok(EncodeOutcome::Encoded(out))
}
