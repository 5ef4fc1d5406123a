//! Encode → decode round-trip behavior of the framing engine.

mod common;

use kcache::engine;
use kcache::format::CONTAINER_HEADER_SIZE;
use kcache::{
    adler32, Codec, ContainerHeader, DecodeOptions, EncodeOutcome, EncodeRequest, KcacheError,
    Lz4Codec, StoreCodec, MIN_COMPRESSIBLE_SIZE,
};

fn encode_bytes(input: &[u8], codec: &dyn kcache::Codec) -> Vec<u8> {
    let request = EncodeRequest::new(input).expect("request");
    match engine::encode(&request, codec).expect("encode") {
        EncodeOutcome::Encoded(bytes) => bytes,
        EncodeOutcome::Skipped => panic!("input unexpectedly below minimum"),
    }
}

#[test]
fn round_trip_preserves_plaintext_and_checksum() {
    let plaintext = common::sample_plaintext(4096);
    let container = encode_bytes(&plaintext, &Lz4Codec);

    // The stamped header describes the plaintext exactly.
    let header = ContainerHeader::parse(&container).expect("header");
    assert_eq!(header.compression_type, Lz4Codec.marker());
    assert_eq!(header.adler32, adler32(&plaintext));
    assert_eq!(header.uncompressed_size as usize, plaintext.len());
    assert_eq!(
        header.compressed_size as usize,
        container.len() - CONTAINER_HEADER_SIZE
    );

    let out = engine::decode(&container, &Lz4Codec, &DecodeOptions::payload_only())
        .expect("decode");
    assert_eq!(out.payload.as_deref(), Some(plaintext.as_slice()));
    assert_eq!(out.uncompressed_size, plaintext.len());
    assert!(!out.structured);
}

#[test]
fn round_trip_with_store_codec() {
    let plaintext = common::sample_plaintext(256);
    let container = encode_bytes(&plaintext, &StoreCodec);

    // Store keeps the payload verbatim after the header.
    assert_eq!(&container[CONTAINER_HEADER_SIZE..], plaintext.as_slice());

    let out = engine::decode(&container, &StoreCodec, &DecodeOptions::payload_only())
        .expect("decode");
    assert_eq!(out.payload.as_deref(), Some(plaintext.as_slice()));
}

#[test]
fn encode_below_minimum_is_skipped_not_failed() {
    let plaintext = common::sample_plaintext(MIN_COMPRESSIBLE_SIZE - 1);
    let request = EncodeRequest::new(&plaintext).expect("request");
    match engine::encode(&request, &Lz4Codec).expect("encode must not fail") {
        EncodeOutcome::Skipped => {}
        EncodeOutcome::Encoded(_) => panic!("sub-minimum input must be skipped"),
    }
}

#[test]
fn encode_at_minimum_round_trips() {
    let plaintext = common::sample_plaintext(MIN_COMPRESSIBLE_SIZE);
    let container = encode_bytes(&plaintext, &Lz4Codec);
    let out = engine::decode(&container, &Lz4Codec, &DecodeOptions::payload_only())
        .expect("decode");
    assert_eq!(out.payload.as_deref(), Some(plaintext.as_slice()));
}

#[test]
fn header_rejects_wrong_signature_regardless_of_tail() {
    let mut bytes = vec![0u8; 64];
    bytes[0..4].copy_from_slice(b"nope");
    match ContainerHeader::parse(&bytes) {
        Err(KcacheError::Header(_)) => {}
        other => panic!("expected Header error, got {other:?}"),
    }

    // Same rejection with a plausible-looking tail.
    let plaintext = common::sample_plaintext(128);
    let mut container = encode_bytes(&plaintext, &Lz4Codec);
    container[0] = b'x';
    match ContainerHeader::parse(&container) {
        Err(KcacheError::Header(_)) => {}
        other => panic!("expected Header error, got {other:?}"),
    }
}

#[test]
fn header_rejects_truncated_buffer() {
    let bytes = *b"comp";
    match ContainerHeader::parse(&bytes) {
        Err(KcacheError::Header(_)) => {}
        other => panic!("expected Header error, got {other:?}"),
    }
}

#[test]
fn checksum_mismatch_is_terminal_and_materializes_nothing() {
    let plaintext = common::sample_plaintext(512);
    let mut container = encode_bytes(&plaintext, &Lz4Codec);

    // Corrupt the stamped adler32 (bytes 8..12 of the header).
    container[8] ^= 0xff;

    match engine::decode(&container, &Lz4Codec, &DecodeOptions::everything()) {
        Err(KcacheError::Checksum { stored, computed }) => {
            assert_ne!(stored, computed);
            assert_eq!(computed, adler32(&plaintext));
        }
        other => panic!("expected Checksum error, got {other:?}"),
    }
}

#[test]
fn wrong_marker_is_rejected() {
    let plaintext = common::sample_plaintext(512);
    let container = encode_bytes(&plaintext, &Lz4Codec);
    match engine::decode(&container, &StoreCodec, &DecodeOptions::payload_only()) {
        Err(KcacheError::Header(_)) => {}
        other => panic!("expected Header error, got {other:?}"),
    }
}

#[test]
fn truncated_payload_is_a_bounds_error() {
    let plaintext = common::sample_plaintext(512);
    let container = encode_bytes(&plaintext, &Lz4Codec);
    let truncated = &container[..container.len() - 1];
    match engine::decode(truncated, &Lz4Codec, &DecodeOptions::payload_only()) {
        Err(KcacheError::Bounds(_)) => {}
        other => panic!("expected Bounds error, got {other:?}"),
    }
}

#[test]
fn bare_stream_decodes_without_header() {
    // A raw compressed stream: no wrapper, no container signature. The
    // engine hands it to the codec whole; no checksum is available.
    let plaintext = common::sample_plaintext(1024);
    let compressed = {
        let mut dst = vec![0u8; 0x80000];
        let mut work = vec![0u8; 0];
        let n = kcache::Codec::encode(&Lz4Codec, &mut dst, &plaintext, &mut work);
        assert!(n > 0);
        dst.truncate(n);
        dst
    };
    assert_ne!(&compressed[0..4], b"comp");

    let out = engine::decode(&compressed, &Lz4Codec, &DecodeOptions::payload_only())
        .expect("bare stream decode");
    assert_eq!(out.payload.as_deref(), Some(plaintext.as_slice()));
}
