//! Artifact demultiplexing of structured kernel bundles.

mod common;

use kcache::demux::{self, DecodedPayload};
use kcache::engine;
use kcache::{DecodeOptions, EncodeOutcome, EncodeRequest, KcacheError, ModuleEntry, StoreCodec};

#[test]
fn split_finds_dictionary_and_kernel_regions() {
    let kernel = b"KERNELKERNELKERNEL".to_vec();
    let bundle = common::build_bundle(&[("com.example.one", 0, 6)], &kernel);

    let view = DecodedPayload::split(&bundle).expect("split");
    assert!(view.dictionary().starts_with(b"<?xml"));
    assert!(view.dictionary().ends_with(b"</plist>\n"));
    assert_eq!(view.kernel(), kernel.as_slice());
}

#[test]
fn module_list_preserves_order_and_duplicates() {
    // Three entries, one duplicate identifier; ranges are disjoint and
    // inside the kernel region.
    let kernel: Vec<u8> = (0..32u8).collect();
    let bundle = common::build_bundle(
        &[
            ("com.example.alpha", 0, 16),
            ("com.example.beta", 16, 8),
            ("com.example.alpha", 24, 4),
        ],
        &kernel,
    );

    let view = DecodedPayload::split(&bundle).expect("split");
    let modules = view.modules().expect("modules");

    let names: Vec<&str> = modules.iter().map(|m| m.identifier.as_str()).collect();
    assert_eq!(
        names,
        ["com.example.alpha", "com.example.beta", "com.example.alpha"]
    );

    // Disjointness and extraction fidelity.
    let mut extracted = Vec::new();
    for module in &modules {
        let bytes = view.extract_module(module).expect("extract");
        assert_eq!(bytes.len(), module.size);
        assert_eq!(bytes, kernel[module.offset..module.offset + module.size]);
        extracted.push((module.offset, module.offset + module.size));
    }
    extracted.sort_unstable();
    for pair in extracted.windows(2) {
        assert!(pair[0].1 <= pair[1].0, "module ranges overlap: {pair:?}");
    }
}

#[test]
fn hex_integers_are_accepted() {
    let kernel = vec![0xbe; 64];
    // Build the dictionary by hand to use 0x notation.
    let marker_header = common::build_bundle(&[], &[])[..20].to_vec();
    let mut hand_built = marker_header;
    hand_built.extend_from_slice(
        b"<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<plist version=\"1.0\">\n<array>\n\
<dict>\n<key>CFBundleIdentifier</key>\n<string>com.example.hex</string>\n\
<key>_PrelinkExecutableSourceAddr</key>\n<integer size=\"64\">0x10</integer>\n\
<key>_PrelinkExecutableSize</key>\n<integer>0x20</integer>\n</dict>\n\
</array>\n</plist>\n",
    );
    hand_built.extend_from_slice(&kernel);

    let view = DecodedPayload::split(&hand_built).expect("split");
    let modules = view.modules().expect("modules");
    assert_eq!(
        modules,
        vec![ModuleEntry {
            identifier: "com.example.hex".to_string(),
            offset: 0x10,
            size: 0x20,
        }]
    );
}

#[test]
fn missing_closing_tag_is_structural_corruption() {
    let kernel = vec![1, 2, 3, 4];
    let mut bundle = common::build_bundle(&[("com.example.x", 0, 4)], &kernel);

    // Destroy the closing root tag everywhere it occurs.
    let tag = b"</plist>";
    while let Some(at) = bundle
        .windows(tag.len())
        .position(|window| window == tag)
    {
        bundle[at] = b'X';
    }

    match DecodedPayload::split(&bundle) {
        Err(KcacheError::Structure(_)) => {}
        other => panic!("expected Structure error, got {other:?}"),
    }
}

#[test]
fn module_range_outside_kernel_is_a_bounds_error() {
    let kernel = vec![0u8; 8];
    let bundle = common::build_bundle(&[("com.example.big", 0, 64)], &kernel);

    let view = DecodedPayload::split(&bundle).expect("split");
    let modules = view.modules().expect("modules");
    match view.extract_module(&modules[0]) {
        Err(KcacheError::Bounds(_)) => {}
        other => panic!("expected Bounds error, got {other:?}"),
    }
}

#[test]
fn raw_payload_is_not_a_bundle() {
    assert!(!demux::is_bundle(b"plain old bytes"));
    assert!(!demux::is_bundle(b""));
    assert!(demux::is_bundle(b"comp....ancient mariner"));
}

#[test]
fn full_decode_of_a_structured_container() {
    let kernel: Vec<u8> = (0u8..40).rev().collect();
    let bundle = common::build_bundle(
        &[("com.example.first", 0, 20), ("com.example.second", 20, 20)],
        &kernel,
    );

    let request = EncodeRequest::new(&bundle).expect("request");
    let container = match engine::encode(&request, &StoreCodec).expect("encode") {
        EncodeOutcome::Encoded(bytes) => bytes,
        EncodeOutcome::Skipped => panic!("bundle must not be skipped"),
    };

    let out = engine::decode(&container, &StoreCodec, &DecodeOptions::everything())
        .expect("decode");
    assert!(out.structured);
    assert_eq!(out.payload.as_deref(), Some(bundle.as_slice()));
    assert_eq!(out.kernel.as_deref(), Some(kernel.as_slice()));
    assert!(out
        .dictionary
        .as_deref()
        .is_some_and(|d| d.starts_with(b"<?xml")));

    let modules = out.modules.expect("module artifacts");
    assert_eq!(modules.len(), 2);
    assert_eq!(modules[0].identifier, "com.example.first");
    assert_eq!(modules[0].bytes, kernel[0..20]);
    assert_eq!(modules[1].identifier, "com.example.second");
    assert_eq!(modules[1].bytes, kernel[20..40]);

    assert_eq!(
        out.module_list,
        Some(vec![
            "com.example.first".to_string(),
            "com.example.second".to_string()
        ])
    );
}

#[test]
fn structural_failure_skips_artifact_materialization() {
    // A bundle whose dictionary never closes: the decode that asks for
    // artifacts fails outright rather than returning partial output.
    let mut bundle = b"comp\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0".to_vec();
    bundle.extend_from_slice(b"<?xml version=\"1.0\"?><plist><array>");
    bundle.extend_from_slice(&[0u8; 64]);

    let request = EncodeRequest::new(&bundle).expect("request");
    let container = match engine::encode(&request, &StoreCodec).expect("encode") {
        EncodeOutcome::Encoded(bytes) => bytes,
        EncodeOutcome::Skipped => panic!("unexpected skip"),
    };

    match engine::decode(&container, &StoreCodec, &DecodeOptions::everything()) {
        Err(KcacheError::Structure(_)) => {}
        other => panic!("expected Structure error, got {other:?}"),
    }

    // Payload-only decode of the same container still succeeds: the bundle
    // is only demultiplexed when artifacts are requested.
    let out = engine::decode(&container, &StoreCodec, &DecodeOptions::payload_only())
        .expect("payload-only decode");
    assert_eq!(out.payload.as_deref(), Some(bundle.as_slice()));
    assert!(out.structured);
}
