//! Build and mount round-trips, legacy format tolerance, and the malformed
//! pack taxonomy.

mod common;

use std::io::Write;

use cairn::{
    build_pack, has_semantic, mount_pack, mount_pack_with, query, BuildOptions, Document, Error,
    PackSource, QueryOptions, SemanticBuildOptions, PACK_VERSION,
};
use common::{build_and_mount, frame_pack, legacy_v1_pack, legacy_v2_pack};

// ============================================================================
// ROUND-TRIPS
// ============================================================================

#[test]
fn build_mount_query_round_trip() {
    let pack = build_and_mount(&[
        Document::new("a", "the quick brown fox"),
        Document::new("b", "jumped over the lazy dog"),
    ]);

    assert_eq!(pack.version(), PACK_VERSION);
    assert_eq!(pack.block_count(), 2);
    assert_eq!(pack.stats().docs, 2);

    let hits = query(&pack, "lazy dog", &QueryOptions::default()).unwrap();
    assert_eq!(hits[0].source.as_deref(), Some("b"));
}

#[test]
fn mount_from_file_path() {
    let bytes = build_pack(
        &[Document::new("file-doc", "persisted to disk and back")],
        &BuildOptions::default(),
    )
    .unwrap();

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&bytes).unwrap();
    file.flush().unwrap();

    let pack = mount_pack(PackSource::Path(file.path())).unwrap();
    assert_eq!(pack.block_count(), 1);

    let hits = query(&pack, "persisted", &QueryOptions::default()).unwrap();
    assert_eq!(hits[0].source.as_deref(), Some("file-doc"));
}

#[test]
fn missing_file_is_an_io_error() {
    let err = mount_pack(PackSource::Path(std::path::Path::new(
        "/definitely/not/a/real/pack.bin",
    )))
    .unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}

#[test]
fn opaque_metadata_survives_the_round_trip() {
    let options = BuildOptions {
        metadata: Some(serde_json::json!({
            "agentRegistry": {"tools": ["search", "summarize"], "policy": {"maxCalls": 3}}
        })),
        semantic: None,
    };
    let bytes = build_pack(&[Document::new("d", "text")], &options).unwrap();
    let pack = mount_pack(PackSource::Bytes(bytes)).unwrap();

    let registry = &pack.metadata_extra()["agentRegistry"];
    assert_eq!(registry["tools"][1], "summarize");
    assert_eq!(registry["policy"]["maxCalls"], 3);
}

#[test]
fn metadata_hook_runs_before_decode() {
    let options = BuildOptions {
        metadata: Some(serde_json::json!({"registry": "v2"})),
        semantic: None,
    };
    let bytes = build_pack(&[Document::new("d", "text")], &options).unwrap();

    let err = mount_pack_with(PackSource::Buffer(&bytes), |meta| {
        match meta.extra.get("registry") {
            Some(v) if v == "v1" => Ok(()),
            _ => Err(Error::InvalidInput("registry: expected v1".into())),
        }
    })
    .unwrap_err();
    assert!(err.to_string().contains("expected v1"));
}

#[test]
fn semantic_pack_reports_has_semantic() {
    let options = BuildOptions {
        metadata: None,
        semantic: Some(SemanticBuildOptions {
            model_id: "mini-lm".into(),
            embeddings: vec![vec![0.6, 0.8]],
            quantization: Default::default(),
        }),
    };
    let bytes = build_pack(&[Document::new("d", "text")], &options).unwrap();
    let pack = mount_pack(PackSource::Bytes(bytes)).unwrap();
    assert!(has_semantic(&pack));

    let plain = build_and_mount(&[Document::new("d", "text")]);
    assert!(!has_semantic(&plain));
}

// ============================================================================
// LEGACY VERSIONS
// ============================================================================

#[test]
fn v1_pack_mounts_and_serves_queries() {
    let pack = mount_pack(PackSource::Bytes(legacy_v1_pack())).unwrap();

    assert_eq!(pack.version(), 1);
    assert!(!has_semantic(&pack));

    // Block metadata is all-null in v1; hits carry text only.
    let hits = query(&pack, "beta", &QueryOptions::default()).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].text, "beta then gamma");
    assert!(hits[0].source.is_none());
    assert!(hits[0].namespace.is_none());
}

#[test]
fn v2_pack_reads_optional_fields() {
    let pack = mount_pack(PackSource::Bytes(legacy_v2_pack())).unwrap();
    assert_eq!(pack.version(), 2);

    let hits = query(&pack, "widget", &QueryOptions::default()).unwrap();
    assert_eq!(hits[0].source.as_deref(), Some("d1"));
}

#[test]
fn future_version_is_refused() {
    let bytes = frame_pack(
        r#"{"version":17,"stats":{"docs":0,"blocks":0,"terms":0}}"#,
        "[]",
        &[],
        "[]",
    );
    match mount_pack(PackSource::Bytes(bytes)) {
        Err(Error::VersionUnsupported(17)) => {}
        other => panic!("expected VersionUnsupported(17), got {other:?}"),
    }
}

// ============================================================================
// MALFORMED PACKS
// ============================================================================

#[test]
fn truncated_buffer_is_rejected() {
    let bytes = build_pack(&[Document::new("d", "some text")], &BuildOptions::default()).unwrap();
    for cut in [0, 2, bytes.len() / 2, bytes.len() - 1] {
        let err = mount_pack(PackSource::Buffer(&bytes[..cut])).unwrap_err();
        assert!(matches!(err, Error::MalformedPack(_)), "cut at {cut}: {err}");
    }
}

#[test]
fn garbage_json_is_rejected_with_the_section_name() {
    let bytes = frame_pack("{not json", "[]", &[], "[]");
    let err = mount_pack(PackSource::Bytes(bytes)).unwrap_err();
    assert!(err.to_string().contains("metadata"));
}

#[test]
fn overflowing_section_prefix_is_rejected() {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&(u32::MAX).to_le_bytes());
    bytes.extend_from_slice(b"tiny");
    let err = mount_pack(PackSource::Bytes(bytes)).unwrap_err();
    assert!(matches!(err, Error::MalformedPack(_)));
}

#[test]
fn unknown_term_id_in_stream_is_rejected() {
    let bytes = frame_pack(
        r#"{"version":3,"stats":{"docs":1,"blocks":1,"terms":1}}"#,
        r#"[["word",1]]"#,
        &[9, 1, 1, 0, 0],
        r#"[{"text":"word","len":1}]"#,
    );
    let err = mount_pack(PackSource::Bytes(bytes)).unwrap_err();
    assert!(err.to_string().contains("term id 9"));
}

#[test]
fn out_of_range_block_id_is_rejected() {
    let bytes = frame_pack(
        r#"{"version":3,"stats":{"docs":1,"blocks":1,"terms":1}}"#,
        r#"[["word",1]]"#,
        &[1, 9, 1, 0, 0],
        r#"[{"text":"word","len":1}]"#,
    );
    let err = mount_pack(PackSource::Bytes(bytes)).unwrap_err();
    assert!(err.to_string().contains("block id 8"));
}

#[test]
fn failed_build_returns_no_bytes() {
    let docs = vec![
        Document::new("ok", "fine"),
        Document {
            text: String::new(),
            id: None,
            heading: None,
            namespace: None,
        },
    ];
    let result = build_pack(&docs, &BuildOptions::default());
    assert!(matches!(result, Err(Error::InvalidInput(_))));
}

// ============================================================================
// CONCURRENT READS
// ============================================================================

#[test]
fn one_pack_serves_concurrent_queries() {
    let docs: Vec<Document> = (0..16)
        .map(|i| Document::new(format!("d{i}"), format!("shared corpus entry number {i}")))
        .collect();
    let pack = std::sync::Arc::new(build_and_mount(&docs));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let pack = pack.clone();
            std::thread::spawn(move || {
                query(&pack, "corpus entry", &QueryOptions::default()).unwrap()
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for pair in results.windows(2) {
        assert_eq!(pair[0].len(), pair[1].len());
        for (a, b) in pair[0].iter().zip(pair[1].iter()) {
            assert_eq!(a.block_id, b.block_id);
            assert_eq!(a.score.to_bits(), b.score.to_bits());
        }
    }
}
