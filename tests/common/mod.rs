//! Shared test fixtures and helpers.

#![allow(dead_code)]

use cairn::{build_pack, mount_pack, BuildOptions, Document, Pack, PackSource};

/// Build and mount a pack from documents, panicking on any failure.
pub fn build_and_mount(docs: &[Document]) -> Pack {
    let bytes = build_pack(docs, &BuildOptions::default()).expect("build_pack failed");
    mount_pack(PackSource::Bytes(bytes)).expect("mount_pack failed")
}

/// Build and mount with explicit options.
pub fn build_and_mount_with(docs: &[Document], options: &BuildOptions) -> Pack {
    let bytes = build_pack(docs, options).expect("build_pack failed");
    mount_pack(PackSource::Bytes(bytes)).expect("mount_pack failed")
}

/// Document with a namespace label.
pub fn doc_ns(id: &str, namespace: &str, text: &str) -> Document {
    Document {
        text: text.to_string(),
        id: Some(id.to_string()),
        heading: None,
        namespace: Some(namespace.to_string()),
    }
}

/// Document with a heading.
pub fn doc_heading(id: &str, heading: &str, text: &str) -> Document {
    Document {
        text: text.to_string(),
        id: Some(id.to_string()),
        heading: Some(heading.to_string()),
        namespace: None,
    }
}

// ============================================================================
// HAND-FRAMED PACKS (for legacy / malformed fixtures)
// ============================================================================

/// Append one length-prefixed section.
pub fn frame_section(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    out.extend_from_slice(bytes);
}

/// Append the posting section (entry count, then entries).
pub fn frame_postings(out: &mut Vec<u8>, values: &[u32]) {
    out.extend_from_slice(&(values.len() as u32).to_le_bytes());
    for value in values {
        out.extend_from_slice(&value.to_le_bytes());
    }
}

/// Frame a complete four-section pack from raw parts.
pub fn frame_pack(meta_json: &str, lex_json: &str, postings: &[u32], blocks_json: &str) -> Vec<u8> {
    let mut bytes = Vec::new();
    frame_section(&mut bytes, meta_json.as_bytes());
    frame_section(&mut bytes, lex_json.as_bytes());
    frame_postings(&mut bytes, postings);
    frame_section(&mut bytes, blocks_json.as_bytes());
    bytes
}

/// A v1 pack: string blocks, raw block ids, no semantic tail.
///
/// The legacy encoding cannot represent block 0 in the stream (no `+1`
/// bias), so the fixture indexes terms of block 1 only - exactly what the
/// old builder's output looked like in practice.
pub fn legacy_v1_pack() -> Vec<u8> {
    frame_pack(
        r#"{"version":1,"stats":{"docs":2,"blocks":2,"terms":3}}"#,
        r#"[["alpha",1],["beta",2],["gamma",3]]"#,
        // beta at position 0 and gamma at position 2 of block 1 (raw id 1).
        &[2, 1, 1, 0, 0, 3, 1, 3, 0, 0],
        r#"["alpha only lives here","beta then gamma"]"#,
    )
}

/// A v2 pack: object blocks with headings, no `len` field, raw block ids.
pub fn legacy_v2_pack() -> Vec<u8> {
    frame_pack(
        r#"{"version":2,"stats":{"docs":2,"blocks":2,"terms":2}}"#,
        r#"[["widget",1],["gadget",2]]"#,
        &[1, 1, 1, 0, 0, 2, 1, 2, 0, 0],
        r#"[{"text":"intro block","heading":"Intro","docId":"d0"},
           {"text":"widget gadget","heading":"Parts","docId":"d1"}]"#,
    )
}
