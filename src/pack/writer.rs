// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Pack serialization.
//!
//! Sections are appended in the fixed order the loader reads them. There is
//! deliberately no seeking and no offset table: the format is small enough
//! that sequential length-prefixed sections beat the bookkeeping.

use crate::error::{Error, Result};
use crate::pack::format::{
    write_postings, write_section, BlockPayload, ByteRange, PackMeta, ScaleRange, SemanticInfo,
    SemanticLayout,
};

/// Quantized vector data ready for the semantic tail.
#[derive(Debug, Clone)]
pub(crate) struct SemanticData {
    pub model_id: String,
    pub dims: u32,
    /// `N · dims` int8 components, vectors back to back in block order.
    pub vectors: Vec<i8>,
    /// `N` float16 scale bit patterns, in block order.
    pub scales: Vec<u16>,
}

/// Serialize a complete pack into bytes.
pub(crate) fn write_pack(
    meta: &PackMeta,
    lexicon: &[(String, u32)],
    postings: &[u32],
    blocks: &[BlockPayload],
    semantic: Option<&SemanticData>,
) -> Result<Vec<u8>> {
    let meta_json = to_json(meta, "metadata")?;
    let lex_json = to_json(&lexicon, "lexicon")?;
    let blocks_json = to_json(&blocks, "blocks")?;

    let mut out = Vec::with_capacity(
        meta_json.len() + lex_json.len() + blocks_json.len() + postings.len() * 4 + 64,
    );
    write_section(&mut out, &meta_json);
    write_section(&mut out, &lex_json);
    write_postings(&mut out, postings);
    write_section(&mut out, &blocks_json);

    if let Some(sem) = semantic {
        let (info, blob) = encode_semantic(sem);
        let sem_json = to_json(&info, "semantic")?;
        write_section(&mut out, &sem_json);
        write_section(&mut out, &blob);
    }

    Ok(out)
}

/// Lay out the semantic blob: vectors first, then scales, and describe both
/// ranges in the JSON so the reader never has to re-derive arithmetic.
fn encode_semantic(sem: &SemanticData) -> (SemanticInfo, Vec<u8>) {
    let vectors_len = sem.vectors.len();
    let scales_len = sem.scales.len() * 2;

    let mut blob = Vec::with_capacity(vectors_len + scales_len);
    blob.extend(sem.vectors.iter().map(|v| *v as u8));
    for scale in &sem.scales {
        blob.extend_from_slice(&scale.to_le_bytes());
    }

    let info = SemanticInfo {
        version: 1,
        model_id: sem.model_id.clone(),
        dims: sem.dims,
        encoding: "int8_l2norm".to_string(),
        per_vector_scale: true,
        blocks: SemanticLayout {
            vectors: ByteRange {
                byte_offset: 0,
                length: vectors_len,
            },
            scales: ScaleRange {
                byte_offset: vectors_len,
                length: scales_len,
                encoding: "float16".to_string(),
            },
        },
    };

    (info, blob)
}

fn to_json<T: serde::Serialize>(value: &T, section: &str) -> Result<Vec<u8>> {
    serde_json::to_vec(value)
        .map_err(|e| Error::Internal(format!("serializing {section} section: {e}")))
}
