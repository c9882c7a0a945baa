// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Section framing and wire shapes for the pack container.
//!
//! A pack is a sequence of sections, each prefixed by a little-endian `u32`
//! byte length. Metadata, lexicon, and block payloads are JSON for forward
//! compatibility; the high-volume posting stream and vector blob are raw
//! binary. The posting section's prefix counts `u32` entries, not bytes -
//! the one asymmetry in the framing, so it gets its own read/write pair.
//!
//! ```text
//! [metaLen  u32][meta JSON]
//! [lexLen   u32][lexicon JSON]
//! [postCnt  u32][postings: postCnt × u32 LE]
//! [blkLen   u32][blocks JSON]
//! (optional tail, present iff bytes remain)
//! [semLen   u32][semantic JSON]
//! [blobLen  u32][blob: N·D int8, then N × u16 LE float16 scales]
//! ```
//!
//! Version gates live here too: v1 stored blocks as bare strings, v2 added
//! the block object shape, v3 added namespaces, the block-id `+1` stream
//! bias, and the optional semantic tail.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Current pack format version.
pub const PACK_VERSION: u32 = 3;

/// First version with the block-id `+1` stream bias and semantic tail.
/// (v2 introduced object-shaped block payloads; the loader sniffs that from
/// the JSON itself rather than the version field.)
pub const VERSION_BIASED_STREAM: u32 = 3;

// ============================================================================
// SECURITY LIMITS (prevent resource exhaustion from malicious input)
// ============================================================================

/// Maximum bytes any single section may claim.
pub const MAX_SECTION_LEN: usize = 512 * 1024 * 1024;

/// Maximum number of u32 entries in the posting stream.
pub const MAX_POSTING_COUNT: usize = 128 * 1024 * 1024;

// ============================================================================
// WIRE SHAPES
// ============================================================================

/// Pack metadata. Fields beyond `version`/`stats` are an opaque pass-through:
/// the builder accepts a pre-formed JSON object, the loader exposes it
/// parsed, the query engine ignores it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackMeta {
    pub version: u32,
    pub stats: PackStats,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Corpus statistics persisted at build time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackStats {
    pub docs: u32,
    pub blocks: u32,
    pub terms: u32,
    /// Mean of the persisted per-block token lengths. Older packs may omit
    /// it; query paths then fall back to recomputing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_block_len: Option<f64>,
}

/// One block payload as serialized in the blocks section (v2+).
///
/// The writer always emits every field, nulls included; the loader tolerates
/// all of them missing except `text`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockPayload {
    pub text: String,
    #[serde(default)]
    pub heading: Option<String>,
    #[serde(default)]
    pub doc_id: Option<String>,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub len: Option<u32>,
}

/// The blocks section across format generations: v1 packs stored bare
/// strings, v2+ store objects.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum BlocksJson {
    Legacy(Vec<String>),
    Current(Vec<BlockPayload>),
}

/// Semantic section descriptor. Describes the blob layout so future
/// encodings can move sections without breaking old readers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SemanticInfo {
    pub version: u32,
    pub model_id: String,
    pub dims: u32,
    /// Always `"int8_l2norm"` in this version.
    pub encoding: String,
    pub per_vector_scale: bool,
    pub blocks: SemanticLayout,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticLayout {
    pub vectors: ByteRange,
    pub scales: ScaleRange,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ByteRange {
    pub byte_offset: usize,
    pub length: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScaleRange {
    pub byte_offset: usize,
    pub length: usize,
    /// Always `"float16"` in this version.
    pub encoding: String,
}

// ============================================================================
// FRAMING
// ============================================================================

/// Sequential reader over a pack buffer. Every read is bounds-checked and
/// failures name the section, so corruption reports point at the culprit.
pub(crate) struct SectionReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> SectionReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn has_remaining(&self) -> bool {
        self.pos < self.buf.len()
    }

    fn read_u32(&mut self, section: &str) -> Result<u32> {
        let bytes = self
            .buf
            .get(self.pos..self.pos + 4)
            .ok_or_else(|| truncated(section, "length prefix"))?;
        self.pos += 4;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Read one length-prefixed byte section.
    pub fn read_section(&mut self, section: &str) -> Result<&'a [u8]> {
        let len = self.read_u32(section)? as usize;
        if len > MAX_SECTION_LEN {
            return Err(Error::MalformedPack(format!(
                "{section} section claims {len} bytes (max {MAX_SECTION_LEN})"
            )));
        }
        let bytes = self
            .buf
            .get(self.pos..self.pos + len)
            .ok_or_else(|| truncated(section, "payload"))?;
        self.pos += len;
        Ok(bytes)
    }

    /// Read the posting section: a u32 entry count followed by that many
    /// little-endian u32 values.
    pub fn read_postings(&mut self) -> Result<Vec<u32>> {
        let count = self.read_u32("postings")? as usize;
        if count > MAX_POSTING_COUNT {
            return Err(Error::MalformedPack(format!(
                "postings section claims {count} entries (max {MAX_POSTING_COUNT})"
            )));
        }
        let byte_len = count * 4;
        let bytes = self
            .buf
            .get(self.pos..self.pos + byte_len)
            .ok_or_else(|| truncated("postings", "payload"))?;
        self.pos += byte_len;

        Ok(bytes
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }
}

fn truncated(section: &str, what: &str) -> Error {
    Error::MalformedPack(format!("{section} section truncated: missing {what}"))
}

/// Append one length-prefixed byte section.
pub(crate) fn write_section(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    out.extend_from_slice(bytes);
}

/// Append the posting section (entry count, then the entries).
pub(crate) fn write_postings(out: &mut Vec<u8>, postings: &[u32]) {
    out.extend_from_slice(&(postings.len() as u32).to_le_bytes());
    for value in postings {
        out.extend_from_slice(&value.to_le_bytes());
    }
}
