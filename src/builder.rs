// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! The build pipeline: documents in, pack bytes out.
//!
//! One document becomes one block; block ids are dense and assigned in input
//! order, and that order is canonical everywhere downstream. Validation is
//! eager and fails on the first bad document or embedding, naming its index -
//! no partial pack bytes are ever returned.
//!
//! With the `parallel` feature, per-block markdown stripping and tokenization
//! fan out on rayon. Term-id assignment stays sequential in block order
//! (first-seen order is part of the format), so the output is byte-identical
//! with and without the feature.

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::index::IndexBuilder;
use crate::pack::writer::{write_pack, SemanticData};
use crate::pack::{BlockPayload, PackMeta, PackStats, PACK_VERSION};
use crate::quant::quantize;
use crate::text::{strip_markdown, tokenize, Token};

/// One input document. `text` is required and non-empty; everything else is
/// optional metadata surfaced on hits (`id` as `source`) or used for ranking
/// (`heading`) and scoping (`namespace`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub text: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub heading: Option<String>,
    #[serde(default)]
    pub namespace: Option<String>,
}

impl Document {
    /// Convenience constructor for the common id + text case.
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            id: Some(id.into()),
            heading: None,
            namespace: None,
        }
    }
}

/// Build-time options.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Opaque JSON object merged into pack metadata and passed through to
    /// `Pack::metadata_extra` untouched. Must not use the reserved keys
    /// `version` or `stats`.
    pub metadata: Option<serde_json::Value>,
    /// Pre-computed embeddings to quantize into the semantic tail.
    pub semantic: Option<SemanticBuildOptions>,
}

/// Pre-computed embeddings for the semantic section. The core never invokes
/// an embedding model; vectors arrive from outside.
#[derive(Debug, Clone)]
pub struct SemanticBuildOptions {
    pub model_id: String,
    /// One embedding per document, same order, same dimensionality.
    pub embeddings: Vec<Vec<f32>>,
    pub quantization: QuantizationKind,
}

/// Supported quantization schemes. Only one today, but the pack format
/// records the encoding name so more can be added without a version bump.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QuantizationKind {
    #[default]
    Int8L2Norm,
}

/// Build a pack from a document corpus. Returns the serialized bytes;
/// the pack is immutable from here on.
pub fn build_pack(docs: &[Document], options: &BuildOptions) -> Result<Vec<u8>> {
    validate_docs(docs)?;
    let extra = validate_metadata(options.metadata.as_ref())?;
    if let Some(sem) = &options.semantic {
        validate_embeddings(sem, docs.len())?;
    }

    // Markdown-strip and tokenize every block. Deterministic under rayon:
    // the fan-out preserves input order.
    #[cfg(feature = "parallel")]
    let tokenized: Vec<(String, Vec<Token>)> = docs
        .par_iter()
        .map(|doc| prepare_block(&doc.text))
        .collect();
    #[cfg(not(feature = "parallel"))]
    let tokenized: Vec<(String, Vec<Token>)> =
        docs.iter().map(|doc| prepare_block(&doc.text)).collect();

    let mut index = IndexBuilder::new();
    for (block_id, (_, tokens)) in tokenized.iter().enumerate() {
        index.add_block(block_id as u32, tokens);
    }
    let term_count = index.term_count();
    let (lexicon, postings) = index.finish();

    let blocks: Vec<BlockPayload> = docs
        .iter()
        .zip(tokenized.iter())
        .map(|(doc, (text, tokens))| BlockPayload {
            text: text.clone(),
            heading: doc.heading.clone(),
            doc_id: doc.id.clone(),
            namespace: doc.namespace.clone(),
            len: Some(tokens.len() as u32),
        })
        .collect();

    let total_tokens: u64 = tokenized.iter().map(|(_, t)| t.len() as u64).sum();
    let avg_block_len = if docs.is_empty() {
        0.0
    } else {
        total_tokens as f64 / docs.len() as f64
    };

    let meta = PackMeta {
        version: PACK_VERSION,
        stats: PackStats {
            docs: docs.len() as u32,
            blocks: docs.len() as u32,
            terms: term_count,
            avg_block_len: Some(avg_block_len),
        },
        extra,
    };

    let semantic = options
        .semantic
        .as_ref()
        .filter(|sem| !sem.embeddings.is_empty())
        .map(quantize_all);

    log::debug!(
        "built pack: {} blocks, {} terms, {} postings, semantic={}",
        docs.len(),
        term_count,
        postings.len(),
        semantic.is_some()
    );

    write_pack(&meta, &lexicon, &postings, &blocks, semantic.as_ref())
}

fn prepare_block(raw_text: &str) -> (String, Vec<Token>) {
    let text = strip_markdown(raw_text);
    let tokens = tokenize(&text);
    (text, tokens)
}

fn validate_docs(docs: &[Document]) -> Result<()> {
    for (i, doc) in docs.iter().enumerate() {
        if doc.text.is_empty() {
            return Err(Error::InvalidInput(format!(
                "doc at index {i}: text must be a non-empty string"
            )));
        }
    }
    Ok(())
}

fn validate_metadata(
    metadata: Option<&serde_json::Value>,
) -> Result<serde_json::Map<String, serde_json::Value>> {
    let Some(value) = metadata else {
        return Ok(serde_json::Map::new());
    };
    let Some(object) = value.as_object() else {
        return Err(Error::InvalidInput("metadata: must be a JSON object".into()));
    };
    for reserved in ["version", "stats"] {
        if object.contains_key(reserved) {
            return Err(Error::InvalidInput(format!(
                "metadata: key {reserved:?} is reserved"
            )));
        }
    }
    Ok(object.clone())
}

fn validate_embeddings(sem: &SemanticBuildOptions, doc_count: usize) -> Result<()> {
    let QuantizationKind::Int8L2Norm = sem.quantization;

    if sem.embeddings.len() != doc_count {
        return Err(Error::InvalidInput(format!(
            "embeddings: expected {doc_count} vectors, got {}",
            sem.embeddings.len()
        )));
    }
    let Some(first) = sem.embeddings.first() else {
        return Ok(());
    };
    let dims = first.len();
    if dims == 0 {
        return Err(Error::InvalidInput(
            "embeddings[0]: dimensionality must be > 0".into(),
        ));
    }
    for (i, embedding) in sem.embeddings.iter().enumerate() {
        if embedding.len() != dims {
            return Err(Error::InvalidInput(format!(
                "embeddings[{i}]: expected dims {dims}, got {}",
                embedding.len()
            )));
        }
        if !embedding.iter().all(|v| v.is_finite()) {
            return Err(Error::InvalidInput(format!(
                "embeddings[{i}]: contains a non-finite value"
            )));
        }
    }
    Ok(())
}

fn quantize_all(sem: &SemanticBuildOptions) -> SemanticData {
    let dims = sem.embeddings[0].len() as u32;
    let mut vectors = Vec::with_capacity(sem.embeddings.len() * dims as usize);
    let mut scales = Vec::with_capacity(sem.embeddings.len());

    for embedding in &sem.embeddings {
        let q = quantize(embedding);
        vectors.extend_from_slice(&q.values);
        scales.push(q.scale.to_bits());
    }

    SemanticData {
        model_id: sem.model_id.clone(),
        dims,
        vectors,
        scales,
    }
}
