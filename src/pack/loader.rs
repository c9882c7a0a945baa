// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Mounting a pack: bytes in, typed views out.
//!
//! The loader reads sections sequentially, parses the JSON ones, and wraps
//! the binary ones in typed form: the posting stream as `u32` values, the
//! semantic blob as `i8` components plus raw `u16` scale bits (scales decode
//! to float on the fly during rerank). Everything is validated up front so
//! the query path can trust the structures without re-checking.
//!
//! Version tolerance, oldest to newest:
//! - v1: blocks are bare strings; `token_len` is recomputed by retokenizing
//! - v2: object blocks; a missing `len` stays 0 and query paths recompute
//! - v3: namespaces, block ids stored `+1` in the stream, optional semantic
//!   tail
//!
//! Versions above [`PACK_VERSION`] are refused - a forward-compatible reader
//! that guesses at unknown sections would be worse than one that says no.
//!
//! Mounting is the only place the core touches I/O, and only when handed a
//! file path or URL. After byte acquisition everything is synchronous
//! parsing; a mounted [`Pack`] is immutable and safe to share across threads.

use std::collections::HashMap;
use std::path::Path;

use crate::error::{Error, Result};
use crate::index::walk_stream;
use crate::pack::format::{
    BlockPayload, BlocksJson, PackMeta, PackStats, SectionReader, SemanticInfo, PACK_VERSION,
    VERSION_BIASED_STREAM,
};
use crate::text::tokenize;

/// Where pack bytes come from.
#[derive(Debug)]
pub enum PackSource<'a> {
    /// Borrowed in-memory buffer.
    Buffer(&'a [u8]),
    /// Owned in-memory buffer.
    Bytes(Vec<u8>),
    /// Local file, read in one `fs::read`.
    Path(&'a Path),
    /// Remote pack, fetched with a single blocking GET.
    #[cfg(feature = "http")]
    Url(&'a str),
}

impl<'a> From<&'a [u8]> for PackSource<'a> {
    fn from(buf: &'a [u8]) -> Self {
        PackSource::Buffer(buf)
    }
}

impl<'a> From<&'a Path> for PackSource<'a> {
    fn from(path: &'a Path) -> Self {
        PackSource::Path(path)
    }
}

/// One loaded block. `token_len == 0` on a v2 pack that omitted `len`;
/// [`Pack::block_len`] recomputes in that case.
#[derive(Debug, Clone)]
pub(crate) struct LoadedBlock {
    pub text: String,
    pub heading: Option<String>,
    pub doc_id: Option<String>,
    pub namespace: Option<String>,
    pub token_len: u32,
}

/// The decoded semantic tail.
#[derive(Debug, Clone)]
pub(crate) struct SemanticSection {
    pub info: SemanticInfo,
    /// `N · dims` int8 components, block order.
    pub vectors: Vec<i8>,
    /// `N` raw float16 bit patterns, block order.
    pub scales: Vec<u16>,
}

impl SemanticSection {
    pub fn vector(&self, block_id: u32) -> &[i8] {
        let dims = self.info.dims as usize;
        let start = block_id as usize * dims;
        &self.vectors[start..start + dims]
    }

    pub fn scale(&self, block_id: u32) -> f32 {
        half::f16::from_bits(self.scales[block_id as usize]).to_f32()
    }
}

/// A mounted, immutable pack. Cheap to share (`Send + Sync`); concurrent
/// queries need no synchronization because nothing here ever mutates.
#[derive(Debug)]
pub struct Pack {
    pub(crate) meta: PackMeta,
    pub(crate) lexicon: Vec<(String, u32)>,
    pub(crate) term_lookup: HashMap<String, u32>,
    pub(crate) postings: Vec<u32>,
    pub(crate) blocks: Vec<LoadedBlock>,
    /// 1 when block ids in the stream are stored `+1` (v3+), 0 for raw.
    pub(crate) block_bias: u32,
    pub(crate) semantic: Option<SemanticSection>,
}

impl Pack {
    pub fn version(&self) -> u32 {
        self.meta.version
    }

    pub fn stats(&self) -> PackStats {
        self.meta.stats
    }

    /// Opaque metadata fields embedded at build time (e.g. an agent
    /// registry), exposed as parsed JSON. The core never interprets them.
    pub fn metadata_extra(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.meta.extra
    }

    pub fn block_count(&self) -> u32 {
        self.blocks.len() as u32
    }

    pub fn term_count(&self) -> u32 {
        self.lexicon.len() as u32
    }

    pub fn has_semantic(&self) -> bool {
        self.semantic.is_some()
    }

    /// Resolve a normalized term to its id, if indexed.
    pub fn term_id(&self, term: &str) -> Option<u32> {
        self.term_lookup.get(term).copied()
    }

    /// Effective token length of a block: the persisted value, or a
    /// retokenization when an old pack omitted it.
    pub(crate) fn block_len(&self, block_id: u32) -> u32 {
        let block = &self.blocks[block_id as usize];
        if block.token_len > 0 {
            block.token_len
        } else {
            tokenize(&block.text).len() as u32
        }
    }

    /// Mean block length for BM25L normalization: the persisted stat, or the
    /// mean of effective lengths when the stat is absent.
    pub(crate) fn avg_block_len(&self) -> f64 {
        if let Some(avg) = self.meta.stats.avg_block_len {
            return avg;
        }
        if self.blocks.is_empty() {
            return 0.0;
        }
        let total: u64 = (0..self.block_count()).map(|b| self.block_len(b) as u64).sum();
        total as f64 / self.blocks.len() as f64
    }
}

/// Does this pack carry a semantic section?
pub fn has_semantic(pack: &Pack) -> bool {
    pack.has_semantic()
}

/// Mount a pack from a byte source.
pub fn mount_pack(src: PackSource<'_>) -> Result<Pack> {
    mount_pack_with(src, |_| Ok(()))
}

/// Mount a pack, running a caller-supplied hook over the parsed metadata
/// before the rest of the container is decoded. Lets embedders validate
/// opaque fields (registries, policies) without the core knowing their shape.
pub fn mount_pack_with(
    src: PackSource<'_>,
    metadata_hook: impl FnOnce(&PackMeta) -> Result<()>,
) -> Result<Pack> {
    let owned;
    let bytes: &[u8] = match src {
        PackSource::Buffer(buf) => buf,
        PackSource::Bytes(ref vec) => vec,
        PackSource::Path(path) => {
            owned = std::fs::read(path)?;
            &owned
        }
        #[cfg(feature = "http")]
        PackSource::Url(url) => {
            owned = fetch_url(url)?;
            &owned
        }
    };

    let pack = parse_pack(bytes, metadata_hook)?;
    log::debug!(
        "mounted pack v{}: {} blocks, {} terms, semantic={}",
        pack.version(),
        pack.block_count(),
        pack.term_count(),
        pack.has_semantic()
    );
    Ok(pack)
}

#[cfg(feature = "http")]
fn fetch_url(url: &str) -> Result<Vec<u8>> {
    use std::io::Read;

    let response = ureq::get(url)
        .call()
        .map_err(|e| Error::Io(std::io::Error::other(format!("fetching {url}: {e}"))))?;
    let mut bytes = Vec::new();
    response
        .into_reader()
        .read_to_end(&mut bytes)
        .map_err(Error::Io)?;
    Ok(bytes)
}

fn parse_pack(bytes: &[u8], metadata_hook: impl FnOnce(&PackMeta) -> Result<()>) -> Result<Pack> {
    let mut reader = SectionReader::new(bytes);

    // Metadata first: the version decides how the rest is read.
    let meta: PackMeta = parse_json(reader.read_section("metadata")?, "metadata")?;
    if meta.version == 0 {
        return Err(Error::MalformedPack("metadata: version must be >= 1".into()));
    }
    if meta.version > PACK_VERSION {
        return Err(Error::VersionUnsupported(meta.version));
    }
    metadata_hook(&meta)?;

    let lexicon: Vec<(String, u32)> = parse_json(reader.read_section("lexicon")?, "lexicon")?;
    for (i, (term, id)) in lexicon.iter().enumerate() {
        if *id != i as u32 + 1 {
            return Err(Error::MalformedPack(format!(
                "lexicon: term {term:?} has id {id}, expected {}",
                i + 1
            )));
        }
    }

    let postings = reader.read_postings()?;

    let blocks = match parse_json(reader.read_section("blocks")?, "blocks")? {
        BlocksJson::Legacy(texts) => texts
            .into_iter()
            .map(|text| {
                // v1 never persisted lengths; recompute once at mount.
                let token_len = tokenize(&text).len() as u32;
                LoadedBlock {
                    text,
                    heading: None,
                    doc_id: None,
                    namespace: None,
                    token_len,
                }
            })
            .collect::<Vec<_>>(),
        BlocksJson::Current(payloads) => payloads
            .into_iter()
            .map(|p: BlockPayload| LoadedBlock {
                text: p.text,
                heading: p.heading,
                doc_id: p.doc_id,
                namespace: p.namespace,
                token_len: p.len.unwrap_or(0),
            })
            .collect(),
    };

    if meta.stats.blocks as usize != blocks.len() {
        return Err(Error::MalformedPack(format!(
            "stats claim {} blocks, payload has {}",
            meta.stats.blocks,
            blocks.len()
        )));
    }

    // Optional semantic tail, present iff bytes remain.
    let semantic = if reader.has_remaining() {
        let info: SemanticInfo = parse_json(reader.read_section("semantic")?, "semantic")?;
        let blob = reader.read_section("semantic blob")?;
        Some(decode_semantic(info, blob, blocks.len())?)
    } else {
        None
    };

    let block_bias = if meta.version >= VERSION_BIASED_STREAM { 1 } else { 0 };
    validate_stream(&postings, block_bias, lexicon.len() as u32, blocks.len() as u32)?;

    let term_lookup = lexicon
        .iter()
        .map(|(term, id)| (term.clone(), *id))
        .collect();

    Ok(Pack {
        meta,
        lexicon,
        term_lookup,
        postings,
        blocks,
        block_bias,
        semantic,
    })
}

fn parse_json<'a, T: serde::Deserialize<'a>>(bytes: &'a [u8], section: &str) -> Result<T> {
    serde_json::from_slice(bytes)
        .map_err(|e| Error::MalformedPack(format!("{section} section is not valid JSON: {e}")))
}

fn decode_semantic(info: SemanticInfo, blob: &[u8], block_count: usize) -> Result<SemanticSection> {
    if info.encoding != "int8_l2norm" {
        return Err(Error::MalformedPack(format!(
            "semantic: unknown encoding {:?}",
            info.encoding
        )));
    }

    let vectors_range = &info.blocks.vectors;
    let scales_range = &info.blocks.scales;
    let expected_vectors = block_count * info.dims as usize;
    let expected_scales = block_count * 2;

    if vectors_range.length != expected_vectors {
        return Err(Error::MalformedPack(format!(
            "semantic: vectors length {} does not match {} blocks × {} dims",
            vectors_range.length, block_count, info.dims
        )));
    }
    if scales_range.length != expected_scales {
        return Err(Error::MalformedPack(format!(
            "semantic: scales length {} does not match {} blocks",
            scales_range.length, block_count
        )));
    }

    let vector_bytes = blob
        .get(vectors_range.byte_offset..vectors_range.byte_offset + vectors_range.length)
        .ok_or_else(|| Error::MalformedPack("semantic: vectors range overflows blob".into()))?;
    let scale_bytes = blob
        .get(scales_range.byte_offset..scales_range.byte_offset + scales_range.length)
        .ok_or_else(|| Error::MalformedPack("semantic: scales range overflows blob".into()))?;

    let vectors = vector_bytes.iter().map(|b| *b as i8).collect();
    let scales = scale_bytes
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();

    Ok(SemanticSection { info, vectors, scales })
}

/// Walk the full stream once at mount, checking the pack invariants:
/// every term id exists in the lexicon, every block id is in range, and
/// positions are strictly increasing.
fn validate_stream(stream: &[u32], bias: u32, term_count: u32, block_count: u32) -> Result<()> {
    let mut result = Ok(());
    walk_stream(stream, bias, |term_id, block_id, positions| {
        if result.is_err() {
            return;
        }
        if term_id > term_count {
            result = Err(Error::MalformedPack(format!(
                "posting stream references term id {term_id}, lexicon has {term_count}"
            )));
            return;
        }
        if block_id >= block_count {
            result = Err(Error::MalformedPack(format!(
                "posting stream references block id {block_id}, pack has {block_count} blocks"
            )));
            return;
        }
        for window in positions.windows(2) {
            if window[1] <= window[0] {
                result = Err(Error::MalformedPack(format!(
                    "posting stream: positions not strictly increasing in block {block_id}"
                )));
                return;
            }
        }
    })?;
    result
}
