//! Local-first, embeddable knowledge retrieval.
//!
//! cairn builds a single self-contained **pack** from a corpus of short text
//! documents and serves deterministic ranked queries against it with zero
//! runtime services - no vector database, no network dependency, nothing to
//! operate. One binary artifact holds the metadata, lexicon, positional
//! posting stream, block payloads, and optionally an int8-quantized vector
//! tail for semantic rerank.
//!
//! # Architecture
//!
//! ```text
//! build time                              query time
//! ──────────                              ──────────
//! docs ──▶ text.rs ──▶ index.rs ─┐        bytes ──▶ pack::loader
//!            │                   │                     │
//!            │        quant.rs ──┤        query text ──▶ text.rs
//!            ▼                   ▼                     ▼
//!        builder.rs ──▶ pack::writer ──▶ bytes     query/ (scan, BM25L,
//!                                                  expansion, KNS, rerank)
//!                                                      │
//!                                                      ▼
//!                                        diversify.rs ──▶ hits ──▶ patch.rs
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use cairn::{build_pack, mount_pack, query, BuildOptions, Document, PackSource, QueryOptions};
//!
//! # fn main() -> cairn::Result<()> {
//! let docs = vec![
//!     Document::new("guide", "Throttling caps the event rate across the bridge."),
//!     Document::new("faq", "Debounce waits for silence; throttle enforces a maximum rate."),
//! ];
//! let bytes = build_pack(&docs, &BuildOptions::default())?;
//!
//! let pack = mount_pack(PackSource::Bytes(bytes))?;
//! let hits = query(&pack, "throttle bridge", &QueryOptions::default())?;
//! assert_eq!(hits[0].source.as_deref(), Some("guide"));
//! # Ok(())
//! # }
//! ```
//!
//! # Determinism
//!
//! The whole pipeline is a pure function of (pack bytes, query text,
//! options): identical inputs produce byte-identical hit sequences across
//! runs and platforms. Packs are immutable once built; a mounted [`Pack`]
//! is `Send + Sync` and serves concurrent queries without locks.

// Module declarations
mod builder;
mod config;
mod diversify;
mod error;
mod index;
mod pack;
mod patch;
mod quant;
mod query;
mod signature;
mod text;

// Re-exports for public API
pub use builder::{build_pack, BuildOptions, Document, QuantizationKind, SemanticBuildOptions};
pub use config::ScoringConfig;
pub use diversify::jaccard5;
pub use error::{Error, Result};
pub use index::IndexBuilder;
pub use pack::{
    has_semantic, mount_pack, mount_pack_with, BlockPayload, ByteRange, Pack, PackMeta,
    PackSource, PackStats, ScaleRange, SemanticInfo, SemanticLayout, PACK_VERSION,
};
pub use patch::{make_context_patch, ContextPatch, PatchBudget, Snippet};
pub use quant::{quantize, similarity, QuantizedVector};
pub use query::{
    lex_confidence, query, validate_query_options, BlendOptions, ExpansionOptions, Hit,
    QueryOptions, SemanticMode, SemanticOptions,
};
pub use signature::{kns_distance, kns_signature, KnsSignature};
pub use text::{normalize, strip_markdown, tokenize, Token};
