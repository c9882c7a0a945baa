// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! The pack container: a single self-contained binary artifact.
//!
//! One file holds everything a query needs - metadata, lexicon, positional
//! posting stream, block payloads, and optionally a quantized vector tail.
//! Packs are produced by one builder invocation, serialized, and immutable
//! from then on. No runtime services, no sidecar files, no network
//! dependency once the bytes are local.
//!
//! `format` owns the framing and wire shapes, `writer` the serialization,
//! `loader` the mount path with its version tolerance. The posting stream
//! grammar itself lives in [`crate::index`], next to the code that emits it.

mod format;
mod loader;
pub(crate) mod writer;

pub use format::{
    BlockPayload, ByteRange, PackMeta, PackStats, ScaleRange, SemanticInfo, SemanticLayout,
    PACK_VERSION,
};
pub use loader::{has_semantic, mount_pack, mount_pack_with, Pack, PackSource};
