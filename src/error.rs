// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Error types for cairn.
//!
//! Every failure carries a short kind tag plus a message naming the offending
//! item (field, index, or section). Validation is eager: API entry points
//! reject bad input before any scan or write, so a failed `query` leaves the
//! mounted pack fully usable and a failed `build_pack` returns no bytes.

use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Caller supplied a value outside its contract. The message names the
    /// field or index, e.g. "doc at index 4: text must be a non-empty string".
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Pack bytes are truncated, a section length prefix overflows the
    /// buffer, a JSON section is unparsable, or the posting stream references
    /// a term or block that does not exist.
    #[error("malformed pack: {0}")]
    MalformedPack(String),

    /// Metadata version is newer than this loader supports. Older versions
    /// are mounted tolerantly; unknown-future versions are refused.
    #[error("unsupported pack version {0} (max supported {max})", max = crate::pack::PACK_VERSION)]
    VersionUnsupported(u32),

    /// Semantic rerank was forced but the pack carries no semantic section.
    /// Without `force` the rerank is silently skipped instead.
    #[error("semantic rerank forced but pack has no semantic section")]
    SemanticMissing,

    /// An internal invariant broke. Reaching this is a bug in cairn.
    #[error("internal error: {0}")]
    Internal(String),

    /// Byte acquisition failed. Only `mount_pack` performs I/O.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
