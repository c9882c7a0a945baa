// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Positional inverted index construction and the posting stream grammar.
//!
//! The whole index is one flat `u32` sequence. For each term: the term id,
//! then one entry per block containing it, then a `0`. Each block entry is
//! the block id, the positions of the term inside the block, and a `0`.
//! Term id `0` is reserved as the delimiter, which forces two biases:
//!
//! - positions are stored `+1` (a token at position 0 must be encodable),
//! - block ids are stored `+1` from pack version 3 on; older packs stored
//!   them raw and could not represent block 0 unambiguously.
//!
//! # INVARIANTS
//!
//! 1. **TERM_IDS_DENSE**: ids are assigned 1..=T in first-seen order
//! 2. **BLOCKS_ASCENDING**: within a term, block entries appear in the order
//!    blocks were indexed, which is ascending block id
//! 3. **POSITIONS_INCREASING**: positions within a block entry are strictly
//!    increasing (token order)

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::text::Token;

/// Accumulates term ids and postings over a block sequence.
///
/// Blocks must be added in block-id order; that order is what makes the
/// emitted stream canonical.
#[derive(Debug, Default)]
pub struct IndexBuilder {
    term_ids: HashMap<String, u32>,
    /// `terms[id - 1]` is the term for `id`; insertion order is id order.
    terms: Vec<String>,
    /// `postings[id - 1]`: per-term list of `(block_id, positions)`.
    postings: Vec<Vec<(u32, Vec<u32>)>>,
}

impl IndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index one block's tokens. An empty token list is fine - the block
    /// simply appears in no posting entry.
    pub fn add_block(&mut self, block_id: u32, tokens: &[Token]) {
        for token in tokens {
            let term_id = match self.term_ids.get(&token.term) {
                Some(id) => *id,
                None => {
                    let id = self.terms.len() as u32 + 1;
                    self.term_ids.insert(token.term.clone(), id);
                    self.terms.push(token.term.clone());
                    self.postings.push(Vec::new());
                    id
                }
            };

            let entries = &mut self.postings[(term_id - 1) as usize];
            match entries.last_mut() {
                Some((last_block, positions)) if *last_block == block_id => {
                    positions.push(token.position);
                }
                _ => entries.push((block_id, vec![token.position])),
            }
        }
    }

    /// Number of distinct terms seen so far.
    pub fn term_count(&self) -> u32 {
        self.terms.len() as u32
    }

    /// Emit the lexicon and the flat posting stream.
    ///
    /// The stream uses the current-format encoding: block ids and positions
    /// both stored `+1`. Term entries are emitted in term-id order.
    pub fn finish(self) -> (Vec<(String, u32)>, Vec<u32>) {
        let lexicon: Vec<(String, u32)> = self
            .terms
            .into_iter()
            .enumerate()
            .map(|(i, term)| (term, i as u32 + 1))
            .collect();

        let mut stream = Vec::new();
        for (i, entries) in self.postings.into_iter().enumerate() {
            stream.push(i as u32 + 1); // term_id
            for (block_id, positions) in entries {
                stream.push(block_id + 1);
                for p in positions {
                    stream.push(p + 1);
                }
                stream.push(0); // end of block entry
            }
            stream.push(0); // end of term entry
        }

        (lexicon, stream)
    }
}

/// Walk a posting stream, invoking `on_block(term_id, block_id, positions)`
/// for every block entry. Positions are decoded back to 0-based.
///
/// `block_bias` is 1 for pack version ≥ 3 and 0 for older packs; the caller
/// reads it off the pack metadata. Structural damage (truncation mid-entry,
/// a zero term id) surfaces as `MalformedPack`.
pub(crate) fn walk_stream(
    stream: &[u32],
    block_bias: u32,
    mut on_block: impl FnMut(u32, u32, &[u32]),
) -> Result<()> {
    let mut positions = Vec::new();
    let mut i = 0;

    while i < stream.len() {
        let term_id = stream[i];
        i += 1;
        if term_id == 0 {
            return Err(Error::MalformedPack(format!(
                "posting stream: reserved term id 0 at offset {}",
                i - 1
            )));
        }

        loop {
            let marker = *stream.get(i).ok_or_else(|| truncated(i))?;
            i += 1;
            if marker == 0 {
                break; // end of term entry
            }
            let block_id = marker - block_bias;

            positions.clear();
            loop {
                let p = *stream.get(i).ok_or_else(|| truncated(i))?;
                i += 1;
                if p == 0 {
                    break; // end of block entry
                }
                positions.push(p - 1);
            }
            on_block(term_id, block_id, &positions);
        }
    }

    Ok(())
}

fn truncated(offset: usize) -> Error {
    Error::MalformedPack(format!("posting stream truncated at entry {offset}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::tokenize;

    fn build(texts: &[&str]) -> (Vec<(String, u32)>, Vec<u32>) {
        let mut builder = IndexBuilder::new();
        for (i, text) in texts.iter().enumerate() {
            builder.add_block(i as u32, &tokenize(text));
        }
        builder.finish()
    }

    #[test]
    fn term_ids_assigned_in_first_seen_order() {
        let (lexicon, _) = build(&["beta alpha", "alpha gamma"]);
        assert_eq!(
            lexicon,
            vec![
                ("beta".to_string(), 1),
                ("alpha".to_string(), 2),
                ("gamma".to_string(), 3),
            ]
        );
    }

    #[test]
    fn stream_round_trips_through_walk() {
        let (_, stream) = build(&["alpha beta alpha", "beta"]);

        let mut seen: Vec<(u32, u32, Vec<u32>)> = Vec::new();
        walk_stream(&stream, 1, |term, block, positions| {
            seen.push((term, block, positions.to_vec()));
        })
        .unwrap();

        assert_eq!(
            seen,
            vec![
                (1, 0, vec![0, 2]), // alpha in block 0, positions 0 and 2
                (2, 0, vec![1]),    // beta in block 0
                (2, 1, vec![0]),    // beta in block 1
            ]
        );
    }

    #[test]
    fn block_zero_is_representable() {
        // The +1 bias is the whole point: block 0 at position 0 encodes as
        // nonzero markers.
        let (_, stream) = build(&["solo"]);
        assert_eq!(stream, vec![1, 1, 1, 0, 0]);
    }

    #[test]
    fn empty_block_produces_no_entries() {
        let (lexicon, stream) = build(&["", "word"]);
        assert_eq!(lexicon.len(), 1);
        let mut blocks = Vec::new();
        walk_stream(&stream, 1, |_, block, _| blocks.push(block)).unwrap();
        assert_eq!(blocks, vec![1]);
    }

    #[test]
    fn repeated_terms_share_one_block_entry() {
        let (_, stream) = build(&["echo echo echo"]);
        // term 1, block 0(+1), positions 0,1,2 (+1 each), end, end
        assert_eq!(stream, vec![1, 1, 1, 2, 3, 0, 0]);
    }

    #[test]
    fn walk_rejects_zero_term_id() {
        let err = walk_stream(&[0, 1, 1, 0, 0], 1, |_, _, _| {}).unwrap_err();
        assert!(err.to_string().contains("term id 0"));
    }

    #[test]
    fn walk_rejects_truncation() {
        // Stream ends in the middle of a block entry.
        let err = walk_stream(&[1, 1, 1], 1, |_, _, _| {}).unwrap_err();
        assert!(err.to_string().contains("truncated"));
    }

    #[test]
    fn walk_honors_legacy_raw_block_ids() {
        // Pre-v3 stream: block ids raw. Block 1 of a two-block pack.
        let stream = vec![1, 1, 1, 0, 0];
        let mut blocks = Vec::new();
        walk_stream(&stream, 0, |_, block, _| blocks.push(block)).unwrap();
        assert_eq!(blocks, vec![1]);
    }
}
