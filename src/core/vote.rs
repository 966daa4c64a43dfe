// Copyright (c) 2026 Glacier Contributors
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Votes: an account's signed endorsement of one or more blocks/hashes.

use crate::core::block::Block;
use crate::core::types::{blake2b_256, Account, BlockHash, Signature};
use thiserror::Error;

/// Maximum number of entries a vote may carry.
pub const MAX_VOTE_ENTRIES: usize = 12;

/// Domain separator mixed into the signing hash whenever the vote is not a
/// single full block (i.e. it carries a bare hash, or more than one entry).
const VOTE_DOMAIN_PREFIX: &[u8] = b"vote ";

/// Vote construction errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VoteError {
    /// A vote must carry at least one entry.
    #[error("vote has no entries")]
    Empty,
    /// A vote may carry at most `MAX_VOTE_ENTRIES` entries.
    #[error("vote has more than {MAX_VOTE_ENTRIES} entries")]
    TooManyEntries,
}

/// A single voted-for item: either a full block or a bare block hash.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VoteEntry {
    /// A full block (only ever the sole entry in a vote).
    Block(Block),
    /// A bare hash (used when a vote covers multiple blocks).
    Hash(BlockHash),
}

impl VoteEntry {
    /// The hash contributed to the vote's signing hash.
    pub fn hash(&self) -> BlockHash {
        match self {
            VoteEntry::Block(b) => b.hash(),
            VoteEntry::Hash(h) => *h,
        }
    }
}

/// An account's signed endorsement of one or more blocks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Vote {
    /// Voting account.
    pub account: Account,
    /// Ed25519 signature over the signing hash.
    pub signature: Signature,
    /// Monotonic per-account sequence number.
    pub sequence: u64,
    /// Non-empty, at most `MAX_VOTE_ENTRIES`-long list of entries.
    entries: Vec<VoteEntry>,
}

impl Vote {
    /// Construct a vote, validating the entry-count invariant.
    pub fn new(
        account: Account,
        signature: Signature,
        sequence: u64,
        entries: Vec<VoteEntry>,
    ) -> Result<Self, VoteError> {
        if entries.is_empty() {
            return Err(VoteError::Empty);
        }
        if entries.len() > MAX_VOTE_ENTRIES {
            return Err(VoteError::TooManyEntries);
        }
        Ok(Self {
            account,
            signature,
            sequence,
            entries,
        })
    }

    /// The vote's entries.
    pub fn entries(&self) -> &[VoteEntry] {
        &self.entries
    }

    /// True if any entry is a bare hash rather than a full block.
    fn has_hash_only_entry(&self) -> bool {
        self.entries
            .iter()
            .any(|e| matches!(e, VoteEntry::Hash(_)))
    }

    /// Signing hash: BLAKE2b-256(["vote " if multi-or-hash-only] || each
    /// entry hash || little-endian sequence).
    pub fn signing_hash(&self) -> BlockHash {
        let domain_separated = self.has_hash_only_entry() || self.entries.len() > 1;
        let seq_bytes = self.sequence.to_le_bytes();
        let mut parts: Vec<&[u8]> = Vec::with_capacity(self.entries.len() + 2);
        if domain_separated {
            parts.push(VOTE_DOMAIN_PREFIX);
        }
        let hashes: Vec<[u8; 32]> = self.entries.iter().map(|e| *e.hash().as_bytes()).collect();
        for h in &hashes {
            parts.push(h);
        }
        parts.push(&seq_bytes);
        blake2b_256(&parts)
    }

    /// Full hash: BLAKE2b-256(signing_hash || account || signature). Used as
    /// the content-hash key for the vote uniquer.
    pub fn full_hash(&self) -> BlockHash {
        blake2b_256(&[
            self.signing_hash().as_bytes(),
            &self.account.0,
            &self.signature.0,
        ])
    }
}
