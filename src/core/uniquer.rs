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

//! Weak-reference interning caches for blocks and votes.
//!
//! A [`Uniquer`] maps content hash to a non-owning reference of an interned
//! value. `unique(x)` returns `x` itself (now indexed) the first time a given
//! hash is seen, or a previously-indexed value with an equal content hash on
//! later calls. Entries whose last strong holder has dropped are pruned
//! opportunistically rather than eagerly, so a single mutex is sufficient.

use crate::core::block::Block;
use crate::core::types::BlockHash;
use crate::core::vote::Vote;
use rand::seq::IteratorRandom;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

/// Number of random entries probed for liveness on every `unique` call.
const CLEANUP_PROBE_COUNT: usize = 2;

/// Generic content-addressed intern cache over `Arc<T>`.
pub struct Uniquer<T> {
    table: Mutex<HashMap<BlockHash, Weak<T>>>,
    key_of: fn(&T) -> BlockHash,
}

impl<T> Uniquer<T> {
    /// Create a uniquer keyed by `key_of` (the value's content hash function).
    pub fn new(key_of: fn(&T) -> BlockHash) -> Self {
        Self {
            table: Mutex::new(HashMap::new()),
            key_of,
        }
    }

    /// Return the canonical shared instance for `value`: either `value`
    /// itself (now interned) or a previously-interned value with the same
    /// content hash.
    pub fn unique(&self, value: Arc<T>) -> Arc<T> {
        let key = (self.key_of)(&value);
        let mut table = self.table.lock().expect("uniquer mutex poisoned");

        self.opportunistic_cleanup(&mut table);

        if let Some(existing) = table.get(&key).and_then(Weak::upgrade) {
            return existing;
        }
        table.insert(key, Arc::downgrade(&value));
        value
    }

    /// Number of live entries currently indexed (includes entries whose
    /// referent has since dropped but has not yet been probed away).
    pub fn size(&self) -> usize {
        self.table.lock().expect("uniquer mutex poisoned").len()
    }

    fn opportunistic_cleanup(&self, table: &mut HashMap<BlockHash, Weak<T>>) {
        let mut rng = rand::thread_rng();
        let dead: Vec<BlockHash> = table
            .iter()
            .filter(|(_, w)| w.strong_count() == 0)
            .map(|(k, _)| *k)
            .choose_multiple(&mut rng, CLEANUP_PROBE_COUNT);
        for key in dead {
            table.remove(&key);
        }
    }
}

/// Interns [`Block`] values by content hash.
pub type BlockUniquer = Uniquer<Block>;

/// Construct a block uniquer.
pub fn block_uniquer() -> BlockUniquer {
    Uniquer::new(Block::hash)
}

/// Interns [`Vote`] values by content hash, canonicalizing the first entry's
/// block (if any) through a shared [`BlockUniquer`] first.
pub struct VoteUniquer {
    blocks: Arc<BlockUniquer>,
    votes: Uniquer<Vote>,
}

impl VoteUniquer {
    /// Create a vote uniquer backed by the given block uniquer.
    pub fn new(blocks: Arc<BlockUniquer>) -> Self {
        Self {
            blocks,
            votes: Uniquer::new(Vote::full_hash),
        }
    }

    /// Canonicalize `vote`'s first entry (if it is a full block) through the
    /// block uniquer, then intern the vote itself.
    pub fn unique(&self, vote: Arc<Vote>) -> Arc<Vote> {
        use crate::core::vote::VoteEntry;
        let needs_canon = matches!(vote.entries().first(), Some(VoteEntry::Block(_)));
        let vote = if needs_canon {
            let VoteEntry::Block(first) = vote.entries()[0] else {
                unreachable!("checked above")
            };
            let canon = self.blocks.unique(Arc::new(first));
            if *canon == first {
                vote
            } else {
                let mut entries: Vec<VoteEntry> = vote.entries().to_vec();
                entries[0] = VoteEntry::Block(*canon);
                Arc::new(
                    Vote::new(vote.account, vote.signature, vote.sequence, entries)
                        .expect("re-wrapping a validated vote cannot fail"),
                )
            }
        } else {
            vote
        };
        self.votes.unique(vote)
    }

    /// Number of live vote entries currently indexed.
    pub fn size(&self) -> usize {
        self.votes.size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::block::SendBlock;
    use crate::core::types::{Account, Amount, Signature, Work};

    fn send(previous: u8) -> Block {
        Block::Send(SendBlock {
            previous: BlockHash::from_bytes([previous; 32]),
            destination: Account::from_bytes([9; 32]),
            balance: Amount(1),
            signature: Signature([0; 64]),
            work: Work::ZERO,
        })
    }

    #[test]
    fn unique_idempotent_for_equal_content() {
        let u = block_uniquer();
        let a = Arc::new(send(1));
        let b = Arc::new(send(1)); // distinct allocation, equal content
        let ua = u.unique(a);
        let ub = u.unique(b);
        assert!(Arc::ptr_eq(&ua, &ub));
        assert_eq!(u.size(), 1);
    }

    #[test]
    fn unique_distinguishes_distinct_content() {
        let u = block_uniquer();
        let a = u.unique(Arc::new(send(1)));
        let b = u.unique(Arc::new(send(2)));
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(u.size(), 2);
    }

    #[test]
    fn dropping_all_strong_refs_allows_eventual_pruning() {
        let u = block_uniquer();
        {
            let _a = u.unique(Arc::new(send(1)));
        }
        // _a dropped; entry may or may not have been probed away yet, but
        // re-unique-ing equal content must not panic and must succeed.
        let b = u.unique(Arc::new(send(1)));
        assert_eq!(*b, send(1));
    }
}
