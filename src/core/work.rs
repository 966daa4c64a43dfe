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

//! Work validation: the collaborator interface the parser calls into to
//! reject `insufficient_work`. The generator (finding a work value) is an
//! external collaborator and out of scope for this crate; only verification
//! lives here.

use crate::core::types::{BlockHash, Work};
use blake2::digest::{Update, VariableOutput};
use blake2::Blake2bVar;

/// Default work difficulty threshold for send/change/open/receive blocks.
pub const DEFAULT_THRESHOLD: u64 = 0xffff_ffc0_0000_0000;

/// Given a root and difficulty threshold, checks whether an attached work
/// value satisfies proof-of-work.
pub trait WorkValidator: Send + Sync {
    /// Returns true if `work` over `root` meets or exceeds `threshold`.
    fn is_valid(&self, root: BlockHash, threshold: u64, work: Work) -> bool;
}

/// BLAKE2b-keyed work validator: hashes `work || root` with an 8-byte BLAKE2b
/// digest and compares the little-endian interpretation against `threshold`.
#[derive(Clone, Copy, Debug, Default)]
pub struct Blake2bWorkValidator;

impl Blake2bWorkValidator {
    /// Compute the 8-byte work digest for `(work, root)`.
    pub fn digest(root: BlockHash, work: Work) -> u64 {
        let mut hasher = Blake2bVar::new(8).expect("8 is a valid BLAKE2b output size");
        hasher.update(&work.0);
        hasher.update(root.as_bytes());
        let mut out = [0u8; 8];
        hasher
            .finalize_variable(&mut out)
            .expect("output buffer matches requested size");
        u64::from_le_bytes(out)
    }
}

impl WorkValidator for Blake2bWorkValidator {
    fn is_valid(&self, root: BlockHash, threshold: u64, work: Work) -> bool {
        Self::digest(root, work) >= threshold
    }
}

/// A validator that accepts everything; useful for tests exercising the
/// parser without generating real proof-of-work.
#[derive(Clone, Copy, Debug, Default)]
pub struct AlwaysValidWork;

impl WorkValidator for AlwaysValidWork {
    fn is_valid(&self, _root: BlockHash, _threshold: u64, _work: Work) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_work_fails_default_threshold() {
        let v = Blake2bWorkValidator;
        assert!(!v.is_valid(BlockHash::ZERO, DEFAULT_THRESHOLD, Work::ZERO));
    }

    #[test]
    fn digest_is_deterministic_and_root_dependent() {
        let w = Work([1, 2, 3, 4, 5, 6, 7, 8]);
        let d1 = Blake2bWorkValidator::digest(BlockHash::from_bytes([1; 32]), w);
        let d2 = Blake2bWorkValidator::digest(BlockHash::from_bytes([1; 32]), w);
        let d3 = Blake2bWorkValidator::digest(BlockHash::from_bytes([2; 32]), w);
        assert_eq!(d1, d2);
        assert_ne!(d1, d3);
    }

    #[test]
    fn always_valid_accepts_zero_work() {
        assert!(AlwaysValidWork.is_valid(BlockHash::ZERO, u64::MAX, Work::ZERO));
    }
}
