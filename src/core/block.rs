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

//! Block variants, their fixed wire layouts, and content hashing.

use crate::core::types::{Account, Amount, BlockHash, Signature, Work};
use thiserror::Error;

/// Block (de)serialization errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BlockError {
    /// The payload did not match the size implied by the block type.
    #[error("wrong block payload size")]
    WrongSize,
    /// Unknown block-type discriminant on the wire.
    #[error("unknown block type")]
    UnknownType,
}

/// Wire block-type discriminant, carried in the high byte of the extension
/// field for `publish`/`confirm_req`/`confirm_ack`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum BlockType {
    /// Not a block (used by `confirm_req`/`confirm_ack` hash-only variants).
    NotABlock = 1,
    /// Legacy `send` block.
    Send = 2,
    /// Legacy `receive` block.
    Receive = 3,
    /// Legacy `open` block.
    Open = 4,
    /// Legacy `change` block.
    Change = 5,
    /// Universal `state` block.
    State = 6,
}

impl BlockType {
    /// Decode from the wire discriminant byte.
    pub fn from_u8(b: u8) -> Option<Self> {
        Some(match b {
            1 => BlockType::NotABlock,
            2 => BlockType::Send,
            3 => BlockType::Receive,
            4 => BlockType::Open,
            5 => BlockType::Change,
            6 => BlockType::State,
            _ => return None,
        })
    }

    /// Fixed payload size in bytes for this block type, if it has one.
    pub fn payload_size(self) -> Option<usize> {
        match self {
            BlockType::NotABlock => None,
            BlockType::Send => Some(SendBlock::WIRE_SIZE),
            BlockType::Receive => Some(ReceiveBlock::WIRE_SIZE),
            BlockType::Open => Some(OpenBlock::WIRE_SIZE),
            BlockType::Change => Some(ChangeBlock::WIRE_SIZE),
            BlockType::State => Some(StateBlock::WIRE_SIZE),
        }
    }
}

/// `send` block: previous(32) || destination(32) || balance(16) || signature(64) || work(8).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SendBlock {
    /// Previous block hash in the sender's chain.
    pub previous: BlockHash,
    /// Destination account.
    pub destination: Account,
    /// Resulting balance after the send, big-endian on the wire.
    pub balance: Amount,
    /// Block signature.
    pub signature: Signature,
    /// Proof of work over `previous`.
    pub work: Work,
}

impl SendBlock {
    /// Payload size on the wire.
    pub const WIRE_SIZE: usize = 152;

    /// Content hash: BLAKE2b-256(previous || destination || balance).
    pub fn hash(&self) -> BlockHash {
        crate::core::types::blake2b_256(&[
            &self.previous.0,
            &self.destination.0,
            &self.balance.0.to_be_bytes(),
        ])
    }

    /// Root for work validation: the previous block hash.
    pub fn root(&self) -> BlockHash {
        self.previous
    }
}

/// `receive` block: previous(32) || source(32) || signature(64) || work(8).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReceiveBlock {
    /// Previous block hash in the receiver's chain.
    pub previous: BlockHash,
    /// Hash of the send block being received.
    pub source: BlockHash,
    /// Block signature.
    pub signature: Signature,
    /// Proof of work over `previous`.
    pub work: Work,
}

impl ReceiveBlock {
    /// Payload size on the wire.
    pub const WIRE_SIZE: usize = 136;

    /// Content hash: BLAKE2b-256(previous || source).
    pub fn hash(&self) -> BlockHash {
        crate::core::types::blake2b_256(&[&self.previous.0, &self.source.0])
    }

    /// Root for work validation: the previous block hash.
    pub fn root(&self) -> BlockHash {
        self.previous
    }
}

/// `open` block: source(32) || representative(32) || account(32) || signature(64) || work(8).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OpenBlock {
    /// Hash of the send block funding this account's first block.
    pub source: BlockHash,
    /// Representative this account delegates voting weight to.
    pub representative: Account,
    /// The account being opened.
    pub account: Account,
    /// Block signature.
    pub signature: Signature,
    /// Proof of work over `account`.
    pub work: Work,
}

impl OpenBlock {
    /// Payload size on the wire.
    pub const WIRE_SIZE: usize = 168;

    /// Content hash: BLAKE2b-256(source || representative || account).
    pub fn hash(&self) -> BlockHash {
        crate::core::types::blake2b_256(&[&self.source.0, &self.representative.0, &self.account.0])
    }

    /// Root for work validation: the account being opened.
    pub fn root(&self) -> BlockHash {
        BlockHash(self.account.0)
    }
}

/// `change` block: previous(32) || representative(32) || signature(64) || work(8).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChangeBlock {
    /// Previous block hash in this account's chain.
    pub previous: BlockHash,
    /// New representative.
    pub representative: Account,
    /// Block signature.
    pub signature: Signature,
    /// Proof of work over `previous`.
    pub work: Work,
}

impl ChangeBlock {
    /// Payload size on the wire.
    pub const WIRE_SIZE: usize = 136;

    /// Content hash: BLAKE2b-256(previous || representative).
    pub fn hash(&self) -> BlockHash {
        crate::core::types::blake2b_256(&[&self.previous.0, &self.representative.0])
    }

    /// Root for work validation: the previous block hash.
    pub fn root(&self) -> BlockHash {
        self.previous
    }
}

/// Domain-separation preamble mixed into every `state` block hash, to keep
/// the state-block hash space disjoint from the legacy block types above.
const STATE_BLOCK_PREAMBLE: [u8; 32] = {
    let mut b = [0u8; 32];
    b[31] = 0x06;
    b
};

/// `state` block: account(32) || previous(32) || representative(32) || balance(16)
/// || link(32) || signature(64) || work(8).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StateBlock {
    /// Owning account.
    pub account: Account,
    /// Previous block hash, or zero for the account's first block.
    pub previous: BlockHash,
    /// Representative this account delegates voting weight to.
    pub representative: Account,
    /// Resulting balance after this block, big-endian on the wire.
    pub balance: Amount,
    /// Link field: send destination account, receive source hash, or zero.
    pub link: BlockHash,
    /// Block signature.
    pub signature: Signature,
    /// Proof of work over `root()`.
    pub work: Work,
}

impl StateBlock {
    /// Payload size on the wire.
    pub const WIRE_SIZE: usize = 216;

    /// Content hash: BLAKE2b-256(preamble || account || previous || representative || balance || link).
    pub fn hash(&self) -> BlockHash {
        crate::core::types::blake2b_256(&[
            &STATE_BLOCK_PREAMBLE,
            &self.account.0,
            &self.previous.0,
            &self.representative.0,
            &self.balance.0.to_be_bytes(),
            &self.link.0,
        ])
    }

    /// Root for work validation: `account` for the first block, `previous` otherwise.
    pub fn root(&self) -> BlockHash {
        if self.previous == BlockHash::ZERO {
            BlockHash(self.account.0)
        } else {
            self.previous
        }
    }
}

/// A block of any variant. Immutable once constructed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Block {
    /// Legacy send block.
    Send(SendBlock),
    /// Legacy receive block.
    Receive(ReceiveBlock),
    /// Legacy open block.
    Open(OpenBlock),
    /// Legacy change block.
    Change(ChangeBlock),
    /// Universal state block.
    State(StateBlock),
}

impl Block {
    /// The wire block-type discriminant for this variant.
    pub fn block_type(&self) -> BlockType {
        match self {
            Block::Send(_) => BlockType::Send,
            Block::Receive(_) => BlockType::Receive,
            Block::Open(_) => BlockType::Open,
            Block::Change(_) => BlockType::Change,
            Block::State(_) => BlockType::State,
        }
    }

    /// Content hash, dispatched to the variant.
    pub fn hash(&self) -> BlockHash {
        match self {
            Block::Send(b) => b.hash(),
            Block::Receive(b) => b.hash(),
            Block::Open(b) => b.hash(),
            Block::Change(b) => b.hash(),
            Block::State(b) => b.hash(),
        }
    }

    /// Work-validation root, dispatched to the variant.
    pub fn root(&self) -> BlockHash {
        match self {
            Block::Send(b) => b.root(),
            Block::Receive(b) => b.root(),
            Block::Open(b) => b.root(),
            Block::Change(b) => b.root(),
            Block::State(b) => b.root(),
        }
    }

    /// Attached proof-of-work value, dispatched to the variant.
    pub fn work(&self) -> Work {
        match self {
            Block::Send(b) => b.work,
            Block::Receive(b) => b.work,
            Block::Open(b) => b.work,
            Block::Change(b) => b.work,
            Block::State(b) => b.work,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn send() -> SendBlock {
        SendBlock {
            previous: BlockHash::from_bytes([1; 32]),
            destination: Account::from_bytes([2; 32]),
            balance: Amount(3),
            signature: Signature([4; 64]),
            work: Work([5; 8]),
        }
    }

    #[test]
    fn send_hash_ignores_signature_and_work() {
        let a = send();
        let mut b = a;
        b.signature = Signature([9; 64]);
        b.work = Work([9; 8]);
        assert_eq!(a.hash(), b.hash());
    }

    #[test]
    fn state_block_root_switches_on_previous() {
        let mut s = StateBlock {
            account: Account::from_bytes([7; 32]),
            previous: BlockHash::ZERO,
            representative: Account::from_bytes([8; 32]),
            balance: Amount(1),
            link: BlockHash::ZERO,
            signature: Signature([0; 64]),
            work: Work::ZERO,
        };
        assert_eq!(s.root(), BlockHash::from_bytes([7; 32]));
        s.previous = BlockHash::from_bytes([9; 32]);
        assert_eq!(s.root(), BlockHash::from_bytes([9; 32]));
    }

    #[test]
    fn block_type_round_trips_through_u8() {
        for t in [
            BlockType::NotABlock,
            BlockType::Send,
            BlockType::Receive,
            BlockType::Open,
            BlockType::Change,
            BlockType::State,
        ] {
            assert_eq!(BlockType::from_u8(t as u8), Some(t));
        }
        assert_eq!(BlockType::from_u8(0), None);
        assert_eq!(BlockType::from_u8(7), None);
    }

    #[test]
    fn payload_sizes_match_spec_budget() {
        assert_eq!(BlockType::Send.payload_size(), Some(152));
        assert_eq!(BlockType::Receive.payload_size(), Some(136));
        assert_eq!(BlockType::Open.payload_size(), Some(168));
        assert_eq!(BlockType::Change.payload_size(), Some(136));
        assert_eq!(BlockType::State.payload_size(), Some(216));
    }
}
