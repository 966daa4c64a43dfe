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

//! Message payload types. Encoding/decoding lives in [`crate::wire::codec`].

use crate::core::block::Block;
use crate::core::types::{Account, BlockHash, Endpoint, HashPair, Signature};
use crate::core::vote::Vote;

/// Fixed number of peer slots carried by a `keepalive` message.
pub const KEEPALIVE_PEER_COUNT: usize = 8;

/// Peer list gossip: exactly 8 endpoint slots, zero-padded when fewer peers
/// are known.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Keepalive {
    /// Peer endpoints, zero endpoint where unused.
    pub peers: [Endpoint; KEEPALIVE_PEER_COUNT],
}

impl Default for Keepalive {
    fn default() -> Self {
        Self {
            peers: [Endpoint::ZERO; KEEPALIVE_PEER_COUNT],
        }
    }
}

/// Block broadcast.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Publish {
    /// The broadcast block.
    pub block: Block,
}

/// A request for confirmation of one block, or a batch of bare hash/root pairs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfirmReq {
    /// Request confirmation of a full block.
    Block(Block),
    /// Request confirmation of a batch of (hash, root) pairs.
    Hashes(Vec<HashPair>),
}

/// A confirmation vote.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfirmAck {
    /// The carried vote.
    pub vote: Vote,
}

/// Bootstrap: pull blocks between `start` (inclusive) and `end` (exclusive).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BulkPull {
    /// Starting account or block hash.
    pub start: BlockHash,
    /// Ending block hash, or zero for "until the chain head".
    pub end: BlockHash,
}

/// Bootstrap: pull one account's chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BulkPullAccount {
    /// Account whose chain is requested.
    pub account: Account,
    /// Starting point within the chain (hash or amount threshold).
    pub start: BlockHash,
    /// Request flags (pending-include, pending-address-only, ...).
    pub flags: u8,
}

/// Bootstrap: push blocks (TCP stream follows; the message itself is a bare signal).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct BulkPush;

/// Bootstrap: frontier scan request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrontierReq {
    /// Starting account (inclusive).
    pub start: Account,
    /// Only return frontiers modified within this many seconds, 0 for unlimited.
    pub age: u32,
    /// Maximum number of frontiers to return, 0 for unlimited.
    pub count: u32,
}

/// Node identity handshake: an optional cookie query and/or an optional
/// signed response to a previously received cookie.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct NodeIdHandshake {
    /// Challenge cookie to be signed by the peer.
    pub query: Option<[u8; 32]>,
    /// This node's identity and signature over a previously received cookie.
    pub response: Option<(Account, Signature)>,
}

/// A fully decoded message of any type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Message {
    /// Peer list gossip.
    Keepalive(Keepalive),
    /// Block broadcast.
    Publish(Publish),
    /// Confirmation request.
    ConfirmReq(ConfirmReq),
    /// Confirmation vote.
    ConfirmAck(ConfirmAck),
    /// Bootstrap: pull blocks.
    BulkPull(BulkPull),
    /// Bootstrap: pull one account's chain.
    BulkPullAccount(BulkPullAccount),
    /// Bootstrap: push blocks.
    BulkPush(BulkPush),
    /// Bootstrap: frontier scan.
    FrontierReq(FrontierReq),
    /// Node identity handshake.
    NodeIdHandshake(NodeIdHandshake),
}
