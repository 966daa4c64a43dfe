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

//! Byte-exact encode/decode for blocks and messages.
//!
//! Multi-byte integers are little-endian except the endpoint port and block
//! balances, which are big-endian on the wire (matching the reference
//! protocol's big-number convention).

use crate::core::block::{
    Block, BlockError, BlockType, ChangeBlock, OpenBlock, ReceiveBlock, SendBlock, StateBlock,
};
use crate::core::types::{Account, Amount, BlockHash, Endpoint, HashPair, Signature, Work};
use crate::core::vote::{Vote, VoteEntry, VoteError};
use crate::wire::header::Extensions;
use crate::wire::messages::{
    BulkPull, BulkPullAccount, BulkPush, ConfirmAck, ConfirmReq, FrontierReq, Keepalive,
    NodeIdHandshake, Publish, KEEPALIVE_PEER_COUNT,
};
use std::net::Ipv6Addr;

fn read_hash(b: &[u8]) -> BlockHash {
    let mut out = [0u8; 32];
    out.copy_from_slice(&b[..32]);
    BlockHash(out)
}

fn read_account(b: &[u8]) -> Account {
    let mut out = [0u8; 32];
    out.copy_from_slice(&b[..32]);
    Account(out)
}

fn read_signature(b: &[u8]) -> Signature {
    let mut out = [0u8; 64];
    out.copy_from_slice(&b[..64]);
    Signature(out)
}

fn read_work(b: &[u8]) -> Work {
    let mut out = [0u8; 8];
    out.copy_from_slice(&b[..8]);
    Work(out)
}

fn read_amount(b: &[u8]) -> Amount {
    let mut out = [0u8; 16];
    out.copy_from_slice(&b[..16]);
    Amount(u128::from_be_bytes(out))
}

/// Encode a block's payload (no header, no block-type tag).
pub fn encode_block(block: &Block) -> Vec<u8> {
    match block {
        Block::Send(s) => {
            let mut out = Vec::with_capacity(SendBlock::WIRE_SIZE);
            out.extend_from_slice(&s.previous.0);
            out.extend_from_slice(&s.destination.0);
            out.extend_from_slice(&s.balance.0.to_be_bytes());
            out.extend_from_slice(&s.signature.0);
            out.extend_from_slice(&s.work.0);
            out
        }
        Block::Receive(r) => {
            let mut out = Vec::with_capacity(ReceiveBlock::WIRE_SIZE);
            out.extend_from_slice(&r.previous.0);
            out.extend_from_slice(&r.source.0);
            out.extend_from_slice(&r.signature.0);
            out.extend_from_slice(&r.work.0);
            out
        }
        Block::Open(o) => {
            let mut out = Vec::with_capacity(OpenBlock::WIRE_SIZE);
            out.extend_from_slice(&o.source.0);
            out.extend_from_slice(&o.representative.0);
            out.extend_from_slice(&o.account.0);
            out.extend_from_slice(&o.signature.0);
            out.extend_from_slice(&o.work.0);
            out
        }
        Block::Change(c) => {
            let mut out = Vec::with_capacity(ChangeBlock::WIRE_SIZE);
            out.extend_from_slice(&c.previous.0);
            out.extend_from_slice(&c.representative.0);
            out.extend_from_slice(&c.signature.0);
            out.extend_from_slice(&c.work.0);
            out
        }
        Block::State(s) => {
            let mut out = Vec::with_capacity(StateBlock::WIRE_SIZE);
            out.extend_from_slice(&s.account.0);
            out.extend_from_slice(&s.previous.0);
            out.extend_from_slice(&s.representative.0);
            out.extend_from_slice(&s.balance.0.to_be_bytes());
            out.extend_from_slice(&s.link.0);
            out.extend_from_slice(&s.signature.0);
            out.extend_from_slice(&s.work.0);
            out
        }
    }
}

/// Decode a block payload of known `block_type`. `b` must be exactly
/// `block_type.payload_size()` bytes.
pub fn decode_block(block_type: BlockType, b: &[u8]) -> Result<Block, BlockError> {
    let expected = block_type.payload_size().ok_or(BlockError::UnknownType)?;
    if b.len() != expected {
        return Err(BlockError::WrongSize);
    }
    Ok(match block_type {
        BlockType::NotABlock => return Err(BlockError::UnknownType),
        BlockType::Send => Block::Send(SendBlock {
            previous: read_hash(&b[0..32]),
            destination: read_account(&b[32..64]),
            balance: read_amount(&b[64..80]),
            signature: read_signature(&b[80..144]),
            work: read_work(&b[144..152]),
        }),
        BlockType::Receive => Block::Receive(ReceiveBlock {
            previous: read_hash(&b[0..32]),
            source: read_hash(&b[32..64]),
            signature: read_signature(&b[64..128]),
            work: read_work(&b[128..136]),
        }),
        BlockType::Open => Block::Open(OpenBlock {
            source: read_hash(&b[0..32]),
            representative: read_account(&b[32..64]),
            account: read_account(&b[64..96]),
            signature: read_signature(&b[96..160]),
            work: read_work(&b[160..168]),
        }),
        BlockType::Change => Block::Change(ChangeBlock {
            previous: read_hash(&b[0..32]),
            representative: read_account(&b[32..64]),
            signature: read_signature(&b[64..128]),
            work: read_work(&b[128..136]),
        }),
        BlockType::State => Block::State(StateBlock {
            account: read_account(&b[0..32]),
            previous: read_hash(&b[32..64]),
            representative: read_account(&b[64..96]),
            balance: read_amount(&b[96..112]),
            link: read_hash(&b[112..144]),
            signature: read_signature(&b[144..208]),
            work: read_work(&b[208..216]),
        }),
    })
}

fn encode_endpoint(e: Endpoint) -> [u8; 18] {
    let mut out = [0u8; 18];
    out[0..16].copy_from_slice(&e.addr.octets());
    out[16..18].copy_from_slice(&e.port.to_be_bytes());
    out
}

fn decode_endpoint(b: &[u8]) -> Endpoint {
    let mut addr = [0u8; 16];
    addr.copy_from_slice(&b[0..16]);
    let port = u16::from_be_bytes([b[16], b[17]]);
    Endpoint {
        addr: Ipv6Addr::from(addr),
        port,
    }
}

/// Encode a `keepalive` payload: exactly 8 endpoints of 18 bytes each.
pub fn encode_keepalive(msg: &Keepalive) -> Vec<u8> {
    let mut out = Vec::with_capacity(KEEPALIVE_PEER_COUNT * 18);
    for peer in msg.peers {
        out.extend_from_slice(&encode_endpoint(peer));
    }
    out
}

/// Decode a `keepalive` payload. Caller must already have checked the exact
/// size (8 * 18 bytes).
pub fn decode_keepalive(b: &[u8]) -> Keepalive {
    let mut peers = [Endpoint::ZERO; KEEPALIVE_PEER_COUNT];
    for (i, slot) in peers.iter_mut().enumerate() {
        *slot = decode_endpoint(&b[i * 18..i * 18 + 18]);
    }
    Keepalive { peers }
}

/// Encode a `publish` payload and the extension bits it requires.
pub fn encode_publish(msg: &Publish) -> (Vec<u8>, Extensions) {
    (
        encode_block(&msg.block),
        Extensions::default().with_block_type(msg.block.block_type()),
    )
}

/// Decode a `publish` payload given the header's block-type extension.
pub fn decode_publish(block_type: BlockType, b: &[u8]) -> Result<Publish, BlockError> {
    Ok(Publish {
        block: decode_block(block_type, b)?,
    })
}

fn encode_hash_pair(hp: HashPair) -> [u8; 64] {
    let mut out = [0u8; 64];
    out[0..32].copy_from_slice(&hp.hash.0);
    out[32..64].copy_from_slice(&hp.root.0);
    out
}

fn decode_hash_pair(b: &[u8]) -> HashPair {
    HashPair {
        hash: read_hash(&b[0..32]),
        root: read_hash(&b[32..64]),
    }
}

/// Encode a `confirm_req` payload and the extension bits it requires.
pub fn encode_confirm_req(msg: &ConfirmReq) -> (Vec<u8>, Extensions) {
    match msg {
        ConfirmReq::Block(block) => (
            encode_block(block),
            Extensions::default().with_block_type(block.block_type()),
        ),
        ConfirmReq::Hashes(pairs) => {
            let mut out = Vec::with_capacity(pairs.len() * 64);
            for hp in pairs {
                out.extend_from_slice(&encode_hash_pair(*hp));
            }
            (
                out,
                Extensions::default()
                    .with_block_type(BlockType::NotABlock)
                    .with_count(pairs.len() as u8),
            )
        }
    }
}

/// Decode a `confirm_req` payload given the header extension bits.
pub fn decode_confirm_req(ext: Extensions, b: &[u8]) -> Result<ConfirmReq, BlockError> {
    match ext.block_type() {
        Some(BlockType::NotABlock) | None => {
            let count = ext.count() as usize;
            if b.len() != count * 64 {
                return Err(BlockError::WrongSize);
            }
            let pairs = (0..count).map(|i| decode_hash_pair(&b[i * 64..i * 64 + 64])).collect();
            Ok(ConfirmReq::Hashes(pairs))
        }
        Some(bt) => Ok(ConfirmReq::Block(decode_block(bt, b)?)),
    }
}

/// `confirm_ack` decode errors: either the block layer or the vote layer
/// can reject a payload.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfirmAckError {
    /// Underlying block payload was malformed.
    #[error("block: {0}")]
    Block(#[from] BlockError),
    /// Vote entry-count invariant was violated.
    #[error("vote: {0}")]
    Vote(#[from] VoteError),
    /// Payload length did not match the declared hash count.
    #[error("wrong size")]
    WrongSize,
}

/// Encode a `confirm_ack` payload and the extension bits it requires.
///
/// Account(32) || signature(64) || sequence(8 LE) follow, then either the
/// full block (single full-block vote) or `count` bare 32-byte hashes.
pub fn encode_confirm_ack(msg: &ConfirmAck) -> (Vec<u8>, Extensions) {
    let v = &msg.vote;
    let mut out = Vec::new();
    out.extend_from_slice(&v.account.0);
    out.extend_from_slice(&v.signature.0);
    out.extend_from_slice(&v.sequence.to_le_bytes());

    let ext = match v.entries() {
        [VoteEntry::Block(block)] => {
            out.extend_from_slice(&encode_block(block));
            Extensions::default().with_block_type(block.block_type())
        }
        entries => {
            for e in entries {
                out.extend_from_slice(e.hash().as_bytes());
            }
            Extensions::default()
                .with_block_type(BlockType::NotABlock)
                .with_count(entries.len() as u8)
        }
    };
    (out, ext)
}

/// Decode a `confirm_ack` payload given the header extension bits.
pub fn decode_confirm_ack(ext: Extensions, b: &[u8]) -> Result<ConfirmAck, ConfirmAckError> {
    if b.len() < 32 + 64 + 8 {
        return Err(ConfirmAckError::WrongSize);
    }
    let account = read_account(&b[0..32]);
    let signature = read_signature(&b[32..96]);
    let sequence = u64::from_le_bytes(b[96..104].try_into().expect("8 bytes"));
    let rest = &b[104..];

    let entries = match ext.block_type() {
        Some(BlockType::NotABlock) | None => {
            let count = ext.count() as usize;
            if rest.len() != count * 32 {
                return Err(ConfirmAckError::WrongSize);
            }
            (0..count)
                .map(|i| VoteEntry::Hash(read_hash(&rest[i * 32..i * 32 + 32])))
                .collect()
        }
        Some(bt) => vec![VoteEntry::Block(decode_block(bt, rest)?)],
    };

    let vote = Vote::new(account, signature, sequence, entries)?;
    Ok(ConfirmAck { vote })
}

/// Fixed `bulk_pull` payload size: start(32) + end(32).
pub const BULK_PULL_SIZE: usize = 64;

/// Encode a `bulk_pull` payload.
pub fn encode_bulk_pull(msg: &BulkPull) -> Vec<u8> {
    let mut out = Vec::with_capacity(BULK_PULL_SIZE);
    out.extend_from_slice(&msg.start.0);
    out.extend_from_slice(&msg.end.0);
    out
}

/// Decode a `bulk_pull` payload. Caller must check exact size.
pub fn decode_bulk_pull(b: &[u8]) -> BulkPull {
    BulkPull {
        start: read_hash(&b[0..32]),
        end: read_hash(&b[32..64]),
    }
}

/// Fixed `bulk_pull_account` payload size: account(32) + start(32) + flags(1).
pub const BULK_PULL_ACCOUNT_SIZE: usize = 65;

/// Encode a `bulk_pull_account` payload.
pub fn encode_bulk_pull_account(msg: &BulkPullAccount) -> Vec<u8> {
    let mut out = Vec::with_capacity(BULK_PULL_ACCOUNT_SIZE);
    out.extend_from_slice(&msg.account.0);
    out.extend_from_slice(&msg.start.0);
    out.push(msg.flags);
    out
}

/// Decode a `bulk_pull_account` payload. Caller must check exact size.
pub fn decode_bulk_pull_account(b: &[u8]) -> BulkPullAccount {
    BulkPullAccount {
        account: read_account(&b[0..32]),
        start: read_hash(&b[32..64]),
        flags: b[64],
    }
}

/// `bulk_push` carries no payload.
pub fn encode_bulk_push(_msg: &BulkPush) -> Vec<u8> {
    Vec::new()
}

/// Decode a `bulk_push` payload. Caller must check exact size (zero).
pub fn decode_bulk_push(_b: &[u8]) -> BulkPush {
    BulkPush
}

/// Fixed `frontier_req` payload size: start(32) + age(4) + count(4).
pub const FRONTIER_REQ_SIZE: usize = 40;

/// Encode a `frontier_req` payload.
pub fn encode_frontier_req(msg: &FrontierReq) -> Vec<u8> {
    let mut out = Vec::with_capacity(FRONTIER_REQ_SIZE);
    out.extend_from_slice(&msg.start.0);
    out.extend_from_slice(&msg.age.to_le_bytes());
    out.extend_from_slice(&msg.count.to_le_bytes());
    out
}

/// Decode a `frontier_req` payload. Caller must check exact size.
pub fn decode_frontier_req(b: &[u8]) -> FrontierReq {
    FrontierReq {
        start: read_account(&b[0..32]),
        age: u32::from_le_bytes(b[32..36].try_into().expect("4 bytes")),
        count: u32::from_le_bytes(b[36..40].try_into().expect("4 bytes")),
    }
}

/// Encode a `node_id_handshake` payload and the extension bits it requires.
pub fn encode_node_id_handshake(msg: &NodeIdHandshake) -> (Vec<u8>, Extensions) {
    let mut out = Vec::new();
    let mut ext = Extensions::default();
    if let Some(cookie) = msg.query {
        out.extend_from_slice(&cookie);
        ext = ext.with_handshake_query(true);
    }
    if let Some((node_id, sig)) = msg.response {
        out.extend_from_slice(&node_id.0);
        out.extend_from_slice(&sig.0);
        ext = ext.with_handshake_response(true);
    }
    (out, ext)
}

/// Decode a `node_id_handshake` payload given the header extension bits.
pub fn decode_node_id_handshake(ext: Extensions, b: &[u8]) -> Option<NodeIdHandshake> {
    let mut expected = 0usize;
    if ext.handshake_query_present() {
        expected += 32;
    }
    if ext.handshake_response_present() {
        expected += 96;
    }
    if b.len() != expected {
        return None;
    }
    let mut offset = 0;
    let query = if ext.handshake_query_present() {
        let mut c = [0u8; 32];
        c.copy_from_slice(&b[0..32]);
        offset += 32;
        Some(c)
    } else {
        None
    };
    let response = if ext.handshake_response_present() {
        let node_id = read_account(&b[offset..offset + 32]);
        let sig = read_signature(&b[offset + 32..offset + 96]);
        Some((node_id, sig))
    } else {
        None
    };
    Some(NodeIdHandshake { query, response })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::BlockHash;
    use std::net::Ipv4Addr;

    #[test]
    fn keepalive_round_trips() {
        let mut msg = Keepalive::default();
        msg.peers[0] = Endpoint::from_v4(Ipv4Addr::new(1, 2, 3, 4), 7075);
        let bytes = encode_keepalive(&msg);
        assert_eq!(bytes.len(), KEEPALIVE_PEER_COUNT * 18);
        assert_eq!(decode_keepalive(&bytes), msg);
    }

    #[test]
    fn send_block_round_trips() {
        let block = Block::Send(SendBlock {
            previous: BlockHash::from_bytes([1; 32]),
            destination: Account::from_bytes([2; 32]),
            balance: Amount(3),
            signature: Signature([4; 64]),
            work: Work([5; 8]),
        });
        let bytes = encode_block(&block);
        assert_eq!(bytes.len(), SendBlock::WIRE_SIZE);
        assert_eq!(decode_block(BlockType::Send, &bytes), Ok(block));
    }

    #[test]
    fn confirm_ack_hash_only_round_trips() {
        let vote = Vote::new(
            Account::from_bytes([1; 32]),
            Signature([2; 64]),
            9,
            vec![
                VoteEntry::Hash(BlockHash::from_bytes([3; 32])),
                VoteEntry::Hash(BlockHash::from_bytes([4; 32])),
            ],
        )
        .unwrap();
        let msg = ConfirmAck { vote };
        let (bytes, ext) = encode_confirm_ack(&msg);
        assert_eq!(decode_confirm_ack(ext, &bytes).unwrap(), msg);
    }

    #[test]
    fn node_id_handshake_query_only_round_trips() {
        let msg = NodeIdHandshake {
            query: Some([7; 32]),
            response: None,
        };
        let (bytes, ext) = encode_node_id_handshake(&msg);
        assert_eq!(bytes.len(), 32);
        assert_eq!(decode_node_id_handshake(ext, &bytes), Some(msg));
    }

    #[test]
    fn node_id_handshake_both_present_round_trips() {
        let msg = NodeIdHandshake {
            query: Some([1; 32]),
            response: Some((Account::from_bytes([2; 32]), Signature([3; 64]))),
        };
        let (bytes, ext) = encode_node_id_handshake(&msg);
        assert_eq!(bytes.len(), 32 + 96);
        assert_eq!(decode_node_id_handshake(ext, &bytes), Some(msg));
    }

    #[test]
    fn frontier_req_round_trips() {
        let msg = FrontierReq {
            start: Account::from_bytes([1; 32]),
            age: 100,
            count: 200,
        };
        let bytes = encode_frontier_req(&msg);
        assert_eq!(bytes.len(), FRONTIER_REQ_SIZE);
        assert_eq!(decode_frontier_req(&bytes), msg);
    }
}
