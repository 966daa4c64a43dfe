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

//! Fixed-size-per-type message parsing with strict residue checking.
//!
//! Parsing never panics and never returns a `Result` whose error type the
//! caller must unwind past: every outcome is one variant of [`ParseStatus`].

use crate::core::types::NetworkMagic;
use crate::core::work::WorkValidator;
use crate::wire::codec;
use crate::wire::header::{MessageHeader, MessageType, HEADER_SIZE};
use crate::wire::messages::{
    BulkPull, BulkPullAccount, BulkPush, ConfirmAck, ConfirmReq, FrontierReq, Keepalive,
    NodeIdHandshake, Publish, KEEPALIVE_PEER_COUNT,
};

/// Exhaustive tagged parse outcome. Every variant other than `Success` is a
/// terminal, locally-handled failure; none of them propagate as exceptions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParseStatus {
    /// Parsed and dispatched to the visitor.
    Success,
    /// A block's attached work did not meet the difficulty threshold.
    InsufficientWork,
    /// Header magic did not match any recognized network.
    InvalidMagic,
    /// Header magic recognized but not the network this parser expects.
    InvalidNetwork,
    /// Header was shorter than 8 bytes, or carried an unrecognized message-type byte.
    InvalidHeader,
    /// Recognized magic/version but a message-type code with no parser.
    InvalidMessageType,
    /// `keepalive` payload was the wrong size.
    InvalidKeepaliveMessage,
    /// `publish` payload was the wrong size or carried an unknown block type.
    InvalidPublishMessage,
    /// `confirm_req` payload was the wrong size or carried an unknown block type.
    InvalidConfirmReqMessage,
    /// `confirm_ack` payload was malformed (block, vote, or size).
    InvalidConfirmAckMessage,
    /// `node_id_handshake` payload length did not match its flag bits.
    InvalidNodeIdHandshakeMessage,
    /// Header version is below the minimum this parser accepts.
    OutdatedVersion,
}

/// Network parameters this parser enforces: the expected magic and the
/// version window this node accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NetworkContext {
    /// Expected wire magic (test/beta/live).
    pub magic: NetworkMagic,
    /// Lowest protocol version this node still accepts.
    pub accepted_version_min: u8,
}

/// Dispatch capability invoked on successful parse of each message type.
/// The parser is pure with respect to visitor state: the visitor alone
/// decides side effects.
pub trait MessageVisitor {
    /// Called on a successfully parsed `keepalive`.
    fn keepalive(&mut self, msg: Keepalive);
    /// Called on a successfully parsed `publish`.
    fn publish(&mut self, msg: Publish);
    /// Called on a successfully parsed `confirm_req`.
    fn confirm_req(&mut self, msg: ConfirmReq);
    /// Called on a successfully parsed `confirm_ack`.
    fn confirm_ack(&mut self, msg: ConfirmAck);
    /// Called on a successfully parsed `bulk_pull`.
    fn bulk_pull(&mut self, msg: BulkPull);
    /// Called on a successfully parsed `bulk_pull_account`.
    fn bulk_pull_account(&mut self, msg: BulkPullAccount);
    /// Called on a successfully parsed `bulk_push`.
    fn bulk_push(&mut self, msg: BulkPush);
    /// Called on a successfully parsed `frontier_req`.
    fn frontier_req(&mut self, msg: FrontierReq);
    /// Called on a successfully parsed `node_id_handshake`.
    fn node_id_handshake(&mut self, msg: NodeIdHandshake);
}

/// Parse a `keepalive` payload. `body` must exactly consume `8 * 18` bytes.
pub fn parse_keepalive(body: &[u8], visitor: &mut impl MessageVisitor) -> ParseStatus {
    if body.len() != KEEPALIVE_PEER_COUNT * 18 {
        return ParseStatus::InvalidKeepaliveMessage;
    }
    visitor.keepalive(codec::decode_keepalive(body));
    ParseStatus::Success
}

/// Parse a `publish` payload given the header extension bits.
pub fn parse_publish(
    header: &MessageHeader,
    body: &[u8],
    work: &dyn WorkValidator,
    threshold: u64,
    visitor: &mut impl MessageVisitor,
) -> ParseStatus {
    let Some(block_type) = header.extensions.block_type() else {
        return ParseStatus::InvalidPublishMessage;
    };
    let Ok(block) = codec::decode_block(block_type, body) else {
        return ParseStatus::InvalidPublishMessage;
    };
    if !work.is_valid(block.root(), threshold, block.work()) {
        return ParseStatus::InsufficientWork;
    }
    visitor.publish(Publish { block });
    ParseStatus::Success
}

/// Parse a `confirm_req` payload given the header extension bits.
pub fn parse_confirm_req(
    header: &MessageHeader,
    body: &[u8],
    work: &dyn WorkValidator,
    threshold: u64,
    visitor: &mut impl MessageVisitor,
) -> ParseStatus {
    let msg = match codec::decode_confirm_req(header.extensions, body) {
        Ok(msg) => msg,
        Err(_) => return ParseStatus::InvalidConfirmReqMessage,
    };
    if let ConfirmReq::Block(block) = &msg {
        if !work.is_valid(block.root(), threshold, block.work()) {
            return ParseStatus::InsufficientWork;
        }
    }
    visitor.confirm_req(msg);
    ParseStatus::Success
}

/// Parse a `confirm_ack` payload given the header extension bits.
pub fn parse_confirm_ack(
    header: &MessageHeader,
    body: &[u8],
    work: &dyn WorkValidator,
    threshold: u64,
    visitor: &mut impl MessageVisitor,
) -> ParseStatus {
    let msg = match codec::decode_confirm_ack(header.extensions, body) {
        Ok(msg) => msg,
        Err(_) => return ParseStatus::InvalidConfirmAckMessage,
    };
    if let [crate::core::vote::VoteEntry::Block(block)] = msg.vote.entries() {
        if !work.is_valid(block.root(), threshold, block.work()) {
            return ParseStatus::InsufficientWork;
        }
    }
    visitor.confirm_ack(msg);
    ParseStatus::Success
}

/// Parse a `bulk_pull` payload. `body` must exactly consume 64 bytes.
pub fn parse_bulk_pull(body: &[u8], visitor: &mut impl MessageVisitor) -> ParseStatus {
    if body.len() != codec::BULK_PULL_SIZE {
        return ParseStatus::InvalidHeader;
    }
    visitor.bulk_pull(codec::decode_bulk_pull(body));
    ParseStatus::Success
}

/// Parse a `bulk_pull_account` payload. `body` must exactly consume 65 bytes.
pub fn parse_bulk_pull_account(body: &[u8], visitor: &mut impl MessageVisitor) -> ParseStatus {
    if body.len() != codec::BULK_PULL_ACCOUNT_SIZE {
        return ParseStatus::InvalidHeader;
    }
    visitor.bulk_pull_account(codec::decode_bulk_pull_account(body));
    ParseStatus::Success
}

/// Parse a `bulk_push` payload. `body` must be empty.
pub fn parse_bulk_push(body: &[u8], visitor: &mut impl MessageVisitor) -> ParseStatus {
    if !body.is_empty() {
        return ParseStatus::InvalidHeader;
    }
    visitor.bulk_push(codec::decode_bulk_push(body));
    ParseStatus::Success
}

/// Parse a `frontier_req` payload. `body` must exactly consume 40 bytes.
pub fn parse_frontier_req(body: &[u8], visitor: &mut impl MessageVisitor) -> ParseStatus {
    if body.len() != codec::FRONTIER_REQ_SIZE {
        return ParseStatus::InvalidHeader;
    }
    visitor.frontier_req(codec::decode_frontier_req(body));
    ParseStatus::Success
}

/// Parse a `node_id_handshake` payload given the header extension bits.
pub fn parse_node_id_handshake(
    header: &MessageHeader,
    body: &[u8],
    visitor: &mut impl MessageVisitor,
) -> ParseStatus {
    match codec::decode_node_id_handshake(header.extensions, body) {
        Some(msg) => {
            visitor.node_id_handshake(msg);
            ParseStatus::Success
        }
        None => ParseStatus::InvalidNodeIdHandshakeMessage,
    }
}

/// Read the header, classify by magic/version/type, and route to the
/// matching `parse_<type>` function.
pub fn parse_buffer(
    ctx: &NetworkContext,
    buf: &[u8],
    work: &dyn WorkValidator,
    threshold: u64,
    visitor: &mut impl MessageVisitor,
) -> ParseStatus {
    if buf.len() < HEADER_SIZE {
        return ParseStatus::InvalidHeader;
    }
    let mut header_bytes = [0u8; HEADER_SIZE];
    header_bytes.copy_from_slice(&buf[..HEADER_SIZE]);
    let Some(header) = MessageHeader::from_bytes(&header_bytes) else {
        return ParseStatus::InvalidHeader;
    };

    if header.magic != NetworkMagic::TEST && header.magic != NetworkMagic::BETA && header.magic != NetworkMagic::LIVE
    {
        return ParseStatus::InvalidMagic;
    }
    if header.magic != ctx.magic {
        return ParseStatus::InvalidNetwork;
    }
    if header.version_using < ctx.accepted_version_min {
        return ParseStatus::OutdatedVersion;
    }

    let body = &buf[HEADER_SIZE..];
    match header.message_type {
        MessageType::Keepalive => parse_keepalive(body, visitor),
        MessageType::Publish => parse_publish(&header, body, work, threshold, visitor),
        MessageType::ConfirmReq => parse_confirm_req(&header, body, work, threshold, visitor),
        MessageType::ConfirmAck => parse_confirm_ack(&header, body, work, threshold, visitor),
        MessageType::BulkPull => parse_bulk_pull(body, visitor),
        MessageType::BulkPullAccount => parse_bulk_pull_account(body, visitor),
        MessageType::BulkPush => parse_bulk_push(body, visitor),
        MessageType::FrontierReq => parse_frontier_req(body, visitor),
        MessageType::NodeIdHandshake => parse_node_id_handshake(&header, body, visitor),
        MessageType::Invalid | MessageType::NotABlock => ParseStatus::InvalidMessageType,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::block::{Block, SendBlock};
    use crate::core::types::{Account, Amount, BlockHash, Endpoint, Signature, Work};
    use crate::core::vote::{Vote, VoteEntry};
    use crate::core::work::AlwaysValidWork;
    use crate::wire::header::{Extensions, MessageHeader};

    #[derive(Default)]
    struct CountingVisitor {
        keepalive_count: u32,
        confirm_ack_count: u32,
    }

    impl MessageVisitor for CountingVisitor {
        fn keepalive(&mut self, _msg: Keepalive) {
            self.keepalive_count += 1;
        }
        fn publish(&mut self, _msg: Publish) {}
        fn confirm_req(&mut self, _msg: ConfirmReq) {}
        fn confirm_ack(&mut self, _msg: ConfirmAck) {
            self.confirm_ack_count += 1;
        }
        fn bulk_pull(&mut self, _msg: BulkPull) {}
        fn bulk_pull_account(&mut self, _msg: BulkPullAccount) {}
        fn bulk_push(&mut self, _msg: BulkPush) {}
        fn frontier_req(&mut self, _msg: FrontierReq) {}
        fn node_id_handshake(&mut self, _msg: NodeIdHandshake) {}
    }

    fn ctx() -> NetworkContext {
        NetworkContext {
            magic: NetworkMagic::TEST,
            accepted_version_min: 1,
        }
    }

    /// Scenario B — exact keepalive size.
    #[test]
    fn keepalive_exact_size_then_one_extra_byte() {
        let header = MessageHeader::new(NetworkMagic::TEST, 18, MessageType::Keepalive);
        let mut buf = header.to_bytes().to_vec();
        buf.extend_from_slice(&codec::encode_keepalive(&Keepalive::default()));

        let mut visitor = CountingVisitor::default();
        let status = parse_buffer(&ctx(), &buf, &AlwaysValidWork, 0, &mut visitor);
        assert_eq!(status, ParseStatus::Success);
        assert_eq!(visitor.keepalive_count, 1);

        buf.push(0);
        let status = parse_buffer(&ctx(), &buf, &AlwaysValidWork, 0, &mut visitor);
        assert_eq!(status, ParseStatus::InvalidKeepaliveMessage);
        assert_eq!(visitor.keepalive_count, 1);
    }

    /// Scenario A — exact confirm_ack size.
    #[test]
    fn confirm_ack_exact_size_then_one_extra_byte() {
        let block = Block::Send(SendBlock {
            previous: BlockHash::from_bytes([1; 32]),
            destination: Account::from_bytes([1; 32]),
            balance: Amount(2),
            signature: Signature([9; 64]),
            work: Work([1; 8]),
        });
        let vote = Vote::new(
            Account::from_bytes([9; 32]),
            Signature([8; 64]),
            0,
            vec![VoteEntry::Block(block)],
        )
        .unwrap();
        let (body, ext) = codec::encode_confirm_ack(&ConfirmAck { vote });
        let mut header = MessageHeader::new(NetworkMagic::TEST, 18, MessageType::ConfirmAck);
        header.extensions = ext;
        let mut buf = header.to_bytes().to_vec();
        buf.extend_from_slice(&body);

        let mut visitor = CountingVisitor::default();
        let status = parse_buffer(&ctx(), &buf, &AlwaysValidWork, 0, &mut visitor);
        assert_eq!(status, ParseStatus::Success);
        assert_eq!(visitor.confirm_ack_count, 1);

        buf.push(0);
        let status = parse_buffer(&ctx(), &buf, &AlwaysValidWork, 0, &mut visitor);
        assert_eq!(status, ParseStatus::InvalidConfirmAckMessage);
        assert_eq!(visitor.confirm_ack_count, 1);
    }

    #[test]
    fn wrong_network_magic_is_rejected() {
        let header = MessageHeader::new(NetworkMagic::LIVE, 18, MessageType::Keepalive);
        let mut buf = header.to_bytes().to_vec();
        buf.extend_from_slice(&codec::encode_keepalive(&Keepalive::default()));
        let mut visitor = CountingVisitor::default();
        assert_eq!(
            parse_buffer(&ctx(), &buf, &AlwaysValidWork, 0, &mut visitor),
            ParseStatus::InvalidNetwork
        );
    }

    #[test]
    fn garbage_magic_is_invalid_magic() {
        let mut header = MessageHeader::new(NetworkMagic::TEST, 18, MessageType::Keepalive);
        header.magic = NetworkMagic([0xff, 0xff]);
        let buf = header.to_bytes().to_vec();
        let mut visitor = CountingVisitor::default();
        assert_eq!(
            parse_buffer(&ctx(), &buf, &AlwaysValidWork, 0, &mut visitor),
            ParseStatus::InvalidMagic
        );
    }

    #[test]
    fn below_minimum_version_is_outdated() {
        let header = MessageHeader::new(NetworkMagic::TEST, 0, MessageType::Keepalive);
        let mut buf = header.to_bytes().to_vec();
        buf.extend_from_slice(&codec::encode_keepalive(&Keepalive::default()));
        let mut visitor = CountingVisitor::default();
        assert_eq!(
            parse_buffer(&ctx(), &buf, &AlwaysValidWork, 0, &mut visitor),
            ParseStatus::OutdatedVersion
        );
    }

    #[test]
    fn truncated_buffer_is_invalid_header() {
        let mut visitor = CountingVisitor::default();
        assert_eq!(
            parse_buffer(&ctx(), &[1, 2, 3], &AlwaysValidWork, 0, &mut visitor),
            ParseStatus::InvalidHeader
        );
    }

    #[test]
    fn endpoint_slot_round_trips_through_keepalive() {
        let mut msg = Keepalive::default();
        msg.peers[3] = Endpoint::from_v4(std::net::Ipv4Addr::new(10, 0, 0, 1), 54000);
        let bytes = codec::encode_keepalive(&msg);
        assert_eq!(codec::decode_keepalive(&bytes), msg);
    }
}
