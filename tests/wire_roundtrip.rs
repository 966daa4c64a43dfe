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

//! End-to-end header + body round-trips through the parser, exercising the
//! full inbound path a peer's bytes actually take.

use glacier_core::core::block::{Block, SendBlock};
use glacier_core::core::types::{Account, Amount, BlockHash, Endpoint, NetworkMagic, Signature, Work};
use glacier_core::core::work::AlwaysValidWork;
use glacier_core::wire::codec::{encode_keepalive, encode_publish};
use glacier_core::wire::header::{MessageHeader, MessageType};
use glacier_core::wire::messages::{
    BulkPull, BulkPullAccount, BulkPush, ConfirmAck, ConfirmReq, FrontierReq, Keepalive,
    NodeIdHandshake, Publish,
};
use glacier_core::wire::parser::{parse_buffer, MessageVisitor, NetworkContext, ParseStatus};

#[derive(Default)]
struct CapturingVisitor {
    keepalive: Option<Keepalive>,
    publish: Option<Publish>,
}

impl MessageVisitor for CapturingVisitor {
    fn keepalive(&mut self, msg: Keepalive) {
        self.keepalive = Some(msg);
    }
    fn publish(&mut self, msg: Publish) {
        self.publish = Some(msg);
    }
    fn confirm_req(&mut self, _msg: ConfirmReq) {}
    fn confirm_ack(&mut self, _msg: ConfirmAck) {}
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

fn send_block() -> Block {
    Block::Send(SendBlock {
        previous: BlockHash::from_bytes([7; 32]),
        destination: Account::from_bytes([8; 32]),
        balance: Amount(500),
        signature: Signature([1; 64]),
        work: Work::ZERO,
    })
}

#[test]
fn keepalive_frame_round_trips_through_the_parser() {
    let keepalive = Keepalive {
        peers: [Endpoint::from_v4(std::net::Ipv4Addr::new(10, 0, 0, 1), 7075); 8],
    };
    let header = MessageHeader::new(NetworkMagic::TEST, 18, MessageType::Keepalive);
    let mut frame = header.to_bytes().to_vec();
    frame.extend_from_slice(&encode_keepalive(&keepalive));

    let mut visitor = CapturingVisitor::default();
    let status = parse_buffer(&ctx(), &frame, &AlwaysValidWork, 0, &mut visitor);

    assert_eq!(status, ParseStatus::Success);
    assert_eq!(visitor.keepalive.unwrap(), keepalive);
}

#[test]
fn publish_frame_round_trips_through_the_parser() {
    let publish = Publish { block: send_block() };
    let (body, extensions) = encode_publish(&publish);
    let header = MessageHeader {
        magic: NetworkMagic::TEST,
        version_max: 18,
        version_using: 18,
        version_min: 18,
        message_type: MessageType::Publish,
        extensions,
    };
    let mut frame = header.to_bytes().to_vec();
    frame.extend_from_slice(&body);

    let mut visitor = CapturingVisitor::default();
    let status = parse_buffer(&ctx(), &frame, &AlwaysValidWork, 0, &mut visitor);

    assert_eq!(status, ParseStatus::Success);
    assert_eq!(visitor.publish.unwrap().block, send_block());
}

#[test]
fn truncated_frame_is_rejected_without_panicking() {
    let header = MessageHeader::new(NetworkMagic::TEST, 18, MessageType::Keepalive);
    let mut frame = header.to_bytes().to_vec();
    frame.push(0); // one byte short of a full keepalive body

    let mut visitor = CapturingVisitor::default();
    let status = parse_buffer(&ctx(), &frame, &AlwaysValidWork, 0, &mut visitor);
    assert_eq!(status, ParseStatus::InvalidKeepaliveMessage);
    assert!(visitor.keepalive.is_none());
}

#[test]
fn wrong_network_magic_is_rejected() {
    let header = MessageHeader::new(NetworkMagic::LIVE, 18, MessageType::Keepalive);
    let mut frame = header.to_bytes().to_vec();
    frame.extend_from_slice(&encode_keepalive(&Keepalive::default()));

    let mut visitor = CapturingVisitor::default();
    let status = parse_buffer(&ctx(), &frame, &AlwaysValidWork, 0, &mut visitor);
    assert_eq!(status, ParseStatus::InvalidNetwork);
}
