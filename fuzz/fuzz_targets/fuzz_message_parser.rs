#![no_main]

use glacier_core::core::types::NetworkMagic;
use glacier_core::core::work::AlwaysValidWork;
use glacier_core::wire::messages::{
    BulkPull, BulkPullAccount, BulkPush, ConfirmAck, ConfirmReq, FrontierReq, Keepalive,
    NodeIdHandshake, Publish,
};
use glacier_core::wire::parser::{parse_buffer, MessageVisitor, NetworkContext};
use libfuzzer_sys::fuzz_target;

struct NullVisitor;

impl MessageVisitor for NullVisitor {
    fn keepalive(&mut self, _msg: Keepalive) {}
    fn publish(&mut self, _msg: Publish) {}
    fn confirm_req(&mut self, _msg: ConfirmReq) {}
    fn confirm_ack(&mut self, _msg: ConfirmAck) {}
    fn bulk_pull(&mut self, _msg: BulkPull) {}
    fn bulk_pull_account(&mut self, _msg: BulkPullAccount) {}
    fn bulk_push(&mut self, _msg: BulkPush) {}
    fn frontier_req(&mut self, _msg: FrontierReq) {}
    fn node_id_handshake(&mut self, _msg: NodeIdHandshake) {}
}

fuzz_target!(|data: &[u8]| {
    let ctx = NetworkContext {
        magic: NetworkMagic::TEST,
        accepted_version_min: 1,
    };
    let mut visitor = NullVisitor;
    let _ = parse_buffer(&ctx, data, &AlwaysValidWork, 0, &mut visitor);
});
