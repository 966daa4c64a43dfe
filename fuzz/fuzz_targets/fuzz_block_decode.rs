#![no_main]

use glacier_core::core::block::BlockType;
use glacier_core::wire::codec::decode_block;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }
    let Some(block_type) = BlockType::from_u8(data[0] % 6 + 1) else {
        return;
    };
    let _ = decode_block(block_type, &data[1..]);
});
