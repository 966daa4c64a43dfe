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

//! Wire-level primitive types shared by the codec, parser and registry.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddrV6};

/// BLAKE2b with a 256-bit (32 byte) digest, used for block and vote hashing.
pub type Blake2b256 = Blake2b<U32>;

/// 256-bit hash (block hash, root, or generic content hash).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockHash(pub [u8; 32]);

impl BlockHash {
    /// Zero hash.
    pub const ZERO: BlockHash = BlockHash([0u8; 32]);

    /// Wrap raw bytes.
    pub fn from_bytes(b: [u8; 32]) -> Self {
        Self(b)
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

/// Ed25519 public key (account / node identity), 32 bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Account(pub [u8; 32]);

impl Account {
    /// Wrap raw bytes.
    pub fn from_bytes(b: [u8; 32]) -> Self {
        Self(b)
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

/// Ed25519 signature, 64 bytes.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature(pub [u8; 64]);

impl std::fmt::Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Signature({})", hex::encode(self.0))
    }
}

/// Proof-of-work value attached to a block, 8 bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Work(pub [u8; 8]);

impl Work {
    /// Zero work (never valid against a non-trivial threshold).
    pub const ZERO: Work = Work([0u8; 8]);
}

/// Balance amount, 128-bit, big-endian on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Amount(pub u128);

/// 64-byte hash pair used by `confirm_req`'s hash-only list entries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HashPair {
    /// Block hash.
    pub hash: BlockHash,
    /// Root (account for open/state blocks, previous hash otherwise).
    pub root: BlockHash,
}

/// (IPv6 address, port) pair. IPv4 peers are represented as IPv4-mapped IPv6.
///
/// The port is big-endian on the wire; in memory it is a plain `u16`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Endpoint {
    /// IPv6 (or IPv4-mapped IPv6) address.
    pub addr: Ipv6Addr,
    /// UDP port, host order in memory.
    pub port: u16,
}

impl Endpoint {
    /// The zero endpoint (`::`, port 0), used to pad `random_fill` output.
    pub const ZERO: Endpoint = Endpoint {
        addr: Ipv6Addr::UNSPECIFIED,
        port: 0,
    };

    /// Construct from an IPv6 address and port.
    pub fn new(addr: Ipv6Addr, port: u16) -> Self {
        Self { addr, port }
    }

    /// Construct from an IPv4 address and port, mapped into IPv6 space.
    pub fn from_v4(addr: Ipv4Addr, port: u16) -> Self {
        Self {
            addr: addr.to_ipv6_mapped(),
            port,
        }
    }

    /// True if this is the unspecified (`::`) address.
    pub fn is_unspecified(&self) -> bool {
        self.addr.is_unspecified()
    }

    /// True if this is a loopback address (v4-mapped or native v6).
    pub fn is_loopback(&self) -> bool {
        self.addr.is_loopback()
            || self
                .addr
                .to_ipv4_mapped()
                .map(|v4| v4.is_loopback())
                .unwrap_or(false)
    }

    /// Convert to a standard library socket address.
    pub fn to_socket_addr(&self) -> SocketAddrV6 {
        SocketAddrV6::new(self.addr, self.port, 0, 0)
    }

    /// Build from a standard library socket address.
    pub fn from_socket_addr(sa: SocketAddrV6) -> Self {
        Self {
            addr: *sa.ip(),
            port: sa.port(),
        }
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::ZERO
    }
}

/// Two-byte network magic selecting test/beta/live network.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NetworkMagic(pub [u8; 2]);

impl NetworkMagic {
    /// Test network magic, `"RA"`.
    pub const TEST: NetworkMagic = NetworkMagic(*b"RA");
    /// Beta network magic, `"NB"`.
    pub const BETA: NetworkMagic = NetworkMagic(*b"NB");
    /// Live network magic, `"RC"`.
    pub const LIVE: NetworkMagic = NetworkMagic(*b"RC");
}

/// Hash the concatenation of `parts` with BLAKE2b-256.
pub fn blake2b_256(parts: &[&[u8]]) -> BlockHash {
    let mut hasher = Blake2b256::new();
    for p in parts {
        Digest::update(&mut hasher, p);
    }
    let out = hasher.finalize();
    let mut b = [0u8; 32];
    b.copy_from_slice(&out);
    BlockHash(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_v4_mapping_round_trips() {
        let e = Endpoint::from_v4(Ipv4Addr::new(127, 0, 0, 1), 7075);
        assert!(e.is_loopback());
        assert_eq!(e.to_socket_addr().port(), 7075);
    }

    #[test]
    fn zero_endpoint_is_unspecified() {
        assert!(Endpoint::ZERO.is_unspecified());
    }

    #[test]
    fn blake2b_256_is_deterministic() {
        let a = blake2b_256(&[b"vote ", b"hello"]);
        let b = blake2b_256(&[b"vote ", b"hello"]);
        assert_eq!(a, b);
        let c = blake2b_256(&[b"hello"]);
        assert_ne!(a, c);
    }
}
