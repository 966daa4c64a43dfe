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

//! Cross-module scenarios: registry maintenance driven by the timer queue,
//! and block de-duplication through the interning cache.

use glacier_core::core::block::{Block, SendBlock};
use glacier_core::core::security::Ed25519Verifier;
use glacier_core::core::types::{Account, Amount, BlockHash, Endpoint, Signature, Work};
use glacier_core::core::uniquer::block_uniquer;
use glacier_core::networking::handshake::CookieCache;
use glacier_core::networking::lifecycle::{admit_unknown_sender, maintenance_tick};
use glacier_core::networking::{Channel, ChannelRegistry, ChannelState, NodeIdentity};
use glacier_core::stats::{Direction, StatDetail, StatType, Stats, StatsConfig};
use glacier_core::timer::TimerQueue;
use std::net::Ipv4Addr;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Two equal-content blocks built from distinct allocations intern to the
/// same shared instance, and distinct content does not collide.
#[test]
fn duplicate_blocks_intern_to_one_shared_instance() {
    let uniquer = block_uniquer();

    let a = Arc::new(Block::Send(SendBlock {
        previous: BlockHash::from_bytes([3; 32]),
        destination: Account::from_bytes([4; 32]),
        balance: Amount(10),
        signature: Signature([5; 64]),
        work: Work::ZERO,
    }));
    let b = Arc::new(Block::Send(SendBlock {
        previous: BlockHash::from_bytes([3; 32]),
        destination: Account::from_bytes([4; 32]),
        balance: Amount(10),
        signature: Signature([5; 64]),
        work: Work::ZERO,
    }));
    let c = Arc::new(Block::Send(SendBlock {
        previous: BlockHash::from_bytes([9; 32]),
        destination: Account::from_bytes([4; 32]),
        balance: Amount(10),
        signature: Signature([5; 64]),
        work: Work::ZERO,
    }));

    let ua = uniquer.unique(a);
    let ub = uniquer.unique(b);
    let uc = uniquer.unique(c);

    assert!(Arc::ptr_eq(&ua, &ub));
    assert!(!Arc::ptr_eq(&ua, &uc));
    assert_eq!(uniquer.size(), 2);
}

/// A timer-driven maintenance tick idles a stale channel and hands back a
/// keepalive seeded from the registry's current peers.
#[test]
fn timer_driven_maintenance_idles_stale_channels_and_builds_keepalive() {
    let registry = Arc::new(ChannelRegistry::new(Endpoint::ZERO));
    let now = Instant::now();
    let fresh = Endpoint::from_v4(Ipv4Addr::new(1, 1, 1, 1), 7075);
    let stale = Endpoint::from_v4(Ipv4Addr::new(2, 2, 2, 2), 7075);

    registry.insert(fresh, 18, now).unwrap();
    registry.insert(stale, 18, now).unwrap();
    registry.modify(stale, |c: &mut Channel| {
        c.establish(Account::from_bytes([1; 32]));
        c.last_packet_received = now - Duration::from_secs(600);
    });
    registry.modify(fresh, |c: &mut Channel| c.establish(Account::from_bytes([2; 32])));

    let (tx, rx) = mpsc::channel();
    let timer = TimerQueue::spawn(|cb| cb());
    let tick_registry = registry.clone();
    timer.add_after(Duration::from_millis(5), move || {
        let keepalive = maintenance_tick(&tick_registry, Instant::now(), Duration::from_secs(60));
        tx.send(keepalive).unwrap();
    });

    let keepalive = rx.recv_timeout(Duration::from_secs(1)).unwrap();
    assert!(keepalive.peers.iter().any(|p| *p == fresh));
    assert_eq!(registry.find(stale).unwrap().state, ChannelState::Idle);
    assert_eq!(registry.find(fresh).unwrap().state, ChannelState::Established);
}

/// A full SYN-cookie handshake: admitting an unknown sender, issuing it a
/// cookie, the peer signing that cookie, and the signed response
/// promoting the channel to a node-id-bearing established peer.
#[test]
fn handshake_round_trip_establishes_the_channel() {
    let data_dir = tempfile::tempdir().unwrap();
    let peer_identity = NodeIdentity::load_or_create(data_dir.path()).unwrap();

    let registry = ChannelRegistry::new(Endpoint::ZERO);
    let cookies = CookieCache::new();
    let now = Instant::now();
    let peer_endpoint = Endpoint::from_v4(Ipv4Addr::new(8, 8, 8, 8), 7075);

    assert!(admit_unknown_sender(&registry, peer_endpoint, 18, now));
    assert_eq!(registry.find(peer_endpoint).unwrap().state, ChannelState::Handshaking);

    let cookie = cookies.issue(peer_endpoint, now);
    let signature = peer_identity.sign(&cookie).unwrap();

    assert!(cookies.validate(peer_endpoint, peer_identity.account(), &signature, &Ed25519Verifier, now));
    assert!(registry.establish_node_id(peer_endpoint, peer_identity.account()));

    let channel = registry.find(peer_endpoint).unwrap();
    assert_eq!(channel.state, ChannelState::Established);
    assert_eq!(channel.node_id, Some(peer_identity.account()));
}

/// Stats aggregation holds across a mixed sequence of detail-only and
/// aggregate-contributing updates driven from independent registry events.
#[test]
fn stats_aggregate_tracks_peer_churn_events() {
    let stats = Stats::new(StatsConfig::default());
    let registry = ChannelRegistry::new(Endpoint::ZERO);
    let now = Instant::now();

    for i in 0..3u8 {
        let endpoint = Endpoint::from_v4(Ipv4Addr::new(10, 0, 0, i), 7075);
        if registry.insert(endpoint, 18, now).is_some() {
            stats.inc(StatType::Peering, StatDetail::All, Direction::In);
        }
    }
    assert_eq!(registry.size(), 3);
    assert_eq!(stats.count(StatType::Peering, StatDetail::All, Direction::In), 3);
}
