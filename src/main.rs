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

//! Glacier node entrypoint. Loads configuration, brings up the peer
//! channel registry and datagram transport, and keeps the process alive
//! running periodic maintenance until terminated.

use std::path::PathBuf;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{info, warn};

use glacier_core::config::NetworkKindConfig;
use glacier_core::config::NodeConfig;
use glacier_core::core::security::Ed25519Verifier;
use glacier_core::core::types::{Endpoint, NetworkMagic};
use glacier_core::core::work::{Blake2bWorkValidator, DEFAULT_THRESHOLD};
use glacier_core::monitoring::Metrics;
use glacier_core::networking::handshake::CookieCache;
use glacier_core::networking::lifecycle::{admit_unknown_sender, maintenance_tick};
use glacier_core::networking::persistence::store_all;
use glacier_core::networking::{
    ChannelRegistry, DatagramTransport, InboundDatagram, NetworkKind, NodeIdentity, PeerStore,
    ReachoutTracker,
};
use glacier_core::stats::{Direction, StatDetail, StatType, Stats};
use glacier_core::timer::TimerQueue;
use glacier_core::wire::codec::{encode_keepalive, encode_node_id_handshake};
use glacier_core::wire::header::{MessageHeader, MessageType};
use glacier_core::wire::messages::{
    BulkPull, BulkPullAccount, BulkPush, ConfirmAck, ConfirmReq, FrontierReq, Keepalive,
    NodeIdHandshake, Publish,
};
use glacier_core::wire::parser::{parse_buffer, MessageVisitor, NetworkContext, ParseStatus};

const PROTOCOL_VERSION: u8 = 18;

fn frame(magic: NetworkMagic, msg: &NodeIdHandshake) -> Vec<u8> {
    let (body, extensions) = encode_node_id_handshake(msg);
    let header = MessageHeader {
        magic,
        version_max: PROTOCOL_VERSION,
        version_using: PROTOCOL_VERSION,
        version_min: PROTOCOL_VERSION,
        message_type: MessageType::NodeIdHandshake,
        extensions,
    };
    let mut out = header.to_bytes().to_vec();
    out.extend_from_slice(&body);
    out
}

fn env(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Maps a non-success parse outcome onto the stat detail that records it.
/// `InvalidMagic`/`InvalidNetwork` fold into `InvalidHeader`: both mean the
/// header itself could not be trusted.
fn stat_detail_for(status: ParseStatus) -> Option<StatDetail> {
    match status {
        ParseStatus::Success => None,
        ParseStatus::InsufficientWork => Some(StatDetail::InsufficientWork),
        ParseStatus::InvalidMagic | ParseStatus::InvalidNetwork | ParseStatus::InvalidHeader => {
            Some(StatDetail::InvalidHeader)
        }
        ParseStatus::InvalidMessageType => Some(StatDetail::InvalidMessageType),
        ParseStatus::InvalidKeepaliveMessage => Some(StatDetail::InvalidKeepaliveMessage),
        ParseStatus::InvalidPublishMessage => Some(StatDetail::InvalidPublishMessage),
        ParseStatus::InvalidConfirmReqMessage => Some(StatDetail::InvalidConfirmReqMessage),
        ParseStatus::InvalidConfirmAckMessage => Some(StatDetail::InvalidConfirmAckMessage),
        ParseStatus::InvalidNodeIdHandshakeMessage => Some(StatDetail::InvalidNodeIdHandshakeMessage),
        ParseStatus::OutdatedVersion => Some(StatDetail::OutdatedVersion),
    }
}

/// Runs one maintenance tick — purge stale channels and cookies, idle aged
/// channels, fan out a keepalive — then re-arms itself on `timer` for the
/// next tick. Stops rescheduling once `timer` has no remaining strong
/// owner, which is how shutdown ends the loop.
#[allow(clippy::too_many_arguments)]
fn schedule_maintenance(
    timer: Weak<TimerQueue>,
    transport: Arc<DatagramTransport>,
    registry: Arc<ChannelRegistry>,
    metrics: Arc<Metrics>,
    cookies: Arc<CookieCache>,
    magic: NetworkMagic,
    interval: Duration,
    purge_cutoff: Duration,
) {
    let now = Instant::now();
    registry.purge(now - purge_cutoff);
    cookies.purge_expired(now);
    metrics.refresh_peer_count(&registry);

    let keepalive = maintenance_tick(&registry, now, interval);
    let header = MessageHeader::new(magic, PROTOCOL_VERSION, MessageType::Keepalive);
    let mut bytes = header.to_bytes().to_vec();
    bytes.extend_from_slice(&encode_keepalive(&keepalive));
    for peer in keepalive.peers {
        if !peer.is_unspecified() {
            let transport = transport.clone();
            let bytes = bytes.clone();
            tokio::spawn(async move {
                let _ = transport.send(peer, bytes).await;
            });
        }
    }

    if let Some(timer_handle) = timer.upgrade() {
        timer_handle.add_after(interval, move || {
            schedule_maintenance(timer, transport, registry, metrics, cookies, magic, interval, purge_cutoff);
        });
    }
}

/// Dispatches parsed messages into registry/stats side effects and queues
/// any reply frames a message provokes. Holds the sender endpoint for the
/// packet currently being parsed; `outbox` is drained by the caller once
/// parsing completes, since [`MessageVisitor`] methods are synchronous and
/// sending is not.
struct NodeVisitor {
    registry: Arc<ChannelRegistry>,
    reachout: Arc<ReachoutTracker>,
    stats: Arc<Stats>,
    cookies: Arc<CookieCache>,
    identity: Arc<NodeIdentity>,
    magic: NetworkMagic,
    from: Endpoint,
    now: Instant,
    outbox: Vec<(Endpoint, Vec<u8>)>,
}

impl NodeVisitor {
    /// Admit `peer` if unknown and issue it a fresh handshake cookie.
    fn begin_handshake(&mut self, peer: Endpoint) {
        admit_unknown_sender(&self.registry, peer, PROTOCOL_VERSION, self.now);
        let cookie = self.cookies.issue(peer, self.now);
        let query = NodeIdHandshake {
            query: Some(cookie),
            response: None,
        };
        self.outbox.push((peer, frame(self.magic, &query)));
    }
}

impl MessageVisitor for NodeVisitor {
    fn keepalive(&mut self, msg: Keepalive) {
        self.stats.inc(StatType::Message, StatDetail::Keepalive, Direction::In);
        for peer in msg.peers {
            if peer.is_unspecified() || peer == self.from {
                continue;
            }
            if !self.reachout.reachout(&self.registry, peer, self.now) {
                self.begin_handshake(peer);
            }
        }
    }
    fn publish(&mut self, _msg: Publish) {
        self.stats.inc(StatType::Message, StatDetail::Publish, Direction::In);
    }
    fn confirm_req(&mut self, _msg: ConfirmReq) {
        self.stats.inc(StatType::Message, StatDetail::ConfirmReq, Direction::In);
    }
    fn confirm_ack(&mut self, _msg: ConfirmAck) {
        self.stats.inc(StatType::Message, StatDetail::ConfirmAck, Direction::In);
    }
    fn bulk_pull(&mut self, _msg: BulkPull) {}
    fn bulk_pull_account(&mut self, _msg: BulkPullAccount) {}
    fn bulk_push(&mut self, _msg: BulkPush) {}
    fn frontier_req(&mut self, _msg: FrontierReq) {}
    fn node_id_handshake(&mut self, msg: NodeIdHandshake) {
        self.stats.inc(StatType::Message, StatDetail::NodeIdHandshake, Direction::In);
        if let Some(cookie) = msg.query {
            if let Ok(signature) = self.identity.sign(&cookie) {
                let response = NodeIdHandshake {
                    query: None,
                    response: Some((self.identity.account(), signature)),
                };
                self.outbox.push((self.from, frame(self.magic, &response)));
            }
        }
        if let Some((node_id, signature)) = msg.response {
            if self
                .cookies
                .validate(self.from, node_id, &signature, &Ed25519Verifier, self.now)
            {
                self.registry.establish_node_id(self.from, node_id);
            }
        }
    }
}

#[tokio::main]
async fn main() {
    let data_dir = PathBuf::from(env("GLACIER_DATA_DIR", "./data"));
    std::fs::create_dir_all(&data_dir).expect("failed to create data directory");

    let config = NodeConfig::load_or_default(&data_dir).expect("failed to load config.toml");

    let _ = tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_env_filter(config.log_filter.clone())
        .compact()
        .try_init();

    info!(network = ?config.network, data_dir = %data_dir.display(), "glacier node starting");

    let identity = NodeIdentity::load_or_create(&data_dir).expect("failed to load or create node identity");
    info!(account = ?identity.account(), "node identity loaded");

    let self_endpoint = Endpoint::from_v4(std::net::Ipv4Addr::UNSPECIFIED, config.peer.port);
    let registry = Arc::new(ChannelRegistry::with_cap(self_endpoint, config.peer.max_peers_per_ip));

    let db = sled::open(data_dir.join("peers.sled")).expect("failed to open peer database");
    let peer_store = Arc::new(PeerStore::open(&db).expect("failed to open peer tree"));
    match peer_store.load_all() {
        Ok(peers) => {
            let now = Instant::now();
            for endpoint in peers {
                let _ = registry.insert(endpoint, 0, now);
            }
        }
        Err(e) => warn!(error = ?e, "failed to load persisted peers, starting with an empty registry"),
    }

    let stats = Stats::new(config.stats.to_runtime());
    let metrics = Arc::new(Metrics::new().expect("failed to initialize metrics"));
    metrics.wire_stats(&stats);

    let (inbound_tx, mut inbound_rx) = mpsc::channel::<InboundDatagram>(1024);
    let network_kind = match config.network {
        NetworkKindConfig::Test => NetworkKind::Test,
        NetworkKindConfig::Beta | NetworkKindConfig::Live => NetworkKind::Live,
    };
    let transport = Arc::new(
        DatagramTransport::bind(
            config.peer.port,
            network_kind,
            config.peer.allow_local_peers,
            stats.clone(),
            inbound_tx,
        )
        .await
        .expect("failed to bind UDP socket"),
    );

    let magic = config.network.magic();
    let reachout = Arc::new(ReachoutTracker::new(config.peer.reachout_cutoff()));
    let cookies = Arc::new(CookieCache::new());
    let identity = Arc::new(identity);

    let dispatch_registry = registry.clone();
    let dispatch_reachout = reachout.clone();
    let dispatch_stats = stats.clone();
    let dispatch_cookies = cookies.clone();
    let dispatch_identity = identity.clone();
    let dispatch_transport = transport.clone();
    let dispatch_task = tokio::spawn(async move {
        let ctx = NetworkContext {
            magic,
            accepted_version_min: PROTOCOL_VERSION,
        };
        let work = Blake2bWorkValidator;
        while let Some(datagram) = inbound_rx.recv().await {
            let now = Instant::now();
            if dispatch_registry.find(datagram.from).is_none() {
                admit_unknown_sender(&dispatch_registry, datagram.from, PROTOCOL_VERSION, now);
            } else {
                dispatch_registry.modify(datagram.from, |c| c.last_packet_received = now);
            }

            let mut visitor = NodeVisitor {
                registry: dispatch_registry.clone(),
                reachout: dispatch_reachout.clone(),
                stats: dispatch_stats.clone(),
                cookies: dispatch_cookies.clone(),
                identity: dispatch_identity.clone(),
                magic,
                from: datagram.from,
                now,
                outbox: Vec::new(),
            };
            let status = parse_buffer(&ctx, &datagram.data, &work, DEFAULT_THRESHOLD, &mut visitor);
            if let Some(detail) = stat_detail_for(status) {
                dispatch_stats.inc(StatType::Udp, detail, Direction::In);
                warn!(?status, from = ?datagram.from, "rejected inbound datagram");
            }
            for (peer, bytes) in visitor.outbox {
                let transport = dispatch_transport.clone();
                tokio::spawn(async move {
                    let _ = transport.send(peer, bytes).await;
                });
            }
        }
    });

    let period = config.network.period();
    let maintenance_interval = period.duration();
    let maintenance_purge_cutoff = config.peer.purge_cutoff();

    let runtime_handle = tokio::runtime::Handle::current();
    let timer = Arc::new(TimerQueue::spawn(move |cb| {
        runtime_handle.spawn(async move { cb() });
    }));
    let first_tick = Arc::downgrade(&timer);
    let (first_transport, first_registry, first_metrics, first_cookies) =
        (transport.clone(), registry.clone(), metrics.clone(), cookies.clone());
    timer.add_after(maintenance_interval, move || {
        schedule_maintenance(
            first_tick,
            first_transport,
            first_registry,
            first_metrics,
            first_cookies,
            magic,
            maintenance_interval,
            maintenance_purge_cutoff,
        );
    });

    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");

    transport.stop().await;
    drop(timer);
    dispatch_task.abort();

    if let Err(e) = store_all(&registry, peer_store.as_ref()) {
        warn!(error = ?e, "failed to persist peer database on shutdown");
    }

    info!("glacier node stopped");
}
