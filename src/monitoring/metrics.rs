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

//! Prometheus gauges and counters wired to the stats engine's observer
//! hooks, so scraping never touches the hot path directly.

use crate::networking::ChannelRegistry;
use crate::stats::{Direction, StatDetail, StatType, Stats};
use prometheus::{IntCounter, IntGauge, Registry};
use std::sync::Arc;
use thiserror::Error;

/// Metrics errors.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// A metric name collided or failed to register with the registry.
    #[error("prometheus registration failed: {0}")]
    Prom(#[from] prometheus::Error),
}

/// Metrics container: one gauge for live peer count, plus counters mirroring
/// the stats engine's traffic/error/message aggregates.
#[derive(Clone)]
pub struct Metrics {
    /// Registry all metrics below are registered against.
    pub registry: Registry,

    /// Currently tracked peer channels.
    pub peers: IntGauge,
    /// Bytes received across all channels.
    pub traffic_in_bytes: IntCounter,
    /// Bytes sent across all channels.
    pub traffic_out_bytes: IntCounter,
    /// Datagrams rejected by the sender filter.
    pub bad_sender_total: IntCounter,
    /// Datagrams that failed header or body parsing.
    pub parse_error_total: IntCounter,
    /// Datagrams rejected for insufficient work.
    pub insufficient_work_total: IntCounter,
    /// Inbound keepalive messages.
    pub keepalive_total: IntCounter,
    /// Inbound publish messages.
    pub publish_total: IntCounter,
    /// Inbound confirm_req messages.
    pub confirm_req_total: IntCounter,
    /// Inbound confirm_ack messages.
    pub confirm_ack_total: IntCounter,
}

impl Metrics {
    /// Create and register all metrics under a fresh [`Registry`].
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let peers = IntGauge::new("glacier_peers", "Currently tracked peer channels")?;
        let traffic_in_bytes = IntCounter::new("glacier_traffic_in_bytes_total", "Bytes received")?;
        let traffic_out_bytes = IntCounter::new("glacier_traffic_out_bytes_total", "Bytes sent")?;
        let bad_sender_total =
            IntCounter::new("glacier_bad_sender_total", "Datagrams rejected by the sender filter")?;
        let parse_error_total =
            IntCounter::new("glacier_parse_error_total", "Datagrams that failed parsing")?;
        let insufficient_work_total = IntCounter::new(
            "glacier_insufficient_work_total",
            "Datagrams rejected for insufficient work",
        )?;
        let keepalive_total = IntCounter::new("glacier_message_keepalive_total", "Inbound keepalive messages")?;
        let publish_total = IntCounter::new("glacier_message_publish_total", "Inbound publish messages")?;
        let confirm_req_total =
            IntCounter::new("glacier_message_confirm_req_total", "Inbound confirm_req messages")?;
        let confirm_ack_total =
            IntCounter::new("glacier_message_confirm_ack_total", "Inbound confirm_ack messages")?;

        for metric in [
            Box::new(peers.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(traffic_in_bytes.clone()),
            Box::new(traffic_out_bytes.clone()),
            Box::new(bad_sender_total.clone()),
            Box::new(parse_error_total.clone()),
            Box::new(insufficient_work_total.clone()),
            Box::new(keepalive_total.clone()),
            Box::new(publish_total.clone()),
            Box::new(confirm_req_total.clone()),
            Box::new(confirm_ack_total.clone()),
        ] {
            registry.register(metric)?;
        }

        Ok(Self {
            registry,
            peers,
            traffic_in_bytes,
            traffic_out_bytes,
            bad_sender_total,
            parse_error_total,
            insufficient_work_total,
            keepalive_total,
            publish_total,
            confirm_req_total,
            confirm_ack_total,
        })
    }

    /// Register observers on `stats` so every counter update is mirrored
    /// into the matching Prometheus metric.
    pub fn wire_stats(&self, stats: &Arc<Stats>) {
        let delta = |counter: IntCounter| -> Box<dyn Fn(u64, u64) + Send + Sync> {
            Box::new(move |old, new| counter.inc_by(new.saturating_sub(old)))
        };

        stats.observe_count(StatType::Traffic, StatDetail::In, Direction::In, delta(self.traffic_in_bytes.clone()));
        stats.observe_count(StatType::Traffic, StatDetail::Out, Direction::Out, delta(self.traffic_out_bytes.clone()));
        stats.observe_count(StatType::Error, StatDetail::BadSender, Direction::In, delta(self.bad_sender_total.clone()));
        stats.observe_count(StatType::Udp, StatDetail::InvalidHeader, Direction::In, delta(self.parse_error_total.clone()));
        stats.observe_count(
            StatType::Udp,
            StatDetail::InsufficientWork,
            Direction::In,
            delta(self.insufficient_work_total.clone()),
        );
        stats.observe_count(StatType::Message, StatDetail::Keepalive, Direction::In, delta(self.keepalive_total.clone()));
        stats.observe_count(StatType::Message, StatDetail::Publish, Direction::In, delta(self.publish_total.clone()));
        stats.observe_count(
            StatType::Message,
            StatDetail::ConfirmReq,
            Direction::In,
            delta(self.confirm_req_total.clone()),
        );
        stats.observe_count(
            StatType::Message,
            StatDetail::ConfirmAck,
            Direction::In,
            delta(self.confirm_ack_total.clone()),
        );
    }

    /// Refresh the peer gauge from the registry's current size. Call this
    /// periodically (e.g. alongside maintenance ticks); it is not observer-driven
    /// since registry size can both grow and shrink outside of stat events.
    pub fn refresh_peer_count(&self, registry: &ChannelRegistry) {
        self.peers.set(registry.size() as i64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Endpoint;
    use crate::stats::StatsConfig;

    #[test]
    fn wired_counter_tracks_stat_updates() {
        let metrics = Metrics::new().unwrap();
        let stats = Stats::new(StatsConfig::default());
        metrics.wire_stats(&stats);

        stats.add(StatType::Traffic, StatDetail::In, Direction::In, 42, false);
        assert_eq!(metrics.traffic_in_bytes.get(), 42);
    }

    #[test]
    fn traffic_out_counter_tracks_the_outbound_stat_key() {
        let metrics = Metrics::new().unwrap();
        let stats = Stats::new(StatsConfig::default());
        metrics.wire_stats(&stats);

        stats.add(StatType::Traffic, StatDetail::Out, Direction::Out, 7, false);
        assert_eq!(metrics.traffic_out_bytes.get(), 7);
    }

    #[test]
    fn refresh_peer_count_reflects_registry_size() {
        let metrics = Metrics::new().unwrap();
        let registry = ChannelRegistry::new(Endpoint::ZERO);
        registry.insert(Endpoint::from_v4(std::net::Ipv4Addr::new(1, 2, 3, 4), 7075), 18, std::time::Instant::now());
        metrics.refresh_peer_count(&registry);
        assert_eq!(metrics.peers.get(), 1);
    }
}
