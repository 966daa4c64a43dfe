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

//! A single peer channel and its state machine.

use crate::core::types::{Account, Endpoint};
use std::time::{Duration, Instant};

/// Lifecycle state of a channel, tracked alongside the registry record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelState {
    /// Just created, no handshake exchanged yet.
    New,
    /// A SYN cookie has been issued and a response is outstanding.
    Handshaking,
    /// Node-id validated; the channel is a confirmed peer.
    Established,
    /// No traffic observed within the maintenance period.
    Idle,
    /// Removed from the registry.
    Purged,
}

/// Per-peer mutable record.
#[derive(Clone, Debug)]
pub struct Channel {
    /// Remote endpoint. Immutable after creation.
    pub endpoint: Endpoint,
    /// Remote node-id, set once on successful handshake.
    pub node_id: Option<Account>,
    /// Protocol version negotiated at handshake (or at insertion).
    pub version: u8,
    /// Current lifecycle state.
    pub state: ChannelState,
    /// Last time a packet was sent to this channel.
    pub last_packet_sent: Instant,
    /// Last time a packet was received from this channel.
    pub last_packet_received: Instant,
    /// Last time a bootstrap attempt was made through this channel.
    pub last_bootstrap_attempt: Instant,
}

impl Channel {
    /// Construct a freshly-inserted channel with all timestamps set to `now`.
    pub fn new(endpoint: Endpoint, version: u8, now: Instant) -> Self {
        Self {
            endpoint,
            node_id: None,
            version,
            state: ChannelState::New,
            last_packet_sent: now,
            last_packet_received: now,
            last_bootstrap_attempt: now,
        }
    }

    /// Transition `New` to `Handshaking` on first keepalive from an unknown sender.
    pub fn begin_handshake(&mut self) {
        if self.state == ChannelState::New {
            self.state = ChannelState::Handshaking;
        }
    }

    /// Transition to `Established` once a handshake response validates.
    pub fn establish(&mut self, node_id: Account) {
        self.node_id = Some(node_id);
        self.state = ChannelState::Established;
    }

    /// Record inbound traffic, refreshing the idle/established state.
    pub fn note_received(&mut self, now: Instant) {
        self.last_packet_received = now;
        if self.state == ChannelState::Idle {
            self.state = ChannelState::Established;
        }
    }

    /// Record outbound traffic.
    pub fn note_sent(&mut self, now: Instant) {
        self.last_packet_sent = now;
    }

    /// Transition to `Idle` if no traffic has been seen within `period`.
    pub fn refresh_idle(&mut self, now: Instant, period: Duration) {
        if self.state == ChannelState::Established && now.duration_since(self.last_packet_received) >= period {
            self.state = ChannelState::Idle;
        }
    }

    /// Mark the channel as removed.
    pub fn purge(&mut self) {
        self.state = ChannelState::Purged;
    }
}
