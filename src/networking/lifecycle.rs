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

//! Periodic peer maintenance: keepalive fan-out, handshake issuance for
//! unknown senders, and reachout de-duplication.

use crate::core::types::Endpoint;
use crate::networking::channel::ChannelState;
use crate::networking::registry::ChannelRegistry;
use crate::wire::messages::Keepalive;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// The maintenance interval, test network runs fast to keep test suites quick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodePeriod {
    /// 1 second, used by the test network.
    Test,
    /// 60 seconds, used by beta/live networks.
    Live,
}

impl NodePeriod {
    /// The interval this period represents.
    pub fn duration(self) -> Duration {
        match self {
            NodePeriod::Test => Duration::from_secs(1),
            NodePeriod::Live => Duration::from_secs(60),
        }
    }
}

/// Build the periodic keepalive: mark channels idle whose last-received
/// timestamp has aged out of `period`, then fill an 8-slot peer list from
/// the registry.
pub fn maintenance_tick(registry: &ChannelRegistry, now: Instant, period: Duration) -> Keepalive {
    for channel in registry.all() {
        registry.modify(channel.endpoint, |c| c.refresh_idle(now, period));
    }
    Keepalive {
        peers: registry.random_fill(),
    }
}

/// Tracks outstanding reachout attempts to endpoints that are not yet peers,
/// so a single endpoint is not dialed twice within the cutoff window.
pub struct ReachoutTracker {
    attempts: Mutex<HashMap<Endpoint, Instant>>,
    cutoff: Duration,
}

impl ReachoutTracker {
    /// Construct a tracker with the given de-duplication window.
    pub fn new(cutoff: Duration) -> Self {
        Self {
            attempts: Mutex::new(HashMap::new()),
            cutoff,
        }
    }

    /// Returns true if `endpoint` is already a peer, or has an outstanding
    /// attempt within the cutoff window; otherwise records a fresh attempt
    /// and returns false.
    pub fn reachout(&self, registry: &ChannelRegistry, endpoint: Endpoint, now: Instant) -> bool {
        if registry.find(endpoint).is_some() {
            return true;
        }
        let mut attempts = self.attempts.lock().expect("reachout mutex poisoned");
        if let Some(last) = attempts.get(&endpoint) {
            if now.duration_since(*last) < self.cutoff {
                return true;
            }
        }
        attempts.insert(endpoint, now);
        false
    }
}

/// On receiving a keepalive from an unknown sender below the per-IP cap,
/// create a channel for it in the `New` state so the handshake path can
/// progress it to `Handshaking`.
pub fn admit_unknown_sender(registry: &ChannelRegistry, endpoint: Endpoint, version: u8, now: Instant) -> bool {
    if registry.insert(endpoint, version, now).is_some() {
        registry.modify(endpoint, |c| c.begin_handshake());
        true
    } else {
        false
    }
}

/// True if the channel at `endpoint` has completed handshake.
pub fn is_established(registry: &ChannelRegistry, endpoint: Endpoint) -> bool {
    registry
        .find(endpoint)
        .map(|c| c.state == ChannelState::Established)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn ep(port: u16) -> Endpoint {
        Endpoint::from_v4(Ipv4Addr::new(9, 9, 9, 9), port)
    }

    #[test]
    fn reachout_deduplicates_within_cutoff() {
        let reg = ChannelRegistry::new(Endpoint::ZERO);
        let tracker = ReachoutTracker::new(Duration::from_secs(10));
        let now = Instant::now();
        assert!(!tracker.reachout(&reg, ep(1), now));
        assert!(tracker.reachout(&reg, ep(1), now));
        assert!(!tracker.reachout(&reg, ep(1), now + Duration::from_secs(20)));
    }

    #[test]
    fn reachout_is_true_for_existing_peers() {
        let reg = ChannelRegistry::new(Endpoint::ZERO);
        let tracker = ReachoutTracker::new(Duration::from_secs(10));
        let now = Instant::now();
        reg.insert(ep(2), 18, now).unwrap();
        assert!(tracker.reachout(&reg, ep(2), now));
    }

    #[test]
    fn admit_unknown_sender_begins_handshake() {
        let reg = ChannelRegistry::new(Endpoint::ZERO);
        let now = Instant::now();
        assert!(admit_unknown_sender(&reg, ep(3), 18, now));
        assert_eq!(reg.find(ep(3)).unwrap().state, ChannelState::Handshaking);
    }

    #[test]
    fn maintenance_tick_marks_aged_channels_idle() {
        let reg = ChannelRegistry::new(Endpoint::ZERO);
        let now = Instant::now();
        reg.insert(ep(4), 18, now).unwrap();
        reg.modify(ep(4), |c| c.establish(crate::core::types::Account::from_bytes([1; 32])));
        reg.modify(ep(4), |c| c.last_packet_received = now - Duration::from_secs(120));

        let _ = maintenance_tick(&reg, now, NodePeriod::Test.duration());
        assert_eq!(reg.find(ep(4)).unwrap().state, ChannelState::Idle);
    }
}
