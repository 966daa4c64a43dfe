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

//! Multi-indexed table of active peer channels.
//!
//! The primary store is a map keyed by endpoint; node-id, last-seen,
//! last-bootstrap-attempt and per-IP views are derived from it under the
//! same lock rather than kept as separately-synchronized structures. All of
//! them observe the same logical record because there is exactly one.

use crate::core::types::{Account, Endpoint};
use crate::networking::channel::Channel;
use rand::seq::SliceRandom;
use std::collections::HashMap;
use std::net::Ipv6Addr;
use std::sync::Mutex;
use std::time::Instant;

/// Per-IP connection cap.
pub const DEFAULT_MAX_PEERS_PER_IP: usize = 4;

struct Inner {
    by_endpoint: HashMap<Endpoint, Channel>,
    /// Preserves first-seen order for bounded rejection sampling.
    insertion_order: Vec<Endpoint>,
}

/// Thread-safe multi-indexed channel table.
pub struct ChannelRegistry {
    inner: Mutex<Inner>,
    max_peers_per_ip: usize,
    self_endpoint: Endpoint,
}

impl ChannelRegistry {
    /// Construct an empty registry. `self_endpoint` is rejected by `insert`.
    pub fn new(self_endpoint: Endpoint) -> Self {
        Self::with_cap(self_endpoint, DEFAULT_MAX_PEERS_PER_IP)
    }

    /// Construct an empty registry with a non-default per-IP cap.
    pub fn with_cap(self_endpoint: Endpoint, max_peers_per_ip: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                by_endpoint: HashMap::new(),
                insertion_order: Vec::new(),
            }),
            max_peers_per_ip,
            self_endpoint,
        }
    }

    fn ip_count(inner: &Inner, addr: Ipv6Addr) -> usize {
        inner.by_endpoint.keys().filter(|e| e.addr == addr).count()
    }

    /// Insert a new channel for `endpoint`. Fails silently (returns `None`)
    /// when the endpoint is reserved (unspecified), is this node's own
    /// endpoint, or the per-IP cap has been reached.
    pub fn insert(&self, endpoint: Endpoint, version: u8, now: Instant) -> Option<()> {
        if endpoint.is_unspecified() || endpoint == self.self_endpoint {
            return None;
        }
        let mut inner = self.inner.lock().expect("registry mutex poisoned");
        if inner.by_endpoint.contains_key(&endpoint) {
            return None;
        }
        if Self::ip_count(&inner, endpoint.addr) >= self.max_peers_per_ip {
            return None;
        }
        inner.by_endpoint.insert(endpoint, Channel::new(endpoint, version, now));
        inner.insertion_order.push(endpoint);
        Some(())
    }

    /// Remove `endpoint` from the registry.
    pub fn erase(&self, endpoint: Endpoint) {
        let mut inner = self.inner.lock().expect("registry mutex poisoned");
        inner.by_endpoint.remove(&endpoint);
        inner.insertion_order.retain(|e| *e != endpoint);
    }

    /// Look up a channel by endpoint.
    pub fn find(&self, endpoint: Endpoint) -> Option<Channel> {
        let inner = self.inner.lock().expect("registry mutex poisoned");
        inner.by_endpoint.get(&endpoint).cloned()
    }

    /// Look up the first channel carrying `node_id`.
    pub fn find_by_node_id(&self, node_id: Account) -> Option<Channel> {
        let inner = self.inner.lock().expect("registry mutex poisoned");
        inner
            .by_endpoint
            .values()
            .find(|c| c.node_id == Some(node_id))
            .cloned()
    }

    /// Mutate the channel at `endpoint` under the registry lock. `f` must
    /// not re-enter the registry.
    pub fn modify(&self, endpoint: Endpoint, f: impl FnOnce(&mut Channel)) -> bool {
        let mut inner = self.inner.lock().expect("registry mutex poisoned");
        match inner.by_endpoint.get_mut(&endpoint) {
            Some(c) => {
                f(c);
                true
            }
            None => false,
        }
    }

    /// Establish `node_id` on the channel at `endpoint`, evicting any other
    /// channel already carrying that node id at a different endpoint (the
    /// same peer having reconnected from a new port).
    pub fn establish_node_id(&self, endpoint: Endpoint, node_id: Account) -> bool {
        let mut inner = self.inner.lock().expect("registry mutex poisoned");
        if !inner.by_endpoint.contains_key(&endpoint) {
            return false;
        }
        let stale: Vec<Endpoint> = inner
            .by_endpoint
            .iter()
            .filter(|(e, c)| **e != endpoint && c.node_id == Some(node_id))
            .map(|(e, _)| *e)
            .collect();
        for e in stale {
            inner.by_endpoint.remove(&e);
            inner.insertion_order.retain(|x| *x != e);
        }
        inner.by_endpoint.get_mut(&endpoint).unwrap().establish(node_id);
        true
    }

    /// Up to `n` distinct channels, drawn by bounded rejection sampling
    /// (cutoff = `2n` attempts).
    pub fn random_set(&self, n: usize) -> Vec<Channel> {
        let inner = self.inner.lock().expect("registry mutex poisoned");
        if inner.insertion_order.is_empty() || n == 0 {
            return Vec::new();
        }
        let mut rng = rand::thread_rng();
        let mut chosen = Vec::with_capacity(n.min(inner.insertion_order.len()));
        let mut seen = std::collections::HashSet::new();
        let cutoff = 2 * n;
        for _ in 0..cutoff {
            if chosen.len() >= n || chosen.len() >= inner.insertion_order.len() {
                break;
            }
            let Some(endpoint) = inner.insertion_order.choose(&mut rng) else {
                break;
            };
            if seen.insert(*endpoint) {
                if let Some(c) = inner.by_endpoint.get(endpoint) {
                    chosen.push(c.clone());
                }
            }
        }
        chosen
    }

    /// Fill an 8-slot endpoint array from a random sample, padding unused
    /// slots with the zero endpoint.
    pub fn random_fill(&self) -> [Endpoint; 8] {
        let mut slots = [Endpoint::ZERO; 8];
        for (slot, channel) in slots.iter_mut().zip(self.random_set(8)) {
            *slot = channel.endpoint;
        }
        slots
    }

    /// The least-recently-attempted peer whose version is at least
    /// `min_version`, updating its last-bootstrap-attempt atomically.
    pub fn bootstrap_peer(&self, min_version: u8, now: Instant) -> Option<Channel> {
        let mut inner = self.inner.lock().expect("registry mutex poisoned");
        let endpoint = inner
            .by_endpoint
            .values()
            .filter(|c| c.version >= min_version)
            .min_by_key(|c| c.last_bootstrap_attempt)
            .map(|c| c.endpoint)?;
        let channel = inner.by_endpoint.get_mut(&endpoint)?;
        channel.last_bootstrap_attempt = now;
        Some(channel.clone())
    }

    /// Erase every channel whose last-packet-received is older than `cutoff`.
    pub fn purge(&self, cutoff: Instant) {
        let mut inner = self.inner.lock().expect("registry mutex poisoned");
        let dead: Vec<Endpoint> = inner
            .by_endpoint
            .values()
            .filter(|c| c.last_packet_received < cutoff)
            .map(|c| c.endpoint)
            .collect();
        for endpoint in dead {
            inner.by_endpoint.remove(&endpoint);
            inner.insertion_order.retain(|e| *e != endpoint);
        }
    }

    /// Number of channels currently indexed.
    pub fn size(&self) -> usize {
        self.inner.lock().expect("registry mutex poisoned").by_endpoint.len()
    }

    /// Every channel currently indexed, in no particular order.
    pub fn all(&self) -> Vec<Channel> {
        self.inner
            .lock()
            .expect("registry mutex poisoned")
            .by_endpoint
            .values()
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use std::time::Duration;

    fn ep(a: u8, b: u8, c: u8, d: u8, port: u16) -> Endpoint {
        Endpoint::from_v4(Ipv4Addr::new(a, b, c, d), port)
    }

    #[test]
    fn by_endpoint_has_no_duplicates_and_find_round_trips() {
        let reg = ChannelRegistry::new(Endpoint::ZERO);
        let now = Instant::now();
        assert!(reg.insert(ep(1, 1, 1, 1, 100), 18, now).is_some());
        assert!(reg.insert(ep(1, 1, 1, 1, 100), 18, now).is_none());
        assert!(reg.find(ep(1, 1, 1, 1, 100)).is_some());
        assert_eq!(reg.size(), 1);
    }

    /// Scenario D — registry eviction.
    #[test]
    fn per_ip_cap_evicts_beyond_the_limit() {
        let reg = ChannelRegistry::with_cap(Endpoint::ZERO, 4);
        let now = Instant::now();
        for port in 0..4u16 {
            assert!(reg.insert(ep(2, 2, 2, 2, 100 + port), 18, now).is_some());
        }
        assert!(reg.insert(ep(2, 2, 2, 2, 200), 18, now).is_none());
        assert_eq!(reg.size(), 4);
    }

    /// Scenario E — purge cutoff.
    #[test]
    fn purge_leaves_only_fresh_channels() {
        let reg = ChannelRegistry::new(Endpoint::ZERO);
        let now = Instant::now();
        let old = now - Duration::from_secs(10);
        reg.insert(ep(3, 3, 3, 3, 1), 18, old).unwrap();
        reg.insert(ep(3, 3, 3, 3, 2), 18, now).unwrap();
        reg.modify(ep(3, 3, 3, 3, 1), |c| c.last_packet_received = old);
        reg.modify(ep(3, 3, 3, 3, 2), |c| c.last_packet_received = now);

        reg.purge(now - Duration::from_secs(5));
        assert_eq!(reg.size(), 1);
        assert!(reg.find(ep(3, 3, 3, 3, 2)).is_some());
        assert!(reg.find(ep(3, 3, 3, 3, 1)).is_none());
    }

    /// Scenario F — random_fill.
    #[test]
    fn random_fill_pads_unused_slots_with_zero() {
        let reg = ChannelRegistry::new(Endpoint::ZERO);
        let now = Instant::now();
        reg.insert(ep(4, 4, 4, 4, 1), 18, now).unwrap();
        reg.insert(ep(4, 4, 4, 4, 2), 18, now).unwrap();
        reg.insert(ep(4, 4, 4, 4, 3), 18, now).unwrap();

        let slots = reg.random_fill();
        let nonzero = slots.iter().filter(|e| **e != Endpoint::ZERO).count();
        assert_eq!(nonzero, 3);
        let distinct: std::collections::HashSet<_> = slots.iter().filter(|e| **e != Endpoint::ZERO).collect();
        assert_eq!(distinct.len(), 3);
    }

    #[test]
    fn purge_monotonicity_holds_for_remaining_channels() {
        let reg = ChannelRegistry::new(Endpoint::ZERO);
        let now = Instant::now();
        for port in 0..5u16 {
            reg.insert(ep(5, 5, 5, 5, port), 18, now - Duration::from_secs(port as u64)).unwrap();
            reg.modify(ep(5, 5, 5, 5, port), |c| {
                c.last_packet_received = now - Duration::from_secs(port as u64);
            });
        }
        let cutoff = now - Duration::from_secs(2);
        reg.purge(cutoff);
        let inner = reg.inner.lock().unwrap();
        for c in inner.by_endpoint.values() {
            assert!(c.last_packet_received >= cutoff);
        }
    }

    /// A peer reconnecting on a new port keeps one channel under its node id.
    #[test]
    fn establishing_node_id_evicts_the_stale_endpoint_for_that_peer() {
        let reg = ChannelRegistry::new(Endpoint::ZERO);
        let now = Instant::now();
        let old_ep = ep(7, 7, 7, 7, 1);
        let new_ep = ep(7, 7, 7, 7, 2);
        let node_id = Account::from_bytes([9; 32]);

        reg.insert(old_ep, 18, now).unwrap();
        assert!(reg.establish_node_id(old_ep, node_id));
        reg.insert(new_ep, 18, now).unwrap();
        assert!(reg.establish_node_id(new_ep, node_id));

        assert!(reg.find(old_ep).is_none());
        assert_eq!(reg.find(new_ep).unwrap().node_id, Some(node_id));
        assert_eq!(reg.size(), 1);
    }

    #[test]
    fn bootstrap_peer_picks_least_recently_attempted() {
        let reg = ChannelRegistry::new(Endpoint::ZERO);
        let now = Instant::now();
        reg.insert(ep(6, 6, 6, 6, 1), 18, now).unwrap();
        reg.insert(ep(6, 6, 6, 6, 2), 18, now).unwrap();
        reg.modify(ep(6, 6, 6, 6, 1), |c| c.last_bootstrap_attempt = now - Duration::from_secs(100));
        reg.modify(ep(6, 6, 6, 6, 2), |c| c.last_bootstrap_attempt = now);

        let picked = reg.bootstrap_peer(0, now).unwrap();
        assert_eq!(picked.endpoint, ep(6, 6, 6, 6, 1));
        // attempt timestamp updated atomically
        assert_eq!(reg.find(ep(6, 6, 6, 6, 1)).unwrap().last_bootstrap_attempt, now);
    }
}
