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

#![allow(missing_docs)]

//! Hierarchical counter and sample store keyed by `(type, detail, direction)`.
//!
//! Counters never decrease. Samples are optional and size-bounded; they
//! close over wall-clock intervals independent of the counters.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

/// Primary stat type (matches the reference node's `stats.hpp` taxonomy).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StatType {
    Traffic = 0,
    Error = 1,
    Message = 2,
    Udp = 3,
    Peering = 4,
    Bootstrap = 5,
    Vote = 6,
    Ledger = 7,
}

/// Secondary classification under a [`StatType`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StatDetail {
    All = 0,
    In = 1,
    Out = 2,
    BadSender = 3,
    InvalidHeader = 4,
    InvalidMessageType = 5,
    InvalidKeepaliveMessage = 6,
    InvalidPublishMessage = 7,
    InvalidConfirmReqMessage = 8,
    InvalidConfirmAckMessage = 9,
    InvalidNodeIdHandshakeMessage = 10,
    InsufficientWork = 11,
    OutdatedVersion = 12,
    UnreachableHost = 13,
    Keepalive = 14,
    Publish = 15,
    ConfirmReq = 16,
    ConfirmAck = 17,
    NodeIdHandshake = 18,
}

/// Direction a stat was observed in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Direction {
    In = 0,
    Out = 1,
}

/// 24-bit composite key: `(type << 16) | (detail << 8) | direction`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StatKey(u32);

impl StatKey {
    fn new(t: StatType, d: StatDetail, dir: Direction) -> Self {
        StatKey(((t as u32) << 16) | ((d as u32) << 8) | dir as u32)
    }
}

/// A snapshot of one completed sample interval.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Sample {
    /// Value accumulated during the interval.
    pub value: u64,
}

/// Callback invoked with `(old, new)` on every counter update.
pub type CountObserver = Box<dyn Fn(u64, u64) + Send + Sync>;
/// Callback invoked with a snapshot of the completed sample ring.
pub type SampleObserver = Box<dyn Fn(&[Sample]) + Send + Sync>;

struct Entry {
    counter: u64,
    sample_value: u64,
    sample_start: Instant,
    ring: Vec<Sample>,
    ring_capacity: usize,
    count_observers: Vec<CountObserver>,
    sample_observers: Vec<SampleObserver>,
}

impl Entry {
    fn new(now: Instant, ring_capacity: usize) -> Self {
        Self {
            counter: 0,
            sample_value: 0,
            sample_start: now,
            ring: Vec::new(),
            ring_capacity,
            count_observers: Vec::new(),
            sample_observers: Vec::new(),
        }
    }

    fn push_sample(&mut self, now: Instant) {
        if self.ring.len() >= self.ring_capacity && self.ring_capacity > 0 {
            self.ring.remove(0);
        }
        if self.ring_capacity > 0 {
            self.ring.push(Sample { value: self.sample_value });
        }
        self.sample_value = 0;
        self.sample_start = now;
        for obs in &self.sample_observers {
            obs(&self.ring);
        }
    }
}

/// Engine configuration.
#[derive(Clone, Copy, Debug)]
pub struct StatsConfig {
    /// Whether sampling is enabled at all.
    pub sampling_enabled: bool,
    /// Sample ring capacity per entry.
    pub capacity: usize,
    /// Sample interval; a sample closes once this much time has elapsed.
    pub interval: Duration,
    /// Counter log emission interval, 0 disables.
    pub log_interval_counters: Duration,
    /// Sample log emission interval, 0 disables.
    pub log_interval_samples: Duration,
    /// Number of log emissions before the sink rotates.
    pub log_rotation_count: u32,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            sampling_enabled: false,
            capacity: 60,
            interval: Duration::from_secs(1),
            log_interval_counters: Duration::ZERO,
            log_interval_samples: Duration::ZERO,
            log_rotation_count: 100,
        }
    }
}

/// The statistics engine: one entry per observed `(type, detail, direction)`.
pub struct Stats {
    config: StatsConfig,
    entries: RwLock<HashMap<StatKey, Mutex<Entry>>>,
    emissions_done: Mutex<u32>,
}

impl Stats {
    /// Construct an engine with the given configuration.
    pub fn new(config: StatsConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            entries: RwLock::new(HashMap::new()),
            emissions_done: Mutex::new(0),
        })
    }

    fn with_entry<R>(&self, key: StatKey, now: Instant, f: impl FnOnce(&mut Entry) -> R) -> R {
        {
            let entries = self.entries.read().expect("stats read lock poisoned");
            if let Some(entry) = entries.get(&key) {
                let mut guard = entry.lock().expect("stats entry mutex poisoned");
                return f(&mut guard);
            }
        }
        let mut entries = self.entries.write().expect("stats write lock poisoned");
        let entry = entries
            .entry(key)
            .or_insert_with(|| Mutex::new(Entry::new(now, self.config.capacity)));
        let mut guard = entry.lock().expect("stats entry mutex poisoned");
        f(&mut guard)
    }

    /// Increment the detail-level counter by 1 and, unless `detail_only`,
    /// the `(type, all, dir)` aggregate.
    pub fn inc(&self, t: StatType, detail: StatDetail, dir: Direction) {
        self.add(t, detail, dir, 1, false);
    }

    /// Increment the detail-level counter by 1 without touching the aggregate.
    pub fn inc_detail_only(&self, t: StatType, detail: StatDetail, dir: Direction) {
        self.add(t, detail, dir, 1, true);
    }

    /// Add `value` to the detail-level counter and, unless `detail_only`,
    /// the `(type, all, dir)` aggregate.
    pub fn add(&self, t: StatType, detail: StatDetail, dir: Direction, value: u64, detail_only: bool) {
        let now = Instant::now();
        self.update(StatKey::new(t, detail, dir), value, now);
        if !detail_only && detail != StatDetail::All {
            self.update(StatKey::new(t, StatDetail::All, dir), value, now);
        }
    }

    fn update(&self, key: StatKey, value: u64, now: Instant) {
        self.with_entry(key, now, |entry| {
            let old = entry.counter;
            entry.counter = entry.counter.saturating_add(value);
            let new = entry.counter;
            for obs in &entry.count_observers {
                obs(old, new);
            }
            if self.config.sampling_enabled && self.config.interval > Duration::ZERO {
                entry.sample_value = entry.sample_value.saturating_add(value);
                if now.duration_since(entry.sample_start) >= self.config.interval {
                    entry.push_sample(now);
                }
            }
        });
    }

    /// Current counter value for `(type, detail, direction)`.
    pub fn count(&self, t: StatType, detail: StatDetail, dir: Direction) -> u64 {
        let now = Instant::now();
        self.with_entry(StatKey::new(t, detail, dir), now, |e| e.counter)
    }

    /// Register a count observer, invoked with `(old, new)` on every update.
    pub fn observe_count(&self, t: StatType, detail: StatDetail, dir: Direction, f: CountObserver) {
        let now = Instant::now();
        self.with_entry(StatKey::new(t, detail, dir), now, |e| e.count_observers.push(f));
    }

    /// Register a sample observer, invoked with the completed ring whenever
    /// an interval closes.
    pub fn observe_sample(&self, t: StatType, detail: StatDetail, dir: Direction, f: SampleObserver) {
        let now = Instant::now();
        self.with_entry(StatKey::new(t, detail, dir), now, |e| e.sample_observers.push(f));
    }

    /// Emit all non-zero counters through `tracing`, bounded by the
    /// configured rotation count.
    pub fn log_counters(&self) {
        let mut done = self.emissions_done.lock().expect("emissions mutex poisoned");
        if *done >= self.config.log_rotation_count {
            return;
        }
        *done += 1;
        let entries = self.entries.read().expect("stats read lock poisoned");
        for (key, entry) in entries.iter() {
            let counter = entry.lock().expect("stats entry mutex poisoned").counter;
            if counter > 0 {
                info!(key = key.0, counter, "stat counter");
            }
        }
    }

    /// Emit all non-empty sample rings through `tracing`.
    pub fn log_samples(&self) {
        let entries = self.entries.read().expect("stats read lock poisoned");
        for (key, entry) in entries.iter() {
            let guard = entry.lock().expect("stats entry mutex poisoned");
            if !guard.ring.is_empty() {
                info!(key = key.0, samples = guard.ring.len(), "stat samples");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Property 8 — stat aggregation.
    #[test]
    fn aggregate_equals_sum_of_details() {
        let stats = Stats::new(StatsConfig::default());
        stats.inc(StatType::Udp, StatDetail::InvalidHeader, Direction::In);
        stats.inc(StatType::Udp, StatDetail::InvalidHeader, Direction::In);
        stats.inc(StatType::Udp, StatDetail::BadSender, Direction::In);
        let total = stats.count(StatType::Udp, StatDetail::All, Direction::In);
        let a = stats.count(StatType::Udp, StatDetail::InvalidHeader, Direction::In);
        let b = stats.count(StatType::Udp, StatDetail::BadSender, Direction::In);
        assert_eq!(total, a + b);
    }

    #[test]
    fn detail_only_skips_aggregate() {
        let stats = Stats::new(StatsConfig::default());
        stats.inc_detail_only(StatType::Traffic, StatDetail::In, Direction::In);
        assert_eq!(stats.count(StatType::Traffic, StatDetail::All, Direction::In), 0);
        assert_eq!(stats.count(StatType::Traffic, StatDetail::In, Direction::In), 1);
    }

    #[test]
    fn counters_never_decrease_and_are_independent_of_sampling() {
        let mut config = StatsConfig::default();
        config.sampling_enabled = true;
        config.interval = Duration::from_millis(1);
        let stats = Stats::new(config);
        for _ in 0..5 {
            stats.inc(StatType::Message, StatDetail::Keepalive, Direction::In);
        }
        assert_eq!(stats.count(StatType::Message, StatDetail::Keepalive, Direction::In), 5);
    }

    #[test]
    fn count_observer_sees_old_and_new() {
        let stats = Stats::new(StatsConfig::default());
        let seen = Arc::new(AtomicU64::new(0));
        let seen2 = seen.clone();
        stats.observe_count(
            StatType::Error,
            StatDetail::All,
            Direction::In,
            Box::new(move |_old, new| {
                seen2.store(new, Ordering::SeqCst);
            }),
        );
        stats.inc(StatType::Error, StatDetail::All, Direction::In);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
