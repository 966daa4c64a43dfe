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

//! Glacier core networking subsystem.
//!
//! This crate provides the peer-to-peer transport, wire-format codec,
//! message parser, peer channel registry, and block/vote interning caches
//! for a delegated-voting account-chain network. Ledger storage, work
//! generation, RPC/IPC, config-file loading and the consensus confirmation
//! engine are external collaborators that sit above this crate.

/// Core protocol primitives: wire types, blocks, votes, interning caches,
/// work validation and signing.
pub mod core;
/// Node, peer and stats configuration records.
pub mod config;
/// Observability: Prometheus metrics wired to the stats engine.
pub mod monitoring;
/// Peer-to-peer networking: channel registry, datagram transport, handshake,
/// lifecycle maintenance and peer persistence.
pub mod networking;
/// Statistics engine (counters, samples, periodic logging).
pub mod stats;
/// Deferred-callback timer queue.
pub mod timer;
/// Binary wire codec and message parser.
pub mod wire;
