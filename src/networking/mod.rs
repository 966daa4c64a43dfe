#![forbid(unsafe_code)]
#![allow(missing_docs)]

//! Peer networking: wire transport, the channel registry, handshake,
//! persistence and periodic maintenance.

pub mod channel;
pub mod handshake;
pub mod identity;
pub mod lifecycle;
pub mod persistence;
pub mod registry;
pub mod transport;

pub use channel::{Channel, ChannelState};
pub use handshake::CookieCache;
pub use identity::NodeIdentity;
pub use lifecycle::{NodePeriod, ReachoutTracker};
pub use persistence::{PeerPersistence, PeerStore};
pub use registry::ChannelRegistry;
pub use transport::{DatagramTransport, InboundDatagram, NetworkKind, TransportState};
