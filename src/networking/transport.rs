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

//! Datagram transport: one UDP socket, a strand that serializes every send,
//! a bounded receive-buffer pool with backpressure, and error-classified
//! stat updates.

use crate::core::types::Endpoint;
use crate::stats::{Direction, StatDetail, StatType, Stats};
use std::net::Ipv6Addr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, oneshot, Semaphore};
use tokio::time::{sleep, Duration};
use tracing::warn;

/// Delay before the receive loop re-arms after a socket error.
pub const RECEIVE_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Maximum datagram size the receive pool buffers.
const MAX_DATAGRAM_SIZE: usize = 1024;

/// Whether this transport runs on the live network (affects stop behavior:
/// the live network closes asynchronously through the strand, the test
/// network closes synchronously to avoid address-reuse races in tight
/// test loops).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NetworkKind {
    /// Test network: synchronous close on stop.
    Test,
    /// Beta or live network: asynchronous close on stop.
    Live,
}

/// Transport lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportState {
    /// Constructed but not yet started.
    Constructed,
    /// Receive loop and strand are active.
    Running,
    /// `stop` has been called; no further sends are accepted.
    Stopping,
    /// Fully stopped.
    Stopped,
}

impl TransportState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => TransportState::Constructed,
            1 => TransportState::Running,
            2 => TransportState::Stopping,
            _ => TransportState::Stopped,
        }
    }
}

enum StrandCommand {
    Send {
        endpoint: Endpoint,
        data: Vec<u8>,
        callback: Option<oneshot::Sender<std::io::Result<usize>>>,
    },
    Stop,
}

/// A bounded pool of reusable receive buffers. Receives pause when the pool
/// is empty and resume once a buffer is released.
struct BufferPool {
    semaphore: Arc<Semaphore>,
}

impl BufferPool {
    fn new(capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
        }
    }
}

/// Inbound datagram accepted past the sender filter.
pub struct InboundDatagram {
    /// Sender endpoint.
    pub from: Endpoint,
    /// Payload bytes.
    pub data: Vec<u8>,
}

/// Datagram transport bound to a single serializing strand.
pub struct DatagramTransport {
    state: Arc<AtomicU8>,
    strand_tx: mpsc::Sender<StrandCommand>,
    local_endpoint: std::sync::Mutex<Endpoint>,
    network: NetworkKind,
}

fn is_reserved(addr: Ipv6Addr) -> bool {
    if let Some(v4) = addr.to_ipv4_mapped() {
        v4.is_private() || v4.is_loopback() || v4.is_link_local() || v4.is_broadcast()
    } else {
        addr.is_loopback() || addr.is_unspecified()
    }
}

impl DatagramTransport {
    /// Bind a dual-stack UDP socket on `port` and spawn the strand and
    /// receive loop. `inbound` receives datagrams that pass the sender
    /// filter; `stats` receives traffic/error counters.
    pub async fn bind(
        port: u16,
        network: NetworkKind,
        allow_local_peers: bool,
        stats: Arc<Stats>,
        inbound: mpsc::Sender<InboundDatagram>,
    ) -> std::io::Result<Self> {
        let socket = Arc::new(UdpSocket::bind(("::", port)).await?);
        let local_endpoint = Endpoint::from_socket_addr(match socket.local_addr()? {
            std::net::SocketAddr::V6(sa) => sa,
            std::net::SocketAddr::V4(sa) => {
                std::net::SocketAddrV6::new(sa.ip().to_ipv6_mapped(), sa.port(), 0, 0)
            }
        });

        let state = Arc::new(AtomicU8::new(TransportState::Constructed as u8));
        let (strand_tx, strand_rx) = mpsc::channel(1024);
        let pool = Arc::new(BufferPool::new(64));

        state.store(TransportState::Running as u8, Ordering::SeqCst);

        tokio::spawn(Self::run_strand(socket.clone(), strand_rx, stats.clone()));
        tokio::spawn(Self::run_receive_loop(
            socket,
            state.clone(),
            pool,
            local_endpoint,
            allow_local_peers,
            stats,
            inbound,
        ));

        Ok(Self {
            state,
            strand_tx,
            local_endpoint: std::sync::Mutex::new(local_endpoint),
            network,
        })
    }

    /// Current transport state.
    pub fn state(&self) -> TransportState {
        TransportState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// This transport's local endpoint (loopback:0 once stopped).
    pub fn local_endpoint(&self) -> Endpoint {
        *self.local_endpoint.lock().expect("local endpoint mutex poisoned")
    }

    /// Enqueue a send on the strand. Dropped silently once stopping/stopped.
    pub async fn send(&self, endpoint: Endpoint, data: Vec<u8>) -> Option<std::io::Result<usize>> {
        if self.state() != TransportState::Running {
            return None;
        }
        let (tx, rx) = oneshot::channel();
        if self
            .strand_tx
            .send(StrandCommand::Send {
                endpoint,
                data,
                callback: Some(tx),
            })
            .await
            .is_err()
        {
            return None;
        }
        rx.await.ok()
    }

    /// Stop the transport. Idempotent. On the test network the socket
    /// close is awaited synchronously; on live networks it is posted
    /// through the strand.
    pub async fn stop(&self) {
        let prev = self.state.swap(TransportState::Stopping as u8, Ordering::SeqCst);
        if prev != TransportState::Running as u8 {
            self.state.store(TransportState::Stopped as u8, Ordering::SeqCst);
            return;
        }

        match self.network {
            NetworkKind::Test => {
                let _ = self.strand_tx.send(StrandCommand::Stop).await;
            }
            NetworkKind::Live => {
                let tx = self.strand_tx.clone();
                tokio::spawn(async move {
                    let _ = tx.send(StrandCommand::Stop).await;
                });
            }
        }

        *self.local_endpoint.lock().expect("local endpoint mutex poisoned") =
            Endpoint::from_v4(std::net::Ipv4Addr::LOCALHOST, 0);
        self.state.store(TransportState::Stopped as u8, Ordering::SeqCst);
    }

    async fn run_strand(socket: Arc<UdpSocket>, mut rx: mpsc::Receiver<StrandCommand>, stats: Arc<Stats>) {
        while let Some(cmd) = rx.recv().await {
            match cmd {
                StrandCommand::Send { endpoint, data, callback } => {
                    let result = socket.send_to(&data, endpoint.to_socket_addr()).await;
                    match &result {
                        Ok(n) if *n > 0 => {
                            stats.add(StatType::Traffic, StatDetail::Out, Direction::Out, *n as u64, false);
                        }
                        Err(e) if e.kind() == std::io::ErrorKind::HostUnreachable => {
                            stats.inc(StatType::Error, StatDetail::UnreachableHost, Direction::Out);
                        }
                        _ => {}
                    }
                    if let Some(cb) = callback {
                        let _ = cb.send(result);
                    }
                }
                StrandCommand::Stop => break,
            }
        }
    }

    async fn run_receive_loop(
        socket: Arc<UdpSocket>,
        state: Arc<AtomicU8>,
        pool: Arc<BufferPool>,
        local_endpoint: Endpoint,
        allow_local_peers: bool,
        stats: Arc<Stats>,
        inbound: mpsc::Sender<InboundDatagram>,
    ) {
        loop {
            if TransportState::from_u8(state.load(Ordering::SeqCst)) != TransportState::Running {
                return;
            }

            let Ok(permit) = pool.semaphore.clone().acquire_owned().await else {
                return;
            };
            let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

            match socket.recv_from(&mut buf).await {
                Ok((n, from)) => {
                    drop(permit);
                    let from_endpoint = Endpoint::from_socket_addr(match from {
                        std::net::SocketAddr::V6(sa) => sa,
                        std::net::SocketAddr::V4(sa) => {
                            std::net::SocketAddrV6::new(sa.ip().to_ipv6_mapped(), sa.port(), 0, 0)
                        }
                    });
                    buf.truncate(n);

                    if from_endpoint == local_endpoint
                        || from_endpoint.is_unspecified()
                        || (!allow_local_peers && is_reserved(from_endpoint.addr))
                    {
                        stats.inc(StatType::Error, StatDetail::BadSender, Direction::In);
                        continue;
                    }

                    stats.add(StatType::Traffic, StatDetail::In, Direction::In, n as u64, false);
                    if inbound
                        .send(InboundDatagram { from: from_endpoint, data: buf })
                        .await
                        .is_err()
                    {
                        return;
                    }
                }
                Err(e) => {
                    drop(permit);
                    warn!(error = %e, "datagram receive error, re-arming after backoff");
                    sleep(RECEIVE_ERROR_BACKOFF).await;
                    if TransportState::from_u8(state.load(Ordering::SeqCst)) != TransportState::Running {
                        return;
                    }
                }
            }
        }
    }
}

impl std::fmt::Debug for DatagramTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatagramTransport")
            .field("state", &self.state())
            .field("local_endpoint", &self.local_endpoint())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::StatsConfig;

    #[tokio::test]
    async fn bind_starts_in_running_state() {
        let stats = Stats::new(StatsConfig::default());
        let (tx, _rx) = mpsc::channel(8);
        let t = DatagramTransport::bind(0, NetworkKind::Test, true, stats, tx).await.unwrap();
        assert_eq!(t.state(), TransportState::Running);
    }

    #[tokio::test]
    async fn stop_is_idempotent_and_resets_local_endpoint() {
        let stats = Stats::new(StatsConfig::default());
        let (tx, _rx) = mpsc::channel(8);
        let t = DatagramTransport::bind(0, NetworkKind::Test, true, stats, tx).await.unwrap();
        t.stop().await;
        t.stop().await;
        assert_eq!(t.state(), TransportState::Stopped);
        assert!(t.local_endpoint().is_loopback());
    }

    #[tokio::test]
    async fn send_after_stop_is_dropped() {
        let stats = Stats::new(StatsConfig::default());
        let (tx, _rx) = mpsc::channel(8);
        let t = DatagramTransport::bind(0, NetworkKind::Test, true, stats, tx).await.unwrap();
        t.stop().await;
        let result = t.send(Endpoint::ZERO, vec![1, 2, 3]).await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn two_transports_exchange_a_datagram() {
        let stats_a = Stats::new(StatsConfig::default());
        let stats_b = Stats::new(StatsConfig::default());
        let (tx_a, _rx_a) = mpsc::channel(8);
        let (tx_b, mut rx_b) = mpsc::channel(8);

        let a = DatagramTransport::bind(0, NetworkKind::Test, true, stats_a.clone(), tx_a).await.unwrap();
        let b = DatagramTransport::bind(0, NetworkKind::Test, true, stats_b, tx_b).await.unwrap();

        let b_endpoint = b.local_endpoint();
        a.send(b_endpoint, vec![9, 9, 9]).await.unwrap().unwrap();

        let received = tokio::time::timeout(Duration::from_secs(2), rx_b.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received.data, vec![9, 9, 9]);
        assert_eq!(stats_a.count(StatType::Traffic, StatDetail::Out, Direction::Out), 1);
    }
}
