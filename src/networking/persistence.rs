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

//! Peer persistence: `(16-byte address, 2-byte big-endian port)` records,
//! written transactionally so a crash mid-`store_all` never leaves a
//! half-written peer set.

use crate::core::types::Endpoint;
use crate::networking::registry::ChannelRegistry;
use thiserror::Error;

/// Wire size of one persisted peer record.
pub const PEER_RECORD_SIZE: usize = 18;

/// Persistence errors.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// The backing store rejected the operation.
    #[error("sled: {0}")]
    Backend(#[from] sled::Error),
    /// Transaction failed to commit.
    #[error("transaction aborted")]
    Aborted,
}

fn encode_peer(e: Endpoint) -> [u8; PEER_RECORD_SIZE] {
    let mut out = [0u8; PEER_RECORD_SIZE];
    out[0..16].copy_from_slice(&e.addr.octets());
    out[16..18].copy_from_slice(&e.port.to_be_bytes());
    out
}

fn decode_peer(b: &[u8]) -> Option<Endpoint> {
    if b.len() != PEER_RECORD_SIZE {
        return None;
    }
    let mut addr = [0u8; 16];
    addr.copy_from_slice(&b[0..16]);
    let port = u16::from_be_bytes([b[16], b[17]]);
    Some(Endpoint::new(addr.into(), port))
}

/// Collaborator interface for durable peer storage: begin a write
/// transaction, clear it, and append records, all under one commit.
pub trait PeerPersistence {
    /// A handle to an open write transaction.
    type Tx;

    /// Begin a new write transaction.
    fn begin_write_tx(&self) -> Result<Self::Tx, PersistenceError>;
    /// Clear all previously-persisted peer records within `tx`.
    fn peer_clear(&self, tx: &mut Self::Tx) -> Result<(), PersistenceError>;
    /// Append one peer record within `tx`.
    fn peer_put(&self, tx: &mut Self::Tx, endpoint_key: [u8; PEER_RECORD_SIZE]) -> Result<(), PersistenceError>;
    /// Commit `tx`.
    fn commit(&self, tx: Self::Tx) -> Result<(), PersistenceError>;
}

/// sled-backed peer store.
pub struct PeerStore {
    tree: sled::Tree,
}

/// sled has no first-class transaction handle outside of `transaction()`;
/// batched writes play the same role here and are committed atomically via
/// [`sled::Tree::apply_batch`].
pub struct SledBatch {
    batch: sled::Batch,
    seq: u64,
}

impl PeerStore {
    /// Open (or create) the `peers` tree in `db`.
    pub fn open(db: &sled::Db) -> Result<Self, PersistenceError> {
        let tree = db.open_tree("peers")?;
        Ok(Self { tree })
    }

    /// All persisted peer endpoints.
    pub fn load_all(&self) -> Result<Vec<Endpoint>, PersistenceError> {
        let mut out = Vec::new();
        for item in self.tree.iter() {
            let (_, value) = item?;
            if let Some(e) = decode_peer(&value) {
                out.push(e);
            }
        }
        Ok(out)
    }
}

impl PeerPersistence for PeerStore {
    type Tx = SledBatch;

    fn begin_write_tx(&self) -> Result<Self::Tx, PersistenceError> {
        Ok(SledBatch {
            batch: sled::Batch::default(),
            seq: 0,
        })
    }

    fn peer_clear(&self, tx: &mut Self::Tx) -> Result<(), PersistenceError> {
        for key in self.tree.iter().keys() {
            let key = key?;
            tx.batch.remove(key);
        }
        Ok(())
    }

    fn peer_put(&self, tx: &mut Self::Tx, endpoint_key: [u8; PEER_RECORD_SIZE]) -> Result<(), PersistenceError> {
        let key = tx.seq.to_be_bytes();
        tx.batch.insert(&key, &endpoint_key[..]);
        tx.seq += 1;
        Ok(())
    }

    fn commit(&self, tx: Self::Tx) -> Result<(), PersistenceError> {
        self.tree.apply_batch(tx.batch)?;
        self.tree.flush()?;
        Ok(())
    }
}

/// Persist every channel currently in `registry` to `store`, replacing
/// whatever was previously stored.
pub fn store_all<P: PeerPersistence>(registry: &ChannelRegistry, store: &P) -> Result<(), PersistenceError> {
    let mut tx = store.begin_write_tx()?;
    store.peer_clear(&mut tx)?;
    for channel in registry.all() {
        store.peer_put(&mut tx, encode_peer(channel.endpoint))?;
    }
    store.commit(tx)
}
