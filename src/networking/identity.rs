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

//! This node's own identity: a 32-byte Ed25519 public key plus the signer
//! needed to answer handshake cookies. Loaded once at startup and held as
//! process-wide immutable context (never a mutable global, per §9).

use crate::core::security::{FileEd25519Backend, Keystore, KeystoreError, SignerBackend};
use crate::core::types::{Account, Signature};
use std::path::Path;

/// This node's identity: public key plus signing capability.
pub struct NodeIdentity {
    keystore: Keystore<FileEd25519Backend>,
}

impl NodeIdentity {
    /// Load the node's key from `data_dir`, generating one on first run.
    pub fn load_or_create(data_dir: &Path) -> Result<Self, KeystoreError> {
        let keystore = Keystore::<FileEd25519Backend>::open(
            data_dir.to_str().ok_or(KeystoreError::InvalidKey)?,
        )?;
        Ok(Self { keystore })
    }

    /// This node's public identity, exchanged during handshake.
    pub fn account(&self) -> Account {
        self.keystore.public_key()
    }

    /// Sign a handshake cookie (or any other message) with this node's key.
    pub fn sign(&self, msg: &[u8]) -> Result<Signature, KeystoreError> {
        self.keystore.sign(msg)
    }
}
