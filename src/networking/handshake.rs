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

//! SYN-cookie handshake: issue a challenge bound to an endpoint, validate
//! a signed response against it.

use crate::core::security::SignatureVerifier;
use crate::core::types::{Account, Endpoint, Signature};
use rand::RngCore;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use subtle::ConstantTimeEq;

/// Cookies expire this long after issuance.
pub const SYN_COOKIE_CUTOFF: Duration = Duration::from_secs(5);

struct Cookie {
    value: [u8; 32],
    issued: Instant,
}

/// Per-endpoint outstanding SYN cookies.
pub struct CookieCache {
    cookies: Mutex<HashMap<Endpoint, Cookie>>,
}

impl Default for CookieCache {
    fn default() -> Self {
        Self::new()
    }
}

impl CookieCache {
    /// Construct an empty cache.
    pub fn new() -> Self {
        Self {
            cookies: Mutex::new(HashMap::new()),
        }
    }

    /// Issue (or re-issue) a fresh 256-bit cookie bound to `endpoint`.
    pub fn issue(&self, endpoint: Endpoint, now: Instant) -> [u8; 32] {
        let mut value = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut value);
        self.cookies
            .lock()
            .expect("cookie cache mutex poisoned")
            .insert(endpoint, Cookie { value, issued: now });
        value
    }

    /// Validate a handshake response against the outstanding cookie for
    /// `endpoint`. Expired or absent cookies fail closed. On success the
    /// cookie is consumed.
    pub fn validate(
        &self,
        endpoint: Endpoint,
        claimed_id: Account,
        signature: &Signature,
        verifier: &dyn SignatureVerifier,
        now: Instant,
    ) -> bool {
        let mut guard = self.cookies.lock().expect("cookie cache mutex poisoned");
        let Some(cookie) = guard.get(&endpoint) else {
            return false;
        };
        if now.duration_since(cookie.issued) > SYN_COOKIE_CUTOFF {
            guard.remove(&endpoint);
            return false;
        }
        let ok = verifier.verify(claimed_id, &cookie.value, signature);
        if ok {
            guard.remove(&endpoint);
        }
        ok
    }

    /// Drop all cookies older than `cutoff` relative to `now`.
    pub fn purge_expired(&self, now: Instant) {
        let mut guard = self.cookies.lock().expect("cookie cache mutex poisoned");
        guard.retain(|_, c| now.duration_since(c.issued) <= SYN_COOKIE_CUTOFF);
    }
}

/// Constant-time comparison of two cookie values, used by backends that
/// validate the challenge directly rather than through a signature.
pub fn cookies_equal(a: &[u8; 32], b: &[u8; 32]) -> bool {
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysTrueVerifier;
    impl SignatureVerifier for AlwaysTrueVerifier {
        fn verify(&self, _signer: Account, _msg: &[u8], _sig: &Signature) -> bool {
            true
        }
    }

    struct AlwaysFalseVerifier;
    impl SignatureVerifier for AlwaysFalseVerifier {
        fn verify(&self, _signer: Account, _msg: &[u8], _sig: &Signature) -> bool {
            false
        }
    }

    #[test]
    fn validate_succeeds_and_consumes_cookie() {
        let cache = CookieCache::new();
        let now = Instant::now();
        let endpoint = Endpoint::ZERO;
        cache.issue(endpoint, now);
        let id = Account::from_bytes([1; 32]);
        let sig = Signature([0; 64]);
        assert!(cache.validate(endpoint, id, &sig, &AlwaysTrueVerifier, now));
        // second attempt fails: cookie consumed
        assert!(!cache.validate(endpoint, id, &sig, &AlwaysTrueVerifier, now));
    }

    #[test]
    fn validate_fails_on_bad_signature() {
        let cache = CookieCache::new();
        let now = Instant::now();
        let endpoint = Endpoint::ZERO;
        cache.issue(endpoint, now);
        let id = Account::from_bytes([1; 32]);
        let sig = Signature([0; 64]);
        assert!(!cache.validate(endpoint, id, &sig, &AlwaysFalseVerifier, now));
    }

    #[test]
    fn expired_cookie_fails_closed() {
        let cache = CookieCache::new();
        let now = Instant::now();
        let endpoint = Endpoint::ZERO;
        cache.issue(endpoint, now);
        let later = now + SYN_COOKIE_CUTOFF + Duration::from_secs(1);
        let id = Account::from_bytes([1; 32]);
        let sig = Signature([0; 64]);
        assert!(!cache.validate(endpoint, id, &sig, &AlwaysTrueVerifier, later));
    }

    #[test]
    fn cookies_equal_is_constant_time_and_correct() {
        assert!(cookies_equal(&[1; 32], &[1; 32]));
        assert!(!cookies_equal(&[1; 32], &[2; 32]));
    }
}
