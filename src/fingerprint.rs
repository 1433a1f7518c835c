//! Content fingerprints for transition systems.
//!
//! Hashing is SHA-256 with domain separation and a length prefix, so
//! fingerprints of different kinds of data never collide by construction of
//! the input. A transition-system fingerprint depends only on the graph:
//! states are taken in canonical order and edges are described by the
//! states they connect, so neither exploration order nor encoded ids affect
//! it.
//!
//! # Citations
//! - SHA-256: NIST FIPS 180-4 (2015)
//! - Domain separation & length prefixing: Bernstein et al., "How to hash into elliptic curves" (2009)

use crate::ts::TransitionSystem;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A 256-bit hash value.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HashValue(pub [u8; 32]);

impl HashValue {
    #[inline]
    pub fn zero() -> Self {
        Self([0u8; 32])
    }

    #[inline]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    #[inline]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// SHA-256 of `b"SWF:" || domain || b":v1" || len(data) as u64 LE || data`.
    pub fn hash_with_domain(domain: &[u8], data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"SWF:");
        hasher.update(domain);
        hasher.update(b":v1");
        hasher.update((data.len() as u64).to_le_bytes());
        hasher.update(data);
        Self(hasher.finalize().into())
    }

    /// Lowercase hex of all 32 bytes.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl std::fmt::Display for HashValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // First 4 bytes are enough to tell runs apart in logs.
        write!(
            f,
            "HashValue({:02x}{:02x}{:02x}{:02x}…)",
            self.0[0], self.0[1], self.0[2], self.0[3]
        )
    }
}

fn push_field(buffer: &mut Vec<u8>, bytes: &[u8]) {
    buffer.extend_from_slice(&(bytes.len() as u64).to_le_bytes());
    buffer.extend_from_slice(bytes);
}

/// Probabilities are rounded to 12 decimals so that summation order in
/// different runs cannot change the fingerprint.
fn quantize(probability: f64) -> i64 {
    (probability * 1e12).round() as i64
}

/// Canonical fingerprint of a transition system.
///
/// Covers the bound, every state, every edge with its rounded probability
/// and label, the initial state and the set of unexplored states.
pub fn ts_fingerprint(ts: &TransitionSystem) -> HashValue {
    let keys: Vec<String> = ts.states().map(|s| s.canonical_key()).collect();
    let mut order: Vec<usize> = (0..keys.len()).collect();
    order.sort_by(|&a, &b| keys[a].cmp(&keys[b]));
    let mut rank = vec![0u64; keys.len()];
    for (position, &slot) in order.iter().enumerate() {
        rank[slot] = position as u64;
    }

    let mut data = Vec::new();
    data.extend_from_slice(&ts.bound().to_le_bytes());
    data.extend_from_slice(&(keys.len() as u64).to_le_bytes());
    for &slot in &order {
        push_field(&mut data, keys[slot].as_bytes());
    }

    let mut edges: Vec<(u64, u64, i64, Option<&str>)> = ts
        .edges()
        .iter()
        .map(|e| (rank[e.source()], rank[e.target()], quantize(e.probability()), e.label()))
        .collect();
    edges.sort();
    data.extend_from_slice(&(edges.len() as u64).to_le_bytes());
    for (source, target, probability, label) in edges {
        data.extend_from_slice(&source.to_le_bytes());
        data.extend_from_slice(&target.to_le_bytes());
        data.extend_from_slice(&probability.to_le_bytes());
        push_field(&mut data, label.unwrap_or_default().as_bytes());
    }

    data.extend_from_slice(&rank[ts.init_slot()].to_le_bytes());
    let mut pending: Vec<u64> = ts
        .unprocessed()
        .filter_map(|s| ts.slot_of(s))
        .map(|slot| rank[slot])
        .collect();
    pending.sort_unstable();
    for r in pending {
        data.extend_from_slice(&r.to_le_bytes());
    }

    HashValue::hash_with_domain(b"TRANSITION_SYSTEM", &data)
}
