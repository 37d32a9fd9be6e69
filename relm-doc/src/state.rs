//! Per-client update counters.
//!
//! A [`StateVector`] records how many updates of each client a replica has
//! integrated. Every [`Update`](crate::Update) carries the producer's vector
//! at commit time, so a receiver can hold it back until everything it builds
//! on has arrived.

use relm_types::ClientId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Number of integrated updates, per client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateVector(BTreeMap<ClientId, u64>);

impl StateVector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Updates integrated from `client` (0 if none).
    #[must_use]
    pub fn get(&self, client: ClientId) -> u64 {
        self.0.get(&client).copied().unwrap_or(0)
    }

    /// Raises the counter for `client` to `seq`. Never lowers it.
    pub fn set(&mut self, client: ClientId, seq: u64) {
        let entry = self.0.entry(client).or_insert(0);
        if seq > *entry {
            *entry = seq;
        }
    }

    /// Advances `client` by one and returns the new count.
    pub fn increment(&mut self, client: ClientId) -> u64 {
        let entry = self.0.entry(client).or_insert(0);
        *entry += 1;
        *entry
    }

    /// True if every update counted in `other` is counted here too.
    #[must_use]
    pub fn covers(&self, other: &StateVector) -> bool {
        other.0.iter().all(|(client, seq)| self.get(*client) >= *seq)
    }

    /// Pointwise maximum.
    pub fn merge(&mut self, other: &StateVector) {
        for (client, seq) in &other.0 {
            self.set(*client, *seq);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (ClientId, u64)> + '_ {
        self.0.iter().map(|(c, s)| (*c, *s))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(raw: u64) -> ClientId {
        ClientId::from_raw(raw)
    }

    #[test]
    fn set_never_lowers() {
        let mut sv = StateVector::new();
        sv.set(c(1), 4);
        sv.set(c(1), 2);
        assert_eq!(sv.get(c(1)), 4);
        assert_eq!(sv.get(c(2)), 0);
    }

    #[test]
    fn covers_is_pointwise() {
        let mut a = StateVector::new();
        a.set(c(1), 3);
        a.set(c(2), 1);
        let mut b = StateVector::new();
        b.set(c(1), 2);
        assert!(a.covers(&b));
        assert!(!b.covers(&a));
        assert!(a.covers(&StateVector::new()));
    }

    #[test]
    fn merge_takes_maximum() {
        let mut a = StateVector::new();
        a.set(c(1), 3);
        let mut b = StateVector::new();
        b.set(c(1), 1);
        b.set(c(2), 5);
        a.merge(&b);
        assert_eq!(a.get(c(1)), 3);
        assert_eq!(a.get(c(2)), 5);
        assert_eq!(a.len(), 2);
    }

    #[test]
    fn survives_json() {
        let mut sv = StateVector::new();
        sv.increment(c(9));
        let json = serde_json::to_string(&sv).unwrap();
        assert_eq!(serde_json::from_str::<StateVector>(&json).unwrap(), sv);
    }
}
