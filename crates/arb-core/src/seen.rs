use std::collections::{HashSet, VecDeque};

use sha2::{Digest, Sha256};

type Fingerprint = [u8; 32];

/// Bounded record of advisories already delivered.
///
/// Entries are SHA-256 fingerprints of the advisory text, ordered by when they
/// were last seen on the page. Once more than `capacity` entries are held, the
/// least recently seen are evicted until only the most recent `retain` remain.
/// Entries from the batch being recorded are never evicted by that batch,
/// unless the batch alone exceeds `capacity`.
#[derive(Clone, Debug)]
pub struct SeenAdvisorySet {
    capacity: usize,
    retain: usize,
    order: VecDeque<Fingerprint>,
    members: HashSet<Fingerprint>,
}

impl SeenAdvisorySet {
    pub fn new(capacity: usize, retain: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            retain: retain.min(capacity),
            order: VecDeque::with_capacity(capacity + 1),
            members: HashSet::with_capacity(capacity + 1),
        }
    }

    pub fn contains(&self, text: &str) -> bool {
        self.members.contains(&fingerprint(text))
    }

    /// Record a batch as the most recently seen, then evict if over capacity.
    ///
    /// Entries already present move to the back of the eviction order.
    pub fn insert_all<'a>(&mut self, texts: impl IntoIterator<Item = &'a str>) {
        let mut batch = HashSet::new();
        for text in texts {
            let fp = fingerprint(text);
            if !batch.insert(fp) {
                continue;
            }
            if !self.members.insert(fp) {
                if let Some(pos) = self.order.iter().position(|f| *f == fp) {
                    self.order.remove(pos);
                }
            }
            self.order.push_back(fp);
        }
        self.truncate(batch.len());
    }

    /// Filter `texts` down to those not yet seen, dropping repeats within the batch.
    pub fn unseen<'a>(&self, texts: &'a [String]) -> Vec<&'a String> {
        let mut batch = HashSet::new();
        texts
            .iter()
            .filter(|t| {
                let fp = fingerprint(t);
                !self.members.contains(&fp) && batch.insert(fp)
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The newest `batch` entries survive as long as they fit in `capacity`.
    fn truncate(&mut self, batch: usize) {
        if self.order.len() <= self.capacity {
            return;
        }
        let keep = self.retain.max(batch).min(self.capacity);
        while self.order.len() > keep {
            if let Some(old) = self.order.pop_front() {
                self.members.remove(&old);
            }
        }
        tracing::debug!(kept = self.order.len(), "evicted oldest seen advisories");
    }
}

fn fingerprint(text: &str) -> Fingerprint {
    let digest = Sha256::digest(text.as_bytes());
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}
