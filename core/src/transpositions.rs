//! The transposition table stores previously searched results, keyed by
//! Zobrist hash, so that transpositions elsewhere in the tree can reuse work.
//!
//! Unlike a direct-mapped table (one entry per index), this table buckets
//! four entries per index. On a collision, the same-hash slot is replaced
//! only if the new search went at least as deep; otherwise the bucket's
//! weakest slot (by a combined depth/bound-type/age score) is evicted.
//! Probing scans all four slots in the bucket.

use std::mem::size_of;

use chess::movegen::moves::Move;

use crate::evaluate::util::Score;
use crate::zobrist::ZHash;

const BUCKET_SIZE: usize = 4;

/// Whether the stored score is exact, or a bound produced by a cutoff.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum NodeType {
    Exact = 0b00,
    Upper = 0b01,
    Lower = 0b10,
}

/// A single TT entry, roughly 48 bytes: 8 (hash) + 8 (move/score/depth/type
/// padded) + small fields.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TTEntry {
    hash: ZHash,
    depth: usize,
    best_move: Move,
    score: Score,
    node_type: NodeType,
    age: u8,
}

impl TTEntry {
    const NULL: TTEntry = TTEntry {
        hash: ZHash::NULL,
        best_move: Move::NULL,
        score: 0,
        depth: 0,
        node_type: NodeType::Exact,
        age: 0,
    };

    pub fn new(
        hash: ZHash,
        best_move: Move,
        score: Score,
        depth: usize,
        node_type: NodeType,
        age: u8,
    ) -> TTEntry {
        TTEntry { hash, best_move, score, depth, node_type, age }
    }

    pub fn hash(&self) -> ZHash {
        self.hash
    }

    pub fn best_move(&self) -> Move {
        self.best_move
    }

    pub fn score(&self) -> Score {
        self.score
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn node_type(&self) -> NodeType {
        self.node_type
    }

    pub fn is_empty(&self) -> bool {
        self.hash == ZHash::NULL
    }

    /// Check whether the entry can resolve the current search node outright,
    /// returning `(move, score)` if so. A shallower-than-requested entry is
    /// never usable; a bound entry is only usable if it already settles the
    /// comparison against `alpha`/`beta`.
    pub fn try_use(&self, depth: usize, alpha: Score, beta: Score) -> Option<(Move, Score)> {
        if self.depth < depth {
            return None;
        }

        match self.node_type {
            NodeType::Exact => Some((self.best_move, self.score)),
            NodeType::Upper if self.score <= alpha => Some((self.best_move, alpha)),
            NodeType::Lower if self.score >= beta => Some((self.best_move, beta)),
            _ => None,
        }
    }

    /// Replacement priority used when a bucket is full and the incoming entry
    /// doesn't match any existing slot's hash: higher is more valuable to
    /// keep, so the slot with the lowest value is evicted.
    fn keep_value(&self, current_age: u8) -> i32 {
        let exact_bonus = if self.node_type == NodeType::Exact { 4 } else { 0 };
        2 * self.depth as i32 + exact_bonus - 8 * (current_age as i32 - self.age as i32)
    }
}

impl Default for TTEntry {
    fn default() -> Self {
        TTEntry::NULL
    }
}

/// A bucket of `BUCKET_SIZE` entries sharing the same truncated index.
#[derive(Debug, Copy, Clone)]
struct Bucket {
    slots: [TTEntry; BUCKET_SIZE],
}

impl Default for Bucket {
    fn default() -> Self {
        Bucket { slots: [TTEntry::NULL; BUCKET_SIZE] }
    }
}

pub struct TTable {
    buckets: Vec<Bucket>,
    num_buckets: usize,
    occupancy: usize,
    inserts: usize,
    age: u8,
}

impl TTable {
    pub fn with_capacity_mib(mb_size: usize) -> TTable {
        let mut table = TTable {
            buckets: Vec::new(),
            num_buckets: 0,
            occupancy: 0,
            inserts: 0,
            age: 0,
        };
        table.resize(mb_size);
        table
    }

    pub fn resize(&mut self, mb_size: usize) {
        let bucket_bytes = size_of::<Bucket>();
        let num_buckets = ((mb_size << 20) / bucket_bytes).max(1);
        self.buckets = vec![Bucket::default(); num_buckets];
        self.num_buckets = num_buckets;
        self.occupancy = 0;
        self.inserts = 0;
    }

    pub fn clear(&mut self) {
        for bucket in self.buckets.iter_mut() {
            *bucket = Bucket::default();
        }
        self.occupancy = 0;
        self.inserts = 0;
        self.age = 0;
    }

    fn index(&self, hash: ZHash) -> usize {
        ZKey::from_hash(hash, self.num_buckets).0
    }

    pub fn insert(&mut self, entry: TTEntry) {
        let idx = self.index(entry.hash);
        let bucket = &mut self.buckets[idx];

        if let Some(slot) = bucket.slots.iter_mut().find(|s| s.hash == entry.hash) {
            if slot.is_empty() {
                self.occupancy += 1;
            }
            if slot.is_empty() || entry.depth >= slot.depth {
                *slot = entry;
                self.inserts += 1;
            }
            return;
        }

        if let Some(empty_slot) = bucket.slots.iter_mut().find(|s| s.is_empty()) {
            *empty_slot = entry;
            self.occupancy += 1;
            self.inserts += 1;
            return;
        }

        let weakest = bucket
            .slots
            .iter_mut()
            .min_by_key(|s| s.keep_value(self.age))
            .expect("bucket always has BUCKET_SIZE slots");
        *weakest = entry;
        self.inserts += 1;
    }

    pub fn probe(&self, hash: ZHash) -> Option<TTEntry> {
        let idx = self.index(hash);
        self.buckets[idx]
            .slots
            .iter()
            .find(|slot| !slot.is_empty() && slot.hash == hash)
            .copied()
    }

    pub fn occupancy(&self) -> f32 {
        self.occupancy as f32 / (self.num_buckets * BUCKET_SIZE) as f32
    }

    pub fn inserts(&self) -> usize {
        self.inserts
    }

    pub fn age(&self) -> u8 {
        self.age
    }

    pub fn increment_age(&mut self) {
        self.age = self.age.wrapping_add(1);
    }
}

/// A lookup key truncated from a Zobrist hash to fit the table's bucket
/// count.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ZKey(pub usize);

impl ZKey {
    pub fn from_hash(hash: ZHash, num_buckets: usize) -> Self {
        ZKey((hash.0 as usize) % num_buckets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chess::movegen::moves::{Move, MoveType};
    use chess::square::Square;

    fn mv() -> Move {
        Move::new(Square::E2, Square::E4, MoveType::DoublePush)
    }

    #[test]
    fn insert_and_probe_roundtrip() {
        let mut tt = TTable::with_capacity_mib(1);
        let hash = ZHash(0xdead_beef);
        tt.insert(TTEntry::new(hash, mv(), 123, 5, NodeType::Exact, 0));

        let entry = tt.probe(hash).expect("entry should be found");
        assert_eq!(entry.score(), 123);
        assert_eq!(entry.depth(), 5);
    }

    #[test]
    fn probe_miss_returns_none() {
        let tt = TTable::with_capacity_mib(1);
        assert!(tt.probe(ZHash(42)).is_none());
    }

    #[test]
    fn same_key_replaces_only_if_at_least_as_deep() {
        let mut tt = TTable::with_capacity_mib(1);
        let hash = ZHash(7);

        tt.insert(TTEntry::new(hash, mv(), 10, 8, NodeType::Exact, 0));
        tt.insert(TTEntry::new(hash, mv(), 20, 3, NodeType::Exact, 0));

        assert_eq!(tt.probe(hash).unwrap().depth(), 8, "shallower entry must not overwrite");

        tt.insert(TTEntry::new(hash, mv(), 30, 8, NodeType::Exact, 0));
        assert_eq!(tt.probe(hash).unwrap().score(), 30, "equal-depth entry may overwrite");
    }

    #[test]
    fn try_use_respects_bound_type() {
        let exact = TTEntry::new(ZHash(1), mv(), 50, 4, NodeType::Exact, 0);
        assert_eq!(exact.try_use(4, -100, 100), Some((mv(), 50)));

        let upper = TTEntry::new(ZHash(1), mv(), -10, 4, NodeType::Upper, 0);
        assert_eq!(upper.try_use(4, -5, 100), Some((mv(), -5)));
        assert_eq!(upper.try_use(4, -20, 100), None);

        let lower = TTEntry::new(ZHash(1), mv(), 80, 4, NodeType::Lower, 0);
        assert_eq!(lower.try_use(4, -100, 70), Some((mv(), 70)));
        assert_eq!(lower.try_use(4, -100, 90), None);
    }

    #[test]
    fn shallow_entry_is_unusable() {
        let entry = TTEntry::new(ZHash(1), mv(), 50, 2, NodeType::Exact, 0);
        assert_eq!(entry.try_use(5, -100, 100), None);
    }
}
