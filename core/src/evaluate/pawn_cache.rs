//! A bounded pawn-structure cache, keyed by the pawn-only Zobrist hash.
//!
//! The teacher's `pawn_cache.rs` is a fixed-size direct-mapped array sized in
//! MiB up front, same as the transposition table. This spec instead bounds
//! the cache by *entry count* and evicts the oldest quarter of entries (by
//! insertion order) once full, which is simpler to reason about without a
//! `size_of::<PawnCacheEntry>()` capacity calculation.

use std::collections::{HashMap, VecDeque};

use chess::bitboard::Bitboard;

use crate::zobrist::ZHash;

use super::util::S;

const DEFAULT_CAPACITY: usize = 8192;

#[derive(Copy, Clone, Debug)]
pub struct PawnCacheEntry {
    pub score: S,
    pub passed_pawns: [Bitboard; 2],
}

pub struct PawnCache {
    entries: HashMap<ZHash, PawnCacheEntry>,
    order: VecDeque<ZHash>,
    capacity: usize,
}

impl PawnCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { entries: HashMap::with_capacity(capacity), order: VecDeque::with_capacity(capacity), capacity }
    }

    pub fn probe(&self, hash: ZHash) -> Option<PawnCacheEntry> {
        self.entries.get(&hash).copied()
    }

    pub fn insert(&mut self, hash: ZHash, entry: PawnCacheEntry) {
        if self.entries.insert(hash, entry).is_some() {
            return;
        }
        self.order.push_back(hash);

        if self.entries.len() > self.capacity {
            let evict_count = usize::max(1, self.capacity / 4);
            for _ in 0..evict_count {
                if let Some(oldest) = self.order.pop_front() {
                    self.entries.remove(&oldest);
                } else {
                    break;
                }
            }
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl Default for PawnCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> PawnCacheEntry {
        PawnCacheEntry { score: S::new(0, 0), passed_pawns: [Bitboard::EMPTY; 2] }
    }

    #[test]
    fn probe_miss_then_hit() {
        let mut cache = PawnCache::with_capacity(4);
        let hash = ZHash(42);
        assert!(cache.probe(hash).is_none());

        cache.insert(hash, entry());
        assert!(cache.probe(hash).is_some());
    }

    #[test]
    fn evicts_oldest_quarter_when_full() {
        let mut cache = PawnCache::with_capacity(4);
        for i in 0..5 {
            cache.insert(ZHash(i), entry());
        }
        assert!(cache.len() <= 4);
        assert!(cache.probe(ZHash(0)).is_none());
        assert!(cache.probe(ZHash(4)).is_some());
    }
}
