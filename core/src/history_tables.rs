//! Move-ordering memory: killer moves, a counter-move table, and a quiet
//! history table, all consulted by the move picker and updated by the
//! search driver whenever a quiet move causes a beta cutoff.

use std::ops::{Index, IndexMut};

use chess::movegen::moves::Move;
use chess::square::Square;

use crate::search::params::MAX_PLY;

/// Per-ply killer moves: quiet moves that caused a beta cutoff at this ply
/// in a sibling branch. Two slots, most-recent first, no duplicates.
const MAX_KILLERS: usize = 2;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Killers {
    moves: [Move; MAX_KILLERS],
    len: usize,
}

impl Killers {
    pub fn new() -> Self {
        Self { moves: [Move::NULL; MAX_KILLERS], len: 0 }
    }

    pub fn moves(&self) -> &[Move] {
        &self.moves[..self.len]
    }

    pub fn add(&mut self, mv: Move) {
        if !self.moves[..self.len].contains(&mv) {
            self.moves.rotate_right(1);
            self.moves[0] = mv;
            self.len = usize::min(self.len + 1, MAX_KILLERS);
        }
    }

    pub fn clear(&mut self) {
        *self = Self::new();
    }
}

/// Index into a (from, to) keyed table: `from * 64 + to`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct HistoryIndex(usize);

impl HistoryIndex {
    pub fn new(mv: Move) -> Self {
        Self(mv.src() as usize * Square::COUNT + mv.tgt() as usize)
    }
}

/// A single saturating history score, capped so no move can ever dominate
/// ordering outright.
pub const MAX_HISTORY_SCORE: i32 = 16_384;

/// The quiet-move history table, keyed by `(from, to)` per this engine's
/// move-ordering design (the teacher keys by `(piece, target square)`
/// instead; see DESIGN.md for why this spec keys by the move's endpoints).
#[derive(Debug, Clone)]
pub struct HistoryTable {
    scores: Vec<i32>,
}

impl HistoryTable {
    fn new() -> Self {
        Self { scores: vec![0; Square::COUNT * Square::COUNT] }
    }

    /// `depth^2` bonus, clamped toward `MAX_HISTORY_SCORE` so repeated
    /// cutoffs at high depth don't let the score escape its representable
    /// range.
    pub fn bonus(depth: usize) -> i32 {
        (depth * depth) as i32
    }

    pub fn update(&mut self, idx: HistoryIndex, bonus: i32) {
        let score = &mut self.scores[idx.0];
        *score += bonus - (*score * bonus.abs()) / MAX_HISTORY_SCORE;
    }

    pub fn clear(&mut self) {
        self.scores.fill(0);
    }
}

impl Index<HistoryIndex> for HistoryTable {
    type Output = i32;

    fn index(&self, index: HistoryIndex) -> &Self::Output {
        &self.scores[index.0]
    }
}

impl IndexMut<HistoryIndex> for HistoryTable {
    fn index_mut(&mut self, index: HistoryIndex) -> &mut Self::Output {
        &mut self.scores[index.0]
    }
}

/// Stores, for each previously played move, the quiet reply that caused a
/// beta cutoff. Consulted right after killers, ahead of history-ordered
/// quiets.
#[derive(Debug, Clone)]
pub struct CountermoveTable {
    replies: Vec<Option<Move>>,
}

impl CountermoveTable {
    fn new() -> Self {
        Self { replies: vec![None; Square::COUNT * Square::COUNT] }
    }

    pub fn get(&self, prev_move: Move) -> Option<Move> {
        self.replies[HistoryIndex::new(prev_move).0]
    }

    pub fn set(&mut self, prev_move: Move, reply: Move) {
        self.replies[HistoryIndex::new(prev_move).0] = Some(reply);
    }

    pub fn clear(&mut self) {
        self.replies.fill(None);
    }
}

/// All of the move-ordering memory used across one search.
#[derive(Debug, Clone)]
pub struct History {
    pub killers: [Killers; MAX_PLY],
    pub quiet_history: HistoryTable,
    pub countermoves: CountermoveTable,
    played: Vec<Move>,
}

impl History {
    pub fn new() -> Self {
        Self {
            killers: [Killers::new(); MAX_PLY],
            quiet_history: HistoryTable::new(),
            countermoves: CountermoveTable::new(),
            played: Vec::with_capacity(MAX_PLY),
        }
    }

    pub fn clear(&mut self) {
        *self = Self::new();
    }

    /// Reset killers and the quiet-history table for a new root search,
    /// keeping the counter-move table intact: counter-moves are a
    /// session-long move-ordering hint, not per-search state, so they
    /// survive across searches the way the transposition table does.
    pub fn clear_for_new_search(&mut self) {
        self.killers = [Killers::new(); MAX_PLY];
        self.quiet_history = HistoryTable::new();
        self.played.clear();
    }

    pub fn push_played(&mut self, mv: Move) {
        self.played.push(mv);
    }

    pub fn pop_played(&mut self) {
        self.played.pop();
    }

    pub fn last_played(&self) -> Option<Move> {
        self.played.last().copied()
    }

    /// Record a quiet move that caused a beta cutoff: bump its history
    /// score, install it as a killer at this ply, and make it the
    /// counter-move to whatever was just played.
    pub fn record_cutoff(&mut self, ply: usize, mv: Move, depth: usize) {
        let bonus = HistoryTable::bonus(depth);
        self.quiet_history.update(HistoryIndex::new(mv), bonus);
        self.killers[ply].add(mv);

        if let Some(prev) = self.last_played() {
            self.countermoves.set(prev, mv);
        }
    }

    /// Penalize quiet moves that were tried and failed to cause a cutoff,
    /// so the history table discriminates rather than only ever going up.
    pub fn penalize(&mut self, mv: Move, depth: usize) {
        let bonus = -HistoryTable::bonus(depth);
        self.quiet_history.update(HistoryIndex::new(mv), bonus);
    }

    pub fn history_score(&self, mv: Move) -> i32 {
        self.quiet_history[HistoryIndex::new(mv)]
    }

    pub fn countermove(&self) -> Option<Move> {
        self.last_played().and_then(|prev| self.countermoves.get(prev))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chess::movegen::moves::MoveType;
    use chess::square::Square::*;

    fn mv(from: Square, to: Square) -> Move {
        Move::new(from, to, MoveType::Quiet)
    }

    #[test]
    fn killers_stay_deduped_and_most_recent_first() {
        let mut killers = Killers::new();
        killers.add(mv(E2, E4));
        killers.add(mv(D2, D4));
        killers.add(mv(E2, E4));

        assert_eq!(killers.moves(), &[mv(E2, E4), mv(D2, D4)]);
    }

    #[test]
    fn history_bonus_increases_score() {
        let mut table = HistoryTable::new();
        let idx = HistoryIndex::new(mv(G1, F3));
        table.update(idx, HistoryTable::bonus(6));
        assert!(table[idx] > 0);
    }

    #[test]
    fn countermove_keyed_by_previous_move() {
        let mut history = History::new();
        history.push_played(mv(E2, E4));
        history.record_cutoff(0, mv(B8, C6), 4);

        assert_eq!(history.countermove(), Some(mv(B8, C6)));
    }

    #[test]
    fn clear_for_new_search_resets_killers_and_history_but_not_countermoves() {
        let mut history = History::new();
        history.push_played(mv(E2, E4));
        history.record_cutoff(0, mv(B8, C6), 4);
        assert!(history.history_score(mv(B8, C6)) > 0);
        assert!(!history.killers[0].moves().is_empty());

        history.clear_for_new_search();

        assert_eq!(history.history_score(mv(B8, C6)), 0);
        assert!(history.killers[0].moves().is_empty());
        assert_eq!(history.countermove(), None, "played history resets too, so the previous move is forgotten");

        history.push_played(mv(E2, E4));
        assert_eq!(history.countermove(), Some(mv(B8, C6)), "the countermove table itself survives a new-search reset");
    }
}
