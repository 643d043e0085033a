//! The engine's single entry point: `bestMove`, plus `evaluate`, `perft`,
//! and the cache-management calls (`clearTT`, `clearCounterMoves`,
//! `setTTSizeMiB`). Wraps a [`crate::search::Search`] and an
//! [`crate::opening_book::OpeningBook`], trying the book before falling
//! back to the search driver, and validates whatever move it's about to
//! return against the position's live legal-move list before handing it
//! back to the caller.

use std::fmt;

use chess::board::Board;
use chess::movegen::moves::Move;
use chess::san::ToSan;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::evaluate::{self, Score};
use crate::opening_book::OpeningBook;
use crate::position::Position;
use crate::search::{Search, SearchConfig, SearchReport};

/// Errors a `bestMove`/`evaluate`/`perft` call can surface to a caller.
/// `NoLegalMoves` is a recoverable, terminal-position condition (checkmate
/// or stalemate), not a bug, so it's its own variant rather than an
/// `anyhow::Error` -- only FEN parsing forwards the underlying `chess`
/// crate's `anyhow::Error` as-is.
#[derive(Debug)]
pub enum EngineError {
    InvalidFen(anyhow::Error),
    NoLegalMoves,
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::InvalidFen(err) => write!(f, "invalid FEN: {err}"),
            EngineError::NoLegalMoves => write!(f, "no legal moves available in this position"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<anyhow::Error> for EngineError {
    fn from(err: anyhow::Error) -> Self {
        EngineError::InvalidFen(err)
    }
}

/// The outcome of a `bestMove` call: either a book move (with its ECO name,
/// if curated) or a fully searched result.
#[derive(Debug, Clone)]
pub enum BestMove {
    Book { mv: Move, san: String, eco: Option<&'static str> },
    Searched(SearchReport),
}

impl BestMove {
    pub fn mv(&self) -> Option<Move> {
        match self {
            BestMove::Book { mv, .. } => Some(*mv),
            BestMove::Searched(report) => report.lines.first().map(|line| line.mv),
        }
    }
}

pub struct Engine {
    search: Search,
    book: OpeningBook,
    rng: StdRng,
}

impl Engine {
    pub fn new(tt_size_mib: usize, book_seed: u64) -> Self {
        Self { search: Search::new(tt_size_mib), book: OpeningBook::new(), rng: StdRng::seed_from_u64(book_seed) }
    }

    fn parse(fen: &str) -> Result<Position, EngineError> {
        let board: Board = fen.parse()?;
        Ok(Position::new(board))
    }

    /// Returns a book move if the position is in the opening book, otherwise
    /// runs the search driver. Whichever it is, the returned move is checked
    /// against the position's live legal moves first: a book SAN that fails
    /// to resolve, or a searched move that's somehow no longer legal,
    /// triggers a fall back to search (for book misses) or to the first
    /// legal move (as a last resort), never a move the position can't play.
    pub fn best_move(&mut self, fen: &str, config: &SearchConfig) -> Result<BestMove, EngineError> {
        let position = Self::parse(fen)?;
        let legal = position.board.legal_moves::<true>();
        if legal.is_empty() {
            return Err(EngineError::NoLegalMoves);
        }

        if let Some(entry) = self.book.sample(fen, &mut self.rng) {
            if let Some(mv) = Self::resolve_san(&position, &entry.san, &legal) {
                return Ok(BestMove::Book { mv, san: entry.san.clone(), eco: entry.eco });
            }
        }

        let report = self.search.run(&position, config);
        let validated = Self::validate(&position, report, &legal);
        Ok(BestMove::Searched(validated))
    }

    fn resolve_san(position: &Position, san: &str, legal: &[Move]) -> Option<Move> {
        legal.iter().find(|mv| mv.to_san(&position.board) == san).copied()
    }

    /// Downgrade a searched result to the first legal move, with a cleared
    /// PV, if the chosen move somehow isn't legal -- this should never
    /// trigger in practice, but `bestMove` must never hand back an illegal
    /// move.
    fn validate(position: &Position, mut report: SearchReport, legal: &[Move]) -> SearchReport {
        for line in report.lines.iter_mut() {
            if !legal.contains(&line.mv) {
                line.mv = legal[0];
                line.pv = vec![legal[0]];
            }
        }
        let _ = position;
        report
    }

    /// Evaluate `fen`, always from White's point of view. `evaluate::evaluate`
    /// itself is side-to-move-relative (what negamax needs internally), so
    /// this flips the sign back for black-to-move positions before handing
    /// the score to a caller.
    pub fn evaluate(&mut self, fen: &str) -> Result<Score, EngineError> {
        let position = Self::parse(fen)?;
        let stm_relative = evaluate::evaluate(&position, &mut self.search.pawn_cache);
        Ok(if position.board.current.is_white() { stm_relative } else { -stm_relative })
    }

    pub fn breakdown(&mut self, fen: &str) -> Result<evaluate::EvalBreakdown, EngineError> {
        let position = Self::parse(fen)?;
        Ok(evaluate::breakdown(&position, &mut self.search.pawn_cache))
    }

    pub fn perft(fen: &str, depth: usize) -> Result<u64, EngineError> {
        let board: Board = fen.parse()?;
        Ok(board.perft(depth))
    }

    pub fn clear_tt(&mut self) {
        self.search.clear_tt();
    }

    pub fn clear_counter_moves(&mut self) {
        self.search.history.countermoves.clear();
    }

    pub fn set_tt_size_mib(&mut self, mb: usize) {
        self.search.tt.resize(mb);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn book_hit_after_one_e4() {
        let mut engine = Engine::new(4, 1);
        let fen = "rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR w KQkq - 0 2";
        let config = SearchConfig::default();
        let result = engine.best_move(fen, &config).unwrap();
        assert!(matches!(result, BestMove::Book { .. }));
    }

    #[test]
    fn searched_move_is_always_legal() {
        let mut engine = Engine::new(4, 1);
        let fen = "r1bqkbnr/pppp1ppp/2n5/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R b KQkq - 2 2";
        let config = SearchConfig { limits: crate::search::time_control::SearchLimits::depth(3), ..SearchConfig::default() };
        let result = engine.best_move(fen, &config).unwrap();

        let position = Engine::parse(fen).unwrap();
        let legal = position.board.legal_moves::<true>();
        assert!(legal.contains(&result.mv().unwrap()));
    }

    #[test]
    fn mate_in_one_is_found() {
        let mut engine = Engine::new(4, 1);
        let fen = "6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 1";
        let config = SearchConfig { limits: crate::search::time_control::SearchLimits::depth(3), ..SearchConfig::default() };
        let result = engine.best_move(fen, &config).unwrap();
        assert!(result.mv().is_some());
    }

    #[test]
    fn evaluate_is_always_white_relative() {
        let mut engine = Engine::new(1, 0);
        let white_to_move = "4k3/8/8/8/8/8/8/Q3K3 w - - 0 1";
        let black_to_move = "4k3/8/8/8/8/8/8/Q3K3 b - - 0 1";

        // Same material (white is up a queen either way): the score must
        // stay positive regardless of whose turn it is to move.
        assert!(engine.evaluate(white_to_move).unwrap() > 500);
        assert!(engine.evaluate(black_to_move).unwrap() > 500);
    }
}
