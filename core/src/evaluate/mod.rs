//! Static position evaluation: a tapered sum of material, piece-square,
//! pawn-structure, mobility, king-safety, and positional terms, grounded on
//! the teacher's `evaluate::terms` functions. The teacher accumulates every
//! term through a `Trace` so its SPSA tuner can differentiate the result;
//! this engine has no tuner in scope, so that side channel is dropped and
//! each term just returns an `S` directly.

pub mod lookups;
pub mod params;
pub mod pawn_cache;
pub mod util;

use chess::bitboard::Bitboard;
use chess::board::Board;
use chess::piece::{Color, Piece, PieceType};
use chess::square::Square;

use crate::position::Position;
use crate::zobrist::ZHash;

pub use pawn_cache::PawnCache;
pub use util::{Score, ScoreExt, S};

fn phase_256(board: &Board) -> u16 {
    (board.phase() as u16 * 256) / 24
}

fn relative_sq(piece: Piece, sq: Square) -> Square {
    if piece.color().is_white() {
        sq.flip()
    } else {
        sq
    }
}

fn material(board: &Board) -> S {
    let mut total = S::new(0, 0);
    for color in [Color::White, Color::Black] {
        let sign = if color.is_white() { 1 } else { -1 };
        for ptype in [PieceType::Pawn, PieceType::Knight, PieceType::Bishop, PieceType::Rook, PieceType::Queen] {
            let count = board.get_bb(ptype, color).count() as i32;
            total += params::PIECE_VALUES[ptype as usize] * (sign * count);
        }
    }
    total
}

fn psqt(board: &Board) -> S {
    let mut total = S::new(0, 0);
    for color in [Color::White, Color::Black] {
        let sign = if color.is_white() { 1 } else { -1 };
        for ptype in [
            PieceType::Pawn,
            PieceType::Knight,
            PieceType::Bishop,
            PieceType::Rook,
            PieceType::Queen,
            PieceType::King,
        ] {
            for sq in board.get_bb(ptype, color) {
                let piece = Piece::new(ptype, color);
                let table_sq = relative_sq(piece, sq);
                total += params::PIECE_SQUARE_TABLES[ptype as usize][table_sq as usize] * sign;
            }
        }
    }
    total
}

fn file_is_open(board: &Board, file: Bitboard) -> bool {
    (file & (board.pawns(Color::White) | board.pawns(Color::Black))).is_empty()
}

fn file_is_semi_open(board: &Board, file: Bitboard, side: Color) -> bool {
    (file & board.pawns(side)).is_empty()
}

/// Pawn-only terms: isolated/doubled/passed pawns. Cached by pawn-only hash
/// since these depend solely on pawn placement.
fn pawn_structure(board: &Board, pawn_hash: ZHash, cache: &mut PawnCache) -> S {
    if let Some(entry) = cache.probe(pawn_hash) {
        return entry.score;
    }

    let mut score = S::new(0, 0);
    let mut passed = [Bitboard::EMPTY; 2];

    for color in [Color::White, Color::Black] {
        let sign = if color.is_white() { 1 } else { -1 };
        let own_pawns = board.pawns(color);
        let enemy_pawns = board.pawns(!color);

        for sq in own_pawns {
            let file = lookups::FILES[sq as usize];

            if (lookups::ISOLATED_PAWN_MASKS[sq as usize] & own_pawns).is_empty() {
                score += params::ISOLATED_PAWN_PENALTY * sign;
            }

            if (file & own_pawns).count() > 1 {
                score += params::DOUBLED_PAWN_PENALTY * sign;
            }

            if (lookups::PASSED_PAWN_MASKS[color as usize][sq as usize] & enemy_pawns).is_empty() {
                let table_sq = if color.is_white() { sq.flip() } else { sq };
                score += params::PASSED_PAWN_TABLE[table_sq as usize] * sign;
                passed[color as usize] |= Bitboard::from(sq);
            }
        }
    }

    let entry = pawn_cache::PawnCacheEntry { score, passed_pawns: passed };
    cache.insert(pawn_hash, entry);
    score
}

fn mobility(board: &Board) -> S {
    let mut total = S::new(0, 0);

    for color in [Color::White, Color::Black] {
        let sign = if color.is_white() { 1 } else { -1 };
        let blockers = board.all_occupied();
        let own = board.occupied_by(color);

        for sq in board.knights(color) {
            let count = (sq.knight_squares() & !own).count() as i32;
            total += params::MOBILITY_BONUS[PieceType::Knight as usize] * (sign * count);
        }
        for sq in board.bishops(color) {
            let count = (sq.queen_squares(blockers) & !own).count() as i32;
            total += params::MOBILITY_BONUS[PieceType::Bishop as usize] * (sign * count / 2);
        }
        for sq in board.rooks(color) {
            let count = (sq.queen_squares(blockers) & !own).count() as i32;
            total += params::MOBILITY_BONUS[PieceType::Rook as usize] * (sign * count / 2);
        }
        for sq in board.queens(color) {
            let count = (sq.queen_squares(blockers) & !own).count() as i32;
            total += params::MOBILITY_BONUS[PieceType::Queen as usize] * (sign * count);
        }
    }

    total
}

fn king_safety(board: &Board) -> S {
    let mut total = S::new(0, 0);

    for color in [Color::White, Color::Black] {
        let sign = if color.is_white() { 1 } else { -1 };
        let king_sq = board.kings(color).first();
        let file = lookups::FILES[king_sq as usize];

        if file_is_open(board, file) {
            total += params::KING_OPEN_FILE_PENALTY * sign;
        } else if file_is_semi_open(board, file, color) {
            total += params::KING_OPEN_FILE_PENALTY * sign;
        }

        let shield = king_sq.king_squares() & board.pawns(color);
        total += params::PAWN_SHIELD_BONUS * (sign * shield.count() as i32);
    }

    total
}

fn bishop_pair(board: &Board) -> S {
    let mut total = S::new(0, 0);
    for color in [Color::White, Color::Black] {
        let sign = if color.is_white() { 1 } else { -1 };
        if board.bishops(color).count() >= 2 {
            total += params::BISHOP_PAIR_BONUS * sign;
        }
    }
    total
}

fn rook_files(board: &Board) -> S {
    let mut total = S::new(0, 0);
    for color in [Color::White, Color::Black] {
        let sign = if color.is_white() { 1 } else { -1 };
        for sq in board.rooks(color) {
            let file = lookups::FILES[sq as usize];
            if file_is_open(board, file) {
                total += params::ROOK_OPEN_FILE_BONUS * sign;
            } else if file_is_semi_open(board, file, color) {
                total += params::ROOK_SEMIOPEN_FILE_BONUS * sign;
            }
        }
    }
    total
}

fn center_control(board: &Board) -> S {
    let mut total = S::new(0, 0);
    for color in [Color::White, Color::Black] {
        let sign = if color.is_white() { 1 } else { -1 };
        let held = (board.pawns(color) | board.knights(color) | board.bishops(color)) & lookups::CENTER_SQUARES;
        total += params::CENTER_CONTROL_BONUS * (sign * held.count() as i32);
    }
    total
}

/// One labeled term in an evaluation breakdown, from White's point of view,
/// already tapered by phase.
#[derive(Debug, Clone, Copy)]
pub struct EvalTerm {
    pub name: &'static str,
    pub value: Score,
}

#[derive(Debug, Clone)]
pub struct EvalBreakdown {
    pub terms: Vec<EvalTerm>,
    pub total: Score,
}

fn terms(board: &Board) -> [(&'static str, S); 7] {
    [
        ("material", material(board)),
        ("psqt", psqt(board)),
        ("mobility", mobility(board)),
        ("king_safety", king_safety(board)),
        ("bishop_pair", bishop_pair(board)),
        ("rook_files", rook_files(board)),
        ("center_control", center_control(board)),
    ]
}

/// Evaluate `position` from the side-to-move's point of view.
pub fn evaluate(position: &Position, pawn_cache: &mut PawnCache) -> Score {
    let board = &position.board;
    let phase = phase_256(board);

    let mut total = S::new(0, 0);
    for (_, term) in terms(board) {
        total += term;
    }
    total += pawn_structure(board, position.pawn_hash, pawn_cache);

    let white_score = total.lerp(phase);
    if board.current.is_white() {
        white_score
    } else {
        -white_score
    }
}

/// A labeled, White-relative breakdown of every evaluation term, for
/// diagnostics (the CLI's `eval --verbose` output).
pub fn breakdown(position: &Position, pawn_cache: &mut PawnCache) -> EvalBreakdown {
    let board = &position.board;
    let phase = phase_256(board);

    let mut terms_out = Vec::new();
    let mut total = S::new(0, 0);

    for (name, term) in terms(board) {
        terms_out.push(EvalTerm { name, value: term.lerp(phase) });
        total += term;
    }

    let pawns = pawn_structure(board, position.pawn_hash, pawn_cache);
    terms_out.push(EvalTerm { name: "pawn_structure", value: pawns.lerp(phase) });
    total += pawns;

    EvalBreakdown { terms: terms_out, total: total.lerp(phase) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startpos_is_symmetric() {
        let board: Board = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1".parse().unwrap();
        let position = Position::new(board);
        let mut cache = PawnCache::new();
        assert_eq!(evaluate(&position, &mut cache), 0);
    }

    #[test]
    fn extra_queen_is_winning() {
        let board: Board = "4k3/8/8/8/8/8/8/Q3K3 w - - 0 1".parse().unwrap();
        let position = Position::new(board);
        let mut cache = PawnCache::new();
        assert!(evaluate(&position, &mut cache) > 500);
    }

    #[test]
    fn breakdown_terms_sum_to_total() {
        let board: Board = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1".parse().unwrap();
        let position = Position::new(board);
        let mut cache = PawnCache::new();
        let report = breakdown(&position, &mut cache);
        let sum: Score = report.terms.iter().map(|t| t.value).sum();
        assert_eq!(sum, report.total);
    }
}
