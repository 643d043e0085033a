//! Zobrist hashing.
//!
//! A position's Zobrist key is the XOR of precomputed random keys for every
//! (piece, square) pair currently on the board, the side to move, the
//! castling rights, and the en-passant file. Keys are table-driven and
//! session-stable: the tables are generated once, from a fixed seed, so the
//! same position always yields the same key within (and across) a process.
//!
//! The key is maintained incrementally by `Position::play_move` via
//! `toggle_*` calls rather than recomputed from scratch on every move.

use std::fmt::Display;
use std::sync::OnceLock;

use chess::board::Board;
use chess::movegen::castling::CastlingRights;
use chess::piece::{Color, Piece};
use chess::square::Square;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const SEED: u64 = 0x5EED_B0A7_C0FF_EE64;

struct ZobristTables {
    pieces: [[u64; Square::COUNT]; Piece::COUNT],
    castling: [u64; 16],
    ep_file: [u64; 8],
    side: u64,
}

static TABLES: OnceLock<ZobristTables> = OnceLock::new();

fn tables() -> &'static ZobristTables {
    TABLES.get_or_init(|| {
        let mut rng = StdRng::seed_from_u64(SEED);

        let mut pieces = [[0u64; Square::COUNT]; Piece::COUNT];
        for piece_row in pieces.iter_mut() {
            for slot in piece_row.iter_mut() {
                *slot = rng.gen();
            }
        }

        let mut castling = [0u64; 16];
        for slot in castling.iter_mut() {
            *slot = rng.gen();
        }

        let mut ep_file = [0u64; 8];
        for slot in ep_file.iter_mut() {
            *slot = rng.gen();
        }

        ZobristTables {
            pieces,
            castling,
            ep_file,
            side: rng.gen(),
        }
    })
}

/// A 64-bit Zobrist key.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ZHash(pub u64);

impl ZHash {
    pub const NULL: ZHash = ZHash(0);

    /// Compute the full hash for a board from scratch.
    pub fn full_hash(board: &Board) -> ZHash {
        let mut hash = ZHash::NULL;

        for square in Square::ALL {
            if let Some(piece) = board.get_at(square) {
                hash.toggle_piece(piece, square);
            }
        }

        hash.toggle_castling(board.castling_rights);

        if let Some(ep_sq) = board.en_passant {
            hash.toggle_ep(ep_sq);
        }

        if board.current == Color::Black {
            hash.toggle_side();
        }

        hash
    }

    /// Compute the pawn-only hash for a board from scratch. Used to key the
    /// evaluator's pawn-structure cache.
    pub fn pawn_hash(board: &Board) -> ZHash {
        let mut hash = ZHash::NULL;

        for square in Square::ALL {
            if let Some(piece) = board.get_at(square) {
                if piece.is_pawn() {
                    hash.toggle_piece(piece, square);
                }
            }
        }

        hash
    }

    pub fn toggle_piece(&mut self, piece: Piece, square: Square) {
        self.0 ^= tables().pieces[piece as usize][square as usize];
    }

    pub fn toggle_castling(&mut self, rights: CastlingRights) {
        self.0 ^= tables().castling[rights.0 as usize];
    }

    pub fn toggle_ep(&mut self, square: Square) {
        self.0 ^= tables().ep_file[square.file()];
    }

    pub fn toggle_side(&mut self) {
        self.0 ^= tables().side;
    }
}

impl From<&Board> for ZHash {
    fn from(board: &Board) -> Self {
        ZHash::full_hash(board)
    }
}

impl Display for ZHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_position_same_hash() {
        let board: Board = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1"
            .parse()
            .unwrap();

        assert_eq!(ZHash::full_hash(&board), ZHash::full_hash(&board));
    }

    #[test]
    fn different_positions_differ() {
        let start: Board = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1"
            .parse()
            .unwrap();
        let after_e4: Board = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1"
            .parse()
            .unwrap();

        assert_ne!(ZHash::full_hash(&start), ZHash::full_hash(&after_e4));
    }
}
