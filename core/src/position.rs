//! A `Position` wraps a `chess::board::Board` with the additional state the
//! search and evaluator need but the board representation itself doesn't
//! carry: the incrementally maintained Zobrist hash, a pawn-only hash used to
//! key the pawn-structure cache, and a short repetition history.

use arrayvec::ArrayVec;
use chess::board::Board;
use chess::movegen::castling::CastleType;
use chess::movegen::moves::{BareMove, Move};
use chess::piece::{Color, PieceType};
use chess::square::Square;

use crate::zobrist::ZHash;

/// We never expect to need more than 100 plies of history: anything further
/// back than the last pawn move or capture can't be a repetition.
const HIST_SIZE: usize = 100;

#[derive(Debug, Clone)]
pub struct Position {
    pub board: Board,
    pub hash: ZHash,
    pub pawn_hash: ZHash,
    pub history: ArrayVec<ZHash, HIST_SIZE>,
}

impl Position {
    pub fn new(board: Board) -> Self {
        Self {
            hash: ZHash::from(&board),
            pawn_hash: ZHash::pawn_hash(&board),
            board,
            history: ArrayVec::new(),
        }
    }

    /// Whether the current position is a repetition of one earlier in this
    /// game, per the threefold-repetition convention of only comparing
    /// positions with the same side to move.
    pub fn is_repetition(&self) -> bool {
        self.history
            .iter()
            .rev()
            .skip(1)
            .step_by(2)
            .any(|&historic| historic == self.hash)
    }

    /// Draw by the 50-move rule or repetition.
    pub fn is_rule_draw(&self) -> bool {
        self.board.is_rule_draw() || self.is_repetition()
    }

    /// Play a move, returning the resulting position. The board's own
    /// `play_move` handles board-level bookkeeping (castling rights,
    /// en-passant, pins, checkers, threats); this layer only has to keep the
    /// Zobrist hashes and repetition history in step.
    pub fn play_move(&self, mv: Move) -> Self {
        assert!(mv != Move::NULL, "use play_null_move for a null move");

        let us = self.board.current;
        let source = mv.src();
        let target = mv.tgt();

        let moved_piece = self
            .board
            .get_at(source)
            .expect("move source square must hold a piece");

        let mut new_hash = self.hash;
        let mut new_pawn_hash = self.pawn_hash;

        if mv.is_capture() {
            let capture_sq = if mv.is_en_passant() {
                target.backward(us).expect("en passant capture square")
            } else {
                target
            };
            let captured = self
                .board
                .get_at(capture_sq)
                .expect("capture move must have a piece on the capture square");

            new_hash.toggle_piece(captured, capture_sq);
            if captured.is_pawn() {
                new_pawn_hash.toggle_piece(captured, capture_sq);
            }
        }

        new_hash.toggle_piece(moved_piece, source);

        let placed_piece = if let Some(promo_type) = mv.get_promo_type() {
            chess::piece::Piece::new(promo_type, us)
        } else {
            moved_piece
        };

        new_hash.toggle_piece(placed_piece, target);

        if moved_piece.is_pawn() {
            new_pawn_hash.toggle_piece(moved_piece, source);
        }
        if placed_piece.is_pawn() {
            new_pawn_hash.toggle_piece(placed_piece, target);
        }

        if mv.is_castle() {
            let ctype = CastleType::from_move(mv).expect("castle move has a CastleType");
            let rook_move = ctype.rook_move();
            let rook = self
                .board
                .get_at(rook_move.src())
                .expect("castling rook must be present");
            new_hash.toggle_piece(rook, rook_move.src());
            new_hash.toggle_piece(rook, rook_move.tgt());
        }

        let new_board = self.board.play_move(mv);

        // Castling rights always change as a set; toggle old-out, new-in.
        new_hash.toggle_castling(self.board.castling_rights);
        new_hash.toggle_castling(new_board.castling_rights);

        if let Some(ep_sq) = self.board.en_passant {
            new_hash.toggle_ep(ep_sq);
        }
        if let Some(ep_sq) = new_board.en_passant {
            new_hash.toggle_ep(ep_sq);
        }

        new_hash.toggle_side();

        let mut new_history;
        if moved_piece.is_pawn() || mv.is_capture() {
            new_history = ArrayVec::new();
        } else {
            new_history = self.history.clone();
            new_history.push(self.hash);
        }
        // Guard against a pathological game exceeding HIST_SIZE: drop the
        // oldest entry rather than panicking, since it can no longer be a
        // same-parity repetition target anyway.
        if new_history.is_full() {
            new_history.remove(0);
        }

        Self {
            board: new_board,
            hash: new_hash,
            pawn_hash: new_pawn_hash,
            history: new_history,
        }
    }

    pub fn play_null_move(&self) -> Self {
        let mut new_hash = self.hash;
        let new_board = self.board.play_move(Move::NULL);

        new_hash.toggle_side();
        if let Some(ep_sq) = self.board.en_passant {
            new_hash.toggle_ep(ep_sq);
        }

        Self {
            board: new_board,
            hash: new_hash,
            pawn_hash: self.pawn_hash,
            history: ArrayVec::new(),
        }
    }

    /// Find the legal move matching a bare (UCI long-algebraic) move and play
    /// it. Panics if no legal move matches; callers at an external boundary
    /// (FEN/UCI input) should validate first.
    pub fn play_bare_move(&self, bare: BareMove) -> Self {
        let mv = self.board.find_move(bare).expect("not a legal move");
        self.play_move(mv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chess::movegen::moves::MoveType::*;
    use chess::square::Square::*;

    #[test]
    fn incremental_hash_matches_from_scratch() {
        let initial = Position::new(
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1"
                .parse()
                .unwrap(),
        );

        let mut pos = initial.clone();
        for mv in [
            Move::new(D2, D4, DoublePush),
            Move::new(E7, E5, DoublePush),
            Move::new(C1, G5, Quiet),
            Move::new(B8, C6, Quiet),
        ] {
            pos = pos.play_move(mv);
        }

        assert_eq!(pos.hash, ZHash::from(&pos.board));
    }

    #[test]
    fn incremental_hashing_matches_for_every_legal_move() {
        let fens = [
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
            "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8",
            "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
        ];

        for fen in fens {
            let board: Board = fen.parse().unwrap();
            let position = Position::new(board);

            for mv in board.legal_moves::<true>() {
                let next = position.play_move(mv);
                assert_eq!(next.hash, ZHash::from(&next.board), "mismatch after {mv} from {fen}");
            }
        }
    }

    #[test]
    fn repetition_detection() {
        let board: Board = "3k4/8/8/8/8/8/8/3K3P w - - 0 1".parse().unwrap();
        let mut position = Position::new(board);

        position = position.play_move("d1e1".parse::<BareMove>().unwrap().into_move(&position.board));
        position = position.play_move("d8e8".parse::<BareMove>().unwrap().into_move(&position.board));
        position = position.play_move("e1d1".parse::<BareMove>().unwrap().into_move(&position.board));
        position = position.play_move("e8d8".parse::<BareMove>().unwrap().into_move(&position.board));

        assert!(position.is_repetition());
        assert_eq!(position.history.len(), 4);

        position = position.play_move("h1h2".parse::<BareMove>().unwrap().into_move(&position.board));
        assert_eq!(position.history.len(), 0);
    }

    #[test]
    fn pawn_hash_ignores_pieces() {
        let pos1 = Position::new(
            "rnbqkbnr/ppp1pppp/3p4/8/4P3/8/PPPP1PPP/RNBQKBNR w KQkq - 0 2"
                .parse()
                .unwrap(),
        );
        let pos2 = Position::new(
            "r1bqkbnr/ppp1pppp/2np4/8/2B1P3/8/PPPP1PPP/RNBQK1NR w KQkq - 2 3"
                .parse()
                .unwrap(),
        );

        assert_eq!(pos1.pawn_hash, pos2.pawn_hash);
    }

    #[allow(dead_code)]
    trait BareMoveExt {
        fn into_move(self, board: &Board) -> Move;
    }

    impl BareMoveExt for BareMove {
        fn into_move(self, board: &Board) -> Move {
            board.find_move(self).expect("legal move")
        }
    }
}
