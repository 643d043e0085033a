//! The search driver: iterative deepening with aspiration windows over a
//! negamax/PVS tree with quiescence at the leaves.
//!
//! Grounded on the teacher's `search.rs`/`search/negamax.rs`/
//! `search/quiescence.rs`/`search/aspiration.rs`, trimmed to the subset
//! `SPEC_FULL.md` §4.4 actually asks for: check extension, null-move
//! pruning, futility pruning, PVS, LMR, and TT/killer/history/countermove
//! bookkeeping. The teacher's singular/multicut/negative/double
//! extensions, internal iterative reduction, correction/continuation/
//! capture history, late-move pruning, and history pruning have no
//! counterpart in `SPEC_FULL.md` and are not ported.

pub mod params;
pub mod pv;
pub mod time_control;

use chess::movegen::moves::Move;

use crate::evaluate::{self, PawnCache};
use crate::history_tables::History;
use crate::move_picker::MovePicker;
use crate::position::Position;
use crate::transpositions::{NodeType, TTEntry, TTable};
use crate::evaluate::{Score, ScoreExt};

use params::{SearchToggles, MAX_PLY};
use pv::PVTable;
use time_control::{SearchLimits, TimeController};

#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub limits: SearchLimits,
    pub toggles: SearchToggles,
    pub multi_pv: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { limits: SearchLimits::depth(6), toggles: SearchToggles::default(), multi_pv: 1 }
    }
}

#[derive(Debug, Clone)]
pub struct PVResult {
    pub mv: Move,
    pub score: Score,
    pub pv: Vec<Move>,
}

#[derive(Debug, Clone, Default)]
pub struct SearchReport {
    pub lines: Vec<PVResult>,
    pub depth: usize,
    pub nodes: u64,
    pub elapsed_ms: u128,
}

/// Owns the memory that must survive across a whole iterative-deepening
/// search call: the transposition table and move-ordering history. A
/// worker thread keeps one of these alive across requests so cutoffs
/// learned in one search keep helping the next.
pub struct Search {
    pub tt: TTable,
    pub history: History,
    pub pawn_cache: PawnCache,
}

impl Search {
    pub fn new(tt_size_mib: usize) -> Self {
        Self { tt: TTable::with_capacity_mib(tt_size_mib), history: History::new(), pawn_cache: PawnCache::new() }
    }

    pub fn clear_tt(&mut self) {
        self.tt.clear();
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Run iterative deepening from `root`, returning up to `config.multi_pv`
    /// principal variations sorted best-first.
    pub fn run(&mut self, root: &Position, config: &SearchConfig) -> SearchReport {
        self.tt.increment_age();
        self.history.clear_for_new_search();
        let (mut tc, _handle) = TimeController::new(config.limits);
        let mut nodes = 0u64;

        let legal = root.board.legal_moves::<true>();
        if legal.len() <= 1 {
            tc.stop_early();
        }

        let multi_pv = config.multi_pv.max(1).min(legal.len().max(1));
        let mut lines: Vec<PVResult> = Vec::new();
        let mut excluded: Vec<Move> = Vec::new();
        let mut depth_reached = 0;
        let start = std::time::Instant::now();

        'outer: for pv_index in 0..multi_pv {
            let mut score = 0;
            let mut depth = 1;
            let mut best_for_line: Option<PVResult> = None;

            while tc.should_start_iteration(depth) {
                let mut pv = PVTable::new();
                let result = if config.toggles.use_aspiration_windows && depth >= params::ASPIRATION_MIN_DEPTH {
                    self.aspiration_search(root, depth, score, &mut tc, &mut nodes, &mut pv, config, &excluded)
                } else {
                    let mut ctx = Ctx { tc: &mut tc, nodes: &mut nodes, config, excluded: &excluded };
                    negamax(root, depth, 0, -Score::INFINITY, Score::INFINITY, &mut pv, &mut self.tt, &mut self.history, &mut self.pawn_cache, &mut ctx)
                };

                match result {
                    Some(s) => {
                        score = s;
                        if let Some(mv) = pv.best_move() {
                            best_for_line = Some(PVResult { mv, score, pv: pv.moves().to_vec() });
                            depth_reached = depth_reached.max(depth);
                        }
                    }
                    None => break,
                }

                depth += 1;
            }

            let Some(line) = best_for_line else { break 'outer };
            excluded.push(line.mv);
            lines.push(line);
            let _ = pv_index;
        }

        if lines.is_empty() {
            // No time for even depth 1: fall back to the first legal move
            // (or report no moves at all in checkmate/stalemate).
            if let Some(&mv) = legal.first() {
                let scratch = root.play_move(mv);
                let score = -evaluate::evaluate(&scratch, &mut self.pawn_cache);
                lines.push(PVResult { mv, score, pv: vec![mv] });
            }
        }

        lines.sort_by(|a, b| b.score.cmp(&a.score));
        SearchReport { lines, depth: depth_reached, nodes, elapsed_ms: start.elapsed().as_millis() }
    }

    fn aspiration_search(
        &mut self,
        root: &Position,
        depth: usize,
        prev_score: Score,
        tc: &mut TimeController,
        nodes: &mut u64,
        pv: &mut PVTable,
        config: &SearchConfig,
        excluded: &[Move],
    ) -> Option<Score> {
        let mut window = params::ASPIRATION_BASE_WINDOW;
        let mut alpha = prev_score.saturating_sub(window);
        let mut beta = prev_score.saturating_add(window);
        let mut retries = 0;

        loop {
            pv.clear();
            let mut ctx = Ctx { tc, nodes, config, excluded };
            let score = negamax(root, depth, 0, alpha, beta, pv, &mut self.tt, &mut self.history, &mut self.pawn_cache, &mut ctx)?;

            if score <= alpha && retries < params::ASPIRATION_MAX_RETRIES {
                window *= 2;
                alpha = prev_score.saturating_sub(window);
                retries += 1;
                continue;
            }

            if score >= beta && retries < params::ASPIRATION_MAX_RETRIES {
                window *= 2;
                beta = prev_score.saturating_add(window);
                retries += 1;
                continue;
            }

            if (score <= alpha || score >= beta) && retries >= params::ASPIRATION_MAX_RETRIES {
                pv.clear();
                let mut ctx = Ctx { tc, nodes, config, excluded };
                return negamax(root, depth, 0, -Score::INFINITY, Score::INFINITY, pv, &mut self.tt, &mut self.history, &mut self.pawn_cache, &mut ctx);
            }

            return Some(score);
        }
    }
}

struct Ctx<'a> {
    tc: &'a mut TimeController,
    nodes: &'a mut u64,
    config: &'a SearchConfig,
    excluded: &'a [Move],
}

/// Negamax with alpha-beta pruning, PVS, null-move/futility pruning, and
/// late-move reductions. Returns `None` when the search was aborted by the
/// time controller, in which case the caller must discard the partial PV.
#[allow(clippy::too_many_arguments)]
fn negamax(
    position: &Position,
    mut depth: usize,
    ply: usize,
    mut alpha: Score,
    beta: Score,
    pv: &mut PVTable,
    tt: &mut TTable,
    history: &mut History,
    pawn_cache: &mut PawnCache,
    ctx: &mut Ctx<'_>,
) -> Option<Score> {
    pv.clear();
    *ctx.nodes += 1;

    if !ctx.tc.should_continue(*ctx.nodes) {
        return None;
    }

    let is_root = ply == 0;
    let is_pv = beta - alpha > 1;

    if !is_root && position.is_rule_draw() {
        return Some(0);
    }

    if ply >= MAX_PLY {
        return Some(evaluate::evaluate(position, pawn_cache));
    }

    let in_check = position.board.in_check();
    if in_check {
        depth += 1;
    }

    if depth == 0 {
        if ctx.config.toggles.use_quiescence {
            return quiescence(position, alpha, beta, ply, pawn_cache, ctx);
        }
        return Some(evaluate::evaluate(position, pawn_cache));
    }

    let tt_entry = tt.probe(position.hash);
    if !is_pv {
        if let Some(entry) = &tt_entry {
            if let Some((_, score)) = entry.try_use(depth, alpha, beta) {
                return Some(score.relative(ply));
            }
        }
    }

    let static_eval = evaluate::evaluate(position, pawn_cache);

    if ctx.config.toggles.use_null_move
        && !is_pv
        && !in_check
        && depth >= params::NULL_MOVE_MIN_DEPTH
        && static_eval >= beta
    {
        let reduction = if depth > params::NULL_MOVE_DEEP_THRESHOLD {
            params::NULL_MOVE_REDUCTION_DEEP
        } else {
            params::NULL_MOVE_REDUCTION_SHALLOW
        };
        let null_position = position.play_null_move();
        let mut null_pv = PVTable::new();
        let reduced_depth = depth.saturating_sub(1 + reduction);
        let score = -negamax(&null_position, reduced_depth, ply + 1, -beta, -beta + 1, &mut null_pv, tt, history, pawn_cache, ctx)?;
        if score >= beta {
            return Some(beta);
        }
    }

    let legal = {
        let mut moves = position.board.legal_moves::<true>();
        if is_root {
            moves.retain(|mv| !ctx.excluded.contains(mv));
        }
        moves
    };

    if legal.is_empty() {
        return Some(if in_check { -Score::MATE + ply as Score } else { 0 });
    }

    let tt_move = tt_entry.as_ref().map(|e| e.best_move());
    let mut picker = MovePicker::new(position, legal, tt_move, ply);
    picker.use_killer_moves = ctx.config.toggles.use_killer_moves;
    picker.use_history_heuristic = ctx.config.toggles.use_history_heuristic;

    let futility_margin = if ctx.config.toggles.use_futility_pruning && depth <= params::FUTILITY_MAX_DEPTH && !in_check && !is_pv {
        Some(static_eval + params::FUTILITY_MARGINS[depth])
    } else {
        None
    };

    let mut best_score = -Score::INFINITY;
    let mut best_move = None;
    let mut node_type = NodeType::Upper;
    let mut move_count = 0;
    let mut child_pv = PVTable::new();

    while let Some(mv) = picker.next(history) {
        let is_quiet = !mv.is_capture() && mv.get_promo_type().is_none();

        if let Some(margin) = futility_margin {
            if is_quiet && move_count > 0 && margin <= alpha {
                continue;
            }
        }

        let child = position.play_move(mv);
        history.push_played(mv);
        move_count += 1;

        let reduction = if ctx.config.toggles.use_lmr && is_quiet && move_count > 1 && depth >= 3 && !in_check {
            let r = params::lmr_reduction(depth, move_count);
            if is_pv {
                r.saturating_sub(1)
            } else {
                r
            }
            .min(depth.saturating_sub(1))
        } else {
            0
        };

        let score = if move_count == 1 {
            -negamax(&child, depth - 1, ply + 1, -beta, -alpha, &mut child_pv, tt, history, pawn_cache, ctx)?
        } else {
            let reduced = -negamax(&child, depth - 1 - reduction, ply + 1, -alpha - 1, -alpha, &mut child_pv, tt, history, pawn_cache, ctx)?;

            if reduced > alpha && (reduction > 0 || is_pv) {
                let widened = -negamax(&child, depth - 1, ply + 1, -beta, -alpha, &mut child_pv, tt, history, pawn_cache, ctx)?;
                widened
            } else {
                reduced
            }
        };

        history.pop_played();

        if score > best_score {
            best_score = score;
            best_move = Some(mv);
            pv.add_to_front(mv, &child_pv);
        }

        if score > alpha {
            alpha = score;
            node_type = NodeType::Exact;
        }

        if alpha >= beta {
            node_type = NodeType::Lower;
            if is_quiet {
                history.record_cutoff(ply, mv, depth);
            } else {
                // Tactical cutoffs still end the loop but don't feed the
                // quiet-move ordering tables.
            }
            break;
        } else if is_quiet {
            history.penalize(mv, depth);
        }
    }

    if let Some(mv) = best_move {
        tt.insert(TTEntry::new(position.hash, mv, best_score.absolute(ply), depth, node_type, tt.age()));
    }

    Some(best_score)
}

fn quiescence(position: &Position, mut alpha: Score, beta: Score, ply: usize, pawn_cache: &mut PawnCache, ctx: &mut Ctx<'_>) -> Option<Score> {
    *ctx.nodes += 1;

    if !ctx.tc.should_continue(*ctx.nodes) {
        return None;
    }

    if ply >= MAX_PLY {
        return Some(evaluate::evaluate(position, pawn_cache));
    }

    let stand_pat = evaluate::evaluate(position, pawn_cache);
    if stand_pat >= beta {
        return Some(beta);
    }
    if stand_pat > alpha {
        alpha = stand_pat;
    }

    const DELTA_MARGIN: Score = 975;

    let legal = position.board.legal_moves::<false>();
    let history = History::new();
    let mut picker = MovePicker::new(position, legal, None, ply);
    picker.only_good_tacticals = true;

    let mut best = stand_pat;

    while let Some(mv) = picker.next(&history) {
        if !position.board.see(mv, 0) {
            continue;
        }
        if stand_pat + DELTA_MARGIN < alpha && mv.get_promo_type().is_none() {
            continue;
        }

        let child = position.play_move(mv);
        let score = -quiescence(&child, -beta, -alpha, ply + 1, pawn_cache, ctx)?;

        if score > best {
            best = score;
        }
        if score > alpha {
            alpha = score;
        }
        if alpha >= beta {
            break;
        }
    }

    Some(best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chess::board::Board;

    #[test]
    fn finds_mate_in_one() {
        let board: Board = "6k1/5ppp/8/8/8/8/8/R5K1 w - - 0 1".parse().unwrap();
        let position = Position::new(board);
        let mut search = Search::new(4);
        let config = SearchConfig { limits: SearchLimits::depth(3), ..SearchConfig::default() };
        let report = search.run(&position, &config);

        let best = &report.lines[0];
        assert!(best.score.is_mate());
    }

    #[test]
    fn prefers_capturing_hanging_queen() {
        let board: Board = "4k3/8/8/3q4/8/8/8/R3K3 w - - 0 1".parse().unwrap();
        let position = Position::new(board);
        let mut search = Search::new(4);
        let config = SearchConfig { limits: SearchLimits::depth(4), ..SearchConfig::default() };
        let report = search.run(&position, &config);

        let best = &report.lines[0];
        assert!(best.mv.is_capture());
    }

    #[test]
    fn finds_ra8_mate_at_the_canonical_fen() {
        let board: Board = "6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 1".parse().unwrap();
        let position = Position::new(board);
        let mut search = Search::new(4);
        let config = SearchConfig { limits: SearchLimits::depth(3), ..SearchConfig::default() };
        let report = search.run(&position, &config);

        let best = &report.lines[0];
        assert!(best.score.is_mate());
        assert_eq!(best.mv.src(), chess::square::Square::A1);
        assert_eq!(best.mv.tgt(), chess::square::Square::A8);
    }

    #[test]
    fn detects_stalemate() {
        let board: Board = "7k/5Q2/6K1/8/8/8/8/8 b - - 0 1".parse().unwrap();
        let position = Position::new(board);
        assert!(!board.in_check());
        assert!(board.legal_moves::<true>().is_empty());

        let mut ctx = Ctx {
            tc: &mut TimeController::new(SearchLimits::depth(1)).0,
            nodes: &mut 0,
            config: &SearchConfig::default(),
            excluded: &[],
        };
        let mut pv = PVTable::new();
        let mut tt = TTable::with_capacity_mib(1);
        let mut history = History::new();
        let mut pawn_cache = PawnCache::new();

        let score = negamax(&position, 1, 0, -Score::INFINITY, Score::INFINITY, &mut pv, &mut tt, &mut history, &mut pawn_cache, &mut ctx);
        assert_eq!(score, Some(0));
    }

    #[test]
    fn finds_a_sound_reply_to_the_fork_puzzle() {
        let board: Board = "r1bqkbnr/pppp1ppp/2n5/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R b KQkq - 2 2".parse().unwrap();
        let position = Position::new(board);
        let mut search = Search::new(4);
        let config = SearchConfig { limits: SearchLimits::depth(4), ..SearchConfig::default() };
        let report = search.run(&position, &config);

        let best = &report.lines[0];
        assert!(board.legal_moves::<true>().contains(&best.mv));
    }
}
