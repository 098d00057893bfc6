//! Principal-variation search with quiescence, iterative deepening and
//! aspiration windows, and the usual forward-pruning family: futility,
//! razoring, null move with threat detection, internal iterative deepening,
//! SEE pruning, and table-driven late move reductions.

pub mod ordering;
pub mod see;
pub mod tt;
pub mod workers;

use arrayvec::ArrayVec;

use crate::board::{Piece, Position};
use crate::eval;
use crate::moves::execute::{
    do_move, do_null_move, is_legal, is_legal_hashmove, undo_move, undo_null_move,
};
use crate::moves::types::Move;
use crate::search::ordering::{MoveOrder, OrderMode};
use crate::search::tt::Bound;
use crate::search::workers::EngineContext;
use crate::tables::tables;

pub const INF: i32 = 10_000;
pub const MATE: i32 = INF - 1;
pub const MATED: i32 = -MATE;
pub const MATE_MAX_PLY: i32 = MATE - 64;
pub const MATED_MAX_PLY: i32 = MATED + 64;
pub const DRAW: i32 = 0;

pub const MAX_DEPTH: u32 = 64;
const STACK_SIZE: usize = 192;
const MAX_QPLY: u16 = 100;
const ASPIRATION_DELTA: i32 = 65;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeType {
    Root,
    Pv,
    NonPv,
}

impl NodeType {
    #[inline(always)]
    fn is_pv(self) -> bool {
        !matches!(self, NodeType::NonPv)
    }
}

/// Per-ply search record.
#[derive(Clone, Copy)]
struct Node {
    ply: u16,
    in_check: bool,
    null_search: bool,
    curr_move: Move,
    threat_move: Move,
    killers: [Move; 4],
    static_eval: i32,
}

impl Default for Node {
    fn default() -> Node {
        Node {
            ply: 0,
            in_check: false,
            null_search: false,
            curr_move: Move::NONE,
            threat_move: Move::NONE,
            killers: [Move::NONE; 4],
            static_eval: -INF,
        }
    }
}

#[inline]
fn reduction(pv: bool, improving: bool, depth: i32, move_count: usize) -> i32 {
    let t = tables();
    i32::from(
        t.reductions[usize::from(pv)][usize::from(improving)]
            [depth.clamp(0, 63) as usize][move_count.min(63)],
    )
}

#[inline]
fn razor_margin(depth: i32) -> f32 {
    950.0 * (1.0 - ((depth as f32 - 64.0) / 20.0).exp())
}

#[inline]
fn lazy_eval_margin(depth: i32, advanced_pawns: bool) -> f32 {
    if advanced_pawns {
        -1.0
    } else {
        350.0 * (1.0 - ((depth as f32 - 64.0) / 20.0).exp())
    }
}

#[inline]
fn score_to_tt(score: i32, ply: u16) -> i32 {
    if score >= MATE_MAX_PLY {
        score + i32::from(ply)
    } else if score <= MATED_MAX_PLY {
        score - i32::from(ply)
    } else {
        score
    }
}

#[inline]
fn score_from_tt(score: i32, ply: u16) -> i32 {
    if score >= MATE_MAX_PLY {
        score - i32::from(ply)
    } else if score <= MATED_MAX_PLY {
        score + i32::from(ply)
    } else {
        score
    }
}

/// One search thread: its own position clone and node stack, shared tables
/// through the context.
pub struct SearchWorker<'a> {
    pub pos: Position,
    ctx: &'a EngineContext,
    stack: Box<[Node; STACK_SIZE]>,
    age: u8,
    pub completed_depth: u32,
    pub last_score: i32,
}

impl<'a> SearchWorker<'a> {
    pub fn new(ctx: &'a EngineContext, pos: Position) -> SearchWorker<'a> {
        SearchWorker {
            pos,
            ctx,
            stack: Box::new([Node::default(); STACK_SIZE]),
            age: 0,
            completed_depth: 0,
            last_score: 0,
        }
    }

    #[inline(always)]
    fn stopped(&self) -> bool {
        self.ctx.stopped()
    }

    fn evaluate(&self, margin: f32) -> i32 {
        eval::evaluate(
            &self.pos,
            &self.ctx.pawn_table,
            &self.ctx.material_table,
            margin,
        )
        .round() as i32
    }

    /// Iterative deepening with an aspiration window around the previous
    /// score; the window doubles away from the failing side until the return
    /// fits.
    pub fn iterative_deepening(&mut self, max_depth: u32, silent: bool) {
        let mut eval_score = -INF;
        let depth_limit = if self.pos.params.fixed_depth > 0 {
            (self.pos.params.fixed_depth as u32).min(MAX_DEPTH)
        } else {
            max_depth.min(MAX_DEPTH)
        };

        *self.stack = [Node::default(); STACK_SIZE];

        let first = 1 + u32::from(self.pos.id());
        for id in first..=depth_limit {
            if self.stopped() {
                break;
            }
            self.age = id as u8;
            self.stack[0].ply = 0;
            self.stack[1].ply = 0;

            let mut delta = ASPIRATION_DELTA;
            loop {
                let (alpha, beta) = if id >= 2 {
                    ((eval_score - delta).max(-INF), (eval_score + delta).min(INF))
                } else {
                    (-INF, INF)
                };

                eval_score = self.search(NodeType::Root, alpha, beta, id as i32, 2);

                if self.pos.is_master() && !self.stopped() {
                    if silent {
                        self.record_bestmove();
                    } else {
                        self.readout_pv(eval_score, id);
                    }
                    if id >= self.pos.params.thread_depth {
                        self.ctx.release_helpers();
                    }
                    if id == depth_limit {
                        self.ctx.request_stop();
                    }
                }

                if self.stopped() {
                    break;
                }
                if eval_score <= alpha || eval_score >= beta {
                    delta += delta;
                    continue;
                }
                break;
            }

            if !self.stopped() {
                self.completed_depth = id;
                self.last_score = eval_score;
            }
        }
    }

    fn search(&mut self, nt: NodeType, mut alpha: i32, mut beta: i32, depth: i32, sp: usize) -> i32 {
        if self.stopped() {
            return DRAW;
        }
        debug_assert!(alpha < beta);

        let pv_type = nt.is_pv();
        let in_check = self.pos.in_check();
        self.stack[sp].in_check = in_check;
        self.stack[sp].ply = self.stack[sp - 1].ply + 1;
        self.stack[sp].curr_move = Move::NONE;
        let ply = self.stack[sp].ply;

        // mate distance pruning
        {
            let mating = MATE - i32::from(ply);
            beta = beta.min(mating);
            if alpha >= mating {
                return mating;
            }
            let mated = MATED + i32::from(ply);
            alpha = alpha.max(mated);
            if beta <= mated {
                return mated;
            }
        }

        if self.pos.is_draw() {
            return DRAW;
        }

        // checking sequences can extend without consuming depth; brake before
        // the stack runs out
        if ply >= MAX_QPLY || sp + 2 >= STACK_SIZE {
            return if in_check { DRAW } else { self.evaluate(-1.0) };
        }

        let mut ttm = Move::NONE;
        let mut ttvalue = -INF;
        if let Some(e) = self.ctx.tt.probe(self.pos.key()) {
            ttm = e.mv;
            ttvalue = score_from_tt(i32::from(e.score), ply);
            if i32::from(e.depth) >= depth {
                let cut = match e.bound {
                    Bound::Lower => ttvalue >= beta,
                    Bound::Upper => ttvalue <= alpha,
                    Bound::Exact => ttvalue > alpha && ttvalue < beta,
                };
                if cut {
                    return ttvalue;
                }
            }
        }

        let advanced_pawns = self.pos.pawns_near_promotion();
        let stm_pawns_on_7th = self.pos.pawns_on_7th();

        let static_eval = if ttvalue != -INF {
            ttvalue
        } else if !in_check {
            self.evaluate(lazy_eval_margin(depth, advanced_pawns))
        } else {
            -INF
        };
        self.stack[sp].static_eval = static_eval;

        let forward_prune = !in_check
            && !pv_type
            && self.stack[sp - 1].curr_move.is_quiet()
            && !self.stack[sp].null_search
            && (alpha - beta).abs() == 1
            && static_eval != -INF;

        // futility: a hopeless frontier node
        if forward_prune
            && !stm_pawns_on_7th
            && depth <= 1
            && static_eval > MATED_MAX_PLY
            && static_eval + 950 < alpha
        {
            return alpha;
        }

        // razoring: drop straight into quiescence when far below alpha
        if depth <= 1
            && forward_prune
            && ttm.is_none()
            && !stm_pawns_on_7th
            && static_eval + razor_margin(depth) as i32 <= alpha
        {
            let v = self.qsearch(NodeType::NonPv, alpha, beta, sp);
            if v <= alpha {
                return v;
            }
        }

        // null move: hand over the move and still expect to hold beta
        if forward_prune
            && self.pos.non_pawn_material(self.pos.stm())
            && depth >= 2
            && static_eval >= beta
        {
            let r = if depth >= 6 { depth / 2 } else { 2 };
            let ndepth = depth - r;

            self.stack[sp + 1].null_search = true;
            do_null_move(&mut self.pos);
            let null_eval = if ndepth <= 1 {
                -self.qsearch(NodeType::NonPv, -beta, -beta + 1, sp + 1)
            } else {
                -self.search(NodeType::NonPv, -beta, -beta + 1, ndepth, sp + 1)
            };
            undo_null_move(&mut self.pos);
            self.stack[sp + 1].null_search = false;

            if null_eval >= beta {
                return beta;
            }

            // a large fail-low names the opponent's threat; remember it for
            // the ordering bonus on evasions
            let tm = self.stack[sp + 1].curr_move;
            if !tm.is_quiet() && !tm.is_none() && (null_eval - beta).abs() >= 200 {
                self.stack[sp].threat_move = tm;
            }
        }

        // internal iterative deepening to seed the hash move
        if ttm.is_none()
            && depth >= if pv_type { 6 } else { 4 }
            && (pv_type || static_eval + 50 >= beta)
        {
            let iid_depth = depth - 2 - depth / 6;
            self.stack[sp].null_search = true;
            let int_nt = if pv_type { NodeType::Pv } else { NodeType::NonPv };
            self.search(int_nt, alpha, beta, iid_depth, sp);
            self.stack[sp].null_search = false;
            if let Some(e) = self.ctx.tt.probe(self.pos.key()) {
                ttm = e.mv;
            }
        }

        let pre_move = self.stack[sp - 1].curr_move;
        let pre_pre_move = self.stack[sp - 2].curr_move;
        let threat = self.stack[sp].threat_move;
        let killers = self.stack[sp].killers;
        let improving = self.stack[sp].static_eval - self.stack[sp - 2].static_eval >= 0;

        let mut orderer = MoveOrder::new(&self.pos, ttm, killers, OrderMode::MAIN);
        let mut best_score = -INF;
        let mut best_move = Move::NONE;
        let original_alpha = alpha;
        let mut moves_searched: usize = 0;
        let mut quiets: ArrayVec<Move, 64> = ArrayVec::new();
        let mut deferred: ArrayVec<Move, 64> = ArrayVec::new();
        let mut draining_deferred = false;

        loop {
            let m = if !draining_deferred {
                match orderer.next_move(&self.pos, pre_move, pre_pre_move, threat) {
                    Some(m) => m,
                    None => {
                        draining_deferred = true;
                        continue;
                    }
                }
            } else if deferred.is_empty() {
                break;
            } else {
                deferred.remove(0)
            };

            if self.stopped() {
                return DRAW;
            }
            if !is_legal(&self.pos, m) {
                continue;
            }

            let is_killer = killers.contains(&m);
            let moved_piece = self.pos.piece_on(m.from);

            // losing tactics at the frontier are not worth a node
            if m != ttm
                && !is_killer
                && !pv_type
                && !in_check
                && best_score < alpha
                && !m.is_quiet()
                && !m.is_promotion()
                && depth <= 1
                && moves_searched > 1
                && see::see(&self.pos, m) < 0
            {
                continue;
            }

            // duplicate-effort guard between workers at high depth
            if !draining_deferred
                && depth > self.pos.params.thread_depth as i32
                && moves_searched > 0
                && self.ctx.is_move_busy(self.pos.key(), m)
            {
                if deferred.try_push(m).is_ok() {
                    continue;
                }
            }
            self.ctx.mark_move_busy(self.pos.key(), m, true);

            do_move(&mut self.pos, m);
            self.stack[sp].curr_move = m;
            let gives_check = self.pos.in_check();
            let extensions = i32::from(gives_check);

            let mut reductions = 1;
            if !pv_type
                && m.is_quiet()
                && m != ttm
                && !is_killer
                && !in_check
                && moved_piece != Some(Piece::King)
                && best_score + 250 < alpha
                && best_score > MATED_MAX_PLY
            {
                reductions += reduction(pv_type, improving, depth, moves_searched) / 2;
                let hscore = self.pos.stats.score(
                    self.pos.stm().opposite(),
                    m,
                    pre_move,
                    pre_pre_move,
                    threat,
                    self.pos.params.counter_move_bonus as i32,
                    self.pos.params.threat_evasion_bonus as i32,
                );
                if hscore < 0 {
                    reductions += 1;
                }
            }

            let newdepth = depth + extensions - reductions;

            let score;
            if moves_searched < 3 {
                score = if newdepth <= 1 {
                    -self.qsearch(NodeType::Pv, -beta, -alpha, sp + 1)
                } else {
                    -self.search(NodeType::Pv, -beta, -alpha, newdepth - 1, sp + 1)
                };
            } else {
                let mut lmr = newdepth;
                if m.is_quiet()
                    && m != ttm
                    && !is_killer
                    && !m.is_promotion()
                    && !in_check
                    && !gives_check
                    && best_score <= alpha
                {
                    lmr -= reduction(pv_type, improving, depth, moves_searched);
                }

                let mut s = if lmr <= 1 {
                    -self.qsearch(NodeType::NonPv, -alpha - 1, -alpha, sp + 1)
                } else {
                    -self.search(NodeType::NonPv, -alpha - 1, -alpha, lmr - 1, sp + 1)
                };
                if s > alpha {
                    s = if newdepth <= 1 {
                        -self.qsearch(NodeType::Pv, -beta, -alpha, sp + 1)
                    } else {
                        -self.search(NodeType::Pv, -beta, -alpha, newdepth - 1, sp + 1)
                    };
                }
                score = s;
            }

            moves_searched += 1;
            if m.is_quiet() {
                let _ = quiets.try_push(m);
            }

            undo_move(&mut self.pos, m);
            self.ctx.mark_move_busy(self.pos.key(), m, false);

            if score > best_score {
                best_score = score;
                best_move = m;
                if score > alpha {
                    alpha = score;
                }
                if score >= beta {
                    deferred.clear();
                    if best_move.is_quiet() {
                        let stm = self.pos.stm();
                        self.pos.stats.update(
                            stm,
                            best_move,
                            pre_move,
                            depth,
                            score,
                            MATE_MAX_PLY,
                            &quiets,
                            &mut self.stack[sp].killers,
                        );
                    }
                    break;
                }
            }
        }

        if moves_searched == 0 {
            return if in_check {
                MATED + i32::from(ply)
            } else {
                DRAW
            };
        }

        if self.stopped() {
            return DRAW;
        }

        let bound = if best_score >= beta {
            Bound::Lower
        } else if best_score > original_alpha {
            Bound::Exact
        } else {
            Bound::Upper
        };
        self.ctx.tt.store(
            self.pos.key(),
            depth.clamp(0, 255) as u8,
            bound,
            self.age,
            best_move,
            score_to_tt(best_score, ply).clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16,
            pv_type,
        );

        best_score
    }

    fn qsearch(&mut self, nt: NodeType, mut alpha: i32, beta: i32, sp: usize) -> i32 {
        if self.stopped() {
            return DRAW;
        }

        self.stack[sp].ply = self.stack[sp - 1].ply + 1;
        let ply = self.stack[sp].ply;
        let in_check = self.pos.in_check();
        self.stack[sp].in_check = in_check;
        self.stack[sp].curr_move = Move::NONE;

        if self.pos.is_draw() {
            return DRAW;
        }

        // runaway capture chains and evasion trees stop at the brake
        if ply >= MAX_QPLY || sp + 1 >= STACK_SIZE {
            return self.evaluate(-1.0);
        }

        let mut ttm = Move::NONE;
        if let Some(e) = self.ctx.tt.probe(self.pos.key()) {
            ttm = e.mv;
            let ttvalue = score_from_tt(i32::from(e.score), ply);
            let cut = match e.bound {
                Bound::Lower => ttvalue >= beta,
                Bound::Upper => ttvalue <= alpha,
                Bound::Exact => ttvalue > alpha && ttvalue < beta,
            };
            if cut {
                return ttvalue;
            }
        }

        let mut best_score = -INF;

        if !in_check {
            best_score = self.evaluate(-1.0);
            if best_score + 975 < alpha {
                return best_score;
            }
            if best_score >= beta {
                return best_score;
            }
            if alpha < best_score {
                alpha = best_score;
            }
        }

        const DELTA_VALS: [i32; 5] = [100, 300, 315, 480, 910];
        const DELTA_MARGIN: i32 = 250;

        let pre_move = self.stack[sp - 1].curr_move;
        let pre_pre_move = self.stack[sp - 2].curr_move;
        let threat = self.stack[sp].threat_move;
        let killers = self.stack[sp].killers;

        let mut orderer = MoveOrder::new(&self.pos, ttm, killers, OrderMode::QUIESCENCE);
        let mut moves_searched = 0usize;

        while let Some(m) = orderer.next_move(&self.pos, pre_move, pre_pre_move, threat) {
            if self.stopped() {
                return DRAW;
            }
            if !is_legal(&self.pos, m) {
                continue;
            }

            // delta pruning on the victim's value
            let capture_gain = if m.is_en_passant() {
                DELTA_VALS[0]
            } else if m.is_capture() {
                let victim = self
                    .pos
                    .piece_on(m.to)
                    .map_or(0, |v| DELTA_VALS[(v as usize).min(4)]);
                match m.promo_piece() {
                    Some(promo) => victim + DELTA_VALS[promo as usize],
                    None => victim,
                }
            } else {
                0
            };
            if !in_check
                && capture_gain > 0
                && best_score + capture_gain + DELTA_MARGIN < alpha
            {
                continue;
            }

            if !in_check && best_score < alpha && see::see(&self.pos, m) < 0 {
                continue;
            }

            do_move(&mut self.pos, m);
            self.pos.qnodes += 1;
            self.stack[sp].curr_move = m;
            let score = -self.qsearch(nt, -beta, -alpha, sp + 1);
            moves_searched += 1;
            undo_move(&mut self.pos, m);

            if score > best_score {
                best_score = score;
                if score >= alpha {
                    alpha = score;
                }
                if score >= beta {
                    break;
                }
            }
        }

        if moves_searched == 0 && in_check {
            return MATED + i32::from(ply);
        }

        best_score
    }

    /// Pull the best move for the current root from the table.
    fn record_bestmove(&mut self) {
        if let Some(e) = self.ctx.tt.probe(self.pos.key()) {
            if !e.mv.is_none() && e.mv.from != e.mv.to && is_legal_hashmove(&self.pos, e.mv) {
                self.ctx.publish_bestmove(e.mv, Move::NONE);
            }
        }
    }

    /// Walk the table line from the root, publish the first two plies, and
    /// print the standard info string.
    fn readout_pv(&mut self, eval_score: i32, depth: u32) {
        let mut line = String::new();
        let mut moves: Vec<Move> = Vec::new();
        let mut published: [Move; 2] = [Move::NONE; 2];

        for _ in 0..depth {
            let Some(e) = self.ctx.tt.probe(self.pos.key()) else {
                break;
            };
            if e.mv.is_none() || e.mv.from == e.mv.to || !is_legal_hashmove(&self.pos, e.mv) {
                break;
            }
            line.push_str(&format!("{} ", e.mv));
            if moves.len() < 2 {
                published[moves.len()] = e.mv;
            }
            do_move(&mut self.pos, e.mv);
            moves.push(e.mv);
        }
        while let Some(m) = moves.pop() {
            undo_move(&mut self.pos, m);
        }

        if !published[0].is_none() {
            self.ctx.publish_bestmove(published[0], published[1]);
        }
        println!(
            "info score cp {} depth {} pv {}",
            eval_score,
            depth,
            line.trim_end()
        );
    }
}
