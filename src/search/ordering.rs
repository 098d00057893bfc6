//! Move ordering: the per-position history/counter statistics and the staged
//! orderer driven by the search's move loop.
//!
//! Stage order: hash move, the two mate killers, winning captures, the two
//! normal killers, losing captures, quiets. Each candidate from the killer
//! and hash slots is strictly re-validated before it is handed out, and the
//! generated lists are deduplicated against them.

use arrayvec::ArrayVec;

use crate::board::{Color, Position};
use crate::moves::execute::is_legal_hashmove;
use crate::moves::movegen::{generate_captures, generate_quiets, MoveList};
use crate::moves::types::{Move, MoveKind};

/// Ordering values per victim kind, pawn..king.
const ORDER_VALS: [i32; 6] = [10, 30, 35, 48, 91, 200];

/// Promotion ordering bonus: promoted value minus the pawn, in tenths.
#[inline(always)]
fn promo_order_bonus(kind: MoveKind) -> i32 {
    match kind {
        MoveKind::PromoQueen | MoveKind::CapPromoQueen => 81,
        MoveKind::PromoRook | MoveKind::CapPromoRook => 38,
        MoveKind::PromoBishop | MoveKind::CapPromoBishop => 25,
        MoveKind::PromoKnight | MoveKind::CapPromoKnight => 20,
        _ => 0,
    }
}

/// Per-(color, from, to) quiet-move scores plus the counter-move table,
/// owned by the position and therefore local to each worker.
#[derive(Clone)]
pub struct MoveHistory {
    history: Box<[[[i32; 64]; 64]; 2]>,
    counters: Box<[[Move; 64]; 64]>,
}

impl Default for MoveHistory {
    fn default() -> MoveHistory {
        MoveHistory {
            history: Box::new([[[0; 64]; 64]; 2]),
            counters: Box::new([[Move::NONE; 64]; 64]),
        }
    }
}

impl MoveHistory {
    pub fn clear(&mut self) {
        *self = MoveHistory::default();
    }

    #[inline(always)]
    pub fn counter(&self, previous: Move) -> Move {
        self.counters[previous.from.usize()][previous.to.usize()]
    }

    /// Called on a beta cutoff: reward the cutoff move, punish the preceding
    /// opponent quiet and the quiets already tried here, and slot the move
    /// into the matching killer pair.
    #[allow(clippy::too_many_arguments)]
    pub fn update(
        &mut self,
        stm: Color,
        m: Move,
        previous: Move,
        depth: i32,
        score: i32,
        mate_bound: i32,
        quiets: &[Move],
        killers: &mut [Move; 4],
    ) {
        let bonus = depth * depth;

        if m.is_quiet() {
            self.history[stm as usize][m.from.usize()][m.to.usize()] += bonus;
            self.counters[previous.from.usize()][previous.to.usize()] = m;

            if score >= mate_bound {
                if m != killers[0] && m != killers[1] && m != killers[2] {
                    killers[3] = killers[2];
                    killers[2] = m;
                }
            } else if m != killers[2] && m != killers[3] && m != killers[0] {
                killers[1] = killers[0];
                killers[0] = m;
            }
        }

        if previous.is_quiet() {
            self.history[stm.opposite() as usize][previous.from.usize()]
                [previous.to.usize()] -= bonus;
        }

        for &q in quiets {
            if q.from == m.from {
                continue;
            }
            self.history[stm as usize][q.from.usize()][q.to.usize()] -= bonus;
        }
    }

    /// Ordering score of a quiet move given the surrounding context.
    pub fn score(
        &self,
        stm: Color,
        m: Move,
        previous: Move,
        followup: Move,
        threat: Move,
        counter_bonus: i32,
        threat_bonus: i32,
    ) -> i32 {
        let mut score = self.history[stm as usize][m.from.usize()][m.to.usize()];
        if self.counter(previous) == m {
            score += counter_bonus;
        }
        // shuffling the piece just moved rarely improves anything
        if followup.to == m.from && !followup.is_none() {
            score -= counter_bonus;
        }
        if m.from == threat.to && !threat.is_none() {
            score += threat_bonus;
        }
        score + promo_order_bonus(m.kind)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    HashMove,
    MateKiller1,
    MateKiller2,
    GoodCaptures,
    Killer1,
    Killer2,
    BadCaptures,
    Quiets,
    End,
}

pub struct OrderMode;

impl OrderMode {
    pub const MAIN: bool = false;
    pub const QUIESCENCE: bool = true;
}

/// One-shot staged move stream for a single node.
pub struct MoveOrder {
    stage: Stage,
    hash_move: Move,
    killers: [Move; 4],
    /// Scored candidates of the current list stage, ascending; consumed from
    /// the back.
    list: ArrayVec<(Move, i32), 256>,
    captures_generated: bool,
    quiescence: bool,
    in_check: bool,
}

impl MoveOrder {
    pub fn new(p: &Position, hash_move: Move, killers: [Move; 4], quiescence: bool) -> MoveOrder {
        let hash_move = if !hash_move.is_none() && is_legal_hashmove(p, hash_move) {
            hash_move
        } else {
            Move::NONE
        };
        MoveOrder {
            stage: Stage::HashMove,
            hash_move,
            killers,
            list: ArrayVec::new(),
            captures_generated: false,
            quiescence,
            in_check: p.in_check(),
        }
    }

    #[inline]
    fn is_known(&self, m: Move) -> bool {
        m == self.hash_move || self.killers.contains(&m)
    }

    fn fill_captures(&mut self, p: &Position) {
        let mut generated = MoveList::new();
        generate_captures(p, &mut generated);
        for m in generated {
            if self.is_known(m) {
                continue;
            }
            let score = if m.is_en_passant() {
                0
            } else {
                let victim = p.piece_on(m.to).map_or(0, |v| ORDER_VALS[v as usize]);
                let attacker = p.piece_on(m.from).map_or(0, |a| ORDER_VALS[a as usize]);
                victim - attacker + promo_order_bonus(m.kind)
            };
            self.list.push((m, score));
        }
        insertion_sort(&mut self.list);
        self.captures_generated = true;
    }

    fn fill_quiets(&mut self, p: &Position, previous: Move, followup: Move, threat: Move) {
        let mut generated = MoveList::new();
        generate_quiets(p, &mut generated);
        let counter_bonus = p.params.counter_move_bonus as i32;
        let threat_bonus = p.params.threat_evasion_bonus as i32;
        for m in generated {
            if self.is_known(m) {
                continue;
            }
            let score = p.stats.score(
                p.stm(),
                m,
                previous,
                followup,
                threat,
                counter_bonus,
                threat_bonus,
            );
            self.list.push((m, score));
        }
        insertion_sort(&mut self.list);
    }

    /// Checked killer candidate: quiet, distinct from earlier slots, and
    /// strictly legal in the current position.
    fn killer_candidate(&self, p: &Position, idx: usize, earlier: &[usize]) -> Option<Move> {
        let k = self.killers[idx];
        if k.is_none() || k == self.hash_move {
            return None;
        }
        if earlier.iter().any(|&e| self.killers[e] == k) {
            return None;
        }
        if !is_legal_hashmove(p, k) {
            return None;
        }
        Some(k)
    }

    /// Next move in cutoff-likelihood order, or `None` at end of stream.
    pub fn next_move(
        &mut self,
        p: &Position,
        previous: Move,
        followup: Move,
        threat: Move,
    ) -> Option<Move> {
        loop {
            match self.stage {
                Stage::HashMove => {
                    self.stage = Stage::MateKiller1;
                    if self.hash_move.is_none() {
                        continue;
                    }
                    // quiescence outside check only follows tactical lines
                    if self.quiescence && !self.in_check && !self.hash_move.is_capture() {
                        continue;
                    }
                    return Some(self.hash_move);
                }

                Stage::MateKiller1 => {
                    self.stage = Stage::MateKiller2;
                    if let Some(k) = self.killer_candidate(p, 2, &[]) {
                        return Some(k);
                    }
                }

                Stage::MateKiller2 => {
                    self.stage = Stage::GoodCaptures;
                    if let Some(k) = self.killer_candidate(p, 3, &[2]) {
                        return Some(k);
                    }
                }

                Stage::GoodCaptures => {
                    if !self.captures_generated {
                        self.fill_captures(p);
                    }
                    match self.list.last() {
                        Some(&(_, score)) if score >= 0 => {
                            let (m, _) = self.list.pop().unwrap();
                            return Some(m);
                        }
                        _ => {
                            // the remaining entries are all losing captures
                            self.stage = Stage::Killer1;
                        }
                    }
                }

                Stage::Killer1 => {
                    self.stage = Stage::Killer2;
                    if self.quiescence && !self.in_check {
                        continue;
                    }
                    if let Some(k) = self.killer_candidate(p, 0, &[2, 3]) {
                        return Some(k);
                    }
                }

                Stage::Killer2 => {
                    self.stage = Stage::BadCaptures;
                    if self.quiescence && !self.in_check {
                        continue;
                    }
                    if let Some(k) = self.killer_candidate(p, 1, &[0, 2, 3]) {
                        return Some(k);
                    }
                }

                Stage::BadCaptures => match self.list.pop() {
                    Some((m, _)) => return Some(m),
                    None => {
                        self.stage = if self.quiescence && !self.in_check {
                            Stage::End
                        } else {
                            Stage::Quiets
                        };
                        if self.stage == Stage::Quiets {
                            self.fill_quiets(p, previous, followup, threat);
                        }
                    }
                },

                Stage::Quiets => match self.list.pop() {
                    Some((m, _)) => return Some(m),
                    None => self.stage = Stage::End,
                },

                Stage::End => return None,
            }
        }
    }
}

fn insertion_sort(list: &mut ArrayVec<(Move, i32), 256>) {
    for i in 1..list.len() {
        let key = list[i];
        let mut j = i;
        while j > 0 && list[j - 1].1 > key.1 {
            list[j] = list[j - 1];
            j -= 1;
        }
        list[j] = key;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moves::execute::is_legal;
    use crate::moves::movegen::generate_pseudo_legal;
    use crate::square::Square;
    use std::str::FromStr;

    fn drain(p: &Position, order: &mut MoveOrder) -> Vec<Move> {
        let mut out = Vec::new();
        while let Some(m) = order.next_move(p, Move::NONE, Move::NONE, Move::NONE) {
            out.push(m);
        }
        out
    }

    #[test]
    fn yields_every_pseudo_legal_move_exactly_once() {
        let p = Position::from_str(
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
        )
        .unwrap();
        let mut order = MoveOrder::new(&p, Move::NONE, [Move::NONE; 4], OrderMode::MAIN);
        let yielded = drain(&p, &mut order);

        let mut expected = MoveList::new();
        generate_pseudo_legal(&p, &mut expected);
        assert_eq!(yielded.len(), expected.len());
        for m in &yielded {
            assert!(expected.contains(m), "unexpected {m}");
            assert_eq!(yielded.iter().filter(|&&x| x == *m).count(), 1, "dup {m}");
        }
    }

    #[test]
    fn hash_move_comes_first() {
        let p = Position::new();
        let hm = Move::new(
            Square::from_index(12),
            Square::from_index(28),
            MoveKind::Quiet,
        );
        let mut order = MoveOrder::new(&p, hm, [Move::NONE; 4], OrderMode::MAIN);
        let first = order.next_move(&p, Move::NONE, Move::NONE, Move::NONE);
        assert_eq!(first, Some(hm));
        // and never again
        let rest = drain(&p, &mut order);
        assert!(!rest.contains(&hm));
    }

    #[test]
    fn illegal_hash_move_is_dropped() {
        let p = Position::new();
        let bogus = Move::new(
            Square::from_index(0),
            Square::from_index(32),
            MoveKind::Quiet,
        );
        let order = MoveOrder::new(&p, bogus, [Move::NONE; 4], OrderMode::MAIN);
        assert!(order.hash_move.is_none());
    }

    #[test]
    fn winning_captures_precede_losing_ones() {
        // exd5 trades up (pawn takes knight); Qxh7 trades down
        let p = Position::from_str("4k3/7p/8/3n4/4P3/8/7Q/4K3 w - - 0 1").unwrap();
        let mut order = MoveOrder::new(&p, Move::NONE, [Move::NONE; 4], OrderMode::MAIN);
        let moves = drain(&p, &mut order);
        let winning = moves
            .iter()
            .position(|m| m.is_capture() && m.to == Square::from_index(35))
            .expect("exd5 must appear");
        let losing = moves
            .iter()
            .position(|m| m.is_capture() && m.to == Square::from_index(55))
            .expect("Qxh7 must appear");
        assert!(winning < losing, "winning {winning} vs losing {losing}");
    }

    #[test]
    fn killers_yield_between_captures_and_quiets() {
        let p = Position::new();
        let killer = Move::new(
            Square::from_index(11),
            Square::from_index(27),
            MoveKind::Quiet,
        );
        let mut order = MoveOrder::new(
            &p,
            Move::NONE,
            [killer, Move::NONE, Move::NONE, Move::NONE],
            OrderMode::MAIN,
        );
        let first = order.next_move(&p, Move::NONE, Move::NONE, Move::NONE);
        // no captures at startpos, so the killer leads
        assert_eq!(first, Some(killer));
    }

    #[test]
    fn quiescence_outside_check_stops_after_captures() {
        let p = Position::from_str("4k3/7p/8/3n4/4P3/8/7Q/4K3 w - - 0 1").unwrap();
        let mut order = MoveOrder::new(&p, Move::NONE, [Move::NONE; 4], OrderMode::QUIESCENCE);
        let moves = drain(&p, &mut order);
        assert!(!moves.is_empty());
        assert!(moves.iter().all(|m| m.is_capture()));
    }

    #[test]
    fn history_update_rotates_killers_and_scores() {
        let mut stats = MoveHistory::default();
        let mut killers = [Move::NONE; 4];
        let previous = Move::new(Square::from_index(49), Square::from_index(41), MoveKind::Quiet);
        let m = Move::new(Square::from_index(12), Square::from_index(28), MoveKind::Quiet);
        stats.update(Color::White, m, previous, 4, 10, 9000, &[], &mut killers);
        assert_eq!(killers[0], m);
        // counter-move bonus applies only after the matching previous move
        let plain = stats.score(Color::White, m, Move::NONE, Move::NONE, Move::NONE, 100, 100);
        assert_eq!(plain, 16);
        let countered = stats.score(Color::White, m, previous, Move::NONE, Move::NONE, 100, 100);
        assert_eq!(countered, 116);

        // a mate-valued cutoff goes into the mate killer slots instead
        let m2 = Move::new(Square::from_index(11), Square::from_index(27), MoveKind::Quiet);
        stats.update(Color::White, m2, previous, 4, 9500, 9000, &[], &mut killers);
        assert_eq!(killers[2], m2);
        assert_eq!(killers[0], m);
    }
}
