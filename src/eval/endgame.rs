//! Dedicated evaluators for the recognized endgame buckets.
//!
//! Only the pawn endgame and the rook-pair bucket carry real logic; the other
//! tags fall through to the generic terms. The passed-pawn bonuses cascade:
//! a pawn `n` steps from promotion collects every bonus tier from `n` up.

use crate::bitboard::BitboardExt;
use crate::board::{Color, Piece, Position};
use crate::eval::{pawn_levers, EvalInfo};
use crate::square::{file_dist, rank_dist, squares_behind, Square};
use crate::tables::tables;

const ADVANCED_PASSER_BONUS: f32 = 15.0;
const OPPOSITION_BONUS: f32 = 4.0;
const GOOD_KING_BONUS: f32 = 5.0;
const ROOK_BEHIND_PAWN_BONUS: f32 = 10.0;
const FREE_KING_ROW_BONUS: f32 = 4.0;
const FREE_KING_COL_BONUS: f32 = 4.0;

/// Direct or distant opposition for `c`, which requires the other side to be
/// on move.
pub fn has_opposition(p: &Position, c: Color) -> bool {
    let wks = p.king_square(Color::White).usize();
    let bks = p.king_square(Color::Black).usize();
    let cols = file_dist(wks, bks) as i32 - 1;
    let rows = rank_dist(wks, bks) as i32 - 1;
    let odd_rows = rows & 1 == 1;
    let odd_cols = cols & 1 == 1;

    if cols > 0 && rows > 0 {
        return p.stm() != c && odd_rows && odd_cols;
    }
    p.stm() != c && (odd_rows || odd_cols)
}

/// King-and-pawns endgame for one side.
pub fn eval_kpk(p: &Position, ei: &mut EvalInfo, c: Color) -> f32 {
    // a fenced (fortress) structure is dead drawn; test it once per eval
    if !ei.fence_evaluated {
        ei.is_fence = is_fence(p, ei);
        ei.fence_evaluated = true;
    }
    if ei.is_fence {
        return 0.0;
    }

    let mut score = 0.0;
    let opposition = has_opposition(p, c);

    let mut passers = ei.pe.passed[c as usize];
    while passers != 0 {
        let f = Square::from_index(passers.pop_lsb());
        score += eval_passed_kpk(p, c, f, opposition);
    }

    if c == p.stm() {
        score += pawn_levers(p, ei, c);
    }

    if opposition {
        score += OPPOSITION_BONUS;
    }
    score
}

fn eval_passed_kpk(p: &Position, c: Color, f: Square, has_opposition: bool) -> f32 {
    let t = tables();
    let them = c.opposite();
    let ks = p.king_square(c);
    let eks = p.king_square(them);
    let mut score = 0.0;

    let e_control_next = t.king[f.usize()].has(eks);
    let f_control_next = t.king[f.usize()].has(ks);
    let f_king_infront = if c == Color::White {
        ks.rank() >= f.rank()
    } else {
        ks.rank() <= f.rank()
    };
    let e_king_infront = if c == Color::White {
        eks.rank() > f.rank()
    } else {
        eks.rank() < f.rank()
    };

    // rook pawns draw against a king in the corner
    if f.file() == 0 || f.file() == 7 {
        if e_control_next {
            return 0.0;
        }
        if eks.file() == f.file() && e_king_infront {
            return 0.0;
        }
    }

    // enemy king camps on the promotion path
    if e_king_infront && !f_king_infront && e_control_next && !has_opposition {
        return 0.0;
    }

    if f_control_next && has_opposition {
        score += GOOD_KING_BONUS;
    }

    let dist = if c == Color::White {
        (8 - f.rank() as i32 - 1).max(0)
    } else {
        (f.rank() as i32 - 1).max(0)
    };

    // the enemy king catches a runaway pawn inside its box
    let inside_box = file_dist(eks.usize(), f.usize()) as i32 <= dist;
    let fk_dist = rank_dist(ks.usize(), f.usize()).max(file_dist(ks.usize(), f.usize()));
    let ek_dist = rank_dist(eks.usize(), f.usize()).max(file_dist(eks.usize(), f.usize()));
    if fk_dist >= ek_dist && !f_king_infront && inside_box {
        return 0.0;
    }

    // cumulative staircase toward promotion
    for step in dist..=6 {
        score += (7 - step) as f32 * ADVANCED_PASSER_BONUS;
    }
    score
}

/// Rook endgame bucket (one rook each, or a rook pair on one side).
pub fn eval_krrk(p: &Position, ei: &EvalInfo, c: Color) -> f32 {
    let mut score = 0.0;
    let opposition = has_opposition(p, c);

    let mut passers = ei.pe.passed[c as usize];
    while passers != 0 {
        let f = Square::from_index(passers.pop_lsb());
        score += eval_passed_krrk(p, c, f, opposition);
    }
    score
}

fn eval_passed_krrk(p: &Position, c: Color, f: Square, has_opposition: bool) -> f32 {
    let t = tables();
    let them = c.opposite();
    let ks = p.king_square(c);
    let eks = p.king_square(them);
    let mut score = 0.0;

    let f_control_next = t.king[f.usize()].has(ks);
    if f_control_next && has_opposition {
        score += GOOD_KING_BONUS;
    }

    // our rook belongs behind the passer
    if let Some(&frs) = p.squares_of(c, Piece::Rook).first() {
        let behind = if c == Color::White {
            frs.rank() < f.rank()
        } else {
            frs.rank() > f.rank()
        };
        if behind && frs.file() == f.file() {
            score += ROOK_BEHIND_PAWN_BONUS;
        }
    }

    // the enemy rook may cut our king off; no rook, no cut
    if let Some(&ers) = p.squares_of(them, Piece::Rook).first() {
        if rank_dist(ers.usize(), ks.usize()) > 1 {
            score += FREE_KING_ROW_BONUS;
        }
        let bad_order_1 = ks.file() < ers.file() && ks.file() < f.file();
        let bad_order_2 = f.file() < ers.file() && f.file() < ks.file();
        if !bad_order_1 && !bad_order_2 {
            score += FREE_KING_COL_BONUS;
        }
    } else {
        score += FREE_KING_ROW_BONUS + FREE_KING_COL_BONUS;
    }

    let dist = if c == Color::White {
        (8 - f.rank() as i32 - 1).max(0)
    } else {
        (f.rank() as i32 - 1).max(0)
    };
    for step in dist.max(1)..=6 {
        score += (7 - step) as f32 * ADVANCED_PASSER_BONUS;
    }
    score
}

/// Fortress test, white's perspective only: every white pawn butts against a
/// locked black pawn chain that the white king sits behind and the black
/// king cannot enter.
pub fn is_fence(p: &Position, ei: &EvalInfo) -> bool {
    if ei.pe.semiopen[Color::Black as usize] != 0 {
        return false;
    }
    let enemies = p.pieces(Color::Black, Piece::Pawn);
    if enemies == 0 {
        return false;
    }

    let attacks = ei.pe.attacks[Color::Black as usize];
    let wking = p.pieces(Color::White, Piece::King);
    let bking = p.pieces(Color::Black, Piece::King);

    let mut blocked: Vec<Square> = Vec::new();
    let mut friends = p.pieces(Color::White, Piece::Pawn);
    while friends != 0 {
        let start = friends.pop_lsb();
        let occ = start as i32 + 8;
        if occ > 63 {
            return false;
        }
        let occ_bb = 1u64 << occ;
        if occ_bb & enemies == 0 && occ_bb & bking == 0 {
            return false;
        }
        blocked.push(Square::from_index(start));
        for delta in [-1i32, 1] {
            let n = start as i32 + delta;
            if !(0..64).contains(&n) {
                continue;
            }
            if (1u64 << n) & attacks != 0 {
                blocked.push(Square::from_index(n as u8));
            }
        }
    }

    if blocked.is_empty() {
        return false;
    }

    blocked.sort_by_key(|s| s.file());
    if blocked[0].file() > 1 {
        return false;
    }

    let t = tables();
    let mut connected = true;
    let mut side = 0u64;
    for pair in blocked.windows(2) {
        let (prev, curr) = (pair[0], pair[1]);
        let diff = (curr.index() as i32 - prev.index() as i32).abs();
        connected = matches!(diff, 1 | 7 | 8 | 9);
        if !connected {
            break;
        }
        side |= squares_behind(t.file[prev.file() as usize], true, prev.usize());
        side |= squares_behind(t.file[curr.file() as usize], true, curr.usize());
    }

    let wk_in = side & wking != 0;
    let bk_in = side & bking != 0;
    connected && wk_in && !bk_in
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn direct_opposition() {
        // kings e4/e6, black to move: white has the opposition
        let p = Position::from_str("8/8/4k3/8/4K3/8/8/8 b - - 0 1").unwrap();
        assert!(has_opposition(&p, Color::White));
        assert!(!has_opposition(&p, Color::Black));
    }

    #[test]
    fn distant_opposition_needs_both_odd() {
        // kings e2/e8 (five ranks between, odd), same file
        let p = Position::from_str("4k3/8/8/8/8/8/4K3/8 b - - 0 1").unwrap();
        assert!(has_opposition(&p, Color::White));
    }

    #[test]
    fn passer_staircase_is_cumulative() {
        // white pawn e7, kings far away so no draw rule triggers
        let p7 = Position::from_str("8/4P3/8/8/k7/8/8/6K1 w - - 0 1").unwrap();
        let p5 = Position::from_str("8/8/8/4P3/k7/8/8/6K1 w - - 0 1").unwrap();
        let near = eval_passed_kpk(&p7, Color::White, Square::new(4, 6), false);
        let far = eval_passed_kpk(&p5, Color::White, Square::new(4, 4), false);
        assert!(near > far, "closer passers must cascade more: {near} vs {far}");
    }

    #[test]
    fn rook_pawn_corner_is_drawn() {
        // white pawn a6, black king already sitting on the promotion file
        let p = Position::from_str("k7/8/P7/8/8/8/8/6K1 w - - 0 1").unwrap();
        let v = eval_passed_kpk(&p, Color::White, Square::new(0, 5), false);
        assert_eq!(v, 0.0);
    }

    #[test]
    fn krrk_with_no_enemy_rook_does_not_panic() {
        // two white rooks, none for black: the guard takes the free bonuses
        let p = Position::from_str("4k3/8/8/8/8/8/P7/R2RK3 w - - 0 1").unwrap();
        let pt = crate::eval::pawns::PawnTable::new(1);
        let mt = crate::eval::material::MaterialTable::new(1);
        let _ = crate::eval::evaluate(&p, &pt, &mt, -1.0);
        let v = eval_passed_krrk(&p, Color::White, Square::new(0, 1), false);
        assert!(v >= FREE_KING_ROW_BONUS);
    }
}
