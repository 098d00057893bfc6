//! Static exchange evaluation: material outcome of a capture sequence on one
//! square, both sides always recapturing with their least valuable attacker.

use crate::bitboard::BitboardExt;
use crate::board::{Color, Piece, Position};
use crate::moves::attacks::attackers_of;
use crate::moves::types::Move;
use crate::square::Square;

pub const SEE_VALUES: [i32; 6] = [100, 300, 315, 480, 910, 2000];

#[inline(always)]
fn value_of(p: Piece) -> i32 {
    SEE_VALUES[p as usize]
}

/// Least valuable attacker of `side` among `attackers`; the returned square
/// has been verified occupied by that side.
fn least_valuable(p: &Position, attackers: u64, side: Color) -> Option<(Square, Piece)> {
    let own = attackers & p.occupancy(side);
    if own == 0 {
        return None;
    }
    for piece in [
        Piece::Pawn,
        Piece::Knight,
        Piece::Bishop,
        Piece::Rook,
        Piece::Queen,
        Piece::King,
    ] {
        let subset = own & p.pieces(side, piece);
        if subset != 0 {
            return Some((Square::from_index(subset.lsb()), piece));
        }
    }
    None
}

/// Signed swap-list SEE. Quiet moves score zero by definition; en passant is
/// treated as a neutral trade.
pub fn see(p: &Position, m: Move) -> i32 {
    if m.is_en_passant() {
        return 0;
    }
    if !m.is_capture() && !m.is_promotion() {
        return 0;
    }

    let victim = p.piece_on(m.to);
    let mut balance = victim.map_or(0, value_of);

    // the attacker that lands on the square, promoted if applicable
    let mut next_victim = match m.promo_piece() {
        Some(promo) => {
            balance += value_of(promo) - value_of(Piece::Pawn);
            promo
        }
        None => match p.piece_on(m.from) {
            Some(piece) => piece,
            None => return 0,
        },
    };

    let mut gain = [0i32; 32];
    let mut d = 0;
    gain[0] = balance;

    let mut occupancy = p.all_pieces() & !m.from.bb();
    let mut attackers = attackers_of(p, m.to, occupancy) & occupancy;
    let mut side = p.stm().opposite();

    loop {
        let Some((sq, piece)) = least_valuable(p, attackers & occupancy, side) else {
            break;
        };
        d += 1;
        if d >= 31 {
            break;
        }

        gain[d] = value_of(next_victim) - gain[d - 1];
        next_victim = piece;

        occupancy &= !sq.bb();
        // vacating a slider line can reveal an x-ray attacker
        if matches!(piece, Piece::Pawn | Piece::Bishop | Piece::Rook | Piece::Queen) {
            attackers = attackers_of(p, m.to, occupancy) & occupancy;
        } else {
            attackers &= !sq.bb();
        }
        side = side.opposite();
    }

    while d > 0 {
        gain[d - 1] = -(-gain[d - 1]).max(gain[d]);
        d -= 1;
    }
    gain[0]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moves::types::MoveKind;
    use std::str::FromStr;

    fn mv(from: &str, to: &str, kind: MoveKind) -> Move {
        Move::new(from.parse().unwrap(), to.parse().unwrap(), kind)
    }

    #[test]
    fn quiet_move_is_zero() {
        let p = Position::new();
        assert_eq!(see(&p, mv("g1", "f3", MoveKind::Quiet)), 0);
    }

    #[test]
    fn undefended_capture_wins_full_value() {
        // rook takes an undefended pawn on an open file
        let p = Position::from_str("4k3/8/8/8/8/8/p7/R3K3 w - - 0 1").unwrap();
        assert_eq!(see(&p, mv("a1", "a2", MoveKind::Capture)), 100);
    }

    #[test]
    fn defended_pawn_costs_the_rook() {
        // Rxa2 runs into bxa2: rook for a pawn
        let p = Position::from_str("4k3/8/8/8/8/1p6/p7/R3K3 w - - 0 1").unwrap();
        assert_eq!(
            see(&p, mv("a1", "a2", MoveKind::Capture)),
            100 - SEE_VALUES[Piece::Rook as usize]
        );
    }

    #[test]
    fn hanging_rook_is_worth_a_rook() {
        // RxR with no recapture available
        let p = Position::from_str("4k3/8/8/8/8/8/r7/R3K3 w - - 0 1").unwrap();
        assert_eq!(
            see(&p, mv("a1", "a2", MoveKind::Capture)),
            SEE_VALUES[Piece::Rook as usize]
        );
    }

    #[test]
    fn en_passant_is_neutral() {
        let p =
            Position::from_str("rnbqkbnr/ppp1pppp/8/8/3pP3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 3")
                .unwrap();
        assert_eq!(see(&p, mv("d4", "e3", MoveKind::EnPassant)), 0);
    }

    #[test]
    fn rook_takes_defended_pawn_loses_the_exchange() {
        // Rxd5 pawn, Rd8 recaptures: pawn for a rook
        let p = Position::from_str("3rk3/8/8/3p4/8/8/8/3RK3 w - - 0 1").unwrap();
        let v = see(&p, mv("d1", "d5", MoveKind::Capture));
        assert_eq!(v, 100 - SEE_VALUES[Piece::Rook as usize]);
    }

    #[test]
    fn xray_behind_the_first_rook_restores_the_trade() {
        // doubled white rooks on the d-file: Rxd5 Rxd5 Rxd5 nets a pawn
        let p = Position::from_str("3rk3/8/8/3p4/8/8/3R4/3RK3 w - - 0 1").unwrap();
        let v = see(&p, mv("d2", "d5", MoveKind::Capture));
        assert_eq!(v, 100);
    }
}
