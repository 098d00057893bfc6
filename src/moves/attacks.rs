//! Square attack queries and pin detection.

use crate::bitboard::BitboardExt;
use crate::board::{Color, Piece, Position};
use crate::moves::magic::magics;
use crate::square::{aligned, Square};
use crate::tables::tables;

/// Attack set of one piece standing on `s` with the given blockers.
pub fn attacks_from(p: Piece, c: Color, s: Square, blockers: u64) -> u64 {
    let t = tables();
    let m = magics();
    let sq = s.usize();
    match p {
        Piece::Pawn => t.pawn_attacks[c as usize][sq],
        Piece::Knight => t.knight[sq],
        Piece::Bishop => m.bishop_attacks(sq, blockers),
        Piece::Rook => m.rook_attacks(sq, blockers),
        Piece::Queen => m.queen_attacks(sq, blockers),
        Piece::King => t.king[sq],
    }
}

/// Is `s` attacked by `by`? `occupancy` overrides the board occupancy for the
/// slider rays (used to look through a moving king or a vacated pawn).
pub fn is_square_attacked(p: &Position, s: Square, by: Color, occupancy: Option<u64>) -> bool {
    let t = tables();
    let sq = s.usize();
    let defender = by.opposite();

    let steppers = (t.pawn_attacks[defender as usize][sq] & p.pieces(by, Piece::Pawn))
        | (t.knight[sq] & p.pieces(by, Piece::Knight))
        | (t.king[sq] & p.pieces(by, Piece::King));
    if steppers != 0 {
        return true;
    }

    let occ = occupancy.unwrap_or_else(|| p.all_pieces());
    let m = magics();
    let diag = m.bishop_attacks(sq, occ);
    if diag & (p.pieces(by, Piece::Bishop) | p.pieces(by, Piece::Queen)) != 0 {
        return true;
    }
    let orth = m.rook_attacks(sq, occ);
    orth & (p.pieces(by, Piece::Rook) | p.pieces(by, Piece::Queen)) != 0
}

/// All pieces of both colors attacking `s` under the given occupancy.
pub fn attackers_of(p: &Position, s: Square, occupancy: u64) -> u64 {
    let t = tables();
    let m = magics();
    let sq = s.usize();
    let diag = m.bishop_attacks(sq, occupancy);
    let orth = m.rook_attacks(sq, occupancy);

    (t.pawn_attacks[Color::Black as usize][sq] & p.pieces(Color::White, Piece::Pawn))
        | (t.pawn_attacks[Color::White as usize][sq] & p.pieces(Color::Black, Piece::Pawn))
        | (t.knight[sq] & (p.pieces(Color::White, Piece::Knight) | p.pieces(Color::Black, Piece::Knight)))
        | (t.king[sq] & (p.pieces(Color::White, Piece::King) | p.pieces(Color::Black, Piece::King)))
        | (diag & (p.pieces(Color::White, Piece::Bishop) | p.pieces(Color::Black, Piece::Bishop)))
        | (orth & (p.pieces(Color::White, Piece::Rook) | p.pieces(Color::Black, Piece::Rook)))
        | ((diag | orth)
            & (p.pieces(Color::White, Piece::Queen) | p.pieces(Color::Black, Piece::Queen)))
}

/// Pieces of color `c` attacking `s` under the current occupancy.
pub fn attackers_of_color(p: &Position, s: Square, c: Color) -> u64 {
    let t = tables();
    let m = magics();
    let sq = s.usize();
    let occ = p.all_pieces();
    let diag = m.bishop_attacks(sq, occ);
    let orth = m.rook_attacks(sq, occ);

    (t.pawn_attacks[c.opposite() as usize][sq] & p.pieces(c, Piece::Pawn))
        | (t.knight[sq] & p.pieces(c, Piece::Knight))
        | (t.king[sq] & p.pieces(c, Piece::King))
        | (diag & p.pieces(c, Piece::Bishop))
        | (orth & p.pieces(c, Piece::Rook))
        | ((diag | orth) & p.pieces(c, Piece::Queen))
}

/// Pieces of color `us` that are the single obstruction between their king
/// and a hostile slider.
pub fn compute_pinned(p: &Position, us: Color) -> u64 {
    let t = tables();
    let them = us.opposite();
    let ks = p.king_square(us);
    let mut pinned = 0u64;

    let diag_sliders = p.pieces(them, Piece::Bishop) | p.pieces(them, Piece::Queen);
    let orth_sliders = p.pieces(them, Piece::Rook) | p.pieces(them, Piece::Queen);
    let mut sliders = (diag_sliders & t.bishop_rays[ks.usize()])
        | (orth_sliders & t.rook_rays[ks.usize()]);

    while sliders != 0 {
        let sq = sliders.pop_lsb() as usize;
        if !aligned(sq, ks.usize()) {
            continue;
        }
        let blockers = (t.between[sq][ks.usize()] & p.all_pieces())
            & !(ks.bb() | (1u64 << sq));
        if blockers != 0 && !blockers.more_than_one() {
            pinned |= blockers;
        }
    }
    pinned & p.occupancy(us)
}
