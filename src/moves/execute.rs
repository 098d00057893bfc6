//! Move execution, unmake, and the legality filter.

use crate::bitboard::BitboardExt;
use crate::board::{
    Color, Piece, Position, CASTLE_BK, CASTLE_BQ, CASTLE_WK, CASTLE_WQ,
};
use crate::hash::zobrist::keys;
use crate::moves::attacks::{attackers_of_color, compute_pinned, is_square_attacked};
use crate::moves::magic::magics;
use crate::moves::movegen::{generate_pseudo_legal, MoveList};
use crate::moves::types::{Move, MoveKind};
use crate::square::{aligned3, file_dist, rank_dist, Square};
use crate::tables::tables;

#[inline(always)]
fn rook_castle_squares(us: Color, kind: MoveKind) -> (Square, Square) {
    match (us, kind) {
        (Color::White, MoveKind::CastleKs) => (Square::H1, Square::F1),
        (Color::White, _) => (Square::A1, Square::D1),
        (Color::Black, MoveKind::CastleKs) => (Square::H8, Square::F8),
        (Color::Black, _) => (Square::A8, Square::D8),
    }
}

#[inline(always)]
fn corner_rights(c: Color, s: Square) -> u8 {
    match (c, s.index()) {
        (Color::White, 0) => CASTLE_WQ,
        (Color::White, 7) => CASTLE_WK,
        (Color::Black, 56) => CASTLE_BQ,
        (Color::Black, 63) => CASTLE_BK,
        _ => 0,
    }
}

pub fn do_move(p: &mut Position, m: Move) {
    debug_assert!(!m.is_none());
    p.push_state();

    let z = keys();
    let us = p.stm();
    let them = us.opposite();
    let piece = p.piece_on(m.from).expect("move from empty square");

    // retire the old en-passant contribution
    if let Some(ep) = p.st.ep {
        p.st.key ^= z.ep(ep.file());
        p.st.rep_key ^= z.ep(ep.file());
        p.st.ep = None;
    }

    // captured piece, before any board edit
    let captured = match m.kind {
        MoveKind::EnPassant => Some(Piece::Pawn),
        _ if m.is_capture() => p.piece_on(m.to),
        _ => None,
    };

    // castle rights: king moves, rook leaves a corner, rook captured in one
    let mut clear = 0u8;
    if piece == Piece::King {
        clear |= match us {
            Color::White => CASTLE_WK | CASTLE_WQ,
            Color::Black => CASTLE_BK | CASTLE_BQ,
        };
    }
    if piece == Piece::Rook {
        clear |= corner_rights(us, m.from);
    }
    if captured == Some(Piece::Rook) {
        clear |= corner_rights(them, m.to);
    }
    let new_rights = p.st.castle & !clear;
    if new_rights != p.st.castle {
        let delta = z.castle_delta(p.st.castle, new_rights);
        p.st.key ^= delta;
        p.st.rep_key ^= delta;
        p.st.castle = new_rights;
    }

    match m.kind {
        MoveKind::Quiet => p.shift_piece(us, piece, m.from, m.to),
        MoveKind::Capture => {
            p.remove_piece(them, captured.unwrap(), m.to);
            p.shift_piece(us, piece, m.from, m.to);
        }
        MoveKind::EnPassant => {
            let cap_sq = if us == Color::White {
                m.to.offset(-8)
            } else {
                m.to.offset(8)
            };
            p.remove_piece(them, Piece::Pawn, cap_sq);
            p.shift_piece(us, Piece::Pawn, m.from, m.to);
        }
        MoveKind::PromoQueen | MoveKind::PromoRook | MoveKind::PromoBishop
        | MoveKind::PromoKnight => {
            p.remove_piece(us, Piece::Pawn, m.from);
            p.add_piece(us, m.promo_piece().unwrap(), m.to);
        }
        MoveKind::CapPromoQueen | MoveKind::CapPromoRook | MoveKind::CapPromoBishop
        | MoveKind::CapPromoKnight => {
            p.remove_piece(them, captured.unwrap(), m.to);
            p.remove_piece(us, Piece::Pawn, m.from);
            p.add_piece(us, m.promo_piece().unwrap(), m.to);
        }
        MoveKind::CastleKs | MoveKind::CastleQs => {
            let (rf, rt) = rook_castle_squares(us, m.kind);
            p.shift_piece(us, Piece::King, m.from, m.to);
            p.shift_piece(us, Piece::Rook, rf, rt);
            p.st.has_castled[us as usize] = true;
        }
        MoveKind::None => unreachable!(),
    }

    if piece == Piece::King {
        p.st.king_sq[us as usize] = m.to;
    }

    // fresh en-passant square on a double push
    if piece == Piece::Pawn && rank_dist(m.from.usize(), m.to.usize()) == 2 {
        let ep = if us == Color::White {
            m.from.offset(8)
        } else {
            m.from.offset(-8)
        };
        p.st.ep = Some(ep);
        p.st.key ^= z.ep(ep.file());
        p.st.rep_key ^= z.ep(ep.file());
    }

    // counters
    let old50 = p.st.move50;
    p.st.move50 = if piece == Piece::Pawn || captured.is_some() {
        0
    } else {
        old50 + 1
    };
    p.st.key ^= z.move50(old50) ^ z.move50(p.st.move50);

    p.st.key ^= z.halfmoves(p.st.halfmoves) ^ z.halfmoves(p.st.halfmoves + 1);
    p.st.halfmoves += 1;

    // side to move
    p.st.stm = them;
    p.st.key ^= z.stm_toggle();
    p.st.rep_key ^= z.stm(them);

    p.st.captured = captured;

    // check and pin state for the new mover
    let ks = p.king_square(them);
    p.st.in_check = is_square_attacked(p, ks, us, None);
    p.st.checkers = if p.st.in_check {
        attackers_of_color(p, ks, us)
    } else {
        0
    };
    p.st.pinned[0] = compute_pinned(p, Color::White);
    p.st.pinned[1] = compute_pinned(p, Color::Black);

    p.nodes += 1;

    #[cfg(debug_assertions)]
    debug_assert_eq!(p.st.key, p.compute_key_full(), "incremental key drift");
}

pub fn undo_move(p: &mut Position, m: Move) {
    let us = p.stm().opposite(); // the side that moved
    let them = p.stm();
    let captured = p.st.captured;

    match m.kind {
        MoveKind::Quiet => {
            let piece = p.piece_on(m.to).expect("unmake from empty square");
            p.shift_piece(us, piece, m.to, m.from);
        }
        MoveKind::Capture => {
            let piece = p.piece_on(m.to).expect("unmake from empty square");
            p.shift_piece(us, piece, m.to, m.from);
            p.add_piece(them, captured.unwrap(), m.to);
        }
        MoveKind::EnPassant => {
            p.shift_piece(us, Piece::Pawn, m.to, m.from);
            let cap_sq = if us == Color::White {
                m.to.offset(-8)
            } else {
                m.to.offset(8)
            };
            p.add_piece(them, Piece::Pawn, cap_sq);
        }
        MoveKind::PromoQueen | MoveKind::PromoRook | MoveKind::PromoBishop
        | MoveKind::PromoKnight => {
            p.remove_piece(us, m.promo_piece().unwrap(), m.to);
            p.add_piece(us, Piece::Pawn, m.from);
        }
        MoveKind::CapPromoQueen | MoveKind::CapPromoRook | MoveKind::CapPromoBishop
        | MoveKind::CapPromoKnight => {
            p.remove_piece(us, m.promo_piece().unwrap(), m.to);
            p.add_piece(them, captured.unwrap(), m.to);
            p.add_piece(us, Piece::Pawn, m.from);
        }
        MoveKind::CastleKs | MoveKind::CastleQs => {
            let (rf, rt) = rook_castle_squares(us, m.kind);
            p.shift_piece(us, Piece::King, m.to, m.from);
            p.shift_piece(us, Piece::Rook, rt, rf);
        }
        MoveKind::None => unreachable!(),
    }

    p.pop_state();
}

pub fn do_null_move(p: &mut Position) {
    p.push_state();
    let z = keys();

    if let Some(ep) = p.st.ep {
        p.st.key ^= z.ep(ep.file());
        p.st.rep_key ^= z.ep(ep.file());
        p.st.ep = None;
    }

    let old50 = p.st.move50;
    p.st.move50 = old50 + 1;
    p.st.key ^= z.move50(old50) ^ z.move50(p.st.move50);

    p.st.key ^= z.halfmoves(p.st.halfmoves) ^ z.halfmoves(p.st.halfmoves + 1);
    p.st.halfmoves += 1;

    let them = p.stm().opposite();
    p.st.stm = them;
    p.st.key ^= z.stm_toggle();
    p.st.rep_key ^= z.stm(them);

    // a null move is only made outside check; pins do not depend on the mover
    p.st.in_check = false;
    p.st.checkers = 0;
}

pub fn undo_null_move(p: &mut Position) {
    p.pop_state();
}

/// Full legality predicate on top of pseudo-legal generation: pins,
/// en-passant discoveries, king walks into attack, and castle paths.
pub fn is_legal(p: &Position, m: Move) -> bool {
    let us = p.stm();
    let them = us.opposite();
    let piece = match p.piece_on(m.from) {
        Some(pc) => pc,
        None => return false,
    };
    let ks = p.king_square(us);

    // a pinned piece may only move along its pin ray
    if p.pinned(us).has(m.from) && !aligned3(ks.usize(), m.from.usize(), m.to.usize()) {
        return false;
    }

    if m.is_en_passant() {
        // test the whole attack set against the occupancy after the capture
        let cap_sq = if us == Color::White {
            m.to.offset(-8)
        } else {
            m.to.offset(8)
        };
        let occ = (p.all_pieces() ^ m.from.bb() ^ cap_sq.bb()) | m.to.bb();
        let mg = magics();
        let diag = mg.bishop_attacks(ks.usize(), occ);
        if diag & (p.pieces(them, Piece::Bishop) | p.pieces(them, Piece::Queen)) != 0 {
            return false;
        }
        let orth = mg.rook_attacks(ks.usize(), occ);
        if orth & (p.pieces(them, Piece::Rook) | p.pieces(them, Piece::Queen)) != 0 {
            return false;
        }
        // a stepper may still be giving check; the captured pawn cannot be it
        let t = tables();
        if t.knight[ks.usize()] & p.pieces(them, Piece::Knight) != 0 {
            return false;
        }
        let pawns = p.pieces(them, Piece::Pawn) & !cap_sq.bb();
        if t.pawn_attacks[us as usize][ks.usize()] & pawns != 0 {
            return false;
        }
        return true;
    }

    if m.is_castle() {
        if p.in_check() {
            return false;
        }
        let home = if us == Color::White { Square::E1 } else { Square::E8 };
        if m.from != home || p.piece_on(home) != Some(Piece::King) {
            return false;
        }
        let (pass, target, rook_home, path) = match (us, m.kind) {
            (Color::White, MoveKind::CastleKs) => {
                (Square::F1, Square::G1, Square::H1, Square::F1.bb() | Square::G1.bb())
            }
            (Color::White, _) => (
                Square::D1,
                Square::C1,
                Square::A1,
                Square::B1.bb() | Square::C1.bb() | Square::D1.bb(),
            ),
            (Color::Black, MoveKind::CastleKs) => {
                (Square::F8, Square::G8, Square::H8, Square::F8.bb() | Square::G8.bb())
            }
            (Color::Black, _) => (
                Square::D8,
                Square::C8,
                Square::A8,
                Square::B8.bb() | Square::C8.bb() | Square::D8.bb(),
            ),
        };
        if p.all_pieces() & path != 0 {
            return false;
        }
        if p.piece_on(rook_home) != Some(Piece::Rook) || p.color_on(rook_home) != Some(us) {
            return false;
        }
        if is_square_attacked(p, pass, them, None)
            || is_square_attacked(p, target, them, None)
        {
            return false;
        }
        return true;
    }

    if piece == Piece::King {
        let occ = p.all_pieces() ^ ks.bb();
        return !is_square_attacked(p, m.to, them, Some(occ));
    }

    true
}

/// Strict validity check for moves taken from the transposition table or the
/// killer slots, which may be stale for the current position.
pub fn is_legal_hashmove(p: &Position, m: Move) -> bool {
    if m.is_none() || m.from == m.to {
        return false;
    }
    let us = p.stm();
    let them = us.opposite();
    let piece = match p.piece_on(m.from) {
        Some(pc) => pc,
        None => return false,
    };
    if p.color_on(m.from) != Some(us) {
        return false;
    }
    if m.to == p.king_square(them) {
        return false;
    }
    if p.color_on(m.to) == Some(us) {
        return false;
    }

    let quiet_like = m.is_quiet() || m.is_quiet_promotion() || m.is_en_passant();
    if quiet_like && p.color_on(m.to).is_some() {
        return false;
    }
    if (m.kind == MoveKind::Capture || m.is_capture_promotion())
        && (p.color_on(m.to) != Some(them) || p.piece_on(m.to).is_none())
    {
        return false;
    }
    if m.is_promotion() && piece != Piece::Pawn {
        return false;
    }
    if m.is_en_passant() && p.st.ep != Some(m.to) {
        return false;
    }

    let (f, t) = (m.from.usize(), m.to.usize());
    let (rd, fd) = (rank_dist(f, t), file_dist(f, t));

    match piece {
        Piece::Pawn => {
            if m.kind == MoveKind::Quiet && rd == 2 {
                let start = if us == Color::White { 1 } else { 6 };
                if m.from.rank() != start {
                    return false;
                }
                let mid = if us == Color::White {
                    m.from.offset(8)
                } else {
                    m.from.offset(-8)
                };
                if p.piece_on(mid).is_some() {
                    return false;
                }
            }
            if rd != 1 && rd != 2 {
                return false;
            }
            let forward = if us == Color::White {
                m.to.rank() > m.from.rank()
            } else {
                m.to.rank() < m.from.rank()
            };
            if !forward {
                return false;
            }
            if (m.kind == MoveKind::Quiet || m.is_quiet_promotion()) && fd != 0 {
                return false;
            }
            if (m.kind == MoveKind::Capture || m.is_capture_promotion() || m.is_en_passant())
                && (rd != 1 || fd != 1)
            {
                return false;
            }
            if m.is_promotion() {
                let last = if us == Color::White { 7 } else { 0 };
                if m.to.rank() != last {
                    return false;
                }
            }
        }
        Piece::Knight => {
            if rd.min(fd) != 1 || rd.max(fd) != 2 {
                return false;
            }
        }
        Piece::Bishop => {
            if rd != fd {
                return false;
            }
        }
        Piece::Rook => {
            if rd != 0 && fd != 0 {
                return false;
            }
        }
        Piece::Queen => {
            if rd != 0 && fd != 0 && rd != fd {
                return false;
            }
        }
        Piece::King => {
            if m.kind == MoveKind::CastleKs && !p.can_castle_ks() {
                return false;
            }
            if m.kind == MoveKind::CastleQs && !p.can_castle_qs() {
                return false;
            }
            if !m.is_castle() && (rd > 1 || fd > 1) {
                return false;
            }
        }
    }

    // sliders must have a clear path
    if matches!(piece, Piece::Bishop | Piece::Rook | Piece::Queen) {
        let between = tables().between[f][m.to.usize()] & !(m.from.bb() | m.to.bb());
        if between & p.all_pieces() != 0 {
            return false;
        }
    }

    if !is_legal(p, m) {
        return false;
    }

    // under check, anything but a king move must capture the checker or
    // block a lone slider's ray
    if p.in_check() && piece != Piece::King {
        let checks = p.checkers();
        if checks.more_than_one() {
            return false;
        }
        let check_sq = Square::from_index(checks.lsb());
        if (m.kind == MoveKind::Capture || m.is_capture_promotion()) && m.to != check_sq {
            return false;
        }
        let checker = p.piece_on(check_sq);
        let quietish = m.kind == MoveKind::Quiet || m.is_quiet_promotion();
        if quietish
            && matches!(checker, Some(Piece::Pawn) | Some(Piece::Knight) | Some(Piece::King))
        {
            return false;
        }
        if matches!(checker, Some(Piece::Bishop) | Some(Piece::Rook) | Some(Piece::Queen)) {
            let t = tables();
            let gap = t.between[check_sq.usize()][p.king_square(us).usize()]
                & !p.all_pieces();
            if quietish && gap & m.to.bb() == 0 {
                return false;
            }
        }
    }

    true
}

/// Pseudo-legal generation filtered through the legality predicate.
pub fn generate_legal(p: &Position, list: &mut MoveList) {
    let mut pseudo = MoveList::new();
    generate_pseudo_legal(p, &mut pseudo);
    list.clear();
    for m in pseudo {
        if is_legal(p, m) {
            list.push(m);
        }
    }
}
