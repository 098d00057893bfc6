//! Pawn-structure cache keyed by the pawn-only Zobrist.
//!
//! One scan per color fills the structural sets (attacks, passed, isolated,
//! backward, doubled, semi-open, shelter, flank splits) and accumulates the
//! scalar score, pawn material with its per-file scaling included.

use std::sync::Mutex;

use crate::bitboard::BitboardExt;
use crate::board::{Color, Piece, Position, COLORS};
use crate::eval::psqt::square_score;
use crate::square::{rank_of, Square};
use crate::tables::tables;

#[derive(Debug, Clone, Copy, Default)]
pub struct PawnEntry {
    pub key: u64,
    pub score: i16,

    pub doubled: [u64; 2],
    pub isolated: [u64; 2],
    pub backward: [u64; 2],
    pub passed: [u64; 2],
    pub dark: [u64; 2],
    pub light: [u64; 2],
    /// Shelter pawns adjacent to the own king.
    pub king: [u64; 2],
    pub attacks: [u64; 2],
    pub semiopen: [u64; 2],
    pub queenside: [u64; 2],
    pub kingside: [u64; 2],
    pub center_pawn_count: i16,
    pub locked_center: bool,
}

pub struct PawnTable {
    buckets: Vec<Mutex<PawnEntry>>,
    mask: u64,
}

impl PawnTable {
    pub fn new(size_mb: usize) -> PawnTable {
        let entry = std::mem::size_of::<Mutex<PawnEntry>>();
        let wanted = (size_mb * 1024 * 1024 / entry).max(1024);
        let count = if wanted.is_power_of_two() {
            wanted
        } else {
            wanted.next_power_of_two() >> 1
        };
        let mut buckets = Vec::with_capacity(count);
        buckets.resize_with(count, || Mutex::new(PawnEntry::default()));
        PawnTable {
            buckets,
            mask: (count - 1) as u64,
        }
    }

    pub fn clear(&self) {
        for b in &self.buckets {
            if let Ok(mut g) = b.lock() {
                *g = PawnEntry::default();
            }
        }
    }

    pub fn fetch(&self, p: &Position) -> PawnEntry {
        let key = p.pawn_key();
        let idx = (key & self.mask) as usize;
        match self.buckets[idx].try_lock() {
            Ok(mut g) => {
                if g.key != key {
                    *g = compute(p, key);
                }
                *g
            }
            Err(_) => compute(p, key),
        }
    }
}

fn compute(p: &Position, key: u64) -> PawnEntry {
    let mut e = PawnEntry {
        key,
        ..PawnEntry::default()
    };
    let white = scan(p, Color::White, &mut e);
    let black = scan(p, Color::Black, &mut e);
    e.score = (white - black) as i16;
    e
}

const FILE_SCALE: [f32; 8] = [0.86, 0.90, 0.95, 1.00, 1.00, 0.95, 0.90, 0.86];
const PAWN_VALUE: f32 = 100.0;

fn scan(p: &Position, c: Color, e: &mut PawnEntry) -> f32 {
    let t = tables();
    let ci = c as usize;
    let them = c.opposite();
    let pawns = p.pieces(c, Piece::Pawn);
    let enemy_pawns = p.pieces(them, Piece::Pawn);
    let ksq = p.king_square(c);

    let mut score = 0.0f32;
    let mut locked = 0u64;

    for &s in p.squares_of(c, Piece::Pawn) {
        let bb = s.bb();
        let file = s.file() as usize;

        score += p.params.sq_score_scaling[Piece::Pawn as usize]
            * square_score(c, Piece::Pawn, s);
        score += FILE_SCALE[file] * PAWN_VALUE;

        e.attacks[ci] |= t.pawn_attacks[ci][s.usize()];

        if t.king[ksq.usize()] & bb != 0 {
            e.king[ci] |= bb;
        }

        if t.passed_front[ci][s.usize()] & enemy_pawns == 0 {
            e.passed[ci] |= bb;
            score += p.params.passed_pawn_bonus;
        }

        if t.neighbor_files[file] & pawns == 0 {
            e.isolated[ci] |= bb;
            score -= p.params.isolated_pawn_penalty;
        }

        if is_backward(c, s, pawns) {
            e.backward[ci] |= bb;
            score -= p.params.backward_pawn_penalty;
        }

        if t.colored[0] & bb != 0 {
            e.light[ci] |= bb;
        } else {
            e.dark[ci] |= bb;
        }

        let on_file = t.file[file] & pawns;
        if on_file.more_than_one() {
            e.doubled[ci] |= on_file;
            if e.isolated[ci] & on_file != 0 {
                score -= 2.0 * p.params.doubled_pawn_penalty;
            } else {
                score -= p.params.doubled_pawn_penalty;
            }
        }

        if t.file[file] & enemy_pawns == 0 {
            e.semiopen[ci] |= bb;
            if e.backward[ci] & bb != 0 {
                score -= 2.0 * p.params.backward_pawn_penalty;
            }
            if e.isolated[ci] & bb != 0 {
                score -= 2.0 * p.params.semi_open_pawn_penalty;
            }
        }

        if file <= 3 {
            e.queenside[ci] |= bb;
        } else {
            e.kingside[ci] |= bb;
        }

        // locked central pairs: a stationary enemy pawn dead ahead
        if bb & t.big_center != 0 {
            let front = if c == Color::White {
                s.usize() + 8
            } else {
                s.usize().wrapping_sub(8)
            };
            if front < 64 {
                e.center_pawn_count += 1;
                if enemy_pawns & (1u64 << front) != 0 {
                    locked |= 1u64 << front;
                }
            }
        }
    }

    if locked.count_ones() >= 2 {
        e.locked_center = true;
    }

    score
}

/// Every neighboring pawn has outrun this one: the most advanced pawn on
/// each occupied adjacent file is strictly ahead, and at least one exists.
fn is_backward(c: Color, s: Square, pawns: u64) -> bool {
    let t = tables();
    let file = s.file() as i32;
    let rank = s.rank() as usize;

    let mut any_neighbor = false;
    for adj in [file - 1, file + 1] {
        if !(0..8).contains(&adj) {
            continue;
        }
        let neighbors = t.file[adj as usize] & pawns;
        if neighbors == 0 {
            continue;
        }
        any_neighbor = true;
        let most_advanced = if c == Color::White {
            rank_of(63 - neighbors.leading_zeros() as usize)
        } else {
            rank_of(neighbors.trailing_zeros() as usize)
        };
        let ahead = if c == Color::White {
            most_advanced > rank
        } else {
            most_advanced < rank
        };
        if !ahead {
            return false;
        }
    }
    any_neighbor
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn table() -> PawnTable {
        PawnTable::new(1)
    }

    #[test]
    fn startpos_pawns_are_symmetric() {
        let p = Position::new();
        let e = table().fetch(&p);
        assert_eq!(e.score, 0);
        assert_eq!(e.passed, [0, 0]);
        assert_eq!(e.isolated, [0, 0]);
        assert_eq!(e.doubled, [0, 0]);
        assert_eq!(e.attacks[0].count_ones(), 16); // rank 3 fully covered
    }

    #[test]
    fn passed_pawn_detected() {
        // white pawn e5, black pawn a7: e-pawn is passed, a-pawn is not
        let p = Position::from_str("4k3/p7/8/4P3/8/8/8/4K3 w - - 0 1").unwrap();
        let e = table().fetch(&p);
        assert_eq!(e.passed[0], 1u64 << 36);
        assert_eq!(e.passed[1], 0);
    }

    #[test]
    fn isolated_and_doubled_detected() {
        // doubled isolated white pawns on e4/e5
        let p = Position::from_str("4k3/8/8/4P3/4P3/8/8/4K3 w - - 0 1").unwrap();
        let e = table().fetch(&p);
        assert_eq!(e.isolated[0].count_ones(), 2);
        assert_eq!(e.doubled[0].count_ones(), 2);
        assert_eq!(e.semiopen[0].count_ones(), 2);
    }

    #[test]
    fn shelter_pawns_tracked() {
        let p = Position::new();
        let e = table().fetch(&p);
        // d2, e2, f2 sit in the white king ring
        assert_eq!(e.king[0].count_ones(), 3);
        assert_eq!(e.king[1].count_ones(), 3);
    }

    #[test]
    fn locked_center_flagged() {
        // d4/e4 faced head-on by d5/e5
        let p = Position::from_str("4k3/8/8/3pp3/3PP3/8/8/4K3 w - - 0 1").unwrap();
        let e = table().fetch(&p);
        assert!(e.locked_center);
        assert!(e.center_pawn_count >= 2);
    }

    #[test]
    fn backward_pawn_flagged() {
        // white pawns d4, e3: neither neighbor of e3 is behind it, but d4 is
        // ahead on the only occupied adjacent file -> e3 is backward
        let p = Position::from_str("4k3/8/8/8/3P4/4P3/8/4K3 w - - 0 1").unwrap();
        let e = table().fetch(&p);
        assert_ne!(e.backward[0] & (1u64 << 20), 0);
    }
}
