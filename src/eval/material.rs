//! Material cache keyed by the material-only Zobrist.
//!
//! Buckets are individually locked; a contended bucket is recomputed on the
//! spot instead of blocking, so a rare clobber costs a recompute and nothing
//! else.

use std::sync::Mutex;

use crate::board::{Color, Piece, Position, COLORS};

/// Endgame bucket encoding: low nibble is one side's lone piece set
/// (NBRQ bit per kind), high nibble the other's; two of a kind set the bit in
/// both nibbles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EndgameKind {
    KpK = 0,
    KnnK = 17,
    KnbK = 19,
    KnrK = 20,
    KnqK = 24,
    KbnK = 33,
    KbbK = 35,
    KbrK = 39,
    KbqK = 40,
    KrnK = 65,
    KrbK = 66,
    KrrK = 68,
    KrqK = 72,
    KqnK = 129,
    KqbK = 130,
    KqrK = 132,
    KqqK = 136,
}

impl EndgameKind {
    fn from_encoding(v: u8) -> Option<EndgameKind> {
        Some(match v {
            0 => EndgameKind::KpK,
            17 => EndgameKind::KnnK,
            19 => EndgameKind::KnbK,
            20 => EndgameKind::KnrK,
            24 => EndgameKind::KnqK,
            33 => EndgameKind::KbnK,
            35 => EndgameKind::KbbK,
            39 => EndgameKind::KbrK,
            40 => EndgameKind::KbqK,
            65 => EndgameKind::KrnK,
            66 => EndgameKind::KrbK,
            68 => EndgameKind::KrrK,
            72 => EndgameKind::KrqK,
            129 => EndgameKind::KqnK,
            130 => EndgameKind::KqbK,
            132 => EndgameKind::KqrK,
            136 => EndgameKind::KqqK,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MaterialEntry {
    pub key: u64,
    pub score: i16,
    /// 0 at fourteen non-pawn pieces, 1 at two.
    pub endgame_coeff: f32,
    pub endgame: Option<EndgameKind>,
    /// Combined piece counts, indexed by piece kind (pawn slot unused).
    pub number: [u8; 5],
}

impl MaterialEntry {
    #[inline(always)]
    pub fn is_endgame(&self) -> bool {
        self.endgame.is_some()
    }
}

pub struct MaterialTable {
    buckets: Vec<Mutex<MaterialEntry>>,
    mask: u64,
}

const NON_PAWN: [Piece; 4] = [Piece::Knight, Piece::Bishop, Piece::Rook, Piece::Queen];

impl MaterialTable {
    pub fn new(size_mb: usize) -> MaterialTable {
        let entry = std::mem::size_of::<Mutex<MaterialEntry>>();
        let wanted = (size_mb * 1024 * 1024 / entry).max(1024);
        let count = if wanted.is_power_of_two() {
            wanted
        } else {
            wanted.next_power_of_two() >> 1
        };
        let mut buckets = Vec::with_capacity(count);
        buckets.resize_with(count, || Mutex::new(MaterialEntry::default()));
        MaterialTable {
            buckets,
            mask: (count - 1) as u64,
        }
    }

    pub fn clear(&self) {
        for b in &self.buckets {
            if let Ok(mut g) = b.lock() {
                *g = MaterialEntry::default();
            }
        }
    }

    pub fn fetch(&self, p: &Position) -> MaterialEntry {
        let key = p.material_key();
        let idx = (key & self.mask) as usize;
        match self.buckets[idx].try_lock() {
            Ok(mut g) => {
                if g.key != key {
                    *g = compute(p, key);
                }
                *g
            }
            // contended bucket: compute without caching
            Err(_) => compute(p, key),
        }
    }
}

fn compute(p: &Position, key: u64) -> MaterialEntry {
    let mut e = MaterialEntry {
        key,
        ..MaterialEntry::default()
    };

    // the knight fades and the rook grows as pawns leave the board
    let total_pawns = (p.count_of(Color::White, Piece::Pawn)
        + p.count_of(Color::Black, Piece::Pawn)) as f32;
    let adjust = 2.0 * total_pawns;
    let mut values = [0.0f32, 300.0, 315.0, 480.0, 910.0];
    values[Piece::Knight as usize] -= adjust;
    values[Piece::Rook as usize] += adjust;

    let mut score = 0.0f32;
    let mut total = 0u32;
    for &c in &COLORS {
        let sign = if c == Color::White { 1.0 } else { -1.0 };
        for &piece in &NON_PAWN {
            let n = p.count_of(c, piece);
            e.number[piece as usize] += n;
            score += sign * n as f32 * values[piece as usize];
            total += n as u32;
        }
    }
    e.score = score as i16;

    if total <= 2 {
        let mut encoding = 0u8;
        let mut placed = 0;
        for &piece in &NON_PAWN {
            let bit = piece as u8 - 1;
            match e.number[piece as usize] {
                2 => encoding |= (1 << bit) | (1 << (4 + bit)),
                1 => {
                    encoding |= if placed == 0 {
                        1 << bit
                    } else {
                        1 << (4 + bit)
                    };
                    placed += 1;
                }
                _ => {}
            }
        }
        e.endgame = EndgameKind::from_encoding(encoding);
    }

    // linear in the piece count: 14 pieces -> 0, 2 pieces -> 1
    e.endgame_coeff = (-0.083_333 * total as f32 + 1.166_67).min(1.0);
    e
}
