//! Zobrist key material.
//!
//! Four incremental keys are maintained by the position: the full key (piece
//! placement, side to move, castle rights, en-passant file, and both ply
//! counters), a pawn-only key, a material key built from per-count
//! contributions, and the repetition key (everything except the counters).
//!
//! The repetition key accumulates the side-to-move contribution rather than
//! toggling it: each flip XORs in the key of the *new* mover, so the
//! contribution cycles with period four plies and two positions compare equal
//! only at ply distances 4, 8, 12, ...

use once_cell::sync::OnceCell;
use rand::{rngs::StdRng, RngCore, SeedableRng};

use crate::board::{Color, Piece};
use crate::square::Square;

const SEED: u64 = 0x9E37_79B9_AAAC_5C87;

pub struct ZobristKeys {
    /// `[color][piece][square]`
    piece: [[[u64; 64]; 6]; 2],
    /// one key per right, K Q k q
    castle: [u64; 4],
    /// en-passant file a..h
    ep_file: [u64; 8],
    /// accumulated into the repetition key per flip
    stm: [u64; 2],
    /// half-move-since-pawn-or-capture counter
    move50: [u64; 512],
    /// total half-move counter
    halfmoves: [u64; 512],
}

pub fn keys() -> &'static ZobristKeys {
    static KEYS: OnceCell<ZobristKeys> = OnceCell::new();
    KEYS.get_or_init(|| generate(StdRng::seed_from_u64(SEED)))
}

fn generate(mut rng: StdRng) -> ZobristKeys {
    let mut non_zero = || loop {
        let v = rng.next_u64();
        if v != 0 {
            return v;
        }
    };

    let mut k = ZobristKeys {
        piece: [[[0; 64]; 6]; 2],
        castle: [0; 4],
        ep_file: [0; 8],
        stm: [0; 2],
        move50: [0; 512],
        halfmoves: [0; 512],
    };

    for c in 0..2 {
        for p in 0..6 {
            for s in 0..64 {
                k.piece[c][p][s] = non_zero();
            }
        }
    }
    for r in &mut k.castle {
        *r = non_zero();
    }
    for f in &mut k.ep_file {
        *f = non_zero();
    }
    k.stm = [non_zero(), non_zero()];
    for m in &mut k.move50 {
        *m = non_zero();
    }
    for h in &mut k.halfmoves {
        *h = non_zero();
    }
    k
}

impl ZobristKeys {
    #[inline(always)]
    pub fn piece(&self, c: Color, p: Piece, s: Square) -> u64 {
        self.piece[c as usize][p as usize][s.usize()]
    }

    /// Material contribution of the `n`-th piece of a kind; keyed off the
    /// piece table so counts, not squares, drive the material key.
    #[inline(always)]
    pub fn material(&self, c: Color, p: Piece, n: u8) -> u64 {
        self.piece[c as usize][p as usize][n as usize & 63]
    }

    #[inline(always)]
    pub fn ep(&self, file: u8) -> u64 {
        self.ep_file[file as usize]
    }

    #[inline(always)]
    pub fn stm(&self, c: Color) -> u64 {
        self.stm[c as usize]
    }

    /// Single toggle applied to the full key on every side-to-move flip.
    #[inline(always)]
    pub fn stm_toggle(&self) -> u64 {
        self.stm[0] ^ self.stm[1]
    }

    #[inline(always)]
    pub fn move50(&self, count: u16) -> u64 {
        self.move50[count as usize & 511]
    }

    #[inline(always)]
    pub fn halfmoves(&self, count: u16) -> u64 {
        self.halfmoves[count as usize & 511]
    }

    /// XOR the per-right castle keys for every bit that differs between the
    /// old and new rights masks.
    #[inline]
    pub fn castle_delta(&self, old: u8, new: u8) -> u64 {
        let mut d = (old ^ new) & 0x0F;
        let mut acc = 0u64;
        while d != 0 {
            let bit = d.trailing_zeros() as usize;
            acc ^= self.castle[bit];
            d &= d - 1;
        }
        acc
    }
}
