use std::fmt;

use crate::board::Piece;
use crate::square::Square;

/// Exact move tag. Promotion kinds carry the promoted piece; castling is
/// encoded by side so make/unmake never re-derive it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MoveKind {
    PromoQueen = 0,
    PromoRook = 1,
    PromoBishop = 2,
    PromoKnight = 3,
    CapPromoQueen = 4,
    CapPromoRook = 5,
    CapPromoBishop = 6,
    CapPromoKnight = 7,
    CastleKs = 8,
    CastleQs = 9,
    Quiet = 10,
    Capture = 11,
    EnPassant = 12,
    None = 13,
}

impl MoveKind {
    #[inline(always)]
    pub fn from_u8(v: u8) -> MoveKind {
        match v {
            0 => MoveKind::PromoQueen,
            1 => MoveKind::PromoRook,
            2 => MoveKind::PromoBishop,
            3 => MoveKind::PromoKnight,
            4 => MoveKind::CapPromoQueen,
            5 => MoveKind::CapPromoRook,
            6 => MoveKind::CapPromoBishop,
            7 => MoveKind::CapPromoKnight,
            8 => MoveKind::CastleKs,
            9 => MoveKind::CastleQs,
            10 => MoveKind::Quiet,
            11 => MoveKind::Capture,
            12 => MoveKind::EnPassant,
            _ => MoveKind::None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Move {
    pub from: Square,
    pub to: Square,
    pub kind: MoveKind,
}

impl Move {
    pub const NONE: Move = Move {
        from: Square::A1,
        to: Square::A1,
        kind: MoveKind::None,
    };

    #[inline(always)]
    pub fn new(from: Square, to: Square, kind: MoveKind) -> Move {
        Move { from, to, kind }
    }

    #[inline(always)]
    pub fn is_none(self) -> bool {
        self.kind == MoveKind::None
    }

    #[inline(always)]
    pub fn is_quiet(self) -> bool {
        self.kind == MoveKind::Quiet
    }

    #[inline(always)]
    pub fn is_capture(self) -> bool {
        matches!(
            self.kind,
            MoveKind::Capture
                | MoveKind::EnPassant
                | MoveKind::CapPromoQueen
                | MoveKind::CapPromoRook
                | MoveKind::CapPromoBishop
                | MoveKind::CapPromoKnight
        )
    }

    #[inline(always)]
    pub fn is_en_passant(self) -> bool {
        self.kind == MoveKind::EnPassant
    }

    #[inline(always)]
    pub fn is_castle(self) -> bool {
        matches!(self.kind, MoveKind::CastleKs | MoveKind::CastleQs)
    }

    #[inline(always)]
    pub fn is_promotion(self) -> bool {
        (self.kind as u8) < 8
    }

    #[inline(always)]
    pub fn is_quiet_promotion(self) -> bool {
        (self.kind as u8) < 4
    }

    #[inline(always)]
    pub fn is_capture_promotion(self) -> bool {
        matches!(
            self.kind,
            MoveKind::CapPromoQueen
                | MoveKind::CapPromoRook
                | MoveKind::CapPromoBishop
                | MoveKind::CapPromoKnight
        )
    }

    #[inline(always)]
    pub fn promo_piece(self) -> Option<Piece> {
        match self.kind {
            MoveKind::PromoQueen | MoveKind::CapPromoQueen => Some(Piece::Queen),
            MoveKind::PromoRook | MoveKind::CapPromoRook => Some(Piece::Rook),
            MoveKind::PromoBishop | MoveKind::CapPromoBishop => Some(Piece::Bishop),
            MoveKind::PromoKnight | MoveKind::CapPromoKnight => Some(Piece::Knight),
            _ => None,
        }
    }
}

impl Default for Move {
    fn default() -> Move {
        Move::NONE
    }
}

impl fmt::Display for Move {
    /// Long algebraic: source + destination + optional promotion letter.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.from, self.to)?;
        if let Some(p) = self.promo_piece() {
            let c = match p {
                Piece::Queen => 'q',
                Piece::Rook => 'r',
                Piece::Bishop => 'b',
                _ => 'n',
            };
            write!(f, "{c}")?;
        }
        Ok(())
    }
}
