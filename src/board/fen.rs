use crate::board::{
    CastleBits, Color, Piece, Position, CASTLE_BK, CASTLE_BQ, CASTLE_WK, CASTLE_WQ,
};
use crate::hash::zobrist::keys;
use crate::moves::attacks::{attackers_of_color, compute_pinned, is_square_attacked};
use crate::square::Square;

const PIECE_CHARS: [char; 12] = ['P', 'N', 'B', 'R', 'Q', 'K', 'p', 'n', 'b', 'r', 'q', 'k'];

impl Position {
    /// Parse the standard 6-field FEN. Missing trailing fields default to
    /// zero counters; a malformed piece field is an error.
    pub fn set_fen(&mut self, fen: &str) -> Result<(), String> {
        self.clear();
        let mut fields = fen.split_whitespace();

        let placement = fields.next().ok_or_else(|| "empty FEN".to_string())?;
        let mut s: i32 = 56;
        for ch in placement.chars() {
            match ch {
                '1'..='8' => s += ch as i32 - '0' as i32,
                '/' => s -= 16,
                _ => {
                    let idx = PIECE_CHARS
                        .iter()
                        .position(|&p| p == ch)
                        .ok_or_else(|| format!("bad piece char '{ch}' in FEN"))?;
                    if !(0..64).contains(&s) {
                        return Err(format!("piece field overflows the board: {fen}"));
                    }
                    let color = if idx < 6 { Color::White } else { Color::Black };
                    let piece = Piece::from_u8((idx % 6) as u8);
                    self.add_piece(color, piece, Square::from_index(s as u8));
                    s += 1;
                }
            }
        }

        let z = keys();

        let stm = match fields.next() {
            Some("b") => Color::Black,
            _ => Color::White,
        };
        self.st.stm = stm;
        self.st.key ^= z.stm(stm);
        self.st.rep_key ^= z.stm(stm);

        let mut castle: CastleBits = 0;
        if let Some(tok) = fields.next() {
            for ch in tok.chars() {
                castle |= match ch {
                    'K' => CASTLE_WK,
                    'Q' => CASTLE_WQ,
                    'k' => CASTLE_BK,
                    'q' => CASTLE_BQ,
                    _ => 0,
                };
            }
        }
        self.st.castle = castle;
        let delta = z.castle_delta(0, castle);
        self.st.key ^= delta;
        self.st.rep_key ^= delta;

        if let Some(tok) = fields.next() {
            if let Ok(ep) = tok.parse::<Square>() {
                if ep.rank() == 2 || ep.rank() == 5 {
                    self.st.ep = Some(ep);
                    self.st.key ^= z.ep(ep.file());
                    self.st.rep_key ^= z.ep(ep.file());
                }
            }
        }

        self.st.move50 = fields
            .next()
            .and_then(|t| t.parse().ok())
            .unwrap_or(0);
        self.st.key ^= z.move50(self.st.move50);

        let fullmove: u16 = fields
            .next()
            .and_then(|t| t.parse().ok())
            .unwrap_or(1)
            .max(1);
        self.st.halfmoves =
            2 * (fullmove - 1) + if stm == Color::Black { 1 } else { 0 };
        self.st.key ^= z.halfmoves(self.st.halfmoves);

        // check and pin state
        let ks = self.king_square(stm);
        self.st.in_check = is_square_attacked(self, ks, stm.opposite(), None);
        self.st.checkers = if self.st.in_check {
            attackers_of_color(self, ks, stm.opposite())
        } else {
            0
        };
        self.st.pinned[0] = compute_pinned(self, Color::White);
        self.st.pinned[1] = compute_pinned(self, Color::Black);

        Ok(())
    }

    pub fn to_fen(&self) -> String {
        let mut fen = String::new();
        for rank in (0..8).rev() {
            let mut empties = 0;
            for file in 0..8 {
                let s = Square::new(file, rank);
                match (self.piece_on(s), self.color_on(s)) {
                    (Some(p), Some(c)) => {
                        if empties > 0 {
                            fen.push_str(&empties.to_string());
                            empties = 0;
                        }
                        let idx = p as usize + if c == Color::Black { 6 } else { 0 };
                        fen.push(PIECE_CHARS[idx]);
                    }
                    _ => empties += 1,
                }
            }
            if empties > 0 {
                fen.push_str(&empties.to_string());
            }
            if rank > 0 {
                fen.push('/');
            }
        }

        fen.push(' ');
        fen.push(if self.stm() == Color::White { 'w' } else { 'b' });

        fen.push(' ');
        if self.st.castle == 0 {
            fen.push('-');
        } else {
            if self.st.castle & CASTLE_WK != 0 {
                fen.push('K');
            }
            if self.st.castle & CASTLE_WQ != 0 {
                fen.push('Q');
            }
            if self.st.castle & CASTLE_BK != 0 {
                fen.push('k');
            }
            if self.st.castle & CASTLE_BQ != 0 {
                fen.push('q');
            }
        }

        fen.push(' ');
        match self.st.ep {
            Some(ep) => fen.push_str(&ep.to_string()),
            None => fen.push('-'),
        }

        fen.push_str(&format!(
            " {} {}",
            self.st.move50,
            self.st.halfmoves / 2 + 1
        ));
        fen
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn startpos_roundtrip() {
        let p = Position::new();
        assert_eq!(p.to_fen(), crate::board::START_FEN);
        assert_eq!(p.count_of(Color::White, Piece::Pawn), 8);
        assert_eq!(p.king_square(Color::White), Square::E1);
        assert_eq!(p.king_square(Color::Black), Square::E8);
        assert!(!p.in_check());
        assert_eq!(p.key(), p.compute_key_full());
    }

    #[test]
    fn tolerates_missing_counters() {
        let p = Position::from_str("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq -")
            .unwrap();
        assert_eq!(p.st.move50, 0);
        assert_eq!(p.key(), p.compute_key_full());
    }

    #[test]
    fn rejects_garbage_piece_field() {
        assert!(Position::from_str("rnbqkbnr/ppppppxp/8/8/8/8/PPPPPPPP/RNBQKBNR w - - 0 1").is_err());
    }

    #[test]
    fn parses_check_state() {
        // white king on e1 checked by rook on e8
        let p = Position::from_str("4r3/8/8/8/8/8/8/4K2k w - - 0 1").unwrap();
        assert!(p.in_check());
        assert_eq!(p.checkers().count_ones(), 1);
    }

    #[test]
    fn fullmove_counter_survives_roundtrip() {
        let fen = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR b KQkq - 3 11";
        let p = Position::from_str(fen).unwrap();
        assert_eq!(p.to_fen(), fen);
    }
}
