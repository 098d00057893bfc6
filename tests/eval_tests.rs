//! Evaluation scenarios, including the literal end-to-end checks on the
//! cached material accounting.

use std::str::FromStr;

use skirmish::board::{Color, Piece, Position};
use skirmish::eval::material::MaterialTable;
use skirmish::eval::pawns::PawnTable;
use skirmish::eval;
use skirmish::moves::execute::{do_move, generate_legal};
use skirmish::moves::movegen::MoveList;

fn caches() -> (PawnTable, MaterialTable) {
    (PawnTable::new(2), MaterialTable::new(2))
}

fn play(p: &mut Position, token: &str) {
    let mut moves = MoveList::new();
    generate_legal(p, &mut moves);
    let m = moves
        .iter()
        .copied()
        .find(|m| m.to_string() == token)
        .unwrap_or_else(|| panic!("{token} not legal in {}", p.to_fen()));
    do_move(p, m);
}

#[test]
fn startpos_has_twenty_legal_moves() {
    let p = Position::from_str("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1")
        .unwrap();
    let mut moves = MoveList::new();
    generate_legal(&p, &mut moves);
    assert_eq!(moves.len(), 20);
}

#[test]
fn petroff_pawn_grab_shows_up_in_the_caches() {
    // 1.e4 e5 2.Nf3 Nf6 3.Nxe5 Nxe4 is legal from the start; after White's
    // pawn grab the caches carry White a pawn up, and the counter-capture
    // squares the books again.
    let (pt, mt) = caches();
    let mut p = Position::new();
    for token in ["e2e4", "e7e5", "g1f3", "g8f6", "f3e5"] {
        play(&mut p, token);
    }
    assert_eq!(p.count_of(Color::White, Piece::Pawn), 8);
    assert_eq!(p.count_of(Color::Black, Piece::Pawn), 7);
    assert_eq!(mt.fetch(&p).score, 0, "no minor piece has left the board");
    let pe = pt.fetch(&p);
    // one extra pawn, with the per-file scaling around face value
    assert!(
        (50..=150).contains(&i32::from(pe.score)),
        "pawn cache must carry the extra pawn, got {}",
        pe.score
    );

    play(&mut p, "f6e4");
    assert_eq!(p.count_of(Color::White, Piece::Pawn), 7);
    let pe = pt.fetch(&p);
    assert!(
        i32::from(pe.score).abs() < 50,
        "material squared up again, got {}",
        pe.score
    );
}

#[test]
fn tempo_flips_with_side_to_move() {
    let (pt, mt) = caches();
    let w = Position::from_str("4k3/8/8/8/8/8/8/4K3 w - - 0 1").unwrap();
    let b = Position::from_str("4k3/8/8/8/8/8/8/4K3 b - - 0 1").unwrap();
    let ew = eval::evaluate(&w, &pt, &mt, -1.0);
    let eb = eval::evaluate(&b, &pt, &mt, -1.0);
    // symmetric position: both sides see the same (tempo-led) score
    assert!((ew - eb).abs() < 1.0, "{ew} vs {eb}");
}

#[test]
fn bishop_pair_bonus_applies() {
    let (pt, mt) = caches();
    let pair =
        Position::from_str("4k3/8/8/8/8/8/2p5/1BB1K3 w - - 0 1").unwrap();
    let single =
        Position::from_str("4k3/8/8/8/8/8/2p5/1B2K3 w - - 0 1").unwrap();
    let with_pair = eval::evaluate(&pair, &pt, &mt, -1.0);
    let with_single = eval::evaluate(&single, &pt, &mt, -1.0);
    assert!(
        with_pair > with_single + 200.0,
        "second bishop must add material plus the pair bonus"
    );
}

#[test]
fn passed_pawn_outscores_blocked_pawn() {
    let (pt, mt) = caches();
    // same material, one pawn each: passed e5 pawn vs e5 pawn facing e6 wall
    let passed = Position::from_str("4k3/8/8/4P3/8/8/8/4K3 w - - 0 1").unwrap();
    let blocked = Position::from_str("4k3/8/4p3/4P3/8/8/8/4K3 w - - 0 1").unwrap();
    let a = eval::evaluate(&passed, &pt, &mt, -1.0);
    let b = eval::evaluate(&blocked, &pt, &mt, -1.0);
    assert!(a > b, "free runner {a} vs contained pawn {b}");
}

#[test]
fn lazy_margin_is_honored_for_lopsided_positions() {
    let (pt, mt) = caches();
    let p = Position::from_str("4k3/8/8/8/8/8/8/QQQ1K3 w - - 0 1").unwrap();
    let lazy = eval::evaluate(&p, &pt, &mt, 500.0);
    assert!(lazy > 500.0, "three queens clear any margin, got {lazy}");
}
