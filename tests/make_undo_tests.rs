//! Make/unmake round trips must restore the complete position state
//! bit-for-bit: keys, bitboards, square arrays, counters, and rights.

use std::str::FromStr;

use skirmish::board::{Color, Piece, Position, COLORS, PIECES};
use skirmish::moves::execute::{do_move, do_null_move, generate_legal, undo_move, undo_null_move};
use skirmish::moves::movegen::MoveList;

#[derive(Debug, PartialEq, Eq)]
struct Snapshot {
    fen: String,
    key: u64,
    pawn_key: u64,
    material_key: u64,
    rep_key: u64,
    occupancy: [u64; 2],
    pieces: Vec<u64>,
    castle: u8,
    move50: u16,
    in_check: bool,
    pinned: [u64; 2],
}

fn snapshot(p: &Position) -> Snapshot {
    let mut pieces = Vec::new();
    for &c in &COLORS {
        for &pc in &PIECES {
            pieces.push(p.pieces(c, pc));
        }
    }
    Snapshot {
        fen: p.to_fen(),
        key: p.key(),
        pawn_key: p.pawn_key(),
        material_key: p.material_key(),
        rep_key: p.rep_key(),
        occupancy: [p.occupancy(Color::White), p.occupancy(Color::Black)],
        pieces,
        castle: p.st.castle,
        move50: p.st.move50,
        in_check: p.in_check(),
        pinned: [p.pinned(Color::White), p.pinned(Color::Black)],
    }
}

fn roundtrip_every_move(fen: &str) {
    let mut p = Position::from_str(fen).expect("valid FEN");
    let before = snapshot(&p);

    let mut moves = MoveList::new();
    generate_legal(&p, &mut moves);
    assert!(!moves.is_empty(), "no legal moves in {fen}");

    for m in moves {
        let key_before = p.key();
        do_move(&mut p, m);
        assert_ne!(p.key(), key_before, "{m} must change the key");
        assert_eq!(p.key(), p.compute_key_full(), "incremental key after {m}");
        undo_move(&mut p, m);
        assert_eq!(snapshot(&p), before, "state not restored after {m} in {fen}");
    }
}

#[test]
fn roundtrip_startpos() {
    roundtrip_every_move("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1");
}

#[test]
fn roundtrip_kiwipete_all_move_kinds() {
    // castles both ways, captures, and a pinned knight
    roundtrip_every_move("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1");
}

#[test]
fn roundtrip_promotions_and_captures() {
    roundtrip_every_move("r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1");
}

#[test]
fn roundtrip_en_passant() {
    roundtrip_every_move("rnbqkbnr/ppp1pppp/8/8/3pP3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 3");
}

#[test]
fn roundtrip_evasions() {
    // side to move is in check
    roundtrip_every_move("rnb1kbnr/pppp1ppp/8/4p3/7q/8/PPPPP1PP/RNBQKBNR w KQkq - 1 3");
}

#[test]
fn null_move_roundtrip() {
    let mut p = Position::from_str(
        "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
    )
    .unwrap();
    let before = snapshot(&p);
    do_null_move(&mut p);
    assert_ne!(p.key(), before.key, "null move must flip the key");
    assert_eq!(p.stm(), Color::Black);
    assert_eq!(p.key(), p.compute_key_full(), "incremental key after null");
    undo_null_move(&mut p);
    assert_eq!(snapshot(&p), before, "null move round trip");
}

#[test]
fn deep_random_walk_restores_everything() {
    // walk a deterministic pseudo-random line, then unwind it completely
    let mut p = Position::new();
    let start = snapshot(&p);
    let mut line = Vec::new();
    let mut seed = 0x1234_5678_u64;

    for _ in 0..120 {
        let mut moves = MoveList::new();
        generate_legal(&p, &mut moves);
        if moves.is_empty() {
            break;
        }
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        let m = moves[(seed >> 33) as usize % moves.len()];
        do_move(&mut p, m);
        line.push(m);
        assert_eq!(p.key(), p.compute_key_full(), "drift at ply {}", line.len());
    }

    while let Some(m) = line.pop() {
        undo_move(&mut p, m);
    }
    assert_eq!(snapshot(&p), start, "full unwind must restore the root");
}

#[test]
fn square_lists_track_captures() {
    let mut p = Position::from_str("4k3/8/8/3p4/4P3/8/8/4K3 w - - 0 1").unwrap();
    assert_eq!(p.count_of(Color::Black, Piece::Pawn), 1);
    let mut moves = MoveList::new();
    generate_legal(&p, &mut moves);
    let cap = moves
        .iter()
        .copied()
        .find(|m| m.is_capture())
        .expect("exd5 exists");
    do_move(&mut p, cap);
    assert_eq!(p.count_of(Color::Black, Piece::Pawn), 0);
    assert!(p.squares_of(Color::Black, Piece::Pawn).is_empty());
    undo_move(&mut p, cap);
    assert_eq!(p.count_of(Color::Black, Piece::Pawn), 1);
}
