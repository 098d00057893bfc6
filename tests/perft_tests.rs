//! Legal-move-count ground truth for the generator, the legality filter,
//! and make/unmake.

use std::str::FromStr;

use skirmish::board::Position;
use skirmish::moves::perft::perft;

fn perft_from(fen: &str, depth: u32) -> u64 {
    let mut p = Position::from_str(fen).expect("valid FEN");
    perft(&mut p, depth)
}

const START: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
const KIWIPETE: &str = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";

#[test]
fn startpos_depth_1_to_3() {
    assert_eq!(perft_from(START, 1), 20);
    assert_eq!(perft_from(START, 2), 400);
    assert_eq!(perft_from(START, 3), 8_902);
}

#[test]
fn startpos_depth_4() {
    assert_eq!(perft_from(START, 4), 197_281);
}

#[test]
fn startpos_depth_5() {
    assert_eq!(perft_from(START, 5), 4_865_609);
}

#[test]
#[ignore = "about two minutes; run with --ignored for the full sweep"]
fn startpos_depth_6() {
    assert_eq!(perft_from(START, 6), 119_060_324);
}

#[test]
fn kiwipete_depth_1_to_3() {
    assert_eq!(perft_from(KIWIPETE, 1), 48);
    assert_eq!(perft_from(KIWIPETE, 2), 2_039);
    assert_eq!(perft_from(KIWIPETE, 3), 97_862);
}

#[test]
fn kiwipete_depth_4() {
    assert_eq!(perft_from(KIWIPETE, 4), 4_085_603);
}

// Positions exercising promotion, en passant and castling corners; counts
// from the standard perft references.

#[test]
fn en_passant_discovered_pin_position() {
    // "position 3" from the perft suite: ep captures interact with pins
    let fen = "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1";
    assert_eq!(perft_from(fen, 1), 14);
    assert_eq!(perft_from(fen, 2), 191);
    assert_eq!(perft_from(fen, 3), 2_812);
    assert_eq!(perft_from(fen, 4), 43_238);
    assert_eq!(perft_from(fen, 5), 674_624);
}

#[test]
fn promotion_heavy_position() {
    // "position 4": stacked promotions and underpromotions
    let fen = "r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1";
    assert_eq!(perft_from(fen, 1), 6);
    assert_eq!(perft_from(fen, 2), 264);
    assert_eq!(perft_from(fen, 3), 9_467);
    assert_eq!(perft_from(fen, 4), 422_333);
}

#[test]
fn talkchess_position_5() {
    let fen = "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8";
    assert_eq!(perft_from(fen, 1), 44);
    assert_eq!(perft_from(fen, 2), 1_486);
    assert_eq!(perft_from(fen, 3), 62_379);
    assert_eq!(perft_from(fen, 4), 2_103_487);
}

#[test]
fn steven_edwards_position_6() {
    let fen = "r4rk1/1pp1qppp/p1np1n2/2b1p1B1/2B1P1b1/P1NP1N2/1PP1QPPP/R4RK1 w - - 0 10";
    assert_eq!(perft_from(fen, 1), 46);
    assert_eq!(perft_from(fen, 2), 2_079);
    assert_eq!(perft_from(fen, 3), 89_890);
}
