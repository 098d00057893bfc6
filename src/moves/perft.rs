//! Legal-move tree counting, the ground truth for the generator and the
//! make/unmake machinery.

use crate::board::Position;
use crate::moves::execute::{do_move, is_legal, undo_move};
use crate::moves::movegen::{generate_pseudo_legal, MoveList};

pub fn perft(p: &mut Position, depth: u32) -> u64 {
    if depth == 0 {
        return 1;
    }
    let mut list = MoveList::new();
    generate_pseudo_legal(p, &mut list);
    let mut nodes = 0;
    for m in list {
        if !is_legal(p, m) {
            continue;
        }
        if depth == 1 {
            nodes += 1;
        } else {
            do_move(p, m);
            nodes += perft(p, depth - 1);
            undo_move(p, m);
        }
    }
    nodes
}

/// Per-root-move breakdown, printed in long algebraic.
pub fn divide(p: &mut Position, depth: u32) -> u64 {
    let mut list = MoveList::new();
    generate_pseudo_legal(p, &mut list);
    let mut total = 0;
    for m in list {
        if !is_legal(p, m) {
            continue;
        }
        do_move(p, m);
        let n = if depth <= 1 { 1 } else { perft(p, depth - 1) };
        undo_move(p, m);
        println!("{m}: {n}");
        total += n;
    }
    println!("total: {total}");
    total
}
