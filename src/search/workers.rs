//! The worker pool and its shared context: transposition, pawn and material
//! tables, the stop flag, the helper-start gate, and the move-in-progress
//! set that keeps workers off each other's subtrees.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::board::{Color, Position};
use crate::config::Params;
use crate::eval::material::MaterialTable;
use crate::eval::pawns::PawnTable;
use crate::moves::types::Move;
use crate::search::tt::TranspositionTable;
use crate::search::SearchWorker;

const BUSY_SET_SIZE: usize = 1 << 20;
const PAWN_TABLE_MB: usize = 10;
const MATERIAL_TABLE_MB: usize = 50;

/// Search limits handed down from the driver.
#[derive(Debug, Clone, Copy, Default)]
pub struct Limits {
    pub wtime: u64,
    pub btime: u64,
    pub winc: u64,
    pub binc: u64,
    pub movestogo: u64,
    pub movetime: u64,
    pub depth: u32,
    pub nodes: u64,
    pub mate: u32,
    pub infinite: bool,
    pub ponder: bool,
}

/// Process-wide engine state. Built once before any worker launches and
/// borrowed by all of them; the caches inside are safe to share.
pub struct EngineContext {
    pub tt: TranspositionTable,
    pub pawn_table: PawnTable,
    pub material_table: MaterialTable,
    stop: AtomicBool,
    searching: AtomicBool,
    helper_gate: Mutex<bool>,
    helper_cv: Condvar,
    bestmoves: Mutex<[Move; 2]>,
    busy_moves: Vec<AtomicBool>,
}

impl EngineContext {
    pub fn new(params: &Params) -> EngineContext {
        let mut busy = Vec::with_capacity(BUSY_SET_SIZE);
        busy.resize_with(BUSY_SET_SIZE, || AtomicBool::new(false));
        EngineContext {
            tt: TranspositionTable::new(params.hash_mb),
            pawn_table: PawnTable::new(PAWN_TABLE_MB),
            material_table: MaterialTable::new(MATERIAL_TABLE_MB),
            stop: AtomicBool::new(false),
            searching: AtomicBool::new(false),
            helper_gate: Mutex::new(false),
            helper_cv: Condvar::new(),
            bestmoves: Mutex::new([Move::NONE; 2]),
            busy_moves: busy,
        }
    }

    #[inline(always)]
    pub fn stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    #[inline(always)]
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    pub fn is_searching(&self) -> bool {
        self.searching.load(Ordering::Relaxed)
    }

    pub fn publish_bestmove(&self, best: Move, ponder: Move) {
        if let Ok(mut g) = self.bestmoves.lock() {
            *g = [best, ponder];
        }
    }

    pub fn bestmove(&self) -> (Move, Move) {
        let g = self.bestmoves.lock().map(|g| *g).unwrap_or([Move::NONE; 2]);
        (g[0], g[1])
    }

    /// Wake every helper worker blocked on the start gate.
    pub fn release_helpers(&self) {
        if let Ok(mut g) = self.helper_gate.lock() {
            if !*g {
                *g = true;
                self.helper_cv.notify_all();
            }
        }
    }

    fn await_helper_gate(&self) {
        let Ok(mut g) = self.helper_gate.lock() else {
            return;
        };
        while !*g && !self.stopped() {
            let (guard, timeout) = match self.helper_cv.wait_timeout(g, Duration::from_millis(10)) {
                Ok(pair) => pair,
                Err(_) => return,
            };
            g = guard;
            let _ = timeout;
        }
    }

    #[inline(always)]
    fn busy_index(&self, key: u64, m: Move) -> usize {
        let tag = u64::from(m.from.index())
            | (u64::from(m.to.index()) << 8)
            | ((m.kind as u64) << 16);
        (key.wrapping_mul(tag | 1) & (BUSY_SET_SIZE as u64 - 1)) as usize
    }

    #[inline(always)]
    pub fn is_move_busy(&self, key: u64, m: Move) -> bool {
        self.busy_moves[self.busy_index(key, m)].load(Ordering::Relaxed)
    }

    #[inline(always)]
    pub fn mark_move_busy(&self, key: u64, m: Move, busy: bool) {
        self.busy_moves[self.busy_index(key, m)].store(busy, Ordering::Relaxed);
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SearchReport {
    pub best_move: Move,
    pub ponder: Move,
    pub score: i32,
    pub depth: u32,
    pub nodes: u64,
    pub qnodes: u64,
    pub elapsed: Duration,
}

/// Per-move budget. Fixed movetime wins; a repeating time control divides by
/// the moves left; sudden death spends about a ninth of the remainder.
pub fn allocate_time(p: &Position, lims: &Limits) -> Option<Duration> {
    if lims.infinite || lims.ponder || lims.depth > 0 {
        return None;
    }
    if lims.movetime > 0 {
        return Some(Duration::from_millis(lims.movetime));
    }
    let remaining = if p.stm() == Color::White {
        lims.wtime + lims.winc
    } else {
        lims.btime + lims.binc
    };
    if remaining == 0 {
        return None;
    }
    let budget_ms = if lims.movestogo > 0 {
        remaining as f64 / lims.movestogo as f64
    } else {
        2.5 * remaining as f64 / 22.5
    };
    Some(Duration::from_millis(budget_ms.max(1.0) as u64))
}

/// Run a full search: clone the root per worker, start the timer thread and
/// the master, gate the helpers on the master's thread-depth signal, join
/// everyone, and read the master's answer back out.
pub fn start_search(
    ctx: &EngineContext,
    root: &Position,
    lims: &Limits,
    silent: bool,
) -> SearchReport {
    ctx.stop.store(false, Ordering::Relaxed);
    ctx.searching.store(true, Ordering::Relaxed);
    ctx.publish_bestmove(Move::NONE, Move::NONE);
    if let Ok(mut g) = ctx.helper_gate.lock() {
        *g = false;
    }

    let n_workers = root.params.threads.max(1);
    let max_depth = if lims.depth > 0 {
        lims.depth
    } else {
        crate::search::MAX_DEPTH
    };
    let budget = allocate_time(root, lims);
    let started = Instant::now();

    let mut workers: Vec<SearchWorker> = (0..n_workers)
        .map(|i| {
            let mut p = root.clone();
            p.set_id(i as u16);
            SearchWorker::new(ctx, p)
        })
        .collect();

    thread::scope(|s| {
        // timer: poll the clock in small steps and raise the stop flag
        s.spawn(|| {
            loop {
                if ctx.stopped() {
                    break;
                }
                if let Some(limit) = budget {
                    if started.elapsed() >= limit {
                        debug!("time budget exhausted, stopping search");
                        ctx.request_stop();
                        break;
                    }
                }
                thread::sleep(Duration::from_millis(1));
            }
        });

        let mut rest = workers.iter_mut();
        let master = rest.next().expect("at least one worker");
        for helper in rest {
            s.spawn(move || {
                ctx.await_helper_gate();
                if !ctx.stopped() {
                    helper.iterative_deepening(max_depth, true);
                }
            });
        }

        s.spawn(move || {
            master.iterative_deepening(max_depth, silent);
            ctx.request_stop();
            ctx.release_helpers();
        });
    });

    ctx.searching.store(false, Ordering::Relaxed);

    let mut nodes = 0;
    let mut qnodes = 0;
    for w in &workers {
        nodes += w.pos.nodes;
        qnodes += w.pos.qnodes;
    }

    let (best_move, ponder) = ctx.bestmove();
    SearchReport {
        best_move,
        ponder,
        score: workers[0].last_score,
        depth: workers[0].completed_depth,
        nodes,
        qnodes,
        elapsed: started.elapsed(),
    }
}
