//! UCI surface: a line-oriented command loop that owns the root position and
//! launches searches on a background thread, plus the debugging commands
//! (`d`, `eval`, `perft`, `divide`, `see`, `bench`) and the EPD bench runner.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::str::FromStr;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use tracing::{info, warn};

use crate::board::{Piece, Position, START_FEN};
use crate::eval;
use crate::moves::execute::{do_move, generate_legal};
use crate::moves::movegen::MoveList;
use crate::moves::perft::{divide, perft};
use crate::moves::types::Move;
use crate::search::see::see;
use crate::search::workers::{start_search, EngineContext, Limits};

pub const ENGINE_NAME: &str = "skirmish";

pub struct Uci {
    ctx: Arc<EngineContext>,
    pos: Position,
    search_thread: Option<JoinHandle<()>>,
}

impl Uci {
    pub fn new(ctx: Arc<EngineContext>, pos: Position) -> Uci {
        Uci {
            ctx,
            pos,
            search_thread: None,
        }
    }

    /// Read stdin until `quit` or end of input.
    pub fn run(&mut self) {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if !self.handle(line.trim()) {
                break;
            }
        }
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.ctx.request_stop();
        self.join_search();
    }

    fn join_search(&mut self) {
        if let Some(h) = self.search_thread.take() {
            let _ = h.join();
        }
    }

    /// Dispatch a single command line. Returns false on `quit`.
    pub fn handle(&mut self, line: &str) -> bool {
        let mut parts = line.split_whitespace();
        let Some(cmd) = parts.next() else { return true };
        let rest: Vec<&str> = parts.collect();

        match cmd {
            "uci" => {
                self.ctx.tt.clear();
                println!("id name {ENGINE_NAME}");
                println!("uciok");
            }
            "isready" => {
                self.ctx.tt.clear();
                println!("readyok");
            }
            "ucinewgame" => {
                self.ctx.tt.clear();
            }
            "position" => self.cmd_position(&rest),
            "go" => self.cmd_go(&rest),
            "stop" => self.ctx.request_stop(),
            "d" | "display" => println!("{}", self.pos),
            "fen" => println!("{}", self.pos.to_fen()),
            "eval" => {
                let v = eval::evaluate(
                    &self.pos,
                    &self.ctx.pawn_table,
                    &self.ctx.material_table,
                    -1.0,
                );
                println!("evaluation: {v:.1}");
            }
            "moves" => {
                let mut list = MoveList::new();
                generate_legal(&self.pos, &mut list);
                let line: Vec<String> = list.iter().map(|m| m.to_string()).collect();
                println!("{}", line.join(" "));
            }
            "perft" => {
                if let Some(depth) = rest.first().and_then(|t| t.parse().ok()) {
                    let tic = Instant::now();
                    let mut p = self.pos.clone();
                    let nodes = perft(&mut p, depth);
                    let ms = tic.elapsed().as_millis().max(1);
                    println!(
                        "perft({depth}) = {nodes} in {ms}ms ({} knps)",
                        nodes as u128 / ms
                    );
                }
            }
            "divide" => {
                if let Some(depth) = rest.first().and_then(|t| t.parse().ok()) {
                    let mut p = self.pos.clone();
                    divide(&mut p, depth);
                }
            }
            "see" => {
                if let Some(token) = rest.first() {
                    match self.find_move(token) {
                        Some(m) => println!("see score: {}", see(&self.pos, m)),
                        None => println!("{token} is not a legal move"),
                    }
                }
            }
            "bench" | "test" => {
                let path = rest
                    .iter()
                    .find(|t| t.ends_with(".epd"))
                    .copied()
                    .unwrap_or("bench.epd");
                let movetime = rest
                    .iter()
                    .find_map(|t| t.parse::<u64>().ok())
                    .unwrap_or(1000);
                self.run_epd(path, movetime);
            }
            "quit" | "exit" => return false,
            other => println!("unknown command: {other}"),
        }
        true
    }

    fn cmd_position(&mut self, parts: &[&str]) {
        let moves_idx = parts.iter().position(|&t| t == "moves");
        let setup = &parts[..moves_idx.unwrap_or(parts.len())];

        let parsed = match setup.first() {
            Some(&"startpos") | None => Position::from_str(START_FEN),
            Some(&"fen") => Position::from_str(&setup[1..].join(" ")),
            _ => Position::from_str(&setup.join(" ")),
        };
        match parsed {
            Ok(mut p) => {
                p.params = self.pos.params.clone();
                self.pos = p;
            }
            Err(e) => {
                warn!(error = e, "dropping unparseable position command");
                return;
            }
        }

        if let Some(idx) = moves_idx {
            for token in &parts[idx + 1..] {
                match self.find_move(token) {
                    Some(m) => do_move(&mut self.pos, m),
                    None => {
                        // keep the position reached so far
                        warn!(token, "unreachable move in position command");
                        break;
                    }
                }
            }
        }
    }

    /// Match a long-algebraic token against the legal moves.
    fn find_move(&self, token: &str) -> Option<Move> {
        let mut list = MoveList::new();
        generate_legal(&self.pos, &mut list);
        list.iter().copied().find(|m| m.to_string() == token)
    }

    fn cmd_go(&mut self, parts: &[&str]) {
        if self.ctx.is_searching() {
            return;
        }
        self.join_search();

        let mut lims = Limits::default();
        let mut i = 0;
        while i < parts.len() {
            let value = parts.get(i + 1).and_then(|t| t.parse::<u64>().ok());
            match (parts[i], value) {
                ("wtime", Some(v)) => lims.wtime = v,
                ("btime", Some(v)) => lims.btime = v,
                ("winc", Some(v)) => lims.winc = v,
                ("binc", Some(v)) => lims.binc = v,
                ("movestogo", Some(v)) => lims.movestogo = v,
                ("movetime", Some(v)) => lims.movetime = v,
                ("nodes", Some(v)) => lims.nodes = v,
                ("depth", Some(v)) => lims.depth = v as u32,
                ("mate", Some(v)) => lims.mate = v as u32,
                ("infinite", _) => {
                    lims.infinite = true;
                    i += 1;
                    continue;
                }
                ("ponder", _) => {
                    lims.ponder = true;
                    i += 1;
                    continue;
                }
                _ => {
                    i += 1;
                    continue;
                }
            }
            i += 2;
        }

        let ctx = Arc::clone(&self.ctx);
        let pos = self.pos.clone();
        self.search_thread = Some(std::thread::spawn(move || {
            let report = start_search(&ctx, &pos, &lims, false);
            if report.best_move.is_none() {
                println!("bestmove 0000");
            } else if report.ponder.is_none() {
                println!("bestmove {}", report.best_move);
            } else {
                println!("bestmove {} ponder {}", report.best_move, report.ponder);
            }
        }));
    }

    /// `<FEN tokens> bm <SAN move> ; ...`, one position per line; bad lines
    /// are logged and skipped.
    fn run_epd(&mut self, path: &str, movetime: u64) {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) => {
                println!("cannot open epd file {path}: {e}");
                return;
            }
        };

        let mut solved = 0u32;
        let mut total = 0u32;
        let mut nodes = 0u64;
        let tic = Instant::now();

        for line in BufReader::new(file).lines() {
            let Ok(line) = line else { break };
            let Some(bm_at) = line.find(" bm ") else {
                if !line.trim().is_empty() {
                    info!(line, "skipping epd line without bm opcode");
                }
                continue;
            };
            let fen = line[..bm_at].trim();
            let rest = &line[bm_at + 4..];
            let san = rest.split(';').next().unwrap_or("").trim();

            let pos = match Position::from_str(fen) {
                Ok(mut p) => {
                    p.params = self.pos.params.clone();
                    p
                }
                Err(e) => {
                    warn!(error = e, fen, "skipping epd line");
                    continue;
                }
            };

            let expected = san_to_uci(&pos, san);
            let lims = Limits {
                movetime,
                ..Limits::default()
            };
            let report = start_search(&self.ctx, &pos, &lims, true);
            nodes += report.nodes + report.qnodes;

            total += 1;
            let got = report.best_move.to_string();
            let pass = expected.as_deref() == Some(got.as_str());
            if pass {
                solved += 1;
            }
            println!(
                "{:3} {} expected {} got {}",
                total,
                if pass { "ok  " } else { "FAIL" },
                expected.unwrap_or_else(|| san.to_string()),
                got
            );
        }

        let secs = tic.elapsed().as_secs_f64().max(0.001);
        println!("solved {solved}/{total}");
        println!("nodes {nodes} ({:.0} knps)", nodes as f64 / secs / 1000.0);
    }
}

/// Resolve a SAN token against the position's legal moves. Handles castling,
/// captures, promotions, and file/rank disambiguation; check marks are
/// stripped.
pub fn san_to_uci(pos: &Position, san: &str) -> Option<String> {
    let mut list = MoveList::new();
    generate_legal(pos, &mut list);

    let clean: String = san
        .chars()
        .filter(|&c| c != '+' && c != '#' && c != 'x')
        .collect();

    if clean == "O-O" || clean == "0-0" {
        return list
            .iter()
            .find(|m| m.kind == crate::moves::types::MoveKind::CastleKs)
            .map(|m| m.to_string());
    }
    if clean == "O-O-O" || clean == "0-0-0" {
        return list
            .iter()
            .find(|m| m.kind == crate::moves::types::MoveKind::CastleQs)
            .map(|m| m.to_string());
    }

    let (clean, promo) = match clean.split_once('=') {
        Some((head, tail)) => (head.to_string(), tail.chars().next()),
        None => (clean, None),
    };
    if clean.len() < 2 {
        return None;
    }

    let target: crate::square::Square = clean[clean.len() - 2..].parse().ok()?;
    let first = clean.chars().next()?;
    let piece = match first {
        'N' => Piece::Knight,
        'B' => Piece::Bishop,
        'R' => Piece::Rook,
        'Q' => Piece::Queen,
        'K' => Piece::King,
        _ => Piece::Pawn,
    };

    let disambig = if piece == Piece::Pawn {
        if clean.len() > 2 {
            clean.chars().next()
        } else {
            None
        }
    } else {
        clean[1..clean.len() - 2].chars().next()
    };

    list.iter()
        .find(|m| {
            if m.to != target {
                return false;
            }
            if pos.piece_on(m.from) != Some(piece) {
                return false;
            }
            match promo {
                Some(want) => {
                    let got = match m.promo_piece() {
                        Some(Piece::Queen) => 'Q',
                        Some(Piece::Rook) => 'R',
                        Some(Piece::Bishop) => 'B',
                        Some(Piece::Knight) => 'N',
                        _ => ' ',
                    };
                    if got != want.to_ascii_uppercase() {
                        return false;
                    }
                }
                None => {
                    if m.is_promotion() && m.promo_piece() != Some(Piece::Queen) {
                        return false;
                    }
                }
            }
            match disambig {
                Some(d) if d.is_ascii_lowercase() => m.from.file() == d as u8 - b'a',
                Some(d) if d.is_ascii_digit() => m.from.rank() == d as u8 - b'1',
                _ => true,
            }
        })
        .map(|m| m.to_string())
}
