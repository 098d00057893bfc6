use std::path::PathBuf;
use std::sync::Arc;

use skirmish::board::Position;
use skirmish::config::{Params, DEFAULT_PARAM_FILE};
use skirmish::search::workers::EngineContext;
use skirmish::uci::{Uci, ENGINE_NAME};

fn main() {
    skirmish::logger::init("logs/skirmish.log", "info");

    // `-param <file>` selects the tuning file; everything else is UCI
    let mut param_file = PathBuf::from(DEFAULT_PARAM_FILE);
    let args: Vec<String> = std::env::args().collect();
    let mut i = 1;
    while i + 1 < args.len() {
        if args[i] == "-param" {
            param_file = PathBuf::from(&args[i + 1]);
        }
        i += 2;
    }

    let params = Params::load(&param_file);

    println!("{ENGINE_NAME}");

    let ctx = Arc::new(EngineContext::new(&params));
    let mut pos = Position::new();
    pos.params = params;

    let mut uci = Uci::new(ctx, pos);
    uci.run();
}
