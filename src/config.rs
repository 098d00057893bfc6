//! Tuneable engine parameters and the line-oriented `key:value` file that
//! overrides them. Unknown keys are ignored with a log line; malformed lines
//! are skipped.

use std::fs;
use std::path::Path;

use tracing::{info, warn};

pub const DEFAULT_PARAM_FILE: &str = "engine.conf";

#[derive(Debug, Clone)]
pub struct Params {
    pub tempo: f32,

    /// Square-score scale per piece type.
    pub sq_score_scaling: [f32; 6],
    /// Mobility scale, pawn..queen.
    pub mobility_scaling: [f32; 5],
    /// Attack scale, pawn..queen.
    pub attack_scaling: [f32; 5],
    /// Divisors applied to the mobility of a pinned piece.
    pub pinned_scaling: [f32; 5],

    /// Value of attacking [pawn, knight, bishop, rook, queen], per attacker.
    pub knight_attks: [f32; 5],
    pub bishop_attks: [f32; 5],
    pub rook_attks: [f32; 5],
    pub queen_attks: [f32; 5],

    pub trapped_rook_penalty: [f32; 2],
    pub attk_queen_bonus: [f32; 5],

    pub knight_outpost_bonus: [f32; 8],
    pub bishop_outpost_bonus: [f32; 8],

    /// King-zone harassment by number of attacked zone squares.
    pub knight_king: [f32; 3],
    pub bishop_king: [f32; 3],
    pub rook_king: [f32; 5],
    pub queen_king: [f32; 7],
    /// Quadratic-ish severity by attacker count 0..4.
    pub attacker_weight: [f32; 5],
    pub king_shelter: [f32; 4],
    pub king_safe_sqs: [f32; 8],
    pub uncastled_penalty: f32,

    pub connected_rook_bonus: f32,
    pub doubled_bishop_bonus: f32,
    pub open_file_bonus: f32,
    pub bishop_open_center_bonus: f32,
    pub bishop_color_complex_penalty: f32,
    pub rook_7th_bonus: f32,

    pub doubled_pawn_penalty: f32,
    pub backward_pawn_penalty: f32,
    pub isolated_pawn_penalty: f32,
    pub passed_pawn_bonus: f32,
    pub semi_open_pawn_penalty: f32,
    pub pawn_lever_score: [f32; 64],

    pub counter_move_bonus: f32,
    pub threat_evasion_bonus: f32,

    /// Fixed search depth override; negative means unset.
    pub fixed_depth: i32,
    pub threads: usize,
    pub thread_depth: u32,
    pub hash_mb: usize,
}

impl Default for Params {
    fn default() -> Params {
        Params {
            tempo: 0.3,
            sq_score_scaling: [1.0; 6],
            mobility_scaling: [1.0, 1.0, 1.0, 1.0, 0.0],
            attack_scaling: [1.0; 5],
            pinned_scaling: [1.0, 1.0, 2.0, 3.0, 4.0],
            knight_attks: [3.0, 9.0, 9.45, 14.4, 27.3],
            bishop_attks: [3.0, 9.0, 9.45, 14.4, 27.3],
            rook_attks: [1.5, 4.5, 4.725, 7.2, 13.65],
            queen_attks: [0.75, 2.25, 2.3625, 3.6, 6.825],
            trapped_rook_penalty: [1.0, 2.0],
            attk_queen_bonus: [2.0, 1.0, 1.0, 1.0, 0.0],
            knight_outpost_bonus: [0.0, 1.0, 2.0, 3.0, 3.0, 2.0, 1.0, 0.0],
            bishop_outpost_bonus: [0.0, 0.0, 1.0, 2.0, 2.0, 1.0, 0.0, 0.0],
            knight_king: [1.0, 2.0, 3.0],
            bishop_king: [1.0, 2.0, 3.0],
            rook_king: [1.0, 2.0, 3.0, 3.0, 4.0],
            queen_king: [1.0, 3.0, 3.0, 4.0, 4.0, 5.0, 6.0],
            attacker_weight: [0.5, 4.0, 8.0, 16.0, 32.0],
            king_shelter: [-3.0, -2.0, 2.0, 3.0],
            king_safe_sqs: [-4.0, -2.0, -1.0, 0.0, 0.0, 1.0, 2.0, 4.0],
            uncastled_penalty: 5.0,
            connected_rook_bonus: 1.0,
            doubled_bishop_bonus: 4.0,
            open_file_bonus: 1.0,
            bishop_open_center_bonus: 1.0,
            bishop_color_complex_penalty: 1.0,
            rook_7th_bonus: 2.0,
            doubled_pawn_penalty: 4.0,
            backward_pawn_penalty: 1.0,
            isolated_pawn_penalty: 2.0,
            passed_pawn_bonus: 2.0,
            semi_open_pawn_penalty: 1.0,
            pawn_lever_score: lever_table(),
            counter_move_bonus: 100.0,
            threat_evasion_bonus: 100.0,
            fixed_depth: -1,
            threads: 4,
            thread_depth: 6,
            hash_mb: 384,
        }
    }
}

fn lever_table() -> [f32; 64] {
    let mut t = [0.0f32; 64];
    for (s, v) in t.iter_mut().enumerate() {
        let file = s & 7;
        *v = 1.0 + file.min(7 - file) as f32;
    }
    t
}

const PIECE_KEYS: [&str; 6] = ["pawn", "knight", "bishop", "rook", "queen", "king"];

impl Params {
    /// Read overrides from a `key:value` parameter file. A missing file is
    /// fine (defaults apply); bad lines and unknown keys only log.
    pub fn load(path: &Path) -> Params {
        let mut params = Params::default();
        let text = match fs::read_to_string(path) {
            Ok(t) => t,
            Err(_) => {
                info!(?path, "no parameter file, using defaults");
                return params;
            }
        };

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once(':') else {
                warn!(line, "skipping malformed parameter line");
                continue;
            };
            let (key, value) = (key.trim(), value.trim());
            let Ok(v) = value.parse::<f32>() else {
                warn!(line, "skipping non-numeric parameter value");
                continue;
            };
            if !params.apply(key, v) {
                warn!(key, "ignoring unknown parameter");
            }
        }
        params
    }

    fn apply(&mut self, key: &str, v: f32) -> bool {
        if let Some(rest) = key.strip_prefix("sq_score_scaling_") {
            return set_indexed(&mut self.sq_score_scaling, rest, &PIECE_KEYS, v);
        }
        if let Some(rest) = key.strip_prefix("mobility_scaling_") {
            return set_indexed(&mut self.mobility_scaling, rest, &PIECE_KEYS[..5], v);
        }
        if let Some(rest) = key.strip_prefix("attack_scaling_") {
            return set_indexed(&mut self.attack_scaling, rest, &PIECE_KEYS[..5], v);
        }
        if let Some(rest) = key.strip_prefix("pinned_scaling_") {
            return set_indexed(&mut self.pinned_scaling, rest, &PIECE_KEYS[..5], v);
        }
        if let Some(rest) = key.strip_prefix("attacker_weight_") {
            return set_numbered(&mut self.attacker_weight, rest, v);
        }
        if let Some(rest) = key.strip_prefix("king_shelter_") {
            return set_numbered(&mut self.king_shelter, rest, v);
        }
        if let Some(rest) = key.strip_prefix("king_safe_sqs_") {
            return set_numbered(&mut self.king_safe_sqs, rest, v);
        }
        match key {
            "tempo" => self.tempo = v,
            "uncastled_penalty" => self.uncastled_penalty = v,
            "connected_rook_bonus" => self.connected_rook_bonus = v,
            "doubled_bishop_bonus" => self.doubled_bishop_bonus = v,
            "open_file_bonus" => self.open_file_bonus = v,
            "bishop_open_center_bonus" => self.bishop_open_center_bonus = v,
            "bishop_color_complex_penalty" => self.bishop_color_complex_penalty = v,
            "rook_7th_bonus" => self.rook_7th_bonus = v,
            "doubled_pawn_penalty" => self.doubled_pawn_penalty = v,
            "backward_pawn_penalty" => self.backward_pawn_penalty = v,
            "isolated_pawn_penalty" => self.isolated_pawn_penalty = v,
            "passed_pawn_bonus" => self.passed_pawn_bonus = v,
            "semi_open_pawn_penalty" => self.semi_open_pawn_penalty = v,
            "counter_move_bonus" => self.counter_move_bonus = v,
            "threat_evasion_bonus" => self.threat_evasion_bonus = v,
            "fixed_depth" => self.fixed_depth = v as i32,
            "threads" => self.threads = (v as usize).max(1),
            "thread_depth" => self.thread_depth = v as u32,
            "hash_mb" => self.hash_mb = (v as usize).max(1),
            _ => return false,
        }
        true
    }
}

fn set_indexed(slot: &mut [f32], rest: &str, names: &[&str], v: f32) -> bool {
    match names.iter().position(|&n| n == rest) {
        Some(i) => {
            slot[i] = v;
            true
        }
        None => false,
    }
}

fn set_numbered(slot: &mut [f32], rest: &str, v: f32) -> bool {
    match rest.parse::<usize>() {
        Ok(i) if i < slot.len() => {
            slot[i] = v;
            true
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_sane() {
        let p = Params::default();
        assert_eq!(p.fixed_depth, -1);
        assert_eq!(p.threads, 4);
        assert!((p.tempo - 0.3).abs() < 1e-6);
        assert_eq!(p.pawn_lever_score[3], 4.0);
        assert_eq!(p.pawn_lever_score[7], 1.0);
    }

    #[test]
    fn loads_overrides_and_skips_junk() {
        let dir = std::env::temp_dir().join("skirmish-config-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("engine.conf");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "tempo:0.5").unwrap();
        writeln!(f, "mobility_scaling_knight:2.0").unwrap();
        writeln!(f, "attacker_weight_2:9.0").unwrap();
        writeln!(f, "not a line at all").unwrap();
        writeln!(f, "mystery_key:1.0").unwrap();
        drop(f);

        let p = Params::load(&path);
        assert!((p.tempo - 0.5).abs() < 1e-6);
        assert_eq!(p.mobility_scaling[1], 2.0);
        assert_eq!(p.attacker_weight[2], 9.0);
        // untouched defaults survive
        assert_eq!(p.threads, 4);
    }

    #[test]
    fn missing_file_gives_defaults() {
        let p = Params::load(Path::new("/definitely/not/here.conf"));
        assert_eq!(p.fixed_depth, -1);
    }
}
