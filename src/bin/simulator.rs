//! Skirmish Headless Duel Simulator
//!
//! Runs seeded auto-play duels through the real engine and prints outcome
//! statistics, for balance checks of combat tuning and the XP curve.
//!
//! Usage:
//!   cargo run --bin simulator -- [OPTIONS]
//!
//! Options:
//!   --duels N       Duels to run (default: 200)
//!   --seed N        RNG seed (default: 42)
//!   --mode MODE     pve or pvp (default: pve)
//!   --level N       Attacker level (default: 1)
//!   --vs-level N    Defender level for pvp (default: same as --level)
//!   --mob NAME      Fixed PvE opponent (default: picked by level)
//!   --config FILE   JSON engine config
//!   --quiet         Only final summary line

use std::sync::Arc;

use skirmish::combat::types::{EndReason, Mode, ParticipantId};
use skirmish::core::clock::{Clock, ManualClock};
use skirmish::core::config::EngineConfig;
use skirmish::engine::Engine;
use skirmish::progression::{ProgressionCurve, ProgressionRecord};
use skirmish::records::{InMemoryPlayerRecords, PlayerRecords};
use tracing_subscriber::EnvFilter;

// ── CLI Configuration ────────────────────────────────────────────────

struct SimConfig {
    duels: u32,
    seed: u64,
    mode: Mode,
    level: u32,
    vs_level: Option<u32>,
    mob: Option<String>,
    config_path: Option<String>,
    quiet: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            duels: 200,
            seed: 42,
            mode: Mode::PvE,
            level: 1,
            vs_level: None,
            mob: None,
            config_path: None,
            quiet: false,
        }
    }
}

fn next_value<'a>(args: &'a [String], i: &mut usize, flag: &str) -> Result<&'a str, String> {
    *i += 1;
    args.get(*i)
        .map(String::as_str)
        .ok_or_else(|| format!("{flag} requires a value"))
}

fn next_number<T: std::str::FromStr>(args: &[String], i: &mut usize, flag: &str) -> Result<T, String> {
    next_value(args, i, flag)?
        .parse()
        .map_err(|_| format!("{flag} requires a number"))
}

fn parse_args() -> Result<SimConfig, String> {
    let args: Vec<String> = std::env::args().collect();
    let mut config = SimConfig::default();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--duels" => config.duels = next_number(&args, &mut i, "--duels")?,
            "--seed" => config.seed = next_number(&args, &mut i, "--seed")?,
            "--level" => config.level = next_number(&args, &mut i, "--level")?,
            "--vs-level" => config.vs_level = Some(next_number(&args, &mut i, "--vs-level")?),
            "--mode" => {
                config.mode = match next_value(&args, &mut i, "--mode")? {
                    "pve" => Mode::PvE,
                    "pvp" => Mode::PvPAsync,
                    other => return Err(format!("unknown mode '{other}' (expected pve or pvp)")),
                }
            }
            "--mob" => config.mob = Some(next_value(&args, &mut i, "--mob")?.to_string()),
            "--config" => {
                config.config_path = Some(next_value(&args, &mut i, "--config")?.to_string())
            }
            "--quiet" => config.quiet = true,
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            other => return Err(format!("Unknown argument: {other}")),
        }
        i += 1;
    }
    Ok(config)
}

fn print_usage() {
    eprintln!(
        "Skirmish Headless Duel Simulator\n\
         \n\
         Usage: simulator [OPTIONS]\n\
         \n\
         Options:\n\
         \x20 --duels N       Duels to run (default: 200)\n\
         \x20 --seed N        RNG seed (default: 42)\n\
         \x20 --mode MODE     pve or pvp (default: pve)\n\
         \x20 --level N       Attacker level (default: 1)\n\
         \x20 --vs-level N    Defender level for pvp (default: same as --level)\n\
         \x20 --mob NAME      Fixed PvE opponent (default: picked by level)\n\
         \x20 --config FILE   JSON engine config\n\
         \x20 --quiet         Only final summary line\n\
         \x20 --help, -h      Show this help"
    );
}

// ── Simulation Statistics ────────────────────────────────────────────

#[derive(Default)]
struct SimStats {
    wins: u32,
    losses: u32,
    draws: u32,
    surrenders: u32,
    total_rounds: u64,
    xp_gained: i64,
    level_ups: u32,
}

impl SimStats {
    fn duels(&self) -> u32 {
        self.wins + self.losses + self.draws
    }

    fn rate(&self, count: u32) -> f64 {
        if self.duels() == 0 {
            0.0
        } else {
            count as f64 * 100.0 / self.duels() as f64
        }
    }
}

/// Record for a player who has just reached `level`.
fn record_at_level(curve: &ProgressionCurve, curve_factor: f64, level: u32) -> ProgressionRecord {
    let start = ProgressionRecord::with_base(curve.base_xp, curve_factor);
    let xp: u64 = (1..level.max(1)).map(|l| curve.xp_to_next(l, curve_factor)).sum();
    curve.apply_xp_delta(&start, xp as i64).record
}

fn run_simulation(sim: &SimConfig, config: EngineConfig) -> Result<(SimStats, Engine), String> {
    let records = Arc::new(InMemoryPlayerRecords::with_curve_factor(config.curve_factor));
    let clock = Arc::new(ManualClock::new(0));
    let curve = ProgressionCurve::new(config.base_xp_to_next);
    let shield = config.shield_duration_seconds;
    let max_turns = config.max_turns;

    let attacker = ParticipantId::new("attacker");
    let defender = ParticipantId::new("defender");
    let vs_level = sim.vs_level.unwrap_or(sim.level);
    let setup = [(&attacker, sim.level), (&defender, vs_level)];
    for (id, level) in setup {
        let record = record_at_level(&curve, config.curve_factor, level);
        records.save_progression(id, &record).map_err(|e| e.to_string())?;
    }

    let engine = Engine::new(config, records.clone(), clock.clone()).with_seed(sim.seed);
    let mob = sim.mob.as_deref().map(ParticipantId::mob);
    let target = match sim.mode {
        Mode::PvE => mob.as_ref(),
        _ => Some(&defender),
    };

    let mut stats = SimStats::default();
    for duel in 0..sim.duels {
        let session = engine
            .create_session(sim.mode, &attacker, target)
            .map_err(|e| e.to_string())?;
        engine
            .set_auto_mode(&session.id, &attacker, true)
            .map_err(|e| e.to_string())?;
        let run = engine
            .run_auto(&session.id, &attacker, max_turns)
            .map_err(|e| e.to_string())?;
        let finished = run.session;

        match finished.winner.as_ref() {
            Some(winner) if *winner == attacker => stats.wins += 1,
            Some(_) => stats.losses += 1,
            None => stats.draws += 1,
        }
        if finished.end_reason == Some(EndReason::Surrender) {
            stats.surrenders += 1;
        }
        stats.total_rounds += run.rounds as u64;

        let outcome = engine.apply_reward(&finished).map_err(|e| e.to_string())?;
        for delta in outcome.progression.iter().filter(|d| d.participant == attacker) {
            stats.xp_gained += delta.xp_delta;
            if delta.change.leveled_up {
                stats.level_ups += delta.change.levels_changed.max(0) as u32;
            }
        }
        engine.end_session(&finished.id);

        if !sim.quiet && (duel + 1) % 50 == 0 {
            eprintln!("  {} duels done", duel + 1);
        }
        // Let any post-loss shield lapse before the next raid
        clock.advance(shield + 1);
    }

    tracing::debug!("simulation finished at clock {}", clock.now());
    Ok((stats, engine))
}

fn print_summary(sim: &SimConfig, stats: &SimStats, engine: &Engine) -> Result<(), String> {
    println!("═══ Duel Summary (seed={}) ═══", sim.seed);
    println!(
        "  Duels: {}  W/L/D: {}/{}/{}  ({:.1}% win, {:.1}% draw)",
        stats.duels(),
        stats.wins,
        stats.losses,
        stats.draws,
        stats.rate(stats.wins),
        stats.rate(stats.draws),
    );
    if stats.duels() > 0 {
        println!(
            "  Avg rounds: {:.1}  Surrenders: {}",
            stats.total_rounds as f64 / stats.duels() as f64,
            stats.surrenders
        );
    }
    println!(
        "  Attacker XP delta: {}  Level ups: {}",
        stats.xp_gained, stats.level_ups
    );

    if sim.mode != Mode::PvE {
        for entry in engine.leaderboard(2).map_err(|e| e.to_string())? {
            println!(
                "  #{} {:<10} elo={} ({}) W{} L{}",
                entry.rank, entry.participant, entry.elo, entry.tier, entry.wins, entry.losses
            );
        }
    }
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let sim = match parse_args() {
        Ok(sim) => sim,
        Err(msg) => {
            eprintln!("{msg}");
            print_usage();
            std::process::exit(1);
        }
    };

    let config = match &sim.config_path {
        Some(path) => match EngineConfig::from_json_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load config {path}: {e}");
                std::process::exit(1);
            }
        },
        None => EngineConfig::default(),
    };

    if !sim.quiet {
        eprintln!(
            "Skirmish Simulator: {} {:?} duel(s), seed={}, level={}",
            sim.duels, sim.mode, sim.seed, sim.level
        );
    }

    let result = run_simulation(&sim, config)
        .and_then(|(stats, engine)| print_summary(&sim, &stats, &engine));
    if let Err(msg) = result {
        eprintln!("Simulation failed: {msg}");
        std::process::exit(1);
    }
}
