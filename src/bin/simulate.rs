use chrono::{SecondsFormat, Utc};
use clap::Parser;
use packer_engine::config::EngineConfig;
use packer_engine::constants::TICK_MS;
use packer_engine::engine::GameEngine;
use packer_engine::grid::{Grid, Passage};
use packer_engine::types::{
    Direction, GameEvent, GhostState, InputCommand, Snapshot, Tile, TilePos,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::io;
use std::path::Path;
use std::path::PathBuf;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// JSON engine config; defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    single: bool,
    #[arg(long)]
    games: Option<u32>,
    #[arg(long)]
    seconds: Option<u64>,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long)]
    match_id: Option<String>,
    #[arg(long)]
    summary_out: Option<PathBuf>,
}

#[derive(Clone, Debug, Serialize)]
struct Scenario {
    name: String,
    games: u32,
    seconds: u64,
    seed: u32,
}

#[derive(Clone, Debug, Serialize)]
struct ScenarioResultLine {
    scenario: String,
    seed: u32,
    games: u32,
    seconds: u64,
    outcome: Outcome,
    #[serde(rename = "durationMs")]
    duration_ms: u64,
    #[serde(rename = "highScore")]
    high_score: u32,
    #[serde(rename = "bestLevel")]
    best_level: u32,
    #[serde(rename = "pelletsEaten")]
    pellets_eaten: u32,
    #[serde(rename = "ghostsEaten")]
    ghosts_eaten: u32,
    #[serde(rename = "livesLost")]
    lives_lost: u32,
    #[serde(rename = "levelsCleared")]
    levels_cleared: u32,
    #[serde(rename = "frightenedPhases")]
    frightened_phases: u32,
    anomalies: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum Outcome {
    GameOver,
    TimeLimit,
}

#[derive(Clone, Debug, Serialize)]
struct AnomalyRecord {
    tick: u64,
    message: String,
}

#[derive(Clone, Debug, Serialize)]
struct ScenarioRunResult {
    #[serde(flatten)]
    result: ScenarioResultLine,
    #[serde(rename = "anomalyRecords")]
    anomaly_records: Vec<AnomalyRecord>,
    finished_tick: u64,
}

#[derive(Clone, Debug, Serialize)]
struct RunSummary {
    #[serde(rename = "matchId")]
    match_id: String,
    #[serde(rename = "startedAt")]
    started_at: String,
    #[serde(rename = "finishedAt")]
    finished_at: String,
    #[serde(rename = "scenarioCount")]
    scenario_count: usize,
    #[serde(rename = "anomalyCount")]
    anomaly_count: usize,
    #[serde(rename = "averageDurationMs")]
    average_duration_ms: u64,
    #[serde(rename = "outcomeCounts")]
    outcome_counts: BTreeMap<String, usize>,
    scenarios: Vec<ScenarioResultLine>,
}

/// Previous-tick state the per-tick anomaly checks compare against.
#[derive(Clone, Debug)]
struct Watch {
    player: TilePos,
    ghosts: Vec<TilePos>,
    score: u32,
    pellets_remaining: u32,
}

impl Watch {
    fn of(snapshot: &Snapshot) -> Self {
        Self {
            player: TilePos::new(snapshot.player.x, snapshot.player.y),
            ghosts: snapshot
                .ghosts
                .iter()
                .map(|ghost| TilePos::new(ghost.x, ghost.y))
                .collect(),
            score: snapshot.score,
            pellets_remaining: snapshot.pellets_remaining,
        }
    }
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(message) => {
            error!(event = "config_load_failed", error = %message);
            std::process::exit(2);
        }
    };
    let scenarios = resolve_scenarios(&cli);
    let run_started_at = timestamp();
    let seed_hint = scenarios.first().map(|scenario| scenario.seed).unwrap_or(0);
    let match_id = cli
        .match_id
        .clone()
        .unwrap_or_else(|| default_match_id(seed_hint, Utc::now().timestamp_millis()));
    let mut has_anomaly = false;
    let mut scenario_results = Vec::new();
    let mut outcome_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut total_duration_ms = 0u64;
    let mut total_anomalies = 0usize;

    for scenario in scenarios {
        emit_log(
            Level::INFO,
            "scenario_started",
            &match_id,
            Some(&scenario.name),
            Some(scenario.seed),
            None,
            json!({
                "games": scenario.games,
                "seconds": scenario.seconds,
            }),
        );
        let scenario_run = match run_scenario(&scenario, &config) {
            Ok(run) => run,
            Err(message) => {
                emit_log(
                    Level::ERROR,
                    "scenario_failed",
                    &match_id,
                    Some(&scenario.name),
                    Some(scenario.seed),
                    None,
                    json!({ "error": message }),
                );
                std::process::exit(2);
            }
        };

        for anomaly in &scenario_run.anomaly_records {
            emit_log(
                Level::WARN,
                "anomaly_detected",
                &match_id,
                Some(&scenario.name),
                Some(scenario.seed),
                Some(anomaly.tick),
                json!({
                    "message": anomaly.message,
                }),
            );
        }

        if !scenario_run.result.anomalies.is_empty() {
            has_anomaly = true;
        }
        total_anomalies += scenario_run.anomaly_records.len();
        total_duration_ms += scenario_run.result.duration_ms;
        *outcome_counts
            .entry(outcome_key(scenario_run.result.outcome))
            .or_insert(0) += 1;

        emit_log(
            Level::INFO,
            "scenario_finished",
            &match_id,
            Some(&scenario.name),
            Some(scenario.seed),
            Some(scenario_run.finished_tick),
            json!({
                "outcome": scenario_run.result.outcome,
                "durationMs": scenario_run.result.duration_ms,
                "highScore": scenario_run.result.high_score,
                "anomalyCount": scenario_run.anomaly_records.len(),
            }),
        );

        match serde_json::to_string(&scenario_run.result) {
            Ok(line) => println!("{line}"),
            Err(err) => warn!(event = "result_serialize_failed", error = %err),
        }
        scenario_results.push(scenario_run.result);
    }

    let summary = build_run_summary(
        match_id.clone(),
        run_started_at,
        timestamp(),
        scenario_results,
        outcome_counts,
        total_anomalies,
        total_duration_ms,
    );

    let mut summary_out_written: Option<String> = None;
    if let Some(path) = cli.summary_out.as_ref() {
        if let Err(error) = write_summary(path, &summary) {
            emit_log(
                Level::ERROR,
                "summary_write_failed",
                &match_id,
                None,
                None,
                None,
                json!({
                    "path": path.to_string_lossy(),
                    "error": error.to_string(),
                }),
            );
            std::process::exit(2);
        }
        summary_out_written = Some(path.to_string_lossy().to_string());
    }

    emit_log(
        Level::INFO,
        "run_finished",
        &match_id,
        None,
        None,
        None,
        json!({
            "scenarioCount": summary.scenario_count,
            "anomalyCount": summary.anomaly_count,
            "averageDurationMs": summary.average_duration_ms,
            "outcomeCounts": summary.outcome_counts,
            "summaryOut": summary_out_written,
        }),
    );

    if has_anomaly {
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig, String> {
    match path {
        Some(path) => EngineConfig::from_file(path).map_err(|err| err.to_string()),
        None => {
            let mut config = EngineConfig::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }
}

fn run_scenario(scenario: &Scenario, base: &EngineConfig) -> Result<ScenarioRunResult, String> {
    let tick_limit = scenario.seconds * 1000 / TICK_MS;
    let mut anomalies = Vec::new();
    let mut anomaly_records = Vec::new();
    let mut anomaly_seen = HashSet::new();
    let mut high_score = 0u32;
    let mut best_level = 0u32;
    let mut pellets_eaten = 0u32;
    let mut ghosts_eaten = 0u32;
    let mut lives_lost = 0u32;
    let mut levels_cleared = 0u32;
    let mut frightened_phases = 0u32;
    let mut duration_ms = 0u64;
    let mut outcome = Outcome::GameOver;
    let mut last_tick = 0u64;

    for game in 0..scenario.games {
        let mut config = base.clone();
        config.seed = scenario.seed.wrapping_add(game);
        let starting_lives = config.starting_lives;
        let mut engine = GameEngine::new(config).map_err(|err| err.to_string())?;
        engine.carry_high_score(high_score);
        let mut watch = Watch::of(&engine.build_snapshot(false));
        let mut tick_safety = 0u64;

        while !engine.is_ended() {
            if let Some(dir) = autopilot(engine.grid(), engine.player_tile()) {
                engine.handle_input(InputCommand::Move(dir));
            }
            engine.step(TICK_MS);
            let snapshot = engine.build_snapshot(true);
            last_tick = snapshot.tick;
            for message in
                collect_snapshot_anomalies(&snapshot, &watch, engine.grid(), starting_lives)
            {
                push_anomaly(
                    &mut anomalies,
                    &mut anomaly_records,
                    &mut anomaly_seen,
                    snapshot.tick,
                    message,
                );
            }
            for event in &snapshot.events {
                match event {
                    GameEvent::PlayerCaught { .. } => lives_lost += 1,
                    GameEvent::LevelCleared { .. } => levels_cleared += 1,
                    GameEvent::FrightenedStarted { .. } => frightened_phases += 1,
                    _ => {}
                }
            }
            watch = Watch::of(&snapshot);

            tick_safety += 1;
            if tick_safety >= tick_limit {
                outcome = Outcome::TimeLimit;
                break;
            }
        }

        let summary = engine.build_summary();
        high_score = high_score.max(summary.high_score);
        best_level = best_level.max(summary.level);
        pellets_eaten += summary.pellets_eaten;
        ghosts_eaten += summary.ghosts_eaten;
        duration_ms += summary.duration_ms;
    }

    Ok(ScenarioRunResult {
        result: ScenarioResultLine {
            scenario: scenario.name.clone(),
            seed: scenario.seed,
            games: scenario.games,
            seconds: scenario.seconds,
            outcome,
            duration_ms,
            high_score,
            best_level,
            pellets_eaten,
            ghosts_eaten,
            lives_lost,
            levels_cleared,
            frightened_phases,
            anomalies,
        },
        anomaly_records,
        finished_tick: last_tick,
    })
}

/// First step of a shortest path to the nearest pellet, or `None` if the
/// board is clear or unreachable.
fn autopilot(grid: &Grid, from: TilePos) -> Option<Direction> {
    let mut seen = HashSet::from([from]);
    let mut queue = VecDeque::new();
    for dir in Direction::PRIORITY {
        if let Some(next) = grid.wrap(from.step(dir)) {
            if grid.can_enter(next, Passage::Normal) && seen.insert(next) {
                queue.push_back((next, dir));
            }
        }
    }
    while let Some((tile, first)) = queue.pop_front() {
        if matches!(grid.tile(tile), Some(Tile::Pellet | Tile::PowerPellet)) {
            return Some(first);
        }
        for dir in Direction::PRIORITY {
            if let Some(next) = grid.wrap(tile.step(dir)) {
                if grid.can_enter(next, Passage::Normal) && seen.insert(next) {
                    queue.push_back((next, first));
                }
            }
        }
    }
    None
}

fn stepped_at_most_one(before: TilePos, after: TilePos, width: i32) -> bool {
    let dx = (before.x - after.x).abs();
    let dx = dx.min(width - dx);
    dx + (before.y - after.y).abs() <= 1
}

fn collect_snapshot_anomalies(
    snapshot: &Snapshot,
    previous: &Watch,
    grid: &Grid,
    starting_lives: u32,
) -> Vec<String> {
    let mut anomalies = Vec::new();
    let reset = snapshot.events.iter().any(|event| {
        matches!(
            event,
            GameEvent::PlayerCaught { .. }
                | GameEvent::LevelCleared { .. }
                | GameEvent::BoardReloaded { .. }
        )
    });

    if snapshot.score < previous.score {
        anomalies.push(format!(
            "score decreased: {} -> {}",
            previous.score, snapshot.score
        ));
    }
    if snapshot.lives > starting_lives {
        anomalies.push(format!("lives above start: {}", snapshot.lives));
    }
    if snapshot.high_score < snapshot.score {
        anomalies.push(format!(
            "high score {} below score {}",
            snapshot.high_score, snapshot.score
        ));
    }

    let player = TilePos::new(snapshot.player.x, snapshot.player.y);
    if !grid.is_walkable(player) {
        anomalies.push(format!("player on blocked tile {},{}", player.x, player.y));
    }

    if reset {
        return anomalies;
    }
    if snapshot.pellets_remaining > previous.pellets_remaining {
        anomalies.push(format!(
            "pellets reappeared: {} -> {}",
            previous.pellets_remaining, snapshot.pellets_remaining
        ));
    }
    if !stepped_at_most_one(previous.player, player, grid.width()) {
        anomalies.push(format!(
            "player skipped a tile: {},{} -> {},{}",
            previous.player.x, previous.player.y, player.x, player.y
        ));
    }
    for (before, ghost) in previous.ghosts.iter().zip(&snapshot.ghosts) {
        let after = TilePos::new(ghost.x, ghost.y);
        if !stepped_at_most_one(*before, after, grid.width()) {
            anomalies.push(format!("ghost {:?} skipped a tile", ghost.id));
        }
        if ghost.state == GhostState::Frightened && snapshot.frightened_ms == 0 {
            anomalies.push(format!("ghost {:?} frightened without a timer", ghost.id));
        }
    }
    anomalies
}

fn resolve_scenarios(cli: &Cli) -> Vec<Scenario> {
    let seed = normalize_seed(cli.seed.unwrap_or_else(|| u64::from(rand::random::<u32>())));

    if cli.single || cli.games.is_some() || cli.seconds.is_some() {
        let games = cli.games.unwrap_or(1).clamp(1, 100);
        return vec![Scenario {
            name: format!("custom-games{games}"),
            games,
            seconds: cli.seconds.unwrap_or(120).clamp(1, 3_600),
            seed,
        }];
    }

    vec![
        Scenario {
            name: "quick-check".to_string(),
            games: 1,
            seconds: 60,
            seed,
        },
        Scenario {
            name: "session-check".to_string(),
            games: 3,
            seconds: 300,
            seed: normalize_seed(seed as u64 + 1),
        },
    ]
}

fn normalize_seed(seed: u64) -> u32 {
    seed as u32
}

fn push_anomaly(
    anomalies: &mut Vec<String>,
    anomaly_records: &mut Vec<AnomalyRecord>,
    anomaly_seen: &mut HashSet<String>,
    tick: u64,
    message: String,
) {
    anomaly_records.push(AnomalyRecord {
        tick,
        message: message.clone(),
    });
    if anomaly_seen.insert(message.clone()) {
        anomalies.push(message);
    }
}

fn default_match_id(seed: u32, timestamp_ms: i64) -> String {
    format!("sim-{seed}-{timestamp_ms}")
}

fn build_run_summary(
    match_id: String,
    started_at: String,
    finished_at: String,
    scenarios: Vec<ScenarioResultLine>,
    outcome_counts: BTreeMap<String, usize>,
    anomaly_count: usize,
    total_duration_ms: u64,
) -> RunSummary {
    let scenario_count = scenarios.len();
    let average_duration_ms = if scenario_count == 0 {
        0
    } else {
        total_duration_ms / scenario_count as u64
    };
    RunSummary {
        match_id,
        started_at,
        finished_at,
        scenario_count,
        anomaly_count,
        average_duration_ms,
        outcome_counts,
        scenarios,
    }
}

fn emit_log(
    level: Level,
    event: &str,
    match_id: &str,
    scenario: Option<&str>,
    seed: Option<u32>,
    tick: Option<u64>,
    details: Value,
) {
    if level == Level::ERROR {
        error!(event, match_id, scenario, seed, tick, %details);
    } else if level == Level::WARN {
        warn!(event, match_id, scenario, seed, tick, %details);
    } else {
        info!(event, match_id, scenario, seed, tick, %details);
    }
}

fn outcome_key(outcome: Outcome) -> String {
    match outcome {
        Outcome::GameOver => "game_over",
        Outcome::TimeLimit => "time_limit",
    }
    .to_string()
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn write_summary(path: &Path, summary: &RunSummary) -> io::Result<()> {
    let summary_text = serde_json::to_string_pretty(summary).map_err(io::Error::other)?;
    std::fs::write(path, summary_text)
}
