use clap::Parser;
use serde::Serialize;
use serde_json::json;
use silent_library::config::GameSettings;
use silent_library::constants::{TICK_MS, TICK_RATE};
use silent_library::engine::{AutopilotProfile, GameSession, GameSessionOptions};
use silent_library::level::Level;
use silent_library::logging::{emit_log, log_runtime_events, LogScope};
use silent_library::types::{
    EnemyState, GameOverReason, GameSummary, PlayerInput, RuntimeEvent, Snapshot,
};
use std::collections::{BTreeMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[arg(long)]
    single: bool,
    #[arg(long)]
    accuracy: Option<f32>,
    #[arg(long)]
    minutes: Option<i32>,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long)]
    session_id: Option<String>,
    #[arg(long)]
    summary_out: Option<PathBuf>,
    /// JSON settings file; defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,
    /// JSON level file; the built-in library when omitted.
    #[arg(long)]
    level: Option<PathBuf>,
    /// Also log every gameplay event.
    #[arg(long)]
    verbose: bool,
}

#[derive(Clone, Debug, Serialize)]
struct Scenario {
    name: String,
    accuracy: f32,
    minutes: i32,
    seed: u32,
}

#[derive(Clone, Debug, Serialize)]
struct ScenarioResultLine {
    scenario: String,
    seed: u32,
    accuracy: f32,
    minutes: i32,
    reason: GameOverReason,
    #[serde(rename = "timedOut")]
    timed_out: bool,
    #[serde(rename = "durationMs")]
    duration_ms: u64,
    #[serde(rename = "timerText")]
    timer_text: String,
    #[serde(rename = "booksCompleted")]
    books_completed: u32,
    #[serde(rename = "answersGiven")]
    answers_given: u32,
    #[serde(rename = "answersCorrect")]
    answers_correct: u32,
    #[serde(rename = "timesCaught")]
    times_caught: u32,
    chases: u32,
    #[serde(rename = "doorsToggled")]
    doors_toggled: u32,
    #[serde(rename = "enemyRespawns")]
    enemy_respawns: u32,
    anomalies: Vec<String>,
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
    #[serde(rename = "sessionId")]
    session_id: String,
    #[serde(rename = "startedAtMs")]
    started_at_ms: u64,
    #[serde(rename = "finishedAtMs")]
    finished_at_ms: u64,
    #[serde(rename = "scenarioCount")]
    scenario_count: usize,
    #[serde(rename = "anomalyCount")]
    anomaly_count: usize,
    #[serde(rename = "averageDurationMs")]
    average_duration_ms: u64,
    #[serde(rename = "reasonCounts")]
    reason_counts: BTreeMap<String, usize>,
    scenarios: Vec<ScenarioResultLine>,
}

fn main() {
    let cli = Cli::parse();
    let scenarios = resolve_scenarios(&cli);
    let run_started_at_ms = now_ms();
    let seed_hint = scenarios.first().map(|scenario| scenario.seed).unwrap_or(0);
    let session_id = cli
        .session_id
        .clone()
        .unwrap_or_else(|| default_session_id(seed_hint, run_started_at_ms));
    let run_scope = LogScope::session(&session_id);

    let (settings, level) = match load_inputs(&cli) {
        Ok(inputs) => inputs,
        Err(message) => {
            emit_log(
                "error",
                "config_load_failed",
                &run_scope,
                None,
                json!({ "error": message }),
            );
            std::process::exit(2);
        }
    };

    let mut has_anomaly = false;
    let mut scenario_results = Vec::new();
    let mut reason_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut total_duration_ms = 0u64;
    let mut total_anomalies = 0usize;

    for scenario in scenarios {
        let scope = LogScope::scenario(&session_id, &scenario.name, scenario.seed);
        emit_log(
            "info",
            "scenario_started",
            &scope,
            None,
            json!({
                "accuracy": scenario.accuracy,
                "minutes": scenario.minutes,
                "level": level.name,
            }),
        );
        let scenario_run = run_scenario(&scenario, &settings, &level, cli.verbose.then_some(&scope));

        for anomaly in &scenario_run.anomaly_records {
            emit_log(
                "warn",
                "anomaly_detected",
                &scope,
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
        *reason_counts
            .entry(scenario_run.result.reason.key().to_string())
            .or_insert(0) += 1;

        emit_log(
            "info",
            "scenario_finished",
            &scope,
            Some(scenario_run.finished_tick),
            json!({
                "reason": scenario_run.result.reason,
                "durationMs": scenario_run.result.duration_ms,
                "booksCompleted": scenario_run.result.books_completed,
                "timesCaught": scenario_run.result.times_caught,
                "anomalyCount": scenario_run.anomaly_records.len(),
            }),
        );

        match serde_json::to_string(&scenario_run.result) {
            Ok(line) => println!("{line}"),
            Err(error) => emit_log(
                "error",
                "result_serialize_failed",
                &scope,
                None,
                json!({ "error": error.to_string() }),
            ),
        }
        scenario_results.push(scenario_run.result);
    }

    let run_finished_at_ms = now_ms();
    let summary = build_run_summary(
        session_id.clone(),
        run_started_at_ms,
        run_finished_at_ms,
        scenario_results,
        reason_counts,
        total_anomalies,
        total_duration_ms,
    );

    let mut summary_out_written: Option<String> = None;
    if let Some(path) = cli.summary_out.as_ref() {
        if let Err(error) = write_summary(path, &summary) {
            emit_log(
                "error",
                "summary_write_failed",
                &run_scope,
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
        "info",
        "run_finished",
        &run_scope,
        None,
        json!({
            "scenarioCount": summary.scenario_count,
            "anomalyCount": summary.anomaly_count,
            "averageDurationMs": summary.average_duration_ms,
            "reasonCounts": summary.reason_counts,
            "summaryOut": summary_out_written,
        }),
    );

    if has_anomaly {
        std::process::exit(1);
    }
}

fn load_inputs(cli: &Cli) -> Result<(GameSettings, Level), String> {
    let settings = match cli.config.as_deref() {
        Some(path) => GameSettings::load(path).map_err(|error| error.to_string())?,
        None => GameSettings::default(),
    };
    let level = match cli.level.as_deref() {
        Some(path) => Level::load(path).map_err(|error| error.to_string())?,
        None => Level::library(),
    };
    settings
        .validate_for_level(&level)
        .map_err(|error| error.to_string())?;
    Ok((settings, level))
}

fn run_scenario(
    scenario: &Scenario,
    settings: &GameSettings,
    level: &Level,
    event_scope: Option<&LogScope<'_>>,
) -> ScenarioRunResult {
    let mut session = GameSession::new(
        settings.clone(),
        level.clone(),
        GameSessionOptions {
            seed: scenario.seed,
            autopilot: Some(AutopilotProfile {
                accuracy: scenario.accuracy,
            }),
        },
    );
    let book_count = level.books.len() as u32;
    let tick_limit = scenario.minutes.max(1) as u64 * 60 * TICK_RATE as u64;

    let mut chases = 0;
    let mut doors_toggled = 0;
    let mut enemy_respawns = 0;
    let mut timed_out = false;
    let mut anomalies = Vec::new();
    let mut anomaly_records = Vec::new();
    let mut anomaly_seen = HashSet::new();
    let mut last_tick = 0u64;

    while !session.is_ended() {
        session.step(TICK_MS, &PlayerInput::default());
        let snapshot = session.build_snapshot(true);
        last_tick = snapshot.tick;
        for message in collect_snapshot_anomalies(&snapshot) {
            push_anomaly(
                &mut anomalies,
                &mut anomaly_records,
                &mut anomaly_seen,
                snapshot.tick,
                message,
            );
        }
        if let Some(scope) = event_scope {
            log_runtime_events(scope, snapshot.tick, &snapshot.events);
        }

        for event in &snapshot.events {
            match event {
                RuntimeEvent::EnemyStateChanged {
                    to: EnemyState::Chasing,
                    ..
                } => chases += 1,
                RuntimeEvent::DoorToggled { .. } => doors_toggled += 1,
                RuntimeEvent::EnemyRespawned { .. } => enemy_respawns += 1,
                _ => {}
            }
        }

        if snapshot.tick >= tick_limit && !session.is_ended() {
            timed_out = true;
            session.quit();
        }
    }

    let summary = session.build_summary();
    for message in collect_summary_anomalies(
        &summary,
        book_count,
        settings.book.books_required,
        settings.session.exit_requires_books,
    ) {
        push_anomaly(
            &mut anomalies,
            &mut anomaly_records,
            &mut anomaly_seen,
            last_tick,
            message,
        );
    }

    ScenarioRunResult {
        result: ScenarioResultLine {
            scenario: scenario.name.clone(),
            seed: scenario.seed,
            accuracy: scenario.accuracy,
            minutes: scenario.minutes,
            reason: summary.reason,
            timed_out,
            duration_ms: summary.duration_ms,
            timer_text: summary.timer_text,
            books_completed: summary.books_completed,
            answers_given: summary.answers_given,
            answers_correct: summary.answers_correct,
            times_caught: summary.times_caught,
            chases,
            doors_toggled,
            enemy_respawns,
            anomalies,
        },
        anomaly_records,
        finished_tick: last_tick,
    }
}

fn collect_snapshot_anomalies(snapshot: &Snapshot) -> Vec<String> {
    let mut anomalies = Vec::new();
    let player = &snapshot.player;
    if !player.position.is_finite() {
        anomalies.push(format!("player position not finite: {}", player.position));
    }
    if !player.stamina.is_finite() || player.stamina < 0.0 || player.stamina > player.stamina_max {
        anomalies.push(format!(
            "player stamina out of range: {}/{}",
            player.stamina, player.stamina_max
        ));
    }
    if player.caught && player.movement_enabled {
        anomalies.push("caught player can still move".to_string());
    }

    for enemy in &snapshot.enemies {
        if !enemy.position.is_finite() {
            anomalies.push(format!("enemy position not finite: {}", enemy.id));
        }
        if enemy.state == EnemyState::Searching && enemy.destination.is_none() {
            anomalies.push(format!("searching enemy has no destination: {}", enemy.id));
        }
    }

    let open_books = snapshot.books.iter().filter(|book| book.open).count();
    if open_books > 1 {
        anomalies.push(format!("{open_books} books open at once"));
    }
    anomalies
}

fn collect_summary_anomalies(
    summary: &GameSummary,
    book_count: u32,
    required: u32,
    exit_requires_books: bool,
) -> Vec<String> {
    let mut anomalies = Vec::new();
    if summary.books_completed > book_count {
        anomalies.push(format!(
            "completed {} books but the level has {book_count}",
            summary.books_completed
        ));
    }
    if summary.answers_correct > summary.answers_given {
        anomalies.push(format!(
            "more correct answers than answers given: {}/{}",
            summary.answers_correct, summary.answers_given
        ));
    }
    if exit_requires_books
        && summary.reason == GameOverReason::Escaped
        && summary.books_completed < required
    {
        anomalies.push(format!(
            "escaped with {}/{required} books",
            summary.books_completed
        ));
    }
    anomalies
}

fn resolve_scenarios(cli: &Cli) -> Vec<Scenario> {
    let seed = normalize_seed(cli.seed.unwrap_or_else(now_ms));

    if cli.single || cli.accuracy.is_some() || cli.minutes.is_some() {
        let accuracy = cli.accuracy.unwrap_or(1.0).clamp(0.0, 1.0);
        return vec![Scenario {
            name: format!("custom-acc{}", (accuracy * 100.0).round() as i32),
            accuracy,
            minutes: cli.minutes.unwrap_or(5).clamp(1, 30),
            seed,
        }];
    }

    vec![
        Scenario {
            name: "quick-check-perfect".to_string(),
            accuracy: 1.0,
            minutes: 5,
            seed,
        },
        Scenario {
            name: "balance-check-sloppy".to_string(),
            accuracy: 0.6,
            minutes: 10,
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

fn default_session_id(seed: u32, timestamp_ms: u64) -> String {
    format!("sim-{seed}-{timestamp_ms}")
}

fn build_run_summary(
    session_id: String,
    started_at_ms: u64,
    finished_at_ms: u64,
    scenarios: Vec<ScenarioResultLine>,
    reason_counts: BTreeMap<String, usize>,
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
        session_id,
        started_at_ms,
        finished_at_ms,
        scenario_count,
        anomaly_count,
        average_duration_ms,
        reason_counts,
        scenarios,
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn write_summary(path: &Path, summary: &RunSummary) -> io::Result<()> {
    let summary_text = serde_json::to_string_pretty(summary).map_err(io::Error::other)?;
    std::fs::write(path, summary_text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_scenario_result(reason: GameOverReason, duration_ms: u64) -> ScenarioResultLine {
        ScenarioResultLine {
            scenario: "test".to_string(),
            seed: 42,
            accuracy: 1.0,
            minutes: 1,
            reason,
            timed_out: false,
            duration_ms,
            timer_text: "00:00".to_string(),
            books_completed: 0,
            answers_given: 0,
            answers_correct: 0,
            times_caught: 0,
            chases: 0,
            doors_toggled: 0,
            enemy_respawns: 0,
            anomalies: Vec::new(),
        }
    }

    fn summary(reason: GameOverReason, books_completed: u32) -> GameSummary {
        GameSummary {
            reason,
            duration_ms: 1_000,
            timer_secs: 1.0,
            timer_text: "00:01".to_string(),
            books_completed,
            times_caught: 0,
            answers_given: 4,
            answers_correct: 3,
        }
    }

    fn cli(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("simulate").chain(args.iter().copied()))
    }

    #[test]
    fn default_session_id_contains_seed_and_timestamp() {
        assert_eq!(default_session_id(42, 123456789), "sim-42-123456789");
    }

    #[test]
    fn default_run_has_two_scenarios_with_consecutive_seeds() {
        let scenarios = resolve_scenarios(&cli(&["--seed", "7"]));
        assert_eq!(scenarios.len(), 2);
        assert_eq!(scenarios[0].seed, 7);
        assert_eq!(scenarios[1].seed, 8);
    }

    #[test]
    fn custom_scenario_clamps_accuracy_and_minutes() {
        let scenarios = resolve_scenarios(&cli(&["--accuracy", "1.5", "--minutes", "99"]));
        assert_eq!(scenarios.len(), 1);
        assert_eq!(scenarios[0].name, "custom-acc100");
        assert_eq!(scenarios[0].accuracy, 1.0);
        assert_eq!(scenarios[0].minutes, 30);
    }

    #[test]
    fn build_run_summary_calculates_average_duration() {
        let summary = build_run_summary(
            "sim-42-1".to_string(),
            1,
            2,
            vec![
                make_scenario_result(GameOverReason::Escaped, 60_000),
                make_scenario_result(GameOverReason::OutOfAttempts, 90_000),
            ],
            BTreeMap::from([
                ("escaped".to_string(), 1usize),
                ("out_of_attempts".to_string(), 1usize),
            ]),
            1,
            150_000,
        );
        assert_eq!(summary.average_duration_ms, 75_000);
        assert_eq!(summary.scenario_count, 2);
    }

    #[test]
    fn write_summary_returns_error_when_parent_does_not_exist() {
        let target = std::env::temp_dir()
            .join(format!("silent-library-missing-{}", now_ms()))
            .join("summary.json");
        let summary = build_run_summary(
            "sim-1-1".to_string(),
            1,
            2,
            vec![make_scenario_result(GameOverReason::Quit, 60_000)],
            BTreeMap::from([("quit".to_string(), 1usize)]),
            0,
            60_000,
        );
        let result = write_summary(&target, &summary);
        assert!(result.is_err());
    }

    #[test]
    fn push_anomaly_keeps_records_and_deduplicates_summary_messages() {
        let mut anomalies = Vec::new();
        let mut records = Vec::new();
        let mut seen = HashSet::new();
        push_anomaly(
            &mut anomalies,
            &mut records,
            &mut seen,
            10,
            "same anomaly".to_string(),
        );
        push_anomaly(
            &mut anomalies,
            &mut records,
            &mut seen,
            11,
            "same anomaly".to_string(),
        );

        assert_eq!(anomalies.len(), 1);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].tick, 10);
        assert_eq!(records[1].tick, 11);
    }

    #[test]
    fn level_file_with_too_few_books_fails_to_load() {
        let mut level = Level::library();
        level.books.truncate(3);
        let path = std::env::temp_dir().join(format!(
            "silent-library-short-level-{}.json",
            rand::random::<u32>()
        ));
        let text = serde_json::to_string(&level).expect("level serializes");
        std::fs::write(&path, text).expect("write level");

        let path_arg = path.to_string_lossy().to_string();
        let error = load_inputs(&cli(&["--level", path_arg.as_str()])).expect_err("unwinnable level");
        assert!(error.contains("book.booksRequired"));
        assert!(load_inputs(&cli(&[
            "--level",
            path_arg.as_str(),
            "--config",
            "/nonexistent.json",
        ])).is_err());

        let _ = std::fs::remove_file(&path);
        assert!(load_inputs(&cli(&[])).is_ok());
    }

    #[test]
    fn fresh_session_snapshot_has_no_anomalies() {
        let mut session = GameSession::new(
            GameSettings::default(),
            Level::library(),
            GameSessionOptions::default(),
        );
        session.step(TICK_MS, &PlayerInput::default());
        let snapshot = session.build_snapshot(true);
        assert!(collect_snapshot_anomalies(&snapshot).is_empty());
    }

    #[test]
    fn escaping_without_required_books_is_an_anomaly() {
        let anomalies = collect_summary_anomalies(&summary(GameOverReason::Escaped, 2), 6, 5, true);
        assert_eq!(anomalies, vec!["escaped with 2/5 books".to_string()]);
        assert!(collect_summary_anomalies(&summary(GameOverReason::Escaped, 2), 6, 5, false)
            .is_empty());
        assert!(collect_summary_anomalies(&summary(GameOverReason::Escaped, 5), 6, 5, true)
            .is_empty());
    }

    #[test]
    fn completing_more_books_than_exist_is_an_anomaly() {
        let anomalies = collect_summary_anomalies(&summary(GameOverReason::Quit, 7), 6, 5, true);
        assert_eq!(anomalies.len(), 1);
        assert!(anomalies[0].starts_with("completed 7 books"));
    }
}
