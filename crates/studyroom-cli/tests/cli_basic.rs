//! Basic CLI E2E tests.
//!
//! Tests invoke CLI commands via cargo run and verify outputs. STUDYROOM_ENV
//! is set to dev so the tests never touch the production data directory.

use std::process::Command;

/// Run a CLI command and return (stdout, stderr, exit code).
fn run_cli(args: &[&str]) -> (String, String, i32) {
    let output = Command::new("cargo")
        .args(["run", "-p", "studyroom-cli", "--quiet", "--"])
        .args(args)
        .env("STUDYROOM_ENV", "dev")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

fn parse_json(stdout: &str) -> serde_json::Value {
    serde_json::from_str(stdout).expect("stdout was not valid JSON")
}

#[test]
fn test_confirm_done_awards_points() {
    let (stdout, _, code) = run_cli(&["--user", "e2e-confirm", "confirm", "vocab", "done"]);
    assert_eq!(code, 0, "confirm failed");
    let json = parse_json(&stdout);
    assert_eq!(json["task"], "vocab");
    assert_eq!(json["status"], "done");
    assert!(json["points"].as_i64().unwrap() >= 10);
}

#[test]
fn test_confirm_rejects_unknown_task() {
    let (_, _, code) = run_cli(&["confirm", "juggling", "done"]);
    assert_ne!(code, 0, "unknown task should be rejected");
}

#[test]
fn test_study_start_and_end() {
    let (stdout, _, code) = run_cli(&["--user", "e2e-study", "study", "start"]);
    assert_eq!(code, 0, "study start failed");
    assert_eq!(parse_json(&stdout)["status"], "started");

    let (stdout, _, code) = run_cli(&["--user", "e2e-study", "study", "end"]);
    assert_eq!(code, 0, "study end failed");
    let json = parse_json(&stdout);
    assert!(json["duration_minutes"].as_i64().unwrap() >= 1);
}

#[test]
fn test_confirm_all_done_closes_open_session() {
    let (_, _, code) = run_cli(&["--user", "e2e-alldone", "study", "start"]);
    assert_eq!(code, 0, "study start failed");

    let (stdout, _, code) = run_cli(&["--user", "e2e-alldone", "confirm", "all", "done"]);
    assert_eq!(code, 0, "confirm failed");
    let json = parse_json(&stdout);
    assert!(json["ended_session"]["duration_minutes"].as_i64().unwrap() >= 1);

    // The session is really closed: an explicit end finds nothing open.
    let (stdout, _, code) = run_cli(&["--user", "e2e-alldone", "study", "end"]);
    assert_eq!(code, 0, "study end failed");
    assert_eq!(parse_json(&stdout)["status"], "no_open_session");
}

#[test]
fn test_study_end_without_open_session() {
    let (stdout, _, code) = run_cli(&["--user", "e2e-noopen", "study", "end"]);
    assert_eq!(code, 0, "study end should be a no-op");
    assert_eq!(parse_json(&stdout)["status"], "no_open_session");
}

#[test]
fn test_report_minutes() {
    let (stdout, _, code) = run_cli(&["--user", "e2e-report", "report", "minutes", "reading", "30"]);
    assert_eq!(code, 0, "report minutes failed");
    assert_eq!(parse_json(&stdout)["minutes"], 30);
}

#[test]
fn test_report_rejects_nonpositive_minutes() {
    let (_, stderr, code) = run_cli(&["report", "minutes", "reading", "0"]);
    assert_ne!(code, 0, "zero minutes should be rejected");
    assert!(stderr.contains("error"));
}

#[test]
fn test_card_add_and_list() {
    let (stdout, _, code) = run_cli(&[
        "--user", "e2e-cards", "card", "add", "ephemeral", "--back", "short-lived",
    ]);
    assert_eq!(code, 0, "card add failed");
    let card = parse_json(&stdout);
    assert_eq!(card["front"], "ephemeral");

    let (stdout, _, code) = run_cli(&["--user", "e2e-cards", "card", "list"]);
    assert_eq!(code, 0, "card list failed");
    assert!(parse_json(&stdout).as_array().unwrap().len() >= 1);
}

#[test]
fn test_new_card_is_due_and_reviewable() {
    let (stdout, _, code) = run_cli(&["--user", "e2e-review", "card", "add", "transient"]);
    assert_eq!(code, 0, "card add failed");
    let card_id = parse_json(&stdout)["id"].as_i64().unwrap();

    let (stdout, _, code) = run_cli(&["--user", "e2e-review", "card", "due"]);
    assert_eq!(code, 0, "card due failed");
    let due = parse_json(&stdout);
    assert!(due
        .as_array()
        .unwrap()
        .iter()
        .any(|c| c["id"].as_i64() == Some(card_id)));

    let id_str = card_id.to_string();
    let (stdout, _, code) = run_cli(&["--user", "e2e-review", "review", &id_str, "5"]);
    assert_eq!(code, 0, "review failed");
    let outcome = parse_json(&stdout);
    assert_eq!(outcome["state"]["reps"], 1);
    assert_eq!(outcome["state"]["interval_days"], 1);
}

#[test]
fn test_review_rejects_out_of_range_grade() {
    let (_, _, code) = run_cli(&["--user", "e2e-review", "review", "1", "6"]);
    assert_ne!(code, 0, "grade 6 should be rejected");
}

#[test]
fn test_stats_day() {
    let (stdout, _, code) = run_cli(&["stats", "day"]);
    assert_eq!(code, 0, "stats day failed");
    let json = parse_json(&stdout);
    assert!(json["confirmations"].is_object());
    assert!(json["sessions"].is_object());
}

#[test]
fn test_stats_week_has_seven_columns() {
    let (stdout, _, code) = run_cli(&["stats", "week"]);
    assert_eq!(code, 0, "stats week failed");
    let json = parse_json(&stdout);
    assert_eq!(json["confirmations"]["dates"].as_array().unwrap().len(), 7);
}

#[test]
fn test_stats_pomodoro() {
    let (stdout, _, code) = run_cli(&["stats", "pomodoro", "--days", "3"]);
    assert_eq!(code, 0, "stats pomodoro failed");
    assert_eq!(parse_json(&stdout)["dates"].as_array().unwrap().len(), 3);
}

#[test]
fn test_leaderboard() {
    let (stdout, _, code) = run_cli(&["leaderboard"]);
    assert_eq!(code, 0, "leaderboard failed");
    assert!(parse_json(&stdout).is_array());
}

#[test]
fn test_plan_set_show_advance() {
    let (_, _, code) = run_cli(&["--user", "e2e-plan", "plan", "set", "e2e", "--day", "2"]);
    assert_eq!(code, 0, "plan set failed");

    let (stdout, _, code) = run_cli(&["plan", "show", "e2e"]);
    assert_eq!(code, 0, "plan show failed");
    assert_eq!(parse_json(&stdout)["day"], 2);

    let (stdout, _, code) = run_cli(&["plan", "advance", "e2e", "--max-day", "3"]);
    assert_eq!(code, 0, "plan advance failed");
    assert_eq!(parse_json(&stdout)["day"], 3);
}

#[test]
fn test_profile_set() {
    let (stdout, _, code) = run_cli(&["--user", "e2e-profile", "profile", "set", "--name", "E2E"]);
    assert_eq!(code, 0, "profile set failed");
    assert_eq!(parse_json(&stdout)["display_name"], "E2E");
}

#[test]
fn test_pomodoro_config_show() {
    let (stdout, _, code) = run_cli(&["pomodoro", "config"]);
    assert_eq!(code, 0, "pomodoro config failed");
    assert!(parse_json(&stdout)["focus_min"].as_u64().unwrap() >= 1);
}

#[test]
fn test_pomodoro_config_override() {
    let (stdout, _, code) = run_cli(&[
        "--user", "e2e-pomo", "pomodoro", "config", "--focus-min", "50",
    ]);
    assert_eq!(code, 0, "pomodoro config set failed");
    assert_eq!(parse_json(&stdout)["focus_min"], 50);

    let (stdout, _, code) = run_cli(&["--user", "e2e-pomo", "pomodoro", "config"]);
    assert_eq!(code, 0, "pomodoro config show failed");
    assert_eq!(parse_json(&stdout)["focus_min"], 50);
}

#[test]
fn test_config_get() {
    let (stdout, _, code) = run_cli(&["config", "get", "pomodoro.focus_min"]);
    assert_eq!(code, 0, "config get failed");
    assert!(!stdout.trim().is_empty());
}

#[test]
fn test_config_get_unknown_key() {
    let (_, _, code) = run_cli(&["config", "get", "nonexistent.key"]);
    assert_ne!(code, 0, "unknown key should fail");
}

#[test]
fn test_config_list() {
    let (stdout, _, code) = run_cli(&["config", "list"]);
    assert_eq!(code, 0, "config list failed");
    assert!(parse_json(&stdout)["pomodoro"].is_object());
}
