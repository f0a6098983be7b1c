mod common;

use std::process::{Command, Output};

use common::{Fixture, ADD};

fn judge(fixture: &Fixture, extra: &[&str]) -> Output {
    let fake_cc = fixture.fake_cc().display().to_string();
    Command::new(env!("CARGO_BIN_EXE_local-judger"))
        .current_dir(fixture.path())
        .args(["sum", "--compiler", "sh", "--flag", fake_cc.as_str(), "--time-limit", "1"])
        .args(extra)
        .env_remove("RUST_LOG")
        .env("NO_COLOR", "1")
        .output()
        .unwrap()
}

#[test]
fn all_passing_exits_zero() {
    let fixture = Fixture::new();
    fixture.solution(ADD);
    fixture.case("sample", "1", "1 2\n", Some("3\n"));
    fixture.case("data", "1", "2 2\n", Some("4\n"));

    let output = judge(&fixture, &["--report-json", "report.json"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(output.status.code(), Some(0), "{stdout}");
    assert!(stdout.contains("2 / 2 passed"), "{stdout}");
    assert!(fixture.path().join("report.json").is_file());
}

#[test]
fn failing_case_exits_one() {
    let fixture = Fixture::new();
    fixture.solution(ADD);
    fixture.case("data", "1", "2 2\n", Some("5\n"));

    let output = judge(&fixture, &[]);
    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("WA"), "{stdout}");
}

#[test]
fn compile_error_exits_two_with_diagnostics() {
    let fixture = Fixture::new();
    fixture.solution("COMPILE_ERROR\n");
    fixture.case("data", "1", "2 2\n", Some("4\n"));

    let output = judge(&fixture, &[]);
    assert_eq!(output.status.code(), Some(2));
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("error: expected ';' before '}' token"), "{stderr}");
    assert!(stderr.contains("compilation failed"), "{stderr}");
}

#[test]
fn missing_test_data_exits_two() {
    let fixture = Fixture::new();
    fixture.solution(ADD);

    let output = judge(&fixture, &[]);
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("no test cases found"), "{stderr}");
}

#[test]
fn config_file_supplies_defaults() {
    let fixture = Fixture::new();
    fixture.solution(ADD);
    fixture.case("tests", "1", "2 2\n", Some("4\n"));
    std::fs::write(fixture.path().join("judge.toml"), "roots = [\"tests\"]\ntime_limit = 2.0\n").unwrap();

    let output = judge(&fixture, &[]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(output.status.code(), Some(0), "{stdout}");
    assert!(stdout.contains("tests/1"), "{stdout}");
}
