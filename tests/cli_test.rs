use std::process::Command;

use serde_json::Value;

fn cli() -> Command {
    Command::new(env!("CARGO_BIN_EXE_fes-calibrate"))
}

#[test]
fn angles_outputs_json() {
    let output = cli()
        .args(["angles", "-1", "0", "0"])
        .output()
        .expect("angles command");

    assert!(
        output.status.success(),
        "angles exited with {:?}",
        output.status.code()
    );
    let stdout = String::from_utf8(output.stdout).expect("stdout utf8");
    let angles: Value = serde_json::from_str(stdout.trim()).expect("angles JSON");
    assert_eq!(angles["pitch"].as_f64(), Some(0.0));
    assert!((angles["roll"].as_f64().unwrap() - 90.0).abs() < 1e-9);
    assert!((angles["yaw"].as_f64().unwrap() + 90.0).abs() < 1e-9);
}

#[test]
fn short_calibration_reports_steps() {
    let output = cli()
        .args([
            "calibrate",
            "--steps",
            "2",
            "--duration-ms",
            "200",
            "--roll",
            "12",
            "--json",
        ])
        .output()
        .expect("calibrate command");

    assert!(
        output.status.success(),
        "calibrate exited with {:?}",
        output.status.code()
    );
    let stdout = String::from_utf8(output.stdout).expect("stdout utf8");
    let last = stdout.lines().last().expect("report line");
    let report: Value = serde_json::from_str(last).expect("report JSON");

    assert_eq!(report["outcome"]["status"], "completed");
    assert_eq!(report["outcome"]["steps"].as_array().map(Vec::len), Some(2));
    assert_eq!(report["has_valid_calibration"], true);
    assert!(stdout.contains("\"type\":\"completed\""));
}

#[test]
fn missing_config_falls_back_to_defaults() {
    let output = cli()
        .args([
            "--config",
            "/nonexistent/fes.json",
            "angles",
            "0",
            "0",
            "1",
        ])
        .output()
        .expect("angles command");

    assert!(output.status.success());
}
