use std::io::Write;
use std::process::{Command, Output};

fn varexpr() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_varexpr"));
    cmd.env_remove("RUST_LOG");
    cmd
}

fn stdout(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).trim().to_string()
}

fn stderr(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).to_string()
}

fn model_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".vx").tempfile().expect("temp file");
    file.write_all(contents.as_bytes()).expect("write model");
    file
}

// --- eval ---

#[test]
fn eval_prints_value() {
    let out = varexpr().args(["eval", "2 + 3 * 4"]).output().expect("failed to run varexpr");
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert_eq!(stdout(&out), "14");
}

#[test]
fn eval_accepts_leading_minus() {
    let out = varexpr().args(["eval", "-2^2"]).output().expect("failed to run varexpr");
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert_eq!(stdout(&out), "-4");
}

#[test]
fn eval_with_bindings() {
    let out = varexpr()
        .args(["eval", "x * r", "--set", "r=2", "--set", "x = r + 1"])
        .output()
        .expect("failed to run varexpr");
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert_eq!(stdout(&out), "6");
}

#[test]
fn eval_vector_result() {
    let out = varexpr().args(["eval", "cross(vec(1,0,0), vec(0,1,0))"]).output().expect("failed to run varexpr");
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert_eq!(stdout(&out), "(0, 0, 1)");
}

#[test]
fn eval_disasm_lists_program() {
    let out = varexpr().args(["eval", "--disasm", "x = 2 * 3", "--set", "x=0"]).output().expect("failed to run varexpr");
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    let text = stdout(&out);
    assert!(text.contains("mul"), "expected listing, got: {text}");
    assert!(text.contains("store-variable"), "expected store, got: {text}");
    assert!(text.ends_with('6'), "expected result last, got: {text}");
}

#[test]
fn eval_syntax_error_points_at_position() {
    let out = varexpr().args(["eval", "(2 + 3"]).output().expect("failed to run varexpr");
    assert!(!out.status.success());
    let err = stderr(&out);
    assert!(err.contains("error[VX-S007]: unterminated bracket"), "got: {err}");
    assert!(err.contains("--> 1:7"), "got: {err}");
}

#[test]
fn eval_json_diagnostics() {
    let out = varexpr()
        .args(["--diagnostics", "json", "eval", "5 / 0"])
        .output()
        .expect("failed to run varexpr");
    assert!(!out.status.success());
    let v: serde_json::Value = serde_json::from_str(stderr(&out).trim()).expect("json diagnostic");
    assert_eq!(v["code"], "VX-E001");
    assert_eq!(v["location"]["col"], 3);
    assert_eq!(v["location"]["text"], "5 / 0");
}

#[test]
fn eval_unknown_identifier() {
    let out = varexpr().args(["eval", "radius * 2"]).output().expect("failed to run varexpr");
    assert!(!out.status.success());
    assert!(stderr(&out).contains("unknown identifier 'radius'"));
}

#[test]
fn eval_malformed_binding() {
    let out = varexpr().args(["eval", "1", "--set", "r"]).output().expect("failed to run varexpr");
    assert!(!out.status.success());
    assert!(stderr(&out).contains("NAME=EXPR"));
}

#[test]
fn stderr_is_not_coloured_when_piped() {
    let out = varexpr().args(["eval", "2 +"]).output().expect("failed to run varexpr");
    assert!(!stderr(&out).contains("\x1b["));
}

// --- run ---

#[test]
fn run_prints_every_variable() {
    let model = model_file("r0 = 0.5\nwall = 0.25 # thick\nr1 = r0 + wall\nmat = \"Stainless304\"\n");
    let out = varexpr().arg("run").arg(model.path()).output().expect("failed to run varexpr");
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert_eq!(stdout(&out), "r0 = 0.5\nwall = 0.25\nr1 = 0.75\nmat = \"Stainless304\"");
}

#[test]
fn run_json_snapshot_feeds_eval() {
    let model = model_file("r = 2\naxis = vec(0, 0, 1)\n");
    let out = varexpr().args(["run", "--json"]).arg(model.path()).output().expect("failed to run varexpr");
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    let snapshot: serde_json::Value = serde_json::from_str(&stdout(&out)).expect("json snapshot");
    assert_eq!(snapshot["variables"][0]["name"], "r");
    assert_eq!(snapshot["variables"][1]["value"], serde_json::json!([0.0, 0.0, 1.0]));

    let mut saved = tempfile::NamedTempFile::new().expect("temp file");
    saved.write_all(stdout(&out).as_bytes()).expect("write snapshot");
    let out = varexpr()
        .args(["eval", "r * vz(axis)", "--load"])
        .arg(saved.path())
        .output()
        .expect("failed to run varexpr");
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert_eq!(stdout(&out), "2");
}

#[test]
fn run_reports_line_and_column() {
    let model = model_file("a = 1\nb = a +* 2\n");
    let out = varexpr().arg("run").arg(model.path()).output().expect("failed to run varexpr");
    assert!(!out.status.success());
    let err = stderr(&out);
    assert!(err.contains("--> 2:8"), "got: {err}");
    assert!(err.contains("b = a +* 2"), "got: {err}");
    assert!(err.contains("while defining 'b'"), "got: {err}");
}

#[test]
fn run_warns_on_reassignment() {
    let model = model_file("k = 1\nk = 2\n");
    let out = varexpr().arg("run").arg(model.path()).output().expect("failed to run varexpr");
    assert!(out.status.success());
    assert_eq!(stdout(&out), "k = 2");
    assert!(stderr(&out).contains("warning[VX-M002]"));
}

#[test]
fn run_missing_file() {
    let out = varexpr().args(["run", "/nonexistent/model.vx"]).output().expect("failed to run varexpr");
    assert!(!out.status.success());
    assert!(stderr(&out).contains("cannot read"));
}

// --- explain ---

#[test]
fn explain_known_code() {
    let out = varexpr().args(["explain", "VX-S013"]).output().expect("failed to run varexpr");
    assert!(out.status.success());
    assert!(stdout(&out).contains("-(-5)"));
}

#[test]
fn explain_unknown_code() {
    let out = varexpr().args(["explain", "VX-Q000"]).output().expect("failed to run varexpr");
    assert!(!out.status.success());
}
