//! Script sessions driven by `scripts.json`.
//!
//! Each case runs one script in a fresh batch session and compares the
//! output sink exactly. `stderr_contains` and `failed` are checked when
//! present.

use std::path::PathBuf;

use serde::Deserialize;
use xfst_interp::{Io, Session};

#[derive(Debug, Deserialize)]
struct Case {
    name: String,
    script: String,
    stdout: String,
    #[serde(default)]
    stderr_contains: Option<String>,
    #[serde(default)]
    failed: bool,
}

fn load_cases() -> Vec<Case> {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/scripts.json");
    let contents = std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("failed to read {}: {}", path.display(), e));
    serde_json::from_str(&contents).unwrap_or_else(|e| panic!("failed to parse {}: {}", path.display(), e))
}

fn run(script: &str) -> (Session, String, String) {
    let mut session = Session::new();
    let mut out = Vec::new();
    let mut err = Vec::new();
    session.run_script(script, &mut Io::new(&mut out, &mut err));
    (
        session,
        String::from_utf8(out).expect("utf-8 output"),
        String::from_utf8(err).expect("utf-8 diagnostics"),
    )
}

#[test]
fn script_cases() {
    let cases = load_cases();
    assert!(!cases.is_empty());
    let mut failures = Vec::new();
    for case in &cases {
        let (session, out, err) = run(&case.script);
        if out != case.stdout {
            failures.push(format!(
                "{}: expected stdout {:?}, got {:?} (stderr {:?})",
                case.name, case.stdout, out, err
            ));
        }
        if let Some(needle) = &case.stderr_contains {
            if !err.contains(needle.as_str()) {
                failures.push(format!("{}: stderr {:?} lacks {:?}", case.name, err, needle));
            }
        }
        if session.has_failed() != case.failed {
            failures.push(format!(
                "{}: expected failed = {}, got {}",
                case.name,
                case.failed,
                session.has_failed()
            ));
        }
    }
    assert!(failures.is_empty(), "{} case(s) failed:\n{}", failures.len(), failures.join("\n"));
}

#[test]
fn sessions_are_independent() {
    let (first, _, _) = run("regex a;\ndefine A b;\n");
    assert_eq!(first.stack().len(), 1);
    let (second, out, _) = run("print defined\n");
    assert_eq!(second.stack().len(), 0);
    assert_eq!(out, "No defined symbols.\nNo function definitions.\n");
}

#[test]
fn seeded_random_words_repeat() {
    let script = "set random-seed 42\nregex [a|b|c]^3;\nprint random-words 5\n";
    let (_, first, _) = run(script);
    let (_, second, _) = run(script);
    assert_eq!(first.lines().count(), 5);
    assert_eq!(first, second);
}
