mod support;

use predicates::str::contains;

#[test]
fn trackzero_help_works() {
    support::trackzero_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("non-zero-day streaks"));
}

#[test]
fn subcommand_help_works() {
    let subcommands = [
        vec!["login"],
        vec!["logout"],
        vec!["task"],
        vec!["task", "add"],
        vec!["task", "toggle"],
        vec!["task", "rm"],
        vec!["task", "ls"],
        vec!["journal"],
        vec!["journal", "add"],
        vec!["journal", "show"],
        vec!["streak"],
        vec!["calendar"],
        vec!["status"],
    ];

    for cmd in subcommands {
        support::trackzero_cmd()
            .args(&cmd)
            .arg("--help")
            .assert()
            .success();
    }
}

#[test]
fn commands_require_sign_in() {
    let root = support::TestRoot::new();
    root.cmd()
        .args(["task", "ls"])
        .assert()
        .code(2)
        .stderr(contains("Not signed in"))
        .stderr(contains("trackzero login"));
}

#[test]
fn json_errors_use_envelope() {
    let root = support::TestRoot::new();
    let output = root
        .cmd()
        .args(["--json", "status"])
        .output()
        .expect("run trackzero");
    assert_eq!(output.status.code(), Some(2));

    let envelope: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(envelope["status"], "error");
    assert_eq!(envelope["command"], "status");
    assert_eq!(envelope["error"]["kind"], "user_error");
    assert!(envelope["error"].get("details").is_none());
}
