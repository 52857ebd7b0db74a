use assert_cmd::Command;
use predicates::prelude::*;

fn localnet() -> Command {
    Command::cargo_bin("localnet").expect("binary built")
}

#[test]
fn help_lists_both_command_groups() {
    localnet()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("server"))
        .stdout(predicate::str::contains("control"));
}

#[test]
fn control_help_lists_every_call() {
    let assert = localnet().args(["control", "--help"]).assert().success();
    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).to_string();
    for call in [
        "ping",
        "start",
        "health",
        "uris",
        "status",
        "stream-status",
        "remove-node",
        "restart-node",
        "stop",
    ] {
        assert!(stdout.contains(call), "missing `{call}` in:\n{stdout}");
    }
}

#[test]
fn control_against_unreachable_server_exits_nonzero() {
    localnet()
        .args(["control", "--endpoint", "127.0.0.1:1", "--dial-timeout", "1", "ping"])
        .assert()
        .failure();
}

#[test]
fn server_rejects_invalid_config_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("localnet.toml");
    std::fs::write(&path, "[logging]\nformat = \"xml\"\n").expect("write config");

    localnet()
        .args(["server", "--config"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("logging.format").or(predicate::str::contains("format")));
}
