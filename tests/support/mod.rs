#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use serde_json::Value;
use tempfile::TempDir;

/// Isolated data root for one test.
pub struct TestRoot {
    dir: TempDir,
}

impl TestRoot {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// `trackzero` bound to this root.
    pub fn cmd(&self) -> Command {
        let mut cmd = trackzero_cmd();
        cmd.env("TRACKZERO_ROOT", self.path());
        cmd
    }

    /// Run a command with `--json` and return the envelope's `data`.
    pub fn json(&self, args: &[&str]) -> Value {
        let output = self
            .cmd()
            .arg("--json")
            .args(args)
            .output()
            .expect("run trackzero");
        assert!(
            output.status.success(),
            "trackzero {args:?} failed: {}{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        let envelope: Value = serde_json::from_slice(&output.stdout).expect("json envelope");
        assert_eq!(envelope["status"], "success");
        envelope
    }

    pub fn login(&self, user: &str) {
        self.cmd().args(["login", user]).assert().success();
    }

    pub fn write_file(&self, rel_path: &str, contents: &str) -> PathBuf {
        let path = self.path().join(rel_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(&path, contents).expect("write file");
        path
    }

    pub fn remote_path(&self, user: &str) -> PathBuf {
        self.path().join("remote").join("users").join(format!("{user}.json"))
    }

    pub fn remote_doc(&self, user: &str) -> Value {
        let raw = fs::read_to_string(self.remote_path(user)).expect("remote document");
        serde_json::from_str(&raw).expect("remote json")
    }

    pub fn cache_field(&self, user: &str, field: &str) -> Option<String> {
        let path = self.path().join("cache").join(user).join(field);
        fs::read_to_string(path).ok()
    }
}

pub fn trackzero_cmd() -> Command {
    let mut cmd = Command::cargo_bin("trackzero").expect("binary");
    cmd.env_remove("RUST_LOG");
    cmd.env_remove("TRACKZERO_ROOT");
    cmd
}

pub fn today_key() -> String {
    chrono::Local::now().date_naive().format("%Y-%m-%d").to_string()
}
