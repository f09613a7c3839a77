//! Shared harness for running the compiled worker as a subprocess.

use serde_json::Value;
use std::io::Write;
use std::process::{Command, Output, Stdio};

/// Variables the worker reads; scrubbed so the host environment cannot leak in.
const WORKER_ENV: &[&str] = &[
    "WHY_AI_PROVIDER",
    "WHY_AI_API_KEY",
    "WHY_AI_MODEL",
    "WHY_GEMINI_API_KEY",
    "WHY_GEMINI_MODEL",
    "WHY_CLAUDE_API_KEY",
    "WHY_CLAUDE_MODEL",
    "WHY_WORKER_LOG",
];

/// Result of one worker invocation.
#[derive(Debug)]
pub struct WorkerRun {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl WorkerRun {
    /// Parse stdout as the single response document.
    pub fn response(&self) -> Value {
        serde_json::from_str(&self.stdout)
            .unwrap_or_else(|err| panic!("stdout is not JSON ({err}): {:?}", self.stdout))
    }

    pub fn summary(&self) -> String {
        self.response()["decisionAdditions"]["summary"]
            .as_str()
            .unwrap_or_else(|| panic!("no summary in {}", self.stdout))
            .to_string()
    }
}

/// Builder for a scrubbed worker invocation.
pub struct WorkerCommand {
    command: Command,
}

impl Default for WorkerCommand {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerCommand {
    pub fn new() -> Self {
        let mut command = Command::new(env!("CARGO_BIN_EXE_why-worker"));
        for var in WORKER_ENV {
            command.env_remove(var);
        }
        Self { command }
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.command.env(key, value);
        self
    }

    pub fn arg(mut self, arg: impl AsRef<std::ffi::OsStr>) -> Self {
        self.command.arg(arg);
        self
    }

    /// Run with `stdin` piped in and wait for exit.
    pub fn run(mut self, stdin: &str) -> WorkerRun {
        let mut child = self
            .command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("spawn why-worker");
        if let Some(mut pipe) = child.stdin.take() {
            // The worker may exit without reading stdin (`--input`).
            let _ = pipe.write_all(stdin.as_bytes());
        }
        let Output {
            status,
            stdout,
            stderr,
        } = child.wait_with_output().expect("wait for why-worker");
        WorkerRun {
            exit_code: status.code(),
            stdout: String::from_utf8(stdout).expect("stdout utf-8"),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        }
    }
}

/// A request with one HIGH finding, optionally naming a provider.
pub fn request_with_finding(request_id: &str, provider: Option<&str>) -> String {
    let mut request = serde_json::json!({
        "version": "v1alpha1",
        "requestId": request_id,
        "input": {
            "resource": {"kind": "Pod", "name": "test-pod", "namespace": "default"},
            "policyFindings": [{
                "policyId": "PSP-001",
                "title": "Running as root",
                "severity": "HIGH",
                "message": "Container runs as root user"
            }]
        }
    });
    if let Some(provider) = provider {
        request["provider"] = Value::String(provider.to_string());
    }
    request.to_string()
}
