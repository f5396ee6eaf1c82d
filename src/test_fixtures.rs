//! Test fixtures for pipeline tests
//!
//! `FakeRunner` stands in for ffmpeg/ffprobe: it records every invocation,
//! answers duration probes from a table, and creates the output file named
//! by the last argument of each codec invocation.

#![cfg(test)]

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::tools::{Invocation, ProcessRunner, Toolchain};

/// Duration reported for files with no configured duration
pub const DEFAULT_DURATION: f64 = 10.0;

/// One recorded invocation
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl RecordedCall {
    /// Value following `flag` in the argument vector
    pub fn arg_after(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }

    pub fn has_arg(&self, arg: &str) -> bool {
        self.args.iter().any(|a| a == arg)
    }

    pub fn output(&self) -> &str {
        self.args.last().map(String::as_str).unwrap_or("")
    }
}

#[derive(Debug, Default)]
pub struct FakeRunner {
    calls: Mutex<Vec<RecordedCall>>,
    manifests: Mutex<Vec<Vec<String>>>,
    durations: Vec<(String, f64)>,
    fail_patterns: Vec<String>,
    no_output_patterns: Vec<String>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn toolchain() -> Toolchain {
        Toolchain::new("/fake/bin/ffmpeg", "/fake/bin/ffprobe")
    }

    /// Report `seconds` when probing any path containing `pattern`
    pub fn with_duration(mut self, pattern: &str, seconds: f64) -> Self {
        self.durations.push((pattern.to_string(), seconds));
        self
    }

    /// Fail every invocation whose arguments contain `pattern`
    pub fn failing_on(mut self, pattern: &str) -> Self {
        self.fail_patterns.push(pattern.to_string());
        self
    }

    /// Succeed without writing output for invocations containing `pattern`
    pub fn without_output_on(mut self, pattern: &str) -> Self {
        self.no_output_patterns.push(pattern.to_string());
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Segment paths of every concat manifest seen, captured at invocation
    /// time because the workspace is gone once the run ends
    pub fn manifests(&self) -> Vec<Vec<String>> {
        self.manifests.lock().unwrap().clone()
    }

    /// Invocations of ffmpeg only
    pub fn codec_calls(&self) -> Vec<RecordedCall> {
        let ffmpeg = Self::toolchain().ffmpeg;
        self.calls()
            .into_iter()
            .filter(|c| c.program == ffmpeg)
            .collect()
    }

    /// Invocations of ffprobe only
    pub fn probe_calls(&self) -> Vec<RecordedCall> {
        let ffprobe = Self::toolchain().ffprobe;
        self.calls()
            .into_iter()
            .filter(|c| c.program == ffprobe)
            .collect()
    }
}

impl ProcessRunner for FakeRunner {
    fn run(&self, program: &Path, args: &[OsString]) -> Invocation {
        let args: Vec<String> = args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        let call = RecordedCall {
            program: program.to_path_buf(),
            args: args.clone(),
        };
        self.calls.lock().unwrap().push(call);

        let joined = args.join(" ");
        if let Some(pattern) = self.fail_patterns.iter().find(|p| joined.contains(p.as_str())) {
            return Invocation::failure(format!("simulated failure on {}", pattern));
        }

        let target = args.last().cloned().unwrap_or_default();

        if program == Self::toolchain().ffprobe {
            let seconds = self
                .durations
                .iter()
                .find(|(pattern, _)| target.contains(pattern.as_str()))
                .map(|(_, secs)| *secs)
                .unwrap_or(DEFAULT_DURATION);
            return Invocation {
                ok: true,
                stdout: format!("{:.6}\n", seconds),
                stderr: String::new(),
            };
        }

        if call_is_concat(&args) {
            self.capture_manifest(&args);
        }

        if !self.no_output_patterns.iter().any(|p| joined.contains(p.as_str())) {
            let _ = std::fs::write(&target, b"fake audio");
        }
        Invocation {
            ok: true,
            ..Invocation::default()
        }
    }
}

impl FakeRunner {
    fn capture_manifest(&self, args: &[String]) {
        let Some(pos) = args.iter().position(|a| a == "-i") else {
            return;
        };
        let Some(text) = args.get(pos + 1).and_then(|p| std::fs::read_to_string(p).ok()) else {
            return;
        };
        let segments = text
            .lines()
            .filter_map(|l| l.strip_prefix("file '")?.strip_suffix('\''))
            .map(|p| p.replace(r"'\''", "'"))
            .collect();
        self.manifests.lock().unwrap().push(segments);
    }
}

fn call_is_concat(args: &[String]) -> bool {
    args.windows(2).any(|w| w[0] == "-f" && w[1] == "concat")
}

/// Create empty input files named `names` inside `dir`
pub fn touch_inputs(dir: &Path, names: &[&str]) -> Vec<PathBuf> {
    names
        .iter()
        .map(|name| {
            let path = dir.join(name);
            std::fs::write(&path, b"source audio").expect("Failed to create input file");
            path
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fake_runner_records_and_writes_output() {
        let dir = tempfile::TempDir::new().unwrap();
        let out = dir.path().join("out.mp3");
        let runner = FakeRunner::new();

        let result = runner.run(
            &FakeRunner::toolchain().ffmpeg,
            &[OsString::from("-i"), OsString::from("in.mp3"), out.clone().into()],
        );

        assert!(result.ok);
        assert!(out.exists());
        assert_eq!(runner.codec_calls().len(), 1);
        assert_eq!(runner.calls()[0].arg_after("-i"), Some("in.mp3"));
    }

    #[test]
    fn test_fake_runner_failure_pattern() {
        let runner = FakeRunner::new().failing_on("bad");
        let result = runner.run(Path::new("/fake/bin/ffmpeg"), &[OsString::from("bad.mp3")]);
        assert!(!result.ok);
        assert!(result.stderr.contains("bad"));
    }
}
