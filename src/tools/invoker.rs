//! Subprocess invocation for the external codec and probe tools
//!
//! Every external command goes through a [`ProcessRunner`] with an explicit
//! argument vector. Nothing is ever handed to a shell, so paths containing
//! spaces or quotes reach the tool untouched.

use std::ffi::OsString;
use std::path::Path;
use std::process::{Command, Output, Stdio};

/// Outcome of one external command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
    /// Whether the process started and exited with status 0
    pub ok: bool,
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error (the diagnostic payload on failure)
    pub stderr: String,
}

impl Invocation {
    pub fn failure(stderr: impl Into<String>) -> Self {
        Self {
            ok: false,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Interpret a finished process of `program`
    ///
    /// A failure with silent stderr gets the exit status as its diagnostic.
    pub fn from_output(program: &Path, output: &Output) -> Self {
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let mut stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        let ok = output.status.success();
        if !ok && stderr.trim().is_empty() {
            stderr = format!("{} exited with {}", program.display(), output.status);
        }
        Self { ok, stdout, stderr }
    }

    pub fn spawn_failed(program: &Path, error: &std::io::Error) -> Self {
        Self::failure(format!("Failed to spawn {}: {}", program.display(), error))
    }

    /// Diagnostic text for a failed invocation, never empty
    pub fn diagnostic(&self) -> String {
        let trimmed = self.stderr.trim();
        if trimmed.is_empty() {
            "external tool failed without output".to_string()
        } else {
            trimmed.to_string()
        }
    }
}

/// Runs an external program and waits for it to exit
///
/// Implementations never panic and never return an error: a missing binary
/// or a non-zero exit becomes an `Invocation` with `ok == false`.
pub trait ProcessRunner {
    fn run(&self, program: &Path, args: &[OsString]) -> Invocation;
}

impl<R: ProcessRunner + ?Sized> ProcessRunner for &R {
    fn run(&self, program: &Path, args: &[OsString]) -> Invocation {
        (**self).run(program, args)
    }
}

/// [`ProcessRunner`] backed by `std::process::Command`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(&self, program: &Path, args: &[OsString]) -> Invocation {
        log::debug!("exec: {} {}", program.display(), render_args(args));

        let result = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output();

        match result {
            Ok(output) => Invocation::from_output(program, &output),
            Err(e) => Invocation::spawn_failed(program, &e),
        }
    }
}

/// Render an argument vector for log output
pub fn render_args(args: &[OsString]) -> String {
    args.iter()
        .map(|a| {
            let s = a.to_string_lossy();
            if s.is_empty() || s.contains(char::is_whitespace) {
                format!("\"{}\"", s)
            } else {
                s.into_owned()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
