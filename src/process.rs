//! External process execution
//!
//! Child output is always captured. When not silenced it is also mirrored
//! live to our own stdout/stderr while the child runs.

use std::io::{self, Read, Write};
use std::process::{Command, Stdio};
use std::thread;

use serde::de::DeserializeOwned;

use crate::error::{AppError, Result};

/// Arguments for a spawned program
///
/// A single string is split on whitespace; lists are taken as is.
pub trait IntoArgs {
    fn into_args(self) -> Vec<String>;
}

impl IntoArgs for &str {
    fn into_args(self) -> Vec<String> {
        self.split_whitespace().map(str::to_string).collect()
    }
}

impl IntoArgs for String {
    fn into_args(self) -> Vec<String> {
        self.as_str().into_args()
    }
}

impl IntoArgs for Vec<String> {
    fn into_args(self) -> Vec<String> {
        self
    }
}

impl IntoArgs for &[String] {
    fn into_args(self) -> Vec<String> {
        self.to_vec()
    }
}

impl IntoArgs for &[&str] {
    fn into_args(self) -> Vec<String> {
        self.iter().map(|arg| arg.to_string()).collect()
    }
}

impl<const N: usize> IntoArgs for [&str; N] {
    fn into_args(self) -> Vec<String> {
        self.iter().map(|arg| arg.to_string()).collect()
    }
}

/// Captured result of a finished process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub program: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// stdout, or stderr when nothing was written to stdout
    pub fn into_text(self) -> String {
        if self.stdout.is_empty() {
            self.stderr
        } else {
            self.stdout
        }
    }

    /// Error describing a failed run
    ///
    /// The message is whatever the process printed (stderr first) and the
    /// exit code is carried over.
    pub fn into_error(self) -> AppError {
        let message = if !self.stderr.is_empty() {
            self.stderr
        } else if !self.stdout.is_empty() {
            self.stdout
        } else {
            format!("`{}` exited with code {}", self.program, self.exit_code)
        };

        AppError::new(message).with_exit_code(self.exit_code)
    }
}

/// Spawn `program` and wait for it, regardless of its exit code
///
/// Only a failure to start the process is an error here.
pub fn execute(program: &str, args: &[String], silence: bool) -> Result<ProcessOutput> {
    tracing::debug!("Running `{} {}` (silenced: {})", program, args.join(" "), silence);

    let mut child = Command::new(program)
        .args(args)
        .stdin(if silence { Stdio::null() } else { Stdio::inherit() })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            AppError::extend(
                format!("Failed to run `{}`", program),
                e,
                [format!("Is `{}` installed and on your PATH?", program)],
            )
        })?;

    let child_stdout = child.stdout.take();
    let child_stderr = child.stderr.take();

    let (stdout, stderr) = thread::scope(|scope| {
        let stdout = scope.spawn(move || drain(child_stdout, (!silence).then(io::stdout)));
        let stderr = scope.spawn(move || drain(child_stderr, (!silence).then(io::stderr)));

        (
            stdout.join().unwrap_or_default(),
            stderr.join().unwrap_or_default(),
        )
    });

    let status = child.wait().map_err(|e| {
        AppError::extend(
            format!("Failed to wait for `{}`", program),
            e,
            Vec::<String>::new(),
        )
    })?;

    // Killed by a signal
    let exit_code = status.code().unwrap_or(1);
    tracing::debug!("`{}` exited with code {}", program, exit_code);

    Ok(ProcessOutput {
        program: program.to_string(),
        exit_code,
        stdout: decode(&stdout),
        stderr: decode(&stderr),
    })
}

/// Run `program` to completion, failing on a nonzero exit code
///
/// Returns the captured stdout, or stderr if stdout was empty.
pub fn run(program: &str, args: &[String], silence: bool) -> Result<String> {
    let output = execute(program, args, silence)?;

    if !output.success() {
        return Err(output.into_error());
    }

    Ok(output.into_text())
}

/// Run `program` and parse its output as JSON
pub fn run_json<T: DeserializeOwned>(program: &str, args: &[String], silence: bool) -> Result<T> {
    let output = run(program, args, silence)?;

    serde_json::from_str(&output).map_err(|e| {
        AppError::extend(
            format!(
                "Failed to parse JSON output of `{} {}`",
                program,
                args.join(" ")
            ),
            e,
            Vec::<String>::new(),
        )
    })
}

/// Copy everything from `source` into a buffer, mirroring it as it arrives
fn drain<R: Read, W: Write>(source: Option<R>, mut mirror: Option<W>) -> Vec<u8> {
    let mut captured = Vec::new();
    let Some(mut source) = source else {
        return captured;
    };

    let mut buf = [0u8; 8192];
    loop {
        let read = match source.read(&mut buf) {
            Ok(0) => break,
            Ok(read) => read,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::debug!("Stopped reading child output: {}", e);
                break;
            }
        };

        if let Some(out) = mirror.as_mut() {
            if out.write_all(&buf[..read]).and_then(|_| out.flush()).is_err() {
                mirror = None;
            }
        }

        captured.extend_from_slice(&buf[..read]);
    }

    captured
}

fn decode(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches(['\n', '\r'])
        .to_string()
}
