//! Blocking execution of external processes.

use std::io::{ErrorKind, Read, Write};
use std::process::Stdio;

use scenecast_common::error::{ScenecastError, ScenecastResult};
use serde::Serialize;

use crate::invocation::Invocation;

/// How much of the end of a child's stderr is kept in [`ProcessOutcome`].
pub const STDERR_TAIL_BYTES: usize = 64 * 1024;

/// Exit status and captured standard error of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProcessOutcome {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    /// Last [`STDERR_TAIL_BYTES`] of standard error.
    pub stderr: String,
}

impl ProcessOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Launches an [`Invocation`] and waits for it to exit.
///
/// A nonzero exit is reported through [`ProcessOutcome`], not as an error;
/// errors are reserved for processes that could not be run at all.
pub trait CommandRunner {
    fn run(&mut self, invocation: &Invocation) -> ScenecastResult<ProcessOutcome>;
}

impl<R: CommandRunner + ?Sized> CommandRunner for &mut R {
    fn run(&mut self, invocation: &Invocation) -> ScenecastResult<ProcessOutcome> {
        (**self).run(invocation)
    }
}

/// Runs invocations as child processes of this one.
///
/// stdout is inherited so renderer progress shows up as it happens.
/// stderr is forwarded byte for byte as it is read, so `\r`-terminated
/// encoder progress is not held back, and its tail is captured for the
/// outcome.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&mut self, invocation: &Invocation) -> ScenecastResult<ProcessOutcome> {
        let mut cmd = invocation.to_command();
        cmd.stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::piped());

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ScenecastError::ExecutableNotFound {
                    stage: invocation.stage,
                    path: invocation.program.clone(),
                });
            }
            Err(source) => {
                return Err(ScenecastError::SpawnFailed {
                    stage: invocation.stage,
                    path: invocation.program.clone(),
                    source,
                });
            }
        };

        tracing::debug!(
            stage = %invocation.stage,
            pid = child.id(),
            "Process started"
        );

        let stderr = child.stderr.take().ok_or_else(|| {
            ScenecastError::Other(anyhow::anyhow!(
                "failed to capture {} stderr",
                invocation.stage.tool()
            ))
        })?;

        // Drain stderr on its own thread so the child never blocks on a
        // full pipe while we wait on it.
        let stderr_task = std::thread::spawn(move || -> String {
            let mut stderr = stderr;
            let mut sink = std::io::stderr();
            let mut captured = Vec::new();
            let mut buf = [0u8; 8192];
            loop {
                match stderr.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        sink.write_all(&buf[..n]).ok();
                        sink.flush().ok();
                        captured.extend_from_slice(&buf[..n]);
                        if captured.len() > STDERR_TAIL_BYTES {
                            let excess = captured.len() - STDERR_TAIL_BYTES;
                            captured.drain(..excess);
                        }
                    }
                    Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                    Err(err) => {
                        captured.extend_from_slice(format!("<failed to read stderr: {err}>").as_bytes());
                        break;
                    }
                }
            }
            String::from_utf8_lossy(&captured).into_owned()
        });

        let status = child.wait()?;
        let stderr = stderr_task
            .join()
            .unwrap_or_else(|_| "<failed to join stderr reader>".to_string());

        Ok(ProcessOutcome {
            exit_code: status.code(),
            stderr,
        })
    }
}
