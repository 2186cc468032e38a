use std::collections::VecDeque;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use regex::Regex;
use tokio::io::AsyncReadExt;
use tokio::process::{ChildStderr, Command};
use tokio::sync::mpsc::Sender;
use tracing::{debug, info, warn};

use crate::encoder::invocation::InvocationPlan;
use crate::error::{ComposerError, EncoderError, Result};

/// Lines of stderr kept for error reports
const STDERR_TAIL_LINES: usize = 400;

/// One progress update parsed from the encoder's stderr
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    /// Seconds of output written so far
    pub elapsed: f64,

    /// Completion against the expected duration, when that is known
    pub percent: Option<f64>,
}

/// Result of a successful run
#[derive(Debug, Clone)]
pub struct RunOutput {
    /// The executed command, shell-quoted
    pub command_line: String,

    /// Captured diagnostic output (tail)
    pub stderr: String,
}

/// Extracts `time=HH:MM:SS.ss` markers from encoder status lines
#[derive(Debug, Clone)]
pub struct ProgressParser {
    pattern: Regex,
    expected_duration: Option<f64>,
}

impl ProgressParser {
    pub fn new(expected_duration: Option<f64>) -> Result<Self> {
        let pattern = Regex::new(r"time=\s*(\d+):(\d{2}):(\d{2}(?:\.\d+)?)")
            .map_err(|e| ComposerError::generic(format!("Invalid progress pattern: {}", e)))?;
        Ok(Self {
            pattern,
            expected_duration: expected_duration.filter(|d| *d > 0.0),
        })
    }

    /// Elapsed output seconds mentioned in `line`, if any
    pub fn elapsed(&self, line: &str) -> Option<f64> {
        let captures = self.pattern.captures(line)?;
        let hours: f64 = captures[1].parse().ok()?;
        let minutes: f64 = captures[2].parse().ok()?;
        let seconds: f64 = captures[3].parse().ok()?;
        Some(hours * 3600.0 + minutes * 60.0 + seconds)
    }

    pub fn parse(&self, line: &str) -> Option<Progress> {
        let elapsed = self.elapsed(line)?;
        let percent = self
            .expected_duration
            .map(|total| (elapsed / total * 100.0).clamp(0.0, 100.0));
        Some(Progress { elapsed, percent })
    }
}

/// Runs external tools and reports their progress
#[derive(Debug, Clone, Default)]
pub struct EncoderRunner {
    timeout: Option<Duration>,
}

impl EncoderRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill the process if it runs longer than `timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run `plan` to completion
    ///
    /// Progress events are sent to `progress` when given; a dropped receiver
    /// only stops the events, not the process.
    pub async fn run(
        &self,
        plan: &InvocationPlan,
        progress: Option<Sender<Progress>>,
    ) -> Result<RunOutput> {
        let command_line = plan.command_line();
        info!("Running: {}", command_line);

        let parser = ProgressParser::new(plan.expected_duration)?;
        let program = plan.program.as_path();

        let mut child = Command::new(program)
            .args(&plan.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EncoderError::LaunchFailed {
                program: program.display().to_string(),
                reason: e.to_string(),
            })?;

        let stderr = child.stderr.take().ok_or_else(|| EncoderError::LaunchFailed {
            program: program.display().to_string(),
            reason: "stderr was not captured".to_string(),
        })?;
        let reader = tokio::spawn(collect_stderr(stderr, parser, progress));

        let status = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
                Ok(status) => status?,
                Err(_) => {
                    warn!("{} exceeded {}s, killing it", program.display(), limit.as_secs());
                    if let Err(e) = child.kill().await {
                        warn!("Failed to kill {}: {}", program.display(), e);
                    }
                    return Err(EncoderError::TimedOut { seconds: limit.as_secs() }.into());
                }
            },
            None => child.wait().await?,
        };

        let stderr = reader
            .await
            .map_err(|e| ComposerError::generic(format!("stderr reader failed: {}", e)))?;

        if !status.success() {
            warn!("{} failed with {}", program.display(), status);
            return Err(EncoderError::ProcessFailed {
                code: status.code(),
                stderr,
            }
            .into());
        }

        debug!("{} finished successfully", program.display());
        Ok(RunOutput { command_line, stderr })
    }

    /// Run a program with plain arguments, without progress tracking
    pub async fn run_args<P: AsRef<Path>>(
        &self,
        program: P,
        args: Vec<String>,
    ) -> Result<RunOutput> {
        self.run(&InvocationPlan::new(program.as_ref(), args), None).await
    }
}

/// Read stderr to the end, splitting on `\r` as well as `\n` since status
/// lines are rewritten in place
async fn collect_stderr(
    mut stderr: ChildStderr,
    parser: ProgressParser,
    mut progress: Option<Sender<Progress>>,
) -> String {
    let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);
    let mut pending: Vec<u8> = Vec::new();
    let mut buffer = [0u8; 4096];
    let mut last_reported = -1.0;
    let mut finished = false;

    while !finished {
        match stderr.read(&mut buffer).await {
            Ok(0) => finished = true,
            Ok(n) => pending.extend_from_slice(&buffer[..n]),
            Err(e) => {
                warn!("Failed to read process output: {}", e);
                finished = true;
            }
        }

        let mut lines = Vec::new();
        while let Some(end) = pending.iter().position(|b| *b == b'\r' || *b == b'\n') {
            let raw: Vec<u8> = pending.drain(..=end).collect();
            lines.push(String::from_utf8_lossy(&raw[..end]).trim().to_string());
        }
        if finished && !pending.is_empty() {
            lines.push(String::from_utf8_lossy(&pending).trim().to_string());
            pending.clear();
        }

        for line in lines.into_iter().filter(|l| !l.is_empty()) {
            if let Some(update) = parser.parse(&line) {
                if update.elapsed > last_reported {
                    last_reported = update.elapsed;
                    report(update, &mut progress).await;
                }
            }
            if tail.len() == STDERR_TAIL_LINES {
                tail.pop_front();
            }
            tail.push_back(line);
        }
    }

    Vec::from(tail).join("\n")
}

async fn report(update: Progress, progress: &mut Option<Sender<Progress>>) {
    match update.percent {
        Some(percent) => debug!("Progress: {:.1}% ({:.2}s)", percent, update.elapsed),
        None => debug!("Progress: {:.2}s", update.elapsed),
    }

    let closed = match progress.as_ref() {
        Some(sender) => sender.send(update).await.is_err(),
        None => false,
    };
    if closed {
        *progress = None;
    }
}
