//! Execution of a single DUT invocation.

use crate::capture::StreamCapture;
use crate::error::Error;
use crate::settings::TestSettings;
#[cfg(unix)]
use std::os::unix::process::ExitStatusExt;
use std::{
    process::{ExitStatus, Stdio},
    time::{Duration, Instant},
};
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// How long output is still drained once the child has exited or been killed.
const DRAIN_GRACE_PERIOD: Duration = Duration::from_millis(500);

/// Size of the buffers the child's streams are read into.
const READ_CHUNK_SIZE: usize = 4096;

/// How a DUT invocation ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Termination {
    /// The process exited with the given code.
    Exited(i32),
    /// The process was terminated by the given signal.
    Signaled(i32),
    /// The process was killed by the harness after its timeout expired.
    TimedOut,
}

impl Termination {
    fn from_status(status: ExitStatus, timed_out: bool) -> Self {
        if timed_out {
            Self::TimedOut
        } else {
            match status.code() {
                Some(code) => Self::Exited(code),
                None => Self::from_signal(status),
            }
        }
    }

    #[cfg(unix)]
    fn from_signal(status: ExitStatus) -> Self {
        status.signal().map_or(Self::Exited(-1), Self::Signaled)
    }

    #[cfg(not(unix))]
    const fn from_signal(_status: ExitStatus) -> Self {
        Self::Exited(-1)
    }

    /// Returns the observed return code; signal terminations are reported as
    /// the negated signal number.
    pub const fn ret_code(self) -> Option<i32> {
        match self {
            Self::Exited(code) => Some(code),
            Self::Signaled(signal) => Some(-signal),
            Self::TimedOut => None,
        }
    }
}

/// Raw outcome of a DUT invocation.
#[derive(Debug)]
pub(crate) struct RunResult {
    pub stdout: StreamCapture,
    pub stderr: StreamCapture,
    pub termination: Termination,
    pub duration: Duration,
}

/// Which deadline the run loop is currently racing against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Deadline {
    Timeout,
    Drain,
}

/// Runs `command` through the platform shell, capturing both output streams.
pub(crate) async fn run_command(command: &str, settings: &TestSettings) -> Result<RunResult, Error> {
    let mut cmd = shell_command(command);
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    if let Some(working_dir) = &settings.working_dir {
        cmd.current_dir(working_dir);
    }

    #[cfg(unix)]
    // SAFETY:
    // The child is placed in a new session so that the whole process tree it spawns
    // can be killed through its process group. pre_exec runs in the child after fork()
    // and before exec(), where only async-signal-safe operations are allowed; setsid()
    // is such an operation and neither allocates nor touches forked state.
    unsafe {
        cmd.pre_exec(|| {
            let _ = nix::unistd::setsid();
            Ok(())
        })
    };

    tracing::debug!(target: "commands", "spawning: {command}");

    let start_time = Instant::now();
    let mut child = cmd
        .spawn()
        .map_err(|e| Error::SpawnFailed(command.to_owned(), e))?;
    let process_group = child.id();

    let mut stdout = child
        .stdout
        .take()
        .ok_or(Error::StreamUnavailable("stdout"))?;
    let mut stderr = child
        .stderr
        .take()
        .ok_or(Error::StreamUnavailable("stderr"))?;

    let mut stdout_capture = StreamCapture::new(settings.pipe_limit);
    let mut stderr_capture = StreamCapture::new(settings.pipe_limit);
    let mut stdout_buf = [0u8; READ_CHUNK_SIZE];
    let mut stderr_buf = [0u8; READ_CHUNK_SIZE];
    let mut stdout_open = true;
    let mut stderr_open = true;

    let mut status: Option<ExitStatus> = None;
    let mut timed_out = false;

    let mut deadline = settings.timeout.map(|_| Deadline::Timeout);
    let sleep = tokio::time::sleep(settings.timeout.unwrap_or(Duration::ZERO));
    tokio::pin!(sleep);

    while status.is_none() || stdout_open || stderr_open {
        tokio::select! {
            read = stdout.read(&mut stdout_buf), if stdout_open => match read? {
                0 => stdout_open = false,
                len => {
                    let kept = stdout_capture.push(&stdout_buf[..len]);
                    tracing::trace!(target: "commands", "stdout: {} bytes", kept.len());
                    if settings.pipe {
                        forward(tokio::io::stdout(), kept).await;
                    }
                }
            },
            read = stderr.read(&mut stderr_buf), if stderr_open => match read? {
                0 => stderr_open = false,
                len => {
                    let kept = stderr_capture.push(&stderr_buf[..len]);
                    tracing::trace!(target: "commands", "stderr: {} bytes", kept.len());
                    if settings.pipe {
                        forward(tokio::io::stderr(), kept).await;
                    }
                }
            },
            exited = child.wait(), if status.is_none() => {
                let exit_status = exited?;
                tracing::debug!(target: "commands", "child exited: {exit_status}");
                status = Some(exit_status);

                // Descendants may keep the pipes open after the child is gone.
                if (stdout_open || stderr_open) && deadline != Some(Deadline::Drain) {
                    deadline = Some(Deadline::Drain);
                    sleep.as_mut().reset(tokio::time::Instant::now() + DRAIN_GRACE_PERIOD);
                }
            },
            () = &mut sleep, if deadline.is_some() => {
                if deadline == Some(Deadline::Timeout) {
                    tracing::debug!(target: "commands", "timeout expired; killing process group");
                    timed_out = true;
                    kill_process_group(process_group);
                    if let Err(e) = child.start_kill() {
                        tracing::debug!(target: "commands", "failed to kill child: {e}");
                    }
                    deadline = Some(Deadline::Drain);
                    sleep.as_mut().reset(tokio::time::Instant::now() + DRAIN_GRACE_PERIOD);
                } else {
                    tracing::debug!(target: "commands", "grace period expired; abandoning open streams");
                    kill_process_group(process_group);
                    break;
                }
            },
        }
    }

    let status = match status {
        Some(status) => status,
        None => {
            if let Err(e) = child.start_kill() {
                tracing::debug!(target: "commands", "failed to kill child: {e}");
            }
            child.wait().await?
        }
    };

    Ok(RunResult {
        stdout: stdout_capture,
        stderr: stderr_capture,
        termination: Termination::from_status(status, timed_out),
        duration: start_time.elapsed(),
    })
}

/// Forwards captured output to the harness's own streams.
pub(crate) async fn echo_output(stdout: &[u8], stderr: &[u8]) {
    forward(tokio::io::stdout(), stdout).await;
    forward(tokio::io::stderr(), stderr).await;
}

#[cfg(unix)]
fn shell_command(command: &str) -> tokio::process::Command {
    let mut cmd = tokio::process::Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

#[cfg(windows)]
fn shell_command(command: &str) -> tokio::process::Command {
    let mut cmd = tokio::process::Command::new("cmd");
    cmd.arg("/C").raw_arg(command);
    cmd
}

#[cfg(unix)]
fn kill_process_group(process_group: Option<u32>) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    if let Some(pgid) = process_group.and_then(|id| i32::try_from(id).ok()) {
        if let Err(e) = killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
            tracing::trace!(target: "commands", "killpg({pgid}) failed: {e}");
        }
    }
}

#[cfg(not(unix))]
const fn kill_process_group(_process_group: Option<u32>) {}

async fn forward<W: AsyncWrite + Unpin>(mut writer: W, bytes: &[u8]) {
    if bytes.is_empty() {
        return;
    }

    let result = match writer.write_all(bytes).await {
        Ok(()) => writer.flush().await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        tracing::debug!("failed to forward output: {e}");
    }
}
