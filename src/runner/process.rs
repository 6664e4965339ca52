//! Child process lifecycle for one handler invocation.

use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use super::{Invocation, RunnerLimits};
use crate::dispatch::CancelToken;

/// What happened to the child, before its output is interpreted.
#[derive(Debug)]
pub(super) enum ProcessOutcome {
    Exited {
        status: ExitStatus,
        stdout: Vec<u8>,
        stderr: Vec<u8>,
    },
    OutputTooLarge {
        limit: usize,
    },
    TimedOut {
        after: Duration,
    },
    Cancelled,
    SpawnFailed(io::Error),
}

enum Captured {
    Complete { stdout: Vec<u8>, status: ExitStatus },
    Overflow,
}

enum Race {
    Finished(io::Result<Captured>),
    Deadline(Duration),
    Cancelled,
}

pub(super) async fn run_process(
    invocation: &Invocation,
    limits: &RunnerLimits,
    timeout: Duration,
    cancel: &CancelToken,
) -> ProcessOutcome {
    let template = invocation.descriptor.command();
    let mut command = Command::new(template.program());
    command
        .args(template.render(&invocation.target))
        .current_dir(&invocation.working_dir)
        .env_clear()
        .envs(limits.child_env())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    #[cfg(unix)]
    command.process_group(0);

    let started = Instant::now();
    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(err) => return ProcessOutcome::SpawnFailed(err),
    };
    let pid = child.id();
    debug!(
        ecosystem = invocation.descriptor.ecosystem(),
        target = %invocation.target.display(),
        pid = ?pid,
        "Handler spawned"
    );

    let stdout = child.stdout.take();
    let stderr_task = child
        .stderr
        .take()
        .map(|stderr| tokio::spawn(read_head(stderr, limits.stderr_limit)));

    let race = {
        let max_output = limits.max_output_bytes;
        let work = async {
            let captured = match stdout {
                Some(mut stdout) => read_capped(&mut stdout, max_output).await?,
                None => Some(Vec::new()),
            };
            match captured {
                Some(stdout) => {
                    let status = child.wait().await?;
                    Ok(Captured::Complete { stdout, status })
                }
                None => Ok(Captured::Overflow),
            }
        };

        tokio::select! {
            result = work => Race::Finished(result),
            _ = tokio::time::sleep(timeout) => Race::Deadline(started.elapsed()),
            _ = cancel.cancelled() => Race::Cancelled,
        }
    };

    match race {
        Race::Finished(Ok(Captured::Complete { stdout, status })) => {
            let stderr = collect_stderr(stderr_task, limits.grace_period).await;
            debug!(
                ecosystem = invocation.descriptor.ecosystem(),
                status = %status,
                stdout_bytes = stdout.len(),
                "Handler exited"
            );
            ProcessOutcome::Exited {
                status,
                stdout,
                stderr,
            }
        }
        Race::Finished(Ok(Captured::Overflow)) => {
            warn!(
                ecosystem = invocation.descriptor.ecosystem(),
                limit = limits.max_output_bytes,
                "Handler output exceeded ceiling, terminating"
            );
            terminate(&mut child, pid, limits.grace_period).await;
            ProcessOutcome::OutputTooLarge {
                limit: limits.max_output_bytes,
            }
        }
        Race::Finished(Err(err)) => {
            terminate(&mut child, pid, limits.grace_period).await;
            ProcessOutcome::SpawnFailed(err)
        }
        Race::Deadline(after) => {
            warn!(
                ecosystem = invocation.descriptor.ecosystem(),
                target = %invocation.target.display(),
                timeout_ms = timeout.as_millis() as u64,
                "Handler timed out, terminating"
            );
            terminate(&mut child, pid, limits.grace_period).await;
            ProcessOutcome::TimedOut { after }
        }
        Race::Cancelled => {
            debug!(
                ecosystem = invocation.descriptor.ecosystem(),
                "Run cancelled, terminating handler"
            );
            terminate(&mut child, pid, limits.grace_period).await;
            ProcessOutcome::Cancelled
        }
    }
}

/// Reads at most `limit` bytes. `None` means the stream had more.
async fn read_capped<R>(reader: &mut R, limit: usize) -> io::Result<Option<Vec<u8>>>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = Vec::new();
    let ceiling = (limit as u64).saturating_add(1);
    reader.take(ceiling).read_to_end(&mut buffer).await?;
    if buffer.len() > limit {
        Ok(None)
    } else {
        Ok(Some(buffer))
    }
}

/// Keeps the first `limit` bytes and drains the rest so the child never
/// blocks on a full pipe.
async fn read_head<R>(mut reader: R, limit: usize) -> Vec<u8>
where
    R: AsyncRead + Unpin,
{
    let mut head = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                let room = limit.saturating_sub(head.len());
                head.extend_from_slice(&chunk[..n.min(room)]);
            }
        }
    }
    head
}

async fn collect_stderr(
    task: Option<tokio::task::JoinHandle<Vec<u8>>>,
    wait: Duration,
) -> Vec<u8> {
    let Some(task) = task else {
        return Vec::new();
    };
    match tokio::time::timeout(wait, task).await {
        Ok(Ok(head)) => head,
        _ => Vec::new(),
    }
}

/// SIGTERM to the process group, then SIGKILL once the grace period is over.
async fn terminate(child: &mut Child, pid: Option<u32>, grace: Duration) {
    #[cfg(unix)]
    {
        use nix::sys::signal::Signal;

        if let Some(pid) = pid {
            signal_group(pid, Signal::SIGTERM);
            if tokio::time::timeout(grace, child.wait()).await.is_err() {
                debug!(pid, "Handler ignored SIGTERM");
            }
            signal_group(pid, Signal::SIGKILL);
        }
    }

    #[cfg(not(unix))]
    let _ = (pid, grace);

    if let Err(err) = child.kill().await {
        debug!(error = %err, "Handler already gone");
    }
}

#[cfg(unix)]
fn signal_group(pid: u32, signal: nix::sys::signal::Signal) {
    use nix::errno::Errno;
    use nix::sys::signal::killpg;
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return;
    };
    match killpg(Pid::from_raw(raw), signal) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(err) => warn!(pid, ?signal, error = %err, "Failed to signal handler process group"),
    }
}
