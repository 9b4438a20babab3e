//! Child process execution with a timeout and bounded output.

use std::io::{ErrorKind, Read};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

/// Captured output of one finished (or killed) child.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_truncated: usize,
    pub stderr_truncated: usize,
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.status.success()
    }

    /// Stdout followed by stderr, lossily decoded, with truncation notices.
    pub fn combined_text(&self) -> String {
        let mut text = String::from_utf8_lossy(&self.stdout).into_owned();
        if self.stdout_truncated > 0 {
            text.push_str(&format!("\n[stdout truncated {} bytes]\n", self.stdout_truncated));
        }
        text.push_str(&String::from_utf8_lossy(&self.stderr));
        if self.stderr_truncated > 0 {
            text.push_str(&format!("\n[stderr truncated {} bytes]\n", self.stderr_truncated));
        }
        text
    }

    /// Human-readable reason for a failed run, `None` on success.
    pub fn failure_reason(&self, timeout: Duration) -> Option<String> {
        if self.timed_out {
            return Some(format!("timed out after {}s", timeout.as_secs()));
        }
        if self.status.success() {
            return None;
        }
        Some(match self.status.code() {
            Some(code) => format!("exit status {code}"),
            None => "terminated by signal".to_string(),
        })
    }
}

/// Build a command that runs `command` through the host shell in `workdir`.
pub fn shell_command(command: &str, workdir: &Path) -> Command {
    let mut cmd = if cfg!(windows) {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C").arg(command);
        cmd
    } else {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        cmd
    };
    cmd.current_dir(workdir);
    cmd
}

/// How long to keep collecting output after the child has exited. Pipes still
/// held open past this point belong to background processes and are abandoned.
const OUTPUT_DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Run a command with a timeout and capture stdout/stderr without risking pipe deadlocks.
///
/// Stdin is closed. On unix the child leads its own process group, and a
/// timeout kills the whole group. Output is drained concurrently while the
/// child runs; `output_limit_bytes` bounds what is kept per stream. The call
/// returns at most [`OUTPUT_DRAIN_GRACE`] after the child exits, even when a
/// grandchild still holds the pipes.
#[instrument(skip_all, fields(timeout_secs = timeout.as_secs(), output_limit_bytes))]
pub fn run_command_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<CommandOutput> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    debug!("spawning child process");
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(e).context("spawn command");
        }
    };

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let (tx, rx) = mpsc::channel();
    spawn_reader(Stream::Stdout, stdout, output_limit_bytes, tx.clone());
    spawn_reader(Stream::Stderr, stderr, output_limit_bytes, tx);

    let mut timed_out = false;
    let status = match child.wait_timeout(timeout).context("wait for command")? {
        Some(status) => status,
        None => {
            warn!(timeout_secs = timeout.as_secs(), "command timed out, killing");
            timed_out = true;
            kill_tree(&mut child).context("kill command")?;
            child.wait().context("wait command after kill")?
        }
    };

    let captured = collect_output(&rx, Instant::now() + OUTPUT_DRAIN_GRACE);

    if captured.stdout_truncated > 0 || captured.stderr_truncated > 0 {
        warn!(
            stdout_truncated = captured.stdout_truncated,
            stderr_truncated = captured.stderr_truncated,
            "output truncated"
        );
    }

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(CommandOutput {
        status,
        stdout: captured.stdout,
        stderr: captured.stderr,
        stdout_truncated: captured.stdout_truncated,
        stderr_truncated: captured.stderr_truncated,
        timed_out,
    })
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

enum ReaderEvent {
    /// Bytes kept under the limit, plus the count discarded from this read.
    Data {
        stream: Stream,
        kept: Vec<u8>,
        dropped: usize,
    },
    Closed(Stream),
    Failed(Stream, std::io::Error),
}

#[derive(Default)]
struct Captured {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    stdout_truncated: usize,
    stderr_truncated: usize,
}

/// Drain `reader` on its own thread, forwarding at most `limit` kept bytes.
fn spawn_reader<R: Read + Send + 'static>(
    stream: Stream,
    mut reader: R,
    limit: usize,
    tx: Sender<ReaderEvent>,
) {
    thread::spawn(move || {
        let mut kept_total = 0usize;
        let mut chunk = [0u8; 8192];
        loop {
            let n = match reader.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    let _ = tx.send(ReaderEvent::Failed(stream, e));
                    return;
                }
            };
            let keep = n.min(limit.saturating_sub(kept_total));
            kept_total += keep;
            let event = ReaderEvent::Data {
                stream,
                kept: chunk[..keep].to_vec(),
                dropped: n - keep,
            };
            if tx.send(event).is_err() {
                return;
            }
        }
        let _ = tx.send(ReaderEvent::Closed(stream));
    });
}

/// Gather reader events until both streams close or `deadline` passes.
fn collect_output(rx: &Receiver<ReaderEvent>, deadline: Instant) -> Captured {
    let mut captured = Captured::default();
    let mut open = 2;
    while open > 0 {
        let wait = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(wait) {
            Ok(ReaderEvent::Data {
                stream,
                kept,
                dropped,
            }) => {
                let (buf, truncated) = match stream {
                    Stream::Stdout => (&mut captured.stdout, &mut captured.stdout_truncated),
                    Stream::Stderr => (&mut captured.stderr, &mut captured.stderr_truncated),
                };
                buf.extend_from_slice(&kept);
                *truncated += dropped;
            }
            Ok(ReaderEvent::Closed(_)) => open -= 1,
            Ok(ReaderEvent::Failed(stream, err)) => {
                warn!(?stream, err = %err, "reading command output failed");
                open -= 1;
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(open, "output still held open by a background process, not waiting");
                break;
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    captured
}

/// Kill the child's whole process group so pipeline stages and background
/// jobs die with it.
#[cfg(unix)]
fn kill_tree(child: &mut Child) -> std::io::Result<()> {
    match kill_process_group(child.id()) {
        Ok(()) => Ok(()),
        Err(err) => {
            warn!(err = %err, "killing process group failed, killing child only");
            child.kill()
        }
    }
}

#[cfg(not(unix))]
fn kill_tree(child: &mut Child) -> std::io::Result<()> {
    child.kill()
}

#[cfg(unix)]
#[allow(unsafe_code)]
fn kill_process_group(pid: u32) -> std::io::Result<()> {
    let pgid = libc::pid_t::try_from(pid)
        .map_err(|_| std::io::Error::other(format!("pid {pid} out of range")))?;
    // SAFETY: killpg only sends a signal. The child was spawned with
    // `process_group(0)` and has not been reaped, so `pgid` is its group.
    let rc = unsafe { libc::killpg(pgid, libc::SIGKILL) };
    if rc == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}
