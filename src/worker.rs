use std::fmt::Display;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::thread;

use crate::logger::get_reporter;
use crate::utils::{ErrorStr, Result};


const MODULE: &str = "WORKER";

pub const SPAWN_ERROR: &str = "could not spawn worker process";
pub const PIPE_ERROR: &str = "worker pipe unavailable";
pub const EXCHANGE_ERROR: &str = "worker exchange failed";
pub const WORKER_EXITED_ERROR: &str = "worker process exited";
pub const WORKER_UNHEALTHY_ERROR: &str = "worker is unhealthy";


struct Pipes {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

/// A long-lived child process answering one line per forwarded request.
///
/// All connection handlers of a dynamic site share the same pair of pipes,
/// so the exchange is serialized: one request in flight at a time, and the
/// reply line on the shared stream belongs to the request written just
/// before it. A worker that errors or closes its pipes is marked unhealthy
/// and every later exchange fails fast.
// TODO: respawn the worker once it goes unhealthy instead of failing fast
pub struct Worker {
    command: String,
    pipes: Mutex<Pipes>,
    healthy: AtomicBool,
}

impl Worker {
    /// Launches `sh -c <command>` with piped standard streams. Stderr is
    /// drained into the log by a background thread so a chatty worker
    /// cannot fill the pipe and stall.
    pub fn spawn(command: &str) -> Result<Worker> {
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(get_reporter(MODULE, "Spawn", SPAWN_ERROR))?;

        let stdin = child.stdin.take().ok_or(PIPE_ERROR)?;
        let stdout = BufReader::new(child.stdout.take().ok_or(PIPE_ERROR)?);
        if let Some(stderr) = child.stderr.take() {
            let tag = command.to_string();
            thread::spawn(move || {
                for line in BufReader::new(stderr).lines().flatten() {
                    debug!("[{}] `{}` stderr: {}", MODULE, tag, line);
                }
            });
        }

        info!("[{}] Spawned worker `{}` (pid {})", MODULE, command, child.id());

        Ok(Worker {
            command: command.to_string(),
            pipes: Mutex::new(Pipes { child, stdin, stdout }),
            healthy: AtomicBool::new(true),
        })
    }

    /// Writes one serialized request and reads back exactly one reply
    /// line, stripped of its line terminator.
    pub fn exchange(&self, request: &[u8]) -> Result<String> {
        if !self.is_healthy() {
            return Err(WORKER_UNHEALTHY_ERROR);
        }

        let mut pipes = self.pipes.lock().map_err(get_reporter(MODULE, "Lock", PIPE_ERROR))?;

        pipes.stdin.write_all(request).map_err(|e| self.fail(e))?;
        pipes.stdin.flush().map_err(|e| self.fail(e))?;

        let mut line = String::new();
        let n = pipes.stdout.read_line(&mut line).map_err(|e| self.fail(e))?;
        if n == 0 {
            error!("[{}] Worker `{}` closed its output stream", MODULE, self.command);
            self.healthy.store(false, Ordering::SeqCst);
            return Err(WORKER_EXITED_ERROR);
        }

        Ok(line.trim_end_matches(|c| c == '\r' || c == '\n').to_string())
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }

    fn fail(&self, e: impl Display) -> ErrorStr {
        self.healthy.store(false, Ordering::SeqCst);
        get_reporter(MODULE, "Exchange", EXCHANGE_ERROR)(e)
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        if let Ok(mut pipes) = self.pipes.lock() {
            pipes.child.kill().ok();
            pipes.child.wait().ok();
        }
    }
}
