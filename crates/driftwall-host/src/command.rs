//! Spawns the host binaries (`zfs`, `zpool`, `smbcontrol`, `smbstatus`) with
//! a per-call timeout, draining both pipes on helper threads so a chatty
//! child never blocks on a full pipe.

use driftwall_core::{DriftwallError, DriftwallResult};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStderr, ChildStdout, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// A concrete binary path; the timeout is chosen per invocation.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    path: PathBuf,
}

/// Collected stdout, stderr and exit status of a finished command.
#[derive(Debug)]
pub struct Output {
    pub stdout: String,
    pub stderr: String,
    pub status: i32,
}

impl Output {
    /// Stderr if the tool wrote any, otherwise stdout.
    pub fn diagnostic(&self) -> &str {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim()
        } else {
            stderr
        }
    }
}

impl CommandRunner {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn binary(&self) -> &Path {
        &self.path
    }

    /// Execute the binary and capture its result. A command still running
    /// after `timeout` is killed and reported as an error.
    pub fn run(&self, args: &[&str], timeout: Duration) -> DriftwallResult<Output> {
        let mut command = Command::new(&self.path);
        command.args(args);
        command.stdin(Stdio::null());
        command.stdout(Stdio::piped());
        command.stderr(Stdio::piped());

        let mut child = command.spawn().map_err(|err| {
            DriftwallError::Provider(format!("failed to start {}: {}", self.path.display(), err))
        })?;

        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();
        self.wait_with_timeout(child, stdout_pipe, stderr_pipe, args, timeout)
    }

    fn wait_with_timeout(
        &self,
        mut child: Child,
        stdout_pipe: Option<ChildStdout>,
        stderr_pipe: Option<ChildStderr>,
        args: &[&str],
        timeout: Duration,
    ) -> DriftwallResult<Output> {
        let start = Instant::now();
        let stdout_handle = Self::spawn_output_reader(stdout_pipe);
        let stderr_handle = Self::spawn_output_reader(stderr_pipe);
        let mut exit_status = None;

        while start.elapsed() <= timeout {
            if let Some(status) = child.try_wait()? {
                exit_status = Some(status);
                break;
            }
            thread::sleep(Duration::from_millis(25));
        }

        let Some(exit_status) = exit_status else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(DriftwallError::Provider(format!(
                "{} {} timed out after {:?}",
                self.path.display(),
                args.join(" "),
                timeout
            )));
        };

        let stdout = stdout_handle
            .join()
            .map_err(|_| DriftwallError::Provider("stdout reader thread panicked".into()))??;
        let stderr = stderr_handle
            .join()
            .map_err(|_| DriftwallError::Provider("stderr reader thread panicked".into()))??;

        Ok(Output {
            stdout,
            stderr,
            status: exit_status.code().unwrap_or(-1),
        })
    }

    fn spawn_output_reader<R>(pipe: Option<R>) -> thread::JoinHandle<DriftwallResult<String>>
    where
        R: Read + Send + 'static,
    {
        thread::spawn(move || -> DriftwallResult<String> {
            let Some(mut reader) = pipe else {
                return Ok(String::new());
            };
            let mut buf = Vec::new();
            reader.read_to_end(&mut buf)?;
            Ok(String::from_utf8_lossy(&buf).to_string())
        })
    }
}
