//! Shell command execution with concurrently drained output streams.
//!
//! stdout and stderr are each read on their own thread for as long as the
//! command runs. A child whose pipe is not read blocks once the pipe buffer
//! fills, so neither stream is ever read after `wait()`.

use std::env;
use std::io::{self, Read, Write};
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};

use crate::error::{CommandFailedDetails, Error, Result};

const CHUNK_SIZE: usize = 8 * 1024;

/// Captured output of a finished command.
#[derive(Debug, Clone, Default)]
pub struct CapturedOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_code: Option<i32>,
}

/// Run `<shell> -c <command>` in the current working directory.
///
/// Both output streams are forwarded to `progress` as they arrive and
/// accumulated in memory. A non-zero exit, a spawn failure or a failed read
/// of either stream is an error.
pub fn execute(shell: &str, command: &str, progress: &mut dyn Write) -> Result<CapturedOutput> {
    let cwd = env::current_dir().map_err(|e| Error::spawn_failed(command, e.to_string()))?;

    let mut child = Command::new(shell)
        .arg("-c")
        .arg(command)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| Error::spawn_failed(command, e.to_string()))?;

    let (stdout, stderr) = match (child.stdout.take(), child.stderr.take()) {
        (Some(out), Some(err)) => (out, err),
        _ => {
            let _ = child.kill();
            let _ = child.wait();
            return Err(Error::drain_failed("output", "stream was not captured"));
        }
    };

    let (tx, rx) = mpsc::channel();
    let stdout_drain = spawn_drain(stdout, tx.clone());
    let stderr_drain = spawn_drain(stderr, tx);

    // Ends once both drains have dropped their sender.
    for chunk in rx {
        let _ = progress.write_all(&chunk);
    }
    let _ = progress.flush();

    let stdout = join_drain(stdout_drain, "stdout");
    let stderr = join_drain(stderr_drain, "stderr");

    let status = child
        .wait()
        .map_err(|e| Error::drain_failed("exit status", e.to_string()))?;

    if !status.success() {
        return Err(Error::command_failed(CommandFailedDetails {
            command: command.to_string(),
            exit_code: status.code(),
            stdout: stdout
                .as_ref()
                .map(|b| String::from_utf8_lossy(b).to_string())
                .unwrap_or_default(),
            stderr: stderr
                .as_ref()
                .map(|b| String::from_utf8_lossy(b).to_string())
                .unwrap_or_default(),
        }));
    }

    Ok(CapturedOutput {
        stdout: stdout?,
        stderr: stderr?,
        exit_code: status.code(),
    })
}

fn spawn_drain<R>(mut reader: R, tx: Sender<Vec<u8>>) -> JoinHandle<io::Result<Vec<u8>>>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut captured = Vec::new();
        let mut chunk = [0u8; CHUNK_SIZE];
        loop {
            let n = match reader.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            captured.extend_from_slice(&chunk[..n]);
            // The receiver only goes away if the caller stopped forwarding.
            let _ = tx.send(chunk[..n].to_vec());
        }
        Ok(captured)
    })
}

fn join_drain(handle: JoinHandle<io::Result<Vec<u8>>>, stream: &str) -> Result<Vec<u8>> {
    match handle.join() {
        Ok(Ok(buf)) => Ok(buf),
        Ok(Err(e)) => Err(Error::drain_failed(stream, e.to_string())),
        Err(_) => Err(Error::drain_failed(stream, "drain thread panicked")),
    }
}
