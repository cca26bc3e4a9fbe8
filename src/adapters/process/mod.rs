//! OS-process transport: the production `ProcessTransport` implementation
//! (spec §4.B, §6 "Agent child process contract").

use async_trait::async_trait;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, Mutex};

use crate::domain::errors::{StoreError, StoreResult};
use crate::domain::ports::{OutputEvent, ProcessHandle, ProcessTransport};

/// Spawns agent children as real OS processes, piping stdin/stdout/stderr.
pub struct OsProcessTransport;

#[async_trait]
impl ProcessTransport for OsProcessTransport {
    async fn spawn(
        &self,
        handle: &str,
        working_dir: &str,
        env: &[(String, String)],
        output_tx: mpsc::UnboundedSender<OutputEvent>,
    ) -> StoreResult<Box<dyn ProcessHandle>> {
        let mut command = Command::new("claude");
        command
            .current_dir(working_dir)
            .envs(env.iter().cloned())
            .arg("--print")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = command
            .spawn()
            .map_err(|err| StoreError::Fatal(format!("failed to spawn worker {handle}: {err}")))?;

        let pid = child.id().map(|p| p as i32);
        let stdout = child.stdout.take().ok_or_else(|| StoreError::Fatal("worker stdout not piped".into()))?;
        let stderr = child.stderr.take().ok_or_else(|| StoreError::Fatal("worker stderr not piped".into()))?;

        let exited = Arc::new(AtomicBool::new(false));
        spawn_reader(handle.to_string(), stdout, output_tx.clone());
        spawn_reader(handle.to_string(), stderr, output_tx);

        Ok(Box::new(OsProcessHandle { pid, child: Mutex::new(child), exited }))
    }
}

fn spawn_reader<R: tokio::io::AsyncRead + Unpin + Send + 'static>(
    handle: String,
    stream: R,
    output_tx: mpsc::UnboundedSender<OutputEvent>,
) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if output_tx.send(OutputEvent { handle: handle.clone(), line }).is_err() {
                break;
            }
        }
    });
}

struct OsProcessHandle {
    pid: Option<i32>,
    child: Mutex<Child>,
    exited: Arc<AtomicBool>,
}

#[async_trait]
impl ProcessHandle for OsProcessHandle {
    async fn write_stdin(&self, message: &str) -> StoreResult<()> {
        let mut child = self.child.lock().await;
        let stdin = child.stdin.as_mut().ok_or_else(|| StoreError::Fatal("worker stdin closed".into()))?;
        stdin
            .write_all(format!("{message}\n").as_bytes())
            .await
            .map_err(|err| StoreError::Fatal(format!("failed to write worker stdin: {err}")))
    }

    async fn send_interrupt(&self) -> StoreResult<()> {
        self.signal(Signal::SIGINT)
    }

    async fn terminate(&self) -> StoreResult<()> {
        self.signal(Signal::SIGTERM)
    }

    async fn kill(&self) -> StoreResult<()> {
        self.signal(Signal::SIGKILL)
    }

    fn pid(&self) -> Option<i32> {
        self.pid
    }

    fn has_exited(&self) -> bool {
        self.exited.load(Ordering::Acquire)
    }
}

impl OsProcessHandle {
    fn signal(&self, signal: Signal) -> StoreResult<()> {
        let Some(pid) = self.pid else {
            return Ok(());
        };
        match signal::kill(Pid::from_raw(pid), signal) {
            Ok(()) => Ok(()),
            Err(nix::errno::Errno::ESRCH) => {
                self.exited.store(true, Ordering::Release);
                Ok(())
            }
            Err(err) => Err(StoreError::Fatal(format!("signal {signal} to pid {pid} failed: {err}"))),
        }
    }
}
