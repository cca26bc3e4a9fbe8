//! Worker process transport port (spec §4.B "Fallback mode"). Callers never
//! observe which implementation is in use; only `Worker::spawn_mode` changes.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::errors::StoreResult;

/// A line of output plus which stream it came from.
#[derive(Debug, Clone)]
pub struct OutputEvent {
    pub handle: String,
    pub line: String,
}

/// A running child process handle. Implementations hide whether the
/// underlying mechanism is a real OS process, a multiplexer pane, or an
/// in-memory stub.
#[async_trait]
pub trait ProcessHandle: Send + Sync {
    async fn write_stdin(&self, message: &str) -> StoreResult<()>;
    async fn send_interrupt(&self) -> StoreResult<()>;
    async fn terminate(&self) -> StoreResult<()>;
    async fn kill(&self) -> StoreResult<()>;
    fn pid(&self) -> Option<i32>;
    /// `true` once the child has exited.
    fn has_exited(&self) -> bool;
}

/// Spawns agent child processes and wires their combined stdout/stderr to an
/// output channel, one line per message.
#[async_trait]
pub trait ProcessTransport: Send + Sync {
    async fn spawn(
        &self,
        handle: &str,
        working_dir: &str,
        env: &[(String, String)],
        output_tx: mpsc::UnboundedSender<OutputEvent>,
    ) -> StoreResult<Box<dyn ProcessHandle>>;
}
