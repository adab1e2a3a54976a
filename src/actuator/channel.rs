//! Ordered, rate-limited dispatch of commands on a dedicated thread.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, TryRecvError, unbounded};
use tracing::{debug, info, warn};

use super::command::Command;
use super::sink::CommandSink;
use crate::error::{Error, Result};

/// Counters reported when dispatch stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub sent: u64,
    pub failed: u64,
}

/// FIFO queue drained by a dispatcher thread at a fixed tick.
///
/// Each tick writes at most one command to the sink. Sending never blocks the
/// caller; write failures are logged and the command is dropped.
pub struct CommandChannel {
    sender: Option<Sender<Command>>,
    handle: Option<JoinHandle<DispatchStats>>,
}

impl CommandChannel {
    pub fn spawn(sink: impl CommandSink, tick: Duration) -> Result<Self> {
        let (sender, receiver) = unbounded::<Command>();
        let handle = thread::Builder::new()
            .name("command-dispatch".into())
            .spawn(move || dispatch_loop(receiver, sink, tick))
            .map_err(|e| Error::SinkUnavailable(format!("failed to spawn dispatcher: {e}")))?;

        Ok(Self {
            sender: Some(sender),
            handle: Some(handle),
        })
    }

    /// Queue a command. Returns false once the channel is closed.
    pub fn send(&self, command: Command) -> bool {
        match &self.sender {
            Some(sender) => sender.send(command).is_ok(),
            None => {
                debug!("Command channel closed, discarding {command}");
                false
            }
        }
    }

    /// Number of commands waiting for a tick.
    pub fn pending(&self) -> usize {
        self.sender.as_ref().map_or(0, |s| s.len())
    }

    /// Stop accepting commands, let the dispatcher write what is queued, and join it.
    pub fn close(&mut self) -> Option<DispatchStats> {
        drop(self.sender.take());
        let handle = self.handle.take()?;
        match handle.join() {
            Ok(stats) => Some(stats),
            Err(_) => {
                warn!("Command dispatcher panicked");
                None
            }
        }
    }
}

impl Drop for CommandChannel {
    fn drop(&mut self) {
        self.close();
    }
}

fn dispatch_loop(
    receiver: Receiver<Command>,
    mut sink: impl CommandSink,
    tick: Duration,
) -> DispatchStats {
    let ticker = crossbeam_channel::tick(tick);
    let mut stats = DispatchStats::default();
    let mut failing = false;

    while ticker.recv().is_ok() {
        let command = match receiver.try_recv() {
            Ok(command) => command,
            Err(TryRecvError::Empty) => continue,
            Err(TryRecvError::Disconnected) => break,
        };

        match sink.write_line(&command.to_line()) {
            Ok(()) => {
                stats.sent += 1;
                if failing {
                    info!("Actuator link recovered");
                    failing = false;
                }
            }
            Err(e) => {
                stats.failed += 1;
                let err = Error::SinkUnavailable(e.to_string());
                if failing {
                    debug!("Dropping command {command}: {err}");
                } else {
                    warn!("Dropping command {command}: {err}");
                    failing = true;
                }
            }
        }
    }

    sink.close();
    info!(
        "Command dispatch stopped ({} sent, {} failed)",
        stats.sent, stats.failed
    );
    stats
}
