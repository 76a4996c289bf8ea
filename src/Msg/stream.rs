// Per-command result streams: Pending -> Streaming -> Final.

use super::cmd::CmdResult;
use crate::Core::error::{BridgeError, Result};
use crate::Core::futex::{futex_wait, futex_wait_timeout, futex_wake_all};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StreamState {
    /// Sent, nothing received yet.
    Pending,
    /// At least one non-final result received.
    Streaming,
    /// The final result was received. Terminal.
    Final,
}

pub(crate) struct StreamInner {
    pub(crate) state: StreamState,
    pub(crate) queue: VecDeque<CmdResult>,
    pub(crate) accepted: usize,
}

pub(crate) struct StreamShared {
    pub(crate) cmd_id: u64,
    pub(crate) inner: Mutex<StreamInner>,
    /// Bumped on every accepted result; receivers futex-wait on it.
    signal: AtomicU32,
}

impl StreamShared {
    pub(crate) fn new(cmd_id: u64) -> Self {
        Self {
            cmd_id,
            inner: Mutex::new(StreamInner {
                state: StreamState::Pending,
                queue: VecDeque::new(),
                accepted: 0,
            }),
            signal: AtomicU32::new(0),
        }
    }

    /// Queue `result` in arrival order. Returns whether it ended the stream.
    pub(crate) fn accept(&self, result: CmdResult) -> Result<bool> {
        let cmd_id = result.cmd_id()?;
        if cmd_id != self.cmd_id {
            log::warn!("result for cmd {} offered to stream of cmd {}", cmd_id, self.cmd_id);
            return Err(BridgeError::invalid(format!(
                "result belongs to cmd {}, not {}",
                cmd_id, self.cmd_id
            )));
        }
        let is_final = result.is_final()?;
        {
            let mut inner = self.inner.lock();
            if inner.state == StreamState::Final {
                log::warn!("late result for cmd {} rejected", self.cmd_id);
                return Err(BridgeError::LateResult {
                    cmd_id: self.cmd_id,
                });
            }
            if is_final {
                result.mark_completed()?;
                inner.state = StreamState::Final;
            } else {
                inner.state = StreamState::Streaming;
            }
            inner.accepted += 1;
            inner.queue.push_back(result);
        }

        self.signal.fetch_add(1, Ordering::Release);
        futex_wake_all(&self.signal);
        log::debug!(
            "cmd {} accepted {} result",
            self.cmd_id,
            if is_final { "final" } else { "partial" }
        );
        Ok(is_final)
    }

    /// `Ok(Some)` with the next result, `Ok(None)` when the stream is
    /// finished and drained, `Err(())` when nothing is queued yet.
    fn poll(&self) -> std::result::Result<Option<CmdResult>, ()> {
        let mut inner = self.inner.lock();
        match inner.queue.pop_front() {
            Some(result) => Ok(Some(result)),
            None if inner.state == StreamState::Final => Ok(None),
            None => Err(()),
        }
    }
}

/// Receiving end of one command's results, in the order the runtime
/// produced them.
///
/// Dropping the stream before the final result makes any further result for
/// the command a `LateResult`.
pub struct ResultStream {
    pub(crate) shared: Arc<StreamShared>,
}

impl ResultStream {
    pub(crate) fn new(shared: Arc<StreamShared>) -> Self {
        Self { shared }
    }

    pub fn cmd_id(&self) -> u64 {
        self.shared.cmd_id
    }

    pub fn state(&self) -> StreamState {
        self.shared.inner.lock().state
    }

    /// True once the final result has arrived, never before.
    pub fn is_completed(&self) -> bool {
        self.state() == StreamState::Final
    }

    /// Results accepted so far, consumed or not.
    pub fn accepted(&self) -> usize {
        self.shared.inner.lock().accepted
    }

    /// Routing entry point. Fails with `LateResult` once the stream is final
    /// and with `InvalidArgument` for a result of another command.
    pub fn accept(&self, result: CmdResult) -> Result<()> {
        self.shared.accept(result).map(|_| ())
    }

    /// Next queued result without blocking.
    pub fn try_recv(&self) -> Option<CmdResult> {
        self.shared.poll().ok().flatten()
    }

    /// Block until the next result. `None` once the final result has been
    /// taken.
    pub fn recv(&self) -> Option<CmdResult> {
        loop {
            // Read the signal before polling so a wake between the two is not lost.
            let seen = self.shared.signal.load(Ordering::Acquire);
            if let Ok(next) = self.shared.poll() {
                return next;
            }
            futex_wait(&self.shared.signal, seen);
        }
    }

    /// `recv` giving up after `timeout`.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<CmdResult> {
        let deadline = Instant::now() + timeout;
        loop {
            let seen = self.shared.signal.load(Ordering::Acquire);
            if let Ok(next) = self.shared.poll() {
                return next;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            futex_wait_timeout(&self.shared.signal, seen, remaining);
        }
    }
}

impl Iterator for ResultStream {
    type Item = CmdResult;

    fn next(&mut self) -> Option<CmdResult> {
        self.recv()
    }
}

impl std::fmt::Debug for ResultStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        crate::Debug::StructDebug::debug_result_stream(self, f)
    }
}
