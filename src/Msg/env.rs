// The managed side's entry point: sends messages to the runtime, receives
// deliveries from it, and routes command results to their streams.

use super::audio_frame::AudioFrame;
use super::builder::EnvBuilder;
use super::cmd::{Cmd, CmdResult};
use super::data::Data;
use super::message::Message;
use super::msg::Msg;
use super::registry::{BoundaryRegistry, LiveWrappers};
use super::stream::{ResultStream, StreamShared};
use super::video_frame::VideoFrame;
use crate::Core::error::{BridgeError, Result};
use crate::Core::runtime::{DeliverySink, NativeHandle, NativeRuntime};
use crate::Msg::Structs::MsgKind;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

pub type MsgHandler = Arc<dyn Fn(&Env, Message) + Send + Sync>;

pub(crate) struct EnvShared {
    pub(crate) runtime: Arc<dyn NativeRuntime>,
    pub(crate) registry: &'static BoundaryRegistry,
    pub(crate) live: Arc<LiveWrappers>,
    pub(crate) max_buf_size: usize,
    next_cmd_id: AtomicU64,
    streams: Mutex<HashMap<u64, Weak<StreamShared>>>,
    /// Inbound commands already answered with a final result. Grows by one id
    /// per answered command for the env's lifetime; cmd ids are never reused,
    /// so an entry can never be retired without reopening that id to a second
    /// final.
    finished_inbound: Mutex<HashSet<u64>>,
    on_msg: RwLock<Option<MsgHandler>>,
    /// What the runtime delivers through; also our identity on detach.
    sink: Arc<dyn DeliverySink>,
}

impl Drop for EnvShared {
    fn drop(&mut self) {
        // End-of-life notification: the runtime may release what it held for us.
        self.runtime.detach(&self.sink);
        log::debug!("env torn down");
    }
}

/// Handle to one attachment of managed code to a native runtime.
/// Cheap to clone; the runtime is detached when the last clone drops.
#[derive(Clone)]
pub struct Env {
    pub(crate) shared: Arc<EnvShared>,
}

impl Env {
    pub fn builder() -> EnvBuilder {
        EnvBuilder::new()
    }

    /// Env on `runtime` with the process-wide registry and default limits.
    pub fn new(runtime: Arc<dyn NativeRuntime>) -> Result<Env> {
        EnvBuilder::new().with_runtime(runtime).build()
    }

    /// Attach a new env to `runtime`. Fails when the runtime already serves
    /// another env; that env stays attached.
    pub(crate) fn from_parts(
        runtime: Arc<dyn NativeRuntime>,
        registry: &'static BoundaryRegistry,
        max_buf_size: usize,
    ) -> Result<Env> {
        let shared = Arc::new_cyclic(|weak: &Weak<EnvShared>| EnvShared {
            runtime,
            registry,
            live: Arc::new(LiveWrappers::new()),
            max_buf_size,
            next_cmd_id: AtomicU64::new(1),
            streams: Mutex::new(HashMap::new()),
            finished_inbound: Mutex::new(HashSet::new()),
            on_msg: RwLock::new(None),
            sink: Arc::new(EnvSink { env: weak.clone() }),
        });
        // On failure `shared` drops here, and its detach is ignored by the
        // runtime because our sink was never installed.
        shared.runtime.attach(shared.sink.clone())?;
        Ok(Env { shared })
    }

    pub fn runtime(&self) -> &Arc<dyn NativeRuntime> {
        &self.shared.runtime
    }

    pub fn registry(&self) -> &'static BoundaryRegistry {
        self.shared.registry
    }

    pub(crate) fn live(&self) -> &Arc<LiveWrappers> {
        &self.shared.live
    }

    pub fn max_buf_size(&self) -> usize {
        self.shared.max_buf_size
    }

    /// Native messages that currently have a managed wrapper.
    pub fn live_wrapper_count(&self) -> usize {
        self.shared.live.len()
    }

    /// Streams still waiting for their final result.
    pub fn open_streams(&self) -> usize {
        self.shared
            .streams
            .lock()
            .values()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    /// Install the handler for delivered messages other than command results.
    pub fn on_msg<F>(&self, handler: F)
    where
        F: Fn(&Env, Message) + Send + Sync + 'static,
    {
        *self.shared.on_msg.write() = Some(Arc::new(handler));
    }

    // ---------------------------------------------------------------------
    // Outbound
    // ---------------------------------------------------------------------

    /// Send `cmd` and open the stream its results arrive on.
    pub fn send_cmd(&self, cmd: &Cmd) -> Result<ResultStream> {
        cmd.check_crossable()?;
        let cmd_id = self.shared.next_cmd_id.fetch_add(1, Ordering::Relaxed);
        cmd.set_cmd_id(cmd_id)?;

        // Registered before sending: an inline responder answers before `send` returns.
        let shared = Arc::new(StreamShared::new(cmd_id));
        {
            let mut streams = self.shared.streams.lock();
            streams.retain(|_, w| w.strong_count() > 0);
            streams.insert(cmd_id, Arc::downgrade(&shared));
        }

        log::debug!("sending cmd '{}' as {}", cmd.name(), cmd_id);
        if let Err(e) = self.shared.runtime.send(cmd.handle()) {
            self.shared.streams.lock().remove(&cmd_id);
            return Err(e);
        }
        Ok(ResultStream::new(shared))
    }

    pub fn send_data(&self, data: &Data) -> Result<()> {
        self.send_msg(data)
    }

    pub fn send_audio_frame(&self, frame: &AudioFrame) -> Result<()> {
        self.send_msg(frame)
    }

    pub fn send_video_frame(&self, frame: &VideoFrame) -> Result<()> {
        self.send_msg(frame)
    }

    /// Hand any message to the runtime. Refused while its buffer is locked.
    pub fn send_msg(&self, msg: &Msg) -> Result<()> {
        msg.check_crossable()?;
        log::debug!("sending {:?} '{}'", msg.kind(), msg.name());
        self.shared.runtime.send(msg.handle())
    }

    /// Answer a command the runtime delivered to us. Nothing may follow a
    /// final result for the same command.
    pub fn return_result(&self, result: &CmdResult) -> Result<()> {
        result.check_crossable()?;
        let cmd_id = result.cmd_id()?;
        let is_final = result.is_final()?;

        let mut finished = self.shared.finished_inbound.lock();
        if finished.contains(&cmd_id) {
            log::warn!("result returned after final for cmd {}", cmd_id);
            return Err(BridgeError::LateResult { cmd_id });
        }
        self.shared.runtime.send(result.handle())?;
        if is_final {
            finished.insert(cmd_id);
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Inbound
    // ---------------------------------------------------------------------

    /// Shell-construct the managed wrapper for `handle` and dispatch it.
    pub(crate) fn deliver(&self, kind: MsgKind, handle: NativeHandle) -> Result<()> {
        let ctor = self.registry().resolve(kind)?;
        let message = ctor(Msg::create_shell(self, handle, kind)?);
        log::debug!("delivered {:?} '{}'", kind, message.name());

        match message {
            Message::CmdResult(result) => self.route_result(result),
            other => {
                let handler = self.shared.on_msg.read().clone();
                match handler {
                    Some(handler) => handler(self, other),
                    None => log::debug!(
                        "no handler for delivered {:?} '{}', releasing",
                        other.kind(),
                        other.name()
                    ),
                }
                Ok(())
            }
        }
    }

    fn route_result(&self, result: CmdResult) -> Result<()> {
        let cmd_id = result.cmd_id()?;
        let stream = self
            .shared
            .streams
            .lock()
            .get(&cmd_id)
            .and_then(Weak::upgrade);

        let Some(stream) = stream else {
            self.shared.streams.lock().remove(&cmd_id);
            if cmd_id != 0 && cmd_id < self.shared.next_cmd_id.load(Ordering::Relaxed) {
                log::warn!("result for finished cmd {} rejected", cmd_id);
                return Err(BridgeError::LateResult { cmd_id });
            }
            return Err(BridgeError::native(format!(
                "result for unknown cmd {}",
                cmd_id
            )));
        };

        if stream.accept(result)? {
            self.shared.streams.lock().remove(&cmd_id);
        }
        Ok(())
    }
}

impl std::fmt::Debug for Env {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        crate::Debug::StructDebug::debug_env(self, f)
    }
}

/// What the runtime holds to reach us. Weak, so a runtime outliving its
/// env never keeps the env alive.
struct EnvSink {
    env: Weak<EnvShared>,
}

impl DeliverySink for EnvSink {
    fn deliver(&self, kind: MsgKind, handle: NativeHandle) -> Result<()> {
        let Some(shared) = self.env.upgrade() else {
            log::warn!("delivery of {} to a torn-down env", handle.as_raw());
            return Err(BridgeError::native("env is gone"));
        };
        let env = Env { shared };
        env.deliver(kind, handle).map_err(|e| {
            log::error!("delivery of {:?} {} failed: {}", kind, handle.as_raw(), e);
            e
        })
    }
}
