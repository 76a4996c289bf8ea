// In-process reference implementation of the native runtime.
//
// Owns the authoritative message storage and the byte buffers. Managed
// wrappers only ever see `NativeHandle`s and locked `BufRegion`s.

use crate::Core::error::{BridgeError, Result};
use crate::Core::runtime::{
    same_sink, BufRegion, DeliverySink, Field, FieldValue, LockToken, NativeHandle,
    NativeRuntime,
};
use crate::Msg::Structs::{AudioFrameMeta, CmdResultMeta, MsgKind, StatusCode, VideoFrameMeta};
use crossbeam_utils::CachePadded;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
mod debug;
mod getters;
mod props;

/// Default upper bound for a single buffer allocation (64MB).
pub const DEFAULT_MAX_BUF_SIZE: usize = 64 * 1024 * 1024;

/// Lock word value meaning "no outstanding lock".
const UNLOCKED: u64 = 0;

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Largest buffer `alloc_buf` will hand out.
    pub max_buf_size: usize,
    /// Run command responders on their own thread instead of inline.
    pub threaded_dispatch: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_buf_size: DEFAULT_MAX_BUF_SIZE,
            threaded_dispatch: false,
        }
    }
}

impl RuntimeConfig {
    pub fn with_max_buf_size(mut self, size: usize) -> Self {
        self.max_buf_size = size;
        self
    }

    pub fn with_threaded_dispatch(mut self, threaded: bool) -> Self {
        self.threaded_dispatch = threaded;
        self
    }
}

/// Variant-specific storage of one native message.
#[derive(Debug, Clone, Copy)]
pub(crate) enum KindFields {
    Plain,
    Cmd { cmd_id: u64 },
    CmdResult(CmdResultMeta),
    Audio(AudioFrameMeta),
    Video(VideoFrameMeta),
}

impl KindFields {
    fn for_kind(kind: MsgKind) -> Self {
        match kind {
            MsgKind::Generic | MsgKind::Data => KindFields::Plain,
            MsgKind::Cmd => KindFields::Cmd { cmd_id: 0 },
            MsgKind::CmdResult => KindFields::CmdResult(CmdResultMeta {
                // A lone result is its own final result unless told otherwise.
                is_final: true,
                ..CmdResultMeta::default()
            }),
            MsgKind::AudioFrame => KindFields::Audio(AudioFrameMeta::default()),
            MsgKind::VideoFrame => KindFields::Video(VideoFrameMeta::default()),
        }
    }

    fn get(&self, field: Field) -> Option<FieldValue> {
        use FieldValue as V;
        let value = match (self, field) {
            (KindFields::Cmd { cmd_id }, Field::CmdId) => V::U64(*cmd_id),
            (KindFields::CmdResult(m), Field::CmdId) => V::U64(m.cmd_id),
            (KindFields::CmdResult(m), Field::StatusCode) => V::Status(m.status_code),
            (KindFields::CmdResult(m), Field::IsFinal) => V::Bool(m.is_final),
            (KindFields::CmdResult(m), Field::IsCompleted) => V::Bool(m.is_completed),
            (KindFields::Audio(m), Field::Timestamp) => V::I64(m.timestamp),
            (KindFields::Audio(m), Field::SampleRate) => V::U32(m.sample_rate),
            (KindFields::Audio(m), Field::SamplesPerChannel) => V::U32(m.samples_per_channel),
            (KindFields::Audio(m), Field::BytesPerSample) => V::U32(m.bytes_per_sample),
            (KindFields::Audio(m), Field::NumberOfChannels) => V::U32(m.number_of_channels),
            (KindFields::Audio(m), Field::DataFmt) => V::DataFmt(m.data_fmt),
            (KindFields::Audio(m), Field::LineSize) => V::U32(m.line_size),
            (KindFields::Audio(m), Field::Eof) => V::Bool(m.eof),
            (KindFields::Video(m), Field::Timestamp) => V::I64(m.timestamp),
            (KindFields::Video(m), Field::Width) => V::U32(m.width),
            (KindFields::Video(m), Field::Height) => V::U32(m.height),
            (KindFields::Video(m), Field::PixelFmt) => V::PixelFmt(m.pixel_fmt),
            (KindFields::Video(m), Field::Eof) => V::Bool(m.eof),
            _ => return None,
        };
        Some(value)
    }

    fn set(&mut self, field: Field, value: FieldValue) -> Result<()> {
        match (self, field) {
            (KindFields::Cmd { cmd_id }, Field::CmdId) => *cmd_id = value.as_u64()?,
            (KindFields::CmdResult(m), Field::CmdId) => m.cmd_id = value.as_u64()?,
            (KindFields::CmdResult(m), Field::StatusCode) => m.status_code = value.as_status()?,
            (KindFields::CmdResult(m), Field::IsFinal) => m.is_final = value.as_bool()?,
            (KindFields::CmdResult(m), Field::IsCompleted) => m.is_completed = value.as_bool()?,
            (KindFields::Audio(m), Field::Timestamp) => m.timestamp = value.as_i64()?,
            (KindFields::Audio(m), Field::SampleRate) => m.sample_rate = value.as_u32()?,
            (KindFields::Audio(m), Field::SamplesPerChannel) => {
                m.samples_per_channel = value.as_u32()?
            }
            (KindFields::Audio(m), Field::BytesPerSample) => m.bytes_per_sample = value.as_u32()?,
            (KindFields::Audio(m), Field::NumberOfChannels) => {
                m.number_of_channels = value.as_u32()?
            }
            (KindFields::Audio(m), Field::DataFmt) => m.data_fmt = value.as_data_fmt()?,
            (KindFields::Audio(m), Field::LineSize) => m.line_size = value.as_u32()?,
            (KindFields::Audio(m), Field::Eof) => m.eof = value.as_bool()?,
            (KindFields::Video(m), Field::Timestamp) => m.timestamp = value.as_i64()?,
            (KindFields::Video(m), Field::Width) => m.width = value.as_u32()?,
            (KindFields::Video(m), Field::Height) => m.height = value.as_u32()?,
            (KindFields::Video(m), Field::PixelFmt) => m.pixel_fmt = value.as_pixel_fmt()?,
            (KindFields::Video(m), Field::Eof) => m.eof = value.as_bool()?,
            (_, field) => {
                return Err(BridgeError::invalid(format!(
                    "field {:?} not stored on this message",
                    field
                )))
            }
        }
        Ok(())
    }
}

/// One message as the runtime stores it.
pub(crate) struct NativeMsg {
    pub(crate) kind: MsgKind,
    pub(crate) name: String,
    pub(crate) refs: AtomicUsize,
    pub(crate) fields: Mutex<KindFields>,
    pub(crate) buf: Mutex<Option<Box<[u8]>>>,
    /// `UNLOCKED`, or the generation of the outstanding lock.
    pub(crate) lock_word: CachePadded<AtomicU64>,
    pub(crate) props: Mutex<serde_json::Value>,
}

impl NativeMsg {
    fn new(kind: MsgKind, name: &str) -> Self {
        Self {
            kind,
            name: name.to_owned(),
            refs: AtomicUsize::new(1),
            fields: Mutex::new(KindFields::for_kind(kind)),
            buf: Mutex::new(None),
            lock_word: CachePadded::new(AtomicU64::new(UNLOCKED)),
            props: Mutex::new(serde_json::Value::Object(serde_json::Map::new())),
        }
    }

    fn require_buf_kind(&self) -> Result<()> {
        if self.kind.carries_buf() {
            Ok(())
        } else {
            Err(BridgeError::invalid(format!(
                "message kind {:?} has no buffer",
                self.kind
            )))
        }
    }

    #[inline]
    fn is_locked(&self) -> bool {
        self.lock_word.load(Ordering::Acquire) != UNLOCKED
    }
}

pub type Responder = Arc<dyn Fn(CmdRequest) + Send + Sync>;

/// The reference native runtime.
pub struct LocalRuntime {
    config: RuntimeConfig,
    this: Weak<LocalRuntime>,
    msgs: RwLock<HashMap<NativeHandle, Arc<NativeMsg>>>,
    next_handle: AtomicU64,
    next_generation: AtomicU64,
    sink: RwLock<Option<Arc<dyn DeliverySink>>>,
    responders: RwLock<HashMap<String, Responder>>,
    outbound: Mutex<VecDeque<NativeHandle>>,
    returned: Mutex<HashMap<u64, Vec<NativeHandle>>>,
}

impl LocalRuntime {
    pub fn new(config: RuntimeConfig) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            config,
            this: this.clone(),
            msgs: RwLock::new(HashMap::new()),
            next_handle: AtomicU64::new(1),
            next_generation: AtomicU64::new(1),
            sink: RwLock::new(None),
            responders: RwLock::new(HashMap::new()),
            outbound: Mutex::new(VecDeque::new()),
            returned: Mutex::new(HashMap::new()),
        })
    }

    pub fn with_defaults() -> Arc<Self> {
        Self::new(RuntimeConfig::default())
    }

    fn get(&self, handle: NativeHandle) -> Result<Arc<NativeMsg>> {
        self.msgs.read().get(&handle).cloned().ok_or_else(|| {
            BridgeError::native(format!("unknown native handle {}", handle.as_raw()))
        })
    }

    /// Route commands named `name` to `responder`. Replaces any previous one.
    pub fn on_cmd<F>(&self, name: &str, responder: F)
    where
        F: Fn(CmdRequest) + Send + Sync + 'static,
    {
        self.responders
            .write()
            .insert(name.to_owned(), Arc::new(responder));
    }

    /// Runtime-initiated delivery of an existing message into managed code.
    /// The caller keeps its own reference; the wrapper takes another.
    pub fn deliver(&self, handle: NativeHandle) -> Result<()> {
        let kind = self.get(handle)?.kind;
        let sink = self
            .sink
            .read()
            .clone()
            .ok_or_else(|| BridgeError::native("no env attached to the runtime"))?;
        log::debug!("runtime delivering {:?} handle {}", kind, handle.as_raw());
        sink.deliver(kind, handle)
    }

    /// Take every unrouted outbound message. Each handle comes with one
    /// reference that the caller must `destroy`.
    pub fn drain_outbound(&self) -> Vec<NativeHandle> {
        self.outbound.lock().drain(..).collect()
    }

    /// Take the results the managed side returned for runtime-originated
    /// command `cmd_id`, in the order they were returned. Same ownership
    /// rule as `drain_outbound`.
    pub fn take_returned(&self, cmd_id: u64) -> Vec<NativeHandle> {
        self.returned.lock().remove(&cmd_id).unwrap_or_default()
    }

    fn dispatch_cmd(&self, handle: NativeHandle, msg: &NativeMsg) -> Result<()> {
        let responder = self.responders.read().get(&msg.name).cloned();
        let Some(responder) = responder else {
            return Err(BridgeError::native(format!(
                "no destination for cmd '{}'",
                msg.name
            )));
        };
        let runtime = self
            .this
            .upgrade()
            .ok_or_else(|| BridgeError::native("runtime is shutting down"))?;

        let cmd_id = match *msg.fields.lock() {
            KindFields::Cmd { cmd_id } => cmd_id,
            _ => 0,
        };

        // The request holds a reference to the command until the responder is done.
        self.retain(handle)?;
        let request = CmdRequest {
            runtime,
            cmd: handle,
            cmd_id,
            name: msg.name.clone(),
        };

        if self.config.threaded_dispatch {
            std::thread::spawn(move || responder(request));
        } else {
            responder(request);
        }
        Ok(())
    }
}

impl NativeRuntime for LocalRuntime {
    fn create(&self, kind: MsgKind, name: &str) -> Result<NativeHandle> {
        if name.is_empty() {
            return Err(BridgeError::invalid("message name must not be empty"));
        }
        let handle = NativeHandle::from_raw(self.next_handle.fetch_add(1, Ordering::Relaxed));
        self.msgs
            .write()
            .insert(handle, Arc::new(NativeMsg::new(kind, name)));
        log::trace!("native create {:?} '{}' -> {}", kind, name, handle.as_raw());
        Ok(handle)
    }

    fn retain(&self, handle: NativeHandle) -> Result<()> {
        // Read lock keeps a concurrent `destroy` from removing the entry mid-retain.
        let msgs = self.msgs.read();
        let msg = msgs.get(&handle).ok_or_else(|| {
            BridgeError::native(format!("retain on unknown handle {}", handle.as_raw()))
        })?;
        msg.refs.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn destroy(&self, handle: NativeHandle) {
        let mut msgs = self.msgs.write();
        let Some(msg) = msgs.get(&handle) else {
            log::warn!("destroy on unknown handle {}", handle.as_raw());
            return;
        };
        if msg.refs.fetch_sub(1, Ordering::AcqRel) == 1 {
            msgs.remove(&handle);
            log::trace!("native storage for {} released", handle.as_raw());
        }
    }

    fn kind(&self, handle: NativeHandle) -> Result<MsgKind> {
        Ok(self.get(handle)?.kind)
    }

    fn name(&self, handle: NativeHandle) -> Result<String> {
        Ok(self.get(handle)?.name.clone())
    }

    fn alloc_buf(&self, handle: NativeHandle, size: usize) -> Result<()> {
        let msg = self.get(handle)?;
        msg.require_buf_kind()?;
        if size == 0 {
            return Err(BridgeError::invalid("buffer size must be greater than zero"));
        }
        if size > self.config.max_buf_size {
            return Err(BridgeError::invalid(format!(
                "buffer size {} exceeds limit {}",
                size, self.config.max_buf_size
            )));
        }

        let mut buf = msg.buf.lock();
        if msg.is_locked() {
            return Err(BridgeError::AlreadyLocked);
        }
        // The previous region, if any, is dropped here.
        *buf = Some(vec![0u8; size].into_boxed_slice());
        Ok(())
    }

    fn buf_size(&self, handle: NativeHandle) -> Result<usize> {
        let msg = self.get(handle)?;
        let size = msg.buf.lock().as_ref().map_or(0, |b| b.len());
        Ok(size)
    }

    fn lock_buf(&self, handle: NativeHandle) -> Result<(LockToken, BufRegion)> {
        let msg = self.get(handle)?;
        msg.require_buf_kind()?;

        let mut buf = msg.buf.lock();
        let data = buf
            .as_mut()
            .ok_or_else(|| BridgeError::invalid("no buffer allocated"))?;

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        msg.lock_word
            .compare_exchange(UNLOCKED, generation, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| BridgeError::AlreadyLocked)?;

        let ptr = NonNull::new(data.as_mut_ptr())
            .ok_or_else(|| BridgeError::native("buffer region has a null base"))?;
        let region = BufRegion {
            ptr,
            len: data.len(),
        };
        // Safety: the CAS above granted exactly this lock to this generation.
        let token = unsafe { LockToken::new(handle, generation) };
        Ok((token, region))
    }

    fn unlock_buf(&self, handle: NativeHandle, token: &LockToken) -> Result<()> {
        let msg = self.get(handle)?;
        let current = msg.lock_word.load(Ordering::Acquire);
        if current == UNLOCKED {
            return Err(BridgeError::NotLocked);
        }
        if token.handle() != handle || token.generation() != current {
            return Err(BridgeError::TokenMismatch);
        }
        msg.lock_word
            .compare_exchange(current, UNLOCKED, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|_| BridgeError::TokenMismatch)
    }

    fn is_buf_locked(&self, handle: NativeHandle) -> Result<bool> {
        Ok(self.get(handle)?.is_locked())
    }

    fn copy_buf(&self, handle: NativeHandle) -> Result<Vec<u8>> {
        let msg = self.get(handle)?;
        msg.require_buf_kind()?;
        let buf = msg.buf.lock();
        if msg.is_locked() {
            return Err(BridgeError::AlreadyLocked);
        }
        Ok(buf.as_deref().map(<[u8]>::to_vec).unwrap_or_default())
    }

    fn get_field(&self, handle: NativeHandle, field: Field) -> Result<FieldValue> {
        let msg = self.get(handle)?;
        let value = msg.fields.lock().get(field);
        value.ok_or_else(|| {
            BridgeError::invalid(format!("{:?} has no field {:?}", msg.kind, field))
        })
    }

    fn set_field(&self, handle: NativeHandle, field: Field, value: FieldValue) -> Result<()> {
        let msg = self.get(handle)?;
        if !field.applies_to(msg.kind) {
            return Err(BridgeError::invalid(format!(
                "{:?} has no field {:?}",
                msg.kind, field
            )));
        }
        let result = msg.fields.lock().set(field, value);
        result
    }

    fn get_property(&self, handle: NativeHandle, path: &str) -> Result<Option<serde_json::Value>> {
        let msg = self.get(handle)?;
        let props = msg.props.lock();
        Ok(props::lookup(&props, path)?.cloned())
    }

    fn set_property(
        &self,
        handle: NativeHandle,
        path: &str,
        value: serde_json::Value,
    ) -> Result<()> {
        let msg = self.get(handle)?;
        let mut props = msg.props.lock();
        props::assign(&mut props, path, value)
    }

    fn send(&self, handle: NativeHandle) -> Result<()> {
        let msg = self.get(handle)?;
        if msg.is_locked() {
            return Err(BridgeError::LockedAtBoundary);
        }

        match msg.kind {
            MsgKind::Cmd => self.dispatch_cmd(handle, &msg),
            MsgKind::CmdResult => {
                let cmd_id = match *msg.fields.lock() {
                    KindFields::CmdResult(meta) => meta.cmd_id,
                    _ => 0,
                };
                self.retain(handle)?;
                self.returned.lock().entry(cmd_id).or_default().push(handle);
                log::debug!("runtime recorded result for cmd {}", cmd_id);
                Ok(())
            }
            kind => {
                self.retain(handle)?;
                self.outbound.lock().push_back(handle);
                log::debug!("runtime parked outbound {:?} '{}'", kind, msg.name);
                Ok(())
            }
        }
    }

    fn attach(&self, sink: Arc<dyn DeliverySink>) -> Result<()> {
        let mut current = self.sink.write();
        if current.is_some() {
            log::warn!("attach refused, runtime already serves an env");
            return Err(BridgeError::native("runtime already has an env attached"));
        }
        *current = Some(sink);
        Ok(())
    }

    fn detach(&self, sink: &Arc<dyn DeliverySink>) {
        {
            let mut current = self.sink.write();
            let ours = current
                .as_ref()
                .is_some_and(|installed| same_sink(installed, sink));
            if !ours {
                log::debug!("detach from an env that is not attached, ignored");
                return;
            }
            current.take();
        }

        // Everything parked was sent by the env going away.
        let parked: Vec<NativeHandle> = self.outbound.lock().drain(..).collect();
        let returned: Vec<NativeHandle> = self
            .returned
            .lock()
            .drain()
            .flat_map(|(_, handles)| handles)
            .collect();
        let released = parked.len() + returned.len();
        for handle in parked.into_iter().chain(returned) {
            self.destroy(handle);
        }
        log::debug!("runtime detached, released {} held messages", released);
    }
}

/// A command handed to a responder by `LocalRuntime`.
///
/// Holds a reference to the command for as long as it lives.
pub struct CmdRequest {
    runtime: Arc<LocalRuntime>,
    cmd: NativeHandle,
    cmd_id: u64,
    name: String,
}

impl CmdRequest {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cmd_id(&self) -> u64 {
        self.cmd_id
    }

    pub fn handle(&self) -> NativeHandle {
        self.cmd
    }

    pub fn runtime(&self) -> &Arc<LocalRuntime> {
        &self.runtime
    }

    /// Produce one result for this command and deliver it to managed code.
    pub fn respond(&self, status: StatusCode, is_final: bool) -> Result<()> {
        self.respond_with(status, is_final, |_, _| Ok(()))
    }

    /// Like `respond`, with a hook to fill in the result before delivery.
    pub fn respond_with<F>(&self, status: StatusCode, is_final: bool, fill: F) -> Result<()>
    where
        F: FnOnce(&LocalRuntime, NativeHandle) -> Result<()>,
    {
        let rt = &*self.runtime;
        let result = rt.create(MsgKind::CmdResult, &self.name)?;

        let delivered = (|| -> Result<()> {
            rt.set_field(result, Field::CmdId, FieldValue::U64(self.cmd_id))?;
            rt.set_field(result, Field::StatusCode, FieldValue::Status(status))?;
            rt.set_field(result, Field::IsFinal, FieldValue::Bool(is_final))?;
            fill(rt, result)?;
            rt.deliver(result)
        })();

        // Managed code holds its own reference if it kept the result.
        rt.destroy(result);
        delivered
    }
}

impl Drop for CmdRequest {
    fn drop(&mut self) {
        self.runtime.destroy(self.cmd);
    }
}
