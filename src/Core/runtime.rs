// Boundary surface consumed from the native runtime.
//
// The managed side never touches native storage directly: every read, write,
// buffer lock and delivery goes through `NativeRuntime`, keyed by an opaque
// `NativeHandle`.

use crate::Core::error::{BridgeError, Result};
use crate::Msg::Structs::{AudioDataFmt, MsgKind, PixelFmt, StatusCode};
use std::fmt::Debug;
use std::ptr::NonNull;
use std::sync::Arc;

/// Opaque identity of a message instance inside the native runtime.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NativeHandle(u64);

impl NativeHandle {
    pub const fn from_raw(raw: u64) -> Self {
        NativeHandle(raw)
    }

    pub const fn as_raw(self) -> u64 {
        self.0
    }
}

/// Capability returned by a successful buffer lock. It is the only thing
/// that can release that lock; it is neither `Clone` nor `Copy`, and safe
/// code cannot build one:
///
/// ```compile_fail
/// use axis_msgbridge::Core::{LockToken, NativeHandle};
/// let forged = LockToken::new(NativeHandle::from_raw(1), 1);
/// ```
#[derive(Debug, PartialEq, Eq)]
pub struct LockToken {
    handle: NativeHandle,
    generation: u64,
}

impl LockToken {
    /// Mint the token for a lock just granted on `handle`.
    ///
    /// # Safety
    /// Only a `NativeRuntime` implementation may call this, once per granted
    /// lock, with the generation it recorded for that lock. A second token
    /// for the same lock lets its holder release the region while the first
    /// holder still dereferences it.
    pub unsafe fn new(handle: NativeHandle, generation: u64) -> Self {
        Self { handle, generation }
    }

    pub fn handle(&self) -> NativeHandle {
        self.handle
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Location of a locked, runtime-owned byte region.
#[derive(Debug, Clone, Copy)]
pub struct BufRegion {
    pub ptr: NonNull<u8>,
    pub len: usize,
}

/// Variant-specific fields reachable through `get_field`/`set_field`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Field {
    CmdId,
    StatusCode,
    IsFinal,
    IsCompleted,
    Timestamp,
    SampleRate,
    SamplesPerChannel,
    BytesPerSample,
    NumberOfChannels,
    DataFmt,
    LineSize,
    Eof,
    Width,
    Height,
    PixelFmt,
}

impl Field {
    /// Whether a message of `kind` carries this field.
    pub fn applies_to(self, kind: MsgKind) -> bool {
        use Field::*;
        match self {
            CmdId => matches!(kind, MsgKind::Cmd | MsgKind::CmdResult),
            StatusCode | IsFinal | IsCompleted => kind == MsgKind::CmdResult,
            Timestamp | Eof => matches!(kind, MsgKind::AudioFrame | MsgKind::VideoFrame),
            SampleRate | SamplesPerChannel | BytesPerSample | NumberOfChannels | DataFmt
            | LineSize => kind == MsgKind::AudioFrame,
            Width | Height | PixelFmt => kind == MsgKind::VideoFrame,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FieldValue {
    I64(i64),
    U64(u64),
    U32(u32),
    Bool(bool),
    Status(StatusCode),
    DataFmt(AudioDataFmt),
    PixelFmt(PixelFmt),
}

macro_rules! field_value_getter {
    ($name:ident, $variant:ident, $ty:ty) => {
        pub fn $name(self) -> Result<$ty> {
            match self {
                FieldValue::$variant(v) => Ok(v),
                other => Err(BridgeError::invalid(format!(
                    "expected {} field value, got {:?}",
                    stringify!($variant),
                    other
                ))),
            }
        }
    };
}

impl FieldValue {
    field_value_getter!(as_i64, I64, i64);
    field_value_getter!(as_u64, U64, u64);
    field_value_getter!(as_u32, U32, u32);
    field_value_getter!(as_bool, Bool, bool);
    field_value_getter!(as_status, Status, StatusCode);
    field_value_getter!(as_data_fmt, DataFmt, AudioDataFmt);
    field_value_getter!(as_pixel_fmt, PixelFmt, PixelFmt);
}

/// Entry point the runtime calls to hand a message into managed code.
pub trait DeliverySink: Send + Sync {
    fn deliver(&self, kind: MsgKind, handle: NativeHandle) -> Result<()>;
}

/// Identity of a sink, ignoring trait-object metadata.
pub fn same_sink(a: &Arc<dyn DeliverySink>, b: &Arc<dyn DeliverySink>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

/// The native runtime as seen from the managed side.
///
/// Reference counting: `create` returns a handle holding one reference that
/// belongs to the caller; `retain` adds one, `destroy` drops one. Storage is
/// torn down when the count reaches zero, so neither side alone decides the
/// lifetime of a native message.
pub trait NativeRuntime: Send + Sync + Debug {
    fn create(&self, kind: MsgKind, name: &str) -> Result<NativeHandle>;

    fn retain(&self, handle: NativeHandle) -> Result<()>;

    fn destroy(&self, handle: NativeHandle);

    fn kind(&self, handle: NativeHandle) -> Result<MsgKind>;

    fn name(&self, handle: NativeHandle) -> Result<String>;

    /// Replace the buffer with a zeroed region of `size` bytes.
    fn alloc_buf(&self, handle: NativeHandle, size: usize) -> Result<()>;

    fn buf_size(&self, handle: NativeHandle) -> Result<usize>;

    /// Grant exclusive access to the buffer bytes.
    fn lock_buf(&self, handle: NativeHandle) -> Result<(LockToken, BufRegion)>;

    /// Release the lock described by `token`. The token stays with the
    /// caller so a failed release does not lose it.
    fn unlock_buf(&self, handle: NativeHandle, token: &LockToken) -> Result<()>;

    fn is_buf_locked(&self, handle: NativeHandle) -> Result<bool>;

    /// Snapshot copy of the buffer. Fails while the buffer is locked.
    fn copy_buf(&self, handle: NativeHandle) -> Result<Vec<u8>>;

    fn get_field(&self, handle: NativeHandle, field: Field) -> Result<FieldValue>;

    fn set_field(&self, handle: NativeHandle, field: Field, value: FieldValue) -> Result<()>;

    fn get_property(&self, handle: NativeHandle, path: &str) -> Result<Option<serde_json::Value>>;

    fn set_property(&self, handle: NativeHandle, path: &str, value: serde_json::Value)
        -> Result<()>;

    /// Hand an outbound message to the runtime for routing.
    fn send(&self, handle: NativeHandle) -> Result<()>;

    /// Install the sink used for runtime-initiated deliveries. A runtime
    /// serves one env at a time: attaching while another sink is installed
    /// fails and leaves that sink in place.
    fn attach(&self, sink: Arc<dyn DeliverySink>) -> Result<()>;

    /// End-of-life notification for the env owning `sink`. A no-op unless
    /// `sink` is the one installed.
    fn detach(&self, sink: &Arc<dyn DeliverySink>);
}
