// Boundary registry: kind -> shell constructor, plus the per-env identity
// table that keeps at most one live wrapper per native instance.

use super::audio_frame::AudioFrame;
use super::cmd::{Cmd, CmdResult};
use super::data::Data;
use super::message::Message;
use super::msg::{Msg, MsgShell};
use super::video_frame::VideoFrame;
use crate::Core::error::{BridgeError, Result};
use crate::Core::runtime::NativeHandle;
use crate::Msg::Structs::MsgKind;
use lazy_static::lazy_static;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::{Arc, Weak};

/// Wraps a freshly shelled `Msg` into its kind-specific variant.
pub type ShellCtor = fn(Msg) -> Message;

/// Process-wide table of wrapper constructors, one per message kind.
///
/// Entries are never removed. Registering a kind twice is a packaging bug
/// and is reported as `DuplicateRegistration`.
pub struct BoundaryRegistry {
    ctors: RwLock<[Option<ShellCtor>; MsgKind::COUNT]>,
}

impl Default for BoundaryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl BoundaryRegistry {
    /// An empty registry. Most code wants `REGISTRY` instead.
    pub fn new() -> Self {
        Self {
            ctors: RwLock::new([None; MsgKind::COUNT]),
        }
    }

    /// A registry with every built-in kind registered by its own variant.
    pub fn with_builtin_kinds() -> Result<Self> {
        let registry = Self::new();
        registry.register(MsgKind::Generic, Message::Generic)?;
        Cmd::register(&registry)?;
        CmdResult::register(&registry)?;
        Data::register(&registry)?;
        AudioFrame::register(&registry)?;
        VideoFrame::register(&registry)?;
        Ok(registry)
    }

    pub fn register(&self, kind: MsgKind, ctor: ShellCtor) -> Result<()> {
        let mut ctors = self.ctors.write();
        let slot = &mut ctors[kind.index()];
        if slot.is_some() {
            log::error!("message kind {} registered twice", kind);
            return Err(BridgeError::DuplicateRegistration(kind));
        }
        *slot = Some(ctor);
        log::debug!("registered shell constructor for {:?}", kind);
        Ok(())
    }

    pub fn resolve(&self, kind: MsgKind) -> Result<ShellCtor> {
        self.ctors.read()[kind.index()].ok_or(BridgeError::UnknownKind(kind))
    }

    pub fn is_registered(&self, kind: MsgKind) -> bool {
        self.ctors.read()[kind.index()].is_some()
    }

    pub fn registered_kinds(&self) -> Vec<MsgKind> {
        let ctors = self.ctors.read();
        MsgKind::ALL
            .into_iter()
            .filter(|k| ctors[k.index()].is_some())
            .collect()
    }
}

impl std::fmt::Debug for BoundaryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        crate::Debug::StructDebug::debug_registry(self, f)
    }
}

lazy_static! {
    /// The process-wide registry, populated with the built-in kinds on first use.
    pub static ref REGISTRY: BoundaryRegistry = match BoundaryRegistry::with_builtin_kinds() {
        Ok(registry) => registry,
        Err(e) => panic!("boundary registry initialization failed: {}", e),
    };
}

/// Native handle -> live wrapper, per env.
pub(crate) struct LiveWrappers {
    map: Mutex<HashMap<NativeHandle, Weak<MsgShell>>>,
}

impl LiveWrappers {
    pub(crate) fn new() -> Self {
        Self {
            map: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn insert(&self, handle: NativeHandle, shell: &Arc<MsgShell>) {
        self.map.lock().insert(handle, Arc::downgrade(shell));
    }

    /// Return the live wrapper for `handle`, or build and record one.
    /// Check and insert happen under one lock so two deliveries of the same
    /// handle cannot both build a wrapper.
    pub(crate) fn get_or_insert_with<F>(&self, handle: NativeHandle, build: F) -> Result<Arc<MsgShell>>
    where
        F: FnOnce() -> Result<Arc<MsgShell>>,
    {
        let mut map = self.map.lock();
        if let Some(shell) = map.get(&handle).and_then(Weak::upgrade) {
            return Ok(shell);
        }
        let shell = build()?;
        map.insert(handle, Arc::downgrade(&shell));
        Ok(shell)
    }

    /// Drop the entry for `handle` unless a newer wrapper replaced it.
    pub(crate) fn forget(&self, handle: NativeHandle) {
        let mut map = self.map.lock();
        if map.get(&handle).is_some_and(|w| w.strong_count() == 0) {
            map.remove(&handle);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.map
            .lock()
            .values()
            .filter(|w| w.strong_count() > 0)
            .count()
    }
}
