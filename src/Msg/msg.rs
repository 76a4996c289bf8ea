// Base message handle: identity, name/kind, native reference and properties.

use super::registry::LiveWrappers;
use super::Env;
use crate::Core::error::{BridgeError, Result};
use crate::Core::runtime::{Field, FieldValue, NativeHandle, NativeRuntime};
use crate::Msg::Structs::MsgKind;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::{Arc, Weak};

/// The wrapper state shared by every clone of one managed handle.
///
/// Holds exactly one native reference, released when the last clone drops.
pub(crate) struct MsgShell {
    pub(crate) handle: NativeHandle,
    pub(crate) kind: MsgKind,
    pub(crate) name: String,
    pub(crate) runtime: Arc<dyn NativeRuntime>,
    pub(crate) max_buf_size: usize,
    live: Weak<LiveWrappers>,
}

impl Drop for MsgShell {
    fn drop(&mut self) {
        if let Some(live) = self.live.upgrade() {
            live.forget(self.handle);
        }
        self.runtime.destroy(self.handle);
        log::trace!(
            "wrapper for {:?} '{}' ({}) finalized",
            self.kind,
            self.name,
            self.handle.as_raw()
        );
    }
}

/// A managed handle to one native message.
///
/// Cloning is cheap and yields the same logical message: `ptr_eq` holds
/// between clones, and between a handle and any later delivery of the same
/// native instance while the handle is alive.
#[derive(Clone)]
pub struct Msg {
    pub(crate) shell: Arc<MsgShell>,
}

impl Msg {
    /// Fresh construction: allocate a brand-new native message.
    pub(crate) fn create(env: &Env, kind: MsgKind, name: &str) -> Result<Msg> {
        if name.is_empty() {
            return Err(BridgeError::invalid("message name must not be empty"));
        }
        let runtime = env.runtime().clone();
        let handle = runtime.create(kind, name)?;

        let shell = Arc::new(MsgShell {
            handle,
            kind,
            name: name.to_owned(),
            runtime,
            max_buf_size: env.max_buf_size(),
            live: Arc::downgrade(env.live()),
        });
        env.live().insert(handle, &shell);
        log::debug!("created {:?} '{}' as {}", kind, name, handle.as_raw());
        Ok(Msg { shell })
    }

    /// Shell construction: wrap a message the runtime already owns. Returns
    /// the live wrapper instead when one exists.
    pub(crate) fn create_shell(env: &Env, handle: NativeHandle, kind: MsgKind) -> Result<Msg> {
        let runtime = env.runtime().clone();
        let max_buf_size = env.max_buf_size();
        let live_weak = Arc::downgrade(env.live());

        let shell = env.live().get_or_insert_with(handle, || {
            let native_kind = runtime.kind(handle)?;
            if native_kind != kind {
                return Err(BridgeError::native(format!(
                    "delivered as {:?} but native message is {:?}",
                    kind, native_kind
                )));
            }
            let name = runtime.name(handle)?;
            runtime.retain(handle)?;
            log::debug!("shell for {:?} '{}' ({})", kind, name, handle.as_raw());
            Ok(Arc::new(MsgShell {
                handle,
                kind,
                name,
                runtime: runtime.clone(),
                max_buf_size,
                live: live_weak,
            }))
        })?;

        if shell.kind != kind {
            return Err(BridgeError::native(format!(
                "delivered as {:?} but live wrapper is {:?}",
                kind, shell.kind
            )));
        }
        Ok(Msg { shell })
    }

    pub fn name(&self) -> &str {
        &self.shell.name
    }

    pub fn kind(&self) -> MsgKind {
        self.shell.kind
    }

    pub fn handle(&self) -> NativeHandle {
        self.shell.handle
    }

    /// True when both handles wrap the same native message instance.
    pub fn ptr_eq(&self, other: &Msg) -> bool {
        Arc::ptr_eq(&self.shell, &other.shell)
    }

    pub(crate) fn runtime(&self) -> &Arc<dyn NativeRuntime> {
        &self.shell.runtime
    }

    pub(crate) fn get_field(&self, field: Field) -> Result<FieldValue> {
        self.shell.runtime.get_field(self.shell.handle, field)
    }

    pub(crate) fn set_field(&self, field: Field, value: FieldValue) -> Result<()> {
        self.shell.runtime.set_field(self.shell.handle, field, value)
    }

    /// Whether the buffer (if any) has an outstanding lock.
    pub fn is_buf_locked(&self) -> Result<bool> {
        self.shell.runtime.is_buf_locked(self.shell.handle)
    }

    /// Rejects the message if it is not safe to hand across the boundary.
    pub(crate) fn check_crossable(&self) -> Result<()> {
        if self.kind().carries_buf() && self.is_buf_locked()? {
            return Err(BridgeError::LockedAtBoundary);
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Properties
    // ---------------------------------------------------------------------

    pub fn set_property<T: Serialize + ?Sized>(&self, path: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)
            .map_err(|e| BridgeError::invalid(format!("unserializable property: {e}")))?;
        self.shell
            .runtime
            .set_property(self.shell.handle, path, value)
    }

    /// Read the property at `path`. `Ok(None)` when nothing is stored there.
    pub fn get_property<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        let Some(value) = self.shell.runtime.get_property(self.shell.handle, path)? else {
            return Ok(None);
        };
        serde_json::from_value(value)
            .map(Some)
            .map_err(|e| BridgeError::invalid(format!("property '{path}' has another type: {e}")))
    }

    pub fn set_property_from_json(&self, path: &str, json: &str) -> Result<()> {
        let value: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| BridgeError::invalid(format!("malformed json: {e}")))?;
        self.shell
            .runtime
            .set_property(self.shell.handle, path, value)
    }

    /// JSON text of the property at `path`; `"null"` when unset.
    pub fn get_property_to_json(&self, path: &str) -> Result<String> {
        let value = self
            .shell
            .runtime
            .get_property(self.shell.handle, path)?
            .unwrap_or(serde_json::Value::Null);
        serde_json::to_string(&value)
            .map_err(|e| BridgeError::native(format!("property '{path}' not printable: {e}")))
    }
}

impl std::fmt::Debug for Msg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        crate::Debug::StructDebug::debug_msg(self, f)
    }
}
