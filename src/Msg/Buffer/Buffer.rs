// Exclusive view into a runtime-owned message buffer.

use crate::Core::runtime::{BufRegion, LockToken};
use crate::Msg::Msg;
use std::ops::{Deref, DerefMut};

/// Lock view returned by `lock_buf`.
///
/// Derefs to the buffer bytes in place, no copy. The view is the lock token:
/// hand it back through `unlock_buf` to release the lock. A view that is
/// dropped instead still releases its lock, with a warning.
///
/// Holds its message alive, so the region stays valid for the view's lifetime.
pub struct BufLock {
    pub(crate) msg: Msg,
    pub(crate) token: Option<LockToken>,
    pub(crate) region: BufRegion,
}

// The region is exclusively ours until the token is handed back.
unsafe impl Send for BufLock {}
unsafe impl Sync for BufLock {}

impl BufLock {
    pub(crate) fn new(msg: Msg, token: LockToken, region: BufRegion) -> Self {
        Self {
            msg,
            token: Some(token),
            region,
        }
    }

    /// The message this lock belongs to.
    pub fn msg(&self) -> &Msg {
        &self.msg
    }

    /// Identifies this particular acquisition. Crate-private: outside code
    /// must never be able to turn a view into a second token.
    pub(crate) fn generation(&self) -> u64 {
        self.token.as_ref().map_or(0, LockToken::generation)
    }

    pub(crate) fn token(&self) -> Option<&LockToken> {
        self.token.as_ref()
    }

    /// Mark the lock as released by the runtime.
    pub(crate) fn disarm(&mut self) {
        self.token = None;
    }
}

impl Deref for BufLock {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        // Safety: the runtime keeps the region alive and unmoved while locked,
        // and `msg` keeps the native message alive.
        unsafe { std::slice::from_raw_parts(self.region.ptr.as_ptr(), self.region.len) }
    }
}

impl DerefMut for BufLock {
    fn deref_mut(&mut self) -> &mut [u8] {
        // Safety: as above; the lock grants exclusive access.
        unsafe { std::slice::from_raw_parts_mut(self.region.ptr.as_ptr(), self.region.len) }
    }
}

impl Drop for BufLock {
    fn drop(&mut self) {
        let Some(token) = self.token.take() else {
            return;
        };
        log::warn!(
            "buffer lock on '{}' dropped without unlock_buf, releasing",
            self.msg.name()
        );
        if let Err(e) = self.msg.runtime().unlock_buf(self.msg.handle(), &token) {
            log::error!("failed to release dropped lock on '{}': {}", self.msg.name(), e);
        }
    }
}

impl std::fmt::Debug for BufLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        crate::Debug::StructDebug::debug_buf_lock(self, f)
    }
}
