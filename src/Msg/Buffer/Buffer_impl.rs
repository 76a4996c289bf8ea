use super::Buffer::BufLock;
use crate::Core::error::{BridgeError, Result};
use crate::Msg::Msg;

/// Buffer protocol shared by the payload-bearing kinds (Data, AudioFrame,
/// VideoFrame).
///
/// ### Protocol:
/// - `alloc_buf` replaces the buffer with a zeroed region; refused while locked.
/// - `lock_buf` is the only way to get a mutable view; it is not re-entrant.
/// - `unlock_buf` must be handed the view `lock_buf` returned.
/// - `get_buf` copies the bytes out and is refused while a lock is outstanding,
///   whoever holds it, so a half-written buffer is never observed.
pub trait PayloadMsg {
    fn as_msg(&self) -> &Msg;

    fn alloc_buf(&self, size: usize) -> Result<()> {
        alloc_checked(self.as_msg(), size)
    }

    fn lock_buf(&self) -> Result<BufLock> {
        let msg = self.as_msg();
        let (token, region) = msg.runtime().lock_buf(msg.handle())?;
        log::trace!(
            "locked {} bytes of '{}' (generation {})",
            region.len,
            msg.name(),
            token.generation()
        );
        Ok(BufLock::new(msg.clone(), token, region))
    }

    /// Release `lock`. On failure the view is dropped, which releases the
    /// lock it actually holds.
    fn unlock_buf(&self, mut lock: BufLock) -> Result<()> {
        let msg = self.as_msg();
        let token = lock.token().ok_or(BridgeError::NotLocked)?;
        msg.runtime().unlock_buf(msg.handle(), token)?;
        lock.disarm();
        Ok(())
    }

    /// Snapshot copy of the buffer bytes.
    fn get_buf(&self) -> Result<Vec<u8>> {
        let msg = self.as_msg();
        msg.runtime().copy_buf(msg.handle())
    }

    fn buf_size(&self) -> Result<usize> {
        let msg = self.as_msg();
        msg.runtime().buf_size(msg.handle())
    }

    fn is_buf_locked(&self) -> Result<bool> {
        self.as_msg().is_buf_locked()
    }
}

/// Size checks shared by every `alloc_buf`, then the runtime allocation.
pub(crate) fn alloc_checked(msg: &Msg, size: usize) -> Result<()> {
    if size == 0 {
        return Err(BridgeError::invalid("buffer size must be greater than zero"));
    }
    if size > msg.shell.max_buf_size {
        return Err(BridgeError::invalid(format!(
            "buffer size {} exceeds limit {}",
            size, msg.shell.max_buf_size
        )));
    }
    msg.runtime().alloc_buf(msg.handle(), size)
}
