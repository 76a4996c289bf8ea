use super::*;

/// Inspection helpers for LocalRuntime
///
/// Used by tests and the debug formatter to observe native-side state
/// without going through a managed wrapper.
impl LocalRuntime {
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Number of native messages whose storage is still alive.
    pub fn live_count(&self) -> usize {
        self.msgs.read().len()
    }

    /// Current reference count of `handle`, or None once its storage is gone.
    pub fn ref_count(&self, handle: NativeHandle) -> Option<usize> {
        self.msgs
            .read()
            .get(&handle)
            .map(|m| m.refs.load(Ordering::Acquire))
    }

    /// Number of parked outbound messages.
    pub fn outbound_len(&self) -> usize {
        self.outbound.lock().len()
    }

    pub fn has_responder(&self, name: &str) -> bool {
        self.responders.read().contains_key(name)
    }

    /// Whether an env is currently attached for deliveries.
    pub fn is_attached(&self) -> bool {
        self.sink.read().is_some()
    }

    /// Number of registered command responders.
    pub fn responder_count(&self) -> usize {
        self.responders.read().len()
    }
}
