use super::env::Env;
use super::registry::{BoundaryRegistry, REGISTRY};
use crate::Core::error::{BridgeError, Result};
use crate::Core::local::{LocalRuntime, DEFAULT_MAX_BUF_SIZE};
use crate::Core::runtime::NativeRuntime;
use std::sync::Arc;

pub struct EnvBuilder {
    runtime: Option<Arc<dyn NativeRuntime>>,
    registry: Option<&'static BoundaryRegistry>,
    max_buf_size: usize,
}

impl Default for EnvBuilder {
    fn default() -> Self {
        Self {
            runtime: None, // in-process LocalRuntime
            registry: None, // process-wide REGISTRY
            max_buf_size: DEFAULT_MAX_BUF_SIZE,
        }
    }
}

impl EnvBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_runtime(mut self, runtime: Arc<dyn NativeRuntime>) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn with_registry(mut self, registry: &'static BoundaryRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Upper bound on a single `alloc_buf` from this env.
    pub fn with_max_buf_size(mut self, size: usize) -> Self {
        self.max_buf_size = size;
        self
    }

    /// Attach to the runtime. The runtime delivers into this env from here on.
    pub fn build(self) -> Result<Env> {
        if self.max_buf_size == 0 {
            return Err(BridgeError::invalid("max_buf_size must be greater than zero"));
        }
        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => LocalRuntime::with_defaults() as Arc<dyn NativeRuntime>,
        };
        let registry = match self.registry {
            Some(registry) => registry,
            None => &*REGISTRY,
        };
        log::debug!(
            "env attaching to {:?} (max_buf_size {})",
            runtime,
            self.max_buf_size
        );
        Env::from_parts(runtime, registry, self.max_buf_size)
    }
}
