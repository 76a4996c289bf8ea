use std::fmt;
use crate::Core::local::{CmdRequest, LocalRuntime};
use crate::Msg::{BoundaryRegistry, BufLock, Env, Msg, ResultStream};

/// Debug function for LocalRuntime
///
/// Shows table sizes and attachment state only; message storage is never
/// walked.
pub fn debug_local_runtime(runtime: &LocalRuntime, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("LocalRuntime")
        .field("live", &runtime.live_count())
        .field("outbound", &runtime.outbound_len())
        .field("responders", &runtime.responder_count())
        .field("attached", &runtime.is_attached())
        .field("max_buf_size", &runtime.config().max_buf_size)
        .field("threaded_dispatch", &runtime.config().threaded_dispatch)
        .finish()
}

pub fn debug_cmd_request(request: &CmdRequest, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CmdRequest")
        .field("name", &request.name())
        .field("cmd_id", &request.cmd_id())
        .field("handle", &request.handle().as_raw())
        .finish()
}

/// Debug function for Msg
///
/// Identity only. Reading fields or the buffer would cross into the runtime.
pub fn debug_msg(msg: &Msg, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Msg")
        .field("kind", &msg.kind())
        .field("name", &msg.name())
        .field("handle", &msg.handle().as_raw())
        .finish()
}

/// Debug function for BufLock
///
/// Displays the region's location without dereferencing it
pub fn debug_buf_lock(lock: &BufLock, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("BufLock")
        .field("msg", &lock.msg().name())
        .field("generation", &lock.generation())
        .field("region", &format_args!("{:p}", lock.region.ptr.as_ptr()))
        .field("len", &lock.region.len)
        .field("armed", &lock.token().is_some())
        .finish()
}

pub fn debug_registry(registry: &BoundaryRegistry, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("BoundaryRegistry")
        .field("kinds", &registry.registered_kinds())
        .finish()
}

pub fn debug_result_stream(stream: &ResultStream, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ResultStream")
        .field("cmd_id", &stream.cmd_id())
        .field("state", &stream.state())
        .field("accepted", &stream.accepted())
        .finish()
}

pub fn debug_env(env: &Env, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Env")
        .field("runtime", env.runtime())
        .field("live_wrappers", &env.live_wrapper_count())
        .field("open_streams", &env.open_streams())
        .field("max_buf_size", &env.max_buf_size())
        .finish_non_exhaustive()
}
