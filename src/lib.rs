// Module naming follows project convention (Msg = boundary message model)
#[allow(non_snake_case)]
pub mod Core {
    pub mod error;
    pub mod futex;
    pub mod local;
    pub mod runtime;
    pub use error::{BridgeError, Result};
    pub use local::{CmdRequest, LocalRuntime, Responder, RuntimeConfig};
    pub use runtime::{
        BufRegion, DeliverySink, Field, FieldValue, LockToken, NativeHandle, NativeRuntime,
    };
}
#[allow(non_snake_case)]
pub mod Msg;
#[allow(non_snake_case)]
pub mod Debug {
    pub mod StructDebug;
}
pub mod ffi;

pub use Core::{BridgeError, LocalRuntime, NativeRuntime, Result};
pub use Msg::{
    AudioFrame, BufLock, Cmd, CmdResult, Data, Env, EnvBuilder, Message, PayloadMsg,
    ResultStream, StreamState, VideoFrame, REGISTRY,
};
