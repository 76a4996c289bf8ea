mod audio_frame;
mod builder;
mod cmd;
mod data;
mod env;
mod message;
mod msg;
mod registry;
mod stream;
mod video_frame;

pub use audio_frame::AudioFrame;
pub use builder::EnvBuilder;
pub use cmd::{Cmd, CmdResult};
pub use data::Data;
pub use env::{Env, MsgHandler};
pub use message::Message;
pub use msg::Msg;
pub use registry::{BoundaryRegistry, ShellCtor, REGISTRY};
pub use stream::{ResultStream, StreamState};
pub use video_frame::VideoFrame;

pub mod Buffer {
    pub mod Buffer;
    pub mod Buffer_impl;
    pub use Buffer::BufLock; // re-export for stable path
    pub use Buffer_impl::PayloadMsg;
}

pub mod Structs {
    pub mod Msg_Structs;
    pub use Msg_Structs::*; // re-export for stable path
}

pub use Buffer::{BufLock, PayloadMsg};
