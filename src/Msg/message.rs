// The closed set of message variants.

use super::audio_frame::AudioFrame;
use super::cmd::{Cmd, CmdResult};
use super::data::Data;
use super::msg::Msg;
use super::video_frame::VideoFrame;
use super::Env;
use crate::Core::error::{BridgeError, Result};
use crate::Msg::Structs::MsgKind;

/// A message of any kind. The variant always agrees with `kind()`.
#[derive(Clone, Debug)]
pub enum Message {
    Generic(Msg),
    Cmd(Cmd),
    CmdResult(CmdResult),
    Data(Data),
    AudioFrame(AudioFrame),
    VideoFrame(VideoFrame),
}

impl Message {
    /// Fresh construction of any kind, wrapped by the env's registry.
    pub fn create(env: &Env, kind: MsgKind, name: &str) -> Result<Message> {
        let ctor = env.registry().resolve(kind)?;
        Ok(ctor(Msg::create(env, kind, name)?))
    }

    pub fn msg(&self) -> &Msg {
        match self {
            Message::Generic(m) => m,
            Message::Cmd(m) => &**m,
            Message::CmdResult(m) => &**m,
            Message::Data(m) => &**m,
            Message::AudioFrame(m) => &**m,
            Message::VideoFrame(m) => &**m,
        }
    }

    pub fn kind(&self) -> MsgKind {
        self.msg().kind()
    }

    pub fn name(&self) -> &str {
        self.msg().name()
    }
}

macro_rules! message_variant_conversions {
    ($($variant:ident),*) => {
        $(
            impl From<$variant> for Message {
                fn from(v: $variant) -> Self {
                    Message::$variant(v)
                }
            }

            impl TryFrom<Message> for $variant {
                type Error = BridgeError;

                fn try_from(m: Message) -> Result<Self> {
                    match m {
                        Message::$variant(v) => Ok(v),
                        other => Err(BridgeError::invalid(format!(
                            "expected {}, got {:?}",
                            stringify!($variant),
                            other.kind()
                        ))),
                    }
                }
            }
        )*
    };
}

message_variant_conversions!(Cmd, CmdResult, Data, AudioFrame, VideoFrame);
