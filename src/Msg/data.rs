// Generic binary payload message.

use super::message::Message;
use super::registry::BoundaryRegistry;
use super::{Env, Msg, PayloadMsg};
use crate::Core::error::Result;
use crate::Msg::Structs::MsgKind;
use std::ops::Deref;

/// Name plus one buffer slot, nothing else.
#[derive(Clone, Debug)]
pub struct Data {
    msg: Msg,
}

impl Data {
    pub fn create(env: &Env, name: &str) -> Result<Self> {
        Ok(Self {
            msg: Msg::create(env, MsgKind::Data, name)?,
        })
    }

    fn from_shell(msg: Msg) -> Message {
        Message::Data(Data { msg })
    }

    pub(crate) fn register(registry: &BoundaryRegistry) -> Result<()> {
        registry.register(MsgKind::Data, Data::from_shell)
    }
}

impl Deref for Data {
    type Target = Msg;

    fn deref(&self) -> &Msg {
        &self.msg
    }
}

impl PayloadMsg for Data {
    fn as_msg(&self) -> &Msg {
        &self.msg
    }
}
