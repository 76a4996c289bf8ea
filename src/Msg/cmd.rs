// Commands and their (possibly streamed) results.

use super::message::Message;
use super::registry::BoundaryRegistry;
use super::{Env, Msg};
use crate::Core::error::Result;
use crate::Core::runtime::{Field, FieldValue};
use crate::Msg::Structs::{CmdResultMeta, MsgKind, StatusCode};
use std::ops::Deref;

/// A directed action request. Carries only its name; the runtime routes it
/// by that name.
#[derive(Clone, Debug)]
pub struct Cmd {
    msg: Msg,
}

impl Cmd {
    pub fn create(env: &Env, name: &str) -> Result<Self> {
        Ok(Self {
            msg: Msg::create(env, MsgKind::Cmd, name)?,
        })
    }

    fn from_shell(msg: Msg) -> Message {
        Message::Cmd(Cmd { msg })
    }

    pub(crate) fn register(registry: &BoundaryRegistry) -> Result<()> {
        registry.register(MsgKind::Cmd, Cmd::from_shell)
    }

    /// Zero until the command has been sent.
    pub fn cmd_id(&self) -> Result<u64> {
        self.msg.get_field(Field::CmdId)?.as_u64()
    }

    pub(crate) fn set_cmd_id(&self, cmd_id: u64) -> Result<()> {
        self.msg.set_field(Field::CmdId, FieldValue::U64(cmd_id))
    }
}

impl Deref for Cmd {
    type Target = Msg;

    fn deref(&self) -> &Msg {
        &self.msg
    }
}

/// One response in a command's result stream.
#[derive(Clone, Debug)]
pub struct CmdResult {
    msg: Msg,
}

impl CmdResult {
    /// A result answering `cmd`: same name, same cmd id. Final by default.
    pub fn create_from_cmd(env: &Env, status: StatusCode, cmd: &Cmd) -> Result<Self> {
        let result = Self {
            msg: Msg::create(env, MsgKind::CmdResult, cmd.name())?,
        };
        result
            .msg
            .set_field(Field::CmdId, FieldValue::U64(cmd.cmd_id()?))?;
        result.set_status_code(status)?;
        Ok(result)
    }

    fn from_shell(msg: Msg) -> Message {
        Message::CmdResult(CmdResult { msg })
    }

    pub(crate) fn register(registry: &BoundaryRegistry) -> Result<()> {
        registry.register(MsgKind::CmdResult, CmdResult::from_shell)
    }

    pub fn cmd_id(&self) -> Result<u64> {
        self.msg.get_field(Field::CmdId)?.as_u64()
    }

    pub fn status_code(&self) -> Result<StatusCode> {
        self.msg.get_field(Field::StatusCode)?.as_status()
    }

    pub fn set_status_code(&self, status: StatusCode) -> Result<()> {
        self.msg.set_field(Field::StatusCode, FieldValue::Status(status))
    }

    pub fn is_final(&self) -> Result<bool> {
        self.msg.get_field(Field::IsFinal)?.as_bool()
    }

    pub fn set_final(&self, is_final: bool) -> Result<()> {
        self.msg.set_field(Field::IsFinal, FieldValue::Bool(is_final))
    }

    /// True only on the final result, once its stream has accepted it.
    pub fn is_completed(&self) -> Result<bool> {
        self.msg.get_field(Field::IsCompleted)?.as_bool()
    }

    pub(crate) fn mark_completed(&self) -> Result<()> {
        self.msg.set_field(Field::IsCompleted, FieldValue::Bool(true))
    }

    pub fn meta(&self) -> Result<CmdResultMeta> {
        Ok(CmdResultMeta {
            cmd_id: self.cmd_id()?,
            status_code: self.status_code()?,
            is_final: self.is_final()?,
            is_completed: self.is_completed()?,
        })
    }
}

impl Deref for CmdResult {
    type Target = Msg;

    fn deref(&self) -> &Msg {
        &self.msg
    }
}
