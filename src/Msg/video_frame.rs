use super::message::Message;
use super::registry::BoundaryRegistry;
use super::{Env, Msg, PayloadMsg};
use crate::Core::error::Result;
use crate::Core::runtime::{Field, FieldValue};
use crate::Msg::Structs::{MsgKind, PixelFmt, VideoFrameMeta};
use std::ops::Deref;

#[derive(Clone, Debug)]
pub struct VideoFrame {
    msg: Msg,
}

impl VideoFrame {
    pub fn create(env: &Env, name: &str) -> Result<Self> {
        Ok(Self {
            msg: Msg::create(env, MsgKind::VideoFrame, name)?,
        })
    }

    fn from_shell(msg: Msg) -> Message {
        Message::VideoFrame(VideoFrame { msg })
    }

    pub(crate) fn register(registry: &BoundaryRegistry) -> Result<()> {
        registry.register(MsgKind::VideoFrame, VideoFrame::from_shell)
    }

    pub fn width(&self) -> Result<u32> {
        self.msg.get_field(Field::Width)?.as_u32()
    }

    pub fn set_width(&self, width: u32) -> Result<()> {
        self.msg.set_field(Field::Width, FieldValue::U32(width))
    }

    pub fn height(&self) -> Result<u32> {
        self.msg.get_field(Field::Height)?.as_u32()
    }

    pub fn set_height(&self, height: u32) -> Result<()> {
        self.msg.set_field(Field::Height, FieldValue::U32(height))
    }

    pub fn timestamp(&self) -> Result<i64> {
        self.msg.get_field(Field::Timestamp)?.as_i64()
    }

    pub fn set_timestamp(&self, timestamp: i64) -> Result<()> {
        self.msg.set_field(Field::Timestamp, FieldValue::I64(timestamp))
    }

    pub fn pixel_fmt(&self) -> Result<PixelFmt> {
        self.msg.get_field(Field::PixelFmt)?.as_pixel_fmt()
    }

    pub fn set_pixel_fmt(&self, fmt: PixelFmt) -> Result<()> {
        self.msg.set_field(Field::PixelFmt, FieldValue::PixelFmt(fmt))
    }

    pub fn is_eof(&self) -> Result<bool> {
        self.msg.get_field(Field::Eof)?.as_bool()
    }

    pub fn set_eof(&self, eof: bool) -> Result<()> {
        self.msg.set_field(Field::Eof, FieldValue::Bool(eof))
    }

    /// All frame fields in one snapshot.
    pub fn meta(&self) -> Result<VideoFrameMeta> {
        Ok(VideoFrameMeta {
            timestamp: self.timestamp()?,
            width: self.width()?,
            height: self.height()?,
            pixel_fmt: self.pixel_fmt()?,
            eof: self.is_eof()?,
        })
    }
}

impl Deref for VideoFrame {
    type Target = Msg;

    fn deref(&self) -> &Msg {
        &self.msg
    }
}

impl PayloadMsg for VideoFrame {
    fn as_msg(&self) -> &Msg {
        &self.msg
    }
}
