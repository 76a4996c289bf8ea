// PCM audio frame: layout fields plus one buffer slot.

use super::message::Message;
use super::registry::BoundaryRegistry;
use super::Buffer::Buffer_impl::alloc_checked;
use super::{Env, Msg, PayloadMsg};
use crate::Core::error::Result;
use crate::Core::runtime::{Field, FieldValue};
use crate::Msg::Structs::{AudioDataFmt, AudioFrameMeta, MsgKind};
use std::ops::Deref;

#[derive(Clone, Debug)]
pub struct AudioFrame {
    msg: Msg,
}

macro_rules! audio_field {
    ($get:ident, $set:ident, $field:ident, $ty:ty, $as:ident, $variant:ident) => {
        pub fn $get(&self) -> Result<$ty> {
            self.msg.get_field(Field::$field)?.$as()
        }

        pub fn $set(&self, value: $ty) -> Result<()> {
            self.msg.set_field(Field::$field, FieldValue::$variant(value))
        }
    };
}

impl AudioFrame {
    pub fn create(env: &Env, name: &str) -> Result<Self> {
        Ok(Self {
            msg: Msg::create(env, MsgKind::AudioFrame, name)?,
        })
    }

    fn from_shell(msg: Msg) -> Message {
        Message::AudioFrame(AudioFrame { msg })
    }

    pub(crate) fn register(registry: &BoundaryRegistry) -> Result<()> {
        registry.register(MsgKind::AudioFrame, AudioFrame::from_shell)
    }

    audio_field!(timestamp, set_timestamp, Timestamp, i64, as_i64, I64);
    audio_field!(sample_rate, set_sample_rate, SampleRate, u32, as_u32, U32);
    audio_field!(
        samples_per_channel,
        set_samples_per_channel,
        SamplesPerChannel,
        u32,
        as_u32,
        U32
    );
    audio_field!(bytes_per_sample, set_bytes_per_sample, BytesPerSample, u32, as_u32, U32);
    audio_field!(
        number_of_channels,
        set_number_of_channels,
        NumberOfChannels,
        u32,
        as_u32,
        U32
    );
    audio_field!(data_fmt, set_data_fmt, DataFmt, AudioDataFmt, as_data_fmt, DataFmt);
    audio_field!(line_size, set_line_size, LineSize, u32, as_u32, U32);
    audio_field!(is_eof, set_eof, Eof, bool, as_bool, Bool);

    /// All frame fields in one snapshot.
    pub fn meta(&self) -> Result<AudioFrameMeta> {
        Ok(AudioFrameMeta {
            timestamp: self.timestamp()?,
            sample_rate: self.sample_rate()?,
            samples_per_channel: self.samples_per_channel()?,
            bytes_per_sample: self.bytes_per_sample()?,
            number_of_channels: self.number_of_channels()?,
            data_fmt: self.data_fmt()?,
            line_size: self.line_size()?,
            eof: self.is_eof()?,
        })
    }

    /// `samples_per_channel * bytes_per_sample * number_of_channels`.
    pub fn expected_buf_size(&self) -> Result<u64> {
        Ok(self.meta()?.expected_buf_size())
    }
}

impl Deref for AudioFrame {
    type Target = Msg;

    fn deref(&self) -> &Msg {
        &self.msg
    }
}

impl PayloadMsg for AudioFrame {
    fn as_msg(&self) -> &Msg {
        &self.msg
    }

    /// Allocates exactly `size` bytes. A size that disagrees with an
    /// interleaved layout is logged, never adjusted.
    fn alloc_buf(&self, size: usize) -> Result<()> {
        let meta = self.meta()?;
        let expected = meta.expected_buf_size();
        if meta.data_fmt == AudioDataFmt::Interleaved && expected != 0 && expected != size as u64 {
            log::warn!(
                "audio frame '{}': allocating {} bytes, layout implies {}",
                self.msg.name(),
                size,
                expected
            );
        }
        alloc_checked(&self.msg, size)
    }
}
