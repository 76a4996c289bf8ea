// Plain descriptors shared by both sides of the boundary.

// no atomics in the frame metas; keep as plain integral types for ABI

use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of message kinds. The discriminant is the wire/ABI tag.
#[repr(u32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MsgKind {
    Generic = 0,
    Cmd = 1,
    CmdResult = 2,
    Data = 3,
    AudioFrame = 4,
    VideoFrame = 5,
}

impl MsgKind {
    pub const COUNT: usize = 6;

    pub const ALL: [MsgKind; MsgKind::COUNT] = [
        MsgKind::Generic,
        MsgKind::Cmd,
        MsgKind::CmdResult,
        MsgKind::Data,
        MsgKind::AudioFrame,
        MsgKind::VideoFrame,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as u32 as usize
    }

    pub fn from_raw(raw: u32) -> Option<Self> {
        MsgKind::ALL.get(raw as usize).copied()
    }

    /// Kinds that own a buffer slot.
    pub fn carries_buf(self) -> bool {
        matches!(
            self,
            MsgKind::Data | MsgKind::AudioFrame | MsgKind::VideoFrame
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MsgKind::Generic => "generic",
            MsgKind::Cmd => "cmd",
            MsgKind::CmdResult => "cmd_result",
            MsgKind::Data => "data",
            MsgKind::AudioFrame => "audio_frame",
            MsgKind::VideoFrame => "video_frame",
        }
    }
}

impl fmt::Display for MsgKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[repr(i32)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusCode {
    #[default]
    Ok = 0,
    Error = 1,
}

#[repr(u32)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AudioDataFmt {
    #[default]
    Interleaved = 0,
    NonInterleaved = 1,
}

#[repr(u32)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFmt {
    #[default]
    Rgb24 = 0,
    Rgba = 1,
    Bgr24 = 2,
    Bgra = 3,
    I422 = 4,
    I420 = 5,
    Nv21 = 6,
    Nv12 = 7,
}

/// Audio frame metadata as stored next to the native buffer.
/// ABI-stable across languages.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct AudioFrameMeta {
    pub timestamp: i64,
    pub sample_rate: u32,
    pub samples_per_channel: u32,
    pub bytes_per_sample: u32,
    pub number_of_channels: u32,
    pub data_fmt: AudioDataFmt,
    pub line_size: u32,
    pub eof: bool,
}

impl AudioFrameMeta {
    /// Byte size an interleaved buffer should have for this layout.
    /// Advisory only: the runtime owns the actual check.
    pub fn expected_buf_size(&self) -> u64 {
        self.samples_per_channel as u64
            * self.bytes_per_sample as u64
            * self.number_of_channels as u64
    }
}

/// Video frame metadata as stored next to the native buffer.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct VideoFrameMeta {
    pub timestamp: i64,
    pub width: u32,
    pub height: u32,
    pub pixel_fmt: PixelFmt,
    pub eof: bool,
}

/// Command result metadata. `is_completed` is only ever set by the stream
/// that accepts the final result.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct CmdResultMeta {
    pub cmd_id: u64,
    pub status_code: StatusCode,
    pub is_final: bool,
    pub is_completed: bool,
}
