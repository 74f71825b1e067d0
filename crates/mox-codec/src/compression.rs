//! 压缩类型定义.

use std::fmt;

use mox_core::{MoxError, MoxResult};

/// 视频压缩类型
///
/// `Auto` 是 "按内容自动选择" 的占位值, 只出现在待写入的头部中;
/// `OutputFile` 构造时会通过 [`crate::pick_codec`] 将其替换为具体类型.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VideoCompression {
    /// 无压缩
    Uncompressed,
    /// PNG
    Png,
    /// OpenEXR
    OpenExr,
    /// JPEG
    Jpeg,
    /// JPEG 2000
    Jpeg2000,
    /// DPX
    Dpx,
    /// Dirac
    Dirac,
    /// 按内容自动选择
    #[default]
    Auto,
}

impl VideoCompression {
    /// 全部压缩类型 (按标签顺序)
    pub const ALL: [VideoCompression; 8] = [
        Self::Uncompressed,
        Self::Png,
        Self::OpenExr,
        Self::Jpeg,
        Self::Jpeg2000,
        Self::Dpx,
        Self::Dirac,
        Self::Auto,
    ];

    /// 是否为有损编码
    pub const fn is_lossy(&self) -> bool {
        matches!(self, Self::Jpeg | Self::Dirac)
    }

    /// 是否为压缩编码 (用于码率估算)
    pub const fn is_compressed(&self) -> bool {
        !matches!(self, Self::Uncompressed)
    }

    /// 磁盘标签
    pub const fn tag(&self) -> u8 {
        match self {
            Self::Uncompressed => 0,
            Self::Png => 1,
            Self::OpenExr => 2,
            Self::Jpeg => 3,
            Self::Jpeg2000 => 4,
            Self::Dpx => 5,
            Self::Dirac => 6,
            Self::Auto => 0xFF,
        }
    }

    /// 从磁盘标签解析
    pub fn from_tag(tag: u8) -> MoxResult<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.tag() == tag)
            .ok_or_else(|| MoxError::Format(format!("未知视频压缩标签: {tag}")))
    }

    /// 名称
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Uncompressed => "uncompressed",
            Self::Png => "png",
            Self::OpenExr => "openexr",
            Self::Jpeg => "jpeg",
            Self::Jpeg2000 => "jpeg2000",
            Self::Dpx => "dpx",
            Self::Dirac => "dirac",
            Self::Auto => "auto",
        }
    }

    /// 从名称解析 (不区分大小写)
    pub fn from_name(name: &str) -> MoxResult<Self> {
        let lower = name.to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.name() == lower)
            .ok_or_else(|| MoxError::InvalidArgument(format!("未知视频压缩类型: {name}")))
    }
}

impl fmt::Display for VideoCompression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// 音频压缩类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AudioCompression {
    /// 交错 PCM
    #[default]
    Pcm,
}

impl AudioCompression {
    /// 磁盘标签
    pub const fn tag(&self) -> u8 {
        match self {
            Self::Pcm => 0,
        }
    }

    /// 从磁盘标签解析, 未知标签视为尚未实现的音频编码
    pub fn from_tag(tag: u8) -> MoxResult<Self> {
        match tag {
            0 => Ok(Self::Pcm),
            other => Err(MoxError::NotImplemented(format!("音频压缩标签 {other}"))),
        }
    }
}

impl fmt::Display for AudioCompression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pcm => write!(f, "pcm"),
        }
    }
}
