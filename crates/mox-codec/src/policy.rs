//! 视频编码策略.
//!
//! 无损与质量两种策略互斥, 记录在头部上, 每帧编码时查询.
//! 头部声明为自动选择时, 由 [`pick_codec`] 按内容确定具体编解码器.

use log::warn;
use mox_core::{MoxError, MoxResult, PixelType};

use crate::compression::VideoCompression;

/// 默认有损质量 (与导出器的默认值一致)
pub const DEFAULT_QUALITY: u8 = 80;

/// 编码策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CodecPolicy {
    /// 无损
    #[default]
    Lossless,
    /// 有损, 质量 1..=100
    Quality(u8),
}

impl CodecPolicy {
    /// 创建质量策略, 质量超出 1..=100 时返回错误
    pub fn quality(quality: u8) -> MoxResult<Self> {
        if !(1..=100).contains(&quality) {
            return Err(MoxError::InvalidArgument(format!(
                "质量必须在 1..=100 之间: {quality}"
            )));
        }
        Ok(Self::Quality(quality))
    }

    /// 是否为无损策略
    pub const fn is_lossless(&self) -> bool {
        matches!(self, Self::Lossless)
    }
}

/// 自动选择编解码器
///
/// 纯函数, 相同输入总是得到相同结果:
///
/// | 采样类型 | 无损 | 有损, 无 alpha | 有损, 有 alpha |
/// |---|---|---|---|
/// | UINT8 | PNG | JPEG | PNG |
/// | UINT10 / UINT12 | DPX | DPX | DPX |
/// | UINT16 / UINT16A | PNG | PNG | PNG |
/// | HALF / FLOAT | OpenEXR | OpenEXR | OpenEXR |
/// | UINT32 | 错误 | 错误 | 错误 |
pub fn pick_codec(
    lossless: bool,
    pixel_type: PixelType,
    has_alpha: bool,
) -> MoxResult<VideoCompression> {
    match pixel_type {
        PixelType::Uint32 => Err(MoxError::Logic(
            "UINT32 不能作为编码目标, 无法自动选择编解码器".into(),
        )),
        PixelType::Half | PixelType::Float => Ok(VideoCompression::OpenExr),
        PixelType::Uint10 | PixelType::Uint12 => Ok(VideoCompression::Dpx),
        PixelType::Uint8 if !lossless && !has_alpha => Ok(VideoCompression::Jpeg),
        PixelType::Uint8 | PixelType::Uint16 | PixelType::Uint16A => Ok(VideoCompression::Png),
    }
}

/// 一组通道中 "最深" 的采样类型: 位数最多者优先, 位数相同时浮点优先
pub fn deepest_pixel_type<I>(types: I) -> Option<PixelType>
where
    I: IntoIterator<Item = PixelType>,
{
    types
        .into_iter()
        .max_by_key(|t| (t.bits(), t.is_float(), t.tag()))
}

/// 策略在指定编解码器下的实际质量参数
///
/// 返回 None 表示无损编码. 对有损编解码器使用无损策略时按最高质量编码并记录警告.
pub fn effective_quality(policy: CodecPolicy, compression: VideoCompression) -> Option<u8> {
    match (policy, compression.is_lossy()) {
        (CodecPolicy::Quality(q), true) => Some(q.clamp(1, 100)),
        (CodecPolicy::Quality(_), false) => None,
        (CodecPolicy::Lossless, true) => {
            warn!("{compression} 不支持无损编码, 改用最高质量 100");
            Some(100)
        }
        (CodecPolicy::Lossless, false) => None,
    }
}
