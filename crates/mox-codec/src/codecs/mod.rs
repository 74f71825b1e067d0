//! 内置视频编解码器.
//!
//! 除无压缩编解码器外, 其余编解码器只接受标准颜色通道组合
//! (单通道灰度, R/G/B, R/G/B/A), 通道在头部中的顺序可以任意.

pub mod dpx;
pub mod jpeg;
pub mod openexr;
pub mod png;
pub mod uncompressed;

use mox_core::{MoxError, MoxResult, PixelType};

use crate::codec::CodecParameters;
use crate::compression::VideoCompression;
use crate::plane::Plane;
use crate::registry::CodecRegistry;

/// 注册所有内置编解码器
pub fn register_all_codecs(registry: &mut CodecRegistry) {
    registry.register(
        VideoCompression::Uncompressed,
        "uncompressed",
        uncompressed::UncompressedCodec::create,
    );
    registry.register(VideoCompression::Png, "png", png::PngCodec::create);
    registry.register(VideoCompression::Jpeg, "jpeg", jpeg::JpegCodec::create);
    registry.register(
        VideoCompression::OpenExr,
        "openexr",
        openexr::OpenExrCodec::create,
    );
    registry.register(VideoCompression::Dpx, "dpx", dpx::DpxCodec::create);
}

/// 颜色通道组合
///
/// `order[c]` 是第 c 个颜色分量 (R, G, B, A 或灰度) 在头部通道列表中的下标.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ColorLayout {
    pub order: Vec<usize>,
    pub pixel_type: PixelType,
    pub has_alpha: bool,
}

impl ColorLayout {
    /// 从编解码参数识别颜色通道组合
    pub(crate) fn detect(params: &CodecParameters, codec: &str) -> MoxResult<Self> {
        let unsupported = || {
            let names: Vec<&str> = params.channels.iter().map(|c| c.name.as_str()).collect();
            MoxError::NotImplemented(format!("{codec} 不支持通道组合 {names:?}"))
        };
        if params.channels.iter().any(|c| c.is_subsampled()) {
            return Err(MoxError::NotImplemented(format!(
                "{codec} 不支持子采样通道"
            )));
        }
        let pixel_type = params.uniform_pixel_type().ok_or_else(unsupported)?;
        pixel_type.ensure_codable()?;

        let find = |name: &str| params.channels.iter().position(|c| c.name == name);
        let order = match params.channels.len() {
            1 => vec![0],
            3 => vec![find("R"), find("G"), find("B")]
                .into_iter()
                .collect::<Option<Vec<_>>>()
                .ok_or_else(unsupported)?,
            4 => vec![find("R"), find("G"), find("B"), find("A")]
                .into_iter()
                .collect::<Option<Vec<_>>>()
                .ok_or_else(unsupported)?,
            _ => return Err(unsupported()),
        };
        Ok(Self {
            has_alpha: order.len() == 4,
            order,
            pixel_type,
        })
    }

    /// 颜色分量数 (含 alpha)
    pub(crate) fn components(&self) -> usize {
        self.order.len()
    }
}

/// 将平面按分量顺序交错为紧密排列的像素数据
pub(crate) fn interleave(planes: &[Plane], order: &[usize]) -> Vec<u8> {
    let Some(first) = order.first().map(|&i| &planes[i]) else {
        return Vec::new();
    };
    let bps = first.pixel_type.bytes_per_sample();
    let count = first.sample_count();
    let mut out = Vec::with_capacity(count * bps * order.len());
    for s in 0..count {
        let at = s * bps;
        for &i in order {
            out.extend_from_slice(&planes[i].data[at..at + bps]);
        }
    }
    out
}

/// 将交错像素数据拆分为平面, 返回值按头部通道顺序排列
pub(crate) fn deinterleave(
    data: &[u8],
    order: &[usize],
    pixel_type: PixelType,
    width: usize,
    height: usize,
) -> MoxResult<Vec<Plane>> {
    let bps = pixel_type.bytes_per_sample();
    let comps = order.len();
    let count = width * height;
    if data.len() != count * bps * comps {
        return Err(MoxError::Codec(format!(
            "解码数据长度不匹配: 期望 {}, 实际 {}",
            count * bps * comps,
            data.len()
        )));
    }
    let mut buffers = vec![Vec::with_capacity(count * bps); comps];
    for pixel in data.chunks_exact(bps * comps) {
        for (c, sample) in pixel.chunks_exact(bps).enumerate() {
            buffers[c].extend_from_slice(sample);
        }
    }
    let mut planes: Vec<Option<Plane>> = vec![None; comps];
    for (c, buf) in buffers.into_iter().enumerate() {
        planes[order[c]] = Some(Plane::new(pixel_type, width, height, buf)?);
    }
    planes
        .into_iter()
        .map(|p| p.ok_or_else(|| MoxError::Codec("通道顺序不完整".into())))
        .collect()
}
