//! OpenEXR 编解码器.
//!
//! 基于 `image` crate, 以 32 位浮点写入 RGB/RGBA. HALF 通道先无损扩展为
//! f32, 读回时再收窄, 因此 HALF 与 FLOAT 都是位精确的.

use std::io::Cursor;
use std::sync::Arc;

use image::codecs::openexr::OpenExrEncoder;
use image::{ExtendedColorType, ImageEncoder, ImageFormat};
use log::trace;
use mox_core::{MoxError, MoxResult, PixelType};

use super::{ColorLayout, deinterleave, interleave};
use crate::codec::{CodecParameters, VideoCodec};
use crate::compression::VideoCompression;
use crate::plane::Plane;

/// OpenEXR 编解码器
pub struct OpenExrCodec;

impl OpenExrCodec {
    pub fn create() -> MoxResult<Arc<dyn VideoCodec>> {
        Ok(Arc::new(Self))
    }

    fn layout(params: &CodecParameters) -> MoxResult<ColorLayout> {
        let layout = ColorLayout::detect(params, "OpenEXR")?;
        if !layout.pixel_type.is_float() {
            return Err(MoxError::NotImplemented(format!(
                "OpenEXR 仅支持浮点采样类型, 实际为 {}",
                layout.pixel_type
            )));
        }
        if layout.components() < 3 {
            return Err(MoxError::NotImplemented("OpenEXR 不支持单通道灰度".into()));
        }
        Ok(layout)
    }
}

impl VideoCodec for OpenExrCodec {
    fn compression(&self) -> VideoCompression {
        VideoCompression::OpenExr
    }

    fn name(&self) -> &str {
        "openexr"
    }

    fn check(&self, params: &CodecParameters) -> MoxResult<()> {
        Self::layout(params).map(|_| ())
    }

    fn encode(&self, planes: &[Plane], params: &CodecParameters) -> MoxResult<Vec<u8>> {
        params.validate_planes(planes)?;
        let layout = Self::layout(params)?;
        let wide: Vec<Plane> = planes.iter().map(|p| p.convert(PixelType::Float)).collect();
        let pixels = interleave(&wide, &layout.order);
        let color = if layout.has_alpha {
            ExtendedColorType::Rgba32F
        } else {
            ExtendedColorType::Rgb32F
        };

        let mut cursor = Cursor::new(Vec::new());
        OpenExrEncoder::new(&mut cursor)
            .write_image(&pixels, params.width, params.height, color)
            .map_err(|e| MoxError::Codec(format!("OpenEXR 编码失败: {e}")))?;
        let out = cursor.into_inner();
        trace!("OpenEXR 编码: {} 字节", out.len());
        Ok(out)
    }

    fn decode(&self, data: &[u8], params: &CodecParameters) -> MoxResult<Vec<Plane>> {
        let layout = Self::layout(params)?;
        let image = image::load_from_memory_with_format(data, ImageFormat::OpenExr)
            .map_err(|e| MoxError::Codec(format!("OpenEXR 解码失败: {e}")))?;
        if image.width() != params.width || image.height() != params.height {
            return Err(MoxError::Codec("OpenEXR 尺寸与头部不一致".into()));
        }
        let values = if layout.has_alpha {
            image.into_rgba32f().into_raw()
        } else {
            image.into_rgb32f().into_raw()
        };
        let pixels: Vec<u8> = values.into_iter().flat_map(f32::to_ne_bytes).collect();
        let planes = deinterleave(
            &pixels,
            &layout.order,
            PixelType::Float,
            params.width as usize,
            params.height as usize,
        )?;
        Ok(planes.iter().map(|p| p.convert(layout.pixel_type)).collect())
    }
}
