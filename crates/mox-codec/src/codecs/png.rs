//! PNG 编解码器.
//!
//! 基于 `image` crate. UINT8 写为 8 位 PNG; UINT10/UINT12/UINT16/UINT16A
//! 以原始数值写为 16 位 PNG, 读回时原样恢复, 因此对所有整数类型都是位精确的.

use std::sync::Arc;

use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{DynamicImage, ExtendedColorType, ImageEncoder, ImageFormat};
use log::trace;
use mox_core::{MoxError, MoxResult, PixelType};

use super::{ColorLayout, deinterleave, interleave};
use crate::codec::{CodecParameters, VideoCodec};
use crate::compression::VideoCompression;
use crate::plane::Plane;

/// PNG 编解码器
pub struct PngCodec;

impl PngCodec {
    pub fn create() -> MoxResult<Arc<dyn VideoCodec>> {
        Ok(Arc::new(Self))
    }

    fn layout(params: &CodecParameters) -> MoxResult<ColorLayout> {
        let layout = ColorLayout::detect(params, "PNG")?;
        if layout.pixel_type.is_float() {
            return Err(MoxError::NotImplemented(format!(
                "PNG 不支持浮点采样类型 {}",
                layout.pixel_type
            )));
        }
        Ok(layout)
    }
}

fn color_type(components: usize, wide: bool) -> ExtendedColorType {
    match (components, wide) {
        (1, false) => ExtendedColorType::L8,
        (3, false) => ExtendedColorType::Rgb8,
        (4, false) => ExtendedColorType::Rgba8,
        (1, true) => ExtendedColorType::L16,
        (3, true) => ExtendedColorType::Rgb16,
        _ => ExtendedColorType::Rgba16,
    }
}

fn u16_to_ne_bytes(values: Vec<u16>) -> Vec<u8> {
    values.into_iter().flat_map(u16::to_ne_bytes).collect()
}

/// 按分量数提取解码图像的原始数据 (原生字节序)
fn raw_pixels(image: DynamicImage, components: usize, wide: bool) -> Vec<u8> {
    match (components, wide) {
        (1, false) => image.into_luma8().into_raw(),
        (3, false) => image.into_rgb8().into_raw(),
        (4, false) => image.into_rgba8().into_raw(),
        (1, true) => u16_to_ne_bytes(image.into_luma16().into_raw()),
        (3, true) => u16_to_ne_bytes(image.into_rgb16().into_raw()),
        _ => u16_to_ne_bytes(image.into_rgba16().into_raw()),
    }
}

impl VideoCodec for PngCodec {
    fn compression(&self) -> VideoCompression {
        VideoCompression::Png
    }

    fn name(&self) -> &str {
        "png"
    }

    fn check(&self, params: &CodecParameters) -> MoxResult<()> {
        Self::layout(params).map(|_| ())
    }

    fn encode(&self, planes: &[Plane], params: &CodecParameters) -> MoxResult<Vec<u8>> {
        params.validate_planes(planes)?;
        let layout = Self::layout(params)?;
        let wide = layout.pixel_type != PixelType::Uint8;
        let pixels = interleave(planes, &layout.order);

        let mut out = Vec::new();
        PngEncoder::new_with_quality(&mut out, CompressionType::Default, FilterType::Adaptive)
            .write_image(
                &pixels,
                params.width,
                params.height,
                color_type(layout.components(), wide),
            )
            .map_err(|e| MoxError::Codec(format!("PNG 编码失败: {e}")))?;
        trace!("PNG 编码: {} -> {} 字节", pixels.len(), out.len());
        Ok(out)
    }

    fn decode(&self, data: &[u8], params: &CodecParameters) -> MoxResult<Vec<Plane>> {
        let layout = Self::layout(params)?;
        let wide = layout.pixel_type != PixelType::Uint8;
        let image = image::load_from_memory_with_format(data, ImageFormat::Png)
            .map_err(|e| MoxError::Codec(format!("PNG 解码失败: {e}")))?;
        if image.width() != params.width || image.height() != params.height {
            return Err(MoxError::Codec(format!(
                "PNG 尺寸 {}x{} 与头部 {}x{} 不一致",
                image.width(),
                image.height(),
                params.width,
                params.height
            )));
        }
        let pixels = raw_pixels(image, layout.components(), wide);
        deinterleave(
            &pixels,
            &layout.order,
            layout.pixel_type,
            params.width as usize,
            params.height as usize,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::PlaneDesc;

    fn params(pixel_type: PixelType) -> CodecParameters {
        CodecParameters {
            width: 4,
            height: 2,
            channels: ["R", "G", "B", "A"]
                .iter()
                .map(|n| PlaneDesc::new(*n, pixel_type))
                .collect(),
            quality: None,
        }
    }

    fn ramp(pixel_type: PixelType, offset: f64) -> Plane {
        let mut data = Vec::new();
        for i in 0..8 {
            let mut one = [0u8; 2];
            pixel_type.write_raw(offset + f64::from(i) * 100.0, &mut one);
            data.extend_from_slice(&one[..pixel_type.bytes_per_sample()]);
        }
        Plane::new(pixel_type, 4, 2, data).unwrap()
    }

    #[test]
    fn test_png_uint10_bit_exact() {
        let p = params(PixelType::Uint10);
        let planes: Vec<Plane> = (0..4).map(|c| ramp(PixelType::Uint10, f64::from(c))).collect();
        let data = PngCodec.encode(&planes, &p).unwrap();
        assert_eq!(PngCodec.decode(&data, &p).unwrap(), planes);
    }

    #[test]
    fn test_png_uint8_bit_exact() {
        let p = params(PixelType::Uint8);
        let planes: Vec<Plane> = (0..4)
            .map(|c| Plane::filled(PixelType::Uint8, 4, 2, f64::from(c * 40 + 3)))
            .collect();
        let data = PngCodec.encode(&planes, &p).unwrap();
        assert_eq!(PngCodec.decode(&data, &p).unwrap(), planes);
    }

    #[test]
    fn test_png_rejects_float() {
        let err = PngCodec.check(&params(PixelType::Half)).unwrap_err();
        assert_eq!(err.kind(), mox_core::ErrorKind::NotImplemented);
    }
}
