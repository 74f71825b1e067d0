//! JPEG 编解码器.
//!
//! 颜色分量量化为 8 位后以 JPEG 编码; alpha 通道无法放入 JPEG,
//! 以原始类型经 deflate 压缩后作为旁路平面附在码流之后, 保持无损.
//!
//! 码流布局 (大端):
//! ```text
//! u32      JPEG 数据长度
//! [u8]     JPEG 数据
//! [u8]     alpha 旁路平面 (zlib, 仅当存在 A 通道时)
//! ```

use std::io::{Read, Write};
use std::sync::Arc;

use byteorder::{BigEndian, ByteOrder};
use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageEncoder, ImageFormat};
use log::trace;
use mox_core::{MoxError, MoxResult, PixelType};

use super::{ColorLayout, deinterleave, interleave};
use crate::codec::{CodecParameters, VideoCodec};
use crate::compression::VideoCompression;
use crate::plane::Plane;

/// 无损策略下使用的质量
pub const LOSSLESS_FALLBACK_QUALITY: u8 = 100;

/// JPEG 编解码器
pub struct JpegCodec;

impl JpegCodec {
    pub fn create() -> MoxResult<Arc<dyn VideoCodec>> {
        Ok(Arc::new(Self))
    }
}

/// 颜色分量 (不含 alpha) 的分量顺序
fn color_order(layout: &ColorLayout) -> &[usize] {
    if layout.has_alpha {
        &layout.order[..3]
    } else {
        &layout.order
    }
}

impl VideoCodec for JpegCodec {
    fn compression(&self) -> VideoCompression {
        VideoCompression::Jpeg
    }

    fn name(&self) -> &str {
        "jpeg"
    }

    fn check(&self, params: &CodecParameters) -> MoxResult<()> {
        ColorLayout::detect(params, "JPEG").map(|_| ())
    }

    fn encode(&self, planes: &[Plane], params: &CodecParameters) -> MoxResult<Vec<u8>> {
        params.validate_planes(planes)?;
        let layout = ColorLayout::detect(params, "JPEG")?;
        let quality = params
            .quality
            .unwrap_or(LOSSLESS_FALLBACK_QUALITY)
            .clamp(1, 100);

        let order = color_order(&layout);
        let narrow: Vec<Plane> = planes.iter().map(|p| p.convert(PixelType::Uint8)).collect();
        let pixels = interleave(&narrow, order);
        let color = if order.len() == 1 {
            ExtendedColorType::L8
        } else {
            ExtendedColorType::Rgb8
        };

        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, quality)
            .write_image(&pixels, params.width, params.height, color)
            .map_err(|e| MoxError::Codec(format!("JPEG 编码失败: {e}")))?;

        let mut out = Vec::with_capacity(4 + jpeg.len());
        let mut len = [0u8; 4];
        BigEndian::write_u32(&mut len, jpeg.len() as u32);
        out.extend_from_slice(&len);
        out.extend_from_slice(&jpeg);

        if layout.has_alpha {
            let alpha = &planes[layout.order[3]];
            let mut z = ZlibEncoder::new(out, Compression::default());
            z.write_all(&alpha.to_le_bytes())?;
            out = z.finish()?;
        }
        trace!("JPEG 编码: 质量 {quality}, {} 字节", out.len());
        Ok(out)
    }

    fn decode(&self, data: &[u8], params: &CodecParameters) -> MoxResult<Vec<Plane>> {
        let layout = ColorLayout::detect(params, "JPEG")?;
        if data.len() < 4 {
            return Err(MoxError::Codec("JPEG 帧数据过短".into()));
        }
        let jpeg_len = BigEndian::read_u32(&data[..4]) as usize;
        let jpeg = data
            .get(4..4 + jpeg_len)
            .ok_or_else(|| MoxError::Codec("JPEG 数据长度越界".into()))?;

        let image = image::load_from_memory_with_format(jpeg, ImageFormat::Jpeg)
            .map_err(|e| MoxError::Codec(format!("JPEG 解码失败: {e}")))?;
        let (w, h) = (params.width as usize, params.height as usize);
        if image.width() != params.width || image.height() != params.height {
            return Err(MoxError::Codec("JPEG 尺寸与头部不一致".into()));
        }

        let order = color_order(&layout);
        let pixels = if order.len() == 1 {
            image.into_luma8().into_raw()
        } else {
            image.into_rgb8().into_raw()
        };
        // 颜色平面按分量顺序 0..n 拆分, 再放回头部位置
        let local: Vec<usize> = (0..order.len()).collect();
        let colors = deinterleave(&pixels, &local, PixelType::Uint8, w, h)?;

        let mut planes: Vec<Option<Plane>> = vec![None; layout.components()];
        for (c, plane) in colors.into_iter().enumerate() {
            planes[order[c]] = Some(plane.convert(layout.pixel_type));
        }
        if layout.has_alpha {
            let mut raw = Vec::new();
            ZlibDecoder::new(&data[4 + jpeg_len..])
                .read_to_end(&mut raw)
                .map_err(|e| MoxError::Codec(format!("alpha 平面解压失败: {e}")))?;
            planes[layout.order[3]] = Some(Plane::from_le_bytes(layout.pixel_type, w, h, &raw)?);
        }
        planes
            .into_iter()
            .map(|p| p.ok_or_else(|| MoxError::Codec("JPEG 通道缺失".into())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::PlaneDesc;

    fn params(names: &[&str], quality: Option<u8>) -> CodecParameters {
        CodecParameters {
            width: 16,
            height: 16,
            channels: names
                .iter()
                .map(|n| PlaneDesc::new(*n, PixelType::Uint8))
                .collect(),
            quality,
        }
    }

    fn gradient(seed: usize) -> Plane {
        let data = (0..256).map(|i| ((i * 7 + seed * 31) % 256) as u8).collect();
        Plane::new(PixelType::Uint8, 16, 16, data).unwrap()
    }

    fn mean_abs_diff(a: &[Plane], b: &[Plane]) -> f64 {
        let mut sum = 0.0;
        let mut n = 0.0;
        for (pa, pb) in a.iter().zip(b) {
            for (x, y) in pa.data.iter().zip(&pb.data) {
                sum += (f64::from(*x) - f64::from(*y)).abs();
                n += 1.0;
            }
        }
        sum / n
    }

    #[test]
    fn test_jpeg_quality_monotonic() {
        let planes: Vec<Plane> = (0..3).map(gradient).collect();
        let hi = params(&["R", "G", "B"], Some(100));
        let lo = params(&["R", "G", "B"], Some(10));
        let hi_back = JpegCodec.decode(&JpegCodec.encode(&planes, &hi).unwrap(), &hi).unwrap();
        let lo_back = JpegCodec.decode(&JpegCodec.encode(&planes, &lo).unwrap(), &lo).unwrap();
        assert!(mean_abs_diff(&planes, &lo_back) >= mean_abs_diff(&planes, &hi_back));
    }

    #[test]
    fn test_jpeg_alpha_lossless() {
        let p = params(&["A", "B", "G", "R"], Some(50));
        let planes: Vec<Plane> = (0..4).map(gradient).collect();
        let back = JpegCodec.decode(&JpegCodec.encode(&planes, &p).unwrap(), &p).unwrap();
        assert_eq!(back[0], planes[0]);
        assert_eq!(back.len(), 4);
    }
}
