//! DPX 编解码器.
//!
//! 手工实现的 SMPTE 268M 子集: 单图像元素, 大端, 灰度/RGB/RGBA,
//! 8/10/12/16 位. 10 位采用 filled method A (每 32 位字 3 个分量),
//! 12 位每个分量占 16 位高位对齐, 每行填充到 32 位边界.

use std::sync::Arc;

use byteorder::{BigEndian, ByteOrder};
use log::trace;
use mox_core::{MoxError, MoxResult, PixelType};

use super::{ColorLayout, deinterleave, interleave};
use crate::codec::{CodecParameters, VideoCodec};
use crate::compression::VideoCompression;
use crate::plane::Plane;

/// 文件头总长度 (通用头 + 行业头)
const HEADER_SIZE: usize = 2048;
/// 大端魔数
const MAGIC: &[u8; 4] = b"SDPX";
const VERSION: &[u8; 8] = b"V2.0\0\0\0\0";

// 通用头字段偏移
const OFF_IMAGE_OFFSET: usize = 4;
const OFF_VERSION: usize = 8;
const OFF_FILE_SIZE: usize = 16;
const OFF_DITTO_KEY: usize = 20;
const OFF_GENERIC_SIZE: usize = 24;
const OFF_INDUSTRY_SIZE: usize = 28;
const OFF_ELEMENT_COUNT: usize = 770;
const OFF_PIXELS_PER_LINE: usize = 772;
const OFF_LINES: usize = 776;
const OFF_REF_HIGH_CODE: usize = 792;
const OFF_DESCRIPTOR: usize = 800;
const OFF_TRANSFER: usize = 801;
const OFF_COLORIMETRIC: usize = 802;
const OFF_BIT_DEPTH: usize = 803;
const OFF_PACKING: usize = 804;
const OFF_DATA_OFFSET: usize = 808;

/// 元素描述符
const DESCRIPTOR_LUMA: u8 = 6;
const DESCRIPTOR_RGB: u8 = 50;
const DESCRIPTOR_RGBA: u8 = 51;

/// DPX 编解码器
pub struct DpxCodec;

impl DpxCodec {
    pub fn create() -> MoxResult<Arc<dyn VideoCodec>> {
        Ok(Arc::new(Self))
    }

    fn layout(params: &CodecParameters) -> MoxResult<ColorLayout> {
        let layout = ColorLayout::detect(params, "DPX")?;
        bit_depth(layout.pixel_type)?;
        Ok(layout)
    }
}

/// 采样类型对应的 DPX 位深
fn bit_depth(pixel_type: PixelType) -> MoxResult<u8> {
    match pixel_type {
        PixelType::Uint8 => Ok(8),
        PixelType::Uint10 => Ok(10),
        PixelType::Uint12 => Ok(12),
        PixelType::Uint16 | PixelType::Uint16A => Ok(16),
        other => Err(MoxError::NotImplemented(format!("DPX 不支持采样类型 {other}"))),
    }
}

fn descriptor(components: usize) -> u8 {
    match components {
        1 => DESCRIPTOR_LUMA,
        3 => DESCRIPTOR_RGB,
        _ => DESCRIPTOR_RGBA,
    }
}

/// 一行 `count` 个分量打包后的字节数 (含 32 位填充)
fn line_bytes(count: usize, depth: u8) -> usize {
    match depth {
        8 => count.div_ceil(4) * 4,
        10 => count.div_ceil(3) * 4,
        _ => (count * 2).div_ceil(4) * 4,
    }
}

fn pack_line(values: &[u16], depth: u8, out: &mut Vec<u8>) {
    let start = out.len();
    match depth {
        8 => out.extend(values.iter().map(|&v| v as u8)),
        10 => {
            for word in values.chunks(3) {
                let mut packed = 0u32;
                for (k, &v) in word.iter().enumerate() {
                    packed |= (u32::from(v) & 0x3FF) << (22 - 10 * k);
                }
                out.extend_from_slice(&packed.to_be_bytes());
            }
        }
        12 => {
            for &v in values {
                out.extend_from_slice(&((v & 0x0FFF) << 4).to_be_bytes());
            }
        }
        _ => {
            for &v in values {
                out.extend_from_slice(&v.to_be_bytes());
            }
        }
    }
    out.resize(start + line_bytes(values.len(), depth), 0);
}

fn unpack_line(data: &[u8], count: usize, depth: u8) -> Vec<u16> {
    match depth {
        8 => data[..count].iter().map(|&b| u16::from(b)).collect(),
        10 => {
            let mut out = Vec::with_capacity(count);
            for word in data.chunks_exact(4) {
                let packed = BigEndian::read_u32(word);
                for k in 0..3 {
                    if out.len() == count {
                        break;
                    }
                    out.push(((packed >> (22 - 10 * k)) & 0x3FF) as u16);
                }
            }
            out
        }
        12 => data
            .chunks_exact(2)
            .take(count)
            .map(|c| BigEndian::read_u16(c) >> 4)
            .collect(),
        _ => data
            .chunks_exact(2)
            .take(count)
            .map(BigEndian::read_u16)
            .collect(),
    }
}

impl VideoCodec for DpxCodec {
    fn compression(&self) -> VideoCompression {
        VideoCompression::Dpx
    }

    fn name(&self) -> &str {
        "dpx"
    }

    fn check(&self, params: &CodecParameters) -> MoxResult<()> {
        Self::layout(params).map(|_| ())
    }

    fn encode(&self, planes: &[Plane], params: &CodecParameters) -> MoxResult<Vec<u8>> {
        params.validate_planes(planes)?;
        let layout = Self::layout(params)?;
        let depth = bit_depth(layout.pixel_type)?;
        let (w, h) = (params.width as usize, params.height as usize);
        let comps = layout.components();
        let bps = layout.pixel_type.bytes_per_sample();

        let pixels = interleave(planes, &layout.order);
        let row_values = w * comps;
        let image_size = line_bytes(row_values, depth) * h;

        let mut out = vec![0u8; HEADER_SIZE];
        out[..4].copy_from_slice(MAGIC);
        BigEndian::write_u32(&mut out[OFF_IMAGE_OFFSET..], HEADER_SIZE as u32);
        out[OFF_VERSION..OFF_VERSION + 8].copy_from_slice(VERSION);
        BigEndian::write_u32(&mut out[OFF_FILE_SIZE..], (HEADER_SIZE + image_size) as u32);
        BigEndian::write_u32(&mut out[OFF_DITTO_KEY..], 1);
        BigEndian::write_u32(&mut out[OFF_GENERIC_SIZE..], 1664);
        BigEndian::write_u32(&mut out[OFF_INDUSTRY_SIZE..], 384);
        BigEndian::write_u16(&mut out[OFF_ELEMENT_COUNT..], 1);
        BigEndian::write_u32(&mut out[OFF_PIXELS_PER_LINE..], params.width);
        BigEndian::write_u32(&mut out[OFF_LINES..], params.height);
        BigEndian::write_u32(
            &mut out[OFF_REF_HIGH_CODE..],
            layout.pixel_type.max_value() as u32,
        );
        out[OFF_DESCRIPTOR] = descriptor(comps);
        out[OFF_TRANSFER] = 2;
        out[OFF_COLORIMETRIC] = 2;
        out[OFF_BIT_DEPTH] = depth;
        let packing: u16 = if matches!(depth, 10 | 12) { 1 } else { 0 };
        BigEndian::write_u16(&mut out[OFF_PACKING..], packing);
        BigEndian::write_u32(&mut out[OFF_DATA_OFFSET..], HEADER_SIZE as u32);

        out.reserve(image_size);
        let mut values = Vec::with_capacity(row_values);
        for row in pixels.chunks_exact((row_values * bps).max(1)).take(h) {
            values.clear();
            values.extend(
                row.chunks_exact(bps)
                    .map(|s| layout.pixel_type.read_raw(s) as u16),
            );
            pack_line(&values, depth, &mut out);
        }
        trace!("DPX 编码: {depth} 位, {} 字节", out.len());
        Ok(out)
    }

    fn decode(&self, data: &[u8], params: &CodecParameters) -> MoxResult<Vec<Plane>> {
        let layout = Self::layout(params)?;
        let depth = bit_depth(layout.pixel_type)?;
        if data.len() < HEADER_SIZE || &data[..4] != MAGIC {
            return Err(MoxError::Codec("不是有效的 DPX 数据".into()));
        }
        let width = BigEndian::read_u32(&data[OFF_PIXELS_PER_LINE..]);
        let height = BigEndian::read_u32(&data[OFF_LINES..]);
        let comps = layout.components();
        if width != params.width
            || height != params.height
            || data[OFF_BIT_DEPTH] != depth
            || data[OFF_DESCRIPTOR] != descriptor(comps)
        {
            return Err(MoxError::Codec(format!(
                "DPX 图像 ({width}x{height}, {} 位) 与头部不一致",
                data[OFF_BIT_DEPTH]
            )));
        }

        let offset = BigEndian::read_u32(&data[OFF_DATA_OFFSET..]) as usize;
        let (w, h) = (width as usize, height as usize);
        let row_values = w * comps;
        let stride = line_bytes(row_values, depth);
        let body = data
            .get(offset..offset + stride * h)
            .ok_or_else(|| MoxError::Codec("DPX 图像数据被截断".into()))?;

        let bps = layout.pixel_type.bytes_per_sample();
        let mut pixels = vec![0u8; row_values * h * bps];
        if stride > 0 {
            for (line, dst) in body
                .chunks_exact(stride)
                .zip(pixels.chunks_exact_mut((row_values * bps).max(1)))
            {
                for (v, out) in unpack_line(line, row_values, depth)
                    .into_iter()
                    .zip(dst.chunks_exact_mut(bps))
                {
                    layout.pixel_type.write_raw(f64::from(v), out);
                }
            }
        }
        deinterleave(&pixels, &layout.order, layout.pixel_type, w, h)
    }
}
