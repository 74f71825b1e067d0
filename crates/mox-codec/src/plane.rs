//! 解码后的通道平面.
//!
//! 平面是编解码器与绑定层之间的交换格式: 一个通道的全部采样点,
//! 按行紧密排列, 宿主原生字节序.

use mox_core::{MoxError, MoxResult, PixelType};

/// 单通道平面数据
#[derive(Debug, Clone, PartialEq)]
pub struct Plane {
    /// 采样类型
    pub pixel_type: PixelType,
    /// 平面宽度 (采样点, 已按 x 方向子采样缩小)
    pub width: usize,
    /// 平面高度 (采样点, 已按 y 方向子采样缩小)
    pub height: usize,
    /// 采样数据, 原生字节序, 长度为 width * height * bytes_per_sample
    pub data: Vec<u8>,
}

impl Plane {
    /// 创建平面, 数据长度不匹配时返回错误
    pub fn new(pixel_type: PixelType, width: usize, height: usize, data: Vec<u8>) -> MoxResult<Self> {
        let expected = width * height * pixel_type.bytes_per_sample();
        if data.len() != expected {
            return Err(MoxError::InvalidArgument(format!(
                "平面数据长度不匹配: 期望 {expected}, 实际 {}",
                data.len()
            )));
        }
        Ok(Self {
            pixel_type,
            width,
            height,
            data,
        })
    }

    /// 创建所有采样点均为 `raw_value` 的平面
    pub fn filled(pixel_type: PixelType, width: usize, height: usize, raw_value: f64) -> Self {
        Self {
            pixel_type,
            width,
            height,
            data: pixel_type.fill_buffer(raw_value, width * height),
        }
    }

    /// 采样点数量
    pub fn sample_count(&self) -> usize {
        self.width * self.height
    }

    /// 转换为另一种采样类型
    pub fn convert(&self, pixel_type: PixelType) -> Plane {
        Plane {
            pixel_type,
            width: self.width,
            height: self.height,
            data: self.pixel_type.convert_buffer(&self.data, pixel_type),
        }
    }

    /// 以小端字节序导出数据
    pub fn to_le_bytes(&self) -> Vec<u8> {
        let mut out = self.data.clone();
        swap_native_le(&mut out, self.pixel_type.bytes_per_sample());
        out
    }

    /// 从小端字节序数据创建平面
    pub fn from_le_bytes(
        pixel_type: PixelType,
        width: usize,
        height: usize,
        bytes: &[u8],
    ) -> MoxResult<Self> {
        let mut data = bytes.to_vec();
        swap_native_le(&mut data, pixel_type.bytes_per_sample());
        Self::new(pixel_type, width, height, data)
    }
}

/// 在原生字节序与小端字节序之间转换 (小端主机上为空操作)
///
/// 转换是对称的, 同一函数可用于两个方向.
pub fn swap_native_le(data: &mut [u8], bytes_per_sample: usize) {
    if cfg!(target_endian = "big") && bytes_per_sample > 1 {
        for chunk in data.chunks_exact_mut(bytes_per_sample) {
            chunk.reverse();
        }
    }
}
