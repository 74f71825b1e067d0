//! 音频采样类型定义.
//!
//! 与 [`crate::PixelType`] 相同, 同一枚举既描述磁盘上的音频通道,
//! 也描述调用方内存中的 `AudioSlice`.

use std::fmt;

use crate::error::{MoxError, MoxResult};

/// 音频采样类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleType {
    /// 无符号 8 位整数, 以 128 为静音
    Unsigned8,
    /// 有符号 16 位整数
    Signed16,
    /// 有符号 24 位整数 (紧密排列 3 字节)
    Signed24,
    /// 有符号 32 位整数
    Signed32,
    /// 32 位浮点, 范围 [-1.0, 1.0]
    AFloat,
}

impl SampleType {
    /// 全部类型 (按标签顺序)
    pub const ALL: [SampleType; 5] = [
        Self::Unsigned8,
        Self::Signed16,
        Self::Signed24,
        Self::Signed32,
        Self::AFloat,
    ];

    /// 位深
    pub const fn bits(&self) -> u32 {
        match self {
            Self::Unsigned8 => 8,
            Self::Signed16 => 16,
            Self::Signed24 => 24,
            Self::Signed32 | Self::AFloat => 32,
        }
    }

    /// 每个采样点占用的字节数
    pub const fn bytes_per_sample(&self) -> usize {
        match self {
            Self::Unsigned8 => 1,
            Self::Signed16 => 2,
            Self::Signed24 => 3,
            Self::Signed32 | Self::AFloat => 4,
        }
    }

    /// 是否为浮点类型
    pub const fn is_float(&self) -> bool {
        matches!(self, Self::AFloat)
    }

    /// 静音采样的字节表示 (原生字节序)
    pub fn silence(&self) -> Vec<u8> {
        match self {
            Self::Unsigned8 => vec![128],
            other => vec![0; other.bytes_per_sample()],
        }
    }

    /// 磁盘标签
    pub const fn tag(&self) -> u8 {
        match self {
            Self::Unsigned8 => 0,
            Self::Signed16 => 1,
            Self::Signed24 => 2,
            Self::Signed32 => 3,
            Self::AFloat => 4,
        }
    }

    /// 从磁盘标签解析
    pub fn from_tag(tag: u8) -> MoxResult<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.tag() == tag)
            .ok_or_else(|| MoxError::Format(format!("未知音频采样类型标签: {tag}")))
    }

    /// 整数满幅 (2^(bits-1)), 浮点为 1.0
    fn full_scale(&self) -> f64 {
        match self {
            Self::AFloat => 1.0,
            other => f64::from(1u32 << (other.bits() - 1)),
        }
    }

    /// 读取归一化数值, 范围约为 [-1.0, 1.0)
    pub fn read_normalized(&self, bytes: &[u8]) -> f64 {
        match self {
            Self::Unsigned8 => (f64::from(bytes[0]) - 128.0) / 128.0,
            Self::Signed16 => f64::from(i16::from_ne_bytes([bytes[0], bytes[1]])) / self.full_scale(),
            Self::Signed24 => f64::from(read_i24(bytes)) / self.full_scale(),
            Self::Signed32 => {
                f64::from(i32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
                    / self.full_scale()
            }
            Self::AFloat => f64::from(f32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])),
        }
    }

    /// 写入归一化数值, 整数类型四舍五入并截断
    pub fn write_normalized(&self, value: f64, out: &mut [u8]) {
        let value = if value.is_nan() { 0.0 } else { value };
        match self {
            Self::Unsigned8 => {
                out[0] = (value * 128.0 + 128.0).round().clamp(0.0, 255.0) as u8;
            }
            Self::Signed16 => {
                let v = scale_int(value, self.full_scale()) as i16;
                out[..2].copy_from_slice(&v.to_ne_bytes());
            }
            Self::Signed24 => write_i24(scale_int(value, self.full_scale()) as i32, out),
            Self::Signed32 => {
                let v = scale_int(value, self.full_scale()) as i32;
                out[..4].copy_from_slice(&v.to_ne_bytes());
            }
            Self::AFloat => out[..4].copy_from_slice(&(value as f32).to_ne_bytes()),
        }
    }

    /// 将一个采样点从 `self` 类型转换为 `dst` 类型, 类型相同时直接拷贝字节
    pub fn convert_sample(&self, src: &[u8], dst: SampleType, out: &mut [u8]) {
        if *self == dst {
            let n = self.bytes_per_sample();
            out[..n].copy_from_slice(&src[..n]);
        } else {
            dst.write_normalized(self.read_normalized(src), out);
        }
    }
}

fn scale_int(value: f64, full: f64) -> f64 {
    (value * full).round().clamp(-full, full - 1.0)
}

fn read_i24(bytes: &[u8]) -> i32 {
    let raw = if cfg!(target_endian = "little") {
        i32::from_le_bytes([bytes[0], bytes[1], bytes[2], 0])
    } else {
        i32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]])
    };
    // 符号扩展
    (raw << 8) >> 8
}

fn write_i24(value: i32, out: &mut [u8]) {
    if cfg!(target_endian = "little") {
        out[..3].copy_from_slice(&value.to_le_bytes()[..3]);
    } else {
        out[..3].copy_from_slice(&value.to_be_bytes()[1..]);
    }
}

impl fmt::Display for SampleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unsigned8 => "u8",
            Self::Signed16 => "s16",
            Self::Signed24 => "s24",
            Self::Signed32 => "s32",
            Self::AFloat => "flt",
        };
        write!(f, "{name}")
    }
}
