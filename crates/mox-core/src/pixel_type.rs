//! 像素采样类型定义.
//!
//! 描述单个通道中一个采样点的存储编码, 同时用于磁盘通道声明
//! (`Channel`) 与内存绑定声明 (`Slice`).
//!
//! 不同类型之间的转换经过归一化的 f64 值: 整数类型除以各自的最大值,
//! 浮点类型原样使用. 相同类型之间直接拷贝字节, 保证位精确.

use std::fmt;

use crate::error::{MoxError, MoxResult};
use crate::half::{f16_to_f32, f32_to_f16};

/// 像素采样类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelType {
    /// 无符号 8 位整数
    Uint8,
    /// 无符号 10 位整数 (以 16 位存储)
    Uint10,
    /// 无符号 12 位整数 (以 16 位存储)
    Uint12,
    /// 无符号 16 位整数
    Uint16,
    /// 16 位宿主原生格式, 取值范围 0..=32768
    Uint16A,
    /// 无符号 32 位整数 (仅声明, 不能作为编解码目标)
    Uint32,
    /// 半精度浮点
    Half,
    /// 单精度浮点
    Float,
}

impl PixelType {
    /// 全部类型 (按标签顺序)
    pub const ALL: [PixelType; 8] = [
        Self::Uint8,
        Self::Uint10,
        Self::Uint12,
        Self::Uint16,
        Self::Uint16A,
        Self::Uint32,
        Self::Half,
        Self::Float,
    ];

    /// 有效位深
    pub const fn bits(&self) -> u32 {
        match self {
            Self::Uint8 => 8,
            Self::Uint10 => 10,
            Self::Uint12 => 12,
            Self::Uint16 | Self::Uint16A | Self::Half => 16,
            Self::Uint32 | Self::Float => 32,
        }
    }

    /// 每个采样点在内存中占用的字节数
    pub const fn bytes_per_sample(&self) -> usize {
        match self {
            Self::Uint8 => 1,
            Self::Uint10 | Self::Uint12 | Self::Uint16 | Self::Uint16A | Self::Half => 2,
            Self::Uint32 | Self::Float => 4,
        }
    }

    /// 是否为浮点类型
    pub const fn is_float(&self) -> bool {
        matches!(self, Self::Half | Self::Float)
    }

    /// 整数类型的最大值 (浮点类型返回 1.0)
    pub const fn max_value(&self) -> f64 {
        match self {
            Self::Uint8 => 255.0,
            Self::Uint10 => 1023.0,
            Self::Uint12 => 4095.0,
            Self::Uint16 => 65535.0,
            Self::Uint16A => 32768.0,
            Self::Uint32 => 4_294_967_295.0,
            Self::Half | Self::Float => 1.0,
        }
    }

    /// 不透明 alpha 的取值 (以该类型的原始数值表示)
    pub const fn opaque_value(&self) -> f64 {
        self.max_value()
    }

    /// 可作为编解码目标 (UINT32 仅声明, 不可用)
    pub const fn is_codable(&self) -> bool {
        !matches!(self, Self::Uint32)
    }

    /// 校验可作为编解码目标
    pub fn ensure_codable(&self) -> MoxResult<()> {
        if self.is_codable() {
            Ok(())
        } else {
            Err(MoxError::Logic(format!("像素类型 {self} 不能用于编解码")))
        }
    }

    /// 磁盘标签
    pub const fn tag(&self) -> u8 {
        match self {
            Self::Uint8 => 0,
            Self::Uint10 => 1,
            Self::Uint12 => 2,
            Self::Uint16 => 3,
            Self::Uint16A => 4,
            Self::Uint32 => 5,
            Self::Half => 6,
            Self::Float => 7,
        }
    }

    /// 从磁盘标签解析
    pub fn from_tag(tag: u8) -> MoxResult<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.tag() == tag)
            .ok_or_else(|| MoxError::Format(format!("未知像素类型标签: {tag}")))
    }

    /// 读取一个原生字节序采样点的原始数值 (整数为整数值, 浮点为浮点值)
    ///
    /// `bytes` 长度必须不小于 [`PixelType::bytes_per_sample`].
    pub fn read_raw(&self, bytes: &[u8]) -> f64 {
        match self {
            Self::Uint8 => f64::from(bytes[0]),
            Self::Uint10 | Self::Uint12 | Self::Uint16 | Self::Uint16A => {
                f64::from(u16::from_ne_bytes([bytes[0], bytes[1]]))
            }
            Self::Uint32 => f64::from(u32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])),
            Self::Half => f64::from(f16_to_f32(u16::from_ne_bytes([bytes[0], bytes[1]]))),
            Self::Float => f64::from(f32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])),
        }
    }

    /// 以原始数值写入一个原生字节序采样点, 整数类型四舍五入并截断到合法范围
    pub fn write_raw(&self, value: f64, out: &mut [u8]) {
        match self {
            Self::Uint8 => out[0] = clamp_round(value, 255.0) as u8,
            Self::Uint10 | Self::Uint12 | Self::Uint16 | Self::Uint16A => {
                let v = clamp_round(value, self.max_value()) as u16;
                out[..2].copy_from_slice(&v.to_ne_bytes());
            }
            Self::Uint32 => {
                let v = clamp_round(value, self.max_value()) as u32;
                out[..4].copy_from_slice(&v.to_ne_bytes());
            }
            Self::Half => out[..2].copy_from_slice(&f32_to_f16(value as f32).to_ne_bytes()),
            Self::Float => out[..4].copy_from_slice(&(value as f32).to_ne_bytes()),
        }
    }

    /// 读取归一化数值 (整数除以最大值, 浮点原样)
    pub fn read_normalized(&self, bytes: &[u8]) -> f64 {
        let raw = self.read_raw(bytes);
        if self.is_float() {
            raw
        } else {
            raw / self.max_value()
        }
    }

    /// 写入归一化数值
    pub fn write_normalized(&self, value: f64, out: &mut [u8]) {
        if self.is_float() {
            self.write_raw(value, out);
        } else {
            self.write_raw(value * self.max_value(), out);
        }
    }

    /// 将一个采样点从 `self` 类型转换为 `dst` 类型
    ///
    /// 类型相同时直接拷贝字节.
    pub fn convert_sample(&self, src: &[u8], dst: PixelType, out: &mut [u8]) {
        if *self == dst {
            let n = self.bytes_per_sample();
            out[..n].copy_from_slice(&src[..n]);
        } else {
            dst.write_normalized(self.read_normalized(src), out);
        }
    }

    /// 将一段紧密排列的采样数据整体转换为另一类型
    pub fn convert_buffer(&self, src: &[u8], dst: PixelType) -> Vec<u8> {
        if *self == dst {
            return src.to_vec();
        }
        let sb = self.bytes_per_sample();
        let db = dst.bytes_per_sample();
        let count = src.len() / sb;
        let mut out = vec![0u8; count * db];
        for (s, d) in src.chunks_exact(sb).zip(out.chunks_exact_mut(db)) {
            self.convert_sample(s, dst, d);
        }
        out
    }

    /// 生成 `count` 个取值为 `raw_value` 的采样点 (原生字节序)
    pub fn fill_buffer(&self, raw_value: f64, count: usize) -> Vec<u8> {
        let bps = self.bytes_per_sample();
        let mut one = [0u8; 4];
        self.write_raw(raw_value, &mut one);
        let mut out = Vec::with_capacity(count * bps);
        for _ in 0..count {
            out.extend_from_slice(&one[..bps]);
        }
        out
    }
}

fn clamp_round(value: f64, max: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.round().clamp(0.0, max)
}

impl fmt::Display for PixelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uint8 => "uint8",
            Self::Uint10 => "uint10",
            Self::Uint12 => "uint12",
            Self::Uint16 => "uint16",
            Self::Uint16A => "uint16a",
            Self::Uint32 => "uint32",
            Self::Half => "half",
            Self::Float => "float",
        };
        write!(f, "{name}")
    }
}
