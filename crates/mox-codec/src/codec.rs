//! 视频编解码器 trait 与编解码参数.
//!
//! 与流式编解码器不同, MOX 的每一帧都是独立编码的, 因此编解码器是
//! 无状态对象: 一次调用编码或解码一整帧, 可在任意工作线程上并发执行.

use mox_core::{MoxError, MoxResult, PixelType};

use crate::compression::VideoCompression;
use crate::plane::Plane;

/// 单个通道的编解码描述
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaneDesc {
    /// 通道名 (如 "R", "G", "B", "A")
    pub name: String,
    /// 磁盘采样类型
    pub pixel_type: PixelType,
    /// x 方向子采样因子 (1 为全分辨率)
    pub x_sampling: u32,
    /// y 方向子采样因子
    pub y_sampling: u32,
}

impl PlaneDesc {
    /// 创建全分辨率通道描述
    pub fn new(name: impl Into<String>, pixel_type: PixelType) -> Self {
        Self {
            name: name.into(),
            pixel_type,
            x_sampling: 1,
            y_sampling: 1,
        }
    }

    /// 是否为子采样通道
    pub fn is_subsampled(&self) -> bool {
        self.x_sampling != 1 || self.y_sampling != 1
    }
}

/// 编解码参数
///
/// 由头部派生, 对一个文件的全部帧保持不变.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecParameters {
    /// 帧宽度 (像素)
    pub width: u32,
    /// 帧高度 (像素)
    pub height: u32,
    /// 按头部顺序排列的通道
    pub channels: Vec<PlaneDesc>,
    /// 有损质量 1..=100, None 表示无损
    pub quality: Option<u8>,
}

impl CodecParameters {
    /// 第 `index` 个通道的平面尺寸 (宽, 高), 子采样时向上取整
    pub fn plane_dims(&self, index: usize) -> (usize, usize) {
        let desc = &self.channels[index];
        let xs = desc.x_sampling.max(1) as usize;
        let ys = desc.y_sampling.max(1) as usize;
        (
            (self.width as usize).div_ceil(xs),
            (self.height as usize).div_ceil(ys),
        )
    }

    /// 第 `index` 个通道的平面字节数
    pub fn plane_len(&self, index: usize) -> usize {
        let (w, h) = self.plane_dims(index);
        w * h * self.channels[index].pixel_type.bytes_per_sample()
    }

    /// 校验平面集合与参数一致
    pub fn validate_planes(&self, planes: &[Plane]) -> MoxResult<()> {
        if planes.len() != self.channels.len() {
            return Err(MoxError::Logic(format!(
                "平面数量 {} 与通道数量 {} 不一致",
                planes.len(),
                self.channels.len()
            )));
        }
        for (i, (plane, desc)) in planes.iter().zip(&self.channels).enumerate() {
            let (w, h) = self.plane_dims(i);
            if plane.pixel_type != desc.pixel_type || plane.width != w || plane.height != h {
                return Err(MoxError::Logic(format!(
                    "通道 {} 的平面 ({}x{} {}) 与声明 ({w}x{h} {}) 不一致",
                    desc.name, plane.width, plane.height, plane.pixel_type, desc.pixel_type
                )));
            }
        }
        Ok(())
    }

    /// 通道采样类型是否全部相同, 相同时返回该类型
    pub fn uniform_pixel_type(&self) -> Option<PixelType> {
        let first = self.channels.first()?.pixel_type;
        self.channels
            .iter()
            .all(|c| c.pixel_type == first)
            .then_some(first)
    }
}

/// 视频编解码器 trait
///
/// 所有具体编解码器 (PNG, JPEG, DPX 等) 都实现此 trait.
///
/// 使用流程:
/// 1. `OutputFile`/`InputFile` 打开时调用 `check()` 确认通道组合受支持
/// 2. 每帧调用 `encode()` 或 `decode()`, 平面按头部通道顺序排列
pub trait VideoCodec: Send + Sync {
    /// 压缩类型
    fn compression(&self) -> VideoCompression;

    /// 编解码器名称
    fn name(&self) -> &str;

    /// 检查参数描述的通道组合是否受支持
    ///
    /// 不支持时返回 [`MoxError::NotImplemented`].
    fn check(&self, params: &CodecParameters) -> MoxResult<()>;

    /// 编码一帧
    fn encode(&self, planes: &[Plane], params: &CodecParameters) -> MoxResult<Vec<u8>>;

    /// 解码一帧, 返回按头部通道顺序排列的平面
    fn decode(&self, data: &[u8], params: &CodecParameters) -> MoxResult<Vec<Plane>>;
}
