//! Slice 与 FrameBuffer.
//!
//! FrameBuffer 借用调用方的一块内存, 每个 Slice 以字节偏移 (而非裸指针)
//! 描述一个通道在该内存中的位置与步长. 坐标 (x, y) 处采样点的地址为
//! `base + y * y_stride + x * x_stride`, 行步长可以为负 (自下而上的行序).
//!
//! 插入 Slice 时即按四个角点检查边界, 之后的读写不会越界.

use mox_core::{MoxError, MoxResult, PixelType};

/// 调用方内存
///
/// 写入帧只需共享借用, 读取帧需要独占借用.
pub enum Memory<'a> {
    /// 只读内存 (用于 push)
    Shared(&'a [u8]),
    /// 可写内存 (用于 get)
    Exclusive(&'a mut [u8]),
}

impl Memory<'_> {
    /// 只读视图
    pub fn bytes(&self) -> &[u8] {
        match self {
            Self::Shared(b) => b,
            Self::Exclusive(b) => b,
        }
    }

    /// 可写视图, 共享内存返回 None
    pub fn bytes_mut(&mut self) -> Option<&mut [u8]> {
        match self {
            Self::Shared(_) => None,
            Self::Exclusive(b) => Some(b),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 通道内存视图
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Slice {
    /// 内存中的采样类型
    pub pixel_type: PixelType,
    /// 坐标 (0, 0) 处采样点的字节偏移
    pub base: usize,
    /// 同一行相邻采样点的字节间距
    pub x_stride: isize,
    /// 相邻行的字节间距, 可以为负
    pub y_stride: isize,
    /// x 方向子采样因子
    pub x_sampling: u32,
    /// y 方向子采样因子
    pub y_sampling: u32,
    /// 填充值 (该类型的原始数值), 容器没有该通道的数据时写入
    pub fill: f64,
}

impl Slice {
    /// 创建全分辨率 Slice, 填充值为 0
    pub fn new(pixel_type: PixelType, base: usize, x_stride: isize, y_stride: isize) -> Self {
        Self {
            pixel_type,
            base,
            x_stride,
            y_stride,
            x_sampling: 1,
            y_sampling: 1,
            fill: 0.0,
        }
    }

    /// 紧密排列的交错像素中第 `component` 个分量
    ///
    /// 例如 BGRA 8 位像素的 R 分量: `Slice::interleaved(PixelType::Uint8, 2, 4, width)`.
    pub fn interleaved(
        pixel_type: PixelType,
        component: usize,
        components: usize,
        width: usize,
    ) -> Self {
        let bps = pixel_type.bytes_per_sample();
        let pixel = (bps * components) as isize;
        Self::new(pixel_type, component * bps, pixel, pixel * width as isize)
    }

    /// 设置子采样因子
    pub fn with_sampling(mut self, x_sampling: u32, y_sampling: u32) -> Self {
        self.x_sampling = x_sampling;
        self.y_sampling = y_sampling;
        self
    }

    /// 设置填充值
    pub fn with_fill(mut self, fill: f64) -> Self {
        self.fill = fill;
        self
    }

    /// 坐标 (x, y) 的字节偏移, 可能为负
    pub fn offset_of(&self, x: usize, y: usize) -> isize {
        self.base as isize + y as isize * self.y_stride + x as isize * self.x_stride
    }

    /// 坐标 (x, y) 的字节偏移 (已通过边界检查)
    pub(crate) fn index(&self, x: usize, y: usize) -> usize {
        self.offset_of(x, y) as usize
    }

    /// 检查 Slice 在 `width x height` 帧内访问的所有地址都落在 `len` 字节内
    pub fn check_bounds(&self, width: usize, height: usize, len: usize) -> MoxResult<()> {
        if self.x_sampling == 0 || self.y_sampling == 0 {
            return Err(MoxError::InvalidArgument("Slice 子采样因子不能为 0".into()));
        }
        if width == 0 || height == 0 {
            return Ok(());
        }
        let xs = self.x_sampling as usize;
        let ys = self.y_sampling as usize;
        let last_x = (width - 1) / xs * xs;
        let last_y = (height - 1) / ys * ys;
        let bps = self.pixel_type.bytes_per_sample() as isize;
        for (x, y) in [(0, 0), (last_x, 0), (0, last_y), (last_x, last_y)] {
            let at = self.offset_of(x, y);
            if at < 0 || at + bps > len as isize {
                return Err(MoxError::InvalidArgument(format!(
                    "Slice 越界: 坐标 ({x}, {y}) 偏移 {at}, 内存 {len} 字节"
                )));
            }
        }
        Ok(())
    }

    /// 坐标是否被该 Slice 覆盖
    pub(crate) fn covers(&self, x: usize, y: usize) -> bool {
        x % self.x_sampling as usize == 0 && y % self.y_sampling as usize == 0
    }
}

/// 帧缓冲
///
/// 一组按通道名索引的 Slice, 共享同一块调用方内存与帧尺寸.
/// 只在一次 `push_frame`/`get_frame` 调用期间使用.
pub struct FrameBuffer<'a> {
    width: u32,
    height: u32,
    memory: Memory<'a>,
    slices: Vec<(String, Slice)>,
}

impl<'a> FrameBuffer<'a> {
    /// 以只读内存创建 (用于写入帧)
    pub fn from_slice(width: u32, height: u32, memory: &'a [u8]) -> Self {
        Self {
            width,
            height,
            memory: Memory::Shared(memory),
            slices: Vec::new(),
        }
    }

    /// 以可写内存创建 (用于读取帧)
    pub fn from_slice_mut(width: u32, height: u32, memory: &'a mut [u8]) -> Self {
        Self {
            width,
            height,
            memory: Memory::Exclusive(memory),
            slices: Vec::new(),
        }
    }

    /// 绑定通道, 同名绑定会被替换
    ///
    /// Slice 访问的地址超出内存范围时返回 [`MoxError::InvalidArgument`].
    pub fn insert(&mut self, name: impl Into<String>, slice: Slice) -> MoxResult<()> {
        let name = name.into();
        slice.check_bounds(self.width as usize, self.height as usize, self.memory.len())?;
        match self.slices.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = slice,
            None => self.slices.push((name, slice)),
        }
        Ok(())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// 按名称查找
    pub fn find(&self, name: &str) -> Option<&Slice> {
        self.slices.iter().find(|(n, _)| n == name).map(|(_, s)| s)
    }

    /// 按插入顺序遍历
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Slice)> {
        self.slices.iter().map(|(n, s)| (n.as_str(), s))
    }

    pub fn len(&self) -> usize {
        self.slices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    /// 内存是否可写
    pub fn is_writable(&self) -> bool {
        matches!(self.memory, Memory::Exclusive(_))
    }

    pub(crate) fn bytes(&self) -> &[u8] {
        self.memory.bytes()
    }

    /// 拆分为 Slice 列表与可写内存
    pub(crate) fn parts_mut(&mut self) -> (&[(String, Slice)], Option<&mut [u8]>) {
        (&self.slices, self.memory.bytes_mut())
    }
}
