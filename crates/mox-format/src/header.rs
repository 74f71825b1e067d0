//! 容器头部与通道列表.
//!
//! 头部声明整个文件的属性: 尺寸、帧率、采样率、压缩方式、
//! 视频通道列表与音频通道列表. 写入时由调用方在打开 `OutputFile`
//! 之前构造完整; 读取时由 `InputFile` 解析, 此后不可修改.

use log::debug;
use mox_codec::{
    AudioCompression, CodecParameters, CodecPolicy, CodecRegistry, PlaneDesc, VideoCodec,
    VideoCompression, deepest_pixel_type, pick_codec,
};
use mox_core::{AudioLayout, MoxError, MoxResult, PixelType, Rational, SampleType};

/// 视频通道数上限 (帧内通道掩码为 32 位)
pub const MAX_CHANNELS: usize = 32;

/// 视频通道声明
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Channel {
    /// 磁盘采样类型
    pub pixel_type: PixelType,
    /// x 方向子采样因子
    pub x_sampling: u32,
    /// y 方向子采样因子
    pub y_sampling: u32,
}

impl Channel {
    /// 全分辨率通道
    pub const fn new(pixel_type: PixelType) -> Self {
        Self {
            pixel_type,
            x_sampling: 1,
            y_sampling: 1,
        }
    }

    /// 子采样通道
    pub const fn with_sampling(pixel_type: PixelType, x_sampling: u32, y_sampling: u32) -> Self {
        Self {
            pixel_type,
            x_sampling,
            y_sampling,
        }
    }
}

/// 音频通道声明
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioChannel {
    /// 磁盘采样类型
    pub sample_type: SampleType,
}

impl AudioChannel {
    pub const fn new(sample_type: SampleType) -> Self {
        Self { sample_type }
    }
}

/// 视频通道列表
///
/// 保持插入顺序 (决定磁盘布局), 按名称查找.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelList {
    entries: Vec<(String, Channel)>,
}

impl ChannelList {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入通道, 名称重复或非法时返回错误
    pub fn insert(&mut self, name: impl Into<String>, channel: Channel) -> MoxResult<()> {
        let name = name.into();
        check_name(&name, self.index_of(&name).is_some())?;
        if self.entries.len() >= MAX_CHANNELS {
            return Err(MoxError::InvalidArgument(format!(
                "视频通道数不能超过 {MAX_CHANNELS}"
            )));
        }
        if channel.x_sampling == 0 || channel.y_sampling == 0 {
            return Err(MoxError::InvalidArgument(format!(
                "通道 {name} 的子采样因子不能为 0"
            )));
        }
        self.entries.push((name, channel));
        Ok(())
    }

    /// 按名称查找
    pub fn find(&self, name: &str) -> Option<&Channel> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, c)| c)
    }

    /// 按名称查找下标
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|(n, _)| n == name)
    }

    /// 按插入顺序遍历
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Channel)> {
        self.entries.iter().map(|(n, c)| (n.as_str(), c))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 通道名列表
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// 是否包含 alpha 通道
    pub fn has_alpha(&self) -> bool {
        self.find("A").is_some()
    }
}

/// 音频通道列表
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AudioChannelList {
    entries: Vec<(String, AudioChannel)>,
}

impl AudioChannelList {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入通道, 名称重复或非法时返回错误
    pub fn insert(&mut self, name: impl Into<String>, channel: AudioChannel) -> MoxResult<()> {
        let name = name.into();
        check_name(&name, self.index_of(&name).is_some())?;
        self.entries.push((name, channel));
        Ok(())
    }

    /// 按标准布局插入全部声道
    pub fn insert_layout(&mut self, layout: AudioLayout, sample_type: SampleType) -> MoxResult<()> {
        for name in layout.channel_names() {
            self.insert(name, AudioChannel::new(sample_type))?;
        }
        Ok(())
    }

    pub fn find(&self, name: &str) -> Option<&AudioChannel> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, c)| c)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|(n, _)| n == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AudioChannel)> {
        self.entries.iter().map(|(n, c)| (n.as_str(), c))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// 识别标准布局
    pub fn layout(&self) -> Option<AudioLayout> {
        AudioLayout::from_names(self.names().as_slice())
    }
}

fn check_name(name: &str, duplicate: bool) -> MoxResult<()> {
    if name.is_empty() || name.len() > u16::MAX as usize {
        return Err(MoxError::InvalidArgument("通道名不能为空或过长".into()));
    }
    if duplicate {
        return Err(MoxError::InvalidArgument(format!("通道名重复: {name}")));
    }
    Ok(())
}

/// 容器头部
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    width: u32,
    height: u32,
    frame_rate: Rational,
    pixel_aspect_ratio: Rational,
    sample_rate: Rational,
    video_compression: VideoCompression,
    audio_compression: AudioCompression,
    policy: CodecPolicy,
    channels: ChannelList,
    audio_channels: AudioChannelList,
    duration: u64,
    audio_duration: u64,
}

impl Header {
    /// 创建通道列表为空的头部
    ///
    /// 参数在 `OutputFile` 打开时校验.
    pub fn new(
        width: u32,
        height: u32,
        frame_rate: Rational,
        sample_rate: Rational,
        video_compression: VideoCompression,
    ) -> Self {
        Self {
            width,
            height,
            frame_rate,
            pixel_aspect_ratio: Rational::ONE,
            sample_rate,
            video_compression,
            audio_compression: AudioCompression::Pcm,
            policy: CodecPolicy::Lossless,
            channels: ChannelList::new(),
            audio_channels: AudioChannelList::new(),
            duration: 0,
            audio_duration: 0,
        }
    }

    /// 指定音频压缩类型
    pub fn with_audio_compression(mut self, audio_compression: AudioCompression) -> Self {
        self.audio_compression = audio_compression;
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn frame_rate(&self) -> Rational {
        self.frame_rate
    }

    pub fn sample_rate(&self) -> Rational {
        self.sample_rate
    }

    /// 像素宽高比, 默认 1/1
    pub fn pixel_aspect_ratio(&self) -> Rational {
        self.pixel_aspect_ratio
    }

    pub fn set_pixel_aspect_ratio(&mut self, ratio: Rational) {
        self.pixel_aspect_ratio = ratio;
    }

    pub fn video_compression(&self) -> VideoCompression {
        self.video_compression
    }

    pub fn set_video_compression(&mut self, compression: VideoCompression) {
        self.video_compression = compression;
    }

    pub fn audio_compression(&self) -> AudioCompression {
        self.audio_compression
    }

    pub fn channels(&self) -> &ChannelList {
        &self.channels
    }

    pub fn channels_mut(&mut self) -> &mut ChannelList {
        &mut self.channels
    }

    pub fn audio_channels(&self) -> &AudioChannelList {
        &self.audio_channels
    }

    pub fn audio_channels_mut(&mut self) -> &mut AudioChannelList {
        &mut self.audio_channels
    }

    /// 帧数 (仅对读取得到的头部有意义, 待写入的头部为 0)
    pub fn duration(&self) -> u64 {
        self.duration
    }

    /// 音频总采样数 (仅对读取得到的头部有意义)
    pub fn audio_duration(&self) -> u64 {
        self.audio_duration
    }

    pub(crate) fn set_durations(&mut self, frames: u64, samples: u64) {
        self.duration = frames;
        self.audio_duration = samples;
    }

    // ========================
    // 编码策略
    // ========================

    /// 当前编码策略
    pub fn compression_policy(&self) -> CodecPolicy {
        self.policy
    }

    /// 设置为无损策略 (取代质量策略)
    pub fn set_lossless(&mut self) {
        self.policy = CodecPolicy::Lossless;
    }

    /// 设置有损质量 1..=100 (取代无损策略)
    pub fn set_quality(&mut self, quality: u8) -> MoxResult<()> {
        self.policy = CodecPolicy::quality(quality)?;
        Ok(())
    }

    pub(crate) fn set_policy(&mut self, policy: CodecPolicy) {
        self.policy = policy;
    }

    /// 解析实际使用的视频压缩类型
    ///
    /// 声明为 `Auto` 时按最深通道类型、alpha 与无损策略自动选择;
    /// 选中的编解码器不接受该通道组合 (混合类型、子采样等) 时退回未压缩.
    pub fn resolved_video_compression(&self) -> MoxResult<VideoCompression> {
        if self.video_compression != VideoCompression::Auto {
            return Ok(self.video_compression);
        }
        let pixel_type = deepest_pixel_type(self.channels.iter().map(|(_, c)| c.pixel_type))
            .ok_or_else(|| MoxError::Logic("没有视频通道, 无法自动选择编解码器".into()))?;
        let picked = pick_codec(self.policy.is_lossless(), pixel_type, self.has_alpha())?;
        let codec = CodecRegistry::with_defaults().create(picked)?;
        if let Err(err) = codec.check(&self.codec_parameters(None)) {
            debug!("{picked} 无法写入当前通道组合, 改用未压缩: {err}");
            return Ok(VideoCompression::Uncompressed);
        }
        Ok(picked)
    }

    /// 生成编解码参数
    pub fn codec_parameters(&self, quality: Option<u8>) -> CodecParameters {
        CodecParameters {
            width: self.width,
            height: self.height,
            channels: self
                .channels
                .iter()
                .map(|(name, c)| PlaneDesc {
                    name: name.to_string(),
                    pixel_type: c.pixel_type,
                    x_sampling: c.x_sampling,
                    y_sampling: c.y_sampling,
                })
                .collect(),
            quality,
        }
    }

    // ========================
    // 派生属性
    // ========================

    /// 是否包含 alpha 通道
    pub fn has_alpha(&self) -> bool {
        self.channels.has_alpha()
    }

    /// 视频位深: 各通道最大位数, 至少为 8
    pub fn video_bit_depth(&self) -> u32 {
        self.channels
            .iter()
            .map(|(_, c)| c.pixel_type.bits())
            .max()
            .unwrap_or(8)
            .max(8)
    }

    /// 音频位深: 各声道最大位数, 无音频时为 0
    pub fn audio_bit_depth(&self) -> u32 {
        self.audio_channels
            .iter()
            .map(|(_, c)| c.sample_type.bits())
            .max()
            .unwrap_or(0)
    }

    /// 估算视频码率 (kbps)
    ///
    /// 无压缩按原始数据量计算, 其他编解码器按一半估算.
    pub fn estimated_video_kbps(&self) -> f64 {
        let bits_per_frame: f64 = self
            .channels
            .iter()
            .map(|(_, c)| {
                let xs = f64::from(c.x_sampling.max(1));
                let ys = f64::from(c.y_sampling.max(1));
                f64::from(self.width) * f64::from(self.height) * f64::from(c.pixel_type.bits())
                    / (xs * ys)
            })
            .sum();
        let fps = self.frame_rate.to_f64();
        if !fps.is_finite() {
            return 0.0;
        }
        let multiplier = if self.video_compression.is_compressed() {
            0.5
        } else {
            1.0
        };
        bits_per_frame * fps / 1024.0 * multiplier
    }

    /// 估算音频码率 (kbps)
    pub fn estimated_audio_kbps(&self) -> f64 {
        let rate = self.sample_rate.to_f64();
        if !rate.is_finite() {
            return 0.0;
        }
        let bits: u32 = self.audio_channels.iter().map(|(_, c)| c.sample_type.bits()).sum();
        rate * f64::from(bits) / 1024.0
    }

    /// 校验头部可用于写入
    pub fn validate(&self) -> MoxResult<()> {
        if self.channels.is_empty() && self.audio_channels.is_empty() {
            return Err(MoxError::InvalidArgument(
                "头部没有任何视频或音频通道".into(),
            ));
        }
        if !self.pixel_aspect_ratio.is_positive() {
            return Err(MoxError::InvalidArgument(format!(
                "像素宽高比无效: {}",
                self.pixel_aspect_ratio
            )));
        }
        if !self.channels.is_empty() {
            if self.width == 0 || self.height == 0 {
                return Err(MoxError::InvalidArgument(format!(
                    "宽高必须为正数: {}x{}",
                    self.width, self.height
                )));
            }
            if !self.frame_rate.is_positive() {
                return Err(MoxError::InvalidArgument(format!(
                    "帧率无效: {}",
                    self.frame_rate
                )));
            }
            for (name, c) in self.channels.iter() {
                c.pixel_type
                    .ensure_codable()
                    .map_err(|_| MoxError::Logic(format!("通道 {name} 使用了 UINT32")))?;
            }
        }
        if !self.audio_channels.is_empty() && !self.sample_rate.is_positive() {
            return Err(MoxError::InvalidArgument(format!(
                "采样率无效: {}",
                self.sample_rate
            )));
        }
        Ok(())
    }
}
