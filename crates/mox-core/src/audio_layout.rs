//! 标准音频声道布局.
//!
//! 布局只决定音频通道的命名与顺序, 容器本身按名称查找通道.

use bitflags::bitflags;
use std::fmt;

bitflags! {
    /// 扬声器位置掩码
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SpeakerMask: u32 {
        /// 单声道
        const MONO       = 1 << 0;
        /// 左声道
        const LEFT       = 1 << 1;
        /// 右声道
        const RIGHT      = 1 << 2;
        /// 中央声道
        const CENTER     = 1 << 3;
        /// 低频效果
        const LFE        = 1 << 4;
        /// 后方左声道
        const REAR_LEFT  = 1 << 5;
        /// 后方右声道
        const REAR_RIGHT = 1 << 6;
    }
}

/// 扬声器位置与通道名的对应表 (按标准顺序)
const SPEAKER_NAMES: [(SpeakerMask, &str); 7] = [
    (SpeakerMask::MONO, "Mono"),
    (SpeakerMask::LEFT, "Left"),
    (SpeakerMask::RIGHT, "Right"),
    (SpeakerMask::CENTER, "Center"),
    (SpeakerMask::LFE, "LFE"),
    (SpeakerMask::REAR_LEFT, "RearLeft"),
    (SpeakerMask::REAR_RIGHT, "RearRight"),
];

/// 音频声道布局
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioLayout {
    /// 单声道
    Mono,
    /// 立体声 (左右)
    Stereo,
    /// 5.1 环绕声
    Surround51,
}

impl AudioLayout {
    /// 扬声器掩码
    pub const fn mask(&self) -> SpeakerMask {
        match self {
            Self::Mono => SpeakerMask::MONO,
            Self::Stereo => SpeakerMask::LEFT.union(SpeakerMask::RIGHT),
            Self::Surround51 => SpeakerMask::LEFT
                .union(SpeakerMask::RIGHT)
                .union(SpeakerMask::CENTER)
                .union(SpeakerMask::LFE)
                .union(SpeakerMask::REAR_LEFT)
                .union(SpeakerMask::REAR_RIGHT),
        }
    }

    /// 声道数
    pub fn channels(&self) -> usize {
        self.mask().bits().count_ones() as usize
    }

    /// 按标准顺序返回通道名
    pub fn channel_names(&self) -> Vec<String> {
        names_for_mask(self.mask())
    }

    /// 根据声道数选择标准布局, 无对应布局时返回 None
    pub fn from_channels(channels: usize) -> Option<Self> {
        match channels {
            1 => Some(Self::Mono),
            2 => Some(Self::Stereo),
            6 => Some(Self::Surround51),
            _ => None,
        }
    }

    /// 根据一组通道名识别标准布局 (顺序无关)
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Option<Self> {
        let mut mask = SpeakerMask::empty();
        for name in names {
            let (bit, _) = SPEAKER_NAMES
                .iter()
                .find(|(_, n)| *n == name.as_ref())?;
            mask |= *bit;
        }
        [Self::Mono, Self::Stereo, Self::Surround51]
            .into_iter()
            .find(|l| l.mask() == mask && l.channels() == names.len())
    }

    /// 通用通道名 `Channel1..ChannelN`
    pub fn generic(count: usize) -> Vec<String> {
        (1..=count).map(|i| format!("Channel{i}")).collect()
    }

    /// 声道数对应的通道名: 标准布局优先, 否则使用通用命名
    pub fn names_for_count(count: usize) -> Vec<String> {
        match Self::from_channels(count) {
            Some(layout) => layout.channel_names(),
            None => Self::generic(count),
        }
    }
}

fn names_for_mask(mask: SpeakerMask) -> Vec<String> {
    SPEAKER_NAMES
        .iter()
        .filter(|(bit, _)| mask.contains(*bit))
        .map(|(_, name)| (*name).to_string())
        .collect()
}

impl fmt::Display for AudioLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mono => write!(f, "mono"),
            Self::Stereo => write!(f, "stereo"),
            Self::Surround51 => write!(f, "5.1"),
        }
    }
}
