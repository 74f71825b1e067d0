//! AudioSlice 与 AudioBuffer.
//!
//! 一维版本的 Slice: 第 `i` 个采样位于 `base + i * stride`.

use mox_core::{MoxError, MoxResult, SampleType};

use crate::frame_buffer::Memory;

/// 声道内存视图
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioSlice {
    /// 内存中的采样类型
    pub sample_type: SampleType,
    /// 第 0 个采样的字节偏移
    pub base: usize,
    /// 相邻采样的字节间距
    pub stride: isize,
}

impl AudioSlice {
    pub fn new(sample_type: SampleType, base: usize, stride: isize) -> Self {
        Self {
            sample_type,
            base,
            stride,
        }
    }

    /// 交错采样中第 `channel` 个声道 (共 `channels` 个同类型声道)
    pub fn interleaved(sample_type: SampleType, channel: usize, channels: usize) -> Self {
        let bps = sample_type.bytes_per_sample();
        Self::new(sample_type, channel * bps, (bps * channels) as isize)
    }

    pub(crate) fn index(&self, i: usize) -> usize {
        (self.base as isize + i as isize * self.stride) as usize
    }

    /// 检查前 `samples` 个采样都落在 `len` 字节内
    pub fn check_bounds(&self, samples: usize, len: usize) -> MoxResult<()> {
        if samples == 0 {
            return Ok(());
        }
        let bps = self.sample_type.bytes_per_sample() as isize;
        for i in [0, samples - 1] {
            let at = self.base as isize + i as isize * self.stride;
            if at < 0 || at + bps > len as isize {
                return Err(MoxError::InvalidArgument(format!(
                    "AudioSlice 越界: 采样 {i} 偏移 {at}, 内存 {len} 字节"
                )));
            }
        }
        Ok(())
    }
}

/// 音频缓冲
pub struct AudioBuffer<'a> {
    samples: usize,
    memory: Memory<'a>,
    slices: Vec<(String, AudioSlice)>,
}

impl<'a> AudioBuffer<'a> {
    /// 以只读内存创建 (用于写入音频)
    pub fn from_slice(samples: usize, memory: &'a [u8]) -> Self {
        Self {
            samples,
            memory: Memory::Shared(memory),
            slices: Vec::new(),
        }
    }

    /// 以可写内存创建 (用于读取音频)
    pub fn from_slice_mut(samples: usize, memory: &'a mut [u8]) -> Self {
        Self {
            samples,
            memory: Memory::Exclusive(memory),
            slices: Vec::new(),
        }
    }

    /// 绑定声道, 同名绑定会被替换
    pub fn insert(&mut self, name: impl Into<String>, slice: AudioSlice) -> MoxResult<()> {
        let name = name.into();
        slice.check_bounds(self.samples, self.memory.len())?;
        match self.slices.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = slice,
            None => self.slices.push((name, slice)),
        }
        Ok(())
    }

    /// 采样数
    pub fn samples(&self) -> usize {
        self.samples
    }

    pub fn find(&self, name: &str) -> Option<&AudioSlice> {
        self.slices.iter().find(|(n, _)| n == name).map(|(_, s)| s)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AudioSlice)> {
        self.slices.iter().map(|(n, s)| (n.as_str(), s))
    }

    pub fn len(&self) -> usize {
        self.slices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    pub fn is_writable(&self) -> bool {
        matches!(self.memory, Memory::Exclusive(_))
    }

    pub(crate) fn bytes(&self) -> &[u8] {
        self.memory.bytes()
    }

    pub(crate) fn parts_mut(&mut self) -> (&[(String, AudioSlice)], Option<&mut [u8]>) {
        (&self.slices, self.memory.bytes_mut())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interleaved_stereo() {
        let mem = vec![0u8; 2 * 2 * 10];
        let mut ab = AudioBuffer::from_slice(10, &mem);
        ab.insert("Left", AudioSlice::interleaved(SampleType::Signed16, 0, 2))
            .unwrap();
        ab.insert("Right", AudioSlice::interleaved(SampleType::Signed16, 1, 2))
            .unwrap();
        assert_eq!(ab.find("Right").unwrap().index(9), 38);
        assert_eq!(ab.len(), 2);
    }

    #[test]
    fn test_audio_bounds() {
        let mem = vec![0u8; 6];
        let mut ab = AudioBuffer::from_slice(4, &mem);
        assert!(ab.insert("Mono", AudioSlice::new(SampleType::Signed16, 0, 2)).is_err());
        assert!(ab.insert("Mono", AudioSlice::new(SampleType::Unsigned8, 0, 1)).is_ok());
        // 反向步长
        assert!(ab.insert("Mono", AudioSlice::new(SampleType::Unsigned8, 3, -1)).is_ok());
        assert!(ab.insert("Mono", AudioSlice::new(SampleType::Unsigned8, 2, -1)).is_err());
    }
}
