//! PCM 音频打包.
//!
//! 将各声道的采样交错为 PCM 数据块. 每个声道保留自己的采样类型,
//! 采样以小端字节序存储, 不足 8 位对齐的类型 (S24) 紧密排列.

use log::trace;
use mox_core::{MoxError, MoxResult, SampleType};

use crate::plane::swap_native_le;

/// 单声道采样数据 (原生字节序, 紧密排列)
#[derive(Debug, Clone, PartialEq)]
pub struct AudioPlane {
    /// 采样类型
    pub sample_type: SampleType,
    /// 采样数据
    pub data: Vec<u8>,
}

impl AudioPlane {
    /// 创建 `samples` 个静音采样
    pub fn silence(sample_type: SampleType, samples: usize) -> Self {
        let one = sample_type.silence();
        let mut data = Vec::with_capacity(one.len() * samples);
        for _ in 0..samples {
            data.extend_from_slice(&one);
        }
        Self { sample_type, data }
    }

    /// 采样数
    pub fn samples(&self) -> usize {
        self.data.len() / self.sample_type.bytes_per_sample()
    }
}

/// 交错 PCM 编解码器
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcmCodec {
    /// 各声道采样类型 (按头部顺序)
    types: Vec<SampleType>,
    /// 每个采样帧 (所有声道各一个采样) 的字节数
    frame_bytes: usize,
}

impl PcmCodec {
    /// 按声道采样类型创建
    pub fn new(types: Vec<SampleType>) -> Self {
        let frame_bytes = types.iter().map(|t| t.bytes_per_sample()).sum();
        Self { types, frame_bytes }
    }

    /// 每个采样帧的字节数
    pub fn frame_bytes(&self) -> usize {
        self.frame_bytes
    }

    /// 交错编码 `samples` 个采样帧
    pub fn encode(&self, planes: &[AudioPlane], samples: usize) -> MoxResult<Vec<u8>> {
        if planes.len() != self.types.len() {
            return Err(MoxError::Logic(format!(
                "声道数量 {} 与声明 {} 不一致",
                planes.len(),
                self.types.len()
            )));
        }
        for (plane, t) in planes.iter().zip(&self.types) {
            if plane.sample_type != *t || plane.samples() < samples {
                return Err(MoxError::Logic(format!(
                    "声道数据 ({} 个 {} 采样) 与声明 ({samples} 个 {t} 采样) 不一致",
                    plane.samples(),
                    plane.sample_type
                )));
            }
        }

        let mut out = Vec::with_capacity(samples * self.frame_bytes);
        for s in 0..samples {
            for plane in planes {
                let bps = plane.sample_type.bytes_per_sample();
                let start = out.len();
                out.extend_from_slice(&plane.data[s * bps..(s + 1) * bps]);
                swap_native_le(&mut out[start..], bps);
            }
        }
        trace!("PCM 编码: {samples} 个采样帧, {} 字节", out.len());
        Ok(out)
    }

    /// 解交错 `data` 中的全部采样帧
    pub fn decode(&self, data: &[u8]) -> MoxResult<Vec<AudioPlane>> {
        if self.frame_bytes == 0 {
            return Ok(Vec::new());
        }
        if data.len() % self.frame_bytes != 0 {
            return Err(MoxError::Format(format!(
                "PCM 数据长度 {} 不是采样帧大小 {} 的整数倍",
                data.len(),
                self.frame_bytes
            )));
        }
        let samples = data.len() / self.frame_bytes;
        let mut planes: Vec<AudioPlane> = self
            .types
            .iter()
            .map(|&t| AudioPlane {
                sample_type: t,
                data: Vec::with_capacity(samples * t.bytes_per_sample()),
            })
            .collect();
        for frame in data.chunks_exact(self.frame_bytes) {
            let mut at = 0;
            for plane in &mut planes {
                let bps = plane.sample_type.bytes_per_sample();
                let start = plane.data.len();
                plane.data.extend_from_slice(&frame[at..at + bps]);
                swap_native_le(&mut plane.data[start..], bps);
                at += bps;
            }
        }
        Ok(planes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pcm_mixed_types() {
        let codec = PcmCodec::new(vec![SampleType::Signed16, SampleType::Signed24]);
        assert_eq!(codec.frame_bytes(), 5);
        let left = AudioPlane {
            sample_type: SampleType::Signed16,
            data: [1i16, -2].iter().flat_map(|v| v.to_ne_bytes()).collect(),
        };
        let right = AudioPlane::silence(SampleType::Signed24, 2);
        let data = codec.encode(&[left.clone(), right.clone()], 2).unwrap();
        assert_eq!(data.len(), 10);
        assert_eq!(&data[..2], &1i16.to_le_bytes());
        assert_eq!(codec.decode(&data).unwrap(), vec![left, right]);
    }

    #[test]
    fn test_pcm_rejects_short_plane() {
        let codec = PcmCodec::new(vec![SampleType::Unsigned8]);
        let plane = AudioPlane::silence(SampleType::Unsigned8, 3);
        assert!(codec.encode(&[plane], 4).is_err());
        assert!(codec.decode(&[0u8; 3]).is_ok());
    }
}
