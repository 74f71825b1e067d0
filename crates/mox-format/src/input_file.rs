//! 容器读取.
//!
//! 打开时读取 HEAD 并从文件尾部定位 MIDX, 之后可以任意顺序读取帧.
//! 音频按绝对采样位置定位, 顺序读取时复用最近解码的音频块.

use std::sync::Arc;

use log::debug;
use mox_codec::{
    AudioPlane, CodecParameters, CodecRegistry, PcmCodec, Scheduler, VideoCodec,
    effective_quality, global_scheduler,
};
use mox_core::{MoxError, MoxResult};

use crate::audio_buffer::AudioBuffer;
use crate::binding::{audio_types, scatter_audio, scatter_planes};
use crate::container::{
    ContainerIndex, TAG_AUDC, TAG_VFRM, TRAILER_SIZE, read_chunk_at, read_head, read_index,
    read_preamble,
};
use crate::frame_buffer::FrameBuffer;
use crate::header::Header;
use crate::io::{IoContext, IoStream};

/// MOX 输入文件
pub struct InputFile {
    io: IoContext,
    header: Header,
    codec: Option<Arc<dyn VideoCodec>>,
    params: CodecParameters,
    pcm: PcmCodec,
    scheduler: Arc<Scheduler>,
    index: ContainerIndex,
    /// 数据区上界 (MEND 起始偏移)
    limit: u64,
    /// 下一次 read_audio 的起始采样
    audio_pos: u64,
    /// 最近解码的音频块 (块序号, 各声道数据)
    audio_cache: Option<(usize, Vec<AudioPlane>)>,
}

impl InputFile {
    /// 使用进程级默认调度器打开
    pub fn new(stream: Box<dyn IoStream>) -> MoxResult<Self> {
        Self::with_scheduler(stream, global_scheduler())
    }

    /// 使用指定调度器打开
    ///
    /// 不是 MOX 文件或文件不完整时返回 [`MoxError::Format`],
    /// 使用了尚未实现的编解码器时返回 [`MoxError::NotImplemented`].
    pub fn with_scheduler(stream: Box<dyn IoStream>, scheduler: Arc<Scheduler>) -> MoxResult<Self> {
        let mut io = IoContext::new(stream);
        read_preamble(&mut io)?;
        let mut header = read_head(&mut io)?;
        let size = io.size()?;
        let index = read_index(&mut io, size)?;
        header.set_durations(index.frames.len() as u64, index.total_samples);

        let (codec, params) = if header.channels().is_empty() {
            (None, header.codec_parameters(None))
        } else {
            let compression = header.video_compression();
            let codec = CodecRegistry::with_defaults().create(compression)?;
            let params = header.codec_parameters(effective_quality(
                header.compression_policy(),
                compression,
            ));
            codec.check(&params)?;
            (Some(codec), params)
        };
        debug!(
            "打开输入: {}x{}, {} 帧, {} 个音频采样, 视频压缩 {}",
            header.width(),
            header.height(),
            header.duration(),
            header.audio_duration(),
            header.video_compression()
        );

        Ok(Self {
            io,
            pcm: PcmCodec::new(audio_types(&header)),
            header,
            codec,
            params,
            scheduler,
            index,
            limit: size - TRAILER_SIZE,
            audio_pos: 0,
            audio_cache: None,
        })
    }

    /// 文件头部 (含帧数与音频总采样数)
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// 帧数
    pub fn duration(&self) -> u64 {
        self.header.duration()
    }

    /// 解码第 `index` 帧到 FrameBuffer
    ///
    /// `index` 必须小于 [`InputFile::duration`], FrameBuffer 必须可写且尺寸与头部一致.
    pub fn get_frame(&mut self, index: u64, fb: &mut FrameBuffer<'_>) -> MoxResult<()> {
        if index >= self.duration() {
            return Err(MoxError::Logic(format!(
                "帧号 {index} 越界, 共 {} 帧",
                self.duration()
            )));
        }
        if !fb.is_writable() {
            return Err(MoxError::Logic("读取帧需要可写的 FrameBuffer".into()));
        }
        if fb.width() != self.header.width() || fb.height() != self.header.height() {
            return Err(MoxError::Logic(format!(
                "帧尺寸 {}x{} 与头部 {}x{} 不一致",
                fb.width(),
                fb.height(),
                self.header.width(),
                self.header.height()
            )));
        }
        let codec = self
            .codec
            .as_ref()
            .ok_or_else(|| MoxError::Logic("文件没有视频通道".into()))?;

        let offset = self.index.frames[index as usize];
        let payload = read_chunk_at(&mut self.io, offset, &TAG_VFRM, self.limit)?;
        if payload.len() < 4 {
            return Err(MoxError::Format(format!("第 {index} 帧数据过短")));
        }
        let mask = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]);
        let planes = codec.decode(&payload[4..], &self.params)?;
        self.params
            .validate_planes(&planes)
            .map_err(|e| MoxError::Format(format!("第 {index} 帧解码结果无效: {e}")))?;
        scatter_planes(&self.header, &planes, mask, fb, &self.scheduler)
    }

    /// 定位音频读取位置 (绝对采样偏移)
    pub fn seek_audio(&mut self, position: u64) -> MoxResult<()> {
        if position > self.index.total_samples {
            return Err(MoxError::Logic(format!(
                "音频位置 {position} 越界, 共 {} 个采样",
                self.index.total_samples
            )));
        }
        self.audio_pos = position;
        Ok(())
    }

    /// 当前音频读取位置
    pub fn audio_position(&self) -> u64 {
        self.audio_pos
    }

    /// 从当前位置读取 `count` 个采样到 AudioBuffer
    ///
    /// 读取越过音轨末尾时返回 [`MoxError::Logic`].
    pub fn read_audio(&mut self, count: usize, ab: &mut AudioBuffer<'_>) -> MoxResult<()> {
        let end = self.audio_pos + count as u64;
        if end > self.index.total_samples {
            return Err(MoxError::Logic(format!(
                "读取 {}..{end} 越过音轨末尾 {}",
                self.audio_pos, self.index.total_samples
            )));
        }
        if count > ab.samples() {
            return Err(MoxError::Logic(format!(
                "请求 {count} 个采样, AudioBuffer 只有 {} 个",
                ab.samples()
            )));
        }
        if !ab.is_writable() {
            return Err(MoxError::Logic("读取音频需要可写的 AudioBuffer".into()));
        }

        let mut out: Vec<AudioPlane> = audio_types(&self.header)
            .into_iter()
            .map(|t| AudioPlane {
                sample_type: t,
                data: Vec::with_capacity(count * t.bytes_per_sample()),
            })
            .collect();
        let mut pos = self.audio_pos;
        while pos < end {
            let chunk = self
                .index
                .audio
                .partition_point(|e| e.first_sample + u64::from(e.samples) <= pos);
            let entry = self.index.audio[chunk];
            let planes = self.load_audio_chunk(chunk)?;
            let from = (pos - entry.first_sample) as usize;
            let to = ((end - entry.first_sample) as usize).min(entry.samples as usize);
            for (dst, src) in out.iter_mut().zip(planes) {
                let bps = src.sample_type.bytes_per_sample();
                dst.data.extend_from_slice(&src.data[from * bps..to * bps]);
            }
            pos = entry.first_sample + to as u64;
        }

        scatter_audio(&self.header, &out, count, ab)?;
        self.audio_pos = end;
        Ok(())
    }

    fn load_audio_chunk(&mut self, chunk: usize) -> MoxResult<&[AudioPlane]> {
        let cached = matches!(&self.audio_cache, Some((i, _)) if *i == chunk);
        if !cached {
            let entry = self.index.audio[chunk];
            let payload = read_chunk_at(&mut self.io, entry.offset, &TAG_AUDC, self.limit)?;
            if payload.len() < 4 {
                return Err(MoxError::Format(format!("音频块 {chunk} 数据过短")));
            }
            let samples = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]);
            let planes = self.pcm.decode(&payload[4..])?;
            let decoded = planes.first().map_or(0, |p| p.samples());
            if samples != entry.samples || decoded != samples as usize {
                return Err(MoxError::Format(format!(
                    "音频块 {chunk} 采样数 {decoded} 与索引 {} 不符",
                    entry.samples
                )));
            }
            self.audio_cache = Some((chunk, planes));
        }
        match &self.audio_cache {
            Some((_, planes)) => Ok(planes),
            None => Err(MoxError::Logic("音频缓存为空".into())),
        }
    }
}
