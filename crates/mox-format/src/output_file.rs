//! 容器写入.
//!
//! 状态机: 构造 (写入签名与 HEAD) -> 任意次 `push_frame`/`push_audio`
//! -> `finalize` (写入 MIDX 与 MEND). 未调用 `finalize` 的文件无法被打开.
//!
//! 帧编码以任务形式提交到调度器, 按提交顺序写出; 在途任务数不超过工作线程数.

use std::collections::VecDeque;
use std::sync::Arc;

use log::{debug, warn};
use mox_codec::{
    AudioPlane, CodecParameters, CodecRegistry, JobHandle, PcmCodec, Plane, Scheduler,
    VideoCodec, VideoCompression, effective_quality, global_scheduler,
};
use mox_core::{MoxError, MoxResult};

use crate::audio_buffer::AudioBuffer;
use crate::binding::{audio_types, extract_audio, extract_planes};
use crate::container::{
    AudioChunkEntry, ContainerIndex, TAG_AUDC, TAG_HEAD, TAG_MEND, TAG_MIDX, TAG_VFRM,
    encode_header, write_chunk_header, write_preamble,
};
use crate::frame_buffer::FrameBuffer;
use crate::header::Header;
use crate::io::{IoContext, IoStream};

/// 在途编码任务: 通道掩码 + 编码结果
type PendingFrame = (u32, JobHandle<MoxResult<Vec<u8>>>);

/// MOX 输出文件
pub struct OutputFile {
    io: IoContext,
    header: Header,
    codec: Option<Arc<dyn VideoCodec>>,
    params: Arc<CodecParameters>,
    pcm: PcmCodec,
    scheduler: Arc<Scheduler>,
    pending: VecDeque<PendingFrame>,
    index: ContainerIndex,
    finalized: bool,
}

impl OutputFile {
    /// 使用进程级默认调度器创建输出文件
    pub fn new(stream: Box<dyn IoStream>, header: Header) -> MoxResult<Self> {
        Self::with_scheduler(stream, header, global_scheduler())
    }

    /// 使用指定调度器创建输出文件
    ///
    /// 校验头部, 解析自动编解码器选择, 并写入文件签名与 HEAD 块.
    pub fn with_scheduler(
        stream: Box<dyn IoStream>,
        mut header: Header,
        scheduler: Arc<Scheduler>,
    ) -> MoxResult<Self> {
        header.validate()?;
        header.set_durations(0, 0);

        let (codec, params) = if header.channels().is_empty() {
            // 纯音频文件没有可供自动选择的通道类型
            if header.video_compression() == VideoCompression::Auto {
                header.set_video_compression(VideoCompression::Uncompressed);
            }
            (None, header.codec_parameters(None))
        } else {
            let compression = header.resolved_video_compression()?;
            header.set_video_compression(compression);
            let codec = CodecRegistry::with_defaults().create(compression)?;
            let quality = effective_quality(header.compression_policy(), compression);
            let params = header.codec_parameters(quality);
            codec.check(&params)?;
            debug!(
                "打开输出: {}x{} @ {} fps, 编解码器 {}, 质量 {:?}",
                header.width(),
                header.height(),
                header.frame_rate(),
                codec.name(),
                quality
            );
            (Some(codec), params)
        };
        let pcm = PcmCodec::new(audio_types(&header));

        let mut io = IoContext::new(stream);
        write_preamble(&mut io)?;
        let payload = encode_header(&header)?;
        write_chunk_header(&mut io, &TAG_HEAD, payload.len() as u64)?;
        io.write_all(&payload)?;

        Ok(Self {
            io,
            header,
            codec,
            params: Arc::new(params),
            pcm,
            scheduler,
            pending: VecDeque::new(),
            index: ContainerIndex::default(),
            finalized: false,
        })
    }

    /// 写入时使用的头部 (视频压缩类型已解析)
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// 已提交的帧数
    pub fn frames_written(&self) -> u64 {
        (self.index.frames.len() + self.pending.len()) as u64
    }

    /// 已写入的音频采样数
    pub fn samples_written(&self) -> u64 {
        self.index.total_samples
    }

    fn ensure_open(&self) -> MoxResult<()> {
        if self.finalized {
            return Err(MoxError::Logic("文件已 finalize, 不能继续写入".into()));
        }
        Ok(())
    }

    /// 追加一帧
    ///
    /// FrameBuffer 的宽高必须与头部一致.
    pub fn push_frame(&mut self, fb: &FrameBuffer<'_>) -> MoxResult<()> {
        self.ensure_open()?;
        let codec = self
            .codec
            .clone()
            .ok_or_else(|| MoxError::Logic("头部没有视频通道, 不能写入帧".into()))?;
        if fb.width() != self.header.width() || fb.height() != self.header.height() {
            return Err(MoxError::Logic(format!(
                "帧尺寸 {}x{} 与头部 {}x{} 不一致",
                fb.width(),
                fb.height(),
                self.header.width(),
                self.header.height()
            )));
        }

        let (planes, mask) = extract_planes(&self.header, fb, &self.scheduler)?;
        let params = Arc::clone(&self.params);
        let job = self
            .scheduler
            .spawn(move || encode_frame(codec.as_ref(), &planes, &params));
        self.pending.push_back((mask, job));

        while self.pending.len() > self.scheduler.threads() {
            self.write_next_frame()?;
        }
        Ok(())
    }

    fn write_next_frame(&mut self) -> MoxResult<()> {
        let Some((mask, job)) = self.pending.pop_front() else {
            return Ok(());
        };
        let data = job.wait()??;
        let offset = self.io.position();
        write_chunk_header(&mut self.io, &TAG_VFRM, 4 + data.len() as u64)?;
        self.io.write_u32_be(mask)?;
        self.io.write_all(&data)?;
        self.index.frames.push(offset);
        Ok(())
    }

    fn drain_frames(&mut self) -> MoxResult<()> {
        while !self.pending.is_empty() {
            self.write_next_frame()?;
        }
        Ok(())
    }

    /// 追加一段音频
    ///
    /// 音频块按调用顺序写入; 此前提交的帧会先全部写出.
    pub fn push_audio(&mut self, ab: &AudioBuffer<'_>) -> MoxResult<()> {
        self.ensure_open()?;
        if self.header.audio_channels().is_empty() {
            return Err(MoxError::Logic("头部没有音频通道, 不能写入音频".into()));
        }
        if ab.samples() == 0 {
            return Ok(());
        }
        let samples = u32::try_from(ab.samples()).map_err(|_| {
            MoxError::InvalidArgument(format!("单次写入的采样数过多: {}", ab.samples()))
        })?;
        self.drain_frames()?;

        let planes: Vec<AudioPlane> = extract_audio(&self.header, ab);
        let data = self.pcm.encode(&planes, ab.samples())?;
        let offset = self.io.position();
        write_chunk_header(&mut self.io, &TAG_AUDC, 4 + data.len() as u64)?;
        self.io.write_u32_be(samples)?;
        self.io.write_all(&data)?;
        self.index.audio.push(AudioChunkEntry {
            offset,
            first_sample: self.index.total_samples,
            samples,
        });
        self.index.total_samples += u64::from(samples);
        Ok(())
    }

    /// 写出索引与尾部, 提交文件
    ///
    /// 只能调用一次.
    pub fn finalize(&mut self) -> MoxResult<()> {
        self.ensure_open()?;
        // 无论成功与否都不允许再次写入
        self.finalized = true;
        self.drain_frames()?;

        let midx = self.io.position();
        let payload = self.index.encode()?;
        write_chunk_header(&mut self.io, &TAG_MIDX, payload.len() as u64)?;
        self.io.write_all(&payload)?;
        self.io.write_tag(&TAG_MEND)?;
        self.io.write_u64_be(midx)?;
        self.io.flush()?;
        debug!(
            "finalize: {} 帧, {} 个音频采样",
            self.index.frames.len(),
            self.index.total_samples
        );
        Ok(())
    }

    /// 是否已 finalize
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }
}

fn encode_frame(
    codec: &dyn VideoCodec,
    planes: &[Plane],
    params: &CodecParameters,
) -> MoxResult<Vec<u8>> {
    codec.encode(planes, params)
}

impl Drop for OutputFile {
    fn drop(&mut self) {
        if !self.finalized {
            warn!("OutputFile 未调用 finalize 即被释放, 文件不完整");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame_buffer::Slice;
    use crate::header::Channel;
    use crate::io::MemoryStream;
    use mox_core::{ErrorKind, PixelType, Rational};

    fn gray_header() -> Header {
        let mut h = Header::new(
            8,
            8,
            Rational::new(25, 1),
            Rational::new(48000, 1),
            VideoCompression::Auto,
        );
        h.channels_mut().insert("Y", Channel::new(PixelType::Uint8)).unwrap();
        h
    }

    #[test]
    fn test_auto_codec_resolved() {
        let out = OutputFile::with_scheduler(
            Box::new(MemoryStream::new()),
            gray_header(),
            Arc::new(Scheduler::inline()),
        )
        .unwrap();
        assert_eq!(out.header().video_compression(), VideoCompression::Png);
    }

    #[test]
    fn test_push_after_finalize() {
        let mut out = OutputFile::with_scheduler(
            Box::new(MemoryStream::new()),
            gray_header(),
            Arc::new(Scheduler::inline()),
        )
        .unwrap();
        let mem = vec![0u8; 64];
        let mut fb = FrameBuffer::from_slice(8, 8, &mem);
        fb.insert("Y", Slice::new(PixelType::Uint8, 0, 1, 8)).unwrap();
        out.push_frame(&fb).unwrap();
        out.finalize().unwrap();
        assert_eq!(out.push_frame(&fb).unwrap_err().kind(), ErrorKind::Logic);
        assert_eq!(out.finalize().unwrap_err().kind(), ErrorKind::Logic);
        assert_eq!(out.frames_written(), 1);
    }

    #[test]
    fn test_invalid_header_rejected() {
        let h = Header::new(
            8,
            8,
            Rational::new(25, 1),
            Rational::new(48000, 1),
            VideoCompression::Uncompressed,
        );
        let err = OutputFile::with_scheduler(
            Box::new(MemoryStream::new()),
            h,
            Arc::new(Scheduler::inline()),
        )
        .err()
        .map(|e| e.kind());
        assert_eq!(err, Some(ErrorKind::Argument));
    }

    #[test]
    fn test_unimplemented_codec() {
        let mut h = gray_header();
        h.set_video_compression(VideoCompression::Dirac);
        let err = OutputFile::with_scheduler(
            Box::new(MemoryStream::new()),
            h,
            Arc::new(Scheduler::inline()),
        )
        .err()
        .map(|e| e.kind());
        assert_eq!(err, Some(ErrorKind::NotImplemented));
    }
}
