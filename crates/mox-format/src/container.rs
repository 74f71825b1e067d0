//! MOX 容器结构.
//!
//! 文件布局 (全部大端):
//!
//! ```text
//! 签名      8 字节  8A 'M' 'O' 'X' '\r' '\n' 1A '\n'
//! 版本      u16
//! HEAD      头部字段
//! VFRM ...  每帧一个: u32 通道掩码 + 编解码数据
//! AUDC ...  每个音频块一个: u32 采样数 + 交错 PCM
//! MIDX      索引: 帧偏移表, 音频块表, 总采样数
//! MEND      标签 + u64 MIDX 偏移 (文件最后 12 字节)
//! ```
//!
//! 块 = 4 字节标签 + u64 负载长度 + 负载. 写入端只顺序写, 偏移由自身记录.

use std::io::{self, Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use mox_codec::{AudioCompression, CodecPolicy, VideoCompression};
use mox_core::{MoxError, MoxResult, PixelType, Rational, SampleType};

use crate::header::{AudioChannel, Channel, Header};
use crate::io::IoContext;

/// 文件签名
pub const SIGNATURE: [u8; 8] = [0x8A, b'M', b'O', b'X', b'\r', b'\n', 0x1A, b'\n'];

/// 当前容器版本
pub const VERSION: u16 = 1;

pub const TAG_HEAD: [u8; 4] = *b"HEAD";
pub const TAG_VFRM: [u8; 4] = *b"VFRM";
pub const TAG_AUDC: [u8; 4] = *b"AUDC";
pub const TAG_MIDX: [u8; 4] = *b"MIDX";
pub const TAG_MEND: [u8; 4] = *b"MEND";

/// 块头大小 (标签 + 长度)
pub const CHUNK_HEADER_SIZE: u64 = 12;

/// MEND 尾部大小
pub const TRAILER_SIZE: u64 = 12;

/// HEAD 负载上限
const MAX_HEAD_SIZE: u64 = 1 << 20;

/// 音频块索引项
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioChunkEntry {
    /// AUDC 块起始偏移
    pub offset: u64,
    /// 块内第一个采样的绝对位置
    pub first_sample: u64,
    /// 块内采样数
    pub samples: u32,
}

/// 容器索引 (MIDX)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerIndex {
    /// 各帧 VFRM 块的起始偏移
    pub frames: Vec<u64>,
    /// 音频块表
    pub audio: Vec<AudioChunkEntry>,
    /// 总采样数
    pub total_samples: u64,
}

impl ContainerIndex {
    /// 序列化为 MIDX 负载
    pub fn encode(&self) -> MoxResult<Vec<u8>> {
        let mut out = Vec::with_capacity(24 + self.frames.len() * 8 + self.audio.len() * 20);
        out.write_u64::<BigEndian>(self.frames.len() as u64)?;
        for &offset in &self.frames {
            out.write_u64::<BigEndian>(offset)?;
        }
        out.write_u64::<BigEndian>(self.audio.len() as u64)?;
        for entry in &self.audio {
            out.write_u64::<BigEndian>(entry.offset)?;
            out.write_u64::<BigEndian>(entry.first_sample)?;
            out.write_u32::<BigEndian>(entry.samples)?;
        }
        out.write_u64::<BigEndian>(self.total_samples)?;
        Ok(out)
    }

    /// 解析 MIDX 负载
    pub fn decode(payload: &[u8]) -> MoxResult<Self> {
        let mut r = payload;
        let frame_count = r.read_u64::<BigEndian>().map_err(truncated)?;
        if frame_count > (r.len() / 8) as u64 {
            return Err(MoxError::Format(format!("索引帧数 {frame_count} 超出数据长度")));
        }
        let frames = (0..frame_count)
            .map(|_| r.read_u64::<BigEndian>())
            .collect::<io::Result<Vec<_>>>()
            .map_err(truncated)?;
        let audio_count = r.read_u64::<BigEndian>().map_err(truncated)?;
        if audio_count > (r.len() / 20) as u64 {
            return Err(MoxError::Format(format!("索引音频块数 {audio_count} 超出数据长度")));
        }
        let mut audio = Vec::with_capacity(audio_count as usize);
        for _ in 0..audio_count {
            audio.push(AudioChunkEntry {
                offset: r.read_u64::<BigEndian>().map_err(truncated)?,
                first_sample: r.read_u64::<BigEndian>().map_err(truncated)?,
                samples: r.read_u32::<BigEndian>().map_err(truncated)?,
            });
        }
        let total_samples = r.read_u64::<BigEndian>().map_err(truncated)?;

        // 音频块必须首尾相接
        let mut expected = 0u64;
        for entry in &audio {
            if entry.first_sample != expected {
                return Err(MoxError::Format(format!(
                    "音频块起始采样 {} 与预期 {expected} 不符",
                    entry.first_sample
                )));
            }
            expected += u64::from(entry.samples);
        }
        if expected != total_samples {
            return Err(MoxError::Format(format!(
                "音频总采样数 {total_samples} 与块表合计 {expected} 不符"
            )));
        }
        Ok(Self {
            frames,
            audio,
            total_samples,
        })
    }
}

fn truncated(_: io::Error) -> MoxError {
    MoxError::Format("块数据不完整".into())
}

// ========================
// 头部
// ========================

fn write_name(out: &mut Vec<u8>, name: &str) -> MoxResult<()> {
    let len = u16::try_from(name.len())
        .map_err(|_| MoxError::InvalidArgument(format!("通道名过长: {name}")))?;
    out.write_u16::<BigEndian>(len)?;
    out.write_all(name.as_bytes())?;
    Ok(())
}

fn read_name(r: &mut &[u8]) -> MoxResult<String> {
    let len = r.read_u16::<BigEndian>().map_err(truncated)? as usize;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf).map_err(truncated)?;
    String::from_utf8(buf).map_err(|_| MoxError::Format("通道名不是有效的 UTF-8".into()))
}

fn write_rational(out: &mut Vec<u8>, r: Rational) -> MoxResult<()> {
    out.write_i32::<BigEndian>(r.num)?;
    out.write_i32::<BigEndian>(r.den)?;
    Ok(())
}

fn read_rational(r: &mut &[u8]) -> MoxResult<Rational> {
    let num = r.read_i32::<BigEndian>().map_err(truncated)?;
    let den = r.read_i32::<BigEndian>().map_err(truncated)?;
    if den == 0 {
        return Err(MoxError::Format(format!("有理数分母为 0: {num}/0")));
    }
    Ok(Rational::new(num, den))
}

/// 序列化 HEAD 负载
///
/// 视频压缩类型必须已解析为具体编解码器.
pub fn encode_header(header: &Header) -> MoxResult<Vec<u8>> {
    let mut out = Vec::with_capacity(64);
    out.write_u32::<BigEndian>(header.width())?;
    out.write_u32::<BigEndian>(header.height())?;
    write_rational(&mut out, header.frame_rate())?;
    write_rational(&mut out, header.pixel_aspect_ratio())?;
    write_rational(&mut out, header.sample_rate())?;
    out.write_u8(header.video_compression().tag())?;
    out.write_u8(header.audio_compression().tag())?;
    match header.compression_policy() {
        CodecPolicy::Lossless => {
            out.write_u8(0)?;
            out.write_u8(0)?;
        }
        CodecPolicy::Quality(q) => {
            out.write_u8(1)?;
            out.write_u8(q)?;
        }
    }

    out.write_u16::<BigEndian>(header.channels().len() as u16)?;
    for (name, channel) in header.channels().iter() {
        write_name(&mut out, name)?;
        out.write_u8(channel.pixel_type.tag())?;
        out.write_u32::<BigEndian>(channel.x_sampling)?;
        out.write_u32::<BigEndian>(channel.y_sampling)?;
    }
    out.write_u16::<BigEndian>(header.audio_channels().len() as u16)?;
    for (name, channel) in header.audio_channels().iter() {
        write_name(&mut out, name)?;
        out.write_u8(channel.sample_type.tag())?;
    }
    Ok(out)
}

/// 解析 HEAD 负载
pub fn decode_header(payload: &[u8]) -> MoxResult<Header> {
    let mut r = payload;
    let width = r.read_u32::<BigEndian>().map_err(truncated)?;
    let height = r.read_u32::<BigEndian>().map_err(truncated)?;
    let frame_rate = read_rational(&mut r)?;
    let pixel_aspect_ratio = read_rational(&mut r)?;
    let sample_rate = read_rational(&mut r)?;
    let video = VideoCompression::from_tag(r.read_u8().map_err(truncated)?)?;
    let audio = AudioCompression::from_tag(r.read_u8().map_err(truncated)?)?;
    let policy = match (r.read_u8().map_err(truncated)?, r.read_u8().map_err(truncated)?) {
        (0, _) => CodecPolicy::Lossless,
        (1, q) => CodecPolicy::quality(q).map_err(|_| MoxError::Format(format!("质量值无效: {q}")))?,
        (kind, _) => return Err(MoxError::Format(format!("未知编码策略: {kind}"))),
    };
    if video == VideoCompression::Auto {
        return Err(MoxError::Format("头部视频压缩类型未解析".into()));
    }

    let mut header =
        Header::new(width, height, frame_rate, sample_rate, video).with_audio_compression(audio);
    header.set_pixel_aspect_ratio(pixel_aspect_ratio);
    header.set_policy(policy);

    let count = r.read_u16::<BigEndian>().map_err(truncated)?;
    for _ in 0..count {
        let name = read_name(&mut r)?;
        let pixel_type = PixelType::from_tag(r.read_u8().map_err(truncated)?)?;
        let xs = r.read_u32::<BigEndian>().map_err(truncated)?;
        let ys = r.read_u32::<BigEndian>().map_err(truncated)?;
        header
            .channels_mut()
            .insert(name, Channel::with_sampling(pixel_type, xs, ys))
            .map_err(|e| MoxError::Format(format!("通道列表无效: {e}")))?;
    }
    let count = r.read_u16::<BigEndian>().map_err(truncated)?;
    for _ in 0..count {
        let name = read_name(&mut r)?;
        let sample_type = SampleType::from_tag(r.read_u8().map_err(truncated)?)?;
        header
            .audio_channels_mut()
            .insert(name, AudioChannel::new(sample_type))
            .map_err(|e| MoxError::Format(format!("音频通道列表无效: {e}")))?;
    }
    Ok(header)
}

// ========================
// 块读写
// ========================

/// 写入签名与版本
pub fn write_preamble(io: &mut IoContext) -> MoxResult<()> {
    io.write_all(&SIGNATURE)?;
    io.write_u16_be(VERSION)
}

/// 读取并校验签名与版本
pub fn read_preamble(io: &mut IoContext) -> MoxResult<()> {
    let mut sig = [0u8; 8];
    io.read_exact(&mut sig).map_err(|e| match e {
        MoxError::Eof => MoxError::Format("数据过短, 不是 MOX 文件".into()),
        other => other,
    })?;
    if sig != SIGNATURE {
        return Err(MoxError::Format("签名不匹配, 不是 MOX 文件".into()));
    }
    let version = io.read_u16_be().map_err(eof_as_format)?;
    if version != VERSION {
        return Err(MoxError::NotImplemented(format!("MOX 容器版本 {version}")));
    }
    Ok(())
}

/// 写入块头
pub fn write_chunk_header(io: &mut IoContext, tag: &[u8; 4], len: u64) -> MoxResult<()> {
    io.write_tag(tag)?;
    io.write_u64_be(len)
}

/// 读取块头并校验标签
pub fn read_chunk_header(io: &mut IoContext, expected: &[u8; 4]) -> MoxResult<u64> {
    let tag = io.read_tag().map_err(eof_as_format)?;
    if &tag != expected {
        return Err(MoxError::Format(format!(
            "期望 {} 块, 实际为 {}",
            String::from_utf8_lossy(expected),
            String::from_utf8_lossy(&tag)
        )));
    }
    io.read_u64_be().map_err(eof_as_format)
}

/// 读取 HEAD 块
pub fn read_head(io: &mut IoContext) -> MoxResult<Header> {
    let len = read_chunk_header(io, &TAG_HEAD)?;
    if len > MAX_HEAD_SIZE {
        return Err(MoxError::Format(format!("HEAD 块过大: {len} 字节")));
    }
    let payload = io.read_bytes(len as usize).map_err(eof_as_format)?;
    decode_header(&payload)
}

/// 从文件尾部定位并读取索引
pub fn read_index(io: &mut IoContext, size: u64) -> MoxResult<ContainerIndex> {
    let min = SIGNATURE.len() as u64 + 2 + TRAILER_SIZE;
    if size < min {
        return Err(MoxError::Format("文件不完整, 可能未调用 finalize".into()));
    }
    io.seek(size - TRAILER_SIZE)?;
    let tag = io.read_tag().map_err(eof_as_format)?;
    if tag != TAG_MEND {
        return Err(MoxError::Format("文件不完整, 可能未调用 finalize".into()));
    }
    let midx = io.read_u64_be().map_err(eof_as_format)?;
    if midx.saturating_add(CHUNK_HEADER_SIZE) > size - TRAILER_SIZE {
        return Err(MoxError::Format(format!("索引偏移 {midx} 超出文件范围")));
    }
    io.seek(midx)?;
    let len = read_chunk_header(io, &TAG_MIDX)?;
    if (midx + CHUNK_HEADER_SIZE).saturating_add(len) > size - TRAILER_SIZE {
        return Err(MoxError::Format(format!("索引长度 {len} 超出文件范围")));
    }
    let payload = io.read_bytes(len as usize).map_err(eof_as_format)?;
    let index = ContainerIndex::decode(&payload)?;
    if let Some(&bad) = index
        .frames
        .iter()
        .chain(index.audio.iter().map(|a| &a.offset))
        .find(|&&offset| offset.saturating_add(CHUNK_HEADER_SIZE) > midx)
    {
        return Err(MoxError::Format(format!("块偏移 {bad} 超出数据区")));
    }
    Ok(index)
}

/// 读取 `offset` 处的块负载, 负载不得越过 `limit`
pub fn read_chunk_at(
    io: &mut IoContext,
    offset: u64,
    tag: &[u8; 4],
    limit: u64,
) -> MoxResult<Vec<u8>> {
    io.seek(offset)?;
    let len = read_chunk_header(io, tag)?;
    if offset.saturating_add(CHUNK_HEADER_SIZE).saturating_add(len) > limit {
        return Err(MoxError::Format(format!(
            "{} 块长度 {len} 超出文件范围",
            String::from_utf8_lossy(tag)
        )));
    }
    io.read_bytes(len as usize).map_err(eof_as_format)
}

fn eof_as_format(e: MoxError) -> MoxError {
    match e {
        MoxError::Eof => MoxError::Format("文件提前结束".into()),
        other => other,
    }
}
