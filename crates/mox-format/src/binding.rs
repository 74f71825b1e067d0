//! Slice 绑定: 调用方内存与通道平面之间的搬运.
//!
//! 编码方向: 对头部声明的每个通道, 若 FrameBuffer 绑定了同名 Slice, 按步长读取
//! 并转换为通道类型; 否则以默认值 (alpha 为不透明, 其余为 0) 合成, 并在
//! 通道掩码中清除该位. FrameBuffer 中头部没有的通道不会被读取.
//!
//! 解码方向: 对 FrameBuffer 中的每个 Slice, 若头部声明了该通道且掩码位有效,
//! 写入解码数据; 否则写入该 Slice 的填充值. 头部有而 FrameBuffer 未绑定的
//! 通道被丢弃.
//!
//! 子采样: 通道平面采样点 (i, j) 对应帧坐标 (i * ys, j * xs). Slice 只在
//! `y % ys == 0 && x % xs == 0` 的帧坐标上读写.

use log::trace;
use mox_codec::{AudioPlane, Plane, Scheduler};
use mox_core::{MoxError, MoxResult, PixelType, SampleType};

use crate::audio_buffer::AudioBuffer;
use crate::frame_buffer::{FrameBuffer, Slice};
use crate::header::Header;

/// 通道缺失时写入的默认值
pub fn default_fill(name: &str, pixel_type: PixelType) -> f64 {
    if name == "A" {
        pixel_type.opaque_value()
    } else {
        0.0
    }
}

struct ExtractJob {
    channel_type: PixelType,
    x_sampling: usize,
    y_sampling: usize,
    width: usize,
    height: usize,
    source: Option<Slice>,
    fill: f64,
}

/// 从 FrameBuffer 提取头部声明的全部通道平面
///
/// 返回平面列表 (按头部通道顺序) 与通道掩码.
pub fn extract_planes(
    header: &Header,
    fb: &FrameBuffer<'_>,
    scheduler: &Scheduler,
) -> MoxResult<(Vec<Plane>, u32)> {
    let width = header.width() as usize;
    let height = header.height() as usize;
    let mut mask = 0u32;
    let mut jobs = Vec::with_capacity(header.channels().len());
    for (i, (name, channel)) in header.channels().iter().enumerate() {
        let xs = channel.x_sampling as usize;
        let ys = channel.y_sampling as usize;
        let source = fb.find(name).copied();
        if source.is_some() {
            mask |= 1 << i;
        } else {
            trace!("通道 {name} 未绑定, 使用默认值");
        }
        jobs.push(ExtractJob {
            channel_type: channel.pixel_type,
            x_sampling: xs,
            y_sampling: ys,
            width: width.div_ceil(xs),
            height: height.div_ceil(ys),
            source,
            fill: default_fill(name, channel.pixel_type),
        });
    }

    let bytes = fb.bytes();
    let planes = scheduler.map(jobs, |job| match job.source {
        Some(slice) => read_plane(bytes, &slice, &job),
        None => Plane::filled(job.channel_type, job.width, job.height, job.fill),
    });
    Ok((planes, mask))
}

fn read_plane(bytes: &[u8], slice: &Slice, job: &ExtractJob) -> Plane {
    let out_bps = job.channel_type.bytes_per_sample();
    let in_bps = slice.pixel_type.bytes_per_sample();
    let sxs = slice.x_sampling as usize;
    let sys = slice.y_sampling as usize;
    let mut data = vec![0u8; job.width * job.height * out_bps];
    let mut at = 0;
    for i in 0..job.height {
        let y = i * job.y_sampling;
        let sy = y - y % sys;
        for j in 0..job.width {
            let x = j * job.x_sampling;
            let sx = x - x % sxs;
            let src = slice.index(sx, sy);
            slice.pixel_type.convert_sample(
                &bytes[src..src + in_bps],
                job.channel_type,
                &mut data[at..at + out_bps],
            );
            at += out_bps;
        }
    }
    Plane {
        pixel_type: job.channel_type,
        width: job.width,
        height: job.height,
        data,
    }
}

enum Source {
    /// 已转换为 Slice 类型的平面数据 (数据, 平面宽度, 通道子采样)
    Plane(Vec<u8>, usize, usize, usize),
    /// 单个填充采样
    Fill(Vec<u8>),
}

/// 将解码后的通道平面写入 FrameBuffer
pub fn scatter_planes(
    header: &Header,
    planes: &[Plane],
    mask: u32,
    fb: &mut FrameBuffer<'_>,
    scheduler: &Scheduler,
) -> MoxResult<()> {
    let width = fb.width() as usize;
    let height = fb.height() as usize;
    let (slices, memory) = fb.parts_mut();
    let memory = memory.ok_or_else(|| MoxError::Logic("读取帧需要可写的 FrameBuffer".into()))?;

    let jobs: Vec<(Slice, Option<(&Plane, usize, usize)>)> = slices
        .iter()
        .map(|(name, slice)| {
            let plane = header
                .channels()
                .iter()
                .enumerate()
                .find(|(_, (n, _))| *n == name.as_str())
                .filter(|(i, _)| mask & (1 << i) != 0)
                .and_then(|(i, (_, c))| {
                    planes
                        .get(i)
                        .map(|p| (p, c.x_sampling as usize, c.y_sampling as usize))
                });
            (*slice, plane)
        })
        .collect();

    let sources = scheduler.map(jobs, |(slice, plane)| match plane {
        Some((p, xs, ys)) => (
            slice,
            Source::Plane(p.pixel_type.convert_buffer(&p.data, slice.pixel_type), p.width, xs, ys),
        ),
        None => (slice, Source::Fill(slice.pixel_type.fill_buffer(slice.fill, 1))),
    });

    for (slice, source) in &sources {
        let bps = slice.pixel_type.bytes_per_sample();
        for y in (0..height).step_by(slice.y_sampling as usize) {
            for x in (0..width).step_by(slice.x_sampling as usize) {
                let dst = slice.index(x, y);
                let sample = match source {
                    Source::Plane(data, plane_width, xs, ys) => {
                        let at = ((y / ys) * plane_width + x / xs) * bps;
                        &data[at..at + bps]
                    }
                    Source::Fill(one) => &one[..],
                };
                memory[dst..dst + bps].copy_from_slice(sample);
            }
        }
    }
    Ok(())
}

/// 从 AudioBuffer 提取头部声明的全部声道, 未绑定的声道为静音
pub fn extract_audio(header: &Header, ab: &AudioBuffer<'_>) -> Vec<AudioPlane> {
    let samples = ab.samples();
    let bytes = ab.bytes();
    header
        .audio_channels()
        .iter()
        .map(|(name, channel)| match ab.find(name) {
            Some(slice) => {
                let out_bps = channel.sample_type.bytes_per_sample();
                let in_bps = slice.sample_type.bytes_per_sample();
                let mut data = vec![0u8; samples * out_bps];
                for (i, out) in data.chunks_exact_mut(out_bps).enumerate() {
                    let src = slice.index(i);
                    slice
                        .sample_type
                        .convert_sample(&bytes[src..src + in_bps], channel.sample_type, out);
                }
                AudioPlane {
                    sample_type: channel.sample_type,
                    data,
                }
            }
            None => AudioPlane::silence(channel.sample_type, samples),
        })
        .collect()
}

/// 将解码后的声道写入 AudioBuffer
///
/// 写入前 `samples` 个采样. `planes` 按头部声道顺序排列, 每个声道至少包含
/// `samples` 个采样.
pub fn scatter_audio(
    header: &Header,
    planes: &[AudioPlane],
    samples: usize,
    ab: &mut AudioBuffer<'_>,
) -> MoxResult<()> {
    if samples > ab.samples() {
        return Err(MoxError::Logic(format!(
            "请求 {samples} 个采样, AudioBuffer 只有 {} 个",
            ab.samples()
        )));
    }
    let (slices, memory) = ab.parts_mut();
    let memory = memory.ok_or_else(|| MoxError::Logic("读取音频需要可写的 AudioBuffer".into()))?;
    for (name, slice) in slices {
        let bps = slice.sample_type.bytes_per_sample();
        match header.audio_channels().index_of(name).and_then(|i| planes.get(i)) {
            Some(plane) => {
                let in_bps = plane.sample_type.bytes_per_sample();
                for i in 0..samples {
                    let dst = slice.index(i);
                    plane.sample_type.convert_sample(
                        &plane.data[i * in_bps..(i + 1) * in_bps],
                        slice.sample_type,
                        &mut memory[dst..dst + bps],
                    );
                }
            }
            None => {
                let silence = slice.sample_type.silence();
                for i in 0..samples {
                    let dst = slice.index(i);
                    memory[dst..dst + bps].copy_from_slice(&silence);
                }
            }
        }
    }
    Ok(())
}

/// 音频平面的采样类型列表
pub(crate) fn audio_types(header: &Header) -> Vec<SampleType> {
    header.audio_channels().iter().map(|(_, c)| c.sample_type).collect()
}
