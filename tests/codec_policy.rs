//! 集成测试: 编解码器自动选择、编码策略与头部往返.

use std::sync::Arc;

use mox::codec::{CodecPolicy, Scheduler, VideoCompression, pick_codec};
use mox::config::MoxConfig;
use mox::core::{AudioLayout, ErrorKind, PixelType, Rational, SampleType};
use mox::format::{
    AudioChannel, Channel, FrameBuffer, Header, InputFile, MemoryStream, OutputFile, Slice,
};

fn inline() -> Arc<Scheduler> {
    Arc::new(Scheduler::inline())
}

fn header_with(names: &[&str], pixel_type: PixelType) -> Header {
    let mut h = Header::new(
        16,
        8,
        Rational::new(24000, 1001),
        Rational::new(48000, 1),
        VideoCompression::Auto,
    );
    for name in names {
        h.channels_mut()
            .insert(*name, Channel::new(pixel_type))
            .unwrap();
    }
    h
}

/// 经 OutputFile 解析后的实际压缩类型
fn resolved(header: Header) -> VideoCompression {
    OutputFile::with_scheduler(Box::new(MemoryStream::new()), header, inline())
        .unwrap()
        .header()
        .video_compression()
}

#[test]
fn test_pick_codec_is_deterministic() {
    for pixel_type in PixelType::ALL {
        for lossless in [false, true] {
            for alpha in [false, true] {
                let first = pick_codec(lossless, pixel_type, alpha).map_err(|e| e.kind());
                let second = pick_codec(lossless, pixel_type, alpha).map_err(|e| e.kind());
                assert_eq!(first, second);
            }
        }
    }
    assert_eq!(
        pick_codec(true, PixelType::Uint32, false).unwrap_err().kind(),
        ErrorKind::Logic
    );
}

#[test]
fn test_auto_resolution_by_header() {
    let rgb = ["R", "G", "B"];
    let rgba = ["R", "G", "B", "A"];

    assert_eq!(resolved(header_with(&rgb, PixelType::Uint8)), VideoCompression::Png);

    let mut lossy = header_with(&rgb, PixelType::Uint8);
    lossy.set_quality(70).unwrap();
    assert_eq!(resolved(lossy), VideoCompression::Jpeg);

    let mut lossy_alpha = header_with(&rgba, PixelType::Uint8);
    lossy_alpha.set_quality(70).unwrap();
    assert_eq!(resolved(lossy_alpha), VideoCompression::Png);

    assert_eq!(resolved(header_with(&rgb, PixelType::Uint10)), VideoCompression::Dpx);
    assert_eq!(resolved(header_with(&rgba, PixelType::Uint16A)), VideoCompression::Png);
    assert_eq!(resolved(header_with(&rgba, PixelType::Half)), VideoCompression::OpenExr);

    // 最深通道为 Float, 但 OpenEXR 不接受混合类型
    let mut mixed = header_with(&["R", "G"], PixelType::Uint8);
    mixed
        .channels_mut()
        .insert("Z", Channel::new(PixelType::Float))
        .unwrap();
    assert_eq!(resolved(mixed), VideoCompression::Uncompressed);
}

/// 选中的编解码器无法写入的通道组合退回未压缩, 且可完整往返
#[test]
fn test_auto_falls_back_for_unsupported_channel_sets() {
    let mut mixed = header_with(&["R", "G", "B"], PixelType::Uint8);
    mixed
        .channels_mut()
        .insert("A", Channel::new(PixelType::Float))
        .unwrap();
    let two = header_with(&["Y", "A"], PixelType::Uint8);
    let mut sub = header_with(&["Y"], PixelType::Uint8);
    for name in ["Cb", "Cr"] {
        sub.channels_mut()
            .insert(name, Channel::with_sampling(PixelType::Uint8, 2, 2))
            .unwrap();
    }

    for header in [mixed, two, sub] {
        let channels: Vec<(String, Channel)> = header
            .channels()
            .iter()
            .map(|(name, c)| (name.to_string(), *c))
            .collect();
        // 每个通道一块全尺寸平面, 子采样通道只写采样位置
        let mut joined = Vec::new();
        let mut offsets = Vec::new();
        for (i, (_, c)) in channels.iter().enumerate() {
            let bps = c.pixel_type.bytes_per_sample();
            offsets.push(joined.len());
            let mut plane = vec![0u8; 16 * 8 * bps];
            for (j, sample) in plane.chunks_exact_mut(bps).enumerate() {
                let (x, y) = (j % 16, j / 16);
                if x % c.x_sampling as usize == 0 && y % c.y_sampling as usize == 0 {
                    let v = ((j * 13 + i * 29) % 251) as f64 / 250.0;
                    c.pixel_type.write_normalized(v, sample);
                }
            }
            joined.extend_from_slice(&plane);
        }
        let bind = |fb: &mut FrameBuffer<'_>| {
            for ((name, c), &offset) in channels.iter().zip(&offsets) {
                let bps = c.pixel_type.bytes_per_sample() as isize;
                fb.insert(
                    name.as_str(),
                    Slice::new(c.pixel_type, offset, bps, 16 * bps)
                        .with_sampling(c.x_sampling, c.y_sampling),
                )
                .unwrap();
            }
        };

        let stream = MemoryStream::new();
        let mut out =
            OutputFile::with_scheduler(Box::new(stream.clone()), header, inline()).unwrap();
        assert_eq!(out.header().video_compression(), VideoCompression::Uncompressed);
        let mut fb = FrameBuffer::from_slice(16, 8, &joined);
        bind(&mut fb);
        out.push_frame(&fb).unwrap();
        out.finalize().unwrap();

        let mut input = InputFile::with_scheduler(Box::new(stream.reopen()), inline()).unwrap();
        assert_eq!(input.header().video_compression(), VideoCompression::Uncompressed);
        let mut decoded = vec![0u8; joined.len()];
        let mut fb = FrameBuffer::from_slice_mut(16, 8, &mut decoded);
        bind(&mut fb);
        input.get_frame(0, &mut fb).unwrap();
        drop(fb);
        assert_eq!(decoded, joined);
    }
}

#[test]
fn test_lossless_policy_on_lossy_codec() {
    let mut h = header_with(&["R", "G", "B"], PixelType::Uint8);
    h.set_video_compression(VideoCompression::Jpeg);
    assert_eq!(h.compression_policy(), CodecPolicy::Lossless);

    let stream = MemoryStream::new();
    let mut out = OutputFile::with_scheduler(Box::new(stream.clone()), h, inline()).unwrap();
    let pixels = vec![90u8; 16 * 8 * 3];
    let mut fb = FrameBuffer::from_slice(16, 8, &pixels);
    for (i, name) in ["R", "G", "B"].iter().enumerate() {
        fb.insert(*name, Slice::interleaved(PixelType::Uint8, i, 3, 16))
            .unwrap();
    }
    out.push_frame(&fb).unwrap();
    out.finalize().unwrap();

    let mut input = InputFile::with_scheduler(Box::new(stream.reopen()), inline()).unwrap();
    assert_eq!(input.header().video_compression(), VideoCompression::Jpeg);
    assert_eq!(input.header().compression_policy(), CodecPolicy::Lossless);
    let mut decoded = vec![0u8; pixels.len()];
    let mut fb = FrameBuffer::from_slice_mut(16, 8, &mut decoded);
    for (i, name) in ["R", "G", "B"].iter().enumerate() {
        fb.insert(*name, Slice::interleaved(PixelType::Uint8, i, 3, 16))
            .unwrap();
    }
    input.get_frame(0, &mut fb).unwrap();
    drop(fb);
    // 平坦图像在最高质量下几乎无损
    assert!(decoded.iter().all(|&v| v.abs_diff(90) <= 2));
}

#[test]
fn test_quality_policy_replaces_lossless() {
    let mut h = header_with(&["Y"], PixelType::Uint8);
    h.set_quality(40).unwrap();
    assert_eq!(h.compression_policy(), CodecPolicy::Quality(40));
    h.set_lossless();
    assert_eq!(h.compression_policy(), CodecPolicy::Lossless);
    assert_eq!(h.set_quality(0).unwrap_err().kind(), ErrorKind::Argument);
    assert_eq!(h.set_quality(101).unwrap_err().kind(), ErrorKind::Argument);
}

#[test]
fn test_derived_properties() {
    let mut h = header_with(&["R", "G", "B"], PixelType::Uint10);
    h.channels_mut()
        .insert("A", Channel::new(PixelType::Uint12))
        .unwrap();
    h.audio_channels_mut()
        .insert_layout(AudioLayout::Surround51, SampleType::Signed24)
        .unwrap();
    assert!(h.has_alpha());
    assert_eq!(h.video_bit_depth(), 12);
    assert_eq!(h.audio_bit_depth(), 24);
    assert_eq!(h.audio_channels().layout(), Some(AudioLayout::Surround51));
    assert!(h.estimated_video_kbps() > 0.0);
    // 6 声道 x 24 位 x 48000 Hz
    assert!((h.estimated_audio_kbps() - 6.0 * 24.0 * 48000.0 / 1024.0).abs() < 1e-6);

    let small = header_with(&["Y"], PixelType::Uint8);
    assert!(!small.has_alpha());
    assert_eq!(small.video_bit_depth(), 8);
    assert_eq!(small.audio_bit_depth(), 0);
}

#[test]
fn test_reopened_header_matches() {
    let mut h = header_with(&["B", "G", "R"], PixelType::Uint16);
    h.set_pixel_aspect_ratio(Rational::new(4, 3));
    h.set_quality(55).unwrap();
    h.set_video_compression(VideoCompression::Dpx);
    h.audio_channels_mut()
        .insert("Left", AudioChannel::new(SampleType::Signed32))
        .unwrap();
    h.audio_channels_mut()
        .insert("Right", AudioChannel::new(SampleType::Signed32))
        .unwrap();

    let stream = MemoryStream::new();
    let mut out = OutputFile::with_scheduler(Box::new(stream.clone()), h.clone(), inline()).unwrap();
    out.finalize().unwrap();

    let input = InputFile::with_scheduler(Box::new(stream.reopen()), inline()).unwrap();
    let got = input.header();
    assert_eq!(got.width(), 16);
    assert_eq!(got.height(), 8);
    assert_eq!(got.frame_rate(), Rational::new(24000, 1001));
    assert_eq!(got.sample_rate(), Rational::new(48000, 1));
    assert_eq!(got.pixel_aspect_ratio(), Rational::new(4, 3));
    assert_eq!(got.video_compression(), VideoCompression::Dpx);
    assert_eq!(got.compression_policy(), CodecPolicy::Quality(55));
    assert_eq!(got.channels().names(), vec!["B", "G", "R"]);
    assert_eq!(got.audio_channels().names(), vec!["Left", "Right"]);
    assert_eq!(got.audio_channels().layout(), Some(AudioLayout::Stereo));
    assert_eq!(got.duration(), 0);
    assert_eq!(got.audio_duration(), 0);
}

#[test]
fn test_config_video_defaults() {
    let config = MoxConfig::from_json_str(
        r#"{"video": {"compression": "JPEG", "lossless": false, "quality": 65}}"#,
    )
    .unwrap();
    let mut h = header_with(&["R", "G", "B"], PixelType::Uint8);
    config.video.apply_to(&mut h).unwrap();
    assert_eq!(h.video_compression(), VideoCompression::Jpeg);
    assert_eq!(h.compression_policy(), CodecPolicy::Quality(65));
    assert_eq!(resolved(h), VideoCompression::Jpeg);

    assert!(MoxConfig::from_json_str(r#"{"video": {"compression": "h264"}}"#).is_err());
}
