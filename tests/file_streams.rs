//! 集成测试: 宿主流适配与错误路径.
//!
//! 写入路径只依赖 write/flush, 读取路径的各类损坏输入返回解析错误,
//! 前置条件违例返回逻辑错误.

use std::io;
use std::sync::{Arc, Mutex};

use mox::codec::{Scheduler, VideoCompression};
use mox::core::{ErrorKind, PixelType, Rational, SampleType};
use mox::format::{
    AudioBuffer, AudioChannel, AudioSlice, Channel, FileStream, FrameBuffer, Header, InputFile,
    IoStream, MemoryStream, OutputFile, Slice,
};

/// 只能写入的流: 读取、定位与查询位置均失败
#[derive(Clone, Default)]
struct SinkStream {
    data: Arc<Mutex<Vec<u8>>>,
}

impl IoStream for SinkStream {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::other("写入期间不可读取"))
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.data
            .lock()
            .map_err(|_| io::Error::other("锁已中毒"))?
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn seek(&mut self, _offset: u64) -> io::Result<u64> {
        Err(io::Error::other("写入期间不可定位"))
    }

    fn tell(&mut self) -> io::Result<u64> {
        Err(io::Error::other("写入期间不可查询位置"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// 写入若干字节后报告磁盘已满的流
struct FullDiskStream {
    budget: usize,
}

impl IoStream for FullDiskStream {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Ok(0)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.budget == 0 {
            return Err(io::Error::new(io::ErrorKind::StorageFull, "磁盘已满"));
        }
        let n = buf.len().min(self.budget);
        self.budget -= n;
        Ok(n)
    }

    fn seek(&mut self, offset: u64) -> io::Result<u64> {
        Ok(offset)
    }

    fn tell(&mut self) -> io::Result<u64> {
        Ok(0)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn inline() -> Arc<Scheduler> {
    Arc::new(Scheduler::inline())
}

fn gray_header(compression: VideoCompression) -> Header {
    let mut header = Header::new(
        8,
        4,
        Rational::new(30000, 1001),
        Rational::new(44100, 1),
        compression,
    );
    header
        .channels_mut()
        .insert("Y", Channel::new(PixelType::Uint8))
        .unwrap();
    header
        .audio_channels_mut()
        .insert("Mono", AudioChannel::new(SampleType::Signed16))
        .unwrap();
    header
}

fn gray_frame(value: u8) -> Vec<u8> {
    (0..32).map(|i| value.wrapping_add(i)).collect()
}

fn push_gray(out: &mut OutputFile, pixels: &[u8]) {
    let mut fb = FrameBuffer::from_slice(8, 4, pixels);
    fb.insert("Y", Slice::new(PixelType::Uint8, 0, 1, 8)).unwrap();
    out.push_frame(&fb).unwrap();
}

/// 写出一个完整的两帧文件, 返回其字节
fn finished_file(compression: VideoCompression) -> Vec<u8> {
    let stream = MemoryStream::new();
    let mut out =
        OutputFile::with_scheduler(Box::new(stream.clone()), gray_header(compression), inline())
            .unwrap();
    push_gray(&mut out, &gray_frame(0));
    push_gray(&mut out, &gray_frame(100));
    out.finalize().unwrap();
    stream.snapshot()
}

fn open_error(bytes: Vec<u8>) -> Option<ErrorKind> {
    InputFile::with_scheduler(Box::new(MemoryStream::from_data(bytes)), inline())
        .err()
        .map(|e| e.kind())
}

fn read_gray(input: &mut InputFile, index: u64) -> Vec<u8> {
    let mut mem = vec![0u8; 32];
    let mut fb = FrameBuffer::from_slice_mut(8, 4, &mut mem);
    fb.insert("Y", Slice::new(PixelType::Uint8, 0, 1, 8)).unwrap();
    input.get_frame(index, &mut fb).unwrap();
    drop(fb);
    mem
}

#[test]
fn test_write_only_stream() {
    let sink = SinkStream::default();
    let mut out = OutputFile::with_scheduler(
        Box::new(sink.clone()),
        gray_header(VideoCompression::Png),
        inline(),
    )
    .unwrap();
    push_gray(&mut out, &gray_frame(3));
    let audio = vec![0u8; 64];
    let mut ab = AudioBuffer::from_slice(32, &audio);
    ab.insert("Mono", AudioSlice::new(SampleType::Signed16, 0, 2))
        .unwrap();
    out.push_audio(&ab).unwrap();
    push_gray(&mut out, &gray_frame(9));
    out.finalize().unwrap();

    let bytes = sink.data.lock().unwrap().clone();
    let mut input =
        InputFile::with_scheduler(Box::new(MemoryStream::from_data(bytes)), inline()).unwrap();
    assert_eq!(input.duration(), 2);
    assert_eq!(input.header().audio_duration(), 32);
    assert_eq!(
        input.header().frame_rate(),
        Rational::new(30000, 1001)
    );
    assert_eq!(read_gray(&mut input, 1), gray_frame(9));
    assert_eq!(read_gray(&mut input, 0), gray_frame(3));
}

#[test]
fn test_file_stream_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clip.mox");

    let mut out = OutputFile::with_scheduler(
        Box::new(FileStream::create(&path).unwrap()),
        gray_header(VideoCompression::Uncompressed),
        inline(),
    )
    .unwrap();
    for value in [1u8, 2, 3, 4] {
        push_gray(&mut out, &gray_frame(value));
    }
    out.finalize().unwrap();
    drop(out);

    let mut input =
        InputFile::with_scheduler(Box::new(FileStream::open(&path).unwrap()), inline()).unwrap();
    assert_eq!(input.duration(), 4);
    assert_eq!(read_gray(&mut input, 3), gray_frame(4));
    assert_eq!(read_gray(&mut input, 0), gray_frame(1));
}

#[test]
fn test_open_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = FileStream::open(dir.path().join("missing.mox"))
        .err()
        .map(|e| e.kind());
    assert_eq!(err, Some(ErrorKind::Io));
}

#[test]
fn test_corrupt_inputs_are_parse_errors() {
    let bytes = finished_file(VideoCompression::Png);

    assert_eq!(open_error(Vec::new()), Some(ErrorKind::Parse));
    assert_eq!(open_error(b"not a movie file at all".to_vec()), Some(ErrorKind::Parse));

    // 截断尾部
    let truncated = bytes[..bytes.len() - 5].to_vec();
    assert_eq!(open_error(truncated), Some(ErrorKind::Parse));

    // 截断到只剩签名与 HEAD
    let head_only = bytes[..60].to_vec();
    assert_eq!(open_error(head_only), Some(ErrorKind::Parse));

    // 签名损坏
    let mut bad_magic = bytes.clone();
    bad_magic[1] = b'X';
    assert_eq!(open_error(bad_magic), Some(ErrorKind::Parse));

    // MIDX 偏移指向文件外
    let mut bad_offset = bytes.clone();
    let at = bad_offset.len() - 8;
    bad_offset[at..].copy_from_slice(&u64::MAX.to_be_bytes());
    assert_eq!(open_error(bad_offset), Some(ErrorKind::Parse));
}

#[test]
fn test_unfinalized_file_cannot_be_opened() {
    let stream = MemoryStream::new();
    let mut out = OutputFile::with_scheduler(
        Box::new(stream.clone()),
        gray_header(VideoCompression::Uncompressed),
        inline(),
    )
    .unwrap();
    push_gray(&mut out, &gray_frame(0));
    drop(out);
    assert_eq!(open_error(stream.snapshot()), Some(ErrorKind::Parse));
}

#[test]
fn test_unimplemented_codec_on_read() {
    let mut bytes = finished_file(VideoCompression::Uncompressed);
    // HEAD 负载中的视频压缩标签位于文件偏移 54
    assert_eq!(bytes[54], VideoCompression::Uncompressed.tag());
    bytes[54] = VideoCompression::Jpeg2000.tag();
    assert_eq!(open_error(bytes), Some(ErrorKind::NotImplemented));
}

#[test]
fn test_unimplemented_codec_on_write() {
    for compression in [VideoCompression::Jpeg2000, VideoCompression::Dirac] {
        let err = OutputFile::with_scheduler(
            Box::new(MemoryStream::new()),
            gray_header(compression),
            inline(),
        )
        .err()
        .map(|e| e.kind());
        assert_eq!(err, Some(ErrorKind::NotImplemented), "{compression}");
    }
}

#[test]
fn test_precondition_violations() {
    let bytes = finished_file(VideoCompression::Uncompressed);
    let mut input =
        InputFile::with_scheduler(Box::new(MemoryStream::from_data(bytes)), inline()).unwrap();

    // 帧号越界
    let mut mem = vec![0u8; 32];
    let mut fb = FrameBuffer::from_slice_mut(8, 4, &mut mem);
    assert_eq!(
        input.get_frame(2, &mut fb).unwrap_err().kind(),
        ErrorKind::Logic
    );

    // 尺寸不匹配
    let mut small = vec![0u8; 16];
    let mut fb = FrameBuffer::from_slice_mut(4, 4, &mut small);
    assert_eq!(
        input.get_frame(0, &mut fb).unwrap_err().kind(),
        ErrorKind::Logic
    );

    // 只读 FrameBuffer
    let shared = vec![0u8; 32];
    let mut fb = FrameBuffer::from_slice(8, 4, &shared);
    assert_eq!(
        input.get_frame(0, &mut fb).unwrap_err().kind(),
        ErrorKind::Logic
    );

    // 文件没有音频采样时任何非零读取都越界
    let mut audio = vec![0u8; 4];
    let mut ab = AudioBuffer::from_slice_mut(2, &mut audio);
    assert_eq!(
        input.read_audio(1, &mut ab).unwrap_err().kind(),
        ErrorKind::Logic
    );
    input.read_audio(0, &mut ab).unwrap();
}

#[test]
fn test_writer_preconditions() {
    let mut out = OutputFile::with_scheduler(
        Box::new(MemoryStream::new()),
        gray_header(VideoCompression::Uncompressed),
        inline(),
    )
    .unwrap();

    let wrong = vec![0u8; 16];
    let fb = FrameBuffer::from_slice(4, 4, &wrong);
    assert_eq!(out.push_frame(&fb).unwrap_err().kind(), ErrorKind::Logic);

    // 绑定超出内存范围的 Slice 在插入时即被拒绝
    let pixels = gray_frame(0);
    let mut fb = FrameBuffer::from_slice(8, 4, &pixels);
    let err = fb
        .insert("Y", Slice::new(PixelType::Uint16, 0, 2, 16))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Argument);

    // 纯视频头部不能写入音频
    let mut video_only = Header::new(
        8,
        4,
        Rational::new(24, 1),
        Rational::new(48000, 1),
        VideoCompression::Uncompressed,
    );
    video_only
        .channels_mut()
        .insert("Y", Channel::new(PixelType::Uint8))
        .unwrap();
    let mut out =
        OutputFile::with_scheduler(Box::new(MemoryStream::new()), video_only, inline()).unwrap();
    let audio = vec![0u8; 8];
    let ab = AudioBuffer::from_slice(4, &audio);
    assert_eq!(out.push_audio(&ab).unwrap_err().kind(), ErrorKind::Logic);
    out.finalize().unwrap();
}

#[test]
fn test_uint32_channel_rejected() {
    let mut header = gray_header(VideoCompression::Uncompressed);
    header
        .channels_mut()
        .insert("ID", Channel::new(PixelType::Uint32))
        .unwrap();
    let err = OutputFile::with_scheduler(Box::new(MemoryStream::new()), header, inline())
        .err()
        .map(|e| e.kind());
    assert_eq!(err, Some(ErrorKind::Logic));
}

#[test]
fn test_full_disk_is_io_error() {
    // 足够写入签名与 HEAD, 但容纳不下第一帧
    let mut out = OutputFile::with_scheduler(
        Box::new(FullDiskStream { budget: 200 }),
        gray_header(VideoCompression::Uncompressed),
        inline(),
    )
    .unwrap();
    let pixels: Vec<u8> = vec![0u8; 32];
    let mut err = None;
    for _ in 0..16 {
        let mut fb = FrameBuffer::from_slice(8, 4, &pixels);
        fb.insert("Y", Slice::new(PixelType::Uint8, 0, 1, 8)).unwrap();
        if let Err(e) = out.push_frame(&fb) {
            err = Some(e);
            break;
        }
    }
    assert_eq!(err.map(|e| e.kind()), Some(ErrorKind::Io));
}
