//! # mox-format
//!
//! MOX 容器格式库: 头部与通道模型、Slice 绑定、可定位流抽象以及
//! 容器的流式读写 ([`OutputFile`] / [`InputFile`]).
//!
//! # 写入示例
//!
//! ```no_run
//! use mox_codec::VideoCompression;
//! use mox_core::{PixelType, Rational};
//! use mox_format::{Channel, FileStream, FrameBuffer, Header, OutputFile, Slice};
//!
//! # fn main() -> mox_core::MoxResult<()> {
//! let mut header = Header::new(
//!     64,
//!     64,
//!     Rational::new(24, 1),
//!     Rational::new(48000, 1),
//!     VideoCompression::Auto,
//! );
//! for name in ["R", "G", "B"] {
//!     header.channels_mut().insert(name, Channel::new(PixelType::Uint8))?;
//! }
//! let mut out = OutputFile::new(Box::new(FileStream::create("clip.mox")?), header)?;
//!
//! let pixels = vec![0u8; 64 * 64 * 3];
//! let mut fb = FrameBuffer::from_slice(64, 64, &pixels);
//! for (i, name) in ["R", "G", "B"].iter().enumerate() {
//!     fb.insert(*name, Slice::interleaved(PixelType::Uint8, i, 3, 64))?;
//! }
//! out.push_frame(&fb)?;
//! out.finalize()?;
//! # Ok(())
//! # }
//! ```

pub mod audio_buffer;
pub mod binding;
pub mod container;
pub mod frame_buffer;
pub mod header;
pub mod input_file;
pub mod io;
pub mod output_file;

pub use audio_buffer::{AudioBuffer, AudioSlice};
pub use frame_buffer::{FrameBuffer, Memory, Slice};
pub use header::{AudioChannel, AudioChannelList, Channel, ChannelList, Header, MAX_CHANNELS};
pub use input_file::InputFile;
pub use io::{FileStream, IoContext, IoStream, MemoryStream};
pub use output_file::OutputFile;
