//! # MOX
//!
//! 纯 Rust 实现的 MOX 影片容器核心.
//!
//! MOX 文件在一个可定位字节流中交错保存视频帧与音频块, 由自描述的头部
//! (尺寸、帧率、通道布局、压缩方式) 说明其内容. 调用方通过 Slice 把任意
//! 步长、任意像素类型的内存绑定到命名通道上, 容器不关心宿主的内存布局.
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use mox::format::{FileStream, InputFile};
//!
//! # fn main() -> mox::core::MoxResult<()> {
//! let input = InputFile::new(Box::new(FileStream::open("clip.mox")?))?;
//! let header = input.header();
//! println!(
//!     "{}x{} @ {} fps, {} 帧",
//!     header.width(),
//!     header.height(),
//!     header.frame_rate().to_f64(),
//!     header.duration()
//! );
//! # Ok(())
//! # }
//! ```
//!
//! # Crate 结构
//!
//! | Crate | 功能 |
//! |-------|------|
//! | `mox-core` | 有理数, 采样类型, 声道布局, 错误类型 |
//! | `mox-codec` | 视频编解码器, 编码策略, PCM, 线程池 |
//! | `mox-format` | 头部模型, Slice 绑定, 流式读写 |

/// 核心类型与工具
pub use mox_core as core;

/// 编解码器与线程池
pub use mox_codec as codec;

/// 容器格式与读写
pub use mox_format as format;

pub mod config;
pub mod logging;

/// 获取 MOX 版本号
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
