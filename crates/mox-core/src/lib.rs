//! # mox-core
//!
//! MOX 影片容器核心库, 提供基础类型定义、错误处理和采样转换工具.
//!
//! 本 crate 是整个 MOX 框架的底层基础设施: 有理数、像素/音频采样类型、
//! 标准声道布局以及统一错误类型.

pub mod audio_layout;
pub mod error;
pub mod half;
pub mod pixel_type;
pub mod rational;
pub mod sample_type;

// 重导出常用类型
pub use audio_layout::{AudioLayout, SpeakerMask};
pub use error::{ErrorKind, MoxError, MoxResult};
pub use pixel_type::PixelType;
pub use rational::Rational;
pub use sample_type::SampleType;
