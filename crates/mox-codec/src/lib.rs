//! # mox-codec
//!
//! MOX 容器的编解码器库: 视频压缩类型、编解码器 trait、编码策略、
//! PCM 音频打包以及进程级线程池.
//!
//! ## 支持的视频编解码器
//!
//! - **无压缩**: 任意通道组合, 位精确
//! - **PNG / DPX / OpenEXR**: 无损
//! - **JPEG**: 有损, alpha 通道以无损旁路平面保存
//! - **JPEG 2000 / Dirac**: 可识别, 未实现
//!
//! ## 使用示例
//!
//! ```rust
//! use mox_codec::{CodecRegistry, VideoCompression};
//!
//! let mut reg = CodecRegistry::new();
//! mox_codec::register_all(&mut reg);
//!
//! let codec = reg.create(VideoCompression::Png).unwrap();
//! assert_eq!(codec.name(), "png");
//! assert!(reg.create(VideoCompression::Dirac).is_err());
//! ```

pub mod codec;
pub mod codecs;
pub mod compression;
pub mod pcm;
pub mod plane;
pub mod policy;
pub mod registry;
pub mod scheduler;

// 重导出常用类型
pub use codec::{CodecParameters, PlaneDesc, VideoCodec};
pub use compression::{AudioCompression, VideoCompression};
pub use pcm::{AudioPlane, PcmCodec};
pub use plane::Plane;
pub use policy::{CodecPolicy, DEFAULT_QUALITY, deepest_pixel_type, effective_quality, pick_codec};
pub use registry::CodecRegistry;
pub use scheduler::{
    JobHandle, Scheduler, global_scheduler, global_thread_count, set_global_thread_count,
    supports_threads,
};

/// 注册所有内置视频编解码器
pub fn register_all(registry: &mut CodecRegistry) {
    codecs::register_all_codecs(registry);
}
