//! 编解码器注册表.
//!
//! 按压缩类型查找并实例化视频编解码器. 可识别但未注册的压缩类型
//! (JPEG 2000, Dirac) 在查找时返回 [`MoxError::NotImplemented`].

use std::collections::HashMap;
use std::sync::Arc;

use mox_core::{MoxError, MoxResult};

use crate::codec::VideoCodec;
use crate::compression::VideoCompression;

/// 编解码器工厂函数类型
pub type CodecFactory = fn() -> MoxResult<Arc<dyn VideoCodec>>;

/// 编解码器注册条目
struct CodecEntry {
    /// 编解码器名称
    name: String,
    /// 工厂函数
    factory: CodecFactory,
}

/// 编解码器注册表
pub struct CodecRegistry {
    codecs: HashMap<VideoCompression, Vec<CodecEntry>>,
}

impl CodecRegistry {
    /// 创建空的注册表
    pub fn new() -> Self {
        Self {
            codecs: HashMap::new(),
        }
    }

    /// 创建已注册全部内置编解码器的注册表
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        crate::register_all(&mut registry);
        registry
    }

    /// 注册一个编解码器
    pub fn register(
        &mut self,
        compression: VideoCompression,
        name: impl Into<String>,
        factory: CodecFactory,
    ) {
        self.codecs
            .entry(compression)
            .or_default()
            .push(CodecEntry {
                name: name.into(),
                factory,
            });
    }

    /// 创建指定压缩类型的编解码器实例
    ///
    /// `Auto` 必须先经 [`crate::pick_codec`] 解析, 直接传入属于调用错误.
    pub fn create(&self, compression: VideoCompression) -> MoxResult<Arc<dyn VideoCodec>> {
        if compression == VideoCompression::Auto {
            return Err(MoxError::Logic(
                "自动选择的压缩类型必须先解析为具体编解码器".into(),
            ));
        }
        let entries = self.codecs.get(&compression).ok_or_else(|| {
            MoxError::NotImplemented(format!("{compression} 编解码器"))
        })?;
        // 使用第一个注册的编解码器 (优先级最高)
        match entries.first() {
            Some(entry) => (entry.factory)(),
            None => Err(MoxError::NotImplemented(format!("{compression} 编解码器"))),
        }
    }

    /// 获取所有已注册的编解码器名称
    pub fn list(&self) -> Vec<(VideoCompression, &str)> {
        let mut result = Vec::new();
        for (compression, entries) in &self.codecs {
            for entry in entries {
                result.push((*compression, entry.name.as_str()));
            }
        }
        result
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::new()
    }
}
