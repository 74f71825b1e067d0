//! 应用配置.
//!
//! JSON 格式, 所有字段均可省略:
//!
//! ```json
//! {
//!     "logging": { "level": "info", "directory": "logs", "file_prefix": "mox" },
//!     "threads": { "count": 4 },
//!     "video": { "compression": "auto", "lossless": true, "quality": 80 }
//! }
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use mox_codec::{DEFAULT_QUALITY, VideoCompression, set_global_thread_count};
use mox_format::Header;
use serde::{Deserialize, Serialize};

use crate::logging::LoggingConfig;

/// 顶层配置
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct MoxConfig {
    /// 日志配置, 缺省时不初始化日志
    pub logging: Option<LoggingConfig>,
    /// 工作线程配置
    pub threads: ThreadConfig,
    /// 写入时的视频默认值
    pub video: VideoDefaults,
}

/// 工作线程配置
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ThreadConfig {
    /// 线程数, `None` 表示使用可用并行度, 0 表示关闭线程池
    pub count: Option<usize>,
}

impl ThreadConfig {
    /// 实际线程数
    pub fn resolved_count(&self) -> usize {
        self.count.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }
}

/// 视频写入默认值
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct VideoDefaults {
    /// 压缩类型名称 ("auto", "png", "jpeg", ...)
    pub compression: String,
    /// 无损策略
    pub lossless: bool,
    /// 有损质量 1..=100, 仅在 `lossless` 为 false 时生效
    pub quality: u8,
}

impl Default for VideoDefaults {
    fn default() -> Self {
        Self {
            compression: VideoCompression::Auto.name().to_string(),
            lossless: true,
            quality: DEFAULT_QUALITY,
        }
    }
}

impl VideoDefaults {
    /// 解析压缩类型
    pub fn video_compression(&self) -> Result<VideoCompression> {
        VideoCompression::from_name(&self.compression)
            .with_context(|| format!("配置中的视频压缩类型无效: {}", self.compression))
    }

    /// 将压缩类型与编码策略写入待输出的头部
    pub fn apply_to(&self, header: &mut Header) -> Result<()> {
        header.set_video_compression(self.video_compression()?);
        if self.lossless {
            header.set_lossless();
        } else {
            header
                .set_quality(self.quality)
                .with_context(|| format!("配置中的质量值无效: {}", self.quality))?;
        }
        Ok(())
    }
}

impl MoxConfig {
    /// 从 JSON 字符串解析
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text).context("解析配置失败")?;
        config.video.video_compression()?;
        Ok(config)
    }

    /// 从 JSON 文件加载
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("读取配置文件失败, path={}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("配置文件无效, path={}", path.display()))
    }

    /// 应用进程级设置: 初始化日志 (若配置) 并设置工作线程数
    pub fn apply(&self) -> Result<()> {
        if let Some(logging) = &self.logging {
            crate::logging::init(logging.clone())?;
        }
        self.apply_threads()
    }

    /// 仅设置工作线程数
    pub fn apply_threads(&self) -> Result<()> {
        let threads = self.threads.resolved_count();
        set_global_thread_count(threads).context("设置工作线程数失败")?;
        log::debug!("工作线程数: {threads}");
        Ok(())
    }
}
