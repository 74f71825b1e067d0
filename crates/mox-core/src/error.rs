//! 统一错误类型定义.
//!
//! 所有 MOX crate 共用的错误类型, 支持跨模块传播.
//!
//! 错误处理约定: API 误用与前置条件违例 (帧号越界、尺寸不匹配、
//! finalize 之后继续写入等) 一律返回 [`MoxError::Logic`], 库代码不会因调用方输入而 panic.

use thiserror::Error;

/// MOX 统一错误类型
#[derive(Debug, Error)]
pub enum MoxError {
    /// 无效参数 (构造参数非法, 如空通道列表、宽高为 0)
    #[error("无效参数: {0}")]
    InvalidArgument(String),

    /// I/O 错误 (打开/读/写/定位失败, 磁盘已满等)
    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 容器格式错误 (字节流不符合容器结构)
    #[error("格式错误: {0}")]
    Format(String),

    /// 功能未实现 (可识别但不支持的编解码器/特性)
    #[error("功能未实现: {0}")]
    NotImplemented(String),

    /// API 误用或前置条件违例
    #[error("逻辑错误: {0}")]
    Logic(String),

    /// 编解码器错误 (底层编解码库拒绝数据)
    #[error("编解码器错误: {0}")]
    Codec(String),

    /// 已到达流末尾
    #[error("已到达流末尾")]
    Eof,
}

/// 错误类别
///
/// 供上层适配器映射错误, 无需匹配全部变体.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// 参数错误
    Argument,
    /// I/O 错误
    Io,
    /// 解析错误
    Parse,
    /// 未实现
    NotImplemented,
    /// 逻辑错误
    Logic,
}

impl MoxError {
    /// 获取错误类别
    ///
    /// 编解码器错误视为解析错误 (数据无法被解释), 流末尾视为 I/O 错误.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument(_) => ErrorKind::Argument,
            Self::Io(_) | Self::Eof => ErrorKind::Io,
            Self::Format(_) | Self::Codec(_) => ErrorKind::Parse,
            Self::NotImplemented(_) => ErrorKind::NotImplemented,
            Self::Logic(_) => ErrorKind::Logic,
        }
    }
}

/// MOX 统一 Result 类型
pub type MoxResult<T> = Result<T, MoxError>;
