//! 日志初始化.
//!
//! 安装 tracing 订阅器: 控制台层 (彩色) 与文件层 (按日期命名, 非阻塞写入).
//! 库 crate 通过 `log` 门面输出的记录由订阅器桥接到 tracing.

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::Level;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::{self, FmtContext, FormatEvent, FormatFields, format::Writer},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
};

mod maintenance;

/// 日志配置
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 文件日志级别 (EnvFilter 语法, 如 "info" 或 "mox_format=debug")
    pub level: String,
    /// 日志目录
    pub directory: String,
    /// 文件名前缀, 文件名为 `<prefix>.<YYYY-MM-DD>.log`
    pub file_prefix: String,
    /// 保留天数
    pub retention_days: i64,
    /// 是否压缩历史日志
    pub compress_history: bool,
    /// 清理间隔 (秒)
    pub cleanup_interval_seconds: u64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: "logs".to_string(),
            file_prefix: "mox".to_string(),
            retention_days: 30,
            compress_history: true,
            cleanup_interval_seconds: 3600,
        }
    }
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// 初始化日志系统
///
/// 全局订阅器只能安装一次, 重复调用返回错误.
/// 控制台级别取自 `RUST_LOG`, 未设置时为 debug.
pub fn init(config: LoggingConfig) -> Result<()> {
    std::fs::create_dir_all(&config.directory)
        .with_context(|| format!("创建日志目录失败, path={}", config.directory))?;

    let (writer, guard) = file_writer(&config)?;
    let layers = vec![console_layer(), file_layer(&config, writer)?];
    Registry::default()
        .with(layers)
        .try_init()
        .context("安装全局日志订阅器失败")?;
    // 订阅器安装成功后才保存, 失败时 guard 随即释放并结束写线程
    FILE_GUARD.set(guard).ok();

    maintenance::spawn_log_maintenance(config)
}

fn file_writer(config: &LoggingConfig) -> Result<(NonBlocking, WorkerGuard)> {
    let daily = DailyFile::open(Path::new(&config.directory), &config.file_prefix)?;
    Ok(tracing_appender::non_blocking(daily))
}

fn console_layer() -> BoxedLayer {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    fmt::Layer::default()
        .with_writer(io::stdout)
        .with_ansi(true)
        .event_format(LineFormatter { ansi: true })
        .with_filter(filter)
        .boxed()
}

fn file_layer(config: &LoggingConfig, writer: NonBlocking) -> Result<BoxedLayer> {
    let filter = EnvFilter::try_new(&config.level)
        .with_context(|| format!("日志级别无效: {}", config.level))?;
    Ok(fmt::Layer::default()
        .with_writer(writer)
        .with_ansi(false)
        .event_format(LineFormatter { ansi: false })
        .with_filter(filter)
        .boxed())
}

/// 按本地日期命名的日志文件, 日期变化后的第一次写入切换到新文件
struct DailyFile {
    directory: PathBuf,
    prefix: String,
    date: NaiveDate,
    file: File,
}

impl DailyFile {
    fn open(directory: &Path, prefix: &str) -> Result<Self> {
        let date = Local::now().date_naive();
        let file = open_append(&log_path(directory, prefix, date))?;
        Ok(Self {
            directory: directory.to_path_buf(),
            prefix: prefix.to_string(),
            date,
            file,
        })
    }

    fn roll_if_needed(&mut self) -> io::Result<()> {
        let today = Local::now().date_naive();
        if today != self.date {
            let path = log_path(&self.directory, &self.prefix, today);
            self.file = open_append(&path).map_err(io::Error::other)?;
            self.date = today;
        }
        Ok(())
    }
}

impl Write for DailyFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.roll_if_needed()?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

fn open_append(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("打开日志文件失败, path={}", path.display()))
}

/// 指定日期的日志文件路径
pub(crate) fn log_path(directory: &Path, prefix: &str, date: NaiveDate) -> PathBuf {
    directory.join(format!("{prefix}.{}.log", date.format("%Y-%m-%d")))
}

/// 单行格式: `[MM-DD HH:MM:SS.mmm] LEVEL target > fields`
struct LineFormatter {
    ansi: bool,
}

fn level_color(level: Level) -> &'static str {
    match level {
        Level::ERROR => "\x1b[31m",
        Level::WARN => "\x1b[33m",
        Level::INFO => "\x1b[32m",
        _ => "\x1b[34m",
    }
}

impl<S, N> FormatEvent<S, N> for LineFormatter
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let meta = event.metadata();
        write!(writer, "[{}] ", Local::now().format("%m-%d %H:%M:%S%.3f"))?;
        let level = meta.level().as_str();
        if self.ansi {
            write!(writer, "{}{level:5}\x1b[0m", level_color(*meta.level()))?;
        } else {
            write!(writer, "{level:5}")?;
        }
        write!(writer, " {} > ", meta.target())?;
        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}
