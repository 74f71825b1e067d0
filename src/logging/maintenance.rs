//! 日志维护任务: 过期删除与历史压缩.
//!
//! 在专用线程的单线程 tokio 运行时中执行: 按清理间隔运行,
//! 并在每个本地零点额外运行一次, 使前一天的日志尽快被压缩.

use super::LoggingConfig;
use anyhow::{Context, Result};
use chrono::{Days, Local, NaiveDate, NaiveDateTime};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error};

/// 启动后台维护线程
pub(super) fn spawn_log_maintenance(config: LoggingConfig) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .context("创建日志维护运行时失败")?;
    std::thread::Builder::new()
        .name("mox-log-maintenance".to_string())
        .spawn(move || runtime.block_on(run_maintenance(config)))
        .context("启动日志维护线程失败")?;
    Ok(())
}

async fn run_maintenance(config: LoggingConfig) {
    let sweeper = LogSweeper::from_config(&config);
    let mut cleanup_interval =
        tokio::time::interval(Duration::from_secs(config.cleanup_interval_seconds.max(1)));
    cleanup_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut next_midnight = next_midnight_instant();

    loop {
        tokio::select! {
            // 首次 tick 立即完成, 即启动时清理一次
            _ = cleanup_interval.tick() => {
                if let Err(err) = sweeper.sweep(Local::now().date_naive()) {
                    error!("清理日志失败: {err:#}");
                }
            }
            _ = tokio::time::sleep_until(next_midnight) => {
                if let Err(err) = sweeper.sweep(Local::now().date_naive()) {
                    error!("零点清理日志失败: {err:#}");
                }
                next_midnight = next_midnight_instant();
            }
        }
    }
}

fn next_midnight_instant() -> Instant {
    Instant::now() + until_next_midnight(Local::now().naive_local())
}

/// 日志目录中的一个按日期命名的文件
#[derive(Debug, PartialEq, Eq)]
struct DatedLog {
    date: NaiveDate,
    compressed: bool,
}

/// 按保留策略清理一个日志目录
struct LogSweeper {
    directory: PathBuf,
    prefix: String,
    retention_days: u64,
    compress: bool,
}

impl LogSweeper {
    fn from_config(config: &LoggingConfig) -> Self {
        Self {
            directory: PathBuf::from(&config.directory),
            prefix: config.file_prefix.clone(),
            retention_days: config.retention_days.max(0) as u64,
            compress: config.compress_history,
        }
    }

    /// 识别 `<prefix>.<YYYY-MM-DD>.log[.gz]`
    fn classify(&self, file_name: &str) -> Option<DatedLog> {
        let rest = file_name.strip_prefix(&self.prefix)?.strip_prefix('.')?;
        let (date, compressed) = match rest.strip_suffix(".log.gz") {
            Some(date) => (date, true),
            None => (rest.strip_suffix(".log")?, false),
        };
        if date.len() != 10 {
            return None;
        }
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
        Some(DatedLog { date, compressed })
    }

    /// 删除早于保留期限的文件, 压缩今天以前的未压缩文件
    fn sweep(&self, today: NaiveDate) -> Result<()> {
        if !self.directory.exists() {
            return Ok(());
        }
        let cutoff = today
            .checked_sub_days(Days::new(self.retention_days))
            .unwrap_or(NaiveDate::MIN);

        for entry in fs::read_dir(&self.directory)? {
            let path = entry?.path();
            let Some(log) = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| self.classify(n))
            else {
                continue;
            };

            if log.date < cutoff {
                debug!("删除过期日志: {}", path.display());
                if let Err(err) = fs::remove_file(&path) {
                    error!("删除过期日志失败: {}, {err}", path.display());
                }
            } else if self.compress && !log.compressed && log.date < today {
                if let Err(err) = gzip_in_place(&path) {
                    error!("压缩历史日志失败: {err:#}");
                }
            }
        }
        Ok(())
    }
}

/// 压缩为 `<path>.gz` 并删除原文件; 目标已存在时跳过
fn gzip_in_place(path: &Path) -> Result<()> {
    let mut gz_name = path.as_os_str().to_owned();
    gz_name.push(".gz");
    let gz_path = PathBuf::from(gz_name);
    if gz_path.exists() {
        return Ok(());
    }

    let mut input =
        File::open(path).with_context(|| format!("打开待压缩日志失败, path={}", path.display()))?;
    let output = File::create(&gz_path)
        .with_context(|| format!("创建压缩日志失败, path={}", gz_path.display()))?;
    let mut encoder = GzEncoder::new(output, Compression::default());
    io::copy(&mut input, &mut encoder)?;
    encoder.finish()?;
    fs::remove_file(path)
        .with_context(|| format!("删除已压缩日志失败, path={}", path.display()))
}

/// 距下一个本地零点的时长, 至少 1 秒
fn until_next_midnight(now: NaiveDateTime) -> Duration {
    now.date()
        .succ_opt()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .and_then(|midnight| (midnight - now).to_std().ok())
        .unwrap_or(Duration::ZERO)
        .max(Duration::from_secs(1))
}
