//! 编解码工作线程调度器.
//!
//! [`Scheduler`] 封装一个可选的 rayon 线程池 (0 线程表示在调用线程上内联执行),
//! 以 `Arc<Scheduler>` 的形式注入 `InputFile`/`OutputFile`. 已打开的文件持有
//! 各自的引用, 因此修改进程级线程数不会影响正在使用的线程池.
//!
//! 进程级默认调度器通过 [`set_global_thread_count`] 配置, 该函数在互斥锁内
//! 替换调度器, 可以在任意线程上重复调用; 以相同线程数重复调用为空操作.

use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex, OnceLock};

use log::debug;
use mox_core::{MoxError, MoxResult};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

/// 工作线程调度器
pub struct Scheduler {
    pool: Option<ThreadPool>,
    threads: usize,
}

impl Scheduler {
    /// 创建拥有 `threads` 个工作线程的调度器, 0 表示内联执行
    pub fn new(threads: usize) -> MoxResult<Self> {
        if threads == 0 {
            return Ok(Self::inline());
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|idx| format!("mox-worker-{idx}"))
            .build()
            .map_err(|e| MoxError::Io(std::io::Error::other(format!("创建线程池失败: {e}"))))?;
        debug!("创建线程池: {threads} 个工作线程");
        Ok(Self {
            pool: Some(pool),
            threads,
        })
    }

    /// 在调用线程上内联执行的调度器
    pub fn inline() -> Self {
        Self {
            pool: None,
            threads: 0,
        }
    }

    /// 工作线程数 (0 表示内联)
    pub fn threads(&self) -> usize {
        self.threads
    }

    /// 对每个元素并行执行 `f`, 结果保持输入顺序
    pub fn map<T, R, F>(&self, items: Vec<T>, f: F) -> Vec<R>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Sync + Send,
    {
        match &self.pool {
            Some(pool) if items.len() > 1 => {
                pool.install(|| items.into_par_iter().map(&f).collect())
            }
            _ => items.into_iter().map(f).collect(),
        }
    }

    /// 提交一个后台任务
    ///
    /// 内联调度器会立即执行任务.
    pub fn spawn<R, F>(&self, job: F) -> JobHandle<R>
    where
        R: Send + 'static,
        F: FnOnce() -> R + Send + 'static,
    {
        match &self.pool {
            Some(pool) => {
                let (tx, rx) = mpsc::channel();
                pool.spawn(move || {
                    // 接收端已丢弃时结果无人关心
                    let _ = tx.send(job());
                });
                JobHandle {
                    state: JobState::Pending(rx),
                }
            }
            None => JobHandle {
                state: JobState::Ready(job()),
            },
        }
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("threads", &self.threads)
            .finish()
    }
}

/// 后台任务句柄
pub struct JobHandle<R> {
    state: JobState<R>,
}

enum JobState<R> {
    Ready(R),
    Pending(Receiver<R>),
}

impl<R> JobHandle<R> {
    /// 等待任务完成并取回结果
    pub fn wait(self) -> MoxResult<R> {
        match self.state {
            JobState::Ready(r) => Ok(r),
            JobState::Pending(rx) => rx
                .recv()
                .map_err(|_| MoxError::Logic("工作线程任务异常终止".into())),
        }
    }
}

static GLOBAL: OnceLock<Mutex<Arc<Scheduler>>> = OnceLock::new();

fn global_cell() -> &'static Mutex<Arc<Scheduler>> {
    GLOBAL.get_or_init(|| Mutex::new(Arc::new(Scheduler::inline())))
}

/// 当前平台是否支持工作线程
pub fn supports_threads() -> bool {
    true
}

/// 设置进程级默认线程数
///
/// 0 表示关闭线程池. 与当前线程数相同时不做任何事.
pub fn set_global_thread_count(threads: usize) -> MoxResult<()> {
    let mut current = global_cell()
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    if current.threads() == threads {
        return Ok(());
    }
    debug!("进程级线程数: {} -> {threads}", current.threads());
    *current = Arc::new(Scheduler::new(threads)?);
    Ok(())
}

/// 进程级默认线程数
pub fn global_thread_count() -> usize {
    global_scheduler().threads()
}

/// 获取进程级默认调度器
pub fn global_scheduler() -> Arc<Scheduler> {
    global_cell()
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone()
}
