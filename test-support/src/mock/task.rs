//! 进程上下文的 Mock 实现
//!
//! 注意：这里不直接依赖 `vm` crate（避免循环依赖）。
//! `MockTask` 对地址空间类型 `S` 和文件句柄类型 `F` 泛型，
//! `vm` crate 在 `cfg(test)` 下为具体实例实现 `TaskContext`。

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicUsize, Ordering};
use sync::SpinLock;

/// Mock 进程
pub struct MockTask<S, F> {
    pid: usize,
    space: Arc<S>,
    sp: AtomicUsize,
    files: SpinLock<Vec<(i32, F)>>,
    exit_status: SpinLock<Option<i32>>,
}

impl<S, F: Clone> MockTask<S, F> {
    pub fn new(pid: usize, space: Arc<S>, sp: usize) -> Self {
        Self {
            pid,
            space,
            sp: AtomicUsize::new(sp),
            files: SpinLock::new(Vec::new()),
            exit_status: SpinLock::new(None),
        }
    }

    pub fn pid(&self) -> usize {
        self.pid
    }

    pub fn space(&self) -> &Arc<S> {
        &self.space
    }

    pub fn sp(&self) -> usize {
        self.sp.load(Ordering::Relaxed)
    }

    pub fn set_sp(&self, sp: usize) {
        self.sp.store(sp, Ordering::Relaxed);
    }

    /// 以给定描述符安装一个打开的文件
    pub fn add_file(&self, fd: i32, file: F) {
        self.files.lock().push((fd, file));
    }

    pub fn file(&self, fd: i32) -> Option<F> {
        self.files
            .lock()
            .iter()
            .find(|(n, _)| *n == fd)
            .map(|(_, f)| f.clone())
    }

    /// 记录退出状态
    pub fn terminate(&self, status: i32) {
        *self.exit_status.lock() = Some(status);
    }

    /// 进程是否已终止，以及退出状态
    pub fn exit_status(&self) -> Option<i32> {
        *self.exit_status.lock()
    }
}
