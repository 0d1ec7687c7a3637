//! 文件的 Mock 实现
//!
//! 注意：这里不直接依赖 `vm` crate（避免循环依赖）。
//! `vm` crate 在 `cfg(test)` 下为这些类型实现 `VmFile`。
//!
//! 同一个 inode 的所有句柄共享内容和计数器，和真实文件系统的 reopen 语义一致。

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::cmp::min;
use core::sync::atomic::{AtomicUsize, Ordering};
use sync::SpinLock;

struct MockInode {
    data: SpinLock<Vec<u8>>,
    reopens: AtomicUsize,
    closes: AtomicUsize,
}

/// Mock 文件句柄
pub struct MockFile {
    inode: Arc<MockInode>,
    console: bool,
}

impl MockFile {
    pub fn new(data: &[u8]) -> Self {
        Self {
            inode: Arc::new(MockInode {
                data: SpinLock::new(data.to_vec()),
                reopens: AtomicUsize::new(0),
                closes: AtomicUsize::new(0),
            }),
            console: false,
        }
    }

    /// 控制台/键盘句柄
    pub fn console() -> Self {
        let mut file = Self::new(b"");
        file.console = true;
        file
    }

    pub fn read_at(&self, offset: usize, buf: &mut [u8]) -> usize {
        let data = self.inode.data.lock();
        if offset >= data.len() {
            return 0;
        }
        let n = min(buf.len(), data.len() - offset);
        buf[..n].copy_from_slice(&data[offset..offset + n]);
        n
    }

    /// 写入不会扩展文件长度
    pub fn write_at(&self, offset: usize, buf: &[u8]) -> usize {
        let mut data = self.inode.data.lock();
        if offset >= data.len() {
            return 0;
        }
        let n = min(buf.len(), data.len() - offset);
        data[offset..offset + n].copy_from_slice(&buf[..n]);
        n
    }

    pub fn len(&self) -> usize {
        self.inode.data.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 在同一 inode 上打开新句柄
    pub fn reopen(&self) -> Self {
        self.inode.reopens.fetch_add(1, Ordering::Relaxed);
        Self {
            inode: self.inode.clone(),
            console: self.console,
        }
    }

    pub fn close(&self) {
        self.inode.closes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn is_console(&self) -> bool {
        self.console
    }

    /// 文件当前内容
    pub fn contents(&self) -> Vec<u8> {
        self.inode.data.lock().clone()
    }

    pub fn reopen_count(&self) -> usize {
        self.inode.reopens.load(Ordering::Relaxed)
    }

    pub fn close_count(&self) -> usize {
        self.inode.closes.load(Ordering::Relaxed)
    }
}
