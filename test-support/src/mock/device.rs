//! 块设备的 Mock 实现
//!
//! 注意：这里不直接依赖 `vm` crate（避免循环依赖）。
//! `vm` crate 在 `cfg(test)` 下为这些类型实现 `BlockDevice`。

use alloc::vec;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use sync::SpinLock;

/// 内存中的交换磁盘
pub struct MockDisk {
    block_size: usize,
    total_blocks: usize,
    data: SpinLock<Vec<u8>>,
    fail_io: AtomicBool,
    writes: AtomicUsize,
}

impl MockDisk {
    pub fn new(block_size: usize, total_blocks: usize) -> Self {
        Self {
            block_size,
            total_blocks,
            data: SpinLock::new(vec![0u8; block_size * total_blocks]),
            fail_io: AtomicBool::new(false),
            writes: AtomicUsize::new(0),
        }
    }

    pub fn read_block(&self, block_id: usize, buf: &mut [u8]) -> bool {
        if self.fail_io.load(Ordering::Relaxed)
            || block_id >= self.total_blocks
            || buf.len() != self.block_size
        {
            return false;
        }
        let start = block_id * self.block_size;
        buf.copy_from_slice(&self.data.lock()[start..start + self.block_size]);
        true
    }

    pub fn write_block(&self, block_id: usize, buf: &[u8]) -> bool {
        if self.fail_io.load(Ordering::Relaxed)
            || block_id >= self.total_blocks
            || buf.len() != self.block_size
        {
            return false;
        }
        let start = block_id * self.block_size;
        self.data.lock()[start..start + self.block_size].copy_from_slice(buf);
        self.writes.fetch_add(1, Ordering::Relaxed);
        true
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn total_blocks(&self) -> usize {
        self.total_blocks
    }

    /// 让之后的读写全部失败
    pub fn set_fail_io(&self, fail: bool) {
        self.fail_io.store(fail, Ordering::Relaxed);
    }

    /// 成功写入的块数
    pub fn block_writes(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }
}
