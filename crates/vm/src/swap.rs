//! 交换管理器
//!
//! 交换设备被划分为页大小的槽位，每个槽位占 `PAGE_SIZE / block_size` 个连续块。
//! 空闲槽位用位图跟踪（0=空闲，1=已占用），分配总是选择编号最小的空闲槽位。
//!
//! 槽位是一次性的：[`SwapManager::read`] 把页读回帧之后立即释放槽位，
//! 因此同一时刻页面内容要么在帧里，要么在交换区里，不会两边都有。
//!
//! 位图和设备 I/O 由同一把自旋锁保护，该锁独立于帧表锁。

use crate::block::BlockDevice;
use crate::config::PAGE_SIZE;
use crate::error::{VmError, VmResult};
use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use sync::SpinLock;

/// 交换槽编号
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SwapSlot(pub usize);

struct SwapBitmap {
    bits: Vec<u64>,
    total: usize,
    used: usize,
}

impl SwapBitmap {
    fn new(total: usize) -> Self {
        Self {
            bits: vec![0u64; total.div_ceil(64)],
            total,
            used: 0,
        }
    }

    fn is_used(&self, idx: usize) -> bool {
        (self.bits[idx / 64] & (1u64 << (idx % 64))) != 0
    }

    /// 分配编号最小的空闲槽位
    fn alloc(&mut self) -> Option<usize> {
        for (word_idx, word) in self.bits.iter_mut().enumerate() {
            if *word == u64::MAX {
                continue;
            }
            let bit = (!*word).trailing_zeros() as usize;
            let idx = word_idx * 64 + bit;
            if idx >= self.total {
                return None;
            }
            *word |= 1u64 << bit;
            self.used += 1;
            return Some(idx);
        }
        None
    }

    fn free(&mut self, idx: usize) {
        debug_assert!(idx < self.total, "swap: slot out of range");
        debug_assert!(self.is_used(idx), "swap: double free detected");
        self.bits[idx / 64] &= !(1u64 << (idx % 64));
        self.used -= 1;
    }
}

/// 交换管理器
pub struct SwapManager {
    device: Arc<dyn BlockDevice>,
    blocks_per_slot: usize,
    bitmap: SpinLock<SwapBitmap>,
}

impl SwapManager {
    /// 在块设备上创建交换管理器
    ///
    /// 块大小必须整除页大小。
    pub fn new(device: Arc<dyn BlockDevice>) -> Arc<Self> {
        let block_size = device.block_size();
        debug_assert!(
            block_size > 0 && PAGE_SIZE % block_size == 0,
            "swap: block size must divide page size"
        );
        let blocks_per_slot = (PAGE_SIZE / block_size).max(1);
        let total = device.total_blocks() / blocks_per_slot;
        log::debug!(
            "swap: {} slots ({} blocks of {} bytes each)",
            total,
            blocks_per_slot,
            block_size
        );
        Arc::new(Self {
            device,
            blocks_per_slot,
            bitmap: SpinLock::new(SwapBitmap::new(total)),
        })
    }

    /// 分配一个空闲槽位
    pub fn allocate_slot(&self) -> VmResult<SwapSlot> {
        self.bitmap
            .lock()
            .alloc()
            .map(SwapSlot)
            .ok_or(VmError::SwapFull)
    }

    /// 释放槽位
    pub fn release_slot(&self, slot: SwapSlot) {
        self.bitmap.lock().free(slot.0);
    }

    /// 把槽位内容读入 `page`，然后释放槽位
    pub fn read(&self, slot: SwapSlot, page: &mut [u8]) -> VmResult<()> {
        let mut bitmap = self.bitmap.lock();
        debug_assert!(bitmap.is_used(slot.0), "swap: read from free slot");
        let block_size = self.device.block_size();
        let mut result = Ok(());
        for (i, chunk) in page
            .chunks_mut(block_size)
            .take(self.blocks_per_slot)
            .enumerate()
        {
            if !self.device.read_block(slot.0 * self.blocks_per_slot + i, chunk) {
                log::error!("swap: read from slot {} failed", slot.0);
                result = Err(VmError::Io);
                break;
            }
        }
        bitmap.free(slot.0);
        result
    }

    /// 把 `page` 写入交换区；未给定槽位时分配一个新的，返回实际使用的槽位
    pub fn write(&self, page: &[u8], slot: Option<SwapSlot>) -> VmResult<SwapSlot> {
        let mut bitmap = self.bitmap.lock();
        let slot = match slot {
            Some(slot) => slot,
            None => match bitmap.alloc() {
                Some(idx) => SwapSlot(idx),
                None => {
                    log::warn!("swap: device full ({} slots)", bitmap.total);
                    return Err(VmError::SwapFull);
                }
            },
        };
        let block_size = self.device.block_size();
        for (i, chunk) in page.chunks(block_size).take(self.blocks_per_slot).enumerate() {
            if !self
                .device
                .write_block(slot.0 * self.blocks_per_slot + i, chunk)
            {
                log::error!("swap: write to slot {} failed", slot.0);
                bitmap.free(slot.0);
                return Err(VmError::Io);
            }
        }
        Ok(slot)
    }

    /// 槽位总数
    pub fn total_slots(&self) -> usize {
        self.bitmap.lock().total
    }

    /// 已占用槽位数
    pub fn used_slots(&self) -> usize {
        self.bitmap.lock().used
    }

    /// 槽位是否被占用
    pub fn is_slot_used(&self, slot: SwapSlot) -> bool {
        self.bitmap.lock().is_used(slot.0)
    }
}
