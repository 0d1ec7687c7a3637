//! 用户帧池
//!
//! 本模块管理分配给用户进程的物理帧池。
//!
//! ## 分配策略（位图）
//!
//! 分配器使用位图（bitmap）跟踪每个物理帧的分配状态：
//!
//! - **bitmap**：每个 bit 表示一个物理帧（0=空闲，1=已分配）
//! - **last_alloc_hint**：上次分配位置提示，利用局部性加速查找
//!
//! 单帧分配从 last_alloc_hint 开始循环查找第一个空闲位；
//! 释放时直接清除对应 bit，O(1) 操作。
//!
//! ## RAII：自动回收
//!
//! [`FrameTracker`] 持有帧池的引用，`Drop` 时自动把帧还给帧池。
//! 帧表条目拥有 `FrameTracker`，因此移除条目即释放帧，
//! 异常退出路径上也不会泄漏帧。
//!
//! 帧池不做清零：是否清零由获取帧的一方决定（见 [`FrameTracker::zero`]）。

use crate::address::{ConvertablePaddr, Paddr, PageNum, Ppn, UsizeConvert};
use crate::config::PAGE_SIZE;
use alloc::sync::Arc;
use alloc::vec::Vec;
use sync::SpinLock;

// ============================================================================
// FrameTracker - 单帧 RAII 封装
// ============================================================================

/// 物理帧跟踪器。
/// 实现了 RAII 模式：当此结构体被 drop 时，它所管理的物理页帧会被自动回收。
pub struct FrameTracker {
    ppn: Ppn,
    pool: Arc<FramePool>,
}

impl FrameTracker {
    /// 获取此帧跟踪器所管理的物理页号 (Ppn)。
    pub fn ppn(&self) -> Ppn {
        self.ppn
    }

    /// 将帧内容清零。
    pub fn zero(&self) {
        self.bytes_mut().fill(0);
    }

    /// 以字节切片访问帧内容。
    pub fn bytes(&self) -> &[u8] {
        // SAFETY: 帧在 FrameTracker 存活期间归其独占
        unsafe { frame_bytes(self.ppn) }
    }

    /// 以可变字节切片访问帧内容。
    #[allow(clippy::mut_from_ref)]
    pub fn bytes_mut(&self) -> &mut [u8] {
        // SAFETY: 同上；帧表锁保证同一时刻只有一个写者
        unsafe { frame_bytes_mut(self.ppn) }
    }
}

impl core::fmt::Debug for FrameTracker {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("FrameTracker").field(&self.ppn).finish()
    }
}

impl Drop for FrameTracker {
    /// 自动回收物理页帧。
    fn drop(&mut self) {
        self.pool.dealloc(self.ppn);
    }
}

// ============================================================================
// 辅助函数
// ============================================================================

/// 通过直接映射以只读切片访问帧。
///
/// # Safety
/// 调用者必须保证帧属于用户帧池且在返回的切片存活期间不会被释放。
pub unsafe fn frame_bytes<'a>(ppn: Ppn) -> &'a [u8] {
    let va = ppn.start_addr().to_vaddr();
    unsafe { core::slice::from_raw_parts(va.as_ptr::<u8>(), PAGE_SIZE) }
}

/// 通过直接映射以可变切片访问帧。
///
/// # Safety
/// 同 [`frame_bytes`]，并且调用者必须保证没有其他引用同时访问该帧。
pub unsafe fn frame_bytes_mut<'a>(ppn: Ppn) -> &'a mut [u8] {
    let va = ppn.start_addr().to_vaddr();
    unsafe { core::slice::from_raw_parts_mut(va.as_mut_ptr::<u8>(), PAGE_SIZE) }
}

// ============================================================================
// 帧池
// ============================================================================

/// 用户帧池，由自旋锁保护。
///
/// 该锁是叶子锁：持有帧表锁时可以获取它，反之不行。
pub struct FramePool {
    inner: SpinLock<FrameAllocator>,
}

impl FramePool {
    /// 使用可用的物理内存范围创建帧池。
    ///
    /// # 参数
    ///
    /// * `start_addr` - 可用物理内存的起始地址（向上取整到页）
    /// * `end_addr` - 可用物理内存的结束地址（向下取整到页）
    pub fn new(start_addr: usize, end_addr: usize) -> Arc<Self> {
        let start_ppn = Ppn::from_addr_ceil(Paddr::from_usize(start_addr));
        let end_ppn = Ppn::from_addr_floor(Paddr::from_usize(end_addr));
        let mut allocator = FrameAllocator::new();
        allocator.init(start_ppn, end_ppn);
        Arc::new(Self {
            inner: SpinLock::new(allocator),
        })
    }

    /// 分配一个物理帧。池耗尽时返回 `None`。
    pub fn alloc_frame(self: &Arc<Self>) -> Option<FrameTracker> {
        let ppn = self.inner.lock().alloc()?;
        Some(FrameTracker {
            ppn,
            pool: self.clone(),
        })
    }

    /// 回收一个物理帧。此函数由 FrameTracker 的 Drop 实现调用。
    fn dealloc(&self, ppn: Ppn) {
        self.inner.lock().dealloc(ppn);
    }

    /// 获取帧池的当前状态
    /// # 返回值
    /// - 总帧数
    /// - 已分配的帧数
    /// - 空闲的帧数
    pub fn stats(&self) -> (usize, usize, usize) {
        self.inner.lock().get_stats()
    }

    /// 获取空闲的帧数
    pub fn free_frames(&self) -> usize {
        self.inner.lock().free_frames()
    }
}

/// 物理帧分配器。
/// 采用位图策略跟踪每个物理帧的分配状态。
pub struct FrameAllocator {
    /// 物理帧的起始 Ppn。
    start: Ppn,
    /// 物理帧的结束 Ppn (不包含)。
    end: Ppn,
    /// 位图数据（每个 bit 表示一个帧：0=空闲，1=已分配）。
    bitmap: Vec<u64>,
    /// 总帧数。
    total_frames: usize,
    /// 已分配帧数（用于快速统计）。
    allocated_count: usize,
    /// 上次分配的位置提示（用于加速单帧分配）。
    last_alloc_hint: usize,
}

impl FrameAllocator {
    /// 创建一个空的帧分配器实例。
    pub fn new() -> Self {
        FrameAllocator {
            start: Ppn::from_usize(0),
            end: Ppn::from_usize(0),
            bitmap: Vec::new(),
            total_frames: 0,
            allocated_count: 0,
            last_alloc_hint: 0,
        }
    }

    /// 初始化帧分配器，设置可用的物理内存范围。
    pub fn init(&mut self, start: Ppn, end: Ppn) {
        self.start = start;
        self.end = end;
        self.total_frames = end.as_usize().saturating_sub(start.as_usize());
        self.bitmap = alloc::vec![0u64; self.total_frames.div_ceil(64)];
        self.allocated_count = 0;
        self.last_alloc_hint = 0;
    }

    #[inline]
    fn is_free(&self, frame_idx: usize) -> bool {
        (self.bitmap[frame_idx / 64] & (1u64 << (frame_idx % 64))) == 0
    }

    /// 分配一个物理帧。
    /// 从 last_alloc_hint 开始循环查找第一个空闲位。
    pub fn alloc(&mut self) -> Option<Ppn> {
        let bitmap_len = self.bitmap.len();
        let start_idx = self.last_alloc_hint;

        // 循环查找：[hint, end) + [0, hint)
        for offset in 0..bitmap_len {
            let idx = (start_idx + offset) % bitmap_len;
            let word = self.bitmap[idx];

            // 快速跳过全满的 u64
            if word == u64::MAX {
                continue;
            }

            let bit_pos = (!word).trailing_zeros() as usize;
            let frame_idx = idx * 64 + bit_pos;

            // 最后一个字的高位超出帧范围
            if frame_idx >= self.total_frames {
                continue;
            }

            self.bitmap[idx] |= 1u64 << bit_pos;
            self.allocated_count += 1;
            self.last_alloc_hint = idx;
            return Some(self.start.offset(frame_idx));
        }

        None // 帧池耗尽
    }

    /// 回收一个物理帧。
    pub fn dealloc(&mut self, ppn: Ppn) {
        debug_assert!(
            ppn >= self.start && ppn < self.end,
            "dealloc: frame out of range"
        );

        let frame_idx = ppn.as_usize() - self.start.as_usize();
        debug_assert!(!self.is_free(frame_idx), "dealloc: double free detected");

        self.bitmap[frame_idx / 64] &= !(1u64 << (frame_idx % 64));
        self.allocated_count -= 1;
    }

    /// 获取总的物理帧数
    pub fn total_frames(&self) -> usize {
        self.total_frames
    }

    /// 获取空闲的帧数
    pub fn free_frames(&self) -> usize {
        self.total_frames - self.allocated_count
    }

    /// 获取帧分配器的当前状态（总数、已分配、空闲）
    pub fn get_stats(&self) -> (usize, usize, usize) {
        (
            self.total_frames,
            self.allocated_count,
            self.total_frames - self.allocated_count,
        )
    }
}

impl Default for FrameAllocator {
    fn default() -> Self {
        Self::new()
    }
}
