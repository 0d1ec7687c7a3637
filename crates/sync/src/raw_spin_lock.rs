//! 原始自旋锁
//!
//! 基于原子操作实现自旋锁机制，并实现 [`lock_api::RawMutex`]，
//! 由 `lock_api` 负责提供带数据的锁和 RAII 保护器。

use crate::arch_ops;
use core::{
    hint,
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
};

/// 原始自旋锁
///
/// 加锁时禁用本地中断并保存之前的中断状态，解锁时恢复。
/// 不可重入。多把锁嵌套时必须按获取的相反顺序释放，
/// 否则中断会在仍持有内层锁时被提前打开。
#[derive(Debug)]
pub struct RawSpinLock {
    lock: AtomicBool,
    /// 持锁者在加锁前的中断状态，只有持锁者会读写
    saved_flags: AtomicUsize,
}

impl RawSpinLock {
    /// 创建一个新的 RawSpinLock 实例。
    pub const fn new() -> Self {
        RawSpinLock {
            lock: AtomicBool::new(false),
            saved_flags: AtomicUsize::new(0),
        }
    }
}

impl Default for RawSpinLock {
    fn default() -> Self {
        Self::new()
    }
}

// SAFETY: 同一时刻只有一个持有者能把 lock 从 false 置为 true，
// 释放时使用 Release 语义，与获取时的 Acquire 配对。
unsafe impl lock_api::RawMutex for RawSpinLock {
    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: Self = RawSpinLock::new();

    // 保护器记录的是本地 CPU 的中断状态，不能跨 CPU 转移
    type GuardMarker = lock_api::GuardNoSend;

    fn lock(&self) {
        // SAFETY: 与 unlock 中的 restore_interrupts 配对
        let flags = unsafe { arch_ops().read_and_disable_interrupts() };

        while self
            .lock
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            while self.lock.load(Ordering::Relaxed) {
                hint::spin_loop();
            }
        }

        self.saved_flags.store(flags, Ordering::Relaxed);
    }

    fn try_lock(&self) -> bool {
        let flags = unsafe { arch_ops().read_and_disable_interrupts() };

        if self
            .lock
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            self.saved_flags.store(flags, Ordering::Relaxed);
            true
        } else {
            // 获取失败，立即恢复中断状态
            unsafe { arch_ops().restore_interrupts(flags) };
            false
        }
    }

    unsafe fn unlock(&self) {
        let flags = self.saved_flags.load(Ordering::Relaxed);
        self.lock.store(false, Ordering::Release);
        // SAFETY: flags 是本次加锁时保存的值
        unsafe { arch_ops().restore_interrupts(flags) };
    }

    fn is_locked(&self) -> bool {
        self.lock.load(Ordering::Relaxed)
    }
}
