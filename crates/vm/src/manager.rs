//! 虚拟内存管理器
//!
//! [`Vm`] 持有注入的帧表（以及其中的帧池和交换管理器），
//! 向系统调用层提供缺页处理、用户地址校验、内存映射以及进程退出时的拆除。

use crate::error::VmError;
use crate::frame_table::FrameTable;
use crate::task::TaskContext;
use alloc::sync::Arc;
use uapi::vminfo::VmInfo;

/// 因致命错误终止进程时使用的退出状态
pub const FATAL_EXIT_STATUS: i32 = -1;

/// 虚拟内存管理器
pub struct Vm {
    frames: Arc<FrameTable>,
}

impl Vm {
    /// 使用共享的帧表创建管理器
    pub fn new(frames: Arc<FrameTable>) -> Self {
        Self { frames }
    }

    /// 帧表
    pub fn frame_table(&self) -> &Arc<FrameTable> {
        &self.frames
    }

    /// 进程退出：解除全部映射（写回脏页），销毁补充页表，然后终止进程
    pub fn exit(&self, task: &dyn TaskContext, status: i32) {
        self.teardown(task);
        task.terminate(status);
    }

    /// 以致命错误终止进程
    pub fn kill_on_fault(&self, task: &dyn TaskContext, err: VmError) {
        log::error!("pid {}: fatal vm error: {}", task.pid(), err);
        self.exit(task, FATAL_EXIT_STATUS);
    }

    /// 释放进程占用的全部帧与交换槽
    fn teardown(&self, task: &dyn TaskContext) {
        let space = task.address_space();
        let records = space.mmaps().lock().take_all();
        for record in records {
            if let Err(e) = self.frames.release_range(space, record.pages) {
                log::error!(
                    "pid {}: write-back of mapping {} failed: {}",
                    task.pid(),
                    record.id,
                    e
                );
            }
            record.file.close();
        }
        self.frames.destroy(space);
        log::debug!("pid {}: address space torn down", task.pid());
    }

    /// 虚拟内存统计信息
    pub fn stats(&self) -> VmInfo {
        let (total_frames, _, free_frames) = self.frames.pool().stats();
        let swap = self.frames.swap();
        VmInfo {
            total_frames,
            free_frames,
            resident_pages: self.frames.len(),
            total_swap_slots: swap.total_slots(),
            used_swap_slots: swap.used_slots(),
            evictions: self.frames.evictions(),
        }
    }
}
