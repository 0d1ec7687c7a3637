//! 内存映射文件
//!
//! `map` 的失败条件：文件描述符无效或指向控制台、地址为空或未页对齐、
//! 文件为空、映射范围与已有页或栈区域重叠。这些都是非致命错误。
//! `unmap` 一个不存在的标识符是致命错误。

use crate::address::{AlignOps, PageNum, UsizeConvert, Vaddr, Vpn, VpnRange};
use crate::config::{PAGE_SIZE, vm_config};
use crate::error::{VmError, VmResult};
use crate::manager::Vm;
use crate::page::{Backing, FileRegion, PageDescriptor};
use crate::task::TaskContext;
use core::cmp::min;
use uapi::mm::{MAP_FAILED, MapId, STDIN_FILENO, STDOUT_FILENO};

impl Vm {
    /// 把文件 `fd` 映射到 `addr`，返回映射标识符
    pub fn map(&self, task: &dyn TaskContext, fd: i32, addr: usize) -> VmResult<MapId> {
        if fd == STDIN_FILENO || fd == STDOUT_FILENO {
            return Err(VmError::BadFile);
        }
        let file = task.file(fd).ok_or(VmError::BadFile)?;
        if file.is_console() {
            return Err(VmError::BadFile);
        }
        if addr == 0 || !Vaddr::from_usize(addr).is_page_aligned() {
            return Err(VmError::Misaligned);
        }
        let len = file.len();
        if len == 0 {
            return Err(VmError::EmptyFile);
        }

        let pages = len.div_ceil(PAGE_SIZE);
        let start = Vpn::containing(addr);
        let range = VpnRange::from_start_len(start, pages);
        let cfg = vm_config();
        let end = addr
            .checked_add(pages * PAGE_SIZE)
            .ok_or(VmError::Overlap)?;
        let stack = VpnRange::new(
            Vpn::containing(cfg.user_stack_top().saturating_sub(cfg.max_stack_size())),
            Vpn::containing(cfg.user_stack_top()),
        );
        if end > cfg.user_top() || range.overlaps(&stack) {
            log::debug!("pid {}: mapping {:#x}..{:#x} out of range", task.pid(), addr, end);
            return Err(VmError::Overlap);
        }

        let space = task.address_space();
        let mut mmaps = space.mmaps().lock();
        let file = file.reopen().ok_or(VmError::BadFile)?;
        let mut spt = space.spt().lock();
        if !spt.range_is_free(start, pages) {
            drop(spt);
            file.close();
            log::debug!("pid {}: mapping at {:#x} overlaps existing pages", task.pid(), addr);
            return Err(VmError::Overlap);
        }

        let id = mmaps.register(file.clone(), range);
        for i in 0..pages {
            let offset = i * PAGE_SIZE;
            let read_bytes = min(PAGE_SIZE, len - offset);
            let region = FileRegion {
                file: file.clone(),
                offset,
                read_bytes,
                zero_bytes: PAGE_SIZE - read_bytes,
            };
            spt.insert(PageDescriptor::new(
                start.offset(i),
                Backing::Mmap { id, region },
                true,
            ))?;
        }

        log::debug!(
            "pid {}: mmap {} -> {:#x}..{:#x} ({} bytes)",
            task.pid(),
            id,
            addr,
            end,
            len
        );
        Ok(id)
    }

    /// 解除映射：写回脏页，释放帧，移除页描述符，关闭文件
    pub fn unmap(&self, task: &dyn TaskContext, id: MapId) -> VmResult<()> {
        let space = task.address_space();
        let record = space.mmaps().lock().take(id).ok_or_else(|| {
            log::warn!("pid {}: munmap of unknown mapping {}", task.pid(), id);
            VmError::UnknownMapping
        })?;
        let result = self.frame_table().release_range(space, record.pages);
        record.file.close();
        log::debug!("pid {}: munmap {}", task.pid(), id);
        result
    }

    /// 把映射中的脏页写回文件，映射保持不变
    pub fn sync(&self, task: &dyn TaskContext, id: MapId) -> VmResult<()> {
        let space = task.address_space();
        let pages = space
            .mmaps()
            .lock()
            .get(id)
            .map(|r| r.pages)
            .ok_or(VmError::UnknownMapping)?;
        self.frame_table().sync_range(space, pages)
    }

    /// mmap 系统调用：非致命错误返回 `MAP_FAILED`，致命错误终止进程
    pub fn sys_mmap(&self, task: &dyn TaskContext, fd: i32, addr: usize) -> MapId {
        match self.map(task, fd, addr) {
            Ok(id) => id,
            Err(e) => {
                if e.is_fatal() {
                    self.kill_on_fault(task, e);
                } else {
                    log::debug!("pid {}: mmap(fd={}, {:#x}) failed: {}", task.pid(), fd, addr, e);
                }
                MAP_FAILED
            }
        }
    }

    /// munmap 系统调用：任何错误都终止进程
    pub fn sys_munmap(&self, task: &dyn TaskContext, id: MapId) {
        if let Err(e) = self.unmap(task, id) {
            self.kill_on_fault(task, e);
        }
    }
}
