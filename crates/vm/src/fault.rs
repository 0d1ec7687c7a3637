//! 缺页处理
//!
//! 每次缺页的状态机：
//!
//! 1. 地址不是合法的用户地址：拒绝（致命）；
//! 2. 补充页表中有描述符：
//!    - 写只读页：拒绝（致命）；
//!    - 已驻留：无事可做（正在换出的页也算驻留，访问方重新缺页直到换出完成）；
//!    - 未驻留：页入（获取帧、从文件或交换区读入、安装映射）；
//! 3. 没有描述符：尝试栈增长，条件是地址不低于栈指针下方 32 字节，
//!    且栈的总大小不超过 8 MiB；否则拒绝（致命）。

use crate::address::{Ppn, Vpn};
use crate::config::vm_config;
use crate::error::{VmError, VmResult};
use crate::manager::Vm;
use crate::memory_space::AddressSpace;
use crate::page::{Backing, FileRegion, PageDescriptor};
use crate::swap::SwapSlot;
use crate::task::TaskContext;
use alloc::sync::Arc;

/// 页入时帧内容的来源
enum PageSource {
    /// 帧已在获取时清零
    Zeroed,
    File(FileRegion),
    Swap(SwapSlot),
}

impl Vm {
    /// 处理一次缺页（或对一个用户地址的预先校验）
    pub fn handle_fault(&self, task: &dyn TaskContext, addr: usize, write: bool) -> VmResult<()> {
        if addr == 0 || addr >= vm_config().user_top() {
            return Err(VmError::InvalidAddress);
        }

        let space = task.address_space();
        let vpn = Vpn::containing(addr);
        let state = space
            .spt()
            .lock()
            .get(vpn)
            .map(|d| (d.is_resident(), d.is_writable()));

        match state {
            Some((_, false)) if write => {
                log::warn!("pid {}: write to read-only page {:#x}", task.pid(), addr);
                Err(VmError::PermissionDenied)
            }
            Some((true, _)) => Ok(()),
            Some((false, _)) => self.page_in(space, vpn),
            None => self.grow_stack(task, addr),
        }
    }

    /// 来自陷阱处理程序的缺页入口，无法解决时终止进程
    ///
    /// 返回缺页是否已解决。
    pub fn on_page_fault(&self, task: &dyn TaskContext, addr: usize, write: bool) -> bool {
        match self.handle_fault(task, addr, write) {
            Ok(()) => true,
            Err(e) => {
                log::warn!(
                    "pid {}: unresolved page fault at {:#x} (write={}): {}",
                    task.pid(),
                    addr,
                    write,
                    e
                );
                self.kill_on_fault(task, e);
                false
            }
        }
    }

    /// 把一个未驻留的页调入内存
    fn page_in(&self, space: &Arc<AddressSpace>, vpn: Vpn) -> VmResult<()> {
        let zero_fill = space
            .spt()
            .lock()
            .get(vpn)
            .ok_or(VmError::NotFound)?
            .backing
            .needs_zero_fill();

        let ppn = self.frame_table().acquire(space, vpn, zero_fill)?;
        let result = self
            .load_page(space, vpn, ppn)
            .and_then(|()| self.frame_table().install(space, vpn, ppn));
        if let Err(e) = result {
            log::warn!("pid {}: page-in of {:?} failed: {}", space.pid(), vpn, e);
            if let Err(e) = self.frame_table().release(ppn) {
                log::error!("pid {}: releasing {:?} failed: {}", space.pid(), ppn, e);
            }
            return Err(e);
        }
        Ok(())
    }

    /// 在不持有帧表锁的情况下填充钉住的帧
    fn load_page(&self, space: &Arc<AddressSpace>, vpn: Vpn, ppn: Ppn) -> VmResult<()> {
        let source = {
            let mut spt = space.spt().lock();
            let desc = spt.get_mut(vpn).ok_or(VmError::NotFound)?;
            if let Some(slot) = desc.take_swap_slot() {
                PageSource::Swap(slot)
            } else {
                match &desc.backing {
                    Backing::File(region) | Backing::Mmap { region, .. }
                        if region.read_bytes > 0 =>
                    {
                        PageSource::File(region.clone())
                    }
                    _ => PageSource::Zeroed,
                }
            }
        };

        match source {
            PageSource::Zeroed => Ok(()),
            PageSource::File(region) => self
                .frame_table()
                .fill_pinned(ppn, |page| region.load(page))?,
            PageSource::Swap(slot) => {
                let swap = self.frame_table().swap();
                self.frame_table()
                    .fill_pinned(ppn, |page| swap.read(slot, page))?
            }
        }
    }

    /// 在栈区域内为 `addr` 新建一个零页
    fn grow_stack(&self, task: &dyn TaskContext, addr: usize) -> VmResult<()> {
        let cfg = vm_config();
        let stack_top = cfg.user_stack_top();
        let stack_limit = stack_top.saturating_sub(cfg.max_stack_size());
        let sp = task.user_sp();

        if addr < sp.saturating_sub(cfg.stack_slack()) || addr < stack_limit || addr >= stack_top {
            log::warn!(
                "pid {}: access to {:#x} is not a valid stack growth (sp={:#x})",
                task.pid(),
                addr,
                sp
            );
            return Err(VmError::InvalidAddress);
        }

        let space = task.address_space();
        let vpn = Vpn::containing(addr);
        space
            .spt()
            .lock()
            .insert(PageDescriptor::new(vpn, Backing::Zero, true))?;
        log::debug!("pid {}: stack grows to {:?}", task.pid(), vpn);
        self.page_in(space, vpn)
    }
}
