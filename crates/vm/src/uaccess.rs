//! 用户地址校验与拷贝
//!
//! 系统调用在解引用任何用户指针之前，先按页逐一校验（必要时触发页入或栈增长）。
//! 拷贝在帧表锁下经直接映射完成，拷贝期间页不会被换出；
//! 若页在校验与拷贝之间被换出，则重新缺页后重试。

use crate::address::{AlignOps, PageNum, UsizeConvert, Vaddr, Vpn};
use crate::config::PAGE_SIZE;
use crate::error::{VmError, VmResult};
use crate::manager::Vm;
use crate::task::TaskContext;
use core::cmp::min;

impl Vm {
    /// 校验 `[addr, addr + len)` 触及的每一页
    pub fn check_user_buffer(
        &self,
        task: &dyn TaskContext,
        addr: usize,
        len: usize,
        write: bool,
    ) -> VmResult<()> {
        if len == 0 {
            return Ok(());
        }
        let end = addr.checked_add(len).ok_or(VmError::InvalidAddress)?;
        let mut cur = addr;
        while cur < end {
            self.handle_fault(task, cur, write)?;
            cur = Vpn::containing(cur).end_addr().as_usize();
        }
        Ok(())
    }

    /// 校验以 NUL 结尾的用户字符串，返回不含 NUL 的长度
    pub fn check_user_str(&self, task: &dyn TaskContext, addr: usize) -> VmResult<usize> {
        let space = task.address_space();
        let mut cur = addr;
        let mut len = 0;
        loop {
            self.handle_fault(task, cur, false)?;
            let vpn = Vpn::containing(cur);
            let off = Vaddr::from_usize(cur).page_offset();
            let found = self.frame_table().with_resident(space, vpn, |page| {
                space.page_dir().set_accessed(vpn, true);
                page[off..].iter().position(|&b| b == 0)
            });
            match found {
                // 校验后被换出，重新缺页
                None => continue,
                Some(Some(pos)) => return Ok(len + pos),
                Some(None) => {
                    len += PAGE_SIZE - off;
                    cur = vpn.end_addr().as_usize();
                }
            }
        }
    }

    /// 从用户地址读取 `out.len()` 字节（跨页安全）
    pub fn copy_from_user(
        &self,
        task: &dyn TaskContext,
        addr: usize,
        out: &mut [u8],
    ) -> VmResult<()> {
        let space = task.address_space();
        let mut done = 0usize;
        while done < out.len() {
            let cur = addr.checked_add(done).ok_or(VmError::InvalidAddress)?;
            self.handle_fault(task, cur, false)?;

            let vpn = Vpn::containing(cur);
            let off = Vaddr::from_usize(cur).page_offset();
            let take = min(out.len() - done, PAGE_SIZE - off);
            let dst = &mut out[done..done + take];
            let copied = self.frame_table().with_resident(space, vpn, |page| {
                dst.copy_from_slice(&page[off..off + take]);
                space.page_dir().set_accessed(vpn, true);
            });
            if copied.is_some() {
                done += take;
            }
        }
        Ok(())
    }

    /// 向用户地址写入字节序列（跨页安全），设置页的脏位和访问位
    pub fn copy_to_user(&self, task: &dyn TaskContext, addr: usize, bytes: &[u8]) -> VmResult<()> {
        let space = task.address_space();
        let mut done = 0usize;
        while done < bytes.len() {
            let cur = addr.checked_add(done).ok_or(VmError::InvalidAddress)?;
            self.handle_fault(task, cur, true)?;

            let vpn = Vpn::containing(cur);
            let off = Vaddr::from_usize(cur).page_offset();
            let take = min(bytes.len() - done, PAGE_SIZE - off);
            let src = &bytes[done..done + take];
            let copied = self.frame_table().with_resident(space, vpn, |page| {
                page[off..off + take].copy_from_slice(src);
                space.page_dir().set_dirty(vpn, true);
                space.page_dir().set_accessed(vpn, true);
            });
            if copied.is_some() {
                done += take;
            }
        }
        Ok(())
    }
}
