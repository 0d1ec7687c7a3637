//! 进程地址空间

use crate::address::{AlignOps, PageNum, UsizeConvert, Vaddr, Vpn};
use crate::config::PAGE_SIZE;
use crate::error::{VmError, VmResult};
use crate::file::VmFile;
use crate::memory_space::MmapRegistry;
use crate::page::{Backing, FileRegion, PageDescriptor, SupplementalPageTable};
use crate::page_table::PageDirectory;
use alloc::sync::Arc;
use core::cmp::min;
use sync::SpinLock;

/// 进程的地址空间
///
/// 以 `Arc` 共享：进程持有强引用，帧表条目持有弱引用，
/// 换出时通过弱引用访问其他进程的页目录和补充页表。
///
/// 锁顺序：映射登记表 → 帧表 → 补充页表 → 交换区。
pub struct AddressSpace {
    pid: usize,
    spt: SpinLock<SupplementalPageTable>,
    page_dir: Arc<dyn PageDirectory>,
    mmaps: SpinLock<MmapRegistry>,
}

impl AddressSpace {
    /// 为进程创建一个空的地址空间
    pub fn new(pid: usize, page_dir: Arc<dyn PageDirectory>) -> Arc<Self> {
        Arc::new(Self {
            pid,
            spt: SpinLock::new(SupplementalPageTable::new()),
            page_dir,
            mmaps: SpinLock::new(MmapRegistry::new()),
        })
    }

    /// 所属进程
    pub fn pid(&self) -> usize {
        self.pid
    }

    /// 补充页表
    pub fn spt(&self) -> &SpinLock<SupplementalPageTable> {
        &self.spt
    }

    /// 页目录
    pub fn page_dir(&self) -> &dyn PageDirectory {
        self.page_dir.as_ref()
    }

    /// 内存映射登记表
    pub fn mmaps(&self) -> &SpinLock<MmapRegistry> {
        &self.mmaps
    }

    /// 惰性加载一个可执行文件段
    ///
    /// 为 `[vaddr, vaddr + read_bytes + zero_bytes)` 中的每一页创建描述符：
    /// 有文件内容的页为文件页，纯零页为零页。此处不读取任何数据。
    ///
    /// # 参数
    ///
    /// * `file` - 可执行文件句柄（由加载器持有）
    /// * `offset` - 段在文件中的偏移
    /// * `vaddr` - 段的起始虚拟地址，必须页对齐
    /// * `read_bytes` - 需要从文件读取的字节数
    /// * `zero_bytes` - 之后需要填零的字节数
    /// * `writable` - 段是否可写
    pub fn load_segment(
        &self,
        file: &Arc<dyn VmFile>,
        offset: usize,
        vaddr: usize,
        read_bytes: usize,
        zero_bytes: usize,
        writable: bool,
    ) -> VmResult<()> {
        if !Vaddr::from_usize(vaddr).is_page_aligned()
            || (read_bytes + zero_bytes) % PAGE_SIZE != 0
        {
            return Err(VmError::Misaligned);
        }

        let pages = (read_bytes + zero_bytes) / PAGE_SIZE;
        let start = Vpn::containing(vaddr);
        let mut spt = self.spt.lock();
        if !spt.range_is_free(start, pages) {
            return Err(VmError::AlreadyExists);
        }

        let mut remaining = read_bytes;
        for i in 0..pages {
            let page_read = min(remaining, PAGE_SIZE);
            let backing = if page_read == 0 {
                Backing::Zero
            } else {
                Backing::File(FileRegion {
                    file: file.clone(),
                    offset: offset + i * PAGE_SIZE,
                    read_bytes: page_read,
                    zero_bytes: PAGE_SIZE - page_read,
                })
            };
            spt.insert(PageDescriptor::new(start.offset(i), backing, writable))?;
            remaining -= page_read;
        }

        log::debug!(
            "pid {}: segment {:#x}..{:#x} ({} file bytes, writable={})",
            self.pid,
            vaddr,
            vaddr + pages * PAGE_SIZE,
            read_bytes,
            writable
        );
        Ok(())
    }

    /// 描述符数量
    pub fn page_count(&self) -> usize {
        self.spt.lock().len()
    }

    /// 驻留页数量
    pub fn resident_count(&self) -> usize {
        self.spt.lock().resident_count()
    }
}

impl core::fmt::Debug for AddressSpace {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AddressSpace")
            .field("pid", &self.pid)
            .finish_non_exhaustive()
    }
}
