//! 端到端测试
//!
//! 使用 `test-support` 中的 Mock 协作者搭建一个完整的虚拟内存环境：
//! 一段堆内存充当用户帧池，内存磁盘充当交换设备。

extern crate std;

mod concurrency;
mod fault;
mod mmap;

use crate::block::BlockDevice;
use crate::config::{PAGE_SIZE, vm_config};
use crate::file::VmFile;
use crate::page_table::{PageDirectory, PagingError, PagingResult, PteFlags};
use crate::task::TaskContext;
use crate::{AddressSpace, FramePool, FrameTable, Ppn, SwapManager, Vm, Vpn};
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicUsize, Ordering};
use test_support::mock::arch::MOCK_ARCH_OPS;
use test_support::mock::device::MockDisk;
use test_support::mock::fs::MockFile;
use test_support::mock::mm::{MockPageDirectory, MockPhysMem};
use test_support::mock::task::MockTask;

// ---------------------------------------------------------------------------
// Mock 协作者的 trait 实现
// ---------------------------------------------------------------------------

struct SyncArchOps;

impl sync::ArchOps for SyncArchOps {
    unsafe fn read_and_disable_interrupts(&self) -> usize {
        unsafe { MOCK_ARCH_OPS.read_and_disable_interrupts() }
    }

    unsafe fn restore_interrupts(&self, flags: usize) {
        unsafe { MOCK_ARCH_OPS.restore_interrupts(flags) }
    }
}

static SYNC_ARCH_OPS: SyncArchOps = SyncArchOps;
// 0 = uninit, 1 = initializing, 2 = ready
static SYNC_INIT: AtomicUsize = AtomicUsize::new(0);

/// 注册自旋锁所需的架构操作，每个测试二进制只注册一次
pub(crate) fn setup() {
    match SYNC_INIT.compare_exchange(0, 1, Ordering::AcqRel, Ordering::Acquire) {
        Ok(_) => {
            // Safety: tests use a single global mock ArchOps.
            unsafe { sync::register_arch_ops(&SYNC_ARCH_OPS) };
            SYNC_INIT.store(2, Ordering::Release);
        }
        Err(_) => {
            while SYNC_INIT.load(Ordering::Acquire) != 2 {
                core::hint::spin_loop();
            }
        }
    }
}

impl PageDirectory for MockPageDirectory {
    fn map(&self, vpn: Vpn, ppn: Ppn, flags: PteFlags) -> PagingResult<()> {
        if MockPageDirectory::map(self, vpn.0, ppn.0, flags.contains(PteFlags::WRITABLE)) {
            Ok(())
        } else {
            Err(PagingError::AlreadyMapped)
        }
    }

    fn unmap(&self, vpn: Vpn) -> PagingResult<()> {
        if MockPageDirectory::unmap(self, vpn.0) {
            Ok(())
        } else {
            Err(PagingError::NotMapped)
        }
    }

    fn translate(&self, vpn: Vpn) -> Option<Ppn> {
        self.get(vpn.0).map(|pte| Ppn(pte.ppn))
    }

    fn flags(&self, vpn: Vpn) -> Option<PteFlags> {
        self.get(vpn.0).map(|pte| {
            let mut flags = PteFlags::empty();
            flags.set(PteFlags::WRITABLE, pte.writable);
            flags.set(PteFlags::ACCESSED, pte.accessed);
            flags.set(PteFlags::DIRTY, pte.dirty);
            flags
        })
    }

    fn set_accessed(&self, vpn: Vpn, accessed: bool) {
        MockPageDirectory::set_accessed(self, vpn.0, accessed);
    }

    fn set_dirty(&self, vpn: Vpn, dirty: bool) {
        MockPageDirectory::set_dirty(self, vpn.0, dirty);
    }
}

impl VmFile for MockFile {
    fn read_at(&self, offset: usize, buf: &mut [u8]) -> Result<usize, isize> {
        Ok(MockFile::read_at(self, offset, buf))
    }

    fn write_at(&self, offset: usize, buf: &[u8]) -> Result<usize, isize> {
        Ok(MockFile::write_at(self, offset, buf))
    }

    fn len(&self) -> usize {
        MockFile::len(self)
    }

    fn reopen(&self) -> Option<Arc<dyn VmFile>> {
        Some(Arc::new(MockFile::reopen(self)))
    }

    fn close(&self) {
        MockFile::close(self);
    }

    fn is_console(&self) -> bool {
        MockFile::is_console(self)
    }
}

impl BlockDevice for MockDisk {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> bool {
        MockDisk::read_block(self, block_id, buf)
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> bool {
        MockDisk::write_block(self, block_id, buf)
    }

    fn block_size(&self) -> usize {
        MockDisk::block_size(self)
    }

    fn total_blocks(&self) -> usize {
        MockDisk::total_blocks(self)
    }
}

/// 测试用进程
pub(crate) type Task = MockTask<AddressSpace, Arc<dyn VmFile>>;

impl TaskContext for Task {
    fn pid(&self) -> usize {
        MockTask::pid(self)
    }

    fn address_space(&self) -> &Arc<AddressSpace> {
        self.space()
    }

    fn user_sp(&self) -> usize {
        self.sp()
    }

    fn file(&self, fd: i32) -> Option<Arc<dyn VmFile>> {
        MockTask::file(self, fd)
    }

    fn terminate(&self, status: i32) {
        MockTask::terminate(self, status);
    }
}

// ---------------------------------------------------------------------------
// 测试环境
// ---------------------------------------------------------------------------

/// 可执行段和匿名数据的测试基址
pub(crate) const DATA_BASE: usize = 0x0804_8000;
/// 内存映射的测试基址
pub(crate) const MMAP_BASE: usize = 0x1000_0000;

/// 用户栈顶
pub(crate) fn stack_top() -> usize {
    vm_config().user_stack_top()
}

pub(crate) struct Harness {
    pub vm: Vm,
    pub disk: Arc<MockDisk>,
    _mem: MockPhysMem,
}

impl Harness {
    /// `frames` 个用户帧，`swap_slots` 个交换槽（每槽 8 个 512 字节扇区）
    pub fn new(frames: usize, swap_slots: usize) -> Self {
        setup();
        let mem = MockPhysMem::new(frames);
        let pool = FramePool::new(mem.start(), mem.end());
        let disk = Arc::new(MockDisk::new(512, swap_slots * 8));
        let swap = SwapManager::new(disk.clone());
        Self {
            vm: Vm::new(FrameTable::new(pool, swap)),
            disk,
            _mem: mem,
        }
    }

    /// 创建一个进程，栈指针位于栈顶
    pub fn spawn(&self, pid: usize) -> (Arc<Task>, Arc<MockPageDirectory>) {
        let pd = Arc::new(MockPageDirectory::new());
        let space = AddressSpace::new(pid, pd.clone());
        (Arc::new(Task::new(pid, space, stack_top())), pd)
    }

    pub fn frames(&self) -> &Arc<FrameTable> {
        self.vm.frame_table()
    }
}

/// 以 fd 安装一个文件，返回可以观察文件内容的句柄
pub(crate) fn install_file(task: &Task, fd: i32, data: &[u8]) -> Arc<MockFile> {
    let file = Arc::new(MockFile::new(data));
    task.add_file(fd, file.clone());
    file
}

/// 在 `DATA_BASE` 处加载 `pages` 页可写匿名段
pub(crate) fn load_anon(task: &Task, pages: usize) {
    let file: Arc<dyn VmFile> = Arc::new(MockFile::new(b""));
    task.space()
        .load_segment(&file, 0, DATA_BASE, 0, pages * PAGE_SIZE, true)
        .unwrap();
}

/// 第 `i` 页的起始地址
pub(crate) fn data_page(i: usize) -> usize {
    DATA_BASE + i * PAGE_SIZE
}

/// 检查驻留与帧表条目一一对应
pub(crate) fn assert_residency_duality(h: &Harness, space: &Arc<AddressSpace>) {
    let pages: Vec<(Vpn, bool)> = space
        .spt()
        .lock()
        .iter()
        .map(|d| (d.vpn(), d.is_resident()))
        .collect();
    let mut resident = 0;
    for (vpn, is_resident) in pages {
        let in_table = h.frames().lookup(space, vpn).is_some();
        assert_eq!(is_resident, in_table, "residency mismatch for {:?}", vpn);
        if is_resident {
            resident += 1;
        }
    }
    assert_eq!(h.frames().frames_of(space), resident);
}
