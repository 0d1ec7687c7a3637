//! 内存管理相关操作的 Mock 实现
//!
//! 注意：这里不直接依赖 `vm` crate（避免循环依赖）。
//! `vm` crate 在 `cfg(test)` 下为这些类型实现其 trait（例如 `ArchVmOps` / `PageDirectory`）。

use alloc::alloc::{Layout, alloc_zeroed};
use alloc::collections::BTreeMap;
use sync::SpinLock;

const PAGE_SIZE: usize = 4096;

/// Mock 的内存管理架构操作
///
/// 默认实现采用"恒等映射"（vaddr == paddr），配合 [`MockPhysMem`] 使用。
pub struct MockMmOps;

impl MockMmOps {
    pub const fn new() -> Self {
        Self
    }

    /// 将物理地址转换为虚拟地址（测试默认：恒等映射）
    pub fn paddr_to_vaddr(&self, paddr: usize) -> usize {
        paddr
    }
}

/// 全局 Mock 实例
pub static MOCK_MM_OPS: MockMmOps = MockMmOps::new();

/// 充当物理内存的一段页对齐的堆内存
///
/// 内存被有意泄漏：帧可能在测试结束前仍被访问。
pub struct MockPhysMem {
    start: usize,
    frames: usize,
}

impl MockPhysMem {
    pub fn new(frames: usize) -> Self {
        let layout = match Layout::from_size_align(frames.max(1) * PAGE_SIZE, PAGE_SIZE) {
            Ok(layout) => layout,
            Err(_) => panic!("MockPhysMem: bad layout"),
        };
        // SAFETY: layout 大小非零
        let ptr = unsafe { alloc_zeroed(layout) };
        assert!(!ptr.is_null(), "MockPhysMem: out of memory");
        Self {
            start: ptr as usize,
            frames,
        }
    }

    /// 起始物理地址（页对齐）
    pub fn start(&self) -> usize {
        self.start
    }

    /// 结束物理地址（不包含）
    pub fn end(&self) -> usize {
        self.start + self.frames * PAGE_SIZE
    }
}

/// Mock 页表项
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockPte {
    pub ppn: usize,
    pub writable: bool,
    pub accessed: bool,
    pub dirty: bool,
}

/// 以 `BTreeMap<vpn, MockPte>` 实现的页目录
pub struct MockPageDirectory {
    entries: SpinLock<BTreeMap<usize, MockPte>>,
}

impl MockPageDirectory {
    pub fn new() -> Self {
        Self {
            entries: SpinLock::new(BTreeMap::new()),
        }
    }

    /// 安装映射，已映射时返回 false
    pub fn map(&self, vpn: usize, ppn: usize, writable: bool) -> bool {
        let mut entries = self.entries.lock();
        if entries.contains_key(&vpn) {
            return false;
        }
        entries.insert(
            vpn,
            MockPte {
                ppn,
                writable,
                accessed: false,
                dirty: false,
            },
        );
        true
    }

    /// 清除映射，未映射时返回 false
    pub fn unmap(&self, vpn: usize) -> bool {
        self.entries.lock().remove(&vpn).is_some()
    }

    pub fn get(&self, vpn: usize) -> Option<MockPte> {
        self.entries.lock().get(&vpn).copied()
    }

    pub fn set_accessed(&self, vpn: usize, accessed: bool) {
        if let Some(pte) = self.entries.lock().get_mut(&vpn) {
            pte.accessed = accessed;
        }
    }

    pub fn set_dirty(&self, vpn: usize, dirty: bool) {
        if let Some(pte) = self.entries.lock().get_mut(&vpn) {
            pte.dirty = dirty;
        }
    }

    /// 模拟硬件对所有映射页的一次访问
    pub fn touch_all(&self) {
        for pte in self.entries.lock().values_mut() {
            pte.accessed = true;
        }
    }

    /// 已安装的映射数
    pub fn mapped_count(&self) -> usize {
        self.entries.lock().len()
    }
}

impl Default for MockPageDirectory {
    fn default() -> Self {
        Self::new()
    }
}
