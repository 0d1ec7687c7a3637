//! 补充页表
//!
//! 每个进程一张补充页表（SPT），以虚拟页号为键记录页面在驻留之前
//! 应当如何被物化：来自文件区域、来自交换区、零页，或属于某个内存映射。
//!
//! 页描述符的驻留标志只能在持有帧表锁时修改（见 [`crate::frame_table`]）。

use crate::address::{PageNum, Vpn};
use crate::config::PAGE_SIZE;
use crate::error::{VmError, VmResult};
use crate::file::VmFile;
use crate::swap::SwapSlot;
use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use bitflags::bitflags;
use uapi::mm::MapId;

/// 文件中的一段页内容：从 `offset` 读取 `read_bytes` 字节，其余 `zero_bytes` 字节填零
#[derive(Clone)]
pub struct FileRegion {
    /// 文件句柄（共享引用，由加载器或映射记录持有）
    pub file: Arc<dyn VmFile>,
    /// 文件内字节偏移
    pub offset: usize,
    /// 需要从文件读取的字节数
    pub read_bytes: usize,
    /// 页尾需要填零的字节数
    pub zero_bytes: usize,
}

impl FileRegion {
    /// 把文件内容读入帧，剩余部分填零
    pub fn load(&self, frame: &mut [u8]) -> VmResult<()> {
        debug_assert_eq!(self.read_bytes + self.zero_bytes, PAGE_SIZE);
        let (head, tail) = frame.split_at_mut(self.read_bytes);
        let actual = self.file.read_at(self.offset, head).map_err(|e| {
            log::error!("vm: file read at {:#x} failed: {}", self.offset, e);
            VmError::Io
        })?;
        if actual != self.read_bytes {
            log::warn!(
                "Partial read at offset {}: expected {}, got {}",
                self.offset,
                self.read_bytes,
                actual
            );
            return Err(VmError::Io);
        }
        tail.fill(0);
        Ok(())
    }

    /// 把帧中属于文件的部分写回文件
    pub fn write_back(&self, frame: &[u8]) -> VmResult<()> {
        let actual = self
            .file
            .write_at(self.offset, &frame[..self.read_bytes])
            .map_err(|e| {
                log::error!("vm: file write at {:#x} failed: {}", self.offset, e);
                VmError::Io
            })?;
        if actual != self.read_bytes {
            log::error!(
                "Partial write at offset {}: expected {}, got {}",
                self.offset,
                self.read_bytes,
                actual
            );
            return Err(VmError::Io);
        }
        Ok(())
    }
}

impl core::fmt::Debug for FileRegion {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FileRegion")
            .field("file", &"<dyn VmFile>")
            .field("offset", &self.offset)
            .field("read_bytes", &self.read_bytes)
            .field("zero_bytes", &self.zero_bytes)
            .finish()
    }
}

/// 页面的后备来源
#[derive(Debug, Clone)]
pub enum Backing {
    /// 匿名零页
    Zero,
    /// 可执行文件段（只读或私有可写）
    File(FileRegion),
    /// 交换区。不驻留时为 `Some(slot)`；驻留后槽位已释放，为 `None`，
    /// 再次换出时必须重新写入交换区。
    Swap(Option<SwapSlot>),
    /// 内存映射文件，换出与解除映射时写回文件
    Mmap {
        /// 所属映射
        id: MapId,
        /// 对应的文件区域
        region: FileRegion,
    },
}

impl Backing {
    /// 页入时是否需要先将帧清零
    pub fn needs_zero_fill(&self) -> bool {
        match self {
            Backing::Zero => true,
            Backing::File(region) | Backing::Mmap { region, .. } => region.read_bytes == 0,
            Backing::Swap(slot) => slot.is_none(),
        }
    }

    /// 后备类型名称，用于日志
    pub fn kind(&self) -> &'static str {
        match self {
            Backing::Zero => "zero",
            Backing::File(_) => "file",
            Backing::Swap(_) => "swap",
            Backing::Mmap { .. } => "mmap",
        }
    }
}

bitflags! {
    /// 页描述符的软件标志
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PageFlags: u8 {
        /// 用户可写
        const WRITABLE = 1 << 0;
        /// 当前驻留在某个物理帧中
        const RESIDENT = 1 << 1;
        /// 时钟算法已给过一次机会
        const SEEN = 1 << 2;
        /// 已被选为牺牲页，内容正在写出；期间仍视为驻留
        const EVICTING = 1 << 3;
    }
}

/// 页描述符
#[derive(Debug, Clone)]
pub struct PageDescriptor {
    vpn: Vpn,
    /// 后备来源
    pub backing: Backing,
    /// 软件标志
    pub flags: PageFlags,
}

impl PageDescriptor {
    /// 创建一个尚未驻留的页描述符
    pub fn new(vpn: Vpn, backing: Backing, writable: bool) -> Self {
        let mut flags = PageFlags::empty();
        flags.set(PageFlags::WRITABLE, writable);
        Self {
            vpn,
            backing,
            flags,
        }
    }

    /// 虚拟页号
    pub fn vpn(&self) -> Vpn {
        self.vpn
    }

    /// 是否驻留
    pub fn is_resident(&self) -> bool {
        self.flags.contains(PageFlags::RESIDENT)
    }

    /// 是否可写
    pub fn is_writable(&self) -> bool {
        self.flags.contains(PageFlags::WRITABLE)
    }

    /// 取走交换槽：`Swap(Some(slot))` 变为 `Swap(None)`
    pub fn take_swap_slot(&mut self) -> Option<SwapSlot> {
        match &mut self.backing {
            Backing::Swap(slot) => slot.take(),
            _ => None,
        }
    }
}

/// 补充页表
#[derive(Debug, Default)]
pub struct SupplementalPageTable {
    pages: BTreeMap<Vpn, PageDescriptor>,
}

impl SupplementalPageTable {
    /// 创建空页表
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入页描述符；该页已存在时返回 `AlreadyExists`，不覆盖
    pub fn insert(&mut self, desc: PageDescriptor) -> VmResult<()> {
        match self.pages.entry(desc.vpn) {
            alloc::collections::btree_map::Entry::Occupied(_) => Err(VmError::AlreadyExists),
            alloc::collections::btree_map::Entry::Vacant(slot) => {
                slot.insert(desc);
                Ok(())
            }
        }
    }

    /// 按地址查找，地址先向下取整到页
    pub fn lookup(&self, vaddr: usize) -> Option<&PageDescriptor> {
        self.pages.get(&Vpn::containing(vaddr))
    }

    /// 按页号查找
    pub fn get(&self, vpn: Vpn) -> Option<&PageDescriptor> {
        self.pages.get(&vpn)
    }

    /// 按页号查找（可变）
    pub fn get_mut(&mut self, vpn: Vpn) -> Option<&mut PageDescriptor> {
        self.pages.get_mut(&vpn)
    }

    /// 移除页描述符
    pub fn remove(&mut self, vpn: Vpn) -> VmResult<PageDescriptor> {
        self.pages.remove(&vpn).ok_or(VmError::NotFound)
    }

    /// 取出全部页描述符，页表变为空
    pub fn drain(&mut self) -> impl Iterator<Item = PageDescriptor> {
        core::mem::take(&mut self.pages).into_values()
    }

    /// 描述符数量
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// 驻留页数量
    pub fn resident_count(&self) -> usize {
        self.pages.values().filter(|d| d.is_resident()).count()
    }

    /// 遍历全部描述符
    pub fn iter(&self) -> impl Iterator<Item = &PageDescriptor> {
        self.pages.values()
    }

    /// `[start, start + pages)` 内是否没有任何描述符
    pub fn range_is_free(&self, start: Vpn, pages: usize) -> bool {
        self.pages
            .range(start..start.offset(pages))
            .next()
            .is_none()
    }
}
