//! 帧表
//!
//! 全局登记当前分配给用户进程的每一个物理帧：帧归哪个地址空间、
//! 物化的是哪个虚拟页。帧表锁串行化所有帧的获取、释放与换出扫描。
//!
//! ## 换出策略（时钟 / 二次机会）
//!
//! 指针 `hand` 在条目间循环，对每个候选页检查其所属页目录中的硬件访问位：
//!
//! - 访问位为 1 且描述符未被标记 `SEEN`：清除访问位、标记 `SEEN`，继续扫描；
//! - 否则选为牺牲页。
//!
//! 第一圈之后所有被访问过的页都已标记 `SEEN`，第二圈必然选中遇到的第一个
//! 未钉住的条目，因此扫描最多两圈。
//!
//! ## 写回
//!
//! - 内存映射页：脏则写回文件，后备类型不变；
//! - 交换页或脏的零页/文件页：写入新的交换槽，后备类型变为交换；
//! - 其余（干净）页直接丢弃，后备类型已足够重新加载。
//!
//! ## 钉住
//!
//! [`FrameTable::acquire`] 返回的帧处于钉住状态，换出扫描会跳过它；
//! 缺页线程在释放帧表锁后填充帧内容，再通过 [`FrameTable::install`]
//! 安装映射并解除钉住。
//!
//! 换出同样分三步：持锁选中牺牲页、撤销映射并钉住它（描述符标记
//! `EVICTING`）；释放帧表锁后写出到交换区或文件；再次持锁提交新的后备
//! 类型并摘下帧。写出失败时恢复映射并解除钉住。

use crate::address::{Ppn, Vpn, VpnRange};
use crate::error::{VmError, VmResult};
use crate::frame_allocator::{FramePool, FrameTracker, frame_bytes, frame_bytes_mut};
use crate::memory_space::AddressSpace;
use crate::page::{Backing, FileRegion, PageDescriptor, PageFlags};
use crate::page_table::PteFlags;
use crate::swap::{SwapManager, SwapSlot};
use alloc::sync::{Arc, Weak};
use alloc::vec::Vec;
use core::sync::atomic::{AtomicUsize, Ordering};
use sync::SpinLock;

/// 帧表条目
struct FrameEntry {
    frame: FrameTracker,
    owner: Weak<AddressSpace>,
    vpn: Vpn,
    pinned: bool,
}

impl FrameEntry {
    fn owned_by(&self, space: &Arc<AddressSpace>) -> bool {
        core::ptr::eq(self.owner.as_ptr(), Arc::as_ptr(space))
    }
}

/// 时钟扫描的结果
enum Victim {
    /// 帧已从帧表摘下，可直接复用
    Free(FrameTracker),
    /// 内容需要先写出，帧保持钉住
    WriteOut(PendingEviction),
}

enum WriteTarget {
    File(FileRegion),
    Swap,
}

/// 已撤销映射、内容尚未写出的牺牲页
struct PendingEviction {
    owner: Arc<AddressSpace>,
    vpn: Vpn,
    ppn: Ppn,
    dirty: bool,
    target: WriteTarget,
}

impl PendingEviction {
    fn write_out(&self, swap: &SwapManager) -> VmResult<Option<SwapSlot>> {
        // SAFETY: 帧已钉住且映射已撤销，写出期间既不会被修改也不会被释放
        let bytes = unsafe { frame_bytes(self.ppn) };
        match &self.target {
            WriteTarget::File(region) => region.write_back(bytes).map(|()| None),
            WriteTarget::Swap => swap.write(bytes, None).map(Some),
        }
    }
}

/// 已从帧表摘下、等待写回文件的脏映射页
struct PendingWrite {
    frame: FrameTracker,
    region: FileRegion,
}

struct FrameTableInner {
    entries: Vec<FrameEntry>,
    hand: usize,
}

impl FrameTableInner {
    fn position(&self, ppn: Ppn) -> Option<usize> {
        self.entries.iter().position(|e| e.frame.ppn() == ppn)
    }

    fn remove(&mut self, idx: usize) -> FrameEntry {
        let entry = self.entries.remove(idx);
        if idx < self.hand {
            self.hand -= 1;
        }
        if self.hand >= self.entries.len() {
            self.hand = 0;
        }
        entry
    }

    /// 时钟扫描，最多两圈
    fn select_victim(&mut self) -> VmResult<Victim> {
        let rounds = 2 * self.entries.len();
        for _ in 0..rounds {
            let idx = self.hand % self.entries.len();
            self.hand = (idx + 1) % self.entries.len();

            let entry = &self.entries[idx];
            if entry.pinned {
                continue;
            }
            let vpn = entry.vpn;
            let Some(owner) = entry.owner.upgrade() else {
                log::debug!("evict: reclaiming orphaned frame {:?}", self.entries[idx].frame);
                return Ok(Victim::Free(self.remove(idx).frame));
            };

            let pd = owner.page_dir();
            let mut spt = owner.spt().lock();
            let Some(desc) = spt.get_mut(vpn) else {
                log::warn!("evict: pid {} has no descriptor for {:?}", owner.pid(), vpn);
                drop(spt);
                return Ok(Victim::Free(self.remove(idx).frame));
            };

            if pd.is_accessed(vpn) && !desc.flags.contains(PageFlags::SEEN) {
                pd.set_accessed(vpn, false);
                desc.flags.insert(PageFlags::SEEN);
                continue;
            }

            let dirty = pd.is_dirty(vpn);
            let target = match &desc.backing {
                Backing::Mmap { region, .. } if dirty => Some(WriteTarget::File(region.clone())),
                Backing::Swap(_) => Some(WriteTarget::Swap),
                Backing::Zero | Backing::File(_) if dirty => Some(WriteTarget::Swap),
                _ => None,
            };
            if let Err(e) = pd.unmap(vpn) {
                log::warn!("evict: unmap {:?} of pid {} failed: {:?}", vpn, owner.pid(), e);
            }

            let Some(target) = target else {
                desc.flags.remove(PageFlags::RESIDENT | PageFlags::SEEN);
                log::debug!(
                    "evict: pid {} page {:?} dropped ({})",
                    owner.pid(),
                    vpn,
                    desc.backing.kind()
                );
                drop(spt);
                return Ok(Victim::Free(self.remove(idx).frame));
            };

            desc.flags.insert(PageFlags::EVICTING);
            drop(spt);
            let entry = &mut self.entries[idx];
            entry.pinned = true;
            return Ok(Victim::WriteOut(PendingEviction {
                owner,
                vpn,
                ppn: entry.frame.ppn(),
                dirty,
                target,
            }));
        }
        Err(VmError::OutOfFrames)
    }

    /// 释放一个页描述符占用的帧或交换槽
    ///
    /// 脏的驻留映射页连同帧一起返回，由调用者在释放帧表锁之后写回文件。
    fn release_descriptor(
        &mut self,
        space: &AddressSpace,
        desc: &PageDescriptor,
        swap: &SwapManager,
    ) -> Option<PendingWrite> {
        if !desc.is_resident() {
            if let Backing::Swap(Some(slot)) = desc.backing {
                swap.release_slot(slot);
            }
            return None;
        }
        let vpn = desc.vpn();
        let pd = space.page_dir();
        // 正在换出的页已没有映射，由换出线程收尾
        let ppn = pd.translate(vpn)?;
        let dirty = pd.is_dirty(vpn);
        if let Err(e) = pd.unmap(vpn) {
            log::warn!("pid {}: unmap {:?} failed: {:?}", space.pid(), vpn, e);
        }
        let idx = self.position(ppn)?;
        let frame = self.remove(idx).frame;
        match &desc.backing {
            Backing::Mmap { region, .. } if dirty => Some(PendingWrite {
                frame,
                region: region.clone(),
            }),
            _ => None,
        }
    }
}

/// 全局帧表
pub struct FrameTable {
    inner: SpinLock<FrameTableInner>,
    pool: Arc<FramePool>,
    swap: Arc<SwapManager>,
    evictions: AtomicUsize,
}

impl FrameTable {
    /// 创建帧表
    pub fn new(pool: Arc<FramePool>, swap: Arc<SwapManager>) -> Arc<Self> {
        Arc::new(Self {
            inner: SpinLock::new(FrameTableInner {
                entries: Vec::new(),
                hand: 0,
            }),
            pool,
            swap,
            evictions: AtomicUsize::new(0),
        })
    }

    /// 用户帧池
    pub fn pool(&self) -> &Arc<FramePool> {
        &self.pool
    }

    /// 交换管理器
    pub fn swap(&self) -> &Arc<SwapManager> {
        &self.swap
    }

    /// 为 `space` 的 `vpn` 获取一个帧
    ///
    /// 帧池耗尽时换出一个帧并直接使用它。返回的帧处于钉住状态。
    pub fn acquire(&self, space: &Arc<AddressSpace>, vpn: Vpn, zero_fill: bool) -> VmResult<Ppn> {
        let frame = match self.pool.alloc_frame() {
            Some(frame) => frame,
            None => self.evict().map_err(|e| {
                log::warn!("pid {}: eviction failed: {}", space.pid(), e);
                match e {
                    VmError::SwapFull => VmError::OutOfFrames,
                    other => other,
                }
            })?,
        };
        if zero_fill {
            frame.zero();
        }
        let ppn = frame.ppn();
        self.inner.lock().entries.push(FrameEntry {
            frame,
            owner: Arc::downgrade(space),
            vpn,
            pinned: true,
        });
        Ok(ppn)
    }

    /// 换出一个帧并返回它
    fn evict(&self) -> VmResult<FrameTracker> {
        let victim = self.inner.lock().select_victim()?;
        let frame = match victim {
            Victim::Free(frame) => frame,
            Victim::WriteOut(pending) => {
                let written = pending.write_out(&self.swap);
                self.finish_eviction(pending, written)?
            }
        };
        self.evictions.fetch_add(1, Ordering::Relaxed);
        Ok(frame)
    }

    /// 写出完成后提交换出；写出失败则恢复映射
    fn finish_eviction(
        &self,
        pending: PendingEviction,
        written: VmResult<Option<SwapSlot>>,
    ) -> VmResult<FrameTracker> {
        let PendingEviction {
            owner,
            vpn,
            ppn,
            dirty,
            ..
        } = pending;
        let mut inner = self.inner.lock();
        let idx = inner.position(ppn).ok_or(VmError::NotFound)?;
        let mut spt = owner.spt().lock();
        let desc = spt
            .get_mut(vpn)
            .filter(|d| d.flags.contains(PageFlags::EVICTING));

        match (desc, written) {
            (Some(desc), Ok(slot)) => {
                if let Some(slot) = slot {
                    desc.backing = Backing::Swap(Some(slot));
                }
                desc.flags
                    .remove(PageFlags::RESIDENT | PageFlags::SEEN | PageFlags::EVICTING);
                log::debug!(
                    "evict: pid {} page {:?} from {:?} ({})",
                    owner.pid(),
                    vpn,
                    ppn,
                    desc.backing.kind()
                );
            }
            (Some(desc), Err(e)) => {
                log::warn!("evict: writing out {:?} of pid {} failed: {}", vpn, owner.pid(), e);
                desc.flags.remove(PageFlags::EVICTING);
                let pd = owner.page_dir();
                if let Err(e) = pd.map(vpn, ppn, PteFlags::for_install(desc.is_writable())) {
                    log::error!("evict: restoring {:?} of pid {} failed: {:?}", vpn, owner.pid(), e);
                }
                pd.set_dirty(vpn, dirty);
                inner.entries[idx].pinned = false;
                return Err(VmError::OutOfFrames);
            }
            // 写出期间描述符已被移除（解除映射或进程退出）
            (None, Ok(Some(slot))) => self.swap.release_slot(slot),
            (None, _) => {}
        }
        drop(spt);
        Ok(inner.remove(idx).frame)
    }

    /// 在不持有帧表锁的情况下填充一个钉住的帧
    pub fn fill_pinned<R>(&self, ppn: Ppn, f: impl FnOnce(&mut [u8]) -> R) -> VmResult<R> {
        {
            let inner = self.inner.lock();
            let idx = inner.position(ppn).ok_or(VmError::NotFound)?;
            debug_assert!(inner.entries[idx].pinned, "fill_pinned: frame not pinned");
        }
        // SAFETY: 钉住的帧既不会被换出也不会被释放，只有钉住它的线程访问
        let bytes = unsafe { frame_bytes_mut(ppn) };
        Ok(f(bytes))
    }

    /// 安装页映射，标记描述符驻留并解除钉住
    pub fn install(&self, space: &Arc<AddressSpace>, vpn: Vpn, ppn: Ppn) -> VmResult<()> {
        let mut inner = self.inner.lock();
        let idx = inner.position(ppn).ok_or(VmError::NotFound)?;
        let mut spt = space.spt().lock();
        let desc = spt.get_mut(vpn).ok_or(VmError::NotFound)?;
        space
            .page_dir()
            .map(vpn, ppn, PteFlags::for_install(desc.is_writable()))?;
        desc.flags.insert(PageFlags::RESIDENT);
        desc.flags.remove(PageFlags::SEEN);
        inner.entries[idx].pinned = false;
        Ok(())
    }

    /// 移除帧表条目并把帧还给帧池
    pub fn release(&self, ppn: Ppn) -> VmResult<()> {
        let mut inner = self.inner.lock();
        let idx = inner.position(ppn).ok_or(VmError::NotFound)?;
        inner.remove(idx);
        Ok(())
    }

    /// 在帧表锁保护下访问一个驻留页的内容
    ///
    /// 页不驻留时返回 `None`。回调期间该页不会被换出。
    pub fn with_resident<R>(
        &self,
        space: &Arc<AddressSpace>,
        vpn: Vpn,
        f: impl FnOnce(&mut [u8]) -> R,
    ) -> Option<R> {
        let inner = self.inner.lock();
        let ppn = space.page_dir().translate(vpn)?;
        let idx = inner.position(ppn)?;
        Some(f(inner.entries[idx].frame.bytes_mut()))
    }

    /// 移除 `range` 内的全部页描述符，释放其帧；脏的映射页写回文件
    pub fn release_range(&self, space: &Arc<AddressSpace>, range: VpnRange) -> VmResult<()> {
        let mut pending = Vec::new();
        {
            let mut inner = self.inner.lock();
            let mut spt = space.spt().lock();
            for vpn in range {
                let Ok(desc) = spt.remove(vpn) else {
                    continue;
                };
                pending.extend(inner.release_descriptor(space, &desc, &self.swap));
            }
        }
        let mut result = Ok(());
        for write in pending {
            let written = write.region.write_back(write.frame.bytes());
            if result.is_ok() {
                result = written;
            }
        }
        result
    }

    /// 销毁整个补充页表：释放所有帧和交换槽
    pub fn destroy(&self, space: &Arc<AddressSpace>) {
        let mut pending = Vec::new();
        {
            let mut inner = self.inner.lock();
            let mut spt = space.spt().lock();
            for desc in spt.drain() {
                pending.extend(inner.release_descriptor(space, &desc, &self.swap));
            }
        }
        for write in pending {
            if let Err(e) = write.region.write_back(write.frame.bytes()) {
                log::error!("pid {}: write-back during teardown failed: {}", space.pid(), e);
            }
        }
    }

    /// 把 `range` 内脏的驻留映射页写回文件并清除脏位
    ///
    /// 页内容在帧表锁内复制出来，写文件时不持有帧表锁。
    pub fn sync_range(&self, space: &Arc<AddressSpace>, range: VpnRange) -> VmResult<()> {
        let pd = space.page_dir();
        let mut pending = Vec::new();
        {
            let inner = self.inner.lock();
            let spt = space.spt().lock();
            for vpn in range {
                let Some(desc) = spt.get(vpn) else {
                    continue;
                };
                let Backing::Mmap { region, .. } = &desc.backing else {
                    continue;
                };
                if !desc.is_resident() || !pd.is_dirty(vpn) {
                    continue;
                }
                let Some(idx) = pd.translate(vpn).and_then(|ppn| inner.position(ppn)) else {
                    continue;
                };
                pending.push((vpn, region.clone(), inner.entries[idx].frame.bytes().to_vec()));
                pd.set_dirty(vpn, false);
            }
        }
        let mut result = Ok(());
        for (vpn, region, bytes) in pending {
            if let Err(e) = region.write_back(&bytes) {
                pd.set_dirty(vpn, true);
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        result
    }

    /// 查找 `space` 的 `vpn` 当前占用的帧
    pub fn lookup(&self, space: &Arc<AddressSpace>, vpn: Vpn) -> Option<Ppn> {
        self.inner
            .lock()
            .entries
            .iter()
            .find(|e| e.vpn == vpn && e.owned_by(space))
            .map(|e| e.frame.ppn())
    }

    /// `space` 占用的帧数
    pub fn frames_of(&self, space: &Arc<AddressSpace>) -> usize {
        self.inner
            .lock()
            .entries
            .iter()
            .filter(|e| e.owned_by(space))
            .count()
    }

    /// 帧表条目数
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// 帧表是否为空
    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// 钉住的帧数
    pub fn pinned_count(&self) -> usize {
        self.inner.lock().entries.iter().filter(|e| e.pinned).count()
    }

    /// 累计换出次数
    pub fn evictions(&self) -> usize {
        self.evictions.load(Ordering::Relaxed)
    }
}
