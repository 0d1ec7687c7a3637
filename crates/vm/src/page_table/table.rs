//! 页目录接口
//!
//! ## 设计要点
//!
//! - `PageDirectory` 由内核按架构实现（例如 x86 的两级页目录）。
//! - 上层（补充页表、帧表、换出逻辑）只依赖该 trait，
//!   从而实现"按需分页逻辑"与"页表硬件细节"的解耦。
//! - 所有方法都只需要 `&self`：换出时会在其他进程的线程上修改本页目录，
//!   实现者负责自身的内部同步；帧表锁保证同一页不会被并发地安装和清除。
use super::{PagingResult, PteFlags};
use crate::address::{Ppn, Vpn};

/// 页目录接口
pub trait PageDirectory: Send + Sync {
    /// 安装 `vpn -> ppn` 映射
    fn map(&self, vpn: Vpn, ppn: Ppn, flags: PteFlags) -> PagingResult<()>;

    /// 清除映射，之后对该页的访问将触发缺页
    fn unmap(&self, vpn: Vpn) -> PagingResult<()>;

    /// 翻译虚拟页到当前物理帧
    fn translate(&self, vpn: Vpn) -> Option<Ppn>;

    /// 读取页表项标志，未映射时返回 None
    fn flags(&self, vpn: Vpn) -> Option<PteFlags>;

    /// 设置或清除硬件访问位
    fn set_accessed(&self, vpn: Vpn, accessed: bool);

    /// 设置或清除硬件脏位
    fn set_dirty(&self, vpn: Vpn, dirty: bool);

    /// 硬件访问位
    fn is_accessed(&self, vpn: Vpn) -> bool {
        self.flags(vpn)
            .is_some_and(|f| f.contains(PteFlags::ACCESSED))
    }

    /// 硬件脏位
    fn is_dirty(&self, vpn: Vpn) -> bool {
        self.flags(vpn).is_some_and(|f| f.contains(PteFlags::DIRTY))
    }
}
