//! 页表模块
//!
//! 硬件页表（页目录）由外部协作者维护，本模块定义虚拟内存子系统
//! 使用的接口、页表项标志和错误类型。
mod table;

pub use table::*;

use bitflags::bitflags;

bitflags! {
    /// 用户页表项中虚拟内存子系统关心的标志位
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PteFlags: u8 {
        /// 可写
        const WRITABLE = 1 << 0;
        /// 硬件访问位
        const ACCESSED = 1 << 1;
        /// 硬件脏位
        const DIRTY = 1 << 2;
    }
}

impl PteFlags {
    /// 安装映射时使用的初始标志
    pub fn for_install(writable: bool) -> Self {
        if writable {
            PteFlags::WRITABLE
        } else {
            PteFlags::empty()
        }
    }
}

/// 分页操作中可能发生的错误
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagingError {
    /// 虚拟地址未被映射
    NotMapped,
    /// 虚拟地址已被映射
    AlreadyMapped,
    /// 提供了无效的地址
    InvalidAddress,
    /// 分配页表页时内存耗尽
    OutOfMemory,
}

/// 分页操作的结果类型
pub type PagingResult<T> = Result<T, PagingError>;
