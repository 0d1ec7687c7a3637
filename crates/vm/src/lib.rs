//! 虚拟内存子系统
//!
//! 为每个进程提供按需分页的地址空间：页面来自可执行文件、匿名零页、
//! 交换区或内存映射文件，所有进程共享一个有限的物理帧池。
//!
//! # 组成
//!
//! - [`page`]: 每进程的补充页表，记录页面在驻留之前如何被物化
//! - [`frame_table`]: 全局帧表，时钟算法换出
//! - [`swap`]: 交换槽位图与页粒度读写
//! - [`Vm`]: 缺页处理、栈增长、用户地址校验、内存映射与进程退出
//!
//! # 架构解耦
//!
//! 通过 trait 抽象与内核其他部分解耦：
//! - [`ArchVmOps`]: 物理地址到直接映射虚拟地址的转换
//! - [`VmConfig`]: 用户地址空间布局常量
//! - [`PageDirectory`]、[`VmFile`]、[`BlockDevice`]、[`TaskContext`]: 外部协作者
//!
//! 使用前必须调用 [`register_arch_ops`]；[`register_config`] 可选。
//!
//! # 锁顺序
//!
//! 映射登记表 → 帧表 → 补充页表 → 交换区 → 帧池。

#![cfg_attr(not(test), no_std)]

extern crate alloc;

mod arch_ops;
mod block;
mod config;
mod error;
mod fault;
mod file;
mod manager;
mod mapping;
mod task;
mod uaccess;

pub mod address;
pub mod frame_allocator;
pub mod frame_table;
pub mod memory_space;
pub mod page;
pub mod page_table;
pub mod swap;

#[cfg(test)]
mod tests;

pub use arch_ops::{ArchVmOps, arch_ops, register_arch_ops};
pub use block::BlockDevice;
pub use config::{DefaultVmConfig, PAGE_SHIFT, PAGE_SIZE, VmConfig, register_config, vm_config};
pub use error::{VmError, VmResult};
pub use file::VmFile;
pub use manager::{FATAL_EXIT_STATUS, Vm};
pub use task::TaskContext;

// Re-export 常用类型
pub use address::{AlignOps, PageNum, Paddr, Ppn, PpnRange, UsizeConvert, Vaddr, Vpn, VpnRange};
pub use frame_allocator::{FramePool, FrameTracker};
pub use frame_table::FrameTable;
pub use memory_space::{AddressSpace, MmapRecord, MmapRegistry};
pub use page::{Backing, FileRegion, PageDescriptor, PageFlags, SupplementalPageTable};
pub use page_table::{PageDirectory, PagingError, PagingResult, PteFlags};
pub use swap::{SwapManager, SwapSlot};
