//! 地址模块
//!
//! 此模块提供了用于处理物理地址和虚拟地址，
//! 以及虚拟内存系统中的页码的抽象。
//!
//! # 地址类型
//!
//! - [`Paddr`] - 物理地址类型
//! - [`Vaddr`] - 虚拟地址类型（用户地址或内核直接映射地址）
//! - [`ConvertablePaddr`] - 将物理地址转换为内核可访问的虚拟地址的 Trait
//!
//! # 页码
//!
//! - [`PageNum`] - 表示页码的 Trait
//! - [`Ppn`] - 物理页码（即帧号）
//! - [`Vpn`] - 虚拟页码，也是补充页表的键
//!
//! # 页码范围
//!
//! - [`VpnRange`] / [`PpnRange`] - 半开区间 `[start, end)`
//!
//! # 操作
//!
//! - [`UsizeConvert`] - 在类型和 usize 之间进行转换
//! - [`AlignOps`] - 地址对齐操作
pub mod operations;
pub mod page_num;
pub mod types;

pub use operations::{AlignOps, UsizeConvert};
pub use page_num::{PageNum, Ppn, PpnRange, Vpn, VpnRange};
pub use types::{ConvertablePaddr, Paddr, Vaddr};
