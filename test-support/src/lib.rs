//! 测试支持 crate
//!
//! 提供虚拟内存子系统外部协作者的 Mock 实现和测试工具

#![no_std]

extern crate alloc;

pub mod mock;
