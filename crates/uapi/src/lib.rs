//! 与用户空间共用定义和声明
//!
//! 包含虚拟内存相关系统调用（mmap/munmap）使用的常量、类型和错误码，
//! 确保内核和用户空间的一致性

#![no_std]
#![allow(dead_code)]
// uapi 中的常量大多与错误码一一对应；逐项补 `///` 噪声较大。
#![allow(missing_docs)]

pub mod errno;
pub mod mm;
pub mod vminfo;
