//! 内存空间模块
//!
//! 本模块定义了进程的地址空间（补充页表 + 页目录 + 内存映射登记表），
//! 以及内存映射文件的登记与拆除。

mod mmap;
mod space;

pub use mmap::{MmapRecord, MmapRegistry};
pub use space::*;
