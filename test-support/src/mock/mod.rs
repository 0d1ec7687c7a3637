//! Mock 实现模块
//!
//! 提供架构操作、页目录、文件、交换磁盘和进程的 Mock 实现，用于测试。
//!
//! 这里不依赖 `vm` crate（避免循环依赖），所有 Mock 只提供固有方法；
//! `vm` crate 在 `cfg(test)` 下为这些类型实现其 trait。

pub mod arch;
pub mod device;
pub mod fs;
pub mod mm;
pub mod task;
