//! 进程接口 trait 定义
//!
//! 进程与线程的生命周期由内核管理，虚拟内存只需要知道当前进程是谁、
//! 它的地址空间、用户栈指针、打开的文件，以及一个终止进程的出口。

use crate::file::VmFile;
use crate::memory_space::AddressSpace;
use alloc::sync::Arc;

/// 发生缺页或系统调用的进程上下文
pub trait TaskContext {
    /// 进程标识
    fn pid(&self) -> usize;

    /// 进程的地址空间
    fn address_space(&self) -> &Arc<AddressSpace>;

    /// 进入内核时保存的用户栈指针
    fn user_sp(&self) -> usize;

    /// 按文件描述符查找打开的文件
    fn file(&self, fd: i32) -> Option<Arc<dyn VmFile>>;

    /// 以给定状态终止进程
    fn terminate(&self, status: i32);
}
