//! 文件接口 trait 定义
//!
//! 文件系统是外部协作者；虚拟内存只通过此 trait 读取可执行文件段、
//! 以及读写内存映射文件的内容。

use alloc::sync::Arc;

/// 可用于按需分页的文件接口
pub trait VmFile: Send + Sync {
    /// 从指定偏移读取数据到缓冲区，返回实际读取的字节数
    fn read_at(&self, offset: usize, buf: &mut [u8]) -> Result<usize, isize>;

    /// 将缓冲区数据写入指定偏移，返回实际写入的字节数
    fn write_at(&self, offset: usize, buf: &[u8]) -> Result<usize, isize>;

    /// 文件长度（字节）
    fn len(&self) -> usize;

    /// 文件是否为空
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 在同一 inode 上打开一个独立的句柄
    fn reopen(&self) -> Option<Arc<dyn VmFile>>;

    /// 关闭句柄
    fn close(&self);

    /// 是否是控制台/键盘
    fn is_console(&self) -> bool {
        false
    }
}
