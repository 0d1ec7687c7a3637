//! 虚拟内存错误类型
//!
//! [`VmError::is_fatal`] 区分两类失败：
//! 致命错误终止出错进程，非致命错误作为系统调用失败返回给用户。

use crate::page_table::PagingError;
use core::fmt;
use uapi::errno;

/// 虚拟内存操作错误
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmError {
    // 地址相关（致命）
    /// 非用户地址、空地址，或既未映射也不允许栈增长
    InvalidAddress,
    /// 写入只读页
    PermissionDenied,

    // 资源耗尽（致命）
    /// 帧池耗尽且无法换出任何帧
    OutOfFrames,
    /// 交换区已满
    SwapFull,
    /// 交换设备读写失败
    Io,

    // 补充页表
    /// 该虚拟页已有页描述符
    AlreadyExists,
    /// 该虚拟页没有页描述符
    NotFound,

    // mmap 参数错误（非致命）
    /// 文件描述符无效或指向控制台
    BadFile,
    /// 地址为空或未页对齐
    Misaligned,
    /// 文件长度为 0
    EmptyFile,
    /// 映射范围与已有页重叠或越界
    Overlap,

    // munmap（致命）
    /// 映射标识符不存在
    UnknownMapping,
}

/// 虚拟内存操作的结果类型
pub type VmResult<T> = Result<T, VmError>;

impl VmError {
    /// 是否应当终止出错进程
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            VmError::BadFile
                | VmError::Misaligned
                | VmError::EmptyFile
                | VmError::Overlap
                | VmError::AlreadyExists
                | VmError::NotFound
        )
    }

    /// 转换为系统调用错误码（负数）
    pub fn to_errno(&self) -> isize {
        -match self {
            VmError::InvalidAddress => errno::EFAULT,
            VmError::PermissionDenied => errno::EACCES,
            VmError::OutOfFrames => errno::ENOMEM,
            VmError::SwapFull => errno::ENOSPC,
            VmError::Io => errno::EIO,
            VmError::AlreadyExists => errno::EEXIST,
            VmError::NotFound => errno::ENOENT,
            VmError::BadFile => errno::EBADF,
            VmError::Misaligned => errno::EINVAL,
            VmError::EmptyFile => errno::ENODEV,
            VmError::Overlap => errno::EINVAL,
            VmError::UnknownMapping => errno::EINVAL,
        }
    }
}

impl From<PagingError> for VmError {
    fn from(err: PagingError) -> Self {
        match err {
            PagingError::NotMapped | PagingError::InvalidAddress => VmError::InvalidAddress,
            PagingError::AlreadyMapped => VmError::AlreadyExists,
            PagingError::OutOfMemory => VmError::OutOfFrames,
        }
    }
}

impl fmt::Display for VmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            VmError::InvalidAddress => "invalid user address",
            VmError::PermissionDenied => "write to read-only page",
            VmError::OutOfFrames => "no frame available",
            VmError::SwapFull => "swap device full",
            VmError::Io => "swap device I/O error",
            VmError::AlreadyExists => "page already present",
            VmError::NotFound => "page not present",
            VmError::BadFile => "bad file descriptor",
            VmError::Misaligned => "address null or not page aligned",
            VmError::EmptyFile => "file is empty",
            VmError::Overlap => "mapping overlaps existing pages",
            VmError::UnknownMapping => "unknown mapping id",
        };
        f.write_str(msg)
    }
}
