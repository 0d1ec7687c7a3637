//! 错误码定义
//!
//! 系统调用返回负的错误码，这里只保留虚拟内存路径会用到的部分。

pub const EPERM: isize = 1;
pub const ENOENT: isize = 2;
pub const EIO: isize = 5;
pub const EBADF: isize = 9;
pub const ENOMEM: isize = 12;
pub const EACCES: isize = 13;
pub const EFAULT: isize = 14;
pub const EEXIST: isize = 17;
pub const ENODEV: isize = 19;
pub const EINVAL: isize = 22;
pub const ENOSPC: isize = 28;
