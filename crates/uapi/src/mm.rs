//! 内存映射相关定义

/// 内存映射标识符
///
/// 进程内单调递增，从 1 开始；同一进程内不会被复用。
pub type MapId = i32;

/// mmap 失败时返回给用户的值
pub const MAP_FAILED: MapId = -1;

/// 第一个可分配的映射标识符
pub const FIRST_MAP_ID: MapId = 1;

/// 控制台输入的文件描述符
pub const STDIN_FILENO: i32 = 0;
/// 控制台输出的文件描述符
pub const STDOUT_FILENO: i32 = 1;
