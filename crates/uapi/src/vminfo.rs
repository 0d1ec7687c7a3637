//! 虚拟内存统计信息

/// 虚拟内存统计信息结构体
///
/// 由内核填充，描述用户帧池与交换区的占用情况。
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VmInfo {
    /// 用户帧池中的总帧数
    pub total_frames: usize,
    /// 空闲帧数
    pub free_frames: usize,
    /// 帧表中登记的帧数（已分配给用户进程）
    pub resident_pages: usize,
    /// 交换区总槽位数
    pub total_swap_slots: usize,
    /// 已使用的交换槽位数
    pub used_swap_slots: usize,
    /// 累计换出的页数
    pub evictions: usize,
}

impl VmInfo {
    /// 空闲交换槽位数
    pub fn free_swap_slots(&self) -> usize {
        self.total_swap_slots - self.used_swap_slots
    }
}
