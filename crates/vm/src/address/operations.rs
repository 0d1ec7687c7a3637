//! 地址通用操作

use crate::config::PAGE_SIZE;

/// 与 usize 之间的相互转换
pub trait UsizeConvert: Copy {
    /// 转换为 usize
    fn as_usize(&self) -> usize;
    /// 从 usize 构造
    fn from_usize(value: usize) -> Self;
}

/// 地址对齐操作
pub trait AlignOps: UsizeConvert {
    /// 向下对齐到页边界
    fn align_down_to_page(self) -> Self {
        Self::from_usize(self.as_usize() & !(PAGE_SIZE - 1))
    }

    /// 向上对齐到页边界
    ///
    /// 在地址空间顶端附近会回绕，调用者需保证不会越界。
    fn align_up_to_page(self) -> Self {
        Self::from_usize((self.as_usize() + PAGE_SIZE - 1) & !(PAGE_SIZE - 1))
    }

    /// 是否页对齐
    fn is_page_aligned(self) -> bool {
        self.as_usize() & (PAGE_SIZE - 1) == 0
    }

    /// 页内偏移
    fn page_offset(self) -> usize {
        self.as_usize() & (PAGE_SIZE - 1)
    }
}
