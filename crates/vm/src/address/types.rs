//! 地址类型

use super::operations::{AlignOps, UsizeConvert};
use crate::arch_ops::arch_ops;

macro_rules! impl_address {
    ($type:ident) => {
        impl UsizeConvert for $type {
            fn as_usize(&self) -> usize {
                self.0
            }

            fn from_usize(value: usize) -> Self {
                Self(value)
            }
        }

        impl AlignOps for $type {}

        impl core::ops::Add<usize> for $type {
            type Output = Self;

            fn add(self, rhs: usize) -> Self {
                Self(self.0 + rhs)
            }
        }

        impl core::fmt::LowerHex for $type {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::LowerHex::fmt(&self.0, f)
            }
        }
    };
}

/// 物理地址
#[repr(transparent)]
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Default)]
pub struct Paddr(pub usize);
impl_address!(Paddr);

/// 虚拟地址
#[repr(transparent)]
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Default)]
pub struct Vaddr(pub usize);
impl_address!(Vaddr);

impl Vaddr {
    /// 作为只读指针
    pub fn as_ptr<T>(self) -> *const T {
        self.0 as *const T
    }

    /// 作为可变指针
    pub fn as_mut_ptr<T>(self) -> *mut T {
        self.0 as *mut T
    }
}

/// 可以转换为内核直接映射虚拟地址的物理地址
pub trait ConvertablePaddr {
    /// 通过架构的直接映射转换为内核虚拟地址
    fn to_vaddr(self) -> Vaddr;
}

impl ConvertablePaddr for Paddr {
    fn to_vaddr(self) -> Vaddr {
        Vaddr(arch_ops().paddr_to_vaddr(self.0))
    }
}
