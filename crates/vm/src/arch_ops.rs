//! 架构相关内存管理操作 trait 定义和注册

use core::sync::atomic::{AtomicUsize, Ordering};

/// 架构相关内存管理操作
///
/// 虚拟内存子系统只需要通过内核直接映射访问帧内容，
/// 内核需要为具体架构实现此 trait。
pub trait ArchVmOps: Send + Sync {
    /// 将物理地址转换为虚拟地址（直接映射区域）
    fn paddr_to_vaddr(&self, paddr: usize) -> usize;
}

static ARCH_OPS_DATA: AtomicUsize = AtomicUsize::new(0);
static ARCH_OPS_VTABLE: AtomicUsize = AtomicUsize::new(0);

/// 注册架构操作实现
///
/// # Safety
/// 必须在单线程环境下调用，且只能调用一次
pub unsafe fn register_arch_ops(ops: &'static dyn ArchVmOps) {
    let ptr = ops as *const dyn ArchVmOps;
    // SAFETY: 将 fat pointer 拆分为 data 和 vtable 两部分存储
    let (data, vtable) =
        unsafe { core::mem::transmute::<*const dyn ArchVmOps, (usize, usize)>(ptr) };
    ARCH_OPS_DATA.store(data, Ordering::Release);
    ARCH_OPS_VTABLE.store(vtable, Ordering::Release);
}

/// 获取已注册的架构操作实现
///
/// # Panics
/// 如果尚未调用 [`register_arch_ops`] 注册实现，则 panic
#[inline]
pub fn arch_ops() -> &'static dyn ArchVmOps {
    let data = ARCH_OPS_DATA.load(Ordering::Acquire);
    let vtable = ARCH_OPS_VTABLE.load(Ordering::Acquire);
    if data == 0 {
        #[cfg(test)]
        {
            return &test_support::mock::mm::MOCK_MM_OPS;
        }
        #[cfg(not(test))]
        panic!("vm: ArchVmOps not registered");
    }
    // SAFETY: 重组 fat pointer
    unsafe { &*core::mem::transmute::<(usize, usize), *const dyn ArchVmOps>((data, vtable)) }
}

#[cfg(test)]
mod test_mock {
    use super::ArchVmOps;
    use test_support::mock::mm::MockMmOps;

    impl ArchVmOps for MockMmOps {
        fn paddr_to_vaddr(&self, paddr: usize) -> usize {
            MockMmOps::paddr_to_vaddr(self, paddr)
        }
    }

    #[test]
    fn test_arch_ops_fallback_is_identity() {
        assert_eq!(super::arch_ops().paddr_to_vaddr(0x8000_1000), 0x8000_1000);
    }
}
