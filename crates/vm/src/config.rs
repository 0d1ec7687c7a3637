//! 虚拟内存配置 trait 定义和注册

use core::sync::atomic::{AtomicUsize, Ordering};

/// 页大小（帧大小与之相同）
pub const PAGE_SIZE: usize = 4096;

/// 页内偏移位数
pub const PAGE_SHIFT: usize = 12;

/// 虚拟内存配置常量
///
/// 此 trait 提供虚拟内存管理所需的布局常量。
/// 内核可以实现此 trait 并注册；未注册时使用 [`DefaultVmConfig`]。
pub trait VmConfig: Send + Sync {
    /// 用户地址空间上界（不包含），即内核空间起点
    fn user_top(&self) -> usize;

    /// 用户栈顶地址
    fn user_stack_top(&self) -> usize {
        self.user_top()
    }

    /// 用户栈最大大小
    fn max_stack_size(&self) -> usize {
        8 * 1024 * 1024
    }

    /// 栈增长时允许访问到栈指针以下的最大距离（字节）
    ///
    /// 对应 PUSHA 一次压栈 32 字节的最坏情况。
    fn stack_slack(&self) -> usize {
        32
    }
}

/// 默认配置：3GiB 用户空间，8MiB 栈
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultVmConfig;

impl VmConfig for DefaultVmConfig {
    fn user_top(&self) -> usize {
        0xC000_0000
    }
}

static DEFAULT_CONFIG: DefaultVmConfig = DefaultVmConfig;

static CONFIG_DATA: AtomicUsize = AtomicUsize::new(0);
static CONFIG_VTABLE: AtomicUsize = AtomicUsize::new(0);

/// 注册配置实现
///
/// # Safety
/// 必须在单线程环境下调用，且只能调用一次
pub unsafe fn register_config(config: &'static dyn VmConfig) {
    let ptr = config as *const dyn VmConfig;
    // SAFETY: 将 fat pointer 拆分为 data 和 vtable 两部分存储
    let (data, vtable) =
        unsafe { core::mem::transmute::<*const dyn VmConfig, (usize, usize)>(ptr) };
    CONFIG_DATA.store(data, Ordering::Release);
    CONFIG_VTABLE.store(vtable, Ordering::Release);
}

/// 获取已注册的配置实现，未注册时返回默认配置
#[inline]
pub fn vm_config() -> &'static dyn VmConfig {
    let data = CONFIG_DATA.load(Ordering::Acquire);
    let vtable = CONFIG_VTABLE.load(Ordering::Acquire);
    if data == 0 {
        return &DEFAULT_CONFIG;
    }
    // SAFETY: 重组 fat pointer
    unsafe { &*core::mem::transmute::<(usize, usize), *const dyn VmConfig>((data, vtable)) }
}
