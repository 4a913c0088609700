//! 公共数据类型
//!
//! 块缓存与页分配器共享的小型强类型包装。

use core::fmt;

use crate::consts::PGSIZE;

/// 块缓存键：`(设备号, 块号)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockKey {
    /// 设备号
    pub dev: u32,
    /// 块号
    pub blockno: u32,
}

impl BlockKey {
    /// 创建新的键
    pub const fn new(dev: u32, blockno: u32) -> Self {
        Self { dev, blockno }
    }

    /// 该键散列到的桶下标（块号对桶数取模）
    #[inline]
    pub const fn bucket(&self, nbucket: usize) -> usize {
        self.blockno as usize % nbucket
    }
}

impl fmt::Display for BlockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.dev, self.blockno)
    }
}

/// 缓存槽编号，即槽在槽池中的下标
///
/// 槽在内核生命周期内不会被创建或销毁，因此编号可以长期持有（例如日志层 pin 住的块）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(pub(crate) u16);

impl SlotId {
    /// 槽池下标
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// 物理地址
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct PhysAddr(pub usize);

impl PhysAddr {
    /// 向上对齐到页边界
    #[inline]
    pub const fn page_round_up(self) -> Self {
        Self((self.0 + PGSIZE - 1) & !(PGSIZE - 1))
    }

    /// 向下对齐到页边界
    #[inline]
    pub const fn page_round_down(self) -> Self {
        Self(self.0 & !(PGSIZE - 1))
    }

    /// 是否页对齐
    #[inline]
    pub const fn is_page_aligned(self) -> bool {
        self.0 % PGSIZE == 0
    }

    /// 地址数值
    #[inline]
    pub const fn as_usize(self) -> usize {
        self.0
    }

    /// 作为可写指针
    ///
    /// 物理内存在本内核中是恒等映射的。
    #[inline]
    pub const fn as_mut_ptr(self) -> *mut u8 {
        self.0 as *mut u8
    }
}

impl fmt::Debug for PhysAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PhysAddr({:#x})", self.0)
    }
}
