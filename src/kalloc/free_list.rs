//! 每核空闲页链表
//!
//! 空闲页把自己的前几个字节解释为指向下一个空闲页的链接，
//! 分配出去之后不保留任何元数据。

use core::ptr::NonNull;

use crate::types::PhysAddr;

/// 空闲页头部
#[repr(C)]
struct Run {
    next: Option<NonNull<Run>>,
}

/// 单向 LIFO 空闲链表
///
/// 对应 xv6 `kmem[i].freelist`，由所属 CPU 的自旋锁保护。
pub(crate) struct FreeList {
    head: Option<NonNull<Run>>,
    len: usize,
}

// SAFETY: 链表中的页归分配器独占，链表只在自旋锁保护下访问
unsafe impl Send for FreeList {}

impl FreeList {
    /// 创建空链表
    pub const fn new() -> Self {
        Self { head: None, len: 0 }
    }

    /// 压入一页
    ///
    /// # Safety
    ///
    /// `page` 必须页对齐、可写、至少 `PGSIZE` 字节，且由调用者独占，
    /// 不在任何空闲链表中。
    pub unsafe fn push(&mut self, page: PhysAddr) {
        let run = page.as_mut_ptr().cast::<Run>();
        // SAFETY: 由调用者保证 page 可写且独占
        unsafe { run.write(Run { next: self.head }) };
        self.head = NonNull::new(run);
        self.len += 1;
    }

    /// 弹出最近压入的一页
    pub fn pop(&mut self) -> Option<PhysAddr> {
        let run = self.head?;
        // SAFETY: 链表中的每一页都由 push 写入了合法的 Run
        self.head = unsafe { run.as_ref().next };
        self.len -= 1;
        Some(PhysAddr(run.as_ptr() as usize))
    }

    /// 空闲页数
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }
}
