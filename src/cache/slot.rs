//! 缓存槽结构
//!
//! 对应 xv6 的 `struct buf`

use alloc::boxed::Box;
use alloc::vec;
use core::sync::atomic::{AtomicU16, AtomicU32, AtomicU64, AtomicU8, Ordering};

use bitflags::bitflags;

use crate::error::fatal;
use crate::sync::SleepLock;
use crate::types::BlockKey;

bitflags! {
    /// 缓存槽标志
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SlotFlags: u8 {
        /// 内容与磁盘一致（已从磁盘读入）
        const VALID = 0x01;
    }
}

/// 链表哨兵：表示桶头
pub(crate) const LINK_HEAD: u16 = u16::MAX;

/// 链表哨兵：不在任何桶中
pub(crate) const LINK_DETACHED: u16 = u16::MAX - 1;

/// 缓存槽
///
/// 槽在启动时一次性分配，此后只会被重新绑定到新的 `(dev, blockno)`，不会被释放。
///
/// # 同步规则
///
/// 元数据字段以原子变量存储，但它们的**修改**仍遵守锁规则：
///
/// | 字段                    | 修改时持有                         |
/// |-------------------------|------------------------------------|
/// | `dev` / `blockno`       | 升级锁 + 所属桶锁，且 `refcnt == 0` |
/// | `refcnt`                | 所属桶锁，或升级锁（pin/unpin）     |
/// | `last_used`             | 所属桶锁                           |
/// | `prev` / `next`         | 所属桶锁                           |
/// | `flags`                 | 内容锁，或升级锁 + 桶锁（重新绑定） |
/// | 内容                    | 内容锁                             |
///
/// 锁本身提供了必要的内存序，因此原子操作统一使用 `Relaxed`。
pub(crate) struct Slot {
    dev: AtomicU32,
    blockno: AtomicU32,
    refcnt: AtomicU32,
    last_used: AtomicU64,
    flags: AtomicU8,
    prev: AtomicU16,
    next: AtomicU16,
    /// 块内容
    pub(super) content: SleepLock<Box<[u8]>>,
}

impl Slot {
    /// 创建新的缓存槽（无效、未引用、未入桶）
    pub fn new(key: BlockKey, block_size: usize) -> Self {
        Self {
            dev: AtomicU32::new(key.dev),
            blockno: AtomicU32::new(key.blockno),
            refcnt: AtomicU32::new(0),
            last_used: AtomicU64::new(0),
            flags: AtomicU8::new(SlotFlags::empty().bits()),
            prev: AtomicU16::new(LINK_DETACHED),
            next: AtomicU16::new(LINK_DETACHED),
            content: SleepLock::new(vec![0u8; block_size].into_boxed_slice(), "buffer"),
        }
    }

    /// 当前绑定的键
    #[inline]
    pub fn key(&self) -> BlockKey {
        BlockKey::new(
            self.dev.load(Ordering::Relaxed),
            self.blockno.load(Ordering::Relaxed),
        )
    }

    /// 重新绑定到新键：标记无效，引用计数置 1，时间戳清零
    ///
    /// 调用者持有升级锁和目标桶锁，且该槽的引用计数为 0。
    pub fn reassign(&self, key: BlockKey) {
        debug_assert_eq!(self.refcnt(), 0);
        self.dev.store(key.dev, Ordering::Relaxed);
        self.blockno.store(key.blockno, Ordering::Relaxed);
        self.flags.store(SlotFlags::empty().bits(), Ordering::Relaxed);
        self.last_used.store(0, Ordering::Relaxed);
        self.refcnt.store(1, Ordering::Relaxed);
    }

    /// 引用计数
    #[inline]
    pub fn refcnt(&self) -> u32 {
        self.refcnt.load(Ordering::Relaxed)
    }

    /// 增加引用计数
    #[inline]
    pub fn get(&self) {
        self.refcnt.fetch_add(1, Ordering::Relaxed);
    }

    /// 减少引用计数，返回减少后的值
    pub fn put(&self) -> u32 {
        let prev = self.refcnt.fetch_sub(1, Ordering::Relaxed);
        if prev == 0 {
            self.refcnt.store(0, Ordering::Relaxed);
            fatal("buffer refcnt underflow");
        }
        prev - 1
    }

    /// 最近一次释放时的时钟滴答（0 表示从未释放或刚被驱逐）
    #[inline]
    pub fn last_used(&self) -> u64 {
        self.last_used.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn set_last_used(&self, ticks: u64) {
        self.last_used.store(ticks, Ordering::Relaxed);
    }

    /// 是否可以被驱逐
    #[inline]
    pub fn is_evictable(&self) -> bool {
        self.refcnt() == 0
    }

    #[inline]
    pub fn flags(&self) -> SlotFlags {
        SlotFlags::from_bits_truncate(self.flags.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn insert_flags(&self, flags: SlotFlags) {
        self.flags.fetch_or(flags.bits(), Ordering::Relaxed);
    }

    /// 内容是否有效
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.flags().contains(SlotFlags::VALID)
    }

    #[inline]
    pub(super) fn link(&self, prev: u16, next: u16) {
        self.prev.store(prev, Ordering::Relaxed);
        self.next.store(next, Ordering::Relaxed);
    }

    #[inline]
    pub(super) fn prev(&self) -> u16 {
        self.prev.load(Ordering::Relaxed)
    }

    #[inline]
    pub(super) fn next(&self) -> u16 {
        self.next.load(Ordering::Relaxed)
    }

    /// 是否挂在某个桶中
    #[inline]
    pub fn is_linked(&self) -> bool {
        self.prev() != LINK_DETACHED
    }
}

impl core::fmt::Debug for Slot {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Slot")
            .field("key", &self.key())
            .field("refcnt", &self.refcnt())
            .field("last_used", &self.last_used())
            .field("flags", &self.flags())
            .field("content", &self.content)
            .finish()
    }
}
