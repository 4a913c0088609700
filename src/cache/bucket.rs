//! 哈希桶
//!
//! 每个桶是一个以槽编号串起来的双向环形链表，链接字段内嵌在槽中
//! （[`Slot`] 的 `prev` / `next`），桶本身只保存头尾。
//! 桶由各自的自旋锁保护，持有该锁才能修改其成员的链接、引用计数和时间戳。

use crate::types::{BlockKey, SlotId};

use super::slot::{Slot, LINK_DETACHED, LINK_HEAD};

/// 桶内环形链表
#[derive(Debug)]
pub(crate) struct BucketRing {
    /// 最近插入的槽
    first: u16,
    /// 最早插入的槽
    last: u16,
    len: usize,
}

impl BucketRing {
    /// 创建空桶
    pub const fn new() -> Self {
        Self {
            first: LINK_HEAD,
            last: LINK_HEAD,
            len: 0,
        }
    }

    /// 成员数
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// 在头部插入
    ///
    /// 对应 xv6 的 `insert_into_bucket()`，O(1)。
    pub fn insert_head(&mut self, slots: &[Slot], id: SlotId) {
        let raw = id.0;
        let slot = &slots[id.index()];
        debug_assert!(!slot.is_linked(), "slot {} already linked", raw);

        let next = self.first;
        slot.link(LINK_HEAD, next);
        if next == LINK_HEAD {
            self.last = raw;
        } else {
            let n = &slots[next as usize];
            n.link(raw, n.next());
        }
        self.first = raw;
        self.len += 1;
    }

    /// 从桶中摘除
    ///
    /// 对应 xv6 的 `remove_from_bucket()`：先线性扫描确认成员关系，
    /// 不在本桶中的槽不做任何修改，返回 `false`。
    pub fn remove(&mut self, slots: &[Slot], id: SlotId) -> bool {
        if !self.iter(slots).any(|member| member == id) {
            return false;
        }

        let slot = &slots[id.index()];
        let (prev, next) = (slot.prev(), slot.next());

        if prev == LINK_HEAD {
            self.first = next;
        } else {
            let p = &slots[prev as usize];
            p.link(p.prev(), next);
        }
        if next == LINK_HEAD {
            self.last = prev;
        } else {
            let n = &slots[next as usize];
            n.link(prev, n.next());
        }

        slot.link(LINK_DETACHED, LINK_DETACHED);
        self.len -= 1;
        true
    }

    /// 从头到尾遍历成员
    pub fn iter<'a>(&self, slots: &'a [Slot]) -> RingIter<'a> {
        RingIter {
            slots,
            cursor: self.first,
        }
    }

    /// 按键查找
    pub fn find(&self, slots: &[Slot], key: BlockKey) -> Option<SlotId> {
        self.iter(slots).find(|id| slots[id.index()].key() == key)
    }

    /// 选择驱逐对象
    ///
    /// 在未被引用的槽中选 `last_used` 最小者；一旦遇到 `last_used == 0`
    /// 的槽立即返回，不再继续扫描。时间戳相同时按扫描顺序取先者。
    pub fn victim(&self, slots: &[Slot]) -> Option<SlotId> {
        let mut best: Option<(SlotId, u64)> = None;
        for id in self.iter(slots) {
            let slot = &slots[id.index()];
            if slot.is_evictable() {
                let ticks = slot.last_used();
                if best.map_or(true, |(_, min)| ticks < min) {
                    best = Some((id, ticks));
                }
            }
            if matches!(best, Some((_, 0))) {
                break;
            }
        }
        best.map(|(id, _)| id)
    }
}

/// 桶成员迭代器
pub(crate) struct RingIter<'a> {
    slots: &'a [Slot],
    cursor: u16,
}

impl Iterator for RingIter<'_> {
    type Item = SlotId;

    fn next(&mut self) -> Option<SlotId> {
        if self.cursor == LINK_HEAD {
            return None;
        }
        let id = SlotId(self.cursor);
        self.cursor = self.slots[id.index()].next();
        Some(id)
    }
}
