//! 每核物理页分配器
//!
//! 对应 xv6 的 `kinit` / `kalloc` / `kfree`

use alloc::boxed::Box;

use crate::consts::{ALLOC_JUNK, FREE_JUNK, PGSIZE};
use crate::error::{fatal, Error, ErrorKind, Result};
use crate::hal::KernelHal;
use crate::types::PhysAddr;

use super::free_list::FreeList;

/// 物理页分配器
///
/// 每个 CPU 一条空闲链表，各有一把自旋锁。分配优先走本核链表，
/// 本核为空时按编号顺序扫描其他核；释放总是压回**当前**核的链表。
///
/// # 使用示例
///
/// ```rust,ignore
/// // SAFETY: [end, PHYSTOP) 是内核镜像之后的空闲物理内存，只交给分配器管理
/// let kmem = unsafe { PageAllocator::new(PhysAddr(end), PhysAddr(PHYSTOP), NCPU, hal)? };
///
/// let page = kmem.alloc().ok_or(ENOMEM)?;
/// // ...
/// kmem.free(page);
/// ```
pub struct PageAllocator<H: KernelHal> {
    /// 第一个可用页（已向上对齐）
    start: PhysAddr,
    /// 可用范围末端（已向下对齐，不含）
    end: PhysAddr,
    cpus: Box<[spin::Mutex<FreeList>]>,
    hal: H,
}

impl<H: KernelHal> PageAllocator<H> {
    /// 初始化分配器
    ///
    /// 把 `[start, end)` 内的完整页平均分成 `ncpu` 段连续区间，最后一段吸收余数，
    /// 每段用来填充对应 CPU 的空闲链表。所有页都会被写入释放填充模式。
    ///
    /// 启动时调用一次，早于任何 [`alloc`](Self::alloc) / [`free`](Self::free)。
    ///
    /// # Safety
    ///
    /// `[start, end)` 必须是恒等映射、可写的物理内存，并且此后只归分配器管理。
    pub unsafe fn new(start: PhysAddr, end: PhysAddr, ncpu: usize, hal: H) -> Result<Self> {
        if ncpu == 0 {
            return Err(Error::new(ErrorKind::InvalidInput, "Need at least one CPU"));
        }
        if start >= end {
            return Err(Error::new(ErrorKind::InvalidInput, "Empty physical range"));
        }
        let first = start.page_round_up();
        let last = end.page_round_down();
        if first >= last {
            return Err(Error::new(ErrorKind::InvalidInput, "Range holds no whole page"));
        }

        let npages = (last.as_usize() - first.as_usize()) / PGSIZE;
        let share = npages / ncpu;

        let mut lists: alloc::vec::Vec<FreeList> = (0..ncpu).map(|_| FreeList::new()).collect();
        for (cpu, list) in lists.iter_mut().enumerate() {
            let lo = cpu * share;
            let hi = if cpu + 1 == ncpu { npages } else { lo + share };
            for page in lo..hi {
                let pa = PhysAddr(first.as_usize() + page * PGSIZE);
                // SAFETY: pa 在调用者交出的范围内，且每页只压入一次
                unsafe {
                    fill(pa, FREE_JUNK);
                    list.push(pa);
                }
            }
            log::debug!("[KALLOC] cpu {} seeded with {} pages", cpu, hi - lo);
        }

        log::info!(
            "[KALLOC] init: [{:#x}, {:#x}) {} pages across {} cpus",
            first.as_usize(),
            last.as_usize(),
            npages,
            ncpu
        );

        Ok(Self {
            start: first,
            end: last,
            cpus: lists.into_iter().map(spin::Mutex::new).collect(),
            hal,
        })
    }

    /// 当前 CPU 编号
    fn current_cpu(&self) -> usize {
        let cpu = self.hal.cpu_id();
        if cpu >= self.cpus.len() {
            log::error!("[KALLOC] cpu id {} out of range ({} cpus)", cpu, self.cpus.len());
            fatal("kalloc: bad cpu id");
        }
        cpu
    }

    /// 分配一页
    ///
    /// 本核链表为空时按编号顺序向其他核借页；全部为空返回 `None`，
    /// 由调用者处理（这不是致命错误）。返回的页被填充为 [`ALLOC_JUNK`]。
    pub fn alloc(&self) -> Option<PhysAddr> {
        let me = self.current_cpu();
        // 先放掉本核的锁再去碰别的核，任何时刻只持有一把链表锁
        let own = self.cpus[me].lock().pop();
        let page = own.or_else(|| {
            (0..self.cpus.len())
                .filter(|&cpu| cpu != me)
                .find_map(|cpu| {
                    let page = self.cpus[cpu].lock().pop();
                    if page.is_some() {
                        log::trace!("[KALLOC] cpu {} borrowed a page from cpu {}", me, cpu);
                    }
                    page
                })
        });

        match page {
            Some(pa) => {
                // SAFETY: 页刚从空闲链表取出，归调用者独占
                unsafe { fill(pa, ALLOC_JUNK) };
                Some(pa)
            }
            None => {
                log::warn!("[KALLOC] out of memory on cpu {}", me);
                None
            }
        }
    }

    /// 释放一页到当前 CPU 的链表
    ///
    /// 地址必须页对齐并位于管理范围内，否则视为调用者的编程错误，直接终止。
    /// 页内容会先被填充为 [`FREE_JUNK`]。
    pub fn free(&self, pa: PhysAddr) {
        if !pa.is_page_aligned() || !self.contains(pa) {
            log::error!("[KALLOC] bad free of {:?}", pa);
            fatal("kfree");
        }

        // SAFETY: 地址已校验，调用者交还了该页的所有权
        unsafe { fill(pa, FREE_JUNK) };

        let me = self.current_cpu();
        // SAFETY: 同上
        unsafe { self.cpus[me].lock().push(pa) };
    }

    /// 地址是否在管理范围内
    pub fn contains(&self, pa: PhysAddr) -> bool {
        pa >= self.start && pa < self.end
    }

    /// 管理范围 `[start, end)`
    pub fn range(&self) -> (PhysAddr, PhysAddr) {
        (self.start, self.end)
    }

    /// CPU 数量
    pub fn ncpu(&self) -> usize {
        self.cpus.len()
    }

    /// 某个 CPU 链表中的空闲页数
    pub fn free_pages_on(&self, cpu: usize) -> usize {
        self.cpus[cpu].lock().len()
    }

    /// 空闲页总数（逐个加锁统计，并发时只是近似值）
    pub fn free_pages(&self) -> usize {
        (0..self.cpus.len()).map(|cpu| self.free_pages_on(cpu)).sum()
    }
}

impl<H: KernelHal> core::fmt::Debug for PageAllocator<H> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PageAllocator")
            .field("start", &self.start)
            .field("end", &self.end)
            .field("ncpu", &self.cpus.len())
            .field("free_pages", &self.free_pages())
            .finish()
    }
}

/// 用调试模式填充整页
///
/// # Safety
///
/// `pa` 指向一整页可写内存，且调用者独占。
unsafe fn fill(pa: PhysAddr, pattern: u8) {
    // SAFETY: 由调用者保证
    unsafe { core::ptr::write_bytes(pa.as_mut_ptr(), pattern, PGSIZE) };
}
