//! 测试辅助：基于 std 线程的平台实现与计数磁盘

use alloc::alloc::{alloc_zeroed, dealloc, Layout};
use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use core::cell::Cell;
use core::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use crate::block::DiskDriver;
use crate::consts::PGSIZE;
use crate::hal::KernelHal;
use crate::types::{BlockKey, PhysAddr};

static NEXT_THREAD_ID: AtomicUsize = AtomicUsize::new(1);

std::thread_local! {
    static THREAD_ID: usize = NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed);
    static CPU_ID: Cell<usize> = const { Cell::new(0) };
}

/// 测试平台
///
/// - 线程标识：每个 std 线程一个
/// - CPU 编号：线程局部，可用 [`TestHal::set_cpu`] 修改
/// - 时钟：手动推进
/// - 睡眠：条件变量 + 代数计数，没有超时，只有 `wakeup` 能让它返回
pub struct TestHal {
    ticks: AtomicU64,
    generation: Mutex<u64>,
    cond: Condvar,
    sleeps: AtomicUsize,
    park_delay: Option<Duration>,
}

impl TestHal {
    pub fn new() -> Self {
        Self {
            ticks: AtomicU64::new(0),
            generation: Mutex::new(0),
            cond: Condvar::new(),
            sleeps: AtomicUsize::new(0),
            park_delay: None,
        }
    }

    /// 释放调用者的锁之后、真正挂起之前停顿，拉长解锁与挂起之间的窗口
    pub fn with_park_delay(mut self, delay: Duration) -> Self {
        self.park_delay = Some(delay);
        self
    }

    /// 进入 `sleep` 的累计次数
    pub fn sleeps(&self) -> usize {
        self.sleeps.load(Ordering::SeqCst)
    }

    /// 设置当前线程所在的 CPU
    pub fn set_cpu(cpu: usize) {
        CPU_ID.with(|c| c.set(cpu));
    }

    /// 推进时钟
    pub fn tick(&self, n: u64) {
        self.ticks.fetch_add(n, Ordering::SeqCst);
    }
}

impl KernelHal for TestHal {
    fn cpu_id(&self) -> usize {
        CPU_ID.with(|c| c.get())
    }

    fn thread_id(&self) -> usize {
        THREAD_ID.with(|id| *id)
    }

    fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::SeqCst)
    }

    fn sleep<F: FnOnce()>(&self, _chan: usize, release: F) {
        // 读取代数即登记：此后任何 wakeup 都会让下面的等待立即返回
        let seen = *self.generation.lock().unwrap();
        self.sleeps.fetch_add(1, Ordering::SeqCst);
        release();
        if let Some(delay) = self.park_delay {
            std::thread::sleep(delay);
        }
        let generation = self.generation.lock().unwrap();
        let _generation = self.cond.wait_while(generation, |g| *g == seen).unwrap();
    }

    fn wakeup(&self, _chan: usize) {
        *self.generation.lock().unwrap() += 1;
        self.cond.notify_all();
    }
}

/// 计数磁盘
///
/// 未写过的块读出 `blockno` 的低字节填充，便于校验内容。
pub struct MockDisk {
    block_size: usize,
    blocks: Mutex<BTreeMap<BlockKey, Vec<u8>>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
    read_delay: Option<Duration>,
}

impl MockDisk {
    pub fn new(block_size: usize) -> Self {
        Self {
            block_size,
            blocks: Mutex::new(BTreeMap::new()),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
            read_delay: None,
        }
    }

    /// 每次读取前休眠，放大并发窗口
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn stored(&self, key: BlockKey) -> Option<Vec<u8>> {
        self.blocks.lock().unwrap().get(&key).cloned()
    }
}

impl DiskDriver for MockDisk {
    fn read(&self, key: BlockKey, buf: &mut [u8]) {
        assert_eq!(buf.len(), self.block_size);
        if let Some(delay) = self.read_delay {
            std::thread::sleep(delay);
        }
        self.reads.fetch_add(1, Ordering::SeqCst);
        match self.blocks.lock().unwrap().get(&key) {
            Some(data) => buf.copy_from_slice(data),
            None => buf.fill(key.blockno as u8),
        }
    }

    fn write(&self, key: BlockKey, buf: &[u8]) {
        assert_eq!(buf.len(), self.block_size);
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.blocks.lock().unwrap().insert(key, buf.to_vec());
    }
}

/// 页对齐的测试内存，充当一段"物理内存"
pub struct PageArena {
    base: *mut u8,
    layout: Layout,
}

impl PageArena {
    pub fn new(pages: usize) -> Self {
        let layout = Layout::from_size_align(pages * PGSIZE, PGSIZE).unwrap();
        let base = unsafe { alloc_zeroed(layout) };
        assert!(!base.is_null());
        Self { base, layout }
    }

    pub fn start(&self) -> PhysAddr {
        PhysAddr(self.base as usize)
    }

    pub fn end(&self) -> PhysAddr {
        PhysAddr(self.base as usize + self.layout.size())
    }

    pub fn page(&self, i: usize) -> PhysAddr {
        assert!(i * PGSIZE < self.layout.size());
        PhysAddr(self.base as usize + i * PGSIZE)
    }

    /// 读取某页的内容
    pub fn bytes(&self, page: PhysAddr) -> &[u8] {
        assert!(page >= self.start() && page < self.end());
        unsafe { core::slice::from_raw_parts(page.as_mut_ptr(), PGSIZE) }
    }
}

impl Drop for PageArena {
    fn drop(&mut self) {
        unsafe { dealloc(self.base, self.layout) };
    }
}

// SAFETY: 测试中各线程只访问自己从分配器拿到的页
unsafe impl Send for PageArena {}
unsafe impl Sync for PageArena {}
