//! 块缓存实现
//!
//! 对应 xv6 的 `bcache`（`bget` / `bread` / `bwrite` / `brelse` / `bpin` / `bunpin`）
//!
//! # 架构
//!
//! ```text
//! struct BlockCache {
//!     slots:   [Slot; nbuf],                     // 槽池，启动时分配，永不增减
//!     buckets: [spin::Mutex<BucketRing>; nbucket], // 按 blockno % nbucket 分桶
//!     lock:    spin::Mutex<()>,                  // 升级锁，只在未命中路径上获取
//!     ...
//! }
//! ```
//!
//! # 锁顺序
//!
//! 升级锁 → 目标桶锁 → （至多一个）其他桶锁，从不反向获取。
//! 升级锁保证同一时刻只有一个调用者处于未命中路径，
//! 因此同时持有两把桶锁是安全的。
//! 命中路径不取升级锁，并且任何时刻只持有一把锁。
//!
//! 任何自旋锁都不会跨越内容锁的阻塞获取或磁盘 I/O 持有。

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, Ordering};

use crate::block::DiskDriver;
use crate::consts::{BSIZE, NBUCKET, NBUF, NO_DEVICE};
use crate::error::{fatal, Error, ErrorKind, Result};
use crate::hal::KernelHal;
use crate::sync::SleepLockGuard;
use crate::types::{BlockKey, SlotId};

use super::bucket::BucketRing;
use super::slot::{Slot, SlotFlags, LINK_DETACHED};

/// 块缓存配置
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    /// 缓存槽数量
    pub nbuf: usize,
    /// 哈希桶数量
    pub nbucket: usize,
    /// 块大小（字节）
    pub block_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            nbuf: NBUF,
            nbucket: NBUCKET,
            block_size: BSIZE,
        }
    }
}

impl CacheConfig {
    fn validate(&self) -> Result<()> {
        if self.nbuf == 0 {
            return Err(Error::new(ErrorKind::InvalidInput, "Cache needs at least one slot"));
        }
        if self.nbuf >= LINK_DETACHED as usize {
            return Err(Error::new(ErrorKind::InvalidInput, "Too many cache slots"));
        }
        if self.nbucket == 0 {
            return Err(Error::new(ErrorKind::InvalidInput, "Cache needs at least one bucket"));
        }
        if self.block_size == 0 {
            return Err(Error::new(ErrorKind::InvalidInput, "Block size must be non-zero"));
        }
        Ok(())
    }
}

/// 缓存统计信息
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// 总访问次数
    pub total_accesses: u64,
    /// 缓存命中次数（含未命中路径上的二次检查命中）
    pub hits: u64,
    /// 缓存未命中次数
    pub misses: u64,
    /// 在目标桶内完成的驱逐次数
    pub local_evictions: u64,
    /// 从其他桶迁移槽的次数
    pub steals: u64,
    /// 磁盘读取次数
    pub disk_reads: u64,
    /// 磁盘写入次数
    pub disk_writes: u64,
}

impl CacheStats {
    /// 计算命中率
    pub fn hit_rate(&self) -> f64 {
        if self.total_accesses == 0 {
            0.0
        } else {
            self.hits as f64 / self.total_accesses as f64
        }
    }
}

#[derive(Default)]
struct StatCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    local_evictions: AtomicU64,
    steals: AtomicU64,
    disk_reads: AtomicU64,
    disk_writes: AtomicU64,
}

impl StatCounters {
    #[inline]
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        CacheStats {
            total_accesses: hits + misses,
            hits,
            misses,
            local_evictions: self.local_evictions.load(Ordering::Relaxed),
            steals: self.steals.load(Ordering::Relaxed),
            disk_reads: self.disk_reads.load(Ordering::Relaxed),
            disk_writes: self.disk_writes.load(Ordering::Relaxed),
        }
    }
}

/// 块缓存
///
/// 读穿透 / 写穿透的磁盘块缓存，被多个核上的内核线程共享。
/// 启动时构造一次，以共享引用（或 `Arc`）传给所有调用点。
///
/// # 使用示例
///
/// ```rust,ignore
/// let bcache = BlockCache::new(CacheConfig::default(), virtio_disk, hal)?;
///
/// let mut buf = bcache.read(ROOTDEV, 5);
/// buf.data_mut()[0] = 0x42;
/// buf.write();
/// buf.release();
/// ```
pub struct BlockCache<D: DiskDriver, H: KernelHal> {
    slots: Box<[Slot]>,
    buckets: Box<[spin::Mutex<BucketRing>]>,
    /// 升级锁：串行化所有未命中路径，以及 pin / unpin
    lock: spin::Mutex<()>,
    block_size: usize,
    disk: D,
    hal: H,
    stats: StatCounters,
}

impl<D: DiskDriver, H: KernelHal> BlockCache<D, H> {
    /// 创建块缓存
    ///
    /// 对应 xv6 的 `binit()`：槽 `i` 初始绑定到 `(NO_DEVICE, i)`，
    /// 挂入桶 `i % nbucket`。
    pub fn new(config: CacheConfig, disk: D, hal: H) -> Result<Self> {
        config.validate()?;

        let slots: Box<[Slot]> = (0..config.nbuf)
            .map(|i| Slot::new(BlockKey::new(NO_DEVICE, i as u32), config.block_size))
            .collect();
        let mut rings: Vec<BucketRing> = (0..config.nbucket).map(|_| BucketRing::new()).collect();
        for i in 0..config.nbuf {
            let id = SlotId(i as u16);
            let bucket = slots[i].key().bucket(config.nbucket);
            rings[bucket].insert_head(&slots, id);
        }
        let buckets = rings.into_iter().map(spin::Mutex::new).collect();

        log::info!(
            "[BCACHE] init: {} slots x {} bytes, {} buckets",
            config.nbuf,
            config.block_size,
            config.nbucket
        );

        Ok(Self {
            slots,
            buckets,
            lock: spin::Mutex::new(()),
            block_size: config.block_size,
            disk,
            hal,
            stats: StatCounters::default(),
        })
    }

    #[inline]
    fn slot(&self, id: SlotId) -> &Slot {
        &self.slots[id.index()]
    }

    #[inline]
    fn bucket_of(&self, key: BlockKey) -> usize {
        key.bucket(self.buckets.len())
    }

    /// 获取绑定到 `key` 的槽，返回时已持有其内容锁
    ///
    /// 对应 xv6 的 `bget()`。内容可能无效，需要调用者决定是否读盘。
    fn get(&self, key: BlockKey) -> SlotGuard<'_, D, H> {
        let idx = self.bucket_of(key);

        // 乐观查找：只取目标桶锁
        {
            let ring = self.buckets[idx].lock();
            if let Some(id) = ring.find(&self.slots, key) {
                self.slot(id).get();
                drop(ring);
                StatCounters::bump(&self.stats.hits);
                log::trace!("[BCACHE] get {} HIT slot={}", key, id.0);
                return self.lock_slot(id, key);
            }
        }

        // 未命中：升级锁 → 目标桶锁，重新检查
        let escalation = self.lock.lock();
        let mut ring = self.buckets[idx].lock();
        if let Some(id) = ring.find(&self.slots, key) {
            self.slot(id).get();
            drop(ring);
            drop(escalation);
            StatCounters::bump(&self.stats.hits);
            log::trace!("[BCACHE] get {} HIT on recheck slot={}", key, id.0);
            return self.lock_slot(id, key);
        }
        StatCounters::bump(&self.stats.misses);

        // 目标桶内驱逐
        if let Some(id) = ring.victim(&self.slots) {
            self.slot(id).reassign(key);
            drop(ring);
            drop(escalation);
            StatCounters::bump(&self.stats.local_evictions);
            log::debug!("[BCACHE] get {} MISS, evicted slot={} in bucket {}", key, id.0, idx);
            return self.lock_slot(id, key);
        }

        // 跨桶迁移：目标桶锁全程持有
        for i in (0..self.buckets.len()).filter(|&i| i != idx) {
            let mut other = self.buckets[i].lock();
            if let Some(id) = other.victim(&self.slots) {
                let removed = other.remove(&self.slots, id);
                debug_assert!(removed);
                drop(other);
                ring.insert_head(&self.slots, id);
                self.slot(id).reassign(key);
                drop(ring);
                drop(escalation);
                StatCounters::bump(&self.stats.steals);
                log::debug!(
                    "[BCACHE] get {} MISS, stole slot={} from bucket {} into {}",
                    key,
                    id.0,
                    i,
                    idx
                );
                return self.lock_slot(id, key);
            }
        }

        drop(ring);
        drop(escalation);
        log::error!("[BCACHE] all {} slots referenced while looking up {}", self.slots.len(), key);
        fatal("bget: no buffers");
    }

    /// 阻塞获取内容锁（此时不持有任何自旋锁）
    fn lock_slot(&self, id: SlotId, key: BlockKey) -> SlotGuard<'_, D, H> {
        let content = self.slot(id).content.lock(&self.hal);
        SlotGuard {
            cache: self,
            id,
            key,
            content: Some(content),
        }
    }

    /// 读取块，返回持有内容锁的槽
    ///
    /// 对应 xv6 的 `bread()`。槽无效时同步读盘。
    pub fn read(&self, dev: u32, blockno: u32) -> SlotGuard<'_, D, H> {
        let mut guard = self.get(BlockKey::new(dev, blockno));
        if !guard.is_valid() {
            self.fill(&mut guard);
        }
        guard
    }

    fn fill(&self, guard: &mut SlotGuard<'_, D, H>) {
        let slot = self.slot(guard.id);
        let key = guard.key;
        self.disk.read(key, guard.data_mut());
        slot.insert_flags(SlotFlags::VALID);
        StatCounters::bump(&self.stats.disk_reads);
        log::trace!("[BCACHE] disk read {}", key);
    }

    /// 把槽内容写回磁盘，不释放内容锁
    ///
    /// 对应 xv6 的 `bwrite()`。调用者必须持有内容锁。
    pub fn write(&self, guard: &SlotGuard<'_, D, H>) {
        let Some(content) = guard.content.as_ref() else {
            fatal("bwrite");
        };
        if !content.holding() {
            fatal("bwrite");
        }
        self.disk.write(guard.key, &content[..]);
        StatCounters::bump(&self.stats.disk_writes);
        log::trace!("[BCACHE] disk write {}", guard.key);
    }

    /// 释放槽
    ///
    /// 对应 xv6 的 `brelse()`，等价于 drop guard。
    pub fn release(&self, guard: SlotGuard<'_, D, H>) {
        drop(guard);
    }

    /// 先释放内容锁，再在桶锁下递减引用计数；归零时记录当前时钟
    fn release_slot(&self, id: SlotId, key: BlockKey, content: SleepLockGuard<'_, Box<[u8]>, H>) {
        if !content.holding() {
            core::mem::forget(content);
            fatal("brelse");
        }
        drop(content);

        let _ring = self.buckets[self.bucket_of(key)].lock();
        let slot = self.slot(id);
        if slot.put() == 0 {
            slot.set_last_used(self.hal.ticks());
        }
    }

    /// 增加引用计数，阻止驱逐
    ///
    /// 对应 xv6 的 `bpin()`。调用者应当已经持有该槽的另一个引用。
    pub fn pin(&self, id: SlotId) {
        let _escalation = self.lock.lock();
        self.slot(id).get();
    }

    /// 撤销 [`pin`](Self::pin)
    ///
    /// 对应 xv6 的 `bunpin()`
    pub fn unpin(&self, id: SlotId) {
        let _escalation = self.lock.lock();
        self.slot(id).put();
    }

    /// 查找当前绑定到 `key` 的槽，不取内容锁、不修改引用计数
    pub fn lookup(&self, dev: u32, blockno: u32) -> Option<SlotId> {
        let key = BlockKey::new(dev, blockno);
        self.buckets[self.bucket_of(key)].lock().find(&self.slots, key)
    }

    /// 槽的引用计数
    pub fn refcnt(&self, id: SlotId) -> u32 {
        self.slot(id).refcnt()
    }

    /// 槽最近一次释放的时钟
    pub fn last_used(&self, id: SlotId) -> u64 {
        self.slot(id).last_used()
    }

    /// 获取缓存统计信息
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }

    /// 槽总数
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// 桶数
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// 桶 `i` 中的槽数
    pub fn bucket_len(&self, i: usize) -> usize {
        self.buckets[i].lock().len()
    }

    /// 块大小
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// 平台接口
    pub fn hal(&self) -> &H {
        &self.hal
    }
}

impl<D: DiskDriver, H: KernelHal> core::fmt::Debug for BlockCache<D, H> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BlockCache")
            .field("capacity", &self.slots.len())
            .field("buckets", &self.buckets.len())
            .field("block_size", &self.block_size)
            .field("stats", &self.stats.snapshot())
            .finish()
    }
}

/// 持有内容锁的缓存槽
///
/// 由 [`BlockCache::read`] 返回。持有期间当前线程独占该槽内容，
/// 槽的键不会改变。Drop 时等价于 `brelse()`。
///
/// 释放必须发生在获取它的内核线程上，否则视为不变量违例。
pub struct SlotGuard<'a, D: DiskDriver, H: KernelHal> {
    cache: &'a BlockCache<D, H>,
    id: SlotId,
    key: BlockKey,
    content: Option<SleepLockGuard<'a, Box<[u8]>, H>>,
}

impl<D: DiskDriver, H: KernelHal> SlotGuard<'_, D, H> {
    /// 槽编号（可用于 pin / unpin）
    pub fn id(&self) -> SlotId {
        self.id
    }

    /// 绑定的键
    pub fn key(&self) -> BlockKey {
        self.key
    }

    /// 设备号
    pub fn dev(&self) -> u32 {
        self.key.dev
    }

    /// 块号
    pub fn blockno(&self) -> u32 {
        self.key.blockno
    }

    /// 内容是否已从磁盘读入
    pub fn is_valid(&self) -> bool {
        self.cache.slot(self.id).is_valid()
    }

    /// 当前引用计数
    pub fn refcnt(&self) -> u32 {
        self.cache.slot(self.id).refcnt()
    }

    /// 块内容
    pub fn data(&self) -> &[u8] {
        match self.content.as_ref() {
            Some(content) => &content[..],
            None => fatal("buffer used after release"),
        }
    }

    /// 可变块内容
    pub fn data_mut(&mut self) -> &mut [u8] {
        match self.content.as_mut() {
            Some(content) => &mut content[..],
            None => fatal("buffer used after release"),
        }
    }

    /// 写穿透到磁盘
    pub fn write(&self) {
        self.cache.write(self);
    }

    /// 显式释放
    pub fn release(self) {
        drop(self);
    }
}

impl<D: DiskDriver, H: KernelHal> Drop for SlotGuard<'_, D, H> {
    fn drop(&mut self) {
        if let Some(content) = self.content.take() {
            self.cache.release_slot(self.id, self.key, content);
        }
    }
}

impl<D: DiskDriver, H: KernelHal> core::fmt::Debug for SlotGuard<'_, D, H> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SlotGuard")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("slot", self.cache.slot(self.id))
            .finish()
    }
}
