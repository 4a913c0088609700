//! 块缓存模块
//!
//! 这个模块提供了多核共享的磁盘块缓存，对应 xv6 的 `bcache`。
//!
//! # 主要组件
//!
//! - [`BlockCache`] - 块缓存管理器：槽池 + 哈希桶 + 升级锁
//! - [`SlotGuard`] - 持有内容锁的缓存槽，drop 时释放
//! - [`SlotFlags`] - 缓存槽状态标志
//! - [`CacheConfig`] - 槽数、桶数、块大小
//! - [`CacheStats`] - 缓存统计信息
//!
//! # 设计原理
//!
//! 1. **分桶**：按 `blockno % nbucket` 把槽分进若干桶，每个桶一把自旋锁，
//!    命中路径只碰一个桶
//! 2. **升级锁**：未命中时先取全局升级锁，再二次检查、驱逐或跨桶迁移
//! 3. **LRU**：槽在引用计数归零时记录时钟滴答，驱逐时选最小者
//! 4. **内容锁**：每个槽一把睡眠锁，保证同一时刻只有一个线程读写内容
//!
//! # 与 xv6 的对应关系
//!
//! | xv6 C                    | lwkern_core                         |
//! |--------------------------|-------------------------------------|
//! | `struct buf`             | `Slot` + [`SlotGuard`]              |
//! | `bcache.bucket[i]`       | `spin::Mutex<BucketRing>`           |
//! | `bcache.lock`            | 升级锁 `spin::Mutex<()>`             |
//! | `binit()`                | [`BlockCache::new()`]               |
//! | `bread()`                | [`BlockCache::read()`]              |
//! | `bwrite()`               | [`SlotGuard::write()`]              |
//! | `brelse()`               | [`SlotGuard::release()`] / `Drop`   |
//! | `bpin()` / `bunpin()`    | [`BlockCache::pin()`] / [`BlockCache::unpin()`] |
//!
//! # 使用示例
//!
//! ```rust,ignore
//! use lwkern_core::cache::{BlockCache, CacheConfig};
//!
//! let bcache = BlockCache::new(CacheConfig::default(), disk, hal)?;
//!
//! let mut buf = bcache.read(1, 33);
//! buf.data_mut()[0] = 42;
//! buf.write();
//!
//! // 日志层在提交前 pin 住块
//! bcache.pin(buf.id());
//! drop(buf);
//! ```
//!
//! # 局限
//!
//! 没有超时、取消或背压：所有槽都被引用时再出现未命中会直接终止内核。

mod block_cache;
mod bucket;
mod slot;

pub use block_cache::{BlockCache, CacheConfig, CacheStats, SlotGuard};
pub use slot::SlotFlags;
