//! lwkern_core: 教学内核的资源管理核心
//!
//! 这是一个 `no_std` 的 Rust 库，提供多核内核中两类共享资源池的管理：
//! - **块缓存**：读穿透 / 写穿透的磁盘块缓存，分桶加锁，LRU 驱逐
//! - **物理页分配器**：每核空闲页链表，本核为空时跨核借页
//!
//! 两者解决同一个问题：在并发执行的多个核之间，安全、低竞争地共享一组固定的可复用资源。
//!
//! # 示例
//!
//! ```rust,ignore
//! use lwkern_core::{BlockCache, CacheConfig, PageAllocator, PhysAddr, NCPU};
//!
//! // 块缓存
//! let bcache = BlockCache::new(CacheConfig::default(), virtio_disk, hal)?;
//! let buf = bcache.read(ROOTDEV, 1);
//! let magic = u32::from_le_bytes(buf.data()[..4].try_into().unwrap());
//! drop(buf);
//!
//! // 物理页分配器
//! let kmem = unsafe { PageAllocator::new(PhysAddr(kernel_end), PhysAddr(PHYSTOP), NCPU, hal)? };
//! let page = kmem.alloc().expect("out of memory");
//! kmem.free(page);
//! ```
//!
//! # 模块结构
//!
//! - [`error`] - 错误类型定义
//! - [`consts`] - 常量定义
//! - [`types`] - 公共数据类型
//! - [`hal`] - 平台接口
//! - [`sync`] - 睡眠锁
//! - [`block`] - 磁盘驱动接口
//! - [`cache`] - 块缓存
//! - [`kalloc`] - 物理页分配器

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

extern crate alloc;

#[cfg(any(feature = "std", test))]
extern crate std;

// ===== 核心模块 =====

/// 错误处理
pub mod error;

/// 常量定义
pub mod consts;

/// 公共数据类型
pub mod types;

/// 平台接口
pub mod hal;

/// 同步原语
pub mod sync;

/// 磁盘驱动接口
pub mod block;

/// 块缓存
pub mod cache;

/// 物理页分配器
pub mod kalloc;

#[cfg(test)]
pub(crate) mod testing;

// ===== 公共导出 =====

// 错误处理
pub use error::{Error, ErrorKind, Result};

// 常量
pub use consts::{BSIZE, NBUCKET, NBUF, NCPU, PGSIZE};

// 类型
pub use types::{BlockKey, PhysAddr, SlotId};

// 平台
pub use hal::KernelHal;

// 磁盘
pub use block::DiskDriver;

// Cache
pub use cache::{BlockCache, CacheConfig, CacheStats, SlotFlags, SlotGuard};

// 页分配器
pub use kalloc::PageAllocator;
