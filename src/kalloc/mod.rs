//! 物理页分配器模块
//!
//! 每个 CPU 维护一条空闲页链表，减少多核分配时的锁竞争。
//!
//! # 主要组件
//!
//! - [`PageAllocator`] - 每核空闲链表 + 跨核借页
//! - `FreeList` - 嵌入在空闲页自身中的单向 LIFO 链表
//!
//! # 策略
//!
//! - **初始化**：把可用物理范围按页平均分给各 CPU，最后一个 CPU 吸收余数
//! - **分配**：先取本核链表；为空时按 CPU 编号顺序向其他核借；全部为空返回 `None`
//! - **释放**：压回调用者**当前**所在 CPU 的链表，不追踪页最初属于哪个核
//!
//! 释放导致的跨核不均衡是可以接受的，借页机制会在需要时把它抹平。
//!
//! # 调试填充
//!
//! | 时机 | 填充字节                       | 暴露的问题         |
//! |------|--------------------------------|--------------------|
//! | 分配 | [`ALLOC_JUNK`](crate::consts::ALLOC_JUNK) | 依赖未初始化内容 |
//! | 释放 | [`FREE_JUNK`](crate::consts::FREE_JUNK)   | 释放后继续使用   |

mod allocator;
mod free_list;

pub use allocator::PageAllocator;
