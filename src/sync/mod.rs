//! 同步原语
//!
//! 两类锁：
//! - 短锁：`spin::Mutex`，忙等，只保护元数据（桶链表、引用计数、空闲链表头）
//! - 长锁：[`SleepLock`]，阻塞等待，保护缓存槽内容，可跨磁盘 I/O 持有
//!
//! 不变量：持有短锁期间绝不执行阻塞获取或磁盘 I/O。

mod sleep_lock;

pub use sleep_lock::{SleepLock, SleepLockGuard};
