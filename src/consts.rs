//! 内核资源常量定义
//!
//! 这个模块包含了块缓存与物理页分配器的所有编译期常量，包括：
//! - 缓存槽数量、哈希桶数量、块大小
//! - 页大小、CPU 数量
//! - 调试填充模式

//=============================================================================
// 块缓存
//=============================================================================

/// 缓存槽总数
pub const NBUF: usize = 30;

/// 哈希桶数量（取质数以减少冲突）
pub const NBUCKET: usize = 13;

/// 磁盘块大小（字节）
pub const BSIZE: usize = 1024;

/// 保留设备号
///
/// 启动时所有缓存槽都绑定到 `(NO_DEVICE, i)`，真实设备不得使用该编号。
pub const NO_DEVICE: u32 = 0x3f3f_3f3f;

//=============================================================================
// 物理页分配器
//=============================================================================

/// 页大小（字节）
pub const PGSIZE: usize = 4096;

/// 最大 CPU 数量
pub const NCPU: usize = 8;

/// 分配页时写入的填充字节，暴露对旧内容的依赖
pub const ALLOC_JUNK: u8 = 0x05;

/// 释放页时写入的填充字节，暴露悬垂引用
pub const FREE_JUNK: u8 = 0x01;
