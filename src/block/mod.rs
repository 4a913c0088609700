//! 磁盘协作者接口
//!
//! 块缓存在未命中时读盘、在显式写回时写盘，具体传输由内核的磁盘驱动完成
//! （例如 virtio-blk）。驱动通过实现 [`DiskDriver`] 接入缓存。

mod device;

pub use device::DiskDriver;
