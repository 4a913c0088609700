//! 磁盘驱动接口

use crate::types::BlockKey;

/// 磁盘驱动接口
///
/// 传输是同步的：返回时数据已经到达缓冲区（读）或磁盘（写）。
/// 缓冲区长度总是等于缓存配置的块大小。
///
/// 传输失败不在缓存的处理范围内：驱动要么保证成功，要么自行停机。
///
/// 驱动会被多个核并发调用，内部需自行串行化对硬件队列的访问，
/// 因此接口使用 `&self`。
///
/// # 示例
///
/// ```rust,ignore
/// use lwkern_core::{BlockKey, DiskDriver};
///
/// struct VirtioDisk {
///     // ...
/// }
///
/// impl DiskDriver for VirtioDisk {
///     fn read(&self, key: BlockKey, buf: &mut [u8]) {
///         self.rw(key.blockno, buf.as_mut_ptr(), false);
///     }
///
///     fn write(&self, key: BlockKey, buf: &[u8]) {
///         self.rw(key.blockno, buf.as_ptr() as *mut u8, true);
///     }
/// }
/// ```
pub trait DiskDriver: Send + Sync {
    /// 把块 `key` 读入 `buf`
    fn read(&self, key: BlockKey, buf: &mut [u8]);

    /// 把 `buf` 写到块 `key`
    fn write(&self, key: BlockKey, buf: &[u8]);
}

impl<D: DiskDriver + ?Sized> DiskDriver for &D {
    fn read(&self, key: BlockKey, buf: &mut [u8]) {
        (**self).read(key, buf)
    }

    fn write(&self, key: BlockKey, buf: &[u8]) {
        (**self).write(key, buf)
    }
}

impl<D: DiskDriver + ?Sized> DiskDriver for alloc::sync::Arc<D> {
    fn read(&self, key: BlockKey, buf: &mut [u8]) {
        (**self).read(key, buf)
    }

    fn write(&self, key: BlockKey, buf: &[u8]) {
        (**self).write(key, buf)
    }
}
