//! 睡眠锁
//!
//! 长时间持有的阻塞互斥锁，用于保护缓存槽内容（跨磁盘 I/O 持有）。
//! 与 `spin::Mutex` 的区别：
//!
//! - `spin::Mutex` 忙等，只保护元数据，绝不跨越慢操作持有
//! - [`SleepLock`] 获取失败时让出 CPU（[`KernelHal::sleep`]），可以跨 I/O 持有
//!
//! 内部状态本身由一把自旋锁保护。等待者持着它进入 [`KernelHal::sleep`]，
//! 由平台在登记睡眠之后释放，所以这把自旋锁从不跨越挂起持有。

use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};

use crate::error::fatal;
use crate::hal::KernelHal;

/// 锁状态
#[derive(Debug, Default)]
struct SleepState {
    /// 是否被持有
    locked: bool,
    /// 持有者线程标识（仅在 `locked` 时有意义）
    holder: usize,
}

/// 睡眠锁
pub struct SleepLock<T> {
    state: spin::Mutex<SleepState>,
    /// 锁名，出现在不变量违例的报错中
    name: &'static str,
    data: UnsafeCell<T>,
}

// SAFETY: 数据只能通过 SleepLockGuard 访问，而任一时刻至多存在一个 guard
unsafe impl<T: Send> Send for SleepLock<T> {}
unsafe impl<T: Send> Sync for SleepLock<T> {}

impl<T> SleepLock<T> {
    /// 创建新的睡眠锁
    pub const fn new(data: T, name: &'static str) -> Self {
        Self {
            state: spin::Mutex::new(SleepState {
                locked: false,
                holder: 0,
            }),
            name,
            data: UnsafeCell::new(data),
        }
    }

    /// 等待通道：以内部状态的地址区分不同的锁
    #[inline]
    fn chan(&self) -> usize {
        &self.state as *const _ as usize
    }

    /// 获取锁，必要时睡眠等待
    ///
    /// 对应 xv6 的 `acquiresleep()`。没有超时，也不可取消。
    ///
    /// 检查失败后，状态自旋锁交给 [`KernelHal::sleep`] 释放，
    /// 因此持有者的解锁与唤醒不会落在检查和挂起之间。
    pub fn lock<'a, H: KernelHal>(&'a self, hal: &'a H) -> SleepLockGuard<'a, T, H> {
        let me = hal.thread_id();
        let mut state = self.state.lock();
        while state.locked {
            hal.sleep(self.chan(), move || drop(state));
            state = self.state.lock();
        }
        state.locked = true;
        state.holder = me;
        drop(state);
        SleepLockGuard { lock: self, hal }
    }

    /// 当前线程是否持有该锁
    ///
    /// 对应 xv6 的 `holdingsleep()`
    pub fn holding<H: KernelHal>(&self, hal: &H) -> bool {
        let state = self.state.lock();
        state.locked && state.holder == hal.thread_id()
    }

    fn unlock<H: KernelHal>(&self, hal: &H) {
        {
            let mut state = self.state.lock();
            if !state.locked || state.holder != hal.thread_id() {
                drop(state);
                fatal(self.name);
            }
            state.locked = false;
            state.holder = 0;
        }
        hal.wakeup(self.chan());
    }
}

impl<T> core::fmt::Debug for SleepLock<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("SleepLock")
            .field("name", &self.name)
            .field("locked", &state.locked)
            .field("holder", &state.holder)
            .finish()
    }
}

/// 睡眠锁守卫
///
/// Drop 时释放锁并唤醒等待者。释放必须发生在获取锁的线程上，
/// 否则视为不变量违例。
pub struct SleepLockGuard<'a, T, H: KernelHal> {
    lock: &'a SleepLock<T>,
    hal: &'a H,
}

impl<T, H: KernelHal> SleepLockGuard<'_, T, H> {
    /// 当前线程是否仍是持有者
    pub fn holding(&self) -> bool {
        self.lock.holding(self.hal)
    }
}

impl<T, H: KernelHal> Deref for SleepLockGuard<'_, T, H> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: guard 存在即持有锁
        unsafe { &*self.lock.data.get() }
    }
}

impl<T, H: KernelHal> DerefMut for SleepLockGuard<'_, T, H> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: guard 存在即持有锁，且 &mut self 保证独占
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T, H: KernelHal> Drop for SleepLockGuard<'_, T, H> {
    fn drop(&mut self) {
        self.lock.unlock(self.hal);
    }
}
