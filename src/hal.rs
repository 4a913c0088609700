//! 平台抽象
//!
//! 块缓存和页分配器需要从内核获得少量运行时信息：当前 CPU、当前线程、
//! 时钟滴答以及睡眠/唤醒原语。内核通过实现 [`KernelHal`] 提供这些能力。

/// 内核平台接口
///
/// # 示例
///
/// ```ignore
/// struct RiscvHal;
///
/// impl KernelHal for RiscvHal {
///     fn cpu_id(&self) -> usize {
///         // 关中断期间读取 tp 寄存器
///         with_interrupts_off(|| r_tp())
///     }
///     fn thread_id(&self) -> usize {
///         myproc().pid
///     }
///     fn ticks(&self) -> u64 {
///         TICKS.load(Ordering::Relaxed)
///     }
///     fn sleep<F: FnOnce()>(&self, chan: usize, release: F) {
///         // 先在进程锁下登记为睡眠，再放掉调用者的锁
///         let p = myproc();
///         let mut inner = p.lock();
///         release();
///         inner.chan = chan;
///         inner.state = ProcState::Sleeping;
///         sched(inner);
///     }
///     fn wakeup(&self, chan: usize) {
///         sched_wakeup(chan)
///     }
/// }
/// ```
pub trait KernelHal: Send + Sync {
    /// 当前 CPU 编号
    ///
    /// 返回值在本次调用期间必须有效；调用者只把它当作提示，
    /// 线程随后被迁移到别的核不影响正确性。
    fn cpu_id(&self) -> usize;

    /// 当前内核线程的标识，用于睡眠锁的持有者检查
    fn thread_id(&self) -> usize;

    /// 单调递增的时钟滴答计数
    fn ticks(&self) -> u64;

    /// 在等待通道 `chan` 上睡眠
    ///
    /// 对应 xv6 的 `sleep(chan, lk)`。调用者在持有保护等待条件的锁时调用，
    /// `release` 负责放掉这把锁。实现必须：
    ///
    /// 1. 先把当前线程登记为在 `chan` 上等待，使此后的 [`wakeup`](Self::wakeup) 一定能看到它；
    /// 2. 再调用 `release` 恰好一次；
    /// 3. 最后挂起，直到被唤醒。
    ///
    /// 这样在检查条件与挂起之间发生的唤醒不会丢失。
    /// 允许虚假返回：调用者总会在返回后重新加锁并检查等待条件。
    fn sleep<F: FnOnce()>(&self, chan: usize, release: F);

    /// 唤醒所有在 `chan` 上睡眠的线程
    fn wakeup(&self, chan: usize);
}

macro_rules! forward_hal {
    ($($ty:ty),*) => {
        $(
            impl<H: KernelHal + ?Sized> KernelHal for $ty {
                fn cpu_id(&self) -> usize {
                    (**self).cpu_id()
                }

                fn thread_id(&self) -> usize {
                    (**self).thread_id()
                }

                fn ticks(&self) -> u64 {
                    (**self).ticks()
                }

                fn sleep<F: FnOnce()>(&self, chan: usize, release: F) {
                    (**self).sleep(chan, release)
                }

                fn wakeup(&self, chan: usize) {
                    (**self).wakeup(chan)
                }
            }
        )*
    };
}

forward_hal!(&H, alloc::sync::Arc<H>, alloc::boxed::Box<H>);
