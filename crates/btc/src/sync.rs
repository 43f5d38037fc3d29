//! Lock backend selection.
//!
//! With `std` (the default) locks are `parking_lot` and a blocked pump
//! sleeps on a condition variable. With only `lock-free`, locks are `spin`
//! and the pump yields while it waits.

use core::time::Duration;

#[cfg(feature = "std")]
pub type MutexGuard<'a, T> = parking_lot::MutexGuard<'a, T>;
#[cfg(not(feature = "std"))]
pub type MutexGuard<'a, T> = spin::MutexGuard<'a, T>;

pub struct Mutex<T> {
    #[cfg(feature = "std")]
    inner: parking_lot::Mutex<T>,
    #[cfg(not(feature = "std"))]
    inner: spin::Mutex<T>,
}

impl<T> Mutex<T> {
    pub fn new(value: T) -> Self {
        Self {
            #[cfg(feature = "std")]
            inner: parking_lot::Mutex::new(value),
            #[cfg(not(feature = "std"))]
            inner: spin::Mutex::new(value),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.inner.lock()
    }
}

/// One-slot doorbell between producers and the pump.
pub struct Wakeup {
    #[cfg(feature = "std")]
    rung: parking_lot::Mutex<bool>,
    #[cfg(feature = "std")]
    bell: parking_lot::Condvar,
    #[cfg(not(feature = "std"))]
    rung: core::sync::atomic::AtomicBool,
}

impl Wakeup {
    pub fn new() -> Self {
        Self {
            #[cfg(feature = "std")]
            rung: parking_lot::Mutex::new(false),
            #[cfg(feature = "std")]
            bell: parking_lot::Condvar::new(),
            #[cfg(not(feature = "std"))]
            rung: core::sync::atomic::AtomicBool::new(false),
        }
    }

    pub fn notify(&self) {
        #[cfg(feature = "std")]
        {
            *self.rung.lock() = true;
            self.bell.notify_one();
        }
        #[cfg(not(feature = "std"))]
        {
            self.rung
                .store(true, core::sync::atomic::Ordering::Release);
        }
    }

    /// Waits for a ring or until `timeout` passes, then clears the bell.
    pub fn wait(&self, timeout: Duration) {
        #[cfg(feature = "std")]
        {
            let mut rung = self.rung.lock();
            if !*rung {
                let _ = self.bell.wait_for(&mut rung, timeout);
            }
            *rung = false;
        }
        #[cfg(not(feature = "std"))]
        {
            use core::sync::atomic::Ordering;

            let start = std::time::Instant::now();
            while !self.rung.swap(false, Ordering::AcqRel) {
                if start.elapsed() >= timeout {
                    break;
                }
                std::thread::yield_now();
            }
        }
    }
}
