use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Process-wide single-flight flag for ingestion runs.
#[derive(Debug, Default)]
pub struct IngestLock {
    busy: Arc<AtomicBool>,
}

impl IngestLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip free -> busy. `None` when another run already holds the lock.
    pub fn try_acquire(&self) -> Option<IngestGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| IngestGuard {
                busy: self.busy.clone(),
            })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Holding this means the current task owns the run. Dropping it frees the
/// lock, including on early return, `?` and unwinding. The guard owns its
/// handle on the flag, so it can move into a spawned task.
#[derive(Debug)]
pub struct IngestGuard {
    busy: Arc<AtomicBool>,
}

impl Drop for IngestGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_fails_until_drop() {
        let lock = IngestLock::new();
        let guard = lock.try_acquire().expect("first acquire");
        assert!(lock.is_busy());
        assert!(lock.try_acquire().is_none());
        drop(guard);
        assert!(!lock.is_busy());
        assert!(lock.try_acquire().is_some());
    }

    #[test]
    fn released_on_panic() {
        let lock = Arc::new(IngestLock::new());
        let inner = lock.clone();
        let result = std::thread::spawn(move || {
            let _guard = inner.try_acquire().expect("acquire");
            panic!("run blew up");
        })
        .join();
        assert!(result.is_err());
        assert!(!lock.is_busy());
    }

    #[test]
    fn guard_released_from_another_thread() {
        let lock = IngestLock::new();
        let guard = lock.try_acquire().expect("acquire");
        assert!(lock.is_busy());
        std::thread::spawn(move || drop(guard)).join().unwrap();
        assert!(!lock.is_busy());
        assert!(lock.try_acquire().is_some());
    }

    #[test]
    fn exactly_one_thread_wins() {
        let lock = Arc::new(IngestLock::new());
        let barrier = Arc::new(std::sync::Barrier::new(8));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let lock = lock.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    let guard = lock.try_acquire();
                    let won = guard.is_some();
                    // Hold until everyone has tried.
                    std::thread::sleep(std::time::Duration::from_millis(50));
                    won
                })
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }
}
