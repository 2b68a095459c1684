//! Exclusive, time-bounded access to a collection snapshot.
//!
//! Every read-modify-write on a collection happens while its guard is held.
//! Callers that need both collections lock players before matches. The guard
//! only orders threads of one process; writers in other processes are caught
//! by the version check on commit.

use log::{debug, warn};
use parking_lot::{Mutex, MutexGuard};
use std::time::Duration;

use crate::errors::{LadderError, Result};

pub struct Guarded<T> {
    name: &'static str,
    timeout: Duration,
    inner: Mutex<T>,
}

impl<T> Guarded<T> {
    pub fn new(name: &'static str, value: T, timeout: Duration) -> Self {
        Self {
            name,
            timeout,
            inner: Mutex::new(value),
        }
    }

    /// Waits at most the configured timeout for exclusive access.
    pub fn lock(&self) -> Result<MutexGuard<'_, T>> {
        match self.inner.try_lock_for(self.timeout) {
            Some(guard) => {
                debug!("Acquired {} lock", self.name);
                Ok(guard)
            }
            None => {
                warn!("Timed out after {:?} waiting for {} lock", self.timeout, self.name);
                Err(LadderError::LockTimeout(self.name))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_lock_times_out_while_held() {
        let guarded = Guarded::new("players", 0u32, Duration::from_millis(20));
        let _held = guarded.lock().unwrap();

        assert!(matches!(guarded.lock(), Err(LadderError::LockTimeout("players"))));
    }

    #[test]
    fn test_serializes_read_modify_write() {
        let guarded = Arc::new(Guarded::new("matches", 0u32, Duration::from_secs(5)));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let guarded = Arc::clone(&guarded);
                thread::spawn(move || {
                    for _ in 0..100 {
                        let mut value = guarded.lock().unwrap();
                        let current = *value;
                        thread::yield_now();
                        *value = current + 1;
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(*guarded.lock().unwrap(), 800);
    }
}
