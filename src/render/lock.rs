use std::sync::{Mutex, MutexGuard};

use tracing::warn;

/// Lock render-scoped state, recovering the guard if another task panicked
/// while holding it. Render state is append-only, so a poisoned value is still
/// usable.
pub(crate) fn mutex_lock<'a, T>(
    lock: &'a Mutex<T>,
    target: &'static str,
    op: &'static str,
) -> MutexGuard<'a, T> {
    match lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!(
                op,
                target_module = target,
                lock_kind = "mutex.lock",
                result = "poisoned_recovered",
                "Recovered from poisoned render-state lock"
            );
            poisoned.into_inner()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{panic, sync::Arc};

    use super::*;

    #[test]
    fn poisoned_lock_is_recovered() {
        let lock = Arc::new(Mutex::new(vec![1]));
        let poison = Arc::clone(&lock);
        let _ = panic::catch_unwind(move || {
            let _guard = poison.lock().expect("first lock");
            panic!("poison the lock");
        });
        assert!(lock.is_poisoned());

        let mut guard = mutex_lock(&lock, "render::lock::tests", "push");
        guard.push(2);
        assert_eq!(*guard, vec![1, 2]);
    }
}
