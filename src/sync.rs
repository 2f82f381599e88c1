use std::mem::MaybeUninit;
use std::time::Duration;

use nix::errno::Errno;
use nix::libc::{clock_gettime, sem_post, sem_t, sem_timedwait, timespec, CLOCK_REALTIME};

/// Upper bound on both waits absent a caller override; keeps a stalled or
/// dead producer from freezing the host's scheduling loop.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(1);

/// The wait deadline expired before the semaphore was decremented.
pub(crate) struct TimedOut;

const NANOS_PER_SEC: i64 = 1_000_000_000;

/// Absolute deadline at `now + timeout`, computed fresh at every call so
/// retries never accumulate.
fn deadline_after(timeout: Duration) -> timespec {
    // Zeroed, not uninit: if the clock call fails the deadline degrades to
    // the epoch and the wait expires immediately instead of reading garbage.
    let mut now = MaybeUninit::<timespec>::zeroed();
    let now = unsafe {
        if clock_gettime(CLOCK_REALTIME, now.as_mut_ptr()) != 0 {
            tracing::warn!(errno = %Errno::last(), "clock_gettime failed");
        }
        now.assume_init()
    };
    let mut sec = now.tv_sec + timeout.as_secs() as i64;
    let mut nsec = now.tv_nsec + i64::from(timeout.subsec_nanos());
    if nsec >= NANOS_PER_SEC {
        sec += 1;
        nsec -= NANOS_PER_SEC;
    }
    timespec {
        tv_sec: sec,
        tv_nsec: nsec,
    }
}

unsafe fn timed_wait(sem: *mut sem_t, timeout: Duration) -> Result<(), TimedOut> {
    let deadline = deadline_after(timeout);
    loop {
        if sem_timedwait(sem, &deadline) == 0 {
            return Ok(());
        }
        match Errno::last() {
            Errno::EINTR => continue,
            Errno::ETIMEDOUT => return Err(TimedOut),
            errno => {
                // A corrupted semaphore looks like a stalled producer; the
                // host already handles that by re-attaching.
                tracing::error!(%errno, "semaphore wait failed");
                return Err(TimedOut);
            }
        }
    }
}

/// Acquire the header mutex, giving up at `now + timeout`. On success the
/// caller holds exclusive access to header and payload until [`unlock`].
pub(crate) unsafe fn lock(mutex: *mut sem_t, timeout: Duration) -> Result<(), TimedOut> {
    timed_wait(mutex, timeout)
}

/// Release the header mutex. Posting a mutex that is not held is a
/// programming error, checked in debug builds only.
pub(crate) unsafe fn unlock(mutex: *mut sem_t) {
    let rc = sem_post(mutex);
    debug_assert_eq!(rc, 0, "released a header lock that was not held");
}

/// Block until the producer posts a new-frame notification, or the deadline
/// expires. Must never be called while holding the header mutex.
pub(crate) unsafe fn wait_notification(
    notification: *mut sem_t,
    timeout: Duration,
) -> Result<(), TimedOut> {
    timed_wait(notification, timeout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deadline_is_in_the_future() {
        let before = deadline_after(Duration::ZERO);
        let after = deadline_after(Duration::from_secs(2));
        let delta =
            (after.tv_sec - before.tv_sec) * NANOS_PER_SEC + (after.tv_nsec - before.tv_nsec);
        assert!(delta >= 2 * NANOS_PER_SEC);
        assert!(delta < 3 * NANOS_PER_SEC);
    }

    #[test]
    fn deadline_nanos_stay_normalized() {
        let deadline = deadline_after(Duration::from_nanos(999_999_999));
        assert!(deadline.tv_nsec < NANOS_PER_SEC);
        assert!(deadline.tv_nsec >= 0);
    }
}
