use std::fmt;
use std::sync::{Arc, Condvar, Mutex};

use crate::constants::ERR_POISONED_LOCK;
use crate::{Cancelled, CancellationToken, Interrupt};

/// A counting semaphore with cancellable blocking acquisition.
///
/// The semaphore tracks a number of permits. [`acquire()`][Self::acquire] takes one permit,
/// blocking while none are available, and [`release()`][Self::release] returns one. There is no
/// upper bound - releasing more permits than were ever acquired simply grows the count.
///
/// The permit count and the wake-up signal are always changed under the same lock that waiters
/// hold while checking for permits, so a release can never be missed by a waiter.
///
/// # Examples
///
/// ```
/// use reactor::{CancellationToken, Semaphore};
///
/// let semaphore = Semaphore::new(2);
/// let cancel = CancellationToken::new();
///
/// semaphore.acquire(&cancel).unwrap();
/// assert_eq!(semaphore.available_permits(), 1);
///
/// semaphore.release();
/// assert_eq!(semaphore.acquire_all(), 2);
/// assert_eq!(semaphore.available_permits(), 0);
/// ```
pub struct Semaphore {
    // Shared so that a blocked waiter can hand the semaphore to its cancellation token.
    shared: Arc<Shared>,
}

struct Shared {
    permits: Mutex<usize>,
    permit_released: Condvar,
}

impl Interrupt for Shared {
    fn interrupt(&self) {
        let _permits = self.permits.lock().expect(ERR_POISONED_LOCK);
        self.permit_released.notify_all();
    }
}

impl Semaphore {
    /// Creates a semaphore holding `permits` permits.
    #[must_use]
    pub fn new(permits: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                permits: Mutex::new(permits),
                permit_released: Condvar::new(),
            }),
        }
    }

    /// Takes one permit, blocking until one is available.
    ///
    /// # Errors
    ///
    /// Returns [`Cancelled`] if `cancel` is cancelled before a permit could be taken, including
    /// if it was already cancelled when the call was made. No permit is consumed in that case.
    pub fn acquire(&self, cancel: &CancellationToken) -> Result<(), Cancelled> {
        let mut permits = self.shared.permits.lock().expect(ERR_POISONED_LOCK);

        // Checked under the lock, so a token cancelled before a permit was released can
        // never be granted that permit.
        cancel.check()?;

        // Fast path, no need to involve the token.
        if *permits > 0 {
            *permits = permits.wrapping_sub(1);
            return Ok(());
        }

        drop(permits);

        let _parked = cancel.park(Arc::clone(&self.shared) as Arc<dyn Interrupt>)?;

        let mut permits = self.shared.permits.lock().expect(ERR_POISONED_LOCK);

        loop {
            if cancel.is_cancelled() {
                if *permits > 0 {
                    // We may have consumed the notification meant for a permit that is still
                    // there. Pass it on so another waiter can take it.
                    self.shared.permit_released.notify_one();
                }

                return Err(Cancelled::new());
            }

            if *permits > 0 {
                *permits = permits.wrapping_sub(1);
                return Ok(());
            }

            permits = self
                .shared
                .permit_released
                .wait(permits)
                .expect(ERR_POISONED_LOCK);
        }
    }

    /// Takes one permit if one is available, without blocking.
    #[must_use]
    pub fn try_acquire(&self) -> bool {
        let mut permits = self.shared.permits.lock().expect(ERR_POISONED_LOCK);

        if *permits == 0 {
            return false;
        }

        *permits = permits.wrapping_sub(1);
        true
    }

    /// Returns one permit and wakes a blocked [`acquire()`][Self::acquire], if any.
    ///
    /// # Panics
    ///
    /// Panics if the permit count would overflow `usize`.
    pub fn release(&self) {
        let mut permits = self.shared.permits.lock().expect(ERR_POISONED_LOCK);

        *permits = permits
            .checked_add(1)
            .expect("semaphore permit count overflowed usize");

        self.shared.permit_released.notify_one();
    }

    /// The number of permits available at the moment of the call.
    ///
    /// This is advisory only - other threads may change the count immediately after it is read.
    #[must_use]
    pub fn available_permits(&self) -> usize {
        *self.shared.permits.lock().expect(ERR_POISONED_LOCK)
    }

    /// Takes every currently available permit at once, returning how many were taken.
    ///
    /// The permits returned here are gone: no concurrent [`acquire()`][Self::acquire] can also
    /// be granted any of them. Never blocks; returns zero if no permits are available.
    #[must_use]
    pub fn acquire_all(&self) -> usize {
        let mut permits = self.shared.permits.lock().expect(ERR_POISONED_LOCK);
        std::mem::take(&mut *permits)
    }
}

impl fmt::Debug for Semaphore {
    #[cfg_attr(test, mutants::skip)] // No API contract for debug output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Semaphore")
            .field("available_permits", &self.available_permits())
            .finish()
    }
}
