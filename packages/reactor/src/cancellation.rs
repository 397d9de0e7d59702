use std::error::Error;
use std::fmt::{self, Display};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::constants::ERR_POISONED_LOCK;

/// Indicates that a blocking operation was abandoned because its
/// [`CancellationToken`] was cancelled.
///
/// This is a cooperative signal, not a failure. Whoever receives it should unwind
/// without retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled {
    _private: PhantomData<()>,
}

impl Cancelled {
    pub(crate) fn new() -> Self {
        Self {
            _private: PhantomData,
        }
    }
}

impl Error for Cancelled {}

impl Display for Cancelled {
    #[cfg_attr(test, mutants::skip)] // No API contract for error message.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "operation was cancelled")
    }
}

/// Something a thread can block on that knows how to wake all of its waiters.
///
/// Implementations must take the same lock the waiters hold while checking their wait
/// condition, so that a wake-up issued after [`CancellationToken::cancel()`] cannot slip in
/// between a waiter's cancellation check and its wait.
pub(crate) trait Interrupt: Send + Sync {
    fn interrupt(&self);
}

/// Cooperative cancellation signal shared between the party that wants an operation to stop
/// and the thread performing it.
///
/// Clones share state: cancelling any clone cancels all of them. Once cancelled, a token stays
/// cancelled.
///
/// Every blocking operation in this crate takes a token. Cancelling the token wakes the
/// thread if it is currently blocked inside one of those operations and makes any later
/// blocking call on its behalf return [`Cancelled`] immediately.
///
/// # Examples
///
/// ```
/// use reactor::{CancellationToken, Semaphore};
///
/// let semaphore = Semaphore::new(0);
/// let cancel = CancellationToken::new();
///
/// cancel.cancel();
///
/// // No permits are available but the call does not block - it observes the cancellation.
/// assert!(semaphore.acquire(&cancel).is_err());
/// ```
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    inner: Arc<TokenInner>,
}

#[derive(Default)]
struct TokenInner {
    // Only ever set while `parked` is locked.
    cancelled: AtomicBool,

    parked: Mutex<ParkedList>,
}

#[derive(Default)]
struct ParkedList {
    next_ticket: u64,
    entries: Vec<(u64, Arc<dyn Interrupt>)>,
}

impl fmt::Debug for TokenInner {
    #[cfg_attr(test, mutants::skip)] // No API contract for debug output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenInner")
            .field("cancelled", &self.cancelled.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

impl CancellationToken {
    /// Creates a token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels the token, waking every thread currently blocked on its behalf.
    ///
    /// Calling this more than once has no further effect.
    pub fn cancel(&self) {
        let woken = {
            let mut parked = self.inner.parked.lock().expect(ERR_POISONED_LOCK);

            if self.inner.cancelled.swap(true, Ordering::AcqRel) {
                return;
            }

            parked
                .entries
                .drain(..)
                .map(|(_, target)| target)
                .collect::<Vec<_>>()
        };

        // Interrupting takes the target's own lock, so we do it after releasing ours.
        for target in woken {
            target.interrupt();
        }
    }

    /// Whether [`cancel()`][Self::cancel] has been called on this token or any of its clones.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Returns [`Cancelled`] if the token has been cancelled.
    ///
    /// Intended for custom [`Handle`][crate::Handle] implementations that poll for cancellation
    /// between units of work.
    ///
    /// # Errors
    ///
    /// Returns [`Cancelled`] if the token has been cancelled.
    pub fn check(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled::new())
        } else {
            Ok(())
        }
    }

    /// Registers `target` to be interrupted if the token is cancelled while the returned
    /// guard is alive.
    ///
    /// The caller must perform its final cancellation check under the same lock that
    /// `target.interrupt()` takes, after this call returns.
    pub(crate) fn park(&self, target: Arc<dyn Interrupt>) -> Result<ParkGuard<'_>, Cancelled> {
        let mut parked = self.inner.parked.lock().expect(ERR_POISONED_LOCK);

        if self.inner.cancelled.load(Ordering::Acquire) {
            return Err(Cancelled::new());
        }

        let ticket = parked.next_ticket;
        parked.next_ticket = parked.next_ticket.wrapping_add(1);
        parked.entries.push((ticket, target));

        Ok(ParkGuard {
            token: self,
            ticket,
        })
    }
}

/// Removes a parked interrupt target from its token when dropped.
pub(crate) struct ParkGuard<'a> {
    token: &'a CancellationToken,
    ticket: u64,
}

impl Drop for ParkGuard<'_> {
    fn drop(&mut self) {
        let mut parked = self.token.inner.parked.lock().expect(ERR_POISONED_LOCK);

        // If the token was cancelled, `cancel()` already took the entry.
        parked.entries.retain(|(ticket, _)| *ticket != self.ticket);
    }
}
