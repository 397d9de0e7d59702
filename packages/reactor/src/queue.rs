use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;

use crate::constants::ERR_POISONED_LOCK;
use crate::{Cancelled, CancellationToken, Error, Semaphore};

/// A bounded FIFO queue for many producers and one consumer, with blocking on both ends.
///
/// Two semaphores account for the slots: `occupied` counts items that a consumer may take and
/// `free` counts room that a producer may fill. The underlying sequence is only touched inside
/// a short exclusive section, so producers and the consumer never wait on each other except
/// through the semaphores.
///
/// At every quiescent point `occupied + free == capacity` and the queue holds at most
/// `capacity` items.
///
/// # Examples
///
/// ```
/// use reactor::{BoundedEventQueue, CancellationToken};
///
/// let queue = BoundedEventQueue::new(2).unwrap();
/// let cancel = CancellationToken::new();
///
/// queue.enqueue("first", &cancel).unwrap();
/// queue.enqueue("second", &cancel).unwrap();
///
/// assert_eq!(queue.dequeue(&cancel).unwrap(), "first");
/// assert_eq!(queue.drain_all(), vec!["second"]);
/// ```
pub struct BoundedEventQueue<E> {
    items: Mutex<VecDeque<E>>,

    occupied: Semaphore,
    free: Semaphore,

    capacity: usize,
}

impl<E> BoundedEventQueue<E> {
    /// Creates an empty queue with room for `capacity` items.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCapacity`] if `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self, Error> {
        if capacity == 0 {
            return Err(Error::InvalidCapacity { capacity });
        }

        Ok(Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            occupied: Semaphore::new(0),
            free: Semaphore::new(capacity),
            capacity,
        })
    }

    /// Appends an item to the tail of the queue, blocking while the queue is full.
    ///
    /// # Errors
    ///
    /// Returns [`Cancelled`] if `cancel` is cancelled before the item was appended. The queue is
    /// left exactly as it was and the item is dropped.
    pub fn enqueue(&self, item: E, cancel: &CancellationToken) -> Result<(), Cancelled> {
        self.free.acquire(cancel)?;

        {
            let mut items = self.items.lock().expect(ERR_POISONED_LOCK);

            // Checked under the lock so that a producer never appends once its token has been
            // observed as cancelled by someone holding the same lock.
            if cancel.is_cancelled() {
                drop(items);
                self.free.release();
                return Err(Cancelled::new());
            }

            items.push_back(item);
        }

        self.occupied.release();
        Ok(())
    }

    /// Removes and returns the item at the head of the queue, blocking while the queue is empty.
    ///
    /// # Errors
    ///
    /// Returns [`Cancelled`] if `cancel` is cancelled before an item became available.
    ///
    /// # Panics
    ///
    /// Panics if the slot accounting is found to be inconsistent, which indicates a bug in
    /// this type.
    pub fn dequeue(&self, cancel: &CancellationToken) -> Result<E, Cancelled> {
        self.occupied.acquire(cancel)?;

        let item = self
            .items
            .lock()
            .expect(ERR_POISONED_LOCK)
            .pop_front()
            .expect("an occupied permit guarantees that an item is present");

        self.free.release();
        Ok(item)
    }

    /// Removes every item that is not already claimed by an in-flight [`dequeue()`][Self::dequeue].
    ///
    /// A `dequeue()` that has taken its `occupied` permit but not yet removed its item owns the
    /// oldest item. To leave those items for their owners, this takes the drained items from the
    /// tail of the queue. The result lists the drained items oldest first; without concurrent
    /// `dequeue()` calls this is simply the whole queue in FIFO order.
    ///
    /// Never blocks on an empty queue; returns an empty vector instead.
    ///
    /// # Panics
    ///
    /// Panics if the slot accounting is found to be inconsistent, which indicates a bug in
    /// this type.
    #[must_use]
    pub fn drain_all(&self) -> Vec<E> {
        let count = self.occupied.acquire_all();

        if count == 0 {
            return Vec::new();
        }

        let drained = {
            let mut items = self.items.lock().expect(ERR_POISONED_LOCK);

            let keep = items
                .len()
                .checked_sub(count)
                .expect("occupied permits never exceed the number of queued items");

            items.split_off(keep)
        };

        for _ in 0..count {
            self.free.release();
        }

        drained.into()
    }

    /// The maximum number of items the queue can hold.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The number of items in the queue at the moment of the call.
    ///
    /// Advisory only - producers and the consumer may change it immediately.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.lock().expect(ERR_POISONED_LOCK).len()
    }

    /// Whether the queue held no items at the moment of the call.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    fn permits(&self) -> (usize, usize) {
        (
            self.occupied.available_permits(),
            self.free.available_permits(),
        )
    }
}

impl<E> fmt::Debug for BoundedEventQueue<E> {
    #[cfg_attr(test, mutants::skip)] // No API contract for debug output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedEventQueue")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .field("occupied", &self.occupied)
            .field("free", &self.free)
            .finish()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Barrier};
    use std::thread;
    use std::time::Duration;

    use static_assertions::assert_impl_all;
    use testing::with_watchdog;

    use super::*;

    assert_impl_all!(BoundedEventQueue<String>: Send, Sync);

    #[test]
    fn zero_capacity_is_rejected() {
        let result = BoundedEventQueue::<u32>::new(0);

        assert!(matches!(result, Err(Error::InvalidCapacity { capacity: 0 })));
    }

    #[test]
    fn preserves_fifo_order() {
        let queue = BoundedEventQueue::new(4).unwrap();
        let cancel = CancellationToken::new();

        for i in 0..4 {
            queue.enqueue(i, &cancel).unwrap();
        }

        for i in 0..4 {
            assert_eq!(queue.dequeue(&cancel).unwrap(), i);
        }

        assert!(queue.is_empty());
    }

    #[test]
    fn drain_all_returns_everything_in_order() {
        let queue = BoundedEventQueue::new(8).unwrap();
        let cancel = CancellationToken::new();

        for i in 0..5 {
            queue.enqueue(i, &cancel).unwrap();
        }

        assert_eq!(queue.drain_all(), vec![0, 1, 2, 3, 4]);
        assert!(queue.is_empty());
        assert_eq!(queue.permits(), (0, 8));
    }

    #[test]
    fn drain_all_on_empty_queue_is_empty() {
        let queue = BoundedEventQueue::<u8>::new(3).unwrap();

        assert!(queue.drain_all().is_empty());
        assert_eq!(queue.permits(), (0, 3));
    }

    #[test]
    fn drain_all_leaves_item_claimed_by_in_flight_dequeue() {
        let queue = BoundedEventQueue::new(4).unwrap();
        let cancel = CancellationToken::new();

        for i in 0..3 {
            queue.enqueue(i, &cancel).unwrap();
        }

        // Simulate a dequeue that has reserved its item but not yet removed it.
        queue.occupied.acquire(&cancel).unwrap();

        assert_eq!(queue.drain_all(), vec![1, 2]);
        assert_eq!(queue.len(), 1);

        // The in-flight dequeue completes with the oldest item.
        let claimed = queue.items.lock().unwrap().pop_front();
        queue.free.release();

        assert_eq!(claimed, Some(0));
        assert_eq!(queue.permits(), (0, 4));
    }

    #[test]
    fn enqueue_blocks_when_full_until_dequeue() {
        with_watchdog(|| {
            let queue = Arc::new(BoundedEventQueue::new(1).unwrap());
            let cancel = CancellationToken::new();
            let second_enqueued = Arc::new(AtomicBool::new(false));

            queue.enqueue(1, &cancel).unwrap();

            let producer = thread::spawn({
                let queue = Arc::clone(&queue);
                let second_enqueued = Arc::clone(&second_enqueued);
                move || {
                    queue.enqueue(2, &CancellationToken::new()).unwrap();
                    second_enqueued.store(true, Ordering::Release);
                }
            });

            thread::sleep(Duration::from_millis(20));
            assert!(!second_enqueued.load(Ordering::Acquire));
            assert_eq!(queue.len(), 1);

            assert_eq!(queue.dequeue(&cancel).unwrap(), 1);
            producer.join().unwrap();

            assert!(second_enqueued.load(Ordering::Acquire));
            assert_eq!(queue.dequeue(&cancel).unwrap(), 2);
        });
    }

    #[test]
    fn drain_all_unblocks_full_queue() {
        with_watchdog(|| {
            let queue = Arc::new(BoundedEventQueue::new(2).unwrap());
            let cancel = CancellationToken::new();

            queue.enqueue(1, &cancel).unwrap();
            queue.enqueue(2, &cancel).unwrap();

            let producer = thread::spawn({
                let queue = Arc::clone(&queue);
                move || queue.enqueue(3, &CancellationToken::new())
            });

            thread::sleep(Duration::from_millis(10));
            assert_eq!(queue.drain_all(), vec![1, 2]);

            producer.join().unwrap().unwrap();
            assert_eq!(queue.dequeue(&cancel).unwrap(), 3);
        });
    }

    #[test]
    fn cancelled_enqueue_leaves_accounting_intact() {
        with_watchdog(|| {
            let queue = Arc::new(BoundedEventQueue::new(1).unwrap());
            let cancel = CancellationToken::new();

            queue.enqueue("kept", &CancellationToken::new()).unwrap();

            let producer = thread::spawn({
                let queue = Arc::clone(&queue);
                let cancel = cancel.clone();
                move || queue.enqueue("dropped", &cancel)
            });

            thread::sleep(Duration::from_millis(10));
            cancel.cancel();

            assert!(producer.join().unwrap().is_err());
            assert_eq!(queue.len(), 1);
            assert_eq!(queue.permits(), (1, 0));
            assert_eq!(queue.dequeue(&CancellationToken::new()).unwrap(), "kept");
            assert_eq!(queue.permits(), (0, 1));
        });
    }

    #[test]
    fn enqueue_with_cancelled_token_never_appends() {
        let queue = BoundedEventQueue::new(2).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert!(queue.enqueue(7, &cancel).is_err());
        assert!(queue.is_empty());
        assert_eq!(queue.permits(), (0, 2));
    }

    #[test]
    fn cancelled_dequeue_on_empty_queue() {
        with_watchdog(|| {
            let queue = Arc::new(BoundedEventQueue::<u32>::new(1).unwrap());
            let cancel = CancellationToken::new();

            let consumer = thread::spawn({
                let queue = Arc::clone(&queue);
                let cancel = cancel.clone();
                move || queue.dequeue(&cancel)
            });

            thread::sleep(Duration::from_millis(10));
            cancel.cancel();

            assert!(consumer.join().unwrap().is_err());
            assert_eq!(queue.permits(), (0, 1));
        });
    }

    #[test]
    fn many_producers_keep_per_producer_order() {
        const PRODUCERS: usize = 4;
        const ITEMS: usize = 250;

        with_watchdog(|| {
            let queue = Arc::new(BoundedEventQueue::new(3).unwrap());
            let start = Arc::new(Barrier::new(PRODUCERS));

            let producers = (0..PRODUCERS)
                .map(|producer| {
                    let queue = Arc::clone(&queue);
                    let start = Arc::clone(&start);

                    thread::spawn(move || {
                        let cancel = CancellationToken::new();
                        start.wait();

                        for sequence in 0..ITEMS {
                            queue.enqueue((producer, sequence), &cancel).unwrap();
                        }
                    })
                })
                .collect::<Vec<_>>();

            let cancel = CancellationToken::new();
            let mut next_expected = [0_usize; PRODUCERS];

            for _ in 0..PRODUCERS * ITEMS {
                let (producer, sequence) = queue.dequeue(&cancel).unwrap();
                assert!(queue.len() <= queue.capacity());

                assert_eq!(next_expected[producer], sequence);
                next_expected[producer] = sequence + 1;
            }

            for producer in producers {
                producer.join().unwrap();
            }

            assert_eq!(queue.permits(), (0, 3));
        });
    }
}
