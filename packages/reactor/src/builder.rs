use std::marker::PhantomData;

use crate::constants::DEFAULT_READER_THREAD_NAME;
use crate::{DEFAULT_CAPACITY, Dispatcher, Result, StaleEventPolicy};

/// Builder for creating an instance of [`Dispatcher`].
///
/// All settings are optional.
///
/// # Examples
///
/// ```
/// use reactor::{Dispatcher, StaleEventPolicy};
///
/// let dispatcher = Dispatcher::<String>::builder()
///     .capacity(16)
///     .stale_event_policy(StaleEventPolicy::Fail)
///     .reader_thread_name("game-reader")
///     .build()
///     .unwrap();
///
/// assert_eq!(dispatcher.capacity(), 16);
/// ```
#[derive(Debug)]
#[must_use]
pub struct DispatcherBuilder<T> {
    capacity: usize,
    stale_event_policy: StaleEventPolicy,
    reader_thread_name: String,

    _payload: PhantomData<fn() -> T>,
}

impl<T> DispatcherBuilder<T>
where
    T: Send + 'static,
{
    pub(crate) fn new() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            stale_event_policy: StaleEventPolicy::default(),
            reader_thread_name: DEFAULT_READER_THREAD_NAME.to_string(),
            _payload: PhantomData,
        }
    }

    /// Sets how many events may wait in the queue before reader threads block.
    ///
    /// Defaults to [`DEFAULT_CAPACITY`].
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the [stale event policy][StaleEventPolicy] of the dispatch loop.
    pub fn stale_event_policy(mut self, policy: StaleEventPolicy) -> Self {
        self.stale_event_policy = policy;
        self
    }

    /// Sets the name prefix of reader threads. Each thread gets a unique numeric suffix.
    pub fn reader_thread_name(mut self, prefix: impl Into<String>) -> Self {
        self.reader_thread_name = prefix.into();
        self
    }

    /// Builds the dispatcher with the specified configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCapacity`][crate::Error::InvalidCapacity] if the capacity is zero.
    pub fn build(self) -> Result<Dispatcher<T>> {
        Dispatcher::new_inner(
            self.capacity,
            self.stale_event_policy,
            self.reader_thread_name,
        )
    }
}
