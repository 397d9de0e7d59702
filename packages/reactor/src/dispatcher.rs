use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use foldhash::{HashMap, HashMapExt};
use tracing::{debug, error, warn};

use crate::constants::ERR_POISONED_LOCK;
use crate::event::Registration;
use crate::metrics::{EVENTS_DISCARDED_ON_EXIT, EVENTS_DISPATCHED, EVENTS_STALE};
use crate::reader::ReaderTask;
use crate::{
    BoundedEventQueue, CancellationToken, DispatcherBuilder, Error, Event, EventHandler, Handle,
    HandlerId, Result, StaleEventPolicy,
};

/// Turns any number of blocking sources into one sequential stream of callbacks.
///
/// Every registered [`EventHandler`] gets a dedicated reader thread that reads the handler's
/// [`Handle`] and pushes what it reads into a shared bounded queue. A single dispatch loop,
/// [`handle_events()`][Self::handle_events], takes events off the queue one at a time and
/// invokes the owning handler's callback. Callbacks of all handlers therefore run one after
/// another on the thread that runs the dispatch loop, never concurrently.
///
/// Events from one source are delivered in the order they were read. There is no ordering
/// between different sources.
///
/// # Handler lifecycle
///
/// A handler is unregistered until [`add_handler()`][Self::add_handler] starts its reader. It
/// stays registered until [`remove_handler()`][Self::remove_handler] cancels the reader. After
/// that it may be added again, as if it had never been registered.
///
/// The reader stops by itself after delivering [`Payload::EndOfStream`][crate::Payload], but the
/// handler remains registered: its callback is expected to remove it upon seeing the sentinel.
///
/// # Ownership
///
/// The dispatcher holds strong references to what it drives. Each registration keeps the
/// handler and its [`Handle`] alive, the reader thread keeps the handler alive until it exits,
/// and every queued [`Event`] keeps its handler alive until it is dispatched or discarded.
/// Dropping the application's own references to a registered handler therefore does not stop
/// it; only [`remove_handler()`][Self::remove_handler] or [`shutdown()`][Self::shutdown] does.
///
/// This is also what makes [`HandlerId`] sound: a handler's address cannot be reused by another
/// object while any registration, reader or event still refers to it.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use reactor::{Cancelled, CancellationToken, Dispatcher, EventHandler, Handle, Payload};
///
/// struct Once;
///
/// impl Handle for Once {
///     type Item = &'static str;
///
///     fn read(&self, _cancel: &CancellationToken) -> Result<Payload<&'static str>, Cancelled> {
///         Ok(Payload::EndOfStream)
///     }
///
///     fn close(&self) {}
/// }
///
/// struct Printer(Arc<Once>);
///
/// impl EventHandler<&'static str> for Printer {
///     fn handle(&self) -> Arc<dyn Handle<Item = &'static str>> {
///         self.0.clone()
///     }
///
///     fn handle_event(&self, dispatcher: &Dispatcher<&'static str>, payload: Payload<&'static str>) {
///         if payload.is_end_of_stream() {
///             dispatcher.remove_handler(self).unwrap();
///         }
///     }
/// }
///
/// let dispatcher = Dispatcher::new(4).unwrap();
/// dispatcher.add_handler(Arc::new(Printer(Arc::new(Once)))).unwrap();
///
/// // Returns once the handler has removed itself.
/// dispatcher.handle_events().unwrap();
/// ```
pub struct Dispatcher<T>
where
    T: Send + 'static,
{
    queue: Arc<BoundedEventQueue<Event<T>>>,

    registry: Mutex<HashMap<HandlerId, RegistryEntry<T>>>,

    // The dispatch loop waits on the queue with this token. It is cancelled whenever the
    // registry becomes empty, so that a loop waiting for events that will never come can exit.
    idle: Mutex<CancellationToken>,

    running: AtomicBool,

    next_registration: AtomicU64,

    stale_event_policy: StaleEventPolicy,
    reader_thread_name: String,
}

struct RegistryEntry<T>
where
    T: Send + 'static,
{
    registration: Registration,
    handle: Arc<dyn Handle<Item = T>>,
    reader: ReaderTask,
}

impl<T> Dispatcher<T>
where
    T: Send + 'static,
{
    /// Creates a dispatcher whose queue holds up to `capacity` events, with default settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCapacity`] if `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self> {
        Self::builder().capacity(capacity).build()
    }

    /// Creates a builder for a dispatcher with custom settings.
    pub fn builder() -> DispatcherBuilder<T> {
        DispatcherBuilder::new()
    }

    pub(crate) fn new_inner(
        capacity: usize,
        stale_event_policy: StaleEventPolicy,
        reader_thread_name: String,
    ) -> Result<Self> {
        Ok(Self {
            queue: Arc::new(BoundedEventQueue::new(capacity)?),
            registry: Mutex::new(HashMap::new()),
            idle: Mutex::new(CancellationToken::new()),
            running: AtomicBool::new(false),
            next_registration: AtomicU64::new(0),
            stale_event_policy,
            reader_thread_name,
        })
    }

    /// Registers a handler and starts the reader thread for its source.
    ///
    /// May be called from any thread, including from within a callback.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyRegistered`] if the handler is currently registered, or
    /// [`Error::ReaderSpawn`] if the reader thread could not be started. In both cases the
    /// registry is unchanged.
    pub fn add_handler(&self, handler: Arc<dyn EventHandler<T>>) -> Result<()> {
        let handler_id = HandlerId::of(&*handler);

        // User code, so it must not run under the registry lock.
        let handle = handler.handle();

        let mut registry = self.registry.lock().expect(ERR_POISONED_LOCK);

        if registry.contains_key(&handler_id) {
            return Err(Error::AlreadyRegistered {
                handler: handler_id,
            });
        }

        let registration = Registration(self.next_registration.fetch_add(1, Ordering::Relaxed));

        let reader = ReaderTask::spawn(
            format!("{}-{}", self.reader_thread_name, registration.0),
            handler,
            registration,
            Arc::clone(&self.queue),
        )?;

        registry.insert(
            handler_id,
            RegistryEntry {
                registration,
                handle,
                reader,
            },
        );

        debug!(handler = %handler_id, registration = registration.0, "handler added");

        Ok(())
    }

    /// Unregisters a handler and signals its reader thread to stop.
    ///
    /// Does not wait for the reader thread to exit. The handler's source is not closed; that is
    /// the responsibility of whoever owns the handler.
    ///
    /// May be called from any thread, including from within a callback. A handler typically
    /// removes itself when it receives [`Payload::EndOfStream`][crate::Payload].
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotRegistered`] if the handler is not currently registered.
    pub fn remove_handler<H>(&self, handler: &H) -> Result<()>
    where
        H: EventHandler<T> + ?Sized,
    {
        let handler_id = HandlerId::of(handler);

        let (entry, now_empty) = {
            let mut registry = self.registry.lock().expect(ERR_POISONED_LOCK);

            let entry = registry.remove(&handler_id).ok_or(Error::NotRegistered {
                handler: handler_id,
            })?;

            (entry, registry.is_empty())
        };

        entry.reader.cancel();

        debug!(handler = %handler_id, registration = entry.registration.0, "handler removed");

        if now_empty {
            self.wake_idle_loop();
        }

        Ok(())
    }

    /// Removes every registered handler, cancelling their readers and closing their sources.
    ///
    /// This is the explicit teardown path: once it returns, the dispatch loop exits as soon as
    /// the currently executing callback (if any) returns. Returns the number of handlers removed.
    pub fn shutdown(&self) -> usize {
        let entries = {
            let mut registry = self.registry.lock().expect(ERR_POISONED_LOCK);
            registry.drain().collect::<Vec<_>>()
        };

        for (handler_id, entry) in &entries {
            entry.reader.cancel();
            entry.handle.close();

            debug!(handler = %handler_id, "handler removed by shutdown");
        }

        self.wake_idle_loop();

        entries.len()
    }

    /// Whether the handler is currently registered.
    #[must_use]
    pub fn is_registered<H>(&self, handler: &H) -> bool
    where
        H: EventHandler<T> + ?Sized,
    {
        self.registry
            .lock()
            .expect(ERR_POISONED_LOCK)
            .contains_key(&HandlerId::of(handler))
    }

    /// The number of currently registered handlers.
    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.registry.lock().expect(ERR_POISONED_LOCK).len()
    }

    /// The maximum number of events that may wait in the queue.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// The [stale event policy][StaleEventPolicy] the dispatch loop applies.
    #[must_use]
    pub fn stale_event_policy(&self) -> StaleEventPolicy {
        self.stale_event_policy
    }

    /// Runs the dispatch loop until no handlers remain registered.
    ///
    /// Takes events off the queue one at a time and passes each to its handler's callback on
    /// the calling thread. Returns immediately if no handler is registered. When the loop ends,
    /// events still in the queue are discarded.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LoopAlreadyRunning`] if the loop is already running (including if
    /// called from within a callback). Returns [`Error::StaleEvent`] if an event arrives for a
    /// handler that is no longer registered and the policy is [`StaleEventPolicy::Fail`].
    pub fn handle_events(&self) -> Result<()> {
        if self.running.swap(true, Ordering::AcqRel) {
            return Err(Error::LoopAlreadyRunning);
        }

        let _running = scopeguard::guard((), |()| self.running.store(false, Ordering::Release));

        debug!("dispatch loop started");

        loop {
            // Obtained before checking the registry, so a removal that empties the registry
            // after our check is guaranteed to cancel the token we then wait with.
            let idle = self.idle_token();

            if self.handler_count() == 0 {
                break;
            }

            let Ok(event) = self.queue.dequeue(&idle) else {
                // The registry became empty while we waited. Check again.
                continue;
            };

            if !self.is_current(event.handler_id(), event.registration()) {
                EVENTS_STALE.with(nm::Event::observe_once);
                let handler = event.handler_id();

                match self.stale_event_policy {
                    StaleEventPolicy::Fail => {
                        error!(handler = %handler, "event arrived for a removed handler");
                        return Err(Error::StaleEvent { handler });
                    }
                    StaleEventPolicy::Discard => {
                        warn!(handler = %handler, "discarding event for a removed handler");
                        continue;
                    }
                }
            }

            event.dispatch(self);
            EVENTS_DISPATCHED.with(nm::Event::observe_once);
        }

        let leftover = self.queue.drain_all();

        if !leftover.is_empty() {
            EVENTS_DISCARDED_ON_EXIT.with(|e| e.observe(leftover.len()));
            debug!(count = leftover.len(), "discarded events queued after last handler removed");
        }

        debug!("dispatch loop finished");

        Ok(())
    }

    fn is_current(&self, handler_id: HandlerId, registration: Registration) -> bool {
        self.registry
            .lock()
            .expect(ERR_POISONED_LOCK)
            .get(&handler_id)
            .is_some_and(|entry| entry.registration == registration)
    }

    fn idle_token(&self) -> CancellationToken {
        let mut idle = self.idle.lock().expect(ERR_POISONED_LOCK);

        if idle.is_cancelled() {
            *idle = CancellationToken::new();
        }

        idle.clone()
    }

    fn wake_idle_loop(&self) {
        self.idle.lock().expect(ERR_POISONED_LOCK).cancel();
    }
}

impl<T> Drop for Dispatcher<T>
where
    T: Send + 'static,
{
    fn drop(&mut self) {
        // Readers hold the queue alive, not the dispatcher. Without this they would keep reading
        // into a queue that nobody will ever drain again.
        let registry = self
            .registry
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);

        for entry in registry.values() {
            entry.reader.cancel();
        }
    }
}

impl<T> fmt::Debug for Dispatcher<T>
where
    T: Send + 'static,
{
    #[cfg_attr(test, mutants::skip)] // No API contract for debug output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("queue", &self.queue)
            .field("handler_count", &self.handler_count())
            .field("stale_event_policy", &self.stale_event_policy)
            .finish_non_exhaustive()
    }
}
