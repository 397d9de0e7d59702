#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! A reactor-style dispatch core: any number of blocking data sources in, one strictly
//! sequential stream of callbacks out.
//!
//! Application code registers [`EventHandler`]s with a [`Dispatcher`]. Each handler owns a
//! [`Handle`] - a blocking source such as a network connection - and the dispatcher starts one
//! reader thread per handler to read from it. Everything the readers produce is funneled into a
//! single [`BoundedEventQueue`], which the dispatch loop drains one [`Event`] at a time, invoking
//! the owning handler's callback for each.
//!
//! Because all callbacks run on the dispatch loop, one after another, they can mutate state
//! shared between handlers (for example the state of a game with many connected players)
//! without any contention, even though the sources are read concurrently.
//!
//! ```text
//!  Handle A ──► reader thread A ──┐
//!  Handle B ──► reader thread B ──┼──► BoundedEventQueue ──► dispatch loop ──► callbacks
//!  Handle C ──► reader thread C ──┘     (backpressure)         (one at a time)
//! ```
//!
//! # Building blocks
//!
//! * [`Semaphore`] - a counting semaphore with cancellable acquisition and an atomic
//!   [`acquire_all()`][Semaphore::acquire_all].
//! * [`BoundedEventQueue`] - a bounded multi-producer FIFO built from two semaphores, with
//!   blocking `enqueue`/`dequeue` and a bulk [`drain_all()`][BoundedEventQueue::drain_all].
//! * [`CancellationToken`] - cooperative cancellation of any blocking operation above.
//! * [`Dispatcher`] - the handler registry, reader threads and dispatch loop.
//!
//! # Example
//!
//! ```
//! use std::sync::{Arc, Mutex};
//!
//! use reactor::{Cancelled, CancellationToken, Dispatcher, EventHandler, Handle, Payload};
//!
//! /// Yields the given words, then end of stream.
//! struct Words(Mutex<Vec<&'static str>>);
//!
//! impl Handle for Words {
//!     type Item = &'static str;
//!
//!     fn read(&self, cancel: &CancellationToken) -> Result<Payload<&'static str>, Cancelled> {
//!         cancel.check()?;
//!
//!         Ok(match self.0.lock().unwrap().pop() {
//!             Some(word) => Payload::Data(word),
//!             None => Payload::EndOfStream,
//!         })
//!     }
//!
//!     fn close(&self) {}
//! }
//!
//! struct Collector {
//!     words: Arc<Words>,
//!     seen: Arc<Mutex<Vec<&'static str>>>,
//! }
//!
//! impl EventHandler<&'static str> for Collector {
//!     fn handle(&self) -> Arc<dyn Handle<Item = &'static str>> {
//!         Arc::clone(&self.words) as Arc<dyn Handle<Item = &'static str>>
//!     }
//!
//!     fn handle_event(&self, dispatcher: &Dispatcher<&'static str>, payload: Payload<&'static str>) {
//!         match payload {
//!             Payload::Data(word) => self.seen.lock().unwrap().push(word),
//!             Payload::EndOfStream => dispatcher.remove_handler(self).unwrap(),
//!         }
//!     }
//! }
//!
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let dispatcher = Dispatcher::new(8).unwrap();
//!
//! dispatcher
//!     .add_handler(Arc::new(Collector {
//!         words: Arc::new(Words(Mutex::new(vec!["world", "hello"]))),
//!         seen: Arc::clone(&seen),
//!     }))
//!     .unwrap();
//!
//! dispatcher.handle_events().unwrap();
//!
//! assert_eq!(*seen.lock().unwrap(), vec!["hello", "world"]);
//! ```
//!
//! # Observability
//!
//! The crate logs handler and reader lifecycle via [`tracing`] and counts enqueued, dispatched
//! and discarded events via [`nm`]; see `nm::Report::collect()`.

mod builder;
mod cancellation;
mod constants;
mod dispatcher;
mod error;
mod event;
mod handler;
mod metrics;
mod queue;
mod reader;
mod semaphore;
mod stale_event_policy;

#[cfg(test)]
mod test_utils;

pub use builder::DispatcherBuilder;
pub(crate) use cancellation::Interrupt;
pub use cancellation::{Cancelled, CancellationToken};
pub use constants::DEFAULT_CAPACITY;
pub use dispatcher::Dispatcher;
pub use error::{Error, Result};
pub use event::Event;
pub use handler::{EventHandler, Handle, HandlerId, Payload};
pub use queue::BoundedEventQueue;
pub use semaphore::Semaphore;
pub use stale_event_policy::StaleEventPolicy;
