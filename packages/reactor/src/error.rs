use std::io;

use thiserror::Error;

use crate::HandlerId;

/// Errors returned by the dispatcher and the bounded queue.
///
/// Every variant signals a violated precondition or an environment failure. Cancellation is
/// not an error in this sense and is reported separately via [`Cancelled`][crate::Cancelled].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A queue was requested with room for zero items.
    #[error("queue capacity must be at least 1, got {capacity}")]
    InvalidCapacity {
        /// The rejected capacity.
        capacity: usize,
    },

    /// `add_handler()` was called for a handler that is already registered.
    #[error("handler {handler} is already registered")]
    AlreadyRegistered {
        /// Identity of the offending handler.
        handler: HandlerId,
    },

    /// `remove_handler()` was called for a handler that is not currently registered.
    #[error("handler {handler} is not registered")]
    NotRegistered {
        /// Identity of the offending handler.
        handler: HandlerId,
    },

    /// The dispatch loop dequeued an event whose handler registration no longer exists.
    ///
    /// This is only reported under [`StaleEventPolicy::Fail`][crate::StaleEventPolicy::Fail]
    /// and ends the dispatch loop.
    #[error("event for handler {handler} arrived after the handler was removed")]
    StaleEvent {
        /// Identity of the handler the event was produced for.
        handler: HandlerId,
    },

    /// `handle_events()` was called while the dispatch loop was already running.
    ///
    /// Each dispatcher has exactly one dispatch loop, which is what serializes the callbacks.
    #[error("the dispatch loop is already running")]
    LoopAlreadyRunning,

    /// The operating system refused to start a reader thread.
    #[error("failed to start reader thread: {0}")]
    ReaderSpawn(#[source] io::Error),
}

/// A specialized `Result` type for dispatcher operations, returning the crate's
/// [`Error`] type as the error value.
pub type Result<T> = std::result::Result<T, Error>;
