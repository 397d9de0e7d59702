use std::fmt;
use std::sync::Arc;

use crate::{Cancelled, CancellationToken, Dispatcher};

/// One result of reading from a [`Handle`]: either a value or the end of the stream.
///
/// End of stream is ordinary data flow, not an error. It travels through the queue like any
/// other payload and is delivered to [`EventHandler::handle_event()`].
#[derive(Clone, Debug, PartialEq, Eq)]
#[expect(
    clippy::exhaustive_enums,
    reason = "a value or the end of the stream, nothing else can come out of a source"
)]
pub enum Payload<T> {
    /// A value produced by the source.
    Data(T),

    /// The source has no more data. Nothing further is read from the source after this.
    EndOfStream,
}

impl<T> Payload<T> {
    /// Whether this is the end-of-stream sentinel.
    #[must_use]
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, Self::EndOfStream)
    }

    /// The carried value, if this is not the end-of-stream sentinel.
    #[must_use]
    pub fn into_data(self) -> Option<T> {
        match self {
            Self::Data(value) => Some(value),
            Self::EndOfStream => None,
        }
    }
}

/// A blocking source of values, read by a dedicated reader thread.
///
/// Failures of the underlying source (for example an I/O error on a socket) are expected to be
/// reported as [`Payload::EndOfStream`], so that a broken source is handled the same way as a
/// gracefully closed one.
pub trait Handle: Send + Sync {
    /// The type of value produced by the source.
    type Item: Send + 'static;

    /// Blocks until the source produces a value or reaches its end.
    ///
    /// Implementations that block on something other than this crate's primitives cannot be
    /// woken by `cancel` and must instead return promptly once [`close()`][Self::close] is called.
    ///
    /// # Errors
    ///
    /// Returns [`Cancelled`] if the read was abandoned due to cancellation.
    fn read(&self, cancel: &CancellationToken) -> Result<Payload<Self::Item>, Cancelled>;

    /// Closes the source, making any blocked or future [`read()`][Self::read] return promptly.
    ///
    /// Must be idempotent. Failures are swallowed - this is a best-effort operation.
    fn close(&self);
}

/// Application logic attached to exactly one [`Handle`].
///
/// [`handle_event()`][Self::handle_event] is only ever called from the dispatch loop
/// ([`Dispatcher::handle_events()`]), one call at a time across all handlers of the same
/// dispatcher. Callbacks may therefore mutate state shared between handlers without contention.
pub trait EventHandler<T>: Send + Sync
where
    T: Send + 'static,
{
    /// The source this handler consumes. Must return the same handle for the handler's lifetime.
    fn handle(&self) -> Arc<dyn Handle<Item = T>>;

    /// Processes one payload read from the handler's source.
    ///
    /// The dispatcher is passed in so that the callback can register or remove handlers,
    /// including itself (typically upon receiving [`Payload::EndOfStream`]).
    fn handle_event(&self, dispatcher: &Dispatcher<T>, payload: Payload<T>);
}

/// Identifies a handler by the address of the handler object.
///
/// Two live handlers never share an identity. The identity of a dropped handler may be reused
/// by a new one; the dispatcher keeps registered handlers alive, so this cannot confuse it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HandlerId(usize);

impl HandlerId {
    /// Returns the identity of `handler`.
    ///
    /// The same object yields the same identity whether accessed through an `Arc`, a reference
    /// or `&self` inside a callback.
    #[must_use]
    pub fn of<H>(handler: &H) -> Self
    where
        H: ?Sized,
    {
        Self(std::ptr::from_ref(handler).cast::<()>().addr())
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}
