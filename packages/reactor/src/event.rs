use std::fmt;
use std::sync::Arc;

use crate::{Dispatcher, EventHandler, HandlerId, Payload};

/// Distinguishes successive registrations of the same handler.
///
/// An event produced under one registration must not be delivered under a later one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Registration(pub(crate) u64);

/// One payload read from a handler's source, on its way to that handler's callback.
///
/// Events are created by reader threads and consumed by the dispatch loop. They are immutable;
/// the only thing to do with one is to [`dispatch()`][Self::dispatch] it.
pub struct Event<T>
where
    T: Send + 'static,
{
    handler: Arc<dyn EventHandler<T>>,
    registration: Registration,
    payload: Payload<T>,
}

impl<T> Event<T>
where
    T: Send + 'static,
{
    pub(crate) fn new(
        handler: Arc<dyn EventHandler<T>>,
        registration: Registration,
        payload: Payload<T>,
    ) -> Self {
        Self {
            handler,
            registration,
            payload,
        }
    }

    /// Identity of the handler whose source produced this event.
    #[must_use]
    pub fn handler_id(&self) -> HandlerId {
        HandlerId::of(&*self.handler)
    }

    /// The payload read from the source.
    #[must_use]
    pub fn payload(&self) -> &Payload<T> {
        &self.payload
    }

    /// Whether the payload is the end-of-stream sentinel.
    #[must_use]
    pub fn is_end_of_stream(&self) -> bool {
        self.payload.is_end_of_stream()
    }

    pub(crate) fn registration(&self) -> Registration {
        self.registration
    }

    /// Delivers the payload to the owning handler's callback.
    pub fn dispatch(self, dispatcher: &Dispatcher<T>) {
        self.handler.handle_event(dispatcher, self.payload);
    }
}

impl<T> fmt::Debug for Event<T>
where
    T: Send + 'static,
{
    #[cfg_attr(test, mutants::skip)] // No API contract for debug output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("handler", &self.handler_id())
            .field("registration", &self.registration)
            .field("end_of_stream", &self.is_end_of_stream())
            .finish_non_exhaustive()
    }
}
