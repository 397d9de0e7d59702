use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, trace};

use crate::event::Registration;
use crate::metrics::{EVENTS_ENQUEUED, READERS_STARTED};
use crate::{BoundedEventQueue, CancellationToken, Error, Event, EventHandler, HandlerId, Result};

/// The thread that reads one handler's source and feeds the shared queue.
///
/// Dropping this does not stop the thread; [`cancel()`][Self::cancel] does, cooperatively.
#[derive(Debug)]
pub(crate) struct ReaderTask {
    cancel: CancellationToken,

    // Never joined. Removal does not wait for the reader to exit.
    _thread: JoinHandle<()>,
}

impl ReaderTask {
    pub(crate) fn spawn<T>(
        thread_name: String,
        handler: Arc<dyn EventHandler<T>>,
        registration: Registration,
        queue: Arc<BoundedEventQueue<Event<T>>>,
    ) -> Result<Self>
    where
        T: Send + 'static,
    {
        let cancel = CancellationToken::new();

        let thread = thread::Builder::new()
            .name(thread_name)
            .spawn({
                let cancel = cancel.clone();
                move || read_until_done(&handler, registration, &queue, &cancel)
            })
            .map_err(Error::ReaderSpawn)?;

        READERS_STARTED.with(nm::Event::observe_once);

        Ok(Self {
            cancel,
            _thread: thread,
        })
    }

    /// Signals the reader to stop. Does not wait for it to do so.
    pub(crate) fn cancel(&self) {
        self.cancel.cancel();
    }
}

fn read_until_done<T>(
    handler: &Arc<dyn EventHandler<T>>,
    registration: Registration,
    queue: &BoundedEventQueue<Event<T>>,
    cancel: &CancellationToken,
) where
    T: Send + 'static,
{
    let handler_id = HandlerId::of(&**handler);
    let handle = handler.handle();

    debug!(handler = %handler_id, "reader started");

    while !cancel.is_cancelled() {
        let Ok(payload) = handle.read(cancel) else {
            break;
        };

        let end_of_stream = payload.is_end_of_stream();
        let event = Event::new(Arc::clone(handler), registration, payload);

        if queue.enqueue(event, cancel).is_err() {
            break;
        }

        EVENTS_ENQUEUED.with(nm::Event::observe_once);
        trace!(handler = %handler_id, end_of_stream, "event enqueued");

        if end_of_stream {
            break;
        }
    }

    debug!(
        handler = %handler_id,
        cancelled = cancel.is_cancelled(),
        "reader stopped"
    );
}
