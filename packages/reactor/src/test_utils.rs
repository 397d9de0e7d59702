//! Scripted sources and recording handlers shared by the unit tests of this crate.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::{Cancelled, CancellationToken, Dispatcher, EventHandler, Handle, Payload, Semaphore};

/// A source that yields whatever the test pushes into it, blocking while it has nothing.
pub(crate) struct ScriptedHandle<T> {
    available: Semaphore,
    script: Mutex<VecDeque<Payload<T>>>,
    closed: AtomicBool,
}

impl<T> ScriptedHandle<T> {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            available: Semaphore::new(0),
            script: Mutex::new(VecDeque::new()),
            closed: AtomicBool::new(false),
        })
    }

    pub(crate) fn push(&self, payload: Payload<T>) {
        self.script.lock().unwrap().push_back(payload);
        self.available.release();
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl<T> Handle for ScriptedHandle<T>
where
    T: Send + 'static,
{
    type Item = T;

    fn read(&self, cancel: &CancellationToken) -> Result<Payload<T>, Cancelled> {
        self.available.acquire(cancel)?;

        Ok(self.script.lock().unwrap().pop_front().unwrap())
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.push(Payload::EndOfStream);
        }
    }
}

/// Records every payload it receives and removes itself upon end of stream.
pub(crate) struct Recorder<T> {
    handle: Arc<ScriptedHandle<T>>,
    received: Mutex<Vec<Payload<T>>>,
}

impl<T> Recorder<T> {
    pub(crate) fn new(handle: Arc<ScriptedHandle<T>>) -> Arc<Self> {
        Arc::new(Self {
            handle,
            received: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn handle_ref(&self) -> &ScriptedHandle<T> {
        &self.handle
    }

    pub(crate) fn received(&self) -> Vec<Payload<T>>
    where
        T: Clone,
    {
        self.received.lock().unwrap().clone()
    }
}

impl<T> EventHandler<T> for Recorder<T>
where
    T: Send + 'static,
{
    fn handle(&self) -> Arc<dyn Handle<Item = T>> {
        Arc::clone(&self.handle) as Arc<dyn Handle<Item = T>>
    }

    fn handle_event(&self, dispatcher: &Dispatcher<T>, payload: Payload<T>) {
        let end_of_stream = payload.is_end_of_stream();

        self.received.lock().unwrap().push(payload);

        if end_of_stream {
            dispatcher.remove_handler(self).unwrap();
        }
    }
}
