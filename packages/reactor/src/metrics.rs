use nm::Event;

// Observations show up in `nm::Report::collect()` under these names.
thread_local! {
    pub(crate) static EVENTS_ENQUEUED: Event = Event::builder()
        .name("reactor_events_enqueued")
        .build();

    pub(crate) static EVENTS_DISPATCHED: Event = Event::builder()
        .name("reactor_events_dispatched")
        .build();

    pub(crate) static EVENTS_STALE: Event = Event::builder()
        .name("reactor_events_stale")
        .build();

    pub(crate) static EVENTS_DISCARDED_ON_EXIT: Event = Event::builder()
        .name("reactor_events_discarded_on_exit")
        .build();

    pub(crate) static READERS_STARTED: Event = Event::builder()
        .name("reactor_readers_started")
        .build();
}
