/// Determines what the dispatch loop does with an event whose handler is no longer registered.
///
/// Such a stale event arises when a handler is removed while events it produced are still
/// queued. If only the handler's own callback ever removes it, and only after receiving its
/// end-of-stream payload, no stale event can arise and the default is the right choice.
///
/// # Examples
///
/// ```
/// use reactor::{Dispatcher, StaleEventPolicy};
///
/// // A lobby that kicks other players needs to tolerate their in-flight input.
/// let dispatcher = Dispatcher::<String>::builder()
///     .stale_event_policy(StaleEventPolicy::Discard)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub enum StaleEventPolicy {
    /// A stale event is treated as a broken invariant: the dispatch loop stops and
    /// [`handle_events()`][crate::Dispatcher::handle_events] returns
    /// [`Error::StaleEvent`][crate::Error::StaleEvent]. This is the default.
    #[default]
    Fail,

    /// A stale event is logged and dropped without invoking any callback.
    Discard,
}
