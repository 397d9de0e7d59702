// A poisoned lock means some thread panicked while mutating dispatcher state. The queue
// accounting or the handler registry can no longer be trusted, so we panic too.
pub(crate) const ERR_POISONED_LOCK: &str = "encountered poisoned lock - continued execution \
    is not safe because queue and registry invariants can no longer be guaranteed";

/// Queue capacity used by [`DispatcherBuilder`][crate::DispatcherBuilder] when none is specified.
pub const DEFAULT_CAPACITY: usize = 128;

pub(crate) const DEFAULT_READER_THREAD_NAME: &str = "reactor-reader";
