//! Three "sensors" produce readings at different rates on their own threads while a single
//! dispatch loop folds them into one running total without any locking of the total.

use std::cell::Cell;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;
use std::time::Duration;

use reactor::{Cancelled, CancellationToken, Dispatcher, EventHandler, Handle, Payload};

/// Produces `count` readings, one every `interval`, then ends.
struct Sensor {
    value: u32,
    interval: Duration,
    remaining: AtomicU32,
}

impl Handle for Sensor {
    type Item = u32;

    fn read(&self, cancel: &CancellationToken) -> Result<Payload<u32>, Cancelled> {
        cancel.check()?;
        thread::sleep(self.interval);

        let remaining = self.remaining.load(Ordering::Relaxed);

        if remaining == 0 {
            return Ok(Payload::EndOfStream);
        }

        self.remaining.store(remaining - 1, Ordering::Relaxed);
        Ok(Payload::Data(self.value))
    }

    fn close(&self) {
        self.remaining.store(0, Ordering::Relaxed);
    }
}

struct Accumulator {
    name: &'static str,
    sensor: Arc<Sensor>,
}

thread_local! {
    // Only ever touched by the dispatch loop, which runs on the main thread.
    static TOTAL: Cell<u32> = const { Cell::new(0) };
}

impl EventHandler<u32> for Accumulator {
    fn handle(&self) -> Arc<dyn Handle<Item = u32>> {
        Arc::clone(&self.sensor) as Arc<dyn Handle<Item = u32>>
    }

    fn handle_event(&self, dispatcher: &Dispatcher<u32>, payload: Payload<u32>) {
        match payload {
            Payload::Data(value) => {
                let total = TOTAL.get() + value;
                TOTAL.set(total);
                println!("{:>6} +{value:<3} total {total}", self.name);
            }
            Payload::EndOfStream => {
                println!("{:>6} finished", self.name);
                dispatcher
                    .remove_handler(self)
                    .expect("handler removes itself only once");
            }
        }
    }
}

fn main() {
    let dispatcher = Dispatcher::new(8).expect("8 is a valid capacity");

    for (name, value, millis, count) in [("fast", 1, 5, 20), ("medium", 10, 15, 6), ("slow", 100, 40, 2)] {
        let sensor = Arc::new(Sensor {
            value,
            interval: Duration::from_millis(millis),
            remaining: AtomicU32::new(count),
        });

        dispatcher
            .add_handler(Arc::new(Accumulator { name, sensor }))
            .expect("fresh handlers are never already registered");
    }

    dispatcher
        .handle_events()
        .expect("handlers only remove themselves, so no event can go stale");

    println!("grand total {}", TOTAL.get());
}
