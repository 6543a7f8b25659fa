//! # Event Consumer
//!
//! A consumer binds one queue on the bus and runs a dedicated delivery thread
//! that invokes a single callback per delivered event. The thread also
//! answers flush barriers, which is what makes delivery observable in tests
//! without sleeping.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crate::bus::{Envelope, MessageBus};
use crate::event::Event;
use crate::{Error, Result};

/// Binding parameters of a consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerConfig {
    pub exchange: String,
    pub routing_key: String,
    /// Unique queue name; defaults to the routing key.
    pub queue: String,
    /// Free-form owner description (usually the generated type's name).
    pub context: String,
}

impl ConsumerConfig {
    pub fn new(exchange: impl Into<String>, routing_key: impl Into<String>) -> Self {
        let routing_key = routing_key.into();
        Self {
            exchange: exchange.into(),
            queue: routing_key.clone(),
            routing_key,
            context: String::new(),
        }
    }

    pub fn with_queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = queue.into();
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }
}

type Callback = dyn Fn(Event) + Send + Sync;

/// Consumes events for one queue.
pub struct EventConsumer {
    config: ConsumerConfig,
    bus: Arc<dyn MessageBus>,
    callback: Arc<Callback>,
    running: AtomicBool,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl EventConsumer {
    pub fn new(
        bus: Arc<dyn MessageBus>,
        config: ConsumerConfig,
        callback: impl Fn(Event) + Send + Sync + 'static,
    ) -> Self {
        Self {
            config,
            bus,
            callback: Arc::new(callback),
            running: AtomicBool::new(false),
            worker: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ConsumerConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Binds the queue and starts the delivery thread. Starting twice is a no-op.
    pub fn start(&self) -> Result<()> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(());
        }

        let rx = match self.bus.bind(&self.config) {
            Ok(rx) => rx,
            Err(err) => {
                self.running.store(false, Ordering::Release);
                return Err(err);
            }
        };

        let callback = Arc::clone(&self.callback);
        let queue = self.config.queue.clone();
        let spawned = thread::Builder::new()
            .name(format!("vigil-consumer-{queue}"))
            .spawn(move || delivery_loop(queue, rx, callback));

        match spawned {
            Ok(handle) => {
                if let Ok(mut guard) = self.worker.lock() {
                    *guard = Some(handle);
                }
                Ok(())
            }
            Err(err) => {
                self.bus.unbind(&self.config.queue);
                self.running.store(false, Ordering::Release);
                Err(Error::consumer(&self.config.queue, err.to_string()))
            }
        }
    }

    /// Unbinds the queue and waits for the delivery thread to finish.
    pub fn stop(&self) {
        if self
            .running
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        self.bus.unbind(&self.config.queue);

        let handle = self.worker.lock().ok().and_then(|mut guard| guard.take());
        if let Some(handle) = handle {
            // A callback stopping its own consumer must not join itself.
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

impl Drop for EventConsumer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn delivery_loop(queue: String, rx: Receiver<Envelope>, callback: Arc<Callback>) {
    while let Ok(envelope) = rx.recv() {
        match envelope {
            Envelope::Deliver(event) => {
                // A panicking callback drops its event, not the queue.
                let id = event.header().id;
                if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(|| callback(event))) {
                    tracing::error!(
                        queue = %queue,
                        event = %id,
                        panic = panic_message(panic.as_ref()),
                        "consumer callback panicked"
                    );
                }
            }
            Envelope::Flush(response) => {
                let _ = response.send(());
            }
            Envelope::Shutdown => break,
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::LocalBus;
    use crate::event::IntervalEvent;

    #[test]
    fn delivers_on_its_own_thread() {
        let bus = LocalBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let consumer = EventConsumer::new(
            bus.clone(),
            ConsumerConfig::new("ex", "key").with_context("test"),
            move |event| {
                let name = thread::current().name().map(str::to_string);
                sink.lock().unwrap().push((event.event_type(), name));
            },
        );
        consumer.start().unwrap();

        bus.publish("ex", "key", Event::Interval(IntervalEvent::new("* * * * *")))
            .unwrap();
        bus.flush().unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].1.as_deref(), Some("vigil-consumer-key"));
    }

    #[test]
    fn start_is_idempotent_and_stop_unbinds() {
        let bus = LocalBus::new();
        let consumer = EventConsumer::new(bus.clone(), ConsumerConfig::new("ex", "key"), |_| {});
        consumer.start().unwrap();
        consumer.start().unwrap();
        assert_eq!(bus.binding_count(), 1);
        assert!(consumer.is_running());

        consumer.stop();
        assert_eq!(bus.binding_count(), 0);
        assert!(!consumer.is_running());
    }

    #[test]
    fn a_panicking_callback_does_not_stop_delivery() {
        let bus = LocalBus::new();
        let delivered = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&delivered);
        let consumer = EventConsumer::new(bus.clone(), ConsumerConfig::new("ex", "key"), move |_| {
            let mut count = sink.lock().unwrap();
            *count += 1;
            if *count == 1 {
                drop(count);
                panic!("first delivery fails");
            }
        });
        consumer.start().unwrap();

        for _ in 0..3 {
            bus.publish("ex", "key", Event::Interval(IntervalEvent::new("* * * * *")))
                .unwrap();
        }
        bus.flush().unwrap();

        assert_eq!(*delivered.lock().unwrap(), 3);
        assert!(consumer.is_running());
    }

    #[test]
    fn failed_bind_leaves_consumer_stopped() {
        let bus = LocalBus::new();
        let first = EventConsumer::new(bus.clone(), ConsumerConfig::new("ex", "key"), |_| {});
        first.start().unwrap();

        let second = EventConsumer::new(bus.clone(), ConsumerConfig::new("ex", "key"), |_| {});
        assert!(second.start().is_err());
        assert!(!second.is_running());
    }
}
