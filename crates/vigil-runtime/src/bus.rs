//! # Message Bus
//!
//! The delivery substrate: publishers tag events with an exchange and a
//! routing key, consumers bind a queue to an (exchange, routing key) pair and
//! receive matching events asynchronously on their own thread.
//!
//! [`LocalBus`] is the in-process implementation. Routing is exact-match on
//! both exchange and routing key.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::consumer::ConsumerConfig;
use crate::event::Event;
use crate::{Error, Result};

/// Exchange that probes publish on.
pub const PROBE_EXCHANGE: &str = "vigil.probes";

/// Upper bound for [`LocalBus::flush`] to wait on one consumer.
const FLUSH_TIMEOUT_MS: u64 = 5_000;

/// Messages flowing from the bus to a bound consumer.
#[derive(Debug)]
pub enum Envelope {
    Deliver(Event),
    /// Barrier: the consumer answers once everything before it was handled.
    Flush(Sender<()>),
    Shutdown,
}

/// Capability of the message substrate.
pub trait MessageBus: Send + Sync {
    /// Publishes an event. Returns the number of queues it was routed to.
    fn publish(&self, exchange: &str, routing_key: &str, event: Event) -> Result<usize>;

    /// Binds a queue and returns the receiving end of its deliveries.
    fn bind(&self, config: &ConsumerConfig) -> Result<Receiver<Envelope>>;

    /// Removes a queue binding, telling its consumer to shut down.
    fn unbind(&self, queue: &str);
}

struct Binding {
    exchange: String,
    routing_key: String,
    queue: String,
    tx: Sender<Envelope>,
}

/// In-process message bus.
#[derive(Default)]
pub struct LocalBus {
    bindings: RwLock<Vec<Binding>>,
}

impl LocalBus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Number of bound queues.
    pub fn binding_count(&self) -> usize {
        self.bindings.read().map(|g| g.len()).unwrap_or(0)
    }

    /// Queue names bound to an exchange and routing key.
    pub fn queues_for(&self, exchange: &str, routing_key: &str) -> Vec<String> {
        self.bindings
            .read()
            .map(|guard| {
                guard
                    .iter()
                    .filter(|b| b.exchange == exchange && b.routing_key == routing_key)
                    .map(|b| b.queue.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Waits until every bound consumer has handled everything published so far.
    pub fn flush(&self) -> Result<()> {
        let (response_tx, response_rx) = mpsc::channel();
        let mut pending = 0usize;
        {
            let guard = self
                .bindings
                .read()
                .map_err(|_| Error::Internal("bus bindings poisoned".to_string()))?;
            for binding in guard.iter() {
                if binding.tx.send(Envelope::Flush(response_tx.clone())).is_ok() {
                    pending += 1;
                }
            }
        }
        drop(response_tx);

        for _ in 0..pending {
            response_rx
                .recv_timeout(Duration::from_millis(FLUSH_TIMEOUT_MS))
                .map_err(|_| Error::Internal("consumer did not acknowledge flush".to_string()))?;
        }
        Ok(())
    }
}

impl MessageBus for LocalBus {
    fn publish(&self, exchange: &str, routing_key: &str, event: Event) -> Result<usize> {
        let guard = self
            .bindings
            .read()
            .map_err(|_| Error::Internal("bus bindings poisoned".to_string()))?;

        let mut routed = 0;
        for binding in guard
            .iter()
            .filter(|b| b.exchange == exchange && b.routing_key == routing_key)
        {
            if binding.tx.send(Envelope::Deliver(event.clone())).is_ok() {
                routed += 1;
            }
        }
        Ok(routed)
    }

    fn bind(&self, config: &ConsumerConfig) -> Result<Receiver<Envelope>> {
        let mut guard = self
            .bindings
            .write()
            .map_err(|_| Error::Internal("bus bindings poisoned".to_string()))?;

        if guard.iter().any(|b| b.queue == config.queue) {
            return Err(Error::consumer(&config.queue, "queue is already bound"));
        }

        let (tx, rx) = mpsc::channel();
        guard.push(Binding {
            exchange: config.exchange.clone(),
            routing_key: config.routing_key.clone(),
            queue: config.queue.clone(),
            tx,
        });
        Ok(rx)
    }

    fn unbind(&self, queue: &str) {
        if let Ok(mut guard) = self.bindings.write() {
            if let Some(pos) = guard.iter().position(|b| b.queue == queue) {
                let binding = guard.remove(pos);
                let _ = binding.tx.send(Envelope::Shutdown);
            }
        }
    }
}
