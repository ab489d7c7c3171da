//! Bounded, single-producer, multi-consumer ring-buffer event bus.
//!
//! One bus instance handles one event type. Capacity and the maximum
//! consumer count are fixed at the type level (`CAP`, `MAX_CONSUMERS`) so
//! slot storage is a flat, cache-line-padded array with no reallocation
//! once built. A producer thread calls [`EventBus::publish`] or
//! [`EventBus::try_publish`]; consumers are registered with
//! [`EventBus::subscribe`] before [`EventBus::start`] and each run on their
//! own thread until [`EventBus::stop`].
//!
//! Safety argument for in-place slot reuse: a slot holding sequence `p` is
//! only overwritten once every subscribed consumer — required and
//! optional alike — has recorded `p` as consumed. That condition
//! (`min_consumed() >= p`) is checked by the producer before it destroys
//! the old payload and constructs the new one, so no consumer ever reads a
//! slot mid-reconstruction.

pub mod config;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod outcome;

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::utils::CachePadded;

pub use config::{CoreAffinityClass, EventBusConfig, SubscribeOptions};
#[cfg(feature = "metrics")]
pub use metrics::{BusMetricFlags, BusMetrics};
pub use outcome::{PublishOutcome, SubscribeError};

use crate::backoff::Backoff;

const CONSTRUCTED_EMPTY: u8 = 0;
const CONSTRUCTED_EVENT: u8 = 1;
const CONSTRUCTED_PLACEHOLDER: u8 = 2;

/// Implemented by event types that carry a bus-assigned sequence field.
/// The default implementation does nothing, so types with no such field
/// can still be published on a bus.
pub trait Sequenced {
    /// Called by the bus immediately before an event is stored in its
    /// slot, with the sequence number just reserved for it.
    fn set_tick_sequence(&mut self, _seq: i64) {}
}

struct Slot<E> {
    published: AtomicI64,
    constructed: AtomicU8,
    cell: UnsafeCell<Option<E>>,
}

// SAFETY: access to `cell` is serialized by the bus's gating protocol —
// only the producer writes, and only after `min_consumed()` confirms no
// reader still holds a reference to the previous occupant.
unsafe impl<E: Send> Sync for Slot<E> {}

impl<E> Slot<E> {
    fn new() -> Self {
        Self {
            published: AtomicI64::new(-1),
            constructed: AtomicU8::new(CONSTRUCTED_EMPTY),
            cell: UnsafeCell::new(None),
        }
    }

    /// # Safety
    /// Caller must have established that no consumer holds a reference
    /// into this slot (via the `min_consumed()` gate).
    unsafe fn take_for_destroy(&self) -> Option<E> {
        unsafe { (*self.cell.get()).take() }
    }

    /// # Safety
    /// Same precondition as [`Self::take_for_destroy`].
    unsafe fn write_event(&self, event: E) {
        unsafe {
            *self.cell.get() = Some(event);
        }
    }

    /// # Safety
    /// Caller must have observed `published == seq` via an acquire load,
    /// establishing happens-before with the producer's release store.
    unsafe fn read(&self) -> &E {
        unsafe {
            (*self.cell.get())
                .as_ref()
                .expect("slot marked CONSTRUCTED_EVENT but cell is empty")
        }
    }
}

struct ConsumerShared {
    consumed: AtomicI64,
    required: bool,
}

struct PendingConsumer<E> {
    shared: Arc<ConsumerShared>,
    listener: Box<dyn FnMut(&E) + Send>,
    options: SubscribeOptions,
}

struct Inner<E, const CAP: usize, const MAX_CONSUMERS: usize> {
    slots: Box<[CachePadded<Slot<E>>]>,
    next_seq: AtomicI64,
    published_high_water: AtomicI64,
    config: EventBusConfig,
    pending: Mutex<Vec<PendingConsumer<E>>>,
    consumers: OnceLock<Vec<Arc<ConsumerShared>>>,
    started: AtomicBool,
    stopped: AtomicBool,
    threads: Mutex<Vec<JoinHandle<()>>>,
    #[cfg(feature = "metrics")]
    published_count: AtomicI64,
    #[cfg(feature = "metrics")]
    timeout_count: AtomicI64,
}

/// A bounded ring-buffer event bus for one event type `E`, with a
/// compile-time power-of-two capacity `CAP` and a compile-time consumer
/// ceiling `MAX_CONSUMERS`.
pub struct EventBus<E, const CAP: usize, const MAX_CONSUMERS: usize>(
    Arc<Inner<E, CAP, MAX_CONSUMERS>>,
);

impl<E, const CAP: usize, const MAX_CONSUMERS: usize> Clone for EventBus<E, CAP, MAX_CONSUMERS> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<E, const CAP: usize, const MAX_CONSUMERS: usize> EventBus<E, CAP, MAX_CONSUMERS>
where
    E: Send + 'static,
{
    /// Builds a new bus. Panics if `CAP` is not a power of two.
    #[must_use]
    pub fn new(config: EventBusConfig) -> Self {
        assert!(CAP.is_power_of_two(), "EventBus capacity must be a power of two");
        let slots = (0..CAP)
            .map(|_| CachePadded::new(Slot::new()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self(Arc::new(Inner {
            slots,
            next_seq: AtomicI64::new(0),
            published_high_water: AtomicI64::new(-1),
            config,
            pending: Mutex::new(Vec::new()),
            consumers: OnceLock::new(),
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            threads: Mutex::new(Vec::new()),
            #[cfg(feature = "metrics")]
            published_count: AtomicI64::new(0),
            #[cfg(feature = "metrics")]
            timeout_count: AtomicI64::new(0),
        }))
    }

    /// Reads the counters selected by `flags`. Requires the `metrics`
    /// feature.
    #[cfg(feature = "metrics")]
    #[must_use]
    pub fn metrics(&self, flags: BusMetricFlags) -> BusMetrics {
        BusMetrics {
            published: if flags.contains(BusMetricFlags::PUBLISHED) {
                self.0.published_count.load(Ordering::Relaxed) as u64
            } else {
                0
            },
            timeouts: if flags.contains(BusMetricFlags::TIMEOUTS) {
                self.0.timeout_count.load(Ordering::Relaxed) as u64
            } else {
                0
            },
        }
    }

    /// Registers a consumer. Must be called before [`Self::start`].
    ///
    /// `required` consumers gate slot reclaim and backpressure; `optional`
    /// consumers do not gate reclaim but the producer still waits for them
    /// before destroying a slot's previous occupant.
    pub fn subscribe(
        &self,
        required: bool,
        options: SubscribeOptions,
        listener: impl FnMut(&E) + Send + 'static,
    ) -> Result<(), SubscribeError> {
        if self.0.started.load(Ordering::Acquire) {
            return Err(SubscribeError::AlreadyStarted);
        }
        let mut pending = self.0.pending.lock().expect("pending consumer lock poisoned");
        if pending.len() >= MAX_CONSUMERS {
            return Err(SubscribeError::TooManyConsumers);
        }
        pending.push(PendingConsumer {
            shared: Arc::new(ConsumerShared {
                consumed: AtomicI64::new(-1),
                required,
            }),
            listener: Box::new(listener),
            options,
        });
        Ok(())
    }

    /// Spawns one thread per registered consumer. Idempotent: calling
    /// `start()` a second time is a no-op.
    pub fn start(&self) {
        if self.0.started.swap(true, Ordering::AcqRel) {
            return;
        }
        let drained: Vec<_> = {
            let mut pending = self.0.pending.lock().expect("pending consumer lock poisoned");
            pending.drain(..).collect()
        };
        let mut shared_list = Vec::with_capacity(drained.len());
        let mut threads = self.0.threads.lock().expect("thread list lock poisoned");
        for pc in drained {
            shared_list.push(pc.shared.clone());
            let inner = self.0.clone();
            let shared = pc.shared.clone();
            let listener = pc.listener;
            let affinity = pc.options.affinity;
            threads.push(thread::spawn(move || {
                if let Some(class) = affinity {
                    try_pin_current_thread(class);
                }
                run_consumer::<E, CAP, MAX_CONSUMERS>(inner, shared, listener);
            }));
        }
        drop(threads);
        let _ = self.0.consumers.set(shared_list);
        tracing::info!(capacity = CAP, max_consumers = MAX_CONSUMERS, "event bus started");
    }

    fn min_consumed(&self) -> i64 {
        match self.0.consumers.get() {
            Some(consumers) if !consumers.is_empty() => consumers
                .iter()
                .map(|c| c.consumed.load(Ordering::Acquire))
                .min()
                .unwrap_or(i64::MAX),
            _ => i64::MAX,
        }
    }

    fn min_gating(&self) -> i64 {
        match self.0.consumers.get() {
            Some(consumers) => consumers
                .iter()
                .filter(|c| c.required)
                .map(|c| c.consumed.load(Ordering::Acquire))
                .min()
                .unwrap_or(i64::MAX),
            None => i64::MAX,
        }
    }

    fn reserve_seq(&self) -> Option<i64> {
        loop {
            let cur = self.0.next_seq.load(Ordering::Acquire);
            if cur == i64::MAX {
                return None;
            }
            if self
                .0
                .next_seq
                .compare_exchange(cur, cur + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return Some(cur);
            }
        }
    }

    fn do_publish(&self, mut event: E, deadline: Option<Instant>) -> PublishOutcome
    where
        E: Sequenced,
    {
        if self.0.stopped.load(Ordering::Acquire) {
            return PublishOutcome::Stopped;
        }
        let Some(seq) = self.reserve_seq() else {
            return PublishOutcome::Stopped;
        };
        let slot = &self.0.slots[(seq as usize) & (CAP - 1)];
        let old_seq = seq - CAP as i64;

        if old_seq >= 0 {
            let mut backoff = Backoff::new(self.0.config.backoff_mode);
            loop {
                if self.0.stopped.load(Ordering::Acquire) {
                    return PublishOutcome::Stopped;
                }
                if self.min_consumed() >= old_seq {
                    break;
                }
                if let Some(dl) = deadline {
                    if Instant::now() >= dl {
                        slot.constructed.store(CONSTRUCTED_PLACEHOLDER, Ordering::Release);
                        slot.published.store(seq, Ordering::Release);
                        self.0.published_high_water.store(seq, Ordering::Release);
                        #[cfg(feature = "metrics")]
                        self.0.timeout_count.fetch_add(1, Ordering::Relaxed);
                        return PublishOutcome::Timeout(seq);
                    }
                }
                backoff.spin();
            }
        }

        event.set_tick_sequence(seq);
        // SAFETY: the wait above established min_consumed() >= old_seq, so
        // no consumer still holds a reference into this slot.
        unsafe {
            let _ = slot.take_for_destroy();
            slot.write_event(event);
        }
        slot.constructed.store(CONSTRUCTED_EVENT, Ordering::Release);
        slot.published.store(seq, Ordering::Release);
        self.0.published_high_water.store(seq, Ordering::Release);
        #[cfg(feature = "metrics")]
        {
            self.0.published_count.fetch_add(1, Ordering::Relaxed);
            ::metrics::counter!("flox_bus_published_total").increment(1);
        }
        PublishOutcome::Published(seq)
    }

    /// Publishes `event`, blocking (with back-off) until a slot is free.
    pub fn publish(&self, event: E) -> PublishOutcome
    where
        E: Sequenced,
    {
        self.do_publish(event, None)
    }

    /// Publishes `event`, but if no slot frees up within `timeout`, writes
    /// a placeholder instead and returns [`PublishOutcome::Timeout`].
    pub fn try_publish(&self, event: E, timeout: Duration) -> PublishOutcome
    where
        E: Sequenced,
    {
        self.do_publish(event, Some(Instant::now() + timeout))
    }

    /// Blocks until every required consumer's cursor has reached the most
    /// recently published sequence.
    pub fn flush(&self) {
        let target = self.0.published_high_water.load(Ordering::Acquire);
        if target < 0 {
            return;
        }
        let mut backoff = Backoff::new(self.0.config.backoff_mode);
        while self.min_gating() < target {
            backoff.spin();
        }
    }

    /// Signals every consumer thread to stop, joins them, and destroys any
    /// slot still holding a constructed event.
    pub fn stop(&self) {
        self.0.stopped.store(true, Ordering::Release);
        let mut threads = self.0.threads.lock().expect("thread list lock poisoned");
        for handle in threads.drain(..) {
            let _ = handle.join();
        }
        drop(threads);
        for slot in self.0.slots.iter() {
            // SAFETY: all consumer threads have joined; nothing else reads slots.
            unsafe {
                let _ = slot.take_for_destroy();
            }
            slot.constructed.store(CONSTRUCTED_EMPTY, Ordering::Release);
            slot.published.store(-1, Ordering::Release);
        }
        self.0.published_high_water.store(-1, Ordering::Release);
        tracing::info!("event bus stopped");
    }
}

fn run_consumer<E, const CAP: usize, const MAX_CONSUMERS: usize>(
    inner: Arc<Inner<E, CAP, MAX_CONSUMERS>>,
    shared: Arc<ConsumerShared>,
    mut listener: Box<dyn FnMut(&E) + Send>,
) where
    E: Send + 'static,
{
    let mut backoff = Backoff::new(inner.config.backoff_mode);
    let mut next: i64 = 0;
    loop {
        let slot = &inner.slots[(next as usize) & (CAP - 1)];
        loop {
            let published = slot.published.load(Ordering::Acquire);
            if published == next {
                backoff.note_progress();
                break;
            }
            if inner.stopped.load(Ordering::Acquire) {
                let high_water = inner.published_high_water.load(Ordering::Acquire);
                if !inner.config.drain_on_stop || next > high_water {
                    return;
                }
            }
            backoff.spin();
        }

        let constructed = slot.constructed.load(Ordering::Acquire);
        if constructed != CONSTRUCTED_PLACEHOLDER {
            // SAFETY: published == next, release-stored by the producer
            // after construction; this load acquires that write.
            let event_ref = unsafe { slot.read() };
            listener(event_ref);
        }
        // Placeholders are skipped for both required and optional
        // consumers: no listener call, but the cursor still advances so
        // gating is preserved.
        shared.consumed.store(next, Ordering::Release);
        next += 1;
    }
}

fn try_pin_current_thread(class: CoreAffinityClass) {
    tracing::debug!(
        ?class,
        "CPU affinity requested but no pinning backend is linked in this build; continuing unpinned"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Debug, Clone)]
    struct Counter {
        value: u64,
        tick_sequence: i64,
    }

    impl Sequenced for Counter {
        fn set_tick_sequence(&mut self, seq: i64) {
            self.tick_sequence = seq;
        }
    }

    #[test]
    fn single_required_consumer_receives_all_events_in_order() {
        let bus: EventBus<Counter, 8, 4> = EventBus::new(EventBusConfig::default());
        let received = Arc::new(Mutex::new(Vec::new()));
        let received_clone = received.clone();
        bus.subscribe(true, SubscribeOptions::default(), move |event: &Counter| {
            received_clone.lock().unwrap().push(event.value);
        })
        .unwrap();
        bus.start();
        for i in 0..100u64 {
            let outcome = bus.publish(Counter { value: i, tick_sequence: -1 });
            assert_eq!(outcome, PublishOutcome::Published(i as i64));
        }
        bus.flush();
        bus.stop();
        let got = received.lock().unwrap().clone();
        assert_eq!(got, (0..100u64).collect::<Vec<_>>());
    }

    #[test]
    fn optional_consumer_skips_placeholders() {
        // Capacity 2: the first two publishes land in distinct slots and
        // always succeed; the third and fourth must reclaim a slot still
        // held by the stalled required consumer, so they time out.
        let bus: EventBus<Counter, 2, 4> = EventBus::new(EventBusConfig {
            backoff_mode: crate::backoff::BackoffMode::Aggressive,
            drain_on_stop: true,
        });
        let required_gate = Arc::new(Mutex::new(()));
        let required_gate_clone = required_gate.clone();
        let required_lock = required_gate.lock().unwrap();
        let required_count = Arc::new(Mutex::new(0u64));
        let required_count_clone = required_count.clone();
        bus.subscribe(true, SubscribeOptions::default(), move |_event: &Counter| {
            let _guard = required_gate_clone.lock().unwrap();
            *required_count_clone.lock().unwrap() += 1;
        })
        .unwrap();
        let optional_count = Arc::new(Mutex::new(0u64));
        let optional_count_clone = optional_count.clone();
        bus.subscribe(false, SubscribeOptions::default(), move |_event: &Counter| {
            *optional_count_clone.lock().unwrap() += 1;
        })
        .unwrap();
        bus.start();

        let first = bus.publish(Counter { value: 0, tick_sequence: -1 });
        assert_eq!(first, PublishOutcome::Published(0));
        let second = bus.publish(Counter { value: 1, tick_sequence: -1 });
        assert_eq!(second, PublishOutcome::Published(1));
        // The required consumer is stuck processing seq 0; seq 2 and seq 3
        // each need to reclaim a slot it hasn't released yet.
        for expected_seq in 2..4 {
            let outcome = bus.try_publish(
                Counter { value: expected_seq as u64, tick_sequence: -1 },
                Duration::from_millis(0),
            );
            assert_eq!(outcome, PublishOutcome::Timeout(expected_seq));
        }
        drop(required_lock);
        bus.flush();
        bus.stop();
        // Both consumers observe the two real events and silently skip
        // the two placeholders that absorbed seq 2 and seq 3.
        assert_eq!(*optional_count.lock().unwrap(), 2);
        assert_eq!(*required_count.lock().unwrap(), 2);
    }

    #[test]
    fn subscribe_after_start_is_rejected() {
        let bus: EventBus<Counter, 4, 2> = EventBus::new(EventBusConfig::default());
        bus.start();
        let err = bus
            .subscribe(true, SubscribeOptions::default(), |_: &Counter| {})
            .unwrap_err();
        assert_eq!(err, SubscribeError::AlreadyStarted);
        bus.stop();
    }

    #[test]
    fn subscriber_overflow_is_rejected() {
        let bus: EventBus<Counter, 4, 1> = EventBus::new(EventBusConfig::default());
        bus.subscribe(true, SubscribeOptions::default(), |_: &Counter| {})
            .unwrap();
        let err = bus
            .subscribe(true, SubscribeOptions::default(), |_: &Counter| {})
            .unwrap_err();
        assert_eq!(err, SubscribeError::TooManyConsumers);
    }

    #[cfg(feature = "metrics")]
    #[test]
    fn metrics_count_published_and_timeouts() {
        let bus: EventBus<Counter, 2, 1> = EventBus::new(EventBusConfig {
            backoff_mode: crate::backoff::BackoffMode::Aggressive,
            drain_on_stop: true,
        });
        let gate = Arc::new(Mutex::new(()));
        let gate_clone = gate.clone();
        let held = gate.lock().unwrap();
        bus.subscribe(true, SubscribeOptions::default(), move |_: &Counter| {
            let _g = gate_clone.lock().unwrap();
        })
        .unwrap();
        bus.start();
        bus.publish(Counter { value: 0, tick_sequence: -1 });
        bus.publish(Counter { value: 1, tick_sequence: -1 });
        let timed_out = bus.try_publish(Counter { value: 2, tick_sequence: -1 }, Duration::from_millis(0));
        assert_eq!(timed_out, PublishOutcome::Timeout(2));
        drop(held);
        bus.flush();
        bus.stop();
        let snapshot = bus.metrics(BusMetricFlags::ALL);
        assert_eq!(snapshot.published, 2);
        assert_eq!(snapshot.timeouts, 1);
    }

    #[test]
    fn publish_after_stop_returns_stopped() {
        let bus: EventBus<Counter, 4, 2> = EventBus::new(EventBusConfig::default());
        bus.start();
        bus.stop();
        let outcome = bus.publish(Counter { value: 1, tick_sequence: -1 });
        assert_eq!(outcome, PublishOutcome::Stopped);
    }
}
