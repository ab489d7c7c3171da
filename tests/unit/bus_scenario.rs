use std::sync::{Arc, Mutex};
use std::time::Duration;

use flox::prelude::*;

#[derive(Debug, Clone)]
struct Tick {
    value: u64,
    tick_sequence: i64,
}

impl Sequenced for Tick {
    fn set_tick_sequence(&mut self, seq: i64) {
        self.tick_sequence = seq;
    }
}

#[test]
fn single_required_consumer_receives_all_events_in_order() {
    let bus: EventBus<Tick, 8, 4> = EventBus::new(EventBusConfig::default());
    let received = Arc::new(Mutex::new(Vec::new()));
    let received_clone = received.clone();
    bus.subscribe(true, SubscribeOptions::default(), move |event: &Tick| {
        received_clone.lock().unwrap().push(event.value);
    })
    .unwrap();
    bus.start();
    for i in 0..100u64 {
        let outcome = bus.publish(Tick { value: i, tick_sequence: -1 });
        assert_eq!(outcome, PublishOutcome::Published(i as i64));
    }
    bus.flush();
    bus.stop();
    let got = received.lock().unwrap().clone();
    assert_eq!(got, (0..100u64).collect::<Vec<_>>());
}

#[test]
fn optional_consumer_skips_timeout_placeholders() {
    // Capacity 2: the first two publishes land in distinct, never-before-
    // used slots and always succeed; the next two must reclaim a slot
    // still held by the stalled required consumer and time out instead.
    let bus: EventBus<Tick, 2, 4> = EventBus::new(EventBusConfig {
        backoff_mode: BackoffMode::Aggressive,
        drain_on_stop: true,
    });
    let required_gate = Arc::new(Mutex::new(()));
    let required_gate_clone = required_gate.clone();
    let required_held = required_gate.lock().unwrap();
    let required_count = Arc::new(Mutex::new(0u64));
    let required_count_clone = required_count.clone();
    bus.subscribe(true, SubscribeOptions::default(), move |_event: &Tick| {
        let _guard = required_gate_clone.lock().unwrap();
        *required_count_clone.lock().unwrap() += 1;
    })
    .unwrap();
    let optional_count = Arc::new(Mutex::new(0u64));
    let optional_count_clone = optional_count.clone();
    bus.subscribe(false, SubscribeOptions::default(), move |_event: &Tick| {
        *optional_count_clone.lock().unwrap() += 1;
    })
    .unwrap();
    bus.start();

    let first = bus.publish(Tick { value: 0, tick_sequence: -1 });
    assert_eq!(first, PublishOutcome::Published(0));
    let second = bus.publish(Tick { value: 1, tick_sequence: -1 });
    assert_eq!(second, PublishOutcome::Published(1));
    // The required consumer is stuck processing seq 0; seq 2 and seq 3
    // each need to reclaim a slot it hasn't released yet.
    for expected_seq in 2..4i64 {
        let outcome = bus.try_publish(
            Tick { value: expected_seq as u64, tick_sequence: -1 },
            Duration::from_millis(0),
        );
        assert_eq!(outcome, PublishOutcome::Timeout(expected_seq));
    }
    drop(required_held);
    bus.flush();
    bus.stop();

    // Both consumers observe the two real events and silently skip the
    // two placeholders that absorbed seq 2 and seq 3.
    assert_eq!(*optional_count.lock().unwrap(), 2);
    assert_eq!(*required_count.lock().unwrap(), 2);
}
