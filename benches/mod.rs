use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use flox::prelude::*;
use std::hint::black_box;

fn bench_order_book(c: &mut Criterion) {
    let mut group = c.benchmark_group("OrderBook");
    for &depth in &[10usize, 100, 1_000] {
        group.bench_with_input(BenchmarkId::new("apply_snapshot", depth), &depth, |b, &depth| {
            b.iter_with_setup(
                || {
                    let bids: Vec<Level> = (0..depth)
                        .map(|i| Level {
                            price: Price::from_f64(100.0 - i as f64 * 0.01),
                            quantity: Quantity::from_f64(1.0),
                        })
                        .collect();
                    let asks: Vec<Level> = (0..depth)
                        .map(|i| Level {
                            price: Price::from_f64(101.0 + i as f64 * 0.01),
                            quantity: Quantity::from_f64(1.0),
                        })
                        .collect();
                    (OrderBook::new(8192, Price::from_f64(0.01)), bids, asks)
                },
                |(mut book, bids, asks)| {
                    book.apply_update(BookUpdate::Snapshot { bids, asks });
                    black_box(book.best_bid());
                },
            );
        });

        group.bench_with_input(BenchmarkId::new("consume_asks", depth), &depth, |b, &depth| {
            b.iter_with_setup(
                || {
                    let asks: Vec<Level> = (0..depth)
                        .map(|i| Level {
                            price: Price::from_f64(101.0 + i as f64 * 0.01),
                            quantity: Quantity::from_f64(1.0),
                        })
                        .collect();
                    let mut book = OrderBook::new(8192, Price::from_f64(0.01));
                    book.apply_update(BookUpdate::Snapshot { bids: vec![], asks });
                    book
                },
                |mut book| {
                    black_box(book.consume_asks(Quantity::from_f64(depth as f64)));
                },
            );
        });
    }
    group.finish();
}

fn bench_bus(c: &mut Criterion) {
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

    c.bench_function("EventBus/publish_8192", |b| {
        b.iter_with_setup(
            || {
                let bus: EventBus<Tick, 8192, 1> = EventBus::new(EventBusConfig::default());
                bus.subscribe(true, SubscribeOptions::default(), |_: &Tick| {}).unwrap();
                bus.start();
                bus
            },
            |bus| {
                for i in 0..4096u64 {
                    black_box(bus.publish(Tick { value: i, tick_sequence: -1 }));
                }
                bus.flush();
                bus.stop();
            },
        );
    });
}

fn bench_bar_aggregation(c: &mut Criterion) {
    c.bench_function("BarAggregator/tick_bars_10k_trades", |b| {
        b.iter_with_setup(
            || BarAggregator::new(flox::bars::policy::TickBarPolicy::new(100), 4),
            |mut aggregator| {
                for i in 0..10_000i64 {
                    let trade = TradeEvent {
                        symbol: 1,
                        instrument: Instrument::Spot,
                        price: Price::from_f64(100.0 + (i % 17) as f64 * 0.1),
                        quantity: Quantity::from_f64(1.0),
                        is_buy: i % 2 == 0,
                        exchange_ts_ns: i * 1_000_000,
                        tick_sequence: -1,
                    };
                    aggregator.on_trade(&trade, |event| {
                        black_box(event);
                    });
                }
            },
        );
    });
}

criterion_group!(benches, bench_order_book, bench_bus, bench_bar_aggregation);
criterion_main!(benches);
