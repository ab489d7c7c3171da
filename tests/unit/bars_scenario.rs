use flox::prelude::*;
use flox::bars::policy::TickBarPolicy;

fn trade(symbol: SymbolId, price: f64, ts: i64) -> TradeEvent {
    TradeEvent {
        symbol,
        instrument: Instrument::Spot,
        price: Price::from_f64(price),
        quantity: Quantity::from_f64(1.0),
        is_buy: true,
        exchange_ts_ns: ts,
        tick_sequence: -1,
    }
}

#[test]
fn tick_bar_aggregation_emits_expected_bars() {
    let mut aggregator = BarAggregator::new(TickBarPolicy::new(3), 4);
    let mut emitted = Vec::new();
    for i in 0..9i64 {
        let t = trade(1, 100.0 + i as f64, i * 1_000_000_000);
        aggregator.on_trade(&t, |event| emitted.push(event));
    }
    // The ninth trade only starts the third bar; stop() force-closes it so
    // all three bars implied by nine trades at a tick count of three are
    // accounted for.
    aggregator.stop(|event| emitted.push(event));
    assert_eq!(emitted.len(), 3);

    let bar0 = emitted[0].bar;
    assert_eq!(bar0.open, Price::from_f64(100.0));
    assert_eq!(bar0.high, Price::from_f64(102.0));
    assert_eq!(bar0.low, Price::from_f64(100.0));
    assert_eq!(bar0.close, Price::from_f64(102.0));
    assert_eq!(bar0.volume, Volume::from_f64(303.0));
    assert_eq!(bar0.trade_count, 3);

    let bar2 = emitted[2].bar;
    assert_eq!(bar2.close_reason, BarCloseReason::Forced);
    assert_eq!(bar2.trade_count, 3);
}
