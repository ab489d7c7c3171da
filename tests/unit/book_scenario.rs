use flox::prelude::*;

fn price(v: f64) -> Price {
    Price::from_f64(v)
}

fn qty(v: f64) -> Quantity {
    Quantity::from_f64(v)
}

#[test]
fn snapshot_then_deltas() {
    let mut book = OrderBook::new(8192, price(0.1));
    book.apply_update(BookUpdate::Snapshot {
        bids: vec![
            Level { price: price(100.0), quantity: qty(2.0) },
            Level { price: price(99.0), quantity: qty(1.0) },
        ],
        asks: vec![
            Level { price: price(101.0), quantity: qty(1.5) },
            Level { price: price(102.0), quantity: qty(3.0) },
        ],
    });
    assert_eq!(book.best_bid(), Some(price(100.0)));
    assert_eq!(book.best_ask(), Some(price(101.0)));

    book.apply_update(BookUpdate::Delta {
        bids: vec![
            Level { price: price(100.0), quantity: qty(0.0) },
            Level { price: price(99.0), quantity: qty(1.5) },
        ],
        asks: vec![],
    });
    assert_eq!(book.best_bid(), Some(price(99.0)));
    assert_eq!(book.bid_at_price(price(100.0)), qty(0.0));
    assert_eq!(book.bid_at_price(price(99.0)), qty(1.5));
    assert_eq!(book.ask_at_price(price(101.0)), qty(1.5));
    assert_eq!(book.spread(), Some(price(2.0)));
}

#[test]
fn market_sweep_consumes_asks_in_price_order() {
    let mut book = OrderBook::new(8192, price(0.1));
    book.apply_update(BookUpdate::Snapshot {
        bids: vec![],
        asks: vec![
            Level { price: price(101.0), quantity: qty(1.5) },
            Level { price: price(102.0), quantity: qty(3.0) },
            Level { price: price(103.0), quantity: qty(0.5) },
        ],
    });
    let (filled, notional) = book.consume_asks(qty(3.0));
    assert_eq!(filled, qty(3.0));
    assert_eq!(notional, Volume::from_f64(304.5));
}
