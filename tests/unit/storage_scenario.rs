use flox::prelude::*;

fn bar_for(i: i64) -> Bar {
    let end = TimePoint::from_unix_ns(i * 60_000_000_000);
    let start = TimePoint::from_unix_ns((i - 1).max(0) * 60_000_000_000);
    Bar {
        open: Price::from_f64(100.0),
        high: Price::from_f64(100.0),
        low: Price::from_f64(100.0),
        close: Price::from_f64(100.0),
        volume: Volume::from_f64(1.0),
        buy_volume: Volume::from_f64(1.0),
        trade_count: 1,
        start_time: start,
        end_time: end,
        close_reason: BarCloseReason::Threshold,
    }
}

#[test]
fn bar_file_round_trip_and_find_modes() {
    let dir = tempfile::tempdir().unwrap();
    let timeframe = TimeframeId { bar_type: BarType::Time, param: 60_000_000_000 };

    let mut writer = BarWriter::new(dir.path()).unwrap();
    for i in 0..1000i64 {
        writer.push(timeframe, bar_for(i));
    }
    writer.flush().unwrap();

    let store = BarStore::open(dir.path()).unwrap();
    assert_eq!(store.len(timeframe), 1000);

    let exact = store
        .find_bar(timeframe, TimePoint::from_unix_ns(500 * 60_000_000_000), FindMode::Exact)
        .unwrap();
    assert_eq!(exact, store.get(timeframe, 500).unwrap());

    let before = store
        .find_bar(
            timeframe,
            TimePoint::from_unix_ns(500 * 60_000_000_000 + 30_000_000_000),
            FindMode::Before,
        )
        .unwrap();
    assert_eq!(before, store.get(timeframe, 500).unwrap());

    let after = store
        .find_bar(
            timeframe,
            TimePoint::from_unix_ns(500 * 60_000_000_000 + 30_000_000_000),
            FindMode::After,
        )
        .unwrap();
    assert_eq!(after, store.get(timeframe, 501).unwrap());
}
