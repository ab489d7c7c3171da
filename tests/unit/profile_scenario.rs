use flox::prelude::*;

#[test]
fn volume_profile_value_area_prefers_greater_neighbor_volume() {
    // Notional (price * quantity) at each bucket: 99 -> 99, 100 -> 300,
    // 101 -> 101, 102 -> 102. Expanding from the 100 POC, each step picks
    // whichever neighbor carries more volume, so both steps favor the
    // high side over the low side.
    let mut profile = VolumeProfile::new(Price::from_f64(1.0), 16);
    let qty = Quantity::from_f64(1.0);
    for price in [99.0, 100.0, 100.0, 100.0, 101.0, 102.0] {
        profile.add_trade(Price::from_f64(price), qty, true);
    }
    assert_eq!(profile.total_volume(), Volume::from_f64(602.0));
    assert_eq!(profile.poc(), Some(Price::from_f64(100.0)));

    let (low, high) = profile.value_area().expect("value area");
    assert_eq!(low, Price::from_f64(100.0));
    assert_eq!(high, Price::from_f64(102.0));
}
