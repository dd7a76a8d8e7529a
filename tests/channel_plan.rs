mod common;

use common::{setup, MockClock, MockRadio};
use lorawan_region::region::{RxWindow, Window};
use lorawan_region::{Error, Prng, Region};

#[test]
fn eu868_duty_cycle_blocks_band_until_expiry() {
    let (mut plan, mut settings) = setup(Region::EU868);
    let clock = MockClock::default();
    let mut radio = MockRadio::default();
    let mut rng = Prng::new(1);

    plan.get_next_channel(&mut settings, &mut radio, &clock, &mut rng).unwrap();
    let frequency = radio.last_frequency();
    assert!([868_100_000, 868_300_000, 868_500_000].contains(&frequency));

    plan.update_duty_cycle(&mut settings, &clock, frequency, 100);
    // the three default channels share the 1% band
    assert_eq!(plan.time_off_air(&settings, &clock), 10_000);
    assert_eq!(
        plan.get_next_channel(&mut settings, &mut radio, &clock, &mut rng),
        Err(Error::NoChannelsEnabled)
    );

    let band = plan.duty_band(1).unwrap();
    assert_eq!((band.freq_min, band.freq_max, band.duty_cycle), (868_000_000, 868_600_000, 100));
    assert_eq!(band.time_off_end, 10_000);

    clock.advance(4_000);
    assert_eq!(plan.time_off_air(&settings, &clock), 6_000);
    clock.advance(6_000);
    assert_eq!(plan.time_off_air(&settings, &clock), 0);
    plan.get_next_channel(&mut settings, &mut radio, &clock, &mut rng).unwrap();
}

#[test]
fn eu868_fair_channel_rotation() {
    let (mut plan, mut settings) = setup(Region::EU868);
    let clock = MockClock::default();
    let mut radio = MockRadio::default();
    let mut rng = Prng::new(7);

    for _ in 0..30 {
        plan.get_next_channel(&mut settings, &mut radio, &clock, &mut rng).unwrap();
    }
    for frequency in [868_100_000, 868_300_000, 868_500_000] {
        assert_eq!(radio.frequencies.iter().filter(|f| **f == frequency).count(), 10);
    }
}

#[test]
fn channel_activity_detection_timeout() {
    let (mut plan, mut settings) = setup(Region::US915);
    settings.network.cad_enabled = true;
    let clock = MockClock { step: 500, ..Default::default() };
    let mut radio = MockRadio { busy: true, ..Default::default() };
    let mut rng = Prng::new(3);

    assert_eq!(
        plan.get_next_channel(&mut settings, &mut radio, &clock, &mut rng),
        Err(Error::NoChannelsEnabled)
    );
    assert!(radio.cad_queries > 0);
    assert!(radio.frequencies.is_empty());
}

#[test]
fn us915_cf_list_channel_mask() {
    let (mut plan, mut settings) = setup(Region::US915);
    let mut frame = [0u8; 33];
    frame[13..15].copy_from_slice(&[0x00, 0xff]);
    frame[21..23].copy_from_slice(&[0x02, 0x00]);
    frame[28] = 0x01;
    plan.handle_join_accept(&mut settings, &frame);
    assert_eq!(plan.channel_mask().words(), &[0xff00, 0, 0, 0, 0x0002]);
}

#[test]
fn cn470_configured_sub_band() {
    let (mut plan, mut settings) = setup(Region::CN470);
    settings.network.frequency_sub_band = 3;
    plan.enable_default_channels(&settings);
    assert_eq!(plan.channel_mask().words(), &[0, 0x00ff, 0, 0, 0, 0]);
    assert_eq!(plan.channels(&settings).len(), 9);
}

#[test]
fn channel_mask_width_follows_region() {
    for (region, words) in
        [(Region::EU868, 1), (Region::IN865, 1), (Region::US915, 5), (Region::CN470, 6)]
    {
        let (plan, _) = setup(region);
        assert_eq!(plan.channel_mask().len(), words);
        assert_eq!(plan.region(), region);
    }
}

#[test]
fn rx_param_setup_with_unknown_datarate_changes_nothing() {
    let (mut plan, mut settings) = setup(Region::EU868);
    let before = settings.clone();
    // DR8, 869.525 MHz
    let status = plan.handle_rx_param_setup(&mut settings, &[0x08, 0xd2, 0xad, 0x84]).unwrap();
    assert_eq!(status.bits(), 0x05);
    assert_eq!(settings, before);

    let status = plan.handle_rx_param_setup(&mut settings, &[0x13, 0xd2, 0xad, 0x84]).unwrap();
    assert_eq!(status.bits(), 0x07);
    assert_eq!(settings.session.rx2_datarate, 3);
    assert_eq!(settings.session.rx1_datarate_offset, 1);
}

#[test]
fn link_adr_keep_current_sentinels() {
    let (mut plan, mut settings) = setup(Region::EU868);
    settings.network.adr_enabled = true;
    settings.session.tx_datarate = 3;
    let status = plan.handle_link_adr(&mut settings, &[0xff, 0x07, 0x00, 0x00]).unwrap();
    assert!(status.accepted());
    assert_eq!(settings.session.tx_datarate, 3);
    assert_eq!(settings.session.tx_power, 14);
}

#[test]
fn link_adr_power_index_bound() {
    let (mut plan, mut settings) = setup(Region::EU868);
    settings.network.adr_enabled = true;
    let status = plan.handle_link_adr(&mut settings, &[0x58, 0x07, 0x00, 0x00]).unwrap();
    assert_eq!(status.bits(), 0x03);
    assert_eq!(settings.session.tx_power, 14);

    let status = plan.handle_link_adr(&mut settings, &[0x57, 0x07, 0x00, 0x00]).unwrap();
    assert!(status.accepted());
    assert_eq!(settings.session.tx_datarate, 5);
    assert_eq!(settings.session.tx_power, 2);
}

#[test]
fn unsupported_commands_on_fixed_plans() {
    let (mut plan, _) = setup(Region::US915);
    assert_eq!(plan.handle_new_channel(&[3, 0x18, 0x4f, 0x84, 0x50]), Err(Error::Unsupported));
    let (mut plan, _) = setup(Region::CN470);
    assert_eq!(plan.handle_dl_channel(&[0, 0x18, 0x4f, 0x84]), Err(Error::Unsupported));
}

#[test]
fn rx_window_is_pure() {
    for region in [Region::CN470, Region::EU868, Region::IN865, Region::US915] {
        let (plan, settings) = setup(region);
        let before = settings.clone();
        for window in [Window::_1, Window::_2, Window::Beacon, Window::PingSlot(0), Window::C(3)] {
            let first = plan.rx_window(&settings, window);
            assert_eq!(plan.rx_window(&settings, window), first);
        }
        assert_eq!(settings, before);
    }
}

#[test]
fn class_c_window_falls_back_to_rx2() {
    let (plan, mut settings) = setup(Region::EU868);
    let rx2 = plan.rx_window(&settings, Window::_2);
    assert_eq!(rx2, RxWindow { frequency: 869_525_000, datarate: 0 });

    settings.multicast[2].frequency = 869_100_000;
    settings.multicast[2].datarate = 4;
    assert_eq!(plan.rx_window(&settings, Window::C(3)), rx2);
    settings.multicast[2].active = true;
    assert_eq!(
        plan.rx_window(&settings, Window::C(3)),
        RxWindow { frequency: 869_100_000, datarate: 4 }
    );
    // ping slots use the session regardless of its state
    settings.multicast[2].active = false;
    assert_eq!(plan.rx_window(&settings, Window::PingSlot(3)).frequency, 869_100_000);
    assert_eq!(plan.rx_window(&settings, Window::C(0)), rx2);
}

#[test]
fn beacon_decoding() {
    let frame = hex::decode("0000000002cca27e00012000008103de55").unwrap();
    let (plan, _) = setup(Region::EU868);
    let beacon = plan.decode_beacon(&frame).unwrap();
    assert_eq!(beacon.time, 0xcc02_0000);
    assert!(beacon.gps.is_some());

    let (plan, _) = setup(Region::US915);
    assert_eq!(plan.decode_beacon(&frame), Err(Error::BeaconSizeMismatch));
}

#[test]
fn us915_class_b_hopping() {
    let (plan, mut settings) = setup(Region::US915);
    plan.frequency_hop(&mut settings, 0, 128, 0);
    assert_eq!(settings.session.beacon_frequency, 923_300_000);
    plan.frequency_hop(&mut settings, 128 * 7, 128, 2);
    assert_eq!(settings.session.beacon_frequency, 927_500_000);
    assert_eq!(settings.session.ping_slot_frequency, 923_900_000);

    // fixed beacon frequency regions are left alone
    let (plan, mut settings) = setup(Region::EU868);
    plan.frequency_hop(&mut settings, 128 * 7, 128, 2);
    assert_eq!(settings.session.beacon_frequency, 869_525_000);
}

#[test]
fn join_datarate_distribution() {
    let (mut plan, mut settings) = setup(Region::EU868);
    let mut counts = [0; 6];
    for nonce in 0..20 {
        settings.network.dev_nonce = nonce;
        counts[plan.join_datarate(&settings) as usize] += 1;
    }
    assert_eq!(counts, [1, 1, 1, 1, 1, 15]);
}

#[test]
fn join_back_off_counts_in_time_off_air() {
    let (plan, mut settings) = setup(Region::EU868);
    let clock = MockClock::default();
    clock.wall.set(100);
    settings.session.join_first_attempt = 50;
    settings.session.join_time_off_end = 103;
    assert_eq!(plan.time_off_air(&settings, &clock), 3_000);
    settings.session.joined = true;
    assert_eq!(plan.time_off_air(&settings, &clock), 3_000);
    clock.wall.set(103);
    assert_eq!(plan.time_off_air(&settings, &clock), 0);
}
