/// IN865 region support (865..867 MHz)
use super::*;

pub(crate) type IN865 = DynamicChannelPlan<IN865Region>;

#[derive(Default, Clone)]
#[allow(clippy::upper_case_acronyms)]
pub struct IN865Region;

const DUTY_BANDS: [DutyBand; 1] = [DutyBand::new(865_000_000, 867_000_000, 30, 0)];

impl ChannelRegion for IN865Region {
    const FREQ_MIN: u32 = 865_000_000;
    const FREQ_MAX: u32 = 867_000_000;

    const MIN_DATARATE: u8 = 0;
    const MAX_DATARATE: u8 = 5;
    const MIN_RX2_DATARATE: u8 = 0;
    const MAX_RX2_DATARATE: u8 = 5;
    const MAX_RX1_DR_OFFSET: u8 = 7;

    const DEFAULT_RX2_FREQUENCY: u32 = 866_550_000;
    const DEFAULT_RX2_DATARATE: u8 = 2;

    const BEACON_FREQUENCY: u32 = 866_550_000;
    const BEACON_DATARATE: u8 = 4;
    const BEACON: BeaconLayout = BeaconLayout::new(1, 1);

    const MAX_TX_POWER: u8 = 30;
    const TX_POWERS: &'static [u8] = &[30, 28, 26, 24, 22, 20, 18, 16, 14, 12, 9];

    const JOIN_BACKOFF_WHEN_JOINED: bool = false;

    fn datarates() -> &'static [Option<Datarate>; NUM_DATARATES] {
        &DATARATES
    }

    fn duty_bands() -> &'static [DutyBand] {
        &DUTY_BANDS
    }

    /// Offsets 6 and 7 raise the data rate by 1 and 2.
    fn rx1_datarate(tx_datarate: u8, offset: u8) -> u8 {
        let datarate = match offset {
            6 => tx_datarate.saturating_add(1),
            7 => tx_datarate.saturating_add(2),
            _ => tx_datarate.saturating_sub(offset),
        };
        Self::rx_datarate(datarate).min(Self::MAX_DATARATE)
    }

    /// DR6 is reserved, DR5 is used instead.
    fn rx_datarate(datarate: u8) -> u8 {
        if datarate == 6 {
            5
        } else {
            datarate
        }
    }

    fn ack_timeout(rx2_datarate: u8) -> u32 {
        super::ack_timeout(rx2_datarate)
    }
}

impl DynamicChannelRegion for IN865Region {
    const DEFAULT_CHANNELS: [u32; NUM_DEFAULT_CHANNELS_DYNAMIC] =
        [865_062_500, 865_402_500, 865_985_000];
}

pub(crate) const DATARATES: [Option<Datarate>; NUM_DATARATES] = [
    // DR0
    Some(Datarate::lora(SpreadingFactor::_12, Bandwidth::_125KHz, 51, 51)),
    // DR1
    Some(Datarate::lora(SpreadingFactor::_11, Bandwidth::_125KHz, 51, 51)),
    // DR2
    Some(Datarate::lora(SpreadingFactor::_10, Bandwidth::_125KHz, 51, 51)),
    // DR3
    Some(Datarate::lora(SpreadingFactor::_9, Bandwidth::_125KHz, 115, 115)),
    // DR4
    Some(Datarate::lora(SpreadingFactor::_8, Bandwidth::_125KHz, 242, 222)),
    // DR5
    Some(Datarate::lora(SpreadingFactor::_7, Bandwidth::_125KHz, 242, 222)),
    // DR6: RFU
    None,
    // DR7
    Some(Datarate::fsk(242, 222)),
    // DR8..DR15
    None,
    None,
    None,
    None,
    None,
    None,
    None,
    None,
];

#[cfg(test)]
mod test {
    use super::*;
    use crate::region::beacon::test::encode;
    use crate::test_util::TestClock;

    fn setup() -> (IN865, Settings) {
        let mut settings = Settings::default();
        let mut plan = IN865::default();
        plan.init(&mut settings);
        (plan, settings)
    }

    #[test]
    fn rx1_offsets_above_five_raise_the_datarate() {
        let (plan, mut settings) = setup();
        settings.session.tx_datarate = 2;
        for (offset, expected) in [(0, 2), (2, 0), (5, 0), (6, 3), (7, 4)] {
            settings.session.rx1_datarate_offset = offset;
            assert_eq!(plan.rx_window(&settings, Window::_1).datarate, expected);
        }
        // DR6 does not exist, DR5 is used
        settings.session.tx_datarate = 4;
        settings.session.rx1_datarate_offset = 7;
        assert_eq!(plan.rx_window(&settings, Window::_1).datarate, 5);
        settings.session.rx1_datarate_offset = 6;
        assert_eq!(plan.rx_window(&settings, Window::_1).datarate, 5);
    }

    #[test]
    fn rx_param_setup_rejects_reserved_datarate() {
        let (mut plan, mut settings) = setup();
        // offset 7, DR6, 866.55 MHz
        let status = plan.handle_rx_param_setup(&mut settings, &[0x76, 0x9c, 0x39, 0x84]).unwrap();
        assert_eq!(status.bits(), 0x05);
        assert_eq!(settings.session.rx2_datarate, 2);
        assert_eq!(settings.session.rx1_datarate_offset, 0);

        let status = plan.handle_rx_param_setup(&mut settings, &[0x73, 0x9c, 0x39, 0x84]).unwrap();
        assert!(status.accepted());
        assert_eq!(settings.session.rx2_datarate, 3);
        assert_eq!(settings.session.rx1_datarate_offset, 7);
    }

    #[test]
    fn datarate_steps_skip_reserved_datarate() {
        let (plan, _) = setup();
        assert_eq!(plan.increment_datarate(4), 5);
        assert_eq!(plan.increment_datarate(5), 5);
        assert_eq!(plan.decrement_datarate(0), 0);
        assert_eq!(plan.decrement_datarate(3), 2);
    }

    #[test]
    fn join_backoff_only_while_not_joined() {
        let (plan, mut settings) = setup();
        let clock = TestClock::new();
        clock.set_wall_secs(1_000);
        settings.session.join_first_attempt = 990;
        settings.session.join_time_off_end = 1_012;
        assert_eq!(plan.time_off_air(&settings, &clock), 12_000);
        settings.session.joined = true;
        assert_eq!(plan.time_off_air(&settings, &clock), 0);
    }

    #[test]
    fn no_duty_cycle() {
        let (mut plan, mut settings) = setup();
        let clock = TestClock::new();
        plan.update_duty_cycle(&mut settings, &clock, 865_062_500, 1_000);
        assert_eq!(plan.time_off_air(&settings, &clock), 0);
    }

    #[test]
    fn beacon_layout() {
        let (plan, _) = setup();
        let frame = encode(&IN865Region::BEACON, 7, [GPS_SECOND_ANTENNA, 1, 0, 0, 2, 0, 0]);
        assert_eq!(frame.len(), 17);
        let beacon = plan.decode_beacon(&frame).unwrap();
        assert_eq!(beacon.time, 7);
        assert_eq!(beacon.gps, Some(Gps { latitude: 1, longitude: 2 }));
    }
}
