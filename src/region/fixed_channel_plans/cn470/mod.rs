/// CN470 region support (470..510 MHz)
///
/// 96 uplink channels of 125 kHz, answered on 48 downlink channels.
use super::*;

mod datarates;
use datarates::*;

pub(crate) type CN470 = FixedChannelPlan<CN470Region>;

const DOWNLINK_BASE: u32 = 500_300_000;
const DOWNLINK_STEP: u32 = 200_000;
const NUM_DOWNLINK_CHANNELS: u8 = 48;

const DUTY_BANDS: [DutyBand; 1] = [DutyBand::new(470_000_000, 510_000_000, 17, 0)];

#[derive(Default, Clone)]
#[allow(clippy::upper_case_acronyms)]
pub struct CN470Region;

impl ChannelRegion for CN470Region {
    const FREQ_MIN: u32 = 470_000_000;
    const FREQ_MAX: u32 = 510_000_000;

    const MIN_DATARATE: u8 = 1;
    const MAX_DATARATE: u8 = 5;
    const MIN_RX2_DATARATE: u8 = 0;
    const MAX_RX2_DATARATE: u8 = 5;
    const MAX_RX1_DR_OFFSET: u8 = 3;

    const DEFAULT_RX2_FREQUENCY: u32 = 505_300_000;
    const DEFAULT_RX2_DATARATE: u8 = 0;

    const BEACON_FREQUENCY: u32 = DOWNLINK_BASE;
    const BEACON_FREQUENCY_STEP: u32 = DOWNLINK_STEP;
    const BEACON_DATARATE: u8 = 2;
    const BEACON: BeaconLayout = BeaconLayout::new(5, 3);

    const MAX_TX_POWER: u8 = 30;
    const TX_POWERS: &'static [u8] = &[17, 16, 14, 12, 10, 7, 5, 2, 0];

    const CHANNEL_SELECTION: Selection = Selection::Uniform;

    fn datarates() -> &'static [Option<Datarate>; NUM_DATARATES] {
        &DATARATES
    }

    fn duty_bands() -> &'static [DutyBand] {
        &DUTY_BANDS
    }

    /// The radio power table starts one step below the region table.
    fn radio_power_index(index: u8) -> u8 {
        index.max(1) - 1
    }
}

impl FixedChannelRegion for CN470Region {
    const NUM_125K_CHANNELS: u8 = 96;
    const UPLINK_BASE_125K: u32 = 470_300_000;
    const UPLINK_STEP_125K: u32 = 200_000;
    const DATARATES_125K: (u8, u8) = (1, 5);

    const NUM_SUB_BANDS: u8 = 12;

    fn rx1_frequency(tx_channel: u8, _settings: &Settings) -> u32 {
        DOWNLINK_BASE + DOWNLINK_STEP * u32::from(tx_channel % NUM_DOWNLINK_CHANNELS)
    }

    fn apply_channel_mask(control: u8, mask: u16, target: &mut ChannelMask) -> bool {
        match control {
            0..=5 => target.set_word(control as usize, mask),
            6 => target.fill(0xffff),
            _ => return false,
        }
        true
    }

    fn validate_channel_mask(mask: &ChannelMask, _datarate: u8, status: &mut Status) {
        if mask.count_enabled(0..usize::from(Self::NUM_125K_CHANNELS)) == 0 {
            status.reject(Status::CHANNEL_ACK);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_util::{rng, TestClock, TestRadio};

    fn setup() -> (CN470, Settings) {
        let mut settings = Settings::default();
        let mut plan = CN470::default();
        plan.init(&mut settings);
        (plan, settings)
    }

    #[test]
    fn init_defaults() {
        let (plan, settings) = setup();
        assert_eq!(plan.state().channel_mask.words(), &[0xffff; 6]);
        assert_eq!(settings.session.tx_datarate, 1);
        assert_eq!(settings.session.rx2_frequency, 505_300_000);
        assert_eq!(settings.session.rx2_datarate, 0);
        assert_eq!(settings.session.beacon_frequency, 500_300_000);
        assert_eq!(settings.session.ping_slot_datarate, 2);
        assert!(settings.session.beacon_freq_hop);
    }

    #[test]
    fn sub_band_selection() {
        let (mut plan, mut settings) = setup();
        plan.set_frequency_sub_band(3);
        assert_eq!(plan.state().channel_mask.words(), &[0, 0x00ff, 0, 0, 0, 0]);
        plan.set_frequency_sub_band(12);
        assert_eq!(plan.state().channel_mask.words(), &[0, 0, 0, 0, 0, 0xff00]);
        // out of range selects every channel
        plan.set_frequency_sub_band(13);
        assert_eq!(plan.state().channel_mask.words(), &[0xffff; 6]);

        settings.network.frequency_sub_band = 3;
        let channels = plan.channels(&settings);
        assert_eq!(channels.len(), 9);
        assert_eq!(channels[0], 473_500_000);
        assert_eq!(channels[8], 505_300_000);
    }

    #[test]
    fn uniform_selection_may_repeat() {
        let (mut plan, mut settings) = setup();
        let clock = TestClock::new();
        let mut radio = TestRadio::default();
        let mut rng = rng();
        plan.set_frequency_sub_band(2);

        let mut repeated = false;
        for _ in 0..10 {
            let mut seen = [false; 8];
            for _ in 0..8 {
                plan.next_channel(&mut settings, &mut radio, &clock, &mut rng).unwrap();
                let channel = plan.state().tx_channel;
                assert!((8..16).contains(&channel));
                let slot = &mut seen[usize::from(channel - 8)];
                repeated |= *slot;
                *slot = true;
            }
        }
        assert!(repeated);
    }

    #[test]
    fn radio_power_index_is_shifted() {
        let (plan, mut settings) = setup();
        let mut radio = TestRadio::default();

        settings.session.tx_power = 14;
        let config = plan.set_tx_config(&settings, &mut radio).unwrap();
        assert_eq!(config.power, 14);
        assert_eq!(config.power_index, 1);

        // band limit is 17 dBm
        settings.session.tx_power = 20;
        let config = plan.set_tx_config(&settings, &mut radio).unwrap();
        assert_eq!(config.power, 17);
        assert_eq!(config.power_index, 0);
    }

    #[test]
    fn link_adr_controls() {
        let (mut plan, mut settings) = setup();
        let status = plan.handle_link_adr(&mut settings, &[0x2f, 0x0f, 0x00, 0x51]).unwrap();
        assert!(status.accepted());
        assert_eq!(plan.state().channel_mask.word(5), 0x000f);

        plan.handle_link_adr(&mut settings, &[0x2f, 0x00, 0x00, 0x61]).unwrap();
        assert_eq!(plan.state().channel_mask.words(), &[0xffff; 6]);

        let result = plan.handle_link_adr(&mut settings, &[0x2f, 0x00, 0x00, 0x71]);
        assert!(matches!(result, Err(Error::Malformed(_))));

        // DR0 is not an uplink data rate
        let status = plan.handle_link_adr(&mut settings, &[0x0f, 0xff, 0xff, 0x01]).unwrap();
        assert!(!status.is_set(Status::DATA_RATE_ACK));
    }

    #[test]
    fn adr_configuration_needs_a_channel() {
        let (mut plan, settings) = setup();
        plan.state_mut().channel_mask.fill(0);
        assert_eq!(plan.validate_adr_configuration(&settings).bits(), 0x06);
        plan.state_mut().channel_mask.set_channel(95, true);
        assert!(plan.validate_adr_configuration(&settings).accepted());
    }

    #[test]
    fn join_datarate_starts_at_dr1() {
        let (mut plan, mut settings) = setup();
        for (nonce, expected) in [(0, 1), (16, 1), (4, 4), (1, 5)] {
            settings.network.dev_nonce = nonce;
            assert_eq!(plan.join_datarate(&settings), expected);
        }
        // the channel mask is left alone
        assert_eq!(plan.state().channel_mask.words(), &[0xffff; 6]);
    }

    #[test]
    fn rx1_window() {
        let (mut plan, mut settings) = setup();
        plan.state_mut().tx_channel = 50;
        settings.session.tx_datarate = 5;
        settings.session.rx1_datarate_offset = 2;
        assert_eq!(
            plan.rx_window(&settings, Window::_1),
            RxWindow { frequency: 500_700_000, datarate: 3 }
        );
        settings.session.tx_datarate = 1;
        assert_eq!(plan.rx_window(&settings, Window::_1).datarate, 1);
    }

    #[test]
    fn no_duty_cycle() {
        let (mut plan, mut settings) = setup();
        let clock = TestClock::new();
        plan.update_duty_cycle(&mut settings, &clock, 470_300_000, 2_000);
        assert_eq!(plan.time_off_air(&settings, &clock), 0);
    }
}
