/// EU868 region support (863..870 MHz)
///
/// EU863-870 end-devices SHALL support one of the three following data rate options:
/// 1. DR0 to DR5 (minimum set supported for certification)
/// 2. DR0 to DR7
/// 3. DR0 to DR11 (all data rates implemented)
///
/// Current status: DR0..DR5, DR6 and DR7 with the `eu868-optional-datarates` feature.
use super::*;

pub(crate) type EU868 = DynamicChannelPlan<EU868Region>;

#[derive(Default, Clone)]
#[allow(clippy::upper_case_acronyms)]
pub struct EU868Region;

/// Band g4: transmissions at low power are not duty-cycle restricted.
const LOW_POWER_BAND_MIN: u32 = 869_700_000;
const LOW_POWER_BAND_MAX: u32 = 870_000_000;
const LOW_POWER_MAX_EIRP: i16 = 7;

const DUTY_BANDS: [DutyBand; 6] = [
    // g
    DutyBand::new(865_000_000, 868_000_000, 16, 100),
    // g1
    DutyBand::new(868_000_000, 868_600_000, 16, 100),
    // g3
    DutyBand::new(869_400_000, 869_650_000, 29, 10),
    // g4
    DutyBand::new(LOW_POWER_BAND_MIN, LOW_POWER_BAND_MAX, 16, 100),
    // g2
    DutyBand::new(868_700_000, 869_200_000, 16, 1000),
    // g0
    DutyBand::new(863_000_000, 865_000_000, 16, 1000),
];

impl ChannelRegion for EU868Region {
    const FREQ_MIN: u32 = 863_000_000;
    const FREQ_MAX: u32 = 870_000_000;

    const MIN_DATARATE: u8 = 0;
    const MAX_DATARATE: u8 = if cfg!(feature = "eu868-optional-datarates") { 7 } else { 5 };
    const MIN_RX2_DATARATE: u8 = 0;
    const MAX_RX2_DATARATE: u8 = Self::MAX_DATARATE;
    const MAX_RX1_DR_OFFSET: u8 = 5;

    const DEFAULT_RX2_FREQUENCY: u32 = 869_525_000;
    const DEFAULT_RX2_DATARATE: u8 = 0;

    const BEACON_FREQUENCY: u32 = 869_525_000;
    const BEACON_DATARATE: u8 = 3;
    const BEACON: BeaconLayout = BeaconLayout::new(2, 0);

    const MAX_TX_POWER: u8 = 27;
    const TX_POWERS: &'static [u8] = &[16, 14, 12, 9, 8, 6, 4, 2];

    fn datarates() -> &'static [Option<Datarate>; NUM_DATARATES] {
        &DATARATES
    }

    fn duty_bands() -> &'static [DutyBand] {
        &DUTY_BANDS
    }

    fn duty_cycle_exempt(frequency: u32, power_dbm: i16) -> bool {
        frequency > LOW_POWER_BAND_MIN
            && frequency < LOW_POWER_BAND_MAX
            && power_dbm <= LOW_POWER_MAX_EIRP
    }

    fn ack_timeout(rx2_datarate: u8) -> u32 {
        super::ack_timeout(rx2_datarate)
    }
}

impl DynamicChannelRegion for EU868Region {
    const DEFAULT_CHANNELS: [u32; NUM_DEFAULT_CHANNELS_DYNAMIC] =
        [868_100_000, 868_300_000, 868_500_000];
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
    // DR6
    Some(Datarate::lora(SpreadingFactor::_7, Bandwidth::_250KHz, 242, 222)),
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
