/// US915 region support (902..928 MHz)
///
/// US902-928 end-devices SHALL support one of the two following data rate options:
/// 1. DR0 to DR4 and DR8 to DR13 (minimum set supported for certification)
/// 2. DR0 to DR13 (all data rates implemented)
///
/// Current status: DR5 to DR7 are unimplemented (LR-FHSS)
use super::*;
use crate::settings::NetworkMode;

mod datarates;
use datarates::*;

pub(crate) type US915 = FixedChannelPlan<US915Region>;

/// FCC regulation requires hopping over at least 50 channels when using maximum output power.
/// It is possible to have end-devices with less channels when limiting the conducted transmit
/// power of the end-device to 21 dBm.
const MIN_HOPPING_CHANNELS: usize = 50;
const REDUCED_MAX_POWER: i8 = 21;
const MAX_POWER_500K: i8 = 26;
const MAX_EIRP: i8 = 30;
/// Antenna gain included in the power limits.
const MAX_ANTENNA_GAIN: i8 = 6;

const DOWNLINK_BASE: u32 = 923_300_000;
const DOWNLINK_STEP: u32 = 600_000;

const DUTY_BANDS: [DutyBand; 1] = [DutyBand::new(902_000_000, 928_000_000, MAX_EIRP, 0)];

#[derive(Default, Clone)]
#[allow(clippy::upper_case_acronyms)]
pub struct US915Region;

impl US915Region {
    /// Downlink channel answering uplink channel `tx_channel`.
    fn downlink_frequency(tx_channel: u8, settings: &Settings) -> u32 {
        let index = if tx_channel >= Self::NUM_125K_CHANNELS {
            tx_channel - Self::NUM_125K_CHANNELS
        } else if settings.network.mode == NetworkMode::PrivateMts {
            tx_channel / SUB_BAND_SIZE
        } else {
            tx_channel % SUB_BAND_SIZE
        };
        DOWNLINK_BASE + DOWNLINK_STEP * u32::from(index)
    }
}

impl ChannelRegion for US915Region {
    const FREQ_MIN: u32 = 902_000_000;
    const FREQ_MAX: u32 = 928_000_000;

    const MIN_DATARATE: u8 = 0;
    const MAX_DATARATE: u8 = 4;
    const P2P_MIN_DATARATE: u8 = 8;
    const P2P_MAX_DATARATE: u8 = 13;
    const MIN_RX2_DATARATE: u8 = 8;
    const MAX_RX2_DATARATE: u8 = 13;
    const MAX_RX1_DR_OFFSET: u8 = 3;

    const DEFAULT_RX2_FREQUENCY: u32 = DOWNLINK_BASE;
    const DEFAULT_RX2_DATARATE: u8 = 8;

    const BEACON_FREQUENCY: u32 = DOWNLINK_BASE;
    const BEACON_FREQUENCY_STEP: u32 = DOWNLINK_STEP;
    const BEACON_DATARATE: u8 = 8;
    const BEACON: BeaconLayout = BeaconLayout::new(5, 3);

    const MAX_TX_POWER: u8 = 30;
    const TX_POWERS: &'static [u8] = &[30, 28, 26, 24, 22, 20, 18, 16, 14, 12, 10, 8, 6, 4, 2, 0];

    fn datarates() -> &'static [Option<Datarate>; NUM_DATARATES] {
        &DATARATES
    }

    fn duty_bands() -> &'static [DutyBand] {
        &DUTY_BANDS
    }

    fn rx1_datarate(tx_datarate: u8, offset: u8) -> u8 {
        match tx_datarate {
            0..=4 => (tx_datarate + 10).saturating_sub(offset).clamp(8, 13),
            8.. => tx_datarate.saturating_sub(offset).max(8),
            _ => 8,
        }
    }
}

impl FixedChannelRegion for US915Region {
    const NUM_125K_CHANNELS: u8 = 64;
    const UPLINK_BASE_125K: u32 = 902_300_000;
    const UPLINK_STEP_125K: u32 = 200_000;
    const DATARATES_125K: (u8, u8) = (0, 3);

    const NUM_500K_CHANNELS: u8 = 8;
    const UPLINK_BASE_500K: u32 = 903_000_000;
    const UPLINK_STEP_500K: u32 = 1_600_000;
    const DATARATES_500K: (u8, u8) = (4, 4);

    const NUM_SUB_BANDS: u8 = 8;

    const CF_LIST_MASK: bool = true;
    const JOIN_SUB_BAND_DATARATES: Option<(u8, u8)> = Some((0, 4));

    fn rx1_frequency(tx_channel: u8, settings: &Settings) -> u32 {
        Self::downlink_frequency(tx_channel, settings)
    }

    fn rx2_frequency(tx_channel: u8, settings: &Settings) -> u32 {
        if settings.network.mode == NetworkMode::PrivateMts {
            // private networks answer on the downlink channel of the sub-band
            let sub_band = if tx_channel < Self::NUM_125K_CHANNELS {
                tx_channel / SUB_BAND_SIZE
            } else {
                tx_channel % SUB_BAND_SIZE
            };
            DOWNLINK_BASE + DOWNLINK_STEP * u32::from(sub_band)
        } else {
            settings.session.rx2_frequency
        }
    }

    fn apply_channel_mask(control: u8, mask: u16, target: &mut ChannelMask) -> bool {
        match control {
            0..=4 => target.set_word(control as usize, mask),
            // one bit per sub-band: 8 channels of 125 kHz and one of 500 kHz
            5 => {
                let sub_bands = mask & 0x00ff;
                if sub_bands == 0 {
                    return false;
                }
                for word in 0..4 {
                    let low = if sub_bands & (1 << (2 * word)) != 0 { 0x00ff } else { 0 };
                    let high = if sub_bands & (1 << (2 * word + 1)) != 0 { 0xff00 } else { 0 };
                    target.set_word(word, low | high);
                }
                target.set_word(4, sub_bands);
            }
            6 => {
                (0..4).for_each(|word| target.set_word(word, 0xffff));
                target.set_word(4, mask);
            }
            7 => {
                (0..4).for_each(|word| target.set_word(word, 0));
                target.set_word(4, mask);
            }
            _ => return false,
        }
        true
    }

    fn validate_channel_mask(mask: &ChannelMask, datarate: u8, status: &mut Status) {
        if datarate < 4 {
            if mask.count_enabled(0..usize::from(Self::NUM_125K_CHANNELS)) < 2 {
                status.reject(Status::CHANNEL_ACK);
            }
        } else if datarate == 4 && mask.word(4) & 0x00ff == 0 {
            status.reject(Status::DATA_RATE_ACK);
        }
    }

    fn band_power_limit(is_500khz: bool, usable: usize) -> Option<i8> {
        Some(if is_500khz {
            MAX_POWER_500K
        } else if usable < MIN_HOPPING_CHANNELS {
            REDUCED_MAX_POWER
        } else {
            MAX_EIRP
        })
    }

    const FIXED_FREQUENCY_MAX_POWER: Option<i8> = Some(MAX_POWER_500K);

    fn adjust_max_power(
        max_power: i8,
        power: i8,
        antenna_gain: i8,
        is_500khz: bool,
        enabled_125k: usize,
    ) -> i8 {
        let mut max_power = max_power;
        // the hopping rule only concerns 125 kHz uplinks
        if !is_500khz && enabled_125k < MIN_HOPPING_CHANNELS {
            max_power = max_power.min(REDUCED_MAX_POWER);
        }
        if antenna_gain > MAX_ANTENNA_GAIN
            && power.saturating_add(antenna_gain) >= max_power.saturating_add(MAX_ANTENNA_GAIN)
        {
            max_power -= antenna_gain - MAX_ANTENNA_GAIN;
        }
        max_power
    }
}
