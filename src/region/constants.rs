use lora_modulation::CodingRate;

pub(crate) const NUM_DATARATES: usize = 16;
/// Largest channel count of all regions (CN470).
pub(crate) const MAX_CHANNELS: usize = 96;
pub(crate) const MAX_MASK_WORDS: usize = MAX_CHANNELS.div_ceil(16);
pub(crate) const MAX_DUTY_BANDS: usize = 6;
/// Channels defined by the server in the dynamic regions, including the three defaults.
pub(crate) const NUM_CHANNELS_DYNAMIC: usize = 16;
pub(crate) const NUM_DEFAULT_CHANNELS_DYNAMIC: usize = 3;

/// DR and TX power nibble of `LinkADRReq` meaning "keep the current value".
pub(crate) const ADR_KEEP_CURRENT: u8 = 0x0f;

pub(crate) const DEFAULT_CODING_RATE: CodingRate = CodingRate::_4_5;
pub(crate) const DEFAULT_PREAMBLE_LEN: u16 = 8;
pub(crate) const FSK_PREAMBLE_LEN: u16 = 10;

/// RSSI (dBm) below which a channel is considered free during channel activity detection.
pub(crate) const FREE_CHANNEL_RSSI_THRESHOLD: i16 = -90;
/// Budget for finding a free channel with channel activity detection.
pub(crate) const CAD_TIMEOUT_MS: u64 = 10_000;

/// Channels of the class B beacon and ping slot hopping sequence.
pub(crate) const NUM_BEACON_CHANNELS: u32 = 8;
