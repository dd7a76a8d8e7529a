//! Radio seam used by the channel plans.
pub use lora_modulation::{Bandwidth, CodingRate, SpreadingFactor};

/// FSK bit rate used by the FSK data rates (EU868/IN865 DR7).
pub const FSK_BITRATE: u32 = 50_000;
/// FSK frequency deviation in Hz.
pub const FSK_DEVIATION: u32 = 25_000;
/// Transmit timeout handed to the radio, in milliseconds.
pub const TX_TIMEOUT_MS: u32 = 3_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum Modem {
    Lora,
    Fsk,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Modulation {
    Lora { spreading_factor: SpreadingFactor, bandwidth: Bandwidth, coding_rate: CodingRate },
    Fsk { bitrate: u32, deviation: u32 },
}

impl Modulation {
    pub fn modem(&self) -> Modem {
        match self {
            Modulation::Lora { .. } => Modem::Lora,
            Modulation::Fsk { .. } => Modem::Fsk,
        }
    }
}

/// Transmit parameters resolved by [`ChannelPlan::set_tx_config`](crate::ChannelPlan::set_tx_config).
#[derive(Debug, Clone, PartialEq)]
pub struct TxConfig {
    /// Conducted output power in dBm, after the band limit and antenna gain were applied.
    pub power: i8,
    /// Index of `power` in the power table of the region, as expected by the radio driver.
    pub power_index: u8,
    pub modulation: Modulation,
    pub preamble_len: u16,
    pub fixed_len: bool,
    pub crc_on: bool,
    pub freq_hop_on: bool,
    pub hop_period: u8,
    pub iq_inverted: bool,
    pub timeout_ms: u32,
}

impl TxConfig {
    pub fn modem(&self) -> Modem {
        self.modulation.modem()
    }
}

/// Minimal view of the transceiver needed by the channel plans.
pub trait Radio {
    /// Tune the radio to `frequency` (Hz).
    fn set_channel(&mut self, frequency: u32);

    fn set_tx_config(&mut self, config: &TxConfig);

    /// Channel activity detection: returns `true` when no activity above `rssi_threshold` (dBm)
    /// is detected on `frequency`.
    fn is_channel_free(&mut self, modem: Modem, frequency: u32, rssi_threshold: i16) -> bool;
}

impl<R: Radio + ?Sized> Radio for &mut R {
    fn set_channel(&mut self, frequency: u32) {
        (**self).set_channel(frequency)
    }

    fn set_tx_config(&mut self, config: &TxConfig) {
        (**self).set_tx_config(config)
    }

    fn is_channel_free(&mut self, modem: Modem, frequency: u32, rssi_threshold: i16) -> bool {
        (**self).is_channel_free(modem, frequency, rssi_threshold)
    }
}
