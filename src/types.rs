//! Field types shared by the MAC command payloads handled by the channel plans.
//!
//! All of them are thin views over the raw bytes: nothing is decoded until an accessor is
//! called, so a malformed field only surfaces when the channel plan validates it.

/// A 24-bit little-endian frequency field, in units of 100 Hz.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct Frequency<'a>(&'a [u8; 3]);

impl<'a> Frequency<'a> {
    pub fn new(bytes: &'a [u8; 3]) -> Self {
        Frequency(bytes)
    }

    /// Frequency in Hz.
    pub fn value(&self) -> u32 {
        ((u32::from(self.0[2]) << 16) | (u32::from(self.0[1]) << 8) | u32::from(self.0[0])) * 100
    }
}

impl<'a> From<&'a [u8; 3]> for Frequency<'a> {
    fn from(v: &'a [u8; 3]) -> Self {
        Frequency(v)
    }
}

impl AsRef<[u8]> for Frequency<'_> {
    fn as_ref(&self) -> &[u8] {
        self.0
    }
}

/// Data rate range of a channel: minimum in the low nibble, maximum in the high nibble.
///
/// Unlike a parsed `NewChannelReq`, the range is not checked on construction; an inverted
/// range is something the channel plan rejects with a status bit, not a decoding error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DataRateRange(u8);

impl DataRateRange {
    pub fn new(byte: u8) -> Self {
        DataRateRange(byte)
    }

    pub fn new_range(min: u8, max: u8) -> Self {
        DataRateRange((max << 4) | (min & 0x0f))
    }

    pub fn min_data_rate(&self) -> u8 {
        self.0 & 0x0f
    }

    pub fn max_data_rate(&self) -> u8 {
        self.0 >> 4
    }

    /// Whether `dr` lies within `min..=max`.
    pub fn contains(&self, dr: u8) -> bool {
        (self.min_data_rate()..=self.max_data_rate()).contains(&dr)
    }

    pub fn raw_value(&self) -> u8 {
        self.0
    }
}

/// DLSettings byte of `RxParamSetupReq`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct DLSettings(u8);

impl DLSettings {
    pub fn new(byte: u8) -> DLSettings {
        DLSettings(byte)
    }

    /// Offset between the uplink data rate and the RX1 downlink data rate.
    pub fn rx1_dr_offset(&self) -> u8 {
        (self.0 >> 4) & 0x07
    }

    /// Data rate of the second receive window.
    pub fn rx2_data_rate(&self) -> u8 {
        self.0 & 0x0f
    }

    pub fn raw_value(&self) -> u8 {
        self.0
    }
}

/// Redundancy byte of `LinkADRReq`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct Redundancy(u8);

impl Redundancy {
    pub fn new(data: u8) -> Self {
        Redundancy(data)
    }

    /// Selects how the 16-bit channel mask of the same command is to be interpreted.
    pub fn channel_mask_control(&self) -> u8 {
        (self.0 >> 4) & 0x07
    }

    /// Number of transmissions of each uplink; 0 means "keep the default" of 1.
    pub fn number_of_transmissions(&self) -> u8 {
        self.0 & 0x0f
    }

    pub fn raw_value(&self) -> u8 {
        self.0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn frequency_is_little_endian_in_100hz_steps() {
        // 868.1 MHz
        let f = Frequency::new(&[0x28, 0x76, 0x84]);
        assert_eq!(f.value(), 868_100_000);
    }

    #[test]
    fn data_rate_range_nibbles() {
        let range = DataRateRange::new(0x50);
        assert_eq!(range.min_data_rate(), 0);
        assert_eq!(range.max_data_rate(), 5);
        assert!(range.contains(3));
        assert!(!range.contains(6));
        assert_eq!(DataRateRange::new_range(1, 5).raw_value(), 0x51);
    }

    #[test]
    fn redundancy_fields() {
        let r = Redundancy::new(0x63);
        assert_eq!(r.channel_mask_control(), 6);
        assert_eq!(r.number_of_transmissions(), 3);
        // bit 7 is RFU
        assert_eq!(Redundancy::new(0xf1).channel_mask_control(), 7);
    }
}
