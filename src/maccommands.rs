//! Accessors for the downlink MAC commands consumed by the channel plans, and the [`Status`]
//! bitfield returned in the matching answers.
//!
//! Payloads are the command body only (the CID byte has already been consumed by the caller).
use crate::region::Error;
use crate::types::{DLSettings, DataRateRange, Frequency, Redundancy};

macro_rules! payloads {
    ($(
        $(#[$outer:meta])*
        struct $name:ident[cid=$cid:expr, size=$size:expr]
    )*) => {
        $(
            $(#[$outer])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq)]
            #[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
            pub struct $name<'a>(&'a [u8; $size]);

            impl<'a> $name<'a> {
                pub const CID: u8 = $cid;
                pub const LEN: usize = $size;

                /// Wraps the start of `data`, which must hold at least `LEN` bytes. Trailing
                /// bytes (the next command in the same frame) are ignored.
                pub fn new(data: &'a [u8]) -> Result<$name<'a>, Error> {
                    match data.get(..$size) {
                        Some(body) => body.try_into().map($name).map_err(|_| Error::BufferTooShort),
                        None => Err(Error::BufferTooShort),
                    }
                }
            }

            impl<'a> From<&'a [u8; $size]> for $name<'a> {
                fn from(v: &'a [u8; $size]) -> Self {
                    $name(v)
                }
            }
        )*
    };
}

payloads! {
    /// `LinkADRReq`: data rate, TX power, channel mask and redundancy.
    struct LinkADRReqPayload[cid=0x03, size=4]

    /// `RXParamSetupReq`: RX1 offset, RX2 data rate and RX2 frequency.
    struct RxParamSetupReqPayload[cid=0x05, size=4]

    /// `NewChannelReq`: creates, modifies or deletes an uplink channel.
    struct NewChannelReqPayload[cid=0x07, size=5]

    /// `DlChannelReq`: moves the RX1 downlink frequency of an existing channel.
    struct DlChannelReqPayload[cid=0x0A, size=4]

    /// `PingSlotChannelReq`: class B ping slot frequency and data rate.
    struct PingSlotChannelReqPayload[cid=0x11, size=4]

    /// `BeaconFreqReq`: class B beacon frequency.
    struct BeaconFreqReqPayload[cid=0x13, size=3]
}

fn frequency(bytes: &[u8], offset: usize) -> Frequency<'_> {
    // Only called with offsets inside the fixed-size payload arrays.
    let field: &[u8; 3] = bytes[offset..offset + 3].try_into().unwrap_or(&[0; 3]);
    Frequency::new(field)
}

impl LinkADRReqPayload<'_> {
    pub fn data_rate(&self) -> u8 {
        self.0[0] >> 4
    }

    pub fn tx_power(&self) -> u8 {
        self.0[0] & 0x0f
    }

    pub fn channel_mask(&self) -> u16 {
        u16::from_le_bytes([self.0[1], self.0[2]])
    }

    pub fn redundancy(&self) -> Redundancy {
        Redundancy::new(self.0[3])
    }
}

impl RxParamSetupReqPayload<'_> {
    pub fn dl_settings(&self) -> DLSettings {
        DLSettings::new(self.0[0])
    }

    pub fn frequency(&self) -> Frequency<'_> {
        frequency(self.0, 1)
    }
}

impl NewChannelReqPayload<'_> {
    pub fn channel_index(&self) -> u8 {
        self.0[0]
    }

    pub fn frequency(&self) -> Frequency<'_> {
        frequency(self.0, 1)
    }

    pub fn data_rate_range(&self) -> DataRateRange {
        DataRateRange::new(self.0[4])
    }
}

impl DlChannelReqPayload<'_> {
    pub fn channel_index(&self) -> u8 {
        self.0[0]
    }

    pub fn frequency(&self) -> Frequency<'_> {
        frequency(self.0, 1)
    }
}

impl PingSlotChannelReqPayload<'_> {
    pub fn frequency(&self) -> Frequency<'_> {
        frequency(self.0, 0)
    }

    pub fn data_rate(&self) -> u8 {
        self.0[3] & 0x0f
    }
}

impl BeaconFreqReqPayload<'_> {
    pub fn frequency(&self) -> Frequency<'_> {
        frequency(self.0, 0)
    }
}

/// Status byte of a MAC command answer.
///
/// Every validated field of a request owns one bit; a handler starts with all of them set and
/// clears the bit of each field that fails validation. The request is applied only when no bit
/// was cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct Status {
    bits: u8,
    mask: u8,
}

impl Status {
    /// Channel (frequency / channel mask) acknowledged.
    pub const CHANNEL_ACK: u8 = 0x01;
    /// Data rate (or data rate range, or uplink channel existence for `DlChannelReq`) acknowledged.
    pub const DATA_RATE_ACK: u8 = 0x02;
    /// TX power (`LinkADRReq`) or RX1 offset (`RXParamSetupReq`) acknowledged.
    pub const POWER_ACK: u8 = 0x04;
    pub const RX1_DR_OFFSET_ACK: u8 = 0x04;

    pub(crate) const fn new(mask: u8) -> Self {
        Status { bits: mask, mask }
    }

    pub(crate) fn reject(&mut self, bit: u8) {
        self.bits &= !bit;
    }

    pub fn is_set(&self, bit: u8) -> bool {
        self.bits & bit != 0
    }

    /// All fields of the request were accepted.
    pub fn accepted(&self) -> bool {
        self.bits == self.mask
    }

    /// Raw status byte, ready to be put in the answer.
    pub fn bits(&self) -> u8 {
        self.bits
    }
}
