//! Class B beacon decoding.
//!
//! A beacon frame is laid out as
//!
//! | RFU | Time | CRC | GwSpecific | RFU | CRC |
//! |-----|------|-----|------------|-----|-----|
//! | r1  | 4    | 2   | 7          | r2  | 2   |
//!
//! where the reserved lengths `r1`/`r2` depend on the region. The first CRC covers the leading
//! RFU bytes and the time, the second one the gateway specific part and the trailing RFU bytes.
//! Multi-byte fields are little endian.
use crc::{Crc, CRC_16_XMODEM};

use super::Error;

pub(crate) const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

/// InfoDesc values announcing the GPS coordinates of the gateway antennas.
pub const GPS_FIRST_ANTENNA: u8 = 0;
pub const GPS_SECOND_ANTENNA: u8 = 1;
pub const GPS_THIRD_ANTENNA: u8 = 2;

const TIME_LEN: usize = 4;
const CRC_LEN: usize = 2;
const GW_SPECIFIC_LEN: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct BeaconLayout {
    pub rfu1: usize,
    pub rfu2: usize,
}

impl BeaconLayout {
    pub const fn new(rfu1: usize, rfu2: usize) -> Self {
        Self { rfu1, rfu2 }
    }

    /// Total length of a beacon frame.
    pub const fn len(&self) -> usize {
        self.rfu1 + TIME_LEN + CRC_LEN + GW_SPECIFIC_LEN + self.rfu2 + CRC_LEN
    }

    fn crc1_offset(&self) -> usize {
        self.rfu1 + TIME_LEN
    }

    fn gw_specific_offset(&self) -> usize {
        self.crc1_offset() + CRC_LEN
    }

    fn crc2_offset(&self) -> usize {
        self.gw_specific_offset() + GW_SPECIFIC_LEN + self.rfu2
    }

    pub fn decode(&self, payload: &[u8]) -> Result<BeaconData, Error> {
        if payload.len() != self.len() {
            warn!("beacon size mismatch: {} != {}", payload.len(), self.len());
            return Err(Error::BeaconSizeMismatch);
        }

        let crc1 = self.crc1_offset();
        if CRC16.checksum(&payload[..crc1]) != le_u16(&payload[crc1..]) {
            warn!("beacon CRC1 mismatch");
            return Err(Error::BeaconCrcMismatch);
        }

        let time = u32::from_le_bytes([
            payload[self.rfu1],
            payload[self.rfu1 + 1],
            payload[self.rfu1 + 2],
            payload[self.rfu1 + 3],
        ]);

        let gw = self.gw_specific_offset();
        let crc2 = self.crc2_offset();
        let gw_specific = &payload[gw..gw + GW_SPECIFIC_LEN];
        let info_desc = gw_specific[0];

        let gps = if CRC16.checksum(&payload[gw..crc2]) != le_u16(&payload[crc2..]) {
            // time is still usable, the gateway specific part is not
            debug!("beacon CRC2 mismatch");
            None
        } else {
            match info_desc {
                GPS_FIRST_ANTENNA | GPS_SECOND_ANTENNA | GPS_THIRD_ANTENNA => Some(Gps {
                    latitude: le_i24(&gw_specific[1..4]),
                    longitude: le_i24(&gw_specific[4..7]),
                }),
                _ => None,
            }
        };

        Ok(BeaconData { time, info_desc, gps })
    }
}

fn le_u16(bytes: &[u8]) -> u16 {
    u16::from_le_bytes([bytes[0], bytes[1]])
}

fn le_i24(bytes: &[u8]) -> i32 {
    // sign extend through the top byte
    i32::from_le_bytes([0, bytes[0], bytes[1], bytes[2]]) >> 8
}

/// Gateway antenna coordinates, as the raw 24-bit two's complement values of the beacon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct Gps {
    pub latitude: i32,
    pub longitude: i32,
}

impl Gps {
    /// Latitude in degrees, north positive.
    pub fn latitude_degrees(&self) -> f32 {
        self.latitude as f32 * 90.0 / 8_388_608.0
    }

    /// Longitude in degrees, east positive.
    pub fn longitude_degrees(&self) -> f32 {
        self.longitude as f32 * 180.0 / 8_388_608.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct BeaconData {
    /// Seconds since the GPS epoch, modulo 2^32.
    pub time: u32,
    pub info_desc: u8,
    /// Present when the gateway specific part is intact and carries antenna coordinates.
    pub gps: Option<Gps>,
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;

    /// Builds a valid beacon frame for `layout`.
    pub(crate) fn encode(layout: &BeaconLayout, time: u32, gw_specific: [u8; 7]) -> heapless::Vec<u8, 32> {
        let mut frame = heapless::Vec::new();
        frame.resize(layout.len(), 0).unwrap();
        frame[layout.rfu1..layout.rfu1 + 4].copy_from_slice(&time.to_le_bytes());
        let crc1 = layout.crc1_offset();
        let c = CRC16.checksum(&frame[..crc1]);
        frame[crc1..crc1 + 2].copy_from_slice(&c.to_le_bytes());
        let gw = layout.gw_specific_offset();
        frame[gw..gw + 7].copy_from_slice(&gw_specific);
        let crc2 = layout.crc2_offset();
        let c = CRC16.checksum(&frame[gw..crc2]);
        frame[crc2..crc2 + 2].copy_from_slice(&c.to_le_bytes());
        frame
    }

    #[test]
    fn checksum_matches_reference_beacon() {
        // EU868 example frame: time 0xCC020000, GPS antenna 0, lat/long 0x002001 / 0x038100
        let frame = hex::decode("00000000 02cc a27e 00 012000 008103 de55".replace(' ', "")).unwrap();
        let data = BeaconLayout::new(2, 0).decode(&frame).unwrap();
        assert_eq!(data.time, 0xcc02_0000);
        assert_eq!(data.info_desc, GPS_FIRST_ANTENNA);
        assert_eq!(data.gps, Some(Gps { latitude: 0x00_2001, longitude: 0x03_8100 }));
    }

    #[test]
    fn roundtrip_with_negative_coordinates() {
        let layout = BeaconLayout::new(5, 3);
        let frame = encode(&layout, 1_234_567, [GPS_THIRD_ANTENNA, 0xff, 0xff, 0xff, 0x00, 0x00, 0x80]);
        let data = layout.decode(&frame).unwrap();
        assert_eq!(data.time, 1_234_567);
        let gps = data.gps.unwrap();
        assert_eq!(gps.latitude, -1);
        assert_eq!(gps.longitude, -8_388_608);
        assert_eq!(gps.longitude_degrees(), -180.0);
        assert!(gps.latitude_degrees() < 0.0 && gps.latitude_degrees() > -0.001);
    }

    #[test]
    fn size_mismatch() {
        let layout = BeaconLayout::new(2, 0);
        let frame = encode(&layout, 0, [0; 7]);
        assert_eq!(layout.decode(&frame[..16]), Err(Error::BeaconSizeMismatch));
        assert_eq!(BeaconLayout::new(5, 3).decode(&frame), Err(Error::BeaconSizeMismatch));
    }

    #[test]
    fn crc1_failure_is_fatal() {
        let layout = BeaconLayout::new(2, 0);
        let mut frame = encode(&layout, 42, [0; 7]);
        frame[3] ^= 0x01;
        assert_eq!(layout.decode(&frame), Err(Error::BeaconCrcMismatch));
    }

    #[test]
    fn crc2_failure_keeps_time() {
        let layout = BeaconLayout::new(1, 1);
        let mut frame = encode(&layout, 42, [GPS_FIRST_ANTENNA, 1, 2, 3, 4, 5, 6]);
        let last = frame.len() - 1;
        frame[last] ^= 0xff;
        let data = layout.decode(&frame).unwrap();
        assert_eq!(data.time, 42);
        assert_eq!(data.gps, None);
    }

    #[test]
    fn non_gps_descriptor_has_no_coordinates() {
        let layout = BeaconLayout::new(2, 0);
        let frame = encode(&layout, 42, [3, 1, 2, 3, 4, 5, 6]);
        assert_eq!(layout.decode(&frame).unwrap().gps, None);
    }
}
