//! LoRaWAN regional channel plans (CN470, EU868, IN865, US915).
use core::ops::Range;

use heapless::Vec;
use lora_modulation::{Bandwidth, SpreadingFactor};
use rand_core::RngCore;

use crate::maccommands::{
    BeaconFreqReqPayload, LinkADRReqPayload, PingSlotChannelReqPayload, RxParamSetupReqPayload,
    Status,
};
use crate::radio::{Modem, Modulation, Radio, TxConfig, FSK_BITRATE, FSK_DEVIATION, TX_TIMEOUT_MS};
use crate::settings::{MulticastSession, Settings};
use crate::timer::Clock;
use crate::types::DataRateRange;

mod beacon;
mod channel_mask;
pub(crate) mod constants;
mod duty_cycle;
mod random_channel;

pub use beacon::{
    BeaconData, BeaconLayout, Gps, GPS_FIRST_ANTENNA, GPS_SECOND_ANTENNA, GPS_THIRD_ANTENNA,
};
pub use channel_mask::ChannelMask;
use constants::*;
pub use duty_cycle::DutyBand;
use duty_cycle::DutyBands;
use random_channel::RandomChannel;

#[cfg(not(any(
    feature = "region-cn470",
    feature = "region-eu868",
    feature = "region-in865",
    feature = "region-us915"
)))]
compile_error!("You must enable at least one region! eg: `region-eu868`, `region-us915`...");

#[cfg(any(feature = "region-eu868", feature = "region-in865"))]
mod dynamic_channel_plans;
#[cfg(feature = "region-eu868")]
pub(crate) use dynamic_channel_plans::EU868;
#[cfg(feature = "region-in865")]
pub(crate) use dynamic_channel_plans::IN865;

#[cfg(any(feature = "region-cn470", feature = "region-us915"))]
mod fixed_channel_plans;
#[cfg(feature = "region-cn470")]
pub(crate) use fixed_channel_plans::CN470;
#[cfg(feature = "region-us915")]
pub(crate) use fixed_channel_plans::US915;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum Error {
    /// The operation or MAC command does not exist in this region.
    Unsupported,
    /// No channel can be used right now: none enabled, all duty-cycle restricted, or no free
    /// channel found by channel activity detection.
    NoChannelsEnabled,
    /// The aggregated duty cycle forbids transmitting. See [`ChannelPlan::time_off_air`].
    AggregatedDutyCycle,
    BeaconSizeMismatch,
    BeaconCrcMismatch,
    /// The command carries a reserved or unsupported value and was not applied. The status to
    /// answer with is included.
    Malformed(Status),
    InvalidIndex,
    BufferTooShort,
}

pub type Result<T = ()> = core::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
/// Regions supported by this crate: CN470, EU868, IN865, US915.
/// Each region is individually feature-gated (eg: `region-eu868`), however, by default, all
/// regions are enabled.
pub enum Region {
    #[cfg(feature = "region-cn470")]
    CN470,
    #[cfg(feature = "region-eu868")]
    EU868,
    #[cfg(feature = "region-in865")]
    IN865,
    #[cfg(feature = "region-us915")]
    US915,
}

/// Receive windows the outer MAC may open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum Window {
    _1,
    _2,
    Beacon,
    /// Class B ping slot; `1..=8` selects a multicast session, anything else the unicast slot.
    PingSlot(u8),
    /// Class C window; `1..=8` selects an active multicast session, anything else RX2.
    C(u8),
}

/// Frequency and data rate of a receive window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct RxWindow {
    pub frequency: u32,
    pub datarate: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Channel {
    frequency: u32,
    datarates: DataRateRange,
    dl_frequency: Option<u32>,
}

impl Channel {
    pub fn new(frequency: u32, min_datarate: u8, max_datarate: u8) -> Self {
        Self::with_range(frequency, DataRateRange::new_range(min_datarate, max_datarate))
    }

    pub fn with_range(frequency: u32, datarates: DataRateRange) -> Self {
        Self { frequency, datarates, dl_frequency: None }
    }

    /// Uplink frequency in Hz.
    pub fn frequency(&self) -> u32 {
        self.frequency
    }

    pub fn datarates(&self) -> DataRateRange {
        self.datarates
    }

    /// Downlink frequency of RX1: the `DlChannelReq` override if any, otherwise the uplink one.
    pub fn rx1_frequency(&self) -> u32 {
        self.dl_frequency.unwrap_or(self.frequency)
    }

    pub(crate) fn set_dl_frequency(&mut self, frequency: u32) {
        self.dl_frequency = if frequency == self.frequency { None } else { Some(frequency) };
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Datarate {
    pub modulation: Modulation,
    pub preamble_len: u16,
    pub crc: bool,
    pub tx_iq_inverted: bool,
    pub rx_iq_inverted: bool,
    pub max_payload_size: u8,
    /// Maximum payload size when the frame may travel through a repeater.
    pub max_payload_size_repeater: u8,
}

impl Datarate {
    pub(crate) const fn lora(
        spreading_factor: SpreadingFactor,
        bandwidth: Bandwidth,
        max_payload_size: u8,
        max_payload_size_repeater: u8,
    ) -> Self {
        Self {
            modulation: Modulation::Lora {
                spreading_factor,
                bandwidth,
                coding_rate: DEFAULT_CODING_RATE,
            },
            preamble_len: DEFAULT_PREAMBLE_LEN,
            crc: true,
            tx_iq_inverted: false,
            rx_iq_inverted: true,
            max_payload_size,
            max_payload_size_repeater,
        }
    }

    pub(crate) const fn fsk(max_payload_size: u8, max_payload_size_repeater: u8) -> Self {
        Self {
            modulation: Modulation::Fsk { bitrate: FSK_BITRATE, deviation: FSK_DEVIATION },
            preamble_len: FSK_PREAMBLE_LEN,
            crc: true,
            tx_iq_inverted: false,
            rx_iq_inverted: false,
            max_payload_size,
            max_payload_size_repeater,
        }
    }

    pub fn modem(&self) -> Modem {
        self.modulation.modem()
    }

    pub(crate) fn is_500khz(&self) -> bool {
        matches!(self.modulation, Modulation::Lora { bandwidth: Bandwidth::_500KHz, .. })
    }
}

/// How a channel is picked among the usable ones when channel activity detection is off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Selection {
    /// Random without repetition until every enabled channel was used.
    Fair,
    /// Random with repetition.
    Uniform,
}

/// Static description of a region.
pub(crate) trait ChannelRegion {
    const FREQ_MIN: u32;
    const FREQ_MAX: u32;

    const MIN_DATARATE: u8;
    const MAX_DATARATE: u8;
    /// Uplink data rate bounds in peer to peer mode.
    const P2P_MIN_DATARATE: u8 = Self::MIN_DATARATE;
    const P2P_MAX_DATARATE: u8 = Self::MAX_DATARATE;
    const MIN_RX2_DATARATE: u8;
    const MAX_RX2_DATARATE: u8;
    const MAX_RX1_DR_OFFSET: u8;

    const DEFAULT_RX2_FREQUENCY: u32;
    const DEFAULT_RX2_DATARATE: u8;

    /// Beacon frequency, or base of the hopping sequence when `BEACON_FREQUENCY_STEP` is not 0.
    const BEACON_FREQUENCY: u32;
    const BEACON_FREQUENCY_STEP: u32 = 0;
    const BEACON_DATARATE: u8;
    const BEACON: BeaconLayout;

    const MIN_TX_POWER: u8 = 0;
    const MAX_TX_POWER: u8;
    /// Conducted power of each TX power index, in dBm, in decreasing order.
    const TX_POWERS: &'static [u8];

    const CHANNEL_SELECTION: Selection = Selection::Fair;
    /// Join back-off still counts in the time off air once the device joined.
    const JOIN_BACKOFF_WHEN_JOINED: bool = true;

    fn datarates() -> &'static [Option<Datarate>; NUM_DATARATES];
    fn duty_bands() -> &'static [DutyBand];

    fn frequency_hopping() -> bool {
        Self::BEACON_FREQUENCY_STEP != 0
    }

    fn frequency_valid(frequency: u32) -> bool {
        (Self::FREQ_MIN..=Self::FREQ_MAX).contains(&frequency)
    }

    fn datarate(index: u8) -> Option<&'static Datarate> {
        Self::datarates().get(index as usize).and_then(|dr| dr.as_ref())
    }

    /// Uplink data rate usable in this region.
    fn datarate_valid(datarate: u8) -> bool {
        (Self::MIN_DATARATE..=Self::MAX_DATARATE).contains(&datarate)
            && Self::datarate(datarate).is_some()
    }

    fn rx2_datarate_valid(datarate: u8) -> bool {
        (Self::MIN_RX2_DATARATE..=Self::MAX_RX2_DATARATE).contains(&datarate)
            && Self::datarate(datarate).is_some()
    }

    /// Floors at the lowest uplink data rate of the region, not at DR0.
    fn rx1_datarate(tx_datarate: u8, offset: u8) -> u8 {
        tx_datarate.saturating_sub(offset).max(Self::MIN_DATARATE)
    }

    /// Final mapping of a receive window data rate.
    fn rx_datarate(datarate: u8) -> u8 {
        datarate
    }

    /// Join request data rate derived from the DevNonce, spreading joins over DR0..DR5.
    fn join_datarate(dev_nonce: u16) -> u8 {
        match dev_nonce % 20 {
            0 => 0,
            16 => 1,
            12 => 2,
            8 => 3,
            4 => 4,
            _ => 5,
        }
        .clamp(Self::MIN_DATARATE, Self::MAX_DATARATE)
    }

    /// Index handed to the radio driver for power table index `index`.
    fn radio_power_index(index: u8) -> u8 {
        index
    }

    /// Band transmissions exempt from off-air time at `power_dbm` (conducted power plus antenna
    /// gain).
    fn duty_cycle_exempt(_frequency: u32, _power_dbm: i16) -> bool {
        false
    }

    fn ack_timeout(_rx2_datarate: u8) -> u32 {
        0
    }
}

/// Mutable state common to all channel plans.
#[derive(Debug, Clone)]
pub(crate) struct PlanState {
    pub(crate) channel_mask: ChannelMask,
    pub(crate) duty_bands: DutyBands,
    pub(crate) random: RandomChannel,
    pub(crate) tx_channel: u8,
}

impl PlanState {
    pub(crate) fn new(num_channels: usize, bands: &[DutyBand]) -> Self {
        Self {
            channel_mask: ChannelMask::new(num_channels),
            duty_bands: DutyBands::new(bands),
            random: RandomChannel::default(),
            tx_channel: 0,
        }
    }
}

/// Region behavior. Plans implement the channel bookkeeping, everything else is shared.
pub(crate) trait RegionHandler {
    type Region: ChannelRegion;

    fn state(&self) -> &PlanState;
    fn state_mut(&mut self) -> &mut PlanState;

    /// Restores the channel table to its power-on content.
    fn reset_channels(&mut self);
    fn num_channels(&self) -> usize;
    fn channel(&self, index: u8) -> Option<Channel>;
    fn add_channel(&mut self, index: u8, channel: Channel) -> Result;
    fn set_frequency_sub_band(&mut self, sub_band: u8);
    fn enable_default_channels(&mut self, settings: &Settings);
    fn rx1_frequency(&self, settings: &Settings) -> u32;
    fn apply_channel_mask(&self, control: u8, mask: u16, target: &mut ChannelMask) -> bool;
    fn validate_channel_mask(&self, datarate: u8, status: &mut Status);
    fn handle_new_channel(&mut self, payload: &[u8]) -> Result<Status>;
    fn handle_dl_channel(&mut self, payload: &[u8]) -> Result<Status>;
    fn handle_join_accept(&mut self, settings: &mut Settings, frame: &[u8]);

    fn rx2_frequency(&self, settings: &Settings) -> u32 {
        settings.session.rx2_frequency
    }

    /// Channels eligible for `datarate`.
    fn channel_range(&self, _datarate: &Datarate) -> Range<usize> {
        0..self.num_channels()
    }

    /// Called before the channel scan; may lower the data rate to one that has channels.
    fn before_channel_scan(&mut self, _settings: &mut Settings) {}

    /// Called after the channel scan with the number of usable channels.
    fn after_channel_scan(&mut self, _datarate: &Datarate, _usable: usize) {}

    /// Called when the uplink goes out on a fixed frequency and no channel scan happens.
    fn fixed_frequency_selected(&mut self) {}

    fn adjust_max_power(&self, max_power: i8, _power: i8, _antenna_gain: i8, _datarate: &Datarate) -> i8 {
        max_power
    }

    /// Channels reported by [`ChannelPlan::channels`].
    fn listed_channels(&self, _settings: &Settings) -> Vec<u8, MAX_CHANNELS> {
        (0..self.num_channels()).map(|c| c as u8).collect()
    }

    fn set_duty_band_duty_cycle(&mut self, _band: usize, _duty_cycle: u16) -> Result {
        Err(Error::Unsupported)
    }

    fn join_datarate(&mut self, settings: &Settings) -> u8 {
        if settings.network.disable_random_join_datarate {
            return settings.session.tx_datarate;
        }
        Self::Region::join_datarate(settings.network.dev_nonce)
    }

    fn init(&mut self, settings: &mut Settings) {
        self.reset_channels();
        let state = PlanState::new(self.num_channels(), Self::Region::duty_bands());
        *self.state_mut() = state;
        self.enable_default_channels(settings);

        let hop = Self::Region::frequency_hopping();
        let tx_power = settings.network.tx_power;
        let session = &mut settings.session;
        session.tx_datarate = Self::Region::MIN_DATARATE;
        session.tx_power = tx_power;
        session.rx1_datarate_offset = 0;
        session.rx2_frequency = Self::Region::DEFAULT_RX2_FREQUENCY;
        session.rx2_datarate = Self::Region::DEFAULT_RX2_DATARATE;
        session.aggregated_time_off_end = 0;
        session.beacon_frequency = Self::Region::BEACON_FREQUENCY;
        session.beacon_freq_hop = hop;
        session.ping_slot_frequency = Self::Region::BEACON_FREQUENCY;
        session.ping_slot_datarate = Self::Region::BEACON_DATARATE;
        session.ping_slot_freq_hop = hop;
        debug!("channel plan initialized with {} channels", self.num_channels());
    }

    fn datarate(&self, index: u8) -> Option<&'static Datarate> {
        Self::Region::datarate(index)
    }

    fn min_datarate(&self, settings: &Settings) -> u8 {
        if settings.p2p_enabled() {
            Self::Region::P2P_MIN_DATARATE
        } else {
            Self::Region::MIN_DATARATE
        }
    }

    fn max_datarate(&self, settings: &Settings) -> u8 {
        if settings.p2p_enabled() {
            Self::Region::P2P_MAX_DATARATE
        } else {
            Self::Region::MAX_DATARATE
        }
    }

    fn next_channel<RADIO: Radio, C: Clock, RNG: RngCore>(
        &mut self,
        settings: &mut Settings,
        radio: &mut RADIO,
        clock: &C,
        rng: &mut RNG,
    ) -> Result {
        let now = clock.monotonic_ms();
        let elapsed = self.state().duty_bands.elapsed(now);
        let session = &mut settings.session;
        if session.aggregated_time_off_end != 0 {
            if session.aggregated_time_off_end > elapsed {
                debug!(
                    "aggregated duty cycle: {} ms left",
                    session.aggregated_time_off_end - elapsed
                );
                return Err(Error::AggregatedDutyCycle);
            }
            session.aggregated_time_off_end = 0;
        }

        let duty_cycle_disabled = settings.network.disable_duty_cycle;
        self.state_mut().duty_bands.refresh(now, duty_cycle_disabled);

        if let Some(frequency) = settings.fixed_frequency() {
            let bands = &self.state().duty_bands;
            if !duty_cycle_disabled {
                if let Some(band) = bands.band_index(frequency) {
                    if !bands.is_usable(band, now) {
                        return Err(Error::NoChannelsEnabled);
                    }
                }
            }
            self.fixed_frequency_selected();
            radio.set_channel(frequency);
            return Ok(());
        }

        self.before_channel_scan(settings);
        let tx_datarate = settings.session.tx_datarate;
        let datarate = self.datarate(tx_datarate).ok_or(Error::NoChannelsEnabled)?;

        let mut usable: Vec<u8, MAX_CHANNELS> = Vec::new();
        let state = self.state();
        for index in self.channel_range(datarate) {
            if !state.channel_mask.is_enabled(index) {
                continue;
            }
            let Some(channel) = self.channel(index as u8) else {
                continue;
            };
            if !channel.datarates().contains(tx_datarate) {
                continue;
            }
            match state.duty_bands.band_index(channel.frequency()) {
                Some(band) if state.duty_bands.is_usable(band, now) => {
                    // channel_range never exceeds MAX_CHANNELS
                    let _ = usable.push(index as u8);
                }
                _ => {}
            }
        }
        trace!("{} usable channels at DR{}", usable.len(), tx_datarate);
        self.after_channel_scan(datarate, usable.len());
        if usable.is_empty() {
            return Err(Error::NoChannelsEnabled);
        }

        let channel = if settings.network.cad_enabled {
            self.free_channel(&usable, datarate.modem(), radio, clock, rng)?
        } else {
            match Self::Region::CHANNEL_SELECTION {
                Selection::Fair => self.state_mut().random.next_channel(&usable, rng),
                Selection::Uniform => random_channel::uniform(&usable, rng),
            }
            .ok_or(Error::NoChannelsEnabled)?
        };

        self.state_mut().tx_channel = channel;
        let frequency = self.channel(channel).map(|c| c.frequency()).unwrap_or_default();
        debug!("transmitting on channel {} ({} Hz)", channel, frequency);
        radio.set_channel(frequency);
        Ok(())
    }

    /// Listen before talk over `usable`, for at most `CAD_TIMEOUT_MS`.
    fn free_channel<RADIO: Radio, C: Clock, RNG: RngCore>(
        &mut self,
        usable: &[u8],
        modem: Modem,
        radio: &mut RADIO,
        clock: &C,
        rng: &mut RNG,
    ) -> Result<u8> {
        let start = clock.monotonic_ms();
        let offset = rng.next_u32() as usize % usable.len();
        let mut attempt = 0;
        while clock.monotonic_ms().saturating_sub(start) < CAD_TIMEOUT_MS {
            let channel = match Self::Region::CHANNEL_SELECTION {
                Selection::Fair => self
                    .state_mut()
                    .random
                    .next_channel(usable, rng)
                    .ok_or(Error::NoChannelsEnabled)?,
                Selection::Uniform => usable[(offset + attempt) % usable.len()],
            };
            attempt += 1;
            let frequency = self.channel(channel).map(|c| c.frequency()).unwrap_or_default();
            if radio.is_channel_free(modem, frequency, FREE_CHANNEL_RSSI_THRESHOLD) {
                return Ok(channel);
            }
            trace!("channel {} busy", channel);
        }
        warn!("no free channel after {} attempts", attempt);
        Err(Error::NoChannelsEnabled)
    }

    fn set_tx_config<RADIO: Radio>(&self, settings: &Settings, radio: &mut RADIO) -> Result<TxConfig> {
        let datarate = self.datarate(settings.session.tx_datarate).ok_or(Error::InvalidIndex)?;
        let frequency = match settings.fixed_frequency() {
            Some(frequency) => frequency,
            None => self
                .channel(self.state().tx_channel)
                .map(|c| c.frequency())
                .unwrap_or_default(),
        };

        let mut max_power = match self.state().duty_bands.band(frequency) {
            Some(band) => band.max_power,
            None => i8::try_from(Self::Region::MAX_TX_POWER).unwrap_or(i8::MAX),
        };
        let antenna_gain = settings.network.antenna_gain;
        let power = i8::try_from(settings.session.tx_power).unwrap_or(i8::MAX);
        max_power = self.adjust_max_power(max_power, power, antenna_gain, datarate);
        let target = power.min(max_power).saturating_sub(antenna_gain);

        let powers = Self::Region::TX_POWERS;
        let index = powers
            .iter()
            .position(|p| i16::from(*p) <= i16::from(target))
            .unwrap_or(powers.len().saturating_sub(1));

        let crc_on = match datarate.modulation {
            Modulation::Fsk { .. } => true,
            Modulation::Lora { .. } => !settings.p2p_enabled() && datarate.crc,
        };

        let config = TxConfig {
            power: powers.get(index).map(|p| *p as i8).unwrap_or_default(),
            power_index: Self::Region::radio_power_index(index as u8),
            modulation: datarate.modulation.clone(),
            preamble_len: datarate.preamble_len,
            fixed_len: false,
            crc_on,
            freq_hop_on: false,
            hop_period: 0,
            iq_inverted: datarate.tx_iq_inverted,
            timeout_ms: TX_TIMEOUT_MS,
        };
        debug!("tx config: {} dBm (index {})", config.power, config.power_index);
        radio.set_tx_config(&config);
        Ok(config)
    }

    fn rx_window(&self, settings: &Settings, window: Window) -> RxWindow {
        let session = &settings.session;
        if settings.p2p_enabled() {
            return RxWindow {
                frequency: settings.network.tx_frequency,
                datarate: Self::Region::rx_datarate(session.tx_datarate),
            };
        }
        let rx2 = || (self.rx2_frequency(settings), session.rx2_datarate);
        let multicast = |id: u8| multicast_session(settings, id);

        let (frequency, datarate) = match window {
            Window::_1 => (
                self.rx1_frequency(settings),
                Self::Region::rx1_datarate(session.tx_datarate, session.rx1_datarate_offset),
            ),
            Window::_2 => rx2(),
            Window::Beacon => (session.beacon_frequency, Self::Region::BEACON_DATARATE),
            Window::PingSlot(id) => match multicast(id) {
                Some(mc) => (mc.frequency, mc.datarate),
                None => (session.ping_slot_frequency, session.ping_slot_datarate),
            },
            Window::C(id) => match multicast(id) {
                Some(mc) if mc.active => (mc.frequency, mc.datarate),
                _ => rx2(),
            },
        };
        RxWindow { frequency, datarate: Self::Region::rx_datarate(datarate) }
    }

    fn handle_rx_param_setup(&mut self, settings: &mut Settings, payload: &[u8]) -> Result<Status> {
        let req = RxParamSetupReqPayload::new(payload)?;
        let dl_settings = req.dl_settings();
        let frequency = req.frequency().value();
        let datarate = dl_settings.rx2_data_rate();
        let offset = dl_settings.rx1_dr_offset();

        let mut status = Status::new(0x07);
        if !Self::Region::frequency_valid(frequency) {
            status.reject(Status::CHANNEL_ACK);
        }
        if !Self::Region::rx2_datarate_valid(datarate) {
            status.reject(Status::DATA_RATE_ACK);
        }
        if offset > Self::Region::MAX_RX1_DR_OFFSET {
            status.reject(Status::RX1_DR_OFFSET_ACK);
        }

        if status.accepted() {
            let session = &mut settings.session;
            session.rx2_frequency = frequency;
            session.rx2_datarate = datarate;
            session.rx1_datarate_offset = offset;
        } else {
            debug!("RxParamSetupReq rejected: {}", status.bits());
        }
        Ok(status)
    }

    fn handle_ping_slot_channel(
        &mut self,
        settings: &mut Settings,
        payload: &[u8],
    ) -> Result<Status> {
        let req = PingSlotChannelReqPayload::new(payload)?;
        let frequency = req.frequency().value();
        let datarate = req.data_rate();

        let mut status = Status::new(0x03);
        if frequency != 0 && !Self::Region::frequency_valid(frequency) {
            status.reject(Status::CHANNEL_ACK);
        }
        if !Self::Region::rx2_datarate_valid(datarate) {
            status.reject(Status::DATA_RATE_ACK);
        }

        if status.accepted() {
            let session = &mut settings.session;
            if frequency == 0 {
                session.ping_slot_frequency = Self::Region::BEACON_FREQUENCY;
                session.ping_slot_freq_hop = Self::Region::frequency_hopping();
            } else {
                session.ping_slot_frequency = frequency;
                session.ping_slot_freq_hop = false;
            }
            session.ping_slot_datarate = datarate;
        }
        Ok(status)
    }

    fn handle_beacon_frequency(&mut self, settings: &mut Settings, payload: &[u8]) -> Result<Status> {
        let req = BeaconFreqReqPayload::new(payload)?;
        let frequency = req.frequency().value();

        let mut status = Status::new(0x01);
        if frequency != 0 && !Self::Region::frequency_valid(frequency) {
            status.reject(Status::CHANNEL_ACK);
        }

        if status.accepted() {
            let session = &mut settings.session;
            if frequency == 0 {
                session.beacon_frequency = Self::Region::BEACON_FREQUENCY;
                session.beacon_freq_hop = Self::Region::frequency_hopping();
            } else {
                session.beacon_frequency = frequency;
                session.beacon_freq_hop = false;
            }
        }
        Ok(status)
    }

    fn handle_link_adr(&mut self, settings: &mut Settings, payload: &[u8]) -> Result<Status> {
        let req = LinkADRReqPayload::new(payload)?;
        let datarate = req.data_rate();
        let power = req.tx_power();
        let mask = req.channel_mask();
        let redundancy = req.redundancy();
        let control = redundancy.channel_mask_control();
        let transmissions = redundancy.number_of_transmissions().max(1);

        let mut status = Status::new(0x07);
        if datarate != ADR_KEEP_CURRENT && !Self::Region::datarate_valid(datarate) {
            status.reject(Status::DATA_RATE_ACK);
        }
        if power != ADR_KEEP_CURRENT && usize::from(power) >= Self::Region::TX_POWERS.len() {
            status.reject(Status::POWER_ACK);
        }

        let mut channel_mask = self.state().channel_mask.clone();
        if !self.apply_channel_mask(control, mask, &mut channel_mask) {
            warn!("LinkADRReq with unsupported mask control {}", control);
            status.reject(Status::CHANNEL_ACK);
            return Err(Error::Malformed(status));
        }
        if !status.accepted() {
            debug!("LinkADRReq rejected: {}", status.bits());
            return Ok(status);
        }

        self.state_mut().channel_mask = channel_mask;
        if settings.network.adr_enabled {
            let session = &mut settings.session;
            if datarate != ADR_KEEP_CURRENT {
                session.tx_datarate = datarate;
            }
            if power != ADR_KEEP_CURRENT {
                if let Some(dbm) = Self::Region::TX_POWERS.get(usize::from(power)) {
                    session.tx_power = *dbm;
                }
            }
            session.redundancy = transmissions;
        }
        Ok(status)
    }

    /// Checks the configuration resulting from a batch of `LinkADRReq`.
    fn validate_adr_configuration(&self, settings: &Settings) -> Status {
        let datarate = settings.session.tx_datarate;
        let power = settings.session.tx_power;

        let mut status = Status::new(0x07);
        if settings.network.adr_enabled {
            if !Self::Region::datarate_valid(datarate) {
                status.reject(Status::DATA_RATE_ACK);
            }
            if !(Self::Region::MIN_TX_POWER..=Self::Region::MAX_TX_POWER).contains(&power) {
                status.reject(Status::POWER_ACK);
            }
        }
        self.validate_channel_mask(datarate, &mut status);
        status
    }

    /// Accounts for a transmission of `time_on_air_ms` on `frequency`.
    fn update_duty_cycle<C: Clock>(
        &mut self,
        settings: &mut Settings,
        clock: &C,
        frequency: u32,
        time_on_air_ms: u32,
    ) {
        let now = clock.monotonic_ms();
        let power = i16::from(settings.session.tx_power) + i16::from(settings.network.antenna_gain);
        let session = &mut settings.session;
        session.aggregated_time_off_end = if (1..=15).contains(&session.max_duty_cycle) {
            u64::from(time_on_air_ms) * u64::from(session.aggregate_duty_cycle)
        } else {
            0
        };
        self.state_mut().duty_bands.update(now, frequency, time_on_air_ms, |band| {
            band.duty_cycle != 0 && Self::Region::duty_cycle_exempt(frequency, power)
        });
    }

    /// Milliseconds before the next uplink is allowed.
    fn time_off_air<C: Clock>(&self, settings: &Settings, clock: &C) -> u64 {
        let now = clock.monotonic_ms();
        let bands = &self.state().duty_bands;

        let mut time_off = 0;
        if !settings.network.disable_duty_cycle {
            time_off = match settings.fixed_frequency() {
                Some(frequency) => {
                    bands.band_index(frequency).map(|b| bands.remaining(b, now)).unwrap_or(0)
                }
                None => self.channel_time_off(settings, now),
            };
        }

        let session = &settings.session;
        let elapsed = bands.elapsed(now);
        time_off = time_off.max(session.aggregated_time_off_end.saturating_sub(elapsed));

        let wall = clock.wall_secs();
        let join_pending = session.join_first_attempt != 0
            && (Self::Region::JOIN_BACKOFF_WHEN_JOINED || !session.joined);
        if join_pending && wall < session.join_time_off_end {
            time_off = time_off.max((session.join_time_off_end - wall).saturating_mul(1000));
        }
        time_off
    }

    /// Shortest band off-air time over the channels usable at the current data rate.
    fn channel_time_off(&self, settings: &Settings, now: u64) -> u64 {
        let state = self.state();
        let datarate = settings.session.tx_datarate;
        let mut shortest: Option<u64> = None;
        for index in 0..self.num_channels() {
            if !state.channel_mask.is_enabled(index) {
                continue;
            }
            let Some(channel) = self.channel(index as u8) else {
                continue;
            };
            if !channel.datarates().contains(datarate) {
                continue;
            }
            if let Some(band) = state.duty_bands.band_index(channel.frequency()) {
                let remaining = state.duty_bands.remaining(band, now);
                if remaining == 0 {
                    return 0;
                }
                shortest = Some(shortest.map_or(remaining, |s| s.min(remaining)));
            }
        }
        shortest.filter(|s| *s != u64::MAX).unwrap_or(0)
    }

    fn decode_beacon(&self, payload: &[u8]) -> Result<BeaconData> {
        Self::Region::BEACON.decode(payload)
    }

    fn ack_timeout(&self, settings: &Settings) -> u32 {
        Self::Region::ack_timeout(settings.session.rx2_datarate)
    }

    /// Moves the class B frequencies along the hopping sequence for the beacon period starting
    /// at `time` (seconds).
    fn frequency_hop(&self, settings: &mut Settings, time: u32, period: u32, dev_addr: u32) {
        if !Self::Region::frequency_hopping() || period == 0 {
            return;
        }
        let slot = time / period;
        let hop = |address: u32| {
            let channel = slot.wrapping_add(address) % NUM_BEACON_CHANNELS;
            Self::Region::BEACON_FREQUENCY + Self::Region::BEACON_FREQUENCY_STEP * channel
        };

        let session = &mut settings.session;
        if session.beacon_freq_hop {
            session.beacon_frequency = hop(0);
        }
        if session.ping_slot_freq_hop {
            session.ping_slot_frequency = hop(dev_addr);
        }
        for mc in settings.multicast.iter_mut().filter(|mc| mc.active && mc.freq_hop) {
            mc.frequency = hop(mc.address);
        }
    }

    fn increment_datarate(&self, datarate: u8) -> u8 {
        (datarate.saturating_add(1)..=Self::Region::MAX_DATARATE)
            .find(|dr| Self::Region::datarate_valid(*dr))
            .unwrap_or(datarate)
    }

    fn decrement_datarate(&self, datarate: u8) -> u8 {
        (Self::Region::MIN_DATARATE..datarate)
            .rev()
            .find(|dr| Self::Region::datarate_valid(*dr))
            .unwrap_or(datarate)
    }

    fn max_payload_size(&self, datarate: u8, repeater_compatible: bool) -> u8 {
        match self.datarate(datarate) {
            Some(dr) if repeater_compatible => dr.max_payload_size_repeater,
            Some(dr) => dr.max_payload_size,
            None => 0,
        }
    }

    fn channels(&self, settings: &Settings) -> Vec<u32, { MAX_CHANNELS + 1 }> {
        let mut frequencies: Vec<u32, { MAX_CHANNELS + 1 }> = self
            .listed_channels(settings)
            .iter()
            .map(|c| self.channel(*c).map(|ch| ch.frequency()).unwrap_or_default())
            .collect();
        let _ = frequencies.push(self.rx2_frequency(settings));
        frequencies
    }

    fn channel_ranges(&self, settings: &Settings) -> Vec<DataRateRange, { MAX_CHANNELS + 1 }> {
        let mut ranges: Vec<DataRateRange, { MAX_CHANNELS + 1 }> = self
            .listed_channels(settings)
            .iter()
            .map(|c| self.channel(*c).map(|ch| ch.datarates()).unwrap_or_default())
            .collect();
        let rx2 = settings.session.rx2_datarate;
        let _ = ranges.push(DataRateRange::new_range(rx2, rx2));
        ranges
    }
}

/// Multicast session addressed by a ping slot or class C window id (1-based).
fn multicast_session(settings: &Settings, id: u8) -> Option<&MulticastSession> {
    usize::from(id).checked_sub(1).and_then(|index| settings.multicast.get(index))
}

#[derive(Clone)]
enum State {
    #[cfg(feature = "region-cn470")]
    CN470(CN470),
    #[cfg(feature = "region-eu868")]
    EU868(EU868),
    #[cfg(feature = "region-in865")]
    IN865(IN865),
    #[cfg(feature = "region-us915")]
    US915(US915),
}

impl State {
    fn new(region: Region) -> State {
        match region {
            #[cfg(feature = "region-cn470")]
            Region::CN470 => State::CN470(CN470::default()),
            #[cfg(feature = "region-eu868")]
            Region::EU868 => State::EU868(EU868::default()),
            #[cfg(feature = "region-in865")]
            Region::IN865 => State::IN865(IN865::default()),
            #[cfg(feature = "region-us915")]
            Region::US915 => State::US915(US915::default()),
        }
    }

    pub fn region(&self) -> Region {
        match self {
            #[cfg(feature = "region-cn470")]
            Self::CN470(_) => Region::CN470,
            #[cfg(feature = "region-eu868")]
            Self::EU868(_) => Region::EU868,
            #[cfg(feature = "region-in865")]
            Self::IN865(_) => Region::IN865,
            #[cfg(feature = "region-us915")]
            Self::US915(_) => Region::US915,
        }
    }
}

macro_rules! mut_region_dispatch {
  ($s:expr, $t:tt) => {
      match &mut $s.state {
        #[cfg(feature = "region-cn470")]
        State::CN470(state) => state.$t(),
        #[cfg(feature = "region-eu868")]
        State::EU868(state) => state.$t(),
        #[cfg(feature = "region-in865")]
        State::IN865(state) => state.$t(),
        #[cfg(feature = "region-us915")]
        State::US915(state) => state.$t(),
    }
  };
  ($s:expr, $t:tt, $($arg:tt)*) => {
      match &mut $s.state {
        #[cfg(feature = "region-cn470")]
        State::CN470(state) => state.$t($($arg)*),
        #[cfg(feature = "region-eu868")]
        State::EU868(state) => state.$t($($arg)*),
        #[cfg(feature = "region-in865")]
        State::IN865(state) => state.$t($($arg)*),
        #[cfg(feature = "region-us915")]
        State::US915(state) => state.$t($($arg)*),
    }
  };
}

macro_rules! region_dispatch {
  ($s:expr, $t:tt) => {
      match &$s.state {
        #[cfg(feature = "region-cn470")]
        State::CN470(state) => state.$t(),
        #[cfg(feature = "region-eu868")]
        State::EU868(state) => state.$t(),
        #[cfg(feature = "region-in865")]
        State::IN865(state) => state.$t(),
        #[cfg(feature = "region-us915")]
        State::US915(state) => state.$t(),
    }
  };
  ($s:expr, $t:tt, $($arg:tt)*) => {
      match &$s.state {
        #[cfg(feature = "region-cn470")]
        State::CN470(state) => state.$t($($arg)*),
        #[cfg(feature = "region-eu868")]
        State::EU868(state) => state.$t($($arg)*),
        #[cfg(feature = "region-in865")]
        State::IN865(state) => state.$t($($arg)*),
        #[cfg(feature = "region-us915")]
        State::US915(state) => state.$t($($arg)*),
    }
  };
}

#[derive(Clone)]
/// Channel plan of a region: channel table, enabled channels, duty-cycle state and the rules
/// of the region.
///
/// Settings are owned by the caller and passed to every operation. Create the plan with
/// [`ChannelPlan::new`], which also initializes the region defaults in the settings.
pub struct ChannelPlan {
    state: State,
}

impl ChannelPlan {
    pub fn new(region: Region, settings: &mut Settings) -> Self {
        let mut plan = Self { state: State::new(region) };
        plan.init(settings);
        plan
    }

    /// Resets the channel plan and the region dependent session settings to their defaults.
    pub fn init(&mut self, settings: &mut Settings) {
        mut_region_dispatch!(self, init, settings)
    }

    pub fn region(&self) -> Region {
        self.state.region()
    }

    /// Selects the channel of the next uplink and tunes the radio to it.
    pub fn get_next_channel<RADIO: Radio, C: Clock, RNG: RngCore>(
        &mut self,
        settings: &mut Settings,
        radio: &mut RADIO,
        clock: &C,
        rng: &mut RNG,
    ) -> Result {
        mut_region_dispatch!(self, next_channel, settings, radio, clock, rng)
    }

    /// Resolves the transmit parameters for the selected channel and hands them to the radio.
    pub fn set_tx_config<RADIO: Radio>(&self, settings: &Settings, radio: &mut RADIO) -> Result<TxConfig> {
        region_dispatch!(self, set_tx_config, settings, radio)
    }

    /// Defines channel `index`. Only dynamic channel plans (EU868, IN865) support this.
    pub fn add_channel(&mut self, index: u8, channel: Channel) -> Result {
        mut_region_dispatch!(self, add_channel, index, channel)
    }

    pub fn channel(&self, index: u8) -> Option<Channel> {
        region_dispatch!(self, channel, index)
    }

    pub fn num_channels(&self) -> usize {
        region_dispatch!(self, num_channels)
    }

    pub fn channel_mask(&self) -> &ChannelMask {
        &region_dispatch!(self, state).channel_mask
    }

    /// Channel used by the last [`get_next_channel`](Self::get_next_channel).
    pub fn tx_channel(&self) -> u8 {
        region_dispatch!(self, state).tx_channel
    }

    /// Restricts a fixed channel plan to a sub-band (1-based); 0 enables all channels.
    pub fn set_frequency_sub_band(&mut self, sub_band: u8) {
        mut_region_dispatch!(self, set_frequency_sub_band, sub_band)
    }

    pub fn enable_default_channels(&mut self, settings: &Settings) {
        mut_region_dispatch!(self, enable_default_channels, settings)
    }

    pub fn rx_window(&self, settings: &Settings, window: Window) -> RxWindow {
        region_dispatch!(self, rx_window, settings, window)
    }

    /// `RXParamSetupReq`. `payload` starts after the CID.
    pub fn handle_rx_param_setup(&mut self, settings: &mut Settings, payload: &[u8]) -> Result<Status> {
        mut_region_dispatch!(self, handle_rx_param_setup, settings, payload)
    }

    /// `NewChannelReq`. `payload` starts after the CID.
    pub fn handle_new_channel(&mut self, payload: &[u8]) -> Result<Status> {
        mut_region_dispatch!(self, handle_new_channel, payload)
    }

    /// `DlChannelReq`. `payload` starts after the CID.
    pub fn handle_dl_channel(&mut self, payload: &[u8]) -> Result<Status> {
        mut_region_dispatch!(self, handle_dl_channel, payload)
    }

    /// `PingSlotChannelReq`. `payload` starts after the CID.
    pub fn handle_ping_slot_channel(
        &mut self,
        settings: &mut Settings,
        payload: &[u8],
    ) -> Result<Status> {
        mut_region_dispatch!(self, handle_ping_slot_channel, settings, payload)
    }

    /// `BeaconFreqReq`. `payload` starts after the CID.
    pub fn handle_beacon_frequency(&mut self, settings: &mut Settings, payload: &[u8]) -> Result<Status> {
        mut_region_dispatch!(self, handle_beacon_frequency, settings, payload)
    }

    /// `LinkADRReq`. `payload` starts after the CID.
    ///
    /// The channel mask is applied only when every field is acknowledged. An unsupported mask
    /// control value yields [`Error::Malformed`] and leaves the plan untouched.
    pub fn handle_link_adr(&mut self, settings: &mut Settings, payload: &[u8]) -> Result<Status> {
        mut_region_dispatch!(self, handle_link_adr, settings, payload)
    }

    /// Processes the CFList of a join accept. `frame` spans MHDR to MIC.
    pub fn handle_join_accept(&mut self, settings: &mut Settings, frame: &[u8]) {
        mut_region_dispatch!(self, handle_join_accept, settings, frame)
    }

    pub fn validate_adr_configuration(&self, settings: &Settings) -> Status {
        region_dispatch!(self, validate_adr_configuration, settings)
    }

    /// Milliseconds to wait before the next uplink may be sent.
    pub fn time_off_air<C: Clock>(&self, settings: &Settings, clock: &C) -> u64 {
        region_dispatch!(self, time_off_air, settings, clock)
    }

    /// Records an uplink of `time_on_air_ms` on `frequency` in the duty-cycle state.
    pub fn update_duty_cycle<C: Clock>(
        &mut self,
        settings: &mut Settings,
        clock: &C,
        frequency: u32,
        time_on_air_ms: u32,
    ) {
        mut_region_dispatch!(self, update_duty_cycle, settings, clock, frequency, time_on_air_ms)
    }

    /// Data rate of the next join request. US915 may also select a sub-band.
    pub fn join_datarate(&mut self, settings: &Settings) -> u8 {
        mut_region_dispatch!(self, join_datarate, settings)
    }

    pub fn decode_beacon(&self, payload: &[u8]) -> Result<BeaconData> {
        region_dispatch!(self, decode_beacon, payload)
    }

    /// Updates the beacon, ping slot and multicast frequencies of hopping regions for the
    /// beacon period starting at `time`.
    pub fn frequency_hop(&self, settings: &mut Settings, time: u32, period: u32, dev_addr: u32) {
        region_dispatch!(self, frequency_hop, settings, time, period, dev_addr)
    }

    /// Uplink frequencies of the active channels, followed by the RX2 frequency.
    pub fn channels(&self, settings: &Settings) -> Vec<u32, { MAX_CHANNELS + 1 }> {
        region_dispatch!(self, channels, settings)
    }

    /// Data rate ranges matching [`channels`](Self::channels).
    pub fn channel_ranges(&self, settings: &Settings) -> Vec<DataRateRange, { MAX_CHANNELS + 1 }> {
        region_dispatch!(self, channel_ranges, settings)
    }

    pub fn duty_band(&self, index: usize) -> Option<DutyBand> {
        region_dispatch!(self, state).duty_bands.get(index).copied()
    }

    pub fn set_duty_band_duty_cycle(&mut self, band: usize, duty_cycle: u16) -> Result {
        mut_region_dispatch!(self, set_duty_band_duty_cycle, band, duty_cycle)
    }

    pub fn datarate(&self, index: u8) -> Option<&'static Datarate> {
        region_dispatch!(self, datarate, index)
    }

    pub fn min_datarate(&self, settings: &Settings) -> u8 {
        region_dispatch!(self, min_datarate, settings)
    }

    pub fn max_datarate(&self, settings: &Settings) -> u8 {
        region_dispatch!(self, max_datarate, settings)
    }

    pub fn increment_datarate(&self, datarate: u8) -> u8 {
        region_dispatch!(self, increment_datarate, datarate)
    }

    pub fn decrement_datarate(&self, datarate: u8) -> u8 {
        region_dispatch!(self, decrement_datarate, datarate)
    }

    pub fn max_payload_size(&self, datarate: u8, repeater_compatible: bool) -> u8 {
        region_dispatch!(self, max_payload_size, datarate, repeater_compatible)
    }

    /// Acknowledgement timeout for confirmed uplinks, in ms; 0 when the region has none.
    pub fn ack_timeout(&self, settings: &Settings) -> u32 {
        region_dispatch!(self, ack_timeout, settings)
    }
}
