use super::*;
use core::marker::PhantomData;

use crate::maccommands::{DlChannelReqPayload, NewChannelReqPayload};
use crate::types::Frequency;

#[cfg(feature = "region-eu868")]
pub(crate) mod eu868;
#[cfg(feature = "region-in865")]
mod in865;

#[cfg(feature = "region-eu868")]
pub(crate) use eu868::EU868;
#[cfg(feature = "region-in865")]
pub(crate) use in865::IN865;

/// Offset of the CFList in a join accept frame (MHDR, JoinNonce, NetID, DevAddr, DLSettings,
/// RxDelay).
const CF_LIST_OFFSET: usize = 13;
const CF_LIST_TYPE_OFFSET: usize = CF_LIST_OFFSET + 15;
/// Join accept frame carrying a CFList, MIC included.
const JOIN_ACCEPT_CF_LIST_LEN: usize = CF_LIST_OFFSET + 16 + 4;

type Channels = [Option<Channel>; NUM_CHANNELS_DYNAMIC];

#[derive(Clone)]
pub(crate) struct DynamicChannelPlan<R: DynamicChannelRegion> {
    channels: Channels,
    state: PlanState,
    _dynamic_channel_region: PhantomData<R>,
}

impl<R: DynamicChannelRegion> Default for DynamicChannelPlan<R> {
    fn default() -> Self {
        let mut channels = [None; NUM_CHANNELS_DYNAMIC];
        R::init_channels(&mut channels);
        Self {
            channels,
            state: PlanState::new(NUM_CHANNELS_DYNAMIC, R::duty_bands()),
            _dynamic_channel_region: Default::default(),
        }
    }
}

pub(crate) trait DynamicChannelRegion: ChannelRegion {
    /// Uplink frequencies of the default channels, usable for joining.
    const DEFAULT_CHANNELS: [u32; NUM_DEFAULT_CHANNELS_DYNAMIC];
    /// Data rates of the default channels and of the CFList channels.
    const DEFAULT_DATARATES: (u8, u8) = (0, 5);

    fn init_channels(channels: &mut Channels) {
        let (min, max) = Self::DEFAULT_DATARATES;
        *channels = [None; NUM_CHANNELS_DYNAMIC];
        for (channel, frequency) in channels.iter_mut().zip(Self::DEFAULT_CHANNELS) {
            *channel = Some(Channel::new(frequency, min, max));
        }
    }
}

impl<R: DynamicChannelRegion> DynamicChannelPlan<R> {
    fn set_channel(&mut self, index: usize, channel: Option<Channel>) {
        let enabled = match channel {
            Some(ch) => self.state.duty_bands.band_index(ch.frequency()).is_some(),
            None => false,
        };
        self.channels[index] = channel;
        self.state.channel_mask.set_channel(index, enabled);
    }

    fn datarate_range_valid(range: DataRateRange) -> bool {
        let bounds = R::MIN_DATARATE..=R::MAX_DATARATE;
        range.min_data_rate() <= range.max_data_rate()
            && bounds.contains(&range.min_data_rate())
            && bounds.contains(&range.max_data_rate())
    }
}

impl<R: DynamicChannelRegion> RegionHandler for DynamicChannelPlan<R> {
    type Region = R;

    fn state(&self) -> &PlanState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut PlanState {
        &mut self.state
    }

    fn reset_channels(&mut self) {
        R::init_channels(&mut self.channels);
    }

    fn num_channels(&self) -> usize {
        NUM_CHANNELS_DYNAMIC
    }

    fn channel(&self, index: u8) -> Option<Channel> {
        self.channels.get(index as usize).copied().flatten()
    }

    fn add_channel(&mut self, index: u8, channel: Channel) -> Result {
        let index = index as usize;
        if index >= NUM_CHANNELS_DYNAMIC {
            return Err(Error::InvalidIndex);
        }
        self.set_channel(index, Some(channel));
        Ok(())
    }

    fn set_frequency_sub_band(&mut self, _sub_band: u8) {}

    fn enable_default_channels(&mut self, _settings: &Settings) {
        for index in 0..NUM_DEFAULT_CHANNELS_DYNAMIC {
            let defined = self.channels[index].is_some();
            self.state.channel_mask.set_channel(index, defined);
        }
    }

    fn rx1_frequency(&self, _settings: &Settings) -> u32 {
        self.channel(self.state.tx_channel).map(|c| c.rx1_frequency()).unwrap_or_default()
    }

    fn apply_channel_mask(&self, control: u8, mask: u16, target: &mut ChannelMask) -> bool {
        match control {
            0 => target.set_word(0, mask),
            // every defined channel, whatever the mask
            6 => {
                for (index, channel) in self.channels.iter().enumerate() {
                    target.set_channel(index, channel.is_some());
                }
            }
            _ => return false,
        }
        true
    }

    fn validate_channel_mask(&self, _datarate: u8, status: &mut Status) {
        let mask = &self.state.channel_mask;
        let mut defined = false;
        for (index, channel) in self.channels.iter().enumerate() {
            if !mask.is_enabled(index) {
                continue;
            }
            if channel.is_none() {
                status.reject(Status::CHANNEL_ACK);
                return;
            }
            defined = true;
        }
        if !defined {
            status.reject(Status::CHANNEL_ACK);
        }
    }

    fn handle_new_channel(&mut self, payload: &[u8]) -> Result<Status> {
        let req = NewChannelReqPayload::new(payload)?;
        let index = req.channel_index() as usize;
        let frequency = req.frequency().value();
        let datarates = req.data_rate_range();

        let mut status = Status::new(0x03);
        if !(NUM_DEFAULT_CHANNELS_DYNAMIC..NUM_CHANNELS_DYNAMIC).contains(&index) {
            status.reject(Status::CHANNEL_ACK);
        }
        if frequency != 0 {
            if !R::frequency_valid(frequency) {
                status.reject(Status::CHANNEL_ACK);
            }
            if !Self::datarate_range_valid(datarates) {
                status.reject(Status::DATA_RATE_ACK);
            }
        }

        if status.accepted() {
            if frequency == 0 {
                debug!("removing channel {}", index);
                self.set_channel(index, None);
            } else {
                debug!("channel {}: {} Hz", index, frequency);
                self.set_channel(index, Some(Channel::with_range(frequency, datarates)));
            }
        }
        Ok(status)
    }

    fn handle_dl_channel(&mut self, payload: &[u8]) -> Result<Status> {
        let req = DlChannelReqPayload::new(payload)?;
        let index = req.channel_index() as usize;
        let frequency = req.frequency().value();

        let mut status = Status::new(0x03);
        if !R::frequency_valid(frequency) {
            status.reject(Status::CHANNEL_ACK);
        }
        if !matches!(self.channels.get(index), Some(Some(_))) {
            status.reject(Status::DATA_RATE_ACK);
        }

        if status.accepted() {
            if let Some(Some(channel)) = self.channels.get_mut(index) {
                channel.set_dl_frequency(frequency);
            }
        }
        Ok(status)
    }

    fn handle_join_accept(&mut self, _settings: &mut Settings, frame: &[u8]) {
        if frame.len() < JOIN_ACCEPT_CF_LIST_LEN || frame[CF_LIST_TYPE_OFFSET] != 0x00 {
            return;
        }
        // CfList of Type 0 may contain up to 5 frequencies, which define channels
        // J to (J+4).
        let (min, max) = R::DEFAULT_DATARATES;
        let cf_list = &frame[CF_LIST_OFFSET..CF_LIST_TYPE_OFFSET];
        for (n, bytes) in cf_list.chunks_exact(3).enumerate() {
            let index = NUM_DEFAULT_CHANNELS_DYNAMIC + n;
            let frequency = match <&[u8; 3]>::try_from(bytes) {
                Ok(bytes) => Frequency::new(bytes).value(),
                Err(_) => 0,
            };
            // unused channels are set to 0
            if frequency == 0 || !R::frequency_valid(frequency) {
                self.set_channel(index, None);
            } else {
                self.set_channel(index, Some(Channel::new(frequency, min, max)));
            }
        }
    }

    fn set_duty_band_duty_cycle(&mut self, band: usize, duty_cycle: u16) -> Result {
        let band = self.state.duty_bands.get_mut(band).ok_or(Error::InvalidIndex)?;
        band.duty_cycle = duty_cycle;
        Ok(())
    }
}

/// Acknowledgement timeout of the dynamic regions, by RX2 data rate.
fn ack_timeout(rx2_datarate: u8) -> u32 {
    match rx2_datarate {
        0 => 2000,
        1 => 1000,
        2 => 500,
        _ => 0,
    }
}
