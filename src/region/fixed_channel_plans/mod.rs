use super::*;
use core::marker::PhantomData;

#[cfg(feature = "region-cn470")]
mod cn470;
#[cfg(feature = "region-us915")]
mod us915;

#[cfg(feature = "region-cn470")]
pub(crate) use cn470::CN470;
#[cfg(feature = "region-us915")]
pub(crate) use us915::US915;

/// Channels per sub-band.
const SUB_BAND_SIZE: u8 = 8;

const CF_LIST_OFFSET: usize = 13;
const CF_LIST_TYPE_OFFSET: usize = CF_LIST_OFFSET + 15;
const JOIN_ACCEPT_CF_LIST_LEN: usize = CF_LIST_OFFSET + 16 + 4;
/// CFList type carrying channel mask words.
const CF_LIST_CHANNEL_MASK: u8 = 0x01;

/// A region whose channels are derived from a base frequency and a fixed step.
pub(crate) trait FixedChannelRegion: ChannelRegion {
    const NUM_125K_CHANNELS: u8;
    const UPLINK_BASE_125K: u32;
    const UPLINK_STEP_125K: u32;
    const DATARATES_125K: (u8, u8);

    const NUM_500K_CHANNELS: u8 = 0;
    const UPLINK_BASE_500K: u32 = 0;
    const UPLINK_STEP_500K: u32 = 0;
    const DATARATES_500K: (u8, u8) = (0, 0);

    const NUM_SUB_BANDS: u8;

    /// The join accept CFList (type 1) carries the channel mask.
    const CF_LIST_MASK: bool = false;
    /// Join data rates on 125 kHz and 500 kHz channels when joining rotates over sub-bands
    /// derived from the DevNonce.
    const JOIN_SUB_BAND_DATARATES: Option<(u8, u8)> = None;

    fn rx1_frequency(tx_channel: u8, settings: &Settings) -> u32;

    fn rx2_frequency(_tx_channel: u8, settings: &Settings) -> u32 {
        settings.session.rx2_frequency
    }

    fn apply_channel_mask(control: u8, mask: u16, target: &mut ChannelMask) -> bool;
    fn validate_channel_mask(mask: &ChannelMask, datarate: u8, status: &mut Status);

    /// Power limit of the region band once `usable` channels are known.
    fn band_power_limit(_is_500khz: bool, _usable: usize) -> Option<i8> {
        None
    }

    /// Power limit of the region band while transmitting on a fixed frequency.
    const FIXED_FREQUENCY_MAX_POWER: Option<i8> = None;

    fn adjust_max_power(
        max_power: i8,
        _power: i8,
        _antenna_gain: i8,
        _is_500khz: bool,
        _enabled_125k: usize,
    ) -> i8 {
        max_power
    }
}

#[derive(Clone)]
pub(crate) struct FixedChannelPlan<F: FixedChannelRegion> {
    state: PlanState,
    _fixed_channel_region: PhantomData<F>,
}

impl<F: FixedChannelRegion> Default for FixedChannelPlan<F> {
    fn default() -> Self {
        Self {
            state: PlanState::new(Self::num_channels_total(), F::duty_bands()),
            _fixed_channel_region: Default::default(),
        }
    }
}

impl<F: FixedChannelRegion> FixedChannelPlan<F> {
    fn num_channels_total() -> usize {
        usize::from(F::NUM_125K_CHANNELS) + usize::from(F::NUM_500K_CHANNELS)
    }

    fn range_500k() -> Range<usize> {
        let start = usize::from(F::NUM_125K_CHANNELS);
        start..start + usize::from(F::NUM_500K_CHANNELS)
    }

    /// Channels of sub-band `index` (0-based): eight 125 kHz channels and the matching 500 kHz
    /// channel, if any.
    fn sub_band_channels(index: u8) -> impl Iterator<Item = u8> {
        let start = index * SUB_BAND_SIZE;
        let wide = (index < F::NUM_500K_CHANNELS).then_some(F::NUM_125K_CHANNELS + index);
        (start..start + SUB_BAND_SIZE).chain(wide)
    }

    /// 0-based sub-band of `channel`.
    fn sub_band_of(channel: u8) -> u8 {
        if channel < F::NUM_125K_CHANNELS {
            channel / SUB_BAND_SIZE
        } else {
            channel - F::NUM_125K_CHANNELS
        }
    }

    fn enabled_500k(&self) -> usize {
        self.state.channel_mask.count_enabled(Self::range_500k())
    }

    /// Alternates joins between 125 kHz and 500 kHz channels of a sub-band picked from the
    /// DevNonce, unless a sub-band is configured.
    fn rotate_join_sub_band(&mut self, settings: &Settings, datarates: (u8, u8)) -> u8 {
        let (datarate_125k, datarate_500k) = datarates;
        let dev_nonce = settings.network.dev_nonce;
        let alternate = dev_nonce % 2 == 0;
        let sub_bands = u16::from(F::NUM_SUB_BANDS);
        // one more draw than sub-bands: the extra one means "500 kHz"
        let (sub_band, wide_sub_band) = if dev_nonce % (sub_bands + 1) == 0 {
            (sub_bands + 1, (dev_nonce / (sub_bands + 1)) % sub_bands + 1)
        } else {
            (dev_nonce % (sub_bands + 1), 1)
        };
        let configured = settings.network.frequency_sub_band;
        if configured == 0 {
            let selected = if sub_band <= sub_bands { sub_band } else { wide_sub_band };
            self.set_frequency_sub_band(selected as u8);
        }

        if settings.network.disable_random_join_datarate {
            return settings.session.tx_datarate;
        }
        if configured == 0 {
            if sub_band <= sub_bands {
                datarate_125k
            } else {
                datarate_500k
            }
        } else if alternate && self.enabled_500k() != 0 {
            datarate_500k
        } else {
            datarate_125k
        }
    }
}

impl<F: FixedChannelRegion> RegionHandler for FixedChannelPlan<F> {
    type Region = F;

    fn state(&self) -> &PlanState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut PlanState {
        &mut self.state
    }

    fn reset_channels(&mut self) {}

    fn num_channels(&self) -> usize {
        Self::num_channels_total()
    }

    fn channel(&self, index: u8) -> Option<Channel> {
        if index < F::NUM_125K_CHANNELS {
            let (min, max) = F::DATARATES_125K;
            let frequency = F::UPLINK_BASE_125K + F::UPLINK_STEP_125K * u32::from(index);
            Some(Channel::new(frequency, min, max))
        } else if index - F::NUM_125K_CHANNELS < F::NUM_500K_CHANNELS {
            let (min, max) = F::DATARATES_500K;
            let offset = u32::from(index - F::NUM_125K_CHANNELS);
            Some(Channel::new(F::UPLINK_BASE_500K + F::UPLINK_STEP_500K * offset, min, max))
        } else {
            None
        }
    }

    fn add_channel(&mut self, _index: u8, _channel: Channel) -> Result {
        Err(Error::Unsupported)
    }

    /// Enables only the channels of `sub_band` (1-based), or every channel for any other value.
    fn set_frequency_sub_band(&mut self, sub_band: u8) {
        let mask = &mut self.state.channel_mask;
        if (1..=F::NUM_SUB_BANDS).contains(&sub_band) {
            mask.fill(0);
            for channel in Self::sub_band_channels(sub_band - 1) {
                mask.set_channel(channel as usize, true);
            }
            debug!("sub-band {} selected", sub_band);
        } else {
            for channel in 0..Self::num_channels_total() {
                mask.set_channel(channel, true);
            }
        }
    }

    fn enable_default_channels(&mut self, settings: &Settings) {
        self.set_frequency_sub_band(settings.network.frequency_sub_band);
    }

    fn rx1_frequency(&self, settings: &Settings) -> u32 {
        F::rx1_frequency(self.state.tx_channel, settings)
    }

    fn rx2_frequency(&self, settings: &Settings) -> u32 {
        F::rx2_frequency(self.state.tx_channel, settings)
    }

    fn apply_channel_mask(&self, control: u8, mask: u16, target: &mut ChannelMask) -> bool {
        F::apply_channel_mask(control, mask, target)
    }

    fn validate_channel_mask(&self, datarate: u8, status: &mut Status) {
        F::validate_channel_mask(&self.state.channel_mask, datarate, status)
    }

    fn handle_new_channel(&mut self, _payload: &[u8]) -> Result<Status> {
        Err(Error::Unsupported)
    }

    fn handle_dl_channel(&mut self, _payload: &[u8]) -> Result<Status> {
        Err(Error::Unsupported)
    }

    fn handle_join_accept(&mut self, settings: &mut Settings, frame: &[u8]) {
        if F::CF_LIST_MASK
            && frame.len() >= JOIN_ACCEPT_CF_LIST_LEN
            && frame[CF_LIST_TYPE_OFFSET] == CF_LIST_CHANNEL_MASK
        {
            let words = &frame[CF_LIST_OFFSET..CF_LIST_TYPE_OFFSET];
            for (index, word) in words.chunks_exact(2).enumerate() {
                self.state.channel_mask.set_word(index, u16::from_le_bytes([word[0], word[1]]));
            }
            self.before_channel_scan(settings);
            return;
        }

        // first uplink after the join goes out on the sub-band the join accept answered
        let sub_band = Self::sub_band_of(self.state.tx_channel);
        self.state.random.restrict_to(Self::sub_band_channels(sub_band));
        self.enable_default_channels(settings);
    }

    fn channel_range(&self, datarate: &Datarate) -> Range<usize> {
        if datarate.is_500khz() && F::NUM_500K_CHANNELS > 0 {
            Self::range_500k()
        } else {
            0..usize::from(F::NUM_125K_CHANNELS)
        }
    }

    fn before_channel_scan(&mut self, settings: &mut Settings) {
        let session = &mut settings.session;
        if F::NUM_500K_CHANNELS > 0
            && session.tx_datarate == F::MAX_DATARATE
            && self.enabled_500k() == 0
        {
            debug!("no 500 kHz channel enabled, lowering data rate");
            session.tx_datarate = session.tx_datarate.saturating_sub(1);
        }
    }

    fn after_channel_scan(&mut self, datarate: &Datarate, usable: usize) {
        if let Some(limit) = F::band_power_limit(datarate.is_500khz(), usable) {
            if let Some(band) = self.state.duty_bands.get_mut(0) {
                band.max_power = limit;
            }
        }
    }

    fn fixed_frequency_selected(&mut self) {
        if let Some(limit) = F::FIXED_FREQUENCY_MAX_POWER {
            if let Some(band) = self.state.duty_bands.get_mut(0) {
                band.max_power = limit;
            }
        }
    }

    fn adjust_max_power(&self, max_power: i8, power: i8, antenna_gain: i8, datarate: &Datarate) -> i8 {
        let enabled = self.state.channel_mask.count_enabled(0..usize::from(F::NUM_125K_CHANNELS));
        F::adjust_max_power(max_power, power, antenna_gain, datarate.is_500khz(), enabled)
    }

    fn listed_channels(&self, settings: &Settings) -> Vec<u8, MAX_CHANNELS> {
        let sub_band = settings.network.frequency_sub_band;
        if (1..=F::NUM_SUB_BANDS).contains(&sub_band) {
            Self::sub_band_channels(sub_band - 1).collect()
        } else {
            (0..Self::num_channels_total()).map(|c| c as u8).collect()
        }
    }

    fn join_datarate(&mut self, settings: &Settings) -> u8 {
        match F::JOIN_SUB_BAND_DATARATES {
            Some(datarates) => self.rotate_join_sub_band(settings, datarates),
            None if settings.network.disable_random_join_datarate => settings.session.tx_datarate,
            None => F::join_datarate(settings.network.dev_nonce),
        }
    }
}
