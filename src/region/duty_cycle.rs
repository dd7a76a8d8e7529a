//! Regulatory sub-bands and their off-air bookkeeping.
//!
//! Off-air deadlines are kept in milliseconds relative to the *epoch*: the monotonic time of the
//! last transmission accounted for with [`DutyBands::update`]. Every update rebases all bands on
//! the new epoch.
use heapless::Vec;

use super::constants::MAX_DUTY_BANDS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DutyBand {
    pub freq_min: u32,
    pub freq_max: u32,
    /// Maximum conducted power in dBm.
    pub max_power: i8,
    /// Off-air multiplier: after `t` ms on air the band is unusable for `t * duty_cycle` ms.
    /// 0 leaves the band unrestricted.
    pub duty_cycle: u16,
    /// Milliseconds after the epoch at which the band becomes usable again.
    pub time_off_end: u64,
}

impl DutyBand {
    pub(crate) const fn new(freq_min: u32, freq_max: u32, max_power: i8, duty_cycle: u16) -> Self {
        Self { freq_min, freq_max, max_power, duty_cycle, time_off_end: 0 }
    }

    pub fn contains(&self, frequency: u32) -> bool {
        (self.freq_min..=self.freq_max).contains(&frequency)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct DutyBands {
    bands: Vec<DutyBand, MAX_DUTY_BANDS>,
    epoch: u64,
}

impl DutyBands {
    pub(crate) fn new(bands: &[DutyBand]) -> Self {
        let mut this = Self { bands: Vec::new(), epoch: 0 };
        this.reset(bands);
        this
    }

    pub(crate) fn reset(&mut self, bands: &[DutyBand]) {
        self.bands.clear();
        for band in bands.iter().take(MAX_DUTY_BANDS) {
            // Capacity is checked by `take`.
            let _ = self.bands.push(*band);
        }
    }

    pub(crate) fn get(&self, index: usize) -> Option<&DutyBand> {
        self.bands.get(index)
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut DutyBand> {
        self.bands.get_mut(index)
    }

    /// Index of the first band containing `frequency`. Bands sharing an edge frequency resolve
    /// to the one listed first.
    pub(crate) fn band_index(&self, frequency: u32) -> Option<usize> {
        self.bands.iter().position(|b| b.contains(frequency))
    }

    pub(crate) fn band(&self, frequency: u32) -> Option<&DutyBand> {
        self.band_index(frequency).and_then(|i| self.bands.get(i))
    }

    /// Milliseconds elapsed since the epoch.
    pub(crate) fn elapsed(&self, now: u64) -> u64 {
        now.saturating_sub(self.epoch)
    }

    /// Clears the off-air time of bands whose deadline has passed (or of all bands when duty
    /// cycling is disabled).
    pub(crate) fn refresh(&mut self, now: u64, disabled: bool) {
        let elapsed = self.elapsed(now);
        for band in self.bands.iter_mut() {
            if disabled || band.time_off_end <= elapsed {
                band.time_off_end = 0;
            }
        }
    }

    /// Remaining off-air time of band `index`, in ms.
    pub(crate) fn remaining(&self, index: usize, now: u64) -> u64 {
        let elapsed = self.elapsed(now);
        self.bands.get(index).map(|b| b.time_off_end.saturating_sub(elapsed)).unwrap_or(0)
    }

    pub(crate) fn is_usable(&self, index: usize, now: u64) -> bool {
        self.remaining(index, now) == 0
    }

    /// Accounts for a transmission of `time_on_air` ms on `frequency` and moves the epoch to
    /// `now`. `exempt` tells whether the band is relieved from its off-air time for this
    /// transmission.
    pub(crate) fn update(
        &mut self,
        now: u64,
        frequency: u32,
        time_on_air: u32,
        exempt: impl Fn(&DutyBand) -> bool,
    ) {
        let elapsed = self.elapsed(now);
        for band in self.bands.iter_mut() {
            band.time_off_end = band.time_off_end.saturating_sub(elapsed);
        }
        if let Some(index) = self.band_index(frequency) {
            let band = &mut self.bands[index];
            band.time_off_end = if exempt(band) {
                0
            } else {
                u64::from(time_on_air) * u64::from(band.duty_cycle)
            };
            trace!("band {} off air for {} ms", index, band.time_off_end);
        }
        self.epoch = now;
    }
}
