use super::constants::MAX_MASK_WORDS;

/// Enabled channels of a region, stored as the 16-bit words used by `LinkADRReq`.
///
/// Word `n` covers channels `16 * n ..= 16 * n + 15`, bit 0 being the lowest channel.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChannelMask {
    words: [u16; MAX_MASK_WORDS],
    len: u8,
}

impl ChannelMask {
    /// An all-disabled mask wide enough for `num_channels` channels.
    pub fn new(num_channels: usize) -> Self {
        let len = num_channels.div_ceil(16).min(MAX_MASK_WORDS);
        Self { words: [0; MAX_MASK_WORDS], len: len as u8 }
    }

    /// Number of 16-bit words.
    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.words().iter().all(|w| *w == 0)
    }

    pub fn words(&self) -> &[u16] {
        &self.words[..self.len()]
    }

    /// Word `index`, or 0 past the end of the mask.
    pub fn word(&self, index: usize) -> u16 {
        self.words().get(index).copied().unwrap_or(0)
    }

    /// Writes a word; out of range indexes are ignored.
    pub fn set_word(&mut self, index: usize, value: u16) {
        if let Some(word) = self.words[..self.len as usize].get_mut(index) {
            *word = value;
        }
    }

    /// Sets every word of the mask to `value`.
    pub fn fill(&mut self, value: u16) {
        let len = self.len();
        self.words[..len].iter_mut().for_each(|w| *w = value);
    }

    pub fn is_enabled(&self, channel: usize) -> bool {
        self.word(channel / 16) & (1 << (channel % 16)) != 0
    }

    pub fn set_channel(&mut self, channel: usize, enabled: bool) {
        let word = self.word(channel / 16);
        let bit = 1 << (channel % 16);
        self.set_word(channel / 16, if enabled { word | bit } else { word & !bit });
    }

    /// Number of enabled channels among `channels`.
    pub fn count_enabled(&self, channels: core::ops::Range<usize>) -> usize {
        channels.filter(|c| self.is_enabled(*c)).count()
    }
}
