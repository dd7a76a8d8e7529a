use rand_core::RngCore;

/// Fair random channel selection.
///
/// Every channel is drawn at most once per round: a drawn channel is marked as used and is not
/// eligible again until every currently enabled channel has been used, at which point a new round
/// starts. This spreads uplinks evenly over the enabled channels while staying unpredictable.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub(crate) struct RandomChannel {
    /// Bit `n` set: channel `n` has not been drawn in the current round.
    available: u128,
}

impl Default for RandomChannel {
    fn default() -> Self {
        Self { available: u128::MAX }
    }
}

impl RandomChannel {
    fn bit(channel: u8) -> u128 {
        1u128 << (channel & 0x7f)
    }

    fn is_available(&self, channel: u8) -> bool {
        self.available & Self::bit(channel) != 0
    }

    /// Draws one of `enabled`, never repeating a channel within a round. Returns `None` only
    /// when `enabled` is empty.
    pub(crate) fn next_channel<RNG: RngCore>(
        &mut self,
        enabled: &[u8],
        rng: &mut RNG,
    ) -> Option<u8> {
        let mut candidates = enabled.iter().filter(|c| self.is_available(**c)).count();
        if candidates == 0 {
            // round exhausted (or restricted to channels that are no longer enabled)
            for channel in enabled {
                self.available |= Self::bit(*channel);
            }
            candidates = enabled.len();
        }
        if candidates == 0 {
            return None;
        }
        let pick = rng.next_u32() as usize % candidates;
        let channel =
            enabled.iter().copied().filter(|c| self.is_available(*c)).nth(pick)?;
        self.available &= !Self::bit(channel);
        Some(channel)
    }

    /// Restricts the current round to `channels`. Used after a join to make the first uplink go
    /// out on the sub-band that carried the successful join request.
    pub(crate) fn restrict_to(&mut self, channels: impl IntoIterator<Item = u8>) {
        self.available = 0;
        for channel in channels {
            self.available |= Self::bit(channel);
        }
    }
}

/// Uniform pick, with repetition, among `enabled`.
pub(crate) fn uniform<RNG: RngCore>(enabled: &[u8], rng: &mut RNG) -> Option<u8> {
    if enabled.is_empty() {
        return None;
    }
    enabled.get(rng.next_u32() as usize % enabled.len()).copied()
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn no_repeat_within_a_round() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut selector = RandomChannel::default();
        let enabled = [0u8, 1, 2, 5, 9];
        for _ in 0..20 {
            let mut seen = [false; 10];
            for _ in 0..enabled.len() {
                let ch = selector.next_channel(&enabled, &mut rng).unwrap();
                assert!(enabled.contains(&ch));
                assert!(!seen[ch as usize], "channel {ch} drawn twice in a round");
                seen[ch as usize] = true;
            }
        }
    }

    #[test]
    fn empty_set_yields_nothing() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut selector = RandomChannel::default();
        assert_eq!(selector.next_channel(&[], &mut rng), None);
        assert_eq!(uniform(&[], &mut rng), None);
    }

    #[test]
    fn restricted_round_draws_from_subset_first() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut selector = RandomChannel::default();
        selector.restrict_to(16..24);
        let enabled: heapless::Vec<u8, 72> = (0..72).collect();
        for _ in 0..8 {
            let ch = selector.next_channel(&enabled, &mut rng).unwrap();
            assert!((16..24).contains(&ch));
        }
        // subset used up, a new round spans every enabled channel
        let mut outside = false;
        for _ in 0..72 {
            let ch = selector.next_channel(&enabled, &mut rng).unwrap();
            outside |= !(16..24).contains(&ch);
        }
        assert!(outside);
    }

    #[test]
    fn channels_dropped_from_enabled_set_are_skipped() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut selector = RandomChannel::default();
        selector.restrict_to([40, 41]);
        let ch = selector.next_channel(&[0, 1, 2], &mut rng).unwrap();
        assert!(ch < 3);
    }
}
