//! Network configuration and session state shared between the outer MAC and the channel plan.
//!
//! The record is owned by the caller and handed to every [`ChannelPlan`](crate::ChannelPlan)
//! operation. The channel plan reads configuration from it and updates the session fields it is
//! responsible for (data rate, power, RX parameters, class B frequencies, duty-cycle state).

/// Number of multicast sessions addressable from class B ping slots and RXC windows.
pub const MAX_MULTICAST_SESSIONS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NetworkMode {
    #[default]
    Public,
    Private,
    /// Private network using the MultiTech downlink channel mapping for US915.
    PrivateMts,
    /// No network server: a fixed frequency and data rate are used for every transmission.
    PeerToPeer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NetworkConfig {
    pub mode: NetworkMode,
    /// Antenna gain in dBi, subtracted from the conducted power limit.
    pub antenna_gain: i8,
    /// Requested conducted TX power in dBm, copied to the session on init.
    pub tx_power: u8,
    pub adr_enabled: bool,
    /// Listen before talk using channel activity detection.
    pub cad_enabled: bool,
    /// Selected sub-band (1-based) for fixed channel plans, 0 for all channels.
    pub frequency_sub_band: u8,
    /// DevNonce of the next join request, used to spread join data rates.
    pub dev_nonce: u16,
    /// Fixed uplink frequency; bypasses channel selection when non-zero.
    pub tx_frequency: u32,
    pub disable_duty_cycle: bool,
    pub disable_random_join_datarate: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            mode: NetworkMode::Public,
            antenna_gain: 0,
            tx_power: 14,
            adr_enabled: false,
            cad_enabled: false,
            frequency_sub_band: 0,
            dev_nonce: 0,
            tx_frequency: 0,
            disable_duty_cycle: false,
            disable_random_join_datarate: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SessionState {
    pub joined: bool,
    pub tx_datarate: u8,
    /// TX power in dBm.
    pub tx_power: u8,
    /// NbTrans of `LinkADRReq`, at least 1.
    pub redundancy: u8,
    pub rx1_datarate_offset: u8,
    pub rx2_frequency: u32,
    pub rx2_datarate: u8,

    /// Exponent of the aggregated duty cycle (`DutyCycleReq`); 1..=15 enables it.
    pub max_duty_cycle: u8,
    /// Off-air multiplier derived from `max_duty_cycle`.
    pub aggregate_duty_cycle: u32,
    /// End of the aggregated off-air time, in ms relative to the last duty-cycle update. 0 when
    /// inactive.
    pub aggregated_time_off_end: u64,

    pub beacon_frequency: u32,
    pub beacon_freq_hop: bool,
    pub ping_slot_frequency: u32,
    pub ping_slot_datarate: u8,
    pub ping_slot_freq_hop: bool,

    /// Wall-clock seconds of the first join attempt, 0 when no join is outstanding.
    pub join_first_attempt: u64,
    /// Wall-clock seconds before which the next join request must not be sent.
    pub join_time_off_end: u64,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            joined: false,
            tx_datarate: 0,
            tx_power: 14,
            redundancy: 1,
            rx1_datarate_offset: 0,
            rx2_frequency: 0,
            rx2_datarate: 0,
            max_duty_cycle: 0,
            aggregate_duty_cycle: 0,
            aggregated_time_off_end: 0,
            beacon_frequency: 0,
            beacon_freq_hop: false,
            ping_slot_frequency: 0,
            ping_slot_datarate: 0,
            ping_slot_freq_hop: false,
            join_first_attempt: 0,
            join_time_off_end: 0,
        }
    }
}

impl SessionState {
    /// Apply a `DutyCycleReq`: the aggregated duty cycle becomes 1 / 2^`max_duty_cycle`.
    pub fn set_max_duty_cycle(&mut self, max_duty_cycle: u8) {
        self.max_duty_cycle = max_duty_cycle & 0x0f;
        self.aggregate_duty_cycle = 1 << self.max_duty_cycle;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MulticastSession {
    pub address: u32,
    pub frequency: u32,
    pub datarate: u8,
    pub active: bool,
    /// Follow the class B hopping sequence for this session.
    pub freq_hop: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Settings {
    pub network: NetworkConfig,
    pub session: SessionState,
    pub multicast: [MulticastSession; MAX_MULTICAST_SESSIONS],
}

impl Settings {
    pub fn p2p_enabled(&self) -> bool {
        self.network.mode == NetworkMode::PeerToPeer
    }

    /// A fixed uplink frequency is in use, either for peer to peer or set explicitly.
    pub(crate) fn fixed_frequency(&self) -> Option<u32> {
        if self.p2p_enabled() || self.network.tx_frequency != 0 {
            Some(self.network.tx_frequency)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn max_duty_cycle_sets_multiplier() {
        let mut session = SessionState::default();
        session.set_max_duty_cycle(7);
        assert_eq!(session.aggregate_duty_cycle, 128);
        session.set_max_duty_cycle(0);
        assert_eq!(session.aggregate_duty_cycle, 1);
    }

    #[test]
    fn fixed_frequency_in_p2p() {
        let mut settings = Settings::default();
        assert_eq!(settings.fixed_frequency(), None);
        settings.network.mode = NetworkMode::PeerToPeer;
        settings.network.tx_frequency = 869_850_000;
        assert_eq!(settings.fixed_frequency(), Some(869_850_000));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn settings_roundtrip_through_json() {
        let mut settings = Settings::default();
        settings.session.rx2_frequency = 869_525_000;
        settings.multicast[2].active = true;
        let json = serde_json::to_string(&settings).unwrap();
        let back: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(back, settings);
    }
}
