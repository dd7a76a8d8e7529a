#![allow(dead_code)]

use std::cell::Cell;

use lorawan_region::radio::{Modem, Radio, TxConfig};
use lorawan_region::timer::Clock;
use lorawan_region::{ChannelPlan, Region, Settings};

#[derive(Default)]
pub struct MockRadio {
    pub frequencies: Vec<u32>,
    pub tx_configs: Vec<TxConfig>,
    pub busy: bool,
    pub cad_queries: usize,
}

impl MockRadio {
    pub fn last_frequency(&self) -> u32 {
        *self.frequencies.last().expect("no channel selected")
    }
}

impl Radio for MockRadio {
    fn set_channel(&mut self, frequency: u32) {
        self.frequencies.push(frequency);
    }

    fn set_tx_config(&mut self, config: &TxConfig) {
        self.tx_configs.push(config.clone());
    }

    fn is_channel_free(&mut self, _modem: Modem, _frequency: u32, _rssi_threshold: i16) -> bool {
        self.cad_queries += 1;
        !self.busy
    }
}

#[derive(Default)]
pub struct MockClock {
    pub now: Cell<u64>,
    pub wall: Cell<u64>,
    pub step: u64,
}

impl MockClock {
    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
    }
}

impl Clock for MockClock {
    fn monotonic_ms(&self) -> u64 {
        let now = self.now.get();
        self.now.set(now + self.step);
        now
    }

    fn wall_secs(&self) -> u64 {
        self.wall.get()
    }
}

pub fn setup(region: Region) -> (ChannelPlan, Settings) {
    let mut settings = Settings::default();
    let plan = ChannelPlan::new(region, &mut settings);
    (plan, settings)
}
