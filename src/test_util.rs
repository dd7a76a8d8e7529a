use core::cell::Cell;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::radio::{Modem, Radio, TxConfig};
use crate::timer::Clock;

/// Radio recording what the channel plan asks of it.
#[derive(Default)]
pub(crate) struct TestRadio {
    pub(crate) channels: Vec<u32>,
    pub(crate) tx_configs: Vec<TxConfig>,
    /// Every channel activity detection reports activity.
    pub(crate) busy: bool,
    pub(crate) cad_queries: usize,
}

impl Radio for TestRadio {
    fn set_channel(&mut self, frequency: u32) {
        self.channels.push(frequency);
    }

    fn set_tx_config(&mut self, config: &TxConfig) {
        self.tx_configs.push(config.clone());
    }

    fn is_channel_free(&mut self, _modem: Modem, _frequency: u32, _rssi_threshold: i16) -> bool {
        self.cad_queries += 1;
        !self.busy
    }
}

/// Manually driven clock. With a step, every monotonic read advances time by `step` ms.
#[derive(Default)]
pub(crate) struct TestClock {
    now: Cell<u64>,
    wall: Cell<u64>,
    step: u64,
}

impl TestClock {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_step(step: u64) -> Self {
        Self { step, ..Default::default() }
    }

    pub(crate) fn advance_ms(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
    }

    pub(crate) fn set_ms(&self, ms: u64) {
        self.now.set(ms);
    }

    pub(crate) fn set_wall_secs(&self, secs: u64) {
        self.wall.set(secs);
    }
}

impl Clock for TestClock {
    fn monotonic_ms(&self) -> u64 {
        let now = self.now.get();
        self.now.set(now + self.step);
        now
    }

    fn wall_secs(&self) -> u64 {
        self.wall.get()
    }
}

pub(crate) fn rng() -> StdRng {
    StdRng::seed_from_u64(0x5eed)
}
