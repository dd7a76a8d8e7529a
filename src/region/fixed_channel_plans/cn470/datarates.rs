use super::{Bandwidth, Datarate, SpreadingFactor, NUM_DATARATES};

// CN470 regulations limit the time on air to 1 s, which leaves no room for DR0 payloads.
pub(crate) const DATARATES: [Option<Datarate>; NUM_DATARATES] = [
    // DR0
    Some(Datarate::lora(SpreadingFactor::_12, Bandwidth::_125KHz, 0, 0)),
    // DR1
    Some(Datarate::lora(SpreadingFactor::_11, Bandwidth::_125KHz, 23, 23)),
    // DR2
    Some(Datarate::lora(SpreadingFactor::_10, Bandwidth::_125KHz, 51, 51)),
    // DR3
    Some(Datarate::lora(SpreadingFactor::_9, Bandwidth::_125KHz, 115, 115)),
    // DR4
    Some(Datarate::lora(SpreadingFactor::_8, Bandwidth::_125KHz, 242, 222)),
    // DR5
    Some(Datarate::lora(SpreadingFactor::_7, Bandwidth::_125KHz, 242, 222)),
    // DR6..DR15
    None,
    None,
    None,
    None,
    None,
    None,
    None,
    None,
    None,
    None,
];
