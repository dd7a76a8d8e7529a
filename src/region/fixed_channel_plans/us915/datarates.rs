use super::{Bandwidth, Datarate, SpreadingFactor, NUM_DATARATES};

pub(crate) const DATARATES: [Option<Datarate>; NUM_DATARATES] = [
    // DR0
    Some(Datarate::lora(SpreadingFactor::_10, Bandwidth::_125KHz, 11, 11)),
    // DR1
    Some(Datarate::lora(SpreadingFactor::_9, Bandwidth::_125KHz, 53, 53)),
    // DR2
    Some(Datarate::lora(SpreadingFactor::_8, Bandwidth::_125KHz, 125, 125)),
    // DR3
    Some(Datarate::lora(SpreadingFactor::_7, Bandwidth::_125KHz, 242, 222)),
    // DR4
    Some(Datarate::lora(SpreadingFactor::_8, Bandwidth::_500KHz, 242, 222)),
    // DR5..DR7: LR-FHSS, unsupported
    None,
    None,
    None,
    // DR8
    Some(Datarate::lora(SpreadingFactor::_12, Bandwidth::_500KHz, 53, 33)),
    // DR9
    Some(Datarate::lora(SpreadingFactor::_11, Bandwidth::_500KHz, 129, 109)),
    // DR10
    Some(Datarate::lora(SpreadingFactor::_10, Bandwidth::_500KHz, 242, 222)),
    // DR11
    Some(Datarate::lora(SpreadingFactor::_9, Bandwidth::_500KHz, 242, 222)),
    // DR12
    Some(Datarate::lora(SpreadingFactor::_8, Bandwidth::_500KHz, 242, 222)),
    // DR13
    Some(Datarate::lora(SpreadingFactor::_7, Bandwidth::_500KHz, 242, 222)),
    // DR14..DR15
    None,
    None,
];
