#![cfg_attr(not(test), no_std)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! LoRaWAN regional channel plans.
//!
//! This crate implements the region-specific part of a LoRaWAN end-device MAC: which channels
//! and data rates may be used, duty-cycle and transmit power limits, handling of the channel
//! related MAC commands (`LinkADRReq`, `NewChannelReq`, `RxParamSetupReq`, ...), receive window
//! parameters as well as class B beacon decoding and frequency hopping.
//!
//! Framing, encryption and the MAC state machine are left to the caller, which hands over the
//! relevant MAC command payloads and a [`Settings`] record.
//!
//! ## Feature flags
#![doc = document_features::document_features!(feature_label = r#"<span class="stab portability"><code>{feature}</code></span>"#)]

pub(crate) mod fmt;

pub mod maccommands;
pub mod radio;
pub mod region;
pub mod settings;
pub mod timer;
pub mod types;

mod rng;
pub use rng::Prng;

pub use rand_core::RngCore;
pub use region::{ChannelPlan, Error, Region};
pub use settings::Settings;

#[cfg(test)]
mod test_util;
