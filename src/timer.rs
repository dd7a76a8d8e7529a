//! Time sources used by the channel plans.
//!
//! Two distinct domains are involved. Duty-cycle bookkeeping is relative: band off-air times are
//! stored as milliseconds since the last [`update_duty_cycle`](crate::ChannelPlan::update_duty_cycle),
//! measured on a monotonic clock. Join back-off is absolute: the outer MAC stores deadlines in
//! wall-clock seconds in the [`Settings`](crate::Settings).

pub trait Clock {
    /// Monotonic time in milliseconds. Never goes backwards; the origin is irrelevant.
    fn monotonic_ms(&self) -> u64;

    /// Wall-clock time in seconds, in the same domain as the join timestamps of the session.
    fn wall_secs(&self) -> u64;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn monotonic_ms(&self) -> u64 {
        (**self).monotonic_ms()
    }

    fn wall_secs(&self) -> u64 {
        (**self).wall_secs()
    }
}
