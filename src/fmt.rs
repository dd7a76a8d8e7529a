//! Logging shims: `defmt` with the `defmt-03` feature, nothing otherwise.
#![macro_use]
#![allow(unused_macros)]

macro_rules! log_at {
    ($level:ident, $s:literal $(, $x:expr)* $(,)?) => {{
        #[cfg(feature = "defmt-03")]
        ::defmt::$level!($s $(, $x)*);
        // keep the arguments "used" when logging is compiled out
        #[cfg(not(feature = "defmt-03"))]
        let _ = ($(&$x),*);
    }};
}

#[collapse_debuginfo(yes)]
macro_rules! trace {
    ($($arg:tt)*) => {
        log_at!(trace, $($arg)*)
    };
}

#[collapse_debuginfo(yes)]
macro_rules! debug {
    ($($arg:tt)*) => {
        log_at!(debug, $($arg)*)
    };
}

#[collapse_debuginfo(yes)]
macro_rules! warn {
    ($($arg:tt)*) => {
        log_at!(warn, $($arg)*)
    };
}
