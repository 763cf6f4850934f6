//! Log routing.
//!
//! Library code logs through `log_info!`, `log_warn!`, `log_error!` and
//! `log_debug!` from this module. With the `defmt` feature they expand to the
//! defmt macros (RTT on the board); with `std` alone they expand to `tracing`;
//! otherwise they only evaluate their arguments.
//!
//! Format strings must stay within the subset both backends accept: plain
//! `{}` placeholders over integers and `&str`.

macro_rules! log_route {
    ($level:ident, $fmt:literal $(, $arg:expr)* $(,)?) => {{
        #[cfg(feature = "defmt")]
        {
            ::defmt::$level!($fmt $(, $arg)*);
        }
        #[cfg(all(feature = "std", not(feature = "defmt")))]
        {
            ::tracing::$level!($fmt $(, $arg)*);
        }
        #[cfg(not(any(feature = "defmt", feature = "std")))]
        {
            $( let _ = &$arg; )*
        }
    }};
}

macro_rules! log_info {
    ($($t:tt)*) => { log_route!(info, $($t)*) };
}

macro_rules! log_warn {
    ($($t:tt)*) => { log_route!(warn, $($t)*) };
}

macro_rules! log_error {
    ($($t:tt)*) => { log_route!(error, $($t)*) };
}

macro_rules! log_debug {
    ($($t:tt)*) => { log_route!(debug, $($t)*) };
}
