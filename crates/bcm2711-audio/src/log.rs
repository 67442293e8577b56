//! Logging front end.
//!
//! Hardware builds (`defmt` feature) log over RTT through `defmt`; host
//! builds and tests go through `tracing`, so a test can install a
//! subscriber and assert on what was logged. Arguments use `{}` and
//! `{:#x}` only, which both back ends accept.

macro_rules! error {
    ($($arg:tt)*) => {{
        #[cfg(feature = "defmt")]
        {
            defmt::error!($($arg)*);
        }
        #[cfg(not(feature = "defmt"))]
        {
            tracing::error!($($arg)*);
        }
    }};
}

macro_rules! warn {
    ($($arg:tt)*) => {{
        #[cfg(feature = "defmt")]
        {
            defmt::warn!($($arg)*);
        }
        #[cfg(not(feature = "defmt"))]
        {
            tracing::warn!($($arg)*);
        }
    }};
}

macro_rules! info {
    ($($arg:tt)*) => {{
        #[cfg(feature = "defmt")]
        {
            defmt::info!($($arg)*);
        }
        #[cfg(not(feature = "defmt"))]
        {
            tracing::info!($($arg)*);
        }
    }};
}

macro_rules! debug {
    ($($arg:tt)*) => {{
        #[cfg(feature = "defmt")]
        {
            defmt::debug!($($arg)*);
        }
        #[cfg(not(feature = "defmt"))]
        {
            tracing::debug!($($arg)*);
        }
    }};
}

macro_rules! trace {
    ($($arg:tt)*) => {{
        #[cfg(feature = "defmt")]
        {
            defmt::trace!($($arg)*);
        }
        #[cfg(not(feature = "defmt"))]
        {
            tracing::trace!($($arg)*);
        }
    }};
}
