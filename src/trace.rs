//! Crate-internal logging macros.
//!
//! With the `tracing` feature these forward to the `tracing` crate (which
//! works without `std` when its default features are off). Without it they
//! expand to nothing, so logged values must also be used elsewhere.

cfg_if::cfg_if! {
    if #[cfg(feature = "tracing")] {
        macro_rules! trace_event {
            ($($arg:tt)*) => {
                ::tracing::trace!(target: "fixed_containers", $($arg)*)
            };
        }

        macro_rules! warn_event {
            ($($arg:tt)*) => {
                ::tracing::warn!(target: "fixed_containers", $($arg)*)
            };
        }

        macro_rules! error_event {
            ($($arg:tt)*) => {
                ::tracing::error!(target: "fixed_containers", $($arg)*)
            };
        }
    } else {
        macro_rules! trace_event {
            ($($arg:tt)*) => {};
        }

        macro_rules! warn_event {
            ($($arg:tt)*) => {};
        }

        macro_rules! error_event {
            ($($arg:tt)*) => {};
        }
    }
}
