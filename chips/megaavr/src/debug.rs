// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Debug output for the peripheral drivers.
//!
//! The drivers log through `debug!`, `trace!` and `debug_warn!`. With the
//! `defmt` feature enabled these forward to the matching `defmt` macros and the
//! board provides the global logger. Without it they expand to a dead branch,
//! so the arguments are still type-checked but no code or strings reach the
//! binary.
//!
//! Usage
//! -----
//!
//! ```rust,ignore
//! debug!("evsys: channel {} <- generator {:#x}", ch, code);
//! ```

#[cfg(feature = "defmt")]
macro_rules! debug {
    ($($arg:tt)*) => { ::defmt::debug!($($arg)*) };
}

#[cfg(not(feature = "defmt"))]
macro_rules! debug {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {
        if false {
            let _ = ($(&$arg,)*);
        }
    };
}

#[cfg(feature = "defmt")]
macro_rules! trace {
    ($($arg:tt)*) => {
        if $crate::config::CONFIG.trace_events {
            ::defmt::trace!($($arg)*)
        }
    };
}

#[cfg(not(feature = "defmt"))]
macro_rules! trace {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {
        if false {
            let _ = ($(&$arg,)*);
        }
    };
}

#[cfg(feature = "defmt")]
macro_rules! debug_warn {
    ($($arg:tt)*) => { ::defmt::warn!($($arg)*) };
}

#[cfg(not(feature = "defmt"))]
macro_rules! debug_warn {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {
        if false {
            let _ = ($(&$arg,)*);
        }
    };
}

pub(crate) use {debug, debug_warn, trace};

#[cfg(test)]
mod tests {
    #[test]
    fn macros_take_temporary_arguments() {
        let top: u16 = 15_999;
        let port = crate::pins::Port::C;
        debug!("time: top {}", top as u32 + 1);
        trace!("evsys: port {}", port.index());
        debug_warn!("pwm: clock {}", port as u8);
        debug_warn!("no arguments");
    }
}
