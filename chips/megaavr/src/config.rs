// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Data structure for storing compile-time configuration options.
//!
//! The CPU clock and the timer used for the time base are fixed per board, so
//! they are selected with cargo features. This file is the only place in the
//! crate where `cfg!(feature = ...)` is evaluated; everything else reads the
//! typed `CONFIG` value, which keeps every code path type-checked regardless
//! of which features a board enabled.
//!
//! Drivers do not read `CONFIG` themselves. They take the clock and timer as
//! constructor arguments, and only `chip::MegaAvrPeripherals::new` fills those
//! in from here.

/// Data structure holding compile-time configuration options.
pub struct Config {
    /// Main clock frequency in Hz.
    pub clock_hz: u32,

    /// Index of the TCB instance used as the millisecond tick source.
    ///
    /// This timer is reserved: the PWM engine never reprograms it, and
    /// `analog_write` on its pin falls back to a digital write.
    pub millis_timer: usize,

    /// Clock divider in front of the time base timer, 1 or 2.
    pub millis_divider: u8,

    /// Whether channel allocation steps in the event system are traced to the
    /// debug output.
    pub trace_events: bool,
}

const fn clock_from_features() -> u32 {
    if cfg!(feature = "clock-24mhz") {
        24_000_000
    } else if cfg!(feature = "clock-20mhz") {
        20_000_000
    } else if cfg!(feature = "clock-12mhz") {
        12_000_000
    } else if cfg!(feature = "clock-10mhz") {
        10_000_000
    } else if cfg!(feature = "clock-8mhz") {
        8_000_000
    } else if cfg!(feature = "clock-4mhz") {
        4_000_000
    } else if cfg!(feature = "clock-1mhz") {
        1_000_000
    } else {
        16_000_000
    }
}

/// A unique instance of `Config` where compile-time configuration options are
/// defined.
pub const CONFIG: Config = Config {
    clock_hz: clock_from_features(),
    millis_timer: if cfg!(feature = "millis-tcb2") { 2 } else { 3 },
    millis_divider: if cfg!(feature = "millis-div2") { 2 } else { 1 },
    trace_events: cfg!(feature = "trace-events"),
};
