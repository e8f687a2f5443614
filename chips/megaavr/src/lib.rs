// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Peripheral implementations for the megaAVR-0 and AVR-Dx MCUs.
//!
//! This crate covers the event system (EVSYS), the configurable custom logic
//! (CCL), the analog comparator, and the timers that provide the millisecond
//! time base and PWM. Boards describe their package through a `Variant` and a
//! `PinTable` and build the drivers with `chip::MegaAvrPeripherals::new`.

#![crate_name = "megaavr"]
#![crate_type = "rlib"]
#![cfg_attr(not(test), no_std)]
#![cfg_attr(target_arch = "avr", feature(asm_experimental_arch))]

mod debug;

pub mod ac;
pub mod ccl;
pub mod chip;
pub mod config;
pub mod errorcode;
pub mod evsys;
pub mod pins;
pub mod port;
pub mod portmux;
pub mod pwm;
pub mod tca;
pub mod tcb;
pub mod time;
pub mod utilities;
pub mod variant;

pub use crate::errorcode::ErrorCode;
