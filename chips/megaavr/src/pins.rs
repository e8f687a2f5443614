// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Logical pin number to port/bit/timer lookup.
//!
//! Boards describe their pinout as a `PinTable`, one `PinDescriptor` per
//! Arduino-style pin number. The event router, the logic controller and the
//! PWM engine only ever see pins through this table.

/// An I/O port.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Port {
    A = 0,
    B = 1,
    C = 2,
    D = 3,
    E = 4,
    F = 5,
    G = 6,
}

/// Number of ports any supported chip can have.
pub const MAX_PORTS: usize = 7;

impl Port {
    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn from_index(index: u8) -> Option<Port> {
        match index {
            0 => Some(Port::A),
            1 => Some(Port::B),
            2 => Some(Port::C),
            3 => Some(Port::D),
            4 => Some(Port::E),
            5 => Some(Port::F),
            6 => Some(Port::G),
            _ => None,
        }
    }
}

/// The timer output a pin is wired to, if any.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimerId {
    NotOnTimer,
    /// One of the six split-mode outputs of TCA0.
    Tca0,
    /// The single 8-bit PWM output of TCBn.
    Tcb(u8),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PinDescriptor {
    pub port: Port,
    pub bit: u8,
    pub timer: TimerId,
}

const fn pin(port: Port, bit: u8, timer: TimerId) -> PinDescriptor {
    PinDescriptor { port, bit, timer }
}

/// A board's pinout.
pub struct PinTable {
    pins: &'static [PinDescriptor],
}

impl PinTable {
    pub const fn new(pins: &'static [PinDescriptor]) -> PinTable {
        PinTable { pins }
    }

    pub fn descriptor(&self, pin: u8) -> Option<&PinDescriptor> {
        self.pins.get(pin as usize)
    }

    pub fn port(&self, pin: u8) -> Option<Port> {
        self.descriptor(pin).map(|d| d.port)
    }

    pub fn bit_position(&self, pin: u8) -> Option<u8> {
        self.descriptor(pin).map(|d| d.bit)
    }

    pub fn timer(&self, pin: u8) -> TimerId {
        self.descriptor(pin).map_or(TimerId::NotOnTimer, |d| d.timer)
    }
}

use self::Port::{A, B, C, D, E, F};
use self::TimerId::{NotOnTimer, Tca0, Tcb};

/// Pinout of the 48-pin ATmega4809 "standard" layout.
///
/// TCA0 is routed to PORTC, TCB0/TCB1 to their alternate PF4/PF5 pins and
/// TCB2/TCB3 to PB4/PB5.
pub static ATMEGA4809_48PIN: PinTable = PinTable::new(&[
    pin(A, 0, NotOnTimer), //  0 PA0
    pin(A, 1, NotOnTimer), //  1 PA1
    pin(A, 2, NotOnTimer), //  2 PA2 SDA
    pin(A, 3, NotOnTimer), //  3 PA3 SCL
    pin(A, 4, NotOnTimer), //  4 PA4 MOSI
    pin(A, 5, NotOnTimer), //  5 PA5 MISO
    pin(A, 6, NotOnTimer), //  6 PA6 SCK
    pin(A, 7, NotOnTimer), //  7 PA7 SS
    pin(B, 0, NotOnTimer), //  8 PB0
    pin(B, 1, NotOnTimer), //  9 PB1
    pin(B, 2, NotOnTimer), // 10 PB2
    pin(B, 3, NotOnTimer), // 11 PB3
    pin(B, 4, Tcb(2)),     // 12 PB4
    pin(B, 5, Tcb(3)),     // 13 PB5
    pin(C, 0, Tca0),       // 14 PC0
    pin(C, 1, Tca0),       // 15 PC1
    pin(C, 2, Tca0),       // 16 PC2
    pin(C, 3, Tca0),       // 17 PC3
    pin(C, 4, Tca0),       // 18 PC4
    pin(C, 5, Tca0),       // 19 PC5
    pin(C, 6, NotOnTimer), // 20 PC6
    pin(C, 7, NotOnTimer), // 21 PC7
    pin(D, 0, NotOnTimer), // 22 PD0 AIN0
    pin(D, 1, NotOnTimer), // 23 PD1 AIN1
    pin(D, 2, NotOnTimer), // 24 PD2 AIN2
    pin(D, 3, NotOnTimer), // 25 PD3 AIN3
    pin(D, 4, NotOnTimer), // 26 PD4 AIN4
    pin(D, 5, NotOnTimer), // 27 PD5 AIN5
    pin(D, 6, NotOnTimer), // 28 PD6 AIN6
    pin(D, 7, NotOnTimer), // 29 PD7 AIN7
    pin(E, 0, NotOnTimer), // 30 PE0
    pin(E, 1, NotOnTimer), // 31 PE1
    pin(E, 2, NotOnTimer), // 32 PE2
    pin(E, 3, NotOnTimer), // 33 PE3
    pin(F, 0, NotOnTimer), // 34 PF0
    pin(F, 1, NotOnTimer), // 35 PF1
    pin(F, 2, NotOnTimer), // 36 PF2
    pin(F, 3, NotOnTimer), // 37 PF3
    pin(F, 4, Tcb(0)),     // 38 PF4
    pin(F, 5, Tcb(1)),     // 39 PF5 LED_BUILTIN
    pin(F, 6, NotOnTimer), // 40 PF6 RESET
]);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookups_follow_the_table() {
        let t = &ATMEGA4809_48PIN;
        assert_eq!(t.port(40), Some(Port::F));
        assert_eq!(t.port(14), Some(Port::C));
        assert_eq!(t.bit_position(39), Some(5));
        assert_eq!(t.timer(12), TimerId::Tcb(2));
    }

    #[test]
    fn out_of_range_pins_have_no_descriptor() {
        let t = &ATMEGA4809_48PIN;
        assert_eq!(t.port(41), None);
        assert_eq!(t.bit_position(255), None);
        assert_eq!(t.timer(200), TimerId::NotOnTimer);
    }
}
