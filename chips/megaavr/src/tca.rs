// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! 16-bit Timer/Counter type A (TCA) in split mode.
//!
//! In split mode the timer runs as two 8-bit counters sharing one clock. The
//! low counter drives compare channels 0-2 (WO0-WO2) and the high counter
//! channels 3-5 (WO3-WO5). Both periods are programmed to the same value, so
//! the six outputs behave as one PWM group with one period and six duties.

use tock_registers::interfaces::{ReadWriteable, Readable, Writeable};
use tock_registers::registers::ReadWrite;
use tock_registers::{register_bitfields, register_structs, LocalRegisterCopy};

/// Number of compare outputs in split mode.
pub const SPLIT_CHANNELS: usize = 6;

register_structs! {
    pub TcaRegisters {
        (0x00 => ctrla: ReadWrite<u8, CTRLA::Register>),
        (0x01 => ctrlb: ReadWrite<u8>),
        (0x02 => ctrlc: ReadWrite<u8>),
        (0x03 => ctrld: ReadWrite<u8, CTRLD::Register>),
        (0x04 => _reserved0),
        (0x0A => intctrl: ReadWrite<u8>),
        (0x0B => intflags: ReadWrite<u8>),
        (0x0C => _reserved1),
        (0x20 => lcnt: ReadWrite<u8>),
        (0x21 => hcnt: ReadWrite<u8>),
        (0x22 => _reserved2),
        (0x26 => lper: ReadWrite<u8>),
        (0x27 => hper: ReadWrite<u8>),
        /// LCMP0, HCMP0, LCMP1, HCMP1, LCMP2, HCMP2.
        (0x28 => cmp: [ReadWrite<u8>; 6]),
        (0x2E => _reserved3),
        (0x40 => @END),
    }
}

register_bitfields![u8,
    pub CTRLA [
        ENABLE OFFSET(0) NUMBITS(1) [],
        CLKSEL OFFSET(1) NUMBITS(3) []
    ],
    CTRLD [
        SPLITM OFFSET(0) NUMBITS(1) []
    ]
];

/// Clock prescaler of the split timer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ClockSelect {
    Div1 = 0,
    Div2 = 1,
    Div4 = 2,
    Div8 = 3,
    Div16 = 4,
    Div64 = 5,
    Div256 = 6,
    Div1024 = 7,
}

impl ClockSelect {
    pub const fn from_code(code: u8) -> ClockSelect {
        match code & 0x07 {
            0 => ClockSelect::Div1,
            1 => ClockSelect::Div2,
            2 => ClockSelect::Div4,
            3 => ClockSelect::Div8,
            4 => ClockSelect::Div16,
            5 => ClockSelect::Div64,
            6 => ClockSelect::Div256,
            _ => ClockSelect::Div1024,
        }
    }
}

/// Index into `cmp` of split channel `channel`.
pub const fn compare_index(channel: usize) -> usize {
    if channel < 3 {
        2 * channel
    } else {
        2 * (channel - 3) + 1
    }
}

/// CTRLB bit enabling split channel `channel`. The high channels start at
/// bit 4.
pub const fn output_enable_bit(channel: usize) -> u8 {
    if channel < 3 {
        channel as u8
    } else {
        channel as u8 + 1
    }
}

/// CTRLA value selecting `clock` with the timer enabled.
pub fn ctrla_value(clock: ClockSelect) -> u8 {
    let mut reg: LocalRegisterCopy<u8, CTRLA::Register> = LocalRegisterCopy::new(0);
    reg.modify(CTRLA::CLKSEL.val(clock as u8) + CTRLA::ENABLE::SET);
    reg.get()
}

impl TcaRegisters {
    /// Put the timer in split mode with both periods at `period` and every
    /// compare at `duty`. Outputs stay disabled.
    pub fn init_split(&self, period: u8, duty: u8) {
        self.ctrla.set(0);
        self.ctrlb.set(0);
        self.ctrld.write(CTRLD::SPLITM::SET);
        self.lcnt.set(0);
        self.hcnt.set(0);
        self.lper.set(period);
        self.hper.set(period);
        for cmp in self.cmp.iter() {
            cmp.set(duty);
        }
    }

    pub fn is_split(&self) -> bool {
        self.ctrld.is_set(CTRLD::SPLITM)
    }

    /// Select the prescaler and (re)start the timer.
    pub fn set_clock(&self, clock: ClockSelect) {
        self.ctrla.set(ctrla_value(clock));
    }

    pub fn clock(&self) -> ClockSelect {
        ClockSelect::from_code(self.ctrla.read(CTRLA::CLKSEL))
    }

    pub fn is_enabled(&self) -> bool {
        self.ctrla.is_set(CTRLA::ENABLE)
    }

    pub fn period(&self) -> u8 {
        self.lper.get()
    }

    pub fn set_period(&self, period: u8) {
        self.lper.set(period);
        self.hper.set(period);
    }

    pub fn compare(&self, channel: usize) -> u8 {
        self.cmp[compare_index(channel)].get()
    }

    pub fn set_compare(&self, channel: usize, value: u8) {
        self.cmp[compare_index(channel)].set(value);
    }

    /// CTRLB is shared by all six outputs, so the update runs in a critical
    /// section.
    pub fn enable_output(&self, channel: usize, enable: bool) {
        let bit = 1 << output_enable_bit(channel);
        critical_section::with(|_| {
            let val = self.ctrlb.get();
            self.ctrlb.set(if enable { val | bit } else { val & !bit });
        });
    }

    pub fn output_enabled(&self, channel: usize) -> bool {
        self.ctrlb.get() & (1 << output_enable_bit(channel)) != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utilities::fake_registers;

    #[test]
    fn split_channel_layout() {
        assert_eq!(compare_index(0), 0);
        assert_eq!(compare_index(2), 4);
        assert_eq!(compare_index(3), 1);
        assert_eq!(compare_index(5), 5);
        assert_eq!(output_enable_bit(2), 2);
        assert_eq!(output_enable_bit(3), 4);
        assert_eq!(output_enable_bit(5), 6);
    }

    #[test]
    fn ctrla_codes() {
        assert_eq!(ctrla_value(ClockSelect::Div64), 0x0B);
        assert_eq!(ctrla_value(ClockSelect::Div1), 0x01);
        assert_eq!(ClockSelect::from_code(6), ClockSelect::Div256);
    }

    #[test]
    fn split_init_and_outputs() {
        let tca = fake_registers::<TcaRegisters>();
        tca.init_split(0xFE, 0x80);
        tca.set_clock(ClockSelect::Div16);
        assert!(tca.is_split());
        assert!(tca.is_enabled());
        assert_eq!(tca.clock(), ClockSelect::Div16);
        assert_eq!(tca.hper.get(), 0xFE);
        assert_eq!(tca.compare(4), 0x80);

        tca.set_compare(4, 0x33);
        assert_eq!(tca.cmp[3].get(), 0x33);
        tca.enable_output(4, true);
        tca.enable_output(1, true);
        assert_eq!(tca.ctrlb.get(), 0b0010_0010);
        tca.enable_output(4, false);
        assert!(!tca.output_enabled(4));
        assert!(tca.output_enabled(1));
    }

    #[test]
    fn output_enables_are_independent() {
        let tca = fake_registers::<TcaRegisters>();
        for channel in 0..6 {
            tca.enable_output(channel, true);
        }
        assert_eq!(tca.ctrlb.get(), 0b0111_0111);
        tca.enable_output(0, false);
        tca.enable_output(5, false);
        assert_eq!(tca.ctrlb.get(), 0b0011_0110);
        tca.enable_output(0, false);
        assert_eq!(tca.ctrlb.get(), 0b0011_0110);
    }
}
