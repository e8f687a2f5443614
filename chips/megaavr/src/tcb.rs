// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! 16-bit Timer/Counter type B (TCB).
//!
//! Two modes are used: periodic interrupt, for the millisecond time base, and
//! 8-bit PWM, where CCMPL holds the period and CCMPH the duty.
//!
//! 16-bit registers are accessed low byte first. Reading CNTL latches CNTH
//! into TEMP, and writing CCMPL is held in TEMP until CCMPH is written, so the
//! pair is updated atomically by the hardware.

use tock_registers::interfaces::{ReadWriteable, Readable, Writeable};
use tock_registers::registers::{ReadOnly, ReadWrite};
use tock_registers::{register_bitfields, register_structs, LocalRegisterCopy};

/// Largest TCB count of any supported chip.
pub const MAX_TCBS: usize = 5;

register_structs! {
    pub TcbRegisters {
        (0x00 => ctrla: ReadWrite<u8, CTRLA::Register>),
        (0x01 => ctrlb: ReadWrite<u8, CTRLB::Register>),
        (0x02 => _reserved0),
        (0x04 => evctrl: ReadWrite<u8>),
        (0x05 => intctrl: ReadWrite<u8, INT::Register>),
        (0x06 => pub(crate) intflags: ReadWrite<u8, INT::Register>),
        (0x07 => status: ReadOnly<u8>),
        (0x08 => dbgctrl: ReadWrite<u8>),
        (0x09 => temp: ReadWrite<u8>),
        (0x0A => cntl: ReadWrite<u8>),
        (0x0B => cnth: ReadWrite<u8>),
        (0x0C => ccmpl: ReadWrite<u8>),
        (0x0D => ccmph: ReadWrite<u8>),
        (0x0E => _reserved1),
        (0x10 => @END),
    }
}

register_bitfields![u8,
    pub CTRLA [
        ENABLE OFFSET(0) NUMBITS(1) [],
        CLKSEL OFFSET(1) NUMBITS(3) [],
        RUNSTDBY OFFSET(6) NUMBITS(1) []
    ],
    pub CTRLB [
        CNTMODE OFFSET(0) NUMBITS(3) [
            Int = 0,
            Timeout = 1,
            Capt = 2,
            Frq = 3,
            Pw = 4,
            FrqPw = 5,
            Single = 6,
            Pwm8 = 7
        ],
        CCMPEN OFFSET(4) NUMBITS(1) [],
        CCMPINIT OFFSET(5) NUMBITS(1) [],
        ASYNC OFFSET(6) NUMBITS(1) []
    ],
    pub INT [
        CAPT OFFSET(0) NUMBITS(1) []
    ]
];

/// Clock source of a TCB.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ClockSelect {
    Div1 = 0,
    Div2 = 1,
    /// The clock of TCA0, after its prescaler.
    Tca0 = 2,
}

impl ClockSelect {
    pub const fn from_code(code: u8) -> Option<ClockSelect> {
        match code {
            0 => Some(ClockSelect::Div1),
            1 => Some(ClockSelect::Div2),
            2 => Some(ClockSelect::Tca0),
            _ => None,
        }
    }
}

/// All TCB instances, laid out back to back.
pub type TcbBlock = [TcbRegisters; MAX_TCBS];

/// CTRLA value selecting `clock`, optionally enabled.
pub fn ctrla_value(clock: ClockSelect, enable: bool) -> u8 {
    let mut reg: LocalRegisterCopy<u8, CTRLA::Register> = LocalRegisterCopy::new(0);
    reg.modify(CTRLA::CLKSEL.val(clock as u8));
    if enable {
        reg.modify(CTRLA::ENABLE::SET);
    }
    reg.get()
}

impl TcbRegisters {
    pub fn count(&self) -> u16 {
        let low = self.cntl.get();
        let high = self.cnth.get();
        u16::from_le_bytes([low, high])
    }

    pub fn set_count(&self, count: u16) {
        let [low, high] = count.to_le_bytes();
        self.cntl.set(low);
        self.cnth.set(high);
    }

    pub fn compare(&self) -> u16 {
        let low = self.ccmpl.get();
        let high = self.ccmph.get();
        u16::from_le_bytes([low, high])
    }

    pub fn set_compare(&self, compare: u16) {
        let [low, high] = compare.to_le_bytes();
        self.ccmpl.set(low);
        self.ccmph.set(high);
    }

    /// Program periodic interrupt mode with TOP `top`. The timer is left
    /// disabled.
    pub fn init_periodic(&self, top: u16, clock: ClockSelect) {
        self.ctrla.set(0);
        self.ctrlb.write(CTRLB::CNTMODE::Int);
        self.set_count(0);
        self.set_compare(top);
        self.intctrl.write(INT::CAPT::SET);
        self.ctrla.set(ctrla_value(clock, false));
    }

    /// Program 8-bit PWM mode. The output stays disabled.
    pub fn init_pwm8(&self, period: u8, duty: u8, clock: ClockSelect) {
        self.ctrla.set(0);
        self.ctrlb.write(CTRLB::CNTMODE::Pwm8);
        self.set_count(0);
        self.ccmpl.set(period);
        self.ccmph.set(duty);
        self.ctrla.set(ctrla_value(clock, true));
    }

    pub fn enable(&self) {
        self.ctrla.modify(CTRLA::ENABLE::SET);
    }

    pub fn is_enabled(&self) -> bool {
        self.ctrla.is_set(CTRLA::ENABLE)
    }

    pub fn clock(&self) -> Option<ClockSelect> {
        ClockSelect::from_code(self.ctrla.read(CTRLA::CLKSEL))
    }

    /// Change the clock source without touching ENABLE.
    pub fn set_clock(&self, clock: ClockSelect) {
        self.ctrla.modify(CTRLA::CLKSEL.val(clock as u8));
    }

    pub fn pwm_period(&self) -> u8 {
        self.ccmpl.get()
    }

    pub fn pwm_duty(&self) -> u8 {
        self.ccmph.get()
    }

    /// Set the 8-bit PWM period and duty together.
    pub fn set_pwm(&self, period: u8, duty: u8) {
        self.ccmpl.set(period);
        self.ccmph.set(duty);
    }

    /// Update the duty, rewriting the period so the pair goes through TEMP.
    pub fn set_pwm_duty(&self, duty: u8) {
        self.set_pwm(self.ccmpl.get(), duty);
    }

    pub fn enable_output(&self, enable: bool) {
        if enable {
            self.ctrlb.modify(CTRLB::CCMPEN::SET);
        } else {
            self.ctrlb.modify(CTRLB::CCMPEN::CLEAR);
        }
    }

    pub fn output_enabled(&self) -> bool {
        self.ctrlb.is_set(CTRLB::CCMPEN)
    }

    pub fn is_pwm8(&self) -> bool {
        self.ctrlb.matches_all(CTRLB::CNTMODE::Pwm8)
    }

    pub fn capture_pending(&self) -> bool {
        self.intflags.is_set(INT::CAPT)
    }

    /// Write-1-to-clear the capture flag.
    pub fn clear_capture(&self) {
        self.intflags.write(INT::CAPT::SET);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utilities::fake_registers;

    #[test]
    fn sixteen_bit_pairs() {
        let tcb = fake_registers::<TcbRegisters>();
        tcb.set_compare(15999);
        assert_eq!(tcb.ccmpl.get(), 0x7F);
        assert_eq!(tcb.ccmph.get(), 0x3E);
        assert_eq!(tcb.compare(), 15999);
        tcb.set_count(0x1234);
        assert_eq!(tcb.count(), 0x1234);
    }

    #[test]
    fn ctrla_codes() {
        assert_eq!(ctrla_value(ClockSelect::Tca0, true), 0x05);
        assert_eq!(ctrla_value(ClockSelect::Div2, false), 0x02);
    }

    #[test]
    fn pwm8_mode() {
        let tcb = fake_registers::<TcbRegisters>();
        tcb.init_pwm8(0xFE, 0x80, ClockSelect::Tca0);
        assert!(tcb.is_pwm8());
        assert!(tcb.is_enabled());
        assert!(!tcb.output_enabled());
        tcb.set_pwm_duty(0x10);
        assert_eq!(tcb.pwm_period(), 0xFE);
        assert_eq!(tcb.pwm_duty(), 0x10);
        tcb.enable_output(true);
        assert!(tcb.output_enabled());
        assert!(tcb.is_pwm8());
    }

    #[test]
    fn periodic_mode() {
        let tcb = fake_registers::<TcbRegisters>();
        tcb.init_periodic(19999, ClockSelect::Div1);
        assert!(!tcb.is_enabled());
        assert!(tcb.intctrl.is_set(INT::CAPT));
        assert_eq!(tcb.compare(), 19999);
        tcb.enable();
        assert!(tcb.is_enabled());
        assert_eq!(tcb.clock(), Some(ClockSelect::Div1));
    }
}
