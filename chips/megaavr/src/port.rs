// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Digital I/O ports.
//!
//! Only the operations the timer, logic and comparator drivers need: pin
//! direction, output level, pull-up and input buffer control.

use tock_registers::interfaces::{ReadWriteable, Readable, Writeable};
use tock_registers::registers::ReadWrite;
use tock_registers::{register_bitfields, register_structs};

use crate::pins::{Port, MAX_PORTS};
use crate::utilities::StaticRef;

register_structs! {
    pub PortRegisters {
        (0x00 => dir: ReadWrite<u8>),
        (0x01 => dirset: ReadWrite<u8>),
        (0x02 => dirclr: ReadWrite<u8>),
        (0x03 => dirtgl: ReadWrite<u8>),
        (0x04 => out: ReadWrite<u8>),
        (0x05 => outset: ReadWrite<u8>),
        (0x06 => outclr: ReadWrite<u8>),
        (0x07 => outtgl: ReadWrite<u8>),
        (0x08 => input: ReadWrite<u8>),
        (0x09 => intflags: ReadWrite<u8>),
        (0x0A => portctrl: ReadWrite<u8>),
        (0x0B => _reserved0),
        (0x10 => pinctrl: [ReadWrite<u8, PINCTRL::Register>; 8]),
        (0x18 => _reserved1),
        (0x20 => @END),
    }
}

register_bitfields![u8,
    pub PINCTRL [
        ISC OFFSET(0) NUMBITS(3) [
            IntDisable = 0,
            BothEdges = 1,
            Rising = 2,
            Falling = 3,
            InputDisable = 4,
            LevelLow = 5
        ],
        PULLUPEN OFFSET(3) NUMBITS(1) [],
        INVEN OFFSET(7) NUMBITS(1) []
    ]
];

/// Trigger condition for pin-style interrupts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InterruptMode {
    Low,
    High,
    Change,
    Falling,
    Rising,
}

/// All I/O ports of the chip, laid out back to back.
pub type PortBlock = [PortRegisters; MAX_PORTS];

pub struct Ports {
    registers: StaticRef<PortBlock>,
}

impl Ports {
    pub const fn new(registers: StaticRef<PortBlock>) -> Ports {
        Ports { registers }
    }

    fn port(&self, port: Port) -> &PortRegisters {
        &self.registers[port.index()]
    }

    // The DIR/OUT updates below are read-modify-write so that they can be
    // observed on plain memory. They run in a critical section because an
    // interrupt may reconfigure another pin of the same port.

    pub fn make_output(&self, port: Port, bit: u8) {
        let regs = self.port(port);
        critical_section::with(|_| regs.dir.set(regs.dir.get() | (1 << bit)));
    }

    pub fn make_input(&self, port: Port, bit: u8) {
        let regs = self.port(port);
        critical_section::with(|_| regs.dir.set(regs.dir.get() & !(1 << bit)));
    }

    pub fn is_output(&self, port: Port, bit: u8) -> bool {
        self.port(port).dir.get() & (1 << bit) != 0
    }

    pub fn set(&self, port: Port, bit: u8) {
        let regs = self.port(port);
        critical_section::with(|_| regs.out.set(regs.out.get() | (1 << bit)));
    }

    pub fn clear(&self, port: Port, bit: u8) {
        let regs = self.port(port);
        critical_section::with(|_| regs.out.set(regs.out.get() & !(1 << bit)));
    }

    pub fn write(&self, port: Port, bit: u8, high: bool) {
        if high {
            self.set(port, bit);
        } else {
            self.clear(port, bit);
        }
    }

    /// Output latch level.
    pub fn is_set(&self, port: Port, bit: u8) -> bool {
        self.port(port).out.get() & (1 << bit) != 0
    }

    pub fn set_pullup(&self, port: Port, bit: u8, enable: bool) {
        let ctrl = &self.port(port).pinctrl[bit as usize];
        let pullup = if enable {
            PINCTRL::PULLUPEN::SET
        } else {
            PINCTRL::PULLUPEN::CLEAR
        };
        critical_section::with(|_| ctrl.modify(pullup));
    }

    pub fn has_pullup(&self, port: Port, bit: u8) -> bool {
        self.port(port).pinctrl[bit as usize].is_set(PINCTRL::PULLUPEN)
    }

    /// Disconnect the digital input buffer, as required for analog inputs.
    pub fn disable_input_buffer(&self, port: Port, bit: u8) {
        let ctrl = &self.port(port).pinctrl[bit as usize];
        critical_section::with(|_| ctrl.modify(PINCTRL::ISC::InputDisable));
    }

    pub fn is_input_buffer_disabled(&self, port: Port, bit: u8) -> bool {
        self.port(port).pinctrl[bit as usize].matches_all(PINCTRL::ISC::InputDisable)
    }

    /// Configure a pin as a plain digital output and drive it.
    pub fn drive(&self, port: Port, bit: u8, high: bool) {
        self.write(port, bit, high);
        self.make_output(port, bit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utilities::fake_registers;

    #[test]
    fn direction_and_level() {
        let ports = Ports::new(fake_registers::<PortBlock>());
        ports.drive(Port::C, 3, true);
        assert!(ports.is_output(Port::C, 3));
        assert!(ports.is_set(Port::C, 3));
        assert!(!ports.is_output(Port::C, 2));

        ports.clear(Port::C, 3);
        ports.make_input(Port::C, 3);
        assert!(!ports.is_set(Port::C, 3));
        assert!(!ports.is_output(Port::C, 3));
    }

    #[test]
    fn pin_control_bits() {
        let ports = Ports::new(fake_registers::<PortBlock>());
        ports.set_pullup(Port::A, 1, true);
        ports.disable_input_buffer(Port::A, 1);
        assert!(ports.has_pullup(Port::A, 1));
        assert!(ports.is_input_buffer_disabled(Port::A, 1));

        ports.set_pullup(Port::A, 1, false);
        assert!(!ports.has_pullup(Port::A, 1));
        assert!(ports.is_input_buffer_disabled(Port::A, 1));
    }

    #[test]
    fn pin_control_leaves_neighbours_alone() {
        let ports = Ports::new(fake_registers::<PortBlock>());
        ports.set_pullup(Port::D, 0, true);
        ports.set_pullup(Port::D, 1, true);
        ports.disable_input_buffer(Port::D, 1);
        ports.set_pullup(Port::D, 1, false);

        assert!(ports.has_pullup(Port::D, 0));
        assert!(!ports.is_input_buffer_disabled(Port::D, 0));
        assert!(!ports.has_pullup(Port::D, 1));
        assert!(ports.is_input_buffer_disabled(Port::D, 1));
        assert!(!ports.has_pullup(Port::E, 1));
    }
}
