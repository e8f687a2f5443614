// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Port multiplexer: selects between the default and alternate pins of a
//! peripheral.
//!
//! The register order differs between families, so the block is a plain byte
//! array and the offsets come from the variant's `PortMuxLayout`.

use tock_registers::interfaces::{Readable, Writeable};
use tock_registers::registers::ReadWrite;
use tock_registers::register_structs;

use crate::utilities::StaticRef;
use crate::variant::PortMuxLayout;

register_structs! {
    pub PortMuxRegisters {
        (0x00 => route: [ReadWrite<u8>; 16]),
        (0x10 => @END),
    }
}

pub struct PortMux {
    registers: StaticRef<PortMuxRegisters>,
    layout: PortMuxLayout,
}

impl PortMux {
    pub const fn new(registers: StaticRef<PortMuxRegisters>, layout: PortMuxLayout) -> PortMux {
        PortMux { registers, layout }
    }

    fn set_bit(&self, offset: usize, bit: u8, alternate: bool) {
        let reg = &self.registers.route[offset];
        critical_section::with(|_| {
            let val = reg.get();
            if alternate {
                reg.set(val | (1 << bit));
            } else {
                reg.set(val & !(1 << bit));
            }
        });
    }

    /// Route EVOUTx to its alternate pin.
    pub fn set_evout_alternate(&self, evout: u8, alternate: bool) {
        self.set_bit(self.layout.evsysroute, evout, alternate);
    }

    pub fn evout_alternate(&self, evout: u8) -> bool {
        self.registers.route[self.layout.evsysroute].get() & (1 << evout) != 0
    }

    /// Route logic block `lut`'s output to its alternate pin.
    pub fn set_lut_alternate(&self, lut: usize, alternate: bool) {
        self.set_bit(self.layout.cclroute, lut as u8, alternate);
    }

    pub fn lut_alternate(&self, lut: usize) -> bool {
        self.registers.route[self.layout.cclroute].get() & (1 << lut) != 0
    }

    /// Select the port carrying TCA0's six outputs.
    pub fn set_tca0_port(&self, port: u8) {
        let reg = &self.registers.route[self.layout.tcaroute];
        critical_section::with(|_| reg.set((reg.get() & !0x07) | (port & 0x07)));
    }

    pub fn tca0_port(&self) -> u8 {
        self.registers.route[self.layout.tcaroute].get() & 0x07
    }

    pub fn set_tcb_alternate(&self, tcb: usize, alternate: bool) {
        self.set_bit(self.layout.tcbroute, tcb as u8, alternate);
    }

    pub fn tcb_alternate(&self, tcb: usize) -> bool {
        self.registers.route[self.layout.tcbroute].get() & (1 << tcb) != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utilities::fake_registers;
    use crate::variant::ATMEGA4809;

    #[test]
    fn route_bits_are_independent() {
        let mux = PortMux::new(fake_registers(), ATMEGA4809.portmux);
        mux.set_evout_alternate(0, true);
        mux.set_evout_alternate(3, true);
        mux.set_evout_alternate(0, false);
        assert!(!mux.evout_alternate(0));
        assert!(mux.evout_alternate(3));

        mux.set_lut_alternate(2, true);
        assert!(mux.lut_alternate(2));
        assert!(!mux.evout_alternate(2));
    }

    #[test]
    fn tca_route_keeps_other_bits() {
        let mux = PortMux::new(fake_registers(), ATMEGA4809.portmux);
        mux.set_tca0_port(5);
        mux.set_tca0_port(2);
        assert_eq!(mux.tca0_port(), 2);
        mux.set_tcb_alternate(1, true);
        assert!(mux.tcb_alternate(1));
        assert_eq!(mux.tca0_port(), 2);
    }
}
