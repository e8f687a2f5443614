// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Per-chip description records.
//!
//! The drivers are written once against `Variant`. Everything that differs
//! between packages and families (channel counts, which channels see which
//! port, the logic block pin-out, timer output pins, base addresses) lives in
//! the records below.

use crate::pins::Port;

/// Chip family.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Family {
    MegaAvr0,
    AvrDa,
    AvrDb,
}

impl Family {
    pub const fn is_dx(self) -> bool {
        match self {
            Family::MegaAvr0 => false,
            Family::AvrDa | Family::AvrDb => true,
        }
    }
}

/// Base addresses of the peripherals the crate drives.
#[derive(Clone, Copy, Debug)]
pub struct BaseAddresses {
    pub port: usize,
    pub portmux: usize,
    pub evsys: usize,
    pub ccl: usize,
    pub tca0: usize,
    pub tcb0: usize,
    pub ac0: usize,
    pub vref: usize,
}

/// Register offsets inside PORTMUX.
#[derive(Clone, Copy, Debug)]
pub struct PortMuxLayout {
    pub evsysroute: usize,
    pub cclroute: usize,
    pub tcaroute: usize,
    pub tcbroute: usize,
}

/// Pin-out of one logic block.
///
/// Inputs are PIN0..PIN2 of `port`, the output is PIN3 and the alternate
/// output PIN6.
#[derive(Clone, Copy, Debug)]
pub struct LutPins {
    pub port: Port,
    /// Bit n set when INn is bonded out.
    pub inputs: u8,
    pub output: bool,
    pub alt_output: bool,
}

pub const LUT_OUTPUT_BIT: u8 = 3;
pub const LUT_ALT_OUTPUT_BIT: u8 = 6;

/// Default and alternate output pins of one TCB.
#[derive(Clone, Copy, Debug)]
pub struct TcbPins {
    pub primary: Option<(Port, u8)>,
    pub alternate: Option<(Port, u8)>,
}

/// Pins of one analog comparator.
#[derive(Clone, Copy, Debug)]
pub struct AcPins {
    pub positive: [Option<(Port, u8)>; 4],
    pub negative: [Option<(Port, u8)>; 3],
    pub output: (Port, u8),
}

pub struct Variant {
    pub name: &'static str,
    pub family: Family,
    pub base: BaseAddresses,
    pub portmux: PortMuxLayout,

    /// Number of event channels.
    pub event_channels: u8,
    /// Number of user registers.
    pub event_users: u8,
    /// Candidate channels for a pin generator on each port, in search order.
    pub pin_channels: [&'static [u8]; 7],
    /// User code of EVOUTA. EVOUTx is `evout_base + x`.
    pub evout_base: u8,
    /// Ports with an EVOUT on pin 2.
    pub evout_ports: u8,
    /// Ports with a port-mux alternate EVOUT on pin 7.
    pub evout_alt_ports: u8,

    pub luts: &'static [LutPins],
    pub tcbs: &'static [TcbPins],
    pub acs: &'static [AcPins],
}

impl Variant {
    pub fn lut_count(&self) -> usize {
        self.luts.len()
    }

    pub fn tcb_count(&self) -> usize {
        self.tcbs.len()
    }

    /// `assign_generator` is only offered on the AVR-Dx families.
    pub fn has_generator_allocator(&self) -> bool {
        self.family.is_dx()
    }

    pub fn has_evout(&self, port: Port) -> bool {
        self.evout_ports & (1 << port.index()) != 0
    }

    pub fn has_alt_evout(&self, port: Port) -> bool {
        self.evout_alt_ports & (1 << port.index()) != 0
    }
}

const MEGA0_BASE: BaseAddresses = BaseAddresses {
    port: 0x0400,
    portmux: 0x05E0,
    evsys: 0x0180,
    ccl: 0x01C0,
    tca0: 0x0A00,
    tcb0: 0x0A80,
    ac0: 0x0680,
    vref: 0x00A0,
};

const DX_BASE: BaseAddresses = BaseAddresses {
    port: 0x0400,
    portmux: 0x05E0,
    evsys: 0x0200,
    ccl: 0x01C0,
    tca0: 0x0A00,
    tcb0: 0x0B00,
    ac0: 0x0680,
    vref: 0x00B0,
};

const MEGA0_PORTMUX: PortMuxLayout = PortMuxLayout {
    evsysroute: 0x00,
    cclroute: 0x01,
    tcaroute: 0x04,
    tcbroute: 0x05,
};

const DX_PORTMUX: PortMuxLayout = PortMuxLayout {
    evsysroute: 0x00,
    cclroute: 0x01,
    tcaroute: 0x06,
    tcbroute: 0x07,
};

const PIN_CHANNELS: [&[u8]; 7] = [&[0, 1], &[0, 1], &[2, 3], &[2, 3], &[4, 5], &[4, 5], &[]];
const PIN_CHANNELS_64: [&[u8]; 7] = [
    &[0, 1],
    &[0, 1],
    &[2, 3],
    &[2, 3],
    &[4, 5],
    &[4, 5],
    &[6, 7],
];

const fn lut(port: Port, inputs: u8, output: bool, alt_output: bool) -> LutPins {
    LutPins {
        port,
        inputs,
        output,
        alt_output,
    }
}

const fn tcb(primary: Option<(Port, u8)>, alternate: Option<(Port, u8)>) -> TcbPins {
    TcbPins { primary, alternate }
}

const MEGA0_AC: AcPins = AcPins {
    positive: [
        Some((Port::D, 2)),
        Some((Port::D, 4)),
        Some((Port::D, 6)),
        Some((Port::D, 1)),
    ],
    negative: [Some((Port::D, 3)), Some((Port::D, 5)), Some((Port::D, 7))],
    output: (Port::A, 7),
};

const DX_AC0: AcPins = AcPins {
    positive: [
        Some((Port::D, 2)),
        Some((Port::E, 0)),
        Some((Port::E, 2)),
        Some((Port::D, 6)),
    ],
    negative: [Some((Port::D, 3)), Some((Port::D, 0)), Some((Port::D, 7))],
    output: (Port::A, 7),
};

const DX28_AC0: AcPins = AcPins {
    positive: [Some((Port::D, 2)), None, None, Some((Port::D, 6))],
    negative: [Some((Port::D, 3)), None, Some((Port::D, 7))],
    output: (Port::A, 7),
};

use crate::pins::Port::{A, B, C, D, F, G};

pub static ATMEGA4809: Variant = Variant {
    name: "ATmega4809",
    family: Family::MegaAvr0,
    base: MEGA0_BASE,
    portmux: MEGA0_PORTMUX,
    event_channels: 8,
    event_users: 0x18,
    pin_channels: PIN_CHANNELS,
    evout_base: 0x09,
    evout_ports: 0b0011_1111,
    evout_alt_ports: 0b0000_1101,
    luts: &[
        lut(A, 0b111, true, true),
        lut(C, 0b111, true, true),
        lut(D, 0b111, true, true),
        lut(F, 0b111, true, true),
    ],
    tcbs: &[
        tcb(Some((A, 2)), Some((F, 4))),
        tcb(Some((A, 3)), Some((F, 5))),
        tcb(Some((C, 0)), Some((B, 4))),
        tcb(Some((B, 5)), Some((C, 1))),
    ],
    acs: &[MEGA0_AC],
};

pub static ATMEGA4808: Variant = Variant {
    name: "ATmega4808",
    family: Family::MegaAvr0,
    base: MEGA0_BASE,
    portmux: MEGA0_PORTMUX,
    event_channels: 6,
    event_users: 0x18,
    pin_channels: PIN_CHANNELS,
    evout_base: 0x09,
    evout_ports: 0b0010_1101,
    evout_alt_ports: 0b0000_1001,
    luts: &[
        lut(A, 0b111, true, true),
        lut(C, 0b111, true, false),
        lut(D, 0b111, true, true),
        lut(F, 0b111, true, true),
    ],
    tcbs: &[
        tcb(Some((A, 2)), Some((F, 4))),
        tcb(Some((A, 3)), Some((F, 5))),
        tcb(Some((C, 0)), None),
    ],
    acs: &[MEGA0_AC],
};

pub static AVR128DA48: Variant = Variant {
    name: "AVR128DA48",
    family: Family::AvrDa,
    base: DX_BASE,
    portmux: DX_PORTMUX,
    event_channels: 10,
    event_users: 0x2B,
    pin_channels: PIN_CHANNELS,
    evout_base: 0x0E,
    evout_ports: 0b0011_1111,
    evout_alt_ports: 0b0000_1101,
    luts: &[
        lut(A, 0b111, true, true),
        lut(C, 0b111, true, true),
        lut(D, 0b111, true, true),
        lut(F, 0b111, true, false),
        lut(B, 0b111, true, false),
        lut(G, 0b000, false, false),
    ],
    tcbs: &[
        tcb(Some((A, 2)), Some((F, 4))),
        tcb(Some((A, 3)), Some((F, 5))),
        tcb(Some((C, 0)), Some((B, 4))),
        tcb(Some((B, 5)), Some((C, 1))),
    ],
    acs: &[DX_AC0],
};

pub static AVR128DA64: Variant = Variant {
    name: "AVR128DA64",
    family: Family::AvrDa,
    base: DX_BASE,
    portmux: DX_PORTMUX,
    event_channels: 10,
    event_users: 0x2B,
    pin_channels: PIN_CHANNELS_64,
    evout_base: 0x0E,
    evout_ports: 0b0111_1111,
    evout_alt_ports: 0b0101_1111,
    luts: &[
        lut(A, 0b111, true, true),
        lut(C, 0b111, true, true),
        lut(D, 0b111, true, true),
        lut(F, 0b111, true, false),
        lut(B, 0b111, true, true),
        lut(G, 0b111, true, true),
    ],
    tcbs: &[
        tcb(Some((A, 2)), Some((F, 4))),
        tcb(Some((A, 3)), Some((F, 5))),
        tcb(Some((C, 0)), Some((B, 4))),
        tcb(Some((B, 5)), Some((C, 1))),
        tcb(Some((G, 3)), Some((C, 6))),
    ],
    acs: &[DX_AC0],
};

pub static AVR128DA28: Variant = Variant {
    name: "AVR128DA28",
    family: Family::AvrDa,
    base: DX_BASE,
    portmux: DX_PORTMUX,
    event_channels: 8,
    event_users: 0x2B,
    pin_channels: PIN_CHANNELS,
    evout_base: 0x0E,
    evout_ports: 0b0000_1101,
    evout_alt_ports: 0b0000_1001,
    luts: &[
        lut(A, 0b111, true, true),
        lut(C, 0b111, true, false),
        lut(D, 0b110, true, true),
        lut(F, 0b011, false, false),
    ],
    tcbs: &[
        tcb(Some((A, 2)), None),
        tcb(Some((A, 3)), None),
        tcb(Some((C, 0)), None),
    ],
    acs: &[DX28_AC0],
};

pub static AVR128DB48: Variant = Variant {
    name: "AVR128DB48",
    family: Family::AvrDb,
    base: DX_BASE,
    portmux: DX_PORTMUX,
    event_channels: 10,
    event_users: 0x36,
    pin_channels: PIN_CHANNELS,
    evout_base: 0x0D,
    evout_ports: 0b0011_1111,
    evout_alt_ports: 0b0000_1101,
    luts: &[
        lut(A, 0b111, true, true),
        lut(C, 0b111, true, true),
        lut(D, 0b111, true, true),
        lut(F, 0b111, true, false),
        lut(B, 0b111, true, false),
        lut(G, 0b000, false, false),
    ],
    tcbs: &[
        tcb(Some((A, 2)), Some((F, 4))),
        tcb(Some((A, 3)), Some((F, 5))),
        tcb(Some((C, 0)), Some((B, 4))),
        tcb(Some((B, 5)), Some((C, 1))),
    ],
    acs: &[DX_AC0],
};

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [&Variant; 6] = [
        &ATMEGA4809,
        &ATMEGA4808,
        &AVR128DA48,
        &AVR128DA64,
        &AVR128DA28,
        &AVR128DB48,
    ];

    #[test]
    fn pin_channels_exist_on_every_variant() {
        for v in ALL {
            for group in v.pin_channels {
                for &ch in group {
                    assert!(ch < v.event_channels, "{}: channel {}", v.name, ch);
                }
            }
        }
    }

    #[test]
    fn evout_users_fit_in_user_table() {
        for v in ALL {
            assert!(v.evout_base + 7 < v.event_users, "{}", v.name);
            assert_eq!(v.evout_alt_ports & !v.evout_ports, 0, "{}", v.name);
        }
    }

    #[test]
    fn allocator_only_on_dx() {
        assert!(!ATMEGA4809.has_generator_allocator());
        assert!(AVR128DB48.has_generator_allocator());
        assert_eq!(AVR128DA48.lut_count(), 6);
        assert_eq!(ATMEGA4808.tcb_count(), 3);
    }
}
