// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Analog comparator (AC).
//!
//! The comparator output can drive a pin, feed the logic blocks and the event
//! system, and raise an interrupt on an edge. The reference ladder in VREF is
//! only programmed on megaAVR-0, where its layout is known.

use core::cell::Cell;

use tock_registers::interfaces::{ReadWriteable, Readable, Writeable};
use tock_registers::registers::ReadWrite;
use tock_registers::{register_bitfields, register_structs};

use crate::debug::debug;
use crate::errorcode::ErrorCode;
use crate::port::{InterruptMode, Ports};
use crate::utilities::StaticRef;
use crate::variant::Variant;

/// Largest comparator count of any supported chip.
pub const MAX_ACS: usize = 3;

/// Address stride between comparator instances.
pub const AC_STRIDE: usize = 0x08;

register_structs! {
    pub AcRegisters {
        (0x00 => ctrla: ReadWrite<u8, CTRLA::Register>),
        (0x01 => ctrlb: ReadWrite<u8>),
        (0x02 => muxctrla: ReadWrite<u8, MUXCTRLA::Register>),
        (0x03 => _reserved0),
        /// DACREF is at 0x04 on megaAVR-0 and 0x05 on AVR-Dx.
        (0x04 => dacref: [ReadWrite<u8>; 2]),
        (0x06 => intctrl: ReadWrite<u8, INTCTRL::Register>),
        (0x07 => status: ReadWrite<u8, STATUS::Register>),
        (0x08 => @END),
    }
}

register_structs! {
    pub VrefRegisters {
        (0x00 => ctrla: ReadWrite<u8, VREF_CTRLA::Register>),
        (0x01 => ctrlb: ReadWrite<u8, VREF_CTRLB::Register>),
        (0x02 => @END),
    }
}

register_bitfields![u8,
    CTRLA [
        ENABLE OFFSET(0) NUMBITS(1) [],
        HYSMODE OFFSET(1) NUMBITS(2) [],
        /// megaAVR-0 only.
        INTMODE OFFSET(4) NUMBITS(2) [],
        OUTEN OFFSET(6) NUMBITS(1) [],
        RUNSTDBY OFFSET(7) NUMBITS(1) []
    ],
    MUXCTRLA [
        MUXNEG OFFSET(0) NUMBITS(2) [],
        MUXPOS OFFSET(3) NUMBITS(2) [],
        INVERT OFFSET(7) NUMBITS(1) []
    ],
    INTCTRL [
        CMP OFFSET(0) NUMBITS(1) [],
        /// AVR-Dx only.
        INTMODE OFFSET(4) NUMBITS(2) []
    ],
    STATUS [
        CMP OFFSET(0) NUMBITS(1) [],
        STATE OFFSET(4) NUMBITS(1) []
    ],
    VREF_CTRLA [
        AC0REFSEL OFFSET(0) NUMBITS(3) []
    ],
    VREF_CTRLB [
        AC0REFEN OFFSET(0) NUMBITS(1) []
    ]
];

const INTMODE_BOTHEDGE: u8 = 0;
const INTMODE_NEGEDGE: u8 = 2;
const INTMODE_POSEDGE: u8 = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Output {
    Disable,
    Enable,
    Invert,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Hysteresis {
    Disable = 0,
    /// 10 mV
    Small = 1,
    /// 25 mV
    Medium = 2,
    /// 50 mV
    Large = 3,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum PositiveInput {
    In0 = 0,
    In1 = 1,
    In2 = 2,
    In3 = 3,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum NegativeInput {
    In0 = 0,
    In1 = 1,
    In2 = 2,
    /// The internal DAC reference, set by `AcConfig::dacref`.
    DacRef = 3,
}

/// Internal voltage reference for DACREF.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Reference {
    V0_55,
    V1_1,
    V1_5,
    V2_5,
    V4_3,
    Avcc,
    /// Leave the reference off.
    Disable,
}

impl Reference {
    /// AC0REFSEL code, or `None` for `Disable`.
    pub const fn code(self) -> Option<u8> {
        match self {
            Reference::V0_55 => Some(0x00),
            Reference::V1_1 => Some(0x01),
            Reference::V2_5 => Some(0x02),
            Reference::V4_3 => Some(0x03),
            Reference::V1_5 => Some(0x04),
            Reference::Avcc => Some(0x07),
            Reference::Disable => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AcConfig {
    pub output: Output,
    pub hysteresis: Hysteresis,
    pub input_p: PositiveInput,
    pub input_n: NegativeInput,
    pub reference: Reference,
    pub dacref: u8,
}

impl AcConfig {
    pub const DEFAULT: AcConfig = AcConfig {
        output: Output::Disable,
        hysteresis: Hysteresis::Disable,
        input_p: PositiveInput::In0,
        input_n: NegativeInput::In0,
        reference: Reference::Disable,
        dacref: 0xFF,
    };
}

impl Default for AcConfig {
    fn default() -> Self {
        AcConfig::DEFAULT
    }
}

fn intmode_code(mode: InterruptMode) -> Option<u8> {
    match mode {
        InterruptMode::Rising => Some(INTMODE_POSEDGE),
        InterruptMode::Falling => Some(INTMODE_NEGEDGE),
        InterruptMode::Change => Some(INTMODE_BOTHEDGE),
        InterruptMode::Low | InterruptMode::High => None,
    }
}

/// Receives comparator output-change interrupts.
pub trait Client {
    fn comparison_changed(&self, comparator: usize);
}

pub struct AnalogComparator<'a> {
    number: usize,
    registers: StaticRef<AcRegisters>,
    vref: StaticRef<VrefRegisters>,
    ports: Ports,
    variant: &'static Variant,
    config: Cell<AcConfig>,
    client: Cell<Option<&'a dyn Client>>,
}

impl<'a> AnalogComparator<'a> {
    pub const fn new(
        number: usize,
        registers: StaticRef<AcRegisters>,
        vref: StaticRef<VrefRegisters>,
        ports: Ports,
        variant: &'static Variant,
    ) -> AnalogComparator<'a> {
        AnalogComparator {
            number,
            registers,
            vref,
            ports,
            variant,
            config: Cell::new(AcConfig::DEFAULT),
            client: Cell::new(None),
        }
    }

    pub fn number(&self) -> usize {
        self.number
    }

    /// Replace the stored configuration. Takes effect on `init`.
    pub fn configure(&self, config: &AcConfig) {
        self.config.set(*config);
    }

    pub fn config(&self) -> AcConfig {
        self.config.get()
    }

    fn dacref_register(&self) -> &ReadWrite<u8> {
        let index = if self.variant.family.is_dx() { 1 } else { 0 };
        &self.registers.dacref[index]
    }

    /// Apply the stored configuration.
    ///
    /// The selected analog pins get their digital input buffer disabled and
    /// the output pin is made an output when the output is enabled. Fails
    /// without writing anything if an input is not bonded out.
    pub fn init(&self) -> Result<(), ErrorCode> {
        let config = self.config.get();
        let pins = self.variant.acs.get(self.number).ok_or(ErrorCode::NODEVICE)?;

        let positive = pins.positive[config.input_p as usize].ok_or(ErrorCode::INVAL)?;
        let negative = match config.input_n {
            NegativeInput::DacRef => None,
            n => Some(pins.negative[n as usize].ok_or(ErrorCode::INVAL)?),
        };
        let reference = config.reference.code();
        if self.variant.family.is_dx() && reference.is_some() {
            return Err(ErrorCode::NOSUPPORT);
        }

        if !self.variant.family.is_dx() {
            match reference {
                Some(code) => {
                    self.vref.ctrla.modify(VREF_CTRLA::AC0REFSEL.val(code));
                    self.vref.ctrlb.modify(VREF_CTRLB::AC0REFEN::SET);
                }
                None => self.vref.ctrlb.modify(VREF_CTRLB::AC0REFEN::CLEAR),
            }
        }
        self.dacref_register().set(config.dacref);
        self.registers
            .ctrla
            .modify(CTRLA::HYSMODE.val(config.hysteresis as u8));

        self.ports.disable_input_buffer(positive.0, positive.1);
        if let Some((port, bit)) = negative {
            self.ports.disable_input_buffer(port, bit);
        }
        self.registers.muxctrla.modify(
            MUXCTRLA::MUXPOS.val(config.input_p as u8) + MUXCTRLA::MUXNEG.val(config.input_n as u8),
        );

        let (out_port, out_bit) = pins.output;
        match config.output {
            Output::Enable | Output::Invert => {
                if config.output == Output::Invert {
                    self.registers.muxctrla.modify(MUXCTRLA::INVERT::SET);
                } else {
                    self.registers.muxctrla.modify(MUXCTRLA::INVERT::CLEAR);
                }
                self.registers.ctrla.modify(CTRLA::OUTEN::SET);
                self.ports.make_output(out_port, out_bit);
            }
            Output::Disable => {
                self.registers.muxctrla.modify(MUXCTRLA::INVERT::CLEAR);
                self.registers.ctrla.modify(CTRLA::OUTEN::CLEAR);
                self.ports.make_input(out_port, out_bit);
            }
        }
        debug!(
            "ac{}: muxctrla {:#x} ctrla {:#x}",
            self.number,
            self.registers.muxctrla.get(),
            self.registers.ctrla.get()
        );
        Ok(())
    }

    pub fn start(&self, state: bool) {
        if state {
            self.registers.ctrla.modify(CTRLA::ENABLE::SET);
        } else {
            self.registers.ctrla.modify(CTRLA::ENABLE::CLEAR);
        }
    }

    pub fn stop(&self) {
        self.start(false);
    }

    pub fn is_running(&self) -> bool {
        self.registers.ctrla.is_set(CTRLA::ENABLE)
    }

    /// Current comparator output, true when the positive input is higher.
    pub fn read(&self) -> bool {
        self.registers.status.is_set(STATUS::STATE)
    }

    /// Call `client` on the given output edge. Level modes are refused.
    pub fn attach_interrupt(
        &self,
        client: &'a dyn Client,
        mode: InterruptMode,
    ) -> Result<(), ErrorCode> {
        let code = intmode_code(mode).ok_or(ErrorCode::INVAL)?;
        if self.variant.family.is_dx() {
            self.registers.intctrl.modify(INTCTRL::INTMODE.val(code));
        } else {
            self.registers.ctrla.modify(CTRLA::INTMODE.val(code));
        }
        self.client.set(Some(client));
        self.registers.intctrl.modify(INTCTRL::CMP::SET);
        Ok(())
    }

    pub fn detach_interrupt(&self) {
        self.registers.intctrl.modify(INTCTRL::CMP::CLEAR);
        self.client.set(None);
    }

    pub fn interrupt_enabled(&self) -> bool {
        self.registers.intctrl.is_set(INTCTRL::CMP)
    }

    /// Comparator interrupt handler.
    pub fn handle_interrupt(&self) {
        if let Some(client) = self.client.get() {
            client.comparison_changed(self.number);
        }
        self.registers.status.write(STATUS::CMP::SET);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pins::Port;
    use crate::port::PortBlock;
    use crate::utilities::fake_registers;
    use crate::variant::{ATMEGA4809, AVR128DA28, AVR128DA48};

    struct Fixture<'a> {
        ac: AnalogComparator<'a>,
        regs: StaticRef<AcRegisters>,
        vref: StaticRef<VrefRegisters>,
        ports: Ports,
    }

    fn fixture<'a>(variant: &'static Variant) -> Fixture<'a> {
        let regs = fake_registers::<AcRegisters>();
        let vref = fake_registers::<VrefRegisters>();
        let port_regs = fake_registers::<PortBlock>();
        Fixture {
            ac: AnalogComparator::new(0, regs, vref, Ports::new(port_regs), variant),
            regs,
            vref,
            ports: Ports::new(port_regs),
        }
    }

    struct Recorder {
        fired: Cell<usize>,
    }

    impl Client for Recorder {
        fn comparison_changed(&self, comparator: usize) {
            self.fired.set(self.fired.get() + 1 + comparator);
        }
    }

    #[test]
    fn init_programs_inputs_and_output() {
        let f = fixture(&ATMEGA4809);
        f.ac.configure(&AcConfig {
            output: Output::Invert,
            hysteresis: Hysteresis::Medium,
            input_p: PositiveInput::In1,
            input_n: NegativeInput::In2,
            ..AcConfig::DEFAULT
        });
        assert_eq!(f.ac.init(), Ok(()));

        assert_eq!(f.regs.muxctrla.get(), 0x80 | (1 << 3) | 2);
        assert!(f.regs.ctrla.is_set(CTRLA::OUTEN));
        assert_eq!(f.regs.ctrla.read(CTRLA::HYSMODE), 2);
        assert!(!f.ac.is_running());
        assert!(f.ports.is_input_buffer_disabled(Port::D, 4));
        assert!(f.ports.is_input_buffer_disabled(Port::D, 7));
        assert!(!f.ports.is_input_buffer_disabled(Port::D, 2));
        assert!(f.ports.is_output(Port::A, 7));
        assert_eq!(f.regs.dacref[0].get(), 0xFF);
        assert!(!f.vref.ctrlb.is_set(VREF_CTRLB::AC0REFEN));

        f.ac.configure(&AcConfig::DEFAULT);
        f.ac.init().unwrap();
        assert_eq!(f.regs.muxctrla.get(), 0);
        assert!(!f.regs.ctrla.is_set(CTRLA::OUTEN));
        assert!(!f.ports.is_output(Port::A, 7));
    }

    #[test]
    fn dac_reference() {
        let f = fixture(&ATMEGA4809);
        f.ac.configure(&AcConfig {
            input_n: NegativeInput::DacRef,
            reference: Reference::V2_5,
            dacref: 0x40,
            ..AcConfig::DEFAULT
        });
        f.ac.init().unwrap();
        assert_eq!(f.regs.muxctrla.read(MUXCTRLA::MUXNEG), 3);
        assert_eq!(f.regs.dacref[0].get(), 0x40);
        assert_eq!(f.vref.ctrla.read(VREF_CTRLA::AC0REFSEL), 0x02);
        assert!(f.vref.ctrlb.is_set(VREF_CTRLB::AC0REFEN));
        // No negative pin is touched for DACREF.
        assert!(!f.ports.is_input_buffer_disabled(Port::D, 3));
    }

    #[test]
    fn dx_layout() {
        let f = fixture(&AVR128DA48);
        f.ac.configure(&AcConfig {
            dacref: 0x21,
            ..AcConfig::DEFAULT
        });
        f.ac.init().unwrap();
        assert_eq!(f.regs.dacref[1].get(), 0x21);
        assert_eq!(f.regs.dacref[0].get(), 0);

        f.ac.configure(&AcConfig {
            reference: Reference::V1_1,
            ..AcConfig::DEFAULT
        });
        assert_eq!(f.ac.init(), Err(ErrorCode::NOSUPPORT));

        let r = Recorder {
            fired: Cell::new(0),
        };
        f.ac.attach_interrupt(&r, InterruptMode::Falling).unwrap();
        assert_eq!(f.regs.intctrl.read(INTCTRL::INTMODE), INTMODE_NEGEDGE);
        assert_eq!(f.regs.ctrla.read(CTRLA::INTMODE), 0);
    }

    #[test]
    fn missing_pin_is_rejected() {
        let f = fixture(&AVR128DA28);
        f.ac.configure(&AcConfig {
            input_p: PositiveInput::In1,
            dacref: 0x10,
            ..AcConfig::DEFAULT
        });
        assert_eq!(f.ac.init(), Err(ErrorCode::INVAL));
        assert_eq!(f.regs.dacref[1].get(), 0);

        let g = AnalogComparator::new(
            2,
            fake_registers::<AcRegisters>(),
            fake_registers::<VrefRegisters>(),
            Ports::new(fake_registers::<PortBlock>()),
            &ATMEGA4809,
        );
        assert_eq!(g.init(), Err(ErrorCode::NODEVICE));
    }

    #[test]
    fn start_stop_and_read() {
        let f = fixture(&ATMEGA4809);
        f.ac.start(true);
        assert!(f.ac.is_running());
        f.ac.stop();
        assert!(!f.ac.is_running());

        assert!(!f.ac.read());
        f.regs.status.write(STATUS::STATE::SET);
        assert!(f.ac.read());
    }

    #[test]
    fn interrupt_dispatch() {
        let f = fixture(&ATMEGA4809);
        let r = Recorder {
            fired: Cell::new(0),
        };
        assert_eq!(
            f.ac.attach_interrupt(&r, InterruptMode::High),
            Err(ErrorCode::INVAL)
        );
        assert!(!f.ac.interrupt_enabled());

        f.ac.attach_interrupt(&r, InterruptMode::Rising).unwrap();
        assert!(f.ac.interrupt_enabled());
        assert_eq!(f.regs.ctrla.read(CTRLA::INTMODE), INTMODE_POSEDGE);

        f.ac.handle_interrupt();
        assert_eq!(r.fired.get(), 1);
        assert!(f.regs.status.is_set(STATUS::CMP));

        f.ac.detach_interrupt();
        assert!(!f.ac.interrupt_enabled());
        f.ac.handle_interrupt();
        assert_eq!(r.fired.get(), 1);
    }
}
