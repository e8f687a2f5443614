// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Configurable Custom Logic (CCL).
//!
//! The CCL has four (megaAVR-0, AVR-DA/DB 28/32-pin) or six (AVR-DA/DB 48/64
//! pin) lookup tables (LUTs). Each LUT computes a 3-input Boolean function
//! given by an 8-bit truth table: output bit `n` is the result for inputs
//! `IN2:IN1:IN0 == n`. Pairs of LUTs can feed a shared sequential element
//! (flip-flop or latch).
//!
//! The configuration of each block is held in memory as a `LogicConfig` and
//! only written to the LUT registers by `init`. `init` never changes the
//! stored configuration, so calling it twice commits the same thing twice.
//! The whole peripheral is switched on and off with `start`/`stop`.

use core::cell::Cell;

use tock_registers::fields::Field;
use tock_registers::interfaces::{Readable, Writeable};
use tock_registers::registers::ReadWrite;
use tock_registers::{register_bitfields, register_structs, LocalRegisterCopy};

use crate::debug::{debug, debug_warn};
use crate::errorcode::ErrorCode;
use crate::port::{InterruptMode, Ports};
use crate::portmux::PortMux;
use crate::utilities::StaticRef;
use crate::variant::{Variant, LUT_ALT_OUTPUT_BIT, LUT_OUTPUT_BIT};

pub const MAX_LUTS: usize = 6;

register_structs! {
    pub LutRegisters {
        (0x00 => ctrla: ReadWrite<u8, LUTCTRLA::Register>),
        (0x01 => ctrlb: ReadWrite<u8, LUTCTRLB::Register>),
        (0x02 => ctrlc: ReadWrite<u8, LUTCTRLC::Register>),
        (0x03 => truth: ReadWrite<u8>),
        (0x04 => @END),
    }
}

register_structs! {
    pub CclRegisters {
        (0x00 => ctrla: ReadWrite<u8, CTRLA::Register>),
        (0x01 => seqctrl: [ReadWrite<u8, SEQCTRL::Register>; 3]),
        (0x04 => _reserved0),
        (0x05 => intctrl: [ReadWrite<u8>; 2]),
        (0x07 => intflags: ReadWrite<u8>),
        (0x08 => lut: [LutRegisters; MAX_LUTS]),
        (0x20 => @END),
    }
}

register_bitfields![u8,
    CTRLA [
        ENABLE OFFSET(0) NUMBITS(1) [],
        RUNSTDBY OFFSET(6) NUMBITS(1) []
    ],
    SEQCTRL [
        SEQSEL OFFSET(0) NUMBITS(4) [
            Disable = 0,
            DFlipFlop = 1,
            JkFlipFlop = 2,
            DLatch = 3,
            RsLatch = 4
        ]
    ],
    LUTCTRLA [
        ENABLE OFFSET(0) NUMBITS(1) [],
        CLKSRC OFFSET(1) NUMBITS(3) [],
        FILTSEL OFFSET(4) NUMBITS(2) [],
        OUTEN OFFSET(6) NUMBITS(1) [],
        EDGEDET OFFSET(7) NUMBITS(1) []
    ],
    LUTCTRLB [
        INSEL0 OFFSET(0) NUMBITS(4) [],
        INSEL1 OFFSET(4) NUMBITS(4) []
    ],
    LUTCTRLC [
        INSEL2 OFFSET(0) NUMBITS(4) []
    ]
];

/// Source of one LUT input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Input {
    Masked,
    Feedback,
    /// Output of the next LUT.
    Link,
    EventA,
    EventB,
    /// The block's INn pin.
    Pin,
    /// The block's INn pin with the internal pull-up enabled.
    PinPullup,
    Ac,
    Zcd,
    Usart,
    Spi,
    Tca0,
    Tca1,
    Tcb,
    Tcd,
}

impl Input {
    /// INSELn code.
    pub const fn code(self) -> u8 {
        match self {
            Input::Masked => 0x00,
            Input::Feedback => 0x01,
            Input::Link => 0x02,
            Input::EventA => 0x03,
            Input::EventB => 0x04,
            Input::Pin | Input::PinPullup => 0x05,
            Input::Ac => 0x06,
            Input::Zcd => 0x07,
            Input::Usart => 0x08,
            Input::Spi => 0x09,
            Input::Tca0 => 0x0A,
            Input::Tca1 => 0x0B,
            Input::Tcb => 0x0C,
            Input::Tcd => 0x0D,
        }
    }

    pub const fn is_pin(self) -> bool {
        matches!(self, Input::Pin | Input::PinPullup)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Sequencer {
    Disable = 0,
    DFlipFlop = 1,
    JkFlipFlop = 2,
    DLatch = 3,
    RsLatch = 4,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Filter {
    Disable = 0,
    Synchronizer = 1,
    Filter = 2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ClockSource {
    /// Peripheral clock.
    Peripheral = 0,
    /// The block's IN2 input.
    In2 = 1,
    OscHf = 4,
    Osc32k = 5,
    Osc1k = 6,
}

/// Which of the block's two output pins is driven.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OutputPin {
    Primary,
    Alternate,
}

/// In-memory configuration of one logic block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LogicConfig {
    pub enable: bool,
    pub input0: Input,
    pub input1: Input,
    pub input2: Input,
    pub truth: u8,
    /// Only takes effect on even blocks, which own the shared sequencer.
    pub sequencer: Sequencer,
    pub output: bool,
    pub output_swap: OutputPin,
    pub filter: Filter,
    pub edge_detect: bool,
    pub clock_source: ClockSource,
}

impl LogicConfig {
    pub const DEFAULT: LogicConfig = LogicConfig {
        enable: false,
        input0: Input::Masked,
        input1: Input::Masked,
        input2: Input::Masked,
        truth: 0x00,
        sequencer: Sequencer::Disable,
        output: false,
        output_swap: OutputPin::Primary,
        filter: Filter::Disable,
        edge_detect: false,
        clock_source: ClockSource::Peripheral,
    };

    /// LUTnCTRLA value.
    pub fn ctrla(&self) -> u8 {
        let mut reg: LocalRegisterCopy<u8, LUTCTRLA::Register> = LocalRegisterCopy::new(0);
        reg.modify(LUTCTRLA::CLKSRC.val(self.clock_source as u8));
        reg.modify(LUTCTRLA::FILTSEL.val(self.filter as u8));
        if self.output {
            reg.modify(LUTCTRLA::OUTEN::SET);
        }
        if self.edge_detect {
            reg.modify(LUTCTRLA::EDGEDET::SET);
        }
        if self.enable {
            reg.modify(LUTCTRLA::ENABLE::SET);
        }
        reg.get()
    }

    /// LUTnCTRLB value, INSEL1:INSEL0.
    pub fn ctrlb(&self) -> u8 {
        let mut reg: LocalRegisterCopy<u8, LUTCTRLB::Register> = LocalRegisterCopy::new(0);
        reg.modify(LUTCTRLB::INSEL0.val(self.input0.code()) + LUTCTRLB::INSEL1.val(self.input1.code()));
        reg.get()
    }

    /// LUTnCTRLC value, INSEL2.
    pub fn ctrlc(&self) -> u8 {
        let mut reg: LocalRegisterCopy<u8, LUTCTRLC::Register> = LocalRegisterCopy::new(0);
        reg.modify(LUTCTRLC::INSEL2.val(self.input2.code()));
        reg.get()
    }
}

impl Default for LogicConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// INTMODE code for an interrupt mode. Only edge modes are supported.
fn intmode_code(mode: InterruptMode) -> Option<u8> {
    match mode {
        InterruptMode::Rising => Some(1),
        InterruptMode::Falling => Some(2),
        InterruptMode::Change => Some(3),
        InterruptMode::Low | InterruptMode::High => None,
    }
}

/// INTCTRL register index and INTMODE field for `block`.
///
/// Blocks 0-3 live in INTCTRL0 and blocks 4-5 in INTCTRL1.
fn intmode_field(block: usize) -> (usize, Field<u8, ()>) {
    let register = if block > 3 { 1 } else { 0 };
    (register, Field::new(0b11, (block & 0x03) * 2))
}

/// Return `intctrl` with `block`'s INTMODE field replaced by `code`.
fn with_intmode(intctrl: u8, block: usize, code: u8) -> u8 {
    let (_, field) = intmode_field(block);
    let mut reg: LocalRegisterCopy<u8, ()> = LocalRegisterCopy::new(intctrl);
    reg.modify(field.val(code));
    reg.get()
}

/// Receives logic block output-change interrupts.
pub trait Client {
    fn output_changed(&self, block: usize);
}

pub struct Ccl<'a> {
    registers: StaticRef<CclRegisters>,
    ports: Ports,
    portmux: PortMux,
    variant: &'static Variant,
    config: [Cell<LogicConfig>; MAX_LUTS],
    clients: [Cell<Option<&'a dyn Client>>; MAX_LUTS],
}

impl<'a> Ccl<'a> {
    pub const fn new(
        registers: StaticRef<CclRegisters>,
        ports: Ports,
        portmux: PortMux,
        variant: &'static Variant,
    ) -> Ccl<'a> {
        Ccl {
            registers,
            ports,
            portmux,
            variant,
            config: [
                Cell::new(LogicConfig::DEFAULT),
                Cell::new(LogicConfig::DEFAULT),
                Cell::new(LogicConfig::DEFAULT),
                Cell::new(LogicConfig::DEFAULT),
                Cell::new(LogicConfig::DEFAULT),
                Cell::new(LogicConfig::DEFAULT),
            ],
            clients: [
                Cell::new(None),
                Cell::new(None),
                Cell::new(None),
                Cell::new(None),
                Cell::new(None),
                Cell::new(None),
            ],
        }
    }

    pub fn block_count(&self) -> usize {
        self.variant.lut_count()
    }

    fn check_block(&self, block: usize) -> Result<(), ErrorCode> {
        if block < self.block_count() {
            Ok(())
        } else {
            Err(ErrorCode::INVAL)
        }
    }

    /// Replace the stored configuration of `block`. Nothing is written to
    /// the hardware until `init`.
    pub fn configure(&self, block: usize, config: &LogicConfig) -> Result<(), ErrorCode> {
        self.check_block(block)?;
        self.config[block].set(*config);
        Ok(())
    }

    pub fn config(&self, block: usize) -> Option<LogicConfig> {
        self.check_block(block).ok()?;
        Some(self.config[block].get())
    }

    /// Commit the stored configuration of `block` to the hardware.
    ///
    /// Writes the LUT control registers in order and LUTnCTRLA last, so the
    /// block is only enabled once everything else is in place.
    pub fn init(&self, block: usize) -> Result<(), ErrorCode> {
        self.check_block(block)?;
        let config = self.config[block].get();
        let pins = &self.variant.luts[block];
        let lut = &self.registers.lut[block];

        for (n, input) in [config.input0, config.input1, config.input2]
            .into_iter()
            .enumerate()
        {
            if input.is_pin() && pins.inputs & (1 << n) != 0 {
                self.ports.make_input(pins.port, n as u8);
                self.ports
                    .set_pullup(pins.port, n as u8, input == Input::PinPullup);
            }
        }

        lut.ctrlb.set(config.ctrlb());
        lut.ctrlc.set(config.ctrlc());
        lut.truth.set(config.truth);

        if block % 2 == 0 {
            self.registers.seqctrl[block / 2].write(SEQCTRL::SEQSEL.val(config.sequencer as u8));
        } else if config.sequencer != Sequencer::Disable {
            debug_warn!("ccl: sequencer setting on odd block {} ignored", block);
        }

        if config.output {
            match config.output_swap {
                OutputPin::Alternate if pins.alt_output => {
                    self.portmux.set_lut_alternate(block, true);
                    self.ports.make_output(pins.port, LUT_ALT_OUTPUT_BIT);
                }
                OutputPin::Primary if pins.output => {
                    self.portmux.set_lut_alternate(block, false);
                    self.ports.make_output(pins.port, LUT_OUTPUT_BIT);
                }
                _ => {}
            }
        }

        lut.ctrla.set(config.ctrla());
        debug!("ccl: block {} truth {:x}", block, config.truth);
        Ok(())
    }

    /// Enable or disable the whole peripheral.
    pub fn start(&self, state: bool) {
        if state {
            self.registers.ctrla.write(CTRLA::ENABLE::SET);
        } else {
            self.registers.ctrla.write(CTRLA::ENABLE::CLEAR);
        }
    }

    pub fn stop(&self) {
        self.start(false);
    }

    pub fn is_running(&self) -> bool {
        self.registers.ctrla.is_set(CTRLA::ENABLE)
    }

    /// Call `client` when the output of `block` changes as given by `mode`.
    ///
    /// Only `Rising`, `Falling` and `Change` are supported; any other mode
    /// leaves the block untouched.
    pub fn attach_interrupt(
        &self,
        block: usize,
        client: &'a dyn Client,
        mode: InterruptMode,
    ) -> Result<(), ErrorCode> {
        self.check_block(block)?;
        let code = intmode_code(mode).ok_or(ErrorCode::INVAL)?;
        let (index, _) = intmode_field(block);
        let intctrl = &self.registers.intctrl[index];
        critical_section::with(|_| intctrl.set(with_intmode(intctrl.get(), block, code)));
        self.clients[block].set(Some(client));
        Ok(())
    }

    pub fn detach_interrupt(&self, block: usize) {
        if self.check_block(block).is_err() {
            return;
        }
        let (index, _) = intmode_field(block);
        let intctrl = &self.registers.intctrl[index];
        critical_section::with(|_| intctrl.set(with_intmode(intctrl.get(), block, 0)));
        self.clients[block].set(None);
    }

    /// CCL interrupt handler.
    ///
    /// Every block whose flag is set is reported to its client, then only
    /// that flag is cleared.
    pub fn handle_interrupt(&self) {
        let flags = self.registers.intflags.get();
        for block in 0..self.block_count() {
            let mask = 1 << block;
            if flags & mask != 0 {
                if let Some(client) = self.clients[block].get() {
                    client.output_changed(block);
                }
                self.registers.intflags.set(mask);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pins::Port;
    use crate::port::PortBlock;
    use crate::portmux::PortMuxRegisters;
    use crate::utilities::fake_registers;
    use crate::variant::{ATMEGA4808, ATMEGA4809, AVR128DA48};

    struct Fixture<'a> {
        ccl: Ccl<'a>,
        ports: Ports,
        portmux: PortMux,
    }

    fn fixture<'a>(variant: &'static Variant) -> Fixture<'a> {
        let port_regs = fake_registers::<PortBlock>();
        let mux_regs = fake_registers::<PortMuxRegisters>();
        Fixture {
            ccl: Ccl::new(
                fake_registers(),
                Ports::new(port_regs),
                PortMux::new(mux_regs, variant.portmux),
                variant,
            ),
            ports: Ports::new(port_regs),
            portmux: PortMux::new(mux_regs, variant.portmux),
        }
    }

    struct Recorder {
        fired: Cell<u8>,
    }

    impl Client for Recorder {
        fn output_changed(&self, block: usize) {
            self.fired.set(self.fired.get() | 1 << block);
        }
    }

    #[test]
    fn comparator_pass_through_scenario() {
        let f = fixture(&ATMEGA4809);
        let config = LogicConfig {
            enable: true,
            input0: Input::Ac,
            input1: Input::Masked,
            input2: Input::Masked,
            truth: 0x02,
            output: true,
            ..LogicConfig::DEFAULT
        };
        f.ccl.configure(0, &config).unwrap();
        f.ccl.init(0).unwrap();

        let lut = &f.ccl.registers.lut[0];
        assert_eq!(lut.ctrlb.read(LUTCTRLB::INSEL0), 0x06);
        assert_eq!(lut.ctrlb.read(LUTCTRLB::INSEL1), 0x00);
        assert_eq!(lut.truth.get(), 0x02);
        assert!(lut.ctrla.is_set(LUTCTRLA::OUTEN));
        assert!(lut.ctrla.is_set(LUTCTRLA::ENABLE));
        assert!(f.ports.is_output(Port::A, 3));
        assert!(!f.portmux.lut_alternate(0));
    }

    #[test]
    fn truth_table_round_trip() {
        for variant in [&ATMEGA4809, &AVR128DA48] {
            let f = fixture(variant);
            for block in 0..variant.lut_count() {
                let truth = 0x5A ^ (block as u8 * 0x11);
                let config = LogicConfig {
                    truth,
                    ..LogicConfig::DEFAULT
                };
                f.ccl.configure(block, &config).unwrap();
                f.ccl.init(block).unwrap();
                assert_eq!(f.ccl.registers.lut[block].truth.get(), truth);
            }
        }
    }

    #[test]
    fn pullup_inputs_are_not_rewritten() {
        let f = fixture(&ATMEGA4809);
        f.ports.make_output(Port::C, 0);
        let config = LogicConfig {
            input0: Input::PinPullup,
            input2: Input::Pin,
            ..LogicConfig::DEFAULT
        };
        f.ccl.configure(1, &config).unwrap();
        f.ccl.init(1).unwrap();
        f.ccl.init(1).unwrap();

        assert_eq!(f.ccl.config(1), Some(config));
        assert!(!f.ports.is_output(Port::C, 0));
        assert!(f.ports.has_pullup(Port::C, 0));
        assert!(!f.ports.has_pullup(Port::C, 2));
        assert_eq!(f.ccl.registers.lut[1].ctrlb.read(LUTCTRLB::INSEL0), 0x05);
        assert_eq!(f.ccl.registers.lut[1].ctrlc.read(LUTCTRLC::INSEL2), 0x05);

        let config = LogicConfig {
            input0: Input::Pin,
            ..config
        };
        f.ccl.configure(1, &config).unwrap();
        f.ccl.init(1).unwrap();
        assert!(!f.ports.has_pullup(Port::C, 0));
    }

    #[test]
    fn only_even_blocks_write_the_sequencer() {
        let f = fixture(&AVR128DA48);
        let config = LogicConfig {
            sequencer: Sequencer::JkFlipFlop,
            ..LogicConfig::DEFAULT
        };
        f.ccl.configure(3, &config).unwrap();
        f.ccl.init(3).unwrap();
        assert_eq!(f.ccl.registers.seqctrl[1].get(), 0);

        f.ccl.configure(4, &config).unwrap();
        f.ccl.init(4).unwrap();
        assert_eq!(f.ccl.registers.seqctrl[2].get(), 2);
    }

    #[test]
    fn alternate_output_pin() {
        let f = fixture(&ATMEGA4809);
        let config = LogicConfig {
            output: true,
            output_swap: OutputPin::Alternate,
            ..LogicConfig::DEFAULT
        };
        f.ccl.configure(2, &config).unwrap();
        f.ccl.init(2).unwrap();
        assert!(f.portmux.lut_alternate(2));
        assert!(f.ports.is_output(Port::D, 6));
        assert!(!f.ports.is_output(Port::D, 3));

        // LUT1 on the 32-pin part has no alternate output pin.
        let f = fixture(&ATMEGA4808);
        f.ccl.configure(1, &config).unwrap();
        f.ccl.init(1).unwrap();
        assert!(!f.portmux.lut_alternate(1));
        assert!(!f.ports.is_output(Port::C, 6));
        assert!(f.ccl.registers.lut[1].ctrla.is_set(LUTCTRLA::OUTEN));
    }

    #[test]
    fn ctrla_packing() {
        let config = LogicConfig {
            enable: true,
            filter: Filter::Filter,
            edge_detect: true,
            clock_source: ClockSource::In2,
            ..LogicConfig::DEFAULT
        };
        assert_eq!(config.ctrla(), 0b1010_0011);
        let config = LogicConfig {
            output: true,
            filter: Filter::Synchronizer,
            ..LogicConfig::DEFAULT
        };
        assert_eq!(config.ctrla(), 0b0101_0000);
        let config = LogicConfig {
            input0: Input::EventA,
            input1: Input::Tcb,
            input2: Input::Feedback,
            ..LogicConfig::DEFAULT
        };
        assert_eq!(config.ctrlb(), 0xC3);
        assert_eq!(config.ctrlc(), 0x01);
    }

    #[test]
    fn interrupt_modes_per_block() {
        let recorder = Recorder {
            fired: Cell::new(0),
        };
        let f = fixture(&AVR128DA48);
        f.ccl
            .attach_interrupt(1, &recorder, InterruptMode::Rising)
            .unwrap();
        f.ccl
            .attach_interrupt(3, &recorder, InterruptMode::Change)
            .unwrap();
        f.ccl
            .attach_interrupt(5, &recorder, InterruptMode::Falling)
            .unwrap();
        assert_eq!(f.ccl.registers.intctrl[0].get(), 0b1100_0100);
        assert_eq!(f.ccl.registers.intctrl[1].get(), 0b0000_1000);

        assert_eq!(
            f.ccl.attach_interrupt(0, &recorder, InterruptMode::Low),
            Err(ErrorCode::INVAL)
        );
        assert_eq!(f.ccl.registers.intctrl[0].get(), 0b1100_0100);

        f.ccl.detach_interrupt(5);
        f.ccl.detach_interrupt(1);
        assert_eq!(f.ccl.registers.intctrl[0].get(), 0b1100_0000);
        assert_eq!(f.ccl.registers.intctrl[1].get(), 0);
    }

    #[test]
    fn interrupt_dispatch() {
        let recorder = Recorder {
            fired: Cell::new(0),
        };
        let f = fixture(&ATMEGA4809);
        f.ccl
            .attach_interrupt(0, &recorder, InterruptMode::Rising)
            .unwrap();
        f.ccl
            .attach_interrupt(2, &recorder, InterruptMode::Rising)
            .unwrap();
        f.ccl.registers.intflags.set(0b0000_0101);
        f.ccl.handle_interrupt();
        assert_eq!(recorder.fired.get(), 0b0101);
        // Flags are cleared one bit at a time.
        assert_eq!(f.ccl.registers.intflags.get(), 0b0100);

        f.ccl.detach_interrupt(2);
        recorder.fired.set(0);
        f.ccl.registers.intflags.set(0b0000_0100);
        f.ccl.handle_interrupt();
        assert_eq!(recorder.fired.get(), 0);
    }

    #[test]
    fn global_enable_and_bounds() {
        let f = fixture(&ATMEGA4809);
        f.ccl.start(true);
        assert!(f.ccl.is_running());
        f.ccl.stop();
        assert!(!f.ccl.is_running());
        assert_eq!(f.ccl.init(4), Err(ErrorCode::INVAL));
        assert_eq!(f.ccl.configure(6, &LogicConfig::DEFAULT), Err(ErrorCode::INVAL));
        assert_eq!(f.ccl.config(4), None);
    }
}
