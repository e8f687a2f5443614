// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Event system (EVSYS).
//!
//! The event system routes a signal from one peripheral (the generator) to
//! any number of other peripherals (the users) without involving the CPU.
//! Signals travel over a small pool of channels:
//!
//! ```text
//!  generator --> CHANNELn --+--> USER register (holds n + 1)
//!                           +--> USER register (holds n + 1)
//! ```
//!
//! Each channel selects exactly one generator. Each user register selects at
//! most one channel, or none when it holds zero. Channels are not symmetric:
//! pin generators are only visible on the channels wired to that port, and the
//! RTC divider generators differ between even and odd channels.
//!
//! The driver keeps one `Channel` record per hardware channel holding the
//! generator it has been given. The generator is only written to hardware by
//! `start`. Allocation helpers search the records and hand back a `&Channel`;
//! when no channel fits they hand back the empty channel, number 255, on which
//! every operation is a no-op.
//!
//! Usage
//! -----
//!
//! ```rust,ignore
//! let ch = evsys.assign_generator_pin(Port::A, 2);
//! evsys.set_user(ch.number(), user::mega0::CCL0_EVENT_A);
//! evsys.start(ch.number(), true);
//! ```

use core::cell::Cell;

use tock_registers::interfaces::{Readable, Writeable};
use tock_registers::registers::ReadWrite;
use tock_registers::register_structs;

use crate::debug::{debug, debug_warn, trace};
use crate::errorcode::ErrorCode;
use crate::pins::{PinTable, Port};
use crate::portmux::PortMux;
use crate::utilities::StaticRef;
use crate::variant::Variant;

register_structs! {
    pub EvsysRegisters {
        /// STROBE on megaAVR-0, SWEVENTA/SWEVENTB on AVR-Dx.
        (0x00 => swevent: [ReadWrite<u8>; 2]),
        (0x02 => _reserved0),
        (0x10 => channel: [ReadWrite<u8>; 16]),
        (0x20 => user: [ReadWrite<u8>; 64]),
        (0x60 => @END),
    }
}

/// Largest channel count of any supported chip.
pub const MAX_CHANNELS: usize = 10;

/// Number of the channel returned when allocation fails.
pub const EMPTY_CHANNEL: u8 = 255;

/// An event generator selector, as written to a CHANNELn register.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Generator(pub u8);

impl Generator {
    pub const DISABLE: Generator = Generator(0x00);
    pub const UPDI_SYNCH: Generator = Generator(0x01);
    pub const RTC_OVF: Generator = Generator(0x06);
    pub const RTC_CMP: Generator = Generator(0x07);
    pub const CCL0_OUT: Generator = Generator(0x10);
    pub const CCL1_OUT: Generator = Generator(0x11);
    pub const CCL2_OUT: Generator = Generator(0x12);
    pub const CCL3_OUT: Generator = Generator(0x13);
    pub const AC0_OUT: Generator = Generator(0x20);
    pub const ADC0_READY: Generator = Generator(0x24);
    pub const USART0_XCK: Generator = Generator(0x60);
    pub const USART1_XCK: Generator = Generator(0x61);
    pub const USART2_XCK: Generator = Generator(0x62);
    pub const USART3_XCK: Generator = Generator(0x63);
    pub const SPI0_SCK: Generator = Generator(0x68);
    pub const TCA0_OVF_LUNF: Generator = Generator(0x80);
    pub const TCA0_HUNF: Generator = Generator(0x81);
    pub const TCA0_CMP0: Generator = Generator(0x84);
    pub const TCA0_CMP1: Generator = Generator(0x85);
    pub const TCA0_CMP2: Generator = Generator(0x86);
    pub const TCB0_CAPT: Generator = Generator(0xA0);
    pub const TCB1_CAPT: Generator = Generator(0xA2);
    pub const TCB2_CAPT: Generator = Generator(0xA4);
    pub const TCB3_CAPT: Generator = Generator(0xA6);

    // AVR-Dx only.
    pub const CCL4_OUT: Generator = Generator(0x14);
    pub const CCL5_OUT: Generator = Generator(0x15);
    pub const AC1_OUT: Generator = Generator(0x21);
    pub const AC2_OUT: Generator = Generator(0x22);
    pub const ZCD0_OUT: Generator = Generator(0x30);
    pub const ZCD1_OUT: Generator = Generator(0x31);
    pub const ZCD2_OUT: Generator = Generator(0x32);
    pub const USART4_XCK: Generator = Generator(0x64);
    pub const USART5_XCK: Generator = Generator(0x65);
    pub const SPI1_SCK: Generator = Generator(0x69);
    pub const TCA1_OVF_LUNF: Generator = Generator(0x88);
    pub const TCA1_HUNF: Generator = Generator(0x89);
    pub const TCA1_CMP0: Generator = Generator(0x8C);
    pub const TCA1_CMP1: Generator = Generator(0x8D);
    pub const TCA1_CMP2: Generator = Generator(0x8E);
    pub const TCB0_OVF: Generator = Generator(0xA1);
    pub const TCB1_OVF: Generator = Generator(0xA3);
    pub const TCB2_OVF: Generator = Generator(0xA5);
    pub const TCB3_OVF: Generator = Generator(0xA7);
    pub const TCB4_CAPT: Generator = Generator(0xA8);
    pub const TCB4_OVF: Generator = Generator(0xA9);
    pub const TCD0_CMPBCLR: Generator = Generator(0xB0);
    pub const TCD0_CMPASET: Generator = Generator(0xB1);
    pub const TCD0_CMPBSET: Generator = Generator(0xB2);
    pub const TCD0_PROGEV: Generator = Generator(0xB3);

    // AVR-DB only.
    pub const MVIO_OK: Generator = Generator(0x05);
    pub const OPAMP0_READY: Generator = Generator(0x34);
    pub const OPAMP1_READY: Generator = Generator(0x35);
    pub const OPAMP2_READY: Generator = Generator(0x36);

    // RTC prescaler taps. The same codes select different taps on even and
    // odd channels.
    pub const RTC_DIV8192: Generator = Generator(0x08);
    pub const RTC_DIV4096: Generator = Generator(0x09);
    pub const RTC_DIV2048: Generator = Generator(0x0A);
    pub const RTC_DIV1024: Generator = Generator(0x0B);
    pub const RTC_DIV512: Generator = Generator(0x08);
    pub const RTC_DIV256: Generator = Generator(0x09);
    pub const RTC_DIV128: Generator = Generator(0x0A);
    pub const RTC_DIV64: Generator = Generator(0x0B);

    /// Pin generator for `port`/`bit`.
    ///
    /// Each channel pair sees two ports; bit 3 of the code picks the odd port
    /// of the pair.
    pub const fn pin(port: Port, bit: u8) -> Generator {
        Generator(0x40 | ((port as u8) & 0x01) << 3 | (bit & 0x07))
    }

    pub const fn code(self) -> u8 {
        self.0
    }

    pub const fn is_disabled(self) -> bool {
        self.0 == 0
    }
}

/// An event user, identifying one USER register.
///
/// Codes with bit 7 set are EVOUT users whose output is moved to the port-mux
/// alternate pin.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct User(pub u8);

impl User {
    const ALTERNATE: u8 = 0x80;

    pub const fn code(self) -> u8 {
        self.0
    }

    /// Index of the USER register.
    pub const fn register(self) -> usize {
        (self.0 & !Self::ALTERNATE) as usize
    }

    pub const fn is_alternate_pin(self) -> bool {
        self.0 & Self::ALTERNATE != 0
    }

    const fn alternate(self) -> User {
        User(self.0 | Self::ALTERNATE)
    }
}

/// User catalogues, one per family.
pub mod user {
    /// megaAVR-0.
    pub mod mega0 {
        use super::super::User;

        pub const CCL0_EVENT_A: User = User(0x00);
        pub const CCL0_EVENT_B: User = User(0x01);
        pub const CCL1_EVENT_A: User = User(0x02);
        pub const CCL1_EVENT_B: User = User(0x03);
        pub const CCL2_EVENT_A: User = User(0x04);
        pub const CCL2_EVENT_B: User = User(0x05);
        pub const CCL3_EVENT_A: User = User(0x06);
        pub const CCL3_EVENT_B: User = User(0x07);
        pub const ADC0_START: User = User(0x08);
        pub const EVOUTA_PIN_PA2: User = User(0x09);
        pub const EVOUTB_PIN_PB2: User = User(0x0A);
        pub const EVOUTC_PIN_PC2: User = User(0x0B);
        pub const EVOUTD_PIN_PD2: User = User(0x0C);
        pub const EVOUTE_PIN_PE2: User = User(0x0D);
        pub const EVOUTF_PIN_PF2: User = User(0x0E);
        pub const USART0_IRDA: User = User(0x0F);
        pub const USART1_IRDA: User = User(0x10);
        pub const USART2_IRDA: User = User(0x11);
        pub const USART3_IRDA: User = User(0x12);
        pub const TCA0: User = User(0x13);
        pub const TCB0: User = User(0x14);
        pub const TCB1: User = User(0x15);
        pub const TCB2: User = User(0x16);
        pub const TCB3: User = User(0x17);
        pub const EVOUTA_PIN_PA7: User = User(0x89);
        pub const EVOUTC_PIN_PC7: User = User(0x8B);
        pub const EVOUTD_PIN_PD7: User = User(0x8C);
    }

    /// AVR-DA.
    pub mod da {
        use super::super::User;

        pub const CCL0_EVENT_A: User = User(0x00);
        pub const CCL0_EVENT_B: User = User(0x01);
        pub const CCL1_EVENT_A: User = User(0x02);
        pub const CCL1_EVENT_B: User = User(0x03);
        pub const CCL2_EVENT_A: User = User(0x04);
        pub const CCL2_EVENT_B: User = User(0x05);
        pub const CCL3_EVENT_A: User = User(0x06);
        pub const CCL3_EVENT_B: User = User(0x07);
        pub const CCL4_EVENT_A: User = User(0x08);
        pub const CCL4_EVENT_B: User = User(0x09);
        pub const CCL5_EVENT_A: User = User(0x0A);
        pub const CCL5_EVENT_B: User = User(0x0B);
        pub const ADC0_START: User = User(0x0C);
        pub const PTC_START: User = User(0x0D);
        pub const EVOUTA_PIN_PA2: User = User(0x0E);
        pub const EVOUTB_PIN_PB2: User = User(0x0F);
        pub const EVOUTC_PIN_PC2: User = User(0x10);
        pub const EVOUTD_PIN_PD2: User = User(0x11);
        pub const EVOUTE_PIN_PE2: User = User(0x12);
        pub const EVOUTF_PIN_PF2: User = User(0x13);
        pub const EVOUTG_PIN_PG2: User = User(0x14);
        pub const USART0_IRDA: User = User(0x15);
        pub const USART1_IRDA: User = User(0x16);
        pub const USART2_IRDA: User = User(0x17);
        pub const USART3_IRDA: User = User(0x18);
        pub const USART4_IRDA: User = User(0x19);
        pub const USART5_IRDA: User = User(0x1A);
        pub const TCA0_CNTA: User = User(0x1B);
        pub const TCA0_CNTB: User = User(0x1C);
        pub const TCA1_CNTA: User = User(0x1D);
        pub const TCA1_CNTB: User = User(0x1E);
        pub const TCB0_CAPT: User = User(0x1F);
        pub const TCB0_CNT: User = User(0x20);
        pub const TCB1_CAPT: User = User(0x21);
        pub const TCB1_CNT: User = User(0x22);
        pub const TCB2_CAPT: User = User(0x23);
        pub const TCB2_CNT: User = User(0x24);
        pub const TCB3_CAPT: User = User(0x25);
        pub const TCB3_CNT: User = User(0x26);
        pub const TCB4_CAPT: User = User(0x27);
        pub const TCB4_CNT: User = User(0x28);
        pub const TCD0_IN_A: User = User(0x29);
        pub const TCD0_IN_B: User = User(0x2A);
        pub const EVOUTA_PIN_PA7: User = User(0x8E);
        pub const EVOUTB_PIN_PB7: User = User(0x8F);
        pub const EVOUTC_PIN_PC7: User = User(0x90);
        pub const EVOUTD_PIN_PD7: User = User(0x91);
        pub const EVOUTE_PIN_PE7: User = User(0x92);
        pub const EVOUTG_PIN_PG7: User = User(0x94);
    }

    /// AVR-DB.
    pub mod db {
        use super::super::User;

        pub const CCL0_EVENT_A: User = User(0x00);
        pub const CCL0_EVENT_B: User = User(0x01);
        pub const CCL1_EVENT_A: User = User(0x02);
        pub const CCL1_EVENT_B: User = User(0x03);
        pub const CCL2_EVENT_A: User = User(0x04);
        pub const CCL2_EVENT_B: User = User(0x05);
        pub const CCL3_EVENT_A: User = User(0x06);
        pub const CCL3_EVENT_B: User = User(0x07);
        pub const CCL4_EVENT_A: User = User(0x08);
        pub const CCL4_EVENT_B: User = User(0x09);
        pub const CCL5_EVENT_A: User = User(0x0A);
        pub const CCL5_EVENT_B: User = User(0x0B);
        pub const ADC0_START: User = User(0x0C);
        pub const EVOUTA_PIN_PA2: User = User(0x0D);
        pub const EVOUTB_PIN_PB2: User = User(0x0E);
        pub const EVOUTC_PIN_PC2: User = User(0x0F);
        pub const EVOUTD_PIN_PD2: User = User(0x10);
        pub const EVOUTE_PIN_PE2: User = User(0x11);
        pub const EVOUTF_PIN_PF2: User = User(0x12);
        pub const EVOUTG_PIN_PG2: User = User(0x13);
        pub const USART0_IRDA: User = User(0x14);
        pub const USART1_IRDA: User = User(0x15);
        pub const USART2_IRDA: User = User(0x16);
        pub const USART3_IRDA: User = User(0x17);
        pub const USART4_IRDA: User = User(0x18);
        pub const USART5_IRDA: User = User(0x19);
        pub const TCA0_CNTA: User = User(0x1A);
        pub const TCA0_CNTB: User = User(0x1B);
        pub const TCA1_CNTA: User = User(0x1C);
        pub const TCA1_CNTB: User = User(0x1D);
        pub const TCB0_CAPT: User = User(0x1E);
        pub const TCB0_CNT: User = User(0x1F);
        pub const TCB1_CAPT: User = User(0x20);
        pub const TCB1_CNT: User = User(0x21);
        pub const TCB2_CAPT: User = User(0x22);
        pub const TCB2_CNT: User = User(0x23);
        pub const TCB3_CAPT: User = User(0x24);
        pub const TCB3_CNT: User = User(0x25);
        pub const TCB4_CAPT: User = User(0x26);
        pub const TCB4_CNT: User = User(0x27);
        pub const TCD0_IN_A: User = User(0x28);
        pub const TCD0_IN_B: User = User(0x29);
        pub const OPAMP0_ENABLE: User = User(0x2A);
        pub const OPAMP0_DISABLE: User = User(0x2B);
        pub const OPAMP0_DUMP: User = User(0x2C);
        pub const OPAMP0_DRIVE: User = User(0x2D);
        pub const OPAMP1_ENABLE: User = User(0x2E);
        pub const OPAMP1_DISABLE: User = User(0x2F);
        pub const OPAMP1_DUMP: User = User(0x30);
        pub const OPAMP1_DRIVE: User = User(0x31);
        pub const OPAMP2_ENABLE: User = User(0x32);
        pub const OPAMP2_DISABLE: User = User(0x33);
        pub const OPAMP2_DUMP: User = User(0x34);
        pub const OPAMP2_DRIVE: User = User(0x35);
        pub const EVOUTA_PIN_PA7: User = User(0x8D);
        pub const EVOUTB_PIN_PB7: User = User(0x8E);
        pub const EVOUTC_PIN_PC7: User = User(0x8F);
        pub const EVOUTD_PIN_PD7: User = User(0x90);
        pub const EVOUTE_PIN_PE7: User = User(0x91);
        pub const EVOUTF_PIN_PF7: User = User(0x92);
        pub const EVOUTG_PIN_PG7: User = User(0x93);
    }
}

/// One event channel and the generator it has been given.
pub struct Channel {
    number: u8,
    generator: Cell<Generator>,
}

impl Channel {
    const fn new(number: u8) -> Channel {
        Channel {
            number,
            generator: Cell::new(Generator::DISABLE),
        }
    }

    pub fn number(&self) -> u8 {
        self.number
    }

    pub fn generator(&self) -> Generator {
        self.generator.get()
    }

    /// Store a generator. Nothing reaches the hardware until `Evsys::start`.
    pub fn set_generator(&self, generator: Generator) {
        if !self.is_empty() {
            self.generator.set(generator);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.number == EMPTY_CHANNEL
    }
}

/// Number of strobe writes `long_soft_event` issues for a requested length.
///
/// Only a handful of lengths can be produced; a request is rounded down to
/// the nearest one, and never below two.
pub const fn soft_event_writes(length: u8) -> u8 {
    match length {
        0..=3 => 2,
        4..=5 => 4,
        6..=9 => 6,
        10..=15 => 10,
        _ => 16,
    }
}

#[inline(always)]
fn strobe_pair(strobe: &mut impl FnMut()) {
    strobe();
    strobe();
}

/// Issue `writes` strobes with nothing in between.
///
/// The writes are unrolled so the event stays asserted for the whole run
/// instead of pulsing once per loop iteration.
#[inline(always)]
fn strobe_burst(writes: u8, mut strobe: impl FnMut()) {
    let s = &mut strobe;
    match writes {
        0..=3 => {
            strobe_pair(s);
        }
        4..=5 => {
            strobe_pair(s);
            strobe_pair(s);
        }
        6..=9 => {
            strobe_pair(s);
            strobe_pair(s);
            strobe_pair(s);
        }
        10..=15 => {
            strobe_pair(s);
            strobe_pair(s);
            strobe_pair(s);
            strobe_pair(s);
            strobe_pair(s);
        }
        _ => {
            strobe_pair(s);
            strobe_pair(s);
            strobe_pair(s);
            strobe_pair(s);
            strobe_pair(s);
            strobe_pair(s);
            strobe_pair(s);
            strobe_pair(s);
        }
    }
}

pub struct Evsys {
    registers: StaticRef<EvsysRegisters>,
    portmux: PortMux,
    variant: &'static Variant,
    channels: [Channel; MAX_CHANNELS],
    empty: Channel,
}

impl Evsys {
    pub const fn new(
        registers: StaticRef<EvsysRegisters>,
        portmux: PortMux,
        variant: &'static Variant,
    ) -> Evsys {
        Evsys {
            registers,
            portmux,
            variant,
            channels: [
                Channel::new(0),
                Channel::new(1),
                Channel::new(2),
                Channel::new(3),
                Channel::new(4),
                Channel::new(5),
                Channel::new(6),
                Channel::new(7),
                Channel::new(8),
                Channel::new(9),
            ],
            empty: Channel::new(EMPTY_CHANNEL),
        }
    }

    fn present(&self) -> &[Channel] {
        &self.channels[..self.channel_count() as usize]
    }

    /// The empty channel returned by failed lookups.
    pub fn empty(&self) -> &Channel {
        &self.empty
    }

    /// The channel numbered `number`, or the empty channel.
    pub fn channel(&self, number: u8) -> &Channel {
        self.present()
            .get(number as usize)
            .unwrap_or(&self.empty)
    }

    pub fn channel_count(&self) -> u8 {
        self.variant.event_channels
    }

    /// The first channel holding `generator`, or the empty channel.
    pub fn generator_channel(&self, generator: Generator) -> &Channel {
        self.present()
            .iter()
            .find(|c| c.generator() == generator)
            .unwrap_or(&self.empty)
    }

    pub fn set_generator(&self, ch: u8, generator: Generator) {
        self.channel(ch).set_generator(generator);
    }

    /// Use the pin `pin` as the generator of channel `ch`.
    ///
    /// An unknown pin disables the channel's generator instead. The caller is
    /// responsible for choosing a channel that can see the pin's port.
    pub fn set_generator_pin(&self, ch: u8, pin: u8, pins: &PinTable) {
        let generator = match (pins.port(pin), pins.bit_position(pin)) {
            (Some(port), Some(bit)) => Generator::pin(port, bit),
            _ => Generator::DISABLE,
        };
        self.set_generator(ch, generator);
    }

    /// Pick a channel for the pin generator `port`/`bit`.
    ///
    /// Candidates are the channels wired to `port`, lowest first. A channel is
    /// taken if it is free or already carries this pin, so repeating the call
    /// returns the same channel.
    pub fn assign_generator_pin(&self, port: Port, bit: u8) -> &Channel {
        if bit > 7 {
            return &self.empty;
        }
        let generator = Generator::pin(port, bit);
        for &n in self.variant.pin_channels[port.index()] {
            let channel = self.channel(n);
            if channel.is_empty() {
                continue;
            }
            let current = channel.generator();
            if current.is_disabled() || current == generator {
                channel.set_generator(generator);
                trace!("evsys: pin {} of port {} on channel {}", bit, port.index(), n);
                return channel;
            }
        }
        debug_warn!("evsys: no channel for pin {} of port {}", bit, port.index());
        &self.empty
    }

    pub fn assign_generator_pin_number(&self, pin: u8, pins: &PinTable) -> &Channel {
        match (pins.port(pin), pins.bit_position(pin)) {
            (Some(port), Some(bit)) => self.assign_generator_pin(port, bit),
            _ => &self.empty,
        }
    }

    /// Pick a channel for a peripheral generator. AVR-Dx only.
    ///
    /// A channel already carrying `generator` is shared. Otherwise the highest
    /// numbered free channel is taken, leaving the low channels, which are
    /// the only ones that can see pins, for pin generators.
    pub fn assign_generator(&self, generator: Generator) -> &Channel {
        if !self.variant.has_generator_allocator() || generator.is_disabled() {
            return &self.empty;
        }
        let shared = self.generator_channel(generator);
        if !shared.is_empty() {
            trace!("evsys: generator {:x} shares channel {}", generator.0, shared.number);
            return shared;
        }
        match self
            .present()
            .iter()
            .rev()
            .find(|c| c.generator().is_disabled())
        {
            Some(channel) => {
                channel.set_generator(generator);
                trace!("evsys: generator {:x} on channel {}", generator.0, channel.number);
                channel
            }
            None => {
                debug_warn!("evsys: no channel for generator {:x}", generator.0);
                &self.empty
            }
        }
    }

    fn user_register(&self, user: User) -> Option<&ReadWrite<u8>> {
        if user.register() < self.variant.event_users as usize {
            self.registers.user.get(user.register())
        } else {
            None
        }
    }

    /// EVOUT index of an alternate-pin user.
    fn evout_index(&self, user: User) -> Option<u8> {
        if !user.is_alternate_pin() {
            return None;
        }
        (user.register() as u8)
            .checked_sub(self.variant.evout_base)
            .filter(|&i| i < 7)
    }

    /// Connect `user` to channel `ch`.
    ///
    /// Any number of users may listen to the same channel. An alternate-pin
    /// EVOUT user also moves the EVOUT to its alternate pin.
    pub fn set_user(&self, ch: u8, user: User) {
        let channel = self.channel(ch);
        if channel.is_empty() {
            debug_warn!("evsys: user {:x} on missing channel {}", user.0, ch);
            return;
        }
        let Some(reg) = self.user_register(user) else {
            return;
        };
        reg.set(channel.number + 1);
        if let Some(evout) = self.evout_index(user) {
            self.portmux.set_evout_alternate(evout, true);
        }
        debug!("evsys: user {:x} -> channel {}", user.0, channel.number);
    }

    /// Disconnect `user` from whatever channel it listens to.
    pub fn clear_user(&self, user: User) {
        let Some(reg) = self.user_register(user) else {
            return;
        };
        reg.set(0);
        if let Some(evout) = self.evout_index(user) {
            self.portmux.set_evout_alternate(evout, false);
        }
    }

    /// Route channel `ch` to the EVOUT on `pin`.
    ///
    /// Pin 2 of a port is the default EVOUT pin and pin 7 the port-mux
    /// alternate, where the package has them.
    pub fn set_user_pin(&self, ch: u8, pin: u8, pins: &PinTable) -> Result<User, ErrorCode> {
        if self.channel(ch).is_empty() {
            return Err(ErrorCode::INVAL);
        }
        let (port, bit) = match (pins.port(pin), pins.bit_position(pin)) {
            (Some(port), Some(bit)) => (port, bit),
            _ => return Err(ErrorCode::INVAL),
        };
        let evout = User(self.variant.evout_base + port as u8);
        let user = match bit {
            2 if self.variant.has_evout(port) => evout,
            7 if self.variant.has_alt_evout(port) => evout.alternate(),
            _ => return Err(ErrorCode::INVAL),
        };
        self.set_user(ch, user);
        Ok(user)
    }

    /// The channel number `user` listens to, `None` if disconnected.
    pub fn user_channel_number(&self, user: User) -> Option<u8> {
        let reg = self.user_register(user)?;
        reg.get().checked_sub(1)
    }

    /// The channel `user` listens to, or the empty channel.
    pub fn user_channel(&self, user: User) -> &Channel {
        match self.user_channel_number(user) {
            Some(n) => self.channel(n),
            None => &self.empty,
        }
    }

    /// Trigger a one-cycle software event on channel `ch`.
    pub fn soft_event(&self, ch: u8) {
        let channel = self.channel(ch);
        if channel.is_empty() {
            return;
        }
        let n = channel.number as usize;
        self.registers.swevent[n / 8].set(1 << (n % 8));
    }

    /// Trigger a software event lasting several cycles on channel `ch`.
    ///
    /// The strobe is written back to back with interrupts disabled, giving an
    /// event of 2, 4, 6, 10 or 16 cycles. Other lengths round down.
    pub fn long_soft_event(&self, ch: u8, length: u8) {
        let channel = self.channel(ch);
        if channel.is_empty() {
            return;
        }
        let n = channel.number as usize;
        let strobe = &self.registers.swevent[n / 8];
        let mask = 1 << (n % 8);
        let writes = soft_event_writes(length);
        critical_section::with(|_| strobe_burst(writes, || strobe.set(mask)));
    }

    /// Write the stored generator to channel `ch`, or disable the channel.
    pub fn start(&self, ch: u8, state: bool) {
        let channel = self.channel(ch);
        if channel.is_empty() {
            return;
        }
        let generator = if state {
            channel.generator()
        } else {
            Generator::DISABLE
        };
        self.registers.channel[channel.number as usize].set(generator.0);
    }

    pub fn stop(&self, ch: u8) {
        self.start(ch, false);
    }

    /// Generator currently written to channel `ch`.
    pub fn active_generator(&self, ch: u8) -> Generator {
        let channel = self.channel(ch);
        if channel.is_empty() {
            return Generator::DISABLE;
        }
        Generator(self.registers.channel[channel.number as usize].get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pins::ATMEGA4809_48PIN;
    use crate::portmux::PortMuxRegisters;
    use crate::utilities::fake_registers;
    use crate::variant::{AVR128DA28, AVR128DA48, ATMEGA4809};

    fn evsys(variant: &'static Variant) -> (Evsys, PortMux) {
        let mux_regs = fake_registers::<PortMuxRegisters>();
        let evsys = Evsys::new(
            fake_registers(),
            PortMux::new(mux_regs, variant.portmux),
            variant,
        );
        (evsys, PortMux::new(mux_regs, variant.portmux))
    }

    #[test]
    fn pin_generator_code() {
        assert_eq!(Generator::pin(Port::A, 2), Generator(0x42));
        assert_eq!(Generator::pin(Port::B, 2), Generator(0x4A));
        assert_eq!(Generator::pin(Port::F, 6), Generator(0x4E));
    }

    #[test]
    fn assign_generator_pin_is_idempotent() {
        let ports = [Port::A, Port::B, Port::C, Port::D, Port::E, Port::F];
        for port in ports {
            for bit in 0..8 {
                let (evsys, _) = evsys(&ATMEGA4809);
                let first = evsys.assign_generator_pin(port, bit);
                assert!(!first.is_empty());
                assert_eq!(first.generator(), Generator::pin(port, bit));
                let again = evsys.assign_generator_pin(port, bit);
                assert_eq!(again.number(), first.number());
                assert_eq!(evsys.channel(first.number() + 1).generator(), Generator::DISABLE);
            }
        }
    }

    #[test]
    fn pin_channels_follow_port_groups() {
        let (evsys, _) = evsys(&ATMEGA4809);
        assert_eq!(evsys.assign_generator_pin(Port::A, 0).number(), 0);
        assert_eq!(evsys.assign_generator_pin(Port::B, 0).number(), 1);
        assert_eq!(evsys.assign_generator_pin(Port::D, 5).number(), 2);
        assert_eq!(evsys.assign_generator_pin(Port::F, 5).number(), 4);
        // No port G on this chip.
        assert!(evsys.assign_generator_pin(Port::G, 0).is_empty());
        assert!(evsys.assign_generator_pin(Port::A, 8).is_empty());
    }

    #[test]
    fn exhausted_pin_channels_give_the_empty_channel() {
        let (evsys, _) = evsys(&ATMEGA4809);
        for (port, bit) in [
            (Port::A, 0),
            (Port::A, 1),
            (Port::C, 0),
            (Port::C, 1),
            (Port::E, 0),
            (Port::E, 1),
        ] {
            assert!(!evsys.assign_generator_pin(port, bit).is_empty());
        }
        let ch = evsys.assign_generator_pin(Port::A, 2);
        assert!(ch.is_empty());
        assert_eq!(ch.number(), EMPTY_CHANNEL);
        // Already-assigned pins still resolve.
        assert_eq!(evsys.assign_generator_pin(Port::A, 1).number(), 1);
    }

    #[test]
    fn exhausted_pool_after_assign_generator() {
        let (evsys, _) = evsys(&AVR128DA28);
        let gens = [
            Generator::TCB0_CAPT,
            Generator::TCB1_CAPT,
            Generator::TCB2_CAPT,
            Generator::AC0_OUT,
            Generator::CCL0_OUT,
            Generator::CCL1_OUT,
            Generator::RTC_OVF,
            Generator::TCA0_OVF_LUNF,
        ];
        let mut numbers = [0; 8];
        for (i, gen) in gens.iter().enumerate() {
            numbers[i] = evsys.assign_generator(*gen).number();
        }
        assert_eq!(numbers, [7, 6, 5, 4, 3, 2, 1, 0]);
        assert!(evsys.assign_generator(Generator::ADC0_READY).is_empty());
        assert!(evsys.assign_generator_pin(Port::A, 3).is_empty());
    }

    #[test]
    fn assign_generator_shares_channels() {
        let (evsys, _) = evsys(&AVR128DA48);
        let first = evsys.assign_generator(Generator::TCB0_CAPT).number();
        let second = evsys.assign_generator(Generator::TCB0_CAPT).number();
        assert_eq!(first, 9);
        assert_eq!(second, first);
        assert_eq!(evsys.assign_generator(Generator::AC0_OUT).number(), 8);
        assert!(evsys.assign_generator(Generator::DISABLE).is_empty());
    }

    #[test]
    fn assign_generator_unavailable_on_mega0() {
        let (evsys, _) = evsys(&ATMEGA4809);
        assert!(evsys.assign_generator(Generator::TCB0_CAPT).is_empty());
        assert_eq!(evsys.generator_channel(Generator::TCB0_CAPT).number(), EMPTY_CHANNEL);
    }

    #[test]
    fn user_round_trip() {
        let (evsys, _) = evsys(&ATMEGA4809);
        for ch in 0..8 {
            evsys.set_user(ch, user::mega0::TCB1);
            assert_eq!(evsys.user_channel_number(user::mega0::TCB1), Some(ch));
            assert_eq!(evsys.user_channel(user::mega0::TCB1).number(), ch);
            evsys.clear_user(user::mega0::TCB1);
            assert_eq!(evsys.user_channel_number(user::mega0::TCB1), None);
            assert!(evsys.user_channel(user::mega0::TCB1).is_empty());
        }
    }

    #[test]
    fn users_fan_out_from_one_channel() {
        let (evsys, _) = evsys(&ATMEGA4809);
        evsys.set_user(3, user::mega0::CCL0_EVENT_A);
        evsys.set_user(3, user::mega0::ADC0_START);
        assert_eq!(evsys.registers.user[0x00].get(), 4);
        assert_eq!(evsys.registers.user[0x08].get(), 4);
        evsys.set_user(200, user::mega0::TCA0);
        assert_eq!(evsys.user_channel_number(user::mega0::TCA0), None);
    }

    #[test]
    fn alternate_evout_sets_port_mux() {
        let (evsys, mux) = evsys(&ATMEGA4809);
        evsys.set_user(1, user::mega0::EVOUTD_PIN_PD7);
        assert_eq!(evsys.registers.user[0x0C].get(), 2);
        assert!(mux.evout_alternate(3));
        assert_eq!(evsys.user_channel_number(user::mega0::EVOUTD_PIN_PD7), Some(1));

        evsys.clear_user(user::mega0::EVOUTD_PIN_PD7);
        assert!(!mux.evout_alternate(3));
        assert_eq!(evsys.registers.user[0x0C].get(), 0);
    }

    #[test]
    fn user_pin_selects_evout() {
        let (evsys, mux) = evsys(&ATMEGA4809);
        // Pin 2 is PA2, pin 7 is PA7, pin 16 is PC2, pin 36 is PF2.
        assert_eq!(evsys.set_user_pin(0, 2, &ATMEGA4809_48PIN), Ok(user::mega0::EVOUTA_PIN_PA2));
        assert_eq!(evsys.set_user_pin(0, 7, &ATMEGA4809_48PIN), Ok(user::mega0::EVOUTA_PIN_PA7));
        assert!(mux.evout_alternate(0));
        assert_eq!(evsys.set_user_pin(2, 36, &ATMEGA4809_48PIN), Ok(user::mega0::EVOUTF_PIN_PF2));
        assert_eq!(evsys.registers.user[0x0E].get(), 3);
        // PF7 has no EVOUT, pin 3 is PA3.
        assert_eq!(evsys.set_user_pin(0, 3, &ATMEGA4809_48PIN), Err(ErrorCode::INVAL));
        assert_eq!(evsys.set_user_pin(0, 99, &ATMEGA4809_48PIN), Err(ErrorCode::INVAL));
        assert_eq!(evsys.set_user_pin(EMPTY_CHANNEL, 2, &ATMEGA4809_48PIN), Err(ErrorCode::INVAL));
    }

    #[test]
    fn start_commits_stored_generator() {
        let (evsys, _) = evsys(&ATMEGA4809);
        evsys.set_generator(5, Generator::RTC_OVF);
        assert_eq!(evsys.active_generator(5), Generator::DISABLE);
        evsys.start(5, true);
        assert_eq!(evsys.registers.channel[5].get(), 0x06);
        evsys.stop(5);
        assert_eq!(evsys.registers.channel[5].get(), 0x00);
        assert_eq!(evsys.channel(5).generator(), Generator::RTC_OVF);
    }

    #[test]
    fn generator_from_pin_number() {
        let (evsys, _) = evsys(&ATMEGA4809);
        evsys.set_generator_pin(2, 17, &ATMEGA4809_48PIN);
        assert_eq!(evsys.channel(2).generator(), Generator::pin(Port::C, 3));
        evsys.set_generator_pin(2, 200, &ATMEGA4809_48PIN);
        assert_eq!(evsys.channel(2).generator(), Generator::DISABLE);
        assert_eq!(evsys.assign_generator_pin_number(39, &ATMEGA4809_48PIN).number(), 4);
    }

    #[test]
    fn empty_channel_ignores_everything() {
        let (evsys, _) = evsys(&ATMEGA4809);
        let empty = evsys.channel(8);
        assert!(empty.is_empty());
        empty.set_generator(Generator::RTC_OVF);
        assert_eq!(empty.generator(), Generator::DISABLE);
        evsys.start(EMPTY_CHANNEL, true);
        evsys.soft_event(EMPTY_CHANNEL);
        assert_eq!(evsys.registers.swevent[0].get(), 0);
    }

    #[test]
    fn soft_event_strobe_bits() {
        let (evsys, _) = evsys(&AVR128DA48);
        evsys.soft_event(3);
        assert_eq!(evsys.registers.swevent[0].get(), 0x08);
        evsys.soft_event(9);
        assert_eq!(evsys.registers.swevent[1].get(), 0x02);
        evsys.long_soft_event(8, 6);
        assert_eq!(evsys.registers.swevent[1].get(), 0x01);
    }

    #[test]
    fn long_soft_event_lengths() {
        let writes: [u8; 18] = [2, 2, 2, 2, 4, 4, 6, 6, 6, 6, 10, 10, 10, 10, 10, 10, 16, 16];
        for (length, expected) in writes.iter().enumerate() {
            assert_eq!(soft_event_writes(length as u8), *expected);
        }
        assert_eq!(soft_event_writes(0), 2);
        assert_eq!(soft_event_writes(255), 16);
    }

    #[test]
    fn strobe_burst_issues_exact_write_count() {
        for length in 0..=20u8 {
            let expected = soft_event_writes(length);
            let mut count = 0u8;
            strobe_burst(expected, || count += 1);
            assert_eq!(count, expected, "length {}", length);
        }
    }

    #[test]
    fn long_soft_event_strobes_only_its_channel() {
        let (evsys, _) = evsys(&AVR128DA48);
        evsys.long_soft_event(2, 0);
        assert_eq!(evsys.registers.swevent[0].get(), 0x04);
        assert_eq!(evsys.registers.swevent[1].get(), 0x00);
        evsys.long_soft_event(EMPTY_CHANNEL, 16);
        assert_eq!(evsys.registers.swevent[1].get(), 0x00);
    }
}
