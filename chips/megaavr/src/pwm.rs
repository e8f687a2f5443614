// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! PWM on TCA0 (split mode) and the TCB timers (8-bit PWM mode).
//!
//! TCA0 gives six channels that share one 8-bit period and one prescaler.
//! Each TCB gives a single channel with its own period. The TCB used by the
//! time base is reserved and never reprogrammed here.
//!
//! Usage
//! -----
//!
//! ```rust,ignore
//! pwm.setup(Port::C);
//! pwm.set_frequency(4);
//! pwm.write(PwmTimer::Tca0(2), 0x40, Route::Untouched)?;
//! pwm.write(PwmTimer::Tcb(0), 0x80, Route::Tcb { timer: 0, alternate: true })?;
//! ```

use crate::debug::debug;
use crate::errorcode::ErrorCode;
use crate::pins::{PinTable, Port, TimerId};
use crate::port::Ports;
use crate::portmux::PortMux;
use crate::tca::{self, TcaRegisters, SPLIT_CHANNELS};
use crate::tcb::{self, TcbBlock, TcbRegisters};
use crate::utilities::StaticRef;
use crate::variant::Variant;

/// Period programmed at start-up, in timer ticks minus one.
pub const DEFAULT_PERIOD: u8 = 0xFE;
/// Compare value programmed at start-up.
pub const DEFAULT_DUTY: u8 = 0x80;

/// A PWM output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PwmTimer {
    /// TCA0 split channel 0-5 (WO0-WO5).
    Tca0(u8),
    /// TCB instance number.
    Tcb(u8),
}

/// Port-mux change applied before a write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Route {
    Untouched,
    /// Send all six TCA0 outputs to pins 0-5 of `Port`.
    Tca0(Port),
    /// Select the default or alternate output pin of one TCB.
    Tcb { timer: u8, alternate: bool },
}

/// Clock divider for a PWM timer.
///
/// TCA0 accepts every division factor except `ClkTca`. A TCB accepts
/// `Div1`, `Div2` and `ClkTca`, the clock of TCA0 after its own prescaler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Prescaler {
    Div1,
    Div2,
    Div4,
    Div8,
    Div16,
    Div64,
    Div256,
    Div1024,
    ClkTca,
}

impl Prescaler {
    fn tca(self) -> Result<tca::ClockSelect, ErrorCode> {
        match self {
            Prescaler::Div1 => Ok(tca::ClockSelect::Div1),
            Prescaler::Div2 => Ok(tca::ClockSelect::Div2),
            Prescaler::Div4 => Ok(tca::ClockSelect::Div4),
            Prescaler::Div8 => Ok(tca::ClockSelect::Div8),
            Prescaler::Div16 => Ok(tca::ClockSelect::Div16),
            Prescaler::Div64 => Ok(tca::ClockSelect::Div64),
            Prescaler::Div256 => Ok(tca::ClockSelect::Div256),
            Prescaler::Div1024 => Ok(tca::ClockSelect::Div1024),
            Prescaler::ClkTca => Err(ErrorCode::INVAL),
        }
    }

    fn tcb(self) -> Result<tcb::ClockSelect, ErrorCode> {
        match self {
            Prescaler::Div1 => Ok(tcb::ClockSelect::Div1),
            Prescaler::Div2 => Ok(tcb::ClockSelect::Div2),
            Prescaler::ClkTca => Ok(tcb::ClockSelect::Tca0),
            _ => Err(ErrorCode::INVAL),
        }
    }
}

/// TCA0 prescaler giving a timer clock near 250 kHz.
pub const fn default_prescaler(clock_hz: u32) -> tca::ClockSelect {
    if clock_hz <= 1_000_000 {
        tca::ClockSelect::Div4
    } else if clock_hz <= 2_000_000 {
        tca::ClockSelect::Div8
    } else if clock_hz <= 8_000_000 {
        tca::ClockSelect::Div16
    } else {
        tca::ClockSelect::Div64
    }
}

/// Prescalers for roughly 1, 2, 4, ... kHz PWM at `clock_hz`, slowest first.
///
/// Slow clocks cannot reach the low end, so their tables start further up.
pub fn frequency_table(clock_hz: u32) -> &'static [tca::ClockSelect] {
    use tca::ClockSelect::{Div1, Div16, Div2, Div4, Div64, Div8};

    static TABLE: [tca::ClockSelect; 7] = [Div64, Div16, Div16, Div8, Div4, Div2, Div1];
    if clock_hz > 8_000_000 {
        &TABLE
    } else if clock_hz > 4_000_000 {
        &TABLE[1..]
    } else if clock_hz > 2_000_000 {
        &TABLE[2..]
    } else if clock_hz > 1_000_000 {
        &TABLE[3..]
    } else {
        &TABLE[4..]
    }
}

/// Pick the table entry for `khz` by repeated halving.
fn frequency_index(khz: u8, table_len: usize) -> usize {
    let mut khz = khz;
    let mut index = 0;
    while khz > 1 {
        khz >>= 1;
        index += 1;
        if index >= table_len - 1 {
            break;
        }
    }
    index
}

pub struct Pwm {
    tca: StaticRef<TcaRegisters>,
    tcbs: StaticRef<TcbBlock>,
    ports: Ports,
    portmux: PortMux,
    variant: &'static Variant,
    clock_hz: u32,
    reserved_tcb: usize,
}

impl Pwm {
    /// `reserved_tcb` is the TCB driving the time base.
    pub const fn new(
        tca: StaticRef<TcaRegisters>,
        tcbs: StaticRef<TcbBlock>,
        ports: Ports,
        portmux: PortMux,
        variant: &'static Variant,
        clock_hz: u32,
        reserved_tcb: usize,
    ) -> Pwm {
        Pwm {
            tca,
            tcbs,
            ports,
            portmux,
            variant,
            clock_hz,
            reserved_tcb,
        }
    }

    fn is_pwm_tcb(&self, n: usize) -> bool {
        n < self.variant.tcb_count() && n != self.reserved_tcb
    }

    fn tcb(&self, n: u8) -> Result<&TcbRegisters, ErrorCode> {
        let n = n as usize;
        if n >= self.variant.tcb_count() {
            Err(ErrorCode::NODEVICE)
        } else if n == self.reserved_tcb {
            Err(ErrorCode::BUSY)
        } else {
            Ok(&self.tcbs[n])
        }
    }

    fn check(&self, timer: PwmTimer) -> Result<(), ErrorCode> {
        match timer {
            PwmTimer::Tca0(ch) if ch as usize >= SPLIT_CHANNELS => Err(ErrorCode::INVAL),
            PwmTimer::Tca0(_) => Ok(()),
            PwmTimer::Tcb(n) => self.tcb(n).map(|_| ()),
        }
    }

    /// Initial timer configuration. TCA0 outputs go to `tca_port`.
    pub fn setup(&self, tca_port: Port) {
        self.portmux.set_tca0_port(tca_port.index() as u8);

        self.tca.init_split(DEFAULT_PERIOD, DEFAULT_DUTY);
        let clock = default_prescaler(self.clock_hz);
        self.tca.set_clock(clock);

        for n in 0..self.variant.tcb_count() {
            if self.is_pwm_tcb(n) {
                self.tcbs[n].init_pwm8(DEFAULT_PERIOD, DEFAULT_DUTY, tcb::ClockSelect::Tca0);
            }
        }
        debug!(
            "pwm: tca0 on port {}, prescaler {}",
            tca_port.index(),
            clock as u8
        );
    }

    /// Apply a port-mux route.
    pub fn set_route(&self, route: Route) -> Result<(), ErrorCode> {
        match route {
            Route::Untouched => {}
            Route::Tca0(port) => self.portmux.set_tca0_port(port.index() as u8),
            Route::Tcb { timer, alternate } => {
                if timer as usize >= self.variant.tcb_count() {
                    return Err(ErrorCode::NODEVICE);
                }
                self.portmux.set_tcb_alternate(timer as usize, alternate);
            }
        }
        Ok(())
    }

    /// Pin currently carrying `timer`'s output.
    pub fn output_pin(&self, timer: PwmTimer) -> Result<(Port, u8), ErrorCode> {
        self.check(timer)?;
        match timer {
            PwmTimer::Tca0(ch) => {
                let port = Port::from_index(self.portmux.tca0_port()).ok_or(ErrorCode::INVAL)?;
                Ok((port, ch))
            }
            PwmTimer::Tcb(n) => {
                let pins = &self.variant.tcbs[n as usize];
                let pin = if self.portmux.tcb_alternate(n as usize) {
                    pins.alternate
                } else {
                    pins.primary
                };
                pin.ok_or(ErrorCode::NODEVICE)
            }
        }
    }

    /// Current TOP of `timer`.
    pub fn period(&self, timer: PwmTimer) -> Result<u8, ErrorCode> {
        self.check(timer)?;
        match timer {
            PwmTimer::Tca0(_) => Ok(self.tca.period()),
            PwmTimer::Tcb(n) => Ok(self.tcb(n)?.pwm_period()),
        }
    }

    fn set_compare_output(&self, timer: PwmTimer, enable: bool) {
        match timer {
            PwmTimer::Tca0(ch) => self.tca.enable_output(ch as usize, enable),
            PwmTimer::Tcb(n) => self.tcbs[n as usize].enable_output(enable),
        }
    }

    fn set_duty(&self, timer: PwmTimer, duty: u8) {
        critical_section::with(|_| match timer {
            PwmTimer::Tca0(ch) => self.tca.set_compare(ch as usize, duty),
            PwmTimer::Tcb(n) => self.tcbs[n as usize].set_pwm_duty(duty),
        });
    }

    /// Set the output of `timer`.
    ///
    /// Zero drives the pin low and a value above TOP drives it high, both
    /// with the compare output disabled. Anything else becomes the duty and
    /// the compare output is enabled. `route` is applied first.
    pub fn write(&self, timer: PwmTimer, value: u16, route: Route) -> Result<(), ErrorCode> {
        self.check(timer)?;
        self.set_route(route)?;
        let (port, bit) = self.output_pin(timer)?;
        self.ports.make_output(port, bit);

        let top = self.period(timer)?;
        if value == 0 || value > top as u16 {
            self.set_compare_output(timer, false);
            self.ports.write(port, bit, value != 0);
        } else {
            self.set_duty(timer, value as u8);
            self.set_compare_output(timer, true);
        }
        Ok(())
    }

    /// Change the clock divider of the timer behind `timer`. On TCA0 this
    /// affects all six channels.
    pub fn set_prescaler(&self, timer: PwmTimer, prescaler: Prescaler) -> Result<(), ErrorCode> {
        self.check(timer)?;
        match timer {
            PwmTimer::Tca0(_) => {
                let clock = prescaler.tca()?;
                self.tca.set_clock(clock);
                debug!("pwm: tca0 prescaler {}", clock as u8);
            }
            PwmTimer::Tcb(n) => {
                let clock = prescaler.tcb()?;
                self.tcb(n)?.set_clock(clock);
                debug!("pwm: tcb{} clock {}", n, clock as u8);
            }
        }
        Ok(())
    }

    /// Set the period so that `max_value` is full on, and reset the duty to
    /// half of it. On TCA0 this affects all six channels.
    pub fn set_resolution(&self, timer: PwmTimer, max_value: u8) -> Result<(), ErrorCode> {
        self.check(timer)?;
        let top = if max_value > 0 { max_value - 1 } else { 1 };
        match timer {
            PwmTimer::Tca0(_) => {
                self.tca.set_period(top);
                for ch in 0..SPLIT_CHANNELS {
                    self.tca.set_compare(ch, top >> 1);
                }
            }
            PwmTimer::Tcb(n) => self.tcb(n)?.set_pwm(top, top >> 1),
        }
        Ok(())
    }

    /// Approximate a PWM frequency of `khz` on TCA0 and every TCB clocked
    /// from it. Returns the prescaler chosen.
    pub fn set_frequency(&self, khz: u8) -> tca::ClockSelect {
        let table = frequency_table(self.clock_hz);
        let clock = table[frequency_index(khz, table.len())];
        self.tca.set_clock(clock);
        debug!("pwm: {} kHz -> tca0 prescaler {}", khz, clock as u8);
        clock
    }

    /// Analog output on a board pin.
    ///
    /// `val` is a duty out of 255. Pins without a usable timer fall back to
    /// a digital write, low below 128.
    pub fn analog_write(&self, pin: u8, val: i16, pins: &PinTable) -> Result<(), ErrorCode> {
        let desc = pins.descriptor(pin).ok_or(ErrorCode::INVAL)?;
        let (port, bit) = (desc.port, desc.bit);
        self.ports.make_output(port, bit);

        let timer = match pins.timer(pin) {
            TimerId::Tca0 if (bit as usize) < SPLIT_CHANNELS => Some(PwmTimer::Tca0(bit)),
            TimerId::Tcb(n) if self.is_pwm_tcb(n as usize) => Some(PwmTimer::Tcb(n)),
            _ => None,
        };

        match timer {
            Some(timer) if val > 0 && val < 255 => {
                self.set_duty(timer, val as u8);
                self.set_compare_output(timer, true);
            }
            Some(timer) => {
                self.set_compare_output(timer, false);
                self.ports.write(port, bit, val > 0);
            }
            None => self.ports.write(port, bit, val >= 128),
        }
        Ok(())
    }
}
