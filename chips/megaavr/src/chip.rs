// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Peripheral bundle and interrupt dispatch.

use crate::ac::{AcRegisters, AnalogComparator, VrefRegisters, AC_STRIDE, MAX_ACS};
use crate::ccl::{Ccl, CclRegisters};
use crate::config::CONFIG;
use crate::debug::{debug, debug_warn};
use crate::evsys::{Evsys, EvsysRegisters};
use crate::pins::Port;
use crate::port::{PortBlock, Ports};
use crate::portmux::{PortMux, PortMuxRegisters};
use crate::pwm::Pwm;
use crate::tca::TcaRegisters;
use crate::tcb::{TcbBlock, TcbRegisters};
use crate::time::TimeBase;
use crate::utilities::StaticRef;
use crate::variant::Variant;

/// Interrupt sources owned by this crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Interrupt {
    /// TCBn capture/compare.
    Tcb(u8),
    /// Any logic block output change.
    Ccl,
    /// ACn comparator output change.
    Ac(u8),
}

/// Dispatch of hardware interrupts to drivers.
///
/// The board's vector stubs call `service_interrupt`, which returns `false`
/// for a source with no driver behind it.
pub trait InterruptService {
    fn service_interrupt(&self, interrupt: Interrupt) -> bool;
}

/// Register blocks of one chip.
#[derive(Clone, Copy)]
pub struct PeripheralRegisters {
    pub port: StaticRef<PortBlock>,
    pub portmux: StaticRef<PortMuxRegisters>,
    pub evsys: StaticRef<EvsysRegisters>,
    pub ccl: StaticRef<CclRegisters>,
    pub tca0: StaticRef<TcaRegisters>,
    pub tcbs: StaticRef<TcbBlock>,
    pub acs: [StaticRef<AcRegisters>; MAX_ACS],
    pub vref: StaticRef<VrefRegisters>,
}

impl PeripheralRegisters {
    /// Register blocks at the variant's base addresses.
    ///
    /// # Safety
    ///
    /// `variant` must describe the chip the code runs on.
    pub unsafe fn for_variant(variant: &'static Variant) -> PeripheralRegisters {
        let base = &variant.base;
        // SAFETY: the addresses are the chip's memory-mapped peripheral
        // blocks, which are valid for the program duration.
        unsafe {
            PeripheralRegisters {
                port: StaticRef::new(base.port as *const PortBlock),
                portmux: StaticRef::new(base.portmux as *const PortMuxRegisters),
                evsys: StaticRef::new(base.evsys as *const EvsysRegisters),
                ccl: StaticRef::new(base.ccl as *const CclRegisters),
                tca0: StaticRef::new(base.tca0 as *const TcaRegisters),
                tcbs: StaticRef::new(base.tcb0 as *const TcbBlock),
                acs: [
                    StaticRef::new(base.ac0 as *const AcRegisters),
                    StaticRef::new((base.ac0 + AC_STRIDE) as *const AcRegisters),
                    StaticRef::new((base.ac0 + 2 * AC_STRIDE) as *const AcRegisters),
                ],
                vref: StaticRef::new(base.vref as *const VrefRegisters),
            }
        }
    }
}

/// The TCB used for the time base: `requested`, or the last TCB when the
/// chip has fewer.
fn select_millis_timer(variant: &Variant, requested: usize) -> usize {
    let count = variant.tcb_count();
    if requested < count {
        requested
    } else {
        let fallback = count.saturating_sub(1);
        debug_warn!("chip: no TCB{}, time base on TCB{}", requested, fallback);
        fallback
    }
}

/// Every driver of the crate for one chip.
pub struct MegaAvrPeripherals<'a> {
    pub ports: Ports,
    pub evsys: Evsys,
    pub ccl: Ccl<'a>,
    pub time: TimeBase,
    pub pwm: Pwm,
    pub acs: [AnalogComparator<'a>; MAX_ACS],
    variant: &'static Variant,
    millis_timer: usize,
}

impl<'a> MegaAvrPeripherals<'a> {
    /// Drivers for `variant` at its real addresses, clocked as `CONFIG`
    /// says.
    ///
    /// # Safety
    ///
    /// `variant` must describe the chip the code runs on, and only one
    /// bundle may exist.
    pub unsafe fn new(variant: &'static Variant) -> MegaAvrPeripherals<'a> {
        // SAFETY: forwarded from the caller.
        let registers = unsafe { PeripheralRegisters::for_variant(variant) };
        MegaAvrPeripherals::from_registers(
            registers,
            variant,
            CONFIG.clock_hz,
            CONFIG.millis_timer,
            CONFIG.millis_divider,
        )
    }

    pub fn from_registers(
        registers: PeripheralRegisters,
        variant: &'static Variant,
        clock_hz: u32,
        millis_timer: usize,
        millis_divider: u8,
    ) -> MegaAvrPeripherals<'a> {
        let millis_timer = select_millis_timer(variant, millis_timer);
        let tick: *const TcbRegisters = &registers.tcbs[millis_timer];
        // SAFETY: an element of a register block that is itself valid for
        // the program duration.
        let tick = unsafe { StaticRef::new(tick) };
        let portmux = || PortMux::new(registers.portmux, variant.portmux);
        let ports = || Ports::new(registers.port);
        let ac = |n: usize| {
            AnalogComparator::new(n, registers.acs[n], registers.vref, ports(), variant)
        };

        MegaAvrPeripherals {
            ports: ports(),
            evsys: Evsys::new(registers.evsys, portmux(), variant),
            ccl: Ccl::new(registers.ccl, ports(), portmux(), variant),
            time: TimeBase::new(tick, clock_hz, millis_divider),
            pwm: Pwm::new(
                registers.tca0,
                registers.tcbs,
                ports(),
                portmux(),
                variant,
                clock_hz,
                millis_timer,
            ),
            acs: [ac(0), ac(1), ac(2)],
            variant,
            millis_timer,
        }
    }

    pub fn variant(&self) -> &'static Variant {
        self.variant
    }

    /// Index of the TCB running the time base.
    pub fn millis_timer(&self) -> usize {
        self.millis_timer
    }

    /// Start-up timer configuration: PWM timers first, then the time base.
    pub fn init(&self, tca_port: Port) {
        self.pwm.setup(tca_port);
        self.time.start();
        debug!(
            "chip: {} up, time base on TCB{}",
            self.variant.name,
            self.millis_timer
        );
    }
}

impl InterruptService for MegaAvrPeripherals<'_> {
    fn service_interrupt(&self, interrupt: Interrupt) -> bool {
        match interrupt {
            Interrupt::Tcb(n) if n as usize == self.millis_timer => self.time.handle_interrupt(),
            Interrupt::Ccl => self.ccl.handle_interrupt(),
            Interrupt::Ac(n) if (n as usize) < self.variant.acs.len() => {
                self.acs[n as usize].handle_interrupt()
            }
            _ => return false,
        }
        true
    }
}
