// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Millisecond time base and busy-wait delays.
//!
//! One TCB runs in periodic interrupt mode with TOP chosen so that its
//! capture interrupt fires every millisecond. The interrupt increments a
//! 32-bit millisecond counter; `micros` combines that counter with the live
//! timer count.
//!
//! ```text
//!   CNT  0 .. TOP, TOP = clock / 1000 / divider - 1
//!   IRQ  ----^-------^-------^----   millis += 1
//! ```

use core::cell::Cell;

use critical_section::Mutex;

use crate::debug::debug;
use crate::tcb::{ClockSelect, TcbRegisters};
use crate::utilities::StaticRef;

/// A free-running microsecond clock.
pub trait Time {
    /// Microseconds since start, wrapping at 2^32.
    fn micros(&self) -> u32;
}

/// How a sub-millisecond tick count becomes microseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TickScale {
    /// Power-of-two ticks per microsecond.
    Shift(u8),
    Divide(u16),
    /// Timer slower than 1 MHz: microseconds per tick.
    Multiply(u16),
}

const fn tick_scale(clock_hz: u32, divider: u8) -> TickScale {
    let tick_hz = clock_hz / divider as u32;
    if tick_hz >= 1_000_000 {
        let per_us = tick_hz / 1_000_000;
        if per_us.is_power_of_two() {
            TickScale::Shift(per_us.trailing_zeros() as u8)
        } else {
            TickScale::Divide(per_us as u16)
        }
    } else {
        TickScale::Multiply((1_000_000 / tick_hz) as u16)
    }
}

impl TickScale {
    fn micros(self, ticks: u16) -> u32 {
        let us = match self {
            TickScale::Shift(n) => (ticks >> n) as u32,
            TickScale::Divide(d) => (ticks / d) as u32,
            TickScale::Multiply(m) => ticks as u32 * m as u32,
        };
        // A tick count read just before the reload can round past the
        // millisecond.
        us.min(999)
    }
}

pub struct TimeBase {
    registers: StaticRef<TcbRegisters>,
    top: u16,
    divider: u8,
    scale: TickScale,
    millis: Mutex<Cell<u32>>,
}

impl TimeBase {
    /// `divider` is 1 or 2. Any other value is treated as 1.
    pub const fn new(registers: StaticRef<TcbRegisters>, clock_hz: u32, divider: u8) -> TimeBase {
        let divider = if divider == 2 { 2 } else { 1 };
        TimeBase {
            registers,
            top: (clock_hz / 1000 / divider as u32 - 1) as u16,
            divider,
            scale: tick_scale(clock_hz, divider),
            millis: Mutex::new(Cell::new(0)),
        }
    }

    /// Counter TOP, one millisecond worth of ticks minus one.
    pub fn top(&self) -> u16 {
        self.top
    }

    /// Program the timer and start ticking. ENABLE is written last.
    pub fn start(&self) {
        let clock = if self.divider == 2 {
            ClockSelect::Div2
        } else {
            ClockSelect::Div1
        };
        self.registers.init_periodic(self.top, clock);
        self.registers.enable();
        debug!("time: tick every {} timer cycles", self.top as u32 + 1);
    }

    /// Tick interrupt handler.
    pub fn handle_interrupt(&self) {
        critical_section::with(|cs| {
            let millis = self.millis.borrow(cs);
            millis.set(millis.get().wrapping_add(1));
        });
        self.registers.clear_capture();
    }

    /// Milliseconds since `start`, wrapping at 2^32.
    pub fn millis(&self) -> u32 {
        critical_section::with(|cs| self.millis.borrow(cs).get())
    }

    /// Microseconds since `start`, wrapping at 2^32.
    ///
    /// If the counter has already reloaded but the tick interrupt has not run
    /// yet, the pending tick is counted here and the count is read again, so
    /// the result never steps back by a millisecond.
    pub fn micros(&self) -> u32 {
        let (millis, ticks) = critical_section::with(|cs| {
            let mut millis = self.millis.borrow(cs).get();
            let mut ticks = self.registers.count();
            if self.registers.capture_pending() {
                millis = millis.wrapping_add(1);
                ticks = self.registers.count();
            }
            (millis, ticks)
        });
        millis
            .wrapping_mul(1000)
            .wrapping_add(self.scale.micros(ticks))
    }
}

impl Time for TimeBase {
    fn micros(&self) -> u32 {
        TimeBase::micros(self)
    }
}

/// Busy-wait for `ms` milliseconds on `time`.
///
/// Elapsed time is measured with wrapping arithmetic, so the wait is correct
/// across the 2^32 microsecond wrap even when one sample jumps over it.
pub fn delay<T: Time + ?Sized>(time: &T, ms: u32) {
    // Longest span whose microsecond count fits comfortably in a u32.
    const MAX_STEP_MS: u32 = 1_000_000;

    let mut remaining = ms;
    while remaining > 0 {
        let step = remaining.min(MAX_STEP_MS);
        remaining -= step;

        let start = time.micros();
        let span = step * 1000;
        while time.micros().wrapping_sub(start) < span {}
    }
}

/// Iterations of the 4-cycle busy loop that make up a `us` microsecond
/// delay at `clock_hz`, after the call overhead has been taken off.
///
/// Returns zero when the call overhead alone covers the delay.
pub const fn delay_loop_iterations(us: u16, clock_hz: u32) -> u32 {
    let us = us as u32;
    if clock_hz >= 24_000_000 {
        if us == 0 {
            0
        } else {
            us * 6 - 5
        }
    } else if clock_hz >= 20_000_000 {
        if us <= 1 {
            0
        } else {
            us * 5 - 7
        }
    } else if clock_hz >= 16_000_000 {
        if us <= 1 {
            0
        } else {
            us * 4 - 5
        }
    } else if clock_hz >= 12_000_000 {
        if us <= 1 {
            0
        } else {
            us * 3 - 5
        }
    } else if clock_hz >= 8_000_000 {
        if us <= 2 {
            0
        } else {
            us * 2 - 4
        }
    } else if clock_hz >= 4_000_000 {
        if us <= 2 {
            0
        } else {
            us - 2
        }
    } else if clock_hz >= 2_000_000 {
        if us <= 13 {
            0
        } else {
            (us - 11) >> 1
        }
    } else if us <= 25 {
        0
    } else {
        (us - 22) >> 2
    }
}

#[cfg(target_arch = "avr")]
fn spin(iterations: u32) {
    let mut remaining = iterations;
    while remaining > 0 {
        let chunk = remaining.min(0xFFFF) as u16;
        // SAFETY: a register-only countdown loop, 4 cycles per iteration.
        unsafe {
            core::arch::asm!(
                "1: sbiw {0}, 1",
                "brne 1b",
                inout(reg_iw) chunk => _,
                options(nomem, nostack),
            );
        }
        remaining -= chunk as u32;
    }
}

#[cfg(not(target_arch = "avr"))]
fn spin(iterations: u32) {
    for _ in 0..iterations {
        core::hint::spin_loop();
    }
}

/// Busy-wait for `us` microseconds, calibrated in CPU cycles for `clock_hz`.
///
/// Does not use the time base and works with interrupts disabled.
pub fn delay_microseconds(us: u16, clock_hz: u32) {
    let iterations = delay_loop_iterations(us, clock_hz);
    if iterations > 0 {
        spin(iterations);
    }
}
