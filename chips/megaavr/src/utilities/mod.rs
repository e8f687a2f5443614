// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Utility types shared by the peripheral drivers.

mod static_ref;

pub use self::static_ref::StaticRef;

#[cfg(test)]
pub(crate) use self::static_ref::fake_registers;
