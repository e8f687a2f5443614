// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Wrapper type for safe pointers to static memory.

use core::ops::Deref;
use core::ptr::NonNull;

/// A pointer to statically allocated mutable data such as memory mapped I/O
/// registers.
///
/// This is a simple wrapper around a raw pointer that encapsulates an unsafe
/// dereference in a safe manner. It serves the role of creating a `&'static T`
/// given a raw address and acts similarly to `extern` definitions, except
/// `StaticRef` is subject to module and crate boundaries, and is easily
/// passed around.
///
/// Every driver in this crate receives its register block as a `StaticRef`.
/// On hardware it points at the peripheral's fixed address; in tests it points
/// at a zeroed block of host memory.
#[derive(Debug)]
pub struct StaticRef<T> {
    ptr: NonNull<T>,
}

impl<T> StaticRef<T> {
    /// Create a new `StaticRef` from a raw pointer
    ///
    /// ## Safety
    ///
    /// - `ptr` must be aligned, non-null, and dereferencable as `T`.
    /// - `*ptr` must be valid for the program duration.
    pub const unsafe fn new(ptr: *const T) -> StaticRef<T> {
        // SAFETY: `ptr` is non-null as promised by the caller.
        unsafe {
            StaticRef {
                ptr: NonNull::new_unchecked(ptr.cast_mut()),
            }
        }
    }
}

impl<T> Clone for StaticRef<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for StaticRef<T> {}

impl<T> Deref for StaticRef<T> {
    type Target = T;
    fn deref(&self) -> &T {
        // SAFETY: `ptr` is aligned and dereferencable for the program
        // duration as promised by the caller of `StaticRef::new`.
        unsafe { self.ptr.as_ref() }
    }
}

/// Allocate a zeroed register block in host memory.
///
/// The block is leaked, which gives it the `'static` lifetime the drivers
/// expect. Zero is the reset value of every register this crate touches.
#[cfg(test)]
pub(crate) fn fake_registers<T>() -> StaticRef<T> {
    let layout = std::alloc::Layout::new::<T>();
    // SAFETY: the register types are plain `UnsafeCell<u8>` aggregates, for
    // which all-zero is a valid bit pattern, and the layout is non-zero sized.
    unsafe {
        let ptr = std::alloc::alloc_zeroed(layout) as *const T;
        assert!(!ptr.is_null());
        StaticRef::new(ptr)
    }
}
