// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Generic support for Cortex-M4 platforms.

#![cfg_attr(not(test), no_std)]

pub mod nvic;
pub mod support;

use kernel::platform::chip::Processor;

/// The Cortex-M4 core.
///
/// Chips hand this to code that needs to issue core instructions through
/// `kernel::Processor`.
#[derive(Debug, Default)]
pub struct CortexM4;

impl CortexM4 {
    pub const fn new() -> CortexM4 {
        CortexM4
    }
}

impl Processor for CortexM4 {
    fn wait_for_interrupt(&self) {
        unsafe {
            support::wfi();
        }
    }

    fn nop(&self) {
        support::nop();
    }

    fn with_interrupts_disabled<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        unsafe { support::atomic(f) }
    }
}
