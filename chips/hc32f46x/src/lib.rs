// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Peripheral implementations for the HDSC HC32F46x MCU family.
//!
//! The crate covers interrupt routing (direct and shared vectors), wake-up
//! configuration, the clock tree and the low-power modes.

#![cfg_attr(not(test), no_std)]
#![recursion_limit = "256"]

pub mod chip;
pub mod cmu;
pub mod intc;
pub mod interrupts;
pub mod protect;
pub mod pwc;
pub mod share;
pub mod sysreg;

#[cfg(test)]
mod testing;

use cortexm::nvic::Nvic;

/// Number of NVIC lines on the HC32F46x: 128 direct and 16 shared vectors.
pub const NUM_VECTORS: usize = 144;

// All external vectors enter through `chip::vector_isr`, which looks up the
// installed chip and dispatches on the active IRQ number.
#[cfg_attr(all(target_arch = "arm", target_os = "none"), link_section = ".irqs")]
// `used` ensures that the symbol is kept until the final binary. The `init()`
// function below makes sure the object file is not dropped.
#[cfg_attr(all(target_arch = "arm", target_os = "none"), used)]
pub static IRQS: [unsafe extern "C" fn(); NUM_VECTORS] = [chip::vector_isr; NUM_VECTORS];

/// Put the NVIC into a known state before the chip object is built.
pub unsafe fn init() {
    let nvic = Nvic::new();
    nvic.disable_all();
    nvic.clear_all_pending();
}
