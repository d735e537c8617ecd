// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Interfaces for implementing microcontrollers in Tock.

/// Core instructions a chip needs from the processor it runs on.
///
/// Chip code that sequences low-power entry or protected register writes
/// talks to the core only through this trait, so it can be exercised on a
/// host with a recording implementation.
pub trait Processor {
    /// Suspend the core until an interrupt is pending.
    fn wait_for_interrupt(&self);

    /// Burn one instruction cycle.
    fn nop(&self);

    /// Run `f` with interrupts globally masked. Interrupts are unmasked again
    /// when `f` returns.
    fn with_interrupts_disabled<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R;
}

/// Interface for individual MCUs.
///
/// The trait defines chip-specific properties of Tock's operation. These
/// include which processor the chip runs on and how it services interrupts.
pub trait Chip {
    /// The core this chip is built around.
    type Processor: Processor;

    /// Access the processor.
    fn processor(&self) -> &Self::Processor;

    /// Run the interrupt handler bound to vector `slot`. Returns `false` if
    /// nothing was bound.
    fn service_vector(&self, slot: u32) -> bool;

    /// Put the chip to sleep until the next interrupt. Clocks and peripherals
    /// keep running.
    fn sleep(&self) {
        self.processor().wait_for_interrupt();
    }

    /// Run a function in an atomic state w.r.t. interrupts.
    fn atomic<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        self.processor().with_interrupts_disabled(f)
    }
}

/// Interface for handling interrupts on a hardware chip.
///
/// Each chip implements this trait for the set of peripherals it exposes,
/// mapping an interrupt number to the driver code that services it.
pub trait InterruptService {
    /// Service an interrupt, if supported by this chip. If this interrupt
    /// number is not supported, return false.
    ///
    /// # Safety
    ///
    /// Must be called from the interrupt context of `interrupt`, or from code
    /// that otherwise holds exclusive access to the peripheral state the
    /// handler touches.
    unsafe fn service_interrupt(&self, interrupt: u32) -> bool;
}
