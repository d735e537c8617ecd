// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Helper functions for the Cortex-M architecture.

/// NOP instruction
#[cfg(any(doc, all(target_arch = "arm", target_os = "none")))]
#[inline(always)]
pub fn nop() {
    use core::arch::asm;
    unsafe {
        asm!("nop", options(nomem, nostack, preserves_flags));
    }
}

/// WFI instruction
#[cfg(any(doc, all(target_arch = "arm", target_os = "none")))]
#[inline(always)]
pub unsafe fn wfi() {
    use core::arch::asm;
    asm!("wfi", options(nomem, preserves_flags));
}

/// Atomic operation
///
/// PRIMASK is set for the duration of `f` and cleared afterwards.
#[cfg(any(doc, all(target_arch = "arm", target_os = "none")))]
pub unsafe fn atomic<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    use core::arch::asm;
    asm!("cpsid i", options(nomem, nostack));

    let res = f();

    asm!("cpsie i", options(nomem, nostack));
    res
}

/// Exception number of the handler currently executing, read from IPSR.
///
/// Thread mode reads as 0; external interrupt `n` reads as `n + 16`.
#[cfg(any(doc, all(target_arch = "arm", target_os = "none")))]
#[inline(always)]
pub fn active_exception() -> u32 {
    use core::arch::asm;
    let ipsr: u32;
    unsafe {
        asm!("mrs {}, ipsr", out(reg) ipsr, options(nomem, nostack, preserves_flags));
    }
    ipsr & 0x1ff
}

/// NOP instruction (mock)
// Mock implementations for host builds.
#[cfg(not(any(doc, all(target_arch = "arm", target_os = "none"))))]
pub fn nop() {
    unimplemented!()
}

/// WFI instruction (mock)
#[cfg(not(any(doc, all(target_arch = "arm", target_os = "none"))))]
pub unsafe fn wfi() {
    unimplemented!()
}

/// Atomic operation (mock)
#[cfg(not(any(doc, all(target_arch = "arm", target_os = "none"))))]
pub unsafe fn atomic<F, R>(_f: F) -> R
where
    F: FnOnce() -> R,
{
    unimplemented!()
}

/// Active exception number (mock)
#[cfg(not(any(doc, all(target_arch = "arm", target_os = "none"))))]
pub fn active_exception() -> u32 {
    unimplemented!()
}

/// External interrupt number of the handler currently executing, or `None`
/// in thread mode and for system exceptions.
pub fn active_irq() -> Option<u32> {
    active_exception().checked_sub(16)
}
