// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Host stand-ins for the register blocks, the core and the peripheral bus.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use kernel::platform::chip::Processor;
use kernel::utilities::StaticRef;

use crate::share::{Field, PeripheralBus, Width};

/// A register block in host memory, all registers reading zero.
///
/// The memory is leaked so the block lives as long as the test binary, which
/// is what `StaticRef` promises.
pub(crate) fn ram_block<T: 'static>() -> StaticRef<T> {
    // SAFETY: register blocks only contain integer registers, for which the
    // all-zero bit pattern is valid.
    let block: &'static T = Box::leak(Box::new(unsafe { core::mem::zeroed::<T>() }));
    unsafe { StaticRef::new(block as *const T) }
}

/// Records the core instructions chip code issues.
#[derive(Default)]
pub(crate) struct MockProcessor {
    pub wfi_count: Cell<usize>,
    pub nop_count: Cell<usize>,
    pub masked: Cell<bool>,
    /// Outermost critical sections entered.
    pub sections: Cell<usize>,
    pub wfi_while_masked: Cell<bool>,
    on_wfi: RefCell<Option<Box<dyn Fn()>>>,
}

impl MockProcessor {
    /// Run `hook` every time the core would suspend, as a stand-in for the
    /// wake interrupt that ends the WFI.
    pub fn on_wfi(&self, hook: impl Fn() + 'static) {
        *self.on_wfi.borrow_mut() = Some(Box::new(hook));
    }
}

impl Processor for MockProcessor {
    fn wait_for_interrupt(&self) {
        self.wfi_count.set(self.wfi_count.get() + 1);
        if self.masked.get() {
            self.wfi_while_masked.set(true);
        }
        if let Some(hook) = self.on_wfi.borrow().as_ref() {
            hook();
        }
    }

    fn nop(&self) {
        self.nop_count.set(self.nop_count.get() + 1);
    }

    fn with_interrupts_disabled<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let outer = self.masked.replace(true);
        if !outer {
            self.sections.set(self.sections.get() + 1);
        }
        let res = f();
        self.masked.set(outer);
        res
    }
}

/// Peripheral registers addressed by absolute address. Unset addresses read
/// zero.
#[derive(Default)]
pub(crate) struct MockBus {
    values: RefCell<HashMap<usize, u32>>,
}

impl MockBus {
    pub fn set(&self, addr: usize, value: u32) {
        self.values.borrow_mut().insert(addr, value);
    }
}

impl PeripheralBus for MockBus {
    fn read(&self, field: &Field) -> u32 {
        let raw = self.values.borrow().get(&field.addr).copied().unwrap_or(0);
        match field.width {
            Width::Byte => raw & 0xff,
            Width::Half => raw & 0xffff,
            Width::Word => raw,
        }
    }
}
