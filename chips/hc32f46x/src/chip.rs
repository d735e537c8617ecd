// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Chip trait setup.
//!
//! `Hc32f46x` is the one context object of the chip: it owns the shared-source
//! handler table and reaches the interrupt controller, the NVIC and the clock
//! and power controllers. The board builds it once, installs it with
//! [`install`], and from then on every external vector enters through
//! [`vector_isr`] and is dispatched by [`Hc32f46x::service_vector`].

use core::ptr;
use core::sync::atomic::{AtomicPtr, Ordering};

use cortexm::nvic::Nvic;
use cortexm::CortexM4;
use kernel::platform::chip::{Chip, InterruptService, Processor};
use kernel::ErrorCode;
use log::debug;

use crate::cmu::Cmu;
use crate::intc::{Intc, FIRST_SHARED_SLOT, LAST_SHARED_SLOT, NUM_DIRECT_SLOTS};
use crate::interrupts;
use crate::pwc::Pwc;
use crate::share::{self, Mmio, PeripheralBus, SharedHandlers};

pub struct Hc32f46x<'a, P: Processor, B: PeripheralBus> {
    processor: &'a P,
    pub intc: &'a Intc,
    pub nvic: &'a Nvic,
    pub cmu: &'a Cmu<'a, P>,
    pub pwc: &'a Pwc<'a, P>,
    bus: B,
    shared: SharedHandlers,
}

/// The chip as it runs on hardware.
pub type Hc32f46xMcu = Hc32f46x<'static, CortexM4, Mmio>;

impl<'a, P: Processor, B: PeripheralBus> Hc32f46x<'a, P, B> {
    pub const fn new(
        processor: &'a P,
        intc: &'a Intc,
        nvic: &'a Nvic,
        cmu: &'a Cmu<'a, P>,
        pwc: &'a Pwc<'a, P>,
        bus: B,
    ) -> Self {
        Hc32f46x {
            processor,
            intc,
            nvic,
            cmu,
            pwc,
            bus,
            shared: SharedHandlers::new(),
        }
    }

    /// Free every direct slot and open the shared vectors in the NVIC.
    pub fn init(&self) {
        self.intc.reset_selections();
        for slot in FIRST_SHARED_SLOT..=LAST_SHARED_SLOT {
            self.nvic.clear_pending(slot);
            self.nvic.enable(slot);
        }
    }

    /// Bind `callback` to `source`. It runs when a shared vector finds the
    /// source routed, enabled and flagged.
    ///
    /// # Errors:
    ///
    /// - [Err]\([ErrorCode::INVAL]\) if `source` is not a source number.
    pub fn bind_shared(&self, source: u32, callback: fn()) -> Result<(), ErrorCode> {
        if source >= interrupts::NUM_SOURCES || !self.shared.bind(source, callback) {
            return Err(ErrorCode::INVAL);
        }
        debug!("chip: shared handler for source {}", source);
        Ok(())
    }

    pub fn unbind_shared(&self, source: u32) {
        self.shared.unbind(source);
    }

    /// Candidate sources of shared `slot`, in the order they are serviced.
    pub fn share_sources(&self, slot: u32) -> impl Iterator<Item = u32> {
        share::sources(slot)
    }

    /// Run whatever is bound to vector `slot`. Returns `false` if no handler
    /// ran.
    pub fn service_vector(&self, slot: u32) -> bool {
        if (slot as usize) < NUM_DIRECT_SLOTS {
            match self.intc.callback(slot) {
                Some(callback) => {
                    callback();
                    true
                }
                None => false,
            }
        } else if slot <= LAST_SHARED_SLOT {
            let routing = self.intc.routing(slot);
            self.shared.dispatch(slot, &self.bus, routing) > 0
        } else {
            false
        }
    }
}

impl<'a, P: Processor, B: PeripheralBus> Chip for Hc32f46x<'a, P, B> {
    type Processor = P;

    fn processor(&self) -> &P {
        self.processor
    }

    fn service_vector(&self, slot: u32) -> bool {
        Hc32f46x::service_vector(self, slot)
    }

    /// Plain sleep. A Stop or Power-Down request left behind by an earlier
    /// entry is withdrawn first.
    fn sleep(&self) {
        self.pwc.enter_sleep();
    }
}

impl<'a, P: Processor, B: PeripheralBus> InterruptService for Hc32f46x<'a, P, B> {
    unsafe fn service_interrupt(&self, interrupt: u32) -> bool {
        self.service_vector(interrupt)
    }
}

static INSTALLED: AtomicPtr<Hc32f46xMcu> = AtomicPtr::new(ptr::null_mut());

/// Make `chip` the target of [`vector_isr`].
pub fn install(chip: &'static Hc32f46xMcu) {
    INSTALLED.store(chip as *const Hc32f46xMcu as *mut Hc32f46xMcu, Ordering::Release);
}

/// Entry point of every external vector.
///
/// # Safety
///
/// Only to be placed in the vector table.
pub unsafe extern "C" fn vector_isr() {
    let chip = INSTALLED.load(Ordering::Acquire);
    if let (Some(chip), Some(irq)) = (chip.as_ref(), cortexm::support::active_irq()) {
        chip.service_interrupt(irq);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intc::{IntcRegisters, Wakeup};
    use crate::sysreg::{
        EfmRegisters, MstpRegisters, SysregRegisters, WktmRegisters, OSCSTBSR, STPMCR,
    };
    use kernel::utilities::registers::interfaces::{Readable, Writeable};
    use kernel::utilities::StaticRef;
    use crate::testing::{ram_block, MockBus, MockProcessor};
    use cortexm::nvic::NvicRegisters;
    use std::cell::Cell;

    const DMA1_BASE: usize = 0x4005_3000;

    thread_local! {
        static HITS: Cell<u32> = const { Cell::new(0) };
    }

    fn a() {
        HITS.with(|h| h.set(h.get() + 1));
    }

    fn b() {
        HITS.with(|h| h.set(h.get() + 100));
    }

    fn hits() -> u32 {
        HITS.with(|h| h.replace(0))
    }

    fn leak<T>(value: T) -> &'static T {
        Box::leak(Box::new(value))
    }

    fn chip() -> Hc32f46x<'static, MockProcessor, MockBus> {
        chip_with_sysreg().0
    }

    fn chip_with_sysreg() -> (
        Hc32f46x<'static, MockProcessor, MockBus>,
        StaticRef<SysregRegisters>,
    ) {
        let processor = leak(MockProcessor::default());
        let intc = leak(Intc::with_registers(ram_block::<IntcRegisters>()));
        let nvic = leak(Nvic::with_registers(ram_block::<NvicRegisters>()));
        let sysreg = ram_block::<SysregRegisters>();
        sysreg.oscstbsr.write(OSCSTBSR::HRCSTBF::SET);
        let cmu = leak(Cmu::with_registers(
            sysreg,
            ram_block::<MstpRegisters>(),
            ram_block::<EfmRegisters>(),
            processor,
        ));
        let pwc = leak(Pwc::with_registers(
            sysreg,
            ram_block::<WktmRegisters>(),
            processor,
            cmu,
            intc,
            nvic,
        ));
        let chip = Hc32f46x::new(processor, intc, nvic, cmu, pwc, MockBus::default());
        chip.init();
        (chip, sysreg)
    }

    #[test]
    fn direct_slot_follows_its_registration() {
        let chip = chip();
        hits();
        assert_eq!(chip.intc.register(5, 40, a), Err(ErrorCode::INVAL));

        chip.intc.register(5, 33, a).unwrap();
        assert!(chip.service_vector(33));
        assert!(chip.service_vector(33));
        assert_eq!(hits(), 2);

        chip.intc.resign(33).unwrap();
        chip.intc.register(5, 36, b).unwrap();
        assert!(!chip.service_vector(33));
        assert!(chip.service_vector(36));
        assert_eq!(hits(), 100);
    }

    #[test]
    fn shared_slot_needs_routing() {
        let chip = chip();
        hits();
        chip.bind_shared(interrupts::DMA1_TC0, a).unwrap();
        chip.bus.set(DMA1_BASE + 0x5C, 1 << 12);
        chip.bus.set(DMA1_BASE + 0x08, 1 << 0);

        assert!(!chip.service_vector(129));
        assert_eq!(hits(), 0);

        chip.intc.share_enable(interrupts::DMA1_TC0);
        assert!(chip.service_vector(129));
        assert_eq!(hits(), 1);

        chip.intc.share_disable(interrupts::DMA1_TC0);
        assert!(!chip.service_vector(129));

        chip.intc.share_enable(interrupts::DMA1_TC0);
        chip.unbind_shared(interrupts::DMA1_TC0);
        assert!(!chip.service_vector(129));
        assert_eq!(hits(), 0);
    }

    #[test]
    fn out_of_range_requests() {
        let chip = chip();
        assert_eq!(chip.bind_shared(interrupts::NUM_SOURCES, a), Err(ErrorCode::INVAL));
        assert!(!chip.service_vector(144));
        assert!(!chip.service_vector(133));
        assert_eq!(chip.share_sources(133).count(), 0);
        assert_eq!(chip.share_sources(128).count(), 16);
    }

    #[test]
    fn init_frees_direct_slots_and_opens_shared_vectors() {
        let chip = chip();
        assert_eq!(chip.intc.source_at(0), None);
        assert_eq!(chip.intc.source_at(127), None);
        // The RAM image keeps only the last set-enable write of a bank.
        assert!(chip.nvic.is_enabled(LAST_SHARED_SLOT));
    }

    #[test]
    fn sleep_after_stop_does_not_stop_again() {
        let (chip, sysreg) = chip_with_sysreg();
        chip.intc.enable_wakeup(Wakeup::EIRQ0).unwrap();
        assert_eq!(chip.pwc.enter_stop(), Ok(()));
        assert!(sysreg.stpmcr.is_set(STPMCR::STOP));

        let stop_requested = leak(Cell::new(None));
        chip.processor
            .on_wfi(move || stop_requested.set(Some(sysreg.stpmcr.is_set(STPMCR::STOP))));
        chip.sleep();

        assert_eq!(stop_requested.get(), Some(false));
        assert_eq!(chip.processor.wfi_count.get(), 2);
    }
}
