// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Interrupt controller (INTC).
//!
//! The INTC sits in front of the NVIC. Each of the 128 direct vector slots
//! has a selection register naming the one source it carries; the 16 shared
//! slots carry a bitmap of the sources routed onto them. The INTC also holds
//! the Stop-mode wake-up enables and the external pin interrupt setup.

use core::cell::Cell;

use bitflags::bitflags;
use kernel::utilities::registers::interfaces::{Readable, Writeable};
use kernel::utilities::registers::{register_bitfields, register_structs, ReadWrite};
use kernel::utilities::StaticRef;
use kernel::ErrorCode;
use log::debug;

use crate::interrupts;

register_structs! {
    pub IntcRegisters {
        (0x000 => nmicr: ReadWrite<u32>),
        (0x004 => nmienr: ReadWrite<u32>),
        (0x008 => nmifr: ReadWrite<u32>),
        (0x00C => nmicfr: ReadWrite<u32>),
        (0x010 => eirqcr: [ReadWrite<u32, EIRQCR::Register>; 16]),
        (0x050 => wupen: ReadWrite<u32>),
        (0x054 => eifr: ReadWrite<u32>),
        (0x058 => eifcr: ReadWrite<u32>),
        (0x05C => sel: [ReadWrite<u32, SEL::Register>; 128]),
        (0x25C => vssel: [ReadWrite<u32>; 16]),
        (0x29C => swier: ReadWrite<u32>),
        (0x2A0 => evter: ReadWrite<u32>),
        (0x2A4 => ier: ReadWrite<u32>),
        (0x2A8 => @END),
    }
}

register_bitfields![u32,
    SEL [
        INTSEL OFFSET(0) NUMBITS(9) []
    ],
    EIRQCR [
        EIRQTRG OFFSET(0) NUMBITS(2) [
            FallingEdge = 0,
            RisingEdge = 1,
            BothEdges = 2,
            LowLevel = 3
        ],
        EISMPCLK OFFSET(4) NUMBITS(2) [],
        EFEN OFFSET(7) NUMBITS(1) []
    ]
];

pub const INTC_BASE: StaticRef<IntcRegisters> =
    unsafe { StaticRef::new(0x4005_1000 as *const IntcRegisters) };

/// Selection value of a slot that carries no source.
pub const SEL_UNUSED: u32 = 0x1FF;

/// Number of direct vector slots.
pub const NUM_DIRECT_SLOTS: usize = 128;

/// First shared vector slot.
pub const FIRST_SHARED_SLOT: u32 = 128;

/// Last shared vector slot.
pub const LAST_SHARED_SLOT: u32 = 143;

bitflags! {
    /// Sources allowed to end Stop mode (`WUPEN`).
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Wakeup: u32 {
        const EIRQ0 = 1 << 0;
        const EIRQ1 = 1 << 1;
        const EIRQ2 = 1 << 2;
        const EIRQ3 = 1 << 3;
        const EIRQ4 = 1 << 4;
        const EIRQ5 = 1 << 5;
        const EIRQ6 = 1 << 6;
        const EIRQ7 = 1 << 7;
        const EIRQ8 = 1 << 8;
        const EIRQ9 = 1 << 9;
        const EIRQ10 = 1 << 10;
        const EIRQ11 = 1 << 11;
        const EIRQ12 = 1 << 12;
        const EIRQ13 = 1 << 13;
        const EIRQ14 = 1 << 14;
        const EIRQ15 = 1 << 15;
        const SWDT = 1 << 16;
        const PVD1 = 1 << 17;
        const PVD2 = 1 << 18;
        const CMP = 1 << 19;
        const WKTM = 1 << 20;
        const RTC_ALARM = 1 << 21;
        const RTC_PERIOD = 1 << 22;
        const TMR0 = 1 << 23;
        const USART1_RXD = 1 << 25;
    }
}

impl Wakeup {
    /// Bits of `WUPEN` that are reserved.
    pub const RESERVED: u32 = 0xFD00_0000;

    /// Wake-up enable that gates `source`, if the source can end Stop mode.
    pub fn for_source(source: u32) -> Option<Wakeup> {
        let flag = match source {
            interrupts::EIRQ0..=interrupts::EIRQ15 => Wakeup::from_bits_retain(1 << source),
            interrupts::SWDT_REFUDF => Wakeup::SWDT,
            interrupts::PVD1 => Wakeup::PVD1,
            interrupts::PVD2 => Wakeup::PVD2,
            interrupts::ACMP1 => Wakeup::CMP,
            interrupts::WKTM_PRD => Wakeup::WKTM,
            interrupts::RTC_ALM => Wakeup::RTC_ALARM,
            interrupts::RTC_PRD => Wakeup::RTC_PERIOD,
            interrupts::TMR01_GCMA => Wakeup::TMR0,
            interrupts::USART1_WUPI => Wakeup::USART1_RXD,
            _ => return None,
        };
        Some(flag)
    }
}

/// Trigger of an external pin interrupt.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EirqTrigger {
    FallingEdge,
    RisingEdge,
    BothEdges,
    LowLevel,
}

/// Digital filter clock of an external pin interrupt, as a PCLK3 divider.
#[derive(Clone, Copy, Debug, PartialEq)]
#[repr(u32)]
pub enum EirqFilterClock {
    Pclk3Div1 = 0,
    Pclk3Div8 = 1,
    Pclk3Div32 = 2,
    Pclk3Div64 = 3,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EirqConfig {
    pub trigger: EirqTrigger,
    pub filter: Option<EirqFilterClock>,
}

#[allow(clippy::declare_interior_mutable_const)]
const NO_CALLBACK: Cell<Option<fn()>> = Cell::new(None);

/// The INTC and the callback table of the direct slots.
pub struct Intc {
    registers: StaticRef<IntcRegisters>,
    callbacks: [Cell<Option<fn()>>; NUM_DIRECT_SLOTS],
}

impl Intc {
    pub const fn new() -> Intc {
        Intc::with_registers(INTC_BASE)
    }

    pub const fn with_registers(registers: StaticRef<IntcRegisters>) -> Intc {
        Intc {
            registers,
            callbacks: [NO_CALLBACK; NUM_DIRECT_SLOTS],
        }
    }

    /// Mark every direct slot unused and drop all callbacks.
    pub fn reset_selections(&self) {
        for (sel, callback) in self.registers.sel.iter().zip(self.callbacks.iter()) {
            sel.write(SEL::INTSEL.val(SEL_UNUSED));
            callback.set(None);
        }
    }

    /// Bind `source` to direct vector `slot` and store `callback` for it.
    ///
    /// # Errors:
    ///
    /// - [Err]\([ErrorCode::INVAL]\) if `slot` is not a direct slot, if
    ///   `source` is not a source number, or if `slot` is above 31 and
    ///   outside the six slots the source's group may use. Nothing is
    ///   written in that case.
    /// - [Err]\([ErrorCode::ALREADY]\) if the slot still carries a source.
    ///   The existing binding is left untouched; call [`Intc::resign`]
    ///   first.
    pub fn register(&self, source: u32, slot: u32, callback: fn()) -> Result<(), ErrorCode> {
        if slot as usize >= NUM_DIRECT_SLOTS || source >= SEL_UNUSED {
            return Err(ErrorCode::INVAL);
        }
        if slot >= 32 {
            let first = interrupts::direct_window_start(source);
            if slot < first || slot > first + 5 {
                return Err(ErrorCode::INVAL);
            }
        }

        let sel = &self.registers.sel[slot as usize];
        if sel.read(SEL::INTSEL) != SEL_UNUSED {
            return Err(ErrorCode::ALREADY);
        }
        sel.write(SEL::INTSEL.val(source));
        self.callbacks[slot as usize].set(Some(callback));
        debug!("intc: source {} on slot {}", source, slot);
        Ok(())
    }

    /// Release direct vector `slot`.
    ///
    /// # Errors:
    ///
    /// - [Err]\([ErrorCode::INVAL]\) if `slot` is not a direct slot.
    pub fn resign(&self, slot: u32) -> Result<(), ErrorCode> {
        if slot as usize >= NUM_DIRECT_SLOTS {
            return Err(ErrorCode::INVAL);
        }
        self.registers.sel[slot as usize].write(SEL::INTSEL.val(SEL_UNUSED));
        self.callbacks[slot as usize].set(None);
        Ok(())
    }

    /// Source carried by direct `slot`, or `None` if the slot is unused.
    pub fn source_at(&self, slot: u32) -> Option<u32> {
        let sel = self.registers.sel.get(slot as usize)?.read(SEL::INTSEL);
        if sel == SEL_UNUSED {
            None
        } else {
            Some(sel)
        }
    }

    pub fn callback(&self, slot: u32) -> Option<fn()> {
        self.callbacks.get(slot as usize).and_then(Cell::get)
    }

    /// Route `source` onto its shared slot.
    pub fn share_enable(&self, source: u32) {
        if let Some(vssel) = self.vssel_for(source) {
            vssel.set(vssel.get() | interrupts::route_mask(source));
        }
    }

    /// Stop routing `source` onto its shared slot.
    pub fn share_disable(&self, source: u32) {
        if let Some(vssel) = self.vssel_for(source) {
            vssel.set(vssel.get() & !interrupts::route_mask(source));
        }
    }

    /// Routing bitmap of shared `slot`. Zero for any other slot.
    pub fn routing(&self, slot: u32) -> u32 {
        slot.checked_sub(FIRST_SHARED_SLOT)
            .and_then(|i| self.registers.vssel.get(i as usize))
            .map_or(0, |vssel| vssel.get())
    }

    fn vssel_for(&self, source: u32) -> Option<&ReadWrite<u32>> {
        if source >= interrupts::NUM_SOURCES {
            return None;
        }
        self.registers.vssel.get((source / 32) as usize)
    }

    /* Stop mode wake-up */

    /// Allow the sources in `mask` to end Stop mode.
    ///
    /// # Errors:
    ///
    /// - [Err]\([ErrorCode::INVAL]\) if `mask` has reserved bits set. No
    ///   bit is changed in that case.
    pub fn enable_wakeup(&self, mask: Wakeup) -> Result<(), ErrorCode> {
        if mask.bits() & Wakeup::RESERVED != 0 {
            return Err(ErrorCode::INVAL);
        }
        self.registers
            .wupen
            .set(self.registers.wupen.get() | mask.bits());
        Ok(())
    }

    /// Keep the sources in `mask` from ending Stop mode.
    ///
    /// # Errors:
    ///
    /// - [Err]\([ErrorCode::INVAL]\) if `mask` has reserved bits set.
    pub fn disable_wakeup(&self, mask: Wakeup) -> Result<(), ErrorCode> {
        if mask.bits() & Wakeup::RESERVED != 0 {
            return Err(ErrorCode::INVAL);
        }
        self.registers
            .wupen
            .set(self.registers.wupen.get() & !mask.bits());
        Ok(())
    }

    /// Sources currently allowed to end Stop mode.
    pub fn wakeup(&self) -> Wakeup {
        Wakeup::from_bits_truncate(self.registers.wupen.get())
    }

    /* Event and interrupt enables */

    pub fn enable_event(&self, mask: u32) {
        self.registers
            .evter
            .set(self.registers.evter.get() | mask);
    }

    pub fn disable_event(&self, mask: u32) {
        self.registers
            .evter
            .set(self.registers.evter.get() & !mask);
    }

    pub fn enable_int(&self, mask: u32) {
        self.registers.ier.set(self.registers.ier.get() | mask);
    }

    pub fn disable_int(&self, mask: u32) {
        self.registers.ier.set(self.registers.ier.get() & !mask);
    }

    /// Raise the software interrupts in `mask`.
    pub fn trigger_software(&self, mask: u32) {
        self.registers.swier.set(self.registers.swier.get() | mask);
    }

    /* External pin interrupts */

    /// # Errors:
    ///
    /// - [Err]\([ErrorCode::INVAL]\) if `channel` is above 15.
    pub fn configure_eirq(&self, channel: usize, config: &EirqConfig) -> Result<(), ErrorCode> {
        let cr = self.registers.eirqcr.get(channel).ok_or(ErrorCode::INVAL)?;
        let trigger = match config.trigger {
            EirqTrigger::FallingEdge => EIRQCR::EIRQTRG::FallingEdge,
            EirqTrigger::RisingEdge => EIRQCR::EIRQTRG::RisingEdge,
            EirqTrigger::BothEdges => EIRQCR::EIRQTRG::BothEdges,
            EirqTrigger::LowLevel => EIRQCR::EIRQTRG::LowLevel,
        };
        match config.filter {
            Some(clock) => cr.write(
                trigger + EIRQCR::EFEN::SET + EIRQCR::EISMPCLK.val(clock as u32),
            ),
            None => cr.write(trigger),
        }
        Ok(())
    }

    pub fn eirq_flag(&self, channel: usize) -> bool {
        channel < 16 && self.registers.eifr.get() & (1 << channel) != 0
    }

    pub fn clear_eirq_flag(&self, channel: usize) {
        if channel < 16 {
            self.registers.eifcr.set(1 << channel);
        }
    }

    /// Enable the NMI sources in `mask` (pin, SWDT, PVD1, PVD2, XTAL stop,
    /// SRAM parity, SRAM ECC, bus error).
    pub fn enable_nmi(&self, mask: u32) {
        self.registers
            .nmienr
            .set(self.registers.nmienr.get() | mask);
    }

    pub fn nmi_flags(&self) -> u32 {
        self.registers.nmifr.get()
    }

    pub fn clear_nmi_flags(&self, mask: u32) {
        self.registers.nmicfr.set(mask);
    }

    /// Raw NMI pin configuration word.
    pub fn set_nmi_config(&self, value: u32) {
        self.registers.nmicr.set(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ram_block;

    thread_local! {
        static HITS: Cell<u32> = const { Cell::new(0) };
    }

    fn a() {
        HITS.with(|h| h.set(h.get() + 1));
    }

    fn b() {
        HITS.with(|h| h.set(h.get() + 100));
    }

    /// Run the callback of `slot` and report which ones ran.
    fn fire(intc: &Intc, slot: u32) -> u32 {
        HITS.with(|h| h.set(0));
        if let Some(callback) = intc.callback(slot) {
            callback();
        }
        HITS.with(Cell::get)
    }

    fn intc() -> Intc {
        let intc = Intc::with_registers(ram_block());
        intc.reset_selections();
        intc
    }

    #[test]
    fn register_then_resign_frees_the_slot() {
        let intc = intc();
        assert_eq!(intc.register(interrupts::DMA1_TC0, 40, a), Ok(()));
        assert_eq!(intc.source_at(40), Some(interrupts::DMA1_TC0));
        assert_eq!(fire(&intc, 40), 1);

        assert_eq!(intc.resign(40), Ok(()));
        assert_eq!(intc.source_at(40), None);
        assert_eq!(intc.registers.sel[40].get(), SEL_UNUSED);
        assert_eq!(fire(&intc, 40), 0);

        assert_eq!(intc.register(interrupts::DMA1_TC0, 40, b), Ok(()));
        assert_eq!(fire(&intc, 40), 100);
    }

    #[test]
    fn slot_outside_group_window_is_rejected_without_write() {
        let intc = intc();
        // EIRQ5 belongs to group 0, whose window is 32..=37.
        assert_eq!(intc.register(interrupts::EIRQ5, 38, a), Err(ErrorCode::INVAL));
        assert_eq!(intc.register(interrupts::EIRQ5, 40, a), Err(ErrorCode::INVAL));
        assert_eq!(intc.registers.sel[38].get(), SEL_UNUSED);
        assert_eq!(intc.registers.sel[40].get(), SEL_UNUSED);
        assert!(intc.callback(40).is_none());

        assert_eq!(intc.register(interrupts::EIRQ5, 37, a), Ok(()));
        // Slots 0-31 take any source.
        assert_eq!(intc.register(interrupts::CAN_INT, 3, a), Ok(()));
    }

    #[test]
    fn occupied_slot_is_not_overwritten() {
        let intc = intc();
        intc.register(interrupts::EIRQ5, 34, a).unwrap();
        assert_eq!(intc.register(interrupts::EIRQ6, 34, b), Err(ErrorCode::ALREADY));
        assert_eq!(intc.source_at(34), Some(interrupts::EIRQ5));
        assert_eq!(fire(&intc, 34), 1);
    }

    #[test]
    fn out_of_range_slots_and_sources() {
        let intc = intc();
        assert_eq!(intc.register(interrupts::EIRQ0, 128, a), Err(ErrorCode::INVAL));
        assert_eq!(intc.register(SEL_UNUSED, 0, a), Err(ErrorCode::INVAL));
        assert_eq!(intc.resign(128), Err(ErrorCode::INVAL));
        assert_eq!(intc.resign(127), Ok(()));
    }

    #[test]
    fn share_routing_bits_are_idempotent() {
        let intc = intc();
        intc.share_enable(interrupts::DMA1_TC2);
        intc.share_enable(interrupts::DMA1_TC2);
        intc.share_enable(interrupts::DMA2_ERR);
        assert_eq!(intc.routing(129), (1 << 2) | (1 << 17));

        intc.share_disable(interrupts::DMA1_TC2);
        intc.share_disable(interrupts::DMA1_TC2);
        assert_eq!(intc.routing(129), 1 << 17);

        intc.share_enable(interrupts::NUM_SOURCES);
        assert_eq!(intc.routing(100), 0);
    }

    #[test]
    fn reserved_wakeup_bits_are_rejected() {
        let intc = intc();
        assert_eq!(intc.enable_wakeup(Wakeup::EIRQ3 | Wakeup::RTC_ALARM), Ok(()));
        assert_eq!(
            intc.enable_wakeup(Wakeup::from_bits_retain(1 << 24)),
            Err(ErrorCode::INVAL)
        );
        assert_eq!(
            intc.disable_wakeup(Wakeup::from_bits_retain(Wakeup::EIRQ3.bits() | 1 << 31)),
            Err(ErrorCode::INVAL)
        );
        assert_eq!(intc.wakeup(), Wakeup::EIRQ3 | Wakeup::RTC_ALARM);

        assert_eq!(intc.disable_wakeup(Wakeup::EIRQ3), Ok(()));
        assert_eq!(intc.wakeup(), Wakeup::RTC_ALARM);
    }

    #[test]
    fn wakeup_capable_sources() {
        assert_eq!(Wakeup::for_source(interrupts::EIRQ9), Some(Wakeup::EIRQ9));
        assert_eq!(Wakeup::for_source(interrupts::USART1_WUPI), Some(Wakeup::USART1_RXD));
        assert_eq!(Wakeup::for_source(interrupts::ACMP1), Some(Wakeup::CMP));
        assert_eq!(Wakeup::for_source(interrupts::DMA1_TC0), None);
    }

    #[test]
    fn eirq_configuration() {
        let intc = intc();
        let config = EirqConfig {
            trigger: EirqTrigger::RisingEdge,
            filter: Some(EirqFilterClock::Pclk3Div8),
        };
        assert_eq!(intc.configure_eirq(4, &config), Ok(()));
        assert_eq!(intc.registers.eirqcr[4].get(), 1 | (1 << 4) | (1 << 7));
        assert_eq!(intc.configure_eirq(16, &config), Err(ErrorCode::INVAL));

        intc.registers.eifr.set(1 << 4);
        assert!(intc.eirq_flag(4));
        intc.clear_eirq_flag(4);
        assert_eq!(intc.registers.eifcr.get(), 1 << 4);
    }
}
