// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Cortex-M NVIC
//!
//! Most NVIC configuration is in the NVIC registers:
//! <https://developer.arm.com/docs/100165/0201/nested-vectored-interrupt-controller/nvic-programmers-model/table-of-nvic-registers>
//!
//! Besides per-line control, this module can capture the set-enable bitmap
//! and write it back later. Low-power entry uses that to narrow the enabled
//! lines down to the wake sources and to reinstate the full set on exit.

use kernel::utilities::registers::interfaces::{Readable, Writeable};
use kernel::utilities::registers::{register_bitfields, register_structs, ReadOnly, ReadWrite};
use kernel::utilities::StaticRef;

register_structs! {
    /// NVIC Registers.
    ///
    /// Note this generic interface exposes all possible NVICs. Most cores will
    /// not implement all NVIC_XXXX registers. If you need to find the number
    /// of NVICs dynamically, consult `ICTR.INTLINESNUM`.
    pub NvicRegisters {
        (0x000 => _reserved0),

        /// Interrupt Controller Type Register
        (0x004 => ictr: ReadOnly<u32, InterruptControllerType::Register>),

        (0x008 => _reserved1),

        /// Interrupt Set-Enable Registers
        (0x100 => iser: [ReadWrite<u32, NvicSetClear::Register>; 32]),

        /// Interrupt Clear-Enable Registers
        (0x180 => icer: [ReadWrite<u32, NvicSetClear::Register>; 32]),

        /// Interrupt Set-Pending Registers
        (0x200 => ispr: [ReadWrite<u32, NvicSetClear::Register>; 32]),

        /// Interrupt Clear-Pending Registers
        (0x280 => icpr: [ReadWrite<u32, NvicSetClear::Register>; 32]),

        /// Interrupt Active Bit Registers
        (0x300 => iabr: [ReadWrite<u32, NvicSetClear::Register>; 32]),

        (0x380 => _reserved2),

        /// Interrupt Priority Registers
        (0x400 => ipr: [ReadWrite<u32, NvicInterruptPriority::Register>; 252]),

        (0x7f0 => @END),
    }
}

register_bitfields![u32,
    InterruptControllerType [
        /// Total number of interrupt lines in groups of 32
        INTLINESNUM     OFFSET(0)   NUMBITS(4)
    ],

    NvicSetClear [
        /// For register NVIC_XXXXn, access interrupt (m+(32*n)).
        BITS            OFFSET(0)   NUMBITS(32)
    ],

    NvicInterruptPriority [
        /// For register NVIC_IPRn, priority of interrupt number 4n+3.
        PRI_N3          OFFSET(24)  NUMBITS(8),

        /// For register NVIC_IPRn, priority of interrupt number 4n+2.
        PRI_N2          OFFSET(16)  NUMBITS(8),

        /// For register NVIC_IPRn, priority of interrupt number 4n+1.
        PRI_N1          OFFSET(8)   NUMBITS(8),

        /// For register NVIC_IPRn, priority of interrupt number 4n.
        PRI_N0          OFFSET(0)   NUMBITS(8)
    ]
];

/// The NVIC peripheral in MMIO space.
pub const NVIC_BASE: StaticRef<NvicRegisters> =
    unsafe { StaticRef::new(0xe000e000 as *const NvicRegisters) };

/// Handle on an NVIC register block.
pub struct Nvic {
    registers: StaticRef<NvicRegisters>,
}

impl Nvic {
    /// The core's NVIC.
    pub const fn new() -> Nvic {
        Nvic {
            registers: NVIC_BASE,
        }
    }

    /// An NVIC at a different location, e.g. a register image in RAM.
    pub const fn with_registers(registers: StaticRef<NvicRegisters>) -> Nvic {
        Nvic { registers }
    }

    /// Number of valid NVIC_XXXX registers. This is a ceiling on the number
    /// of available interrupts (banks of 32); the actual number may be less.
    pub fn number_of_nvic_registers(&self) -> usize {
        (self.registers.ictr.read(InterruptControllerType::INTLINESNUM) + 1) as usize
    }

    pub fn enable(&self, irq: u32) {
        self.registers.iser[irq as usize / 32].set(1 << (irq & 31));
    }

    pub fn disable(&self, irq: u32) {
        self.registers.icer[irq as usize / 32].set(1 << (irq & 31));
    }

    pub fn clear_pending(&self, irq: u32) {
        self.registers.icpr[irq as usize / 32].set(1 << (irq & 31));
    }

    pub fn is_enabled(&self, irq: u32) -> bool {
        self.registers.iser[irq as usize / 32].get() & (1 << (irq & 31)) != 0
    }

    pub fn is_pending(&self, irq: u32) -> bool {
        self.registers.ispr[irq as usize / 32].get() & (1 << (irq & 31)) != 0
    }

    /// Set the priority byte of `irq`. Only the implemented upper bits are
    /// kept by hardware.
    pub fn set_priority(&self, irq: u32, priority: u8) {
        let reg = &self.registers.ipr[irq as usize / 4];
        let shift = (irq & 3) * 8;
        let cleared = reg.get() & !(0xff << shift);
        reg.set(cleared | (u32::from(priority) << shift));
    }

    /// Clear all pending interrupts
    pub fn clear_all_pending(&self) {
        for icpr in self.registers.icpr.iter().take(self.number_of_nvic_registers()) {
            icpr.set(!0)
        }
    }

    /// Disable all interrupts
    pub fn disable_all(&self) {
        for icer in self.registers.icer.iter().take(self.number_of_nvic_registers()) {
            icer.set(!0)
        }
    }

    /// Get the index of the lowest numbered pending interrupt, or `None` if
    /// none are pending.
    pub fn next_pending(&self) -> Option<u32> {
        for (block, ispr) in self
            .registers
            .ispr
            .iter()
            .take(self.number_of_nvic_registers())
            .enumerate()
        {
            let ispr = ispr.get();

            if ispr != 0 {
                let bit = ispr.trailing_zeros();
                return Some(block as u32 * 32 + bit);
            }
        }
        None
    }

    /// Capture the first `N` set-enable words.
    pub fn save_enables<const N: usize>(&self) -> [u32; N] {
        let mut words = [0; N];
        for (word, iser) in words.iter_mut().zip(self.registers.iser.iter()) {
            *word = iser.get();
        }
        words
    }

    /// Make the enabled lines of the first `words.len()` banks exactly
    /// `words`: lines missing from the snapshot are cleared, the rest are set.
    pub fn restore_enables(&self, words: &[u32]) {
        for (i, &word) in words.iter().enumerate().take(self.registers.iser.len()) {
            self.registers.icer[i].set(!word);
            self.registers.iser[i].set(word);
        }
    }

    /// Disable every line in `first..=last`.
    pub fn disable_range(&self, first: u32, last: u32) {
        for irq in first..=last {
            self.disable(irq);
        }
    }
}
