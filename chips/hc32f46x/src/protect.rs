// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Register write-protect keys.
//!
//! Clock, power and PVD registers only accept writes while their bit in
//! `FPRC` is set, `FCG0` only while `FCG0PC` is unlocked, and the flash
//! controller only while `FAPRT` has seen its two-word key. Each key is held
//! by a guard that restores the locked state when dropped, so every exit path
//! of a configuration routine relocks.

use bitflags::bitflags;
use kernel::utilities::registers::interfaces::{Readable, Writeable};
use kernel::utilities::StaticRef;

use crate::sysreg::{EfmRegisters, MstpRegisters, SysregRegisters};

bitflags! {
    /// Write-enable bits of `FPRC`.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Protect: u16 {
        /// CMU registers.
        const CLOCK = 1 << 0;
        /// PWC registers, RAM control and peripheral clock selection.
        const POWER = 1 << 1;
        /// PVD registers.
        const PVD = 1 << 3;
    }
}

const FPRC_KEY: u16 = 0xA500;
const FCG0PC_UNLOCK: u32 = 0xA5A5_0001;
const FCG0PC_LOCK: u32 = 0xA5A5_0000;
const FAPRT_KEY1: u32 = 0x0123;
const FAPRT_KEY2: u32 = 0x3210;

/// Holds `FPRC` bits unlocked.
///
/// Guards nest: a guard only relocks the bits that were locked when it was
/// created.
pub struct Unlocked {
    regs: StaticRef<SysregRegisters>,
    opened: u16,
}

impl Unlocked {
    pub fn new(regs: StaticRef<SysregRegisters>, bits: Protect) -> Unlocked {
        let current = regs.fprc.get() & 0xFF;
        let opened = bits.bits() & !current;
        if opened != 0 {
            regs.fprc.set(FPRC_KEY | current | opened);
        }
        Unlocked { regs, opened }
    }
}

impl Drop for Unlocked {
    fn drop(&mut self) {
        if self.opened != 0 {
            let current = self.regs.fprc.get() & 0xFF;
            self.regs.fprc.set(FPRC_KEY | (current & !self.opened));
        }
    }
}

/// Holds `FCG0` writable.
pub struct Fcg0Unlocked {
    regs: StaticRef<MstpRegisters>,
    opened: bool,
}

impl Fcg0Unlocked {
    pub fn new(regs: StaticRef<MstpRegisters>) -> Fcg0Unlocked {
        let opened = regs.fcg0pc.get() & 1 == 0;
        if opened {
            regs.fcg0pc.set(FCG0PC_UNLOCK);
        }
        Fcg0Unlocked { regs, opened }
    }
}

impl Drop for Fcg0Unlocked {
    fn drop(&mut self) {
        if self.opened {
            self.regs.fcg0pc.set(FCG0PC_LOCK);
        }
    }
}

/// Holds the flash controller registers writable.
pub struct EfmUnlocked {
    regs: StaticRef<EfmRegisters>,
}

impl EfmUnlocked {
    pub fn new(regs: StaticRef<EfmRegisters>) -> EfmUnlocked {
        regs.faprt.set(FAPRT_KEY1);
        regs.faprt.set(FAPRT_KEY2);
        EfmUnlocked { regs }
    }
}

impl Drop for EfmUnlocked {
    fn drop(&mut self) {
        self.regs.faprt.set(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ram_block;

    #[test]
    fn guard_unlocks_and_relocks() {
        let regs = ram_block::<SysregRegisters>();
        {
            let _clock = Unlocked::new(regs, Protect::CLOCK);
            assert_eq!(regs.fprc.get(), 0xA501);
        }
        assert_eq!(regs.fprc.get(), 0xA500);
    }

    #[test]
    fn nested_guard_leaves_outer_bits_open() {
        let regs = ram_block::<SysregRegisters>();
        let outer = Unlocked::new(regs, Protect::CLOCK);
        {
            let _inner = Unlocked::new(regs, Protect::CLOCK | Protect::POWER);
            assert_eq!(regs.fprc.get(), 0xA503);
        }
        assert_eq!(regs.fprc.get(), 0xA501);
        drop(outer);
        assert_eq!(regs.fprc.get(), 0xA500);
    }

    #[test]
    fn fcg0_guard_only_relocks_what_it_opened() {
        let regs = ram_block::<MstpRegisters>();
        {
            let _fcg0 = Fcg0Unlocked::new(regs);
            assert_eq!(regs.fcg0pc.get(), FCG0PC_UNLOCK);
        }
        assert_eq!(regs.fcg0pc.get(), FCG0PC_LOCK);

        regs.fcg0pc.set(1);
        drop(Fcg0Unlocked::new(regs));
        assert_eq!(regs.fcg0pc.get(), 1);
    }

    #[test]
    fn efm_guard_clears_key_on_drop() {
        let regs = ram_block::<EfmRegisters>();
        {
            let _efm = EfmUnlocked::new(regs);
            assert_eq!(regs.faprt.get(), FAPRT_KEY2);
        }
        assert_eq!(regs.faprt.get(), 0);
    }
}
